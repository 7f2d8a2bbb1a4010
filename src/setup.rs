//! Interactive first-run setup wizard (`teller setup`)

use std::path::PathBuf;

use dialoguer::{Confirm, Input, Select};

use crate::config::file::{
    ApiKeysFileConfig, AvatarFileConfig, LlmFileConfig, ServerFileConfig, TellerConfigFile,
    VoiceFileConfig,
};

/// Run the interactive setup wizard
///
/// # Errors
///
/// Returns error if user input fails or the config cannot be written
pub fn run_setup() -> anyhow::Result<()> {
    println!("Teller Setup\n");

    // Load existing config if present
    let existing = crate::config::file::load_config_file();
    let config_path = crate::config::file::config_file_path()
        .unwrap_or_else(|| PathBuf::from("~/.config/teller/config.toml"));

    if config_path.exists() {
        println!("Existing config found at {}\n", config_path.display());
    }

    // 1. OpenAI key (chat replies, LLM intent detection, Whisper)
    let openai_key = prompt_api_key(
        "OpenAI API key (OPENAI_API_KEY)",
        existing.api_keys.openai.as_deref(),
    )?;

    // 2. LLM model
    let default_model = existing.llm.model.as_deref().unwrap_or("gpt-4o-mini");
    let model: String = Input::new()
        .with_prompt("LLM model")
        .default(default_model.to_string())
        .interact_text()?;

    // 3. STT provider
    let providers = ["Whisper (OpenAI)", "Deepgram"];
    let default_provider = existing
        .voice
        .stt_provider
        .as_deref()
        .map_or(0, |p| usize::from(p.eq_ignore_ascii_case("deepgram")));

    let provider_idx = Select::new()
        .with_prompt("Select a transcription provider")
        .items(&providers)
        .default(default_provider)
        .interact()?;
    let stt_provider = if provider_idx == 1 { "deepgram" } else { "whisper" };

    let deepgram_key = if stt_provider == "deepgram" {
        prompt_api_key(
            "Deepgram API key (DEEPGRAM_API_KEY)",
            existing.api_keys.deepgram.as_deref(),
        )?
    } else {
        existing.api_keys.deepgram.clone()
    };

    // 4. Language hint
    let default_language = existing.voice.language.as_deref().unwrap_or("es");
    let language: String = Input::new()
        .with_prompt("Transcription language")
        .default(default_language.to_string())
        .interact_text()?;

    // 5. Avatar (optional)
    let avatar_default = existing.api_keys.did.is_some();
    let enable_avatar = Confirm::new()
        .with_prompt("Enable the talking avatar (requires a D-ID account)?")
        .default(avatar_default)
        .interact()?;

    let (did_key, avatar) = if enable_avatar {
        let key = prompt_api_key("D-ID API key (DID_API_KEY)", existing.api_keys.did.as_deref())?;

        let default_source = existing
            .avatar
            .source_url
            .as_deref()
            .unwrap_or("https://d-id-public-bucket.s3.amazonaws.com/alice.jpg");
        let source_url: String = Input::new()
            .with_prompt("Presenter image URL")
            .default(default_source.to_string())
            .interact_text()?;

        (
            key,
            AvatarFileConfig {
                base_url: existing.avatar.base_url.clone(),
                source_url: Some(source_url),
                max_sessions: existing.avatar.max_sessions,
                idle_timeout_secs: existing.avatar.idle_timeout_secs,
            },
        )
    } else {
        (existing.api_keys.did.clone(), AvatarFileConfig::default())
    };

    // 6. Port
    let default_port = existing.server.port.unwrap_or(18890);
    let port: u16 = Input::new()
        .with_prompt("Server port")
        .default(default_port)
        .interact_text()?;

    // 7. Build and write config
    let config_file = TellerConfigFile {
        llm: LlmFileConfig {
            model: Some(model),
            base_url: existing.llm.base_url,
        },
        voice: VoiceFileConfig {
            stt_provider: Some(stt_provider.to_string()),
            stt_model: existing.voice.stt_model,
            language: Some(language),
        },
        avatar,
        api_keys: ApiKeysFileConfig {
            openai: openai_key,
            deepgram: deepgram_key,
            did: did_key,
        },
        server: ServerFileConfig {
            port: Some(port),
            static_dir: existing.server.static_dir,
            context_dir: existing.server.context_dir,
            rate_limit_per_minute: existing.server.rate_limit_per_minute,
        },
    };

    write_config(&config_path, &config_file)?;
    println!("\nConfig written to {}", config_path.display());
    println!("\nSetup complete! Run `teller serve -v` to start.");

    Ok(())
}

/// Prompt for an API key, keeping the existing one when input is left blank
fn prompt_api_key(label: &str, existing: Option<&str>) -> anyhow::Result<Option<String>> {
    let masked = existing.map(|k| {
        if k.len() > 8 {
            format!("{}...{}", &k[..4], &k[k.len() - 4..])
        } else {
            "****".to_string()
        }
    });

    let prompt = if let Some(ref m) = masked {
        format!("{label} (current: {m}, leave blank to keep)")
    } else {
        format!("{label} (leave blank to skip)")
    };

    let input: String = Input::new()
        .with_prompt(&prompt)
        .allow_empty(true)
        .interact_text()?;

    if input.is_empty() {
        Ok(existing.map(str::to_string))
    } else {
        Ok(Some(input))
    }
}

/// Serialize and write the config file
fn write_config(path: &PathBuf, config: &TellerConfigFile) -> anyhow::Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let toml = serialize_config(config);
    std::fs::write(path, toml)?;

    Ok(())
}

/// Serialize config to a readable TOML string
fn serialize_config(config: &TellerConfigFile) -> String {
    let mut out = String::new();

    // [llm]
    if config.llm.model.is_some() || config.llm.base_url.is_some() {
        out.push_str("[llm]\n");
        if let Some(ref model) = config.llm.model {
            out.push_str(&format!("model = \"{model}\"\n"));
        }
        if let Some(ref url) = config.llm.base_url {
            out.push_str(&format!("base_url = \"{url}\"\n"));
        }
        out.push('\n');
    }

    // [voice]
    let vc = &config.voice;
    if vc.stt_provider.is_some() || vc.stt_model.is_some() || vc.language.is_some() {
        out.push_str("[voice]\n");
        if let Some(ref p) = vc.stt_provider {
            out.push_str(&format!("stt_provider = \"{p}\"\n"));
        }
        if let Some(ref m) = vc.stt_model {
            out.push_str(&format!("stt_model = \"{m}\"\n"));
        }
        if let Some(ref l) = vc.language {
            out.push_str(&format!("language = \"{l}\"\n"));
        }
        out.push('\n');
    }

    // [avatar]
    let av = &config.avatar;
    if av.base_url.is_some()
        || av.source_url.is_some()
        || av.max_sessions.is_some()
        || av.idle_timeout_secs.is_some()
    {
        out.push_str("[avatar]\n");
        if let Some(ref url) = av.base_url {
            out.push_str(&format!("base_url = \"{url}\"\n"));
        }
        if let Some(ref url) = av.source_url {
            out.push_str(&format!("source_url = \"{url}\"\n"));
        }
        if let Some(n) = av.max_sessions {
            out.push_str(&format!("max_sessions = {n}\n"));
        }
        if let Some(secs) = av.idle_timeout_secs {
            out.push_str(&format!("idle_timeout_secs = {secs}\n"));
        }
        out.push('\n');
    }

    // [api_keys]
    let ak = &config.api_keys;
    if ak.openai.is_some() || ak.deepgram.is_some() || ak.did.is_some() {
        out.push_str("[api_keys]\n");
        for (key, val) in [
            ("openai", &ak.openai),
            ("deepgram", &ak.deepgram),
            ("did", &ak.did),
        ] {
            if let Some(v) = val {
                out.push_str(&format!("{key} = \"{v}\"\n"));
            }
        }
        out.push('\n');
    }

    // [server]
    let sv = &config.server;
    if sv.port.is_some()
        || sv.static_dir.is_some()
        || sv.context_dir.is_some()
        || sv.rate_limit_per_minute.is_some()
    {
        out.push_str("[server]\n");
        if let Some(port) = sv.port {
            out.push_str(&format!("port = {port}\n"));
        }
        if let Some(ref dir) = sv.static_dir {
            out.push_str(&format!("static_dir = \"{dir}\"\n"));
        }
        if let Some(ref dir) = sv.context_dir {
            out.push_str(&format!("context_dir = \"{dir}\"\n"));
        }
        if let Some(rpm) = sv.rate_limit_per_minute {
            out.push_str(&format!("rate_limit_per_minute = {rpm}\n"));
        }
        out.push('\n');
    }

    out
}
