//! TOML configuration file loading
//!
//! Supports `~/.config/teller/config.toml` as a persistent config source.
//! All fields are optional. The file is a partial overlay on top of
//! defaults, and environment variables still win over it.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct TellerConfigFile {
    /// LLM configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Voice/transcription configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Avatar streaming configuration
    #[serde(default)]
    pub avatar: AvatarFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Model identifier (e.g. "gpt-4o-mini")
    pub model: Option<String>,

    /// OpenAI-compatible base URL override
    pub base_url: Option<String>,
}

/// Voice/transcription configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Transcription provider ("whisper" or "deepgram")
    pub stt_provider: Option<String>,

    /// STT model (e.g. "whisper-1", "nova-2")
    pub stt_model: Option<String>,

    /// Transcription language hint (e.g. "es")
    pub language: Option<String>,
}

/// Avatar streaming configuration
#[derive(Debug, Default, Deserialize)]
pub struct AvatarFileConfig {
    /// Vendor API base URL
    pub base_url: Option<String>,

    /// Presenter image the vendor animates
    pub source_url: Option<String>,

    /// Concurrent session cap
    pub max_sessions: Option<usize>,

    /// Idle session timeout in seconds
    pub idle_timeout_secs: Option<u64>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub deepgram: Option<String>,
    pub did: Option<String>,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,

    /// Directory of front-end build output to serve
    pub static_dir: Option<String>,

    /// Directory of context JSON overlays
    pub context_dir: Option<String>,

    /// Global rate limit in requests per minute
    pub rate_limit_per_minute: Option<u32>,
}

/// Load the TOML config file from the standard path
///
/// Returns `TellerConfigFile::default()` if the file doesn't exist or
/// can't be parsed.
#[must_use]
pub fn load_config_file() -> TellerConfigFile {
    let Some(path) = config_file_path() else {
        return TellerConfigFile::default();
    };
    load_config_file_from(&path)
}

/// Load a TOML config file from an explicit path
#[must_use]
pub fn load_config_file_from(path: &Path) -> TellerConfigFile {
    if !path.exists() {
        return TellerConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                TellerConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            TellerConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/teller/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("teller").join("config.toml"))
}
