//! Gateway assembly
//!
//! Wires the loaded configuration into running services and serves HTTP
//! until the process is stopped. Every vendor-backed feature is optional:
//! a missing key logs what is off and the gateway starts anyway.

use std::sync::Arc;
use std::time::Duration;

use crate::api::ApiServerBuilder;
use crate::avatar::{AvatarClient, SessionManager};
use crate::config::{Config, SttProviderKind};
use crate::context::ContextRegistry;
use crate::intent::{IntentDetector, KeywordIntentDetector, LlmIntentDetector};
use crate::llm::ChatClient;
use crate::voice::Transcriber;
use crate::Result;

/// How often idle avatar sessions are swept
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Run the gateway with the given configuration
///
/// # Errors
///
/// Returns an error if the embedded contexts are invalid, a configured
/// overlay directory cannot be read, or the server fails to bind.
pub async fn run(config: Config) -> Result<()> {
    let contexts = Arc::new(build_registry(&config)?);
    tracing::info!(contexts = contexts.len(), "context registry ready");

    let chat = build_chat_client(&config)?;
    let detector = build_detector(&contexts, chat.clone());
    let transcriber = build_transcriber(&config)?;
    let avatar = build_avatar(&config)?;

    if let Some(ref manager) = avatar {
        spawn_idle_sweep(Arc::clone(manager));
    }

    let mut builder = ApiServerBuilder::new(contexts, detector, config.server.port);

    if let Some(client) = chat {
        builder = builder.chat(client);
    }
    if let Some(transcriber) = transcriber {
        builder = builder.transcriber(transcriber);
    }
    if let Some(manager) = avatar {
        builder = builder.avatar(manager);
    }
    if let Some(ref dir) = config.server.static_dir {
        builder = builder.static_dir(dir.clone());
    }
    if let Some(rpm) = config.server.rate_limit_per_minute {
        tracing::info!(requests_per_minute = rpm, "rate limiting active");
        builder = builder.rate_limit(rpm);
    }

    builder.build().run().await
}

/// Build the context registry, overlaying a configured directory if set
fn build_registry(config: &Config) -> Result<ContextRegistry> {
    match config.server.context_dir {
        Some(ref dir) => ContextRegistry::with_overlay(dir),
        None => ContextRegistry::builtin(),
    }
}

/// Build the chat client when an OpenAI key is configured
fn build_chat_client(config: &Config) -> Result<Option<Arc<ChatClient>>> {
    let Some(ref key) = config.api_keys.openai else {
        tracing::warn!("no OPENAI_API_KEY, chat replies and LLM intent detection are off");
        return Ok(None);
    };

    let mut client = ChatClient::new(key.clone(), config.llm.model.clone())?;
    if let Some(ref base_url) = config.llm.base_url {
        client = client.with_base_url(base_url.clone());
    }
    tracing::info!(model = %config.llm.model, "chat client ready");
    Ok(Some(Arc::new(client)))
}

/// Pick the intent detector: LLM-backed when available, keywords otherwise
fn build_detector(
    contexts: &Arc<ContextRegistry>,
    chat: Option<Arc<ChatClient>>,
) -> Arc<dyn IntentDetector> {
    match chat {
        Some(client) => {
            tracing::info!("using LLM intent detection");
            Arc::new(LlmIntentDetector::new(client))
        }
        None => {
            tracing::info!("using keyword intent detection");
            Arc::new(KeywordIntentDetector::new(contexts))
        }
    }
}

/// Build the transcriber for the configured STT provider
fn build_transcriber(config: &Config) -> Result<Option<Arc<Transcriber>>> {
    if !config.stt_configured() {
        tracing::warn!(
            provider = ?config.voice.stt_provider,
            "no API key for the STT provider, transcription is off"
        );
        return Ok(None);
    }

    let model = config.voice.stt_model.clone();
    let language = config.voice.language.clone();
    let transcriber = match config.voice.stt_provider {
        SttProviderKind::Whisper => {
            let key = config.api_keys.openai.clone().unwrap_or_default();
            Transcriber::whisper(key, model, language)?
        }
        SttProviderKind::Deepgram => {
            let key = config.api_keys.deepgram.clone().unwrap_or_default();
            Transcriber::deepgram(key, model, language)?
        }
    };

    tracing::info!(
        provider = ?config.voice.stt_provider,
        model = %config.voice.stt_model,
        "transcriber ready"
    );
    Ok(Some(Arc::new(transcriber)))
}

/// Build the avatar session manager when a D-ID key is configured
fn build_avatar(config: &Config) -> Result<Option<Arc<SessionManager>>> {
    let Some(ref key) = config.api_keys.did else {
        tracing::warn!("no DID_API_KEY, avatar streaming is off");
        return Ok(None);
    };

    let mut client = AvatarClient::new(key, config.avatar.source_url.clone())?;
    if let Some(ref base_url) = config.avatar.base_url {
        client = client.with_base_url(base_url.clone());
    }

    let manager = SessionManager::new(Arc::new(client))
        .with_max_sessions(config.avatar.max_sessions)
        .with_idle_timeout(config.avatar.idle_timeout);

    tracing::info!(
        max_sessions = config.avatar.max_sessions,
        "avatar session manager ready"
    );
    Ok(Some(Arc::new(manager)))
}

/// Spawn the periodic sweep that closes idle avatar sessions
fn spawn_idle_sweep(manager: Arc<SessionManager>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        // Skip the first immediate tick
        interval.tick().await;

        loop {
            interval.tick().await;
            let closed = manager.sweep_idle().await;
            if closed > 0 {
                tracing::info!(closed, "swept idle avatar sessions");
            }
        }
    });
}
