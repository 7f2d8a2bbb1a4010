//! Configuration management for the Teller gateway
//!
//! Layered per field: environment variable, then the TOML config file,
//! then a built-in default. Missing vendor keys never fail startup; they
//! switch the affected feature into its degraded mode instead.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

/// Transcription provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SttProviderKind {
    /// OpenAI Whisper over multipart upload
    #[default]
    Whisper,
    /// Deepgram over raw body upload
    Deepgram,
}

impl SttProviderKind {
    /// Parse a provider name, defaulting to Whisper for unknown values
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "deepgram" => Self::Deepgram,
            "whisper" | "openai" => Self::Whisper,
            other => {
                if !other.is_empty() {
                    tracing::warn!(provider = other, "unknown STT provider, using whisper");
                }
                Self::Whisper
            }
        }
    }

    /// Default model for this provider
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::Whisper => "whisper-1",
            Self::Deepgram => "nova-2",
        }
    }
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (chat completions and Whisper)
    pub openai: Option<String>,

    /// `Deepgram` API key (optional STT)
    pub deepgram: Option<String>,

    /// `D-ID` API credential pair (avatar streaming)
    pub did: Option<String>,
}

/// LLM configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Model identifier for chat completions
    pub model: String,

    /// OpenAI-compatible base URL override
    pub base_url: Option<String>,
}

/// Voice/transcription configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Transcription provider
    pub stt_provider: SttProviderKind,

    /// STT model identifier
    pub stt_model: String,

    /// Language hint passed to the transcriber
    pub language: String,
}

/// Avatar streaming configuration
#[derive(Debug, Clone)]
pub struct AvatarConfig {
    /// Vendor API base URL override
    pub base_url: Option<String>,

    /// Presenter image the vendor animates
    pub source_url: String,

    /// Concurrent session cap
    pub max_sessions: usize,

    /// Idle session timeout
    pub idle_timeout: Duration,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Front-end build directory to serve, when set
    pub static_dir: Option<PathBuf>,

    /// Directory of context JSON overlays, when set
    pub context_dir: Option<PathBuf>,

    /// Global rate limit in requests per minute, when set
    pub rate_limit_per_minute: Option<u32>,
}

/// Teller gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API keys
    pub api_keys: ApiKeys,

    /// LLM configuration
    pub llm: LlmConfig,

    /// Voice/transcription configuration
    pub voice: VoiceConfig,

    /// Avatar streaming configuration
    pub avatar: AvatarConfig,

    /// HTTP server configuration
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration with env > TOML file > default layering
    #[must_use]
    pub fn load() -> Self {
        let fc = file::load_config_file();

        let api_keys = ApiKeys {
            openai: std::env::var("OPENAI_API_KEY").ok().or(fc.api_keys.openai),
            deepgram: std::env::var("DEEPGRAM_API_KEY")
                .ok()
                .or(fc.api_keys.deepgram),
            did: std::env::var("DID_API_KEY").ok().or(fc.api_keys.did),
        };

        let llm = LlmConfig {
            model: std::env::var("TELLER_LLM_MODEL")
                .ok()
                .or(fc.llm.model)
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            base_url: std::env::var("TELLER_LLM_BASE_URL").ok().or(fc.llm.base_url),
        };

        let stt_provider = std::env::var("TELLER_STT_PROVIDER")
            .ok()
            .or(fc.voice.stt_provider)
            .map(|name| SttProviderKind::parse(&name))
            .unwrap_or_default();
        let voice = VoiceConfig {
            stt_provider,
            stt_model: std::env::var("TELLER_STT_MODEL")
                .ok()
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| stt_provider.default_model().to_string()),
            language: std::env::var("TELLER_LANGUAGE")
                .ok()
                .or(fc.voice.language)
                .unwrap_or_else(|| "es".to_string()),
        };

        let avatar = AvatarConfig {
            base_url: std::env::var("TELLER_AVATAR_URL").ok().or(fc.avatar.base_url),
            source_url: std::env::var("TELLER_AVATAR_SOURCE_URL")
                .ok()
                .or(fc.avatar.source_url)
                .unwrap_or_else(|| {
                    "https://d-id-public-bucket.s3.amazonaws.com/alice.jpg".to_string()
                }),
            max_sessions: fc.avatar.max_sessions.unwrap_or(8),
            idle_timeout: Duration::from_secs(fc.avatar.idle_timeout_secs.unwrap_or(300)),
        };

        let server = ServerConfig {
            port: std::env::var("TELLER_PORT")
                .or_else(|_| std::env::var("PORT"))
                .ok()
                .and_then(|s| s.parse().ok())
                .or(fc.server.port)
                .unwrap_or(18890),
            static_dir: std::env::var("TELLER_STATIC_DIR")
                .ok()
                .or(fc.server.static_dir)
                .map(PathBuf::from),
            context_dir: std::env::var("TELLER_CONTEXT_DIR")
                .ok()
                .or(fc.server.context_dir)
                .map(PathBuf::from),
            rate_limit_per_minute: std::env::var("TELLER_RATE_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .or(fc.server.rate_limit_per_minute),
        };

        Self {
            api_keys,
            llm,
            voice,
            avatar,
            server,
        }
    }

    /// Whether LLM-backed features (intent, chat) can run
    #[must_use]
    pub const fn llm_configured(&self) -> bool {
        self.api_keys.openai.is_some()
    }

    /// Whether transcription can run with the selected provider
    #[must_use]
    pub const fn stt_configured(&self) -> bool {
        match self.voice.stt_provider {
            SttProviderKind::Whisper => self.api_keys.openai.is_some(),
            SttProviderKind::Deepgram => self.api_keys.deepgram.is_some(),
        }
    }

    /// Whether avatar streaming can run
    #[must_use]
    pub const fn avatar_configured(&self) -> bool {
        self.api_keys.did.is_some()
    }
}
