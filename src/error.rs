//! Error types for the Teller gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Teller gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Conversation context not found or malformed
    #[error("context error: {0}")]
    Context(String),

    /// Intent detection error
    #[error("intent error: {0}")]
    Intent(String),

    /// LLM completion error
    #[error("llm error: {0}")]
    Llm(String),

    /// Audio capture error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Avatar streaming error
    #[error("avatar error: {0}")]
    Avatar(String),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation conflicts with the resource's current state
    #[error("conflict: {0}")]
    Conflict(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
