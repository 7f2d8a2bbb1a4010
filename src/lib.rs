//! Teller Gateway - voice assistant gateway for a demo banking front-end
//!
//! This library provides the core functionality for the Teller gateway:
//! - Navigation intent detection (LLM-backed with a keyword fallback)
//! - Speech capture and transcription (Whisper or Deepgram)
//! - Talking-avatar session signaling (D-ID style streaming API)
//! - The HTTP/WebSocket API the banking front-end talks to
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Banking front-end                    │
//! │   mic capture  │  router  │  <video> avatar         │
//! └────────────────────┬────────────────────────────────┘
//!                      │ HTTP + WebSocket
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Teller Gateway                       │
//! │   Contexts  │  Intent  │  STT  │  Avatar sessions   │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Vendor APIs                          │
//! │   OpenAI chat  │  Whisper / Deepgram  │  D-ID       │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod avatar;
pub mod config;
pub mod context;
pub mod error;
pub mod gateway;
pub mod intent;
pub mod llm;
pub mod setup;
pub mod voice;

pub use avatar::{AvatarBackend, AvatarClient, ReconnectPolicy, SessionManager, SessionState};
pub use config::Config;
pub use context::{ContextRegistry, ConversationContext, NavigationCommand};
pub use error::{Error, Result};
pub use intent::{
    IntentDetector, IntentRequest, IntentResult, KeywordIntentDetector, LlmIntentDetector,
};
pub use llm::{ChatClient, ChatMessage};
pub use voice::{Transcriber, UtteranceRecorder};
