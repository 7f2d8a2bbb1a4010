//! Voice capture and transcription
//!
//! Audio enters either from the local microphone (CLI) or as uploaded
//! bytes (HTTP, websocket) and leaves as a transcript from Whisper or
//! Deepgram.

mod capture;
mod recorder;
mod stt;

pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
pub use recorder::{RecordedUtterance, UtteranceRecorder};
pub use stt::Transcriber;
