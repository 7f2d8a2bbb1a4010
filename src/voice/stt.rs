//! Batch speech-to-text transcription
//!
//! One HTTP round trip per utterance: the browser uploads finished audio
//! and receives a transcript. Whisper and Deepgram are supported; the
//! language hint defaults to Spanish because that is what the demo bank's
//! users speak.

use crate::error::{Error, Result};

const WHISPER_BASE_URL: &str = "https://api.openai.com/v1";
const DEEPGRAM_BASE_URL: &str = "https://api.deepgram.com/v1";

/// Response from the Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Response from the Deepgram transcription API
#[derive(serde::Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// Transcription backend
#[derive(Clone, Copy, Debug)]
enum SttBackend {
    Whisper,
    Deepgram,
}

/// Transcribes finished audio clips to text
pub struct Transcriber {
    client: reqwest::Client,
    api_key: String,
    model: String,
    language: String,
    backend: SttBackend,
    base_url: String,
}

impl Transcriber {
    /// Create a transcriber backed by Whisper
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn whisper(api_key: String, model: String, language: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for Whisper transcription".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            language,
            backend: SttBackend::Whisper,
            base_url: WHISPER_BASE_URL.to_string(),
        })
    }

    /// Create a transcriber backed by Deepgram
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn deepgram(api_key: String, model: String, language: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "Deepgram API key required for transcription".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            language,
            backend: SttBackend::Deepgram,
            base_url: DEEPGRAM_BASE_URL.to_string(),
        })
    }

    /// Override the vendor base URL, e.g. for a test server
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Transcribe an audio clip
    ///
    /// # Arguments
    ///
    /// * `audio` - encoded audio bytes
    /// * `media_type` - MIME type of `audio`, e.g. `audio/wav` or `audio/webm`
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the vendor response is
    /// malformed
    pub async fn transcribe(&self, audio: &[u8], media_type: &str) -> Result<String> {
        match self.backend {
            SttBackend::Whisper => self.transcribe_whisper(audio, media_type).await,
            SttBackend::Deepgram => self.transcribe_deepgram(audio, media_type).await,
        }
    }

    async fn transcribe_whisper(&self, audio: &[u8], media_type: &str) -> Result<String> {
        tracing::debug!(
            audio_bytes = audio.len(),
            media_type,
            "starting Whisper transcription"
        );

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name(file_name_for(media_type))
                    .mime_str(media_type)
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone())
            .text("language", self.language.clone());

        let url = format!(
            "{}/audio/transcriptions",
            self.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse Whisper response");
            e
        })?;

        tracing::info!(chars = result.text.len(), "transcription complete");
        Ok(result.text)
    }

    async fn transcribe_deepgram(&self, audio: &[u8], media_type: &str) -> Result<String> {
        tracing::debug!(
            audio_bytes = audio.len(),
            media_type,
            "starting Deepgram transcription"
        );

        let url = format!(
            "{}/listen?model={}&language={}&punctuate=true",
            self.base_url.trim_end_matches('/'),
            self.model,
            self.language
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", media_type)
            .body(audio.to_vec())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Deepgram request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Deepgram API error");
            return Err(Error::Stt(format!("Deepgram API error {status}: {body}")));
        }

        let result: DeepgramResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse Deepgram response");
            e
        })?;

        let transcript = result
            .results
            .channels
            .first()
            .and_then(|c| c.alternatives.first())
            .map(|a| a.transcript.clone())
            .unwrap_or_default();

        tracing::info!(chars = transcript.len(), "transcription complete");
        Ok(transcript)
    }
}

/// Pick an upload file name matching the MIME type
fn file_name_for(media_type: &str) -> &'static str {
    match media_type {
        "audio/webm" => "audio.webm",
        "audio/ogg" => "audio.ogg",
        "audio/mpeg" | "audio/mp3" => "audio.mp3",
        _ => "audio.wav",
    }
}
