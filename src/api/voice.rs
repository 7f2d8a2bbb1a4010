//! Voice API endpoint for speech-to-text

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Serialize;

use super::ApiState;

/// Build voice router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/transcribe", post(transcribe))
        .with_state(state)
}

/// Transcription response
#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub text: String,
}

/// Transcribe audio to text
///
/// Accepts raw audio bytes; the Content-Type header names the container
/// (`audio/webm` from browser recorders, `audio/wav` from the CLI).
async fn transcribe(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<TranscribeResponse>, VoiceError> {
    let transcriber = state
        .transcriber
        .as_ref()
        .ok_or(VoiceError::NotConfigured("transcription not configured (no STT API key)"))?;

    if body.is_empty() {
        return Err(VoiceError::BadRequest("Empty audio data"));
    }

    let media_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("audio/wav");

    let text = transcriber
        .transcribe(&body, media_type)
        .await
        .map_err(|e| VoiceError::TranscriptionFailed(e.to_string()))?;

    Ok(Json(TranscribeResponse { text }))
}

/// Voice API errors
#[derive(Debug)]
pub enum VoiceError {
    NotConfigured(&'static str),
    BadRequest(&'static str),
    TranscriptionFailed(String),
}

impl IntoResponse for VoiceError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = match self {
            Self::NotConfigured(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "not_configured", msg.to_string())
            }
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.to_string()),
            Self::TranscriptionFailed(msg) => {
                (StatusCode::BAD_GATEWAY, "transcription_failed", msg)
            }
        };

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };
        (status, Json(body)).into_response()
    }
}
