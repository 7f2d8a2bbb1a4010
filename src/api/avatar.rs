//! Avatar session signaling routes
//!
//! Thin proxy between the browser's `RTCPeerConnection` and the avatar
//! vendor. The browser never sees vendor credentials or vendor ids; it
//! holds a local session id minted by the `SessionManager`.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::avatar::{CreatedSession, IceCandidate, SessionDescription, SessionManager};
use crate::Error;

/// Build avatar router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/{id}/answer", post(answer))
        .route("/sessions/{id}/ice", post(ice))
        .route("/sessions/{id}/speak", post(speak))
        .route("/sessions/{id}", axum::routing::delete(close))
        .with_state(state)
}

fn manager(state: &ApiState) -> Result<&SessionManager, AvatarError> {
    state
        .avatar
        .as_deref()
        .ok_or(AvatarError::NotConfigured("avatar not configured (no D-ID API key)"))
}

/// Open a new avatar stream and return the vendor's SDP offer
async fn create_session(
    State(state): State<Arc<ApiState>>,
) -> Result<(StatusCode, Json<CreatedSession>), AvatarError> {
    let session = manager(&state)?.create().await?;
    tracing::info!(session_id = %session.session_id, "avatar session created");
    Ok((StatusCode::CREATED, Json(session)))
}

/// Complete the signaling handshake with the browser's SDP answer
async fn answer(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    Json(description): Json<SessionDescription>,
) -> Result<StatusCode, AvatarError> {
    manager(&state)?.answer(&id, &description.sdp).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Forward a trickle ICE candidate from the browser
async fn ice(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    Json(candidate): Json<IceCandidate>,
) -> Result<StatusCode, AvatarError> {
    manager(&state)?.ice(&id, &candidate).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Speak request body
#[derive(Debug, Deserialize)]
pub struct SpeakRequest {
    pub text: String,
}

/// Push text for the avatar to speak on the established stream
async fn speak(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    Json(request): Json<SpeakRequest>,
) -> Result<StatusCode, AvatarError> {
    if request.text.trim().is_empty() {
        return Err(AvatarError::BadRequest("Empty text"));
    }
    manager(&state)?.speak(&id, &request.text).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Close the session and release the vendor stream
async fn close(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AvatarError> {
    manager(&state)?.close(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Avatar API errors
#[derive(Debug)]
pub enum AvatarError {
    NotConfigured(&'static str),
    BadRequest(&'static str),
    NotFound(String),
    Conflict(String),
    Upstream(String),
    Internal(String),
}

impl From<Error> for AvatarError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound(msg) => Self::NotFound(msg),
            Error::Conflict(msg) => Self::Conflict(msg),
            Error::Avatar(msg) => Self::Upstream(msg),
            Error::Http(e) => Self::Upstream(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AvatarError {
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
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            Self::Upstream(msg) => (StatusCode::BAD_GATEWAY, "avatar_failed", msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };
        (status, Json(body)).into_response()
    }
}
