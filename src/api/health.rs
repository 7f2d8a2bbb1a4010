//! Health check endpoints

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;

use super::ApiState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed readiness response
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub checks: ReadinessChecks,
}

/// Individual readiness checks
#[derive(Serialize)]
pub struct ReadinessChecks {
    pub llm: CheckResult,
    pub transcription: CheckResult,
    pub avatar: CheckResult,
}

/// Result of a single health check
#[derive(Serialize)]
pub struct CheckResult {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckResult {
    const fn ok() -> Self {
        Self {
            status: "ok",
            message: None,
        }
    }

    fn unavailable(message: impl Into<String>) -> Self {
        Self {
            status: "unavailable",
            message: Some(message.into()),
        }
    }
}

/// Liveness probe - is the service running?
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness probe - which features are configured?
///
/// Missing vendor keys degrade features instead of failing startup, so an
/// unconfigured check reports "unavailable" and the probe still answers 200.
async fn ready(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<ReadinessResponse>) {
    let llm_check = check_llm(&state);
    let transcription_check = check_transcription(&state);
    let avatar_check = check_avatar(&state);

    let all_ok = llm_check.status == "ok"
        && transcription_check.status == "ok"
        && avatar_check.status == "ok";

    let status = if all_ok { "ok" } else { "degraded" };

    (
        StatusCode::OK,
        Json(ReadinessResponse {
            status,
            checks: ReadinessChecks {
                llm: llm_check,
                transcription: transcription_check,
                avatar: avatar_check,
            },
        }),
    )
}

/// Check LLM availability
fn check_llm(state: &ApiState) -> CheckResult {
    if state.chat.is_some() {
        CheckResult::ok()
    } else {
        CheckResult::unavailable("no LLM API key configured, keyword detection only")
    }
}

/// Check speech-to-text availability
fn check_transcription(state: &ApiState) -> CheckResult {
    if state.transcriber.is_some() {
        CheckResult::ok()
    } else {
        CheckResult::unavailable("no STT API key configured")
    }
}

/// Check avatar service availability
fn check_avatar(state: &ApiState) -> CheckResult {
    if state.avatar.is_some() {
        CheckResult::ok()
    } else {
        CheckResult::unavailable("no D-ID API key configured")
    }
}

/// Build health router (liveness only, no state needed)
pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

/// Build readiness router
pub fn ready_router(state: Arc<ApiState>) -> Router {
    Router::new().route("/ready", get(ready)).with_state(state)
}
