//! Intent detection endpoint

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use super::ApiState;
use crate::intent::{IntentRequest, IntentResult};

/// Build intent router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/intent", post(detect))
        .route("/contexts", get(list_contexts))
        .with_state(state)
}

/// Detect navigation intent in an utterance
///
/// Always answers 200 with a well-formed `IntentResult`. Upstream failures
/// collapse into the no-intent default inside the detector, so the
/// front-end never branches on transport errors.
async fn detect(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<IntentRequest>,
) -> Json<IntentResult> {
    let context = state.contexts.resolve(request.context_id.as_deref());
    let result = state.detector.detect(&request.text, context).await;

    tracing::debug!(
        context = %context.id,
        has_intent = result.has_navigation_intent,
        target = ?result.target_page,
        confidence = result.confidence,
        "intent detection complete"
    );

    Json(result)
}

/// Context summary for the front-end
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub pages: Vec<String>,
}

/// List the registered conversation contexts
async fn list_contexts(State(state): State<Arc<ApiState>>) -> Json<Vec<ContextSummary>> {
    let summaries = state
        .contexts
        .list()
        .into_iter()
        .map(|context| ContextSummary {
            id: context.id.clone(),
            name: context.name.clone(),
            description: context.description.clone(),
            pages: context.pages().into_iter().map(String::from).collect(),
        })
        .collect();

    Json(summaries)
}
