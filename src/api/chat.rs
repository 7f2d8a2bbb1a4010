//! Chat completion proxy

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::context::ConversationContext;
use crate::llm::ChatMessage;

/// Build chat router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new().route("/chat", post(chat)).with_state(state)
}

/// Chat request from the front-end
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub text: String,
    #[serde(default)]
    pub context_id: Option<String>,
}

/// Chat response
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

/// System prompt for assistant replies, scoped to the active context
pub(super) fn reply_system_prompt(context: &ConversationContext) -> String {
    format!(
        "You are the voice assistant of a demo retail bank. Current section: \
         {}. Answer in the language the customer used, in one or two short \
         sentences suitable for being read aloud. Stay on banking topics; for \
         anything else, politely steer back to the bank.",
        context.description
    )
}

/// Forward an utterance to the LLM and return its reply
async fn chat(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ChatError> {
    let client = state
        .chat
        .as_ref()
        .ok_or(ChatError::NotConfigured("chat not configured (no LLM API key)"))?;

    if request.text.trim().is_empty() {
        return Err(ChatError::BadRequest("Empty text"));
    }

    let context = state.contexts.resolve(request.context_id.as_deref());
    let messages = [
        ChatMessage::system(reply_system_prompt(context)),
        ChatMessage::user(request.text),
    ];

    let reply = client
        .chat(&messages)
        .await
        .map_err(|e| ChatError::CompletionFailed(e.to_string()))?;

    Ok(Json(ChatResponse { reply }))
}

/// Chat API errors
#[derive(Debug)]
pub enum ChatError {
    NotConfigured(&'static str),
    BadRequest(&'static str),
    CompletionFailed(String),
}

impl IntoResponse for ChatError {
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
            Self::CompletionFailed(msg) => (StatusCode::BAD_GATEWAY, "completion_failed", msg),
        };

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_accepts_camel_case_context_id() {
        let json = r#"{"text":"hola","contextId":"investments"}"#;
        let request: ChatRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.context_id.as_deref(), Some("investments"));
    }

    #[test]
    fn request_context_id_is_optional() {
        let request: ChatRequest = serde_json::from_str(r#"{"text":"hola"}"#).unwrap();
        assert!(request.context_id.is_none());
    }

    #[test]
    fn reply_prompt_embeds_context_description() {
        let context = ConversationContext {
            id: "general".to_string(),
            name: "Banca general".to_string(),
            description: "todo el banco demo".to_string(),
            navigation_commands: Vec::new(),
        };
        let prompt = reply_system_prompt(&context);
        assert!(prompt.contains("todo el banco demo"));
    }
}
