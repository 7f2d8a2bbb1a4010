//! WebSocket handler for the assistant pipeline
//!
//! One socket carries a whole conversation: the browser sends finished
//! utterances (text or recorded audio) and receives transcription, intent,
//! navigation and reply events as the pipeline progresses. Utterances are
//! processed sequentially, so at most one LLM request is in flight per
//! utterance.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::ApiState;
use crate::context::ConversationContext;
use crate::intent::IntentResult;
use crate::llm::ChatMessage;

/// Incoming WebSocket message from the browser
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsIncoming {
    /// A finished utterance, already text (typed or transcribed client-side)
    Utterance {
        text: String,
        #[serde(default)]
        context_id: Option<String>,
        /// Avatar session that should speak the reply
        #[serde(default)]
        avatar_session_id: Option<String>,
    },
    /// A recorded utterance as base64 audio, transcribed server-side
    Audio {
        data: String,
        /// Container type, `audio/webm` when absent
        #[serde(default)]
        media_type: Option<String>,
        #[serde(default)]
        context_id: Option<String>,
        #[serde(default)]
        avatar_session_id: Option<String>,
    },
    /// Ping to keep the connection alive
    Ping,
}

/// Outgoing WebSocket message to the browser
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsOutgoing {
    /// Connection established
    Connected { session_id: String },
    /// Server-side transcription of an audio utterance
    Transcript { text: String },
    /// Full intent detection result
    Intent { result: IntentResult },
    /// The client should navigate to this page
    Navigate { target_page: String, confidence: f32 },
    /// Assistant reply text
    Reply { text: String },
    /// Error occurred
    Error { code: String, message: String },
    /// Pong response
    Pong,
}

/// Build WebSocket router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/assistant", get(ws_upgrade))
        .with_state(state)
}

/// Handle WebSocket upgrade request
async fn ws_upgrade(State(state): State<Arc<ApiState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<ApiState>) {
    let (mut sender, mut receiver) = socket.split();
    let session_id = uuid::Uuid::new_v4().to_string();

    // Send connected message
    let connected = WsOutgoing::Connected {
        session_id: session_id.clone(),
    };
    if let Ok(msg) = serde_json::to_string(&connected) {
        if sender.send(Message::Text(msg.into())).await.is_err() {
            return;
        }
    }

    tracing::info!(session_id = %session_id, "assistant socket connected");

    // Channel for pipeline events back to the client
    let (tx, mut rx) = mpsc::channel::<WsOutgoing>(32);

    // Forward events from the channel to the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(text) = serde_json::to_string(&msg) {
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    let session_id_clone = session_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if let Err(e) = handle_message(&text, &state, &tx).await {
                        let error = WsOutgoing::Error {
                            code: "internal_error".to_string(),
                            message: e.to_string(),
                        };
                        let _ = tx.send(error).await;
                    }
                }
                Message::Ping(data) => {
                    // axum answers pongs itself
                    tracing::trace!(len = data.len(), "received ping");
                }
                Message::Close(_) => {
                    tracing::info!(session_id = %session_id_clone, "socket closed by client");
                    break;
                }
                _ => {}
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    tracing::info!(session_id = %session_id, "assistant socket disconnected");
}

/// Handle a single incoming message
async fn handle_message(
    text: &str,
    state: &Arc<ApiState>,
    tx: &mpsc::Sender<WsOutgoing>,
) -> crate::Result<()> {
    let incoming: WsIncoming = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            send_error(tx, "bad_message", &format!("unrecognized message: {e}")).await?;
            return Ok(());
        }
    };

    match incoming {
        WsIncoming::Ping => {
            tx.send(WsOutgoing::Pong)
                .await
                .map_err(|_| crate::Error::Config("channel closed".to_string()))?;
        }
        WsIncoming::Utterance {
            text,
            context_id,
            avatar_session_id,
        } => {
            run_pipeline(
                &text,
                context_id.as_deref(),
                avatar_session_id.as_deref(),
                state,
                tx,
            )
            .await?;
        }
        WsIncoming::Audio {
            data,
            media_type,
            context_id,
            avatar_session_id,
        } => {
            let Some(text) = transcribe_audio(&data, media_type.as_deref(), state, tx).await?
            else {
                return Ok(());
            };
            tx.send(WsOutgoing::Transcript { text: text.clone() })
                .await
                .map_err(|_| crate::Error::Config("channel closed".to_string()))?;
            run_pipeline(
                &text,
                context_id.as_deref(),
                avatar_session_id.as_deref(),
                state,
                tx,
            )
            .await?;
        }
    }

    Ok(())
}

/// Decode and transcribe an audio frame
///
/// Returns `None` when the pipeline should stop; the failure has already
/// been reported to the client as an error event.
async fn transcribe_audio(
    data: &str,
    media_type: Option<&str>,
    state: &Arc<ApiState>,
    tx: &mpsc::Sender<WsOutgoing>,
) -> crate::Result<Option<String>> {
    let Some(transcriber) = state.transcriber.as_ref() else {
        send_error(tx, "not_configured", "transcription not configured (no STT API key)").await?;
        return Ok(None);
    };

    let Ok(audio) = BASE64.decode(data) else {
        send_error(tx, "bad_message", "audio data is not valid base64").await?;
        return Ok(None);
    };

    if audio.is_empty() {
        send_error(tx, "bad_message", "empty audio data").await?;
        return Ok(None);
    }

    let media_type = media_type.unwrap_or("audio/webm");
    match transcriber.transcribe(&audio, media_type).await {
        Ok(text) => Ok(Some(text)),
        Err(e) => {
            tracing::warn!(error = %e, "transcription failed");
            send_error(tx, "transcription_failed", &e.to_string()).await?;
            Ok(None)
        }
    }
}

/// Run the utterance pipeline: intent, then navigation or a chat reply,
/// then avatar speech
///
/// Navigation intents get a templated confirmation instead of a second
/// completion, so each utterance costs at most one LLM request.
async fn run_pipeline(
    text: &str,
    context_id: Option<&str>,
    avatar_session_id: Option<&str>,
    state: &Arc<ApiState>,
    tx: &mpsc::Sender<WsOutgoing>,
) -> crate::Result<()> {
    let context = state.contexts.resolve(context_id);
    let result = state.detector.detect(text, context).await;

    tracing::debug!(
        context = %context.id,
        has_intent = result.has_navigation_intent,
        target = ?result.target_page,
        "utterance classified"
    );

    tx.send(WsOutgoing::Intent {
        result: result.clone(),
    })
    .await
    .map_err(|_| crate::Error::Config("channel closed".to_string()))?;

    let reply = if result.has_navigation_intent {
        let target = result
            .target_page
            .clone()
            .unwrap_or_else(|| crate::context::FALLBACK_PAGE.to_string());
        tx.send(WsOutgoing::Navigate {
            target_page: target,
            confidence: result.confidence,
        })
        .await
        .map_err(|_| crate::Error::Config("channel closed".to_string()))?;
        Some(confirmation_reply())
    } else {
        chat_reply(text, context, state, tx).await?
    };

    let Some(reply) = reply else {
        return Ok(());
    };

    tx.send(WsOutgoing::Reply {
        text: reply.clone(),
    })
    .await
    .map_err(|_| crate::Error::Config("channel closed".to_string()))?;

    if let Some(avatar_id) = avatar_session_id {
        speak_via_avatar(avatar_id, &reply, state, tx).await?;
    }

    Ok(())
}

/// Spoken confirmation for navigation intents
///
/// Templated rather than generated: the navigate event already tells the
/// client where it is going, the avatar only needs a short acknowledgment.
fn confirmation_reply() -> String {
    "Claro, te llevo allí ahora.".to_string()
}

/// One completion round-trip for a non-navigation utterance
async fn chat_reply(
    text: &str,
    context: &ConversationContext,
    state: &Arc<ApiState>,
    tx: &mpsc::Sender<WsOutgoing>,
) -> crate::Result<Option<String>> {
    let Some(client) = state.chat.as_ref() else {
        tracing::debug!("no LLM configured, skipping reply");
        return Ok(None);
    };

    let messages = [
        ChatMessage::system(super::chat::reply_system_prompt(context)),
        ChatMessage::user(text),
    ];

    match client.chat(&messages).await {
        Ok(reply) => Ok(Some(reply)),
        Err(e) => {
            tracing::warn!(error = %e, "chat completion failed");
            send_error(tx, "completion_failed", "the assistant could not answer right now").await?;
            Ok(None)
        }
    }
}

/// Push the reply to an avatar session, best-effort
///
/// A failed speak is reported as an error event but never aborts the
/// pipeline; the client already has the reply text.
async fn speak_via_avatar(
    avatar_id: &str,
    reply: &str,
    state: &Arc<ApiState>,
    tx: &mpsc::Sender<WsOutgoing>,
) -> crate::Result<()> {
    let Some(manager) = state.avatar.as_ref() else {
        send_error(tx, "not_configured", "avatar not configured (no D-ID API key)").await?;
        return Ok(());
    };

    if let Err(e) = manager.speak(avatar_id, reply).await {
        tracing::warn!(error = %e, session_id = %avatar_id, "avatar speak failed");
        send_error(tx, "avatar_failed", &e.to_string()).await?;
    }

    Ok(())
}

async fn send_error(tx: &mpsc::Sender<WsOutgoing>, code: &str, message: &str) -> crate::Result<()> {
    tx.send(WsOutgoing::Error {
        code: code.to_string(),
        message: message.to_string(),
    })
    .await
    .map_err(|_| crate::Error::Config("channel closed".to_string()))
}
