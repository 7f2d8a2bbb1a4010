//! Shared test utilities

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use teller_gateway::Result;
use teller_gateway::api::{self, ApiState};
use teller_gateway::avatar::{
    AvatarBackend, AvatarStream, IceCandidate, SessionDescription, SessionManager,
};
use teller_gateway::context::ContextRegistry;
use teller_gateway::intent::KeywordIntentDetector;

/// In-memory avatar backend that accepts every call without touching
/// the network.
pub struct FakeAvatarBackend;

#[async_trait]
impl AvatarBackend for FakeAvatarBackend {
    async fn create_stream(&self) -> Result<AvatarStream> {
        Ok(AvatarStream {
            id: "strm-1".to_string(),
            session_id: "vendor-sess-1".to_string(),
            offer: SessionDescription {
                kind: "offer".to_string(),
                sdp: "v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\n".to_string(),
            },
            ice_servers: Vec::new(),
        })
    }

    async fn send_answer(&self, _stream_id: &str, _session_id: &str, _sdp: &str) -> Result<()> {
        Ok(())
    }

    async fn send_ice(
        &self,
        _stream_id: &str,
        _session_id: &str,
        _candidate: &IceCandidate,
    ) -> Result<()> {
        Ok(())
    }

    async fn speak(&self, _stream_id: &str, _session_id: &str, _text: &str) -> Result<()> {
        Ok(())
    }

    async fn close(&self, _stream_id: &str, _session_id: &str) -> Result<()> {
        Ok(())
    }
}

/// Build an `ApiState` with keyword intent detection and no vendor
/// clients, matching an unconfigured deployment.
#[must_use]
pub fn test_state() -> Arc<ApiState> {
    let contexts = Arc::new(ContextRegistry::builtin().expect("builtin contexts"));
    let detector = Arc::new(KeywordIntentDetector::new(&contexts));
    Arc::new(ApiState {
        contexts,
        detector,
        chat: None,
        transcriber: None,
        avatar: None,
        rate_limiter: None,
    })
}

/// Build an `ApiState` whose avatar sessions run against [`FakeAvatarBackend`].
#[must_use]
pub fn test_state_with_avatar() -> Arc<ApiState> {
    let contexts = Arc::new(ContextRegistry::builtin().expect("builtin contexts"));
    let detector = Arc::new(KeywordIntentDetector::new(&contexts));
    let manager = SessionManager::new(Arc::new(FakeAvatarBackend));
    Arc::new(ApiState {
        contexts,
        detector,
        chat: None,
        transcriber: None,
        avatar: Some(Arc::new(manager)),
        rate_limiter: None,
    })
}

/// Assemble the HTTP routes under test the way the server does.
#[must_use]
pub fn build_test_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .nest("/api", api::intent::router(state.clone()))
        .nest("/api", api::chat::router(state.clone()))
        .nest("/api/voice", api::voice::router(state.clone()))
        .nest("/api/avatar", api::avatar::router(state.clone()))
        .merge(api::health::router())
        .merge(api::health::ready_router(state))
}
