//! HTTP API server for the teller gateway

pub mod avatar;
pub mod chat;
pub mod health;
pub mod intent;
pub mod rate_limit;
pub mod voice;
pub mod websocket;

pub use websocket::{WsIncoming, WsOutgoing};

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::avatar::SessionManager;
use crate::context::ContextRegistry;
use crate::intent::IntentDetector;
use crate::llm::ChatClient;
use crate::voice::Transcriber;

/// Shared state for API handlers
///
/// The optional clients mirror which vendor keys were configured: a
/// missing client turns its feature off (503 from the affected routes)
/// without touching the rest of the gateway.
#[derive(Clone)]
pub struct ApiState {
    pub contexts: Arc<ContextRegistry>,
    pub detector: Arc<dyn IntentDetector>,
    pub chat: Option<Arc<ChatClient>>,
    pub transcriber: Option<Arc<Transcriber>>,
    pub avatar: Option<Arc<SessionManager>>,
    pub rate_limiter: Option<rate_limit::SharedLimiter>,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    contexts: Arc<ContextRegistry>,
    detector: Arc<dyn IntentDetector>,
    port: u16,
    chat: Option<Arc<ChatClient>>,
    transcriber: Option<Arc<Transcriber>>,
    avatar: Option<Arc<SessionManager>>,
    static_dir: Option<PathBuf>,
    rate_limit_per_minute: Option<u32>,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(
        contexts: Arc<ContextRegistry>,
        detector: Arc<dyn IntentDetector>,
        port: u16,
    ) -> Self {
        Self {
            contexts,
            detector,
            port,
            chat: None,
            transcriber: None,
            avatar: None,
            static_dir: None,
            rate_limit_per_minute: None,
        }
    }

    /// Set the chat client for assistant replies
    #[must_use]
    pub fn chat(mut self, client: Arc<ChatClient>) -> Self {
        self.chat = Some(client);
        self
    }

    /// Set the transcriber for server-side speech-to-text
    #[must_use]
    pub fn transcriber(mut self, transcriber: Arc<Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    /// Set the avatar session manager
    #[must_use]
    pub fn avatar(mut self, manager: Arc<SessionManager>) -> Self {
        self.avatar = Some(manager);
        self
    }

    /// Serve the front-end build from this directory
    #[must_use]
    pub fn static_dir(mut self, dir: PathBuf) -> Self {
        self.static_dir = Some(dir);
        self
    }

    /// Throttle all requests globally to this many per minute
    #[must_use]
    pub fn rate_limit(mut self, requests_per_minute: u32) -> Self {
        self.rate_limit_per_minute = Some(requests_per_minute);
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let rate_limiter = self.rate_limit_per_minute.map(rate_limit::create_limiter);

        let state = Arc::new(ApiState {
            contexts: self.contexts,
            detector: self.detector,
            chat: self.chat,
            transcriber: self.transcriber,
            avatar: self.avatar,
            rate_limiter,
        });

        ApiServer {
            state,
            port: self.port,
            static_dir: self.static_dir,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServer {
    /// Build the router with all routes
    fn router(&self) -> Router {
        let mut router = Router::new()
            .nest("/api", intent::router(self.state.clone()))
            .nest("/api", chat::router(self.state.clone()))
            .nest("/api/voice", voice::router(self.state.clone()))
            .nest("/api/avatar", avatar::router(self.state.clone()))
            .nest("/ws", websocket::router(self.state.clone()))
            .merge(health::router())
            .merge(health::ready_router(self.state.clone()));

        // Serve the front-end build if configured
        if let Some(static_dir) = &self.static_dir {
            let index_file = static_dir.join("index.html");
            let serve_dir =
                ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_file));

            router = router.fallback_service(serve_dir);
            tracing::info!(path = %static_dir.display(), "serving static files");
        }

        let router = router.layer(axum::middleware::from_fn_with_state(
            self.state.clone(),
            rate_limit::rate_limit_middleware,
        ));

        // CORS layer for cross-origin requests from the front-end dev server
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if the server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "gateway listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::KeywordIntentDetector;

    #[test]
    fn builder_defaults_leave_features_off() {
        let contexts = Arc::new(ContextRegistry::builtin().unwrap());
        let detector = Arc::new(KeywordIntentDetector::new(&contexts));
        let server = ApiServerBuilder::new(contexts, detector, 0).build();

        assert!(server.state.chat.is_none());
        assert!(server.state.transcriber.is_none());
        assert!(server.state.avatar.is_none());
        assert!(server.state.rate_limiter.is_none());
        assert!(server.static_dir.is_none());
    }

    #[test]
    fn rate_limit_setter_builds_limiter() {
        let contexts = Arc::new(ContextRegistry::builtin().unwrap());
        let detector = Arc::new(KeywordIntentDetector::new(&contexts));
        let server = ApiServerBuilder::new(contexts, detector, 0)
            .rate_limit(60)
            .build();

        assert!(server.state.rate_limiter.is_some());
    }
}
