//! Avatar session orchestration
//!
//! The browser owns the peer connection and the video element; the
//! gateway owns the vendor credentials and the signaling. Sessions are
//! keyed by a local UUID so vendor identifiers never reach the client.

mod client;
mod reconnect;

pub use client::{
    AvatarBackend, AvatarClient, AvatarStream, IceCandidate, IceServer, SessionDescription,
};
pub use reconnect::ReconnectPolicy;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};

const DEFAULT_MAX_SESSIONS: usize = 8;
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Lifecycle of a proxied avatar session
///
/// Exactly one answer is accepted per session; speaking requires the
/// answer to have been exchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Stream created, offer delivered, waiting for the browser's answer
    AwaitingAnswer,
    /// Signaling complete, scripts may be pushed
    Ready,
    /// Being torn down
    Closed,
}

struct SessionEntry {
    stream_id: String,
    vendor_session_id: String,
    state: SessionState,
    last_activity: Instant,
}

/// Response to a session creation request, camelCase for the browser
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSession {
    /// Gateway-local session id used on all follow-up routes
    pub session_id: String,
    /// SDP offer for `RTCPeerConnection::setRemoteDescription`
    pub offer: SessionDescription,
    /// ICE servers for the `RTCPeerConnection` constructor
    pub ice_servers: Vec<IceServer>,
}

/// Registry of live avatar sessions over one vendor backend
pub struct SessionManager {
    backend: Arc<dyn AvatarBackend>,
    sessions: RwLock<HashMap<String, SessionEntry>>,
    max_sessions: usize,
    idle_timeout: Duration,
}

impl SessionManager {
    /// Create a manager with default limits
    #[must_use]
    pub fn new(backend: Arc<dyn AvatarBackend>) -> Self {
        Self {
            backend,
            sessions: RwLock::new(HashMap::new()),
            max_sessions: DEFAULT_MAX_SESSIONS,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Override the concurrent session cap
    #[must_use]
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    /// Override the idle timeout used by [`Self::sweep_idle`]
    #[must_use]
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Create a vendor stream and register a session for it
    ///
    /// # Errors
    ///
    /// Returns `Conflict` at the session cap, or the vendor error after
    /// reconnect attempts are exhausted
    pub async fn create(&self) -> Result<CreatedSession> {
        {
            let sessions = self.sessions.read().await;
            if sessions.len() >= self.max_sessions {
                return Err(Error::Conflict(format!(
                    "session limit of {} reached",
                    self.max_sessions
                )));
            }
        }

        let stream = self.backend.create_stream().await?;
        let session_id = Uuid::new_v4().to_string();

        let mut sessions = self.sessions.write().await;
        sessions.insert(
            session_id.clone(),
            SessionEntry {
                stream_id: stream.id,
                vendor_session_id: stream.session_id,
                state: SessionState::AwaitingAnswer,
                last_activity: Instant::now(),
            },
        );
        tracing::info!(session_id = %session_id, active = sessions.len(), "avatar session created");

        Ok(CreatedSession {
            session_id,
            offer: stream.offer,
            ice_servers: stream.ice_servers,
        })
    }

    /// Accept the browser's SDP answer, completing signaling
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown sessions and `Conflict` when the
    /// session was already answered or closed
    pub async fn answer(&self, session_id: &str, sdp: &str) -> Result<()> {
        let (stream_id, vendor_session_id) = {
            let mut sessions = self.sessions.write().await;
            let entry = sessions
                .get_mut(session_id)
                .ok_or_else(|| Error::NotFound(format!("avatar session {session_id}")))?;
            match entry.state {
                SessionState::AwaitingAnswer => {
                    // reserve the one allowed answer before awaiting the vendor
                    entry.state = SessionState::Ready;
                    (entry.stream_id.clone(), entry.vendor_session_id.clone())
                }
                SessionState::Ready => {
                    return Err(Error::Conflict("session already answered".to_string()));
                }
                SessionState::Closed => {
                    return Err(Error::Conflict("session is closed".to_string()));
                }
            }
        };

        match self
            .backend
            .send_answer(&stream_id, &vendor_session_id, sdp)
            .await
        {
            Ok(()) => {
                self.touch(session_id).await;
                tracing::debug!(session_id, "avatar session ready");
                Ok(())
            }
            Err(e) => {
                let mut sessions = self.sessions.write().await;
                if let Some(entry) = sessions.get_mut(session_id) {
                    entry.state = SessionState::AwaitingAnswer;
                }
                Err(e)
            }
        }
    }

    /// Forward one ICE candidate from the browser
    ///
    /// Candidates are accepted while awaiting the answer and after it;
    /// the browser trickles them throughout signaling.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown sessions and `Conflict` for
    /// closed ones
    pub async fn ice(&self, session_id: &str, candidate: &IceCandidate) -> Result<()> {
        let (stream_id, vendor_session_id) = self.entry_ids(session_id, false).await?;
        self.backend
            .send_ice(&stream_id, &vendor_session_id, candidate)
            .await?;
        self.touch(session_id).await;
        Ok(())
    }

    /// Push text the avatar speaks as rendered video
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown sessions and `Conflict` unless the
    /// session is ready
    pub async fn speak(&self, session_id: &str, text: &str) -> Result<()> {
        let (stream_id, vendor_session_id) = self.entry_ids(session_id, true).await?;
        self.backend
            .speak(&stream_id, &vendor_session_id, text)
            .await?;
        self.touch(session_id).await;
        Ok(())
    }

    /// Close a session and delete the vendor stream
    ///
    /// Closing an unknown or already-closed session is a no-op, so the
    /// client can retry deletes freely.
    ///
    /// # Errors
    ///
    /// Currently infallible; kept fallible for interface stability
    pub async fn close(&self, session_id: &str) -> Result<()> {
        let ids = {
            let mut sessions = self.sessions.write().await;
            match sessions.get_mut(session_id) {
                None => return Ok(()),
                Some(entry) if entry.state == SessionState::Closed => return Ok(()),
                Some(entry) => {
                    entry.state = SessionState::Closed;
                    (entry.stream_id.clone(), entry.vendor_session_id.clone())
                }
            }
        };

        if let Err(e) = self.backend.close(&ids.0, &ids.1).await {
            tracing::warn!(session_id, error = %e, "vendor stream close failed");
        }

        self.sessions.write().await.remove(session_id);
        tracing::info!(session_id, "avatar session closed");
        Ok(())
    }

    /// Close sessions idle past the timeout, returning how many were closed
    pub async fn sweep_idle(&self) -> usize {
        let expired: Vec<String> = {
            let sessions = self.sessions.read().await;
            sessions
                .iter()
                .filter(|(_, entry)| {
                    entry.state != SessionState::Closed
                        && entry.last_activity.elapsed() > self.idle_timeout
                })
                .map(|(id, _)| id.clone())
                .collect()
        };

        for session_id in &expired {
            tracing::debug!(session_id = %session_id, "closing idle avatar session");
            if let Err(e) = self.close(session_id).await {
                tracing::warn!(session_id = %session_id, error = %e, "idle close failed");
            }
        }
        expired.len()
    }

    /// Number of live sessions
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Current state of a session, `None` when unknown
    pub async fn state_of(&self, session_id: &str) -> Option<SessionState> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|entry| entry.state)
    }

    async fn entry_ids(&self, session_id: &str, require_ready: bool) -> Result<(String, String)> {
        let sessions = self.sessions.read().await;
        let entry = sessions
            .get(session_id)
            .ok_or_else(|| Error::NotFound(format!("avatar session {session_id}")))?;
        match entry.state {
            SessionState::Closed => Err(Error::Conflict("session is closed".to_string())),
            SessionState::AwaitingAnswer if require_ready => {
                Err(Error::Conflict("session is not ready".to_string()))
            }
            _ => Ok((entry.stream_id.clone(), entry.vendor_session_id.clone())),
        }
    }

    async fn touch(&self, session_id: &str) {
        if let Some(entry) = self.sessions.write().await.get_mut(session_id) {
            entry.last_activity = Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct MockBackend {
        calls: Mutex<Vec<String>>,
        fail_create: bool,
    }

    impl MockBackend {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_create: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_create: true,
            }
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl AvatarBackend for MockBackend {
        async fn create_stream(&self) -> Result<AvatarStream> {
            self.record("create");
            if self.fail_create {
                return Err(Error::Avatar("vendor unavailable".to_string()));
            }
            Ok(AvatarStream {
                id: "strm_1".to_string(),
                session_id: "vendor_sess".to_string(),
                offer: SessionDescription {
                    kind: "offer".to_string(),
                    sdp: "v=0".to_string(),
                },
                ice_servers: Vec::new(),
            })
        }

        async fn send_answer(&self, stream_id: &str, _: &str, _: &str) -> Result<()> {
            self.record(format!("answer:{stream_id}"));
            Ok(())
        }

        async fn send_ice(&self, stream_id: &str, _: &str, _: &IceCandidate) -> Result<()> {
            self.record(format!("ice:{stream_id}"));
            Ok(())
        }

        async fn speak(&self, stream_id: &str, _: &str, text: &str) -> Result<()> {
            self.record(format!("speak:{stream_id}:{text}"));
            Ok(())
        }

        async fn close(&self, stream_id: &str, _: &str) -> Result<()> {
            self.record(format!("close:{stream_id}"));
            Ok(())
        }
    }

    fn manager_with(backend: MockBackend) -> SessionManager {
        SessionManager::new(Arc::new(backend))
    }

    #[tokio::test]
    async fn create_registers_awaiting_session() {
        let manager = manager_with(MockBackend::new());
        let created = manager.create().await.unwrap();

        assert_eq!(created.offer.kind, "offer");
        assert_eq!(manager.count().await, 1);
        assert_eq!(
            manager.state_of(&created.session_id).await,
            Some(SessionState::AwaitingAnswer)
        );
    }

    #[tokio::test]
    async fn answer_transitions_to_ready_exactly_once() {
        let manager = manager_with(MockBackend::new());
        let created = manager.create().await.unwrap();

        manager.answer(&created.session_id, "v=0").await.unwrap();
        assert_eq!(
            manager.state_of(&created.session_id).await,
            Some(SessionState::Ready)
        );

        let second = manager.answer(&created.session_id, "v=0").await;
        assert!(matches!(second, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn speak_requires_ready_session() {
        let manager = manager_with(MockBackend::new());
        let created = manager.create().await.unwrap();

        let early = manager.speak(&created.session_id, "hola").await;
        assert!(matches!(early, Err(Error::Conflict(_))));

        manager.answer(&created.session_id, "v=0").await.unwrap();
        manager.speak(&created.session_id, "hola").await.unwrap();
    }

    #[tokio::test]
    async fn ice_is_accepted_before_answer() {
        let manager = manager_with(MockBackend::new());
        let created = manager.create().await.unwrap();

        let candidate = IceCandidate {
            candidate: "candidate:1".to_string(),
            sdp_mid: Some("0".to_string()),
            sdp_m_line_index: Some(0),
        };
        manager.ice(&created.session_id, &candidate).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let manager = manager_with(MockBackend::new());
        assert!(matches!(
            manager.answer("nope", "v=0").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            manager.speak("nope", "hola").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_removes() {
        let manager = manager_with(MockBackend::new());
        let created = manager.create().await.unwrap();

        manager.close(&created.session_id).await.unwrap();
        assert_eq!(manager.count().await, 0);
        // second close and unknown close are both no-ops
        manager.close(&created.session_id).await.unwrap();
        manager.close("never-existed").await.unwrap();
    }

    #[tokio::test]
    async fn session_cap_rejects_creation() {
        let manager = manager_with(MockBackend::new()).with_max_sessions(1);
        manager.create().await.unwrap();

        let second = manager.create().await;
        assert!(matches!(second, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn create_failure_surfaces() {
        let manager = manager_with(MockBackend::failing());
        assert!(manager.create().await.is_err());
        assert_eq!(manager.count().await, 0);
    }

    #[tokio::test]
    async fn sweep_closes_idle_sessions() {
        let backend = MockBackend::new();
        let manager = SessionManager::new(Arc::new(backend)).with_idle_timeout(Duration::ZERO);
        let created = manager.create().await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        let closed = manager.sweep_idle().await;
        assert_eq!(closed, 1);
        assert_eq!(manager.count().await, 0);
        assert_eq!(manager.state_of(&created.session_id).await, None);
    }

    #[tokio::test]
    async fn speak_reaches_backend_with_text() {
        let backend = Arc::new(MockBackend::new());
        let manager = SessionManager::new(Arc::clone(&backend) as Arc<dyn AvatarBackend>);
        let created = manager.create().await.unwrap();
        manager.answer(&created.session_id, "v=0").await.unwrap();
        manager.speak(&created.session_id, "buenos días").await.unwrap();

        let calls = backend.calls();
        assert!(calls.contains(&"speak:strm_1:buenos días".to_string()));
    }
}
