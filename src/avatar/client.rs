//! Avatar vendor HTTP client
//!
//! Talks to a D-ID style streaming API: create a stream and receive an
//! SDP offer, forward the browser's answer and ICE candidates, push text
//! scripts, delete the stream. The gateway holds the credentials; the
//! browser only ever sees the signaling payloads.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::ReconnectPolicy;
use crate::error::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://api.d-id.com";

/// An SDP description as exchanged with the browser and the vendor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDescription {
    /// `offer` or `answer`
    #[serde(rename = "type")]
    pub kind: String,
    /// The SDP payload
    pub sdp: String,
}

/// One ICE server entry forwarded verbatim to the browser
///
/// `urls` may be a single string or an array of strings depending on the
/// vendor, so it stays a raw JSON value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

/// A trickle ICE candidate from the browser, WebRTC JSON shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u32>,
}

/// A freshly created vendor stream
#[derive(Debug, Clone, Deserialize)]
pub struct AvatarStream {
    /// Vendor stream id
    pub id: String,
    /// Vendor session token, echoed on every follow-up call
    pub session_id: String,
    /// SDP offer for the browser's peer connection
    pub offer: SessionDescription,
    /// ICE servers for the browser's peer connection
    #[serde(default)]
    pub ice_servers: Vec<IceServer>,
}

/// Vendor operations behind the session manager
///
/// The HTTP client implements this; tests substitute an in-memory fake.
#[async_trait]
pub trait AvatarBackend: Send + Sync {
    /// Create a stream, retrying per the reconnect policy
    async fn create_stream(&self) -> Result<AvatarStream>;
    /// Forward the browser's SDP answer
    async fn send_answer(&self, stream_id: &str, session_id: &str, sdp: &str) -> Result<()>;
    /// Forward one ICE candidate
    async fn send_ice(
        &self,
        stream_id: &str,
        session_id: &str,
        candidate: &IceCandidate,
    ) -> Result<()>;
    /// Push a text script the avatar speaks
    async fn speak(&self, stream_id: &str, session_id: &str, text: &str) -> Result<()>;
    /// Delete the stream
    async fn close(&self, stream_id: &str, session_id: &str) -> Result<()>;
}

/// HTTP implementation of [`AvatarBackend`]
pub struct AvatarClient {
    client: reqwest::Client,
    auth_header: String,
    base_url: String,
    source_url: String,
    reconnect: ReconnectPolicy,
}

impl AvatarClient {
    /// Create a client
    ///
    /// `api_key` is the vendor's `user:password` credential pair and is
    /// sent Basic-encoded.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn new(api_key: &str, source_url: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "avatar API key required for streaming".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            auth_header: format!("Basic {}", BASE64.encode(api_key)),
            base_url: DEFAULT_BASE_URL.to_string(),
            source_url,
            reconnect: ReconnectPolicy::default(),
        })
    }

    /// Override the vendor base URL, e.g. for a test server
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the reconnect policy
    #[must_use]
    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    async fn try_create_stream(&self) -> Result<AvatarStream> {
        let response = self
            .client
            .post(self.url("/talks/streams"))
            .header("Authorization", &self.auth_header)
            .json(&json!({ "source_url": self.source_url }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "avatar stream creation failed");
            return Err(Error::Avatar(format!("stream creation failed with {status}")));
        }

        let stream: AvatarStream = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse stream creation response");
            e
        })?;

        if stream.offer.sdp.trim().is_empty() {
            return Err(Error::Avatar("stream offer carried no SDP".to_string()));
        }

        Ok(stream)
    }

    async fn post_op(&self, path: &str, body: serde_json::Value, op: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url(path))
            .header("Authorization", &self.auth_header)
            .json(&body)
            .send()
            .await?;
        Self::expect_success(response, op).await
    }

    async fn expect_success(response: reqwest::Response, op: &str) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        tracing::error!(status = %status, body = %body, op, "avatar API error");
        Err(Error::Avatar(format!("{op} failed with {status}")))
    }
}

#[async_trait]
impl AvatarBackend for AvatarClient {
    async fn create_stream(&self) -> Result<AvatarStream> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.try_create_stream().await {
                Ok(stream) => {
                    tracing::info!(stream_id = %stream.id, attempts, "avatar stream created");
                    return Ok(stream);
                }
                Err(e) if self.reconnect.should_retry(attempts) => {
                    tracing::warn!(
                        error = %e,
                        attempt = attempts,
                        max_attempts = self.reconnect.max_attempts,
                        "avatar stream creation failed, retrying"
                    );
                    tokio::time::sleep(self.reconnect.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_answer(&self, stream_id: &str, session_id: &str, sdp: &str) -> Result<()> {
        tracing::debug!(stream_id, "forwarding SDP answer");
        self.post_op(
            &format!("/talks/streams/{stream_id}/sdp"),
            json!({
                "answer": { "type": "answer", "sdp": sdp },
                "session_id": session_id,
            }),
            "answer",
        )
        .await
    }

    async fn send_ice(
        &self,
        stream_id: &str,
        session_id: &str,
        candidate: &IceCandidate,
    ) -> Result<()> {
        tracing::trace!(stream_id, "forwarding ICE candidate");
        self.post_op(
            &format!("/talks/streams/{stream_id}/ice"),
            json!({
                "candidate": candidate.candidate,
                "sdpMid": candidate.sdp_mid,
                "sdpMLineIndex": candidate.sdp_m_line_index,
                "session_id": session_id,
            }),
            "ice",
        )
        .await
    }

    async fn speak(&self, stream_id: &str, session_id: &str, text: &str) -> Result<()> {
        tracing::debug!(stream_id, chars = text.len(), "sending avatar script");
        self.post_op(
            &format!("/talks/streams/{stream_id}"),
            json!({
                "script": { "type": "text", "input": text },
                "session_id": session_id,
            }),
            "speak",
        )
        .await
    }

    async fn close(&self, stream_id: &str, session_id: &str) -> Result<()> {
        tracing::debug!(stream_id, "closing avatar stream");
        let response = self
            .client
            .delete(self.url(&format!("/talks/streams/{stream_id}")))
            .header("Authorization", &self.auth_header)
            .json(&json!({ "session_id": session_id }))
            .send()
            .await?;
        Self::expect_success(response, "close").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_api_key() {
        assert!(AvatarClient::new("", "https://example.com/face.png".into()).is_err());
    }

    #[test]
    fn auth_header_is_basic_encoded() {
        let client =
            AvatarClient::new("user:secret", "https://example.com/face.png".into()).unwrap();
        assert_eq!(
            client.auth_header,
            format!("Basic {}", BASE64.encode("user:secret"))
        );
    }

    #[test]
    fn stream_response_parses_vendor_shape() {
        let raw = r#"{
            "id": "strm_1",
            "session_id": "sess_1",
            "offer": {"type": "offer", "sdp": "v=0..."},
            "ice_servers": [{"urls": "stun:stun.example.com"}]
        }"#;
        let stream: AvatarStream = serde_json::from_str(raw).unwrap();
        assert_eq!(stream.id, "strm_1");
        assert_eq!(stream.offer.kind, "offer");
        assert_eq!(stream.ice_servers.len(), 1);
    }

    #[test]
    fn ice_candidate_uses_webrtc_field_names() {
        let raw = r#"{"candidate": "candidate:1", "sdpMid": "0", "sdpMLineIndex": 0}"#;
        let candidate: IceCandidate = serde_json::from_str(raw).unwrap();
        assert_eq!(candidate.sdp_mid.as_deref(), Some("0"));
        assert_eq!(candidate.sdp_m_line_index, Some(0));
    }

    #[test]
    fn url_joins_without_double_slash() {
        let client = AvatarClient::new("k", String::new())
            .unwrap()
            .with_base_url("http://localhost:9000/");
        assert_eq!(client.url("/talks/streams"), "http://localhost:9000/talks/streams");
    }
}
