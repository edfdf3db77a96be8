//! Realtime handshake and websocket upgrade.
//!
//! Both `rtm.connect` and `rtm.start` share one retry state machine: a
//! soft-failed handshake either waits the client's handshake backoff and tries
//! again, or fails with the server's error string when retrying is disabled.
//! Transport failures are never retried.

use serde_json::Value;
use thiserror::Error;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Error as WsError;
use tracing::{debug, info};

use crate::retry::{retry_async, RetryPolicy};
use crate::rtm::session::RealtimeSession;
use crate::web_api::{ApiResponse, HttpVerb, Params, WebApiClient, WebApiError};

/// Handshake method names.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RtmEndpoint {
    /// `rtm.connect`: upgrade URL and self identity only.
    Connect,
    /// `rtm.start`: also returns a full initial workspace snapshot.
    Start,
}

impl RtmEndpoint {
    pub fn method(self) -> &'static str {
        match self {
            Self::Connect => "rtm.connect",
            Self::Start => "rtm.start",
        }
    }
}

/// Errors produced while establishing or using a realtime session.
#[derive(Debug, Error)]
pub enum RtmError {
    #[error(transparent)]
    WebApi(#[from] WebApiError),

    /// Handshake reported `ok: false` and retrying was disabled.
    #[error("rtm handshake failed: {error}")]
    Handshake { error: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] WsError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("realtime session is closed")]
    Closed,
}

/// Upgrade target and identity extracted from a successful handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeInfo {
    pub url: String,
    pub self_id: String,
}

impl HandshakeInfo {
    pub fn from_response(response: &ApiResponse) -> Result<Self, RtmError> {
        let url = response
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| RtmError::Protocol("handshake response missing url".to_string()))?;
        let self_id = response
            .get("self")
            .and_then(|me| me.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| RtmError::Protocol("handshake response missing self.id".to_string()))?;

        Ok(Self {
            url: url.to_string(),
            self_id: self_id.to_string(),
        })
    }
}

enum Attempt {
    SoftFailure(String),
    Fatal(RtmError),
}

impl WebApiClient {
    /// Opens a realtime session through `rtm.connect`.
    pub async fn rtm_connect(&self, retry: bool) -> Result<RealtimeSession, RtmError> {
        self.establish(RtmEndpoint::Connect, retry).await
    }

    /// Opens a realtime session through `rtm.start`.
    pub async fn rtm_start(&self, retry: bool) -> Result<RealtimeSession, RtmError> {
        self.establish(RtmEndpoint::Start, retry).await
    }

    /// Runs the handshake against `endpoint` and upgrades to a websocket.
    ///
    /// With `retry` set, soft failures loop forever with a fixed delay.
    pub async fn establish(
        &self,
        endpoint: RtmEndpoint,
        retry: bool,
    ) -> Result<RealtimeSession, RtmError> {
        let policy = if retry {
            RetryPolicy::forever(self.handshake_backoff)
        } else {
            RetryPolicy::once()
        };

        let response = retry_async(
            &policy,
            |attempt| self.handshake_attempt(endpoint, attempt),
            |outcome| matches!(outcome, Attempt::SoftFailure(_)),
        )
        .await
        .map_err(|outcome| match outcome {
            Attempt::SoftFailure(error) => RtmError::Handshake { error },
            Attempt::Fatal(err) => err,
        })?;

        let info = HandshakeInfo::from_response(&response)?;
        debug!(event = "rtm_upgrading", url = %info.url, self_id = %info.self_id);
        let (socket, _) = connect_async(info.url.as_str()).await?;
        info!(event = "rtm_established", method = endpoint.method(), self_id = %info.self_id);

        Ok(RealtimeSession::from_socket(socket, info.self_id, response))
    }

    async fn handshake_attempt(
        &self,
        endpoint: RtmEndpoint,
        attempt: usize,
    ) -> Result<ApiResponse, Attempt> {
        let response = self
            .call(endpoint.method(), &Params::new(), HttpVerb::Get)
            .await
            .map_err(|err| Attempt::Fatal(err.into()))?;

        if response.ok() {
            return Ok(response);
        }

        let error = response.error().unwrap_or("unknown_error").to_string();
        debug!(event = "rtm_handshake_rejected", method = endpoint.method(), attempt, error = %error);
        Err(Attempt::SoftFailure(error))
    }
}
