//! Blocking facade over the async clients.
//!
//! Each wrapper owns (or shares) an explicitly built single-threaded tokio
//! runtime and drives one operation to completion per call. The realtime
//! session's worker only makes progress while one of these calls is blocked,
//! so an idle session does not answer server pings.
//!
//! These types must not be used from inside an async context; `block_on`
//! panics there.

use std::io;
use std::sync::Arc;

use serde_json::Value;
use tokio::runtime::{Builder, Runtime};

use crate::oauth::OAuthCredentials;
use crate::rtm::{InboundFrame, RtmError, SessionState};
use crate::web_api::{ApiResponse, HttpVerb, Params, WebApiError};

/// Blocking counterpart of [`crate::web_api::WebApiClient`].
#[derive(Clone, Debug)]
pub struct WebApiClient {
    runtime: Arc<Runtime>,
    inner: crate::web_api::WebApiClient,
}

impl WebApiClient {
    /// Wraps `inner` with a fresh current-thread runtime.
    pub fn new(inner: crate::web_api::WebApiClient) -> io::Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self::with_runtime(inner, Arc::new(runtime)))
    }

    /// Wraps `inner` with a caller-provided runtime.
    pub fn with_runtime(inner: crate::web_api::WebApiClient, runtime: Arc<Runtime>) -> Self {
        Self { runtime, inner }
    }

    pub fn inner(&self) -> &crate::web_api::WebApiClient {
        &self.inner
    }

    pub fn call(
        &self,
        method: &str,
        params: &Params,
        verb: HttpVerb,
    ) -> Result<ApiResponse, WebApiError> {
        self.runtime.block_on(self.inner.call(method, params, verb))
    }

    pub fn get(&self, method: &str, params: &Params) -> Result<ApiResponse, WebApiError> {
        self.runtime.block_on(self.inner.get(method, params))
    }

    pub fn post(&self, method: &str, params: &Params) -> Result<ApiResponse, WebApiError> {
        self.runtime.block_on(self.inner.post(method, params))
    }

    pub fn list_all(
        &self,
        method: &str,
        result_field: &str,
        params: Params,
    ) -> Result<Vec<Value>, WebApiError> {
        self.runtime
            .block_on(self.inner.list_all(method, result_field, params))
    }

    pub fn oauth_access(
        &self,
        credentials: &OAuthCredentials,
        code: &str,
    ) -> Result<ApiResponse, WebApiError> {
        self.runtime
            .block_on(self.inner.oauth_access(credentials, code))
    }

    pub fn rtm_connect(&self, retry: bool) -> Result<RealtimeSession, RtmError> {
        let inner = self.runtime.block_on(self.inner.rtm_connect(retry))?;
        Ok(self.session(inner))
    }

    pub fn rtm_start(&self, retry: bool) -> Result<RealtimeSession, RtmError> {
        let inner = self.runtime.block_on(self.inner.rtm_start(retry))?;
        Ok(self.session(inner))
    }

    fn session(&self, inner: crate::rtm::RealtimeSession) -> RealtimeSession {
        RealtimeSession {
            runtime: Arc::clone(&self.runtime),
            inner,
        }
    }
}

/// Blocking counterpart of [`crate::rtm::RealtimeSession`].
///
/// Shares the runtime of the client that opened it; the session worker lives
/// on that runtime.
#[derive(Debug)]
pub struct RealtimeSession {
    runtime: Arc<Runtime>,
    inner: crate::rtm::RealtimeSession,
}

impl RealtimeSession {
    pub fn self_id(&self) -> &str {
        self.inner.self_id()
    }

    pub fn bot_mention(&self) -> String {
        self.inner.bot_mention()
    }

    pub fn handshake(&self) -> &ApiResponse {
        self.inner.handshake()
    }

    pub fn state(&self) -> SessionState {
        self.inner.state()
    }

    /// Blocks until the next frame arrives or the connection closes.
    pub fn next_event(&mut self) -> Option<InboundFrame> {
        self.runtime.block_on(self.inner.next_event())
    }

    /// Iterator over inbound frames; ends when the connection closes.
    pub fn events(&mut self) -> Events<'_> {
        Events { session: self }
    }

    pub fn await_hello(&mut self) -> bool {
        self.runtime.block_on(self.inner.await_hello())
    }

    pub fn send_typing_indicator(&self, channel: &str) -> Result<u64, RtmError> {
        self.runtime
            .block_on(self.inner.send_typing_indicator(channel))
    }

    pub fn reply_in_thread(
        &self,
        channel: &str,
        thread_ts: &str,
        text: &str,
    ) -> Result<u64, RtmError> {
        self.runtime
            .block_on(self.inner.reply_in_thread(channel, thread_ts, text))
    }

    pub fn send_message(&self, channel: &str, text: &str) -> Result<u64, RtmError> {
        self.runtime.block_on(self.inner.send_message(channel, text))
    }

    pub fn close(&self) {
        self.runtime.block_on(self.inner.close());
    }
}

/// Blocking iterator returned by [`RealtimeSession::events`].
#[derive(Debug)]
pub struct Events<'a> {
    session: &'a mut RealtimeSession,
}

impl Iterator for Events<'_> {
    type Item = InboundFrame;

    fn next(&mut self) -> Option<Self::Item> {
        self.session.next_event()
    }
}
