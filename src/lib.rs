//! Rust client for the Slack Web API and realtime messaging sessions.
//!
//! The crate is organized by transport surface:
//! - `web_api`: authenticated HTTP calls with transport/soft failure split.
//! - `pagination`: cursor-driven iteration over list methods.
//! - `rtm`: realtime handshake, frames, and the long-lived session.
//! - `blocking`: call/return wrappers for programs without an async runtime.
//! - `retry`: shared retry and timeout utilities.
//! - `format` and `oauth`: text escaping and install-flow helpers.

/// Blocking facade over the async clients.
pub mod blocking;
/// Message text helpers.
pub mod format;
/// OAuth install flow helpers.
pub mod oauth;
/// Cursor pagination over list methods.
pub mod pagination;
/// Retry and timeout helpers.
pub mod retry;
/// Realtime messaging session.
pub mod rtm;
/// Web API client and response envelope.
pub mod web_api;

pub use web_api::{ApiResponse, HttpVerb, Params, WebApiClient, WebApiClientOptions, WebApiError};
