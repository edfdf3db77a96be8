//! Realtime messaging (RTM) modules.
//!
//! - `connect`: handshake, retry state machine, and websocket upgrade.
//! - `proto`: inbound and outbound frame types.
//! - `session`: the established session, its worker, and send handles.

/// Handshake and session establishment.
pub mod connect;
/// Realtime wire frames.
pub mod proto;
/// Established session and send handles.
pub mod session;

pub use connect::{HandshakeInfo, RtmEndpoint, RtmError};
pub use proto::{FrameKind, InboundFrame, OutboundBody, OutboundFrame};
pub use session::{RealtimeSession, SessionHandle, SessionState};
