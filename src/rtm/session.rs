//! Established realtime session.
//!
//! A background worker owns the websocket. The session reads decoded frames
//! from it in arrival order and hands out cloneable [`SessionHandle`]s for
//! sending and closing, so a session can be closed from another task while
//! its events are being consumed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::stream::{self, Stream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, warn};

use crate::format::mention;
use crate::rtm::connect::RtmError;
use crate::rtm::proto::{InboundFrame, OutboundBody, OutboundFrame};
use crate::web_api::ApiResponse;

/// Lifecycle of the underlying connection. Moves forward only.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionState {
    Open,
    Closing,
    Closed,
}

enum Command {
    Send {
        frame: OutboundFrame,
        written: oneshot::Sender<Result<(), RtmError>>,
    },
    Close,
}

/// Cloneable sender and closer for a [`RealtimeSession`].
#[derive(Clone, Debug)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SessionState>,
    next_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Send { frame, .. } => f.debug_struct("Send").field("frame", frame).finish(),
            Self::Close => f.write_str("Close"),
        }
    }
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Shows a typing indicator in `channel`.
    pub async fn send_typing_indicator(&self, channel: &str) -> Result<u64, RtmError> {
        self.send(OutboundBody::Typing {
            channel: channel.to_string(),
        })
        .await
    }

    /// Posts `text` as a threaded reply under the message at `thread_ts`.
    pub async fn reply_in_thread(
        &self,
        channel: &str,
        thread_ts: &str,
        text: &str,
    ) -> Result<u64, RtmError> {
        self.send(OutboundBody::Message {
            channel: channel.to_string(),
            text: Some(text.to_string()),
            thread_ts: Some(thread_ts.to_string()),
        })
        .await
    }

    /// Posts `text` to `channel` outside any thread.
    pub async fn send_message(&self, channel: &str, text: &str) -> Result<u64, RtmError> {
        self.send(OutboundBody::Message {
            channel: channel.to_string(),
            text: Some(text.to_string()),
            thread_ts: None,
        })
        .await
    }

    pub async fn ping(&self) -> Result<u64, RtmError> {
        self.send(OutboundBody::Ping {}).await
    }

    /// Sends one frame under a fresh correlation id and returns that id.
    ///
    /// Resolves once the frame is written to the socket; no acknowledgement
    /// from the server is awaited. Sends issued concurrently from several
    /// tasks are not ordered relative to each other.
    pub async fn send(&self, body: OutboundBody) -> Result<u64, RtmError> {
        if self.state() != SessionState::Open {
            return Err(RtmError::Closed);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (written, written_rx) = oneshot::channel();
        self.commands
            .send(Command::Send {
                frame: OutboundFrame { id, body },
                written,
            })
            .map_err(|_| RtmError::Closed)?;

        written_rx.await.map_err(|_| RtmError::Closed)??;
        Ok(id)
    }

    /// Closes the connection and waits until it is closed.
    ///
    /// Idempotent: once the session is closed this returns immediately and
    /// never issues a second close.
    pub async fn close(&self) {
        if self.state() == SessionState::Closed {
            return;
        }

        // The worker may already be gone; either way it reports Closed.
        let _ = self.commands.send(Command::Close);
        let mut state = self.state.clone();
        let _ = state.wait_for(|state| *state == SessionState::Closed).await;
    }
}

/// Open realtime session returned by the handshake.
#[derive(Debug)]
pub struct RealtimeSession {
    self_id: String,
    handshake: ApiResponse,
    handle: SessionHandle,
    inbound: mpsc::UnboundedReceiver<InboundFrame>,
}

impl RealtimeSession {
    /// Wraps an upgraded websocket and starts its worker.
    ///
    /// Must be called within a tokio runtime.
    pub fn from_socket<S>(
        socket: WebSocketStream<S>,
        self_id: impl Into<String>,
        handshake: ApiResponse,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Open);

        tokio::spawn(session_worker(socket, commands_rx, inbound_tx, state_tx));

        Self {
            self_id: self_id.into(),
            handshake,
            handle: SessionHandle {
                commands: commands_tx,
                state: state_rx,
                next_id: Arc::new(AtomicU64::new(1)),
            },
            inbound: inbound_rx,
        }
    }

    /// The session's own user id, as reported by the handshake.
    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    /// `<@id>` mention syntax for this session's own user.
    pub fn bot_mention(&self) -> String {
        mention(&self.self_id)
    }

    /// Raw handshake response. For `rtm.start` this is the initial snapshot.
    pub fn handshake(&self) -> &ApiResponse {
        &self.handshake
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> SessionState {
        self.handle.state()
    }

    /// Receives the next frame.
    ///
    /// Returns `None` once the connection has closed, whether by `goodbye`,
    /// an explicit close, or a connection error. `goodbye` is never returned.
    pub async fn next_event(&mut self) -> Option<InboundFrame> {
        self.inbound.recv().await
    }

    /// Lazy in-order sequence of inbound frames, ending when the connection
    /// closes.
    pub fn events(&mut self) -> impl Stream<Item = InboundFrame> + Unpin + '_ {
        stream::poll_fn(move |cx| self.inbound.poll_recv(cx))
    }

    /// Consumes exactly one frame and reports whether it was `hello`.
    pub async fn await_hello(&mut self) -> bool {
        self.next_event()
            .await
            .is_some_and(|frame| frame.is_hello())
    }

    pub async fn send_typing_indicator(&self, channel: &str) -> Result<u64, RtmError> {
        self.handle.send_typing_indicator(channel).await
    }

    pub async fn reply_in_thread(
        &self,
        channel: &str,
        thread_ts: &str,
        text: &str,
    ) -> Result<u64, RtmError> {
        self.handle.reply_in_thread(channel, thread_ts, text).await
    }

    pub async fn send_message(&self, channel: &str, text: &str) -> Result<u64, RtmError> {
        self.handle.send_message(channel, text).await
    }

    pub async fn close(&self) {
        self.handle.close().await;
    }
}

async fn session_worker<S>(
    mut socket: WebSocketStream<S>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    inbound_tx: mpsc::UnboundedSender<InboundFrame>,
    state_tx: watch::Sender<SessionState>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Send { frame, written }) => {
                    let result = send_frame(&mut socket, &frame).await;
                    let failed = result.is_err();
                    let _ = written.send(result);
                    if failed {
                        break;
                    }
                }
                Some(Command::Close) | None => {
                    close_socket(&mut socket, &state_tx, "close_requested").await;
                    break;
                }
            },
            message = socket.next() => match message {
                Some(Ok(Message::Text(text))) => match InboundFrame::from_text(text.as_str()) {
                    Ok(frame) if frame.is_goodbye() => {
                        close_socket(&mut socket, &state_tx, "goodbye").await;
                        break;
                    }
                    Ok(frame) => {
                        // The session may be gone while handles live on.
                        let _ = inbound_tx.send(frame);
                    }
                    Err(err) => {
                        warn!(event = "rtm_frame_decode_failed", error = %err);
                    }
                },
                Some(Ok(Message::Ping(payload))) => {
                    if let Err(err) = socket.send(Message::Pong(payload)).await {
                        warn!(event = "rtm_connection_error", error = %err);
                        break;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(event = "rtm_closed_by_peer", ?frame);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(event = "rtm_connection_error", error = %err);
                    break;
                }
                None => break,
            },
        }
    }

    state_tx.send_replace(SessionState::Closed);
}

async fn send_frame<S>(
    socket: &mut WebSocketStream<S>,
    frame: &OutboundFrame,
) -> Result<(), RtmError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let text = frame.to_text()?;
    socket.send(Message::Text(text.into())).await?;
    Ok(())
}

async fn close_socket<S>(
    socket: &mut WebSocketStream<S>,
    state_tx: &watch::Sender<SessionState>,
    reason: &'static str,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    state_tx.send_replace(SessionState::Closing);
    debug!(event = "rtm_closing", reason);
    if let Err(err) = socket.close(None).await {
        debug!(event = "rtm_close_failed", error = %err);
    }
}
