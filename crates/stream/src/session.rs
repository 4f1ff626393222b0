//! Lifecycle of one generation request's WebSocket channel.
//!
//! [`StreamingSession::start`] spawns a task that connects, sends the
//! request as the first frame, and forwards every inbound frame, in arrival
//! order, as a [`SessionEvent`] on an unbounded mpsc channel. The consumer
//! pulls them with [`StreamingSession::next_event`].
//!
//! State machine:
//!
//! ```text
//! Idle -> Connecting -> Open -> Streaming -> Closed(outcome)
//! ```
//!
//! Exactly one [`SessionEvent::Closed`] is emitted per session; after it the
//! channel is exhausted.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::client::{ClientError, CodegenClient, WsStream};
use crate::close::{CloseKind, ABNORMAL_CLOSE_CODE, USER_CLOSE_CODE};
use crate::messages::{parse_message, InboundMessage};
use crate::request::GenerationParams;

/// How long to wait for the peer's close after a user cancel before giving
/// up on the handshake.
const CANCEL_GRACE: Duration = Duration::from_secs(5);

/// Close code reported when a close frame carries no status.
const NO_STATUS_CLOSE_CODE: u16 = 1005;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Observable session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Streaming,
    Closed(SessionOutcome),
}

/// Terminal result of a session. Each maps to exactly one lifecycle hook:
/// [`SessionOutcome::Completed`] to completion, everything else to
/// cancellation / rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SessionOutcome {
    /// Normal closure (1000).
    Completed,
    /// The user cancelled.
    Cancelled,
    /// The server closed with the application-error code.
    AppError { message: Option<String> },
    /// Any other close code, or the socket dropped without a close frame.
    Abnormal { code: u16, reason: String },
    /// The channel never opened.
    ConnectFailed { url: String, timed_out: bool, reason: String },
}

impl SessionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// One item pulled from a session, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The WebSocket opened and the request was sent.
    Opened,
    Message(InboundMessage),
    /// A text frame that did not parse. Processing continues.
    Malformed { raw: String, error: String },
    Closed(SessionOutcome),
}

/// Cloneable handle that requests cooperative cancellation.
#[derive(Debug, Clone)]
pub struct CancelHandle(CancellationToken);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// A running generation session.
///
/// Dropping the session requests cancellation of the underlying channel.
pub struct StreamingSession {
    events: mpsc::UnboundedReceiver<SessionEvent>,
    state: watch::Receiver<SessionState>,
    cancel: CancellationToken,
}

impl StreamingSession {
    /// Serialize `params` and spawn the connection task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        client: &CodegenClient,
        params: &GenerationParams,
    ) -> Result<Self, serde_json::Error> {
        let payload = params.to_json()?;
        let (event_tx, events) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(SessionState::Idle);
        let cancel = CancellationToken::new();

        let task_client = client.clone();
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            run_session(task_client, payload, event_tx, state_tx, task_cancel).await;
        });

        Ok(Self {
            events,
            state,
            cancel,
        })
    }

    /// Next event in arrival order; `None` once the terminal event has been
    /// consumed.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Watch state transitions.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Request cancellation: the channel is closed with the user-close code
    /// and messages already queued are still delivered.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(self.cancel.clone())
    }
}

impl Drop for StreamingSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Session task
// ---------------------------------------------------------------------------

/// Emits events for one session; owns the only sender so the terminal event
/// is sent exactly once.
struct Emitter {
    events: mpsc::UnboundedSender<SessionEvent>,
    state: watch::Sender<SessionState>,
}

impl Emitter {
    fn transition(&self, state: SessionState) {
        self.state.send_replace(state);
    }

    /// Returns `false` once the consumer has gone away.
    fn emit(&self, event: SessionEvent) -> bool {
        self.events.send(event).is_ok()
    }

    fn finish(self, outcome: SessionOutcome) {
        tracing::info!(?outcome, "Generation session closed");
        self.transition(SessionState::Closed(outcome.clone()));
        let _ = self.events.send(SessionEvent::Closed(outcome));
    }
}

async fn run_session(
    client: CodegenClient,
    payload: String,
    events: mpsc::UnboundedSender<SessionEvent>,
    state: watch::Sender<SessionState>,
    cancel: CancellationToken,
) {
    let emitter = Emitter { events, state };
    emitter.transition(SessionState::Connecting);

    let connected = tokio::select! {
        _ = cancel.cancelled() => {
            tracing::info!("Cancelled before the connection opened");
            emitter.finish(SessionOutcome::Cancelled);
            return;
        }
        result = client.connect() => result,
    };

    let ws_stream = match connected {
        Ok(ws) => ws,
        Err(e) => {
            tracing::error!(error = %e, "WebSocket connection failed");
            let reason = e.to_string();
            let (url, timed_out) = match e {
                ClientError::Timeout { url, .. } => (url, true),
                ClientError::Connection(_) => (client.endpoint(), false),
            };
            emitter.finish(SessionOutcome::ConnectFailed {
                url,
                timed_out,
                reason,
            });
            return;
        }
    };

    emitter.transition(SessionState::Open);
    let outcome = stream_messages(ws_stream, payload, &emitter, &cancel).await;
    emitter.finish(outcome);
}

/// Send the request, then pump inbound frames until the channel closes.
async fn stream_messages(
    ws_stream: WsStream,
    payload: String,
    emitter: &Emitter,
    cancel: &CancellationToken,
) -> SessionOutcome {
    let (mut sink, mut stream) = ws_stream.split();

    if let Err(e) = sink.send(Message::Text(payload)).await {
        tracing::error!(error = %e, "Failed to send generation request");
        return SessionOutcome::Abnormal {
            code: ABNORMAL_CLOSE_CODE,
            reason: e.to_string(),
        };
    }
    tracing::debug!("Generation request sent");

    if !emitter.emit(SessionEvent::Opened) {
        cancel.cancel();
    }
    emitter.transition(SessionState::Streaming);

    let mut cancel_requested = false;
    let mut grace_deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled(), if !cancel_requested => {
                cancel_requested = true;
                tracing::info!("Cancelling generation");
                let frame = CloseFrame {
                    code: CloseCode::from(USER_CLOSE_CODE),
                    reason: "user cancelled".into(),
                };
                if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                    tracing::warn!(error = %e, "Failed to send close frame");
                    return SessionOutcome::Cancelled;
                }
                grace_deadline = Some(Instant::now() + CANCEL_GRACE);
            }

            _ = sleep_until_or_pending(grace_deadline) => {
                tracing::warn!("Peer did not acknowledge cancellation in time");
                return SessionOutcome::Cancelled;
            }

            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if !forward_text(&text, emitter) {
                        cancel.cancel();
                    }
                }
                Some(Ok(Message::Binary(_))) => {
                    tracing::trace!("Ignoring binary message");
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    // Handled automatically by tungstenite.
                }
                Some(Ok(Message::Close(frame))) => {
                    return classify_close(frame, cancel_requested);
                }
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => {
                    if cancel_requested {
                        return SessionOutcome::Cancelled;
                    }
                    tracing::error!(error = %e, "WebSocket receive error");
                    return SessionOutcome::Abnormal {
                        code: ABNORMAL_CLOSE_CODE,
                        reason: e.to_string(),
                    };
                }
                None => {
                    if cancel_requested {
                        return SessionOutcome::Cancelled;
                    }
                    return SessionOutcome::Abnormal {
                        code: ABNORMAL_CLOSE_CODE,
                        reason: "connection closed without a close frame".to_string(),
                    };
                }
            },
        }
    }
}

/// Parse one text frame and forward it. Returns `false` when the consumer
/// has gone away.
fn forward_text(text: &str, emitter: &Emitter) -> bool {
    match parse_message(text) {
        Ok(msg) => {
            tracing::trace!(kind = msg.kind(), variant_index = ?msg.variant_index(), "Inbound message");
            emitter.emit(SessionEvent::Message(msg))
        }
        Err(e) => {
            tracing::warn!(error = %e, raw_message = %text, "Failed to parse inbound message");
            emitter.emit(SessionEvent::Malformed {
                raw: text.to_string(),
                error: e.to_string(),
            })
        }
    }
}

/// Map a close frame to an outcome. After a user cancel every close except
/// an application error counts as the cancellation completing.
fn classify_close(frame: Option<CloseFrame<'_>>, cancel_requested: bool) -> SessionOutcome {
    let (code, reason) = match frame {
        Some(f) => (u16::from(f.code), f.reason.into_owned()),
        None => (NO_STATUS_CLOSE_CODE, String::new()),
    };
    tracing::info!(code, reason = %reason, "WebSocket closed by peer");

    match CloseKind::from_code(code) {
        CloseKind::AppError => SessionOutcome::AppError {
            message: (!reason.is_empty()).then_some(reason),
        },
        _ if cancel_requested => SessionOutcome::Cancelled,
        CloseKind::UserClosed => SessionOutcome::Cancelled,
        CloseKind::Normal => SessionOutcome::Completed,
        CloseKind::Abnormal => SessionOutcome::Abnormal { code, reason },
    }
}

async fn sleep_until_or_pending(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}
