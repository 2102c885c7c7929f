//! One physical connection attempt.
//!
//! A [`SocketWrapper`] owns a single attempt end to end: it dials through
//! the injected [`Connector`], then pumps transport events into the
//! session's event channel, tagged with the attempt's generation so a
//! stale socket can never mutate a session that has already moved on.
//!
//! The wrapper emits exactly one terminal event per attempt: `Error` if
//! the dial fails, otherwise `Open` followed eventually by one `Closed`
//! or `Error`. Close and Error are never both surfaced for one attempt.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::ClientError;
use crate::session::SessionEvent;

/// Event surfaced by one physical socket.
#[derive(Debug, Clone)]
pub enum SocketEvent {
    /// The connection attempt succeeded.
    Open,
    /// A binary frame arrived.
    Message(Vec<u8>),
    /// The socket closed, gracefully or not.
    Closed { code: u16, reason: String },
    /// The socket failed; an implied close follows, which the wrapper
    /// absorbs rather than surfacing twice.
    Error(String),
}

impl SocketEvent {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed { .. } | Self::Error(_))
    }
}

/// An established transport pipe: bytes out, socket events in.
///
/// The `incoming` side carries `Message`/`Closed`/`Error` only; `Open` is
/// implied by the connect call returning.
pub struct Connection {
    pub outgoing: mpsc::UnboundedSender<Vec<u8>>,
    pub incoming: mpsc::UnboundedReceiver<SocketEvent>,
}

/// Seam between the session machine and the real transport.
///
/// Production uses [`crate::transport::WsConnector`]; tests inject a
/// scriptable fake.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Connection, ClientError>;
}

/// Owner of one connection attempt.
pub(crate) struct SocketWrapper {
    generation: u64,
    outgoing: mpsc::UnboundedSender<Vec<u8>>,
    pump: JoinHandle<()>,
}

impl SocketWrapper {
    /// Start a connection attempt. Events land on `events` tagged with
    /// `generation`.
    pub(crate) fn open(
        connector: Arc<dyn Connector>,
        url: String,
        generation: u64,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let (outgoing, out_rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(run_attempt(connector, url, generation, out_rx, events));
        Self {
            generation,
            outgoing,
            pump,
        }
    }

    pub(crate) const fn generation(&self) -> u64 {
        self.generation
    }

    /// Queue bytes for the transport. A no-op once the attempt has reached
    /// a terminal condition; the session avoids calling it then, so a
    /// failure here is only logged.
    pub(crate) fn send(&self, bytes: Vec<u8>) {
        if self.outgoing.send(bytes).is_err() {
            tracing::debug!(
                generation = self.generation,
                "dropping send on terminal socket"
            );
        }
    }

    /// Tear the attempt down. Idempotent.
    pub(crate) fn close(&self) {
        self.pump.abort();
    }
}

impl Drop for SocketWrapper {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn run_attempt(
    connector: Arc<dyn Connector>,
    url: String,
    generation: u64,
    mut out_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    let forward = |event: SocketEvent| {
        events
            .send(SessionEvent::Socket { generation, event })
            .is_ok()
    };

    let connection = match connector.connect(&url).await {
        Ok(connection) => connection,
        Err(error) => {
            tracing::debug!(generation, %error, "connection attempt failed");
            forward(SocketEvent::Error(error.to_string()));
            return;
        }
    };

    if !forward(SocketEvent::Open) {
        return;
    }

    let Connection {
        outgoing,
        mut incoming,
    } = connection;

    loop {
        tokio::select! {
            queued = out_rx.recv() => match queued {
                Some(bytes) => {
                    if outgoing.send(bytes).is_err() {
                        forward(SocketEvent::Error("transport writer gone".to_string()));
                        break;
                    }
                }
                // Wrapper dropped; dropping `outgoing` closes the transport.
                None => break,
            },
            received = incoming.recv() => match received {
                Some(event) => {
                    let terminal = event.is_terminal();
                    if !forward(event) || terminal {
                        break;
                    }
                }
                None => {
                    // Transport ended without a close frame.
                    forward(SocketEvent::Closed {
                        code: webterm_protocol::CLOSE_ABNORMAL,
                        reason: String::new(),
                    });
                    break;
                }
            },
        }
    }
}
