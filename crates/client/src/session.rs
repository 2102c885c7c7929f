//! Session state machine.
//!
//! A session binds one logical terminal id to a sequence of physical
//! sockets. All socket events, user input, and reconnect timers for one
//! session funnel through a single event channel consumed by one driver
//! task, so transitions are totally ordered and need no locking. Output
//! frames fan out on a broadcast channel for the rendering layer; status
//! is observable through a watch channel and the shared [`UiModel`].

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use webterm_protocol::{is_normal_closure, Frame};

use crate::backoff::{ReconnectPolicy, RetryDecision};
use crate::config::Config;
use crate::error::ClientError;
use crate::input_queue::InputQueue;
use crate::socket::{Connector, SocketEvent, SocketWrapper};
use crate::ui::{StatusView, UiModel};

/// Unique session identifier
pub type SessionId = String;

/// Generate a new unique session ID
pub fn generate_session_id() -> SessionId {
    uuid::Uuid::new_v4().to_string()
}

/// Geometry assumed until the caller reports real dimensions.
const DEFAULT_COLS: u16 = 80;
const DEFAULT_ROWS: u16 = 24;

/// Capacity of the output broadcast channel.
const OUTPUT_CHANNEL_CAPACITY: usize = 256;

/// Connection state of one logical session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Connecting,
    Connected,
    Reconnecting,
    Failed,
    Closed,
}

/// Snapshot of a session's observable status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    /// Reconnect attempts made in the current retry run; 0 once connected.
    pub attempt: u32,
    /// Physical socket generation; bumps on every connection attempt.
    pub generation: u64,
    /// Input chunks buffered while offline.
    pub queued_input: usize,
}

/// Events consumed by a session's driver task.
pub(crate) enum SessionEvent {
    Socket { generation: u64, event: SocketEvent },
    RetryTimer { generation: u64 },
    UserInput(Vec<u8>),
    Resize { cols: u16, rows: u16 },
    UserClose,
    Dispose,
}

/// Cheap, cloneable handle to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    events: mpsc::UnboundedSender<SessionEvent>,
    status: watch::Receiver<SessionStatus>,
    output: broadcast::Sender<Vec<u8>>,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current status snapshot.
    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    /// Watch status transitions as they happen.
    pub fn watch_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// Get a receiver for PTY output bytes.
    pub fn subscribe_output(&self) -> broadcast::Receiver<Vec<u8>> {
        self.output.subscribe()
    }

    /// Send user input. Buffered while the session is between sockets.
    pub fn input(&self, bytes: impl Into<Vec<u8>>) -> Result<(), ClientError> {
        self.send(SessionEvent::UserInput(bytes.into()))
    }

    /// Report new terminal dimensions.
    pub fn resize(&self, cols: u16, rows: u16) -> Result<(), ClientError> {
        self.send(SessionEvent::Resize { cols, rows })
    }

    /// User-initiated close: tears the socket down and suppresses any
    /// further reconnection.
    pub fn close(&self) -> Result<(), ClientError> {
        self.send(SessionEvent::UserClose)
    }

    pub(crate) fn dispose(&self) {
        let _ = self.events.send(SessionEvent::Dispose);
    }

    /// Wait until the session reaches `target`.
    pub async fn wait_for_state(&self, target: SessionState) -> Result<(), ClientError> {
        let mut status = self.status.clone();
        loop {
            if status.borrow_and_update().state == target {
                return Ok(());
            }
            status
                .changed()
                .await
                .map_err(|_| ClientError::SessionClosed(self.id.clone()))?;
        }
    }

    fn send(&self, event: SessionEvent) -> Result<(), ClientError> {
        self.events
            .send(event)
            .map_err(|_| ClientError::SessionClosed(self.id.clone()))
    }
}

/// Spawn a session driver and return its handle. The first dial starts
/// immediately.
pub(crate) fn spawn(
    id: SessionId,
    url: String,
    config: &Config,
    connector: Arc<dyn Connector>,
    ui: Arc<UiModel>,
) -> SessionHandle {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (output_tx, _) = broadcast::channel(OUTPUT_CHANNEL_CAPACITY);
    let (status_tx, status_rx) = watch::channel(SessionStatus {
        state: SessionState::Connecting,
        attempt: 0,
        generation: 0,
        queued_input: 0,
    });

    let handle = SessionHandle {
        id: id.clone(),
        events: events_tx.clone(),
        status: status_rx,
        output: output_tx.clone(),
    };

    let session = Session {
        id,
        url,
        connector,
        policy: ReconnectPolicy::new(&config.reconnect),
        state: SessionState::Connecting,
        attempt: 0,
        generation: 0,
        socket: None,
        pending_input: InputQueue::new(config.input.queue_capacity),
        user_closed: false,
        resync_pending: false,
        cols: DEFAULT_COLS,
        rows: DEFAULT_ROWS,
        retry_timer: None,
        events_tx,
        output_tx,
        status_tx,
        ui,
    };
    tokio::spawn(session.run(events_rx));

    handle
}

struct Session {
    id: SessionId,
    url: String,
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,

    state: SessionState,
    attempt: u32,
    generation: u64,
    socket: Option<SocketWrapper>,
    pending_input: InputQueue,
    user_closed: bool,
    /// Set when entering Reconnecting; makes the next Connected transition
    /// fire the resync trigger.
    resync_pending: bool,
    cols: u16,
    rows: u16,
    retry_timer: Option<JoinHandle<()>>,

    events_tx: mpsc::UnboundedSender<SessionEvent>,
    output_tx: broadcast::Sender<Vec<u8>>,
    status_tx: watch::Sender<SessionStatus>,
    ui: Arc<UiModel>,
}

impl Session {
    async fn run(mut self, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
        tracing::info!(session_id = %self.id, url = %self.url, "session created");
        self.dial();

        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::Socket { generation, event } => {
                    self.on_socket_event(generation, event);
                }
                SessionEvent::RetryTimer { generation } => self.on_retry_timer(generation),
                SessionEvent::UserInput(bytes) => self.on_user_input(bytes),
                SessionEvent::Resize { cols, rows } => self.on_resize(cols, rows),
                SessionEvent::UserClose => self.on_user_close(),
                SessionEvent::Dispose => {
                    self.on_dispose();
                    break;
                }
            }
        }
    }

    /// Start a fresh connection attempt. The previous socket's handlers
    /// are discarded before the new attempt exists.
    fn dial(&mut self) {
        if let Some(old) = self.socket.take() {
            old.close();
        }
        self.generation += 1;
        self.socket = Some(SocketWrapper::open(
            self.connector.clone(),
            self.url.clone(),
            self.generation,
            self.events_tx.clone(),
        ));
        self.transition(SessionState::Connecting);
    }

    fn on_socket_event(&mut self, generation: u64, event: SocketEvent) {
        if generation != self.generation {
            tracing::debug!(
                session_id = %self.id,
                generation,
                current = self.generation,
                "dropping stale socket event"
            );
            return;
        }
        if self.state == SessionState::Closed {
            return;
        }

        match event {
            SocketEvent::Open => self.on_open(),
            SocketEvent::Message(bytes) => self.on_message(&bytes),
            SocketEvent::Closed { code, reason } => self.on_socket_lost(Some(code), &reason),
            SocketEvent::Error(error) => self.on_socket_lost(None, &error),
        }
    }

    fn on_open(&mut self) {
        if self.state != SessionState::Connecting {
            tracing::debug!(session_id = %self.id, state = ?self.state, "ignoring open outside connecting");
            return;
        }

        let resumed = self.resync_pending;
        self.attempt = 0;

        // Replay input typed while offline, in original order.
        for chunk in self.pending_input.drain() {
            self.send_frame(&Frame::Input(chunk));
        }

        if resumed {
            // Force full-screen programs to repaint after the gap. Sent
            // even when the geometry is unchanged; harmless otherwise.
            self.send_frame(&Frame::Resize {
                cols: self.cols,
                rows: self.rows,
            });
            self.resync_pending = false;
            tracing::info!(
                session_id = %self.id,
                cols = self.cols,
                rows = self.rows,
                "resync trigger sent after reconnect"
            );
        }

        self.transition(SessionState::Connected);
        tracing::info!(
            session_id = %self.id,
            generation = self.generation,
            resumed,
            "session connected"
        );
    }

    fn on_message(&mut self, bytes: &[u8]) {
        match Frame::decode(bytes) {
            Ok(Frame::Output(data)) => {
                // No subscriber just means nothing is rendering right now.
                let _ = self.output_tx.send(data);
            }
            Ok(frame) => {
                tracing::debug!(
                    session_id = %self.id,
                    kind = frame.kind(),
                    "ignoring unexpected frame from host"
                );
            }
            Err(error) => {
                tracing::warn!(session_id = %self.id, %error, "dropping malformed frame");
            }
        }
    }

    /// The current socket reached a terminal condition.
    fn on_socket_lost(&mut self, code: Option<u16>, reason: &str) {
        match self.state {
            SessionState::Connected | SessionState::Connecting => {}
            // No transition is defined for a terminal signal in any other
            // state; duplicates for a spent attempt land here.
            _ => return,
        }

        if let Some(socket) = self.socket.take() {
            socket.close();
        }

        match code {
            Some(code) if is_normal_closure(code) => {
                tracing::info!(session_id = %self.id, code, reason, "socket closed by peer");
            }
            Some(code) => {
                tracing::warn!(session_id = %self.id, code, reason, "socket lost");
            }
            None => {
                tracing::warn!(session_id = %self.id, error = reason, "socket error");
            }
        }

        if self.user_closed {
            self.finish_close();
            return;
        }
        self.schedule_retry();
    }

    fn schedule_retry(&mut self) {
        match self.policy.delay_for(self.attempt) {
            RetryDecision::Delay(delay) => {
                self.resync_pending = true;
                self.cancel_retry_timer();

                let events = self.events_tx.clone();
                let generation = self.generation;
                self.retry_timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = events.send(SessionEvent::RetryTimer { generation });
                }));

                tracing::info!(
                    session_id = %self.id,
                    attempt = self.attempt,
                    ?delay,
                    "scheduling reconnect"
                );
                self.transition(SessionState::Reconnecting);
            }
            RetryDecision::Exhausted => {
                tracing::error!(
                    session_id = %self.id,
                    attempts = self.attempt,
                    "retry budget exhausted"
                );
                self.transition(SessionState::Failed);
            }
        }
    }

    fn on_retry_timer(&mut self, generation: u64) {
        if generation != self.generation || self.state != SessionState::Reconnecting {
            return;
        }
        self.retry_timer = None;
        self.attempt += 1;
        tracing::info!(session_id = %self.id, attempt = self.attempt, "reconnect attempt");
        self.dial();
    }

    fn on_user_input(&mut self, bytes: Vec<u8>) {
        match self.state {
            SessionState::Connected => self.send_frame(&Frame::Input(bytes)),
            SessionState::Connecting | SessionState::Reconnecting => {
                self.pending_input.push(bytes);
                self.publish();
            }
            SessionState::Failed | SessionState::Closed => {
                tracing::debug!(
                    session_id = %self.id,
                    state = ?self.state,
                    "discarding input for dead session"
                );
            }
        }
    }

    fn on_resize(&mut self, cols: u16, rows: u16) {
        self.cols = cols;
        self.rows = rows;
        if self.state == SessionState::Connected {
            self.send_frame(&Frame::Resize { cols, rows });
        }
    }

    fn on_user_close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.user_closed = true;
        self.finish_close();
        tracing::info!(session_id = %self.id, "session closed by user");
    }

    fn finish_close(&mut self) {
        self.cancel_retry_timer();
        if let Some(socket) = self.socket.take() {
            socket.close();
        }
        self.transition(SessionState::Closed);
    }

    fn on_dispose(&mut self) {
        self.cancel_retry_timer();
        if let Some(socket) = self.socket.take() {
            socket.close();
        }
        self.state = SessionState::Closed;
        self.ui.remove(&self.id);
        self.status_tx.send_replace(self.status_snapshot());
        tracing::info!(session_id = %self.id, "session disposed");
    }

    fn cancel_retry_timer(&mut self) {
        if let Some(timer) = self.retry_timer.take() {
            timer.abort();
        }
    }

    fn send_frame(&self, frame: &Frame) {
        match frame.encode() {
            Ok(bytes) => {
                if let Some(socket) = &self.socket {
                    socket.send(bytes);
                }
            }
            Err(error) => {
                tracing::error!(
                    session_id = %self.id,
                    kind = frame.kind(),
                    %error,
                    "failed to encode outbound frame"
                );
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            tracing::debug!(
                session_id = %self.id,
                from = ?self.state,
                to = ?next,
                attempt = self.attempt,
                "state transition"
            );
        }
        self.state = next;
        self.publish();
    }

    /// Publish the current status: the tab class, the overlay, and the
    /// watch snapshot change in the same synchronous stretch, with the UI
    /// pair itself updated under one lock.
    fn publish(&self) {
        self.ui
            .apply(&self.id, StatusView::project(self.state, self.attempt));
        self.status_tx.send_replace(self.status_snapshot());
    }

    fn status_snapshot(&self) -> SessionStatus {
        SessionStatus {
            state: self.state,
            attempt: self.attempt,
            generation: self.generation,
            queued_input: self.pending_input.len(),
        }
    }
}
