//! Common test utilities
#![allow(dead_code)] // Test utilities may not all be used in every test

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use webterm_client::config::ReconnectConfig;
use webterm_client::{ClientError, Config, Connection, Connector, SocketEvent};
use webterm_protocol::Frame;

/// One scripted outcome for a connection attempt.
#[derive(Debug, Clone, Copy)]
pub enum AttemptPlan {
    /// Complete the handshake and hand the test a [`ServerEnd`].
    Accept,
    /// Fail the dial immediately.
    Refuse,
    /// Accept, but only after this delay.
    Hang(Duration),
}

/// The host side of an accepted mock connection.
pub struct ServerEnd {
    pub to_client: mpsc::UnboundedSender<SocketEvent>,
    pub from_client: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl ServerEnd {
    /// Push a PTY output frame to the client.
    pub fn send_output(&self, bytes: &[u8]) {
        let frame = Frame::Output(bytes.to_vec()).encode().unwrap();
        let _ = self.to_client.send(SocketEvent::Message(frame));
    }

    /// Push raw bytes as a binary message, bypassing frame encoding.
    pub fn send_raw(&self, bytes: Vec<u8>) {
        let _ = self.to_client.send(SocketEvent::Message(bytes));
    }

    /// Kill the connection abnormally, as a network fault would.
    pub fn drop_connection(&self) {
        let _ = self.to_client.send(SocketEvent::Closed {
            code: 1006,
            reason: "abnormal closure".to_string(),
        });
    }

    /// Close gracefully with an explicit code.
    pub fn close(&self, code: u16) {
        let _ = self.to_client.send(SocketEvent::Closed {
            code,
            reason: String::new(),
        });
    }

    /// Next frame sent by the client, decoded.
    pub async fn recv_frame(&mut self) -> Option<Frame> {
        let bytes = self.from_client.recv().await?;
        Some(Frame::decode(&bytes).expect("client sent undecodable frame"))
    }

    /// Frame already queued by the client, if any.
    pub fn try_recv_frame(&mut self) -> Option<Frame> {
        self.from_client
            .try_recv()
            .ok()
            .map(|bytes| Frame::decode(&bytes).expect("client sent undecodable frame"))
    }
}

/// Scriptable connector: plays back a plan of attempt outcomes and hands
/// each accepted connection's server end to the test.
pub struct MockConnector {
    plan: Mutex<VecDeque<AttemptPlan>>,
    attempts: AtomicU32,
    attempt_times: Mutex<Vec<tokio::time::Instant>>,
    established: mpsc::UnboundedSender<ServerEnd>,
}

impl MockConnector {
    pub fn new(
        plan: impl IntoIterator<Item = AttemptPlan>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<ServerEnd>) {
        let (established, accepted) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            plan: Mutex::new(plan.into_iter().collect()),
            attempts: AtomicU32::new(0),
            attempt_times: Mutex::new(Vec::new()),
            established,
        });
        (connector, accepted)
    }

    /// Total dials observed, including refused ones.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// When each dial arrived, on the (paused) tokio clock.
    pub fn attempt_times(&self) -> Vec<tokio::time::Instant> {
        self.attempt_times.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _url: &str) -> Result<Connection, ClientError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.attempt_times
            .lock()
            .unwrap()
            .push(tokio::time::Instant::now());

        // An exhausted plan refuses, so an unexpected extra dial can
        // never silently succeed.
        let plan = self
            .plan
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(AttemptPlan::Refuse);

        let delay = match plan {
            AttemptPlan::Refuse => {
                return Err(ClientError::Connect("connection refused".to_string()))
            }
            AttemptPlan::Accept => Duration::ZERO,
            AttemptPlan::Hang(delay) => delay,
        };
        if delay > Duration::ZERO {
            tokio::time::sleep(delay).await;
        }

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let _ = self.established.send(ServerEnd {
            to_client: in_tx,
            from_client: out_rx,
        });
        Ok(Connection {
            outgoing: out_tx,
            incoming: in_rx,
        })
    }
}

/// Fast, jitter-free reconnect settings for deterministic timer tests.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.reconnect = ReconnectConfig {
        base_delay_ms: 100,
        max_delay_ms: 2000,
        max_attempts: 5,
        jitter: 0.0,
    };
    config.input.queue_capacity = 8;
    config
}

/// Let every spawned task and due timer settle.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
