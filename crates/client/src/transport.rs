//! Production WebSocket transport.
//!
//! Translates one `tokio-tungstenite` connection into the channel pair the
//! session machine consumes: a byte sink and a stream of [`SocketEvent`]s.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::error::ClientError;
use crate::socket::{Connection, Connector, SocketEvent};

/// Connects over WebSocket.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Connection, ClientError> {
        // Validate before dialing; tungstenite's own error for a bad URL
        // is less direct.
        let endpoint = url::Url::parse(url)?;

        let (ws, _response) = connect_async(endpoint.as_str())
            .await
            .map_err(|e| ClientError::Connect(e.to_string()))?;
        let (mut sink, mut stream) = ws.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<SocketEvent>();

        // Writer: bytes from the session to the wire.
        tokio::spawn(async move {
            while let Some(bytes) = out_rx.recv().await {
                if sink.send(Message::Binary(bytes)).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        // Reader: wire frames to socket events, exactly one terminal.
        tokio::spawn(async move {
            let mut terminal_sent = false;
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Binary(data)) => {
                        if in_tx.send(SocketEvent::Message(data)).is_err() {
                            return;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        let (code, reason) = frame.map_or_else(
                            || (webterm_protocol::CLOSE_ABNORMAL, String::new()),
                            |f| (u16::from(f.code), f.reason.into_owned()),
                        );
                        let _ = in_tx.send(SocketEvent::Closed { code, reason });
                        terminal_sent = true;
                        break;
                    }
                    Ok(Message::Text(_)) => {
                        tracing::debug!("ignoring text frame on binary channel");
                    }
                    Ok(_) => {
                        // Ping/pong handled by the transport.
                    }
                    Err(error) => {
                        let _ = in_tx.send(SocketEvent::Error(error.to_string()));
                        terminal_sent = true;
                        break;
                    }
                }
            }
            if !terminal_sent {
                let _ = in_tx.send(SocketEvent::Closed {
                    code: webterm_protocol::CLOSE_ABNORMAL,
                    reason: String::new(),
                });
            }
        });

        Ok(Connection {
            outgoing: out_tx,
            incoming: in_rx,
        })
    }
}
