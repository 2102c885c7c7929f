// webterm-client library
// Keeps logical terminal sessions alive across transient socket loss.

// Reconnect scheduling
pub mod backoff;

// Input buffered while offline
pub mod input_queue;

// One physical connection attempt
pub mod socket;

// Production WebSocket connector
pub mod transport;

// Session state machine
pub mod session;

// Process-wide session table
pub mod registry;

// Observable UI surface (tab classes, overlay)
pub mod ui;

// Configuration
pub mod config;

// Error types
pub mod error;

pub use backoff::{ReconnectPolicy, RetryDecision};
pub use config::Config;
pub use error::ClientError;
pub use registry::{SessionDiag, SessionRegistry};
pub use session::{SessionHandle, SessionId, SessionState, SessionStatus};
pub use socket::{Connection, Connector, SocketEvent};
pub use transport::WsConnector;
pub use ui::{StatusView, UiModel};
