//! Connectivity port
//!
//! The session core talks to its backend only through [`ConnectivityPort`].
//! The wire transport lives behind the trait; the core never retries, it
//! reacts to the connection-state stream and degrades to offline support.

pub mod loopback;
pub mod message;
pub mod reconnect;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{broadcast, watch};

pub use loopback::LoopbackConnectivity;
pub use message::{ConnectionState, Envelope, OutboundMessage, ServerMessage};
pub use reconnect::{reconnect_with, ReconnectPolicy};

/// Errors reported by a connectivity port
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConnectivityError {
    #[error("Failed to connect: {message}")]
    ConnectFailed { message: String },

    #[error("Not connected")]
    NotConnected,

    #[error("Connection channel closed")]
    Closed,
}

/// Result type for connectivity operations
pub type ConnectivityResult<T> = Result<T, ConnectivityError>;

/// Shared reference to a connectivity port
pub type SharedConnectivity = Arc<dyn ConnectivityPort>;

/// Backend connection used by a session.
///
/// Implementations stamp every outbound message with `session_id`,
/// `user_id` and `timestamp`, and own any reconnection policy.
#[async_trait]
pub trait ConnectivityPort: Send + Sync {
    /// Open the connection. May fail; callers fall back to offline mode.
    async fn connect(&self, user_id: &str) -> ConnectivityResult<()>;

    async fn disconnect(&self);

    /// Fire-and-forget send, queued by the port while disconnected.
    fn send(&self, message: OutboundMessage);

    /// Tell the backend the session is over.
    fn end_session(&self) {
        self.send(OutboundMessage::EndSession);
    }

    /// Raw inbound payloads, JSON objects with a `type` field.
    fn inbound(&self) -> broadcast::Receiver<Value>;

    fn connection_states(&self) -> watch::Receiver<ConnectionState>;
}
