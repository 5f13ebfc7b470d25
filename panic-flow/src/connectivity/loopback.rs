//! In-memory connectivity port.
//!
//! Used by the CLI simulation and the test suite. Outbound messages are
//! stamped and recorded; while disconnected they are queued and flushed on
//! the next successful connect. Connect failures, inbound payloads and
//! connection-state changes can be scripted.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tracing::debug;

use super::message::{ConnectionState, Envelope, OutboundMessage};
use super::{ConnectivityError, ConnectivityPort, ConnectivityResult};

const INBOUND_CAPACITY: usize = 64;

#[derive(Default)]
struct LoopbackInner {
    user_id: Option<String>,
    failing_connects: u32,
    connect_attempts: u32,
    sent: Vec<Envelope>,
    queued: Vec<OutboundMessage>,
}

pub struct LoopbackConnectivity {
    session_id: String,
    inner: Mutex<LoopbackInner>,
    inbound: broadcast::Sender<Value>,
    state: watch::Sender<ConnectionState>,
}

impl LoopbackConnectivity {
    pub fn new() -> Self {
        let (inbound, _) = broadcast::channel(INBOUND_CAPACITY);
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            inner: Mutex::new(LoopbackInner::default()),
            inbound,
            state,
        }
    }

    /// Make the next `count` connect calls fail.
    pub fn fail_next_connects(&self, count: u32) {
        self.inner().failing_connects = count;
    }

    /// A port whose every connect attempt fails.
    pub fn unreachable() -> Self {
        let port = Self::new();
        port.fail_next_connects(u32::MAX);
        port
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Deliver a raw payload to inbound subscribers.
    pub fn inject(&self, payload: Value) {
        if self.inbound.send(payload).is_err() {
            debug!("Inbound payload dropped (no subscribers)");
        }
    }

    /// Publish a connection-state change as the transport would.
    pub fn set_connection_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    pub fn current_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Messages delivered so far, oldest first.
    pub fn sent(&self) -> Vec<Envelope> {
        self.inner().sent.clone()
    }

    /// Messages waiting for a connection.
    pub fn queued(&self) -> Vec<OutboundMessage> {
        self.inner().queued.clone()
    }

    pub fn connect_attempts(&self) -> u32 {
        self.inner().connect_attempts
    }

    fn inner(&self) -> MutexGuard<'_, LoopbackInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for LoopbackConnectivity {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectivityPort for LoopbackConnectivity {
    async fn connect(&self, user_id: &str) -> ConnectivityResult<()> {
        self.set_connection_state(ConnectionState::Connecting);
        let mut inner = self.inner();
        inner.connect_attempts += 1;

        if inner.failing_connects > 0 {
            inner.failing_connects -= 1;
            drop(inner);
            self.set_connection_state(ConnectionState::Disconnected);
            return Err(ConnectivityError::ConnectFailed {
                message: "loopback configured to refuse connection".to_string(),
            });
        }

        inner.user_id = Some(user_id.to_string());
        let queued = std::mem::take(&mut inner.queued);
        for message in queued {
            let envelope = Envelope::stamp(&self.session_id, user_id, message);
            inner.sent.push(envelope);
        }
        drop(inner);

        self.set_connection_state(ConnectionState::Connected);
        Ok(())
    }

    async fn disconnect(&self) {
        self.set_connection_state(ConnectionState::Disconnected);
    }

    fn send(&self, message: OutboundMessage) {
        let connected = self.current_state().is_connected();
        let mut inner = self.inner();
        match (inner.user_id.clone(), connected) {
            (Some(user_id), true) => {
                let envelope = Envelope::stamp(&self.session_id, &user_id, message);
                inner.sent.push(envelope);
            }
            _ => inner.queued.push(message),
        }
    }

    fn inbound(&self) -> broadcast::Receiver<Value> {
        self.inbound.subscribe()
    }

    fn connection_states(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }
}
