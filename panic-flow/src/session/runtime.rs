//! Session runtime: runs a [`SessionStateMachine`] as a single-consumer actor.
//!
//! Commands from the [`SessionHandle`], connectivity signals from the port and
//! timer firings all land on the same unbounded queue and are handled one at a
//! time. Events queued while a handler is suspended are drained in arrival
//! order afterwards.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::analytics::{CrisisResourceKind, SharedAnalytics};
use crate::connectivity::{ConnectionState, SharedConnectivity};
use crate::router::Route;

use super::config::SessionConfig;
use super::event::SessionEvent;
use super::machine::SessionStateMachine;
use super::state::SessionState;

/// Errors from the session command API
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Session runtime has stopped")]
    Stopped,
}

/// Result type for session commands
pub type SessionResult<T> = Result<T, SessionError>;

pub struct SessionRuntime;

impl SessionRuntime {
    /// Spawn the session actor and its connectivity forwarders.
    pub fn spawn(
        config: SessionConfig,
        analytics: SharedAnalytics,
        connectivity: SharedConnectivity,
    ) -> SessionHandle {
        let (queue, events) = mpsc::unbounded_channel();
        let machine =
            SessionStateMachine::new(config, analytics, connectivity.clone(), queue.clone());
        let snapshots = machine.subscribe();
        let cancel = CancellationToken::new();

        let forwarders = vec![
            tokio::spawn(forward_inbound(
                connectivity.inbound(),
                queue.clone(),
                cancel.clone(),
            )),
            tokio::spawn(forward_connection_states(
                connectivity.connection_states(),
                queue.clone(),
                cancel.clone(),
            )),
        ];
        let actor = tokio::spawn(run(machine, events, cancel.clone()));

        info!("Session runtime started");
        SessionHandle {
            queue,
            snapshots,
            cancel,
            actor,
            forwarders,
        }
    }
}

async fn run(
    mut machine: SessionStateMachine,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => machine.handle(event).await,
                None => break,
            },
        }
    }
    debug!(phase = %machine.state().phase, "Session runtime stopped");
}

async fn forward_inbound(
    mut inbound: broadcast::Receiver<Value>,
    queue: mpsc::UnboundedSender<SessionEvent>,
    cancel: CancellationToken,
) {
    loop {
        let payload = tokio::select! {
            _ = cancel.cancelled() => return,
            received = inbound.recv() => received,
        };
        match payload {
            Ok(payload) => {
                if queue.send(SessionEvent::ServerMessage { payload }).is_err() {
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Inbound forwarder lagged; messages dropped");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

async fn forward_connection_states(
    mut states: watch::Receiver<ConnectionState>,
    queue: mpsc::UnboundedSender<SessionEvent>,
    cancel: CancellationToken,
) {
    let _ = states.borrow_and_update();
    loop {
        let changed = tokio::select! {
            _ = cancel.cancelled() => return,
            changed = states.changed() => changed,
        };
        if changed.is_err() {
            return;
        }
        let state = *states.borrow_and_update();
        if queue
            .send(SessionEvent::ConnectionStateChanged { state })
            .is_err()
        {
            return;
        }
    }
}

/// Command API and snapshot stream of a running session.
pub struct SessionHandle {
    queue: mpsc::UnboundedSender<SessionEvent>,
    snapshots: watch::Receiver<Arc<SessionState>>,
    cancel: CancellationToken,
    actor: JoinHandle<()>,
    forwarders: Vec<JoinHandle<()>>,
}

impl SessionHandle {
    /// Enqueue any event.
    pub fn dispatch(&self, event: SessionEvent) -> SessionResult<()> {
        if self.cancel.is_cancelled() {
            return Err(SessionError::Stopped);
        }
        self.queue.send(event).map_err(|_| SessionError::Stopped)
    }

    pub fn trigger(&self, initial_intensity: Option<f64>) -> SessionResult<()> {
        self.dispatch(SessionEvent::Triggered { initial_intensity })
    }

    pub fn report_intensity(&self, value: f64) -> SessionResult<()> {
        self.dispatch(SessionEvent::IntensityReported { value })
    }

    pub fn request_transition(&self, from: Route, to: Route) -> SessionResult<()> {
        self.dispatch(SessionEvent::ExerciseTransitionRequested { from, to })
    }

    pub fn complete_cycle(&self) -> SessionResult<()> {
        self.dispatch(SessionEvent::ExerciseCycleCompleted)
    }

    pub fn exit(&self) -> SessionResult<()> {
        self.dispatch(SessionEvent::ExitRequested)
    }

    pub fn indicate_crisis(&self) -> SessionResult<()> {
        self.dispatch(SessionEvent::CrisisIndicated)
    }

    pub fn crisis_resource_used(&self, resource: CrisisResourceKind) -> SessionResult<()> {
        self.dispatch(SessionEvent::CrisisResourceUsed { resource })
    }

    pub fn toggle_voice(&self, enabled: bool) -> SessionResult<()> {
        self.dispatch(SessionEvent::VoiceToggled { enabled })
    }

    pub fn send_message(&self, text: impl Into<String>) -> SessionResult<()> {
        self.dispatch(SessionEvent::MessageSent { text: text.into() })
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<SessionState> {
        self.snapshots.borrow().clone()
    }

    /// A fresh receiver of state snapshots.
    pub fn subscribe(&self) -> watch::Receiver<Arc<SessionState>> {
        self.snapshots.clone()
    }

    /// Stop the actor and forwarders, dropping any pending timer.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.forwarders {
            if let Err(e) = task.await {
                warn!("Session forwarder ended abnormally: {}", e);
            }
        }
        if let Err(e) = self.actor.await {
            warn!("Session actor ended abnormally: {}", e);
        }
        info!("Session runtime shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::NoopSink;
    use crate::connectivity::LoopbackConnectivity;
    use crate::session::state::SessionPhase;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_commands_reach_the_machine() {
        let port = Arc::new(LoopbackConnectivity::new());
        let handle = SessionRuntime::spawn(
            SessionConfig::standard("user-1"),
            Arc::new(NoopSink),
            port.clone(),
        );

        handle.trigger(Some(3.0)).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(handle.snapshot().phase, SessionPhase::Active);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_after_shutdown_fails() {
        let handle = SessionRuntime::spawn(
            SessionConfig::standard("user-1"),
            Arc::new(NoopSink),
            Arc::new(LoopbackConnectivity::new()),
        );
        let cancel = handle.cancel.clone();
        cancel.cancel();
        assert_eq!(handle.exit(), Err(SessionError::Stopped));
        handle.shutdown().await;
    }
}
