//! Commands and signals consumed by the session state machine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analytics::CrisisResourceKind;
use crate::connectivity::ConnectionState;
use crate::router::Route;

/// Everything that can happen to a session.
///
/// User commands, connectivity signals and timer firings all arrive as
/// `SessionEvent`s on the same queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The user opened the panic flow
    Triggered { initial_intensity: Option<f64> },
    IntensityReported { value: f64 },
    ExerciseTransitionRequested { from: Route, to: Route },
    ExerciseCycleCompleted,
    ExitRequested,
    CrisisIndicated,
    CrisisResourceUsed { resource: CrisisResourceKind },
    VoiceToggled { enabled: bool },
    ConnectionStateChanged { state: ConnectionState },
    /// Raw inbound payload from the backend
    ServerMessage { payload: Value },
    MessageSent { text: String },
    /// Internal: the auto-escalation timer with this id fired
    AutoEscalationTriggered { timer_id: u64 },
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Triggered { .. } => "triggered",
            Self::IntensityReported { .. } => "intensity_reported",
            Self::ExerciseTransitionRequested { .. } => "exercise_transition_requested",
            Self::ExerciseCycleCompleted => "exercise_cycle_completed",
            Self::ExitRequested => "exit_requested",
            Self::CrisisIndicated => "crisis_indicated",
            Self::CrisisResourceUsed { .. } => "crisis_resource_used",
            Self::VoiceToggled { .. } => "voice_toggled",
            Self::ConnectionStateChanged { .. } => "connection_state_changed",
            Self::ServerMessage { .. } => "server_message",
            Self::MessageSent { .. } => "message_sent",
            Self::AutoEscalationTriggered { .. } => "auto_escalation_triggered",
        }
    }
}
