//! Analytics event types
//!
//! Flat, non-identifying records. No user id, session id or free text typed
//! by the user ever appears in an event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classifier::{ClassificationReason, PreviousOutcome, UxState};
use crate::router::{Route, RoutingReason};
use crate::session::SessionSummary;

/// Every event the core records.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalyticsEvent {
    /// The classifier produced a severity for a new session
    Classification {
        state: UxState,
        reason: ClassificationReason,
        intensity: f64,
        timestamp: DateTime<Utc>,
    },

    /// The router selected a route
    RoutingDecision {
        route: Route,
        source_state: UxState,
        reason: RoutingReason,
        timestamp: DateTime<Utc>,
    },

    /// An exercise became active
    ExerciseStarted {
        exercise: Route,
        source_state: Option<UxState>,
        timestamp: DateTime<Utc>,
    },

    /// The active exercise is being replaced
    ExerciseTransition {
        from: Route,
        to: Route,
        trigger: TransitionTrigger,
        timestamp: DateTime<Utc>,
    },

    /// An exercise ended, by transition, exit or crisis
    ExerciseCompleted {
        exercise: Route,
        cycles: u32,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The crisis flow was entered
    CrisisFlowEntered {
        trigger: CrisisTrigger,
        timestamp: DateTime<Utc>,
    },

    /// A crisis resource was used from the crisis route
    CrisisResourceUsed {
        resource: CrisisResourceKind,
        timestamp: DateTime<Utc>,
    },

    /// A session ended
    SessionOutcome {
        outcome: PreviousOutcome,
        summary: SessionSummary,
        timestamp: DateTime<Utc>,
    },

    /// The user reported a new intensity
    IntensityChange {
        previous: f64,
        current: f64,
        delta: f64,
        timestamp: DateTime<Utc>,
    },

    /// The session switched to local offline support
    OfflineFallback {
        reason: OfflineReason,
        timestamp: DateTime<Utc>,
    },
}

impl AnalyticsEvent {
    /// Get the timestamp of this event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Classification { timestamp, .. } => *timestamp,
            Self::RoutingDecision { timestamp, .. } => *timestamp,
            Self::ExerciseStarted { timestamp, .. } => *timestamp,
            Self::ExerciseTransition { timestamp, .. } => *timestamp,
            Self::ExerciseCompleted { timestamp, .. } => *timestamp,
            Self::CrisisFlowEntered { timestamp, .. } => *timestamp,
            Self::CrisisResourceUsed { timestamp, .. } => *timestamp,
            Self::SessionOutcome { timestamp, .. } => *timestamp,
            Self::IntensityChange { timestamp, .. } => *timestamp,
            Self::OfflineFallback { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event kind as a string
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Classification { .. } => "classification",
            Self::RoutingDecision { .. } => "routing_decision",
            Self::ExerciseStarted { .. } => "exercise_started",
            Self::ExerciseTransition { .. } => "exercise_transition",
            Self::ExerciseCompleted { .. } => "exercise_completed",
            Self::CrisisFlowEntered { .. } => "crisis_flow_entered",
            Self::CrisisResourceUsed { .. } => "crisis_resource_used",
            Self::SessionOutcome { .. } => "session_outcome",
            Self::IntensityChange { .. } => "intensity_change",
            Self::OfflineFallback { .. } => "offline_fallback",
        }
    }

    pub fn intensity_change(previous: f64, current: f64) -> Self {
        Self::IntensityChange {
            previous,
            current,
            delta: current - previous,
            timestamp: Utc::now(),
        }
    }

    pub fn offline_fallback(reason: OfflineReason) -> Self {
        Self::OfflineFallback {
            reason,
            timestamp: Utc::now(),
        }
    }

    pub fn crisis_flow_entered(trigger: CrisisTrigger) -> Self {
        Self::CrisisFlowEntered {
            trigger,
            timestamp: Utc::now(),
        }
    }
}

/// Who initiated an exercise transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionTrigger {
    /// Requested by the user or synthesized from a reported intensity
    Manual,
    /// Fired by the auto-escalation timer
    Automatic,
}

impl std::fmt::Display for TransitionTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::Automatic => write!(f, "automatic"),
        }
    }
}

/// What sent the session into the crisis flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrisisTrigger {
    UserIndicated,
    ServerResources,
    Classification,
}

/// Crisis resource categories, never the resource content itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrisisResourceKind {
    Hotline,
    TextLine,
    EmergencyServices,
    Other,
}

/// Why the session went offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfflineReason {
    ConnectFailed,
    ConnectionLost,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intensity_change_delta() {
        let event = AnalyticsEvent::intensity_change(7.0, 5.5);
        match event {
            AnalyticsEvent::IntensityChange { delta, .. } => assert_eq!(delta, -1.5),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_serialized_kind_matches_kind() {
        let event = AnalyticsEvent::offline_fallback(OfflineReason::ConnectFailed);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], event.kind());
        assert_eq!(json["reason"], "connect_failed");
    }
}
