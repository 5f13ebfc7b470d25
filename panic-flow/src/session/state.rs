//! Session state: the aggregate root handed to renderers as immutable snapshots.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classifier::{PreviousOutcome, UxState};
use crate::router::{Route, RouteConfig, RoutingDecision};

/// Reported intensity before the user says anything.
pub const DEFAULT_INTENSITY: f64 = 5.0;

/// Lowest and highest accepted intensity.
pub const INTENSITY_RANGE: (f64, f64) = (1.0, 10.0);

/// Session phases.
///
/// Primary sequence: `Idle → Entering → Routing → Active ⇄ Transitioning →
/// Calming → Resolved`. `Escalated` is the crisis side branch; offline is an
/// overlay flag on [`SessionState`], not a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    Entering,
    Routing,
    Active,
    Transitioning,
    Calming,
    Resolved,
    Escalated,
}

impl SessionPhase {
    /// Between trigger and exit.
    pub fn in_session(self) -> bool {
        !matches!(self, Self::Idle | Self::Calming | Self::Resolved)
    }

    /// Phases where exercise events and transitions are accepted.
    pub fn accepts_exercise_events(self) -> bool {
        matches!(self, Self::Active | Self::Escalated)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Entering => "entering",
            Self::Routing => "routing",
            Self::Active => "active",
            Self::Transitioning => "transitioning",
            Self::Calming => "calming",
            Self::Resolved => "resolved",
            Self::Escalated => "escalated",
        };
        write!(f, "{}", name)
    }
}

/// The exercise currently on screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveExercise {
    pub kind: Route,
    pub started_at: DateTime<Utc>,
    pub cycles: u32,
    pub config: RouteConfig,
}

impl ActiveExercise {
    pub fn start(config: RouteConfig) -> Self {
        Self {
            kind: config.route(),
            started_at: Utc::now(),
            cycles: 0,
            config,
        }
    }
}

/// One session's complete state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub ux_state: Option<UxState>,
    pub routing_decision: Option<RoutingDecision>,
    pub active_exercise: Option<ActiveExercise>,
    pub reported_intensity: f64,
    /// Append-only during a session
    pub intensity_history: Vec<f64>,
    pub is_connected: bool,
    pub voice_enabled: bool,
    pub recent_session_count: u32,
    pub previous_outcome: PreviousOutcome,
    /// Offline banner shown while the backend is unreachable
    pub fallback_message: Option<String>,
    /// Latest supportive message, from the backend or the offline cycle
    pub current_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub time_to_first_interaction_ms: Option<u64>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            ux_state: None,
            routing_decision: None,
            active_exercise: None,
            reported_intensity: DEFAULT_INTENSITY,
            intensity_history: Vec::new(),
            is_connected: false,
            voice_enabled: false,
            recent_session_count: 0,
            previous_outcome: PreviousOutcome::None,
            fallback_message: None,
            current_message: None,
            started_at: None,
            time_to_first_interaction_ms: None,
        }
    }

    /// Fresh idle state for the next session, carrying only history signals forward.
    pub fn reinitialized(&self, outcome: PreviousOutcome) -> Self {
        Self {
            recent_session_count: self.recent_session_count.saturating_add(1),
            previous_outcome: outcome,
            ..Self::new()
        }
    }

    /// Connectivity lost during a session; local support only.
    pub fn is_offline(&self) -> bool {
        self.phase.in_session() && !self.is_connected
    }

    pub fn current_route(&self) -> Option<Route> {
        self.active_exercise.as_ref().map(|e| e.kind)
    }

    /// Get a summary for logging
    pub fn summary(&self) -> String {
        format!(
            "phase={} ux={} exercise={} intensity={} connected={}",
            self.phase,
            self.ux_state.map(|s| s.to_string()).unwrap_or_else(|| "-".into()),
            self.current_route()
                .map(|r| r.to_string())
                .unwrap_or_else(|| "-".into()),
            self.reported_intensity,
            self.is_connected,
        )
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Clamp a reported intensity into range. NaN is rejected.
pub fn normalize_intensity(value: f64) -> Option<f64> {
    if value.is_nan() {
        None
    } else {
        Some(value.clamp(INTENSITY_RANGE.0, INTENSITY_RANGE.1))
    }
}
