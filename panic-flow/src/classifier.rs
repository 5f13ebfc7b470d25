//! Severity classifier: deterministic mapping from observable signals to a UX state.
//!
//! Runs BEFORE the router picks an intervention. Every rule is an explicit
//! threshold check evaluated in strict priority order; the first matching rule
//! wins regardless of any other condition that may also hold.
//!
//! ```text
//! Priority | Condition                          | State
//! ---------|------------------------------------|---------
//! 1        | user indicated crisis              | Critical
//! 2        | intensity >= 9.0                   | Critical
//! 3        | previous session escalated         | Critical
//! 4        | intensity >= 8.0                   | Severe
//! 5        | first interaction > 30s            | Severe
//! 6        | intensity > 4.0                    | Moderate
//! 7        | >= 2 recent sessions               | Moderate
//! 8        | previous session abandoned         | Moderate
//! 9        | otherwise                          | Mild
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Intensity at or above which a user is always classified critical.
pub const CRITICAL_INTENSITY: f64 = 9.0;
/// Intensity at or above which a user is classified severe.
pub const SEVERE_INTENSITY: f64 = 8.0;
/// Intensity strictly above which a user is classified moderate.
pub const MODERATE_INTENSITY: f64 = 4.0;
/// Delay before the first interaction that indicates a freeze response.
pub const FREEZE_RESPONSE_MS: u64 = 30_000;
/// Number of recent sessions that counts as "frequent".
pub const FREQUENT_SESSION_COUNT: u32 = 2;

/// Classified severity tier driving intervention choice.
///
/// Variant order is the escalation direction: `Mild < Moderate < Severe < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UxState {
    Mild,
    Moderate,
    Severe,
    Critical,
}

impl UxState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mild => "mild",
            Self::Moderate => "moderate",
            Self::Severe => "severe",
            Self::Critical => "critical",
        }
    }

    /// Response urgency for consumers that prioritise by severity.
    pub fn urgency(&self) -> Urgency {
        match self {
            Self::Mild => Urgency::Elevated,
            Self::Moderate => Urgency::High,
            Self::Severe | Self::Critical => Urgency::Emergency,
        }
    }

    /// Whether moving from `self` to `to` increases severity.
    pub fn escalates_to(&self, to: UxState) -> bool {
        to > *self
    }
}

impl std::fmt::Display for UxState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Response urgency derived from a [`UxState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Routine,
    Elevated,
    High,
    Emergency,
}

/// How the user's previous session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviousOutcome {
    Resolved,
    Escalated,
    Abandoned,
    #[default]
    None,
}

impl std::fmt::Display for PreviousOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Resolved => write!(f, "resolved"),
            Self::Escalated => write!(f, "escalated"),
            Self::Abandoned => write!(f, "abandoned"),
            Self::None => write!(f, "none"),
        }
    }
}

impl std::str::FromStr for PreviousOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "resolved" => Ok(Self::Resolved),
            "escalated" => Ok(Self::Escalated),
            "abandoned" => Ok(Self::Abandoned),
            "none" => Ok(Self::None),
            _ => Err(format!("Unknown previous outcome: {}", s)),
        }
    }
}

/// Observable signals captured for one classification call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationInput {
    /// Self-reported intensity, 1 (manageable) to 10 (overwhelming)
    pub intensity: f64,
    /// Milliseconds between session start and the user's first interaction
    pub time_to_first_interaction_ms: u64,
    /// Sessions started recently by this user
    pub recent_session_count: u32,
    /// How the previous session ended
    pub previous_outcome: PreviousOutcome,
    /// The user explicitly asked for crisis help
    pub user_indicated_crisis: bool,
}

impl ClassificationInput {
    /// Input carrying only an intensity; every other signal is neutral.
    pub fn new(intensity: f64) -> Self {
        Self {
            intensity,
            time_to_first_interaction_ms: 0,
            recent_session_count: 0,
            previous_outcome: PreviousOutcome::None,
            user_indicated_crisis: false,
        }
    }

    pub fn with_time_to_first_interaction(mut self, ms: u64) -> Self {
        self.time_to_first_interaction_ms = ms;
        self
    }

    pub fn with_recent_sessions(mut self, count: u32) -> Self {
        self.recent_session_count = count;
        self
    }

    pub fn with_previous_outcome(mut self, outcome: PreviousOutcome) -> Self {
        self.previous_outcome = outcome;
        self
    }

    pub fn with_crisis_indicated(mut self, indicated: bool) -> Self {
        self.user_indicated_crisis = indicated;
        self
    }
}

/// Fixed justification codes. Tests and audits match on these, never on text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationReason {
    UserIndicatedCrisis,
    ExceedsCriticalThreshold,
    PreviousSessionEscalated,
    SeverePanic,
    FreezeResponseDelay,
    ModeratePanic,
    FrequentSessions,
    PreviousSessionAbandoned,
    ManageableDistress,
    EscalatedToCritical,
    SignificantImprovement,
    MaintainingClassification,
}

impl ClassificationReason {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UserIndicatedCrisis => "user_indicated_crisis",
            Self::ExceedsCriticalThreshold => "exceeds_critical_threshold",
            Self::PreviousSessionEscalated => "previous_session_escalated",
            Self::SeverePanic => "severe_panic",
            Self::FreezeResponseDelay => "freeze_response_delay",
            Self::ModeratePanic => "moderate_panic",
            Self::FrequentSessions => "frequent_sessions",
            Self::PreviousSessionAbandoned => "previous_session_abandoned",
            Self::ManageableDistress => "manageable_distress",
            Self::EscalatedToCritical => "escalated_to_critical",
            Self::SignificantImprovement => "significant_improvement",
            Self::MaintainingClassification => "maintaining_classification",
        }
    }

    /// Human-readable justification.
    pub fn description(&self) -> &'static str {
        match self {
            Self::UserIndicatedCrisis => "user explicitly indicated crisis",
            Self::ExceedsCriticalThreshold => "exceeds critical threshold",
            Self::PreviousSessionEscalated => "previous session escalated",
            Self::SeverePanic => "severe panic",
            Self::FreezeResponseDelay => "freeze-response delay",
            Self::ModeratePanic => "moderate panic",
            Self::FrequentSessions => "frequent sessions",
            Self::PreviousSessionAbandoned => "previous session abandoned",
            Self::ManageableDistress => "manageable distress",
            Self::EscalatedToCritical => "escalated to critical",
            Self::SignificantImprovement => "significant improvement",
            Self::MaintainingClassification => "maintaining classification",
        }
    }
}

impl std::fmt::Display for ClassificationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Output of [`Classifier::classify`] and [`Classifier::reclassify`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub state: UxState,
    pub reason: ClassificationReason,
    pub classified_at: DateTime<Utc>,
}

impl ClassificationResult {
    fn new(state: UxState, reason: ClassificationReason) -> Self {
        Self {
            state,
            reason,
            classified_at: Utc::now(),
        }
    }

    /// Compact summary for logging
    pub fn summary(&self) -> String {
        format!("state={} reason={}", self.state, self.reason.code())
    }
}

/// Stateless severity classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier;

impl Classifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify the signals captured at session start.
    ///
    /// Total: every input, including NaN intensities, yields a result.
    pub fn classify(&self, input: &ClassificationInput) -> ClassificationResult {
        use ClassificationReason as R;

        let (state, reason) = if input.user_indicated_crisis {
            (UxState::Critical, R::UserIndicatedCrisis)
        } else if input.intensity >= CRITICAL_INTENSITY {
            (UxState::Critical, R::ExceedsCriticalThreshold)
        } else if input.previous_outcome == PreviousOutcome::Escalated {
            (UxState::Critical, R::PreviousSessionEscalated)
        } else if input.intensity >= SEVERE_INTENSITY {
            (UxState::Severe, R::SeverePanic)
        } else if input.time_to_first_interaction_ms > FREEZE_RESPONSE_MS {
            (UxState::Severe, R::FreezeResponseDelay)
        } else if input.intensity > MODERATE_INTENSITY {
            (UxState::Moderate, R::ModeratePanic)
        } else if input.recent_session_count >= FREQUENT_SESSION_COUNT {
            (UxState::Moderate, R::FrequentSessions)
        } else if input.previous_outcome == PreviousOutcome::Abandoned {
            (UxState::Moderate, R::PreviousSessionAbandoned)
        } else {
            (UxState::Mild, R::ManageableDistress)
        };

        ClassificationResult::new(state, reason)
    }

    /// Re-evaluate severity mid-session from a freshly reported intensity.
    ///
    /// `_session_duration_ms` is part of the signature for duration-based
    /// policies but no rule reads it.
    pub fn reclassify(
        &self,
        current: UxState,
        new_intensity: f64,
        _session_duration_ms: u64,
    ) -> ClassificationResult {
        if new_intensity >= CRITICAL_INTENSITY {
            ClassificationResult::new(UxState::Critical, ClassificationReason::EscalatedToCritical)
        } else if new_intensity <= MODERATE_INTENSITY && current != UxState::Mild {
            ClassificationResult::new(UxState::Mild, ClassificationReason::SignificantImprovement)
        } else {
            ClassificationResult::new(current, ClassificationReason::MaintainingClassification)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(input: ClassificationInput) -> ClassificationResult {
        Classifier::new().classify(&input)
    }

    #[test]
    fn test_crisis_flag_wins_over_everything() {
        let result = classify(ClassificationInput::new(1.0).with_crisis_indicated(true));
        assert_eq!(result.state, UxState::Critical);
        assert_eq!(result.reason, ClassificationReason::UserIndicatedCrisis);
    }

    #[test]
    fn test_critical_threshold_beats_freeze_delay() {
        let result = classify(ClassificationInput::new(9.0).with_time_to_first_interaction(35_000));
        assert_eq!(result.state, UxState::Critical);
        assert_eq!(result.reason, ClassificationReason::ExceedsCriticalThreshold);
    }

    #[test]
    fn test_previous_escalation_is_critical() {
        let result =
            classify(ClassificationInput::new(2.0).with_previous_outcome(PreviousOutcome::Escalated));
        assert_eq!(result.state, UxState::Critical);
        assert_eq!(result.reason, ClassificationReason::PreviousSessionEscalated);
    }

    #[test]
    fn test_severe_beats_frequent_sessions() {
        let result = classify(ClassificationInput::new(8.0).with_recent_sessions(5));
        assert_eq!(result.state, UxState::Severe);
        assert_eq!(result.reason, ClassificationReason::SeverePanic);
    }

    #[test]
    fn test_freeze_response_delay() {
        let at_limit = classify(ClassificationInput::new(3.0).with_time_to_first_interaction(30_000));
        assert_eq!(at_limit.state, UxState::Mild);

        let over = classify(ClassificationInput::new(3.0).with_time_to_first_interaction(30_001));
        assert_eq!(over.state, UxState::Severe);
        assert_eq!(over.reason, ClassificationReason::FreezeResponseDelay);
    }

    #[test]
    fn test_moderate_boundary_is_exclusive() {
        assert_eq!(classify(ClassificationInput::new(4.0)).state, UxState::Mild);
        let result = classify(ClassificationInput::new(4.5));
        assert_eq!(result.state, UxState::Moderate);
        assert_eq!(result.reason, ClassificationReason::ModeratePanic);
    }

    #[test]
    fn test_history_signals_raise_low_intensity() {
        let frequent = classify(ClassificationInput::new(2.0).with_recent_sessions(2));
        assert_eq!(frequent.reason, ClassificationReason::FrequentSessions);

        let abandoned =
            classify(ClassificationInput::new(2.0).with_previous_outcome(PreviousOutcome::Abandoned));
        assert_eq!(abandoned.state, UxState::Moderate);
        assert_eq!(abandoned.reason, ClassificationReason::PreviousSessionAbandoned);

        let resolved =
            classify(ClassificationInput::new(2.0).with_previous_outcome(PreviousOutcome::Resolved));
        assert_eq!(resolved.state, UxState::Mild);
        assert_eq!(resolved.reason, ClassificationReason::ManageableDistress);
    }

    #[test]
    fn test_classification_is_pure_over_range() {
        let classifier = Classifier::new();
        let mut intensity = 1.0;
        while intensity <= 10.0 {
            let input = ClassificationInput::new(intensity);
            let first = classifier.classify(&input);
            let second = classifier.classify(&input);
            assert_eq!(first.state, second.state);
            assert_eq!(first.reason, second.reason);
            assert!(!first.reason.description().is_empty());
            intensity += 0.25;
        }
    }

    #[test]
    fn test_nan_intensity_still_classifies() {
        let result = classify(ClassificationInput::new(f64::NAN));
        assert_eq!(result.state, UxState::Mild);
    }

    #[test]
    fn test_reclassify_improvement() {
        let result = Classifier::new().reclassify(UxState::Severe, 3.0, 60_000);
        assert_eq!(result.state, UxState::Mild);
        assert_eq!(result.reason, ClassificationReason::SignificantImprovement);
        assert!(result.reason.to_string().contains("improvement"));
    }

    #[test]
    fn test_reclassify_escalates_to_critical() {
        let result = Classifier::new().reclassify(UxState::Moderate, 9.5, 0);
        assert_eq!(result.state, UxState::Critical);
        assert_eq!(result.reason, ClassificationReason::EscalatedToCritical);
    }

    #[test]
    fn test_reclassify_keeps_mild_and_ignores_duration() {
        let classifier = Classifier::new();
        let short = classifier.reclassify(UxState::Mild, 3.0, 0);
        let long = classifier.reclassify(UxState::Mild, 3.0, 10_000_000);
        assert_eq!(short.state, UxState::Mild);
        assert_eq!(short.reason, ClassificationReason::MaintainingClassification);
        assert_eq!(short.state, long.state);
        assert_eq!(short.reason, long.reason);
    }

    #[test]
    fn test_urgency_mapping() {
        assert_eq!(UxState::Mild.urgency(), Urgency::Elevated);
        assert_eq!(UxState::Moderate.urgency(), Urgency::High);
        assert_eq!(UxState::Critical.urgency(), Urgency::Emergency);
        assert!(UxState::Moderate.escalates_to(UxState::Severe));
        assert!(!UxState::Severe.escalates_to(UxState::Mild));
    }
}
