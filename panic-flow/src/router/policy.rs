//! Router: deterministic route selection and auto-escalation policy
//!
//! Consumes classifier output and session signals to produce
//! RoutingDecisions. No inference happens here: every decision is a table
//! lookup or an explicit threshold check.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analytics::{AnalyticsEvent, SharedAnalytics};
use crate::classifier::{ClassificationInput, ClassificationReason, Classifier, UxState};
use crate::router::config::{
    GroundingConfig, HoldConfig, Route, RouteConfig, DEFAULT_AUTO_ESCALATE_AFTER_MS,
};

/// Why a routing decision was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum RoutingReason {
    /// First route of a session, straight from the severity table
    InitialClassification { classification: ClassificationReason },
    /// Mid-session reclassification changed the severity
    Reclassified { classification: ClassificationReason },
    /// Time elapsed in a moderate exercise without improvement
    AutoEscalated,
    /// Nothing changed
    ContinuingCurrentExercise,
}

impl std::fmt::Display for RoutingReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InitialClassification { classification } => {
                write!(f, "initial classification: {}", classification)
            }
            Self::Reclassified { classification } => write!(f, "reclassified: {}", classification),
            Self::AutoEscalated => write!(f, "auto-escalated: no improvement"),
            Self::ContinuingCurrentExercise => write!(f, "continuing current exercise"),
        }
    }
}

/// Decision produced by the Router
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Route the session should be on
    pub route: Route,
    /// Severity the decision was made for
    pub source_state: UxState,
    /// Typed configuration for `route`
    pub config: RouteConfig,
    /// Reason for the decision
    pub reason: RoutingReason,
    pub decided_at: DateTime<Utc>,
}

impl RoutingDecision {
    fn new(source_state: UxState, config: RouteConfig, reason: RoutingReason) -> Self {
        Self {
            route: config.route(),
            source_state,
            config,
            reason,
            decided_at: Utc::now(),
        }
    }

    /// Whether following this decision means leaving `current`.
    pub fn changes_route(&self, current: Route) -> bool {
        self.route != current
    }

    /// Get a compact summary for logging
    pub fn summary(&self) -> String {
        format!(
            "route={} state={} reason={}",
            self.route, self.source_state, self.reason
        )
    }
}

/// Auto-escalation thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutoEscalationPolicy {
    /// Exercise duration that must be exceeded before escalating
    pub after_ms: u64,
    /// Intensity that must be exceeded for escalation to apply
    pub min_intensity: f64,
}

impl Default for AutoEscalationPolicy {
    fn default() -> Self {
        Self {
            after_ms: DEFAULT_AUTO_ESCALATE_AFTER_MS,
            min_intensity: 5.0,
        }
    }
}

/// The Router: stateless apart from the injected analytics sink
#[derive(Clone)]
pub struct Router {
    classifier: Classifier,
    policy: AutoEscalationPolicy,
    analytics: SharedAnalytics,
}

impl Router {
    pub fn new(analytics: SharedAnalytics) -> Self {
        Self::with_policy(analytics, AutoEscalationPolicy::default())
    }

    pub fn with_policy(analytics: SharedAnalytics, policy: AutoEscalationPolicy) -> Self {
        Self {
            classifier: Classifier::new(),
            policy,
            analytics,
        }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn policy(&self) -> &AutoEscalationPolicy {
        &self.policy
    }

    /// Classify the session-start signals and pick the first route.
    pub fn determine_initial_route(&self, input: &ClassificationInput) -> RoutingDecision {
        let classification = self.classifier.classify(input);
        self.analytics.record(AnalyticsEvent::Classification {
            state: classification.state,
            reason: classification.reason,
            intensity: input.intensity,
            timestamp: classification.classified_at,
        });

        let decision = RoutingDecision::new(
            classification.state,
            RouteConfig::for_state(classification.state),
            RoutingReason::InitialClassification {
                classification: classification.reason,
            },
        );
        self.record_decision(&decision);

        info!(
            intensity = input.intensity,
            state = %decision.source_state,
            route = %decision.route,
            reason = classification.reason.code(),
            "Initial route determined"
        );
        decision
    }

    /// Decide what happens next while an exercise is running.
    ///
    /// 1. A changed reclassification re-enters through the severity table.
    /// 2. Otherwise a stalled moderate breathing exercise auto-escalates.
    /// 3. Otherwise the current exercise continues.
    pub fn determine_transition(
        &self,
        current_state: UxState,
        current_intensity: f64,
        exercise_duration_ms: u64,
        current_exercise: Route,
    ) -> RoutingDecision {
        let reclassified =
            self.classifier
                .reclassify(current_state, current_intensity, exercise_duration_ms);

        if reclassified.state != current_state {
            let decision = RoutingDecision::new(
                reclassified.state,
                RouteConfig::for_state(reclassified.state),
                RoutingReason::Reclassified {
                    classification: reclassified.reason,
                },
            );
            info!(
                from = %current_state,
                to = %reclassified.state,
                route = %decision.route,
                "Reclassified mid-session"
            );
            self.record_decision(&decision);
            return decision;
        }

        if self.should_auto_escalate(
            current_state,
            current_intensity,
            exercise_duration_ms,
            current_exercise,
        ) {
            let decision = self.escalation_step(current_state, current_exercise);
            info!(
                from = %current_exercise,
                to = %decision.route,
                duration_ms = exercise_duration_ms,
                intensity = current_intensity,
                "Auto-escalating exercise"
            );
            self.record_decision(&decision);
            return decision;
        }

        debug!(
            state = %current_state,
            exercise = %current_exercise,
            "Continuing current exercise"
        );
        RoutingDecision::new(
            current_state,
            RouteConfig::standard(current_exercise),
            RoutingReason::ContinuingCurrentExercise,
        )
    }

    /// Auto-escalation trigger: moderate, breathing, stalled and not improving.
    pub fn should_auto_escalate(
        &self,
        current_state: UxState,
        current_intensity: f64,
        exercise_duration_ms: u64,
        current_exercise: Route,
    ) -> bool {
        current_state == UxState::Moderate
            && current_exercise == Route::Breathing
            && exercise_duration_ms > self.policy.after_ms
            && current_intensity > self.policy.min_intensity
    }

    /// One escalation step from `current_exercise`.
    ///
    /// Breathing steps to grounding; everything else steps to hold. Crisis is
    /// never reachable this way.
    pub fn escalation_step(&self, current_state: UxState, current_exercise: Route) -> RoutingDecision {
        let config = match current_exercise {
            Route::Breathing => RouteConfig::Grounding(GroundingConfig::escalated()),
            other => RouteConfig::Hold(HoldConfig::escalated_from(other)),
        };
        RoutingDecision::new(current_state, config, RoutingReason::AutoEscalated)
    }

    /// Escalation requested by the session's auto-escalation timer.
    ///
    /// The timer only knows that time ran out; the step applies only while
    /// the user still reports more than the policy's minimum intensity.
    pub fn determine_timed_escalation(
        &self,
        current_state: UxState,
        current_intensity: f64,
        current_exercise: Route,
    ) -> Option<RoutingDecision> {
        if current_intensity <= self.policy.min_intensity {
            debug!(
                intensity = current_intensity,
                exercise = %current_exercise,
                "Timer fired but intensity improved; not escalating"
            );
            return None;
        }

        let decision = self.escalation_step(current_state, current_exercise);
        info!(
            from = %current_exercise,
            to = %decision.route,
            intensity = current_intensity,
            "Timer auto-escalation"
        );
        self.record_decision(&decision);
        Some(decision)
    }

    fn record_decision(&self, decision: &RoutingDecision) {
        self.analytics.record(AnalyticsEvent::RoutingDecision {
            route: decision.route,
            source_state: decision.source_state,
            reason: decision.reason,
            timestamp: decision.decided_at,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{AnalyticsBus, NoopSink};
    use crate::router::config::Tone;
    use std::sync::Arc;

    fn router() -> Router {
        Router::new(Arc::new(NoopSink))
    }

    #[test]
    fn test_mild_initial_route() {
        let decision = router().determine_initial_route(&ClassificationInput::new(3.0));
        assert_eq!(decision.route, Route::Breathing);
        let cfg = decision.config.as_breathing().unwrap();
        assert!(!cfg.auto_escalate);
        assert_eq!(cfg.inhale_secs, 4);
        assert_eq!(cfg.hold_secs, 4);
        assert_eq!(cfg.exhale_secs, 6);
    }

    #[test]
    fn test_moderate_initial_route() {
        let decision = router().determine_initial_route(&ClassificationInput::new(5.5));
        assert_eq!(decision.route, Route::Breathing);
        assert_eq!(decision.source_state, UxState::Moderate);
        let cfg = decision.config.as_breathing().unwrap();
        assert!(cfg.auto_escalate);
        assert_eq!(cfg.auto_escalate_after_ms, Some(45_000));
    }

    #[test]
    fn test_severe_initial_route() {
        let decision = router().determine_initial_route(&ClassificationInput::new(8.0));
        assert_eq!(decision.route, Route::Hold);
        let hold = decision.config.as_hold().unwrap();
        assert_eq!(hold.min_duration_ms, 30_000);
        assert!(hold.show_exercise_option);
        assert_eq!(hold.tone, Tone::Minimal);
    }

    #[test]
    fn test_critical_initial_routes() {
        let r = router();
        assert_eq!(
            r.determine_initial_route(&ClassificationInput::new(9.5)).route,
            Route::Crisis
        );
        assert_eq!(
            r.determine_initial_route(&ClassificationInput::new(2.0).with_crisis_indicated(true))
                .route,
            Route::Crisis
        );
    }

    #[test]
    fn test_initial_route_emits_classification_then_decision() {
        let bus = AnalyticsBus::new().shared();
        let mut rx = bus.subscribe();
        let r = Router::new(bus.clone());

        r.determine_initial_route(&ClassificationInput::new(6.0));

        assert_eq!(rx.try_recv().unwrap().kind(), "classification");
        assert_eq!(rx.try_recv().unwrap().kind(), "routing_decision");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_auto_escalation_to_grounding() {
        let decision = router().determine_transition(UxState::Moderate, 6.0, 50_000, Route::Breathing);
        assert_eq!(decision.route, Route::Grounding);
        assert_eq!(decision.reason, RoutingReason::AutoEscalated);
        assert_eq!(
            decision.config,
            RouteConfig::Grounding(GroundingConfig::escalated())
        );
    }

    #[test]
    fn test_improvement_blocks_auto_escalation() {
        let decision = router().determine_transition(UxState::Moderate, 4.0, 50_000, Route::Breathing);
        assert_eq!(decision.route, Route::Breathing);
        assert_ne!(decision.reason, RoutingReason::AutoEscalated);
        assert_eq!(decision.source_state, UxState::Mild);
    }

    #[test]
    fn test_intensity_at_threshold_does_not_escalate() {
        let decision = router().determine_transition(UxState::Moderate, 5.0, 50_000, Route::Breathing);
        assert_eq!(decision.route, Route::Breathing);
        assert_eq!(decision.reason, RoutingReason::ContinuingCurrentExercise);
    }

    #[test]
    fn test_duration_must_exceed_threshold() {
        let decision = router().determine_transition(UxState::Moderate, 7.0, 45_000, Route::Breathing);
        assert_eq!(decision.reason, RoutingReason::ContinuingCurrentExercise);
    }

    #[test]
    fn test_never_auto_escalates_from_mild_or_severe() {
        let r = router();
        for duration in [0, 46_000, 600_000] {
            for intensity in [5.5, 7.0, 8.5] {
                let mild = r.determine_transition(UxState::Mild, intensity, duration, Route::Breathing);
                assert_ne!(mild.reason, RoutingReason::AutoEscalated);
                let severe = r.determine_transition(UxState::Severe, intensity, duration, Route::Breathing);
                assert_ne!(severe.reason, RoutingReason::AutoEscalated);
            }
        }
    }

    #[test]
    fn test_reclassification_routes_through_table() {
        let r = router();
        let critical = r.determine_transition(UxState::Moderate, 9.5, 1_000, Route::Breathing);
        assert_eq!(critical.route, Route::Crisis);
        assert_eq!(critical.config, RouteConfig::for_state(UxState::Critical));

        let improved = r.determine_transition(UxState::Severe, 3.0, 1_000, Route::Hold);
        assert_eq!(improved.route, Route::Breathing);
        assert_eq!(improved.config, RouteConfig::for_state(UxState::Mild));
    }

    #[test]
    fn test_escalation_step_never_reaches_crisis() {
        let r = router();
        for exercise in [Route::Breathing, Route::Grounding, Route::Hold, Route::Crisis] {
            let decision = r.escalation_step(UxState::Moderate, exercise);
            assert_ne!(decision.route, Route::Crisis);
        }
        let from_grounding = r.escalation_step(UxState::Moderate, Route::Grounding);
        assert_eq!(from_grounding.route, Route::Hold);
        assert_eq!(
            from_grounding.config.as_hold().unwrap().from_exercise,
            Some(Route::Grounding)
        );
    }

    #[test]
    fn test_timed_escalation_requires_intensity() {
        let r = router();
        assert!(r
            .determine_timed_escalation(UxState::Moderate, 5.0, Route::Breathing)
            .is_none());
        let decision = r
            .determine_timed_escalation(UxState::Moderate, 6.5, Route::Breathing)
            .unwrap();
        assert_eq!(decision.route, Route::Grounding);
        assert_eq!(decision.reason, RoutingReason::AutoEscalated);
    }

    #[test]
    fn test_continuing_decision_is_not_a_change() {
        let decision = router().determine_transition(UxState::Severe, 8.5, 10_000, Route::Hold);
        assert!(!decision.changes_route(Route::Hold));
        assert_eq!(decision.reason.to_string(), "continuing current exercise");
    }
}
