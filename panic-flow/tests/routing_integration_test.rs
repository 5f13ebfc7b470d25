//! Integration tests for classification and routing
//!
//! Exercises the classify → route → transition flow through the public API,
//! including the analytics the router records along the way.

use std::sync::Arc;

use panic_flow::analytics::{AnalyticsBus, AnalyticsEvent, NoopSink};
use panic_flow::classifier::{ClassificationInput, ClassificationReason, Classifier, PreviousOutcome, UxState};
use panic_flow::router::{Route, RouteConfig, Router, RoutingReason};

fn router() -> Router {
    Router::new(Arc::new(NoopSink))
}

/// Test: every intensity from 1.0 to 10.0 in 0.5 steps lands on a valid route
#[test]
fn test_intensity_sweep_always_routes() {
    let r = router();
    let mut intensity = 1.0;
    while intensity <= 10.0 {
        let decision = r.determine_initial_route(&ClassificationInput::new(intensity));
        let expected = match intensity {
            i if i >= 9.0 => Route::Crisis,
            i if i >= 8.0 => Route::Hold,
            _ => Route::Breathing,
        };
        assert_eq!(decision.route, expected, "intensity {}", intensity);
        assert_eq!(decision.config.route(), decision.route);
        intensity += 0.5;
    }
}

/// Test: classification is pure and always carries a reason
#[test]
fn test_classification_is_deterministic() {
    let classifier = Classifier::new();
    for tenths in 10..=100 {
        let input = ClassificationInput::new(tenths as f64 / 10.0)
            .with_recent_sessions(tenths % 4)
            .with_time_to_first_interaction((tenths as u64) * 500);
        let first = classifier.classify(&input);
        let second = classifier.classify(&input);
        assert_eq!(first.state, second.state);
        assert_eq!(first.reason, second.reason);
        assert!(!first.reason.description().is_empty());
    }
}

/// Test: higher-priority rules win over lower ones
#[test]
fn test_priority_ordering() {
    let classifier = Classifier::new();

    let frozen_but_critical = classifier
        .classify(&ClassificationInput::new(9.0).with_time_to_first_interaction(35_000));
    assert_eq!(frozen_but_critical.state, UxState::Critical);

    let frequent_but_severe =
        classifier.classify(&ClassificationInput::new(8.0).with_recent_sessions(5));
    assert_eq!(frequent_but_severe.state, UxState::Severe);

    let escalated_before = classifier.classify(
        &ClassificationInput::new(3.0).with_previous_outcome(PreviousOutcome::Escalated),
    );
    assert_eq!(escalated_before.state, UxState::Critical);
    assert_eq!(escalated_before.reason, ClassificationReason::PreviousSessionEscalated);
}

/// Test: configuration bundles for each initial severity
#[test]
fn test_initial_route_configurations() {
    let r = router();

    let mild = r.determine_initial_route(&ClassificationInput::new(3.0));
    let breathing = mild.config.as_breathing().unwrap();
    assert!(!breathing.auto_escalate);
    assert_eq!(breathing.inhale_secs, 4);

    let moderate = r.determine_initial_route(&ClassificationInput::new(5.5));
    let breathing = moderate.config.as_breathing().unwrap();
    assert!(breathing.auto_escalate);
    assert_eq!(breathing.auto_escalate_after_ms, Some(45_000));

    let severe = r.determine_initial_route(&ClassificationInput::new(8.0));
    assert_eq!(severe.route, Route::Hold);
    assert_eq!(severe.config.as_hold().unwrap().min_duration_ms, 30_000);

    let crisis = r.determine_initial_route(&ClassificationInput::new(4.0).with_crisis_indicated(true));
    assert_eq!(crisis.route, Route::Crisis);
}

/// Test: a stalled moderate session escalates exactly one step
#[test]
fn test_auto_escalation_path() {
    let r = router();

    let escalated = r.determine_transition(UxState::Moderate, 6.0, 50_000, Route::Breathing);
    assert_eq!(escalated.route, Route::Grounding);
    assert_eq!(escalated.reason, RoutingReason::AutoEscalated);

    let improved = r.determine_transition(UxState::Moderate, 4.0, 50_000, Route::Breathing);
    assert_eq!(improved.route, Route::Breathing);

    for intensity in [1.0, 5.5, 8.0] {
        for duration in [0, 50_000, 1_000_000] {
            let decision = r.determine_transition(UxState::Mild, intensity, duration, Route::Breathing);
            assert_ne!(decision.reason, RoutingReason::AutoEscalated);
        }
    }
}

/// Test: reclassification re-enters through the severity table
#[test]
fn test_reclassification() {
    let classifier = Classifier::new();

    let improved = classifier.reclassify(UxState::Severe, 3.0, 60_000);
    assert_eq!(improved.state, UxState::Mild);
    assert_eq!(improved.reason, ClassificationReason::SignificantImprovement);
    assert!(improved.reason.description().contains("improvement"));

    let critical = classifier.reclassify(UxState::Moderate, 9.5, 60_000);
    assert_eq!(critical.state, UxState::Critical);

    let decision = router().determine_transition(UxState::Moderate, 9.5, 10_000, Route::Breathing);
    assert_eq!(decision.config, RouteConfig::for_state(UxState::Critical));
}

/// Test: the router records classification and routing decisions, but not no-ops
#[test]
fn test_router_analytics() {
    let bus = AnalyticsBus::new().shared();
    let mut rx = bus.subscribe();
    let r = Router::new(bus.clone());

    r.determine_initial_route(&ClassificationInput::new(7.0));
    r.determine_transition(UxState::Moderate, 6.0, 1_000, Route::Breathing);
    r.determine_transition(UxState::Moderate, 6.0, 50_000, Route::Breathing);

    let events: Vec<AnalyticsEvent> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
    let kinds: Vec<_> = events.iter().map(|e| e.kind()).collect();
    assert_eq!(kinds, vec!["classification", "routing_decision", "routing_decision"]);

    match &events[2] {
        AnalyticsEvent::RoutingDecision { route, reason, .. } => {
            assert_eq!(*route, Route::Grounding);
            assert_eq!(*reason, RoutingReason::AutoEscalated);
        }
        other => panic!("unexpected event {:?}", other),
    }
}
