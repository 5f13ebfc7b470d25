//! Per-session metrics reported with the session outcome.

use serde::{Deserialize, Serialize};

use crate::router::Route;

/// Non-identifying summary of one session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionSummary {
    pub duration_ms: u64,
    pub initial_intensity: Option<f64>,
    pub peak_intensity: Option<f64>,
    pub final_intensity: Option<f64>,
    /// final - initial; negative means the user feels better
    pub intensity_delta: Option<f64>,
    /// Exercises in the order they were started
    pub exercises: Vec<Route>,
    pub transitions: u32,
    pub improved: bool,
}

impl SessionSummary {
    pub fn from_history(
        history: &[f64],
        exercises: &[Route],
        transitions: u32,
        duration_ms: u64,
    ) -> Self {
        let initial = history.first().copied();
        let last = history.last().copied();
        let peak = history.iter().copied().reduce(f64::max);
        let delta = initial.zip(last).map(|(first, last)| last - first);

        Self {
            duration_ms,
            initial_intensity: initial,
            peak_intensity: peak,
            final_intensity: last,
            intensity_delta: delta,
            exercises: exercises.to_vec(),
            transitions,
            improved: delta.is_some_and(|d| d < 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_improving_session() {
        let summary = SessionSummary::from_history(
            &[7.0, 8.5, 6.0, 3.0],
            &[Route::Breathing, Route::Grounding],
            1,
            120_000,
        );
        assert_eq!(summary.initial_intensity, Some(7.0));
        assert_eq!(summary.peak_intensity, Some(8.5));
        assert_eq!(summary.final_intensity, Some(3.0));
        assert_eq!(summary.intensity_delta, Some(-4.0));
        assert!(summary.improved);
        assert_eq!(summary.exercises.len(), 2);
    }

    #[test]
    fn test_unchanged_session_did_not_improve() {
        let summary = SessionSummary::from_history(&[5.0], &[Route::Breathing], 0, 1_000);
        assert_eq!(summary.intensity_delta, Some(0.0));
        assert!(!summary.improved);
    }

    #[test]
    fn test_empty_history() {
        let summary = SessionSummary::from_history(&[], &[], 0, 0);
        assert_eq!(summary.initial_intensity, None);
        assert_eq!(summary.peak_intensity, None);
        assert!(!summary.improved);
    }
}
