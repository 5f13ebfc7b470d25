//! Routes and their closed, per-route configuration bundles.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::UxState;

/// Default auto-escalation delay when a breathing config enables it without a delay.
pub const DEFAULT_AUTO_ESCALATE_AFTER_MS: u64 = 45_000;

/// Minimum time the hold route stays on screen.
pub const HOLD_MIN_DURATION_MS: u64 = 30_000;

/// Intervention routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Breathing,
    Grounding,
    Hold,
    Crisis,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Breathing => "breathing",
            Self::Grounding => "grounding",
            Self::Hold => "hold",
            Self::Crisis => "crisis",
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Route {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "breathing" => Ok(Self::Breathing),
            "grounding" => Ok(Self::Grounding),
            "hold" => Ok(Self::Hold),
            "crisis" => Ok(Self::Crisis),
            _ => Err(format!("Unknown route: {}", s)),
        }
    }
}

/// Pacing of a breathing exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tempo {
    Normal,
    Slow,
}

/// Visual/verbal tone of the hold route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Minimal,
    Standard,
}

/// How a route change is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionStyle {
    Gentle,
}

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("breath phase '{phase}' must last at least one second")]
    ZeroBreathPhase { phase: &'static str },

    #[error("auto-escalation delay set while auto-escalation is disabled")]
    DelayWithoutAutoEscalate,

    #[error("auto-escalation delay must be positive")]
    ZeroAutoEscalateDelay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreathingConfig {
    pub tempo: Tempo,
    pub auto_escalate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_escalate_after_ms: Option<u64>,
    pub inhale_secs: u32,
    pub hold_secs: u32,
    pub exhale_secs: u32,
}

impl BreathingConfig {
    /// Validated constructor.
    pub fn new(
        tempo: Tempo,
        auto_escalate: bool,
        auto_escalate_after_ms: Option<u64>,
        (inhale_secs, hold_secs, exhale_secs): (u32, u32, u32),
    ) -> Result<Self, ConfigError> {
        for (phase, secs) in [("inhale", inhale_secs), ("hold", hold_secs), ("exhale", exhale_secs)] {
            if secs == 0 {
                return Err(ConfigError::ZeroBreathPhase { phase });
            }
        }
        match (auto_escalate, auto_escalate_after_ms) {
            (false, Some(_)) => return Err(ConfigError::DelayWithoutAutoEscalate),
            (true, Some(0)) => return Err(ConfigError::ZeroAutoEscalateDelay),
            _ => {}
        }
        Ok(Self {
            tempo,
            auto_escalate,
            auto_escalate_after_ms,
            inhale_secs,
            hold_secs,
            exhale_secs,
        })
    }

    /// 4-4-6 at normal tempo, no auto-escalation.
    pub fn normal() -> Self {
        Self {
            tempo: Tempo::Normal,
            auto_escalate: false,
            auto_escalate_after_ms: None,
            inhale_secs: 4,
            hold_secs: 4,
            exhale_secs: 6,
        }
    }

    /// 5-5-7 at slow tempo, escalating after 45s without improvement.
    pub fn slow() -> Self {
        Self {
            tempo: Tempo::Slow,
            auto_escalate: true,
            auto_escalate_after_ms: Some(DEFAULT_AUTO_ESCALATE_AFTER_MS),
            inhale_secs: 5,
            hold_secs: 5,
            exhale_secs: 7,
        }
    }

    /// One full breath in seconds.
    pub fn cycle_secs(&self) -> u32 {
        self.inhale_secs + self.hold_secs + self.exhale_secs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroundingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<TransitionStyle>,
    pub skip_intro: bool,
}

impl GroundingConfig {
    /// Entered from breathing by auto-escalation.
    pub fn escalated() -> Self {
        Self {
            transition: Some(TransitionStyle::Gentle),
            skip_intro: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldConfig {
    pub min_duration_ms: u64,
    pub show_exercise_option: bool,
    pub tone: Tone,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<TransitionStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_exercise: Option<Route>,
}

impl HoldConfig {
    pub fn standard() -> Self {
        Self {
            min_duration_ms: HOLD_MIN_DURATION_MS,
            show_exercise_option: true,
            tone: Tone::Minimal,
            transition: None,
            from_exercise: None,
        }
    }

    /// Entered from a non-breathing exercise by auto-escalation.
    pub fn escalated_from(exercise: Route) -> Self {
        Self {
            transition: Some(TransitionStyle::Gentle),
            from_exercise: Some(exercise),
            ..Self::standard()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrisisConfig {
    pub show_hotlines: bool,
    pub emphasize_human: bool,
    pub allow_exercise_fallback: bool,
}

impl CrisisConfig {
    pub fn standard() -> Self {
        Self {
            show_hotlines: true,
            emphasize_human: true,
            allow_exercise_fallback: true,
        }
    }
}

/// Configuration bundle, one variant per route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RouteConfig {
    Breathing(BreathingConfig),
    Grounding(GroundingConfig),
    Hold(HoldConfig),
    Crisis(CrisisConfig),
}

impl RouteConfig {
    /// The fixed severity → configuration table.
    pub fn for_state(state: UxState) -> Self {
        match state {
            UxState::Mild => Self::Breathing(BreathingConfig::normal()),
            UxState::Moderate => Self::Breathing(BreathingConfig::slow()),
            UxState::Severe => Self::Hold(HoldConfig::standard()),
            UxState::Critical => Self::Crisis(CrisisConfig::standard()),
        }
    }

    /// Plain configuration for a route entered without a routing decision.
    pub fn standard(route: Route) -> Self {
        match route {
            Route::Breathing => Self::Breathing(BreathingConfig::normal()),
            Route::Grounding => Self::Grounding(GroundingConfig::default()),
            Route::Hold => Self::Hold(HoldConfig::standard()),
            Route::Crisis => Self::Crisis(CrisisConfig::standard()),
        }
    }

    pub fn route(&self) -> Route {
        match self {
            Self::Breathing(_) => Route::Breathing,
            Self::Grounding(_) => Route::Grounding,
            Self::Hold(_) => Route::Hold,
            Self::Crisis(_) => Route::Crisis,
        }
    }

    /// Delay for the auto-escalation timer, if this configuration arms one.
    pub fn auto_escalate_after(&self) -> Option<Duration> {
        match self {
            Self::Breathing(cfg) if cfg.auto_escalate => Some(Duration::from_millis(
                cfg.auto_escalate_after_ms
                    .unwrap_or(DEFAULT_AUTO_ESCALATE_AFTER_MS),
            )),
            _ => None,
        }
    }

    pub fn as_breathing(&self) -> Option<&BreathingConfig> {
        match self {
            Self::Breathing(cfg) => Some(cfg),
            _ => None,
        }
    }

    pub fn as_hold(&self) -> Option<&HoldConfig> {
        match self {
            Self::Hold(cfg) => Some(cfg),
            _ => None,
        }
    }
}
