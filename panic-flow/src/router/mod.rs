//! Intervention Router
//!
//! Routes a classified session to an intervention based on:
//! - Initial severity (fixed table)
//! - Mid-session reclassification
//! - Time spent in an exercise without improvement (auto-escalation)
//!
//! # Routing Table
//!
//! ```text
//! UX state  | Route     | Escalation
//! ----------|-----------|------------------------------
//! Mild      | breathing | none
//! Moderate  | breathing | → grounding after 45s, >5.0
//! Severe    | hold      | none
//! Critical  | crisis    | none
//! ```

pub mod config;
pub mod policy;

pub use config::{
    BreathingConfig, ConfigError, CrisisConfig, GroundingConfig, HoldConfig, Route, RouteConfig,
    Tempo, Tone, TransitionStyle, DEFAULT_AUTO_ESCALATE_AFTER_MS,
};
pub use policy::{AutoEscalationPolicy, Router, RoutingDecision, RoutingReason};
