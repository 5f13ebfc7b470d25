//! Panic Flow Library
//!
//! Deterministic core of an adaptive panic-support session:
//! - Classification of self-reported intensity and context into a severity tier
//! - Table-driven routing to a guided exercise with typed per-route configuration
//! - A single-writer session state machine with timed auto-escalation
//! - Offline degradation whenever the backend is unreachable
//!
//! # Modules
//!
//! - [`classifier`]: `UxState` classification and mid-session reclassification
//! - [`router`]: route table, auto-escalation policy, `RoutingDecision`
//! - [`session`]: state machine, runtime actor, snapshots
//! - [`connectivity`]: the backend port and an in-memory loopback
//! - [`analytics`]: write-only analytics sink, bus and listeners
//!
//! # Usage
//!
//! ```bash
//! # Classify one set of signals
//! panic-flow classify --intensity 7.5 --recent-sessions 3
//!
//! # Drive a scripted session against the loopback port
//! RUST_LOG=panic_flow=debug panic-flow simulate --intensity 6 --steps 6.5,5,3
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod analytics;
pub mod classifier;
pub mod connectivity;
pub mod router;
pub mod session;

// Re-export classifier types
pub use classifier::{
    ClassificationInput, ClassificationReason, ClassificationResult, Classifier, PreviousOutcome,
    Urgency, UxState,
};

// Re-export routing types
pub use router::{
    AutoEscalationPolicy, Route, RouteConfig, Router, RoutingDecision, RoutingReason,
};

// Re-export session types
pub use session::{
    SessionConfig, SessionError, SessionEvent, SessionHandle, SessionPhase, SessionRuntime,
    SessionState, SessionStateMachine, SessionSummary,
};

// Re-export connectivity types
pub use connectivity::{
    ConnectionState, ConnectivityError, ConnectivityPort, LoopbackConnectivity, SharedConnectivity,
};

// Re-export analytics types
pub use analytics::{AnalyticsBus, AnalyticsEvent, AnalyticsSink, SharedAnalytics, TracingSink};
