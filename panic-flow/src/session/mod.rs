//! Session State Machine
//!
//! Owns one panic session from trigger to resolution:
//! - [`SessionStateMachine`]: the single writer of [`SessionState`]
//! - [`SessionRuntime`]: runs the machine as an actor behind a [`SessionHandle`]
//! - [`EscalationTimer`]: the one cancellable auto-escalation timer
//! - [`FallbackCycle`]: local reassurance while offline

pub mod config;
pub mod event;
pub mod fallback;
pub mod machine;
pub mod runtime;
pub mod state;
pub mod summary;
pub mod timer;

pub use config::SessionConfig;
pub use event::SessionEvent;
pub use fallback::{FallbackCycle, FALLBACK_MESSAGES, OFFLINE_MESSAGE};
pub use machine::{is_legal_transition, PhaseTransition, SessionStateMachine};
pub use runtime::{SessionError, SessionHandle, SessionResult, SessionRuntime};
pub use state::{ActiveExercise, SessionPhase, SessionState, DEFAULT_INTENSITY};
pub use summary::SessionSummary;
pub use timer::EscalationTimer;
