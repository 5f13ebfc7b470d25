//! Analytics port
//!
//! Write-only observability for the session core. Producers (router, state
//! machine) hold an injected [`SharedAnalytics`] and call `record`; nothing a
//! consumer does can reach back into the producer.
//!
//! ```text
//! ┌──────────────┐     ┌───────────────┐     ┌──────────────────┐
//! │ Router /     │────▶│ AnalyticsSink │────▶│ listener tasks   │
//! │ StateMachine │     │ (bus, tracing)│     │ (one per reader) │
//! └──────────────┘     └───────────────┘     └──────────────────┘
//! ```

pub mod bus;
pub mod sink;
pub mod types;

pub use bus::{AnalyticsBus, AnalyticsFilter, FilteredReceiver, SharedAnalyticsBus};
pub use sink::{AnalyticsSink, FanoutSink, NoopSink, SharedAnalytics, TracingSink};
pub use types::{
    AnalyticsEvent, CrisisResourceKind, CrisisTrigger, OfflineReason, TransitionTrigger,
};
