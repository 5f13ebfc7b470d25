//! Session timing and identity, read from the environment.

use std::time::Duration;

use tracing::warn;

const DEFAULT_SETTLE_MS: u64 = 500;
const DEFAULT_CALMING_MS: u64 = 2_000;
const DEFAULT_RESET_MS: u64 = 3_000;
const DEFAULT_USER_ID: &str = "anonymous";

/// Fixed delays between session phases plus the id handed to the port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Pause between leaving one exercise and starting the next
    pub settle_delay: Duration,
    /// Time spent in `calming` before `resolved`
    pub calming_delay: Duration,
    /// Time spent in `resolved` before the session is reinitialized
    pub reset_delay: Duration,
    pub user_id: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            settle_delay: env_ms("PANIC_FLOW_SETTLE_MS", DEFAULT_SETTLE_MS),
            calming_delay: env_ms("PANIC_FLOW_CALMING_MS", DEFAULT_CALMING_MS),
            reset_delay: env_ms("PANIC_FLOW_RESET_MS", DEFAULT_RESET_MS),
            user_id: std::env::var("PANIC_FLOW_USER_ID")
                .unwrap_or_else(|_| DEFAULT_USER_ID.to_string()),
        }
    }
}

impl SessionConfig {
    /// Built-in delays, ignoring the environment.
    pub fn standard(user_id: impl Into<String>) -> Self {
        Self {
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_MS),
            calming_delay: Duration::from_millis(DEFAULT_CALMING_MS),
            reset_delay: Duration::from_millis(DEFAULT_RESET_MS),
            user_id: user_id.into(),
        }
    }

    /// No delays at all. Useful for tests that don't care about pacing.
    pub fn immediate(user_id: impl Into<String>) -> Self {
        Self {
            settle_delay: Duration::ZERO,
            calming_delay: Duration::ZERO,
            reset_delay: Duration::ZERO,
            user_id: user_id.into(),
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }
}

fn env_ms(key: &str, default: u64) -> Duration {
    let millis = match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, default, "Ignoring invalid duration");
            default
        }),
        Err(_) => default,
    };
    Duration::from_millis(millis)
}
