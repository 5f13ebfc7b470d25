//! Port-side reconnection backoff.
//!
//! The session core never retries on its own; it only reacts to the
//! connection-state stream. Port implementations use this schedule.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ConnectivityError, ConnectivityPort, ConnectivityResult};

/// Exponential backoff between `base` and `max`, abandoned after `max_attempts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    pub base: Duration,
    pub max: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(2),
            max: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-indexed), or `None` once abandoned.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        Some(self.base.saturating_mul(factor).min(self.max))
    }

    /// Every delay in order.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..=self.max_attempts)
            .filter_map(|attempt| self.delay_for(attempt))
            .collect()
    }
}

/// Retry `connect` on `port` following `policy`.
///
/// Returns the attempt number that succeeded, or the last error once the
/// policy gives up.
pub async fn reconnect_with<P>(
    port: &P,
    user_id: &str,
    policy: &ReconnectPolicy,
) -> ConnectivityResult<u32>
where
    P: ConnectivityPort + ?Sized,
{
    let mut last_error = ConnectivityError::NotConnected;
    for attempt in 1..=policy.max_attempts {
        let Some(delay) = policy.delay_for(attempt) else {
            break;
        };
        tokio::time::sleep(delay).await;
        match port.connect(user_id).await {
            Ok(()) => {
                debug!(attempt, "Reconnected");
                return Ok(attempt);
            }
            Err(e) => {
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Reconnect attempt failed: {}", e);
                last_error = e;
            }
        }
    }
    warn!(attempts = policy.max_attempts, "Reconnection abandoned");
    Err(last_error)
}
