//! The auto-escalation timer.
//!
//! At most one timer is armed at a time. Arming replaces (and aborts) the
//! previous one, and dropping the owner aborts whatever is pending. A fired
//! timer only enqueues an [`SessionEvent::AutoEscalationTriggered`] carrying
//! its id; the state machine asks [`EscalationTimer::take_fired`] whether that
//! id is still the armed one, so a firing that raced a cancellation is
//! discarded.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::event::SessionEvent;

#[derive(Debug, Default)]
pub struct EscalationTimer {
    handle: Option<JoinHandle<()>>,
    armed_id: Option<u64>,
    next_id: u64,
}

impl EscalationTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a timer that enqueues a trigger after `delay`, cancelling any prior one.
    pub fn arm(&mut self, delay: Duration, queue: mpsc::UnboundedSender<SessionEvent>) -> u64 {
        self.cancel();
        self.next_id += 1;
        let timer_id = self.next_id;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if queue
                .send(SessionEvent::AutoEscalationTriggered { timer_id })
                .is_err()
            {
                debug!(timer_id, "Session queue closed before timer fired");
            }
        });

        debug!(timer_id, delay_ms = delay.as_millis() as u64, "Auto-escalation timer armed");
        self.handle = Some(handle);
        self.armed_id = Some(timer_id);
        timer_id
    }

    /// Cancel the pending timer. Returns whether one was armed.
    pub fn cancel(&mut self) -> bool {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        match self.armed_id.take() {
            Some(timer_id) => {
                debug!(timer_id, "Auto-escalation timer cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed_id.is_some()
    }

    pub fn armed_id(&self) -> Option<u64> {
        self.armed_id
    }

    /// Accept a firing. True only for the currently armed timer, which is
    /// then disarmed.
    pub fn take_fired(&mut self, timer_id: u64) -> bool {
        if self.armed_id == Some(timer_id) {
            self.armed_id = None;
            self.handle = None;
            true
        } else {
            debug!(timer_id, armed = ?self.armed_id, "Ignoring stale timer firing");
            false
        }
    }
}

impl Drop for EscalationTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
