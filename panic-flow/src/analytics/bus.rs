//! Analytics bus
//!
//! Fans analytics events out to any number of subscribers over a Tokio
//! broadcast channel. Each subscriber owns its own receiver, so a slow or
//! failing consumer only ever lags or loses its own copy.

use std::fmt::Display;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::sink::AnalyticsSink;
use super::types::AnalyticsEvent;

/// Channel capacity for broadcast
const CHANNEL_CAPACITY: usize = 256;

/// Shared reference to an AnalyticsBus
pub type SharedAnalyticsBus = Arc<AnalyticsBus>;

/// Broadcast-backed analytics sink
pub struct AnalyticsBus {
    sender: broadcast::Sender<AnalyticsEvent>,
}

impl AnalyticsBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Create a shared reference to this bus
    pub fn shared(self) -> SharedAnalyticsBus {
        Arc::new(self)
    }

    /// Subscribe to receive events
    pub fn subscribe(&self) -> broadcast::Receiver<AnalyticsEvent> {
        self.sender.subscribe()
    }

    /// Subscribe to a subset of event kinds
    pub fn subscribe_filtered(&self, filter: AnalyticsFilter) -> FilteredReceiver {
        FilteredReceiver::new(self.subscribe(), filter)
    }

    /// Get the number of current subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Run `listener` for every event in its own task.
    ///
    /// Listener errors are logged and the listener keeps receiving. A
    /// panicking listener ends only its own task.
    pub fn spawn_listener<F, E>(&self, name: &'static str, mut listener: F) -> JoinHandle<()>
    where
        F: FnMut(&AnalyticsEvent) -> Result<(), E> + Send + 'static,
        E: Display,
    {
        let mut receiver = self.subscribe();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        if let Err(e) = listener(&event) {
                            warn!(listener = name, kind = event.kind(), "Analytics listener failed: {}", e);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(listener = name, skipped, "Analytics listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!(listener = name, "Analytics listener stopped");
        })
    }
}

impl Default for AnalyticsBus {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalyticsSink for AnalyticsBus {
    fn record(&self, event: AnalyticsEvent) {
        let kind = event.kind();
        // No receivers is fine: analytics are best effort
        match self.sender.send(event) {
            Ok(count) => debug!(kind, receivers = count, "Analytics event published"),
            Err(_) => debug!(kind, "Analytics event published (no receivers)"),
        }
    }
}

/// Event filter for selective subscription
#[derive(Debug, Clone, Default)]
pub struct AnalyticsFilter {
    kinds: Option<Vec<&'static str>>,
}

impl AnalyticsFilter {
    /// Create a new empty filter (matches all events)
    pub fn new() -> Self {
        Self { kinds: None }
    }

    /// Filter by event kinds
    pub fn kinds(mut self, kinds: Vec<&'static str>) -> Self {
        self.kinds = Some(kinds);
        self
    }

    pub fn matches(&self, event: &AnalyticsEvent) -> bool {
        match &self.kinds {
            Some(kinds) => kinds.contains(&event.kind()),
            None => true,
        }
    }
}

/// Filtered receiver that only yields matching events
pub struct FilteredReceiver {
    receiver: broadcast::Receiver<AnalyticsEvent>,
    filter: AnalyticsFilter,
}

impl FilteredReceiver {
    pub fn new(receiver: broadcast::Receiver<AnalyticsEvent>, filter: AnalyticsFilter) -> Self {
        Self { receiver, filter }
    }

    /// Receive the next matching event
    pub async fn recv(&mut self) -> Result<AnalyticsEvent, broadcast::error::RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.filter.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Drain every matching event already queued, without waiting
    pub fn drain(&mut self) -> Vec<AnalyticsEvent> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => events.push(event),
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        events
    }
}
