//! Session State Machine: the single writer of [`SessionState`].
//!
//! Every user command, connectivity signal and timer firing arrives as a
//! [`SessionEvent`] and is handled to completion before the next one. The
//! only suspension points inside a handler are the connect call and the
//! fixed settle/calming/reset delays.
//!
//! ```text
//! idle → entering → routing → active ⇄ transitioning → calming → resolved → idle
//!   │        │          │        │
//!   └────────┴──────────┴────────┴──▶ escalated ──▶ transitioning | calming
//!                                        └──▶ entering (no exercise yet)
//! ```
//!
//! Offline is an overlay (`is_connected == false` during a session), not a
//! phase. Readers observe the machine through immutable `Arc<SessionState>`
//! snapshots published on a `watch` channel.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::analytics::{
    AnalyticsEvent, CrisisResourceKind, CrisisTrigger, OfflineReason, SharedAnalytics,
    TransitionTrigger,
};
use crate::classifier::{ClassificationInput, PreviousOutcome, UxState};
use crate::connectivity::{ConnectionState, OutboundMessage, ServerMessage, SharedConnectivity};
use crate::router::{Route, RouteConfig, Router, RoutingReason};

use super::config::SessionConfig;
use super::event::SessionEvent;
use super::fallback::{FallbackCycle, OFFLINE_MESSAGE};
use super::state::{normalize_intensity, ActiveExercise, SessionPhase, SessionState};
use super::summary::SessionSummary;
use super::timer::EscalationTimer;

/// Legal phase edges.
///
/// ```text
/// Idle → Entering | Escalated
/// Entering → Routing | Escalated
/// Routing → Active | Escalated
/// Active → Transitioning | Calming | Escalated
/// Transitioning → Active | Escalated
/// Escalated → Entering | Transitioning | Calming
/// Calming → Resolved
/// Resolved → Idle
/// ```
pub fn is_legal_transition(from: SessionPhase, to: SessionPhase) -> bool {
    use SessionPhase::*;

    if to == Escalated {
        return !matches!(from, Escalated | Calming | Resolved);
    }

    matches!(
        (from, to),
        (Idle, Entering)
            | (Entering, Routing)
            | (Routing, Active)
            | (Active, Transitioning)
            | (Active, Calming)
            | (Transitioning, Active)
            | (Escalated, Entering)
            | (Escalated, Transitioning)
            | (Escalated, Calming)
            | (Calming, Resolved)
            | (Resolved, Idle)
    )
}

/// A single recorded phase change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: SessionPhase,
    pub to: SessionPhase,
    /// Milliseconds since the machine was created
    pub elapsed_ms: u64,
    pub reason: String,
}

pub struct SessionStateMachine {
    config: SessionConfig,
    router: Router,
    analytics: SharedAnalytics,
    connectivity: SharedConnectivity,
    /// Where timer firings are enqueued
    queue: mpsc::UnboundedSender<SessionEvent>,
    state: Arc<SessionState>,
    previous: Option<Arc<SessionState>>,
    snapshots: watch::Sender<Arc<SessionState>>,
    timer: EscalationTimer,
    fallback: FallbackCycle,
    created_at: Instant,
    session_started: Option<Instant>,
    exercise_started: Option<Instant>,
    exercises_used: Vec<Route>,
    exercise_transitions: u32,
    phase_log: Vec<PhaseTransition>,
}

impl SessionStateMachine {
    pub fn new(
        config: SessionConfig,
        analytics: SharedAnalytics,
        connectivity: SharedConnectivity,
        queue: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let state = Arc::new(SessionState::new());
        let (snapshots, _) = watch::channel(state.clone());
        Self {
            config,
            router: Router::new(analytics.clone()),
            analytics,
            connectivity,
            queue,
            state,
            previous: None,
            snapshots,
            timer: EscalationTimer::new(),
            fallback: FallbackCycle::new(),
            created_at: Instant::now(),
            session_started: None,
            exercise_started: None,
            exercises_used: Vec::new(),
            exercise_transitions: 0,
            phase_log: Vec::new(),
        }
    }

    /// Current snapshot.
    pub fn state(&self) -> Arc<SessionState> {
        self.state.clone()
    }

    /// Snapshot replaced by the most recent change.
    pub fn previous(&self) -> Option<Arc<SessionState>> {
        self.previous.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<SessionState>> {
        self.snapshots.subscribe()
    }

    pub fn phase_log(&self) -> &[PhaseTransition] {
        &self.phase_log
    }

    pub fn timer_armed(&self) -> bool {
        self.timer.is_armed()
    }

    pub fn armed_timer_id(&self) -> Option<u64> {
        self.timer.armed_id()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Handle one event to completion.
    pub async fn handle(&mut self, event: SessionEvent) {
        debug!(event = event.name(), phase = %self.state.phase, "Handling session event");
        match event {
            SessionEvent::Triggered { initial_intensity } => self.on_triggered(initial_intensity).await,
            SessionEvent::IntensityReported { value } => self.on_intensity_reported(value).await,
            SessionEvent::ExerciseTransitionRequested { from, to } => {
                self.transition_exercise(from, to, TransitionTrigger::Manual, None)
                    .await
            }
            SessionEvent::ExerciseCycleCompleted => self.on_cycle_completed(),
            SessionEvent::ExitRequested => self.on_exit_requested().await,
            SessionEvent::CrisisIndicated => self.enter_crisis(CrisisTrigger::UserIndicated, None),
            SessionEvent::CrisisResourceUsed { resource } => self.on_crisis_resource_used(resource),
            SessionEvent::VoiceToggled { enabled } => self.update(|s| s.voice_enabled = enabled),
            SessionEvent::ConnectionStateChanged { state } => self.on_connection_state(state),
            SessionEvent::ServerMessage { payload } => self.on_server_message(&payload),
            SessionEvent::MessageSent { text } => self.on_message_sent(text),
            SessionEvent::AutoEscalationTriggered { timer_id } => {
                self.on_auto_escalation(timer_id).await
            }
        }
    }

    async fn on_triggered(&mut self, initial_intensity: Option<f64>) {
        if !self.can_enter(SessionPhase::Entering) || self.state.active_exercise.is_some() {
            debug!(phase = %self.state.phase, "Ignoring trigger; session already in progress");
            return;
        }
        // A crisis declared before the trigger still routes to crisis support.
        let crisis_declared = self.state.phase == SessionPhase::Escalated;

        let intensity = initial_intensity
            .and_then(normalize_intensity)
            .unwrap_or(self.state.reported_intensity);
        self.session_started = Some(Instant::now());
        self.advance(SessionPhase::Entering, "triggered", |s| {
            s.started_at = Some(Utc::now());
            s.reported_intensity = intensity;
            s.intensity_history.push(intensity);
        });

        let input = ClassificationInput::new(intensity)
            .with_recent_sessions(self.state.recent_session_count)
            .with_previous_outcome(self.state.previous_outcome)
            .with_crisis_indicated(crisis_declared);
        let decision = self.router.determine_initial_route(&input);
        let ux_state = decision.source_state;
        self.advance(SessionPhase::Routing, "initial route determined", |s| {
            s.ux_state = Some(ux_state);
            s.routing_decision = Some(decision.clone());
        });
        if ux_state == UxState::Critical && !crisis_declared {
            self.analytics
                .record(AnalyticsEvent::crisis_flow_entered(CrisisTrigger::Classification));
        }

        match self.connectivity.connect(&self.config.user_id).await {
            Ok(()) => self.update(|s| {
                s.is_connected = true;
                s.fallback_message = None;
            }),
            Err(e) => {
                warn!(error = %e, "Connect failed; continuing with local support");
                self.go_offline(OfflineReason::ConnectFailed);
            }
        }

        let auto_escalate_after = decision.config.auto_escalate_after();
        self.start_exercise(decision.config, "exercise started");
        if let Some(delay) = auto_escalate_after {
            self.timer.arm(delay, self.queue.clone());
        }
    }

    async fn on_intensity_reported(&mut self, value: f64) {
        if !self.state.phase.in_session() {
            debug!(phase = %self.state.phase, "Ignoring intensity outside a session");
            return;
        }
        let Some(value) = normalize_intensity(value) else {
            warn!("Ignoring non-numeric intensity report");
            return;
        };

        let previous = self.state.reported_intensity;
        let first_interaction = match (self.state.time_to_first_interaction_ms, self.session_started) {
            (None, Some(started)) => Some(started.elapsed().as_millis() as u64),
            _ => None,
        };
        self.update(|s| {
            s.reported_intensity = value;
            s.intensity_history.push(value);
            if first_interaction.is_some() {
                s.time_to_first_interaction_ms = first_interaction;
            }
        });
        self.analytics
            .record(AnalyticsEvent::intensity_change(previous, value));

        if self.state.is_connected {
            self.connectivity
                .send(OutboundMessage::IntensityUpdate { intensity: value });
        }

        // A declared crisis is not re-routed by intensity reports.
        if self.state.phase != SessionPhase::Active {
            return;
        }
        let (Some(ux_state), Some(current)) = (self.state.ux_state, self.state.current_route()) else {
            return;
        };

        let decision =
            self.router
                .determine_transition(ux_state, value, self.exercise_elapsed_ms(), current);

        if decision.source_state != ux_state {
            let reclassified = decision.source_state;
            let same_route = !decision.changes_route(current);
            // Auto-escalation only ever applies to the state it was armed for.
            if decision.config.auto_escalate_after().is_none() {
                self.timer.cancel();
            }
            let config = decision.config;
            self.update(|s| {
                s.ux_state = Some(reclassified);
                s.routing_decision = Some(decision.clone());
                if same_route {
                    if let Some(exercise) = s.active_exercise.as_mut() {
                        exercise.config = config;
                    }
                }
            });
            if reclassified == UxState::Critical {
                self.analytics
                    .record(AnalyticsEvent::crisis_flow_entered(CrisisTrigger::Classification));
            }
        } else if decision.reason == RoutingReason::AutoEscalated {
            self.update(|s| s.routing_decision = Some(decision.clone()));
        }

        if decision.changes_route(current) {
            let trigger = if decision.reason == RoutingReason::AutoEscalated {
                TransitionTrigger::Automatic
            } else {
                TransitionTrigger::Manual
            };
            self.transition_exercise(current, decision.route, trigger, Some(decision.config))
                .await;
        }
    }

    /// Replace the active exercise `from` with `to`.
    ///
    /// `config` carries the router's configuration when the transition comes
    /// from a routing decision; user requests get the standard one.
    async fn transition_exercise(
        &mut self,
        from: Route,
        to: Route,
        trigger: TransitionTrigger,
        config: Option<RouteConfig>,
    ) {
        if !self.can_enter(SessionPhase::Transitioning) {
            debug!(phase = %self.state.phase, "Ignoring transition outside an active exercise");
            return;
        }
        match self.state.current_route() {
            Some(current) if current == from && from != to => {}
            current => {
                debug!(?current, %from, %to, "Ignoring transition that does not match the active exercise");
                return;
            }
        }

        self.timer.cancel();
        self.complete_exercise();
        self.advance(SessionPhase::Transitioning, "exercise transition", |_| {});
        self.analytics.record(AnalyticsEvent::ExerciseTransition {
            from,
            to,
            trigger,
            timestamp: Utc::now(),
        });
        info!(%from, %to, %trigger, "Transitioning exercise");

        tokio::time::sleep(self.config.settle_delay).await;

        self.exercise_transitions += 1;
        let config = config.unwrap_or_else(|| RouteConfig::standard(to));
        self.start_exercise(config, "transition settled");
    }

    fn on_cycle_completed(&mut self) {
        if self.state.active_exercise.is_none() || !self.state.phase.accepts_exercise_events() {
            debug!(phase = %self.state.phase, "Ignoring cycle completion without an active exercise");
            return;
        }
        self.update(|s| {
            if let Some(exercise) = s.active_exercise.as_mut() {
                exercise.cycles += 1;
            }
        });
    }

    async fn on_exit_requested(&mut self) {
        if !self.can_enter(SessionPhase::Calming) {
            debug!(phase = %self.state.phase, "Ignoring exit; no session in progress");
            return;
        }

        self.timer.cancel();
        self.complete_exercise();
        self.advance(SessionPhase::Calming, "exit requested", |_| {});

        let summary = self.summary();
        info!(
            duration_ms = summary.duration_ms,
            improved = summary.improved,
            transitions = summary.transitions,
            "Session resolved"
        );
        self.analytics.record(AnalyticsEvent::SessionOutcome {
            outcome: PreviousOutcome::Resolved,
            summary,
            timestamp: Utc::now(),
        });
        if self.state.is_connected {
            self.connectivity.end_session();
        }

        tokio::time::sleep(self.config.calming_delay).await;
        self.advance(SessionPhase::Resolved, "calming finished", |s| {
            s.active_exercise = None;
        });

        tokio::time::sleep(self.config.reset_delay).await;
        self.reinitialize(PreviousOutcome::Resolved).await;
    }

    async fn reinitialize(&mut self, outcome: PreviousOutcome) {
        let next = self.state.reinitialized(outcome);
        let recent_sessions = next.recent_session_count;
        self.advance(SessionPhase::Idle, "session reset", move |s| *s = next);

        self.timer.cancel();
        self.fallback.reset();
        self.session_started = None;
        self.exercise_started = None;
        self.exercises_used.clear();
        self.exercise_transitions = 0;
        self.connectivity.disconnect().await;
        info!(recent_sessions, %outcome, "Session reinitialized");
    }

    /// Human- or server-declared crisis. Overrides the routing table.
    fn enter_crisis(&mut self, trigger: CrisisTrigger, message: Option<String>) {
        self.timer.cancel();
        self.analytics
            .record(AnalyticsEvent::crisis_flow_entered(trigger));
        warn!(?trigger, phase = %self.state.phase, "Crisis flow entered");

        let apply = move |s: &mut SessionState| {
            s.ux_state = Some(UxState::Critical);
            if message.is_some() {
                s.current_message = message;
            }
        };
        if self.state.phase == SessionPhase::Escalated {
            self.update(apply);
        } else {
            self.advance(SessionPhase::Escalated, "crisis", apply);
        }
    }

    fn on_crisis_resource_used(&mut self, resource: CrisisResourceKind) {
        info!(?resource, "Crisis resource used");
        self.analytics.record(AnalyticsEvent::CrisisResourceUsed {
            resource,
            timestamp: Utc::now(),
        });
    }

    fn on_connection_state(&mut self, state: ConnectionState) {
        match state {
            ConnectionState::Connected => {
                if !self.state.is_connected {
                    info!("Connection restored");
                }
                self.update(|s| {
                    s.is_connected = true;
                    s.fallback_message = None;
                });
            }
            ConnectionState::Disconnected => {
                if self.state.phase.in_session() && self.state.is_connected {
                    warn!("Connection lost during session; switching to local support");
                    self.go_offline(OfflineReason::ConnectionLost);
                } else {
                    self.update(|s| s.is_connected = false);
                }
            }
            ConnectionState::Connecting | ConnectionState::Reconnecting => {
                debug!(%state, "Connection state changed");
            }
        }
    }

    fn on_server_message(&mut self, payload: &serde_json::Value) {
        match ServerMessage::parse(payload) {
            Some(ServerMessage::AiResponse { message }) => self.update(|s| {
                s.current_message = Some(message);
                s.is_connected = true;
                s.fallback_message = None;
            }),
            Some(ServerMessage::CrisisResources { message }) => {
                self.enter_crisis(CrisisTrigger::ServerResources, message)
            }
            None => debug!("Ignoring unrecognized server message"),
        }
    }

    fn on_message_sent(&mut self, text: String) {
        if self.state.is_connected {
            self.connectivity.send(OutboundMessage::UserMessage { text });
            return;
        }
        let reply = self.fallback.next_message();
        debug!("Offline; answering with a local fallback message");
        self.update(|s| s.current_message = Some(reply.to_string()));
    }

    async fn on_auto_escalation(&mut self, timer_id: u64) {
        if !self.timer.take_fired(timer_id) {
            return;
        }
        if self.state.phase != SessionPhase::Active {
            debug!(phase = %self.state.phase, "Timer fired outside an active exercise");
            return;
        }
        let (Some(ux_state), Some(current)) = (self.state.ux_state, self.state.current_route()) else {
            return;
        };

        let Some(decision) =
            self.router
                .determine_timed_escalation(ux_state, self.state.reported_intensity, current)
        else {
            return;
        };

        self.update(|s| s.routing_decision = Some(decision.clone()));
        self.transition_exercise(
            current,
            decision.route,
            TransitionTrigger::Automatic,
            Some(decision.config),
        )
        .await;
    }

    fn start_exercise(&mut self, config: RouteConfig, reason: &str) {
        let exercise = ActiveExercise::start(config);
        let kind = exercise.kind;
        self.exercise_started = Some(Instant::now());
        self.exercises_used.push(kind);
        self.advance(SessionPhase::Active, reason, move |s| {
            s.active_exercise = Some(exercise);
        });
        self.analytics.record(AnalyticsEvent::ExerciseStarted {
            exercise: kind,
            source_state: self.state.ux_state,
            timestamp: Utc::now(),
        });
        info!(exercise = %kind, "Exercise started");
    }

    fn complete_exercise(&mut self) {
        let Some((kind, cycles)) = self
            .state
            .active_exercise
            .as_ref()
            .map(|e| (e.kind, e.cycles))
        else {
            return;
        };
        let duration_ms = self.exercise_elapsed_ms();
        self.exercise_started = None;
        self.analytics.record(AnalyticsEvent::ExerciseCompleted {
            exercise: kind,
            cycles,
            duration_ms,
            timestamp: Utc::now(),
        });
    }

    fn go_offline(&mut self, reason: OfflineReason) {
        self.update(|s| {
            s.is_connected = false;
            s.fallback_message = Some(OFFLINE_MESSAGE.to_string());
        });
        self.analytics.record(AnalyticsEvent::offline_fallback(reason));
    }

    fn summary(&self) -> SessionSummary {
        let duration_ms = self
            .session_started
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);
        SessionSummary::from_history(
            &self.state.intensity_history,
            &self.exercises_used,
            self.exercise_transitions,
            duration_ms,
        )
    }

    fn exercise_elapsed_ms(&self) -> u64 {
        self.exercise_started
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }

    fn can_enter(&self, to: SessionPhase) -> bool {
        is_legal_transition(self.state.phase, to)
    }

    /// Publish a new snapshot built from the current one.
    fn update(&mut self, apply: impl FnOnce(&mut SessionState)) {
        let mut next = SessionState::clone(&self.state);
        apply(&mut next);
        if next == *self.state {
            return;
        }
        let next = Arc::new(next);
        self.previous = Some(std::mem::replace(&mut self.state, next.clone()));
        self.snapshots.send_replace(next);
    }

    /// Move to `to` and apply `apply` in the same snapshot.
    fn advance(&mut self, to: SessionPhase, reason: &str, apply: impl FnOnce(&mut SessionState)) {
        let from = self.state.phase;
        self.update(|s| {
            s.phase = to;
            apply(s);
        });
        if from != to {
            self.phase_log.push(PhaseTransition {
                from,
                to,
                elapsed_ms: self.created_at.elapsed().as_millis() as u64,
                reason: reason.to_string(),
            });
            info!(%from, %to, reason, "Session phase transition");
        }
    }
}
