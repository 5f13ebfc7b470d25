//! Panic Flow CLI
//!
//! - `classify`: classify one set of signals and print the routing decision
//! - `simulate`: drive a scripted session against the in-memory loopback port
//!
//! # Usage
//!
//! ```bash
//! panic-flow classify --intensity 8 --recent-sessions 3
//! PANIC_FLOW_SETTLE_MS=200 panic-flow simulate --intensity 6 --steps 6.5,5,3 --offline
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use panic_flow::analytics::{AnalyticsBus, FanoutSink, SharedAnalytics, TracingSink};
use panic_flow::connectivity::LoopbackConnectivity;
use panic_flow::session::{SessionConfig, SessionPhase, SessionRuntime};
use panic_flow::{ClassificationInput, PreviousOutcome, Router, RoutingDecision, UxState};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify signals and print the initial routing decision as JSON
    Classify {
        /// Self-reported intensity, 1 to 10
        #[arg(long)]
        intensity: f64,

        /// Milliseconds before the first interaction
        #[arg(long, default_value_t = 0)]
        first_interaction_ms: u64,

        /// Sessions started recently
        #[arg(long, default_value_t = 0)]
        recent_sessions: u32,

        /// Outcome of the previous session (resolved, escalated, abandoned, none)
        #[arg(long, default_value = "none")]
        previous_outcome: PreviousOutcome,

        /// The user asked for crisis help
        #[arg(long, default_value_t = false)]
        crisis: bool,
    },

    /// Run a scripted session and print each snapshot
    Simulate {
        /// Intensity reported when the session starts
        #[arg(long)]
        intensity: Option<f64>,

        /// Intensities reported afterwards, comma separated
        #[arg(long, value_delimiter = ',')]
        steps: Vec<f64>,

        /// Pause between scripted steps in milliseconds
        #[arg(long, default_value_t = 1_000)]
        pace_ms: u64,

        /// Start with the backend unreachable
        #[arg(long, default_value_t = false)]
        offline: bool,

        /// Messages sent by the user after the intensity steps
        #[arg(long)]
        message: Vec<String>,

        /// User id (overrides PANIC_FLOW_USER_ID)
        #[arg(long)]
        user_id: Option<String>,
    },
}

#[derive(Serialize)]
struct ClassifyOutput {
    urgency: panic_flow::Urgency,
    state: UxState,
    decision: RoutingDecision,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Classify {
            intensity,
            first_interaction_ms,
            recent_sessions,
            previous_outcome,
            crisis,
        } => {
            let input = ClassificationInput::new(intensity)
                .with_time_to_first_interaction(first_interaction_ms)
                .with_recent_sessions(recent_sessions)
                .with_previous_outcome(previous_outcome)
                .with_crisis_indicated(crisis);
            classify(input)
        }
        Command::Simulate {
            intensity,
            steps,
            pace_ms,
            offline,
            message,
            user_id,
        } => {
            let mut config = SessionConfig::default();
            if let Some(user_id) = user_id {
                config = config.with_user_id(user_id);
            }
            simulate(
                config,
                intensity,
                steps,
                message,
                Duration::from_millis(pace_ms),
                offline,
            )
            .await
        }
    }
}

fn classify(input: ClassificationInput) -> Result<()> {
    let router = Router::new(Arc::new(TracingSink));
    let decision = router.determine_initial_route(&input);
    let output = ClassifyOutput {
        urgency: decision.source_state.urgency(),
        state: decision.source_state,
        decision,
    };
    let json = serde_json::to_string_pretty(&output).context("serializing routing decision")?;
    println!("{}", json);
    Ok(())
}

async fn simulate(
    config: SessionConfig,
    intensity: Option<f64>,
    steps: Vec<f64>,
    messages: Vec<String>,
    pace: Duration,
    offline: bool,
) -> Result<()> {
    let port = Arc::new(if offline {
        LoopbackConnectivity::unreachable()
    } else {
        LoopbackConnectivity::new()
    });

    let bus = AnalyticsBus::new().shared();
    let analytics: SharedAnalytics = Arc::new(
        FanoutSink::new()
            .with(Arc::new(TracingSink))
            .with(bus.clone()),
    );
    let listener = bus.spawn_listener("simulate-counter", {
        let mut seen = 0u64;
        move |event: &panic_flow::AnalyticsEvent| {
            seen += 1;
            tracing::debug!(seen, kind = event.kind(), "Analytics event");
            Ok::<(), std::convert::Infallible>(())
        }
    });

    let handle = SessionRuntime::spawn(config.clone(), analytics, port.clone());
    let mut snapshots = handle.subscribe();
    let printer = tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            println!("{}", snapshot.summary());
            if let Some(message) = &snapshot.current_message {
                println!("  message: {}", message);
            }
        }
    });

    info!(user_id = %config.user_id, offline, "Starting simulated session");
    handle.trigger(intensity)?;
    for step in steps {
        tokio::time::sleep(pace).await;
        handle.report_intensity(step)?;
    }
    for text in messages {
        tokio::time::sleep(pace).await;
        handle.send_message(text)?;
    }
    tokio::time::sleep(pace).await;
    handle.exit()?;

    let mut watcher = handle.subscribe();
    let reset = config.settle_delay + config.calming_delay + config.reset_delay + pace;
    let finished = tokio::time::timeout(reset * 4, async {
        loop {
            let reset = {
                let snapshot = watcher.borrow_and_update();
                snapshot.phase == SessionPhase::Idle && snapshot.recent_session_count > 0
            };
            if reset {
                break;
            }
            if watcher.changed().await.is_err() {
                break;
            }
        }
    })
    .await;
    if finished.is_err() {
        anyhow::bail!("session did not reset in time");
    }

    let last = handle.snapshot();
    handle.shutdown().await;
    printer.abort();
    listener.abort();

    println!(
        "{}",
        serde_json::to_string_pretty(&*last).context("serializing final snapshot")?
    );
    info!(sent = port.sent().len(), "Simulation finished");
    Ok(())
}
