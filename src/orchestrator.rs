//! PollOrchestrator - walks the fleet on a timer and files incidents
//!
//! One actor owns the whole pipeline: acquire a reading per target, grade
//! it against the thresholds, run the incident ledger and talk to the
//! backend. Keeping a single owner means the cooldown and verification
//! state never needs locking.
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → Acquire readings → Grade thresholds → Ledger → Incidents
//!     ↑
//!     └─── Commands (TickNow, Shutdown)
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, instrument, warn};

use crate::{
    Resource,
    acquire::MetricAcquirer,
    backend::{BackendClient, IncidentDraft, RecentIncident},
    config::{Config, Thresholds},
    ledger::{Emission, IncidentKey, IncidentLedger},
    sink::MetricsSink,
    targets::MonitoredTarget,
    thresholds,
};

/// Control messages for the orchestrator
#[derive(Debug)]
pub enum OrchestratorCommand {
    /// Run a full fleet walk immediately, outside the timer
    TickNow { respond_to: oneshot::Sender<()> },

    /// Stop the actor gracefully
    Shutdown,
}

fn format_value(value: Option<f32>) -> String {
    value.map_or_else(|| String::from("n/a"), |v| format!("{v:.1}%"))
}

/// Actor that polls every monitored target at the configured interval.
pub struct PollOrchestrator {
    /// Fleet discovered at startup; fixed for the lifetime of the actor
    targets: Vec<MonitoredTarget>,

    /// Authenticated backend client
    backend: BackendClient,

    /// Provider chain used to read metrics
    acquirer: MetricAcquirer,

    /// Cooldown and relapse verification state
    ledger: IncidentLedger,

    thresholds: Thresholds,

    /// Optional telemetry sink; alerting never depends on it
    sink: Option<Box<dyn MetricsSink>>,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<OrchestratorCommand>,

    interval_duration: Duration,
}

impl PollOrchestrator {
    /// Run the actor's main loop
    ///
    /// This is the entry point for the actor. It runs until:
    /// - A Shutdown command is received
    /// - The command channel is closed
    #[instrument(skip(self))]
    pub async fn run(mut self) {
        debug!("starting poll orchestrator");

        let mut ticker = interval(self.interval_duration);

        loop {
            tokio::select! {
                // Timer tick - walk the whole fleet once
                _ = ticker.tick() => {
                    self.tick().await;
                }

                // Handle commands
                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        OrchestratorCommand::TickNow { respond_to } => {
                            debug!("received TickNow command");
                            self.tick().await;
                            let _ = respond_to.send(());
                        }

                        OrchestratorCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                // Command channel closed - exit
                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        if let Some(sink) = &self.sink
            && let Err(e) = sink.close().await
        {
            warn!("failed to close metrics sink: {e}");
        }

        debug!("poll orchestrator stopped");
    }

    /// Walk every target once. The recent incident snapshot is fetched a
    /// single time per tick so all keys see the same resolution state.
    async fn tick(&mut self) {
        let snapshot = match self.backend.recent_incidents().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    "could not fetch recent incidents, relapse checks are degraded: {:#}",
                    e
                );
                Vec::new()
            }
        };

        let targets = self.targets.clone();
        for target in &targets {
            self.process_target(target, &snapshot).await;
        }
    }

    /// Acquire, grade and act for a single target.
    ///
    /// Errors are logged but never crash the actor; the next interval
    /// retries from scratch. The ledger observes every resource each tick,
    /// even quiet ones, so verification counters keep moving.
    #[instrument(skip(self, target, snapshot), fields(target = %target.name))]
    async fn process_target(&mut self, target: &MonitoredTarget, snapshot: &[RecentIncident]) {
        let Some(reading) = self.acquirer.acquire(target).await else {
            warn!("{} is not reachable by any provider", target.address);
            return;
        };

        debug!(
            "cpu={} ram={} disk={}",
            format_value(reading.cpu),
            format_value(reading.ram),
            format_value(reading.disk)
        );

        let breaches = thresholds::evaluate(&target.id, &reading, &self.thresholds);
        let now = Utc::now();

        for resource in Resource::ALL {
            let breach = breaches.iter().find(|breach| breach.resource == resource);
            let recently_resolved = snapshot
                .iter()
                .any(|incident| incident.is_resolved_for(&target.id, resource));

            let key = IncidentKey::new(target.id.clone(), resource);
            if let Some(emission) = self
                .ledger
                .observe(key, breach.is_some(), recently_resolved, now)
                && let Some(breach) = breach
            {
                let draft = match emission {
                    Emission::Normal => IncidentDraft::normal(target, breach),
                    Emission::Relapse => IncidentDraft::relapse(target, breach),
                };

                match self.backend.create_incident(&draft).await {
                    Ok(()) => warn!("incident created: {} ({})", draft.title, draft.priority),
                    Err(e) => error!("failed to create incident for {}: {:#}", target.name, e),
                }
            }
        }

        if let Some(sink) = &self.sink
            && let Err(e) = sink.write_sample(target, &reading).await
        {
            debug!("metrics sink write failed: {e}");
        }
    }
}

/// Handle for controlling a PollOrchestrator
///
/// It can be cloned and shared across tasks.
#[derive(Clone)]
pub struct OrchestratorHandle {
    /// Command sender
    sender: mpsc::Sender<OrchestratorCommand>,
}

impl OrchestratorHandle {
    /// Spawn the orchestrator as a tokio task.
    ///
    /// Returns the handle together with the task's join handle so the
    /// caller can wait for the actor to finish closing its sink.
    pub fn spawn(
        config: &Config,
        targets: Vec<MonitoredTarget>,
        backend: BackendClient,
        acquirer: MetricAcquirer,
        sink: Option<Box<dyn MetricsSink>>,
    ) -> (Self, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let orchestrator = PollOrchestrator {
            targets,
            backend,
            acquirer,
            ledger: IncidentLedger::new(config.cooldown, config.post_resolution_checks),
            thresholds: config.thresholds,
            sink,
            command_rx: cmd_rx,
            interval_duration: Duration::from_secs(config.interval),
        };

        let join = tokio::spawn(orchestrator.run());

        (Self { sender: cmd_tx }, join)
    }

    /// Trigger an immediate fleet walk, returning once it has completed.
    pub async fn tick_now(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(OrchestratorCommand::TickNow { respond_to: tx })
            .await
            .context("failed to send TickNow command")?;

        rx.await.context("failed to receive response")?;
        Ok(())
    }

    /// Gracefully shut down the orchestrator
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(OrchestratorCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }
}
