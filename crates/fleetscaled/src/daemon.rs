//! Daemon — one snapshot, one policy evaluation, per interval.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use fleetscale_client::{
    FleetMutator, HttpFleetMutator, HttpSessionInventory, HttpSnapshotProvider, SessionInventory,
    SnapshotProvider,
};
use fleetscale_core::FleetConfig;
use fleetscale_policy::{CyclePlan, CycleReport, ScalingEngine};

pub struct Daemon {
    engine: ScalingEngine,
    datacenter: String,
    snapshots: Arc<dyn SnapshotProvider>,
    sessions: Arc<dyn SessionInventory>,
    mutator: Arc<dyn FleetMutator>,
}

impl Daemon {
    pub fn new(
        engine: ScalingEngine,
        datacenter: impl Into<String>,
        snapshots: Arc<dyn SnapshotProvider>,
        sessions: Arc<dyn SessionInventory>,
        mutator: Arc<dyn FleetMutator>,
    ) -> Self {
        Self {
            engine,
            datacenter: datacenter.into(),
            snapshots,
            sessions,
            mutator,
        }
    }

    /// Build the daemon with HTTP collaborators from configuration.
    pub fn from_config(config: &FleetConfig) -> anyhow::Result<Self> {
        let daemon = &config.daemon;
        let timeout = Duration::from_secs(daemon.request_timeout_secs);

        let engine =
            ScalingEngine::new(config.limits).with_conflict_policy(daemon.conflict_policy);
        let snapshots = Arc::new(HttpSnapshotProvider::new(&daemon.snapshot_api, timeout)?);
        let sessions = Arc::new(HttpSessionInventory::new(&daemon.session_api, timeout)?);
        let mutator = Arc::new(HttpFleetMutator::new(&daemon.mutation_api, timeout)?);

        Ok(Self::new(
            engine,
            daemon.datacenter.clone(),
            snapshots,
            sessions,
            mutator,
        ))
    }

    /// Replace the snapshot source, e.g. with a file for dry runs.
    pub fn with_snapshot_provider(mut self, snapshots: Arc<dyn SnapshotProvider>) -> Self {
        self.snapshots = snapshots;
        self
    }

    pub fn engine(&self) -> &ScalingEngine {
        &self.engine
    }

    /// Fetch a fresh snapshot and compute every selection without
    /// mutating anything.
    pub async fn plan(&self) -> anyhow::Result<CyclePlan> {
        let snapshot = self.snapshots.fetch().await?;
        info!(machines = snapshot.len(), "evaluating snapshot");
        Ok(self.engine.plan(&snapshot, self.sessions.as_ref()).await)
    }

    /// Run one full cycle. Mutations are dispatched and left running.
    pub async fn cycle(&self) -> anyhow::Result<CycleReport> {
        let snapshot = self.snapshots.fetch().await?;
        info!(machines = snapshot.len(), "evaluating snapshot");
        let report = self
            .engine
            .run_cycle(
                &snapshot,
                self.sessions.as_ref(),
                self.mutator.clone(),
                &self.datacenter,
            )
            .await;
        info!(
            dispatched = report.in_flight.len(),
            shutdown_failed = report.shutdown_error.is_some(),
            "cycle complete"
        );
        Ok(report)
    }

    /// Run one cycle and wait for its mutations. Fails when the shutdown
    /// selection could not be evaluated, after the other operations have
    /// been applied.
    pub async fn run_once(&self) -> anyhow::Result<()> {
        let CycleReport {
            shutdown_error,
            in_flight,
            ..
        } = self.cycle().await?;
        in_flight.settle().await;
        if let Some(e) = shutdown_error {
            anyhow::bail!("shutdown evaluation incomplete: {e}");
        }
        Ok(())
    }

    /// Run cycles every `interval` until `shutdown` flips.
    pub async fn run(&self, interval: Duration, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        info!(
            interval_secs = interval.as_secs(),
            datacenter = %self.datacenter,
            "fleet scaler started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    match self.cycle().await {
                        // Dropping the report detaches its mutation tasks.
                        Ok(report) => drop(report),
                        Err(e) => error!(error = %e, "evaluation cycle failed"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        warn!("shutdown channel closed");
                    }
                    info!("fleet scaler shutting down");
                    break;
                }
            }
        }
    }
}
