//! Scaling engine — the five policy operations and the cycle runner.
//!
//! Each operation selects from the snapshot, logs how many machines it
//! picked, and dispatches the mutations without waiting for them.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::try_join_all;
use serde::Serialize;
use tracing::{debug, error, info};

use fleetscale_client::{FleetMutator, SessionInventory};
use fleetscale_core::{
    ConflictPolicy, MachineWorkloadStatsTuple, MutationIntent, Operation, PolicyLimits,
    WorkloadMachineTuple,
};

use crate::dispatch::{dispatch, InFlight};
use crate::error::{PolicyError, PolicyResult};
use crate::selector;

/// Selections of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedOperation {
    pub operation: Operation,
    pub intents: Vec<MutationIntent>,
}

/// Every selection of one cycle, computed but not yet applied.
#[derive(Debug, Serialize)]
pub struct CyclePlan {
    pub operations: Vec<PlannedOperation>,
    /// Set when the shutdown evaluation could not complete. The shutdown
    /// entry is then empty.
    #[serde(skip)]
    pub shutdown_error: Option<PolicyError>,
}

impl CyclePlan {
    pub fn intents(&self, operation: Operation) -> &[MutationIntent] {
        self.operations
            .iter()
            .find(|p| p.operation == operation)
            .map(|p| p.intents.as_slice())
            .unwrap_or_default()
    }
}

/// Outcome of applying a plan. Mutation results are not part of it.
#[derive(Debug)]
pub struct CycleReport {
    pub selected: Vec<(Operation, usize)>,
    pub shutdown_error: Option<PolicyError>,
    pub in_flight: InFlight,
}

impl CycleReport {
    pub fn selected(&self, operation: Operation) -> usize {
        self.selected
            .iter()
            .find(|(op, _)| *op == operation)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

/// Evaluates snapshots against fixed policy limits.
#[derive(Debug, Clone)]
pub struct ScalingEngine {
    limits: PolicyLimits,
    conflict_policy: ConflictPolicy,
}

impl ScalingEngine {
    pub fn new(limits: PolicyLimits) -> Self {
        Self {
            limits,
            conflict_policy: ConflictPolicy::default(),
        }
    }

    pub fn with_conflict_policy(mut self, conflict_policy: ConflictPolicy) -> Self {
        self.conflict_policy = conflict_policy;
        self
    }

    pub fn limits(&self) -> &PolicyLimits {
        &self.limits
    }

    // ── Selection ──────────────────────────────────────────────

    /// Machines to power off. Session lookups for all candidates run
    /// concurrently; the first failure aborts the whole selection.
    pub async fn select_for_shutdown(
        &self,
        snapshot: &[WorkloadMachineTuple],
        sessions: &dyn SessionInventory,
    ) -> PolicyResult<Vec<MachineWorkloadStatsTuple>> {
        let candidates = selector::shutdown_candidates(&self.limits, snapshot);
        debug!(
            candidates = candidates.len(),
            protected = snapshot.len() - candidates.len(),
            "looking up sessions for shutdown candidates"
        );

        let with_stats = try_join_all(candidates.into_iter().map(|tuple| async move {
            let address = &tuple.machine.primary_ip;
            let stats = sessions
                .get_sessions(address)
                .await
                .map_err(|source| PolicyError::SessionLookup {
                    address: address.clone(),
                    source,
                })?;
            Ok::<_, PolicyError>(MachineWorkloadStatsTuple::new(tuple, stats))
        }))
        .await?;

        Ok(with_stats
            .into_iter()
            .filter(|m| selector::is_shutdown_eligible(&self.limits, m))
            .collect())
    }

    /// Resize selection for one of the four resize operations. Shutdown
    /// needs session data and is only available through
    /// [`select_for_shutdown`](Self::select_for_shutdown), so it yields
    /// nothing here.
    pub fn select_resizes(
        &self,
        operation: Operation,
        snapshot: &[WorkloadMachineTuple],
    ) -> Vec<MutationIntent> {
        match operation {
            Operation::Shutdown => Vec::new(),
            Operation::MemoryDown => selector::select_memory_down(&self.limits, snapshot),
            Operation::CpuDown => selector::select_cpu_down(&self.limits, snapshot),
            Operation::MemoryUp => selector::select_memory_up(&self.limits, snapshot),
            Operation::CpuUp => selector::select_cpu_up(&self.limits, snapshot),
        }
    }

    // ── Operations ─────────────────────────────────────────────

    pub async fn shut_down(
        &self,
        snapshot: &[WorkloadMachineTuple],
        sessions: &dyn SessionInventory,
        mutator: Arc<dyn FleetMutator>,
        datacenter: &str,
    ) -> PolicyResult<InFlight> {
        let selected = self.select_for_shutdown(snapshot, sessions).await?;
        let intents = selector::power_off_intents(&selected);
        Ok(self.apply(Operation::Shutdown, intents, mutator, datacenter))
    }

    pub fn scale_memory_down(
        &self,
        snapshot: &[WorkloadMachineTuple],
        mutator: Arc<dyn FleetMutator>,
        datacenter: &str,
    ) -> InFlight {
        self.resize(Operation::MemoryDown, snapshot, mutator, datacenter)
    }

    pub fn scale_cpu_down(
        &self,
        snapshot: &[WorkloadMachineTuple],
        mutator: Arc<dyn FleetMutator>,
        datacenter: &str,
    ) -> InFlight {
        self.resize(Operation::CpuDown, snapshot, mutator, datacenter)
    }

    pub fn scale_memory_up(
        &self,
        snapshot: &[WorkloadMachineTuple],
        mutator: Arc<dyn FleetMutator>,
        datacenter: &str,
    ) -> InFlight {
        self.resize(Operation::MemoryUp, snapshot, mutator, datacenter)
    }

    pub fn scale_cpu_up(
        &self,
        snapshot: &[WorkloadMachineTuple],
        mutator: Arc<dyn FleetMutator>,
        datacenter: &str,
    ) -> InFlight {
        self.resize(Operation::CpuUp, snapshot, mutator, datacenter)
    }

    fn resize(
        &self,
        operation: Operation,
        snapshot: &[WorkloadMachineTuple],
        mutator: Arc<dyn FleetMutator>,
        datacenter: &str,
    ) -> InFlight {
        let intents = self.select_resizes(operation, snapshot);
        self.apply(operation, intents, mutator, datacenter)
    }

    fn apply(
        &self,
        operation: Operation,
        intents: Vec<MutationIntent>,
        mutator: Arc<dyn FleetMutator>,
        datacenter: &str,
    ) -> InFlight {
        info!(%operation, count = intents.len(), "selected machines");
        dispatch(operation, intents, mutator, datacenter)
    }

    // ── Cycle ──────────────────────────────────────────────────

    /// Compute all five selections without side effects beyond the
    /// session lookups. Applies the conflict policy.
    pub async fn plan(
        &self,
        snapshot: &[WorkloadMachineTuple],
        sessions: &dyn SessionInventory,
    ) -> CyclePlan {
        let (shutdown, shutdown_error) = match self.select_for_shutdown(snapshot, sessions).await {
            Ok(selected) => (selector::power_off_intents(&selected), None),
            Err(e) => {
                error!(error = %e, "shutdown evaluation failed");
                (Vec::new(), Some(e))
            }
        };

        let excluded: HashSet<String> = match self.conflict_policy {
            ConflictPolicy::Independent => HashSet::new(),
            ConflictPolicy::ShutdownExclusive => {
                shutdown.iter().map(|i| i.machine().id.clone()).collect()
            }
        };

        let mut operations = vec![PlannedOperation {
            operation: Operation::Shutdown,
            intents: shutdown,
        }];
        for operation in &Operation::ALL[1..] {
            let intents = self
                .select_resizes(*operation, snapshot)
                .into_iter()
                .filter(|i| !excluded.contains(&i.machine().id))
                .collect();
            operations.push(PlannedOperation {
                operation: *operation,
                intents,
            });
        }

        CyclePlan {
            operations,
            shutdown_error,
        }
    }

    /// Dispatch every planned mutation. Returns as soon as the tasks are
    /// spawned.
    pub fn execute(
        &self,
        plan: CyclePlan,
        mutator: Arc<dyn FleetMutator>,
        datacenter: &str,
    ) -> CycleReport {
        let mut selected = Vec::with_capacity(plan.operations.len());
        let mut in_flight = InFlight::default();
        for planned in plan.operations {
            selected.push((planned.operation, planned.intents.len()));
            in_flight.extend(self.apply(
                planned.operation,
                planned.intents,
                mutator.clone(),
                datacenter,
            ));
        }
        CycleReport {
            selected,
            shutdown_error: plan.shutdown_error,
            in_flight,
        }
    }

    /// One evaluation cycle: shutdown, memory-down, cpu-down, memory-up,
    /// cpu-up.
    pub async fn run_cycle(
        &self,
        snapshot: &[WorkloadMachineTuple],
        sessions: &dyn SessionInventory,
        mutator: Arc<dyn FleetMutator>,
        datacenter: &str,
    ) -> CycleReport {
        let plan = self.plan(snapshot, sessions).await;
        self.execute(plan, mutator, datacenter)
    }
}
