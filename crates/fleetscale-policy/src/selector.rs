//! Pure selection predicates.
//!
//! Everything here is a function of the snapshot and the policy limits.
//! No I/O, no clock, no state between calls: the same input always yields
//! the same selection.

use std::cmp::Ordering;

use fleetscale_core::{
    CPU_STEP_CORES, MEMORY_STEP_MB, MachineUpdate, MachineWorkloadStatsTuple, MutationIntent,
    PolicyLimits, WorkloadMachineTuple,
};

/// Descending order with NaN ranked below every number.
fn descending(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Rank machines by memory utilization, then CPU utilization, both
/// descending. The sort is stable, so remaining ties keep provider order.
pub fn rank_by_utilization(snapshot: &[WorkloadMachineTuple]) -> Vec<&WorkloadMachineTuple> {
    let mut ranked: Vec<&WorkloadMachineTuple> = snapshot.iter().collect();
    ranked.sort_by(|a, b| {
        descending(a.workload.memory_utilization, b.workload.memory_utilization).then_with(
            || descending(a.workload.cpu_utilization, b.workload.cpu_utilization),
        )
    });
    ranked
}

/// Machines that may be considered for shutdown: the ranking minus the
/// `minimum_active_machines` busiest entries.
pub fn shutdown_candidates<'a>(
    limits: &PolicyLimits,
    snapshot: &'a [WorkloadMachineTuple],
) -> Vec<&'a WorkloadMachineTuple> {
    rank_by_utilization(snapshot)
        .into_iter()
        .skip(limits.minimum_active_machines)
        .collect()
}

/// A candidate is powered off only when it is under-utilized on at least
/// one dimension, no larger than the default size on both, and hosts no
/// participants.
pub fn is_shutdown_eligible(limits: &PolicyLimits, candidate: &MachineWorkloadStatsTuple) -> bool {
    let workload = &candidate.workload;
    let machine = &candidate.machine;

    (workload.memory_utilization < limits.min_allowed_memory_workload
        || workload.cpu_utilization < limits.min_allowed_cpu_workload)
        && machine.cores <= limits.default_worker_cpu
        && machine.ram_mb <= limits.default_worker_memory
        && candidate.total_participants() == 0
}

pub fn power_off_intents(selected: &[MachineWorkloadStatsTuple]) -> Vec<MutationIntent> {
    selected
        .iter()
        .map(|m| MutationIntent::PowerOff {
            machine: m.machine.clone(),
        })
        .collect()
}

/// Previously enlarged machines whose memory is now under-used shrink by
/// one step. Machines at or below the default size are never touched, and
/// a step that would go below zero drops the machine.
pub fn select_memory_down(
    limits: &PolicyLimits,
    snapshot: &[WorkloadMachineTuple],
) -> Vec<MutationIntent> {
    let mut selected: Vec<&WorkloadMachineTuple> = snapshot
        .iter()
        .filter(|t| {
            t.workload.memory_utilization < limits.min_allowed_memory_workload
                && t.machine.ram_mb > limits.default_worker_memory
        })
        .collect();
    selected.sort_by(|a, b| {
        descending(a.workload.memory_utilization, b.workload.memory_utilization)
    });

    selected
        .into_iter()
        .filter_map(|t| {
            let ram_mb = t.machine.ram_mb.checked_sub(MEMORY_STEP_MB)?;
            Some(MutationIntent::Resize {
                machine: t.machine.clone(),
                update: MachineUpdate::ram_mb(ram_mb),
            })
        })
        .collect()
}

pub fn select_cpu_down(
    limits: &PolicyLimits,
    snapshot: &[WorkloadMachineTuple],
) -> Vec<MutationIntent> {
    let mut selected: Vec<&WorkloadMachineTuple> = snapshot
        .iter()
        .filter(|t| {
            t.workload.cpu_utilization < limits.min_allowed_cpu_workload
                && t.machine.cores > limits.default_worker_cpu
        })
        .collect();
    selected.sort_by(|a, b| descending(a.workload.cpu_utilization, b.workload.cpu_utilization));

    selected
        .into_iter()
        .filter_map(|t| {
            let cores = t.machine.cores.checked_sub(CPU_STEP_CORES)?;
            Some(MutationIntent::Resize {
                machine: t.machine.clone(),
                update: MachineUpdate::cores(cores),
            })
        })
        .collect()
}

/// Overloaded machines grow by one memory step unless that would pass the
/// cap. Machines already at the cap are skipped silently.
pub fn select_memory_up(
    limits: &PolicyLimits,
    snapshot: &[WorkloadMachineTuple],
) -> Vec<MutationIntent> {
    snapshot
        .iter()
        .filter(|t| t.workload.memory_utilization > limits.max_allowed_memory_workload)
        .filter_map(|t| {
            let ram_mb = t
                .machine
                .ram_mb
                .checked_add(MEMORY_STEP_MB)
                .filter(|ram| *ram <= limits.max_worker_memory)?;
            Some(MutationIntent::Resize {
                machine: t.machine.clone(),
                update: MachineUpdate::ram_mb(ram_mb),
            })
        })
        .collect()
}

pub fn select_cpu_up(
    limits: &PolicyLimits,
    snapshot: &[WorkloadMachineTuple],
) -> Vec<MutationIntent> {
    snapshot
        .iter()
        .filter(|t| t.workload.cpu_utilization > limits.max_allowed_cpu_workload)
        .filter_map(|t| {
            let cores = t
                .machine
                .cores
                .checked_add(CPU_STEP_CORES)
                .filter(|cores| *cores <= limits.max_worker_cpu)?;
            Some(MutationIntent::Resize {
                machine: t.machine.clone(),
                update: MachineUpdate::cores(cores),
            })
        })
        .collect()
}
