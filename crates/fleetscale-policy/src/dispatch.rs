//! Fire-and-forget mutation dispatch.
//!
//! Each intent becomes its own tokio task. The caller gets an [`InFlight`]
//! back; dropping it detaches the tasks, which is what the daemon does.
//! Failed calls are logged by the task itself and never reported back.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use fleetscale_client::FleetMutator;
use fleetscale_core::{MutationIntent, Operation};

/// Handles of spawned mutation tasks.
#[derive(Debug, Default)]
pub struct InFlight {
    handles: Vec<JoinHandle<()>>,
}

impl InFlight {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn extend(&mut self, other: InFlight) {
        self.handles.extend(other.handles);
    }

    /// Wait for every task to finish. Returns how many ran to completion
    /// without panicking. Call outcomes stay unobserved.
    pub async fn settle(self) -> usize {
        let mut completed = 0;
        for handle in self.handles {
            if handle.await.is_ok() {
                completed += 1;
            }
        }
        completed
    }
}

/// Spawn one task per intent and return without waiting.
pub fn dispatch(
    operation: Operation,
    intents: Vec<MutationIntent>,
    mutator: Arc<dyn FleetMutator>,
    datacenter: &str,
) -> InFlight {
    let datacenter: Arc<str> = Arc::from(datacenter);
    let handles = intents
        .into_iter()
        .map(|intent| {
            let mutator = mutator.clone();
            let datacenter = datacenter.clone();
            tokio::spawn(async move {
                apply(operation, &intent, mutator.as_ref(), &datacenter).await;
            })
        })
        .collect();
    InFlight { handles }
}

async fn apply(
    operation: Operation,
    intent: &MutationIntent,
    mutator: &dyn FleetMutator,
    datacenter: &str,
) {
    let machine = intent.machine();
    let result = match intent {
        MutationIntent::PowerOff { .. } => {
            info!(
                %operation,
                address = %machine.primary_ip,
                machine_id = %machine.id,
                "powering off machine"
            );
            mutator.power_off(&machine.id, datacenter).await
        }
        MutationIntent::Resize { update, .. } => {
            info!(
                %operation,
                address = %machine.primary_ip,
                machine_id = %machine.id,
                cores = ?update.cores,
                ram_mb = ?update.ram_mb,
                "resizing machine"
            );
            mutator.resize(&machine.id, datacenter, *update).await
        }
    };

    if let Err(e) = result {
        warn!(
            %operation,
            address = %machine.primary_ip,
            machine_id = %machine.id,
            error = %e,
            "mutation failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetscale_client::memory::{MutationCall, RecordingMutator};
    use fleetscale_core::{Machine, MachineUpdate};

    fn machine(id: &str) -> Machine {
        Machine {
            id: id.to_string(),
            primary_ip: format!("ip-{id}"),
            cores: 2,
            ram_mb: 2048,
        }
    }

    #[tokio::test]
    async fn dispatch_spawns_one_task_per_intent() {
        let mutator = Arc::new(RecordingMutator::new());
        let intents = vec![
            MutationIntent::PowerOff {
                machine: machine("a"),
            },
            MutationIntent::Resize {
                machine: machine("b"),
                update: MachineUpdate::cores(3),
            },
        ];

        let in_flight = dispatch(Operation::Shutdown, intents, mutator.clone(), "dc-1");
        assert_eq!(in_flight.len(), 2);
        assert_eq!(in_flight.settle().await, 2);

        let mut calls = mutator.calls();
        calls.sort_by_key(|c| format!("{c:?}"));
        assert_eq!(
            calls,
            vec![
                MutationCall::PowerOff {
                    machine_id: "a".to_string(),
                    datacenter: "dc-1".to_string(),
                },
                MutationCall::Resize {
                    machine_id: "b".to_string(),
                    datacenter: "dc-1".to_string(),
                    update: MachineUpdate::cores(3),
                },
            ]
        );
    }

    #[tokio::test]
    async fn failed_mutations_are_swallowed() {
        let mutator = Arc::new(RecordingMutator::failing());
        let intents = vec![MutationIntent::PowerOff {
            machine: machine("a"),
        }];

        let in_flight = dispatch(Operation::Shutdown, intents, mutator.clone(), "dc");
        assert_eq!(in_flight.settle().await, 1);
        assert_eq!(mutator.calls().len(), 1);
    }

    #[tokio::test]
    async fn empty_selection_spawns_nothing() {
        let mutator = Arc::new(RecordingMutator::new());
        let in_flight = dispatch(Operation::CpuUp, Vec::new(), mutator, "dc");
        assert!(in_flight.is_empty());
    }
}
