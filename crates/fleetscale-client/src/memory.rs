//! In-memory collaborators for tests and dry runs.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use fleetscale_core::{MachineUpdate, SessionStats, WorkloadMachineTuple};

use crate::{ClientError, ClientResult, FleetMutator, SessionInventory, SnapshotProvider};

/// Session inventory backed by a fixed address → sessions map. Unknown
/// addresses host no sessions.
#[derive(Default)]
pub struct StaticSessionInventory {
    sessions: HashMap<String, Vec<SessionStats>>,
    failing: HashSet<String>,
    lookups: Mutex<Vec<String>>,
}

impl StaticSessionInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sessions(mut self, address: &str, sessions: Vec<SessionStats>) -> Self {
        self.sessions.insert(address.to_string(), sessions);
        self
    }

    /// Make lookups for `address` fail.
    pub fn failing_on(mut self, address: &str) -> Self {
        self.failing.insert(address.to_string());
        self
    }

    /// Addresses looked up so far, in call order.
    pub fn lookups(&self) -> Vec<String> {
        self.lookups
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl SessionInventory for StaticSessionInventory {
    async fn get_sessions(&self, machine_address: &str) -> ClientResult<Vec<SessionStats>> {
        self.lookups
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(machine_address.to_string());
        if self.failing.contains(machine_address) {
            return Err(ClientError::Unavailable(format!(
                "session lookup for {machine_address} failed"
            )));
        }
        Ok(self
            .sessions
            .get(machine_address)
            .cloned()
            .unwrap_or_default())
    }
}

/// A mutation received by [`RecordingMutator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationCall {
    PowerOff {
        machine_id: String,
        datacenter: String,
    },
    Resize {
        machine_id: String,
        datacenter: String,
        update: MachineUpdate,
    },
}

/// Records every mutation. Optionally fails each call after recording it.
#[derive(Default)]
pub struct RecordingMutator {
    calls: Mutex<Vec<MutationCall>>,
    fail: bool,
}

impl RecordingMutator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn calls(&self) -> Vec<MutationCall> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn record(&self, call: MutationCall) -> ClientResult<()> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
        if self.fail {
            Err(ClientError::Unavailable("mutation rejected".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl FleetMutator for RecordingMutator {
    async fn power_off(&self, machine_id: &str, datacenter: &str) -> ClientResult<()> {
        self.record(MutationCall::PowerOff {
            machine_id: machine_id.to_string(),
            datacenter: datacenter.to_string(),
        })
    }

    async fn resize(
        &self,
        machine_id: &str,
        datacenter: &str,
        update: MachineUpdate,
    ) -> ClientResult<()> {
        self.record(MutationCall::Resize {
            machine_id: machine_id.to_string(),
            datacenter: datacenter.to_string(),
            update,
        })
    }
}

/// Always returns the same snapshot.
pub struct StaticSnapshotProvider(pub Vec<WorkloadMachineTuple>);

#[async_trait]
impl SnapshotProvider for StaticSnapshotProvider {
    async fn fetch(&self) -> ClientResult<Vec<WorkloadMachineTuple>> {
        Ok(self.0.clone())
    }
}
