//! Shared types used across fleetscale crates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// RAM added or removed by a single memory resize step, in MB.
pub const MEMORY_STEP_MB: u32 = 1024;

/// Cores added or removed by a single CPU resize step.
pub const CPU_STEP_CORES: u32 = 1;

/// A provisioned worker machine as reported by the fleet API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub id: String,
    /// Address used to reach the conferencing server on the machine.
    pub primary_ip: String,
    pub cores: u32,
    pub ram_mb: u32,
}

/// Current utilization of a machine, in the same unit as the configured
/// workload thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    pub cpu_utilization: f64,
    pub memory_utilization: f64,
}

/// One machine paired with its current workload. The unit of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadMachineTuple {
    pub machine: Machine,
    pub workload: Workload,
}

/// Occupancy of one ongoing conferencing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    #[serde(default)]
    pub session_id: String,
    pub participant_count: u32,
}

/// A snapshot entry extended with the machine's live sessions. Built only
/// for shutdown candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineWorkloadStatsTuple {
    pub machine: Machine,
    pub workload: Workload,
    pub stats: Vec<SessionStats>,
}

impl MachineWorkloadStatsTuple {
    pub fn new(tuple: &WorkloadMachineTuple, stats: Vec<SessionStats>) -> Self {
        Self {
            machine: tuple.machine.clone(),
            workload: tuple.workload,
            stats,
        }
    }

    /// Participants across all sessions hosted on the machine.
    pub fn total_participants(&self) -> u64 {
        self.stats
            .iter()
            .map(|s| u64::from(s.participant_count))
            .sum()
    }
}

/// Resize request body. Fields left as `None` are not changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cores: Option<u32>,
    #[serde(rename = "ram", skip_serializing_if = "Option::is_none")]
    pub ram_mb: Option<u32>,
}

impl MachineUpdate {
    pub fn cores(cores: u32) -> Self {
        Self {
            cores: Some(cores),
            ram_mb: None,
        }
    }

    pub fn ram_mb(ram_mb: u32) -> Self {
        Self {
            cores: None,
            ram_mb: Some(ram_mb),
        }
    }
}

/// The five policy operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Shutdown,
    MemoryDown,
    CpuDown,
    MemoryUp,
    CpuUp,
}

impl Operation {
    /// All operations in the order a cycle runs them.
    pub const ALL: [Operation; 5] = [
        Operation::Shutdown,
        Operation::MemoryDown,
        Operation::CpuDown,
        Operation::MemoryUp,
        Operation::CpuUp,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Operation::Shutdown => "shutdown",
            Operation::MemoryDown => "memory-down",
            Operation::CpuDown => "cpu-down",
            Operation::MemoryUp => "memory-up",
            Operation::CpuUp => "cpu-up",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single mutation the engine wants the fleet API to perform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MutationIntent {
    PowerOff { machine: Machine },
    Resize { machine: Machine, update: MachineUpdate },
}

impl MutationIntent {
    pub fn machine(&self) -> &Machine {
        match self {
            MutationIntent::PowerOff { machine } | MutationIntent::Resize { machine, .. } => {
                machine
            }
        }
    }
}
