//! fleetscale-policy — the scaling policy engine.
//!
//! Evaluates a snapshot of the worker fleet and decides which machines
//! to power off, shrink or grow. Selection is pure ([`selector`]);
//! applying a selection spawns one detached task per mutation
//! ([`dispatch`]) and returns immediately.
//!
//! # Policy
//!
//! ```text
//! shutdown     rank by (memory desc, cpu desc), skip MINIMUM_ACTIVE_MACHINES,
//!              keep (mem < MIN_MEM or cpu < MIN_CPU)
//!                   and cores <= DEFAULT_CPU and ram <= DEFAULT_MEM
//!                   and participants == 0
//! memory-down  mem < MIN_MEM and ram > DEFAULT_MEM         → ram - 1024
//! cpu-down     cpu < MIN_CPU and cores > DEFAULT_CPU       → cores - 1
//! memory-up    mem > MAX_MEM and ram + 1024 <= MAX_WORKER_MEM → ram + 1024
//! cpu-up       cpu > MAX_CPU and cores + 1 <= MAX_WORKER_CPU  → cores + 1
//! ```
//!
//! The five operations are independent. Unless the engine runs with
//! [`ConflictPolicy::ShutdownExclusive`](fleetscale_core::ConflictPolicy),
//! one machine can be selected by several of them in the same cycle.

pub mod dispatch;
pub mod engine;
pub mod error;
pub mod selector;

pub use dispatch::InFlight;
pub use engine::{CyclePlan, CycleReport, PlannedOperation, ScalingEngine};
pub use error::{PolicyError, PolicyResult};
