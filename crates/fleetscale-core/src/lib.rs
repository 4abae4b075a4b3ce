//! fleetscale-core — shared data model and configuration.
//!
//! The data model describes one evaluation cycle: a snapshot of
//! [`WorkloadMachineTuple`]s (machine plus current utilization) and the
//! mutation intents derived from it. Configuration is read once at
//! startup into an immutable [`FleetConfig`].

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    ConflictPolicy, DaemonConfig, FleetConfig, MutationApiConfig, PolicyLimits,
    SessionApiConfig, SnapshotApiConfig,
};
pub use error::{ConfigError, ConfigResult};
pub use types::*;
