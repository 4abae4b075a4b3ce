//! fleetscaled — wiring for the fleetscale daemon.
//!
//! Assembles the snapshot provider, session inventory, fleet mutator and
//! scaling engine from configuration and drives evaluation cycles.

pub mod daemon;

pub use daemon::Daemon;
