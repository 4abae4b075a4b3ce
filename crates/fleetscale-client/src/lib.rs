//! fleetscale-client — interfaces to the services around the policy engine.
//!
//! The engine never talks HTTP directly. It depends on three async
//! traits, each with a reqwest-backed implementation and an in-memory
//! double for tests and dry runs:
//!
//! ```text
//! SnapshotProvider   ── HttpSnapshotProvider   GET  {base}/workloads
//!                    └─ FileSnapshotProvider   JSON file on disk
//! SessionInventory   ── HttpSessionInventory   GET  {machine api}/getMeetings?checksum=…
//! FleetMutator       ── HttpFleetMutator       POST .../servers/{id}/stop
//!                                              PATCH .../servers/{id}
//! ```

pub mod error;
pub mod memory;
pub mod mutator;
pub mod sessions;
pub mod snapshot;

use async_trait::async_trait;

use fleetscale_core::{MachineUpdate, SessionStats, WorkloadMachineTuple};

pub use error::{ClientError, ClientResult};
pub use mutator::HttpFleetMutator;
pub use sessions::HttpSessionInventory;
pub use snapshot::{FileSnapshotProvider, HttpSnapshotProvider};

/// Live session occupancy per machine.
#[async_trait]
pub trait SessionInventory: Send + Sync {
    /// Sessions currently hosted on the machine reachable at `machine_address`.
    async fn get_sessions(&self, machine_address: &str) -> ClientResult<Vec<SessionStats>>;
}

/// Power and size mutations on fleet machines.
#[async_trait]
pub trait FleetMutator: Send + Sync {
    async fn power_off(&self, machine_id: &str, datacenter: &str) -> ClientResult<()>;

    async fn resize(
        &self,
        machine_id: &str,
        datacenter: &str,
        update: MachineUpdate,
    ) -> ClientResult<()>;
}

/// Source of the per-cycle utilization snapshot.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    async fn fetch(&self) -> ClientResult<Vec<WorkloadMachineTuple>>;
}

pub(crate) async fn check_status(resp: reqwest::Response) -> ClientResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status: status.as_u16(),
        body,
    })
}

pub(crate) fn http_client(timeout: std::time::Duration) -> ClientResult<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("fleetscale/", env!("CARGO_PKG_VERSION")))
        .build()?)
}
