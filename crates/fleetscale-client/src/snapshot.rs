//! Snapshot providers.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use fleetscale_core::{SnapshotApiConfig, WorkloadMachineTuple};

use crate::{check_status, http_client, ClientError, ClientResult, SnapshotProvider};

/// Fetches the snapshot from the monitoring API as a JSON array.
pub struct HttpSnapshotProvider {
    url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpSnapshotProvider {
    pub fn new(config: &SnapshotApiConfig, timeout: Duration) -> ClientResult<Self> {
        Ok(Self {
            url: format!("{}/workloads", config.base_url.trim_end_matches('/')),
            token: config.token.clone(),
            client: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl SnapshotProvider for HttpSnapshotProvider {
    async fn fetch(&self) -> ClientResult<Vec<WorkloadMachineTuple>> {
        let mut req = self.client.get(&self.url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = check_status(req.send().await?).await?;
        let snapshot: Vec<WorkloadMachineTuple> = resp.json().await?;
        debug!(machines = snapshot.len(), "fetched workload snapshot");
        Ok(snapshot)
    }
}

/// Reads the snapshot from a JSON file. Used for dry runs.
pub struct FileSnapshotProvider {
    path: PathBuf,
}

impl FileSnapshotProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SnapshotProvider for FileSnapshotProvider {
    async fn fetch(&self) -> ClientResult<Vec<WorkloadMachineTuple>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ClientError::Io {
                path: self.path.display().to_string(),
                source,
            })?;
        Ok(serde_json::from_str(&content)?)
    }
}
