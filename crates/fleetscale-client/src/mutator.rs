//! Fleet mutation API client.
//!
//! Power-off is a `POST` to the server's `stop` action; resize is a
//! `PATCH` of the server properties with only the changed fields.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use fleetscale_core::{MachineUpdate, MutationApiConfig};

use crate::{check_status, http_client, ClientResult, FleetMutator};

/// reqwest-backed [`FleetMutator`].
pub struct HttpFleetMutator {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpFleetMutator {
    pub fn new(config: &MutationApiConfig, timeout: Duration) -> ClientResult<Self> {
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            client: http_client(timeout)?,
        })
    }

    fn server_url(&self, datacenter: &str, machine_id: &str) -> String {
        format!(
            "{}/datacenters/{datacenter}/servers/{machine_id}",
            self.base_url
        )
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait]
impl FleetMutator for HttpFleetMutator {
    async fn power_off(&self, machine_id: &str, datacenter: &str) -> ClientResult<()> {
        let url = format!("{}/stop", self.server_url(datacenter, machine_id));
        debug!(%url, "requesting power-off");
        let resp = self.authorize(self.client.post(&url)).send().await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn resize(
        &self,
        machine_id: &str,
        datacenter: &str,
        update: MachineUpdate,
    ) -> ClientResult<()> {
        let url = self.server_url(datacenter, machine_id);
        debug!(%url, ?update, "requesting resize");
        let resp = self
            .authorize(self.client.patch(&url))
            .json(&update)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }
}
