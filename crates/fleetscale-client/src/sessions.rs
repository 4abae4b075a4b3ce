//! Session inventory client.
//!
//! Every worker runs its own conferencing server, so the inventory is
//! queried per machine. The client talks to a JSON adapter endpoint in
//! front of that server (`{url}/getMeetings`, answering
//! `{"sessions": [...]}`), not to the server's native XML API.
//! Requests are signed the way the conferencing server expects:
//! `hex(sha256(call_name + query + secret))` appended as the `checksum`
//! query parameter.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use fleetscale_core::{SessionApiConfig, SessionStats};

use crate::{check_status, http_client, ClientResult, SessionInventory};

const GET_SESSIONS_CALL: &str = "getMeetings";

#[derive(Debug, Deserialize)]
struct SessionsResponse {
    #[serde(default)]
    sessions: Vec<SessionStats>,
}

/// reqwest-backed [`SessionInventory`].
pub struct HttpSessionInventory {
    url_template: String,
    secret: Option<String>,
    client: reqwest::Client,
}

impl HttpSessionInventory {
    pub fn new(config: &SessionApiConfig, timeout: Duration) -> ClientResult<Self> {
        Ok(Self {
            url_template: config.url_template.trim_end_matches('/').to_string(),
            secret: config.secret.clone(),
            client: http_client(timeout)?,
        })
    }

    /// Full request URL for the machine at `address`.
    pub fn sessions_url(&self, address: &str) -> String {
        let root = self.url_template.replace("{address}", address);
        match &self.secret {
            Some(secret) => format!(
                "{root}/{GET_SESSIONS_CALL}?checksum={}",
                checksum(GET_SESSIONS_CALL, "", secret)
            ),
            None => format!("{root}/{GET_SESSIONS_CALL}"),
        }
    }
}

/// Shared-secret request checksum.
pub fn checksum(call: &str, query: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(call.as_bytes());
    hasher.update(query.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl SessionInventory for HttpSessionInventory {
    async fn get_sessions(&self, machine_address: &str) -> ClientResult<Vec<SessionStats>> {
        let url = self.sessions_url(machine_address);
        let resp = self.client.get(&url).send().await?;
        let resp = check_status(resp).await?;
        let body: SessionsResponse = resp.json().await?;
        debug!(
            address = machine_address,
            sessions = body.sessions.len(),
            "fetched sessions"
        );
        Ok(body.sessions)
    }
}
