//! fleetscale.toml configuration loader.
//!
//! Policy limits live in the `[DEFAULT]` table and may be overridden one
//! key at a time by an environment variable of the same name. Daemon
//! settings (endpoints, datacenter, loop interval) live under `[daemon]`.
//!
//! ```toml
//! [DEFAULT]
//! MINIMUM_ACTIVE_MACHINES = 1
//! MAX_ALLOWED_MEMORY_WORKLOAD = 0.8
//! MAX_ALLOWED_CPU_WORKLOAD = 0.8
//! MIN_ALLOWED_MEMORY_WORKLOAD = 0.2
//! MIN_ALLOWED_CPU_WORKLOAD = 0.2
//! MAX_WORKER_MEMORY = 8192
//! MAX_WORKER_CPU = 4
//! DEFAULT_WORKER_MEMORY = 2048
//! DEFAULT_WORKER_CPU = 2
//!
//! [daemon]
//! datacenter = "dc-1"
//!
//! [daemon.mutation_api]
//! base_url = "https://cloud.example/v6"
//!
//! [daemon.session_api]
//! url_template = "https://{address}/conference/api"
//!
//! [daemon.snapshot_api]
//! base_url = "https://monitoring.example/api"
//! ```

use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

pub const MINIMUM_ACTIVE_MACHINES: &str = "MINIMUM_ACTIVE_MACHINES";
pub const MAX_ALLOWED_MEMORY_WORKLOAD: &str = "MAX_ALLOWED_MEMORY_WORKLOAD";
pub const MAX_ALLOWED_CPU_WORKLOAD: &str = "MAX_ALLOWED_CPU_WORKLOAD";
pub const MIN_ALLOWED_MEMORY_WORKLOAD: &str = "MIN_ALLOWED_MEMORY_WORKLOAD";
pub const MIN_ALLOWED_CPU_WORKLOAD: &str = "MIN_ALLOWED_CPU_WORKLOAD";
pub const MAX_WORKER_MEMORY: &str = "MAX_WORKER_MEMORY";
pub const MAX_WORKER_CPU: &str = "MAX_WORKER_CPU";
pub const DEFAULT_WORKER_MEMORY: &str = "DEFAULT_WORKER_MEMORY";
pub const DEFAULT_WORKER_CPU: &str = "DEFAULT_WORKER_CPU";

const MUTATION_TOKEN_ENV: &str = "FLEETSCALE_MUTATION_TOKEN";
const SESSION_SECRET_ENV: &str = "FLEETSCALE_SESSION_SECRET";
const SNAPSHOT_TOKEN_ENV: &str = "FLEETSCALE_SNAPSHOT_TOKEN";

/// Thresholds and size limits for the scaling policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolicyLimits {
    /// Machines always kept running, highest utilization first.
    pub minimum_active_machines: usize,
    pub max_allowed_memory_workload: f64,
    pub max_allowed_cpu_workload: f64,
    pub min_allowed_memory_workload: f64,
    pub min_allowed_cpu_workload: f64,
    /// RAM cap per machine, in MB.
    pub max_worker_memory: u32,
    pub max_worker_cpu: u32,
    /// Baseline RAM per machine, in MB.
    pub default_worker_memory: u32,
    pub default_worker_cpu: u32,
}

impl PolicyLimits {
    /// Resolve every key from `env` first, then from `defaults`.
    pub fn resolve<F>(defaults: &toml::Table, env: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // A negative minimum protects nothing.
        let minimum_active: i64 = lookup(MINIMUM_ACTIVE_MACHINES, defaults, &env)?;
        let minimum_active_machines = usize::try_from(minimum_active.max(0)).map_err(|_| {
            ConfigError::Invalid {
                key: MINIMUM_ACTIVE_MACHINES.to_string(),
                value: minimum_active.to_string(),
                reason: "out of range".to_string(),
            }
        })?;

        Ok(Self {
            minimum_active_machines,
            max_allowed_memory_workload: lookup(MAX_ALLOWED_MEMORY_WORKLOAD, defaults, &env)?,
            max_allowed_cpu_workload: lookup(MAX_ALLOWED_CPU_WORKLOAD, defaults, &env)?,
            min_allowed_memory_workload: lookup(MIN_ALLOWED_MEMORY_WORKLOAD, defaults, &env)?,
            min_allowed_cpu_workload: lookup(MIN_ALLOWED_CPU_WORKLOAD, defaults, &env)?,
            max_worker_memory: lookup(MAX_WORKER_MEMORY, defaults, &env)?,
            max_worker_cpu: lookup(MAX_WORKER_CPU, defaults, &env)?,
            default_worker_memory: lookup(DEFAULT_WORKER_MEMORY, defaults, &env)?,
            default_worker_cpu: lookup(DEFAULT_WORKER_CPU, defaults, &env)?,
        })
    }
}

/// How selections of different operations interact within one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Every operation acts on its own selection. A machine may be powered
    /// off and resized in the same cycle.
    #[default]
    Independent,
    /// Machines selected for power-off are dropped from the resize
    /// selections of the same cycle.
    ShutdownExclusive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationApiConfig {
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionApiConfig {
    /// Per-machine API root; `{address}` is replaced with the machine's
    /// primary IP.
    pub url_template: String,
    #[serde(default)]
    pub secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotApiConfig {
    pub base_url: String,
    #[serde(default)]
    pub token: Option<String>,
}

/// Settings for the daemon process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    pub datacenter: String,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default)]
    pub conflict_policy: ConflictPolicy,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    pub mutation_api: MutationApiConfig,
    pub session_api: SessionApiConfig,
    pub snapshot_api: SnapshotApiConfig,
}

fn default_interval_secs() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl DaemonConfig {
    fn apply_env_overrides<F>(&mut self, env: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = env(MUTATION_TOKEN_ENV) {
            self.mutation_api.token = Some(token);
        }
        if let Some(secret) = env(SESSION_SECRET_ENV) {
            self.session_api.secret = Some(secret);
        }
        if let Some(token) = env(SNAPSHOT_TOKEN_ENV) {
            self.snapshot_api.token = Some(token);
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(rename = "DEFAULT", default)]
    defaults: toml::Table,
    daemon: DaemonConfig,
}

/// Full process configuration, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct FleetConfig {
    pub limits: PolicyLimits,
    pub daemon: DaemonConfig,
}

impl FleetConfig {
    /// Load from a file, letting process environment variables override
    /// individual values.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content, |key| std::env::var(key).ok())
    }

    /// Parse TOML content with an explicit environment lookup.
    pub fn from_toml_str<F>(content: &str, env: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw: RawConfig = toml::from_str(content)?;
        let limits = PolicyLimits::resolve(&raw.defaults, &env)?;
        let mut daemon = raw.daemon;
        daemon.apply_env_overrides(&env);
        Ok(Self { limits, daemon })
    }
}

fn lookup<T, F>(key: &str, defaults: &toml::Table, env: &F) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = match env(key) {
        Some(value) => value,
        None => match defaults.get(key) {
            Some(toml::Value::String(s)) => s.clone(),
            Some(toml::Value::Integer(i)) => i.to_string(),
            Some(toml::Value::Float(f)) => f.to_string(),
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: key.to_string(),
                    value: other.to_string(),
                    reason: format!("expected a number, found {}", other.type_str()),
                });
            }
            None => {
                return Err(ConfigError::Missing {
                    key: key.to_string(),
                });
            }
        },
    };

    raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        key: key.to_string(),
        value: raw.clone(),
        reason: e.to_string(),
    })
}
