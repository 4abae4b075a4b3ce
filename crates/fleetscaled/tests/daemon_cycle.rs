//! Daemon cycle tests.
//!
//! Drives full evaluation cycles, first against in-memory collaborators
//! and then end-to-end over HTTP against a fake cloud, monitoring and
//! conferencing API served by axum.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use tokio::sync::watch;

use fleetscale_client::memory::{
    MutationCall, RecordingMutator, StaticSessionInventory, StaticSnapshotProvider,
};
use fleetscale_core::*;
use fleetscale_policy::ScalingEngine;
use fleetscaled::Daemon;

fn limits() -> PolicyLimits {
    PolicyLimits {
        minimum_active_machines: 1,
        max_allowed_memory_workload: 0.8,
        max_allowed_cpu_workload: 0.8,
        min_allowed_memory_workload: 0.2,
        min_allowed_cpu_workload: 0.2,
        max_worker_memory: 8192,
        max_worker_cpu: 4,
        default_worker_memory: 2048,
        default_worker_cpu: 2,
    }
}

fn tuple(id: &str, ip: &str, cpu: f64, mem: f64, cores: u32, ram_mb: u32) -> WorkloadMachineTuple {
    WorkloadMachineTuple {
        machine: Machine {
            id: id.to_string(),
            primary_ip: ip.to_string(),
            cores,
            ram_mb,
        },
        workload: Workload {
            cpu_utilization: cpu,
            memory_utilization: mem,
        },
    }
}

/// busy: protected by the minimum, hot on memory → memory-up.
/// idle: empty default machine → shutdown.
/// occupied: idle-looking but hosting a session → kept.
/// large: enlarged and idle → memory-down and cpu-down.
fn fleet(prefix: &str) -> Vec<WorkloadMachineTuple> {
    vec![
        tuple("busy", &format!("{prefix}1"), 0.5, 0.95, 2, 2048),
        tuple("idle", &format!("{prefix}2"), 0.05, 0.05, 2, 2048),
        tuple("occupied", &format!("{prefix}3"), 0.05, 0.10, 2, 2048),
        tuple("large", &format!("{prefix}4"), 0.05, 0.05, 4, 4096),
    ]
}

fn occupied_room() -> Vec<SessionStats> {
    vec![SessionStats {
        session_id: "standup".to_string(),
        participant_count: 5,
    }]
}

fn sorted(mut calls: Vec<MutationCall>) -> Vec<MutationCall> {
    calls.sort_by_key(|c| format!("{c:?}"));
    calls
}

fn expected_calls(dc: &str) -> Vec<MutationCall> {
    sorted(vec![
        MutationCall::PowerOff {
            machine_id: "idle".to_string(),
            datacenter: dc.to_string(),
        },
        MutationCall::Resize {
            machine_id: "busy".to_string(),
            datacenter: dc.to_string(),
            update: MachineUpdate::ram_mb(3072),
        },
        MutationCall::Resize {
            machine_id: "large".to_string(),
            datacenter: dc.to_string(),
            update: MachineUpdate::ram_mb(3072),
        },
        MutationCall::Resize {
            machine_id: "large".to_string(),
            datacenter: dc.to_string(),
            update: MachineUpdate::cores(3),
        },
    ])
}

#[tokio::test]
async fn cycle_with_in_memory_collaborators() {
    let sessions =
        Arc::new(StaticSessionInventory::new().with_sessions("10.0.0.3", occupied_room()));
    let mutator = Arc::new(RecordingMutator::new());
    let daemon = Daemon::new(
        ScalingEngine::new(limits()),
        "dc-test",
        Arc::new(StaticSnapshotProvider(fleet("10.0.0."))),
        sessions.clone(),
        mutator.clone(),
    );

    let report = daemon.cycle().await.unwrap();
    assert!(report.shutdown_error.is_none());
    assert_eq!(report.selected(Operation::Shutdown), 1);
    assert_eq!(report.selected(Operation::MemoryUp), 1);
    assert_eq!(report.selected(Operation::MemoryDown), 1);
    assert_eq!(report.selected(Operation::CpuDown), 1);
    assert_eq!(report.selected(Operation::CpuUp), 0);
    report.in_flight.settle().await;

    assert_eq!(sorted(mutator.calls()), expected_calls("dc-test"));
    // "busy" is protected and never looked up.
    let mut looked_up = sessions.lookups();
    looked_up.sort();
    assert_eq!(looked_up, vec!["10.0.0.2", "10.0.0.3", "10.0.0.4"]);
}

#[tokio::test]
async fn run_once_fails_when_shutdown_lookup_fails() {
    let mutator = Arc::new(RecordingMutator::new());
    let daemon = Daemon::new(
        ScalingEngine::new(limits()),
        "dc-test",
        Arc::new(StaticSnapshotProvider(fleet("10.0.0."))),
        Arc::new(StaticSessionInventory::new().failing_on("10.0.0.2")),
        mutator.clone(),
    );

    let err = daemon.run_once().await.unwrap_err();
    assert!(err.to_string().contains("shutdown evaluation incomplete"));

    // Resizes are still applied; nothing is powered off.
    let calls = mutator.calls();
    assert_eq!(calls.len(), 3);
    assert!(
        calls
            .iter()
            .all(|c| matches!(c, MutationCall::Resize { .. }))
    );
}

#[tokio::test]
async fn run_once_settles_mutations() {
    let mutator = Arc::new(RecordingMutator::new());
    let daemon = Daemon::new(
        ScalingEngine::new(limits()),
        "dc-test",
        Arc::new(StaticSnapshotProvider(fleet("10.0.0."))),
        Arc::new(StaticSessionInventory::new().with_sessions("10.0.0.3", occupied_room())),
        mutator.clone(),
    );

    daemon.run_once().await.unwrap();
    assert_eq!(sorted(mutator.calls()), expected_calls("dc-test"));
}

#[tokio::test]
async fn plan_does_not_mutate() {
    let mutator = Arc::new(RecordingMutator::new());
    let daemon = Daemon::new(
        ScalingEngine::new(limits()),
        "dc-test",
        Arc::new(StaticSnapshotProvider(fleet("10.0.0."))),
        Arc::new(StaticSessionInventory::new()),
        mutator.clone(),
    );

    let plan = daemon.plan().await.unwrap();
    // Without the occupied room both idle-looking default machines go.
    assert_eq!(plan.intents(Operation::Shutdown).len(), 2);
    assert!(mutator.calls().is_empty());
}

#[tokio::test]
async fn run_loop_stops_on_shutdown_signal() {
    let mutator = Arc::new(RecordingMutator::new());
    let daemon = Daemon::new(
        ScalingEngine::new(limits()),
        "dc-test",
        Arc::new(StaticSnapshotProvider(fleet("10.0.0."))),
        Arc::new(StaticSessionInventory::new()),
        mutator.clone(),
    );

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        daemon.run(Duration::from_millis(10), rx).await;
    });

    for _ in 0..200 {
        if !mutator.calls().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(!mutator.calls().is_empty());

    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("run loop did not stop")
        .unwrap();
}

// ── End-to-end over HTTP ───────────────────────────────────────

#[derive(Clone)]
struct FakeApis {
    snapshot: Arc<Vec<WorkloadMachineTuple>>,
    calls: Arc<Mutex<Vec<MutationCall>>>,
}

async fn workloads(State(apis): State<FakeApis>) -> Json<Vec<WorkloadMachineTuple>> {
    Json(apis.snapshot.as_ref().clone())
}

async fn get_meetings(Path(machine): Path<String>) -> Json<serde_json::Value> {
    if machine == "m3" {
        Json(serde_json::json!({ "sessions": occupied_room() }))
    } else {
        Json(serde_json::json!({ "sessions": [] }))
    }
}

async fn stop(
    State(apis): State<FakeApis>,
    Path((dc, id)): Path<(String, String)>,
) -> StatusCode {
    apis.calls.lock().unwrap().push(MutationCall::PowerOff {
        machine_id: id,
        datacenter: dc,
    });
    StatusCode::ACCEPTED
}

async fn update(
    State(apis): State<FakeApis>,
    Path((dc, id)): Path<(String, String)>,
    Json(update): Json<MachineUpdate>,
) -> StatusCode {
    apis.calls.lock().unwrap().push(MutationCall::Resize {
        machine_id: id,
        datacenter: dc,
        update,
    });
    StatusCode::ACCEPTED
}

#[tokio::test]
async fn cycle_over_http() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Every machine's conferencing API lives on the fake server under
    // its own path segment: {address} = "127.0.0.1:port/machines/mN".
    let apis = FakeApis {
        snapshot: Arc::new(fleet(&format!("{addr}/machines/m"))),
        calls: Arc::default(),
    };
    let router = Router::new()
        .route("/monitor/workloads", get(workloads))
        .route("/machines/{machine}/conf/getMeetings", get(get_meetings))
        .route("/cloud/datacenters/{dc}/servers/{id}/stop", post(stop))
        .route("/cloud/datacenters/{dc}/servers/{id}", patch(update))
        .with_state(apis.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let toml = format!(
        r#"
[DEFAULT]
MINIMUM_ACTIVE_MACHINES = 1
MAX_ALLOWED_MEMORY_WORKLOAD = 0.8
MAX_ALLOWED_CPU_WORKLOAD = 0.8
MIN_ALLOWED_MEMORY_WORKLOAD = 0.2
MIN_ALLOWED_CPU_WORKLOAD = 0.2
MAX_WORKER_MEMORY = 8192
MAX_WORKER_CPU = 4
DEFAULT_WORKER_MEMORY = 2048
DEFAULT_WORKER_CPU = 2

[daemon]
datacenter = "dc-http"
request_timeout_secs = 5

[daemon.mutation_api]
base_url = "http://{addr}/cloud"

[daemon.session_api]
url_template = "http://{{address}}/conf"

[daemon.snapshot_api]
base_url = "http://{addr}/monitor"
"#
    );
    let config = FleetConfig::from_toml_str(&toml, |_| None).unwrap();
    let daemon = Daemon::from_config(&config).unwrap();

    let report = daemon.cycle().await.unwrap();
    assert!(report.shutdown_error.is_none());
    report.in_flight.settle().await;

    let calls = apis.calls.lock().unwrap().clone();
    assert_eq!(sorted(calls), expected_calls("dc-http"));
}
