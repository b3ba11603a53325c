//! Job run scenarios driven through the orchestrator with a scripted
//! transport.

mod common;

use std::sync::Arc;

use tokio::sync::Notify;

use common::{mac, mac_table, JobBuilder, Response, TestHarness};
use macwatch::db::{job_repo, run_repo};
use macwatch::model::{
    timestamp_now, DeviceStatus, JobRun, JobStatus, NotificationKind, RetentionPolicy, RunStatus,
};
use macwatch::{EngineConfig, Orchestrator, ScanError};

const DEVICE: &str = "aa:bb:cc:dd:ee:ff";

fn assert_released(harness: &TestHarness, job_id: i64) {
    assert!(!harness.orchestrator.registry().is_running(job_id));
    assert_eq!(harness.job(job_id).status, JobStatus::Active);
}

#[tokio::test]
async fn test_new_authorized_device() {
    let harness = TestHarness::new();
    let job_id = JobBuilder::new("office")
        .host("SwitchA")
        .whitelist(DEVICE)
        .create(&harness.db);
    harness.transport.set(
        "SwitchA",
        Response::Output(mac_table(&[(10, "AA:BB:CC:DD:EE:FF", "Gi0/1")])),
    );

    let summary = harness.orchestrator.run_job(job_id).await.unwrap();

    assert_eq!(summary.hosts_scanned, 1);
    assert_eq!(summary.hosts_failed, 0);
    assert_eq!(summary.devices_found, 1);
    assert_eq!(summary.new_devices, 1);
    assert_eq!(summary.warnings, 0);

    let devices = harness.devices(job_id);
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].mac, mac(DEVICE));
    assert_eq!(devices[0].host, "SwitchA");
    assert_eq!(devices[0].interface, "Gi0/1");
    assert_eq!(devices[0].vlan, 10);
    assert!(devices[0].whitelisted);
    assert_eq!(devices[0].status, DeviceStatus::Active);

    let notifications = harness.notifications(job_id);
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::Informational);
    assert_eq!(notifications[0].job_name, "office");

    let runs = harness.runs(job_id);
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].id, summary.run_id);
    assert_eq!(runs[0].status, RunStatus::Completed);
    assert_eq!(runs[0].new_devices, 1);
    assert!(runs[0].finished_at.is_some());

    assert_released(&harness, job_id);
}

#[tokio::test]
async fn test_unauthorized_device_counts_warning() {
    let harness = TestHarness::new();
    let job_id = JobBuilder::new("office").host("SwitchA").create(&harness.db);
    harness.transport.set(
        "SwitchA",
        Response::Output(mac_table(&[(10, DEVICE, "Gi0/1")])),
    );

    let summary = harness.orchestrator.run_job(job_id).await.unwrap();

    assert_eq!(summary.warnings, 1);
    assert!(!harness.devices(job_id)[0].whitelisted);

    let notifications = harness.notifications(job_id);
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::Warning);
    assert_eq!(harness.runs(job_id)[0].warnings, 1);
}

#[tokio::test]
async fn test_interface_move() {
    let harness = TestHarness::new();
    let job_id = JobBuilder::new("office").host("SwitchA").create(&harness.db);
    harness.transport.set(
        "SwitchA",
        Response::Output(mac_table(&[(10, DEVICE, "Gi0/1")])),
    );
    harness.orchestrator.run_job(job_id).await.unwrap();

    harness.transport.set(
        "SwitchA",
        Response::Output(mac_table(&[(10, DEVICE, "Gi0/2")])),
    );
    let summary = harness.orchestrator.run_job(job_id).await.unwrap();

    assert_eq!(summary.new_devices, 0);
    assert_eq!(harness.devices(job_id)[0].interface, "Gi0/2");

    let notifications = harness.notifications(job_id);
    assert_eq!(notifications.len(), 2);
    let moved = &notifications[1];
    assert_eq!(moved.kind, NotificationKind::Informational);
    assert!(moved.message.contains("Gi0/1"));
    assert!(moved.message.contains("Gi0/2"));
}

#[tokio::test]
async fn test_partial_host_failure_completes() {
    let harness = TestHarness::new();
    let job_id = JobBuilder::new("campus")
        .host("SwitchA")
        .host("SwitchB")
        .create(&harness.db);
    harness.transport.set(
        "SwitchA",
        Response::Output(mac_table(&[(10, DEVICE, "Gi0/1")])),
    );
    harness
        .transport
        .set("SwitchB", Response::Fail("connection refused".to_string()));

    let summary = harness.orchestrator.run_job(job_id).await.unwrap();

    assert_eq!(summary.hosts_scanned, 2);
    assert_eq!(summary.hosts_failed, 1);
    assert_eq!(summary.devices_found, 1);
    assert_eq!(summary.log.len(), 1);
    assert!(summary.log[0].starts_with("SwitchB:"));
    assert!(summary.log[0].contains("connection refused"));

    let run = &harness.runs(job_id)[0];
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.hosts_scanned, 2);
    assert_eq!(run.log, summary.log);
}

#[tokio::test(start_paused = true)]
async fn test_host_timeout_is_host_failure() {
    let harness = TestHarness::new();
    let job_id = JobBuilder::new("campus")
        .host("SwitchA")
        .host("SwitchB")
        .create(&harness.db);
    harness.transport.set(
        "SwitchA",
        Response::Output(mac_table(&[(10, DEVICE, "Gi0/1")])),
    );
    harness.transport.set("SwitchB", Response::Hang);

    let summary = harness.orchestrator.run_job(job_id).await.unwrap();

    assert_eq!(summary.hosts_failed, 1);
    assert!(summary.log[0].contains("Timed out"));
    assert_eq!(harness.devices(job_id).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_deadline_fails_pending_hosts() {
    let config = EngineConfig {
        run_deadline_secs: Some(5),
        ..Default::default()
    };
    let harness = TestHarness::with_config(config);
    let job_id = JobBuilder::new("campus")
        .host("SwitchA")
        .host("SwitchB")
        .create(&harness.db);
    harness.transport.set(
        "SwitchA",
        Response::Output(mac_table(&[(10, DEVICE, "Gi0/1")])),
    );
    harness.transport.set("SwitchB", Response::Hang);

    let summary = harness.orchestrator.run_job(job_id).await.unwrap();

    assert_eq!(summary.hosts_failed, 1);
    assert!(summary.log[0].contains("deadline"));
}

#[tokio::test]
async fn test_total_failure_leaves_inventory_untouched() {
    let harness = TestHarness::new();
    let job_id = JobBuilder::new("campus")
        .host("SwitchA")
        .host("SwitchB")
        .create(&harness.db);
    harness.transport.set(
        "SwitchA",
        Response::Output(mac_table(&[(10, DEVICE, "Gi0/1")])),
    );
    harness.transport.set(
        "SwitchB",
        Response::Output(mac_table(&[(20, "00:11:22:33:44:55", "Gi0/9")])),
    );
    harness.orchestrator.run_job(job_id).await.unwrap();
    let before = harness.devices(job_id);
    let history_before = harness.history_count(job_id);

    harness
        .transport
        .set("SwitchA", Response::Fail("connection refused".to_string()));
    harness
        .transport
        .set("SwitchB", Response::Output("   \n".to_string()));

    let result = harness.orchestrator.run_job(job_id).await;

    match result {
        Err(ScanError::AllHostsFailed { job_id: id, message }) => {
            assert_eq!(id, job_id);
            assert!(message.contains("SwitchA"));
            assert!(message.contains("SwitchB"));
        }
        other => panic!("expected AllHostsFailed, got {:?}", other),
    }

    assert_eq!(harness.devices(job_id), before);
    assert_eq!(harness.history_count(job_id), history_before);

    let runs = harness.runs(job_id);
    assert_eq!(runs.len(), 2);
    let failed = runs.iter().find(|r| r.status == RunStatus::Failed).unwrap();
    assert!(failed.error.is_some());
    assert!(failed.finished_at.is_some());
    assert_eq!(failed.log.len(), 2);

    assert_released(&harness, job_id);
}

#[tokio::test]
async fn test_second_run_of_same_job_is_rejected() {
    let harness = TestHarness::new();
    let job_id = JobBuilder::new("office").host("SwitchA").create(&harness.db);
    let gate = Arc::new(Notify::new());
    harness.transport.set(
        "SwitchA",
        Response::Gated(gate.clone(), mac_table(&[(10, DEVICE, "Gi0/1")])),
    );

    let orchestrator = harness.orchestrator.clone();
    let first = tokio::spawn(async move { orchestrator.run_job(job_id).await });

    while harness.transport.calls().is_empty() {
        tokio::task::yield_now().await;
    }
    assert!(harness.orchestrator.registry().is_running(job_id));
    assert_eq!(harness.job(job_id).status, JobStatus::Running);

    let second = harness.orchestrator.run_job(job_id).await;
    assert!(matches!(second, Err(ScanError::AlreadyRunning { .. })));

    gate.notify_one();
    let summary = first.await.unwrap().unwrap();
    assert_eq!(summary.new_devices, 1);

    // The rejected attempt wrote nothing.
    assert_eq!(harness.runs(job_id).len(), 1);
    assert_released(&harness, job_id);
}

#[tokio::test]
async fn test_no_enabled_hosts() {
    let harness = TestHarness::new();
    let job_id = JobBuilder::new("office")
        .disabled_host("SwitchA")
        .create(&harness.db);

    let result = harness.orchestrator.run_job(job_id).await;

    assert!(matches!(result, Err(ScanError::NoEnabledHosts(id)) if id == job_id));
    assert!(harness.runs(job_id).is_empty());
    assert!(harness.transport.calls().is_empty());
    assert_released(&harness, job_id);
}

#[tokio::test]
async fn test_missing_or_disabled_job() {
    let harness = TestHarness::new();
    let result = harness.orchestrator.run_job(999).await;
    assert!(matches!(result, Err(ScanError::JobNotFound(999))));

    let job_id = JobBuilder::new("retired").host("SwitchA").create(&harness.db);
    harness
        .db
        .with_conn(|conn| job_repo::update_status(conn, job_id, JobStatus::Disabled, timestamp_now()))
        .unwrap();

    let result = harness.orchestrator.run_job(job_id).await;
    assert!(matches!(result, Err(ScanError::JobNotFound(id)) if id == job_id));
    assert!(harness.runs(job_id).is_empty());
    assert!(!harness.orchestrator.registry().is_running(job_id));
}

#[tokio::test]
async fn test_repeated_run_is_idempotent() {
    let harness = TestHarness::new();
    let job_id = JobBuilder::new("office")
        .host("SwitchA")
        .host("SwitchB")
        .create(&harness.db);
    harness.transport.set(
        "SwitchA",
        Response::Output(mac_table(&[(10, DEVICE, "Gi0/1"), (10, DEVICE, "Gi0/1")])),
    );
    harness.transport.set(
        "SwitchB",
        Response::Output(mac_table(&[(10, DEVICE, "Te1/1")])),
    );

    let first = harness.orchestrator.run_job(job_id).await.unwrap();
    let devices_before = harness.devices(job_id);
    let second = harness.orchestrator.run_job(job_id).await.unwrap();

    // Same MAC on two switches is two inventory records.
    assert_eq!(first.devices_found, 2);
    assert_eq!(first.new_devices, 2);
    assert_eq!(second.devices_found, 2);
    assert_eq!(second.new_devices, 0);
    assert_eq!(second.warnings, 0);
    assert_eq!(harness.notifications(job_id).len(), 2);

    let devices_after = harness.devices(job_id);
    for (before, after) in devices_before.iter().zip(&devices_after) {
        assert_eq!(before.interface, after.interface);
        assert_eq!(before.first_seen, after.first_seen);
        assert!(after.last_seen >= before.last_seen);
    }

    // Three raw observations per run.
    assert_eq!(harness.history_count(job_id), 6);
}

#[tokio::test]
async fn test_retention_runs_after_reconciliation() {
    let harness = TestHarness::new();
    let job_id = JobBuilder::new("lab")
        .host("SwitchA")
        .retention(RetentionPolicy::RemoveImmediately)
        .create(&harness.db);
    harness.transport.set(
        "SwitchA",
        Response::Output(mac_table(&[
            (10, DEVICE, "Gi0/1"),
            (10, "00:11:22:33:44:55", "Gi0/2"),
        ])),
    );
    harness.orchestrator.run_job(job_id).await.unwrap();

    harness.transport.set(
        "SwitchA",
        Response::Output(mac_table(&[(10, DEVICE, "Gi0/1")])),
    );
    let summary = harness.orchestrator.run_job(job_id).await.unwrap();

    assert_eq!(summary.devices_pruned, 1);
    let devices = harness.devices(job_id);
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].mac, mac(DEVICE));
    assert_eq!(harness.history_count(job_id), 3);
}

#[tokio::test]
async fn test_unseen_device_kept_inactive_under_forever() {
    let harness = TestHarness::new();
    let job_id = JobBuilder::new("lab").host("SwitchA").create(&harness.db);
    harness.transport.set(
        "SwitchA",
        Response::Output(mac_table(&[
            (10, DEVICE, "Gi0/1"),
            (10, "00:11:22:33:44:55", "Gi0/2"),
        ])),
    );
    harness.orchestrator.run_job(job_id).await.unwrap();

    harness.transport.set(
        "SwitchA",
        Response::Output(mac_table(&[(10, DEVICE, "Gi0/1")])),
    );
    let summary = harness.orchestrator.run_job(job_id).await.unwrap();

    assert_eq!(summary.devices_pruned, 0);
    let devices = harness.devices(job_id);
    assert_eq!(devices.len(), 2);
    let gone = devices
        .iter()
        .find(|d| d.mac == mac("00:11:22:33:44:55"))
        .unwrap();
    assert_eq!(gone.status, DeviceStatus::Inactive);
}

#[tokio::test]
async fn test_vlan_filter_reaches_transport() {
    let harness = TestHarness::new();
    let job_id = JobBuilder::new("voice")
        .host("SwitchA")
        .vlan_filter(20)
        .create(&harness.db);
    harness.transport.set(
        "SwitchA",
        Response::Output(mac_table(&[(20, DEVICE, "Gi0/1")])),
    );

    harness.orchestrator.run_job(job_id).await.unwrap();

    assert_eq!(
        harness.transport.calls(),
        vec![("SwitchA".to_string(), Some(20))]
    );
}

#[tokio::test]
async fn test_run_all_reports_each_job() {
    let harness = TestHarness::new();
    let ok_job = JobBuilder::new("office").host("SwitchA").create(&harness.db);
    let empty_job = JobBuilder::new("empty").create(&harness.db);
    harness.transport.set(
        "SwitchA",
        Response::Output(mac_table(&[(10, DEVICE, "Gi0/1")])),
    );

    let outcomes = harness.orchestrator.run_all().await.unwrap();

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].0, ok_job);
    assert!(outcomes[0].1.is_ok());
    assert_eq!(outcomes[1].0, empty_job);
    assert!(matches!(outcomes[1].1, Err(ScanError::NoEnabledHosts(_))));
}

#[tokio::test]
async fn test_recover_interrupted_runs() {
    let harness = TestHarness::new();
    let job_id = JobBuilder::new("office").host("SwitchA").create(&harness.db);
    harness
        .db
        .transaction(|tx| {
            run_repo::insert(tx, &JobRun::start(job_id, timestamp_now()))?;
            job_repo::update_status(tx, job_id, JobStatus::Running, timestamp_now())?;
            Ok(())
        })
        .unwrap();

    // A job left running by a dead process cannot start again.
    let blocked = harness.orchestrator.run_job(job_id).await;
    assert!(matches!(blocked, Err(ScanError::AlreadyRunning { .. })));

    let report = harness.orchestrator.recover_interrupted_runs().unwrap();
    assert_eq!(report.runs_failed, 1);
    assert_eq!(report.jobs_reset, 1);
    assert_eq!(harness.runs(job_id)[0].status, RunStatus::Failed);

    harness.transport.set(
        "SwitchA",
        Response::Output(mac_table(&[(10, DEVICE, "Gi0/1")])),
    );
    assert!(harness.orchestrator.run_job(job_id).await.is_ok());
}

#[tokio::test]
async fn test_runs_of_different_jobs_on_spawned_tasks() {
    let harness = TestHarness::new();
    let office = JobBuilder::new("office").host("SwitchA").create(&harness.db);
    let lab = JobBuilder::new("lab").host("SwitchB").create(&harness.db);
    harness.transport.set(
        "SwitchA",
        Response::Output(mac_table(&[(10, DEVICE, "Gi0/1")])),
    );
    harness.transport.set(
        "SwitchB",
        Response::Output(mac_table(&[(20, "00:11:22:33:44:55", "Gi0/2")])),
    );

    let tasks: Vec<_> = [office, lab]
        .into_iter()
        .map(|job_id| {
            let orchestrator = harness.orchestrator.clone();
            tokio::spawn(async move { orchestrator.run_job(job_id).await })
        })
        .collect();
    for task in tasks {
        let summary = task.await.unwrap().unwrap();
        assert_eq!(summary.new_devices, 1);
    }

    assert_eq!(harness.devices(office).len(), 1);
    assert_eq!(harness.devices(lab).len(), 1);
    assert_released(&harness, office);
    assert_released(&harness, lab);
}

#[tokio::test]
async fn test_job_claimed_by_other_engine_is_rejected() {
    let harness = TestHarness::new();
    let job_id = JobBuilder::new("office").host("SwitchA").create(&harness.db);
    let gate = Arc::new(Notify::new());
    harness.transport.set(
        "SwitchA",
        Response::Gated(gate.clone(), mac_table(&[(10, DEVICE, "Gi0/1")])),
    );

    // Same database, separate run registry: stands in for a second process.
    let other = Orchestrator::new(
        harness.db.clone(),
        harness.transport.clone(),
        EngineConfig::default(),
    );

    let orchestrator = harness.orchestrator.clone();
    let first = tokio::spawn(async move { orchestrator.run_job(job_id).await });
    while harness.transport.calls().is_empty() {
        tokio::task::yield_now().await;
    }

    let second = other.run_job(job_id).await;
    assert!(matches!(second, Err(ScanError::AlreadyRunning { .. })));
    assert!(!other.registry().is_running(job_id));

    gate.notify_one();
    first.await.unwrap().unwrap();
    assert_eq!(harness.runs(job_id).len(), 1);
    assert_released(&harness, job_id);
}

#[tokio::test]
async fn test_storage_error_rolls_back_and_fails_run() {
    let harness = TestHarness::new();
    let job_id = JobBuilder::new("office").host("SwitchA").create(&harness.db);
    harness
        .db
        .with_conn(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER reject_notifications BEFORE INSERT ON notifications
                 BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
            )?;
            Ok(())
        })
        .unwrap();
    harness.transport.set(
        "SwitchA",
        Response::Output(mac_table(&[(10, DEVICE, "Gi0/1")])),
    );

    let result = harness.orchestrator.run_job(job_id).await;

    assert!(matches!(result, Err(ScanError::Database(_))));
    assert!(harness.devices(job_id).is_empty());
    assert_eq!(harness.history_count(job_id), 0);
    assert!(harness.notifications(job_id).is_empty());

    let runs = harness.runs(job_id);
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Failed);
    assert!(runs[0].error.as_deref().unwrap().contains("disk full"));
    assert!(runs[0].finished_at.is_some());

    assert_released(&harness, job_id);
}

#[tokio::test]
async fn test_unrepresentable_run_deadline_means_none() {
    let config = EngineConfig {
        run_deadline_secs: Some(u64::MAX),
        ..Default::default()
    };
    let harness = TestHarness::with_config(config);
    let job_id = JobBuilder::new("office").host("SwitchA").create(&harness.db);
    harness.transport.set(
        "SwitchA",
        Response::Output(mac_table(&[(10, DEVICE, "Gi0/1")])),
    );

    let summary = harness.orchestrator.run_job(job_id).await.unwrap();

    assert_eq!(summary.hosts_failed, 0);
    assert_eq!(summary.new_devices, 1);
}
