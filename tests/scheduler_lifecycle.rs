use std::sync::Arc;
use taskrelay::comm::{ChannelId, CommPaths, TURN_START};
use taskrelay::scheduler::{DaemonGate, SchedulerService};
use taskrelay::store::{RepeatSpec, TaskRecord, TaskStore};
use tempfile::TempDir;

fn setup() -> (SchedulerService, Arc<TaskStore>, CommPaths, TempDir) {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let store = Arc::new(TaskStore::new(tmp.path().join("tasks")));
    let paths = CommPaths::new(tmp.path().join("comm"));
    let service = SchedulerService::new(store.clone(), paths.clone(), DaemonGate::new());
    (service, store, paths, tmp)
}

fn record(countdown: i64, enable: bool, interval: u64, remain: i64) -> TaskRecord {
    TaskRecord::new(
        countdown,
        "run the report".into(),
        RepeatSpec {
            enable,
            interval,
            remain,
            exec_count: 0,
        },
    )
}

/// Drain the background-task inbound slot, asserting it held a complete
/// message.
fn take_fired(paths: &CommPaths) -> String {
    let path = paths.inbound(ChannelId::Task);
    let content = std::fs::read_to_string(&path).expect("task inbound slot should exist");
    assert!(
        content.contains(TURN_START),
        "fired message must carry the start marker: {:?}",
        content
    );
    std::fs::write(&path, "").unwrap();
    content.replace(TURN_START, "")
}

fn fired_count(paths: &CommPaths) -> usize {
    match std::fs::read_to_string(paths.inbound(ChannelId::Task)) {
        Ok(content) => usize::from(content.contains(TURN_START)),
        Err(_) => 0,
    }
}

#[test]
fn one_shot_task_fires_exactly_once_then_disappears() {
    let (service, store, paths, _tmp) = setup();
    store.accept("report", record(5, false, 60, 1)).unwrap();

    // t=0: countdown 5 becomes start_time 5
    service.tick_at(0).unwrap();
    assert_eq!(store.load("report").unwrap().start_time(), Some(5));
    assert_eq!(fired_count(&paths), 0);

    // t=4: nothing to do
    service.tick_at(4).unwrap();
    assert!(store.exists("report"));
    assert_eq!(fired_count(&paths), 0);

    // t=6: fires once, record deleted
    service.tick_at(6).unwrap();
    assert!(!store.exists("report"));
    let message = take_fired(&paths);
    assert!(message.contains("Scheduled Task (Once):\nrun the report"));

    // Further scans fire nothing
    service.tick_at(7).unwrap();
    assert_eq!(fired_count(&paths), 0);
}

#[test]
fn finite_loop_runs_exactly_n_times_with_clamped_interval() {
    let (service, store, paths, _tmp) = setup();
    // interval 30 is below the floor: accepted as 60
    let accepted = store.accept("twice", record(0, true, 30, 2)).unwrap();
    assert_eq!(accepted.repeat.interval, 60);

    // First scan only activates
    service.tick_at(0).unwrap();
    let activated = store.load("twice").unwrap();
    assert_eq!(activated.start_time(), Some(0));
    assert_eq!(activated.repeat.exec_count, 0);
    assert_eq!(fired_count(&paths), 0);

    // Second scan: firing #1, rescheduled with the clamped interval
    service.tick_at(0).unwrap();
    let after_first = store.load("twice").unwrap();
    assert_eq!(after_first.repeat.remain, 1);
    assert_eq!(after_first.repeat.exec_count, 1);
    assert_eq!(after_first.start_time(), Some(60), "reschedule is now+60, not now+30");
    let message = take_fired(&paths);
    assert!(message.contains("(1/2) Per 60 seconds"));

    // Not due again before the interval elapses
    service.tick_at(30).unwrap();
    assert_eq!(fired_count(&paths), 0);

    // t=60: firing #2 brings remain to 0 and the record is deleted
    service.tick_at(60).unwrap();
    assert!(!store.exists("twice"));
    let message = take_fired(&paths);
    assert!(message.contains("(2/2) Per 60 seconds"));
}

#[test]
fn unbounded_loop_keeps_firing_and_counting() {
    let (service, store, paths, _tmp) = setup();
    store.accept("forever", record(0, true, 60, -1)).unwrap();

    service.tick_at(0).unwrap(); // activation

    for i in 1..=5 {
        let now = i * 60;
        service.tick_at(now).unwrap();
        let current = store.load("forever").unwrap();
        assert_eq!(current.repeat.exec_count, i as u64);
        assert_eq!(current.repeat.remain, -1);
        assert_eq!(current.start_time(), Some(now + 60));
        let message = take_fired(&paths);
        assert!(message.contains("(Infinite) Per 60 seconds"));
    }
    assert!(store.exists("forever"));
}

#[test]
fn scan_is_idempotent_at_the_same_instant() {
    let (service, store, paths, _tmp) = setup();
    store.accept("later", record(100, true, 60, 3)).unwrap();

    service.tick_at(0).unwrap();
    let scheduled = store.load("later").unwrap();

    service.tick_at(50).unwrap();
    service.tick_at(50).unwrap();
    assert_eq!(store.load("later").unwrap(), scheduled);
    assert_eq!(fired_count(&paths), 0);
}

#[test]
fn exhausted_task_is_reaped_without_firing() {
    let (service, store, paths, _tmp) = setup();
    store.accept("spent", record(0, true, 60, 0)).unwrap();

    service.tick_at(0).unwrap(); // activation
    service.tick_at(0).unwrap(); // due, but remain=0
    assert!(!store.exists("spent"));
    assert_eq!(fired_count(&paths), 0);
}

#[test]
fn invalid_remain_is_reaped_without_firing() {
    let (service, store, paths, _tmp) = setup();
    store.accept("broken", record(0, true, 60, -5)).unwrap();

    service.tick_at(0).unwrap();
    service.tick_at(0).unwrap();
    assert!(!store.exists("broken"));
    assert_eq!(fired_count(&paths), 0);
}

#[test]
fn exec_count_survives_a_restart() {
    let tmp = TempDir::new().unwrap();
    let paths = CommPaths::new(tmp.path().join("comm"));

    {
        let store = Arc::new(TaskStore::new(tmp.path().join("tasks")));
        let service = SchedulerService::new(store.clone(), paths.clone(), DaemonGate::new());
        store.accept("durable", record(0, true, 60, -1)).unwrap();
        service.tick_at(0).unwrap();
        service.tick_at(0).unwrap(); // firing #1
        service.tick_at(60).unwrap(); // firing #2
    }

    // A fresh store and service over the same directory pick up the counters
    let store = Arc::new(TaskStore::new(tmp.path().join("tasks")));
    let service = SchedulerService::new(store.clone(), paths, DaemonGate::new());
    assert_eq!(store.load("durable").unwrap().repeat.exec_count, 2);

    service.tick_at(120).unwrap(); // firing #3
    assert_eq!(store.load("durable").unwrap().repeat.exec_count, 3);
}

#[test]
fn malformed_record_is_retried_not_destroyed() {
    let (service, store, _paths, _tmp) = setup();
    store.accept("fine", record(500, false, 60, 1)).unwrap();
    std::fs::create_dir_all(store.dir()).unwrap();
    std::fs::write(store.dir().join("mangled.task"), "<task>not json</task>").unwrap();

    for now in 0..3 {
        service.tick_at(now).unwrap();
        assert!(store.exists("mangled"), "corrupt record must survive scan {}", now);
    }
    // Fixing the file brings the task back into rotation
    let fixed = serde_json::json!({
        "countdown": 0,
        "action": "recovered",
        "loop": {"enable": false, "interval": 60, "remain": 1}
    });
    std::fs::write(
        store.dir().join("mangled.task"),
        serde_json::to_string(&fixed).unwrap(),
    )
    .unwrap();
    service.tick_at(10).unwrap();
    assert!(store.load("mangled").unwrap().is_scheduled());
}

#[tokio::test]
async fn paused_gate_defers_scans_until_resume() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(TaskStore::new(tmp.path().join("tasks")));
    let paths = CommPaths::new(tmp.path().join("comm"));
    let gate = DaemonGate::new();
    let service = SchedulerService::with_scan_interval(store.clone(), paths, gate.clone(), 1);

    store.accept("waiting", record(0, false, 60, 1)).unwrap();
    gate.pause().await;
    service.start().await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    assert!(
        !store.load("waiting").unwrap().is_scheduled(),
        "no scan may run while the gate is closed"
    );

    gate.resume().await;
    tokio::time::sleep(std::time::Duration::from_millis(1200)).await;
    // Activated (and possibly already fired and deleted) once the gate opened
    let progressed = !store.exists("waiting") || store.load("waiting").unwrap().is_scheduled();
    assert!(progressed, "scan should resume once the gate opens");

    service.stop().await;
}
