use crate::comm::channel::{ChannelId, CommPaths};
use crate::comm::router::post_inbound;
use crate::errors::{RelayError, RelayResult};
use crate::scheduler::gate::DaemonGate;
use crate::scheduler::transition::{plan_tick, TerminalReason, TickDecision};
use crate::store::TaskStore;
use crate::utils::now_secs;
use crate::utils::task_tracker::TaskTracker;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const DEFAULT_SCAN_INTERVAL_S: u64 = 1;
/// Window for the "task coming up" debug log.
const UPCOMING_WINDOW_S: i64 = 10;

/// Background scan loop over the task store.
///
/// Each tick iterates every persisted task once, applies the pure transition,
/// performs the fire effect, and persists the result. Tasks are evaluated
/// independently — a malformed record is skipped and retried next tick, and
/// one task's transition never depends on another's within the same tick.
#[derive(Clone)]
pub struct SchedulerService {
    store: Arc<TaskStore>,
    paths: CommPaths,
    gate: DaemonGate,
    scan_interval: Duration,
    running: Arc<Mutex<bool>>,
    task_tracker: Arc<TaskTracker>,
}

impl SchedulerService {
    pub fn new(store: Arc<TaskStore>, paths: CommPaths, gate: DaemonGate) -> Self {
        Self::with_scan_interval(store, paths, gate, DEFAULT_SCAN_INTERVAL_S)
    }

    pub fn with_scan_interval(
        store: Arc<TaskStore>,
        paths: CommPaths,
        gate: DaemonGate,
        scan_interval_s: u64,
    ) -> Self {
        Self {
            store,
            paths,
            gate,
            scan_interval: Duration::from_secs(scan_interval_s.max(1)),
            running: Arc::new(Mutex::new(false)),
            task_tracker: Arc::new(TaskTracker::new()),
        }
    }

    pub async fn start(&self) -> Result<()> {
        *self.running.lock().await = true;
        let service = self.clone();
        let task_tracker = self.task_tracker.clone();

        let handle = tokio::spawn(async move {
            loop {
                if !*service.running.lock().await {
                    break;
                }

                // The gate is re-checked right before every tick, so a pause
                // requested during the sleep takes effect before the scan
                if service.gate.is_paused().await {
                    tokio::time::sleep(service.scan_interval).await;
                    continue;
                }

                if let Err(e) = service.tick_at(now_secs()) {
                    warn!("Scan tick aborted: {}", e);
                }

                tokio::time::sleep(service.scan_interval).await;
            }
        });

        task_tracker.spawn("scheduler".to_string(), handle).await;

        info!(
            "Scheduler started (scan every {})",
            humantime::format_duration(self.scan_interval)
        );
        Ok(())
    }

    pub async fn stop(&self) {
        *self.running.lock().await = false;
        self.task_tracker.cancel_all().await;
    }

    /// Run one scan tick at time `now` (epoch seconds). Public so tests can
    /// drive the scheduler deterministically.
    ///
    /// Storage being unavailable aborts the whole tick; per-task failures
    /// only skip that task.
    pub fn tick_at(&self, now: i64) -> RelayResult<()> {
        let names = self.store.list()?;
        for name in names {
            match self.process_task(&name, now) {
                Ok(()) => {}
                Err(RelayError::NotFound(_)) => {
                    // Deleted between list and load; nothing to do
                }
                Err(e) if e.is_retryable() => {
                    warn!("Task '{}' skipped this tick: {}", name, e);
                }
                Err(e) => {
                    warn!("Task '{}' failed: {}", name, e);
                }
            }
        }
        Ok(())
    }

    fn process_task(&self, name: &str, now: i64) -> RelayResult<()> {
        let record = self.store.load(name)?;
        let outcome = plan_tick(&record, now);

        // The fire effect lands in the background-task inbound channel before
        // the record is rewritten: a task is not Scheduled again until its
        // firing is fully handed off
        if let Some(fire) = &outcome.fire {
            info!("Firing task '{}'", name);
            post_inbound(&self.paths, ChannelId::Task, &fire.message, true)?;
        }

        match outcome.decision {
            TickDecision::NoOp => {
                if let Some(start_time) = record.start_time() {
                    let delta = start_time - now;
                    if delta > 0 && delta <= UPCOMING_WINDOW_S {
                        debug!(
                            "Task '{}' due in {} (at {})",
                            name,
                            humantime::format_duration(Duration::from_secs(delta as u64)),
                            format_ts(start_time)
                        );
                    }
                }
            }
            TickDecision::Activated => {
                if let Some(activated) = &outcome.record {
                    self.store.save(name, activated)?;
                    if let Some(start_time) = activated.start_time() {
                        info!(
                            "Task '{}' accepted; first run at {}",
                            name,
                            format_ts(start_time)
                        );
                    }
                }
            }
            TickDecision::RescheduleAt(next) => {
                if let Some(fired) = &outcome.record {
                    self.store.save(name, fired)?;
                    let remaining = if fired.repeat.remain < 0 {
                        "infinite".to_string()
                    } else {
                        fired.repeat.remain.to_string()
                    };
                    info!(
                        "Task '{}' executed; next run at {}, remaining executions: {}",
                        name,
                        format_ts(next),
                        remaining
                    );
                }
            }
            TickDecision::Terminal(reason) => {
                self.store.delete(name)?;
                match reason {
                    TerminalReason::OneShot => {
                        info!("Task '{}' is not a looping task; deleted after firing", name);
                    }
                    TerminalReason::Completed => {
                        info!("Task '{}' finished its last execution; deleted", name);
                    }
                    TerminalReason::Exhausted => {
                        info!("Task '{}' has no remaining executions; deleted", name);
                    }
                    TerminalReason::InvalidRepeatState => {
                        warn!(
                            "{}",
                            RelayError::InvalidRepeatState {
                                task: name.to_string(),
                                remain: record.repeat.remain,
                            }
                        );
                    }
                }
            }
        }
        Ok(())
    }
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map_or_else(|| ts.to_string(), |dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}
