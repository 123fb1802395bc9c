use serde::{Deserialize, Serialize};

/// Shortest repeat interval accepted from a creator. Anything smaller is
/// clamped up at the point the record is accepted, never at fire time.
pub const MIN_INTERVAL_SECS: u64 = 60;

/// Sentinel `remain` value meaning the task repeats without bound.
pub const REMAIN_UNBOUNDED: i64 = -1;

/// Timing state of a task, tagged explicitly rather than inferred from
/// which key happens to be present in the file.
///
/// A freshly created task carries `countdown` (seconds until first fire).
/// The scheduler converts it to an absolute `startTime` on first observation
/// and never re-derives it from the countdown again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskTiming {
    PendingCountdown {
        countdown: i64,
    },
    Scheduled {
        #[serde(rename = "startTime")]
        start_time: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepeatSpec {
    pub enable: bool,
    /// Seconds between firings when looping.
    pub interval: u64,
    /// Remaining firings: -1 unbounded, 0 exhausted, N>0 exactly N left.
    pub remain: i64,
    /// Firings actually executed so far. Owned by the scheduler; persisted so
    /// progress labels survive restarts.
    #[serde(default, rename = "execCount")]
    pub exec_count: u64,
}

impl RepeatSpec {
    /// Enforce the minimum interval. Returns true if the value was raised.
    pub fn clamp_interval(&mut self) -> bool {
        if self.interval < MIN_INTERVAL_SECS {
            self.interval = MIN_INTERVAL_SECS;
            return true;
        }
        false
    }
}

/// A persisted schedulable action with timing and repeat metadata.
///
/// The on-disk shape keeps the external contract: `countdown` XOR `startTime`
/// at top level, the opaque `action` payload, and a `loop` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(flatten)]
    pub timing: TaskTiming,
    pub action: String,
    #[serde(rename = "loop")]
    pub repeat: RepeatSpec,
}

impl TaskRecord {
    /// Build a record in its creation form.
    pub fn new(countdown: i64, action: String, repeat: RepeatSpec) -> Self {
        Self {
            timing: TaskTiming::PendingCountdown { countdown },
            action,
            repeat,
        }
    }

    /// Whether the scheduler has converted this task's countdown to an
    /// absolute start time yet.
    pub fn is_scheduled(&self) -> bool {
        matches!(self.timing, TaskTiming::Scheduled { .. })
    }

    pub fn start_time(&self) -> Option<i64> {
        match self.timing {
            TaskTiming::Scheduled { start_time } => Some(start_time),
            TaskTiming::PendingCountdown { .. } => None,
        }
    }
}
