use crate::errors::{RelayError, RelayResult};
use crate::store::types::TaskRecord;
use crate::utils::{atomic_write, ensure_dir, safe_filename};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

const TASK_EXT: &str = "task";

/// Durable task storage: one JSON file per task under the task directory,
/// keyed by task name.
///
/// Writes go through an atomic replace so a record is never observable in a
/// half-written state. There is no in-memory cache — every `save` is visible
/// to the next `list`/`load`.
pub struct TaskStore {
    dir: PathBuf,
}

impl TaskStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", safe_filename(name), TASK_EXT))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_file()
    }

    /// All currently persisted task names. Order is not significant; sorted
    /// here only so logs and CLI output are stable.
    pub fn list(&self) -> RelayResult<Vec<String>> {
        if !self.dir.exists() {
            return Ok(vec![]);
        }
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| RelayError::StorageUnavailable(format!("{}: {}", self.dir.display(), e)))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| RelayError::StorageUnavailable(format!("{}: {}", self.dir.display(), e)))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(TASK_EXT) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn load(&self, name: &str) -> RelayResult<TaskRecord> {
        let raw = self.read_raw(name)?;
        let value: Value = serde_json::from_str(&raw).map_err(|e| RelayError::MalformedRecord {
            task: name.to_string(),
            reason: e.to_string(),
        })?;
        validate_shape(name, &value)?;
        serde_json::from_value(value).map_err(|e| RelayError::MalformedRecord {
            task: name.to_string(),
            reason: e.to_string(),
        })
    }

    /// Serialize the full record back to storage, preserving round-trip
    /// fidelity for fields untouched by the current operation.
    pub fn save(&self, name: &str, record: &TaskRecord) -> RelayResult<()> {
        let content = serde_json::to_string_pretty(record)
            .map_err(|e| RelayError::Internal(e.into()))?;
        atomic_write(&self.path_for(name), &content)
            .map_err(|e| RelayError::StorageUnavailable(e.to_string()))
    }

    pub fn delete(&self, name: &str) -> RelayResult<()> {
        let path = self.path_for(name);
        if !path.is_file() {
            return Err(RelayError::NotFound(name.to_string()));
        }
        std::fs::remove_file(&path)
            .map_err(|e| RelayError::StorageUnavailable(format!("{}: {}", path.display(), e)))
    }

    /// Raw file content, for the task-info operation.
    pub fn read_raw(&self, name: &str) -> RelayResult<String> {
        let path = self.path_for(name);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(RelayError::NotFound(name.to_string()))
            }
            Err(e) => Err(RelayError::StorageUnavailable(format!(
                "{}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Accept a record from a creator: enforce the minimum interval and
    /// persist. Creates or updates — the original task tool treats both the
    /// same way.
    pub fn accept(&self, name: &str, mut record: TaskRecord) -> RelayResult<TaskRecord> {
        ensure_dir(&self.dir).map_err(|e| RelayError::StorageUnavailable(e.to_string()))?;
        if record.repeat.clamp_interval() {
            debug!(
                "Task '{}': interval below minimum, clamped to {}s",
                name, record.repeat.interval
            );
        }
        self.save(name, &record)?;
        Ok(record)
    }
}

/// Structural checks that give better `MalformedRecord` messages than a bare
/// deserialization failure, and catch shapes serde would silently accept
/// (both timing fields present).
fn validate_shape(name: &str, value: &Value) -> RelayResult<()> {
    let malformed = |reason: String| RelayError::MalformedRecord {
        task: name.to_string(),
        reason,
    };
    let obj = value
        .as_object()
        .ok_or_else(|| malformed("not a JSON object".into()))?;

    let has_countdown = obj.contains_key("countdown");
    let has_start = obj.contains_key("startTime");
    if has_countdown == has_start {
        return Err(malformed(
            "exactly one of `countdown` and `startTime` must be present".into(),
        ));
    }
    if !obj.contains_key("action") {
        return Err(malformed("missing field `action`".into()));
    }
    let repeat = obj
        .get("loop")
        .and_then(Value::as_object)
        .ok_or_else(|| malformed("missing `loop` section".into()))?;
    for field in ["enable", "interval", "remain"] {
        if !repeat.contains_key(field) {
            return Err(malformed(format!("missing field `loop.{}`", field)));
        }
    }
    Ok(())
}
