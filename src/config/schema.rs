use crate::utils::get_workspace_path;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between scan ticks.
    #[serde(default = "default_scan_interval", rename = "scanIntervalSecs")]
    pub scan_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scan_interval_secs: default_scan_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommConfig {
    /// Bounded sleep between inbound polls, in milliseconds.
    #[serde(default = "default_poll_ms", rename = "pollMs")]
    pub poll_ms: u64,
}

impl Default for CommConfig {
    fn default() -> Self {
        Self {
            poll_ms: default_poll_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_workspace")]
    pub workspace: String,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub comm: CommConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            scheduler: SchedulerConfig::default(),
            comm: CommConfig::default(),
        }
    }
}

impl Config {
    pub fn workspace_path(&self) -> PathBuf {
        get_workspace_path(&self.workspace)
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.workspace_path().join("tasks")
    }

    pub fn comm_dir(&self) -> PathBuf {
        self.workspace_path().join("comm")
    }
}

fn default_true() -> bool {
    true
}

fn default_scan_interval() -> u64 {
    1
}

fn default_poll_ms() -> u64 {
    200
}

fn default_workspace() -> String {
    "~/.taskrelay/workspace".to_string()
}
