use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Identity of an interaction source, tagged onto every channel slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelId {
    /// The local terminal.
    Local,
    /// The background scheduler firing a task.
    Task,
    /// A remote messaging bridge.
    Remote,
}

/// Fixed order in which pending inbound slots are drained. Deterministic so
/// simultaneous pending messages never race; the losers stay pending.
pub const INBOUND_PRIORITY: [ChannelId; 3] = [ChannelId::Local, ChannelId::Task, ChannelId::Remote];

impl ChannelId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelId::Local => "local",
            ChannelId::Task => "task",
            ChannelId::Remote => "remote",
        }
    }

    /// The outbound identity replies for this source are routed to. Output of
    /// a background-task turn goes to the local terminal.
    pub fn reply_channel(self) -> ChannelId {
        match self {
            ChannelId::Local | ChannelId::Task => ChannelId::Local,
            ChannelId::Remote => ChannelId::Remote,
        }
    }
}

impl std::str::FromStr for ChannelId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "local" => Ok(ChannelId::Local),
            "task" => Ok(ChannelId::Task),
            "remote" => Ok(ChannelId::Remote),
            _ => Err(format!("Unknown channel: {}", s)),
        }
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Maps channel identities to their single-slot files under the comm
/// directory.
#[derive(Debug, Clone)]
pub struct CommPaths {
    dir: PathBuf,
}

impl CommPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn inbound(&self, channel: ChannelId) -> PathBuf {
        let file = match channel {
            ChannelId::Local => "msg.relay",
            ChannelId::Task => "msg_task.relay",
            ChannelId::Remote => "msg_remote.relay",
        };
        self.dir.join(file)
    }

    pub fn outbound(&self, channel: ChannelId) -> PathBuf {
        let file = match channel.reply_channel() {
            ChannelId::Remote => "reply_remote.relay",
            _ => "reply.relay",
        };
        self.dir.join(file)
    }
}
