use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Pause/resume gate between the foreground loop and the background
/// scheduler.
///
/// An explicit cloneable handle rather than a process-wide flag: the
/// foreground loop closes the gate before blocking on interactive input or
/// running a tool, and reopens it once its output is handed off. The
/// scheduler checks the gate immediately before every scan tick.
#[derive(Clone)]
pub struct DaemonGate {
    paused: Arc<Mutex<bool>>,
}

impl DaemonGate {
    pub fn new() -> Self {
        Self {
            paused: Arc::new(Mutex::new(false)),
        }
    }

    pub async fn pause(&self) {
        *self.paused.lock().await = true;
        debug!("Daemon gate closed");
    }

    pub async fn resume(&self) {
        *self.paused.lock().await = false;
        debug!("Daemon gate opened");
    }

    pub async fn is_paused(&self) -> bool {
        *self.paused.lock().await
    }
}

impl Default for DaemonGate {
    fn default() -> Self {
        Self::new()
    }
}
