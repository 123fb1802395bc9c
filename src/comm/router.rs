use crate::comm::channel::{ChannelId, CommPaths, INBOUND_PRIORITY};
use crate::comm::markers::{take_marked, TurnSignal, TURN_DONE, TURN_END, TURN_START};
use crate::errors::{RelayError, RelayResult};
use crate::utils::atomic_write;
use anyhow::Context;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, trace};

const DEFAULT_POLL_MS: u64 = 200;

/// Consumer side of the message bus: drains inbound slots and routes replies
/// back to the outbound slot matching the last consumed identity.
///
/// Exactly one `ChannelRouter` should exist per foreground loop — the active
/// turn identity lives here.
pub struct ChannelRouter {
    paths: CommPaths,
    poll: Duration,
    active: ChannelId,
}

impl ChannelRouter {
    pub fn new(paths: CommPaths, poll_ms: u64) -> Self {
        Self {
            paths,
            poll: Duration::from_millis(poll_ms.max(1)),
            active: ChannelId::Local,
        }
    }

    pub fn with_default_poll(paths: CommPaths) -> Self {
        Self::new(paths, DEFAULT_POLL_MS)
    }

    /// Identity of the turn currently being replied to. Before any inbound
    /// message has been consumed this defaults to the local terminal.
    pub fn active(&self) -> ChannelId {
        self.active
    }

    /// Block until any inbound slot carries a complete message (start marker
    /// present), then consume it.
    ///
    /// Polls with a bounded sleep rather than busy-spinning. When several
    /// identities are pending at once the fixed priority order decides;
    /// the others stay pending and are picked up on the next call. No
    /// timeout — callers block until a message arrives or the process stops.
    pub async fn await_inbound(&mut self) -> RelayResult<(String, ChannelId)> {
        loop {
            for channel in INBOUND_PRIORITY {
                if let Some(text) = self.try_consume(channel)? {
                    debug!("Consumed inbound message from '{}'", channel);
                    self.active = channel;
                    return Ok((text, channel));
                }
            }
            tokio::time::sleep(self.poll).await;
        }
    }

    /// Non-blocking variant of `await_inbound`: a single pass over the
    /// priority order.
    pub fn poll_inbound(&mut self) -> RelayResult<Option<(String, ChannelId)>> {
        for channel in INBOUND_PRIORITY {
            if let Some(text) = self.try_consume(channel)? {
                self.active = channel;
                return Ok(Some((text, channel)));
            }
        }
        Ok(None)
    }

    fn try_consume(&self, channel: ChannelId) -> RelayResult<Option<String>> {
        let path = self.paths.inbound(channel);
        let Some(content) = read_slot(&path)? else {
            return Ok(None);
        };
        let Some(stripped) = take_marked(&content, TURN_START) else {
            // Slot holds a partial write; leave it until the marker lands
            return Ok(None);
        };
        // Clearing to empty is the consumption handshake
        atomic_write(&path, "").context("Failed to clear inbound slot")?;
        trace!("Cleared inbound slot {}", path.display());
        Ok(Some(stripped.trim().to_string()))
    }

    /// Append reply text to the outbound slot of the active identity,
    /// followed by an end-of-turn marker (`final_for_turn`) or a done marker
    /// meaning more output follows in this turn.
    pub fn emit_outbound(&self, text: &str, final_for_turn: bool) -> RelayResult<()> {
        let path = self.paths.outbound(self.active);
        let marker = if final_for_turn { TURN_END } else { TURN_DONE };
        append_slot(&path, &format!("{}\n{}\n", text, marker))?;
        debug!(
            "Emitted {} bytes to '{}' outbound ({})",
            text.len(),
            self.active.reply_channel(),
            if final_for_turn { "end" } else { "done" }
        );
        Ok(())
    }
}

/// Producer side: place a message into an inbound slot together with the
/// start marker. Used by the scheduler when firing a task and by remote
/// bridges.
///
/// Each slot holds at most one pending message. With `replace` set a pending
/// message is overwritten (the scheduler fires unconditionally); without it,
/// a pending message is a `ChannelContention` error.
pub fn post_inbound(
    paths: &CommPaths,
    channel: ChannelId,
    text: &str,
    replace: bool,
) -> RelayResult<()> {
    let path = paths.inbound(channel);
    if !replace {
        if let Some(content) = read_slot(&path)? {
            if content.contains(TURN_START) {
                return Err(RelayError::ChannelContention {
                    channel: channel.to_string(),
                    message: "inbound slot already holds a pending message".into(),
                });
            }
        }
    }
    atomic_write(&path, &format!("{}\n{}", text, TURN_START))
        .context("Failed to write inbound slot")?;
    Ok(())
}

/// Drain an outbound slot if it carries a done or end marker. Returns the
/// reply text (markers stripped) and which signal ended it; the slot is
/// cleared. A slot without a marker is a reply still being streamed.
pub fn collect_outbound(
    paths: &CommPaths,
    channel: ChannelId,
) -> RelayResult<Option<(String, TurnSignal)>> {
    let path = paths.outbound(channel);
    let Some(content) = read_slot(&path)? else {
        return Ok(None);
    };
    let signal = if content.contains(TURN_END) {
        TurnSignal::End
    } else if content.contains(TURN_DONE) {
        TurnSignal::Done
    } else {
        return Ok(None);
    };
    // A multi-chunk turn carries a done marker per chunk; strip them all
    let stripped = content.replace(TURN_END, "").replace(TURN_DONE, "");
    atomic_write(&path, "").context("Failed to clear outbound slot")?;
    Ok(Some((stripped.trim().to_string(), signal)))
}

/// Truncate every channel slot into existence. Run at daemon startup so
/// stale messages from a previous run are never replayed and readers never
/// see a missing slot file.
pub fn clear_all(paths: &CommPaths) -> RelayResult<()> {
    for channel in INBOUND_PRIORITY {
        atomic_write(&paths.inbound(channel), "").context("Failed to clear inbound slot")?;
        atomic_write(&paths.outbound(channel), "").context("Failed to clear outbound slot")?;
    }
    Ok(())
}

fn read_slot(path: &Path) -> RelayResult<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) if content.is_empty() => Ok(None),
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(RelayError::Internal(
            anyhow::Error::new(e).context(format!("Failed to read slot {}", path.display())),
        )),
    }
}

fn append_slot(path: &Path, chunk: &str) -> RelayResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open outbound slot {}", path.display()))?;
    file.write_all(chunk.as_bytes())
        .with_context(|| format!("Failed to append to {}", path.display()))?;
    Ok(())
}
