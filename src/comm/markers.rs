//! In-band sentinel strings for the channel handshake.
//!
//! Markers live inside the slot content itself, not in separate files, so a
//! half-written slot is never mistaken for a complete message: the consumer
//! acts only once the trailing marker is present.

/// Appended to an inbound slot once the message is fully written.
pub const TURN_START: &str = "<relay status=start/>";
/// More output may follow in this turn.
pub const TURN_DONE: &str = "<relay status=done/>";
/// The turn is complete.
pub const TURN_END: &str = "<relay status=end/>";

/// Completion state carried by an outbound slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnSignal {
    Done,
    End,
}

/// If `marker` occurs in `content`, return the content with the marker
/// removed. Consumers must strip markers before displaying anything.
pub fn take_marked(content: &str, marker: &str) -> Option<String> {
    if content.contains(marker) {
        Some(content.replace(marker, ""))
    } else {
        None
    }
}
