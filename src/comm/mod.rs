pub mod channel;
pub mod markers;
pub mod router;

pub use channel::{ChannelId, CommPaths, INBOUND_PRIORITY};
pub use markers::{TurnSignal, TURN_DONE, TURN_END, TURN_START};
pub use router::{clear_all, collect_outbound, post_inbound, ChannelRouter};
