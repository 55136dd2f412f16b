//! ARQ layer
//!
//! Reliable, ordered message delivery on top of the segment codec:
//!
//! - [`SendQueue`]: fragmentation, sequence numbers, in-flight bookkeeping
//! - [`ReceiveQueue`]: reordering, duplicate suppression, reassembly
//! - [`AckList`]: acknowledgements owed to the peer
//! - [`ArqEngine`]: the flush/input driver tying them together

mod ack;
mod engine;
mod receiver;
mod sender;

pub use ack::{AckList, PendingAck};
pub use engine::{ArqEngine, InputStats, LinkStats};
pub use receiver::{Arrival, ReceiveQueue};
pub use sender::{InFlight, SendQueue};
