//! # kcp-session
//!
//! Reliable, ordered message delivery over an unreliable datagram channel.
//!
//! A [`Session`] is one end of a KCP conversation. It turns application
//! messages into numbered segments, retransmits them until acknowledged,
//! and reassembles the peer's segments into messages again:
//!
//! - **Reliability**: selective and cumulative acks, RTO backoff, fast retransmit
//! - **Flow control**: send/receive windows with zero-window probing
//! - **Congestion control**: slow start and additive increase, optional
//! - **Sans-io**: no sockets, no clock; the host drives `input`/`update`
//!
//! The wire format is the KCP segment layout, so sessions interoperate with
//! other KCP peers.
//!
//! ## Modules
//!
//! - [`core`]: Constants, errors, serial-number arithmetic, output trait
//! - [`transport`]: Segment codec, RTT estimation, congestion window
//! - [`arq`]: Send/receive queues and the flush/input driver
//! - [`session`]: The session handle, configuration and output modes
//!
//! ## Example Usage
//!
//! ```rust
//! use kcp_session::prelude::*;
//!
//! let mut client = Session::with_config(0x1234, SessionConfig::fast()).unwrap();
//! let mut server = Session::with_config(0x1234, SessionConfig::fast()).unwrap();
//!
//! client.send(b"hello").unwrap();
//!
//! let mut now = 0;
//! while server.peeksize().unwrap().is_none() {
//!     for datagram in client.update(now).unwrap() {
//!         // route by conv, as a host with many sessions would
//!         assert_eq!(get_conv(&datagram).unwrap(), 0x1234);
//!         server.input(&datagram).unwrap();
//!     }
//!     for datagram in server.update(now).unwrap() {
//!         client.input(&datagram).unwrap();
//!     }
//!     now += 10;
//! }
//!
//! assert_eq!(server.recv(1024).unwrap(), Some(b"hello".to_vec()));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod arq;
pub mod core;
pub mod session;
pub mod transport;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::arq::{InputStats, LinkStats};
    pub use crate::core::{KcpError, KcpResult, OutputHandler, SegmentError};
    pub use crate::session::{NoDelayConfig, OutputMode, Session, SessionConfig, SessionStats};
    pub use crate::transport::get_conv;
}

// Re-export commonly used items at crate root
pub use arq::{InputStats, LinkStats};
pub use core::{KcpError, KcpResult, OutputHandler, SegmentError};
pub use session::{NoDelayConfig, OutputMode, Session, SessionConfig, SessionStats};
pub use transport::{decode_datagram, get_conv};
