//! Transport layer
//!
//! Everything that concerns a single segment on the wire and the timing of
//! its transmission:
//!
//! - **Segment codec**: [`Segment`], [`SegmentHeader`], [`get_conv`]
//! - **RTT estimation**: [`RttEstimator`] and timeout [`backoff`]
//! - **Congestion control**: [`CongestionController`], [`WindowProbe`]
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            Session                      │
//! ├─────────────────────────────────────────┤
//! │            ARQ engine                   │
//! │   send/receive queues, acks, driver     │
//! ├─────────────────────────────────────────┤
//! │         Transport Layer                 │  ← This module
//! │   segments, RTT, congestion window      │
//! ├─────────────────────────────────────────┤
//! │     host datagram socket (external)     │
//! └─────────────────────────────────────────┘
//! ```

mod congestion;
mod segment;
mod timing;

pub use congestion::{CongestionController, WindowProbe};
pub use segment::*;
pub use timing::{RttEstimator, backoff};
