//! Protocol constants.
//!
//! Wire-level values are fixed by the KCP segment format and MUST NOT be
//! changed, otherwise sessions stop interoperating with existing peers.
//! Tuning defaults can be overridden per session through
//! [`SessionConfig`](crate::session::SessionConfig).

// =============================================================================
// SEGMENT LAYOUT
// =============================================================================

/// Segment header size: conv(4) + cmd(1) + frg(1) + wnd(2) + ts(4) + sn(4) +
/// una(4) + len(4).
pub const OVERHEAD: usize = 24;

/// Number of leading bytes that carry the connection identifier.
pub const CONV_SIZE: usize = 4;

// =============================================================================
// COMMANDS
// =============================================================================

/// Data segment.
pub const CMD_PUSH: u8 = 81;

/// Acknowledgement of a single data segment.
pub const CMD_ACK: u8 = 82;

/// Window probe: asks the peer to advertise its receive window.
pub const CMD_WASK: u8 = 83;

/// Window response: unsolicited receive window advertisement.
pub const CMD_WINS: u8 = 84;

// =============================================================================
// RETRANSMISSION TIMING (milliseconds)
// =============================================================================

/// Minimum RTO floor in no-delay mode.
pub const RTO_NODELAY: u32 = 30;

/// Minimum RTO floor in normal mode.
pub const RTO_MIN: u32 = 100;

/// RTO used before the first RTT sample.
pub const RTO_DEFAULT: u32 = 200;

/// Upper bound of the computed RTO.
pub const RTO_MAX: u32 = 60_000;

// =============================================================================
// WINDOWS AND SIZES
// =============================================================================

/// Default send window, in segments.
pub const WND_SND: u32 = 32;

/// Default (and minimum) receive window, in segments.
pub const WND_RCV: u32 = 128;

/// A message may be split into at most this many fragments.
///
/// Must stay below [`WND_RCV`] so a complete message always fits in the
/// peer's receive queue.
pub const MAX_FRAGMENTS: usize = WND_RCV as usize - 1;

/// Default MTU, in bytes.
pub const MTU_DEFAULT: u32 = 1400;

// =============================================================================
// DRIVER AND CONGESTION CONTROL
// =============================================================================

/// Default flush interval.
pub const INTERVAL_DEFAULT: u32 = 100;

/// Smallest accepted flush interval.
pub const INTERVAL_MIN: u32 = 10;

/// Largest accepted flush interval.
pub const INTERVAL_MAX: u32 = 5000;

/// Initial slow-start threshold.
pub const THRESH_INIT: u32 = 2;

/// Lower bound of the slow-start threshold.
pub const THRESH_MIN: u32 = 2;

/// First delay before probing a zero remote window.
pub const PROBE_INIT: u32 = 7000;

/// Maximum delay between two window probes.
pub const PROBE_LIMIT: u32 = 120_000;

/// Transmissions of one segment after which the link is reported dead.
pub const DEAD_LINK: u32 = 20;

/// Fast retransmission is skipped once a segment was sent this many times.
pub const FAST_ACK_LIMIT: u32 = 5;

/// Clock jumps larger than this resynchronise the flush schedule.
pub const CLOCK_RESYNC: i32 = 10_000;
