//! Wraparound-safe arithmetic on 32-bit sequence numbers and timestamps.
//!
//! Sequence numbers and the host clock are both `u32` counters that wrap.
//! Ordering is decided by the sign of the wrapping difference, which is
//! correct as long as the two values are less than 2^31 apart.

/// Signed distance from `earlier` to `later`.
///
/// Positive when `later` comes after `earlier`, negative when before.
#[inline]
pub fn diff(later: u32, earlier: u32) -> i32 {
    later.wrapping_sub(earlier) as i32
}

/// Check if `a` comes strictly before `b`.
#[inline]
pub fn before(a: u32, b: u32) -> bool {
    diff(a, b) < 0
}

/// Check if `a` comes at or after `b`.
#[inline]
pub fn at_or_after(a: u32, b: u32) -> bool {
    diff(a, b) >= 0
}
