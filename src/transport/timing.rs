//! RTT estimation and retransmission timeout computation.
//!
//! Uses the integer variant of the RFC 6298 smoother that KCP peers use:
//! - First sample: SRTT = R, RTTVAR = R / 2
//! - Subsequent: RTTVAR = (3 * RTTVAR + |R - SRTT|) / 4, SRTT = (7 * SRTT + R) / 8
//! - RTO = SRTT + max(interval, 4 * RTTVAR), clamped to [min_rto, RTO_MAX]
//!
//! All values are in milliseconds.

use crate::core::constants::{RTO_DEFAULT, RTO_MAX, RTO_MIN, RTO_NODELAY};

/// RTT estimator producing the session-wide base RTO.
#[derive(Debug, Clone)]
pub struct RttEstimator {
    /// Smoothed RTT.
    srtt: i32,
    /// RTT variance.
    rttvar: i32,
    /// Current retransmission timeout.
    rto: u32,
    /// Floor applied to the computed RTO.
    min_rto: u32,
    /// Whether we've received at least one sample.
    initialized: bool,
}

impl Default for RttEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl RttEstimator {
    /// Create an estimator with the normal-mode RTO floor.
    pub fn new() -> Self {
        Self {
            srtt: 0,
            rttvar: 0,
            rto: RTO_DEFAULT,
            min_rto: RTO_MIN,
            initialized: false,
        }
    }

    /// Feed one RTT sample taken from an acknowledged segment.
    ///
    /// `interval` is the flush interval, used as clock granularity.
    pub fn update(&mut self, sample: i32, interval: u32) {
        // keep the fixed-point arithmetic below from overflowing
        let sample = sample.clamp(0, i32::MAX / 8);
        if !self.initialized {
            self.srtt = sample;
            self.rttvar = sample / 2;
            self.initialized = true;
        } else {
            let delta = (sample - self.srtt).abs();
            self.rttvar = (3 * self.rttvar + delta) / 4;
            self.srtt = (7 * self.srtt + sample) / 8;
        }

        let granularity = (self.rttvar as u32).saturating_mul(4).max(interval);
        let rto = (self.srtt as u32).saturating_add(granularity);
        self.rto = rto.clamp(self.min_rto, RTO_MAX);
    }

    /// Current retransmission timeout.
    pub fn rto(&self) -> u32 {
        self.rto
    }

    /// Smoothed RTT, `None` before the first sample.
    pub fn srtt(&self) -> Option<u32> {
        self.initialized.then_some(self.srtt as u32)
    }

    /// RTT variance.
    pub fn rttvar(&self) -> u32 {
        self.rttvar as u32
    }

    /// RTO floor.
    pub fn min_rto(&self) -> u32 {
        self.min_rto
    }

    /// Override the RTO floor, capped at [`RTO_MAX`].
    ///
    /// Only future RTO computations are affected.
    pub fn set_min_rto(&mut self, min_rto: u32) {
        self.min_rto = min_rto.min(RTO_MAX);
    }

    /// Reset the floor to the default of the given mode.
    pub fn set_nodelay_floor(&mut self, nodelay: bool) {
        self.min_rto = if nodelay { RTO_NODELAY } else { RTO_MIN };
    }
}

/// Next RTO of a segment whose retransmission timer expired.
///
/// Normal mode doubles the timeout (at least by the base RTO); no-delay mode
/// grows it by half of the segment's previous timeout. The result never
/// exceeds [`RTO_MAX`], so a resend deadline always lies ahead on the
/// wrapping clock.
pub fn backoff(segment_rto: u32, base_rto: u32, nodelay: bool) -> u32 {
    let step = if nodelay {
        segment_rto / 2
    } else {
        segment_rto.max(base_rto)
    };
    segment_rto.saturating_add(step).min(RTO_MAX)
}
