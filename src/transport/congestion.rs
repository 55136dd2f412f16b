//! Congestion and flow control.
//!
//! [`CongestionController`] keeps the congestion window (slow start, additive
//! increase, multiplicative decrease). [`WindowProbe`] schedules window
//! probes while the peer advertises a zero receive window.

use crate::core::constants::{PROBE_INIT, PROBE_LIMIT, THRESH_INIT, THRESH_MIN};
use crate::core::serial;

/// Congestion window state.
#[derive(Debug, Clone)]
pub struct CongestionController {
    /// Congestion window, in segments.
    cwnd: u32,
    /// Slow-start threshold, in segments.
    ssthresh: u32,
    /// Byte credit used for additive increase.
    incr: u32,
    /// When false the window is bounded only by the send/remote windows.
    enabled: bool,
}

impl Default for CongestionController {
    fn default() -> Self {
        Self::new()
    }
}

impl CongestionController {
    /// Create a controller in slow start.
    pub fn new() -> Self {
        Self {
            cwnd: 0,
            ssthresh: THRESH_INIT,
            incr: 0,
            enabled: true,
        }
    }

    /// Enable or disable congestion control.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Current congestion window.
    pub fn cwnd(&self) -> u32 {
        self.cwnd
    }

    /// Current slow-start threshold.
    pub fn ssthresh(&self) -> u32 {
        self.ssthresh
    }

    /// Number of segments allowed in flight.
    pub fn allowed(&self, snd_wnd: u32, rmt_wnd: u32) -> u32 {
        let wnd = snd_wnd.min(rmt_wnd);
        if self.enabled { wnd.min(self.cwnd) } else { wnd }
    }

    /// Grow the window after the cumulative ack advanced.
    pub fn on_ack_progress(&mut self, mss: u32, rmt_wnd: u32) {
        if self.cwnd >= rmt_wnd {
            return;
        }

        if self.cwnd < self.ssthresh {
            // slow start
            self.cwnd += 1;
            self.incr = self.incr.saturating_add(mss);
        } else {
            // congestion avoidance
            if self.incr < mss {
                self.incr = mss;
            }
            self.incr = self
                .incr
                .saturating_add(mss.saturating_mul(mss) / self.incr + mss / 16);
            if (self.cwnd as u64 + 1) * mss as u64 <= self.incr as u64 {
                self.cwnd = self.incr.div_ceil(mss.max(1));
            }
        }

        if self.cwnd > rmt_wnd {
            self.cwnd = rmt_wnd;
            self.incr = rmt_wnd.saturating_mul(mss);
        }
    }

    /// Shrink the window after a fast retransmission.
    pub fn on_fast_retransmit(&mut self, inflight: u32, resend: u32, mss: u32) {
        self.ssthresh = (inflight / 2).max(THRESH_MIN);
        self.cwnd = self.ssthresh.saturating_add(resend);
        self.incr = self.cwnd.saturating_mul(mss);
    }

    /// Collapse the window after a retransmission timeout.
    pub fn on_timeout(&mut self, mss: u32) {
        self.ssthresh = (self.cwnd / 2).max(THRESH_MIN);
        self.cwnd = 1;
        self.incr = mss;
    }

    /// Keep at least one segment in flight.
    pub fn ensure_minimum(&mut self, mss: u32) {
        if self.cwnd < 1 {
            self.cwnd = 1;
            self.incr = mss;
        }
    }
}

/// Zero-window probing schedule and pending window commands.
#[derive(Debug, Clone, Default)]
pub struct WindowProbe {
    /// Current delay between probes, 0 while the remote window is open.
    wait: u32,
    /// Clock value at which the next probe is due.
    due: u32,
    /// A window probe (WASK) should be sent on the next flush.
    ask: bool,
    /// A window response (WINS) should be sent on the next flush.
    tell: bool,
}

impl WindowProbe {
    /// Create an idle probe schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the schedule given the remote window at flush time.
    ///
    /// Returns `true` when a new probe was scheduled.
    pub fn poll(&mut self, rmt_wnd: u32, now: u32) -> bool {
        if rmt_wnd != 0 {
            self.wait = 0;
            self.due = 0;
            return false;
        }

        if self.wait == 0 {
            self.wait = PROBE_INIT;
            self.due = now.wrapping_add(self.wait);
        } else if serial::at_or_after(now, self.due) {
            self.wait = self.wait.max(PROBE_INIT);
            self.wait = (self.wait + self.wait / 2).min(PROBE_LIMIT);
            self.due = now.wrapping_add(self.wait);
            self.ask = true;
            return true;
        }
        false
    }

    /// Request a window response on the next flush.
    pub fn request_tell(&mut self) {
        self.tell = true;
    }

    /// Take the pending `(ask, tell)` commands, clearing them.
    pub fn take(&mut self) -> (bool, bool) {
        let pending = (self.ask, self.tell);
        self.ask = false;
        self.tell = false;
        pending
    }

    /// Current probe delay.
    pub fn wait(&self) -> u32 {
        self.wait
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MSS: u32 = 1376;

    #[test]
    fn test_slow_start() {
        let mut cc = CongestionController::new();
        cc.ensure_minimum(MSS);
        assert_eq!(cc.cwnd(), 1);

        cc.on_ack_progress(MSS, 128);
        assert_eq!(cc.cwnd(), 2);

        // at ssthresh: congestion avoidance grows slower than one per ack
        cc.on_ack_progress(MSS, 128);
        assert_eq!(cc.cwnd(), 2);
    }

    #[test]
    fn test_congestion_avoidance_eventually_grows() {
        let mut cc = CongestionController::new();
        cc.ensure_minimum(MSS);
        for _ in 0..20 {
            cc.on_ack_progress(MSS, 128);
        }
        assert!(cc.cwnd() > 2);
        assert!(cc.cwnd() < 20);
    }

    #[test]
    fn test_capped_by_remote_window() {
        let mut cc = CongestionController::new();
        cc.ensure_minimum(MSS);
        for _ in 0..100 {
            cc.on_ack_progress(MSS, 4);
        }
        assert_eq!(cc.cwnd(), 4);
        assert_eq!(cc.allowed(32, 4), 4);
    }

    #[test]
    fn test_fast_retransmit_and_timeout() {
        let mut cc = CongestionController::new();
        cc.on_fast_retransmit(10, 2, MSS);
        assert_eq!(cc.ssthresh(), 5);
        assert_eq!(cc.cwnd(), 7);

        cc.on_timeout(MSS);
        assert_eq!(cc.ssthresh(), 3);
        assert_eq!(cc.cwnd(), 1);
    }

    #[test]
    fn test_disabled_ignores_cwnd() {
        let mut cc = CongestionController::new();
        assert_eq!(cc.allowed(32, 128), 0);

        cc.set_enabled(false);
        assert_eq!(cc.allowed(32, 128), 32);
        assert_eq!(cc.allowed(32, 8), 8);
    }

    #[test]
    fn test_probe_schedule() {
        let mut probe = WindowProbe::new();

        // open window: nothing happens
        assert!(!probe.poll(16, 0));
        assert_eq!(probe.wait(), 0);

        // window closes: schedule first probe
        assert!(!probe.poll(0, 1000));
        assert_eq!(probe.wait(), PROBE_INIT);
        assert!(!probe.poll(0, 1000 + PROBE_INIT - 1));

        // due: probe with backoff
        assert!(probe.poll(0, 1000 + PROBE_INIT));
        assert_eq!(probe.wait(), PROBE_INIT + PROBE_INIT / 2);
        assert_eq!(probe.take(), (true, false));
        assert_eq!(probe.take(), (false, false));

        // reopening resets
        assert!(!probe.poll(1, 20_000));
        assert_eq!(probe.wait(), 0);
    }

    #[test]
    fn test_probe_limit() {
        let mut probe = WindowProbe::new();
        let mut now = 0u32;
        probe.poll(0, now);
        for _ in 0..20 {
            now = now.wrapping_add(PROBE_LIMIT);
            probe.poll(0, now);
        }
        assert_eq!(probe.wait(), PROBE_LIMIT);
    }

    #[test]
    fn test_tell() {
        let mut probe = WindowProbe::new();
        probe.request_tell();
        assert_eq!(probe.take(), (false, true));
    }
}
