//! Session configuration.

use crate::core::constants::{
    DEAD_LINK, FAST_ACK_LIMIT, INTERVAL_DEFAULT, MTU_DEFAULT, WND_RCV, WND_SND,
};

/// Latency tuning applied by [`Session::set_nodelay`](super::Session::set_nodelay).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoDelayConfig {
    /// Lower RTO floor and gentler timeout backoff.
    pub nodelay: bool,
    /// Flush interval in milliseconds, clamped to 10..=5000.
    pub interval: u32,
    /// Fast-retransmit threshold in acks, 0 disables fast retransmit.
    pub resend: u32,
    /// Ignore the congestion window.
    pub no_congestion_control: bool,
}

impl NoDelayConfig {
    /// Conservative defaults.
    pub const fn normal() -> Self {
        Self {
            nodelay: false,
            interval: INTERVAL_DEFAULT,
            resend: 0,
            no_congestion_control: false,
        }
    }

    /// Low-latency preset: no-delay, 10 ms interval, fast resend after 2
    /// acks, congestion control off.
    pub const fn fast() -> Self {
        Self {
            nodelay: true,
            interval: 10,
            resend: 2,
            no_congestion_control: true,
        }
    }
}

impl Default for NoDelayConfig {
    fn default() -> Self {
        Self::normal()
    }
}

/// Parameters applied when a session is created.
///
/// Every field can also be changed later through the matching setter on
/// [`Session`](super::Session).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Maximum datagram size in bytes.
    pub mtu: u32,
    /// Send window in segments.
    pub send_window: u32,
    /// Receive window in segments. Never below the default.
    pub recv_window: u32,
    /// Latency tuning.
    pub nodelay: NoDelayConfig,
    /// RTO floor override, `None` to use the mode default.
    pub min_rto: Option<u32>,
    /// Transmission count that flags the link as dead.
    pub dead_link: u32,
    /// Transmission count above which fast retransmit stops, 0 for unlimited.
    pub fast_limit: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mtu: MTU_DEFAULT,
            send_window: WND_SND,
            recv_window: WND_RCV,
            nodelay: NoDelayConfig::normal(),
            min_rto: None,
            dead_link: DEAD_LINK,
            fast_limit: FAST_ACK_LIMIT,
        }
    }
}

impl SessionConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Low-latency configuration.
    pub fn fast() -> Self {
        Self {
            nodelay: NoDelayConfig::fast(),
            ..Self::default()
        }
    }

    /// Set the MTU.
    pub fn with_mtu(mut self, mtu: u32) -> Self {
        self.mtu = mtu;
        self
    }

    /// Set the send and receive windows.
    pub fn with_windows(mut self, send: u32, recv: u32) -> Self {
        self.send_window = send;
        self.recv_window = recv;
        self
    }

    /// Set the latency tuning.
    pub fn with_nodelay(mut self, nodelay: NoDelayConfig) -> Self {
        self.nodelay = nodelay;
        self
    }

    /// Override the RTO floor.
    pub fn with_min_rto(mut self, min_rto: u32) -> Self {
        self.min_rto = Some(min_rto);
        self
    }

    /// Set the dead-link transmission count.
    pub fn with_dead_link(mut self, count: u32) -> Self {
        self.dead_link = count;
        self
    }

    /// Set the fast-retransmit transmission limit.
    pub fn with_fast_limit(mut self, limit: u32) -> Self {
        self.fast_limit = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.mtu, 1400);
        assert_eq!(config.send_window, 32);
        assert_eq!(config.recv_window, 128);
        assert_eq!(config.nodelay, NoDelayConfig::normal());
        assert_eq!(config.min_rto, None);
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::new()
            .with_mtu(512)
            .with_windows(64, 256)
            .with_nodelay(NoDelayConfig::fast())
            .with_min_rto(20)
            .with_dead_link(10)
            .with_fast_limit(0);

        assert_eq!(config.mtu, 512);
        assert_eq!((config.send_window, config.recv_window), (64, 256));
        assert!(config.nodelay.nodelay);
        assert_eq!(config.min_rto, Some(20));
        assert_eq!(config.dead_link, 10);
        assert_eq!(config.fast_limit, 0);
    }

    #[test]
    fn test_fast_preset() {
        let fast = SessionConfig::fast().nodelay;
        assert_eq!(fast.interval, 10);
        assert_eq!(fast.resend, 2);
        assert!(fast.no_congestion_control);
    }
}
