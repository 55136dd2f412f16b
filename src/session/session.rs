//! Session handle.
//!
//! A [`Session`] owns one ARQ engine and its output sink. The handle is live
//! until [`Session::release`] (or drop); afterwards every operation fails
//! with [`KcpError::SessionReleased`].

use std::fmt;

use tracing::debug;

use super::config::{NoDelayConfig, SessionConfig};
use super::output::{Output, OutputMode};
use crate::arq::{ArqEngine, InputStats, LinkStats};
use crate::core::{KcpError, KcpResult};

/// Session statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Engine health and queue depths.
    pub link: LinkStats,
    /// Datagrams produced since creation.
    pub datagrams_out: u64,
    /// Datagrams passed to `input` since creation.
    pub datagrams_in: u64,
}

struct Inner {
    engine: ArqEngine,
    output: Output,
    datagrams_in: u64,
}

/// A reliable message session over an unreliable datagram channel.
///
/// The session is sans-io: the host feeds received datagrams to
/// [`input`](Self::input), drives time through [`update`](Self::update), and
/// transmits the datagrams it gets back (or receives them through an
/// [`OutputMode::Callback`] handler).
///
/// # Example
///
/// ```
/// use kcp_session::Session;
///
/// let mut alice = Session::new(7);
/// let mut bob = Session::new(7);
///
/// alice.send(b"hello").unwrap();
/// for datagram in alice.update(0).unwrap() {
///     bob.input(&datagram).unwrap();
/// }
/// assert_eq!(bob.recv(1024).unwrap(), Some(b"hello".to_vec()));
/// ```
pub struct Session {
    conv: u32,
    inner: Option<Inner>,
}

impl Session {
    /// Create a session with default parameters.
    pub fn new(conv: u32) -> Self {
        debug!(conv, "session created");
        Self {
            conv,
            inner: Some(Inner {
                engine: ArqEngine::new(conv),
                output: Output::default(),
                datagrams_in: 0,
            }),
        }
    }

    /// Create a session from a host integer, rejecting ids that do not fit
    /// in 32 bits.
    pub fn try_new(conv: i64) -> KcpResult<Self> {
        let conv = u32::try_from(conv).map_err(|_| KcpError::InvalidConv(conv))?;
        Ok(Self::new(conv))
    }

    /// Create a session and apply `config`.
    pub fn with_config(conv: u32, config: SessionConfig) -> KcpResult<Self> {
        let mut session = Self::new(conv);
        session.set_mtu(config.mtu as i64)?;
        session.set_window(config.send_window as i64, config.recv_window as i64)?;
        session.set_nodelay(config.nodelay)?;
        if let Some(min_rto) = config.min_rto {
            session.set_min_rto(min_rto)?;
        }

        let engine = &mut session.live_mut()?.engine;
        engine.set_dead_link(config.dead_link);
        engine.set_fast_limit(config.fast_limit);
        Ok(session)
    }

    fn live(&self) -> KcpResult<&Inner> {
        self.inner.as_ref().ok_or(KcpError::SessionReleased)
    }

    fn live_mut(&mut self) -> KcpResult<&mut Inner> {
        self.inner.as_mut().ok_or(KcpError::SessionReleased)
    }

    /// Connection id.
    pub fn conv(&self) -> u32 {
        self.conv
    }

    /// Check if the session has been released.
    pub fn is_released(&self) -> bool {
        self.inner.is_none()
    }

    /// Select how datagrams are handed to the host.
    pub fn set_output(&mut self, mode: OutputMode) -> KcpResult<()> {
        self.live_mut()?.output.set_mode(mode);
        Ok(())
    }

    /// Queue a message. Returns the number of segments it was split into.
    pub fn send(&mut self, data: &[u8]) -> KcpResult<usize> {
        self.live_mut()?.engine.send(data)
    }

    /// Take the next complete message of at most `max_bytes` bytes.
    ///
    /// Returns `Ok(None)` when no message is ready, and
    /// [`KcpError::BufferTooSmall`] without consuming anything when the next
    /// message is larger than `max_bytes`.
    pub fn recv(&mut self, max_bytes: usize) -> KcpResult<Option<Vec<u8>>> {
        self.live_mut()?.engine.recv(max_bytes)
    }

    /// Size of the next complete message.
    pub fn peeksize(&self) -> KcpResult<Option<usize>> {
        Ok(self.live()?.engine.peek_size())
    }

    /// Feed one datagram received from the peer.
    ///
    /// Malformed segments are dropped and counted, never reported as errors.
    pub fn input(&mut self, datagram: &[u8]) -> KcpResult<InputStats> {
        let inner = self.live_mut()?;
        inner.datagrams_in += 1;
        Ok(inner.engine.input(datagram))
    }

    /// Advance the clock to `now` (milliseconds, wrapping) and flush if due.
    ///
    /// Returns the datagrams to transmit; always empty in callback mode.
    pub fn update(&mut self, now: u32) -> KcpResult<Vec<Vec<u8>>> {
        let Inner { engine, output, .. } = self.live_mut()?;
        engine.update(now, &mut |datagram| output.emit(datagram));
        Ok(output.take())
    }

    /// Clock value at which [`update`](Self::update) should next be called.
    pub fn check(&self, now: u32) -> KcpResult<u32> {
        Ok(self.live()?.engine.check(now))
    }

    /// Flush immediately at the last clock value passed to `update`.
    pub fn flush(&mut self) -> KcpResult<Vec<Vec<u8>>> {
        let Inner { engine, output, .. } = self.live_mut()?;
        engine.flush(&mut |datagram| output.emit(datagram));
        Ok(output.take())
    }

    /// Change the MTU.
    pub fn set_mtu(&mut self, mtu: i64) -> KcpResult<()> {
        self.live_mut()?.engine.set_mtu(mtu)
    }

    /// Set the send and receive windows in segments; 0 keeps a value.
    pub fn set_window(&mut self, send: i64, recv: i64) -> KcpResult<()> {
        self.live_mut()?.engine.set_window(send, recv)
    }

    /// Apply latency tuning.
    pub fn set_nodelay(&mut self, config: NoDelayConfig) -> KcpResult<()> {
        self.live_mut()?.engine.set_nodelay(
            config.nodelay,
            config.interval,
            config.resend,
            config.no_congestion_control,
        );
        Ok(())
    }

    /// Override the RTO floor.
    pub fn set_min_rto(&mut self, min_rto: u32) -> KcpResult<()> {
        self.live_mut()?.engine.set_min_rto(min_rto);
        Ok(())
    }

    /// Segments queued or awaiting acknowledgement.
    pub fn waitsnd(&self) -> KcpResult<usize> {
        Ok(self.live()?.engine.waiting())
    }

    /// Statistics snapshot.
    pub fn stats(&self) -> KcpResult<SessionStats> {
        let inner = self.live()?;
        Ok(SessionStats {
            link: inner.engine.stats(),
            datagrams_out: inner.output.delivered(),
            datagrams_in: inner.datagrams_in,
        })
    }

    /// Drop all queues and the output sink. Idempotent.
    pub fn release(&mut self) {
        if let Some(inner) = self.inner.take() {
            debug!(
                conv = self.conv,
                pending = inner.engine.waiting(),
                "session released"
            );
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("conv", &self.conv)
            .field("released", &self.is_released())
            .finish()
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_released() { "released" } else { "live" };
        write!(f, "session {:#010x} ({state})", self.conv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_new() {
        assert_eq!(Session::try_new(0xFFFF_FFFF).unwrap().conv(), u32::MAX);
        assert_eq!(Session::try_new(-1).unwrap_err(), KcpError::InvalidConv(-1));
        assert_eq!(
            Session::try_new(1 << 32).unwrap_err(),
            KcpError::InvalidConv(1 << 32)
        );
    }

    #[test]
    fn test_with_config() {
        let config = SessionConfig::fast().with_mtu(512).with_windows(64, 256);
        let session = Session::with_config(3, config).unwrap();
        assert_eq!(session.stats().unwrap().link.remote_window, 128);

        let bad = SessionConfig::new().with_mtu(10);
        assert_eq!(
            Session::with_config(3, bad).unwrap_err(),
            KcpError::InvalidMtu(10)
        );
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut session = Session::new(5);
        session.send(b"pending").unwrap();
        session.release();
        session.release();

        assert!(session.is_released());
        assert_eq!(session.send(b"x"), Err(KcpError::SessionReleased));
        assert_eq!(session.recv(1024), Err(KcpError::SessionReleased));
        assert_eq!(session.input(&[0; 24]), Err(KcpError::SessionReleased));
        assert_eq!(session.update(0), Err(KcpError::SessionReleased));
        assert_eq!(session.check(0), Err(KcpError::SessionReleased));
        assert_eq!(session.flush(), Err(KcpError::SessionReleased));
        assert_eq!(session.peeksize(), Err(KcpError::SessionReleased));
        assert_eq!(session.set_mtu(500), Err(KcpError::SessionReleased));
        assert_eq!(session.set_window(1, 1), Err(KcpError::SessionReleased));
        assert_eq!(
            session.set_nodelay(NoDelayConfig::fast()),
            Err(KcpError::SessionReleased)
        );
        assert_eq!(session.set_min_rto(10), Err(KcpError::SessionReleased));
        assert_eq!(session.waitsnd(), Err(KcpError::SessionReleased));
        assert_eq!(
            session.set_output(OutputMode::Buffered),
            Err(KcpError::SessionReleased)
        );
        assert_eq!(session.conv(), 5);
    }

    #[test]
    fn test_display() {
        let mut session = Session::new(0x11);
        assert_eq!(session.to_string(), "session 0x00000011 (live)");
        session.release();
        assert_eq!(session.to_string(), "session 0x00000011 (released)");
    }

    #[test]
    fn test_flush_returns_buffered_datagrams() {
        let mut session = Session::new(1);
        assert!(session.flush().unwrap().is_empty());

        session.update(0).unwrap();
        session.send(b"now").unwrap();
        let out = session.flush().unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(session.stats().unwrap().datagrams_out, 1);
    }

    #[test]
    fn test_session_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Session>();
    }
}
