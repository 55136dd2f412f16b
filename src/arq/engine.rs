//! ARQ engine
//!
//! Drives one session: decodes incoming datagrams, feeds the send and receive
//! queues, and decides on every flush which segments go on the wire.
//!
//! The engine never reads a clock and never touches a socket. The host passes
//! the current time to [`ArqEngine::update`] and receives datagrams through
//! the `emit` closure given to [`ArqEngine::flush`].

use tracing::{debug, trace, warn};

use super::ack::AckList;
use super::receiver::{Arrival, ReceiveQueue};
use super::sender::SendQueue;
use crate::core::constants::{
    CLOCK_RESYNC, DEAD_LINK, FAST_ACK_LIMIT, INTERVAL_DEFAULT, INTERVAL_MAX, INTERVAL_MIN,
    MTU_DEFAULT, OVERHEAD, WND_RCV, WND_SND,
};
use crate::core::serial;
use crate::core::{KcpError, KcpResult, SegmentError};
use crate::transport::{
    Command, CongestionController, RttEstimator, Segment, SegmentHeader, WindowProbe, backoff,
};

/// Outcome of feeding one datagram to [`ArqEngine::input`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputStats {
    /// Segments decoded and processed.
    pub accepted: usize,
    /// Segments, or undecodable trailing bytes, that were discarded.
    pub dropped: usize,
}

/// Snapshot of the engine's health and queue depths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Smoothed RTT, `None` before the first sample.
    pub srtt: Option<u32>,
    /// Current base retransmission timeout.
    pub rto: u32,
    /// Congestion window, in segments.
    pub cwnd: u32,
    /// Slow-start threshold, in segments.
    pub ssthresh: u32,
    /// Last receive window advertised by the peer.
    pub remote_window: u32,
    /// Segments transmitted but not yet acknowledged.
    pub in_flight: usize,
    /// Segments queued but not yet transmitted.
    pub unsent: usize,
    /// Segments received and waiting for `recv`.
    pub ready: usize,
    /// Retransmissions caused by timeouts, since creation.
    pub timeouts: u64,
    /// Fast retransmissions, since creation.
    pub fast_retransmits: u64,
    /// Some segment reached the dead-link transmission count.
    pub dead_link: bool,
}

/// Packs encoded segments into datagrams of at most `mtu` bytes.
///
/// Buffers grow with their content; a datagram never holds more capacity
/// than the segments packed into it needed.
struct Packer<'a, E: FnMut(Vec<u8>)> {
    mtu: usize,
    buf: Vec<u8>,
    emit: &'a mut E,
    datagrams: usize,
}

impl<'a, E: FnMut(Vec<u8>)> Packer<'a, E> {
    fn new(mtu: usize, emit: &'a mut E) -> Self {
        Self {
            mtu,
            buf: Vec::new(),
            emit,
            datagrams: 0,
        }
    }

    fn push(&mut self, segment: &Segment) {
        if !self.buf.is_empty() && self.buf.len() + segment.wire_size() > self.mtu {
            self.ship();
        }
        segment.encode_into(&mut self.buf);
    }

    fn ship(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let datagram = std::mem::take(&mut self.buf);
        (self.emit)(datagram);
        self.datagrams += 1;
    }

    fn finish(mut self) -> usize {
        self.ship();
        self.datagrams
    }
}

/// Reliability engine of one session.
#[derive(Debug)]
pub struct ArqEngine {
    conv: u32,
    mtu: u32,
    mss: u32,
    /// Local send window, in segments.
    snd_wnd: u32,
    /// Peer's last advertised receive window.
    rmt_wnd: u32,

    sender: SendQueue,
    receiver: ReceiveQueue,
    acks: AckList,
    rtt: RttEstimator,
    congestion: CongestionController,
    probe: WindowProbe,

    /// Last clock value passed to `update`.
    current: u32,
    /// Next scheduled flush.
    ts_flush: u32,
    /// `update` has been called at least once.
    updated: bool,
    interval: u32,

    nodelay: bool,
    /// Fast-retransmit threshold, 0 when disabled.
    fast_resend: u32,
    /// Transmission count above which fast retransmit stops, 0 for unlimited.
    fast_limit: u32,
    /// Transmission count that flags the link as dead.
    dead_link: u32,
    dead: bool,

    timeouts: u64,
    fast_retransmits: u64,
}

impl ArqEngine {
    /// Create an engine with default parameters.
    pub fn new(conv: u32) -> Self {
        let mut congestion = CongestionController::new();
        congestion.ensure_minimum(MTU_DEFAULT - OVERHEAD as u32);
        Self {
            conv,
            mtu: MTU_DEFAULT,
            mss: MTU_DEFAULT - OVERHEAD as u32,
            snd_wnd: WND_SND,
            rmt_wnd: WND_RCV,
            sender: SendQueue::new(conv),
            receiver: ReceiveQueue::new(),
            acks: AckList::new(),
            rtt: RttEstimator::new(),
            congestion,
            probe: WindowProbe::new(),
            current: 0,
            ts_flush: INTERVAL_DEFAULT,
            updated: false,
            interval: INTERVAL_DEFAULT,
            nodelay: false,
            fast_resend: 0,
            fast_limit: FAST_ACK_LIMIT,
            dead_link: DEAD_LINK,
            dead: false,
            timeouts: 0,
            fast_retransmits: 0,
        }
    }

    /// Connection id.
    pub fn conv(&self) -> u32 {
        self.conv
    }

    /// Queue a message for reliable delivery.
    ///
    /// Returns the number of segments the message was split into.
    pub fn send(&mut self, data: &[u8]) -> KcpResult<usize> {
        let fragments = self.sender.enqueue(data, self.mss as usize)?;
        trace!(conv = self.conv, len = data.len(), fragments, "message queued");
        Ok(fragments)
    }

    /// Take the next complete message, if one is ready.
    ///
    /// `capacity` bounds the message size the caller accepts; a larger
    /// message stays queued and [`KcpError::BufferTooSmall`] is returned.
    pub fn recv(&mut self, capacity: usize) -> KcpResult<Option<Vec<u8>>> {
        let was_full = self.receiver.is_full();
        let message = self.receiver.pop_message(capacity)?;

        if message.is_some() && was_full && !self.receiver.is_full() {
            // tell the peer the window reopened
            self.probe.request_tell();
        }
        Ok(message)
    }

    /// Size of the next complete message, `None` if none is ready.
    pub fn peek_size(&self) -> Option<usize> {
        self.receiver.peek_size()
    }

    /// Process one datagram received from the peer.
    ///
    /// A datagram may carry several segments. Undecodable framing drops the
    /// rest of the datagram; a segment for another conversation or with an
    /// unknown command is skipped on its own.
    pub fn input(&mut self, datagram: &[u8]) -> InputStats {
        let prev_una = self.sender.snd_una();
        let mut stats = InputStats::default();
        let mut max_ack: Option<u32> = None;
        let mut rest = datagram;

        while !rest.is_empty() {
            let segment = match self.next_segment(&mut rest) {
                Ok(segment) => segment,
                Err(err) if err.is_framing() => {
                    debug!(conv = self.conv, %err, remaining = rest.len(), "discarding datagram tail");
                    stats.dropped += 1;
                    break;
                }
                Err(err) => {
                    debug!(conv = self.conv, %err, "skipping segment");
                    stats.dropped += 1;
                    continue;
                }
            };
            stats.accepted += 1;

            self.rmt_wnd = segment.wnd as u32;
            self.sender.acknowledge_until(segment.una);

            match segment.cmd {
                Command::Ack => {
                    let sample = serial::diff(self.current, segment.ts);
                    if sample >= 0 {
                        self.rtt.update(sample, self.interval);
                    }
                    if self.sender.acknowledge(segment.sn) {
                        trace!(conv = self.conv, sn = segment.sn, rto = self.rtt.rto(), "segment acked");
                    }
                    max_ack = match max_ack {
                        Some(max) if !serial::before(max, segment.sn) => Some(max),
                        _ => Some(segment.sn),
                    };
                }
                Command::Push => {
                    let sn = segment.sn;
                    if !self.receiver.in_window(sn) {
                        trace!(conv = self.conv, sn, "data beyond receive window");
                        continue;
                    }
                    self.acks.push(sn, segment.ts);
                    if serial::before(sn, self.receiver.rcv_nxt()) {
                        continue;
                    }
                    if self.receiver.insert(segment) == Arrival::Duplicate {
                        trace!(conv = self.conv, sn, "duplicate data segment");
                    }
                }
                Command::WindowAsk => self.probe.request_tell(),
                Command::WindowTell => {}
            }
        }

        if let Some(sn) = max_ack {
            self.sender.count_fast_ack(sn);
        }

        if serial::diff(self.sender.snd_una(), prev_una) > 0 {
            self.congestion.on_ack_progress(self.mss, self.rmt_wnd);
            self.dead = false;
        }

        stats
    }

    /// Decode the segment at the front of `rest` and advance past it.
    ///
    /// On a framing error `rest` is left untouched; any other error has
    /// already consumed the offending segment.
    fn next_segment(&self, rest: &mut &[u8]) -> Result<Segment, SegmentError> {
        let header = SegmentHeader::parse(*rest)?;
        let (bytes, tail) = (*rest).split_at(header.wire_size());
        *rest = tail;

        if header.conv != self.conv {
            return Err(SegmentError::ConvMismatch {
                expected: self.conv,
                actual: header.conv,
            });
        }
        let (segment, _) = Segment::decode(bytes)?;
        Ok(segment)
    }

    /// Advance the clock and flush when the next flush slot is due.
    ///
    /// `now` is a wrapping millisecond clock chosen by the host.
    pub fn update<E: FnMut(Vec<u8>)>(&mut self, now: u32, emit: &mut E) {
        self.current = now;
        if !self.updated {
            self.updated = true;
            self.ts_flush = now;
        }

        let mut slap = serial::diff(now, self.ts_flush);
        if !(-CLOCK_RESYNC..CLOCK_RESYNC).contains(&slap) {
            // clock jumped: resynchronise instead of catching up
            self.ts_flush = now;
            slap = 0;
        }

        if slap >= 0 {
            self.ts_flush = self.ts_flush.wrapping_add(self.interval);
            if serial::at_or_after(now, self.ts_flush) {
                self.ts_flush = now.wrapping_add(self.interval);
            }
            self.flush(emit);
        }
    }

    /// Clock value at which `update` should next be called.
    ///
    /// Does not change any state. Returns `now` when work is already due.
    pub fn check(&self, now: u32) -> u32 {
        if !self.updated {
            return now;
        }

        let mut ts_flush = self.ts_flush;
        let slap = serial::diff(now, ts_flush);
        if !(-CLOCK_RESYNC..CLOCK_RESYNC).contains(&slap) {
            ts_flush = now;
        }
        if serial::at_or_after(now, ts_flush) {
            return now;
        }

        let tm_flush = serial::diff(ts_flush, now) as u32;
        let mut tm_packet = u32::MAX;
        for entry in self.sender.flight() {
            let diff = serial::diff(entry.resend_at, now);
            if diff <= 0 {
                return now;
            }
            tm_packet = tm_packet.min(diff as u32);
        }

        let minimal = tm_packet.min(tm_flush).min(self.interval);
        now.wrapping_add(minimal)
    }

    /// Emit pending acknowledgements, window commands and data.
    ///
    /// Does nothing before the first `update`, and uses the clock value of
    /// the most recent one.
    pub fn flush<E: FnMut(Vec<u8>)>(&mut self, emit: &mut E) {
        if !self.updated {
            return;
        }

        let now = self.current;
        let wnd = self.receiver.unused_window();
        let una = self.receiver.rcv_nxt();
        let mut packer = Packer::new(self.mtu as usize, emit);

        // acknowledgements
        let mut control = Segment::new(self.conv, Command::Ack);
        control.wnd = wnd;
        control.una = una;
        for ack in self.acks.drain() {
            control.sn = ack.sn;
            control.ts = ack.ts;
            packer.push(&control);
        }

        // window probing
        if self.probe.poll(self.rmt_wnd, now) {
            debug!(conv = self.conv, wait = self.probe.wait(), "remote window closed, probing");
        }
        control.sn = 0;
        control.ts = 0;
        let (ask, tell) = self.probe.take();
        if ask {
            control.cmd = Command::WindowAsk;
            packer.push(&control);
        }
        if tell {
            control.cmd = Command::WindowTell;
            packer.push(&control);
        }

        // new data
        let allowed = self.congestion.allowed(self.snd_wnd, self.rmt_wnd);
        let base_rto = self.rtt.rto();
        self.sender.promote(allowed, now, base_rto);

        // (re)transmissions
        let resend = if self.fast_resend > 0 {
            self.fast_resend
        } else {
            u32::MAX
        };
        let rto_min = if self.nodelay { 0 } else { base_rto >> 3 };
        let mut lost = false;
        let mut change = false;
        let mut dead = false;

        for entry in self.sender.flight_mut() {
            let transmit = if entry.xmit == 0 {
                entry.rto = base_rto;
                entry.resend_at = now.wrapping_add(entry.rto).wrapping_add(rto_min);
                true
            } else if serial::at_or_after(now, entry.resend_at) {
                entry.rto = backoff(entry.rto, base_rto, self.nodelay);
                entry.resend_at = now.wrapping_add(entry.rto);
                self.timeouts += 1;
                lost = true;
                true
            } else if entry.fast_ack >= resend
                && (self.fast_limit == 0 || entry.xmit <= self.fast_limit)
            {
                entry.fast_ack = 0;
                entry.resend_at = now.wrapping_add(entry.rto);
                self.fast_retransmits += 1;
                change = true;
                true
            } else {
                false
            };

            if transmit {
                entry.xmit += 1;
                entry.segment.ts = now;
                entry.segment.wnd = wnd;
                entry.segment.una = una;
                packer.push(&entry.segment);
                if entry.xmit >= self.dead_link {
                    dead = true;
                }
            }
        }

        let datagrams = packer.finish();
        if datagrams > 0 {
            trace!(conv = self.conv, datagrams, in_flight = self.sender.flight_len(), "flushed");
        }

        if dead && !self.dead {
            warn!(
                conv = self.conv,
                limit = self.dead_link,
                "segment reached dead-link transmission count"
            );
        }
        self.dead |= dead;

        if change {
            debug!(conv = self.conv, threshold = resend, "fast retransmit");
            self.congestion
                .on_fast_retransmit(self.sender.inflight_span(), resend, self.mss);
        }
        if lost {
            debug!(conv = self.conv, rto = base_rto, "retransmission timeout");
            self.congestion.on_timeout(self.mss);
        }
        self.congestion.ensure_minimum(self.mss);
    }

    /// Change the MTU.
    ///
    /// Messages still wholly queued are re-fragmented to the new segment
    /// size. Fails with [`KcpError::InvalidMtu`] without changing anything if
    /// the value is out of range or segments already committed to the wire
    /// do not fit.
    pub fn set_mtu(&mut self, mtu: i64) -> KcpResult<()> {
        if mtu <= OVERHEAD as i64 || mtu > i32::MAX as i64 {
            return Err(KcpError::InvalidMtu(mtu));
        }

        let mss = mtu as u32 - OVERHEAD as u32;
        if !self.sender.refragment(mss as usize) {
            return Err(KcpError::InvalidMtu(mtu));
        }

        debug!(conv = self.conv, mtu, mss, "mtu changed");
        self.mtu = mtu as u32;
        self.mss = mss;
        Ok(())
    }

    /// Set the send and receive windows, in segments.
    ///
    /// A value of 0 keeps the current setting. The receive window never drops
    /// below the default, which is the largest fragment count plus one.
    pub fn set_window(&mut self, snd_wnd: i64, rcv_wnd: i64) -> KcpResult<()> {
        let valid = |w: i64| (0..=i32::MAX as i64).contains(&w);
        if !valid(snd_wnd) || !valid(rcv_wnd) {
            return Err(KcpError::InvalidWindow {
                send: snd_wnd,
                recv: rcv_wnd,
            });
        }

        if snd_wnd > 0 {
            self.snd_wnd = snd_wnd as u32;
        }
        if rcv_wnd > 0 {
            self.receiver.set_window((rcv_wnd as u32).max(WND_RCV));
        }
        Ok(())
    }

    /// Configure latency behaviour.
    ///
    /// - `nodelay`: lower RTO floor and gentler timeout backoff
    /// - `interval`: flush interval, clamped to 10..=5000 ms
    /// - `resend`: fast-retransmit threshold, 0 disables it
    /// - `no_congestion_control`: ignore the congestion window
    pub fn set_nodelay(
        &mut self,
        nodelay: bool,
        interval: u32,
        resend: u32,
        no_congestion_control: bool,
    ) {
        self.nodelay = nodelay;
        self.rtt.set_nodelay_floor(nodelay);
        self.interval = interval.clamp(INTERVAL_MIN, INTERVAL_MAX);
        self.fast_resend = resend;
        self.congestion.set_enabled(!no_congestion_control);
    }

    /// Override the RTO floor.
    pub fn set_min_rto(&mut self, min_rto: u32) {
        self.rtt.set_min_rto(min_rto);
    }

    /// Set the transmission count that flags the link as dead.
    pub fn set_dead_link(&mut self, count: u32) {
        self.dead_link = count.max(1);
    }

    /// Set the transmission count above which fast retransmit stops.
    pub fn set_fast_limit(&mut self, limit: u32) {
        self.fast_limit = limit;
    }

    /// Segments queued or in flight.
    pub fn waiting(&self) -> usize {
        self.sender.waiting()
    }

    /// Current MTU.
    pub fn mtu(&self) -> u32 {
        self.mtu
    }

    /// Current flush interval.
    pub fn interval(&self) -> u32 {
        self.interval
    }

    /// Check if no-delay mode is on.
    pub fn is_nodelay(&self) -> bool {
        self.nodelay
    }

    /// Current (send, receive) windows.
    pub fn windows(&self) -> (u32, u32) {
        (self.snd_wnd, self.receiver.window())
    }

    /// RTO floor in effect.
    pub fn min_rto(&self) -> u32 {
        self.rtt.min_rto()
    }

    /// Check if the dead-link threshold has been reached since the last ack
    /// progress.
    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Health and queue snapshot.
    pub fn stats(&self) -> LinkStats {
        LinkStats {
            srtt: self.rtt.srtt(),
            rto: self.rtt.rto(),
            cwnd: self.congestion.cwnd(),
            ssthresh: self.congestion.ssthresh(),
            remote_window: self.rmt_wnd,
            in_flight: self.sender.flight_len(),
            unsent: self.sender.unsent_len(),
            ready: self.receiver.ready_len(),
            timeouts: self.timeouts,
            fast_retransmits: self.fast_retransmits,
            dead_link: self.dead,
        }
    }
}
