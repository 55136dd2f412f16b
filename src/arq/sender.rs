//! Send queue.
//!
//! Messages are fragmented into data segments on `send` and wait in the
//! unsent queue. The driver promotes them into the in-flight buffer, where
//! they keep their retransmission state until acknowledged.

use std::collections::VecDeque;

use crate::core::constants::MAX_FRAGMENTS;
use crate::core::serial;
use crate::core::{KcpError, KcpResult};
use crate::transport::Segment;

/// A transmitted segment awaiting acknowledgement.
#[derive(Debug, Clone)]
pub struct InFlight {
    /// The segment as last sent.
    pub segment: Segment,
    /// Clock value at which the segment is retransmitted.
    pub resend_at: u32,
    /// Retransmission timeout of this segment.
    pub rto: u32,
    /// Acks seen for later segments since the last transmission.
    pub fast_ack: u32,
    /// Number of transmissions so far.
    pub xmit: u32,
}

/// Unsent and in-flight segments of one session.
#[derive(Debug)]
pub struct SendQueue {
    conv: u32,
    /// Fragmented segments not yet transmitted.
    unsent: VecDeque<Segment>,
    /// Transmitted segments ordered by sequence number.
    flight: VecDeque<InFlight>,
    /// Oldest unacknowledged sequence number.
    snd_una: u32,
    /// Next sequence number to assign.
    snd_nxt: u32,
    /// The last promoted segment was not the final fragment of its message.
    open_message: bool,
}

impl SendQueue {
    /// Create an empty queue.
    pub fn new(conv: u32) -> Self {
        Self {
            conv,
            unsent: VecDeque::new(),
            flight: VecDeque::new(),
            snd_una: 0,
            snd_nxt: 0,
            open_message: false,
        }
    }

    /// Fragment a message and append it to the unsent queue.
    ///
    /// Returns the number of segments created. An empty message becomes a
    /// single zero-length segment.
    pub fn enqueue(&mut self, data: &[u8], mss: usize) -> KcpResult<usize> {
        let fragments = fragment_count(data.len(), mss);
        if data.len() > i32::MAX as usize || fragments > MAX_FRAGMENTS {
            return Err(KcpError::PayloadTooLarge {
                len: data.len(),
                fragments,
            });
        }

        self.unsent.extend(split(self.conv, data, mss, fragments));
        Ok(fragments)
    }

    /// Re-split every message still wholly in the unsent queue for a new MSS.
    ///
    /// Segments already committed to the wire (in flight, or the rest of a
    /// partially transmitted message) cannot change size; when one of them is
    /// larger than `mss`, or a message would need too many fragments, nothing
    /// changes and `false` is returned.
    pub fn refragment(&mut self, mss: usize) -> bool {
        if self.flight.iter().any(|f| f.segment.data.len() > mss) {
            return false;
        }

        // tail of a message whose first fragments are already in flight
        let committed = if self.open_message {
            self.unsent
                .iter()
                .position(|s| s.frg == 0)
                .map_or(self.unsent.len(), |i| i + 1)
        } else {
            0
        };
        if self.unsent.iter().take(committed).any(|s| s.data.len() > mss) {
            return false;
        }

        let mut rebuilt: VecDeque<Segment> = self.unsent.iter().take(committed).cloned().collect();
        let mut message = Vec::new();
        for segment in self.unsent.iter().skip(committed) {
            message.extend_from_slice(&segment.data);
            if segment.frg == 0 {
                let fragments = fragment_count(message.len(), mss);
                if fragments > MAX_FRAGMENTS {
                    return false;
                }
                rebuilt.extend(split(self.conv, &message, mss, fragments));
                message.clear();
            }
        }

        self.unsent = rebuilt;
        true
    }

    /// Move unsent segments into flight while fewer than `allowed` are
    /// outstanding.
    ///
    /// Promoted segments get their sequence number and are transmitted by the
    /// driver on the same flush (`xmit == 0`).
    pub fn promote(&mut self, allowed: u32, now: u32, rto: u32) -> usize {
        let mut promoted = 0;
        while serial::before(self.snd_nxt, self.snd_una.wrapping_add(allowed)) {
            let Some(mut segment) = self.unsent.pop_front() else {
                break;
            };
            segment.sn = self.snd_nxt;
            segment.ts = now;
            self.snd_nxt = self.snd_nxt.wrapping_add(1);
            self.open_message = segment.frg != 0;
            self.flight.push_back(InFlight {
                segment,
                resend_at: now,
                rto,
                fast_ack: 0,
                xmit: 0,
            });
            promoted += 1;
        }
        promoted
    }

    /// Drop every in-flight segment below the peer's cumulative ack.
    pub fn acknowledge_until(&mut self, una: u32) {
        while let Some(front) = self.flight.front() {
            if serial::diff(una, front.segment.sn) > 0 {
                self.flight.pop_front();
            } else {
                break;
            }
        }
        self.shrink();
    }

    /// Drop the in-flight segment with sequence number `sn`.
    ///
    /// Returns `true` if a segment was removed.
    pub fn acknowledge(&mut self, sn: u32) -> bool {
        if serial::before(sn, self.snd_una) || serial::at_or_after(sn, self.snd_nxt) {
            return false;
        }

        let mut removed = false;
        for i in 0..self.flight.len() {
            let seg_sn = self.flight[i].segment.sn;
            if seg_sn == sn {
                self.flight.remove(i);
                removed = true;
                break;
            }
            if serial::before(sn, seg_sn) {
                break;
            }
        }
        self.shrink();
        removed
    }

    /// Count an ack for `sn` against every earlier in-flight segment.
    pub fn count_fast_ack(&mut self, sn: u32) {
        if serial::before(sn, self.snd_una) || serial::at_or_after(sn, self.snd_nxt) {
            return;
        }

        for entry in self.flight.iter_mut() {
            if serial::before(sn, entry.segment.sn) {
                break;
            }
            if entry.segment.sn != sn {
                entry.fast_ack += 1;
            }
        }
    }

    fn shrink(&mut self) {
        self.snd_una = self
            .flight
            .front()
            .map_or(self.snd_nxt, |f| f.segment.sn);
    }

    /// In-flight segments, oldest first.
    pub fn flight_mut(&mut self) -> impl Iterator<Item = &mut InFlight> {
        self.flight.iter_mut()
    }

    /// In-flight segments, oldest first.
    pub fn flight(&self) -> impl Iterator<Item = &InFlight> {
        self.flight.iter()
    }

    /// Oldest unacknowledged sequence number.
    pub fn snd_una(&self) -> u32 {
        self.snd_una
    }

    /// Sequence-number span currently outstanding.
    pub fn inflight_span(&self) -> u32 {
        self.snd_nxt.wrapping_sub(self.snd_una)
    }

    /// Number of segments not yet transmitted.
    pub fn unsent_len(&self) -> usize {
        self.unsent.len()
    }

    /// Number of segments awaiting acknowledgement.
    pub fn flight_len(&self) -> usize {
        self.flight.len()
    }

    /// Unsent plus in-flight segments.
    pub fn waiting(&self) -> usize {
        self.unsent.len() + self.flight.len()
    }
}

/// Number of segments needed to carry `len` bytes.
fn fragment_count(len: usize, mss: usize) -> usize {
    if len <= mss { 1 } else { len.div_ceil(mss) }
}

/// Split `data` into `fragments` data segments with a countdown `frg`.
fn split(
    conv: u32,
    data: &[u8],
    mss: usize,
    fragments: usize,
) -> impl Iterator<Item = Segment> + '_ {
    (0..fragments).map(move |i| {
        let start = i * mss;
        let end = (start + mss).min(data.len());
        let frg = (fragments - i - 1) as u8;
        Segment::push(conv, frg, data[start.min(end)..end].to_vec())
    })
}
