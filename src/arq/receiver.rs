//! Receive queue and message reassembly.
//!
//! Data segments arrive out of order into the reorder buffer. Segments that
//! continue the contiguous sequence move to the ready queue, which `recv`
//! drains one complete message at a time.

use std::collections::VecDeque;

use crate::core::constants::WND_RCV;
use crate::core::serial;
use crate::core::{KcpError, KcpResult};
use crate::transport::Segment;

/// Outcome of offering a data segment to the receive queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// Stored for reassembly.
    Accepted,
    /// Already received.
    Duplicate,
    /// Beyond the advertised receive window.
    OutOfWindow,
}

/// Reorder buffer and ready queue.
#[derive(Debug)]
pub struct ReceiveQueue {
    /// Out-of-order segments, ascending by sequence number.
    reorder: VecDeque<Segment>,
    /// Contiguous segments waiting for `recv`.
    ready: VecDeque<Segment>,
    /// Next expected sequence number.
    rcv_nxt: u32,
    /// Receive window, in segments.
    rcv_wnd: u32,
}

impl Default for ReceiveQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiveQueue {
    /// Create an empty queue with the default window.
    pub fn new() -> Self {
        Self {
            reorder: VecDeque::new(),
            ready: VecDeque::new(),
            rcv_nxt: 0,
            rcv_wnd: WND_RCV,
        }
    }

    /// Check if `sn` falls inside the receive window.
    pub fn in_window(&self, sn: u32) -> bool {
        serial::before(sn, self.rcv_nxt.wrapping_add(self.rcv_wnd))
    }

    /// Offer a data segment.
    pub fn insert(&mut self, segment: Segment) -> Arrival {
        let sn = segment.sn;
        if !self.in_window(sn) {
            return Arrival::OutOfWindow;
        }
        if serial::before(sn, self.rcv_nxt) {
            return Arrival::Duplicate;
        }

        // scan from the back: arrivals are mostly in order
        let mut index = self.reorder.len();
        for (i, stored) in self.reorder.iter().enumerate().rev() {
            if stored.sn == sn {
                return Arrival::Duplicate;
            }
            if serial::before(stored.sn, sn) {
                break;
            }
            index = i;
        }
        self.reorder.insert(index, segment);

        self.promote();
        Arrival::Accepted
    }

    /// Move contiguous segments from the reorder buffer to the ready queue.
    fn promote(&mut self) {
        while self.ready.len() < self.rcv_wnd as usize {
            match self.reorder.front() {
                Some(front) if front.sn == self.rcv_nxt => {}
                _ => break,
            }
            if let Some(segment) = self.reorder.pop_front() {
                self.rcv_nxt = self.rcv_nxt.wrapping_add(1);
                self.ready.push_back(segment);
            }
        }
    }

    /// Size of the next complete message, `None` if none is ready.
    pub fn peek_size(&self) -> Option<usize> {
        let front = self.ready.front()?;
        if front.frg == 0 {
            return Some(front.data.len());
        }
        if self.ready.len() < front.frg as usize + 1 {
            return None;
        }

        let mut size = 0;
        for segment in &self.ready {
            size += segment.data.len();
            if segment.frg == 0 {
                break;
            }
        }
        Some(size)
    }

    /// Remove the next complete message.
    ///
    /// Fails without consuming anything when the message is larger than
    /// `capacity`.
    pub fn pop_message(&mut self, capacity: usize) -> KcpResult<Option<Vec<u8>>> {
        let Some(size) = self.peek_size() else {
            return Ok(None);
        };
        if size > capacity {
            return Err(KcpError::BufferTooSmall {
                needed: size,
                capacity,
            });
        }

        let mut message = Vec::with_capacity(size);
        while let Some(segment) = self.ready.pop_front() {
            message.extend_from_slice(&segment.data);
            if segment.frg == 0 {
                break;
            }
        }

        self.promote();
        Ok(Some(message))
    }

    /// Check if the ready queue fills the receive window.
    pub fn is_full(&self) -> bool {
        self.ready.len() >= self.rcv_wnd as usize
    }

    /// Free receive window advertised to the peer.
    pub fn unused_window(&self) -> u16 {
        let free = self.rcv_wnd.saturating_sub(self.ready.len() as u32);
        free.min(u16::MAX as u32) as u16
    }

    /// Next expected sequence number.
    pub fn rcv_nxt(&self) -> u32 {
        self.rcv_nxt
    }

    /// Receive window, in segments.
    pub fn window(&self) -> u32 {
        self.rcv_wnd
    }

    /// Set the receive window.
    pub fn set_window(&mut self, rcv_wnd: u32) {
        self.rcv_wnd = rcv_wnd;
        self.promote();
    }

    /// Segments waiting in the ready queue.
    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    /// Segments waiting in the reorder buffer.
    pub fn reorder_len(&self) -> usize {
        self.reorder.len()
    }
}
