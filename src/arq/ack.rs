//! Pending acknowledgements.
//!
//! Every data segment accepted by `input` is acknowledged individually on
//! the next flush. The list keeps `(sn, ts)` pairs in arrival order so the
//! peer can take an RTT sample from the echoed timestamp.

/// One acknowledgement waiting to be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingAck {
    /// Sequence number being acknowledged.
    pub sn: u32,
    /// Timestamp of the data segment, echoed back.
    pub ts: u32,
}

/// Acknowledgements accumulated since the last flush.
#[derive(Debug, Clone, Default)]
pub struct AckList {
    pending: Vec<PendingAck>,
}

impl AckList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an acknowledgement.
    pub fn push(&mut self, sn: u32, ts: u32) {
        self.pending.push(PendingAck { sn, ts });
    }

    /// Take every pending acknowledgement, in arrival order.
    pub fn drain(&mut self) -> std::vec::Drain<'_, PendingAck> {
        self.pending.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_keeps_order() {
        let mut acks = AckList::new();
        acks.push(3, 30);
        acks.push(1, 10);
        acks.push(2, 20);

        let drained: Vec<_> = acks.drain().map(|a| a.sn).collect();
        assert_eq!(drained, vec![3, 1, 2]);
        assert_eq!(acks.drain().count(), 0);
    }

    #[test]
    fn test_duplicates_are_kept() {
        // a retransmitted segment must be acked again
        let mut acks = AckList::new();
        acks.push(5, 100);
        acks.push(5, 300);
        let drained: Vec<_> = acks.drain().collect();
        assert_eq!(
            drained,
            vec![PendingAck { sn: 5, ts: 100 }, PendingAck { sn: 5, ts: 300 }]
        );
    }
}
