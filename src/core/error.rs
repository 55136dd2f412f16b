//! Error types for the session engine.

use thiserror::Error;

/// Reasons a byte buffer could not be decoded as a segment.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SegmentError {
    /// Buffer is shorter than the fixed segment header.
    #[error("segment too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum expected size.
        expected: usize,
        /// Actual size received.
        actual: usize,
    },

    /// Declared payload length runs past the end of the buffer.
    #[error("payload length overflow: header says {declared}, but {available} bytes available")]
    LengthOverflow {
        /// Payload length from the header.
        declared: u32,
        /// Bytes remaining after the header.
        available: usize,
    },

    /// Command byte is not one of PUSH/ACK/WASK/WINS.
    #[error("unknown command: {0}")]
    UnknownCommand(u8),

    /// Segment belongs to another connection.
    #[error("conv mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ConvMismatch {
        /// Conv of the receiving session.
        expected: u32,
        /// Conv carried by the segment.
        actual: u32,
    },
}

impl SegmentError {
    /// Check if the error leaves segment framing intact.
    ///
    /// Framing errors make the rest of the datagram uninterpretable; other
    /// errors only invalidate the offending segment.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            SegmentError::TooShort { .. } | SegmentError::LengthOverflow { .. }
        )
    }
}

/// Top-level session errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KcpError {
    /// Connection id is not representable in 32 bits.
    #[error("invalid conv: {0} does not fit in 32 bits")]
    InvalidConv(i64),

    /// MTU out of range, or too small for segments already on the wire.
    #[error("invalid mtu: {0}")]
    InvalidMtu(i64),

    /// Window size negative or out of range.
    #[error("invalid window: send {send}, recv {recv}")]
    InvalidWindow {
        /// Requested send window.
        send: i64,
        /// Requested receive window.
        recv: i64,
    },

    /// Message too large to be fragmented.
    #[error("payload too large: {len} bytes would need {fragments} fragments")]
    PayloadTooLarge {
        /// Message length in bytes.
        len: usize,
        /// Fragment count the message would need.
        fragments: usize,
    },

    /// Caller buffer cannot hold the next message.
    #[error("buffer too small: message needs {needed} bytes, capacity is {capacity}")]
    BufferTooSmall {
        /// Size of the next ready message.
        needed: usize,
        /// Capacity offered by the caller.
        capacity: usize,
    },

    /// Segment failed to decode.
    #[error("malformed segment: {0}")]
    MalformedSegment(#[from] SegmentError),

    /// Datagram too short to carry a connection id.
    #[error("datagram too short: {actual} bytes, need at least 4")]
    TooShort {
        /// Actual datagram length.
        actual: usize,
    },

    /// Session has been released.
    #[error("session has been released")]
    SessionReleased,
}

impl KcpError {
    /// Check if this error is a violation of the caller contract.
    ///
    /// These errors never mutate engine state.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            KcpError::InvalidConv(_)
                | KcpError::InvalidMtu(_)
                | KcpError::InvalidWindow { .. }
                | KcpError::PayloadTooLarge { .. }
                | KcpError::BufferTooSmall { .. }
                | KcpError::TooShort { .. }
        )
    }

    /// Check if the session stays usable after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, KcpError::SessionReleased)
    }
}

/// Result type for session operations.
pub type KcpResult<T> = Result<T, KcpError>;
