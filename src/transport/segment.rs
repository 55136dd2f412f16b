//! Segment encoding and decoding.
//!
//! Wire format (24-byte header, all integers little-endian):
//! ```text
//! +------+-----+-----+-----+------+------+------+------+----------+
//! | conv | cmd | frg | wnd |  ts  |  sn  | una  | len  |   data   |
//! |  4   |  1  |  1  |  2  |  4   |  4   |  4   |  4   | len bytes|
//! +------+-----+-----+-----+------+------+------+------+----------+
//! ```
//!
//! A datagram carries one or more segments back to back.

use crate::core::constants::{CMD_ACK, CMD_PUSH, CMD_WASK, CMD_WINS, CONV_SIZE, OVERHEAD};
use crate::core::{KcpError, KcpResult, SegmentError};

/// Segment command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Data.
    Push = CMD_PUSH,
    /// Acknowledgement.
    Ack = CMD_ACK,
    /// Window probe.
    WindowAsk = CMD_WASK,
    /// Window response.
    WindowTell = CMD_WINS,
}

impl Command {
    /// Parse a command from its wire byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            CMD_PUSH => Some(Self::Push),
            CMD_ACK => Some(Self::Ack),
            CMD_WASK => Some(Self::WindowAsk),
            CMD_WINS => Some(Self::WindowTell),
            _ => None,
        }
    }

    /// Wire byte of this command.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Fixed-size segment header as found on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Connection id.
    pub conv: u32,
    /// Raw command byte (validated separately).
    pub cmd: u8,
    /// Fragments remaining after this one in the message.
    pub frg: u8,
    /// Sender's free receive window, in segments.
    pub wnd: u16,
    /// Sender clock at transmission (echoed back in ACKs).
    pub ts: u32,
    /// Sequence number.
    pub sn: u32,
    /// Sender's next expected sequence number.
    pub una: u32,
    /// Payload length.
    pub len: u32,
}

impl SegmentHeader {
    /// Parse a header and validate that its payload fits in `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, SegmentError> {
        if bytes.len() < OVERHEAD {
            return Err(SegmentError::TooShort {
                expected: OVERHEAD,
                actual: bytes.len(),
            });
        }

        let header = Self {
            conv: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            cmd: bytes[4],
            frg: bytes[5],
            wnd: u16::from_le_bytes([bytes[6], bytes[7]]),
            ts: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            sn: u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
            una: u32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]),
            len: u32::from_le_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]),
        };

        let available = bytes.len() - OVERHEAD;
        if header.len as usize > available {
            return Err(SegmentError::LengthOverflow {
                declared: header.len,
                available,
            });
        }

        Ok(header)
    }

    /// Total wire size of the segment this header describes.
    pub fn wire_size(&self) -> usize {
        OVERHEAD + self.len as usize
    }
}

/// A protocol segment: header fields plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Connection id.
    pub conv: u32,
    /// Command.
    pub cmd: Command,
    /// Fragments remaining after this one in the message.
    pub frg: u8,
    /// Sender's free receive window, in segments.
    pub wnd: u16,
    /// Sender clock at transmission.
    pub ts: u32,
    /// Sequence number.
    pub sn: u32,
    /// Sender's next expected sequence number.
    pub una: u32,
    /// Payload.
    pub data: Vec<u8>,
}

impl Segment {
    /// Create an empty segment with the given command.
    pub fn new(conv: u32, cmd: Command) -> Self {
        Self {
            conv,
            cmd,
            frg: 0,
            wnd: 0,
            ts: 0,
            sn: 0,
            una: 0,
            data: Vec::new(),
        }
    }

    /// Create a data segment carrying one fragment of a message.
    pub fn push(conv: u32, frg: u8, data: Vec<u8>) -> Self {
        Self {
            frg,
            data,
            ..Self::new(conv, Command::Push)
        }
    }

    /// Total wire size.
    pub fn wire_size(&self) -> usize {
        OVERHEAD + self.data.len()
    }

    /// Append the header and payload to `buf`.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.reserve(self.wire_size());
        buf.extend_from_slice(&self.conv.to_le_bytes());
        buf.push(self.cmd.as_byte());
        buf.push(self.frg);
        buf.extend_from_slice(&self.wnd.to_le_bytes());
        buf.extend_from_slice(&self.ts.to_le_bytes());
        buf.extend_from_slice(&self.sn.to_le_bytes());
        buf.extend_from_slice(&self.una.to_le_bytes());
        buf.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.data);
    }

    /// Encode to a newly allocated buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.wire_size());
        self.encode_into(&mut buf);
        buf
    }

    /// Decode the first segment of `bytes`, returning it and the bytes consumed.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), SegmentError> {
        let header = SegmentHeader::parse(bytes)?;
        let cmd = Command::from_byte(header.cmd).ok_or(SegmentError::UnknownCommand(header.cmd))?;
        let end = header.wire_size();

        let segment = Self {
            conv: header.conv,
            cmd,
            frg: header.frg,
            wnd: header.wnd,
            ts: header.ts,
            sn: header.sn,
            una: header.una,
            data: bytes[OVERHEAD..end].to_vec(),
        };
        Ok((segment, end))
    }
}

/// Read the connection id of a datagram without decoding it.
///
/// Hosts use this to route a datagram to its session before calling
/// `input`. Trailing bytes are ignored.
pub fn get_conv(datagram: &[u8]) -> KcpResult<u32> {
    match datagram.get(..CONV_SIZE) {
        Some(&[a, b, c, d]) => Ok(u32::from_le_bytes([a, b, c, d])),
        _ => Err(KcpError::TooShort {
            actual: datagram.len(),
        }),
    }
}

/// Decode every segment of a datagram.
///
/// Strict counterpart of the engine's input path, which skips bad segments
/// instead: any decode failure is returned as
/// [`KcpError::MalformedSegment`].
pub fn decode_datagram(datagram: &[u8]) -> KcpResult<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut rest = datagram;
    while !rest.is_empty() {
        let (segment, used) = Segment::decode(rest)?;
        segments.push(segment);
        rest = &rest[used..];
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Segment {
        Segment {
            conv: 0x0102_0304,
            cmd: Command::Push,
            frg: 2,
            wnd: 128,
            ts: 1000,
            sn: 7,
            una: 3,
            data: b"hello".to_vec(),
        }
    }

    #[test]
    fn test_command_bytes() {
        for cmd in [
            Command::Push,
            Command::Ack,
            Command::WindowAsk,
            Command::WindowTell,
        ] {
            assert_eq!(Command::from_byte(cmd.as_byte()), Some(cmd));
        }
        assert_eq!(Command::from_byte(0), None);
        assert_eq!(Command::from_byte(85), None);
    }

    #[test]
    fn test_wire_layout() {
        let bytes = sample().encode();
        let expected = hex::decode(concat!(
            "04030201", // conv
            "51",       // cmd = 81
            "02",       // frg
            "8000",     // wnd = 128
            "e8030000", // ts = 1000
            "07000000", // sn
            "03000000", // una
            "05000000", // len
            "68656c6c6f"
        ))
        .unwrap();
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_decode_reports_consumed() {
        let seg = sample();
        let mut bytes = seg.encode();
        bytes.extend_from_slice(&[0xAA; 10]);

        let (decoded, consumed) = Segment::decode(&bytes).unwrap();
        assert_eq!(decoded, seg);
        assert_eq!(consumed, OVERHEAD + 5);
    }

    #[test]
    fn test_decode_too_short() {
        assert_eq!(
            Segment::decode(&[0u8; 3]),
            Err(SegmentError::TooShort {
                expected: OVERHEAD,
                actual: 3
            })
        );
    }

    #[test]
    fn test_decode_length_overflow() {
        let mut bytes = sample().encode();
        bytes.truncate(OVERHEAD + 2);
        assert_eq!(
            Segment::decode(&bytes),
            Err(SegmentError::LengthOverflow {
                declared: 5,
                available: 2
            })
        );
    }

    #[test]
    fn test_decode_unknown_command() {
        let mut bytes = sample().encode();
        bytes[4] = 99;
        assert_eq!(Segment::decode(&bytes), Err(SegmentError::UnknownCommand(99)));
    }

    #[test]
    fn test_empty_payload() {
        let seg = Segment::new(9, Command::Ack);
        let bytes = seg.encode();
        assert_eq!(bytes.len(), OVERHEAD);

        let header = SegmentHeader::parse(&bytes).unwrap();
        assert_eq!(header.len, 0);
        assert_eq!(header.cmd, Command::Ack.as_byte());
    }

    #[test]
    fn test_get_conv() {
        let bytes = sample().encode();
        assert_eq!(get_conv(&bytes).unwrap(), 0x0102_0304);
        assert_eq!(get_conv(&bytes[..4]).unwrap(), 0x0102_0304);
    }

    #[test]
    fn test_get_conv_too_short() {
        assert_eq!(get_conv(&[1, 2, 3]), Err(KcpError::TooShort { actual: 3 }));
        assert_eq!(get_conv(&[]), Err(KcpError::TooShort { actual: 0 }));
    }

    #[test]
    fn test_decode_datagram() {
        let mut datagram = sample().encode();
        Segment::new(0x0102_0304, Command::Ack).encode_into(&mut datagram);

        let segments = decode_datagram(&datagram).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].cmd, Command::Ack);

        datagram.push(0);
        assert_eq!(
            decode_datagram(&datagram),
            Err(KcpError::MalformedSegment(SegmentError::TooShort {
                expected: OVERHEAD,
                actual: 1
            }))
        );
    }
}
