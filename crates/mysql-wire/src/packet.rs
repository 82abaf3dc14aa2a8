//! MySQL packet header definitions.

use bytes::{Buf, BufMut};

use crate::error::ProtocolError;

/// MySQL packet header size in bytes (3-byte length + 1-byte sequence id).
pub const PACKET_HEADER_SIZE: usize = 4;

/// Maximum payload carried by a single packet (2^24 - 1 bytes).
///
/// A payload of exactly this size signals that the logical payload continues
/// in the next packet; the continuation ends at the first shorter frame.
pub const MAX_PAYLOAD_SIZE: usize = 0xFF_FF_FF;

/// Compressed-protocol envelope header size (3 + 1 + 3 bytes).
pub const COMPRESSED_HEADER_SIZE: usize = 7;

/// MySQL packet header.
///
/// Every packet begins with a 4-byte header: a 24-bit little-endian payload
/// length followed by a rolling sequence id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Payload length, at most [`MAX_PAYLOAD_SIZE`].
    pub length: u32,
    /// Sequence id, wrapping modulo 256 within one command.
    pub sequence_id: u8,
}

impl PacketHeader {
    /// Create a new packet header.
    #[must_use]
    pub const fn new(length: u32, sequence_id: u8) -> Self {
        Self {
            length,
            sequence_id,
        }
    }

    /// Parse a packet header from a buffer.
    pub fn decode(src: &mut impl Buf) -> Result<Self, ProtocolError> {
        if src.remaining() < PACKET_HEADER_SIZE {
            return Err(ProtocolError::UnexpectedEof {
                context: "packet header",
            });
        }

        #[allow(clippy::cast_possible_truncation)]
        let length = src.get_uint_le(3) as u32;
        let sequence_id = src.get_u8();

        Ok(Self {
            length,
            sequence_id,
        })
    }

    /// Encode the packet header into a buffer.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_uint_le(u64::from(self.length), 3);
        dst.put_u8(self.sequence_id);
    }

    /// Whether this packet is the largest possible frame, meaning the
    /// logical payload continues in the next packet.
    #[must_use]
    pub const fn is_continuation(&self) -> bool {
        self.length as usize == MAX_PAYLOAD_SIZE
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_header_roundtrip() {
        let header = PacketHeader::new(0x12_3456, 7);

        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf.len(), PACKET_HEADER_SIZE);
        assert_eq!(&buf[..], &[0x56, 0x34, 0x12, 0x07]);

        let mut cursor = buf.as_ref();
        let decoded = PacketHeader::decode(&mut cursor).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn test_max_payload_is_continuation() {
        #[allow(clippy::cast_possible_truncation)]
        let header = PacketHeader::new(MAX_PAYLOAD_SIZE as u32, 0);
        assert!(header.is_continuation());
        assert!(!PacketHeader::new(0xFF_FF_FE, 0).is_continuation());
    }

    #[test]
    fn test_truncated_header() {
        let mut cursor = &[0x01u8, 0x00][..];
        assert!(matches!(
            PacketHeader::decode(&mut cursor),
            Err(ProtocolError::UnexpectedEof { .. })
        ));
    }
}
