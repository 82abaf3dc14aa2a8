//! MySQL packet codec implementation.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use mysql_wire::packet::{MAX_PAYLOAD_SIZE, PACKET_HEADER_SIZE, PacketHeader};
use mysql_wire::ProtocolError;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::CodecError;

/// A single MySQL frame: one payload of at most 2^24 - 1 bytes plus its
/// sequence id. Logical payloads larger than that arrive as several frames
/// and are reassembled by [`PayloadAssembler`](crate::PayloadAssembler).
#[derive(Debug, Clone)]
pub struct Packet {
    /// Sequence id carried by the frame.
    pub sequence_id: u8,
    /// Frame payload (excluding the 4-byte header).
    pub payload: BytesMut,
}

impl Packet {
    /// Create a new packet.
    #[must_use]
    pub fn new(sequence_id: u8, payload: BytesMut) -> Self {
        Self {
            sequence_id,
            payload,
        }
    }

    /// Total frame size including the header.
    #[must_use]
    pub fn total_size(&self) -> usize {
        PACKET_HEADER_SIZE + self.payload.len()
    }

    /// Whether the logical payload continues in the next frame.
    #[must_use]
    pub fn is_continuation(&self) -> bool {
        self.payload.len() == MAX_PAYLOAD_SIZE
    }
}

/// MySQL packet codec for tokio-util framing.
///
/// The codec owns the rolling sequence counter on behalf of the session:
/// encoding stamps and increments it, decoding verifies each received frame
/// against it. The session resets it to zero at each command boundary via
/// [`reset_sequence`](Self::reset_sequence).
#[derive(Debug)]
pub struct PacketCodec {
    /// Next sequence id to stamp or expect.
    sequence_id: u8,
    /// When false, received sequence ids are accepted as-is (used by the
    /// mock server and by tests that splice streams).
    validate_sequence: bool,
}

impl PacketCodec {
    /// Create a new codec with sequence validation enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sequence_id: 0,
            validate_sequence: true,
        }
    }

    /// Disable sequence validation on the decode path.
    #[must_use]
    pub fn without_sequence_validation(mut self) -> Self {
        self.validate_sequence = false;
        self
    }

    /// Reset the sequence counter to zero (start of a command).
    pub fn reset_sequence(&mut self) {
        self.sequence_id = 0;
    }

    /// The sequence id the codec will stamp or expect next.
    #[must_use]
    pub fn sequence_id(&self) -> u8 {
        self.sequence_id
    }

    /// Force the sequence counter to a specific value.
    ///
    /// Needed after an out-of-band exchange (e.g. TLS upgrade) where the
    /// counter continues rather than restarting.
    pub fn set_sequence(&mut self, seq: u8) {
        self.sequence_id = seq;
    }

    fn bump(&mut self) -> u8 {
        let id = self.sequence_id;
        self.sequence_id = self.sequence_id.wrapping_add(1);
        id
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < PACKET_HEADER_SIZE {
            return Ok(None);
        }

        // Peek at the header without consuming it.
        let mut peek = &src[..PACKET_HEADER_SIZE];
        let header = PacketHeader::decode(&mut peek)?;
        let length = header.length as usize;

        if src.len() < PACKET_HEADER_SIZE + length {
            src.reserve(PACKET_HEADER_SIZE + length - src.len());
            return Ok(None);
        }

        src.advance(PACKET_HEADER_SIZE);
        let payload = src.split_to(length);

        if self.validate_sequence {
            let expected = self.bump();
            if header.sequence_id != expected {
                return Err(ProtocolError::UnexpectedSequence {
                    expected,
                    actual: header.sequence_id,
                }
                .into());
            }
        } else {
            self.sequence_id = header.sequence_id.wrapping_add(1);
        }

        tracing::trace!(
            seq = header.sequence_id,
            len = length,
            continuation = length == MAX_PAYLOAD_SIZE,
            "decoded packet"
        );

        Ok(Some(Packet::new(header.sequence_id, payload)))
    }
}

/// Encoding accepts a whole logical payload and splits it into frames,
/// stamping consecutive sequence ids. A payload that is an exact multiple
/// of the maximum frame size is terminated by an empty frame so the peer
/// can detect the end of the continuation run.
impl Encoder<Bytes> for PacketCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut remaining = item;

        loop {
            let chunk_len = remaining.len().min(MAX_PAYLOAD_SIZE);
            let chunk = remaining.split_to(chunk_len);

            dst.reserve(PACKET_HEADER_SIZE + chunk.len());
            #[allow(clippy::cast_possible_truncation)]
            let header = PacketHeader::new(chunk.len() as u32, self.bump());
            header.encode(dst);
            dst.put_slice(&chunk);

            tracing::trace!(seq = header.sequence_id, len = chunk.len(), "encoded packet");

            // Stop once a short frame has been emitted; a full-size frame
            // obliges us to continue, possibly with an empty terminator.
            if chunk_len < MAX_PAYLOAD_SIZE {
                break;
            }
            if remaining.is_empty() {
                let header = PacketHeader::new(0, self.bump());
                dst.reserve(PACKET_HEADER_SIZE);
                header.encode(dst);
                break;
            }
        }

        Ok(())
    }
}
