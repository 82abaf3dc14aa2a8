//! Compressed-protocol envelope (CLIENT_COMPRESS).
//!
//! When compression is negotiated, every exchange after the handshake is
//! wrapped in a second framing layer: `[clen:3][cseq:1][ulen:3]` followed
//! by `clen` bytes of zlib data. `ulen == 0` marks a payload stored
//! uncompressed. The inflated inner stream is ordinary packet framing and
//! is re-fed through [`PacketCodec`](crate::PacketCodec).

use std::io::{Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use mysql_wire::packet::{COMPRESSED_HEADER_SIZE, MAX_PAYLOAD_SIZE};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::CodecError;

/// Payloads shorter than this are stored rather than deflated; the
/// envelope overhead would exceed the savings.
pub const MIN_COMPRESS_LENGTH: usize = 50;

/// Codec for the compression envelope.
///
/// Decoding yields runs of inner (uncompressed) packet-framing bytes;
/// encoding accepts a run of already-framed packet bytes and wraps it.
/// The envelope sequence counter restarts at every command boundary, in
/// step with the inner packet counter. Received envelope sequence ids are
/// tracked but not strictly validated; the inner packet stream carries the
/// authoritative counter.
#[derive(Debug)]
pub struct CompressedCodec {
    sequence_id: u8,
    level: Compression,
}

impl CompressedCodec {
    /// Create a codec with the default compression level.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sequence_id: 0,
            level: Compression::default(),
        }
    }

    /// Create a codec with an explicit zlib level (0-9).
    #[must_use]
    pub fn with_level(level: u32) -> Self {
        Self {
            sequence_id: 0,
            level: Compression::new(level),
        }
    }

    /// Reset the envelope sequence counter (start of a command).
    pub fn reset_sequence(&mut self) {
        self.sequence_id = 0;
    }

    fn bump(&mut self) -> u8 {
        let id = self.sequence_id;
        self.sequence_id = self.sequence_id.wrapping_add(1);
        id
    }
}

impl Default for CompressedCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for CompressedCodec {
    type Item = BytesMut;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < COMPRESSED_HEADER_SIZE {
            return Ok(None);
        }

        let mut peek = &src[..COMPRESSED_HEADER_SIZE];
        let compressed_len = peek.get_uint_le(3) as usize;
        let sequence_id = peek.get_u8();
        let uncompressed_len = peek.get_uint_le(3) as usize;

        if src.len() < COMPRESSED_HEADER_SIZE + compressed_len {
            src.reserve(COMPRESSED_HEADER_SIZE + compressed_len - src.len());
            return Ok(None);
        }

        src.advance(COMPRESSED_HEADER_SIZE);
        let body = src.split_to(compressed_len);
        self.sequence_id = sequence_id.wrapping_add(1);

        tracing::trace!(
            cseq = sequence_id,
            clen = compressed_len,
            ulen = uncompressed_len,
            "decoded compressed envelope"
        );

        if uncompressed_len == 0 {
            // Stored uncompressed.
            return Ok(Some(body));
        }

        let mut inflated = Vec::with_capacity(uncompressed_len);
        ZlibDecoder::new(&body[..])
            .read_to_end(&mut inflated)
            .map_err(|e| CodecError::Compression(e.to_string()))?;
        if inflated.len() != uncompressed_len {
            return Err(CodecError::Compression(format!(
                "inflated to {} bytes, envelope promised {}",
                inflated.len(),
                uncompressed_len
            )));
        }

        Ok(Some(BytesMut::from(&inflated[..])))
    }
}

impl Encoder<Bytes> for CompressedCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut remaining = item;

        loop {
            let chunk_len = remaining.len().min(MAX_PAYLOAD_SIZE);
            let chunk = remaining.split_to(chunk_len);
            let seq = self.bump();

            if chunk.len() < MIN_COMPRESS_LENGTH {
                dst.reserve(COMPRESSED_HEADER_SIZE + chunk.len());
                dst.put_uint_le(chunk.len() as u64, 3);
                dst.put_u8(seq);
                dst.put_uint_le(0, 3);
                dst.put_slice(&chunk);
            } else {
                let mut encoder = ZlibEncoder::new(Vec::new(), self.level);
                encoder
                    .write_all(&chunk)
                    .map_err(|e| CodecError::Compression(e.to_string()))?;
                let deflated = encoder
                    .finish()
                    .map_err(|e| CodecError::Compression(e.to_string()))?;

                dst.reserve(COMPRESSED_HEADER_SIZE + deflated.len());
                dst.put_uint_le(deflated.len() as u64, 3);
                dst.put_u8(seq);
                dst.put_uint_le(chunk.len() as u64, 3);
                dst.put_slice(&deflated);
            }

            tracing::trace!(cseq = seq, ulen = chunk.len(), "encoded compressed envelope");

            if remaining.is_empty() {
                break;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn roundtrip(payload: &[u8]) -> BytesMut {
        let mut codec = CompressedCodec::new();
        let mut wire = BytesMut::new();
        codec
            .encode(Bytes::copy_from_slice(payload), &mut wire)
            .unwrap();

        let mut decode_codec = CompressedCodec::new();
        let mut out = BytesMut::new();
        while let Some(chunk) = decode_codec.decode(&mut wire).unwrap() {
            out.extend_from_slice(&chunk);
        }
        out
    }

    #[test]
    fn test_small_payload_stored_uncompressed() {
        let mut codec = CompressedCodec::new();
        let mut wire = BytesMut::new();
        codec.encode(Bytes::from_static(b"tiny"), &mut wire).unwrap();

        // ulen field is zero for stored payloads.
        assert_eq!(&wire[4..7], &[0, 0, 0]);
        assert_eq!(&wire[7..], b"tiny");
    }

    #[test]
    fn test_large_payload_roundtrip() {
        let payload = vec![0x42u8; 4096];
        assert_eq!(&roundtrip(&payload)[..], &payload[..]);
    }

    #[test]
    fn test_compressible_payload_shrinks() {
        let payload = vec![0u8; 10_000];
        let mut codec = CompressedCodec::new();
        let mut wire = BytesMut::new();
        codec
            .encode(Bytes::from(payload.clone()), &mut wire)
            .unwrap();
        assert!(wire.len() < payload.len() / 2);
        let mut decode_codec = CompressedCodec::new();
        let out = decode_codec.decode(&mut wire).unwrap().unwrap();
        assert_eq!(&out[..], &payload[..]);
    }

    #[test]
    fn test_incomplete_envelope() {
        let mut codec = CompressedCodec::new();
        let mut wire = BytesMut::from(&[0x10u8, 0x00, 0x00, 0x00][..]);
        assert!(codec.decode(&mut wire).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_zlib_stream() {
        let mut wire = BytesMut::new();
        wire.put_uint_le(4, 3);
        wire.put_u8(0);
        wire.put_uint_le(100, 3); // claims 100 inflated bytes
        wire.put_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);

        let mut codec = CompressedCodec::new();
        assert!(matches!(
            codec.decode(&mut wire),
            Err(CodecError::Compression(_))
        ));
    }
}
