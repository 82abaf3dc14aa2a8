//! Packet-level connection wrapper.
//!
//! [`PacketConn`] pairs a transport with the packet codec and the payload
//! assembler, and optionally layers the compression envelope on top after
//! the handshake negotiates CLIENT_COMPRESS. It is the unit the session
//! drives: one logical payload in, one logical payload out.
//!
//! MySQL has no in-band cancellation; a running query is killed from a
//! separate sidecar connection (`KILL QUERY <thread-id>`), so unlike
//! drivers for protocols with out-of-band attention signals there is no
//! need to split the transport into read and write halves.

use bytes::{Bytes, BytesMut};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, Encoder, Framed, FramedParts};

use crate::assembler::PayloadAssembler;
use crate::compression::CompressedCodec;
use crate::error::CodecError;
use crate::packet_codec::PacketCodec;

/// Marker trait for transports a connection can run over.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

/// A type-erased transport (TCP, Unix socket, or a TLS stream over either).
pub type BoxTransport = Box<dyn Transport>;

enum Framing<T> {
    Plain(Framed<T, PacketCodec>),
    Compressed {
        framed: Framed<T, CompressedCodec>,
        /// Codec for the inner, uncompressed packet stream.
        inner_codec: PacketCodec,
        /// Inflated bytes not yet parsed into packets.
        inner_buf: BytesMut,
    },
}

/// A MySQL connection at the packet-framing level.
///
/// Reads yield complete logical payloads (continuation frames already
/// reassembled, sequence ids already validated); writes accept one logical
/// payload and handle splitting and sequence stamping.
pub struct PacketConn<T> {
    framing: Framing<T>,
    assembler: PayloadAssembler,
}

impl<T> PacketConn<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a plain (uncompressed) connection over a transport.
    pub fn new(transport: T) -> Self {
        Self {
            framing: Framing::Plain(Framed::new(transport, PacketCodec::new())),
            assembler: PayloadAssembler::new(),
        }
    }

    /// Switch to the compression envelope.
    ///
    /// Called once, after the handshake completes with CLIENT_COMPRESS
    /// granted. Any bytes already buffered from the transport carry over:
    /// everything the server sends after its handshake OK is
    /// envelope-framed.
    #[must_use]
    pub fn into_compressed(self) -> Self {
        let framing = match self.framing {
            Framing::Plain(framed) => {
                let old = framed.into_parts();
                let mut parts = FramedParts::new::<Bytes>(old.io, CompressedCodec::new());
                parts.read_buf = old.read_buf;
                parts.write_buf = old.write_buf;
                Framing::Compressed {
                    framed: Framed::from_parts(parts),
                    inner_codec: old.codec,
                    inner_buf: BytesMut::new(),
                }
            }
            compressed @ Framing::Compressed { .. } => compressed,
        };
        Self {
            framing,
            assembler: self.assembler,
        }
    }

    /// Whether the compression envelope is active.
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        matches!(self.framing, Framing::Compressed { .. })
    }

    /// Reset the sequence counters (start of a new command).
    pub fn reset_sequence(&mut self) {
        match &mut self.framing {
            Framing::Plain(framed) => framed.codec_mut().reset_sequence(),
            Framing::Compressed {
                framed,
                inner_codec,
                ..
            } => {
                framed.codec_mut().reset_sequence();
                inner_codec.reset_sequence();
            }
        }
    }

    /// The sequence id that will be stamped or expected next.
    #[must_use]
    pub fn sequence_id(&self) -> u8 {
        match &self.framing {
            Framing::Plain(framed) => framed.codec().sequence_id(),
            Framing::Compressed { inner_codec, .. } => inner_codec.sequence_id(),
        }
    }

    /// Force the sequence counter, used across the TLS upgrade where the
    /// handshake numbering continues on the encrypted stream.
    pub fn set_sequence(&mut self, seq: u8) {
        match &mut self.framing {
            Framing::Plain(framed) => framed.codec_mut().set_sequence(seq),
            Framing::Compressed { inner_codec, .. } => inner_codec.set_sequence(seq),
        }
    }

    /// Whether a partially-assembled payload is pending.
    ///
    /// True only when the transport died mid-continuation; the session
    /// uses it to distinguish clean EOF from truncation.
    #[must_use]
    pub fn has_partial(&self) -> bool {
        self.assembler.has_partial()
    }

    /// Read the next complete logical payload.
    ///
    /// Returns `Err(ConnectionClosed)` if the transport ends, including
    /// mid-payload.
    pub async fn read_payload(&mut self) -> Result<Bytes, CodecError> {
        loop {
            let packet = match &mut self.framing {
                Framing::Plain(framed) => match framed.next().await {
                    Some(result) => result?,
                    None => return Err(CodecError::ConnectionClosed),
                },
                Framing::Compressed {
                    framed,
                    inner_codec,
                    inner_buf,
                } => {
                    match inner_codec.decode(inner_buf)? {
                        Some(packet) => packet,
                        None => {
                            // Need another envelope's worth of inner bytes.
                            match framed.next().await {
                                Some(chunk) => {
                                    inner_buf.extend_from_slice(&chunk?);
                                    continue;
                                }
                                None => return Err(CodecError::ConnectionClosed),
                            }
                        }
                    }
                }
            };

            if let Some(payload) = self.assembler.push(packet) {
                return Ok(payload);
            }
        }
    }

    /// Write one logical payload and flush it to the transport.
    pub async fn write_payload(&mut self, payload: Bytes) -> Result<(), CodecError> {
        match &mut self.framing {
            Framing::Plain(framed) => framed.send(payload).await,
            Framing::Compressed {
                framed,
                inner_codec,
                ..
            } => {
                let mut raw = BytesMut::new();
                inner_codec.encode(payload, &mut raw)?;
                framed.send(raw.freeze()).await
            }
        }
    }

    /// Flush buffered writes.
    pub async fn flush(&mut self) -> Result<(), CodecError> {
        match &mut self.framing {
            Framing::Plain(framed) => framed.flush().await,
            Framing::Compressed { framed, .. } => framed.flush().await,
        }
    }

    /// Consume the connection and return the underlying transport.
    ///
    /// Used for the TLS upgrade: the plain transport is wrapped in a TLS
    /// stream and a fresh `PacketConn` is built around it.
    pub fn into_inner(self) -> (T, u8) {
        match self.framing {
            Framing::Plain(framed) => {
                let seq = framed.codec().sequence_id();
                (framed.into_inner(), seq)
            }
            Framing::Compressed { framed, .. } => (framed.into_inner(), 0),
        }
    }
}

impl<T> std::fmt::Debug for PacketConn<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketConn")
            .field("compressed", &self.is_compressed())
            .field("has_partial", &self.has_partial())
            .finish_non_exhaustive()
    }
}
