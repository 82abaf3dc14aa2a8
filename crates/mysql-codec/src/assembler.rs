//! Logical payload reassembly.
//!
//! A logical payload larger than 2^24 - 1 bytes is split across several
//! frames, each full-size except the last (which may be empty). This module
//! buffers frames until the short frame arrives.

use bytes::{Bytes, BytesMut};

use crate::packet_codec::Packet;

/// Reassembles continuation frames into complete logical payloads.
#[derive(Debug, Default)]
pub struct PayloadAssembler {
    buffer: BytesMut,
    assembling: bool,
}

impl PayloadAssembler {
    /// Create a new assembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a frame into the assembler.
    ///
    /// Returns `Some(payload)` when the frame completes a logical payload,
    /// `None` when more frames are needed.
    pub fn push(&mut self, packet: Packet) -> Option<Bytes> {
        if packet.is_continuation() {
            self.buffer.extend_from_slice(&packet.payload);
            self.assembling = true;
            tracing::trace!(buffered = self.buffer.len(), "buffering continuation frame");
            return None;
        }

        if self.assembling {
            self.buffer.extend_from_slice(&packet.payload);
            self.assembling = false;
            return Some(self.buffer.split().freeze());
        }

        Some(packet.payload.freeze())
    }

    /// Whether a partial payload is buffered.
    #[must_use]
    pub fn has_partial(&self) -> bool {
        self.assembling
    }

    /// Discard any partial payload.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.assembling = false;
    }
}
