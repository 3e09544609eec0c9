//! Opaque frame: the pass-through message representation.
//!
//! A [`Frame`] stores raw wire bytes verbatim through decode and encode,
//! which is what lets the proxy forward calls for services it has no
//! compiled definitions for. No semantic field of the payload is ever
//! inspected; the buffer is the message.

use bytes::{BufMut, BytesMut};

/// A single RPC message as an opaque byte buffer.
///
/// Invariant: encoding a frame that holds bytes `B` reproduces exactly
/// `B`, and decoding source bytes into a frame stores them unmodified,
/// regardless of any schema the transport layer believes is in effect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    buf: BytesMut,
}

impl Frame {
    /// An empty frame, ready to be decoded into.
    pub fn new() -> Self {
        Self::default()
    }

    /// A frame holding a copy of the given bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            buf: BytesMut::from(bytes),
        }
    }

    /// The raw payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the frame carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Codec contract the hosting transport installs for proxied methods.
///
/// The hosting server and the backend-facing client must both run frames
/// through an implementation of this trait; otherwise pass-through
/// correctness is violated.
pub trait Codec: Send + Sync {
    /// Append the frame's wire representation to `dst`.
    fn encode(&self, frame: &Frame, dst: &mut BytesMut);

    /// Replace `frame`'s contents with the bytes read from the wire.
    fn decode(&self, src: &[u8], frame: &mut Frame);
}

/// The identity codec: bytes in, the same bytes out.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCodec;

impl Codec for PassthroughCodec {
    fn encode(&self, frame: &Frame, dst: &mut BytesMut) {
        dst.put_slice(&frame.buf);
    }

    fn decode(&self, src: &[u8], frame: &mut Frame) {
        frame.buf.clear();
        frame.buf.put_slice(src);
    }
}
