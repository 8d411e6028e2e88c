//! Frame type shared by the codec and the packet layer.

use crate::config::FRAME_HEADER_LEN;

/// One decoded (or to-be-encoded) unit of the wire protocol: a type tag
/// plus its plaintext payload. The cipher is applied only at the codec
/// boundary, so a `Frame` in memory always holds plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Numeric packet type tag
    pub tag: u8,
    /// Plaintext payload bytes
    pub payload: Vec<u8>,
}

impl Frame {
    /// Build a frame from a tag and payload.
    pub fn new(tag: u8, payload: Vec<u8>) -> Self {
        Self { tag, payload }
    }

    /// Size of this frame on the wire, header included.
    pub fn wire_len(&self) -> usize {
        self.payload.len() + FRAME_HEADER_LEN
    }
}
