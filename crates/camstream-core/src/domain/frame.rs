//! Frame and client identity types.

use uuid::Uuid;

/// Opaque identity of one connected viewer.
///
/// A fresh v4 UUID is minted for every WebSocket connection, so two tabs
/// from the same browser are two distinct clients.
pub type ClientId = Uuid;

/// One encoded JPEG still.
///
/// Frames are produced on demand for a single request and handed straight
/// to the transport; nothing caches or reuses them.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8>,
}

impl Frame {
    /// JPEG start-of-image marker.
    pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];

    /// Wraps already-encoded JPEG bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Borrows the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the frame, returning the encoded bytes for sending.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Encoded size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns `true` if the payload starts with the JPEG SOI marker.
    pub fn looks_like_jpeg(&self) -> bool {
        self.bytes.starts_with(&Self::JPEG_SOI)
    }
}

// Printing a multi-megabyte buffer into a log line helps nobody.
impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame").field("len", &self.bytes.len()).finish()
    }
}
