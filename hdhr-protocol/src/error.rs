//! Error types for the HDHomeRun wire protocol.

use thiserror::Error;

/// Protocol-level decode and encode failures.
///
/// Every variant is a malformed-input condition; servers resolve them by
/// producing no reply rather than answering with an error frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Declared payload length disagrees with the bytes on the wire.
    #[error("bad payload length: header declares {declared} bytes, packet carries {actual}")]
    BadLength { declared: usize, actual: usize },

    /// Trailing checksum does not match the recomputed CRC32C.
    #[error("bad checksum: expected {expected:#010x}, got {actual:#010x}")]
    BadChecksum { expected: u32, actual: u32 },

    /// An attribute length above 127; the multi-byte length extension is
    /// not implemented.
    #[error("unsupported attribute length {0} (single-byte length encoding only)")]
    UnsupportedLength(usize),

    /// Buffer ended inside a frame or attribute.
    #[error("truncated: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}
