//! Error types for SPE protocol conversions

use thiserror::Error;

/// Errors from fallible protocol conversions
///
/// Framing and checksum problems are never reported here: the frame decoder
/// resynchronizes silently on those.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Byte value does not correspond to any amplifier command
    #[error("unknown command code: 0x{0:02X}")]
    UnknownCommandCode(u8),

    /// Name does not correspond to any amplifier command
    #[error("unknown command: {0}")]
    UnknownCommandName(String),

    /// Payload slice has the wrong length for its record type
    #[error("invalid {kind} payload: expected {expected} bytes, got {actual}")]
    PayloadLength {
        /// Record type being interpreted
        kind: &'static str,
        /// Required payload length
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },
}
