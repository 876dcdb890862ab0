//! Error type for the binary reader/writer primitives.

use thiserror::Error;

/// Errors that can occur while encoding or decoding the bytecode format.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IoError {
    /// Ran out of bytes while decoding a fixed- or variable-length field.
    #[error("unexpected end of stream: needed {needed} more byte(s) while reading {context}")]
    EndOfStream { needed: usize, context: String },

    /// A length-prefixed field declared a length that could not be trusted
    /// (e.g. a negative local index encoded as an absurd unsigned value).
    #[error("invalid length for {context}: {length}")]
    InvalidLength { context: String, length: usize },

    /// A byte sequence that was expected to be valid UTF-8 was not.
    #[error("invalid UTF-8 string in {context}: {reason}")]
    InvalidUtf8 { context: String, reason: String },

    /// An opcode byte did not correspond to any known instruction.
    #[error("unknown opcode byte {opcode:#04x}")]
    UnknownOpcode { opcode: u8 },

    /// A seek or skip moved outside the bounds of the buffer.
    #[error("position {position} is out of bounds (buffer length {length})")]
    OutOfBounds { position: usize, length: usize },
}

/// Convenience alias for results produced by this crate.
pub type IoResult<T> = Result<T, IoError>;
