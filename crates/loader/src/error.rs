//! Errors produced while decoding a `Program`'s bytecode (component C5).

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("failed to decode instruction stream: {0}")]
    Decode(#[from] amlp_io::IoError),

    #[error("unknown opcode byte {opcode:#04x} at offset {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },

    #[error("jump target {target} does not land on an instruction boundary")]
    BadJumpTarget { target: usize },

    #[error("function '{name}' decodes to an empty instruction range")]
    EmptyFunctionBody { name: String },

    #[error("function '{name}' offset {offset} does not land on an instruction boundary")]
    BadFunctionOffset { name: String, offset: usize },
}

pub type LoadResult<T> = Result<T, LoadError>;
