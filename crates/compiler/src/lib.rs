//! Two-pass compiler: AST to bytecode (spec section 4.4).

pub mod compiler;
pub mod error;
pub mod opcode;
pub mod program;

pub use compiler::Compiler;
pub use error::{CompileError, CompileErrorKind};
pub use opcode::OpCode;
pub use program::{FunctionDescriptor, GlobalDescriptor, LineMapEntry, Program};
