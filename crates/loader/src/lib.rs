//! Program loader (component C5): decodes a compiled `Program`'s bytecode
//! byte stream into the VM-resident representation `amlp-vm` executes.

pub mod error;
pub mod function;
pub mod instruction;
pub mod loader;

pub use error::{LoadError, LoadResult};
pub use function::VMFunction;
pub use instruction::{Instruction, Operand};
pub use loader::{load_program, LoadedProgram};
