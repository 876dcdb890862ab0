//! The stack-based bytecode virtual machine (component C6): opcode
//! dispatch, call frames, the `EfunHost`/`MethodHost` seams higher-level
//! crates plug into, and the debug/profiling hooks spec section 4.6
//! describes.

pub mod debug;
pub mod error;
pub mod frame;
pub mod host;
pub mod vm;

pub use debug::{DebugFlags, Profiler};
pub use error::{VmError, VmResult};
pub use frame::CallFrame;
pub use host::{EfunHost, MethodHost};
pub use vm::Vm;
