//! Prototype-chained objects, property/method tables, and the object
//! manager (component C7). `ObjectManager::call_method` implements the
//! stack-discipline contract `amlp_vm::host::MethodHost` dispatches
//! through; `amlp-efuns`'s `Efuns` forwards its `MethodHost` impl straight
//! into the manager it owns, so a `Vm` can reach `CALL_METHOD` without
//! depending on this crate directly.

pub mod clone;
pub mod error;
pub mod manager;
pub mod object;

pub use clone::clone_object;
pub use error::{ObjectError, ObjectResult};
pub use manager::ObjectManager;
pub use object::{Object, ResolvedMethod};
