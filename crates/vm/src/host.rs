//! Host hooks the VM dispatches into without depending on the crates that
//! implement them. `amlp-efuns` registers callables the language can't
//! express itself; `amlp-objects` resolves `CALL_METHOD`'s prototype-chain
//! dispatch. Both of those crates depend on `amlp-vm`, so the dependency
//! has to run the other way: `Vm` holds trait objects, wired up by whoever
//! assembles the driver (mirroring how the teacher's `interop_service.rs`
//! lets `ApplicationEngine` dispatch syscalls without the VM core knowing
//! about any particular contract).
//!
//! Both traits take `&self` rather than `&mut self`, and `Vm` holds them
//! behind `Rc` rather than `Box`. A host's own `call`/`call_method` runs
//! script bytecode back through `vm: &mut Vm` — an object's `create()`
//! calling `write()`, `tell_object` invoking `receive_message` which calls
//! `write()` again — and those nested dispatches look the installed host
//! up again to resolve their own efuns/methods. An owning `Box` would have
//! to be moved out of `Vm` for the duration of the outer call to hand a
//! `&mut` host to itself, leaving `Vm` without a host for exactly the
//! nested calls that need one. `Rc` lets `dispatch_call` clone a handle
//! that doesn't borrow from `self` at all, so `self` stays free for the
//! nested dispatch to clone its own handle from the same `Vm` field.
//! Implementations reach for interior mutability (`RefCell`/`Cell`) on
//! their own state instead of relying on `&mut self`; nested calls only
//! conflict if two calls try to hold the same `RefCell` open
//! simultaneously, which doesn't happen as long as each dispatch releases
//! its borrow before recursing into `vm.call_function`.

use std::any::Any;

use amlp_value::{ObjectId, Value};

use crate::error::VmResult;
use crate::vm::Vm;

/// The efun registry's half of `CALL`'s "look up the name first in the
/// efun registry, then in the VM function table" (spec section 4.6).
/// Returning `None` means "not an efun"; the VM then falls through to its
/// own function table. `args` is borrowed: the VM owns releasing it once
/// the call is resolved either way, so an implementation that wants to
/// retain a value (e.g. stashing a string into an object property) must
/// `addref`/`clone_value` it through `vm.heap`.
///
/// `Any` lets a caller that cloned the host's `Rc` back out of the VM (via
/// `Vm::efun_host`) downcast to the concrete type it installed, to reach
/// state the trait itself doesn't expose (the session layer needs
/// `amlp_efuns::Efuns`'s object manager and output buffer, not just its
/// `EfunHost` surface).
pub trait EfunHost: Any {
    fn call(&self, vm: &mut Vm, name: &str, args: &[Value]) -> Option<VmResult<Value>>;

    fn as_any(&self) -> &dyn Any;
}

/// The object system's half of `CALL_METHOD` (spec section 4.7): resolve
/// `method` on `object` by walking its prototype chain and invoke it
/// through `vm`, honoring the stack-snapshot/restore discipline described
/// there.
pub trait MethodHost {
    fn call_method(&self, vm: &mut Vm, object: ObjectId, method: &str, args: Vec<Value>) -> Value;
}
