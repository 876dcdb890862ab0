//! Bridges the VM's `Rc<dyn EfunHost>` back to the concrete `amlp_efuns::Efuns`
//! the session layer needs direct access to (its object manager, the
//! "current session" slot, the `write`/`printf` output buffer) while still
//! being able to pass `&mut Vm` into `Efuns::manager_mut().call_method` in the
//! same breath. Cloning the `Rc` (rather than a `Box`'s take-then-restore)
//! leaves the VM's own host field populated the whole time, so a method body
//! dispatched through the `&Efuns` this hands back can still make its own
//! nested efun/method calls.

use amlp_efuns::Efuns;
use amlp_vm::Vm;

/// Runs `f` with simultaneous access to `vm` and the `Efuns` installed as its
/// efun host. Panics if no host is installed, or if it isn't `Efuns` —
/// both are wiring bugs in whatever assembled the VM, not runtime
/// conditions a session needs to recover from.
pub fn with_efuns<R>(vm: &mut Vm, f: impl FnOnce(&mut Vm, &Efuns) -> R) -> R {
    let host = vm.efun_host().expect("efun host must be installed before dispatching a session");
    let efuns = host.as_any().downcast_ref::<Efuns>().expect("vm efun host must be amlp_efuns::Efuns");
    f(vm, efuns)
}
