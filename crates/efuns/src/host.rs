//! `Efuns`: the concrete `EfunHost` wired into the VM by the node binary.
//! Owns the efun registry, the object manager (so object-touching efuns
//! like `clone_object`/`call_other`/`present` have somewhere to look
//! things up), the mudlib root for path-sandboxed I/O efuns, and the
//! "current session" slot `this_player` reads (spec §4.9: "the session
//! multiplexer must set a process-wide current session reference before
//! the call and clear it after").
//!
//! Fields live behind `RefCell`/`Cell` rather than being owned outright:
//! `EfunHost::call` takes `&self` (see `amlp_vm::host`), since the VM holds
//! its host behind an `Rc` that has to stay clonable from inside a call
//! already in progress (an efun whose implementation calls back into script
//! code that calls another efun). Borrows are scoped to the match arm that
//! needs them and dropped before any nested `vm.call_function`/`call_method`
//! runs, so reentrant calls never collide on an open `RefCell` borrow.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::path::PathBuf;

use amlp_objects::ObjectManager;
use amlp_value::{ObjectId, Value};
use amlp_vm::host::{EfunHost, MethodHost};
use amlp_vm::{Vm, VmResult};

use crate::registry::EfunRegistry;
use crate::{aggregates, io, math, messaging, object, output, strings};

pub struct Efuns {
    registry: EfunRegistry,
    manager: RefCell<ObjectManager>,
    mudlib_root: PathBuf,
    current_player: Cell<Option<ObjectId>>,
    /// Text queued by `write`/`printf`, destined for the bound session's
    /// connection rather than the log (SPEC_FULL.md's ambient-logging
    /// section). The session layer calls `drain_output` after dispatching
    /// a command and forwards whatever came back to the connection.
    output_buffer: RefCell<Vec<String>>,
}

impl Efuns {
    pub fn new(mudlib_root: PathBuf) -> Self {
        Efuns {
            registry: EfunRegistry::default(),
            manager: RefCell::new(ObjectManager::new()),
            mudlib_root,
            current_player: Cell::new(None),
            output_buffer: RefCell::new(Vec::new()),
        }
    }

    /// Takes every line queued by `write`/`printf` since the last drain.
    pub fn drain_output(&self) -> Vec<String> {
        std::mem::take(&mut self.output_buffer.borrow_mut())
    }

    pub fn manager(&self) -> std::cell::Ref<'_, ObjectManager> {
        self.manager.borrow()
    }

    pub fn manager_mut(&self) -> std::cell::RefMut<'_, ObjectManager> {
        self.manager.borrow_mut()
    }

    /// Binds the object a command is about to be dispatched against, per
    /// spec §4.9's "current session" contract. Callers must clear this
    /// (pass `None`) once the dispatch returns.
    pub fn set_current_player(&self, player: Option<ObjectId>) {
        self.current_player.set(player);
    }

    pub fn current_player(&self) -> Option<ObjectId> {
        self.current_player.get()
    }
}

impl EfunHost for Efuns {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn call(&self, vm: &mut Vm, name: &str, args: &[Value]) -> Option<VmResult<Value>> {
        if !self.registry.contains(name) {
            return None;
        }
        if !self.registry.arity_ok(name, args.len()) {
            tracing::debug!(target: "efuns", efun = name, arg_count = args.len(), "arity mismatch");
            return Some(Ok(Value::Null));
        }

        let result = match name {
            "strlen" => strings::strlen(&mut vm.heap, args),
            "substring" => strings::substring(&mut vm.heap, args),
            "upper_case" => strings::upper_case(&mut vm.heap, args),
            "lower_case" => strings::lower_case(&mut vm.heap, args),
            "trim" => strings::trim(&mut vm.heap, args),
            "explode" => strings::explode(&mut vm.heap, args),
            "implode" => strings::implode(&mut vm.heap, args),

            "sizeof" => aggregates::sizeof(&mut vm.heap, args),
            "intp" => aggregates::intp(&mut vm.heap, args),
            "floatp" => aggregates::floatp(&mut vm.heap, args),
            "stringp" => aggregates::stringp(&mut vm.heap, args),
            "arrayp" => aggregates::arrayp(&mut vm.heap, args),
            "mappingp" => aggregates::mappingp(&mut vm.heap, args),
            "objectp" => aggregates::objectp(&mut vm.heap, args),
            "sort_array" => aggregates::sort_array(&mut vm.heap, args),
            "reverse_array" => aggregates::reverse_array(&mut vm.heap, args),

            "abs" => math::abs(&mut vm.heap, args),
            "sqrt" => math::sqrt(&mut vm.heap, args),
            "pow" => math::pow(&mut vm.heap, args),
            "random" => math::random(&mut vm.heap, args),
            "min" => math::min(&mut vm.heap, args),
            "max" => math::max(&mut vm.heap, args),

            "read_file" => io::read_file(&mut vm.heap, &self.mudlib_root, args),
            "write_file" => io::write_file(&mut vm.heap, &self.mudlib_root, args),
            "file_size" => io::file_size(&mut vm.heap, &self.mudlib_root, args),
            "get_dir" => io::get_dir(&mut vm.heap, &self.mudlib_root, args),
            "mkdir" => io::mkdir(&mut vm.heap, &self.mudlib_root, args),
            "rm" => io::rm(&mut vm.heap, &self.mudlib_root, args),

            "clone_object" => {
                let mut mgr = self.manager.borrow_mut();
                object::clone_object(vm, &mut mgr, &self.mudlib_root, args)
            }
            "find_object" => {
                let mgr = self.manager.borrow();
                object::find_object(vm, &mgr, args)
            }
            "call_other" => {
                let mut mgr = self.manager.borrow_mut();
                object::call_other(vm, &mut mgr, args)
            }
            "present" => {
                let mgr = self.manager.borrow();
                object::present(vm, &mgr, args)
            }
            "environment" => {
                let mgr = self.manager.borrow();
                object::environment(vm, &mgr, args)
            }
            "move_object" => {
                let mut mgr = self.manager.borrow_mut();
                object::move_object(vm, &mut mgr, args)
            }
            "this_player" => Ok(object::this_player(self.current_player.get())),
            "file_name" => {
                let mgr = self.manager.borrow();
                object::file_name(vm, &mgr, args)
            }

            "tell_object" => {
                let mut mgr = self.manager.borrow_mut();
                messaging::tell_object(vm, &mut mgr, args)
            }

            "write" => output::render_write(&vm.heap, &args[0]).map(|text| {
                self.output_buffer.borrow_mut().push(text);
                Value::Int(1)
            }),
            "printf" => output::render_printf(&vm.heap, args).map(|text| {
                self.output_buffer.borrow_mut().push(text);
                Value::Int(1)
            }),

            _ => unreachable!("registry and dispatch match must stay in sync: {name}"),
        };
        Some(result)
    }
}

/// `CALL_METHOD`'s other half: forwards straight to the object manager this
/// `Efuns` already owns, so installing one `Rc<Efuns>` as both the VM's
/// efun host and its method host is enough to make `.method()` script
/// syntax work end to end (spec section 4.7).
impl MethodHost for Efuns {
    fn call_method(&self, vm: &mut Vm, object: ObjectId, method: &str, args: Vec<Value>) -> Value {
        self.manager.borrow_mut().call_method(vm, object, method, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amlp_compiler::Compiler;
    use std::rc::Rc;

    fn run(vm: &mut Vm, source: &str) -> Value {
        let program = Compiler::compile(source, "t.c");
        assert!(program.is_success(), "{:?}", program.errors);
        let loaded = amlp_loader::load_program(&program).unwrap();
        let indices = vm.load_program(loaded);
        vm.call_function(indices[0], 0).unwrap();
        vm.pop()
    }

    #[test]
    fn e4_efun_dispatch_through_call_opcode() {
        let mut vm = Vm::new();
        vm.set_efun_host(Rc::new(Efuns::new(std::env::temp_dir())));
        let result = run(&mut vm, "int f() { return strlen(\"hello\"); }");
        assert_eq!(result, Value::Int(5));
    }

    #[test]
    fn this_player_reflects_the_bound_session_object() {
        let mut vm = Vm::new();
        let efuns = Efuns::new(std::env::temp_dir());
        let player = efuns.manager_mut().create("/player/bob");
        efuns.set_current_player(Some(player));
        vm.set_efun_host(Rc::new(efuns));
        let result = run(&mut vm, "object f() { return this_player(); }");
        assert_eq!(result, Value::Object(player));
    }

    /// A method body that calls an efun (`CALL_METHOD` dispatch nesting a
    /// `CALL`) only resolves if the efun host stays installed for the whole
    /// of the outer method call — the case the `Rc`-based hosts exist for.
    #[test]
    fn method_body_can_call_an_efun_mid_dispatch() {
        let mut vm = Vm::new();
        let program = Compiler::compile("int greet(string n) { return strlen(n); }", "greeter.lpc");
        assert!(program.is_success(), "{:?}", program.errors);
        let loaded = amlp_loader::load_program(&program).unwrap();
        let indices = vm.load_program(loaded);

        let efuns = Rc::new(Efuns::new(std::env::temp_dir()));
        let object = efuns.manager_mut().create("/obj/greeter");
        efuns.manager_mut().get_mut(object).unwrap().attach_method(indices[0]);
        vm.set_efun_host(efuns.clone() as Rc<dyn amlp_vm::host::EfunHost>);
        vm.set_method_host(efuns.clone() as Rc<dyn amlp_vm::host::MethodHost>);

        let arg = vm.heap.alloc_string("world");
        let arg_id = match &arg {
            Value::String(id) => *id,
            _ => unreachable!(),
        };
        let result = efuns.manager_mut().call_method(&mut vm, object, "greet", vec![arg]);
        assert_eq!(result, Value::Int(5));
        assert_eq!(vm.heap.strings.refcount(arg_id).unwrap(), 1);
    }
}
