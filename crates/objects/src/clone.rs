//! `clone_object` (spec section 4.7): compiles an LPC-style source file
//! under the mudlib root, loads it into the VM's function table, registers
//! a fresh `Object`, attaches its top-level functions as methods, and
//! invokes `create()` if the file defines one.

use std::path::Path;

use amlp_compiler::Compiler;
use amlp_value::Value;
use amlp_vm::Vm;

use crate::manager::ObjectManager;

/// Resolves `lpc_path` under `root`, compiles and loads it, and returns the
/// cloned object as `Value::Object`, or `Value::Null` on any failure along
/// the way (spec section 4.7: "any failure in this pipeline yields Null
/// rather than propagating a VM error").
pub fn clone_object(vm: &mut Vm, manager: &mut ObjectManager, root: &Path, lpc_path: &str) -> Value {
    let relative = lpc_path.trim_start_matches('/');
    let candidate = format!("{relative}.lpc");

    let Some(resolved) = amlp_io::resolve_under_root(root, &candidate) else {
        tracing::warn!(target: "objects", path = lpc_path, "clone_object: path rejected by sandbox");
        return Value::Null;
    };

    let source = match std::fs::read_to_string(&resolved) {
        Ok(s) => s,
        Err(error) => {
            tracing::warn!(target: "objects", path = %resolved.display(), %error, "clone_object: read failed");
            return Value::Null;
        }
    };

    let program = Compiler::compile(&source, &resolved.display().to_string());
    if !program.is_success() {
        tracing::warn!(
            target: "objects", path = %resolved.display(), errors = ?program.errors,
            "clone_object: compile failed"
        );
        return Value::Null;
    }

    let loaded = match amlp_loader::load_program(&program) {
        Ok(loaded) => loaded,
        Err(error) => {
            tracing::warn!(target: "objects", path = %resolved.display(), %error, "clone_object: load failed");
            return Value::Null;
        }
    };

    let function_names: Vec<_> = loaded.functions.iter().map(|f| f.name.clone()).collect();
    let indices = vm.load_program(loaded);

    let id = manager.create(lpc_path.to_string());
    for (name, index) in function_names.iter().zip(indices.iter()) {
        let _ = name;
        manager.get_mut(id).unwrap().attach_method(*index);
    }

    if manager.resolve_method(vm, id, "create").is_some() {
        let _ = manager.call_method(vm, id, "create", Vec::new());
    }

    Value::Object(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_object_runs_create_and_registers_methods() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("widget.lpc"),
            "int calls; void create() { calls = 1; } int get_calls() { return calls; }",
        )
        .unwrap();

        let mut vm = Vm::new();
        let mut manager = ObjectManager::new();
        let result = clone_object(&mut vm, &mut manager, dir.path(), "/widget");
        let id = match result {
            Value::Object(id) => id,
            other => panic!("expected Value::Object, got {other:?}"),
        };
        assert!(manager.resolve_method(&vm, id, "create").is_some());
        assert!(manager.resolve_method(&vm, id, "get_calls").is_some());
    }

    #[test]
    fn clone_object_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let mut vm = Vm::new();
        let mut manager = ObjectManager::new();
        let result = clone_object(&mut vm, &mut manager, dir.path(), "../etc/passwd");
        assert_eq!(result, Value::Null);
    }

    #[test]
    fn clone_object_returns_null_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut vm = Vm::new();
        let mut manager = ObjectManager::new();
        let result = clone_object(&mut vm, &mut manager, dir.path(), "/nope");
        assert_eq!(result, Value::Null);
    }
}
