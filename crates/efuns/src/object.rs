//! Object/player efuns (spec §4.8): clone_object, find_object, call_other,
//! present, environment, move_object, this_player, file_name. `environment`
//! here is just a conventional property name (`"environment"`) set by
//! `move_object` and read by `environment`/`present` — the object model
//! itself has no dedicated environment/inventory field, matching
//! `examples/original_source/src/efun.c`'s `obj_get_prop(o, "environment")`
//! convention.

use std::path::Path;

use amlp_objects::ObjectManager;
use amlp_value::{ObjectId, Value};
use amlp_vm::{Vm, VmError, VmResult};

pub const ENVIRONMENT_PROPERTY: &str = "environment";

pub fn clone_object(vm: &mut Vm, manager: &mut ObjectManager, root: &Path, args: &[Value]) -> VmResult<Value> {
    let path = match &args[0] {
        Value::String(id) => vm.heap.strings.payload(*id)?.to_string(),
        other => return Err(VmError::TypeError { op: "clone_object", found: other.type_name() }),
    };
    Ok(amlp_objects::clone_object(vm, manager, root, &path))
}

pub fn find_object(vm: &mut Vm, manager: &ObjectManager, args: &[Value]) -> VmResult<Value> {
    let name = match &args[0] {
        Value::String(id) => vm.heap.strings.payload(*id)?.to_string(),
        other => return Err(VmError::TypeError { op: "find_object", found: other.type_name() }),
    };
    Ok(manager.find_by_name(&name).map(Value::Object).unwrap_or(Value::Null))
}

fn resolve_target(vm: &Vm, manager: &ObjectManager, value: &Value) -> VmResult<Option<ObjectId>> {
    match value {
        Value::Object(id) => Ok(Some(*id)),
        Value::String(id) => {
            let name = vm.heap.strings.payload(*id)?;
            Ok(manager.find_by_name(name))
        }
        _ => Ok(None),
    }
}

/// `call_other(target, method, ...args)`: reflectively invokes `method` on
/// `target` (an object reference or a path string resolved by name). Args
/// past the first two are cloned through `vm.heap` since the caller's copy
/// on the VM stack still needs its own refcount.
pub fn call_other(vm: &mut Vm, manager: &mut ObjectManager, args: &[Value]) -> VmResult<Value> {
    let Some(target) = resolve_target(vm, manager, &args[0])? else {
        return Ok(Value::Null);
    };
    let method = match &args[1] {
        Value::String(id) => vm.heap.strings.payload(*id)?.to_string(),
        other => return Err(VmError::TypeError { op: "call_other", found: other.type_name() }),
    };
    let mut call_args = Vec::with_capacity(args.len() - 2);
    for arg in &args[2..] {
        call_args.push(vm.heap.clone_value(arg)?);
    }
    Ok(manager.call_method(vm, target, &method, call_args))
}

/// `present(id, [environment])`: finds a live object named `id`, optionally
/// restricted to those whose `"environment"` property points at `environment`.
pub fn present(vm: &mut Vm, manager: &ObjectManager, args: &[Value]) -> VmResult<Value> {
    let id = match &args[0] {
        Value::String(sid) => vm.heap.strings.payload(*sid)?.to_string(),
        other => return Err(VmError::TypeError { op: "present", found: other.type_name() }),
    };
    let environment = match args.get(1) {
        Some(Value::Object(oid)) => Some(*oid),
        Some(other) => return Err(VmError::TypeError { op: "present", found: other.type_name() }),
        None => None,
    };

    let found = manager.find_by_name(&id).filter(|&candidate| {
        let Some(env_filter) = environment else { return true };
        matches!(
            manager.resolve_property(candidate, ENVIRONMENT_PROPERTY),
            Some(Value::Object(actual)) if actual == env_filter
        )
    });
    Ok(found.map(Value::Object).unwrap_or(Value::Null))
}

pub fn environment(_vm: &mut Vm, manager: &ObjectManager, args: &[Value]) -> VmResult<Value> {
    let id = match &args[0] {
        Value::Object(id) => *id,
        other => return Err(VmError::TypeError { op: "environment", found: other.type_name() }),
    };
    Ok(manager.resolve_property(id, ENVIRONMENT_PROPERTY).unwrap_or(Value::Null))
}

/// `move_object(src, dst)`: sets `src`'s `"environment"` property to `dst`.
pub fn move_object(_vm: &mut Vm, manager: &mut ObjectManager, args: &[Value]) -> VmResult<Value> {
    let (src, dst) = match (&args[0], &args[1]) {
        (Value::Object(a), Value::Object(b)) => (*a, *b),
        _ => return Ok(Value::Int(0)),
    };
    let Some(object) = manager.get_mut(src) else {
        return Ok(Value::Int(0));
    };
    if let Some(old) = object.set_property(ENVIRONMENT_PROPERTY, Value::Object(dst)) {
        // Stale environment link held no heap payload, nothing to release.
        let _ = old;
    }
    Ok(Value::Int(1))
}

/// `this_player()`: the session-bound object set by the session
/// multiplexer around each dispatch (spec §4.9), threaded in here rather
/// than read from a global to keep this crate free of session-layer state.
pub fn this_player(current: Option<ObjectId>) -> Value {
    current.map(Value::Object).unwrap_or(Value::Null)
}

pub fn file_name(vm: &mut Vm, manager: &ObjectManager, args: &[Value]) -> VmResult<Value> {
    let id = match &args[0] {
        Value::Object(id) => *id,
        other => return Err(VmError::TypeError { op: "file_name", found: other.type_name() }),
    };
    Ok(match manager.get(id) {
        Some(object) => vm.heap.alloc_string(object.name.clone()),
        None => vm.heap.alloc_string(""),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_object_sets_environment_and_environment_reads_it_back() {
        let mut vm = Vm::new();
        let mut manager = ObjectManager::new();
        let room = manager.create("/room/start");
        let player = manager.create("/player/bob");
        assert_eq!(move_object(&mut vm, &mut manager, &[Value::Object(player), Value::Object(room)]).unwrap(), Value::Int(1));
        assert_eq!(environment(&mut vm, &manager, &[Value::Object(player)]).unwrap(), Value::Object(room));
    }

    #[test]
    fn present_filters_by_environment_when_given() {
        let mut vm = Vm::new();
        let mut manager = ObjectManager::new();
        let room = manager.create("/room/start");
        let other_room = manager.create("/room/other");
        let sword = manager.create("sword");
        manager.get_mut(sword).unwrap().set_property(ENVIRONMENT_PROPERTY, Value::Object(room));

        let id = vm.heap.alloc_string("sword");
        let name = match &id { Value::String(sid) => *sid, _ => unreachable!() };
        let _ = name;
        let found = present(&mut vm, &manager, &[id.clone(), Value::Object(room)]).unwrap();
        assert_eq!(found, Value::Object(sword));
        let not_found = present(&mut vm, &manager, &[id, Value::Object(other_room)]).unwrap();
        assert_eq!(not_found, Value::Null);
    }
}
