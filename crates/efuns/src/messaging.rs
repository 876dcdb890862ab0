//! Messaging efuns (spec §4.8 "Messaging"): `tell_object(target, message)`
//! invokes `receive_message` on the target object. Grounded on
//! `examples/original_source/src/efun.c`'s `efun_tell_object`, which
//! forwards to the object's method dispatch rather than writing to a
//! connection directly — actual delivery to a connected player happens
//! when that object's `receive_message` implementation calls `write`.

use amlp_objects::ObjectManager;
use amlp_value::Value;
use amlp_vm::{Vm, VmError, VmResult};

pub fn tell_object(vm: &mut Vm, manager: &mut ObjectManager, args: &[Value]) -> VmResult<Value> {
    let target = match &args[0] {
        Value::Object(id) => *id,
        other => return Err(VmError::TypeError { op: "tell_object", found: other.type_name() }),
    };
    let message = vm.heap.clone_value(&args[1])?;
    if !matches!(message, Value::String(_)) {
        let _ = vm.heap.release(&message);
        return Err(VmError::TypeError { op: "tell_object", found: args[1].type_name() });
    }
    manager.call_method(vm, target, "receive_message", vec![message]);
    Ok(Value::Int(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tell_object_to_an_object_without_receive_message_still_succeeds() {
        let mut vm = Vm::new();
        let mut manager = ObjectManager::new();
        let target = manager.create("/obj/mute");
        let msg = vm.heap.alloc_string("hello");
        let result = tell_object(&mut vm, &mut manager, &[Value::Object(target), msg]).unwrap();
        assert_eq!(result, Value::Int(1));
    }
}
