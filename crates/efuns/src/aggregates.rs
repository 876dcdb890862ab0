//! Aggregate efuns (spec §4.8 "Aggregates"): size, type predicates, sort,
//! reverse. Grounded on `examples/original_source/src/efun.c`'s
//! `efun_sizeof`/`efun_*p`/`efun_sort_array`/`efun_reverse_array`.

use amlp_value::{Heap, Value};
use amlp_vm::{VmError, VmResult};

pub fn sizeof(heap: &mut Heap, args: &[Value]) -> VmResult<Value> {
    let size = match &args[0] {
        Value::String(id) => heap.strings.payload(*id)?.chars().count(),
        Value::Array(id) => heap.arrays.len(*id)?,
        Value::Mapping(id) => heap.mappings.len(*id)?,
        other => return Err(VmError::TypeError { op: "sizeof", found: other.type_name() }),
    };
    Ok(Value::Int(size as i64))
}

fn predicate(value: &Value, matches: impl Fn(&Value) -> bool) -> Value {
    Value::Int(matches(value) as i64)
}

pub fn intp(_heap: &mut Heap, args: &[Value]) -> VmResult<Value> {
    Ok(predicate(&args[0], |v| matches!(v, Value::Int(_))))
}

pub fn floatp(_heap: &mut Heap, args: &[Value]) -> VmResult<Value> {
    Ok(predicate(&args[0], |v| matches!(v, Value::Float(_))))
}

pub fn stringp(_heap: &mut Heap, args: &[Value]) -> VmResult<Value> {
    Ok(predicate(&args[0], |v| matches!(v, Value::String(_))))
}

pub fn arrayp(_heap: &mut Heap, args: &[Value]) -> VmResult<Value> {
    Ok(predicate(&args[0], |v| matches!(v, Value::Array(_))))
}

pub fn mappingp(_heap: &mut Heap, args: &[Value]) -> VmResult<Value> {
    Ok(predicate(&args[0], |v| matches!(v, Value::Mapping(_))))
}

pub fn objectp(_heap: &mut Heap, args: &[Value]) -> VmResult<Value> {
    Ok(predicate(&args[0], |v| matches!(v, Value::Object(_))))
}

/// Sorts by the driver's default ordering: numeric values by value, strings
/// lexicographically, heterogeneous elements by their `type_name` to keep
/// the comparator total (spec doesn't mandate a collation beyond "sort";
/// the original `efun_sort_array` only ever sorts homogeneous int arrays).
pub fn sort_array(heap: &mut Heap, args: &[Value]) -> VmResult<Value> {
    let id = match &args[0] {
        Value::Array(id) => *id,
        other => return Err(VmError::TypeError { op: "sort_array", found: other.type_name() }),
    };
    let mut elements = heap.arrays.get(id)?.to_vec();
    elements.sort_by(|a, b| compare_for_sort(heap, a, b));
    // Both the source array and this freshly allocated one now reference
    // the same string payloads, so each element needs its own refcount.
    let mut owned = Vec::with_capacity(elements.len());
    for element in &elements {
        owned.push(heap.clone_value(element)?);
    }
    Ok(heap.alloc_array(owned))
}

fn compare_for_sort(heap: &Heap, a: &Value, b: &Value) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Int(x), Value::Float(y)) => (*x as f64).partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Float(x), Value::Int(y)) => x.partial_cmp(&(*y as f64)).unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => {
            let (sx, sy) = (heap.strings.payload(*x), heap.strings.payload(*y));
            match (sx, sy) {
                (Ok(sx), Ok(sy)) => sx.cmp(sy),
                _ => Ordering::Equal,
            }
        }
        _ => a.type_name().cmp(b.type_name()),
    }
}

pub fn reverse_array(heap: &mut Heap, args: &[Value]) -> VmResult<Value> {
    let id = match &args[0] {
        Value::Array(id) => *id,
        other => return Err(VmError::TypeError { op: "reverse_array", found: other.type_name() }),
    };
    let elements = heap.arrays.get(id)?.to_vec();
    let mut owned = Vec::with_capacity(elements.len());
    for element in elements.iter().rev() {
        owned.push(heap.clone_value(element)?);
    }
    Ok(heap.alloc_array(owned))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizeof_reports_array_length() {
        let mut heap = Heap::new();
        let arr = heap.alloc_array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(sizeof(&mut heap, &[arr]).unwrap(), Value::Int(3));
    }

    #[test]
    fn sort_array_orders_integers_ascending() {
        let mut heap = Heap::new();
        let arr = heap.alloc_array(vec![Value::Int(3), Value::Int(1), Value::Int(2)]);
        let sorted = sort_array(&mut heap, &[arr]).unwrap();
        let id = match sorted {
            Value::Array(id) => id,
            _ => unreachable!(),
        };
        assert_eq!(heap.arrays.get(id).unwrap(), &[Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn reverse_array_flips_order() {
        let mut heap = Heap::new();
        let arr = heap.alloc_array(vec![Value::Int(1), Value::Int(2)]);
        let reversed = reverse_array(&mut heap, &[arr]).unwrap();
        let id = match reversed {
            Value::Array(id) => id,
            _ => unreachable!(),
        };
        assert_eq!(heap.arrays.get(id).unwrap(), &[Value::Int(2), Value::Int(1)]);
    }
}
