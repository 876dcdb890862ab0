//! Math efuns (spec §4.8 "Math"): abs, sqrt, pow, random, min, max.
//! Grounded on `examples/original_source/src/efun.c`'s `efun_abs`/
//! `efun_sqrt`/`efun_pow`/`efun_random`/`efun_min`/`efun_max`; `random`
//! uses `rand` rather than libc's `rand()`, matching how the other pack
//! repos source entropy.

use amlp_value::Value;
use amlp_vm::{VmError, VmResult};
use rand::Rng;

fn as_f64(value: &Value, op: &'static str) -> VmResult<f64> {
    match value {
        Value::Int(i) => Ok(*i as f64),
        Value::Float(f) => Ok(*f),
        other => Err(VmError::TypeError { op, found: other.type_name() }),
    }
}

pub fn abs(_heap: &mut amlp_value::Heap, args: &[Value]) -> VmResult<Value> {
    match &args[0] {
        Value::Int(i) => Ok(Value::Int(i.abs())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(VmError::TypeError { op: "abs", found: other.type_name() }),
    }
}

pub fn sqrt(_heap: &mut amlp_value::Heap, args: &[Value]) -> VmResult<Value> {
    Ok(Value::Float(as_f64(&args[0], "sqrt")?.sqrt()))
}

pub fn pow(_heap: &mut amlp_value::Heap, args: &[Value]) -> VmResult<Value> {
    let base = as_f64(&args[0], "pow")?;
    let exp = as_f64(&args[1], "pow")?;
    Ok(Value::Float(base.powf(exp)))
}

/// `random(n)`: a uniformly distributed integer in `[0, n)`, matching the
/// teacher source's `efun_random` bound convention. `n <= 0` yields `0`.
pub fn random(_heap: &mut amlp_value::Heap, args: &[Value]) -> VmResult<Value> {
    let bound = match &args[0] {
        Value::Int(i) => *i,
        other => return Err(VmError::TypeError { op: "random", found: other.type_name() }),
    };
    if bound <= 0 {
        return Ok(Value::Int(0));
    }
    Ok(Value::Int(rand::thread_rng().gen_range(0..bound)))
}

pub fn min(_heap: &mut amlp_value::Heap, args: &[Value]) -> VmResult<Value> {
    fold_numeric(args, "min", |a, b| if a <= b { a } else { b })
}

pub fn max(_heap: &mut amlp_value::Heap, args: &[Value]) -> VmResult<Value> {
    fold_numeric(args, "max", |a, b| if a >= b { a } else { b })
}

fn fold_numeric(args: &[Value], op: &'static str, pick: impl Fn(f64, f64) -> f64) -> VmResult<Value> {
    let mut all_int = true;
    let mut acc = as_f64(&args[0], op)?;
    if !matches!(args[0], Value::Int(_)) {
        all_int = false;
    }
    for arg in &args[1..] {
        if !matches!(arg, Value::Int(_)) {
            all_int = false;
        }
        acc = pick(acc, as_f64(arg, op)?);
    }
    if all_int {
        Ok(Value::Int(acc as i64))
    } else {
        Ok(Value::Float(acc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amlp_value::Heap;

    #[test]
    fn abs_handles_negative_int_and_float() {
        let mut heap = Heap::new();
        assert_eq!(abs(&mut heap, &[Value::Int(-5)]).unwrap(), Value::Int(5));
        assert_eq!(abs(&mut heap, &[Value::Float(-2.5)]).unwrap(), Value::Float(2.5));
    }

    #[test]
    fn random_zero_bound_is_always_zero() {
        let mut heap = Heap::new();
        assert_eq!(random(&mut heap, &[Value::Int(0)]).unwrap(), Value::Int(0));
    }

    #[test]
    fn min_max_preserve_int_type_when_all_args_are_int() {
        let mut heap = Heap::new();
        assert_eq!(min(&mut heap, &[Value::Int(3), Value::Int(1), Value::Int(2)]).unwrap(), Value::Int(1));
        assert_eq!(max(&mut heap, &[Value::Int(3), Value::Int(1), Value::Int(2)]).unwrap(), Value::Int(3));
    }
}
