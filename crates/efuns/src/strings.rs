//! String efuns (spec §4.8 "Strings"): length, substring, case conversion,
//! trim, explode/implode. Grounded on
//! `examples/original_source/src/efun.c`'s `efun_strlen`/`efun_substring`/
//! `efun_explode`/`efun_implode`/`efun_upper_case`/`efun_lower_case`/
//! `efun_trim`.

use amlp_value::{Heap, Value};
use amlp_vm::{VmError, VmResult};

fn expect_string(heap: &Heap, value: &Value, op: &'static str) -> VmResult<String> {
    match value {
        Value::String(id) => Ok(heap.strings.payload(*id)?.to_string()),
        other => Err(VmError::TypeError { op, found: other.type_name() }),
    }
}

fn expect_int(value: &Value, op: &'static str) -> VmResult<i64> {
    match value {
        Value::Int(i) => Ok(*i),
        other => Err(VmError::TypeError { op, found: other.type_name() }),
    }
}

pub fn strlen(heap: &mut Heap, args: &[Value]) -> VmResult<Value> {
    let s = expect_string(heap, &args[0], "strlen")?;
    Ok(Value::Int(s.chars().count() as i64))
}

/// `substring(str, start, [length])`; a negative or missing length runs to
/// the end of the string, matching the teacher source's `efun_substring`.
pub fn substring(heap: &mut Heap, args: &[Value]) -> VmResult<Value> {
    let s = expect_string(heap, &args[0], "substring")?;
    let start = expect_int(&args[1], "substring")?.max(0) as usize;
    let chars: Vec<char> = s.chars().collect();
    if start >= chars.len() {
        return Ok(heap.alloc_string(""));
    }
    let end = match args.get(2) {
        Some(v) => {
            let len = expect_int(v, "substring")?;
            if len < 0 {
                chars.len()
            } else {
                (start + len as usize).min(chars.len())
            }
        }
        None => chars.len(),
    };
    let slice: String = chars[start..end].iter().collect();
    Ok(heap.alloc_string(slice))
}

pub fn upper_case(heap: &mut Heap, args: &[Value]) -> VmResult<Value> {
    let s = expect_string(heap, &args[0], "upper_case")?;
    Ok(heap.alloc_string(s.to_uppercase()))
}

pub fn lower_case(heap: &mut Heap, args: &[Value]) -> VmResult<Value> {
    let s = expect_string(heap, &args[0], "lower_case")?;
    Ok(heap.alloc_string(s.to_lowercase()))
}

pub fn trim(heap: &mut Heap, args: &[Value]) -> VmResult<Value> {
    let s = expect_string(heap, &args[0], "trim")?;
    Ok(heap.alloc_string(s.trim().to_string()))
}

pub fn explode(heap: &mut Heap, args: &[Value]) -> VmResult<Value> {
    let s = expect_string(heap, &args[0], "explode")?;
    let sep = expect_string(heap, &args[1], "explode")?;
    let parts: Vec<Value> = if sep.is_empty() {
        vec![heap.alloc_string(s)]
    } else {
        s.split(sep.as_str()).map(|p| heap.alloc_string(p)).collect()
    };
    Ok(heap.alloc_array(parts))
}

pub fn implode(heap: &mut Heap, args: &[Value]) -> VmResult<Value> {
    let array = match &args[0] {
        Value::Array(id) => heap.arrays.get(*id)?.to_vec(),
        other => return Err(VmError::TypeError { op: "implode", found: other.type_name() }),
    };
    let sep = expect_string(heap, &args[1], "implode")?;
    let mut parts = Vec::with_capacity(array.len());
    for element in &array {
        parts.push(heap.to_display_string(element)?);
    }
    Ok(heap.alloc_string(parts.join(&sep)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strlen_counts_characters() {
        let mut heap = Heap::new();
        let s = heap.alloc_string("hello");
        assert_eq!(strlen(&mut heap, &[s]).unwrap(), Value::Int(5));
    }

    #[test]
    fn substring_with_omitted_length_runs_to_end() {
        let mut heap = Heap::new();
        let s = heap.alloc_string("hello world");
        let result = substring(&mut heap, &[s, Value::Int(6)]).unwrap();
        assert_eq!(heap.to_display_string(&result).unwrap(), "world");
    }

    #[test]
    fn explode_then_implode_round_trips() {
        let mut heap = Heap::new();
        let s = heap.alloc_string("a,b,c");
        let sep = heap.alloc_string(",");
        let array = explode(&mut heap, &[s, sep.clone()]).unwrap();
        let joined = implode(&mut heap, &[array, sep]).unwrap();
        assert_eq!(heap.to_display_string(&joined).unwrap(), "a,b,c");
    }
}
