//! Host filesystem efuns (spec §4.8 "I/O to host"): read_file, write_file,
//! file_size, get_dir, mkdir, rm. Every path is resolved under the
//! configured mudlib root via `amlp_io::resolve_under_root` first (spec
//! §4.8 "Path safety"); a rejected path returns the documented failure
//! sentinel rather than propagating an error. Grounded on
//! `examples/original_source/src/efun.c`'s `efun_read_file`/
//! `efun_write_file`/`efun_file_size`/`efun_get_dir`/`efun_mkdir`/
//! `efun_rm`.

use std::path::Path;

use amlp_io::resolve_under_root;
use amlp_value::{Heap, Value};
use amlp_vm::{VmError, VmResult};

fn expect_string(heap: &Heap, value: &Value, op: &'static str) -> VmResult<String> {
    match value {
        Value::String(id) => Ok(heap.strings.payload(*id)?.to_string()),
        other => Err(VmError::TypeError { op, found: other.type_name() }),
    }
}

/// `read_file(path, [start_line, [num_lines]])`. `start_line` is 1-based;
/// an omitted or non-positive value starts at line 1. `num_lines < 0`
/// (or omitted) reads to end of file, matching the teacher source.
pub fn read_file(heap: &mut Heap, root: &Path, args: &[Value]) -> VmResult<Value> {
    let path = expect_string(heap, &args[0], "read_file")?;
    let start_line = args.get(1).and_then(|v| if let Value::Int(i) = v { Some(*i) } else { None }).unwrap_or(1).max(1);
    let num_lines = args.get(2).and_then(|v| if let Value::Int(i) = v { Some(*i) } else { None }).unwrap_or(-1);

    let Some(resolved) = resolve_under_root(root, &path) else {
        return Ok(Value::Null);
    };
    let Ok(contents) = std::fs::read_to_string(&resolved) else {
        return Ok(Value::Null);
    };

    let mut collected = String::new();
    let mut read_count: i64 = 0;
    for (lineno, line) in contents.lines().enumerate() {
        let lineno = (lineno + 1) as i64;
        if lineno < start_line {
            continue;
        }
        if num_lines >= 0 && read_count >= num_lines {
            break;
        }
        collected.push_str(line);
        collected.push('\n');
        read_count += 1;
    }
    Ok(heap.alloc_string(collected))
}

/// `write_file(path, content)`: appends, returning `1` on success and `0`
/// on any failure (path rejection or I/O error).
pub fn write_file(heap: &mut Heap, root: &Path, args: &[Value]) -> VmResult<Value> {
    let path = expect_string(heap, &args[0], "write_file")?;
    let content = expect_string(heap, &args[1], "write_file")?;

    let Some(resolved) = resolve_under_root(root, &path) else {
        return Ok(Value::Int(0));
    };
    let result = std::fs::OpenOptions::new().create(true).append(true).open(&resolved).and_then(|mut f| {
        use std::io::Write;
        f.write_all(content.as_bytes())
    });
    Ok(Value::Int(result.is_ok() as i64))
}

/// `file_size(path)`: `-1` regular file, `-2` directory, `0` absent or
/// rejected (spec §4.8).
pub fn file_size(heap: &mut Heap, root: &Path, args: &[Value]) -> VmResult<Value> {
    let path = expect_string(heap, &args[0], "file_size")?;
    let Some(resolved) = resolve_under_root(root, &path) else {
        return Ok(Value::Int(0));
    };
    let size = match std::fs::metadata(&resolved) {
        Ok(meta) if meta.is_dir() => -2,
        Ok(_) => -1,
        Err(_) => 0,
    };
    Ok(Value::Int(size))
}

pub fn get_dir(heap: &mut Heap, root: &Path, args: &[Value]) -> VmResult<Value> {
    let path = expect_string(heap, &args[0], "get_dir")?;
    let Some(resolved) = resolve_under_root(root, &path) else {
        return Ok(Value::Null);
    };
    let Ok(entries) = std::fs::read_dir(&resolved) else {
        return Ok(Value::Null);
    };
    let mut names = Vec::new();
    for entry in entries.flatten() {
        names.push(heap.alloc_string(entry.file_name().to_string_lossy().into_owned()));
    }
    Ok(heap.alloc_array(names))
}

pub fn mkdir(heap: &mut Heap, root: &Path, args: &[Value]) -> VmResult<Value> {
    let path = expect_string(heap, &args[0], "mkdir")?;
    let Some(resolved) = resolve_under_root(root, &path) else {
        return Ok(Value::Int(0));
    };
    Ok(Value::Int(std::fs::create_dir(&resolved).is_ok() as i64))
}

pub fn rm(heap: &mut Heap, root: &Path, args: &[Value]) -> VmResult<Value> {
    let path = expect_string(heap, &args[0], "rm")?;
    let Some(resolved) = resolve_under_root(root, &path) else {
        return Ok(Value::Int(0));
    };
    Ok(Value::Int(std::fs::remove_file(&resolved).is_ok() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut heap = Heap::new();
        let path = heap.alloc_string("notes.txt");
        let content = heap.alloc_string("line one\nline two\n");
        let written = write_file(&mut heap, dir.path(), &[path.clone(), content]).unwrap();
        assert_eq!(written, Value::Int(1));

        let path = heap.alloc_string("notes.txt");
        let read_back = read_file(&mut heap, dir.path(), &[path]).unwrap();
        assert_eq!(heap.to_display_string(&read_back).unwrap(), "line one\nline two\n");
    }

    #[test]
    fn file_size_distinguishes_dir_file_and_absent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), b"hi").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let mut heap = Heap::new();

        let p = heap.alloc_string("f.txt");
        assert_eq!(file_size(&mut heap, dir.path(), &[p]).unwrap(), Value::Int(-1));
        let p = heap.alloc_string("sub");
        assert_eq!(file_size(&mut heap, dir.path(), &[p]).unwrap(), Value::Int(-2));
        let p = heap.alloc_string("nope");
        assert_eq!(file_size(&mut heap, dir.path(), &[p]).unwrap(), Value::Int(0));
    }

    #[test]
    fn path_traversal_is_rejected_for_every_filesystem_efun() {
        let dir = tempfile::tempdir().unwrap();
        let mut heap = Heap::new();
        let p = heap.alloc_string("../escape.txt");
        assert_eq!(file_size(&mut heap, dir.path(), &[p]).unwrap(), Value::Int(0));
    }
}
