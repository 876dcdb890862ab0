//! Output efuns (spec §4.8 "Output"): `write`, `printf`. SPEC_FULL.md's
//! ambient logging section is explicit that these two are "part of the
//! script-visible contract and therefore write to the session's output
//! buffer, not the log" — unlike the teacher source's `efun_write`/
//! `efun_printf`, which print straight to the driver's own stdout. This
//! module only renders text; `Efuns::call` in `host.rs` appends the
//! rendered string to its output buffer, which the session layer drains
//! and forwards to the bound connection after each command dispatch.

use amlp_value::{Heap, Value};
use amlp_vm::VmResult;

pub fn render_write(heap: &Heap, value: &Value) -> VmResult<String> {
    Ok(heap.to_display_string(value)?)
}

/// Renders `printf`'s format string, substituting `%s` placeholders with
/// successive arguments (the teacher source's `efun_printf` only ever
/// echoes the format string; this extends it enough to be useful while
/// keeping the same "simple printf" scope the original comment describes).
pub fn render_printf(heap: &Heap, args: &[Value]) -> VmResult<String> {
    let format = heap.to_display_string(&args[0])?;
    let mut rendered = String::new();
    let mut extra = args[1..].iter();
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '%' && chars.peek() == Some(&'s') {
            chars.next();
            if let Some(value) = extra.next() {
                rendered.push_str(&heap.to_display_string(value)?);
                continue;
            }
        }
        rendered.push(c);
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printf_substitutes_percent_s_placeholders() {
        let heap = Heap::new();
        let mut heap = heap;
        let fmt = heap.alloc_string("hello %s!");
        let name = heap.alloc_string("world");
        let rendered = render_printf(&heap, &[fmt, name]).unwrap();
        assert_eq!(rendered, "hello world!");
    }
}
