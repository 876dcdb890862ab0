//! Tracing & debug hooks (spec section 4.6): a `debug_flags` bitmask gating
//! four orthogonal traces, plus a simple allocation profiler. Grounded in
//! the teacher's `call_flags.rs` (bitflags over an execution concern) and
//! `metrics.rs` (counter bookkeeping) idioms.

use bitflags::bitflags;
use std::collections::HashMap;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DebugFlags: u8 {
        /// Per-instruction trace: opcode, function, source line.
        const TRACE_INSTRUCTIONS = 0b0001;
        /// Operand stack snapshot after each instruction.
        const TRACE_STACK        = 0b0010;
        /// Locals snapshot after each instruction.
        const TRACE_LOCALS       = 0b0100;
        /// Call-stack dump when a dispatch produces a `VmError`.
        const TRACE_CALL_STACK_ON_ERROR = 0b1000;
    }
}

/// Counts `Value` constructions and frees by variant, plus total string
/// bytes allocated versus freed (spec section 4.6 "A simple profiler...").
#[derive(Debug, Default, Clone)]
pub struct Profiler {
    pub constructed: HashMap<&'static str, u64>,
    pub freed: HashMap<&'static str, u64>,
    pub string_bytes_allocated: u64,
    pub string_bytes_freed: u64,
}

impl Profiler {
    pub fn note_construct(&mut self, type_name: &'static str) {
        *self.constructed.entry(type_name).or_insert(0) += 1;
    }

    pub fn note_free(&mut self, type_name: &'static str) {
        *self.freed.entry(type_name).or_insert(0) += 1;
    }

    pub fn note_string_alloc(&mut self, bytes: usize) {
        self.string_bytes_allocated += bytes as u64;
    }

    pub fn note_string_free(&mut self, bytes: usize) {
        self.string_bytes_freed += bytes as u64;
    }
}
