//! Call frame management (spec section 3 "CallFrame", section 4.6 "Frame
//! management").

use amlp_value::Value;

/// One activation record. `amlp-vm::Vm` keeps these in a plain `Vec` rather
/// than a linked list (spec's "link to previous frame" is just "the frame
/// below this one on `Vm::frames`" here); nothing needs frame identity
/// beyond its position in that stack.
#[derive(Debug)]
pub struct CallFrame {
    /// Index into `Vm::functions`, or `None` for the synthetic frame that
    /// runs the top-level instruction stream (spec section 4.6's `execute`).
    pub function_index: Option<usize>,
    /// `local_variables[param_count + local_count]`, slots initialized to
    /// `Value::Uninitialized` and arguments copied into `[0, param_count)`.
    pub locals: Vec<Value>,
    pub ip: usize,
    /// Index into `Vm`'s operand stack marking this frame's base; a
    /// `RETURN` leaves at most one value above this index.
    pub stack_base: usize,
}

impl CallFrame {
    pub fn new(function_index: Option<usize>, locals: Vec<Value>, stack_base: usize) -> Self {
        CallFrame { function_index, locals, ip: 0, stack_base }
    }
}
