//! Runtime (VM) error kinds, spec section 7 "Runtime (VM)":
//! "unknown opcode, stack underflow, local-index out of range, arity
//! mismatch at call, arithmetic on incompatible variants, aggregate
//! indexing type mismatch." Recovery is local: every dispatch site that can
//! fail surfaces a `VmError`, the VM bumps its error counter, and
//! `amlp-vm::Vm::dispatch_one` returns `Err` without unwinding past the
//! current call — the caller (session layer or an efun) decides whether
//! that collapses to `Value::Null`, matching spec section 7's "a Null
//! result as built-in fallback, not an exceptional condition".

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VmError {
    #[error("stack underflow")]
    StackUnderflow,

    #[error("local index {index} out of range (valid range is [0, {bound}))")]
    LocalIndexOutOfRange { index: i32, bound: usize },

    #[error("global index {index} out of range (global count is {bound})")]
    GlobalIndexOutOfRange { index: i32, bound: usize },

    #[error("no active call frame")]
    NoActiveFrame,

    #[error("type error in {op}: cannot operate on a {found} value")]
    TypeError { op: &'static str, found: &'static str },

    #[error("unknown function or efun '{name}'")]
    UnknownCallable { name: String },

    #[error("'{name}' expects {expected} argument(s), got {got}")]
    ArityMismatch { name: String, expected: String, got: usize },

    #[error("function index {index} out of range (function count is {bound})")]
    FunctionIndexOutOfRange { index: usize, bound: usize },

    #[error("decoding error: {0}")]
    Load(#[from] amlp_loader::LoadError),

    #[error("value heap error: {0}")]
    Value(#[from] amlp_value::ValueError),

    #[error("object dispatch is not wired into this VM instance")]
    NoMethodHost,
}

pub type VmResult<T> = Result<T, VmError>;
