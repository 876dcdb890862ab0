//! The VM-resident decoded instruction (spec section 3 "VMInstruction").

use amlp_compiler::opcode::OpCode;

/// One of the operand shapes an instruction can carry, per spec section 3:
/// "opcode plus one of {integer operand, float operand, owned string
/// operand, absolute bytecode address, call operand}".
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    Int(i64),
    Float(f64),
    Str(String),
    /// Local or global slot index (`LOAD_LOCAL`/`STORE_LOCAL`/`LOAD_GLOBAL`/
    /// `STORE_GLOBAL`). Globals may be negative at the VM-opcode level (spec
    /// section 4.6); in practice the compiler always resolves a concrete
    /// non-negative index (see `amlp-compiler`'s DESIGN.md entry), so this
    /// is a plain `i32`.
    SlotIndex(i32),
    /// Resolved instruction index (not byte offset) a jump opcode targets.
    /// The loader translates the compiler's absolute byte address into this
    /// index once, at load time, so the VM's dispatch loop never needs to
    /// re-resolve addresses.
    Addr(usize),
    /// Element/pair count for `MAKE_ARRAY`/`MAKE_MAPPING`.
    Count(u16),
    Call { arg_count: u8, name: String },
    CallMethod { arg_count: u8 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: OpCode,
    pub operand: Operand,
    /// Byte offset of this instruction's opcode byte in the original
    /// bytecode stream; retained for line-map lookups and jump resolution.
    pub byte_offset: usize,
}
