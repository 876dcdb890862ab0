//! Bytecode opcode set (spec section 4.4/4.6), one byte per opcode.
//!
//! Operand encodings (all little-endian, per the internal wire format in
//! spec section 6):
//!
//! | Opcode | Operand |
//! |---|---|
//! | `PUSH_INT` | `i64` |
//! | `PUSH_FLOAT` | `f64` |
//! | `PUSH_STRING` | `u16` length, then payload bytes |
//! | `LOAD_LOCAL` / `STORE_LOCAL` | `u16` index |
//! | `LOAD_GLOBAL` / `STORE_GLOBAL` | `i32` index (negative = allocate fresh global) |
//! | `JUMP` / `JUMP_IF_FALSE` / `JUMP_IF_TRUE` | `i32` absolute bytecode address |
//! | `CALL` | `u8` arg count, `u8` name length, name bytes |
//! | `CALL_METHOD` | `u8` arg count |
//! | `MAKE_ARRAY` / `MAKE_MAPPING` | `u16` element/pair count |
//! | everything else | none |

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    PushInt = 0,
    PushFloat = 1,
    PushString = 2,
    PushNull = 3,
    Pop = 4,
    Dup = 5,

    LoadLocal = 6,
    StoreLocal = 7,
    LoadGlobal = 8,
    StoreGlobal = 9,

    Add = 10,
    Sub = 11,
    Mul = 12,
    Div = 13,
    Mod = 14,
    Neg = 15,

    Eq = 16,
    Ne = 17,
    Lt = 18,
    Le = 19,
    Gt = 20,
    Ge = 21,

    And = 22,
    Or = 23,
    Not = 24,

    BitAnd = 25,
    BitOr = 26,
    BitXor = 27,
    BitNot = 28,
    LShift = 29,
    RShift = 30,

    Jump = 31,
    JumpIfFalse = 32,
    JumpIfTrue = 33,

    Call = 34,
    Return = 35,

    MakeArray = 36,
    /// Generic subscript read. The language has no static type system, so
    /// the compiler cannot tell at a `base[index]` site whether `base` will
    /// hold an array or a mapping at run time; `IndexArray`/`StoreArray` are
    /// therefore the only opcodes the compiler emits for subscript
    /// expressions, and the VM dispatches on the run-time tag of the popped
    /// base value (see amlp-vm). `IndexMapping`/`StoreMapping` stay in the
    /// set for completeness but are currently unreachable from generated
    /// code.
    IndexArray = 37,
    StoreArray = 38,

    MakeMapping = 39,
    IndexMapping = 40,
    StoreMapping = 41,

    CallMethod = 42,

    Halt = 43,
    Print = 44,
}

impl OpCode {
    pub fn from_byte(byte: u8) -> Option<OpCode> {
        use OpCode::*;
        Some(match byte {
            0 => PushInt,
            1 => PushFloat,
            2 => PushString,
            3 => PushNull,
            4 => Pop,
            5 => Dup,
            6 => LoadLocal,
            7 => StoreLocal,
            8 => LoadGlobal,
            9 => StoreGlobal,
            10 => Add,
            11 => Sub,
            12 => Mul,
            13 => Div,
            14 => Mod,
            15 => Neg,
            16 => Eq,
            17 => Ne,
            18 => Lt,
            19 => Le,
            20 => Gt,
            21 => Ge,
            22 => And,
            23 => Or,
            24 => Not,
            25 => BitAnd,
            26 => BitOr,
            27 => BitXor,
            28 => BitNot,
            29 => LShift,
            30 => RShift,
            31 => Jump,
            32 => JumpIfFalse,
            33 => JumpIfTrue,
            34 => Call,
            35 => Return,
            36 => MakeArray,
            37 => IndexArray,
            38 => StoreArray,
            39 => MakeMapping,
            40 => IndexMapping,
            41 => StoreMapping,
            42 => CallMethod,
            43 => Halt,
            44 => Print,
            _ => return None,
        })
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_opcode_round_trips_through_its_byte() {
        for byte in 0..=44u8 {
            let op = OpCode::from_byte(byte).unwrap();
            assert_eq!(op.as_byte(), byte);
        }
        assert!(OpCode::from_byte(45).is_none());
    }
}
