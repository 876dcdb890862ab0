//! Decodes a compiled `Program`'s byte stream into VM-resident instructions
//! and function records (spec section 4.5).

use std::collections::HashMap;
use std::rc::Rc;

use amlp_compiler::opcode::OpCode;
use amlp_compiler::program::Program;
use amlp_io::BinaryReader;
use amlp_value::Value;

use crate::error::{LoadError, LoadResult};
use crate::function::VMFunction;
use crate::instruction::{Instruction, Operand};

/// The fully decoded result of loading a `Program`: a flat instruction
/// stream (spec's "top-level bytecode", run directly by `execute()` when a
/// program declares no functions) plus the per-function slices carved out
/// of it, the VM's initial global values and the string constant pool.
#[derive(Debug, Clone)]
pub struct LoadedProgram {
    pub top_level: Vec<Instruction>,
    pub functions: Vec<VMFunction>,
    /// Global name plus its initial value, in declaration order (spec
    /// section 4.5 step 2: "initialize them from the descriptor table").
    pub globals: Vec<(String, Value)>,
    pub constants: Vec<String>,
}

/// Step 1 of spec section 4.5: a single linear pass over the whole
/// bytecode array, decoding every instruction regardless of which function
/// (if any) it belongs to. Returns the flat instruction list alongside a
/// byte-offset -> instruction-index map used both to carve out function
/// ranges (step 3) and to translate jump targets from byte addresses to
/// instruction indices.
fn decode_flat(bytecode: &[u8]) -> LoadResult<(Vec<Instruction>, HashMap<usize, usize>)> {
    let mut reader = BinaryReader::new(bytecode.to_vec());
    let mut instructions = Vec::new();
    let mut offset_to_index = HashMap::new();

    while !reader.is_eof() {
        let byte_offset = reader.position();
        let byte = reader.read_u8()?;
        let opcode = OpCode::from_byte(byte)
            .ok_or(LoadError::UnknownOpcode { opcode: byte, offset: byte_offset })?;

        let operand = match opcode {
            OpCode::PushInt => Operand::Int(reader.read_i64()?),
            OpCode::PushFloat => Operand::Float(reader.read_f64()?),
            OpCode::PushString => Operand::Str(reader.read_u16_string()?),
            OpCode::LoadLocal | OpCode::StoreLocal => Operand::SlotIndex(reader.read_u16()? as i32),
            OpCode::LoadGlobal | OpCode::StoreGlobal => Operand::SlotIndex(reader.read_i32()?),
            OpCode::Jump | OpCode::JumpIfFalse | OpCode::JumpIfTrue => {
                Operand::Addr(reader.read_i32()? as usize)
            }
            OpCode::Call => {
                let arg_count = reader.read_u8()?;
                let name = reader.read_u8_string()?;
                Operand::Call { arg_count, name }
            }
            OpCode::CallMethod => Operand::CallMethod { arg_count: reader.read_u8()? },
            OpCode::MakeArray | OpCode::MakeMapping => Operand::Count(reader.read_u16()?),
            OpCode::PushNull
            | OpCode::Pop
            | OpCode::Dup
            | OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::Mod
            | OpCode::Neg
            | OpCode::Eq
            | OpCode::Ne
            | OpCode::Lt
            | OpCode::Le
            | OpCode::Gt
            | OpCode::Ge
            | OpCode::And
            | OpCode::Or
            | OpCode::Not
            | OpCode::BitAnd
            | OpCode::BitOr
            | OpCode::BitXor
            | OpCode::BitNot
            | OpCode::LShift
            | OpCode::RShift
            | OpCode::Return
            | OpCode::IndexArray
            | OpCode::StoreArray
            | OpCode::IndexMapping
            | OpCode::StoreMapping
            | OpCode::Halt
            | OpCode::Print => Operand::None,
        };

        offset_to_index.insert(byte_offset, instructions.len());
        instructions.push(Instruction { opcode, operand, byte_offset });
    }

    Ok((instructions, offset_to_index))
}

/// Translates every jump instruction's `Operand::Addr` from a byte address
/// to the instruction index that address denotes.
fn resolve_jumps(instructions: &mut [Instruction], offset_to_index: &HashMap<usize, usize>) -> LoadResult<()> {
    for instr in instructions.iter_mut() {
        if let Operand::Addr(byte_target) = instr.operand {
            let idx = offset_to_index
                .get(&byte_target)
                .copied()
                .ok_or(LoadError::BadJumpTarget { target: byte_target })?;
            instr.operand = Operand::Addr(idx);
        }
    }
    Ok(())
}

/// Finds the index of the first instruction whose byte offset is >= `end`,
/// or `instructions.len()` if every instruction starts before `end`.
fn index_at_or_after(instructions: &[Instruction], end: usize) -> usize {
    instructions.partition_point(|instr| instr.byte_offset < end)
}

/// Loads `program` per spec section 4.5. On any decoding error, nothing is
/// partially registered anywhere: the caller receives `Err` and the VM (if
/// any) is untouched, matching "the VM is left in the state it was in
/// before the load".
pub fn load_program(program: &Program) -> LoadResult<LoadedProgram> {
    let (mut instructions, offset_to_index) = decode_flat(&program.bytecode)?;
    resolve_jumps(&mut instructions, &offset_to_index)?;

    let mut functions = Vec::with_capacity(program.functions.len());
    for (i, descriptor) in program.functions.iter().enumerate() {
        let start_idx = *offset_to_index
            .get(&descriptor.offset)
            .ok_or_else(|| LoadError::BadFunctionOffset { name: descriptor.name.clone(), offset: descriptor.offset })?;
        let end_byte = program
            .functions
            .get(i + 1)
            .map(|next| next.offset)
            .unwrap_or(program.bytecode.len());
        let end_idx = index_at_or_after(&instructions, end_byte);

        if end_idx <= start_idx {
            return Err(LoadError::EmptyFunctionBody { name: descriptor.name.clone() });
        }

        let slice = &instructions[start_idx..end_idx];
        let line_numbers = slice.iter().map(|instr| program.line_for_offset(instr.byte_offset)).collect();

        functions.push(VMFunction {
            name: Rc::from(descriptor.name.as_str()),
            param_count: descriptor.param_count,
            local_count: descriptor.local_count,
            instructions: slice.to_vec(),
            source_file: program.filename.clone(),
            line_numbers,
        });
    }

    let globals = program.globals.iter().map(|g| (g.name.clone(), Value::Int(0))).collect();

    Ok(LoadedProgram { top_level: instructions, functions, globals, constants: program.constants.clone() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use amlp_compiler::compiler::Compiler;

    #[test]
    fn decodes_one_function_per_descriptor_with_nonempty_bodies() {
        let prog = Compiler::compile(
            "int add(int a, int b) { return a + b; } int sub(int a, int b) { return a - b; }",
            "t.c",
        );
        assert!(prog.is_success(), "{:?}", prog.errors);
        let loaded = load_program(&prog).unwrap();
        assert_eq!(loaded.functions.len(), 2);
        assert_eq!(loaded.functions[0].name.as_ref(), "add");
        assert_eq!(loaded.functions[1].name.as_ref(), "sub");
        for f in &loaded.functions {
            assert!(!f.instructions.is_empty());
            assert_eq!(f.instructions.len(), f.line_numbers.len());
        }
    }

    #[test]
    fn while_loop_jump_targets_resolve_to_instruction_indices_in_range() {
        let prog = Compiler::compile(
            "void loop() { int i; i = 0; while (i < 3) { i = i + 1; } }",
            "t.c",
        );
        assert!(prog.is_success(), "{:?}", prog.errors);
        let loaded = load_program(&prog).unwrap();
        let f = &loaded.functions[0];
        for instr in &f.instructions {
            if let Operand::Addr(idx) = instr.operand {
                assert!(idx <= f.instructions.len());
            }
        }
    }

    #[test]
    fn globals_are_initialized_to_int_zero() {
        let prog = Compiler::compile("int counter = 5; void bump() { counter = counter + 1; }", "t.c");
        let loaded = load_program(&prog).unwrap();
        assert_eq!(loaded.globals.len(), 1);
        assert_eq!(loaded.globals[0], ("counter".to_string(), Value::Int(0)));
    }

    #[test]
    fn program_with_no_functions_decodes_a_top_level_fallback() {
        let prog = Compiler::compile("int unused = 1;", "t.c");
        assert!(prog.is_success(), "{:?}", prog.errors);
        let loaded = load_program(&prog).unwrap();
        assert!(loaded.functions.is_empty());
        assert!(!loaded.top_level.is_empty());
    }
}
