//! The stack-based virtual machine (component C6, spec section 4.6).

use std::rc::Rc;

use amlp_loader::{Instruction, LoadedProgram, Operand, VMFunction};
use amlp_value::{Heap, ObjectId, Value};

use crate::debug::{DebugFlags, Profiler};
use crate::error::{VmError, VmResult};
use crate::frame::CallFrame;
use crate::host::{EfunHost, MethodHost};

pub struct Vm {
    pub heap: Heap,
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    globals: Vec<Value>,
    global_names: Vec<String>,
    functions: Vec<VMFunction>,
    top_level: Vec<Instruction>,
    constants: Vec<String>,
    running: bool,
    error_count: u64,
    pub debug_flags: DebugFlags,
    pub profiler: Profiler,
    efun_host: Option<Rc<dyn EfunHost>>,
    method_host: Option<Rc<dyn MethodHost>>,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        Vm {
            heap: Heap::new(),
            stack: Vec::new(),
            frames: Vec::new(),
            globals: Vec::new(),
            global_names: Vec::new(),
            functions: Vec::new(),
            top_level: Vec::new(),
            constants: Vec::new(),
            running: false,
            error_count: 0,
            debug_flags: DebugFlags::empty(),
            profiler: Profiler::default(),
            efun_host: None,
            method_host: None,
        }
    }

    pub fn set_efun_host(&mut self, host: Rc<dyn EfunHost>) {
        self.efun_host = Some(host);
    }

    pub fn set_method_host(&mut self, host: Rc<dyn MethodHost>) {
        self.method_host = Some(host);
    }

    /// Clones the installed efun host's `Rc` for a caller that needs to
    /// reach through it (e.g. to an `ObjectManager` it owns) while also
    /// driving `&mut self` — the same handle `dispatch_call` itself clones
    /// below, just exposed for callers outside the VM (the session layer's
    /// `this_player`/output-buffer bridging). Unlike the `Box` this
    /// replaced, cloning never leaves the VM without a host installed, so
    /// script execution triggered through the returned handle can still
    /// resolve its own nested efun/method calls.
    pub fn efun_host(&self) -> Option<Rc<dyn EfunHost>> {
        self.efun_host.clone()
    }

    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    pub fn constants(&self) -> &[String] {
        &self.constants
    }

    /// Loads the top-level instruction stream (spec section 4.6 `load_bytecode`).
    pub fn load_bytecode(&mut self, instructions: Vec<Instruction>) {
        self.top_level = instructions;
    }

    /// Registers a decoded function, returning its index in `Vm::functions`
    /// (spec section 4.6 `add_function`). Used both by the initial program
    /// load and by `clone_object` attaching a freshly compiled program's
    /// functions as methods (spec section 4.7).
    pub fn add_function(&mut self, function: VMFunction) -> usize {
        self.functions.push(function);
        self.functions.len() - 1
    }

    pub fn find_function(&self, name: &str) -> Option<usize> {
        self.functions.iter().position(|f| f.name.as_ref() == name)
    }

    pub fn function(&self, index: usize) -> Option<&VMFunction> {
        self.functions.get(index)
    }

    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Loads a fully decoded program: top-level bytecode, functions,
    /// globals (initialized from the descriptor table) and string
    /// constants (spec section 4.5 steps 2-5).
    pub fn load_program(&mut self, loaded: LoadedProgram) -> Vec<usize> {
        self.top_level = loaded.top_level;
        self.constants.extend(loaded.constants);

        for (name, value) in loaded.globals {
            self.global_names.push(name);
            self.globals.push(value);
        }

        let mut indices = Vec::with_capacity(loaded.functions.len());
        for function in loaded.functions {
            indices.push(self.add_function(function));
        }
        indices
    }

    // ----- operand stack -----

    pub fn push(&mut self, value: Value) -> VmResult<()> {
        self.heap.addref(&value)?;
        self.stack.push(value);
        Ok(())
    }

    /// Pushes a value that already owns its one reference count (e.g. a
    /// freshly allocated literal, or a value moved out of a local/global
    /// slot) without an extra `addref`. Public so host integrations that
    /// forward already-owned values — `amlp-objects`' `CALL_METHOD`
    /// dispatch reassembling arguments it popped is the main example — can
    /// reuse it instead of `push`, which would double-count.
    pub fn push_owned(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Value {
        self.stack.pop().unwrap_or(Value::Null)
    }

    fn try_pop(&mut self) -> VmResult<Value> {
        self.stack.pop().ok_or(VmError::StackUnderflow)
    }

    pub fn peek(&self) -> Option<&Value> {
        self.stack.last()
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    fn release(&mut self, value: &Value) -> VmResult<()> {
        self.heap.release(value)?;
        Ok(())
    }

    // ----- globals -----

    pub fn global_index(&self, name: &str) -> Option<usize> {
        self.global_names.iter().position(|n| n == name)
    }

    pub fn global(&self, index: usize) -> Option<&Value> {
        self.globals.get(index)
    }

    // ----- execution entry points -----

    /// Runs the top-level instruction stream until `HALT` or `RETURN`
    /// (spec section 4.6 `execute`). Most programs have no top-level code
    /// beyond the compiler's `PUSH_NULL; RETURN` fallback for a
    /// function-less source file; `call_function` is the primary entry
    /// point for real work.
    pub fn execute(&mut self) -> VmResult<()> {
        let stack_base = self.stack.len();
        self.frames.push(CallFrame::new(None, Vec::new(), stack_base));
        self.running = true;
        self.run_current_frame()?;
        self.frames.pop();
        Ok(())
    }

    /// Executes function `index` with `arg_count` arguments already on top
    /// of the operand stack (spec section 4.6 `call_function`). Drains
    /// exactly `arg_count` values off the stack into the new frame's
    /// parameter slots and, on return, leaves the stack at
    /// `(before) - arg_count + (1 if a value was returned else 0)`
    /// (spec section 8 property 2).
    pub fn call_function(&mut self, index: usize, arg_count: usize) -> VmResult<()> {
        let function = self
            .functions
            .get(index)
            .ok_or(VmError::FunctionIndexOutOfRange { index, bound: self.functions.len() })?;

        if arg_count != function.param_count as usize {
            let name = function.name.to_string();
            let expected = function.param_count.to_string();
            if self.stack.len() >= arg_count {
                for arg in self.stack.split_off(self.stack.len() - arg_count) {
                    let _ = self.heap.release(&arg);
                }
            }
            return Err(VmError::ArityMismatch { name, expected, got: arg_count });
        }

        if self.stack.len() < arg_count {
            return Err(VmError::StackUnderflow);
        }

        let total_slots = function.total_slots();
        let mut locals = vec![Value::Uninitialized; total_slots];
        let args: Vec<Value> = self.stack.split_off(self.stack.len() - arg_count);
        for (i, arg) in args.into_iter().enumerate() {
            locals[i] = arg;
        }

        let stack_base = self.stack.len();
        self.frames.push(CallFrame::new(Some(index), locals, stack_base));

        let saved_running = self.running;
        self.running = true;
        let result = self.run_current_frame();
        self.running = saved_running;

        let frame = self.frames.pop().expect("frame pushed above");
        for local in &frame.locals {
            // Arity-mismatch and out-of-range errors above return before a
            // frame is ever pushed, so reaching here means the frame ran;
            // releasing is infallible for well-formed handles.
            let _ = self.heap.release(local);
        }

        result?;

        if self.stack.len() > frame.stack_base {
            let value = self.stack.pop().expect("checked len above");
            self.push_owned(value);
        }

        Ok(())
    }

    /// The instruction slice the current frame executes: either a
    /// function's decoded body or the top-level stream.
    fn current_instructions(&self) -> &[Instruction] {
        match self.frames.last().and_then(|f| f.function_index) {
            Some(idx) => &self.functions[idx].instructions,
            None => &self.top_level,
        }
    }

    fn run_current_frame(&mut self) -> VmResult<()> {
        while self.running {
            let frame_idx = self.frames.len() - 1;
            let ip = self.frames[frame_idx].ip;
            let instructions = self.current_instructions();
            if ip >= instructions.len() {
                break;
            }
            let instr = instructions[ip].clone();
            self.frames[frame_idx].ip += 1;

            if self.debug_flags.contains(DebugFlags::TRACE_INSTRUCTIONS) {
                tracing::trace!(target: "vm", opcode = ?instr.opcode, line = self.current_line(), "dispatch");
            }

            if let Err(e) = self.dispatch(&instr) {
                self.error_count += 1;
                if self.debug_flags.contains(DebugFlags::TRACE_CALL_STACK_ON_ERROR) {
                    tracing::error!(target: "vm", error = %e, frames = self.frames.len(), "runtime error");
                }
                self.running = false;
                return Err(e);
            }

            if self.debug_flags.contains(DebugFlags::TRACE_STACK) {
                tracing::trace!(target: "vm", stack = ?self.stack, "stack snapshot");
            }
        }
        Ok(())
    }

    fn current_line(&self) -> u32 {
        let Some(frame) = self.frames.last() else { return 0 };
        let ip = frame.ip.saturating_sub(1);
        match frame.function_index {
            Some(idx) => self.functions[idx].line_numbers.get(ip).copied().unwrap_or(0),
            None => 0,
        }
    }

    fn dispatch(&mut self, instr: &Instruction) -> VmResult<()> {
        use amlp_compiler::OpCode::*;

        match instr.opcode {
            PushInt => {
                let Operand::Int(v) = instr.operand else { unreachable!() };
                self.push_owned(Value::Int(v));
            }
            PushFloat => {
                let Operand::Float(v) = instr.operand else { unreachable!() };
                self.push_owned(Value::Float(v));
            }
            PushString => {
                let Operand::Str(ref s) = instr.operand else { unreachable!() };
                self.profiler.note_string_alloc(s.len());
                self.profiler.note_construct("string");
                let v = self.heap.alloc_string(s.as_str());
                self.push_owned(v);
            }
            PushNull => self.push_owned(Value::Null),
            Pop => {
                let v = self.try_pop()?;
                self.release(&v)?;
            }
            Dup => {
                let top = self.peek().cloned().ok_or(VmError::StackUnderflow)?;
                self.push(top)?;
            }

            LoadLocal => self.op_load_local(instr)?,
            StoreLocal => self.op_store_local(instr)?,
            LoadGlobal => self.op_load_global(instr)?,
            StoreGlobal => self.op_store_global(instr)?,

            Add => self.arithmetic(|a, b| a + b, |a, b| a.wrapping_add(b))?,
            Sub => self.arithmetic(|a, b| a - b, |a, b| a.wrapping_sub(b))?,
            Mul => self.arithmetic(|a, b| a * b, |a, b| a.wrapping_mul(b))?,
            Div => self.op_div()?,
            Mod => self.op_mod()?,
            Neg => self.op_neg()?,

            Eq => self.comparison(|o| o == std::cmp::Ordering::Equal)?,
            Ne => self.comparison(|o| o != std::cmp::Ordering::Equal)?,
            Lt => self.comparison(|o| o == std::cmp::Ordering::Less)?,
            Le => self.comparison(|o| o != std::cmp::Ordering::Greater)?,
            Gt => self.comparison(|o| o == std::cmp::Ordering::Greater)?,
            Ge => self.comparison(|o| o != std::cmp::Ordering::Less)?,

            And => self.op_and()?,
            Or => self.op_or()?,
            Not => self.op_not()?,

            BitAnd => self.bitwise(|a, b| a & b)?,
            BitOr => self.bitwise(|a, b| a | b)?,
            BitXor => self.bitwise(|a, b| a ^ b)?,
            BitNot => self.op_bit_not()?,
            LShift => self.bitwise(|a, b| a.wrapping_shl(b as u32))?,
            RShift => self.bitwise(|a, b| a.wrapping_shr(b as u32))?,

            Jump => {
                let Operand::Addr(target) = instr.operand else { unreachable!() };
                self.frames.last_mut().unwrap().ip = target;
            }
            JumpIfFalse => {
                let Operand::Addr(target) = instr.operand else { unreachable!() };
                let cond = self.try_pop()?;
                let truthy = self.heap.is_truthy(&cond)?;
                self.release(&cond)?;
                if !truthy {
                    self.frames.last_mut().unwrap().ip = target;
                }
            }
            JumpIfTrue => {
                let Operand::Addr(target) = instr.operand else { unreachable!() };
                let cond = self.try_pop()?;
                let truthy = self.heap.is_truthy(&cond)?;
                self.release(&cond)?;
                if truthy {
                    self.frames.last_mut().unwrap().ip = target;
                }
            }

            Call => self.op_call(instr)?,
            Return => {
                self.running = false;
            }
            CallMethod => self.op_call_method(instr)?,

            MakeArray => self.op_make_array(instr)?,
            IndexArray => self.op_index_array()?,
            StoreArray => self.op_store_array()?,
            MakeMapping => self.op_make_mapping(instr)?,
            IndexMapping => self.op_index_mapping()?,
            StoreMapping => self.op_store_mapping()?,

            Halt => self.running = false,
            Print => {
                let v = self.try_pop()?;
                let s = self.heap.to_display_string(&v)?;
                println!("{s}");
                self.release(&v)?;
            }
        }
        Ok(())
    }

    fn op_load_local(&mut self, instr: &Instruction) -> VmResult<()> {
        let Operand::SlotIndex(idx) = instr.operand else { unreachable!() };
        let frame = self.frames.last().ok_or(VmError::NoActiveFrame)?;
        let value = frame
            .locals
            .get(idx as usize)
            .cloned()
            .ok_or(VmError::LocalIndexOutOfRange { index: idx, bound: frame.locals.len() })?;
        self.push(value)
    }

    fn op_store_local(&mut self, instr: &Instruction) -> VmResult<()> {
        let Operand::SlotIndex(idx) = instr.operand else { unreachable!() };
        let value = self.try_pop()?;
        let frame = self.frames.last_mut().ok_or(VmError::NoActiveFrame)?;
        let bound = frame.locals.len();
        let slot = frame
            .locals
            .get_mut(idx as usize)
            .ok_or(VmError::LocalIndexOutOfRange { index: idx, bound })?;
        let old = std::mem::replace(slot, value);
        self.heap.release(&old)?;
        Ok(())
    }

    fn op_load_global(&mut self, instr: &Instruction) -> VmResult<()> {
        let Operand::SlotIndex(idx) = instr.operand else { unreachable!() };
        if idx < 0 {
            self.push_owned(Value::Null);
            return Ok(());
        }
        let value = self
            .globals
            .get(idx as usize)
            .cloned()
            .ok_or(VmError::GlobalIndexOutOfRange { index: idx, bound: self.globals.len() })?;
        self.push(value)
    }

    fn op_store_global(&mut self, instr: &Instruction) -> VmResult<()> {
        let Operand::SlotIndex(idx) = instr.operand else { unreachable!() };
        let value = self.try_pop()?;
        if idx < 0 {
            // Spec section 4.6: "a store with a negative index allocates a fresh global."
            self.global_names.push(format!("$anon{}", self.globals.len()));
            self.globals.push(value);
            return Ok(());
        }
        let bound = self.globals.len();
        let slot = self
            .globals
            .get_mut(idx as usize)
            .ok_or(VmError::GlobalIndexOutOfRange { index: idx, bound })?;
        let old = std::mem::replace(slot, value);
        self.heap.release(&old)?;
        Ok(())
    }

    fn numeric_pair(&mut self, op: &'static str) -> VmResult<(Value, Value)> {
        let b = self.try_pop()?;
        let a = self.try_pop()?;
        if a.as_f64().is_none() {
            self.release(&b)?;
            self.release(&a)?;
            return Err(VmError::TypeError { op, found: a.type_name() });
        }
        if b.as_f64().is_none() {
            self.release(&b)?;
            self.release(&a)?;
            return Err(VmError::TypeError { op, found: b.type_name() });
        }
        Ok((a, b))
    }

    /// Pops `b` then `a`, promotes to float if either operand is float,
    /// computes via `f_op` (or `i_op` if both are `Int`), pushes the result
    /// (spec section 4.6 "Arithmetic").
    fn arithmetic(&mut self, f_op: impl Fn(f64, f64) -> f64, i_op: impl Fn(i64, i64) -> i64) -> VmResult<()> {
        let (a, b) = self.numeric_pair("arithmetic")?;
        let result = match (&a, &b) {
            (Value::Int(x), Value::Int(y)) => Value::Int(i_op(*x, *y)),
            _ => Value::Float(f_op(a.as_f64().unwrap(), b.as_f64().unwrap())),
        };
        self.release(&a)?;
        self.release(&b)?;
        self.push_owned(result);
        Ok(())
    }

    /// Division always yields `Float`; division by zero yields `Float 0.0`
    /// rather than trapping (spec section 8 property 11).
    fn op_div(&mut self) -> VmResult<()> {
        let (a, b) = self.numeric_pair("division")?;
        let bv = b.as_f64().unwrap();
        let result = if bv == 0.0 { 0.0 } else { a.as_f64().unwrap() / bv };
        self.release(&a)?;
        self.release(&b)?;
        self.push_owned(Value::Float(result));
        Ok(())
    }

    /// `MOD` operates on integer views of both operands (spec section 4.6).
    /// Modulo by zero is left unspecified by the source; this implementation
    /// yields `Int 0` rather than trapping, mirroring the division-by-zero
    /// convention (documented in DESIGN.md).
    fn op_mod(&mut self) -> VmResult<()> {
        let (a, b) = self.numeric_pair("modulo")?;
        let bi = b.as_i64().unwrap();
        let result = if bi == 0 { 0 } else { a.as_i64().unwrap().wrapping_rem(bi) };
        self.release(&a)?;
        self.release(&b)?;
        self.push_owned(Value::Int(result));
        Ok(())
    }

    fn op_neg(&mut self) -> VmResult<()> {
        let v = self.try_pop()?;
        let result = match &v {
            Value::Int(i) => Value::Int(i.wrapping_neg()),
            Value::Float(f) => Value::Float(-f),
            _ => {
                let found = v.type_name();
                self.release(&v)?;
                return Err(VmError::TypeError { op: "negation", found });
            }
        };
        self.release(&v)?;
        self.push_owned(result);
        Ok(())
    }

    /// Pops `b` then `a`, promotes to float for comparison, pushes `Int 0/1`
    /// depending on `decide`'s verdict on `a.partial_cmp(b)` (spec section 4.6
    /// "Comparison").
    fn comparison(&mut self, decide: impl Fn(std::cmp::Ordering) -> bool) -> VmResult<()> {
        let (a, b) = self.numeric_pair("comparison")?;
        let av = a.as_f64().unwrap();
        let bv = b.as_f64().unwrap();
        let ordering = av.partial_cmp(&bv).unwrap_or(std::cmp::Ordering::Equal);
        self.release(&a)?;
        self.release(&b)?;
        self.push_owned(Value::Int(decide(ordering) as i64));
        Ok(())
    }

    fn op_and(&mut self) -> VmResult<()> {
        let b = self.try_pop()?;
        let a = self.try_pop()?;
        let result = (self.heap.is_truthy(&a)? as i64) & (self.heap.is_truthy(&b)? as i64);
        self.release(&a)?;
        self.release(&b)?;
        self.push_owned(Value::Int(result));
        Ok(())
    }

    fn op_or(&mut self) -> VmResult<()> {
        let b = self.try_pop()?;
        let a = self.try_pop()?;
        let result = (self.heap.is_truthy(&a)? as i64) | (self.heap.is_truthy(&b)? as i64);
        self.release(&a)?;
        self.release(&b)?;
        self.push_owned(Value::Int(result));
        Ok(())
    }

    fn op_not(&mut self) -> VmResult<()> {
        let v = self.try_pop()?;
        let truthy = self.heap.is_truthy(&v)?;
        self.release(&v)?;
        self.push_owned(Value::Int(!truthy as i64));
        Ok(())
    }

    fn int_pair(&mut self, op: &'static str) -> VmResult<(i64, i64)> {
        let (a, b) = self.numeric_pair(op)?;
        let ai = a.as_i64().unwrap();
        let bi = b.as_i64().unwrap();
        self.release(&a)?;
        self.release(&b)?;
        Ok((ai, bi))
    }

    fn bitwise(&mut self, op: impl Fn(i64, i64) -> i64) -> VmResult<()> {
        let (a, b) = self.int_pair("bitwise operation")?;
        self.push_owned(Value::Int(op(a, b)));
        Ok(())
    }

    fn op_bit_not(&mut self) -> VmResult<()> {
        let v = self.try_pop()?;
        let i = v.as_i64().ok_or_else(|| VmError::TypeError { op: "bitwise not", found: v.type_name() });
        match i {
            Ok(i) => {
                self.release(&v)?;
                self.push_owned(Value::Int(!i));
                Ok(())
            }
            Err(e) => {
                self.release(&v)?;
                Err(e)
            }
        }
    }

    fn op_call(&mut self, instr: &Instruction) -> VmResult<()> {
        let Operand::Call { arg_count, ref name } = instr.operand else { unreachable!() };
        let arg_count = arg_count as usize;

        if self.stack.len() < arg_count {
            return Err(VmError::StackUnderflow);
        }

        self.dispatch_call(name, arg_count)
    }

    /// Pops `arg_count` arguments (preserving call order), then tries the
    /// efun registry before the VM's own function table (spec section 4.6
    /// "CALL"). The VM itself owns releasing `args` once a branch below has
    /// decided what to do with them; nothing downstream takes ownership of
    /// the popped values directly.
    fn dispatch_call(&mut self, name: &str, arg_count: usize) -> VmResult<()> {
        let args: Vec<Value> = self.stack.split_off(self.stack.len() - arg_count);

        // Cloning the `Rc` (rather than taking the field, as a `Box` would
        // force) leaves `self.efun_host` populated for the duration of
        // `host.call`, so a nested `CALL` it triggers (e.g. a method body
        // invoked here calling another efun) can clone its own handle from
        // the same field instead of finding it empty.
        if let Some(host) = self.efun_host.clone() {
            let outcome = host.call(self, name, &args);
            if let Some(result) = outcome {
                for arg in &args {
                    let _ = self.heap.release(arg);
                }
                let value = result?;
                self.push_owned(value);
                return Ok(());
            }
        }

        if let Some(index) = self.find_function(name) {
            for arg in args {
                self.push_owned(arg);
            }
            return self.call_function(index, arg_count);
        }

        for arg in &args {
            let _ = self.heap.release(arg);
        }
        Err(VmError::UnknownCallable { name: name.to_string() })
    }

    fn op_call_method(&mut self, instr: &Instruction) -> VmResult<()> {
        let Operand::CallMethod { arg_count } = instr.operand else { unreachable!() };
        let arg_count = arg_count as usize;
        if self.stack.len() < arg_count + 2 {
            return Err(VmError::StackUnderflow);
        }
        let args: Vec<Value> = self.stack.split_off(self.stack.len() - arg_count);
        let method_value = self.try_pop()?;
        let object_value = self.try_pop()?;

        let method_name = match &method_value {
            Value::String(id) => self.heap.strings.payload(*id)?.to_string(),
            _ => {
                self.release(&method_value)?;
                self.release(&object_value)?;
                for arg in &args {
                    let _ = self.heap.release(arg);
                }
                self.push_owned(Value::Null);
                return Ok(());
            }
        };
        self.release(&method_value)?;

        let object_id = match &object_value {
            Value::Object(id) => *id,
            _ => {
                self.release(&object_value)?;
                for arg in &args {
                    let _ = self.heap.release(arg);
                }
                self.push_owned(Value::Null);
                return Ok(());
            }
        };
        self.release(&object_value)?;

        let result = self.call_object_method(object_id, &method_name, args);
        self.push_owned(result);
        Ok(())
    }

    /// Dispatches to the registered `MethodHost` (spec section 4.7). Absent
    /// one (e.g. running the VM standalone in `--parse-test` mode), method
    /// calls always resolve to `Null`.
    fn call_object_method(&mut self, object: ObjectId, method: &str, args: Vec<Value>) -> Value {
        if let Some(host) = self.method_host.clone() {
            host.call_method(self, object, method, args)
        } else {
            for arg in &args {
                let _ = self.heap.release(arg);
            }
            Value::Null
        }
    }

    /// `MAKE_ARRAY n`: pops `n` values off the stack into a buffer in pop
    /// order, then reverses the buffer before constructing the array, so
    /// `array[0]` is the first value the source pushed (spec section 9
    /// Open Question 2, resolved in DESIGN.md).
    fn op_make_array(&mut self, instr: &Instruction) -> VmResult<()> {
        let Operand::Count(n) = instr.operand else { unreachable!() };
        let n = n as usize;
        if self.stack.len() < n {
            return Err(VmError::StackUnderflow);
        }
        let mut elements: Vec<Value> = self.stack.split_off(self.stack.len() - n);
        elements.reverse();
        let arr = self.heap.alloc_array(elements);
        self.push_owned(arr);
        Ok(())
    }

    fn op_index_array(&mut self) -> VmResult<()> {
        let index = self.try_pop()?;
        let base = self.try_pop()?;
        let idx = index.as_i64().unwrap_or(0);
        self.release(&index)?;

        let result = match &base {
            Value::Array(id) => {
                let value = self.heap.arrays.index(*id, idx)?.unwrap_or(Value::Null);
                self.heap.addref(&value)?;
                value
            }
            Value::Mapping(id) => {
                // Polymorphic subscript: the compiler cannot tell arrays
                // from mappings at a `base[index]` site (spec section 4.6).
                let key = self.heap.to_display_string(&Value::Int(idx))?;
                let value = self.heap.mappings.index(*id, &key)?.unwrap_or(Value::Null);
                self.heap.addref(&value)?;
                value
            }
            _ => Value::Null,
        };
        self.release(&base)?;
        self.push_owned(result);
        Ok(())
    }

    fn op_store_array(&mut self) -> VmResult<()> {
        let value = self.try_pop()?;
        let index = self.try_pop()?;
        let base = self.try_pop()?;
        let idx = index.as_i64().unwrap_or(0);
        self.release(&index)?;

        self.heap.check_no_self_reference(&base, &value)?;

        match &base {
            Value::Array(id) => {
                let in_range = idx >= 0 && (idx as usize) < self.heap.arrays.len(*id)?;
                if in_range {
                    if let Some(old) = self.heap.arrays.index(*id, idx)? {
                        self.release(&old)?;
                    }
                    self.heap.arrays.store(*id, idx, value)?;
                } else {
                    self.release(&value)?;
                }
            }
            _ => {
                self.release(&value)?;
            }
        }
        self.release(&base)?;
        Ok(())
    }

    fn op_make_mapping(&mut self, instr: &Instruction) -> VmResult<()> {
        let Operand::Count(n) = instr.operand else { unreachable!() };
        let n = n as usize;
        if self.stack.len() < n * 2 {
            return Err(VmError::StackUnderflow);
        }
        let mut entries = hashbrown::HashMap::with_capacity(n);
        for _ in 0..n {
            let value = self.try_pop()?;
            let key = self.try_pop()?;
            let key_str = match &key {
                Value::String(id) => self.heap.strings.payload(*id)?.to_string(),
                other => self.heap.to_display_string(other)?,
            };
            self.release(&key)?;
            if let Some(old) = entries.insert(key_str, value) {
                self.release(&old)?;
            }
        }
        let map = self.heap.alloc_mapping(entries);
        self.push_owned(map);
        Ok(())
    }

    fn op_index_mapping(&mut self) -> VmResult<()> {
        let key = self.try_pop()?;
        let base = self.try_pop()?;
        let result = match (&base, &key) {
            (Value::Mapping(id), Value::String(key_id)) => {
                let key_str = self.heap.strings.payload(*key_id)?.to_string();
                let value = self.heap.mappings.index(*id, &key_str)?.unwrap_or(Value::Null);
                self.heap.addref(&value)?;
                value
            }
            _ => Value::Null,
        };
        self.release(&key)?;
        self.release(&base)?;
        self.push_owned(result);
        Ok(())
    }

    fn op_store_mapping(&mut self) -> VmResult<()> {
        let value = self.try_pop()?;
        let key = self.try_pop()?;
        let base = self.try_pop()?;

        self.heap.check_no_self_reference(&base, &value)?;

        match (&base, &key) {
            (Value::Mapping(id), Value::String(key_id)) => {
                let key_str = self.heap.strings.payload(*key_id)?.to_string();
                if let Some(old) = self.heap.mappings.index(*id, &key_str)? {
                    self.release(&old)?;
                }
                self.heap.mappings.store(*id, key_str, value)?;
            }
            _ => {
                self.release(&value)?;
            }
        }
        self.release(&key)?;
        self.release(&base)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amlp_compiler::Compiler;

    fn load(vm: &mut Vm, source: &str) -> usize {
        let program = Compiler::compile(source, "t.c");
        assert!(program.is_success(), "{:?}", program.errors);
        let loaded = amlp_loader::load_program(&program).unwrap();
        let indices = vm.load_program(loaded);
        indices[0]
    }

    #[test]
    fn e1_arithmetic_round_trip() {
        let mut vm = Vm::new();
        let idx = load(&mut vm, "int test() { return 10 + 20; }");
        vm.call_function(idx, 0).unwrap();
        assert_eq!(vm.pop(), Value::Int(30));
    }

    #[test]
    fn e2_division_yields_float() {
        let mut vm = Vm::new();
        let idx = load(&mut vm, "mixed test() { return 7 / 2; }");
        vm.call_function(idx, 0).unwrap();
        assert_eq!(vm.pop(), Value::Float(3.5));
    }

    #[test]
    fn e3_parameter_resolution_and_stack_height() {
        let mut vm = Vm::new();
        let idx = load(&mut vm, "int add(int a, int b) { return a + b; }");
        let before = vm.stack_len();
        vm.push(Value::Int(4)).unwrap();
        vm.push(Value::Int(5)).unwrap();
        vm.call_function(idx, 2).unwrap();
        assert_eq!(vm.pop(), Value::Int(9));
        assert_eq!(vm.stack_len(), before);
    }

    #[test]
    fn division_by_zero_yields_float_zero() {
        let mut vm = Vm::new();
        let idx = load(&mut vm, "mixed test() { return 1 / 0; }");
        vm.call_function(idx, 0).unwrap();
        assert_eq!(vm.pop(), Value::Float(0.0));
    }

    #[test]
    fn integer_overflow_wraps() {
        let mut vm = Vm::new();
        let idx = load(&mut vm, "int test() { return 9223372036854775807 + 1; }");
        vm.call_function(idx, 0).unwrap();
        assert_eq!(vm.pop(), Value::Int(i64::MIN));
    }

    #[test]
    fn popping_an_empty_stack_returns_null_and_does_not_panic() {
        let mut vm = Vm::new();
        assert_eq!(vm.pop(), Value::Null);
        assert_eq!(vm.stack_len(), 0);
    }

    #[test]
    fn string_refcount_returns_to_pre_push_value_after_release() {
        let mut vm = Vm::new();
        let s = vm.heap.alloc_string("hi");
        let id = match &s {
            Value::String(id) => *id,
            _ => unreachable!(),
        };
        vm.push(s.clone()).unwrap();
        assert_eq!(vm.heap.strings.refcount(id).unwrap(), 2);
        let popped = vm.pop();
        vm.heap.release(&popped).unwrap();
        assert_eq!(vm.heap.strings.refcount(id).unwrap(), 1);
    }

    #[test]
    fn while_loop_executes_body_to_completion() {
        let mut vm = Vm::new();
        let idx = load(
            &mut vm,
            "int test() { int i; int sum; i = 0; sum = 0; while (i < 5) { sum = sum + i; i = i + 1; } return sum; }",
        );
        vm.call_function(idx, 0).unwrap();
        assert_eq!(vm.pop(), Value::Int(10));
    }

    #[test]
    fn array_literal_preserves_source_order() {
        let mut vm = Vm::new();
        let idx = load(&mut vm, "mixed test() { mixed a; a = ({ 1, 2, 3 }); return a[0]; }");
        vm.call_function(idx, 0).unwrap();
        assert_eq!(vm.pop(), Value::Int(1));
    }

    #[test]
    fn out_of_range_array_index_yields_null() {
        let mut vm = Vm::new();
        let idx = load(&mut vm, "mixed test() { mixed a; a = ({ 1, 2 }); return a[9]; }");
        vm.call_function(idx, 0).unwrap();
        assert_eq!(vm.pop(), Value::Null);
    }
}
