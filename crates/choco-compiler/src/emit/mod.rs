//! Bytecode emitter for the choco compiler.
//!
//! The [`BytecodeEmitter`] provides a high-level API for generating bytecode
//! for one function. Besides writing instructions it tracks the abstract
//! operand stack (depth, and whether each entry is a primitive or a boxed
//! reference) so that:
//!
//! - `max_stack` is known when the function is finished
//! - boxing and arithmetic see operands of the right kind
//! - every jump target is reached with a single stack shape
//!
//! Violations are internal errors. The first one is latched and reported by
//! [`BytecodeEmitter::finish`], so emission code does not have to thread a
//! `Result` through every instruction.
//!
//! # Example
//!
//! ```
//! use choco_compiler::bytecode::{ConstantPool, OpCode};
//! use choco_compiler::emit::BytecodeEmitter;
//!
//! let mut constants = ConstantPool::new();
//! let mut emitter = BytecodeEmitter::new(&mut constants, "answer");
//! emitter.emit_int(42);
//! emitter.emit_box_int();
//! emitter.emit_return();
//!
//! let code = emitter.finish().unwrap();
//! assert_eq!(code.max_stack, 1);
//! code.chunk.assert_opcodes(&[OpCode::Constant, OpCode::BoxInt, OpCode::Return]);
//! ```

mod jumps;

use choco_core::CodegenError;

use crate::bytecode::{BytecodeChunk, Constant, ConstantPool, OpCode};
use jumps::JumpManager;
pub use jumps::StackValue;

/// A forward jump waiting for its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JumpLabel(pub(crate) usize);

/// Output of a finished emitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedCode {
    pub chunk: BytecodeChunk,
    pub max_stack: u16,
}

/// Emits bytecode instructions for a single function.
///
/// Uses the shared module-level constant pool for deduplication across
/// functions.
pub struct BytecodeEmitter<'pool> {
    chunk: BytecodeChunk,
    constants: &'pool mut ConstantPool,
    jumps: JumpManager,

    /// Abstract operand stack.
    stack: Vec<StackValue>,
    max_stack: usize,
    /// False after an unconditional jump or return, until a label is bound.
    reachable: bool,

    current_line: u32,
    /// Function name, for diagnostics.
    context: String,
    error: Option<CodegenError>,
}

impl<'pool> BytecodeEmitter<'pool> {
    pub fn new(constants: &'pool mut ConstantPool, context: impl Into<String>) -> Self {
        Self {
            chunk: BytecodeChunk::new(),
            constants,
            jumps: JumpManager::new(),
            stack: Vec::new(),
            max_stack: 0,
            reachable: true,
            current_line: 0,
            context: context.into(),
            error: None,
        }
    }

    /// Set current source line for debug info.
    pub fn set_line(&mut self, line: u32) {
        self.current_line = line;
    }

    pub fn current_line(&self) -> u32 {
        self.current_line
    }

    /// Current abstract stack depth.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Current abstract stack, bottom first.
    pub fn stack_shape(&self) -> &[StackValue] {
        &self.stack
    }

    pub fn offset(&self) -> usize {
        self.chunk.current_offset()
    }

    // ==========================================================================
    // Stack tracking
    // ==========================================================================

    fn fail(&mut self, message: String) {
        if self.error.is_none() {
            log::trace!("emitter error in '{}': {}", self.context, message);
            self.error = Some(CodegenError::internal(format!(
                "in '{}': {}",
                self.context, message
            )));
        }
    }

    fn push(&mut self, value: StackValue) {
        self.stack.push(value);
        self.max_stack = self.max_stack.max(self.stack.len());
    }

    fn pop(&mut self, expected: StackValue, op: OpCode) {
        match self.stack.pop() {
            Some(actual) if actual == expected => {}
            Some(actual) => self.fail(format!(
                "{} expects {:?} on the stack, found {:?}",
                op.name(),
                expected,
                actual
            )),
            None => self.fail(format!("operand stack underflow at {}", op.name())),
        }
    }

    fn write_op(&mut self, op: OpCode) {
        if !self.reachable {
            self.fail(format!("unreachable {} emitted", op.name()));
        }
        self.chunk.write_op(op, self.current_line);
    }

    fn write_u16_operand(&mut self, value: u32, what: &str) {
        match u16::try_from(value) {
            Ok(v) => self.chunk.write_u16(v, self.current_line),
            Err(_) => {
                self.fail(format!("{} {} does not fit in 16 bits", what, value));
                self.chunk.write_u16(0, self.current_line);
            }
        }
    }

    fn emit_constant(&mut self, constant: Constant) {
        let index = self.constants.add(constant);
        if index < 256 {
            self.write_op(OpCode::Constant);
            self.chunk.write_byte(index as u8, self.current_line);
        } else {
            self.write_op(OpCode::ConstantWide);
            self.write_u16_operand(index, "constant index");
        }
    }

    // ==========================================================================
    // Literals
    // ==========================================================================

    /// Push a primitive integer.
    ///
    /// 0 and 1 use `PushZero`/`PushOne`, everything else the constant pool.
    pub fn emit_int(&mut self, value: i32) {
        match value {
            0 => self.write_op(OpCode::PushZero),
            1 => self.write_op(OpCode::PushOne),
            _ => self.emit_constant(Constant::Int(value as i64)),
        }
        self.push(StackValue::Prim);
    }

    /// Push a primitive boolean (0 or 1).
    pub fn emit_bool(&mut self, value: bool) {
        self.write_op(if value { OpCode::PushOne } else { OpCode::PushZero });
        self.push(StackValue::Prim);
    }

    /// Push a boxed string.
    pub fn emit_string(&mut self, value: &str) {
        self.emit_constant(Constant::StringData(value.as_bytes().to_vec()));
        self.push(StackValue::Ref);
    }

    // ==========================================================================
    // Boxing
    // ==========================================================================

    fn emit_convert(&mut self, op: OpCode, from: StackValue, to: StackValue) {
        self.write_op(op);
        self.pop(from, op);
        self.push(to);
    }

    pub fn emit_box_int(&mut self) {
        self.emit_convert(OpCode::BoxInt, StackValue::Prim, StackValue::Ref);
    }

    pub fn emit_unbox_int(&mut self) {
        self.emit_convert(OpCode::UnboxInt, StackValue::Ref, StackValue::Prim);
    }

    pub fn emit_box_bool(&mut self) {
        self.emit_convert(OpCode::BoxBool, StackValue::Prim, StackValue::Ref);
    }

    pub fn emit_unbox_bool(&mut self) {
        self.emit_convert(OpCode::UnboxBool, StackValue::Ref, StackValue::Prim);
    }

    /// Check the reference on top against `descriptor`.
    pub fn emit_check_cast(&mut self, descriptor: &str) {
        let index = self.constants.add_descriptor(descriptor);
        self.write_op(OpCode::CheckCast);
        self.write_u16_operand(index, "constant index");
        self.pop(StackValue::Ref, OpCode::CheckCast);
        self.push(StackValue::Ref);
    }

    // ==========================================================================
    // Arithmetic
    // ==========================================================================

    /// Emit a primitive binary operation (`AddI32` and friends).
    pub fn emit_arithmetic(&mut self, op: OpCode) {
        self.write_op(op);
        self.pop(StackValue::Prim, op);
        self.pop(StackValue::Prim, op);
        self.push(StackValue::Prim);
    }

    // ==========================================================================
    // Locals and fields
    // ==========================================================================

    pub fn emit_get_local(&mut self, slot: u32) {
        if slot < 256 {
            self.write_op(OpCode::GetLocal);
            self.chunk.write_byte(slot as u8, self.current_line);
        } else {
            self.write_op(OpCode::GetLocalWide);
            self.write_u16_operand(slot, "local slot");
        }
        self.push(StackValue::Ref);
    }

    pub fn emit_set_local(&mut self, slot: u32) {
        let op = if slot < 256 {
            self.write_op(OpCode::SetLocal);
            self.chunk.write_byte(slot as u8, self.current_line);
            OpCode::SetLocal
        } else {
            self.write_op(OpCode::SetLocalWide);
            self.write_u16_operand(slot, "local slot");
            OpCode::SetLocalWide
        };
        self.pop(StackValue::Ref, op);
    }

    pub fn emit_get_global(&mut self, owner: &str, name: &str, descriptor: &str) {
        let index = self.constants.add(Constant::field(owner, name, descriptor));
        self.write_op(OpCode::GetGlobal);
        self.write_u16_operand(index, "constant index");
        self.push(StackValue::Ref);
    }

    pub fn emit_set_global(&mut self, owner: &str, name: &str, descriptor: &str) {
        let index = self.constants.add(Constant::field(owner, name, descriptor));
        self.write_op(OpCode::SetGlobal);
        self.write_u16_operand(index, "constant index");
        self.pop(StackValue::Ref, OpCode::SetGlobal);
    }

    // ==========================================================================
    // Calls and returns
    // ==========================================================================

    /// Direct call. Pops `arg_count` references, pushes one if `returns_value`.
    pub fn emit_call(
        &mut self,
        owner: &str,
        name: &str,
        descriptor: &str,
        arg_count: usize,
        returns_value: bool,
    ) {
        let index = self.constants.add(Constant::function(owner, name, descriptor));
        self.write_op(OpCode::Call);
        self.write_u16_operand(index, "constant index");
        let argc = match u8::try_from(arg_count) {
            Ok(argc) => argc,
            Err(_) => {
                self.fail(format!("call of '{}' with {} arguments", name, arg_count));
                0
            }
        };
        self.chunk.write_byte(argc, self.current_line);

        for _ in 0..arg_count {
            self.pop(StackValue::Ref, OpCode::Call);
        }
        if returns_value {
            self.push(StackValue::Ref);
        }
    }

    /// Return the single boxed value on the stack.
    pub fn emit_return(&mut self) {
        self.write_op(OpCode::Return);
        self.pop(StackValue::Ref, OpCode::Return);
        if !self.stack.is_empty() {
            self.fail(format!("{} values left under the return value", self.stack.len()));
        }
        self.reachable = false;
    }

    pub fn emit_return_void(&mut self) {
        self.write_op(OpCode::ReturnVoid);
        if !self.stack.is_empty() {
            self.fail(format!("{} values left at void return", self.stack.len()));
        }
        self.reachable = false;
    }

    // ==========================================================================
    // Jumps
    // ==========================================================================

    /// Emit a forward jump. Conditional jumps pop their primitive operands.
    pub fn emit_jump(&mut self, op: OpCode) -> JumpLabel {
        self.write_op(op);
        let operand = self.chunk.current_offset();
        self.chunk.write_u16(0xFFFF, self.current_line);

        match op {
            OpCode::Jump => {}
            OpCode::JumpIfFalse | OpCode::JumpIfTrue => self.pop(StackValue::Prim, op),
            OpCode::JumpIfLt
            | OpCode::JumpIfGt
            | OpCode::JumpIfLe
            | OpCode::JumpIfGe
            | OpCode::JumpIfEq => {
                self.pop(StackValue::Prim, op);
                self.pop(StackValue::Prim, op);
            }
            other => self.fail(format!("{} is not a jump", other.name())),
        }

        let label = JumpLabel(operand);
        self.jumps.record(label, self.stack.clone());
        if op == OpCode::Jump {
            self.reachable = false;
        }
        label
    }

    /// Bind `label` to the current position.
    ///
    /// If the current position is unreachable, the stack shape recorded at the
    /// jump becomes the current one. Otherwise both must agree.
    pub fn patch_jump(&mut self, label: JumpLabel) {
        if self.chunk.patch_jump(label.0).is_none() {
            self.fail(format!("jump at {} is too far", label.0));
        }
        let Some(shape) = self.jumps.resolve(label) else {
            self.fail(format!("jump at {} patched twice", label.0));
            return;
        };
        if self.reachable {
            if shape != self.stack {
                self.fail(format!(
                    "stack shape mismatch at join {}: {:?} vs {:?}",
                    self.chunk.current_offset(),
                    shape,
                    self.stack
                ));
            }
        } else {
            self.stack = shape;
            self.reachable = true;
        }
    }

    // ==========================================================================
    // Finalization
    // ==========================================================================

    /// Finish emission and return the chunk, or the first error.
    pub fn finish(self) -> Result<EmittedCode, CodegenError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.jumps.unresolved() > 0 {
            return Err(CodegenError::internal(format!(
                "in '{}': {} unpatched jump(s)",
                self.context,
                self.jumps.unresolved()
            )));
        }
        if self.reachable {
            return Err(CodegenError::internal(format!(
                "in '{}': control reaches the end without a return",
                self.context
            )));
        }
        let max_stack = u16::try_from(self.max_stack).map_err(|_| {
            CodegenError::internal(format!("in '{}': operand stack too deep", self.context))
        })?;
        Ok(EmittedCode {
            chunk: self.chunk,
            max_stack,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_ints_use_push_shortcuts() {
        let mut pool = ConstantPool::new();
        let mut emitter = BytecodeEmitter::new(&mut pool, "f");
        emitter.emit_int(0);
        emitter.emit_int(1);
        emitter.emit_arithmetic(OpCode::AddI32);
        emitter.emit_box_int();
        emitter.emit_return();
        let code = emitter.finish().unwrap();
        code.chunk.assert_opcodes(&[
            OpCode::PushZero,
            OpCode::PushOne,
            OpCode::AddI32,
            OpCode::BoxInt,
            OpCode::Return,
        ]);
        assert_eq!(code.max_stack, 2);
        assert!(pool.is_empty());
    }

    #[test]
    fn large_int_goes_through_pool() {
        let mut pool = ConstantPool::new();
        let mut emitter = BytecodeEmitter::new(&mut pool, "f");
        emitter.emit_int(1000);
        emitter.emit_box_int();
        emitter.emit_return();
        emitter.finish().unwrap();
        assert_eq!(pool.get(0), Some(&Constant::Int(1000)));
    }

    #[test]
    fn wide_local_slots() {
        let mut pool = ConstantPool::new();
        let mut emitter = BytecodeEmitter::new(&mut pool, "f");
        emitter.emit_get_local(300);
        emitter.emit_set_local(2);
        emitter.emit_return_void();
        let code = emitter.finish().unwrap();
        code.chunk
            .assert_opcodes(&[OpCode::GetLocalWide, OpCode::SetLocal, OpCode::ReturnVoid]);
        assert_eq!(code.chunk.read_u16(1), Some(300));
    }

    #[test]
    fn boxing_checks_operand_kind() {
        let mut pool = ConstantPool::new();
        let mut emitter = BytecodeEmitter::new(&mut pool, "f");
        emitter.emit_string("s");
        emitter.emit_box_int();
        emitter.emit_return();
        let err = emitter.finish().unwrap_err();
        assert!(err.to_string().contains("BOX_INT expects Prim"), "{err}");
    }

    #[test]
    fn underflow_is_reported() {
        let mut pool = ConstantPool::new();
        let mut emitter = BytecodeEmitter::new(&mut pool, "f");
        emitter.emit_return();
        let err = emitter.finish().unwrap_err();
        assert!(err.to_string().contains("underflow"), "{err}");
    }

    #[test]
    fn branches_join_with_one_shape() {
        // if <prim> then 1 else 2, boxed after the join
        let mut pool = ConstantPool::new();
        let mut emitter = BytecodeEmitter::new(&mut pool, "f");
        emitter.emit_bool(true);
        let otherwise = emitter.emit_jump(OpCode::JumpIfFalse);
        emitter.emit_int(1);
        emitter.emit_box_int();
        let end = emitter.emit_jump(OpCode::Jump);
        emitter.patch_jump(otherwise);
        assert_eq!(emitter.depth(), 0);
        emitter.emit_int(2);
        emitter.emit_box_int();
        emitter.patch_jump(end);
        assert_eq!(emitter.stack_shape(), &[StackValue::Ref]);
        emitter.emit_return();
        emitter.finish().unwrap();
    }

    #[test]
    fn diverging_join_is_an_error() {
        let mut pool = ConstantPool::new();
        let mut emitter = BytecodeEmitter::new(&mut pool, "f");
        emitter.emit_bool(true);
        let skip = emitter.emit_jump(OpCode::JumpIfFalse);
        emitter.emit_int(1);
        emitter.emit_box_int();
        emitter.patch_jump(skip);
        emitter.emit_return();
        let err = emitter.finish().unwrap_err();
        assert!(err.to_string().contains("stack shape mismatch"), "{err}");
    }

    #[test]
    fn missing_return_is_an_error() {
        let mut pool = ConstantPool::new();
        let emitter = BytecodeEmitter::new(&mut pool, "f");
        assert!(emitter.finish().is_err());
    }

    #[test]
    fn call_pops_arguments_and_pushes_result() {
        let mut pool = ConstantPool::new();
        let mut emitter = BytecodeEmitter::new(&mut pool, "f");
        emitter.emit_int(3);
        emitter.emit_box_int();
        emitter.emit_int(4);
        emitter.emit_box_int();
        emitter.emit_call("m/Main", "add", "(II)I", 2, true);
        assert_eq!(emitter.depth(), 1);
        emitter.emit_return();
        let code = emitter.finish().unwrap();
        assert_eq!(code.max_stack, 2);
        assert_eq!(code.chunk.read_byte(code.chunk.len() - 2), Some(2));
    }
}
