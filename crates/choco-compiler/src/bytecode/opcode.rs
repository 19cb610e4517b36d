//! Bytecode operation codes.
//!
//! The instruction set of the choco stack machine. Each opcode is a single
//! byte, with operands following inline (big-endian).
//!
//! Values on the operand stack are either raw 32-bit primitives or references
//! to boxed objects. Generated code keeps integers and booleans boxed and only
//! unboxes them immediately around a primitive operation or a branch.

use num_enum::TryFromPrimitive;

/// Bytecode operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u8)]
pub enum OpCode {
    // =========================================================================
    // Constants
    // =========================================================================
    /// Push constant from pool (8-bit index).
    /// Operand: u8 constant index
    ///
    /// Integer constants push a primitive, string data pushes a boxed string.
    Constant = 0,
    /// Push constant from pool (16-bit index).
    /// Operand: u16 constant index
    ConstantWide,
    /// Push primitive 0.
    PushZero,
    /// Push primitive 1.
    PushOne,

    // =========================================================================
    // Local Variables
    // =========================================================================
    /// Load local variable (8-bit slot).
    /// Operand: u8 slot index
    GetLocal,
    /// Pop into local variable (8-bit slot).
    /// Operand: u8 slot index
    SetLocal,
    /// Load local variable (16-bit slot).
    /// Operand: u16 slot index
    GetLocalWide,
    /// Pop into local variable (16-bit slot).
    /// Operand: u16 slot index
    SetLocalWide,

    // =========================================================================
    // Module Fields
    // =========================================================================
    /// Load a module field.
    /// Operand: u16 constant index (Field)
    GetGlobal,
    /// Pop into a module field.
    /// Operand: u16 constant index (Field)
    SetGlobal,

    // =========================================================================
    // Boxing
    // =========================================================================
    /// Primitive -> boxed Integer.
    BoxInt,
    /// Boxed Integer -> primitive.
    UnboxInt,
    /// Primitive (0/1) -> canonical boxed Boolean.
    BoxBool,
    /// Boxed Boolean -> primitive 0/1.
    UnboxBool,
    /// Check that the reference on top matches a descriptor.
    /// Operand: u16 constant index (Descriptor)
    CheckCast,

    // =========================================================================
    // Arithmetic (primitive operands)
    // =========================================================================
    AddI32,
    SubI32,
    MulI32,
    DivI32,

    // =========================================================================
    // Control Flow
    // =========================================================================
    /// Unconditional forward jump.
    /// Operand: u16 offset (relative to after the operand)
    Jump,
    /// Pop a primitive, jump if zero.
    /// Operand: u16 offset
    JumpIfFalse,
    /// Pop a primitive, jump if non-zero.
    /// Operand: u16 offset
    JumpIfTrue,
    /// Pop two primitives `a b`, jump if `a < b`.
    /// Operand: u16 offset
    JumpIfLt,
    /// Pop two primitives, jump if `a > b`.
    JumpIfGt,
    /// Pop two primitives, jump if `a <= b`.
    JumpIfLe,
    /// Pop two primitives, jump if `a >= b`.
    JumpIfGe,
    /// Pop two primitives, jump if `a == b`.
    JumpIfEq,

    // =========================================================================
    // Calls
    // =========================================================================
    /// Direct call.
    /// Operand: u16 constant index (Function), u8 argument count
    Call,
    /// Return the value on top of the stack.
    Return,
    /// Return without a value.
    ReturnVoid,
}

impl OpCode {
    /// Convert from u8, returning None for invalid values.
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::try_from(value).ok()
    }

    /// Size of the inline operands in bytes, not counting the opcode itself.
    pub fn operand_size(&self) -> usize {
        match self {
            OpCode::PushZero
            | OpCode::PushOne
            | OpCode::BoxInt
            | OpCode::UnboxInt
            | OpCode::BoxBool
            | OpCode::UnboxBool
            | OpCode::AddI32
            | OpCode::SubI32
            | OpCode::MulI32
            | OpCode::DivI32
            | OpCode::Return
            | OpCode::ReturnVoid => 0,

            OpCode::Constant | OpCode::GetLocal | OpCode::SetLocal => 1,

            OpCode::ConstantWide
            | OpCode::GetLocalWide
            | OpCode::SetLocalWide
            | OpCode::GetGlobal
            | OpCode::SetGlobal
            | OpCode::CheckCast
            | OpCode::Jump
            | OpCode::JumpIfFalse
            | OpCode::JumpIfTrue
            | OpCode::JumpIfLt
            | OpCode::JumpIfGt
            | OpCode::JumpIfLe
            | OpCode::JumpIfGe
            | OpCode::JumpIfEq => 2,

            OpCode::Call => 3,
        }
    }

    /// Whether this is a jump with a u16 forward offset.
    pub fn is_jump(&self) -> bool {
        matches!(
            self,
            OpCode::Jump
                | OpCode::JumpIfFalse
                | OpCode::JumpIfTrue
                | OpCode::JumpIfLt
                | OpCode::JumpIfGt
                | OpCode::JumpIfLe
                | OpCode::JumpIfGe
                | OpCode::JumpIfEq
        )
    }

    /// Get the name of this opcode for debugging.
    pub fn name(&self) -> &'static str {
        match self {
            OpCode::Constant => "CONSTANT",
            OpCode::ConstantWide => "CONSTANT_WIDE",
            OpCode::PushZero => "PUSH_ZERO",
            OpCode::PushOne => "PUSH_ONE",
            OpCode::GetLocal => "GET_LOCAL",
            OpCode::SetLocal => "SET_LOCAL",
            OpCode::GetLocalWide => "GET_LOCAL_WIDE",
            OpCode::SetLocalWide => "SET_LOCAL_WIDE",
            OpCode::GetGlobal => "GET_GLOBAL",
            OpCode::SetGlobal => "SET_GLOBAL",
            OpCode::BoxInt => "BOX_INT",
            OpCode::UnboxInt => "UNBOX_INT",
            OpCode::BoxBool => "BOX_BOOL",
            OpCode::UnboxBool => "UNBOX_BOOL",
            OpCode::CheckCast => "CHECK_CAST",
            OpCode::AddI32 => "ADD_I32",
            OpCode::SubI32 => "SUB_I32",
            OpCode::MulI32 => "MUL_I32",
            OpCode::DivI32 => "DIV_I32",
            OpCode::Jump => "JUMP",
            OpCode::JumpIfFalse => "JUMP_IF_FALSE",
            OpCode::JumpIfTrue => "JUMP_IF_TRUE",
            OpCode::JumpIfLt => "JUMP_IF_LT",
            OpCode::JumpIfGt => "JUMP_IF_GT",
            OpCode::JumpIfLe => "JUMP_IF_LE",
            OpCode::JumpIfGe => "JUMP_IF_GE",
            OpCode::JumpIfEq => "JUMP_IF_EQ",
            OpCode::Call => "CALL",
            OpCode::Return => "RETURN",
            OpCode::ReturnVoid => "RETURN_VOID",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_repr() {
        assert_eq!(OpCode::Constant as u8, 0);
        assert_eq!(OpCode::ConstantWide as u8, 1);
    }

    #[test]
    fn opcode_from_u8() {
        assert_eq!(OpCode::from_u8(0), Some(OpCode::Constant));
        assert_eq!(OpCode::from_u8(OpCode::ReturnVoid as u8), Some(OpCode::ReturnVoid));
        assert_eq!(OpCode::from_u8(OpCode::ReturnVoid as u8 + 1), None);
        assert_eq!(OpCode::from_u8(255), None);
    }

    #[test]
    fn opcode_name() {
        assert_eq!(OpCode::AddI32.name(), "ADD_I32");
        assert_eq!(OpCode::JumpIfFalse.name(), "JUMP_IF_FALSE");
        assert_eq!(OpCode::CheckCast.name(), "CHECK_CAST");
    }

    #[test]
    fn operand_sizes() {
        assert_eq!(OpCode::BoxInt.operand_size(), 0);
        assert_eq!(OpCode::Return.operand_size(), 0);
        assert_eq!(OpCode::Constant.operand_size(), 1);
        assert_eq!(OpCode::GetLocal.operand_size(), 1);
        assert_eq!(OpCode::GetGlobal.operand_size(), 2);
        assert_eq!(OpCode::JumpIfLe.operand_size(), 2);
        assert_eq!(OpCode::Call.operand_size(), 3);
    }

    #[test]
    fn jumps_are_classified() {
        assert!(OpCode::Jump.is_jump());
        assert!(OpCode::JumpIfEq.is_jump());
        assert!(!OpCode::Call.is_jump());
    }
}
