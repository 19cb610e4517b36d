//! Bytecode types for the choco compiler.
//!
//! - [`OpCode`] - The instruction set of the stack machine
//! - [`BytecodeChunk`] - Compiled bytecode for a function
//! - [`Constant`] and [`ConstantPool`] - Module-level constant storage

mod chunk;
mod constant;
mod opcode;

pub use chunk::BytecodeChunk;
pub use constant::{Constant, ConstantPool};
pub use opcode::OpCode;
