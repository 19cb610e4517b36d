//! Compiled modules.
//!
//! A [`CompiledModule`] is the output of code generation for one program:
//!
//! - a trivial public initializer
//! - a static initializer that computes every `val` in declaration order
//! - one [`CompiledFunction`] per `fun`, named as in source
//! - one [`FieldEntry`] per `val`
//!
//! all sharing one [`ConstantPool`]. [`codec`] turns a module into bytes and
//! back.

pub mod codec;

pub use codec::DecodeError;

use crate::bytecode::{BytecodeChunk, ConstantPool};

/// Name of the public initializer.
pub const INITIALIZER: &str = "<init>";
/// Name of the static initializer.
pub const STATIC_INITIALIZER: &str = "<clinit>";

/// A storage field for a top-level value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEntry {
    pub name: String,
    pub descriptor: String,
    pub signature: String,
}

/// One callable entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFunction {
    pub name: String,
    pub descriptor: String,
    pub signature: String,
    pub param_count: u8,
    pub max_locals: u16,
    pub max_stack: u16,
    pub bytecode: BytecodeChunk,
}

impl CompiledFunction {
    /// Whether the function returns a value (descriptor not ending in `V`).
    pub fn returns_value(&self) -> bool {
        !self.descriptor.ends_with(")V")
    }
}

/// A compiled program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledModule {
    /// Owner name used by every symbolic reference, `package/Main`.
    pub name: String,
    pub constants: ConstantPool,
    pub fields: Vec<FieldEntry>,
    pub initializer: CompiledFunction,
    pub static_initializer: CompiledFunction,
    pub functions: Vec<CompiledFunction>,
}

impl CompiledModule {
    pub fn function(&self, name: &str) -> Option<&CompiledFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldEntry> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Encode into the binary module format.
    pub fn encode(&self) -> Vec<u8> {
        codec::encode(self)
    }

    /// Decode from the binary module format.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        codec::decode(bytes)
    }

    /// Disassembly of every function, for debugging.
    pub fn disassemble(&self) -> String {
        let mut out = format!("module {}\n", self.name);
        for field in &self.fields {
            out.push_str(&format!("field {} {}\n", field.name, field.signature));
        }
        let all = [&self.initializer, &self.static_initializer]
            .into_iter()
            .chain(self.functions.iter());
        for function in all {
            out.push_str(&format!(
                "\nfun {}{} (locals {}, stack {})\n",
                function.name, function.descriptor, function.max_locals, function.max_stack
            ));
            out.push_str(&function.bytecode.disassemble());
        }
        out
    }
}
