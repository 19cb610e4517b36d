//! choco
//!
//! A compiler for a small expression language with Hindley-Milner type
//! inference, emitting modules for a boxed-object stack machine, plus an
//! interpreter that runs them.
//!
//! - [`compile`] / [`Compiler`]: AST in, [`CompiledModule`] out
//! - [`vm`]: load and run a compiled module
//! - [`ast`]: the input tree
//!
//! Logging goes through the `log` facade; install any logger to see phase
//! summaries at `debug` and hole bindings and calls at `trace`.

mod compiler;
pub mod vm;

pub use compiler::{ChocoError, ChocoResult, Compiler, CompilerOptions, compile};

pub use choco_core::{CodegenError, RuntimeError, Span, SymbolHash, TypeError, ast};

pub use choco_compiler::{
    BytecodeChunk, CompiledFunction, CompiledModule, Constant, ConstantPool, DecodeError,
    FieldEntry, OpCode, Type, TypedProgram, check_program, generate,
};

/// Lower-level compiler stages.
pub mod stages {
    pub use choco_compiler::{
        bytecode, codegen, emit, env, infer, module, typed, types,
    };
}

pub mod prelude {
    pub use crate::vm::{Value, Vm};
    pub use crate::{ChocoError, ChocoResult, CompiledModule, Compiler, CompilerOptions, compile};
    pub use choco_core::ast::*;
}
