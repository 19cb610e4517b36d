//! choco compiler
//!
//! Type inference and code generation for the choco language.
//!
//! ## Pipeline
//!
//! - **Inference**: walk every top-level definition in source order, binding
//!   holes by unification, then finalize the typed tree
//! - **Code generation**: lower the finalized tree to one [`CompiledModule`]
//!   for a boxed-object stack machine
//!
//! A type error aborts before code generation starts.
//!
//! ## Modules
//!
//! - [`types`]: types, the hole arena, unification, schemes and descriptors
//! - [`env`]: the two-tier type environment
//! - [`infer`]: the inference engine
//! - [`typed`]: the typed tree
//! - [`bytecode`]: opcodes, chunks and the constant pool
//! - [`emit`]: bytecode emitter with operand-stack tracking
//! - [`codegen`]: lowering of typed definitions
//! - [`module`]: compiled modules and their binary encoding

pub mod bytecode;
pub mod codegen;
pub mod emit;
pub mod env;
pub mod infer;
pub mod module;
pub mod typed;
pub mod types;

pub use bytecode::{BytecodeChunk, Constant, ConstantPool, OpCode};
pub use codegen::{CodegenOptions, generate};
pub use emit::{BytecodeEmitter, JumpLabel};
pub use env::{Locals, ModuleEnv};
pub use infer::{Inferencer, check_program};
pub use module::{CompiledFunction, CompiledModule, DecodeError, FieldEntry};
pub use typed::{TypedExpr, TypedExprKind, TypedFun, TypedItem, TypedProgram, TypedVal};
pub use types::{InferContext, Scheme, Type};

pub use choco_core::{CodegenError, TypeError};

