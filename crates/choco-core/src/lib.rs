//! Core types shared by every stage of the choco toolchain.
//!
//! - [`ast`]: the parsed, scope-resolved input program
//! - [`span`]: source locations for diagnostics
//! - [`symbol_hash`]: deterministic identity for functions and fields
//! - [`error`]: phase-specific error enums

pub mod ast;
pub mod error;
pub mod span;
pub mod symbol_hash;

pub use ast::{
    BinaryOp, DeclarationKind, Expr, ExprKind, FunDefinition, Import, Item, Program,
    ValDefinition,
};
pub use error::{CodegenError, RuntimeError, TypeError};
pub use span::Span;
pub use symbol_hash::SymbolHash;
