//! Error types for every phase of the toolchain.
//!
//! ## Error Hierarchy
//!
//! ```text
//! TypeError     - inference failures (unbound names, mismatches, arity, void, occurs-check)
//! CodegenError  - well-typed trees the backend cannot lower, or broken invariants
//! RuntimeError  - failures while interpreting a compiled module
//! ```
//!
//! Compilation is fail-fast: the first `TypeError` aborts before any code is
//! generated, and the first `CodegenError` aborts before a module is produced.
//! The top-level wrapper lives in the `choco` crate.

use thiserror::Error;

use crate::Span;

// ============================================================================
// Inference Errors
// ============================================================================

/// Errors raised while inferring types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// A name is bound in neither the lexical nor the module environment.
    #[error("at {span}: unbound variable '{name}'")]
    UnboundVariable {
        /// The name that was looked up.
        name: String,
        /// Where the name was referenced.
        span: Span,
    },

    /// Two types that must agree do not.
    #[error("at {span}: type mismatch between '{expected}' and '{actual}'")]
    TypeMismatch {
        /// The rendered type that was required.
        expected: String,
        /// The rendered type that was found.
        actual: String,
        /// The expression being checked.
        span: Span,
    },

    /// Two function types with different parameter counts.
    #[error("at {span}: arity mismatch, expected {expected} argument(s), got {actual}")]
    ArityMismatch {
        /// Parameter count of the expected function type.
        expected: usize,
        /// Parameter count of the actual function type.
        actual: usize,
        /// The expression being checked.
        span: Span,
    },

    /// A valueless (`Void`) result would be bound to a name.
    #[error("at {span}: cannot bind a void value in {construct}")]
    VoidBinding {
        /// The construct that tried to bind the value.
        construct: String,
        /// Where the binding happens.
        span: Span,
    },

    /// Binding a hole would make a type contain itself.
    #[error("at {span}: infinite type, '{hole}' occurs in '{ty}'")]
    InfiniteType {
        /// The rendered hole.
        hole: String,
        /// The rendered type the hole occurs in.
        ty: String,
        /// The expression being checked.
        span: Span,
    },

    /// A top-level name was defined twice.
    #[error("at {span}: duplicate definition '{name}'")]
    DuplicateDefinition {
        /// The duplicated name.
        name: String,
        /// Where the second definition appears.
        span: Span,
    },
}

impl TypeError {
    /// Get the span where this error occurred.
    pub fn span(&self) -> Span {
        match self {
            TypeError::UnboundVariable { span, .. } => *span,
            TypeError::TypeMismatch { span, .. } => *span,
            TypeError::ArityMismatch { span, .. } => *span,
            TypeError::VoidBinding { span, .. } => *span,
            TypeError::InfiniteType { span, .. } => *span,
            TypeError::DuplicateDefinition { span, .. } => *span,
        }
    }
}

// ============================================================================
// Code Generation Errors
// ============================================================================

/// Errors raised while lowering a typed program to bytecode.
///
/// None of these are recoverable user errors: they mark the gap between
/// programs the type system accepts and programs the backend can compile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodegenError {
    /// An expression shape the backend does not lower (lambdas, functions used as values).
    #[error("at {span}: cannot compile {construct}")]
    UnsupportedExpression {
        /// Description of the construct.
        construct: String,
        /// Where it appears.
        span: Span,
    },

    /// A call whose callee is not a statically known top-level function.
    #[error("at {span}: illegal callee {callee}, only top-level functions can be called")]
    IllegalCallee {
        /// Description of the callee expression.
        callee: String,
        /// Where the call appears.
        span: Span,
    },

    /// The typed tree violates an invariant inference should guarantee.
    #[error("internal codegen error: {message}")]
    Internal {
        /// What went wrong.
        message: String,
    },
}

impl CodegenError {
    /// Shorthand for an [`CodegenError::Internal`] error.
    pub fn internal(message: impl Into<String>) -> Self {
        CodegenError::Internal {
            message: message.into(),
        }
    }

    /// Get the span where this error occurred.
    pub fn span(&self) -> Span {
        match self {
            CodegenError::UnsupportedExpression { span, .. } => *span,
            CodegenError::IllegalCallee { span, .. } => *span,
            CodegenError::Internal { .. } => Span::default(),
        }
    }
}

// ============================================================================
// Runtime Errors
// ============================================================================

/// Errors raised by the interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// A value of the wrong kind reached an instruction.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The expected kind or descriptor.
        expected: String,
        /// The kind that was found.
        actual: String,
    },

    /// Integer division by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// An instruction popped from an empty operand stack.
    #[error("operand stack underflow in '{function}'")]
    StackUnderflow {
        /// The function being executed.
        function: String,
    },

    /// A local slot was read before anything was stored in it.
    #[error("local slot {slot} read before initialization in '{function}'")]
    UninitializedLocal {
        /// The slot index.
        slot: u32,
        /// The function being executed.
        function: String,
    },

    /// A byte that is not an opcode.
    #[error("invalid opcode {byte:#04x} at offset {offset} in '{function}'")]
    InvalidOpcode {
        /// The offending byte.
        byte: u8,
        /// Its offset in the code.
        offset: usize,
        /// The function being executed.
        function: String,
    },

    /// Code ended in the middle of an instruction or without returning.
    #[error("truncated bytecode at offset {offset} in '{function}'")]
    TruncatedCode {
        /// Where decoding stopped.
        offset: usize,
        /// The function being executed.
        function: String,
    },

    /// A constant-pool index that does not exist or has the wrong kind.
    #[error("invalid constant #{index}: {reason}")]
    InvalidConstant {
        /// The constant-pool index.
        index: u32,
        /// Why it could not be used.
        reason: String,
    },

    /// A function that the module does not define.
    #[error("unknown function '{name}'")]
    UnknownFunction {
        /// The name (and descriptor, when known).
        name: String,
    },

    /// A field that the module does not define.
    #[error("unknown field '{name}'")]
    UnknownField {
        /// The field name.
        name: String,
    },

    /// A field was read before the static initializer stored it.
    #[error("field '{name}' read before initialization")]
    UninitializedField {
        /// The field name.
        name: String,
    },

    /// A function was invoked with the wrong number of arguments.
    #[error("'{function}' expects {expected} argument(s), got {actual}")]
    ArgumentCount {
        /// The function name.
        function: String,
        /// Declared parameter count.
        expected: usize,
        /// Supplied argument count.
        actual: usize,
    },

    /// Too many nested calls.
    #[error("call depth limit of {limit} exceeded")]
    CallDepthExceeded {
        /// The configured limit.
        limit: usize,
    },
}
