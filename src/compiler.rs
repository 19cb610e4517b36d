//! Compilation entry point.
//!
//! ```
//! use choco::{Compiler, CompilerOptions};
//! use choco::ast::{Expr, Item, Program, ValDefinition};
//!
//! let program = Program::new("demo", vec![Item::Val(ValDefinition::new("x", Expr::int(1)))]);
//! let module = Compiler::new(CompilerOptions::default().with_module_name("demo/Answers"))
//!     .compile(&program)
//!     .unwrap();
//! assert_eq!(module.name, "demo/Answers");
//! ```

use choco_compiler::{CodegenOptions, CompiledModule, DecodeError, check_program, generate};
use choco_core::ast::Program;
use choco_core::{CodegenError, RuntimeError, TypeError};
use thiserror::Error;

/// Top-level error for every phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChocoError {
    #[error("type error: {0}")]
    Type(#[from] TypeError),

    #[error("codegen error: {0}")]
    Codegen(#[from] CodegenError),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Decoding the encoded module did not give back the same module.
    #[error("module '{module}' did not survive encoding")]
    Verification { module: String },
}

pub type ChocoResult<T> = Result<T, ChocoError>;

/// Options for [`Compiler`].
#[derive(Debug, Clone, Default)]
pub struct CompilerOptions {
    /// Overrides the `{package}/Main` module name.
    pub module_name: Option<String>,
    /// Record source lines in each function's line table.
    pub debug_lines: bool,
    /// Encode the module and decode it again before returning it.
    pub verify: bool,
}

impl CompilerOptions {
    pub fn with_module_name(mut self, name: impl Into<String>) -> Self {
        self.module_name = Some(name.into());
        self
    }

    pub fn with_debug_lines(mut self, enabled: bool) -> Self {
        self.debug_lines = enabled;
        self
    }

    pub fn with_verify(mut self, enabled: bool) -> Self {
        self.verify = enabled;
        self
    }
}

/// Runs inference and code generation over whole programs.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: CompilerOptions,
}

impl Compiler {
    pub fn new(options: CompilerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Compile a program into one module.
    ///
    /// Fails on the first type error, before any code is generated.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn compile(&self, program: &Program) -> ChocoResult<CompiledModule> {
        log::debug!(
            "compiling package '{}' ({} item(s))",
            program.package,
            program.items.len()
        );
        let typed = check_program(program)?;

        let codegen = CodegenOptions {
            module_name: self.options.module_name.clone(),
            debug_lines: self.options.debug_lines,
        };
        let module = generate(&typed, &codegen)?;

        if self.options.verify {
            let decoded = CompiledModule::decode(&module.encode())?;
            if decoded != module {
                return Err(ChocoError::Verification {
                    module: module.name.clone(),
                });
            }
            log::debug!("verified module {}", module.name);
        }
        Ok(module)
    }

    /// Compile straight to the binary module format.
    pub fn compile_to_bytes(&self, program: &Program) -> ChocoResult<Vec<u8>> {
        Ok(self.compile(program)?.encode())
    }
}

/// Compile with default options.
pub fn compile(program: &Program) -> ChocoResult<CompiledModule> {
    Compiler::default().compile(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use choco_core::ast::{BinaryOp, Expr, FunDefinition, Item};

    fn add_program() -> Program {
        Program::new(
            "math",
            vec![Item::Fun(FunDefinition::new(
                "add",
                ["x", "y"],
                Expr::binary(BinaryOp::Add, Expr::local("x"), Expr::local("y")),
            ))],
        )
    }

    #[test]
    fn options_builder() {
        let options = CompilerOptions::default()
            .with_module_name("m/M")
            .with_debug_lines(true)
            .with_verify(true);
        assert_eq!(options.module_name.as_deref(), Some("m/M"));
        assert!(options.debug_lines);
        assert!(options.verify);
    }

    #[test]
    fn verified_compile() {
        let compiler = Compiler::new(CompilerOptions::default().with_verify(true));
        let module = compiler.compile(&add_program()).unwrap();
        assert_eq!(module.name, "math/Main");
        let bytes = compiler.compile_to_bytes(&add_program()).unwrap();
        assert_eq!(CompiledModule::decode(&bytes).unwrap(), module);
    }

    #[test]
    fn type_errors_are_wrapped() {
        let program = Program::new(
            "bad",
            vec![Item::Fun(FunDefinition::new(
                "f",
                Vec::<String>::new(),
                Expr::binary(BinaryOp::Add, Expr::int(1), Expr::bool(true)),
            ))],
        );
        let err = compile(&program).unwrap_err();
        assert!(matches!(err, ChocoError::Type(TypeError::TypeMismatch { .. })));
        assert!(err.to_string().starts_with("type error: "));
    }

    #[test]
    fn codegen_errors_are_wrapped() {
        let program = Program::new(
            "bad",
            vec![Item::Fun(FunDefinition::new(
                "f",
                Vec::<String>::new(),
                Expr::let_in("g", Expr::lambda(["x"], Expr::local("x")), Expr::int(0)),
            ))],
        );
        assert!(matches!(
            compile(&program),
            Err(ChocoError::Codegen(CodegenError::UnsupportedExpression { .. }))
        ));
    }
}
