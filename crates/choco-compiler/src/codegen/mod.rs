//! Code generation.
//!
//! Lowers a finalized [`TypedProgram`] into a [`CompiledModule`]. Every
//! definition is generated against one module name store:
//!
//! - `fun f` becomes a callable entry `f` with the descriptor of its type
//! - `val v` becomes a field `v`; its initializer runs in the static
//!   initializer, in declaration order
//!
//! Expression lowering lives in [`expr`]; local slots in [`slots`].

mod expr;
mod slots;

use choco_core::CodegenError;
use rustc_hash::FxHashMap;

use crate::bytecode::ConstantPool;
use crate::module::{
    CompiledFunction, CompiledModule, FieldEntry, INITIALIZER, STATIC_INITIALIZER,
};
use crate::typed::{TypedFun, TypedProgram};
use crate::types::Type;
use crate::types::descriptor::{descriptor, signature};
use expr::FunctionCompiler;

/// Options for code generation.
#[derive(Debug, Clone, Default)]
pub struct CodegenOptions {
    /// Module name; defaults to `{package}/Main`.
    pub module_name: Option<String>,
    /// Record source lines in the line table.
    pub debug_lines: bool,
}

/// A top-level function as seen from a call site.
#[derive(Debug, Clone)]
pub(crate) struct FunctionRef {
    pub descriptor: String,
    pub returns_value: bool,
}

/// Top-level names of the module being generated.
#[derive(Debug)]
pub(crate) struct ModuleNames {
    pub owner: String,
    pub functions: FxHashMap<String, FunctionRef>,
    /// Field name to descriptor.
    pub fields: FxHashMap<String, String>,
}

impl ModuleNames {
    fn collect(owner: String, program: &TypedProgram) -> Self {
        let functions = program
            .functions()
            .map(|f| {
                (
                    f.name.clone(),
                    FunctionRef {
                        descriptor: descriptor(&f.ty),
                        returns_value: !f.return_type().is_void(),
                    },
                )
            })
            .collect();
        let fields = program
            .values()
            .map(|v| (v.name.clone(), descriptor(&v.ty)))
            .collect();
        Self {
            owner,
            functions,
            fields,
        }
    }
}

/// Default module name for a package.
pub fn module_name(package: &str) -> String {
    if package.is_empty() {
        "Main".to_string()
    } else {
        format!("{}/Main", package.replace('.', "/"))
    }
}

/// Generate the module for a finalized program.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn generate(
    program: &TypedProgram,
    options: &CodegenOptions,
) -> Result<CompiledModule, CodegenError> {
    let owner = options
        .module_name
        .clone()
        .unwrap_or_else(|| module_name(&program.package));
    let names = ModuleNames::collect(owner, program);
    let mut constants = ConstantPool::new();

    let initializer = {
        let mut compiler =
            FunctionCompiler::new(&mut constants, &names, INITIALIZER, options.debug_lines);
        compiler.emit_return(&Type::Void);
        compiler.finish(INITIALIZER, &Type::fun(vec![], Type::Void), 0)?
    };

    let static_initializer = {
        let mut compiler = FunctionCompiler::new(
            &mut constants,
            &names,
            STATIC_INITIALIZER,
            options.debug_lines,
        );
        for value in program.values() {
            compiler.store_field(value)?;
        }
        compiler.emit_return(&Type::Void);
        compiler.finish(STATIC_INITIALIZER, &Type::fun(vec![], Type::Void), 0)?
    };

    let mut functions = Vec::new();
    for function in program.functions() {
        functions.push(generate_function(
            &mut constants,
            &names,
            function,
            options.debug_lines,
        )?);
    }

    let fields = program
        .values()
        .map(|v| FieldEntry {
            name: v.name.clone(),
            descriptor: descriptor(&v.ty),
            signature: signature(&v.ty),
        })
        .collect();

    log::debug!(
        "generated module {}: {} function(s), {} field(s), {} constant(s)",
        names.owner,
        functions.len(),
        program.values().count(),
        constants.len()
    );

    Ok(CompiledModule {
        name: names.owner,
        constants,
        fields,
        initializer,
        static_initializer,
        functions,
    })
}

fn generate_function(
    constants: &mut ConstantPool,
    names: &ModuleNames,
    function: &TypedFun,
    debug_lines: bool,
) -> Result<CompiledFunction, CodegenError> {
    let mut compiler = FunctionCompiler::new(constants, names, &function.name, debug_lines);
    for param in &function.params {
        compiler.declare_param(param);
    }
    compiler.expr(&function.body)?;
    compiler.emit_return(function.return_type());

    let param_count = u8::try_from(function.params.len()).map_err(|_| {
        CodegenError::internal(format!(
            "'{}' has {} parameters",
            function.name,
            function.params.len()
        ))
    })?;
    let compiled = compiler.finish(&function.name, &function.ty, param_count)?;
    log::debug!(
        "fun {}{}: {} bytes, locals {}, stack {}",
        compiled.name,
        compiled.descriptor,
        compiled.bytecode.len(),
        compiled.max_locals,
        compiled.max_stack
    );
    Ok(compiled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{Constant, OpCode};
    use crate::infer::check_program;
    use choco_core::ast::{BinaryOp, Expr, FunDefinition, Item, Program, ValDefinition};

    fn compile(items: Vec<Item>) -> Result<CompiledModule, CodegenError> {
        let typed = check_program(&Program::new("test", items)).unwrap();
        generate(&typed, &CodegenOptions::default())
    }

    fn fun(name: &str, params: &[&str], body: Expr) -> Item {
        Item::Fun(FunDefinition::new(name, params.iter().copied(), body))
    }

    fn val(name: &str, value: Expr) -> Item {
        Item::Val(ValDefinition::new(name, value))
    }

    #[test]
    fn module_layout() {
        let module = compile(vec![
            val("x", Expr::int(5)),
            fun("get", &[], Expr::val_ref("x")),
        ])
        .unwrap();

        assert_eq!(module.name, "test/Main");
        assert_eq!(module.fields.len(), 1);
        assert_eq!(module.fields[0].descriptor, "Lchoco/lang/Integer;");
        module
            .initializer
            .bytecode
            .assert_opcodes(&[OpCode::ReturnVoid]);
        module.static_initializer.bytecode.assert_opcodes(&[
            OpCode::Constant,
            OpCode::BoxInt,
            OpCode::SetGlobal,
            OpCode::ReturnVoid,
        ]);

        let get = module.function("get").unwrap();
        assert_eq!(get.descriptor, "()Lchoco/lang/Integer;");
        get.bytecode
            .assert_opcodes(&[OpCode::GetGlobal, OpCode::Return]);
    }

    #[test]
    fn module_name_override() {
        let typed = check_program(&Program::new("a.b", vec![val("x", Expr::int(1))])).unwrap();
        assert_eq!(
            generate(&typed, &CodegenOptions::default()).unwrap().name,
            "a/b/Main"
        );
        let options = CodegenOptions {
            module_name: Some("custom/Mod".to_string()),
            ..Default::default()
        };
        assert_eq!(generate(&typed, &options).unwrap().name, "custom/Mod");
    }

    #[test]
    fn call_uses_callee_descriptor() {
        let module = compile(vec![
            fun(
                "add",
                &["x", "y"],
                Expr::binary(BinaryOp::Add, Expr::local("x"), Expr::local("y")),
            ),
            fun(
                "three",
                &[],
                Expr::call_fun("add", vec![Expr::int(1), Expr::int(2)]),
            ),
        ])
        .unwrap();

        let add = module.function("add").unwrap();
        assert_eq!(
            add.descriptor,
            "(Lchoco/lang/Integer;Lchoco/lang/Integer;)Lchoco/lang/Integer;"
        );
        assert_eq!(add.param_count, 2);
        assert_eq!(add.max_locals, 2);

        let expected = Constant::function("test/Main", "add", &add.descriptor);
        assert!(module.constants.constants().contains(&expected));
    }

    #[test]
    fn unconstrained_function_uses_object() {
        let module = compile(vec![fun("k", &["x"], Expr::int(0))]).unwrap();
        assert_eq!(
            module.function("k").unwrap().descriptor,
            "(Lchoco/lang/Object;)Lchoco/lang/Integer;"
        );
    }

    #[test]
    fn mutable_field_has_generic_signature() {
        let module = compile(vec![val("c", Expr::mutable(Expr::bool(true)))]).unwrap();
        let field = module.field("c").unwrap();
        assert_eq!(field.descriptor, "Lchoco/lang/Mutable;");
        assert_eq!(field.signature, "Lchoco/lang/Mutable<Lchoco/lang/Boolean;>;");
    }

    #[test]
    fn generation_is_deterministic() {
        let items = || {
            vec![
                val("a", Expr::int(40)),
                fun(
                    "f",
                    &["n"],
                    Expr::binary(BinaryOp::Add, Expr::local("n"), Expr::val_ref("a")),
                ),
                val("b", Expr::call_fun("f", vec![Expr::int(2)])),
            ]
        };
        assert_eq!(compile(items()).unwrap(), compile(items()).unwrap());
    }
}
