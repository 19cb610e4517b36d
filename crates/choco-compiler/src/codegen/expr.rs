//! Expression lowering for one function body.

use choco_core::CodegenError;
use choco_core::ast::{BinaryOp, DeclarationKind};

use super::ModuleNames;
use super::slots::SlotAllocator;
use crate::bytecode::{ConstantPool, OpCode};
use crate::emit::BytecodeEmitter;
use crate::module::CompiledFunction;
use crate::typed::{TypedExpr, TypedExprKind, TypedVal};
use crate::types::Type;
use crate::types::descriptor::{self, CELL_DEREF, CELL_OF, CELL_SET, MUTABLE_OWNER};

pub(crate) struct FunctionCompiler<'m> {
    emitter: BytecodeEmitter<'m>,
    names: &'m ModuleNames,
    slots: SlotAllocator,
    debug_lines: bool,
}

impl<'m> FunctionCompiler<'m> {
    pub fn new(
        constants: &'m mut ConstantPool,
        names: &'m ModuleNames,
        context: &str,
        debug_lines: bool,
    ) -> Self {
        Self {
            emitter: BytecodeEmitter::new(constants, context),
            names,
            slots: SlotAllocator::new(),
            debug_lines,
        }
    }

    pub fn declare_param(&mut self, name: &str) {
        self.slots.declare_param(name);
    }

    /// Compute a top-level value and store it in its field.
    pub fn store_field(&mut self, value: &TypedVal) -> Result<(), CodegenError> {
        self.expr(&value.value)?;
        let descriptor = self.names.fields.get(&value.name).ok_or_else(|| {
            CodegenError::internal(format!("no field for value '{}'", value.name))
        })?;
        self.emitter
            .emit_set_global(&self.names.owner, &value.name, descriptor);
        Ok(())
    }

    pub fn emit_return(&mut self, ty: &Type) {
        if ty.is_void() {
            self.emitter.emit_return_void();
        } else {
            self.emitter.emit_return();
        }
    }

    pub fn finish(
        self,
        name: &str,
        ty: &Type,
        param_count: u8,
    ) -> Result<CompiledFunction, CodegenError> {
        let max_locals = u16::try_from(self.slots.max_locals())
            .map_err(|_| CodegenError::internal(format!("too many locals in '{}'", name)))?;
        let emitted = self.emitter.finish()?;
        Ok(CompiledFunction {
            name: name.to_string(),
            descriptor: descriptor::descriptor(ty),
            signature: descriptor::signature(ty),
            param_count,
            max_locals,
            max_stack: emitted.max_stack,
            bytecode: emitted.chunk,
        })
    }

    /// Generate `expr`, leaving one boxed value on the stack unless its type is `Void`.
    pub fn expr(&mut self, expr: &TypedExpr) -> Result<(), CodegenError> {
        if self.debug_lines && expr.span.is_known() {
            self.emitter.set_line(expr.span.line);
        }

        match &expr.kind {
            TypedExprKind::Variable { name, kind } => self.variable(name, *kind, expr),

            TypedExprKind::Int(value) => {
                self.emitter.emit_int(*value);
                self.emitter.emit_box_int();
                Ok(())
            }
            TypedExprKind::Bool(value) => {
                self.emitter.emit_bool(*value);
                self.emitter.emit_box_bool();
                Ok(())
            }
            TypedExprKind::Str(value) => {
                self.emitter.emit_string(value);
                Ok(())
            }

            TypedExprKind::Binary { op, left, right } => self.binary(*op, left, right),

            TypedExprKind::Call { callee, args } => {
                let name = match &callee.kind {
                    TypedExprKind::Variable {
                        name,
                        kind: DeclarationKind::Fun,
                    } => name,
                    _ => {
                        return Err(CodegenError::IllegalCallee {
                            callee: callee.describe(),
                            span: callee.span,
                        });
                    }
                };
                let names = self.names;
                let target = names.functions.get(name).ok_or_else(|| {
                    CodegenError::internal(format!("call of undeclared function '{}'", name))
                })?;
                for arg in args {
                    self.expr(arg)?;
                }
                self.emitter.emit_call(
                    &names.owner,
                    name,
                    &target.descriptor,
                    args.len(),
                    target.returns_value,
                );
                Ok(())
            }

            TypedExprKind::Let { bind, value, body } => {
                if value.ty.is_void() {
                    return Err(CodegenError::UnsupportedExpression {
                        construct: format!("void value bound to '{}'", bind),
                        span: expr.span,
                    });
                }
                self.expr(value)?;
                let slot = self.slots.begin_let(bind);
                self.emitter.emit_set_local(slot);
                let result = self.expr(body);
                self.slots.end_let();
                result
            }

            TypedExprKind::Seq { left, right } => {
                self.expr(left)?;
                self.expr(right)
            }

            TypedExprKind::Mutable(base) => {
                if base.ty.is_void() {
                    return Err(CodegenError::UnsupportedExpression {
                        construct: "mutable cell holding a void value".to_string(),
                        span: expr.span,
                    });
                }
                self.expr(base)?;
                self.cell_call(CELL_OF, 1, true);
                Ok(())
            }

            TypedExprKind::Deref(cell) => {
                self.expr(cell)?;
                self.cell_call(CELL_DEREF, 1, true);
                if descriptor::needs_cast(&expr.ty) {
                    self.emitter
                        .emit_check_cast(&descriptor::descriptor(&expr.ty));
                }
                Ok(())
            }

            TypedExprKind::If {
                cond,
                then,
                otherwise,
            } => {
                self.expr(cond)?;
                self.emitter.emit_unbox_bool();
                let else_jump = self.emitter.emit_jump(OpCode::JumpIfFalse);
                self.expr(then)?;
                let end_jump = self.emitter.emit_jump(OpCode::Jump);
                self.emitter.patch_jump(else_jump);
                self.expr(otherwise)?;
                self.emitter.patch_jump(end_jump);
                Ok(())
            }

            TypedExprKind::Lambda { .. } => Err(CodegenError::UnsupportedExpression {
                construct: "lambda".to_string(),
                span: expr.span,
            }),
        }
    }

    fn variable(
        &mut self,
        name: &str,
        kind: DeclarationKind,
        expr: &TypedExpr,
    ) -> Result<(), CodegenError> {
        match kind {
            DeclarationKind::Var => {
                let slot = self.slots.lookup(name).ok_or_else(|| {
                    CodegenError::internal(format!("no slot for local '{}'", name))
                })?;
                self.emitter.emit_get_local(slot);
            }
            DeclarationKind::Val => {
                let descriptor = self.names.fields.get(name).ok_or_else(|| {
                    CodegenError::internal(format!("no field for value '{}'", name))
                })?;
                self.emitter
                    .emit_get_global(&self.names.owner, name, descriptor);
            }
            DeclarationKind::Fun => {
                return Err(CodegenError::UnsupportedExpression {
                    construct: format!("function '{}' used as a value", name),
                    span: expr.span,
                });
            }
        }
        Ok(())
    }

    fn binary(
        &mut self,
        op: BinaryOp,
        left: &TypedExpr,
        right: &TypedExpr,
    ) -> Result<(), CodegenError> {
        match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                self.expr(left)?;
                self.emitter.emit_unbox_int();
                self.expr(right)?;
                self.emitter.emit_unbox_int();
                self.emitter.emit_arithmetic(match op {
                    BinaryOp::Add => OpCode::AddI32,
                    BinaryOp::Sub => OpCode::SubI32,
                    BinaryOp::Mul => OpCode::MulI32,
                    _ => OpCode::DivI32,
                });
                self.emitter.emit_box_int();
            }

            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge | BinaryOp::Eql => {
                self.expr(left)?;
                self.emitter.emit_unbox_int();
                self.expr(right)?;
                self.emitter.emit_unbox_int();
                let jump = match op {
                    BinaryOp::Lt => OpCode::JumpIfLt,
                    BinaryOp::Gt => OpCode::JumpIfGt,
                    BinaryOp::Le => OpCode::JumpIfLe,
                    BinaryOp::Ge => OpCode::JumpIfGe,
                    _ => OpCode::JumpIfEq,
                };
                let yes = self.emitter.emit_jump(jump);
                self.emitter.emit_bool(false);
                let end = self.emitter.emit_jump(OpCode::Jump);
                self.emitter.patch_jump(yes);
                self.emitter.emit_bool(true);
                self.emitter.patch_jump(end);
                self.emitter.emit_box_bool();
            }

            // a && b: any false operand jumps straight to the shared false exit
            BinaryOp::And => {
                self.expr(left)?;
                self.emitter.emit_unbox_bool();
                let left_false = self.emitter.emit_jump(OpCode::JumpIfFalse);
                self.expr(right)?;
                self.emitter.emit_unbox_bool();
                let right_false = self.emitter.emit_jump(OpCode::JumpIfFalse);
                self.emitter.emit_bool(true);
                let end = self.emitter.emit_jump(OpCode::Jump);
                self.emitter.patch_jump(left_false);
                self.emitter.patch_jump(right_false);
                self.emitter.emit_bool(false);
                self.emitter.patch_jump(end);
                self.emitter.emit_box_bool();
            }

            BinaryOp::Or => {
                self.expr(left)?;
                self.emitter.emit_unbox_bool();
                let left_true = self.emitter.emit_jump(OpCode::JumpIfTrue);
                self.expr(right)?;
                self.emitter.emit_unbox_bool();
                let right_true = self.emitter.emit_jump(OpCode::JumpIfTrue);
                self.emitter.emit_bool(false);
                let end = self.emitter.emit_jump(OpCode::Jump);
                self.emitter.patch_jump(left_true);
                self.emitter.patch_jump(right_true);
                self.emitter.emit_bool(true);
                self.emitter.patch_jump(end);
                self.emitter.emit_box_bool();
            }

            BinaryOp::Set => {
                self.expr(left)?;
                self.expr(right)?;
                self.cell_call(CELL_SET, 2, false);
            }
        }
        Ok(())
    }

    fn cell_call(&mut self, (name, descriptor): (&str, &str), args: usize, returns_value: bool) {
        self.emitter
            .emit_call(MUTABLE_OWNER, name, descriptor, args, returns_value);
    }
}

#[cfg(test)]
mod tests {
    use choco_core::CodegenError;
    use choco_core::ast::{BinaryOp, Expr, FunDefinition, Item, Program};

    use crate::bytecode::OpCode::{self, *};
    use crate::codegen::{CodegenOptions, generate};
    use crate::infer::check_program;
    use crate::module::CompiledModule;

    fn compile_fun(params: &[&str], body: Expr) -> Result<CompiledModule, CodegenError> {
        let program = Program::new(
            "t",
            vec![Item::Fun(FunDefinition::new("f", params.iter().copied(), body))],
        );
        let typed = check_program(&program).unwrap();
        generate(&typed, &CodegenOptions::default())
    }

    fn opcodes(params: &[&str], body: Expr) -> Vec<OpCode> {
        compile_fun(params, body)
            .unwrap()
            .function("f")
            .unwrap()
            .bytecode
            .opcodes()
    }

    #[test]
    fn arithmetic_unboxes_and_reboxes() {
        let ops = opcodes(
            &["x"],
            Expr::binary(BinaryOp::Mul, Expr::local("x"), Expr::int(3)),
        );
        assert_eq!(
            ops,
            vec![GetLocal, UnboxInt, Constant, BoxInt, UnboxInt, MulI32, BoxInt, Return]
        );
    }

    #[test]
    fn if_converges_with_one_boxed_value() {
        let module = compile_fun(
            &[],
            Expr::if_then_else(Expr::bool(true), Expr::int(1), Expr::int(2)),
        )
        .unwrap();
        let f = module.function("f").unwrap();
        f.bytecode.assert_opcodes(&[
            PushOne, BoxBool, UnboxBool, JumpIfFalse, PushOne, BoxInt, Jump, Constant, BoxInt,
            Return,
        ]);
        assert_eq!(f.max_stack, 1);
    }

    #[test]
    fn comparison_pushes_canonical_booleans() {
        let ops = opcodes(
            &["a", "b"],
            Expr::binary(BinaryOp::Le, Expr::local("a"), Expr::local("b")),
        );
        assert_eq!(
            ops,
            vec![
                GetLocal, UnboxInt, GetLocal, UnboxInt, JumpIfLe, PushZero, Jump, PushOne,
                BoxBool, Return
            ]
        );
    }

    #[test]
    fn and_short_circuits() {
        let ops = opcodes(
            &["a", "b"],
            Expr::binary(BinaryOp::And, Expr::local("a"), Expr::local("b")),
        );
        assert_eq!(
            ops,
            vec![
                GetLocal, UnboxBool, JumpIfFalse, GetLocal, UnboxBool, JumpIfFalse, PushOne,
                Jump, PushZero, BoxBool, Return
            ]
        );
    }

    #[test]
    fn or_short_circuits() {
        let module = compile_fun(
            &["a", "b"],
            Expr::binary(BinaryOp::Or, Expr::local("a"), Expr::local("b")),
        )
        .unwrap();
        module.function("f").unwrap().bytecode.assert_contains_opcodes(&[
            JumpIfTrue, JumpIfTrue, PushZero, Jump, PushOne, BoxBool,
        ]);
    }

    #[test]
    fn counter_uses_cell_helpers() {
        let body = Expr::let_in(
            "c",
            Expr::mutable(Expr::int(0)),
            Expr::assign(
                Expr::local("c"),
                Expr::binary(BinaryOp::Add, Expr::deref(Expr::local("c")), Expr::int(1)),
            ),
        );
        let module = compile_fun(&[], body).unwrap();
        let f = module.function("f").unwrap();
        assert_eq!(f.descriptor, "()V");
        f.bytecode.assert_opcodes(&[
            PushZero, BoxInt, Call, SetLocal, GetLocal, GetLocal, Call, CheckCast, UnboxInt,
            PushOne, BoxInt, UnboxInt, AddI32, BoxInt, Call, ReturnVoid,
        ]);
        assert_eq!(f.max_locals, 1);
    }

    #[test]
    fn shadowing_let_gets_its_own_slot() {
        // let a = 1 in (let a = 2 in a) + a
        let body = Expr::let_in(
            "a",
            Expr::int(1),
            Expr::binary(
                BinaryOp::Add,
                Expr::let_in("a", Expr::int(2), Expr::local("a")),
                Expr::local("a"),
            ),
        );
        let module = compile_fun(&[], body).unwrap();
        assert_eq!(module.function("f").unwrap().max_locals, 2);
    }

    #[test]
    fn lambda_is_unsupported() {
        let err = compile_fun(&[], Expr::lambda(["x"], Expr::local("x"))).unwrap_err();
        assert!(matches!(err, CodegenError::UnsupportedExpression { .. }), "{err}");
    }

    #[test]
    fn calling_a_parameter_is_illegal() {
        let body = Expr::call(Expr::local("g"), vec![Expr::int(1)]);
        let err = compile_fun(&["g"], body).unwrap_err();
        assert!(matches!(err, CodegenError::IllegalCallee { .. }), "{err}");
    }

    #[test]
    fn function_as_value_is_unsupported() {
        let program = Program::new(
            "t",
            vec![
                Item::Fun(FunDefinition::new("g", ["x"], Expr::local("x"))),
                Item::Fun(FunDefinition::new(
                    "f",
                    Vec::<String>::new(),
                    Expr::let_in("h", Expr::fun_ref("g"), Expr::int(0)),
                )),
            ],
        );
        let typed = check_program(&program).unwrap();
        let err = generate(&typed, &CodegenOptions::default()).unwrap_err();
        assert!(matches!(err, CodegenError::UnsupportedExpression { .. }), "{err}");
    }

    #[test]
    fn string_literal_is_a_boxed_constant() {
        let ops = opcodes(&[], Expr::string("hi"));
        assert_eq!(ops, vec![Constant, Return]);
    }

    #[test]
    fn debug_lines_follow_spans() {
        use choco_core::Span;
        let program = Program::new(
            "t",
            vec![Item::Fun(FunDefinition::new(
                "f",
                Vec::<String>::new(),
                Expr::int(7).at(Span::new(3, 1, 1)),
            ))],
        );
        let typed = check_program(&program).unwrap();
        let options = CodegenOptions {
            debug_lines: true,
            ..Default::default()
        };
        let module = generate(&typed, &options).unwrap();
        assert_eq!(module.function("f").unwrap().bytecode.line_at(0), Some(3));

        let plain = generate(&typed, &CodegenOptions::default()).unwrap();
        assert_eq!(plain.function("f").unwrap().bytecode.line_at(0), Some(0));
    }
}
