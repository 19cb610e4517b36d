//! Type inference.
//!
//! [`Inferencer`] walks the untyped tree and produces a [`TypedExpr`] for each
//! expression, binding holes as it goes. It is fail-fast: the first
//! [`TypeError`] aborts the walk.
//!
//! ## Levels
//!
//! Every hole remembers the level it was created at. `let` values and
//! function bodies are checked one level deeper than their surroundings;
//! when a `let` value is generalized, only holes still unbound at a deeper
//! level than the binding are quantified. See [`InferContext::generalize`].
//!
//! Top-level definitions are handled in [`definition`].

mod definition;

pub use definition::check_program;

use choco_core::ast::{BinaryOp, Expr, ExprKind};
use choco_core::{Span, TypeError};

use crate::env::{self, Locals, ModuleEnv};
use crate::typed::{TypedExpr, TypedExprKind};
use crate::types::{InferContext, Scheme, Type};

/// Inference state for one program.
#[derive(Debug, Default)]
pub struct Inferencer {
    ctx: InferContext,
    module: ModuleEnv,
    bound: Vec<BoundName>,
}

/// A parameter or `let` name whose type may only become `Void` after it was
/// bound. Rechecked by [`Inferencer::check_bound_names`].
#[derive(Debug)]
struct BoundName {
    construct: String,
    ty: Type,
    span: Span,
}

impl Inferencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context(&self) -> &InferContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut InferContext {
        &mut self.ctx
    }

    pub fn module(&self) -> &ModuleEnv {
        &self.module
    }

    /// Infer the type of `expr` with `locals` in scope.
    pub fn infer_expr(&mut self, locals: &Locals, expr: &Expr) -> Result<TypedExpr, TypeError> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Variable { name, kind } => {
                let scheme = env::lookup(locals, &self.module, name)
                    .cloned()
                    .ok_or_else(|| TypeError::UnboundVariable {
                        name: name.clone(),
                        span,
                    })?;
                let ty = self.ctx.instantiate(&scheme);
                Ok(TypedExpr::new(
                    ty,
                    TypedExprKind::Variable {
                        name: name.clone(),
                        kind: *kind,
                    },
                    span,
                ))
            }

            ExprKind::Int(value) => Ok(TypedExpr::new(Type::Int, TypedExprKind::Int(*value), span)),
            ExprKind::Bool(value) => {
                Ok(TypedExpr::new(Type::Bool, TypedExprKind::Bool(*value), span))
            }
            ExprKind::Str(value) => Ok(TypedExpr::new(
                Type::String,
                TypedExprKind::Str(value.clone()),
                span,
            )),

            ExprKind::Binary { op, left, right } => self.infer_binary(locals, *op, left, right, span),

            ExprKind::Call { callee, args } => {
                let callee = self.infer_expr(locals, callee)?;
                let args = args
                    .iter()
                    .map(|arg| self.infer_expr(locals, arg))
                    .collect::<Result<Vec<_>, _>>()?;

                let ret = self.ctx.fresh_hole();
                let wanted = Type::fun(args.iter().map(|a| a.ty.clone()).collect(), ret.clone());
                self.unify_at(&callee.ty, &wanted, true, span, "call")?;

                Ok(TypedExpr::new(
                    ret,
                    TypedExprKind::Call {
                        callee: Box::new(callee),
                        args,
                    },
                    span,
                ))
            }

            ExprKind::Let { bind, value, body } => {
                self.ctx.enter_level();
                let value_result = self.infer_expr(locals, value);
                self.ctx.leave_level();
                let value = value_result?;

                if self.ctx.resolve(&value.ty).is_void() {
                    return Err(TypeError::VoidBinding {
                        construct: format!("let binding '{}'", bind),
                        span,
                    });
                }
                self.bind_name(format!("let binding '{}'", bind), &value.ty, span);

                let scheme = if is_syntactic_value(&value) {
                    self.ctx.generalize(&value.ty)
                } else {
                    Scheme::mono(value.ty.clone())
                };
                log::trace!(
                    "let {}: {} ({} generalized)",
                    bind,
                    self.ctx.render(&scheme.ty),
                    scheme.vars.len()
                );

                let inner = locals.extended(bind.clone(), scheme);
                let body = self.infer_expr(&inner, body)?;
                Ok(TypedExpr::new(
                    body.ty.clone(),
                    TypedExprKind::Let {
                        bind: bind.clone(),
                        value: Box::new(value),
                        body: Box::new(body),
                    },
                    span,
                ))
            }

            ExprKind::Seq { left, right } => {
                let left = self.infer_expr(locals, left)?;
                self.unify_at(&Type::Void, &left.ty, true, left.span, "sequence")?;
                let right = self.infer_expr(locals, right)?;
                Ok(TypedExpr::new(
                    right.ty.clone(),
                    TypedExprKind::Seq {
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    span,
                ))
            }

            ExprKind::Mutable(base) => {
                let base = self.infer_expr(locals, base)?;
                Ok(TypedExpr::new(
                    Type::mutable(base.ty.clone()),
                    TypedExprKind::Mutable(Box::new(base)),
                    span,
                ))
            }

            ExprKind::Deref(cell) => {
                let cell = self.infer_expr(locals, cell)?;
                let inner = self.ctx.fresh_hole();
                self.unify_at(&Type::mutable(inner.clone()), &cell.ty, false, span, "deref")?;
                Ok(TypedExpr::new(inner, TypedExprKind::Deref(Box::new(cell)), span))
            }

            ExprKind::If {
                cond,
                then,
                otherwise,
            } => {
                let cond = self.infer_expr(locals, cond)?;
                self.unify_at(&Type::Bool, &cond.ty, false, cond.span, "if condition")?;
                let then = self.infer_expr(locals, then)?;
                let otherwise = self.infer_expr(locals, otherwise)?;
                self.unify_at(&then.ty, &otherwise.ty, true, span, "if expression")?;
                Ok(TypedExpr::new(
                    then.ty.clone(),
                    TypedExprKind::If {
                        cond: Box::new(cond),
                        then: Box::new(then),
                        otherwise: Box::new(otherwise),
                    },
                    span,
                ))
            }

            ExprKind::Lambda { params, body } => {
                let mut inner = locals.clone();
                let mut param_types = Vec::with_capacity(params.len());
                for param in params {
                    let hole = self.ctx.fresh_hole();
                    self.bind_name(format!("lambda parameter '{}'", param), &hole, span);
                    inner = inner.extended(param.clone(), Scheme::mono(hole.clone()));
                    param_types.push(hole);
                }
                let body = self.infer_expr(&inner, body)?;
                Ok(TypedExpr::new(
                    Type::fun(param_types, body.ty.clone()),
                    TypedExprKind::Lambda {
                        params: params.clone(),
                        body: Box::new(body),
                    },
                    span,
                ))
            }
        }
    }

    fn infer_binary(
        &mut self,
        locals: &Locals,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        span: Span,
    ) -> Result<TypedExpr, TypeError> {
        let left = self.infer_expr(locals, left)?;
        let right = self.infer_expr(locals, right)?;
        let construct = format!("'{}' expression", op);

        let ty = match op {
            BinaryOp::Set => {
                let content = self.ctx.fresh_hole();
                self.unify_at(&Type::mutable(content.clone()), &left.ty, false, left.span, &construct)?;
                self.unify_at(&content, &right.ty, false, right.span, &construct)?;
                Type::Void
            }
            BinaryOp::And | BinaryOp::Or => {
                self.unify_at(&Type::Bool, &left.ty, false, left.span, &construct)?;
                self.unify_at(&Type::Bool, &right.ty, false, right.span, &construct)?;
                Type::Bool
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                self.unify_at(&Type::Int, &left.ty, false, left.span, &construct)?;
                self.unify_at(&Type::Int, &right.ty, false, right.span, &construct)?;
                Type::Int
            }
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge | BinaryOp::Eql => {
                self.unify_at(&Type::Int, &left.ty, false, left.span, &construct)?;
                self.unify_at(&Type::Int, &right.ty, false, right.span, &construct)?;
                Type::Bool
            }
        };

        Ok(TypedExpr::new(
            ty,
            TypedExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            span,
        ))
    }

    fn bind_name(&mut self, construct: String, ty: &Type, span: Span) {
        self.bound.push(BoundName {
            construct,
            ty: ty.clone(),
            span,
        });
    }

    /// Fail if any name bound since `from` has since been unified with `Void`.
    fn check_bound_names(&self, from: usize) -> Result<(), TypeError> {
        match self.bound[from..]
            .iter()
            .find(|b| self.ctx.resolve(&b.ty).is_void())
        {
            Some(b) => Err(TypeError::VoidBinding {
                construct: b.construct.clone(),
                span: b.span,
            }),
            None => Ok(()),
        }
    }

    fn unify_at(
        &mut self,
        expected: &Type,
        actual: &Type,
        unify_void: bool,
        span: Span,
        construct: &str,
    ) -> Result<(), TypeError> {
        self.ctx
            .unify(expected, actual, unify_void)
            .map_err(|err| err.at(span, construct))
    }
}

/// Values that may be generalized: evaluating them allocates nothing.
fn is_syntactic_value(expr: &TypedExpr) -> bool {
    matches!(
        expr.kind,
        TypedExprKind::Int(_)
            | TypedExprKind::Bool(_)
            | TypedExprKind::Str(_)
            | TypedExprKind::Variable { .. }
            | TypedExprKind::Lambda { .. }
    )
}
