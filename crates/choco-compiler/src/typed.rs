//! The typed tree: output of inference, input of code generation.
//!
//! Each node mirrors an [`choco_core::ast::ExprKind`] and carries its type.
//! While inference runs those types may mention holes that a later
//! definition binds; [`TypedProgram::finalize`] resolves them all once the
//! whole program has been checked.

use choco_core::Span;
use choco_core::ast::{BinaryOp, DeclarationKind};

use crate::types::{InferContext, Type};

#[derive(Debug, Clone, PartialEq)]
pub struct TypedExpr {
    pub ty: Type,
    pub kind: TypedExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypedExprKind {
    Variable { name: String, kind: DeclarationKind },
    Int(i32),
    Bool(bool),
    Str(String),
    Binary {
        op: BinaryOp,
        left: Box<TypedExpr>,
        right: Box<TypedExpr>,
    },
    Call {
        callee: Box<TypedExpr>,
        args: Vec<TypedExpr>,
    },
    Let {
        bind: String,
        value: Box<TypedExpr>,
        body: Box<TypedExpr>,
    },
    Seq {
        left: Box<TypedExpr>,
        right: Box<TypedExpr>,
    },
    Mutable(Box<TypedExpr>),
    Deref(Box<TypedExpr>),
    If {
        cond: Box<TypedExpr>,
        then: Box<TypedExpr>,
        otherwise: Box<TypedExpr>,
    },
    Lambda {
        params: Vec<String>,
        body: Box<TypedExpr>,
    },
}

impl TypedExpr {
    pub fn new(ty: Type, kind: TypedExprKind, span: Span) -> Self {
        Self { ty, kind, span }
    }

    /// Short description of the construct, used in diagnostics.
    pub fn describe(&self) -> String {
        match &self.kind {
            TypedExprKind::Variable { name, .. } => format!("variable '{}'", name),
            TypedExprKind::Int(i) => format!("integer literal {}", i),
            TypedExprKind::Bool(b) => format!("boolean literal {}", b),
            TypedExprKind::Str(_) => "string literal".to_string(),
            TypedExprKind::Binary { op, .. } => format!("'{}' expression", op),
            TypedExprKind::Call { .. } => "call".to_string(),
            TypedExprKind::Let { bind, .. } => format!("let binding '{}'", bind),
            TypedExprKind::Seq { .. } => "sequence".to_string(),
            TypedExprKind::Mutable(_) => "mutable cell".to_string(),
            TypedExprKind::Deref(_) => "deref".to_string(),
            TypedExprKind::If { .. } => "if expression".to_string(),
            TypedExprKind::Lambda { .. } => "lambda".to_string(),
        }
    }

    fn zonk(&mut self, ctx: &InferContext) {
        self.ty = ctx.zonk(&self.ty);
        match &mut self.kind {
            TypedExprKind::Variable { .. }
            | TypedExprKind::Int(_)
            | TypedExprKind::Bool(_)
            | TypedExprKind::Str(_) => {}
            TypedExprKind::Binary { left, right, .. } | TypedExprKind::Seq { left, right } => {
                left.zonk(ctx);
                right.zonk(ctx);
            }
            TypedExprKind::Call { callee, args } => {
                callee.zonk(ctx);
                for arg in args {
                    arg.zonk(ctx);
                }
            }
            TypedExprKind::Let { value, body, .. } => {
                value.zonk(ctx);
                body.zonk(ctx);
            }
            TypedExprKind::Mutable(inner) | TypedExprKind::Deref(inner) => inner.zonk(ctx),
            TypedExprKind::If {
                cond,
                then,
                otherwise,
            } => {
                cond.zonk(ctx);
                then.zonk(ctx);
                otherwise.zonk(ctx);
            }
            TypedExprKind::Lambda { body, .. } => body.zonk(ctx),
        }
    }
}

/// A checked `fun` definition.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedFun {
    pub name: String,
    /// The full `Fun` type of the definition.
    pub ty: Type,
    pub params: Vec<String>,
    pub param_types: Vec<Type>,
    pub body: TypedExpr,
    pub span: Span,
}

impl TypedFun {
    /// The declared return type.
    pub fn return_type(&self) -> &Type {
        match &self.ty {
            Type::Fun(_, ret) => ret,
            _ => &self.body.ty,
        }
    }
}

/// A checked `val` definition.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedVal {
    pub name: String,
    pub ty: Type,
    pub value: TypedExpr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypedItem {
    Fun(TypedFun),
    Val(TypedVal),
}

impl TypedItem {
    pub fn name(&self) -> &str {
        match self {
            TypedItem::Fun(f) => &f.name,
            TypedItem::Val(v) => &v.name,
        }
    }

    pub fn ty(&self) -> &Type {
        match self {
            TypedItem::Fun(f) => &f.ty,
            TypedItem::Val(v) => &v.ty,
        }
    }
}

/// A checked program, definitions in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedProgram {
    pub package: String,
    pub items: Vec<TypedItem>,
}

impl TypedProgram {
    /// Resolve every type in the tree through the hole arena.
    pub fn finalize(mut self, ctx: &InferContext) -> Self {
        for item in &mut self.items {
            match item {
                TypedItem::Fun(f) => {
                    f.ty = ctx.zonk(&f.ty);
                    for ty in &mut f.param_types {
                        *ty = ctx.zonk(ty);
                    }
                    f.body.zonk(ctx);
                }
                TypedItem::Val(v) => {
                    v.ty = ctx.zonk(&v.ty);
                    v.value.zonk(ctx);
                }
            }
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&TypedItem> {
        self.items.iter().find(|item| item.name() == name)
    }

    pub fn function(&self, name: &str) -> Option<&TypedFun> {
        self.items.iter().find_map(|item| match item {
            TypedItem::Fun(f) if f.name == name => Some(f),
            _ => None,
        })
    }

    pub fn functions(&self) -> impl Iterator<Item = &TypedFun> {
        self.items.iter().filter_map(|item| match item {
            TypedItem::Fun(f) => Some(f),
            TypedItem::Val(_) => None,
        })
    }

    pub fn values(&self) -> impl Iterator<Item = &TypedVal> {
        self.items.iter().filter_map(|item| match item {
            TypedItem::Val(v) => Some(v),
            TypedItem::Fun(_) => None,
        })
    }
}
