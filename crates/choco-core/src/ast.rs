//! Parsed, scope-resolved program tree.
//!
//! The scanner, parser and scope resolver live outside this repository. They
//! hand the compiler a [`Program`] in which every [`ExprKind::Variable`] is
//! already tagged with the [`DeclarationKind`] of the name it refers to.
//!
//! Programs can also be assembled directly with the constructor helpers on
//! [`Expr`], [`FunDefinition`] and [`ValDefinition`]:
//!
//! ```
//! use choco_core::ast::{BinaryOp, Expr, FunDefinition, Item, Program};
//!
//! // fun add(x, y) = x + y
//! let add = FunDefinition::new(
//!     "add",
//!     ["x", "y"],
//!     Expr::binary(BinaryOp::Add, Expr::local("x"), Expr::local("y")),
//! );
//! let program = Program::new("demo", vec![Item::Fun(add)]);
//! assert_eq!(program.items.len(), 1);
//! ```

use std::fmt;

use crate::Span;

/// How a name was declared, as decided by the scope resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    /// A top-level value definition (`val`).
    Val,
    /// A top-level function definition (`fun`).
    Fun,
    /// A parameter or `let`-bound local.
    Var,
}

/// Binary operators, including assignment to a mutable cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    /// `cell <- value`
    Set,
    Lt,
    Gt,
    Le,
    Ge,
    Eql,
    And,
    Or,
}

impl BinaryOp {
    /// Source spelling of the operator.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Set => "<-",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Eql => "==",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div
        )
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge | BinaryOp::Eql
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// An expression with its source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

/// Expression variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// A name reference, tagged by the scope resolver.
    Variable { name: String, kind: DeclarationKind },
    /// Integer literal.
    Int(i32),
    /// Boolean literal.
    Bool(bool),
    /// String literal.
    Str(String),
    /// `left <op> right`
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `callee(args...)`
    Call { callee: Box<Expr>, args: Vec<Expr> },
    /// `let bind = value in body`
    Let {
        bind: String,
        value: Box<Expr>,
        body: Box<Expr>,
    },
    /// `left; right` where `left` must be valueless.
    Seq { left: Box<Expr>, right: Box<Expr> },
    /// `mutable base`
    Mutable(Box<Expr>),
    /// `deref cell`
    Deref(Box<Expr>),
    /// `if cond then then else otherwise`
    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// `->(params) { body }`
    Lambda { params: Vec<String>, body: Box<Expr> },
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Replace the span of this expression.
    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn var(name: impl Into<String>, kind: DeclarationKind) -> Self {
        Self::new(
            ExprKind::Variable {
                name: name.into(),
                kind,
            },
            Span::default(),
        )
    }

    /// Reference to a parameter or `let` binding.
    pub fn local(name: impl Into<String>) -> Self {
        Self::var(name, DeclarationKind::Var)
    }

    /// Reference to a top-level function.
    pub fn fun_ref(name: impl Into<String>) -> Self {
        Self::var(name, DeclarationKind::Fun)
    }

    /// Reference to a top-level value.
    pub fn val_ref(name: impl Into<String>) -> Self {
        Self::var(name, DeclarationKind::Val)
    }

    pub fn int(value: i32) -> Self {
        Self::new(ExprKind::Int(value), Span::default())
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ExprKind::Bool(value), Span::default())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ExprKind::Str(value.into()), Span::default())
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Self::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            Span::default(),
        )
    }

    /// `cell <- value`
    pub fn assign(cell: Expr, value: Expr) -> Self {
        Self::binary(BinaryOp::Set, cell, value)
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Self::new(
            ExprKind::Call {
                callee: Box::new(callee),
                args,
            },
            Span::default(),
        )
    }

    /// Direct call of a top-level function by name.
    pub fn call_fun(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::call(Self::fun_ref(name), args)
    }

    pub fn let_in(bind: impl Into<String>, value: Expr, body: Expr) -> Self {
        Self::new(
            ExprKind::Let {
                bind: bind.into(),
                value: Box::new(value),
                body: Box::new(body),
            },
            Span::default(),
        )
    }

    pub fn seq(left: Expr, right: Expr) -> Self {
        Self::new(
            ExprKind::Seq {
                left: Box::new(left),
                right: Box::new(right),
            },
            Span::default(),
        )
    }

    pub fn mutable(base: Expr) -> Self {
        Self::new(ExprKind::Mutable(Box::new(base)), Span::default())
    }

    pub fn deref(cell: Expr) -> Self {
        Self::new(ExprKind::Deref(Box::new(cell)), Span::default())
    }

    pub fn if_then_else(cond: Expr, then: Expr, otherwise: Expr) -> Self {
        Self::new(
            ExprKind::If {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
            Span::default(),
        )
    }

    pub fn lambda<I, S>(params: I, body: Expr) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            ExprKind::Lambda {
                params: params.into_iter().map(Into::into).collect(),
                body: Box::new(body),
            },
            Span::default(),
        )
    }

    /// Short description of the construct, used in diagnostics.
    pub fn describe(&self) -> String {
        match &self.kind {
            ExprKind::Variable { name, .. } => format!("variable '{}'", name),
            ExprKind::Int(i) => format!("integer literal {}", i),
            ExprKind::Bool(b) => format!("boolean literal {}", b),
            ExprKind::Str(_) => "string literal".to_string(),
            ExprKind::Binary { op, .. } => format!("'{}' expression", op),
            ExprKind::Call { .. } => "call".to_string(),
            ExprKind::Let { bind, .. } => format!("let binding '{}'", bind),
            ExprKind::Seq { .. } => "sequence".to_string(),
            ExprKind::Mutable(_) => "mutable cell".to_string(),
            ExprKind::Deref(_) => "deref".to_string(),
            ExprKind::If { .. } => "if expression".to_string(),
            ExprKind::Lambda { .. } => "lambda".to_string(),
        }
    }
}

/// `fun name(params) = body`
#[derive(Debug, Clone, PartialEq)]
pub struct FunDefinition {
    pub name: String,
    pub params: Vec<String>,
    pub body: Expr,
    pub span: Span,
}

impl FunDefinition {
    pub fn new<I, S>(name: impl Into<String>, params: I, body: Expr) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            params: params.into_iter().map(Into::into).collect(),
            body,
            span: Span::default(),
        }
    }
}

/// `val name = value`
#[derive(Debug, Clone, PartialEq)]
pub struct ValDefinition {
    pub name: String,
    pub value: Expr,
    pub span: Span,
}

impl ValDefinition {
    pub fn new(name: impl Into<String>, value: Expr) -> Self {
        Self {
            name: name.into(),
            value,
            span: Span::default(),
        }
    }
}

/// `import name` (accepted and ignored; there is no module system).
#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub name: String,
    pub span: Span,
}

/// A top-level item.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Fun(FunDefinition),
    Val(ValDefinition),
    Import(Import),
}

impl Item {
    /// The name the item introduces, if any.
    pub fn name(&self) -> &str {
        match self {
            Item::Fun(f) => &f.name,
            Item::Val(v) => &v.name,
            Item::Import(i) => &i.name,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Item::Fun(f) => f.span,
            Item::Val(v) => v.span,
            Item::Import(i) => i.span,
        }
    }
}

/// A whole source program, in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// Package the program was declared in; names the output module.
    pub package: String,
    pub items: Vec<Item>,
}

impl Program {
    pub fn new(package: impl Into<String>, items: Vec<Item>) -> Self {
        Self {
            package: package.into(),
            items,
        }
    }
}
