//! Type representation and the unification engine.
//!
//! - [`Type`]: the structural type language
//! - [`InferContext`]: the hole arena plus the current generalization level
//! - [`unify`]: structural unification with occurs-check
//! - [`Scheme`]: generalized types and instantiation
//! - [`descriptor`]: the binary encoding of types used by the output module

pub mod descriptor;
mod holes;
mod scheme;
pub mod unify;

use std::fmt;

pub use holes::{Hole, HoleId, InferContext};
pub use scheme::Scheme;
pub use unify::UnifyError;

/// A type in the choco language.
///
/// `Hole` refers to a cell in an [`InferContext`]; equality on holes is cell
/// identity (same [`HoleId`]), never the content the cell is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Bool,
    String,
    Void,
    /// A heap cell holding a value of the inner type.
    Mutable(Box<Type>),
    /// A function from the parameter types to the return type.
    Fun(Vec<Type>, Box<Type>),
    /// A unification variable.
    Hole(HoleId),
}

impl Type {
    pub fn mutable(inner: Type) -> Type {
        Type::Mutable(Box::new(inner))
    }

    pub fn fun(params: Vec<Type>, ret: Type) -> Type {
        Type::Fun(params, Box::new(ret))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    /// Whether any hole occurs anywhere in this type (without resolving).
    pub fn has_holes(&self) -> bool {
        match self {
            Type::Hole(_) => true,
            Type::Mutable(inner) => inner.has_holes(),
            Type::Fun(params, ret) => params.iter().any(Type::has_holes) || ret.has_holes(),
            Type::Int | Type::Bool | Type::String | Type::Void => false,
        }
    }
}

/// Renders the type as written, without following hole bindings.
///
/// Use [`InferContext::render`] while inference is still running; after the
/// typed tree has been finalized both renderings agree.
impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => f.write_str("Int"),
            Type::Bool => f.write_str("Bool"),
            Type::String => f.write_str("String"),
            Type::Void => f.write_str("Void"),
            Type::Mutable(inner) => write!(f, "Mutable<{}>", inner),
            Type::Fun(params, ret) => {
                f.write_str("(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ") -> {}", ret)
            }
            Type::Hole(id) => write!(f, "{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_nested_types() {
        let ty = Type::fun(
            vec![Type::Int, Type::mutable(Type::Bool)],
            Type::Void,
        );
        assert_eq!(ty.to_string(), "(Int, Mutable<Bool>) -> Void");
        assert_eq!(Type::fun(vec![], Type::Int).to_string(), "() -> Int");
    }

    #[test]
    fn has_holes_walks_structure() {
        let mut ctx = InferContext::new();
        let hole = ctx.fresh_hole();
        assert!(Type::fun(vec![Type::Int], Type::mutable(hole)).has_holes());
        assert!(!Type::fun(vec![Type::Int], Type::String).has_holes());
    }
}
