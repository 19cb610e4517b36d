//! Structural unification.
//!
//! [`InferContext::unify`] makes two types equal by binding holes. It resolves
//! both sides through their bound chains first, so callers may pass types that
//! still mention solved holes.
//!
//! Unification errors carry no location. The inference engine attaches the
//! span of the expression it was checking with [`UnifyError::at`].

use choco_core::{Span, TypeError};

use super::{Hole, HoleId, InferContext, Type};

/// A unification failure, not yet tied to a source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnifyError {
    Mismatch { expected: String, actual: String },
    Arity { expected: usize, actual: usize },
    VoidBinding,
    InfiniteType { hole: String, ty: String },
}

impl UnifyError {
    /// Attach the location (and a description of the construct being checked).
    pub fn at(self, span: Span, construct: &str) -> TypeError {
        match self {
            UnifyError::Mismatch { expected, actual } => TypeError::TypeMismatch {
                expected,
                actual,
                span,
            },
            UnifyError::Arity { expected, actual } => TypeError::ArityMismatch {
                expected,
                actual,
                span,
            },
            UnifyError::VoidBinding => TypeError::VoidBinding {
                construct: construct.to_string(),
                span,
            },
            UnifyError::InfiniteType { hole, ty } => TypeError::InfiniteType { hole, ty, span },
        }
    }
}

impl InferContext {
    /// Unify `a` (expected) with `b` (actual).
    ///
    /// `unify_void` allows `Void` on either side to match; it is off wherever
    /// the result is about to be given a name (parameters, cell contents,
    /// `let` values). With it off, a hole may not be bound to `Void` either.
    pub fn unify(&mut self, a: &Type, b: &Type, unify_void: bool) -> Result<(), UnifyError> {
        let a = self.resolve(a);
        let b = self.resolve(b);

        match (&a, &b) {
            (Type::Hole(x), Type::Hole(y)) if x == y => Ok(()),
            (Type::Hole(id), other) | (other, Type::Hole(id)) => {
                self.bind_hole(*id, other, unify_void)
            }
            (Type::Mutable(x), Type::Mutable(y)) => self.unify(x, y, unify_void),
            (Type::Fun(pa, ra), Type::Fun(pb, rb)) => {
                if pa.len() != pb.len() {
                    return Err(UnifyError::Arity {
                        expected: pa.len(),
                        actual: pb.len(),
                    });
                }
                self.unify(ra, rb, true)?;
                for (x, y) in pa.iter().zip(pb.iter()) {
                    self.unify(x, y, false)?;
                }
                Ok(())
            }
            (Type::Int, Type::Int) | (Type::Bool, Type::Bool) | (Type::String, Type::String) => {
                Ok(())
            }
            (Type::Void, Type::Void) => {
                if unify_void {
                    Ok(())
                } else {
                    Err(UnifyError::VoidBinding)
                }
            }
            _ => Err(UnifyError::Mismatch {
                expected: self.render(&a),
                actual: self.render(&b),
            }),
        }
    }

    fn bind_hole(&mut self, id: HoleId, ty: &Type, unify_void: bool) -> Result<(), UnifyError> {
        if !unify_void && ty.is_void() {
            return Err(UnifyError::VoidBinding);
        }
        if self.occurs(id, ty) {
            return Err(UnifyError::InfiniteType {
                hole: id.to_string(),
                ty: self.render(ty),
            });
        }
        let level = match self.hole(id) {
            Hole::Unbound { level, .. } => *level,
            Hole::Bound(_) => unreachable!("resolve returned a bound hole"),
        };
        self.adjust_levels(ty, level);
        self.bind(id, ty.clone());
        Ok(())
    }

    /// Whether hole `id` occurs inside `ty`, looking through bindings.
    pub fn occurs(&self, id: HoleId, ty: &Type) -> bool {
        match self.resolve(ty) {
            Type::Hole(other) => other == id,
            Type::Mutable(inner) => self.occurs(id, &inner),
            Type::Fun(params, ret) => {
                params.iter().any(|p| self.occurs(id, p)) || self.occurs(id, &ret)
            }
            Type::Int | Type::Bool | Type::String | Type::Void => false,
        }
    }

    /// Pin every unbound hole in `ty` to the current level, so that no later
    /// generalization can quantify it.
    pub fn settle(&mut self, ty: &Type) {
        let level = self.level();
        self.adjust_levels(ty, level);
    }

    /// Lower every unbound hole in `ty` to at most `level`.
    fn adjust_levels(&mut self, ty: &Type, level: u32) {
        match self.resolve(ty) {
            Type::Hole(id) => self.lower_level(id, level),
            Type::Mutable(inner) => self.adjust_levels(&inner, level),
            Type::Fun(params, ret) => {
                for param in &params {
                    self.adjust_levels(param, level);
                }
                self.adjust_levels(&ret, level);
            }
            Type::Int | Type::Bool | Type::String | Type::Void => {}
        }
    }
}
