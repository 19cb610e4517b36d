//! Type schemes: generalization and instantiation.

use rustc_hash::FxHashMap;

use super::{Hole, HoleId, InferContext, Type};

/// A type with a set of universally quantified holes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheme {
    /// Quantified hole ids, in order of first occurrence.
    pub vars: Vec<HoleId>,
    pub ty: Type,
}

impl Scheme {
    /// A scheme with no quantified holes.
    pub fn mono(ty: Type) -> Self {
        Self { vars: Vec::new(), ty }
    }

    pub fn is_mono(&self) -> bool {
        self.vars.is_empty()
    }
}

impl InferContext {
    /// Quantify every unbound hole in `ty` created deeper than the current level.
    pub fn generalize(&self, ty: &Type) -> Scheme {
        let mut vars = Vec::new();
        self.collect_generalizable(ty, &mut vars);
        Scheme {
            vars,
            ty: ty.clone(),
        }
    }

    fn collect_generalizable(&self, ty: &Type, vars: &mut Vec<HoleId>) {
        match self.resolve(ty) {
            Type::Hole(id) => {
                if let Hole::Unbound { level, .. } = self.hole(id) {
                    if *level > self.level() && !vars.contains(&id) {
                        vars.push(id);
                    }
                }
            }
            Type::Mutable(inner) => self.collect_generalizable(&inner, vars),
            Type::Fun(params, ret) => {
                for param in &params {
                    self.collect_generalizable(param, vars);
                }
                self.collect_generalizable(&ret, vars);
            }
            Type::Int | Type::Bool | Type::String | Type::Void => {}
        }
    }

    /// Replace each quantified hole with a fresh one.
    ///
    /// One substitution table per call: repeated occurrences of a quantified
    /// hole map to the same fresh hole, separate calls never share.
    pub fn instantiate(&mut self, scheme: &Scheme) -> Type {
        if scheme.is_mono() {
            return scheme.ty.clone();
        }
        let mut table = FxHashMap::default();
        for var in &scheme.vars {
            let fresh = self.fresh_hole();
            table.insert(*var, fresh);
        }
        self.substitute(&scheme.ty, &table)
    }

    fn substitute(&self, ty: &Type, table: &FxHashMap<HoleId, Type>) -> Type {
        match ty {
            Type::Hole(id) => match self.hole(*id) {
                Hole::Bound(bound) => self.substitute(bound, table),
                Hole::Unbound { .. } => table.get(id).cloned().unwrap_or_else(|| ty.clone()),
            },
            Type::Mutable(inner) => Type::mutable(self.substitute(inner, table)),
            Type::Fun(params, ret) => Type::fun(
                params.iter().map(|p| self.substitute(p, table)).collect(),
                self.substitute(ret, table),
            ),
            Type::Int | Type::Bool | Type::String | Type::Void => ty.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generalize_skips_outer_holes() {
        let mut ctx = InferContext::new();
        let outer = ctx.fresh_hole();
        ctx.enter_level();
        let inner = ctx.fresh_hole();
        ctx.leave_level();

        let scheme = ctx.generalize(&Type::fun(vec![outer, inner.clone()], inner.clone()));
        let Type::Hole(id) = inner else { panic!() };
        assert_eq!(scheme.vars, vec![id]);
    }

    #[test]
    fn generalize_ignores_bound_holes() {
        let mut ctx = InferContext::new();
        ctx.enter_level();
        let h = ctx.fresh_hole();
        ctx.unify(&h, &Type::Int, false).unwrap();
        ctx.leave_level();
        assert!(ctx.generalize(&h).is_mono());
    }

    #[test]
    fn instantiation_shares_within_and_not_across() {
        let mut ctx = InferContext::new();
        ctx.enter_level();
        let a = ctx.fresh_hole();
        ctx.leave_level();
        let scheme = ctx.generalize(&Type::fun(vec![a.clone()], a));

        let first = ctx.instantiate(&scheme);
        let second = ctx.instantiate(&scheme);
        let Type::Fun(p1, r1) = &first else { panic!() };
        let Type::Fun(p2, _) = &second else { panic!() };
        assert_eq!(&p1[0], r1.as_ref());
        assert_ne!(p1[0], p2[0]);

        ctx.unify(&first, &Type::fun(vec![Type::Int], Type::Int), true)
            .unwrap();
        ctx.unify(&second, &Type::fun(vec![Type::Bool], Type::Bool), true)
            .unwrap();
    }

    #[test]
    fn mono_scheme_keeps_hole_identity() {
        let mut ctx = InferContext::new();
        let h = ctx.fresh_hole();
        let ty = ctx.instantiate(&Scheme::mono(h.clone()));
        assert_eq!(ty, h);
    }
}
