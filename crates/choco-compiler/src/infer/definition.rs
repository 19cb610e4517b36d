//! Top-level definitions.
//!
//! Definitions are checked in source order, threading the module tier from
//! one to the next. Each `fun` is declared with its monomorphic signature
//! before its body is checked, so direct recursion resolves. Neither `fun`
//! nor `val` is generalized: a top-level name has exactly one type, and a
//! later use may still refine it.

use choco_core::TypeError;
use choco_core::ast::{FunDefinition, Item, Program, ValDefinition};

use super::Inferencer;
use crate::env::Locals;
use crate::typed::{TypedFun, TypedItem, TypedProgram, TypedVal};
use crate::types::{Scheme, Type};

/// Check a whole program and return its finalized typed tree.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn check_program(program: &Program) -> Result<TypedProgram, TypeError> {
    Inferencer::new().infer_program(program)
}

impl Inferencer {
    /// Check every item of `program` in order, then finalize the tree.
    pub fn infer_program(&mut self, program: &Program) -> Result<TypedProgram, TypeError> {
        let mut items = Vec::with_capacity(program.items.len());
        for item in &program.items {
            match item {
                Item::Fun(def) => items.push(TypedItem::Fun(self.infer_fun(def)?)),
                Item::Val(def) => items.push(TypedItem::Val(self.infer_val(def)?)),
                Item::Import(import) => {
                    log::debug!("ignoring import '{}'", import.name);
                }
            }
        }
        self.check_bound_names(0)?;

        let typed = TypedProgram {
            package: program.package.clone(),
            items,
        }
        .finalize(self.context());

        for item in &typed.items {
            log::debug!("{}: {}", item.name(), item.ty());
        }
        Ok(typed)
    }

    /// Check a `fun` definition and add it to the module tier.
    pub fn infer_fun(&mut self, def: &FunDefinition) -> Result<TypedFun, TypeError> {
        self.ensure_fresh_name(&def.name, def)?;

        let mark = self.bound.len();
        self.ctx.enter_level();
        let result = self.infer_fun_body(def);
        self.ctx.leave_level();
        let typed = result?;
        self.check_bound_names(mark)?;

        self.ctx.settle(&typed.ty);
        log::trace!("fun {}: {}", def.name, self.ctx.render(&typed.ty));
        Ok(typed)
    }

    fn infer_fun_body(&mut self, def: &FunDefinition) -> Result<TypedFun, TypeError> {
        let param_types: Vec<Type> = def.params.iter().map(|_| self.ctx.fresh_hole()).collect();
        let ret = self.ctx.fresh_hole();
        let ty = Type::fun(param_types.clone(), ret.clone());
        self.module.declare(&def.name, Scheme::mono(ty.clone()));

        let mut locals = Locals::new();
        for (param, param_ty) in def.params.iter().zip(&param_types) {
            self.bind_name(
                format!("parameter '{}' of '{}'", param, def.name),
                param_ty,
                def.span,
            );
            locals = locals.extended(param.clone(), Scheme::mono(param_ty.clone()));
        }

        let body = self.infer_expr(&locals, &def.body)?;
        self.unify_at(
            &ret,
            &body.ty,
            true,
            def.body.span,
            &format!("body of '{}'", def.name),
        )?;

        Ok(TypedFun {
            name: def.name.clone(),
            ty,
            params: def.params.clone(),
            param_types,
            body,
            span: def.span,
        })
    }

    /// Check a `val` definition and add it to the module tier.
    pub fn infer_val(&mut self, def: &ValDefinition) -> Result<TypedVal, TypeError> {
        self.ensure_fresh_name(&def.name, def)?;

        let mark = self.bound.len();
        self.ctx.enter_level();
        let result = self.infer_expr(&Locals::new(), &def.value);
        self.ctx.leave_level();
        let value = result?;
        self.check_bound_names(mark)?;

        if self.ctx.resolve(&value.ty).is_void() {
            return Err(TypeError::VoidBinding {
                construct: format!("value '{}'", def.name),
                span: def.span,
            });
        }

        self.ctx.settle(&value.ty);
        self.module.declare(&def.name, Scheme::mono(value.ty.clone()));
        log::trace!("val {}: {}", def.name, self.ctx.render(&value.ty));

        Ok(TypedVal {
            name: def.name.clone(),
            ty: value.ty.clone(),
            value,
            span: def.span,
        })
    }

    fn ensure_fresh_name(&self, name: &str, def: &impl Spanned) -> Result<(), TypeError> {
        if self.module.contains(name) {
            return Err(TypeError::DuplicateDefinition {
                name: name.to_string(),
                span: def.span(),
            });
        }
        Ok(())
    }
}

trait Spanned {
    fn span(&self) -> choco_core::Span;
}

impl Spanned for FunDefinition {
    fn span(&self) -> choco_core::Span {
        self.span
    }
}

impl Spanned for ValDefinition {
    fn span(&self) -> choco_core::Span {
        self.span
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use choco_core::ast::{BinaryOp, Expr};

    fn fun(name: &str, params: &[&str], body: Expr) -> Item {
        Item::Fun(FunDefinition::new(name, params.iter().copied(), body))
    }

    fn val(name: &str, value: Expr) -> Item {
        Item::Val(ValDefinition::new(name, value))
    }

    fn check(items: Vec<Item>) -> Result<TypedProgram, TypeError> {
        check_program(&Program::new("test", items))
    }

    #[test]
    fn identity_is_fixed_by_first_use() {
        let program = check(vec![
            fun("id", &["x"], Expr::local("x")),
            val("five", Expr::call_fun("id", vec![Expr::int(5)])),
        ])
        .unwrap();
        assert_eq!(
            program.function("id").unwrap().ty,
            Type::fun(vec![Type::Int], Type::Int)
        );
        assert_eq!(program.get("five").unwrap().ty(), &Type::Int);
    }

    #[test]
    fn identity_second_use_mismatches() {
        let err = check(vec![
            fun("id", &["x"], Expr::local("x")),
            val("a", Expr::call_fun("id", vec![Expr::int(5)])),
            val("b", Expr::call_fun("id", vec![Expr::bool(true)])),
        ])
        .unwrap_err();
        assert!(matches!(err, TypeError::TypeMismatch { .. }), "{err}");
    }

    #[test]
    fn arity_mismatch_names_both_counts() {
        let err = check(vec![
            fun(
                "add",
                &["x", "y"],
                Expr::binary(BinaryOp::Add, Expr::local("x"), Expr::local("y")),
            ),
            val("r", Expr::call_fun("add", vec![Expr::int(1)])),
        ])
        .unwrap_err();
        assert!(
            matches!(
                err,
                TypeError::ArityMismatch {
                    expected: 2,
                    actual: 1,
                    ..
                }
            ),
            "{err}"
        );
    }

    #[test]
    fn recursion_resolves_through_predeclaration() {
        // fun fact(n) = if n <= 1 then 1 else n * fact(n - 1)
        let body = Expr::if_then_else(
            Expr::binary(BinaryOp::Le, Expr::local("n"), Expr::int(1)),
            Expr::int(1),
            Expr::binary(
                BinaryOp::Mul,
                Expr::local("n"),
                Expr::call_fun(
                    "fact",
                    vec![Expr::binary(BinaryOp::Sub, Expr::local("n"), Expr::int(1))],
                ),
            ),
        );
        let program = check(vec![fun("fact", &["n"], body)]).unwrap();
        assert_eq!(
            program.function("fact").unwrap().ty,
            Type::fun(vec![Type::Int], Type::Int)
        );
    }

    #[test]
    fn counter_is_void_function() {
        let body = Expr::let_in(
            "c",
            Expr::mutable(Expr::int(0)),
            Expr::assign(
                Expr::local("c"),
                Expr::binary(BinaryOp::Add, Expr::deref(Expr::local("c")), Expr::int(1)),
            ),
        );
        let program = check(vec![fun("main", &[], body)]).unwrap();
        assert_eq!(program.function("main").unwrap().ty, Type::fun(vec![], Type::Void));
    }

    #[test]
    fn val_sees_earlier_definitions_only() {
        let err = check(vec![
            val("a", Expr::val_ref("b")),
            val("b", Expr::int(1)),
        ])
        .unwrap_err();
        assert!(matches!(err, TypeError::UnboundVariable { ref name, .. } if name == "b"));
    }

    #[test]
    fn void_val_is_rejected() {
        let err = check(vec![
            val("c", Expr::mutable(Expr::int(0))),
            val("v", Expr::assign(Expr::val_ref("c"), Expr::int(1))),
        ])
        .unwrap_err();
        assert!(matches!(err, TypeError::VoidBinding { .. }), "{err}");
    }

    #[test]
    fn parameter_unified_with_void_is_rejected() {
        // fun f(x, c) = if true then x else c <- 1
        let body = Expr::if_then_else(
            Expr::bool(true),
            Expr::local("x"),
            Expr::assign(Expr::local("c"), Expr::int(1)),
        );
        let err = check(vec![fun("f", &["x", "c"], body)]).unwrap_err();
        assert!(
            matches!(err, TypeError::VoidBinding { ref construct, .. } if construct.contains("'x'")),
            "{err}"
        );
    }

    #[test]
    fn let_bound_hole_later_void_is_rejected() {
        // fun f(c) = let v = f(c) in c <- v
        let body = Expr::let_in(
            "v",
            Expr::call_fun("f", vec![Expr::local("c")]),
            Expr::assign(Expr::local("c"), Expr::local("v")),
        );
        let err = check(vec![fun("f", &["c"], body)]).unwrap_err();
        assert!(
            matches!(err, TypeError::VoidBinding { ref construct, .. } if construct.contains("'v'")),
            "{err}"
        );
    }

    #[test]
    fn let_bound_hole_made_void_by_later_definition_is_rejected() {
        // fun loop() = loop(); val r = let v = loop() in 1; fun g() = (loop(); 2)
        let err = check(vec![
            fun("loop", &[], Expr::call_fun("loop", vec![])),
            val(
                "r",
                Expr::let_in("v", Expr::call_fun("loop", vec![]), Expr::int(1)),
            ),
            fun(
                "g",
                &[],
                Expr::seq(Expr::call_fun("loop", vec![]), Expr::int(2)),
            ),
        ])
        .unwrap_err();
        assert!(
            matches!(err, TypeError::VoidBinding { ref construct, .. } if construct.contains("'v'")),
            "{err}"
        );
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = check(vec![val("x", Expr::int(1)), fun("x", &[], Expr::int(2))]).unwrap_err();
        assert!(matches!(err, TypeError::DuplicateDefinition { ref name, .. } if name == "x"));
    }

    #[test]
    fn imports_are_ignored() {
        let program = check(vec![
            Item::Import(choco_core::ast::Import {
                name: "std".to_string(),
                span: Default::default(),
            }),
            val("x", Expr::int(1)),
        ])
        .unwrap();
        assert_eq!(program.items.len(), 1);
    }

    #[test]
    fn unconstrained_parameter_stays_a_hole() {
        let program = check(vec![fun("k", &["x"], Expr::int(0))]).unwrap();
        let f = program.function("k").unwrap();
        assert!(matches!(f.param_types[0], Type::Hole(_)));
    }

    #[test]
    fn let_inside_val_does_not_generalize_a_function() {
        // val r = let g = id in g(1); id(true) must still fail
        let err = check(vec![
            fun("id", &["x"], Expr::local("x")),
            val(
                "r",
                Expr::let_in(
                    "g",
                    Expr::fun_ref("id"),
                    Expr::call(Expr::local("g"), vec![Expr::int(1)]),
                ),
            ),
            val("s", Expr::call_fun("id", vec![Expr::bool(true)])),
        ])
        .unwrap_err();
        assert!(matches!(err, TypeError::TypeMismatch { .. }), "{err}");
    }
}
