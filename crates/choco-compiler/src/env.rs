//! The two-tier type environment.
//!
//! - [`Locals`]: parameters and `let` bindings. Extending it produces a new
//!   value, so sibling branches never see each other's bindings.
//! - [`ModuleEnv`]: top-level functions and values. Only ever appended to.

use rustc_hash::FxHashMap;

use crate::types::Scheme;

/// Lexical bindings visible at one point in an expression.
#[derive(Debug, Clone, Default)]
pub struct Locals {
    bindings: FxHashMap<String, Scheme>,
}

impl Locals {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of this scope with `name` bound (shadowing any outer binding).
    pub fn extended(&self, name: impl Into<String>, scheme: Scheme) -> Self {
        let mut copy = self.clone();
        copy.bindings.insert(name.into(), scheme);
        copy
    }

    pub fn get(&self, name: &str) -> Option<&Scheme> {
        self.bindings.get(name)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.bindings.len()
    }
}

/// Top-level declarations, in declaration order.
#[derive(Debug, Default)]
pub struct ModuleEnv {
    bindings: FxHashMap<String, Scheme>,
    order: Vec<String>,
}

impl ModuleEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a top-level name. Returns `false` if the name is already declared.
    pub fn declare(&mut self, name: &str, scheme: Scheme) -> bool {
        if self.bindings.contains_key(name) {
            return false;
        }
        self.bindings.insert(name.to_string(), scheme);
        self.order.push(name.to_string());
        true
    }

    pub fn get(&self, name: &str) -> Option<&Scheme> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Declared names with their schemes, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scheme)> {
        self.order
            .iter()
            .filter_map(|name| self.bindings.get(name).map(|s| (name.as_str(), s)))
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }
}

/// Look `name` up in the lexical tier first, then the module tier.
pub fn lookup<'a>(locals: &'a Locals, module: &'a ModuleEnv, name: &str) -> Option<&'a Scheme> {
    locals.get(name).or_else(|| module.get(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    #[test]
    fn extension_does_not_leak_to_siblings() {
        let base = Locals::new().extended("x", Scheme::mono(Type::Int));
        let left = base.extended("y", Scheme::mono(Type::Bool));
        let right = base.extended("z", Scheme::mono(Type::String));
        assert!(left.get("z").is_none());
        assert!(right.get("y").is_none());
        assert!(base.get("y").is_none());
        assert_eq!(base.len(), 1);
    }

    #[test]
    fn inner_binding_shadows() {
        let outer = Locals::new().extended("x", Scheme::mono(Type::Int));
        let inner = outer.extended("x", Scheme::mono(Type::Bool));
        assert_eq!(inner.get("x").map(|s| &s.ty), Some(&Type::Bool));
        assert_eq!(outer.get("x").map(|s| &s.ty), Some(&Type::Int));
    }

    #[test]
    fn module_tier_is_append_only() {
        let mut module = ModuleEnv::new();
        assert!(module.declare("f", Scheme::mono(Type::Int)));
        assert!(!module.declare("f", Scheme::mono(Type::Bool)));
        assert_eq!(module.get("f").map(|s| &s.ty), Some(&Type::Int));
        let names: Vec<_> = module.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["f"]);
        assert_eq!(module.len(), 1);
    }

    #[test]
    fn locals_shadow_module() {
        let mut module = ModuleEnv::new();
        module.declare("v", Scheme::mono(Type::Int));
        let locals = Locals::new().extended("v", Scheme::mono(Type::Bool));
        assert_eq!(lookup(&locals, &module, "v").map(|s| &s.ty), Some(&Type::Bool));
        assert_eq!(lookup(&Locals::new(), &module, "v").map(|s| &s.ty), Some(&Type::Int));
        assert!(lookup(&locals, &module, "nope").is_none());
    }
}
