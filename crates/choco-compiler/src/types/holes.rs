//! The hole arena.
//!
//! Every unification variable is a slot in [`InferContext::holes`], addressed
//! by its [`HoleId`]. A slot starts `Unbound` and is overwritten with `Bound`
//! at most once. Identity is the index, so cloning a `Type::Hole` shares the
//! cell.

use std::fmt;

use super::Type;

/// Index of a cell in the hole arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HoleId(pub usize);

impl HoleId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for HoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}

impl fmt::Display for HoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}

/// Contents of a hole cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hole {
    /// Solved: the hole stands for this type.
    Bound(Type),
    /// Unsolved, created at (or lowered to) `level`.
    Unbound { id: HoleId, level: u32 },
}

/// Inference session state: the hole arena and the generalization level.
///
/// One context lives for the whole compilation of a program. Nothing about it
/// is global, so independent compilations never observe each other's ids.
#[derive(Debug, Default)]
pub struct InferContext {
    holes: Vec<Hole>,
    level: u32,
}

impl InferContext {
    pub fn new() -> Self {
        Self::default()
    }

    // ==========================================================================
    // Levels
    // ==========================================================================

    /// The current generalization level.
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Enter a `let`/`fun` body.
    pub fn enter_level(&mut self) {
        self.level += 1;
    }

    /// Leave a `let`/`fun` body.
    pub fn leave_level(&mut self) {
        debug_assert!(self.level > 0, "leave_level without matching enter_level");
        self.level = self.level.saturating_sub(1);
    }

    // ==========================================================================
    // Allocation
    // ==========================================================================

    /// Allocate an unbound hole at `level`. Ids are arena indices.
    pub fn new_hole(&mut self, level: u32) -> Type {
        let id = HoleId(self.holes.len());
        self.holes.push(Hole::Unbound { id, level });
        Type::Hole(id)
    }

    /// Allocate an unbound hole at the current level.
    pub fn fresh_hole(&mut self) -> Type {
        self.new_hole(self.level)
    }

    /// Number of holes allocated so far.
    #[cfg(test)]
    pub(crate) fn hole_count(&self) -> usize {
        self.holes.len()
    }

    // ==========================================================================
    // Cell access
    // ==========================================================================

    pub fn hole(&self, id: HoleId) -> &Hole {
        &self.holes[id.index()]
    }

    /// Solve `id`. The cell must still be unbound.
    pub(crate) fn bind(&mut self, id: HoleId, ty: Type) {
        debug_assert!(
            matches!(self.holes[id.index()], Hole::Unbound { .. }),
            "hole {} bound twice",
            id
        );
        log::trace!("bind {} := {}", id, self.render(&ty));
        self.holes[id.index()] = Hole::Bound(ty);
    }

    /// Lower the level of an unbound hole.
    pub(crate) fn lower_level(&mut self, id: HoleId, level: u32) {
        if let Hole::Unbound { level: current, .. } = &mut self.holes[id.index()] {
            *current = (*current).min(level);
        }
    }

    // ==========================================================================
    // Resolution
    // ==========================================================================

    /// Follow bindings at the top of `ty` until it is not a bound hole.
    pub fn resolve(&self, ty: &Type) -> Type {
        let mut current = ty;
        while let Type::Hole(id) = current {
            match self.hole(*id) {
                Hole::Bound(bound) => current = bound,
                Hole::Unbound { .. } => break,
            }
        }
        current.clone()
    }

    /// Resolve every hole inside `ty`. Unbound holes are left in place.
    pub fn zonk(&self, ty: &Type) -> Type {
        match self.resolve(ty) {
            Type::Mutable(inner) => Type::Mutable(Box::new(self.zonk(&inner))),
            Type::Fun(params, ret) => Type::Fun(
                params.iter().map(|p| self.zonk(p)).collect(),
                Box::new(self.zonk(&ret)),
            ),
            other => other,
        }
    }

    /// Render `ty` for diagnostics, following bindings.
    pub fn render(&self, ty: &Type) -> String {
        self.zonk(ty).to_string()
    }
}
