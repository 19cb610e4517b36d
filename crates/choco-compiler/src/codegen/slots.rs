//! Local slot allocation.
//!
//! Parameters take slots `0..n` in declaration order. Each `let` binding gets
//! a slot when it is generated: a slot previously used for the same name is
//! reused as long as that earlier binding is no longer in scope, otherwise a
//! new slot is allocated. A binding that shadows a live one therefore never
//! overwrites it.

use rustc_hash::FxHashMap;

#[derive(Debug, Default)]
pub struct SlotAllocator {
    /// Bindings currently in scope, innermost last.
    scope: Vec<(String, u32)>,
    /// Every slot ever handed out for a name, oldest first.
    by_name: FxHashMap<String, Vec<u32>>,
    next: u32,
}

impl SlotAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give a parameter the next slot. Parameters stay in scope for the whole function.
    pub fn declare_param(&mut self, name: &str) -> u32 {
        let slot = self.allocate(name);
        self.scope.push((name.to_string(), slot));
        slot
    }

    /// Enter a `let` binding and return its slot. Pair with [`end_let`](Self::end_let).
    pub fn begin_let(&mut self, name: &str) -> u32 {
        let reusable = self.by_name.get(name).and_then(|slots| {
            slots
                .iter()
                .copied()
                .find(|slot| !self.scope.iter().any(|(_, live)| live == slot))
        });
        let slot = match reusable {
            Some(slot) => slot,
            None => self.allocate(name),
        };
        self.scope.push((name.to_string(), slot));
        slot
    }

    /// Leave the innermost `let` binding.
    pub fn end_let(&mut self) {
        self.scope.pop();
    }

    /// Slot of the innermost binding of `name`.
    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.scope
            .iter()
            .rev()
            .find(|(bound, _)| bound == name)
            .map(|(_, slot)| *slot)
    }

    /// Number of slots the function needs.
    pub fn max_locals(&self) -> u32 {
        self.next
    }

    fn allocate(&mut self, name: &str) -> u32 {
        let slot = self.next;
        self.next += 1;
        self.by_name.entry(name.to_string()).or_default().push(slot);
        slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_are_sequential() {
        let mut slots = SlotAllocator::new();
        assert_eq!(slots.declare_param("a"), 0);
        assert_eq!(slots.declare_param("b"), 1);
        assert_eq!(slots.lookup("b"), Some(1));
        assert_eq!(slots.max_locals(), 2);
    }

    #[test]
    fn sibling_lets_share_a_slot() {
        let mut slots = SlotAllocator::new();
        let first = slots.begin_let("t");
        slots.end_let();
        let second = slots.begin_let("t");
        slots.end_let();
        assert_eq!(first, second);
        assert_eq!(slots.max_locals(), 1);
    }

    #[test]
    fn shadowing_gets_a_fresh_slot() {
        let mut slots = SlotAllocator::new();
        let outer = slots.begin_let("a");
        let inner = slots.begin_let("a");
        assert_ne!(outer, inner);
        assert_eq!(slots.lookup("a"), Some(inner));
        slots.end_let();
        assert_eq!(slots.lookup("a"), Some(outer));
        slots.end_let();
        assert_eq!(slots.lookup("a"), None);
    }

    #[test]
    fn let_shadowing_a_param_does_not_clobber_it() {
        let mut slots = SlotAllocator::new();
        let param = slots.declare_param("x");
        let local = slots.begin_let("x");
        assert_ne!(param, local);
    }
}
