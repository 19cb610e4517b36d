//! Forward jumps and the operand-stack shapes they carry.
//!
//! Every forward jump remembers the abstract stack at the jump site. When the
//! jump is patched, the emitter compares that shape with the one flowing into
//! the target, so every join point sees exactly one stack shape.

use rustc_hash::FxHashMap;

use super::JumpLabel;

/// Abstract kind of one operand-stack entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackValue {
    /// A raw 32-bit primitive.
    Prim,
    /// A reference to a boxed object or cell.
    Ref,
}

/// Tracks jumps that still need a target.
#[derive(Debug, Default)]
pub struct JumpManager {
    /// Stack shape at each pending jump, keyed by operand offset.
    pending: FxHashMap<usize, Vec<StackValue>>,
}

impl JumpManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the stack shape at a freshly emitted jump.
    pub fn record(&mut self, label: JumpLabel, shape: Vec<StackValue>) {
        self.pending.insert(label.0, shape);
    }

    /// Take the shape recorded for `label`, if it is still pending.
    pub fn resolve(&mut self, label: JumpLabel) -> Option<Vec<StackValue>> {
        self.pending.remove(&label.0)
    }

    /// Number of jumps that have not been patched.
    pub fn unresolved(&self) -> usize {
        self.pending.len()
    }
}
