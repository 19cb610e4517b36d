//! Mutable cells.
//!
//! The runtime side of `mutable e`, `deref c` and `c <- v`. A [`Cell`] is a
//! shared handle: cloning it aliases the same slot. Every operation takes the
//! lock for its whole duration, so create, read and write are each atomic.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use choco_compiler::types::descriptor::{CELL_DEREF, CELL_OF, CELL_SET, MUTABLE_OWNER};
use choco_core::{RuntimeError, SymbolHash};

use super::Value;

/// A shared, mutable slot holding one boxed value.
#[derive(Clone)]
pub struct Cell(Arc<Mutex<Value>>);

impl Cell {
    pub fn new(value: Value) -> Self {
        Cell(Arc::new(Mutex::new(value)))
    }

    /// Current content.
    pub fn get(&self) -> Value {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Replace the content.
    pub fn set(&self, value: Value) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = value;
    }

    /// Whether both handles alias the same slot.
    pub fn ptr_eq(&self, other: &Cell) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cell").field(&self.get()).finish()
    }
}

/// Cell helpers generated code calls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intrinsic {
    Of,
    Deref,
    Set,
}

impl Intrinsic {
    pub const ALL: [Intrinsic; 3] = [Intrinsic::Of, Intrinsic::Deref, Intrinsic::Set];

    /// Helper name and descriptor.
    pub fn entry(self) -> (&'static str, &'static str) {
        match self {
            Intrinsic::Of => CELL_OF,
            Intrinsic::Deref => CELL_DEREF,
            Intrinsic::Set => CELL_SET,
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Intrinsic::Of | Intrinsic::Deref => 1,
            Intrinsic::Set => 2,
        }
    }

    /// Link identity of the helper.
    pub fn symbol_hash(self) -> SymbolHash {
        let (name, descriptor) = self.entry();
        SymbolHash::function(MUTABLE_OWNER, name, descriptor)
    }

    /// Look a link identity up among the helpers.
    pub fn resolve(hash: SymbolHash) -> Option<Intrinsic> {
        Self::ALL.into_iter().find(|i| i.symbol_hash() == hash)
    }

    /// Run the helper. Arguments are in call order.
    pub fn invoke(self, mut args: Vec<Value>) -> Result<Option<Value>, RuntimeError> {
        if args.len() != self.arity() {
            return Err(RuntimeError::ArgumentCount {
                function: format!("{}.{}", MUTABLE_OWNER, self.entry().0),
                expected: self.arity(),
                actual: args.len(),
            });
        }
        match self {
            Intrinsic::Of => {
                let value = args.remove(0);
                Ok(Some(Value::Cell(Cell::new(value))))
            }
            Intrinsic::Deref => Ok(Some(expect_cell(&args[0])?.get())),
            Intrinsic::Set => {
                let value = args.remove(1);
                expect_cell(&args[0])?.set(value);
                Ok(None)
            }
        }
    }
}

fn expect_cell(value: &Value) -> Result<&Cell, RuntimeError> {
    value.as_cell().ok_or_else(|| RuntimeError::TypeMismatch {
        expected: "Mutable".to_string(),
        actual: value.kind().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_alias_the_same_slot() {
        let a = Cell::new(Value::Integer(1));
        let b = a.clone();
        b.set(Value::Integer(2));
        assert_eq!(a.get(), Value::Integer(2));
        assert_eq!(a, b);
        assert_ne!(a, Cell::new(Value::Integer(2)));
    }

    #[test]
    fn helpers_resolve_by_hash() {
        for intrinsic in Intrinsic::ALL {
            assert_eq!(Intrinsic::resolve(intrinsic.symbol_hash()), Some(intrinsic));
        }
        assert_eq!(
            Intrinsic::resolve(SymbolHash::function(MUTABLE_OWNER, "of", "()V")),
            None
        );
    }

    #[test]
    fn of_deref_set() {
        let cell = Intrinsic::Of
            .invoke(vec![Value::Boolean(false)])
            .unwrap()
            .unwrap();
        let out = Intrinsic::Set
            .invoke(vec![cell.clone(), Value::Boolean(true)])
            .unwrap();
        assert_eq!(out, None);
        assert_eq!(
            Intrinsic::Deref.invoke(vec![cell]).unwrap(),
            Some(Value::Boolean(true))
        );
    }

    #[test]
    fn deref_of_non_cell_fails() {
        let err = Intrinsic::Deref.invoke(vec![Value::Integer(3)]).unwrap_err();
        assert_eq!(
            err,
            RuntimeError::TypeMismatch {
                expected: "Mutable".to_string(),
                actual: "Integer".to_string(),
            }
        );
    }

    #[test]
    fn concurrent_writers_do_not_lose_the_cell() {
        let cell = Cell::new(Value::Integer(0));
        std::thread::scope(|s| {
            for n in 0..4 {
                let cell = cell.clone();
                s.spawn(move || cell.set(Value::Integer(n)));
            }
        });
        assert!(matches!(cell.get(), Value::Integer(0..=3)));
    }
}
