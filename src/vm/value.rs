//! Runtime values.

use std::fmt;
use std::sync::Arc;

use choco_compiler::types::descriptor::{BOOLEAN, INTEGER, MUTABLE, OBJECT, STRING};

use super::Cell;

/// A value on the operand stack, in a local slot or in a field.
///
/// `Prim` is a raw 32-bit primitive that only exists transiently between an
/// unbox and the operation consuming it. Everything else is a reference to a
/// boxed object.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Prim(i32),
    Integer(i32),
    Boolean(bool),
    Str(Arc<str>),
    Cell(Cell),
}

impl Value {
    /// Short name of the value's kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Prim(_) => "primitive",
            Value::Integer(_) => "Integer",
            Value::Boolean(_) => "Boolean",
            Value::Str(_) => "String",
            Value::Cell(_) => "Mutable",
        }
    }

    pub fn is_reference(&self) -> bool {
        !matches!(self, Value::Prim(_))
    }

    /// Whether a checked cast to `descriptor` succeeds.
    pub fn is_instance_of(&self, descriptor: &str) -> bool {
        match descriptor {
            INTEGER => matches!(self, Value::Integer(_)),
            BOOLEAN => matches!(self, Value::Boolean(_)),
            STRING => matches!(self, Value::Str(_)),
            MUTABLE => matches!(self, Value::Cell(_)),
            OBJECT => self.is_reference(),
            _ => false,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_cell(&self) -> Option<&Cell> {
        match self {
            Value::Cell(c) => Some(c),
            _ => None,
        }
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Prim(n) | Value::Integer(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{}", s),
            Value::Cell(c) => write!(f, "mutable {}", c.get()),
        }
    }
}
