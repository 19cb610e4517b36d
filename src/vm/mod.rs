//! Stack-machine interpreter for compiled modules.
//!
//! - [`value`]: boxed values and transient primitives
//! - [`cell`]: mutable cells and the helpers generated code calls
//! - [`interpreter`]: linking and execution
//!
//! ```
//! use choco::ast::{BinaryOp, Expr, FunDefinition, Item, Program};
//! use choco::vm::{Value, Vm};
//!
//! let program = Program::new(
//!     "demo",
//!     vec![Item::Fun(FunDefinition::new(
//!         "answer",
//!         Vec::<String>::new(),
//!         Expr::binary(BinaryOp::Mul, Expr::int(6), Expr::int(7)),
//!     ))],
//! );
//! let module = choco::compile(&program).unwrap();
//! let mut vm = Vm::load(module).unwrap();
//! assert_eq!(vm.call("answer", &[]).unwrap(), Some(Value::Integer(42)));
//! ```

pub mod cell;
pub mod interpreter;
pub mod value;

pub use cell::{Cell, Intrinsic};
pub use interpreter::{DEFAULT_CALL_DEPTH, Vm};
pub use value::Value;
