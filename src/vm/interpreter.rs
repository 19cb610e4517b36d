//! Bytecode interpreter.

use choco_compiler::bytecode::{Constant, OpCode};
use choco_compiler::module::{CompiledFunction, CompiledModule};
use choco_core::{RuntimeError, SymbolHash};
use rustc_hash::FxHashMap;

use super::{Intrinsic, Value};
use crate::ChocoResult;

/// Default limit on nested calls.
pub const DEFAULT_CALL_DEPTH: usize = 512;

/// What a constant-pool entry links to.
#[derive(Debug, Clone, Copy)]
enum Link {
    /// Not a symbolic reference.
    Data,
    Function(usize),
    Intrinsic(Intrinsic),
    Field(usize),
}

/// A module with every symbolic reference resolved.
#[derive(Debug)]
struct LinkedModule {
    module: CompiledModule,
    /// Parallel to the constant pool.
    links: Vec<Link>,
    by_name: FxHashMap<String, usize>,
}

impl LinkedModule {
    fn link(module: CompiledModule) -> Result<Self, RuntimeError> {
        let mut functions = FxHashMap::default();
        let mut by_name = FxHashMap::default();
        for (index, function) in module.functions.iter().enumerate() {
            let hash = SymbolHash::function(&module.name, &function.name, &function.descriptor);
            functions.insert(hash, index);
            by_name.insert(function.name.clone(), index);
        }
        let fields: FxHashMap<SymbolHash, usize> = module
            .fields
            .iter()
            .enumerate()
            .map(|(index, field)| (SymbolHash::field(&module.name, &field.name), index))
            .collect();

        let mut links = Vec::with_capacity(module.constants.len());
        for constant in module.constants.constants() {
            let link = match (constant, constant.symbol_hash()) {
                (Constant::Function { owner, name, descriptor }, Some(hash)) => {
                    if let Some(&index) = functions.get(&hash) {
                        Link::Function(index)
                    } else if let Some(intrinsic) = Intrinsic::resolve(hash) {
                        Link::Intrinsic(intrinsic)
                    } else {
                        return Err(RuntimeError::UnknownFunction {
                            name: format!("{}.{}{}", owner, name, descriptor),
                        });
                    }
                }
                (Constant::Field { owner, name, .. }, Some(hash)) => match fields.get(&hash) {
                    Some(&index) => Link::Field(index),
                    None => {
                        return Err(RuntimeError::UnknownField {
                            name: format!("{}.{}", owner, name),
                        });
                    }
                },
                _ => Link::Data,
            };
            links.push(link);
        }

        log::debug!(
            "linked module {}: {} function(s), {} field(s)",
            module.name,
            functions.len(),
            fields.len()
        );

        Ok(Self {
            module,
            links,
            by_name,
        })
    }

    fn link_at(&self, index: u16) -> Result<Link, RuntimeError> {
        self.links
            .get(index as usize)
            .copied()
            .ok_or_else(|| RuntimeError::InvalidConstant {
                index: index as u32,
                reason: "out of range".to_string(),
            })
    }

    fn constant(&self, index: u16) -> Result<&Constant, RuntimeError> {
        self.module
            .constants
            .get(index as u32)
            .ok_or_else(|| RuntimeError::InvalidConstant {
                index: index as u32,
                reason: "out of range".to_string(),
            })
    }
}

/// A loaded module ready to run.
///
/// Loading links every function and field reference in the constant pool
/// and then runs the static initializer, so all fields hold their values
/// before the first call.
#[derive(Debug)]
pub struct Vm {
    image: LinkedModule,
    fields: Vec<Option<Value>>,
    max_call_depth: usize,
}

impl Vm {
    /// Link `module` and run its initializers.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn load(module: CompiledModule) -> Result<Self, RuntimeError> {
        Self::load_with_call_depth(module, DEFAULT_CALL_DEPTH)
    }

    /// Decode a binary module and load it.
    pub fn load_bytes(bytes: &[u8]) -> ChocoResult<Self> {
        Ok(Self::load(CompiledModule::decode(bytes)?)?)
    }

    pub fn load_with_call_depth(
        module: CompiledModule,
        max_call_depth: usize,
    ) -> Result<Self, RuntimeError> {
        let mut fields = vec![None; module.fields.len()];
        let image = LinkedModule::link(module)?;
        let mut interpreter = Interpreter {
            image: &image,
            fields: &mut fields,
            max_call_depth,
        };
        interpreter.invoke(&image.module.static_initializer, Vec::new(), 0)?;
        interpreter.invoke(&image.module.initializer, Vec::new(), 0)?;
        Ok(Self {
            image,
            fields,
            max_call_depth,
        })
    }

    pub fn module(&self) -> &CompiledModule {
        &self.image.module
    }

    /// Current value of a field, if the module defines it.
    pub fn field(&self, name: &str) -> Option<&Value> {
        let index = self.image.module.fields.iter().position(|f| f.name == name)?;
        self.fields[index].as_ref()
    }

    /// Call a top-level function by name.
    ///
    /// Returns `None` for functions whose result type is `Void`.
    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<Option<Value>, RuntimeError> {
        let index = *self
            .image
            .by_name
            .get(name)
            .ok_or_else(|| RuntimeError::UnknownFunction {
                name: name.to_string(),
            })?;
        log::trace!("call {}({} arg(s))", name, args.len());
        let mut interpreter = Interpreter {
            image: &self.image,
            fields: &mut self.fields,
            max_call_depth: self.max_call_depth,
        };
        interpreter.invoke(&self.image.module.functions[index], args.to_vec(), 0)
    }
}

struct Interpreter<'a> {
    image: &'a LinkedModule,
    fields: &'a mut [Option<Value>],
    max_call_depth: usize,
}

/// Operand cursor over one function's code.
struct Cursor<'a> {
    function: &'a CompiledFunction,
    ip: usize,
}

impl Cursor<'_> {
    fn truncated(&self) -> RuntimeError {
        RuntimeError::TruncatedCode {
            offset: self.ip,
            function: self.function.name.clone(),
        }
    }

    fn u8(&mut self) -> Result<u8, RuntimeError> {
        let byte = self.function.bytecode.read_byte(self.ip).ok_or_else(|| self.truncated())?;
        self.ip += 1;
        Ok(byte)
    }

    fn u16(&mut self) -> Result<u16, RuntimeError> {
        let value = self.function.bytecode.read_u16(self.ip).ok_or_else(|| self.truncated())?;
        self.ip += 2;
        Ok(value)
    }

    fn op(&mut self) -> Result<OpCode, RuntimeError> {
        let offset = self.ip;
        let byte = self.u8()?;
        OpCode::from_u8(byte).ok_or_else(|| RuntimeError::InvalidOpcode {
            byte,
            offset,
            function: self.function.name.clone(),
        })
    }

    fn jump(&mut self, distance: u16) {
        self.ip += distance as usize;
    }
}

/// Operand stack of one activation.
struct Stack<'a> {
    values: Vec<Value>,
    function: &'a str,
}

impl Stack<'_> {
    fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.values.pop().ok_or_else(|| RuntimeError::StackUnderflow {
            function: self.function.to_string(),
        })
    }

    fn peek(&self) -> Result<&Value, RuntimeError> {
        self.values.last().ok_or_else(|| RuntimeError::StackUnderflow {
            function: self.function.to_string(),
        })
    }

    fn pop_prim(&mut self) -> Result<i32, RuntimeError> {
        match self.pop()? {
            Value::Prim(n) => Ok(n),
            other => Err(mismatch("primitive", &other)),
        }
    }

    fn pop_pair(&mut self) -> Result<(i32, i32), RuntimeError> {
        let b = self.pop_prim()?;
        let a = self.pop_prim()?;
        Ok((a, b))
    }

    /// Pop `count` values, returned in push order.
    fn pop_args(&mut self, count: usize) -> Result<Vec<Value>, RuntimeError> {
        if self.values.len() < count {
            return Err(RuntimeError::StackUnderflow {
                function: self.function.to_string(),
            });
        }
        Ok(self.values.split_off(self.values.len() - count))
    }
}

fn mismatch(expected: &str, actual: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch {
        expected: expected.to_string(),
        actual: actual.kind().to_string(),
    }
}

impl<'a> Interpreter<'a> {
    fn invoke(
        &mut self,
        function: &'a CompiledFunction,
        args: Vec<Value>,
        depth: usize,
    ) -> Result<Option<Value>, RuntimeError> {
        if depth >= self.max_call_depth {
            return Err(RuntimeError::CallDepthExceeded {
                limit: self.max_call_depth,
            });
        }
        if args.len() != function.param_count as usize {
            return Err(RuntimeError::ArgumentCount {
                function: function.name.clone(),
                expected: function.param_count as usize,
                actual: args.len(),
            });
        }

        let slots = (function.max_locals as usize).max(args.len());
        let mut locals: Vec<Option<Value>> = args.into_iter().map(Some).collect();
        locals.resize(slots, None);

        let mut stack = Stack {
            values: Vec::with_capacity(function.max_stack as usize),
            function: &function.name,
        };
        let mut code = Cursor { function, ip: 0 };

        loop {
            match code.op()? {
                OpCode::Constant => {
                    let index = code.u8()? as u16;
                    stack.push(self.load_constant(index)?);
                }
                OpCode::ConstantWide => {
                    let index = code.u16()?;
                    stack.push(self.load_constant(index)?);
                }
                OpCode::PushZero => stack.push(Value::Prim(0)),
                OpCode::PushOne => stack.push(Value::Prim(1)),

                OpCode::GetLocal => {
                    let slot = code.u8()? as usize;
                    stack.push(get_local(&locals, slot, function)?);
                }
                OpCode::GetLocalWide => {
                    let slot = code.u16()? as usize;
                    stack.push(get_local(&locals, slot, function)?);
                }
                OpCode::SetLocal => {
                    let slot = code.u8()? as usize;
                    set_local(&mut locals, slot, stack.pop()?);
                }
                OpCode::SetLocalWide => {
                    let slot = code.u16()? as usize;
                    set_local(&mut locals, slot, stack.pop()?);
                }

                OpCode::GetGlobal => {
                    let index = self.field_index(code.u16()?)?;
                    let value = self.fields[index].clone().ok_or_else(|| {
                        RuntimeError::UninitializedField {
                            name: self.image.module.fields[index].name.clone(),
                        }
                    })?;
                    stack.push(value);
                }
                OpCode::SetGlobal => {
                    let index = self.field_index(code.u16()?)?;
                    self.fields[index] = Some(stack.pop()?);
                }

                OpCode::BoxInt => {
                    let n = stack.pop_prim()?;
                    stack.push(Value::Integer(n));
                }
                OpCode::UnboxInt => match stack.pop()? {
                    Value::Integer(n) => stack.push(Value::Prim(n)),
                    other => return Err(mismatch("Integer", &other)),
                },
                OpCode::BoxBool => {
                    let n = stack.pop_prim()?;
                    stack.push(Value::Boolean(n != 0));
                }
                OpCode::UnboxBool => match stack.pop()? {
                    Value::Boolean(b) => stack.push(Value::Prim(b as i32)),
                    other => return Err(mismatch("Boolean", &other)),
                },
                OpCode::CheckCast => {
                    let index = code.u16()?;
                    let Constant::Descriptor(descriptor) = self.image.constant(index)? else {
                        return Err(RuntimeError::InvalidConstant {
                            index: index as u32,
                            reason: "expected a descriptor".to_string(),
                        });
                    };
                    let top = stack.peek()?;
                    if !top.is_instance_of(descriptor) {
                        return Err(mismatch(descriptor, top));
                    }
                }

                OpCode::AddI32 => {
                    let (a, b) = stack.pop_pair()?;
                    stack.push(Value::Prim(a.wrapping_add(b)));
                }
                OpCode::SubI32 => {
                    let (a, b) = stack.pop_pair()?;
                    stack.push(Value::Prim(a.wrapping_sub(b)));
                }
                OpCode::MulI32 => {
                    let (a, b) = stack.pop_pair()?;
                    stack.push(Value::Prim(a.wrapping_mul(b)));
                }
                OpCode::DivI32 => {
                    let (a, b) = stack.pop_pair()?;
                    if b == 0 {
                        return Err(RuntimeError::DivisionByZero);
                    }
                    stack.push(Value::Prim(a.wrapping_div(b)));
                }

                OpCode::Jump => {
                    let distance = code.u16()?;
                    code.jump(distance);
                }
                OpCode::JumpIfFalse => {
                    let distance = code.u16()?;
                    if stack.pop_prim()? == 0 {
                        code.jump(distance);
                    }
                }
                OpCode::JumpIfTrue => {
                    let distance = code.u16()?;
                    if stack.pop_prim()? != 0 {
                        code.jump(distance);
                    }
                }
                op @ (OpCode::JumpIfLt
                | OpCode::JumpIfGt
                | OpCode::JumpIfLe
                | OpCode::JumpIfGe
                | OpCode::JumpIfEq) => {
                    let distance = code.u16()?;
                    let (a, b) = stack.pop_pair()?;
                    let taken = match op {
                        OpCode::JumpIfLt => a < b,
                        OpCode::JumpIfGt => a > b,
                        OpCode::JumpIfLe => a <= b,
                        OpCode::JumpIfGe => a >= b,
                        _ => a == b,
                    };
                    if taken {
                        code.jump(distance);
                    }
                }

                OpCode::Call => {
                    let index = code.u16()?;
                    let argc = code.u8()? as usize;
                    let args = stack.pop_args(argc)?;
                    let image = self.image;
                    let result = match image.link_at(index)? {
                        Link::Function(target) => {
                            let callee = &image.module.functions[target];
                            log::trace!("{} -> {}", function.name, callee.name);
                            self.invoke(callee, args, depth + 1)?
                        }
                        Link::Intrinsic(intrinsic) => intrinsic.invoke(args)?,
                        _ => {
                            return Err(RuntimeError::InvalidConstant {
                                index: index as u32,
                                reason: "expected a function".to_string(),
                            });
                        }
                    };
                    if let Some(value) = result {
                        stack.push(value);
                    }
                }
                OpCode::Return => return stack.pop().map(Some),
                OpCode::ReturnVoid => return Ok(None),
            }
        }
    }

    fn load_constant(&self, index: u16) -> Result<Value, RuntimeError> {
        match self.image.constant(index)? {
            Constant::Int(n) => Ok(Value::Prim(*n as i32)),
            Constant::StringData(bytes) => std::str::from_utf8(bytes)
                .map(Value::from)
                .map_err(|_| RuntimeError::InvalidConstant {
                    index: index as u32,
                    reason: "string data is not UTF-8".to_string(),
                }),
            _ => Err(RuntimeError::InvalidConstant {
                index: index as u32,
                reason: "not a loadable constant".to_string(),
            }),
        }
    }

    fn field_index(&self, index: u16) -> Result<usize, RuntimeError> {
        match self.image.link_at(index)? {
            Link::Field(field) => Ok(field),
            _ => Err(RuntimeError::InvalidConstant {
                index: index as u32,
                reason: "expected a field".to_string(),
            }),
        }
    }
}

fn get_local(
    locals: &[Option<Value>],
    slot: usize,
    function: &CompiledFunction,
) -> Result<Value, RuntimeError> {
    locals
        .get(slot)
        .cloned()
        .flatten()
        .ok_or_else(|| RuntimeError::UninitializedLocal {
            slot: slot as u32,
            function: function.name.clone(),
        })
}

fn set_local(locals: &mut Vec<Option<Value>>, slot: usize, value: Value) {
    if slot >= locals.len() {
        locals.resize(slot + 1, None);
    }
    locals[slot] = Some(value);
}
