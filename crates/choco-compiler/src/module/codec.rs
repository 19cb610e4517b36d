//! Binary module format.
//!
//! ```text
//! module    := "CHOC" version:u16 name:str
//!              count:u32 constant*
//!              count:u32 field*
//!              function(initializer) function(static initializer)
//!              count:u32 function*
//! constant  := 1 i64 | 2 bytes | 3 str str str | 4 str str str | 5 str
//! field     := name:str descriptor:str signature:str
//! function  := name:str descriptor:str signature:str params:u8
//!              max_locals:u16 max_stack:u16 code:bytes lines:u8 (u32 * code.len)?
//! str       := bytes holding UTF-8
//! bytes     := len:u32 byte*
//! ```
//!
//! All integers are big-endian. The line table is written only when it holds
//! a non-zero entry.

use thiserror::Error;

use super::{CompiledFunction, CompiledModule, FieldEntry};
use crate::bytecode::{BytecodeChunk, Constant, ConstantPool};

pub const MAGIC: &[u8; 4] = b"CHOC";
pub const VERSION: u16 = 1;

/// Errors raised while decoding a binary module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("not a choco module (bad magic)")]
    BadMagic,

    #[error("unsupported module format version {found}, expected {VERSION}")]
    UnsupportedVersion { found: u16 },

    #[error("truncated module: {what} at offset {offset}")]
    Truncated { what: &'static str, offset: usize },

    #[error("invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("unknown constant tag {tag} at offset {offset}")]
    UnknownConstantTag { tag: u8, offset: usize },

    #[error("{count} trailing byte(s) after module")]
    TrailingBytes { count: usize },
}

// ============================================================================
// Encoding
// ============================================================================

pub fn encode(module: &CompiledModule) -> Vec<u8> {
    let mut writer = Writer::default();
    writer.out.extend_from_slice(MAGIC);
    writer.u16(VERSION);
    writer.str(&module.name);

    writer.len(module.constants.len());
    for constant in module.constants.constants() {
        writer.constant(constant);
    }

    writer.len(module.fields.len());
    for field in &module.fields {
        writer.str(&field.name);
        writer.str(&field.descriptor);
        writer.str(&field.signature);
    }

    writer.function(&module.initializer);
    writer.function(&module.static_initializer);
    writer.len(module.functions.len());
    for function in &module.functions {
        writer.function(function);
    }

    log::debug!("encoded module {} ({} bytes)", module.name, writer.out.len());
    writer.out
}

#[derive(Default)]
struct Writer {
    out: Vec<u8>,
}

impl Writer {
    fn u8(&mut self, v: u8) {
        self.out.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.out.extend_from_slice(&v.to_be_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.out.extend_from_slice(&v.to_be_bytes());
    }

    fn len(&mut self, len: usize) {
        self.u32(len as u32);
    }

    fn bytes(&mut self, bytes: &[u8]) {
        self.len(bytes.len());
        self.out.extend_from_slice(bytes);
    }

    fn str(&mut self, s: &str) {
        self.bytes(s.as_bytes());
    }

    fn constant(&mut self, constant: &Constant) {
        self.u8(constant.tag());
        match constant {
            Constant::Int(v) => self.out.extend_from_slice(&v.to_be_bytes()),
            Constant::StringData(data) => self.bytes(data),
            Constant::Function {
                owner,
                name,
                descriptor,
            }
            | Constant::Field {
                owner,
                name,
                descriptor,
            } => {
                self.str(owner);
                self.str(name);
                self.str(descriptor);
            }
            Constant::Descriptor(descriptor) => self.str(descriptor),
        }
    }

    fn function(&mut self, function: &CompiledFunction) {
        self.str(&function.name);
        self.str(&function.descriptor);
        self.str(&function.signature);
        self.u8(function.param_count);
        self.u16(function.max_locals);
        self.u16(function.max_stack);
        self.bytes(function.bytecode.code());

        let lines = function.bytecode.lines();
        if lines.iter().any(|&line| line != 0) {
            self.u8(1);
            for &line in lines {
                self.u32(line);
            }
        } else {
            self.u8(0);
        }
    }
}

// ============================================================================
// Decoding
// ============================================================================

pub fn decode(bytes: &[u8]) -> Result<CompiledModule, DecodeError> {
    let mut reader = Reader { bytes, pos: 0 };

    if reader.take(4, "magic")? != MAGIC {
        return Err(DecodeError::BadMagic);
    }
    let version = reader.u16("version")?;
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion { found: version });
    }
    let name = reader.str("module name")?;

    let count = reader.len("constant count")?;
    let mut constants = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        constants.push(reader.constant()?);
    }
    let constants: ConstantPool = constants.into_iter().collect();

    let count = reader.len("field count")?;
    let mut fields = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        fields.push(FieldEntry {
            name: reader.str("field name")?,
            descriptor: reader.str("field descriptor")?,
            signature: reader.str("field signature")?,
        });
    }

    let initializer = reader.function()?;
    let static_initializer = reader.function()?;
    let count = reader.len("function count")?;
    let mut functions = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        functions.push(reader.function()?);
    }

    let rest = bytes.len() - reader.pos;
    if rest > 0 {
        return Err(DecodeError::TrailingBytes { count: rest });
    }

    Ok(CompiledModule {
        name,
        constants,
        fields,
        initializer,
        static_initializer,
        functions,
    })
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(DecodeError::Truncated {
                what,
                offset: self.pos,
            })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    fn u8(&mut self, what: &'static str) -> Result<u8, DecodeError> {
        Ok(self.array::<1>(what)?[0])
    }

    fn u16(&mut self, what: &'static str) -> Result<u16, DecodeError> {
        Ok(u16::from_be_bytes(self.array(what)?))
    }

    fn u32(&mut self, what: &'static str) -> Result<u32, DecodeError> {
        Ok(u32::from_be_bytes(self.array(what)?))
    }

    fn len(&mut self, what: &'static str) -> Result<usize, DecodeError> {
        Ok(self.u32(what)? as usize)
    }

    fn bytes(&mut self, what: &'static str) -> Result<&'a [u8], DecodeError> {
        let len = self.len(what)?;
        self.take(len, what)
    }

    fn str(&mut self, what: &'static str) -> Result<String, DecodeError> {
        let offset = self.pos;
        let bytes = self.bytes(what)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8 { offset })
    }

    fn constant(&mut self) -> Result<Constant, DecodeError> {
        let offset = self.pos;
        let tag = self.u8("constant tag")?;
        let constant = match tag {
            1 => Constant::Int(i64::from_be_bytes(self.array("integer constant")?)),
            2 => Constant::StringData(self.bytes("string constant")?.to_vec()),
            3 => Constant::Function {
                owner: self.str("function owner")?,
                name: self.str("function name")?,
                descriptor: self.str("function descriptor")?,
            },
            4 => Constant::Field {
                owner: self.str("field owner")?,
                name: self.str("field name")?,
                descriptor: self.str("field descriptor")?,
            },
            5 => Constant::Descriptor(self.str("descriptor")?),
            tag => return Err(DecodeError::UnknownConstantTag { tag, offset }),
        };
        Ok(constant)
    }

    fn function(&mut self) -> Result<CompiledFunction, DecodeError> {
        let name = self.str("function name")?;
        let descriptor = self.str("function descriptor")?;
        let signature = self.str("function signature")?;
        let param_count = self.u8("parameter count")?;
        let max_locals = self.u16("max locals")?;
        let max_stack = self.u16("max stack")?;
        let code = self.bytes("code")?.to_vec();

        let lines = match self.u8("line table flag")? {
            0 => Vec::new(),
            _ => {
                let mut lines = Vec::with_capacity(code.len());
                for _ in 0..code.len() {
                    lines.push(self.u32("line table")?);
                }
                lines
            }
        };

        Ok(CompiledFunction {
            name,
            descriptor,
            signature,
            param_count,
            max_locals,
            max_stack,
            bytecode: BytecodeChunk::from_parts(code, lines),
        })
    }
}
