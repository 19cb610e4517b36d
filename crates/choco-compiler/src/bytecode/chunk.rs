//! Bytecode chunk for compiled functions.
//!
//! A `BytecodeChunk` holds the code of one function (or initializer) plus a
//! line table with one entry per byte.

use super::OpCode;

/// Compiled code of a single function.
///
/// Constants live in the module-level [`ConstantPool`](super::ConstantPool).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BytecodeChunk {
    code: Vec<u8>,
    /// Parallel to `code`.
    lines: Vec<u32>,
}

impl BytecodeChunk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a chunk from decoded parts. `lines` must be empty or as long as `code`.
    pub fn from_parts(code: Vec<u8>, lines: Vec<u32>) -> Self {
        let lines = if lines.len() == code.len() {
            lines
        } else {
            vec![0; code.len()]
        };
        Self { code, lines }
    }

    pub fn write_op(&mut self, op: OpCode, line: u32) {
        self.code.push(op as u8);
        self.lines.push(line);
    }

    pub fn write_byte(&mut self, byte: u8, line: u32) {
        self.code.push(byte);
        self.lines.push(line);
    }

    /// Write a 16-bit operand (big-endian).
    pub fn write_u16(&mut self, value: u16, line: u32) {
        for byte in value.to_be_bytes() {
            self.write_byte(byte, line);
        }
    }

    /// Current code offset (for jump patching).
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    /// Emit a jump and return the offset of its operand, to be patched later.
    pub fn emit_jump(&mut self, op: OpCode, line: u32) -> usize {
        self.write_op(op, line);
        let offset = self.code.len();
        self.write_u16(0xFFFF, line);
        offset
    }

    /// Point the jump operand at `offset` to the current position.
    ///
    /// Returns `None` if the distance does not fit in 16 bits.
    pub fn patch_jump(&mut self, offset: usize) -> Option<()> {
        let distance = self.code.len().checked_sub(offset + 2)?;
        let distance = u16::try_from(distance).ok()?;
        let [hi, lo] = distance.to_be_bytes();
        self.code[offset] = hi;
        self.code[offset + 1] = lo;
        Some(())
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn lines(&self) -> &[u32] {
        &self.lines
    }

    pub fn line_at(&self, offset: usize) -> Option<u32> {
        self.lines.get(offset).copied()
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn read_byte(&self, offset: usize) -> Option<u8> {
        self.code.get(offset).copied()
    }

    /// Read a u16 at the given offset (big-endian).
    pub fn read_u16(&self, offset: usize) -> Option<u16> {
        let hi = *self.code.get(offset)?;
        let lo = *self.code.get(offset + 1)?;
        Some(u16::from_be_bytes([hi, lo]))
    }

    pub fn read_op(&self, offset: usize) -> Option<OpCode> {
        self.code.get(offset).and_then(|&b| OpCode::from_u8(b))
    }

    /// Extract all opcodes from the chunk, skipping operands.
    pub fn opcodes(&self) -> Vec<OpCode> {
        let mut ops = Vec::new();
        let mut offset = 0;

        while offset < self.code.len() {
            if let Some(op) = self.read_op(offset) {
                ops.push(op);
                offset += 1 + op.operand_size();
            } else {
                offset += 1;
            }
        }

        ops
    }

    /// Human-readable listing, one instruction per line.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        let mut offset = 0;
        while offset < self.code.len() {
            let Some(op) = self.read_op(offset) else {
                out.push_str(&format!("{:04} ??? {:#04x}\n", offset, self.code[offset]));
                offset += 1;
                continue;
            };
            out.push_str(&format!("{:04} {}", offset, op.name()));
            match op.operand_size() {
                1 => {
                    if let Some(b) = self.read_byte(offset + 1) {
                        out.push_str(&format!(" {}", b));
                    }
                }
                2 => {
                    if let Some(v) = self.read_u16(offset + 1) {
                        if op.is_jump() {
                            out.push_str(&format!(" -> {}", offset + 3 + v as usize));
                        } else {
                            out.push_str(&format!(" #{}", v));
                        }
                    }
                }
                3 => {
                    if let (Some(v), Some(argc)) =
                        (self.read_u16(offset + 1), self.read_byte(offset + 3))
                    {
                        out.push_str(&format!(" #{} ({} args)", v, argc));
                    }
                }
                _ => {}
            }
            out.push('\n');
            offset += 1 + op.operand_size();
        }
        out
    }

    /// Check that this chunk contains exactly the given opcode sequence.
    #[track_caller]
    pub fn assert_opcodes(&self, expected: &[OpCode]) {
        let actual = self.opcodes();
        assert_eq!(
            actual,
            expected,
            "Bytecode mismatch.\nExpected: {:?}\nActual:   {:?}",
            expected.iter().map(|op| op.name()).collect::<Vec<_>>(),
            actual.iter().map(|op| op.name()).collect::<Vec<_>>(),
        );
    }

    /// Check that this chunk contains the given opcodes in order, not necessarily contiguous.
    #[track_caller]
    pub fn assert_contains_opcodes(&self, expected: &[OpCode]) {
        let actual = self.opcodes();
        let mut expected_iter = expected.iter().peekable();

        for op in &actual {
            if expected_iter.peek() == Some(&op) {
                expected_iter.next();
            }
        }

        if expected_iter.peek().is_some() {
            let remaining: Vec<_> = expected_iter.map(|op| op.name()).collect();
            panic!(
                "Missing opcodes in sequence.\nExpected to find: {:?}\nActual bytecode:  {:?}",
                remaining,
                actual.iter().map(|op| op.name()).collect::<Vec<_>>(),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_chunk_is_empty() {
        let chunk = BytecodeChunk::new();
        assert!(chunk.is_empty());
        assert_eq!(chunk.read_byte(0), None);
    }

    #[test]
    fn writes_record_lines() {
        let mut chunk = BytecodeChunk::new();
        chunk.write_op(OpCode::Constant, 3);
        chunk.write_byte(42, 3);
        chunk.write_u16(0x1234, 4);

        assert_eq!(chunk.len(), 4);
        assert_eq!(chunk.read_op(0), Some(OpCode::Constant));
        assert_eq!(chunk.read_byte(1), Some(42));
        assert_eq!(chunk.read_u16(2), Some(0x1234));
        assert_eq!(chunk.line_at(1), Some(3));
        assert_eq!(chunk.line_at(3), Some(4));
    }

    #[test]
    fn emit_and_patch_jump() {
        let mut chunk = BytecodeChunk::new();
        chunk.write_op(OpCode::PushOne, 1);
        let jump = chunk.emit_jump(OpCode::JumpIfFalse, 2);
        chunk.write_op(OpCode::PushOne, 3);
        chunk.write_op(OpCode::BoxBool, 3);
        chunk.patch_jump(jump).unwrap();

        // skips PushOne and BoxBool
        assert_eq!(chunk.read_u16(jump), Some(2));
    }

    #[test]
    fn opcodes_skip_operands() {
        let mut chunk = BytecodeChunk::new();
        chunk.write_op(OpCode::Call, 1);
        chunk.write_u16(7, 1);
        chunk.write_byte(2, 1);
        chunk.write_op(OpCode::GetLocal, 1);
        chunk.write_byte(0, 1);
        chunk.write_op(OpCode::Return, 1);

        assert_eq!(
            chunk.opcodes(),
            vec![OpCode::Call, OpCode::GetLocal, OpCode::Return]
        );
    }

    #[test]
    fn disassembly_resolves_jump_targets() {
        let mut chunk = BytecodeChunk::new();
        let jump = chunk.emit_jump(OpCode::Jump, 1);
        chunk.write_op(OpCode::PushZero, 1);
        chunk.patch_jump(jump).unwrap();
        chunk.write_op(OpCode::ReturnVoid, 1);

        let text = chunk.disassemble();
        assert!(text.contains("0000 JUMP -> 4"), "{text}");
        assert!(text.contains("0004 RETURN_VOID"), "{text}");
    }

    #[test]
    fn from_parts_fills_missing_lines() {
        let chunk = BytecodeChunk::from_parts(vec![OpCode::ReturnVoid as u8], Vec::new());
        assert_eq!(chunk.line_at(0), Some(0));
    }

    #[test]
    fn assert_contains_opcodes_success() {
        let mut chunk = BytecodeChunk::new();
        chunk.write_op(OpCode::GetLocal, 1);
        chunk.write_byte(0, 1);
        chunk.write_op(OpCode::UnboxInt, 1);
        chunk.write_op(OpCode::AddI32, 1);
        chunk.write_op(OpCode::BoxInt, 1);

        chunk.assert_contains_opcodes(&[OpCode::GetLocal, OpCode::AddI32, OpCode::BoxInt]);
    }

    #[test]
    #[should_panic(expected = "Missing opcodes")]
    fn assert_contains_opcodes_failure() {
        let mut chunk = BytecodeChunk::new();
        chunk.write_op(OpCode::PushZero, 1);
        chunk.assert_contains_opcodes(&[OpCode::PushZero, OpCode::SubI32]);
    }

    #[test]
    #[should_panic(expected = "Bytecode mismatch")]
    fn assert_opcodes_failure() {
        let mut chunk = BytecodeChunk::new();
        chunk.write_op(OpCode::PushZero, 1);
        chunk.assert_opcodes(&[OpCode::PushOne]);
    }
}
