//! Chunk disassembler driven by the instruction descriptor table.

use crate::chunk::Chunk;
use crate::deserialize::ReadError;
use crate::isa::{self, OperandKind};

/// Render a chunk as text: the constant pool, then one instruction per
/// line with its offset and decoded immediates.
pub fn disassemble_chunk(chunk: &Chunk) -> Result<String, ReadError> {
    let mut out = String::new();

    out.push_str(".constants\n");
    for (index, value) in chunk.constants.iter().enumerate() {
        out.push_str(&format!("  {:04} {}\n", index, value));
    }

    out.push_str(".code\n");
    let mut pos = 0usize;
    while pos < chunk.code.len() {
        let byte = chunk.code[pos];
        let desc = isa::lookup(byte).ok_or(ReadError::InvalidOpcode(byte))?;

        out.push_str(&format!("  {:04x} {}", pos, desc.name));
        let mut operand_pos = pos + 1;
        for kind in desc.operands {
            let raw = isa::read_operand(&chunk.code, operand_pos).ok_or(ReadError::UnexpectedEof)?;
            match kind {
                OperandKind::Unsigned => out.push_str(&format!(" {}", raw as u32)),
                OperandKind::Signed => out.push_str(&format!(" {}", raw)),
            }
            operand_pos += 4;
        }
        out.push('\n');
        pos += desc.encoded_len();
    }

    Ok(out)
}
