//! Human-readable listings of compiled chunks.

use crate::bytecode::{Chunk, OpCode};

/// Render a whole chunk as a listing, one instruction per line.
pub fn disassemble_chunk(chunk: &Chunk, name: &str) -> String {
    let mut out = format!("== {} ==\n", name);

    let mut offset = 0;
    while offset < chunk.len() {
        let (text, next) = disassemble_instruction(chunk, offset);
        out.push_str(&text);
        out.push('\n');
        offset = next;
    }

    out
}

/// Render the instruction at `offset` and return the offset of the next one.
///
/// The line column shows `|` when the instruction comes from the same source
/// line as the previous byte.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize) -> (String, usize) {
    let mut text = format!("{:04} ", offset);

    if offset > 0 && chunk.line(offset) == chunk.line(offset - 1) {
        text.push_str("   | ");
    } else {
        text.push_str(&format!("{:4} ", chunk.line(offset)));
    }

    let byte = chunk.code[offset];
    match OpCode::from_byte(byte) {
        Some(OpCode::Constant) => {
            if offset + 1 >= chunk.len() {
                text.push_str("Constant         <truncated>");
                (text, offset + 1)
            } else {
                let index = chunk.code[offset + 1];
                match chunk.constants.get(index as usize) {
                    Some(value) => {
                        text.push_str(&format!("{:<16} {:4} '{}'", "Constant", index, value))
                    }
                    None => text.push_str(&format!(
                        "{:<16} {:4} <bad constant>",
                        "Constant", index
                    )),
                }
                (text, offset + 2)
            }
        }
        Some(op) => {
            text.push_str(&format!("{:?}", op));
            (text, offset + 1)
        }
        None => {
            text.push_str(&format!("Unknown opcode 0x{:02x}", byte));
            (text, offset + 1)
        }
    }
}
