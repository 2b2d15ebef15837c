//! Reading and writing compiled chunks.
//!
//! The binary format is: magic number, version, constant pool (one tag byte
//! plus payload per entry), code bytes, then the line table. The line table
//! must be exactly as long as the code; the reader rejects anything else.

use std::fs::File;
use std::io::{BufWriter, Error as IoError, Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use crate::bytecode::{Chunk, OpCode};
use crate::vm::Value;

/// Magic number at the start of every chunk file: "RILL" in ASCII.
const MAGIC: u32 = 0x5249_4C4C;

const TAG_NIL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_NUMBER: u8 = 2;

#[derive(Error, Debug)]
pub enum ChunkFormatError {
    #[error("IO error: {0}")]
    IoError(#[from] IoError),

    #[error("Invalid chunk format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported chunk version: {0}")]
    UnsupportedVersion(u8),
}

/// Write a chunk to a file in the binary format.
pub fn write_chunk<P: AsRef<Path>>(chunk: &Chunk, path: P) -> Result<(), IoError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writer.write_u32::<BigEndian>(MAGIC)?;
    writer.write_u8(1)?; // Major version
    writer.write_u8(0)?; // Minor version
    writer.write_u16::<BigEndian>(0)?; // Patch version

    writer.write_u32::<BigEndian>(chunk.constants.len() as u32)?;
    for constant in &chunk.constants {
        match constant {
            Value::Nil => {
                writer.write_u8(TAG_NIL)?;
            }
            Value::Bool(b) => {
                writer.write_u8(TAG_BOOL)?;
                writer.write_u8(*b as u8)?;
            }
            Value::Number(n) => {
                writer.write_u8(TAG_NUMBER)?;
                writer.write_f64::<BigEndian>(*n)?;
            }
        }
    }

    writer.write_u32::<BigEndian>(chunk.code.len() as u32)?;
    writer.write_all(&chunk.code)?;

    writer.write_u32::<BigEndian>(chunk.lines.len() as u32)?;
    for line in &chunk.lines {
        writer.write_u32::<BigEndian>(*line)?;
    }

    writer.flush()?;
    Ok(())
}

/// Write a chunk to a file as pretty-printed JSON.
pub fn write_chunk_json<P: AsRef<Path>>(chunk: &Chunk, path: P) -> Result<(), IoError> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, chunk).map_err(IoError::from)
}

/// Parse a chunk from a reader (file, memory buffer, etc.)
pub fn read_chunk<R: Read>(reader: &mut R) -> Result<Chunk, ChunkFormatError> {
    let magic = reader.read_u32::<BigEndian>()?;
    if magic != MAGIC {
        return Err(ChunkFormatError::InvalidFormat(
            "Invalid magic number".to_string(),
        ));
    }

    let version = reader.read_u8()?;
    if version != 1 {
        return Err(ChunkFormatError::UnsupportedVersion(version));
    }
    let _minor_version = reader.read_u8()?;
    let _patch_version = reader.read_u16::<BigEndian>()?;

    let mut chunk = Chunk::new();

    let constants_len = reader.read_u32::<BigEndian>()? as usize;
    for _ in 0..constants_len {
        let tag = reader.read_u8()?;
        let constant = match tag {
            TAG_NIL => Value::Nil,
            TAG_BOOL => Value::Bool(reader.read_u8()? != 0),
            TAG_NUMBER => Value::Number(reader.read_f64::<BigEndian>()?),
            _ => {
                return Err(ChunkFormatError::InvalidFormat(format!(
                    "Unknown constant tag: {}",
                    tag
                )))
            }
        };
        chunk.constants.push(constant);
    }

    let code_len = reader.read_u32::<BigEndian>()? as usize;
    let mut code = vec![0u8; code_len];
    reader.read_exact(&mut code)?;
    chunk.code = code;

    let lines_len = reader.read_u32::<BigEndian>()? as usize;
    if lines_len != code_len {
        return Err(ChunkFormatError::InvalidFormat(format!(
            "Line table length {} does not match code length {}",
            lines_len, code_len
        )));
    }
    for _ in 0..lines_len {
        chunk.lines.push(reader.read_u32::<BigEndian>()?);
    }

    validate_code(&chunk)?;

    Ok(chunk)
}

/// Check that the code section decodes as a sequence of whole instructions.
fn validate_code(chunk: &Chunk) -> Result<(), ChunkFormatError> {
    let mut offset = 0;
    while offset < chunk.code.len() {
        let byte = chunk.code[offset];
        let op = OpCode::from_byte(byte).ok_or_else(|| {
            ChunkFormatError::InvalidFormat(format!(
                "Unknown opcode 0x{:02x} at offset {}",
                byte, offset
            ))
        })?;
        offset += 1 + op.num_operands();
    }

    if offset != chunk.code.len() {
        return Err(ChunkFormatError::InvalidFormat(
            "Truncated instruction at end of code".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use tempfile::tempdir;

    use crate::bytecode::OpCode;

    fn sample_chunk() -> Chunk {
        let mut chunk = Chunk::new();
        let a = chunk.add_constant(Value::Number(1.5));
        let b = chunk.add_constant(Value::Number(2.0));
        chunk.add_constant(Value::Bool(true));
        chunk.add_constant(Value::Nil);
        chunk.write_op(OpCode::Constant, 1);
        chunk.write(a as u8, 1);
        chunk.write_op(OpCode::Constant, 1);
        chunk.write(b as u8, 1);
        chunk.write_op(OpCode::Add, 1);
        chunk.write_op(OpCode::Return, 2);
        chunk
    }

    #[test]
    fn test_round_trip() {
        let chunk = sample_chunk();
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("sample.rlc");

        write_chunk(&chunk, &path).unwrap();
        let read_back = read_chunk(&mut File::open(&path).unwrap()).unwrap();

        assert_eq!(read_back, chunk);
    }

    #[test]
    fn test_round_trip_empty_chunk() {
        let chunk = Chunk::new();
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("empty.rlc");

        write_chunk(&chunk, &path).unwrap();
        let read_back = read_chunk(&mut File::open(&path).unwrap()).unwrap();

        assert!(read_back.is_empty());
        assert_eq!(read_back.constants.len(), 0);
    }

    #[test]
    fn test_round_trip_special_floats() {
        let mut chunk = Chunk::new();
        chunk.add_constant(Value::Number(f64::INFINITY));
        chunk.add_constant(Value::Number(f64::NEG_INFINITY));
        chunk.add_constant(Value::Number(f64::MAX));

        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("floats.rlc");
        write_chunk(&chunk, &path).unwrap();
        let read_back = read_chunk(&mut File::open(&path).unwrap()).unwrap();

        assert_eq!(read_back.constants[0], Value::Number(f64::INFINITY));
        assert_eq!(read_back.constants[1], Value::Number(f64::NEG_INFINITY));
        assert_eq!(read_back.constants[2], Value::Number(f64::MAX));
    }

    #[test]
    fn test_invalid_magic_number() {
        let mut data = Vec::new();
        data.write_u32::<BigEndian>(0x12345678).unwrap();
        data.write_u8(1).unwrap();

        let result = read_chunk(&mut Cursor::new(data));
        match result {
            Err(ChunkFormatError::InvalidFormat(msg)) => {
                assert_eq!(msg, "Invalid magic number")
            }
            _ => panic!("Expected InvalidFormat error"),
        }
    }

    #[test]
    fn test_unsupported_version() {
        let mut data = Vec::new();
        data.write_u32::<BigEndian>(MAGIC).unwrap();
        data.write_u8(2).unwrap();

        let result = read_chunk(&mut Cursor::new(data));
        match result {
            Err(ChunkFormatError::UnsupportedVersion(2)) => {}
            _ => panic!("Expected UnsupportedVersion(2) error"),
        }
    }

    #[test]
    fn test_unknown_constant_tag() {
        let mut data = Vec::new();
        data.write_u32::<BigEndian>(MAGIC).unwrap();
        data.write_u8(1).unwrap();
        data.write_u8(0).unwrap();
        data.write_u16::<BigEndian>(0).unwrap();
        data.write_u32::<BigEndian>(1).unwrap(); // One constant
        data.write_u8(99).unwrap(); // Bad tag

        let result = read_chunk(&mut Cursor::new(data));
        match result {
            Err(ChunkFormatError::InvalidFormat(msg)) => {
                assert_eq!(msg, "Unknown constant tag: 99")
            }
            _ => panic!("Expected InvalidFormat error"),
        }
    }

    #[test]
    fn test_mismatched_line_table_is_rejected() {
        let mut data = Vec::new();
        data.write_u32::<BigEndian>(MAGIC).unwrap();
        data.write_u8(1).unwrap();
        data.write_u8(0).unwrap();
        data.write_u16::<BigEndian>(0).unwrap();
        data.write_u32::<BigEndian>(0).unwrap(); // No constants
        data.write_u32::<BigEndian>(2).unwrap(); // Two code bytes
        data.push(OpCode::Add.to_byte());
        data.push(OpCode::Return.to_byte());
        data.write_u32::<BigEndian>(1).unwrap(); // But only one line entry
        data.write_u32::<BigEndian>(1).unwrap();

        let result = read_chunk(&mut Cursor::new(data));
        match result {
            Err(ChunkFormatError::InvalidFormat(msg)) => {
                assert!(msg.contains("does not match code length"))
            }
            _ => panic!("Expected InvalidFormat error"),
        }
    }

    #[test]
    fn test_truncated_data() {
        let chunk = sample_chunk();
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("trunc.rlc");
        write_chunk(&chunk, &path).unwrap();

        let mut full = Vec::new();
        File::open(&path).unwrap().read_to_end(&mut full).unwrap();

        for truncate_at in [3, 7, 12, 20] {
            let mut data = full.clone();
            data.truncate(truncate_at);
            let result = read_chunk(&mut Cursor::new(data));
            match result {
                Err(ChunkFormatError::IoError(_)) => {}
                other => panic!("Expected IoError for truncated data, got {:?}", other.err()),
            }
        }
    }

    #[test]
    fn test_unknown_opcode_in_code_is_rejected() {
        let mut chunk = Chunk::new();
        chunk.write(0xEE, 1);
        chunk.write_op(OpCode::Return, 1);

        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("badop.rlc");
        write_chunk(&chunk, &path).unwrap();

        let result = read_chunk(&mut File::open(&path).unwrap());
        match result {
            Err(ChunkFormatError::InvalidFormat(msg)) => {
                assert!(msg.contains("Unknown opcode 0xee"))
            }
            _ => panic!("Expected InvalidFormat error"),
        }
    }

    #[test]
    fn test_truncated_instruction_is_rejected() {
        // A Constant opcode with its operand byte missing
        let mut chunk = Chunk::new();
        chunk.write_op(OpCode::Add, 1);
        chunk.write_op(OpCode::Constant, 1);

        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("shortop.rlc");
        write_chunk(&chunk, &path).unwrap();

        let result = read_chunk(&mut File::open(&path).unwrap());
        match result {
            Err(ChunkFormatError::InvalidFormat(msg)) => {
                assert!(msg.contains("Truncated instruction"))
            }
            _ => panic!("Expected InvalidFormat error"),
        }
    }

    #[test]
    fn test_write_chunk_json() {
        let chunk = sample_chunk();
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("sample.json");

        write_chunk_json(&chunk, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: Chunk = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, chunk);
    }

    #[test]
    fn test_write_to_invalid_path() {
        let chunk = Chunk::new();
        let result = write_chunk(&chunk, "/nonexistent/directory/out.rlc");
        assert!(result.is_err());
    }
}
