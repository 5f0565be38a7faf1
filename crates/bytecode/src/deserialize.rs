//! Deserialization of chunks from the PCLC binary format.

use std::io::{self, Read};

use crate::chunk::Chunk;
use crate::serialize::MAGIC;

/// Errors that can occur while reading a chunk.
#[derive(Debug)]
pub enum ReadError {
    /// IO error while reading.
    Io(io::Error),
    /// Invalid magic bytes.
    InvalidMagic,
    /// Unexpected end of data.
    UnexpectedEof,
    /// Bytes remain after the chunk.
    TrailingData,
    /// A byte in the code buffer is not a known opcode (reported by the
    /// disassembler, which shares this error type).
    InvalidOpcode(u8),
}

impl std::fmt::Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadError::Io(e) => write!(f, "IO error: {}", e),
            ReadError::InvalidMagic => write!(f, "invalid PCLC magic bytes"),
            ReadError::UnexpectedEof => write!(f, "unexpected end of chunk data"),
            ReadError::TrailingData => write!(f, "trailing bytes after chunk"),
            ReadError::InvalidOpcode(b) => write!(f, "invalid opcode byte: 0x{:02x}", b),
        }
    }
}

impl std::error::Error for ReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReadError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ReadError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            ReadError::UnexpectedEof
        } else {
            ReadError::Io(e)
        }
    }
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32, ReadError> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_i32<R: Read>(reader: &mut R) -> Result<i32, ReadError> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(i32::from_le_bytes(bytes))
}

/// Read a chunk in the PCLC binary format.
pub fn read_chunk<R: Read>(reader: &mut R) -> Result<Chunk, ReadError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != *MAGIC {
        return Err(ReadError::InvalidMagic);
    }

    let constant_count = read_u32(reader)? as usize;
    let mut constants = Vec::with_capacity(constant_count.min(1 << 20));
    for _ in 0..constant_count {
        constants.push(read_i32(reader)?);
    }

    let code_len = read_u32(reader)? as usize;
    let mut code = vec![0u8; code_len];
    reader.read_exact(&mut code)?;

    let mut trailing = [0u8; 1];
    match reader.read(&mut trailing) {
        Ok(0) => {}
        Ok(_) => return Err(ReadError::TrailingData),
        Err(e) => return Err(e.into()),
    }

    Ok(Chunk::new(constants, code))
}
