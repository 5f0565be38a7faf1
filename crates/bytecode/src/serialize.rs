//! Serialization of chunks to the PCLC binary format.
//!
//! Layout, all integers little-endian:
//! - magic `PCLC` (4 bytes)
//! - u32 constant count, then that many i32 values
//! - u32 code length, then that many raw code bytes

use std::io::{self, Write};

use crate::chunk::Chunk;

/// Magic bytes for the chunk format.
pub const MAGIC: &[u8; 4] = b"PCLC";

/// Write a chunk in the PCLC binary format.
pub fn write_chunk<W: Write>(chunk: &Chunk, writer: &mut W) -> io::Result<()> {
    writer.write_all(MAGIC)?;

    writer.write_all(&(chunk.constants.len() as u32).to_le_bytes())?;
    for constant in &chunk.constants {
        writer.write_all(&constant.to_le_bytes())?;
    }

    writer.write_all(&(chunk.code.len() as u32).to_le_bytes())?;
    writer.write_all(&chunk.code)?;

    Ok(())
}
