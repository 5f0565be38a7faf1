//! Bytecode layer of the ParaCL pipeline: instruction set, code buffer
//! builder, chunk representation with its binary format, disassembler and
//! the stack virtual machine.
//!
//! The instruction set is declarative: one descriptor table drives
//! emission, decoding, disassembly and execution. Nothing else in the
//! workspace switches over opcodes.

pub mod builder;
pub mod chunk;
pub mod deserialize;
pub mod disasm;
pub mod isa;
pub mod serialize;
pub mod vm;

pub use builder::BytecodeBuilder;
pub use chunk::Chunk;
pub use deserialize::{read_chunk, ReadError};
pub use disasm::disassemble_chunk;
pub use isa::{InstrDesc, Opcode, OperandKind};
pub use serialize::{write_chunk, MAGIC};
pub use vm::{run_chunk, Flow, Vm, VmError, STACK_LIMIT};
