//! Code generation: walks the analyzed AST and produces a chunk.
//!
//! The generator keeps a compile-time model of the VM's data stack (the
//! [`frame::StackFrame`]) and pairs every emitted instruction with the
//! model adjustment the VM will make at runtime, so slot lookups during
//! emission see exactly the layout execution will see.

pub mod frame;
pub mod generator;

pub use frame::StackFrame;
pub use generator::generate;
