//! Convenience runner: compile a tree and execute it against arbitrary
//! I/O handles.

use std::io::{BufRead, Write};

use bumpalo::Bump;

use bytecode::{run_chunk, VmError};
use frontend::{Block, ErrorReport};

use crate::driver::compile;

/// Aggregated result of a compile-and-run round.
#[derive(Debug)]
pub struct RunReport {
    /// Compile-time diagnostics, warnings included.
    pub reports: Vec<ErrorReport>,
    /// `None` when compilation failed and nothing ran; otherwise the
    /// VM's verdict.
    pub execution: Option<Result<(), VmError>>,
}

impl RunReport {
    /// Compiled cleanly and ran to completion.
    pub fn success(&self) -> bool {
        matches!(self.execution, Some(Ok(())))
    }
}

/// Compile `root` and, if clean, execute it.
///
/// Output already written before a runtime error stays written; partial
/// output is part of the contract.
pub fn compile_and_run<'a>(
    root: &'a Block<'a>,
    arena: &'a Bump,
    input: &mut dyn BufRead,
    output: &mut dyn Write,
) -> RunReport {
    let compiled = compile(root, arena);
    let execution = compiled
        .chunk
        .as_ref()
        .map(|chunk| run_chunk(chunk, input, output));
    RunReport {
        reports: compiled.reports,
        execution,
    }
}
