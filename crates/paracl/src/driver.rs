//! Compilation driver: function discovery, semantic analysis, then code
//! generation, in that order. Generation is skipped when any hard error
//! is queued.
//!
//! With `DEBUG=driver` the input tree is dumped before analysis.

use bumpalo::Bump;

use bytecode::Chunk;
use codegen::generate;
use common::create_logger;
use frontend::dump::format_block;
use frontend::{analyze, error, explore, Block, ErrorReport};

/// Outcome of compiling one tree.
#[derive(Debug)]
pub struct CompileResult {
    /// The compiled chunk; `None` when errors were reported.
    pub chunk: Option<Chunk>,
    /// Every queued diagnostic, warnings included.
    pub reports: Vec<ErrorReport>,
}

impl CompileResult {
    pub fn success(&self) -> bool {
        self.chunk.is_some()
    }
}

/// Compile the tree rooted at `root`. The arena must be the one the tree
/// was built in; the explorer allocates synthesized names into it.
pub fn compile<'a>(root: &'a Block<'a>, arena: &'a Bump) -> CompileResult {
    let log = create_logger("driver");
    if log.enabled() {
        log.log("input tree:");
        for line in format_block(root, 0).lines() {
            log.log(line);
        }
    }

    let (mut analytics, mut reports) = explore(root, arena);
    let analysis = analyze(root, &mut analytics);

    let chunk = if error::has_errors(&reports) || error::has_errors(&analysis.reports) {
        None
    } else {
        Some(generate(root, &analysis, &analytics))
    };

    reports.extend(analysis.reports);
    CompileResult { chunk, reports }
}
