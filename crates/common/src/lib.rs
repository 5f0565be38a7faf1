//! Common utilities for the ParaCL crates.
//!
//! Shared infrastructure used across the workspace:
//!
//! - [`debug`] - Per-module logging controlled via `DEBUG` environment variable
//! - [`intern`] - String interning using arena allocation
//! - [`source`] - Source locations

pub mod debug;
pub mod intern;
pub mod source;

pub use debug::{create_logger, Logger};
pub use intern::StringInterner;
pub use source::SourceLoc;
