//! Accumulated diagnostics for the frontend passes.
//!
//! Compile-time problems are queued, never thrown: analysis keeps going
//! past the first error so one run surfaces as many diagnostics as
//! possible. Code generation only runs when the queue holds no errors.

use common::SourceLoc;

/// How severe a report is. Warnings never gate code generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A secondary note attached to a report, e.g. "previously declared here".
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorAttachment {
    pub msg: String,
    pub loc: SourceLoc,
}

/// A single diagnostic with its source location and optional attachments.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorReport {
    pub severity: Severity,
    pub msg: String,
    pub loc: SourceLoc,
    pub attachments: Vec<ErrorAttachment>,
}

impl ErrorReport {
    pub fn error(msg: impl Into<String>, loc: SourceLoc) -> Self {
        Self {
            severity: Severity::Error,
            msg: msg.into(),
            loc,
            attachments: Vec::new(),
        }
    }

    pub fn warning(msg: impl Into<String>, loc: SourceLoc) -> Self {
        Self {
            severity: Severity::Warning,
            msg: msg.into(),
            loc,
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, msg: impl Into<String>, loc: SourceLoc) -> Self {
        self.attachments.push(ErrorAttachment {
            msg: msg.into(),
            loc,
        });
        self
    }
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}: {}", self.loc, tag, self.msg)?;
        for att in &self.attachments {
            write!(f, "\n{}: note: {}", att.loc, att.msg)?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorReport {}

/// True if any report in the queue is a hard error.
pub fn has_errors(reports: &[ErrorReport]) -> bool {
    reports.iter().any(|r| r.severity == Severity::Error)
}
