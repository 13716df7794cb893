//! Diagnostics shared by every compilation stage
//!
//! Only lexical errors abort a compilation. Everything else (syntax errors recovered by the
//! parser, semantic anomalies found by the builder, reconstruction problems found by the
//! generator) is collected as a [`Diagnostic`] and travels with the compilation result, so a
//! caller can tell degraded output from clean output.

use crate::mlm::ast::range::{SourceLocation, Span};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// The compilation stage that produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Parse,
    Build,
    Generate,
}

/// Stable diagnostic codes.
pub mod codes {
    pub const UNEXPECTED_TOKEN: &str = "P001";
    pub const MISSING_TERMINATOR: &str = "P002";
    pub const MALFORMED_SLOT: &str = "P003";
    pub const MISPLACED_SLOT: &str = "P004";
    pub const DUPLICATE_SLOT: &str = "P005";
    pub const TOO_MANY_ERRORS: &str = "P006";
    pub const TRAILING_INPUT: &str = "P007";

    pub const UNKNOWN_DURATION_UNIT: &str = "B001";
    pub const UNBOUND_CALL_PARAMETER: &str = "B002";
    pub const UNREACHABLE_STATEMENT: &str = "B003";
    pub const CONCLUDE_OUTSIDE_LOGIC: &str = "B004";
    pub const UNSUPPORTED_CONDITION: &str = "B005";
    pub const UNSUPPORTED_READ: &str = "B006";
    pub const UNSUPPORTED_OPERAND: &str = "B007";
    pub const INVALID_COUNT: &str = "B008";

    pub const UNBALANCED_ELEMENT: &str = "G001";
    pub const UNCONSUMED_RECORDS: &str = "G002";
    pub const MISSING_RECORD: &str = "G003";
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub stage: Stage,
    pub code: &'static str,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        stage: Stage,
        code: &'static str,
        message: impl Into<String>,
        span: Span,
    ) -> Self {
        Self {
            severity,
            stage,
            code,
            message: message.into(),
            span,
        }
    }

    pub fn error(stage: Stage, code: &'static str, message: impl Into<String>, span: Span) -> Self {
        Self::new(Severity::Error, stage, code, message, span)
    }

    pub fn warning(
        stage: Stage,
        code: &'static str,
        message: impl Into<String>,
        span: Span,
    ) -> Self {
        Self::new(Severity::Warning, stage, code, message, span)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// `error[P001] 3:14: expected 'then', found ';'`
    pub fn render(&self, location: &SourceLocation) -> String {
        format!(
            "{}[{}] {}: {}",
            self.severity,
            self.code,
            location.byte_to_position(self.span.start),
            self.message
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] at byte {}: {}",
            self.severity, self.code, self.span.start, self.message
        )
    }
}

/// Render every diagnostic against its source, one per line.
pub fn render_all(diagnostics: &[Diagnostic], source: &str) -> String {
    let location = SourceLocation::new(source);
    diagnostics
        .iter()
        .map(|diagnostic| diagnostic.render(&location))
        .collect::<Vec<_>>()
        .join("\n")
}
