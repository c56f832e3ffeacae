//! Compiler error types (spec.md §7).
//!
//! Every stage returns `Result<_, CompileError>`. Propagation is fail-fast:
//! the first error aborts the compilation (spec.md §7) -- nothing is
//! retried, and later stages never run with a partially-failed earlier
//! stage's output.

use std::fmt;

/// One of the four error kinds spec.md §7 names.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    /// A malformed S-expression; raised by the reader and surfaced to the user.
    Read { pos: usize, reason: String },
    /// A malformed core form, duplicate parameter, reserved-word misuse,
    /// improper lambda header, or unknown head symbol.
    Syntax {
        reason: String,
        /// The offending form, printed, when one is available.
        form: Option<String>,
    },
    /// Used deliberately for features the core intentionally refuses, e.g.
    /// a nested `define` in a non-top-level body position.
    NotYetImplemented { what: String },
    /// An invariant violation: a programming error in this compiler, not a
    /// user error (e.g. a free variable missing from a table that must
    /// contain it).
    Internal { what: String },
}

impl CompileError {
    pub fn read(pos: usize, reason: impl Into<String>) -> CompileError {
        CompileError::Read {
            pos,
            reason: reason.into(),
        }
    }

    pub fn syntax(reason: impl Into<String>) -> CompileError {
        CompileError::Syntax {
            reason: reason.into(),
            form: None,
        }
    }

    /// Attach the offending form's printed text, per spec.md §7's "message
    /// naming the offending form".
    pub fn syntax_at(reason: impl Into<String>, form: impl fmt::Display) -> CompileError {
        CompileError::Syntax {
            reason: reason.into(),
            form: Some(form.to_string()),
        }
    }

    pub fn not_yet_implemented(what: impl Into<String>) -> CompileError {
        CompileError::NotYetImplemented { what: what.into() }
    }

    pub fn internal(what: impl Into<String>) -> CompileError {
        CompileError::Internal { what: what.into() }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Read { pos, reason } => {
                write!(f, "read error at byte {pos}: {reason}")
            }
            CompileError::Syntax { reason, form: None } => write!(f, "syntax error: {reason}"),
            CompileError::Syntax {
                reason,
                form: Some(form),
            } => write!(f, "syntax error: {reason} in {form}"),
            CompileError::NotYetImplemented { what } => {
                write!(f, "not yet implemented: {what}")
            }
            CompileError::Internal { what } => write!(f, "internal error: {what}"),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<std::fmt::Error> for CompileError {
    fn from(e: std::fmt::Error) -> Self {
        CompileError::Internal {
            what: format!("assembly emission failed: {e}"),
        }
    }
}
