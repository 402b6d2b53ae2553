//! Error types for extended-CSS parsing and compilation.
//!
//! Two severities exist. [`XcssError`] covers fatal syntax errors that
//! unwind the whole parse; each variant carries a 1-based line number and
//! the resolved path of the sheet being scanned (or a placeholder for
//! inline sheets). [`Diagnostic`] covers recovered conditions: they are
//! logged through the `log` crate, collected on the parse context, and
//! parsing continues.

use thiserror::Error;

/// Placeholder path used for sheets parsed from an in-memory string.
pub const INLINE_SHEET: &str = "inline stylesheet";

/// Fatal parse errors.
///
/// # Examples
///
/// ```rust
/// use xcss::{compile, XcssError};
///
/// let result = compile("a { content: \"no closing quote; }");
/// assert!(matches!(result, Err(XcssError::UnterminatedString { .. })));
/// ```
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum XcssError {
    /// A quoted string ran to end-of-input without a closing quote.
    #[error("unterminated string at line {line} in {sheet}")]
    UnterminatedString { line: usize, sheet: String },

    /// A closing operator did not match the opener on the top stack frame.
    #[error("unbalanced '{found}' at line {line} in {sheet}")]
    MismatchedOperator {
        found: char,
        line: usize,
        sheet: String,
    },

    /// Two consecutive rule closes without an intervening `;` under a
    /// parent that is not an at-rule. The resulting sheet is unrecoverable
    /// for a stock CSS parser, so this is fatal.
    #[error("a nested rule must end with a semicolon (line {line} in {sheet})")]
    MissingSemicolonBeforeNestedRule { line: usize, sheet: String },

    /// End of input was reached with rule or call contexts still open.
    #[error("unclosed '{opened}' at line {line} in {sheet}")]
    UnclosedBlock {
        opened: char,
        line: usize,
        sheet: String,
    },
}

/// Recovered parse conditions, surfaced to the logging sink and collected
/// on the [`ParseContext`](crate::parser::ParseContext).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// An extension named a rule not found in any ancestor scope. The
    /// derived rule simply gets no inherited definitions.
    #[error("unresolved extension base: {0}")]
    UnresolvedExtensionBase(String),

    /// The stylesheet provider failed to produce source for an `@import`.
    /// The import is skipped with an empty insertion.
    #[error("failed to read @import {href}: {reason}")]
    ImportReadFailure { href: String, reason: String },

    /// The receiver of an immediately-invoked call reported an error. No
    /// property is committed for the containing declaration.
    #[error("call handler for {callee}() failed: {reason}")]
    CallHandlerFailure { callee: String, reason: String },
}
