//! # xcss - Extended-CSS Parser and Compiler
//!
//! A parser and compiler for an extensible superset of CSS. The syntax
//! keeps every stock CSS construct and adds definitions (`name = value`),
//! `@name` references, rule extension, nested rules as property values,
//! and `@import`/`@xstyle` directives. This crate provides:
//!
//! - **Parsing**: a suspendable stack machine that turns source sheets
//!   into a tree of [`Rule`](model::Rule)s and [`Call`](model::Call)s
//! - **Compilation**: build-mode output splitting each sheet into
//!   minified stock CSS plus re-parseable metadata
//! - **Host integration**: traits for sheet loading, native rule
//!   pairing, resource inlining, external definitions and call handling
//!
//! ## Quick Start
//!
//! ```rust
//! use xcss::compile;
//!
//! let source = r#"
//!     .panel {
//!         accent = #602fd0;
//!         .title { color: @accent; }
//!     }
//! "#;
//!
//! let compiled = compile(source).expect("valid sheet");
//! assert_eq!(compiled.css, ".panel .title{color:#602fd0;}");
//! assert_eq!(compiled.metadata, ".panel{accent=#602fd0;}");
//! ```
//!
//! ## Supported Syntax
//!
//! - Definitions: `name = value;`, visible to the rule's subtree
//! - References: `@name` inside property values
//! - Extension: `derived = base;` and `derived = base { ... }`
//! - Nested rules, both as selectors and as property values
//! - Directives: `@import "sheet.css";`, `@xstyle start;` / `@xstyle end;`
//! - Calls: `f(a, b)` as values or immediately invoked as statements
//!
//! Parses that depend on definitions the host is still loading suspend
//! into a [`Continuation`](parser::Continuation) instead of blocking;
//! see [`ParseContext::parse`](parser::ParseContext::parse).

pub mod error;
pub mod host;
pub mod model;
pub mod parser;
pub mod scanner;
pub mod serialize;

pub use error::{Diagnostic, XcssError};
pub use host::{
    CallHandler, DefinitionProvider, NativeRuleList, Resolution, ResolvedSheet, ResourceInliner,
    StyleSheetProvider,
};
pub use model::{Arena, Call, CallId, Definition, Rule, RuleFlags, RuleId, Value};
pub use parser::{Continuation, ParseContext, ParseOutcome};
pub use serialize::Compiled;

/// Compiles an inline sheet in build mode with no host collaborators.
/// Extension bases that would need an external definition resolve to
/// [`UnresolvedExtensionBase`](Diagnostic::UnresolvedExtensionBase)
/// diagnostics rather than suspending.
pub fn compile(source: &str) -> Result<Compiled, XcssError> {
    let mut outcome = ParseContext::new().parse(source, None)?;
    loop {
        match outcome {
            ParseOutcome::Done(ctx) => return Ok(Compiled::from_context(&ctx)),
            ParseOutcome::Suspended(continuation) => {
                outcome = continuation.resume(None)?;
            }
        }
    }
}
