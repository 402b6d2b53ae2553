//! Interfaces consumed from the host environment.
//!
//! The engine performs no I/O of its own: `@import` reads go through a
//! [`StyleSheetProvider`], runtime-mode rule pairing reads a
//! [`NativeRuleList`], build-mode `url()` correction goes through a
//! [`ResourceInliner`], and definitions not declared in the sheet itself
//! can be supplied (possibly later) by a [`DefinitionProvider`].

use crate::model::Value;

/// A stylesheet resolved by a [`StyleSheetProvider`].
#[derive(Clone, Debug)]
pub struct ResolvedSheet {
    /// Absolute path, used as the base for nested imports and for
    /// duplicate-import detection.
    pub path: String,
    pub source: String,
}

/// Resolves `@import` references relative to the importing sheet.
pub trait StyleSheetProvider {
    fn resolve(&mut self, base: Option<&str>, href: &str) -> std::io::Result<ResolvedSheet>;
}

/// The host's indexed list of already-existing style rules, used in
/// runtime mode to pair each parsed rule with its native counterpart.
pub trait NativeRuleList {
    fn len(&self) -> usize;
    /// Selector text of the rule at `index`, if in range.
    fn selector_at(&self, index: usize) -> Option<&str>;
}

/// Inlines a binary resource as a data-URI payload during build-mode
/// serialization. Treated as a pure function.
pub trait ResourceInliner {
    /// Returns the payload text for `url(path)`, or `None` to leave the
    /// reference untouched. `suffix` is the file extension.
    fn inline(&self, path: &str, suffix: &str) -> Option<String>;
}

/// Outcome of an external definition lookup.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    /// The definition is available now.
    Definition(Value),
    /// The provider does not know this name.
    Unknown,
    /// The definition is being loaded; the parse suspends and must be
    /// resumed with the resolved value.
    Pending,
}

/// External capability supplying definitions that are not declared in
/// any sheet of the current compilation.
pub trait DefinitionProvider {
    fn resolve(&mut self, name: &str) -> Resolution;
}

/// Receiver for immediately-invoked call expressions: a call closed with
/// no pending assignment, e.g. `register(grid);` at rule level.
pub trait CallHandler {
    /// An `Err` is surfaced as a recovered
    /// [`Diagnostic::CallHandlerFailure`](crate::error::Diagnostic).
    fn call(&mut self, callee: &str, args: &[Value]) -> Result<(), String>;
}
