//! Extension resolution: `name = base;` and `name = base { ... }`.
//!
//! Bases resolve left-to-right against previously declared rules, then
//! against the external definition provider. A base the provider is
//! still loading suspends the parse at the current scanner offset; the
//! returned continuation resumes it with the resolved value.

use crate::error::Diagnostic;
use crate::model::{Definition, RuleId, Value};

use super::ParseContext;

/// Where the engine picks back up after a suspended extension finishes.
#[derive(Clone, Debug)]
pub(crate) enum ResumePoint {
    /// Suspended while opening a bodied extension; the rule frame is
    /// already pushed, so resuming just re-enters the scan loop.
    Body,
    /// Suspended while committing a declaration; the structural operator
    /// that triggered the commit still owes its epilogue.
    Epilogue(Option<char>),
}

/// How one base name resolved during the probe pass.
#[derive(Clone, Debug)]
pub(crate) enum BaseSource {
    /// A previously declared rule in an ancestor scope.
    Local(RuleId),
    /// A value supplied immediately by the definition provider.
    Provided(Value),
    /// The definition provider is still loading this name.
    Pending,
    /// Nowhere to be found.
    Missing,
}

/// State saved when extension resolution suspends on a pending base.
#[derive(Debug)]
pub(crate) struct PendingExtension {
    pub(crate) derived: RuleId,
    pub(crate) base: String,
    pub(crate) remaining: Vec<(String, BaseSource)>,
    pub(crate) full: bool,
    pub(crate) resume: ResumePoint,
}

impl ParseContext<'_> {
    /// Splits a declaration value into candidate base names, or `None`
    /// when the value is not a plain name list.
    pub(crate) fn extension_bases(value: &Value) -> Option<Vec<String>> {
        fn flat_text(value: &Value, out: &mut String) -> bool {
            match value {
                Value::Token(t) => {
                    out.push_str(t);
                    true
                }
                Value::Seq(items) => items.iter().all(|v| flat_text(v, out)),
                _ => false,
            }
        }
        let mut text = String::new();
        if !flat_text(value, &mut text) {
            return None;
        }
        let names: Vec<String> = text
            .split([',', '>'])
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        if names.is_empty() {
            return None;
        }
        // Base names are idents, not arbitrary values: `c = a, b` names
        // rules, `pad = 1` does not.
        let is_ident = |n: &str| {
            let mut chars = n.chars();
            matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '-')
                && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        };
        names.iter().all(|n| is_ident(n)).then_some(names)
    }

    /// Resolves each base name once: declared rules first, then the
    /// external definition provider.
    pub(crate) fn probe_bases(
        &mut self,
        scope: RuleId,
        names: Vec<String>,
    ) -> Vec<(String, BaseSource)> {
        names
            .into_iter()
            .map(|name| {
                let source = if let Some(id) = self.arena.find_rule(scope, &name) {
                    BaseSource::Local(id)
                } else if let Some(provider) = self.definitions.as_mut() {
                    match provider.resolve(&name) {
                        crate::host::Resolution::Definition(v) => BaseSource::Provided(v),
                        crate::host::Resolution::Pending => BaseSource::Pending,
                        crate::host::Resolution::Unknown => BaseSource::Missing,
                    }
                } else {
                    BaseSource::Missing
                };
                (name, source)
            })
            .collect()
    }

    /// Applies probed bases left-to-right. Returns the saved state when a
    /// pending base suspends the parse.
    pub(crate) fn apply_bases(
        &mut self,
        derived: RuleId,
        sources: Vec<(String, BaseSource)>,
        full: bool,
        resume: ResumePoint,
    ) -> Option<PendingExtension> {
        let mut iter = sources.into_iter();
        while let Some((name, source)) = iter.next() {
            match source {
                BaseSource::Local(base) => self.extend_from(derived, base, full, &name),
                BaseSource::Provided(value) => self.apply_provided(derived, &name, value),
                BaseSource::Missing => {
                    self.report(Diagnostic::UnresolvedExtensionBase(name));
                }
                BaseSource::Pending => {
                    return Some(PendingExtension {
                        derived,
                        base: name,
                        remaining: iter.collect(),
                        full,
                        resume,
                    });
                }
            }
        }
        None
    }

    /// Links `derived` to `base`. A plain extension installs a
    /// copy-on-write fallback; a full extension (bodied form) snapshots
    /// the base's definition map so later changes around the base cannot
    /// leak in.
    pub(crate) fn extend_from(&mut self, derived: RuleId, base: RuleId, full: bool, name: &str) {
        if full {
            let snapshot = self.arena.rule(base).definitions.clone();
            let inherited_fallbacks = self.arena.rule(base).fallbacks.clone();
            let rule = self.arena.rule_mut(derived);
            let own = std::mem::take(&mut rule.definitions);
            rule.definitions = snapshot;
            rule.definitions.extend(own);
            rule.fallbacks.extend(inherited_fallbacks);
        } else {
            self.arena.rule_mut(derived).fallbacks.push(base);
        }
        self.arena.rule_mut(derived).bases.push(name.to_string());
    }

    /// Installs a provider-supplied definition on the derived rule.
    pub(crate) fn apply_provided(&mut self, derived: RuleId, name: &str, value: Value) {
        let rule = self.arena.rule_mut(derived);
        rule.definitions.push((
            name.to_string(),
            Definition {
                value,
                conditional: false,
            },
        ));
        rule.bases.push(name.to_string());
    }
}
