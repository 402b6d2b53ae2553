//! At-directives recognized while scanning: `@import` and `@xstyle`.

use crate::error::Diagnostic;
use crate::model::{RuleFlags, Value};
use crate::scanner::Scanner;

use super::{Frame, FrameKind, ParseContext, SheetFrame};

impl ParseContext<'_> {
    /// Dispatches a committed `@`-sequence. Returns `false` for
    /// at-values the engine does not treat specially (`@media` blocks
    /// and friends go through the normal rule path).
    pub(crate) fn dispatch_directive(&mut self, value: &Value) -> bool {
        let Some(first) = value.first_text() else {
            return false;
        };
        let word = first
            .strip_prefix('@')
            .map(|rest| rest.split_whitespace().next().unwrap_or(""));
        match word {
            Some("import") => {
                self.handle_import(value);
                true
            }
            Some("xstyle") => {
                self.handle_scope(first);
                true
            }
            _ => false,
        }
    }

    /// `@import "href";` — resolves the target through the style-sheet
    /// provider and queues it for scanning ahead of the rest of the
    /// current sheet. A sheet already imported this parse is skipped.
    fn handle_import(&mut self, value: &Value) {
        let Some(href) = import_href(value, &self.arena) else {
            log::warn!("@import without a target, ignored");
            return;
        };
        let base = self
            .sheets
            .last()
            .and_then(|sheet| sheet.path.clone());
        let Some(provider) = self.provider.as_mut() else {
            self.report(Diagnostic::ImportReadFailure {
                href,
                reason: "no style-sheet provider installed".to_string(),
            });
            return;
        };
        match provider.resolve(base.as_deref(), &href) {
            Ok(resolved) => {
                if !self.imported.insert(resolved.path.clone()) {
                    log::debug!("skipping duplicate import of {}", resolved.path);
                    return;
                }
                self.queued_sheet = Some(SheetFrame {
                    scanner: Scanner::new(&resolved.source),
                    path: Some(resolved.path),
                    base_depth: self.stack.len(),
                });
            }
            Err(err) => {
                self.report(Diagnostic::ImportReadFailure {
                    href,
                    reason: err.to_string(),
                });
            }
        }
    }

    /// `@xstyle start;` opens an anonymous scope rule that `}` cannot
    /// close; `@xstyle end;` pops it. Anything else is ignored.
    fn handle_scope(&mut self, text: &str) {
        let argument = text
            .strip_prefix("@xstyle")
            .map(str::trim)
            .unwrap_or("");
        match argument {
            "start" => {
                let parent = self.current_rule();
                let scope = self.arena.new_rule(parent, "", String::new());
                self.arena.rule_mut(scope).flags |= RuleFlags::SCOPE;
                let frame = Frame {
                    kind: FrameKind::Rule(scope),
                    opened: None,
                    start: 0,
                    sheet: self.sheets.len().saturating_sub(1),
                    saved: std::mem::take(&mut self.cur),
                    saved_expecting: self.expecting_name,
                };
                self.stack.push(frame);
                self.expecting_name = true;
            }
            "end" => {
                let top_is_scope = matches!(
                    self.stack.last(),
                    Some(Frame { kind: FrameKind::Rule(id), opened: None, .. })
                        if self.arena.rule(*id).flags.contains(RuleFlags::SCOPE)
                );
                if top_is_scope {
                    if let Some(frame) = self.stack.pop() {
                        self.cur = frame.saved;
                        self.expecting_name = frame.saved_expecting;
                    }
                } else {
                    log::debug!("@xstyle end with no open scope, ignored");
                }
            }
            other => log::debug!("unrecognized @xstyle directive {other:?}, ignored"),
        }
    }
}

/// Pulls the import target out of a committed `@import` sequence:
/// a quoted string, a `url(...)` call, or the bare remainder of the
/// directive token.
fn import_href(value: &Value, arena: &crate::model::Arena) -> Option<String> {
    fn search(value: &Value, arena: &crate::model::Arena) -> Option<String> {
        match value {
            Value::Quoted(text) => Some(text.clone()),
            Value::CallRef(id) => {
                let call = arena.call(*id);
                if call.callee == "url" {
                    call.args.first().and_then(|arg| match arg {
                        Value::Quoted(text) | Value::Token(text) => Some(text.trim().to_string()),
                        other => other.first_text().map(|t| t.trim().to_string()),
                    })
                } else {
                    None
                }
            }
            Value::Seq(items) => items.iter().find_map(|item| search(item, arena)),
            _ => None,
        }
    }
    if let Some(found) = search(value, arena) {
        if !found.is_empty() {
            return Some(found);
        }
    }
    let first = value.first_text()?;
    let rest = first.strip_prefix("@import")?.trim();
    (!rest.is_empty()).then(|| rest.to_string())
}
