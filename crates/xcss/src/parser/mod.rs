//! The stack-machine parse engine.
//!
//! One flat loop drives a [`Scanner`] per open sheet and a frame stack
//! for nested `{`, `(` and `[` contexts. Each scanner step folds its
//! token and assignment into the current declaration state, then the
//! structural operator either opens a frame, closes one, or commits the
//! pending declaration. `@import` pushes a new sheet frame on the same
//! stack, so imported source is scanned in place of the directive
//! without recursion, and an extension base still being loaded by the
//! host suspends the whole machine into a [`Continuation`].

pub mod directives;
pub mod extend;

use std::collections::HashSet;

use crate::error::{Diagnostic, INLINE_SHEET, XcssError};
use crate::host::{CallHandler, DefinitionProvider, NativeRuleList, StyleSheetProvider};
use crate::model::{Arena, CallId, Definition, RuleFlags, RuleId, Value};
use crate::scanner::{AssignOp, ScanStep, Scanner};
use extend::{PendingExtension, ResumePoint};

/// In-progress declaration state: the property name, the accumulated
/// value sequence, and which assignment operator introduced it.
#[derive(Clone, Debug, Default)]
struct DeclState {
    name: Option<String>,
    seq: Option<Value>,
    assign: Option<AssignOp>,
    conditional: bool,
}

#[derive(Clone, Copy, Debug)]
enum FrameKind {
    Rule(RuleId),
    Call(CallId),
}

/// One open nesting context. The parent's declaration state is saved on
/// push and restored on pop, so a value interrupted by a nested block
/// keeps accumulating afterwards.
struct Frame {
    kind: FrameKind,
    /// Opening operator; `None` for `@xstyle` scope wrappers, which no
    /// closing operator may pop.
    opened: Option<char>,
    /// Byte offset just past the opener, for raw `css_text` capture.
    start: usize,
    /// Index of the sheet that opened this frame.
    sheet: usize,
    saved: DeclState,
    saved_expecting: bool,
}

/// One open stylesheet. Imports push a frame here; the scan continues
/// from the top of this stack.
struct SheetFrame {
    scanner: Scanner,
    path: Option<String>,
    /// Frame-stack depth when this sheet was opened. Every frame above
    /// it must close before the sheet ends.
    base_depth: usize,
}

impl SheetFrame {
    fn name(&self) -> String {
        self.path
            .clone()
            .unwrap_or_else(|| INLINE_SHEET.to_string())
    }
}

/// The parse machine and its result model.
///
/// Collaborators are borrowed for the lifetime of the parse and
/// installed with the `with_*` builders before calling
/// [`parse`](ParseContext::parse).
pub struct ParseContext<'h> {
    arena: Arena,
    stack: Vec<Frame>,
    sheets: Vec<SheetFrame>,
    queued_sheet: Option<SheetFrame>,
    cur: DeclState,
    /// The next token is a property name rather than value text.
    expecting_name: bool,
    /// Whether a stock CSS parser would have accepted everything since
    /// the last rule boundary; gates native rule pairing.
    browser_understood: bool,
    /// Raw source accumulated toward the next rule selector.
    selector: String,
    last_op: Option<char>,
    /// Cursor into the native rule list for sequential pairing.
    native_index: usize,
    diagnostics: Vec<Diagnostic>,
    imported: HashSet<String>,
    provider: Option<&'h mut dyn StyleSheetProvider>,
    definitions: Option<&'h mut dyn DefinitionProvider>,
    native: Option<&'h dyn NativeRuleList>,
    call_handler: Option<&'h mut dyn CallHandler>,
}

/// Result of driving the machine to the end of input: either a finished
/// context, or a suspension waiting on a definition the host is still
/// loading.
pub enum ParseOutcome<'h> {
    Done(ParseContext<'h>),
    Suspended(Continuation<'h>),
}

/// A suspended parse. [`resume`](Continuation::resume) feeds in the
/// value of the base the machine stopped on and re-enters the scan loop
/// at the exact saved offset.
pub struct Continuation<'h> {
    ctx: ParseContext<'h>,
    pending: PendingExtension,
}

impl<'h> Continuation<'h> {
    /// Name of the definition the parse is waiting for.
    pub fn pending_base(&self) -> &str {
        &self.pending.base
    }

    /// Resumes with the resolved value, or `None` if the host failed to
    /// produce one, which downgrades the base to an
    /// [`UnresolvedExtensionBase`](Diagnostic::UnresolvedExtensionBase)
    /// diagnostic.
    pub fn resume(mut self, value: Option<Value>) -> Result<ParseOutcome<'h>, XcssError> {
        let PendingExtension {
            derived,
            base,
            remaining,
            full,
            resume,
        } = self.pending;
        match value {
            Some(v) => self.ctx.apply_provided(derived, &base, v),
            None => self.ctx.report(Diagnostic::UnresolvedExtensionBase(base)),
        }
        if let Some(pending) = self.ctx.apply_bases(derived, remaining, full, resume.clone()) {
            return Ok(ParseOutcome::Suspended(Continuation {
                ctx: self.ctx,
                pending,
            }));
        }
        if let ResumePoint::Epilogue(op) = resume {
            self.ctx.op_epilogue(op)?;
        }
        self.ctx.run_to_outcome()
    }
}

impl Default for ParseContext<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'h> ParseContext<'h> {
    pub fn new() -> Self {
        let arena = Arena::new();
        let root = arena.root();
        Self {
            arena,
            stack: vec![Frame {
                kind: FrameKind::Rule(root),
                opened: None,
                start: 0,
                sheet: 0,
                saved: DeclState::default(),
                saved_expecting: true,
            }],
            sheets: Vec::new(),
            queued_sheet: None,
            cur: DeclState::default(),
            expecting_name: true,
            browser_understood: true,
            selector: String::new(),
            last_op: None,
            native_index: 0,
            diagnostics: Vec::new(),
            imported: HashSet::new(),
            provider: None,
            definitions: None,
            native: None,
            call_handler: None,
        }
    }

    pub fn with_style_sheet_provider(mut self, provider: &'h mut dyn StyleSheetProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_definition_provider(mut self, provider: &'h mut dyn DefinitionProvider) -> Self {
        self.definitions = Some(provider);
        self
    }

    pub fn with_native_rules(mut self, rules: &'h dyn NativeRuleList) -> Self {
        self.native = Some(rules);
        self
    }

    pub fn with_call_handler(mut self, handler: &'h mut dyn CallHandler) -> Self {
        self.call_handler = Some(handler);
        self
    }

    /// Parses one sheet to completion or suspension. `path` is used for
    /// error reporting, relative import resolution and duplicate-import
    /// detection; inline source passes `None`.
    pub fn parse(
        mut self,
        source: &str,
        path: Option<&str>,
    ) -> Result<ParseOutcome<'h>, XcssError> {
        if let Some(p) = path {
            self.imported.insert(p.to_string());
        }
        let base_depth = self.stack.len();
        self.sheets.push(SheetFrame {
            scanner: Scanner::new(source),
            path: path.map(str::to_string),
            base_depth,
        });
        self.run_to_outcome()
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn root(&self) -> RuleId {
        self.arena.root()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Looks up a rule declared at the top level by name.
    pub fn find_rule(&self, name: &str) -> Option<RuleId> {
        self.arena.find_rule(self.arena.root(), name)
    }

    fn run_to_outcome(mut self) -> Result<ParseOutcome<'h>, XcssError> {
        match self.run()? {
            Some(pending) => Ok(ParseOutcome::Suspended(Continuation { ctx: self, pending })),
            None => Ok(ParseOutcome::Done(self)),
        }
    }

    fn run(&mut self) -> Result<Option<PendingExtension>, XcssError> {
        loop {
            if let Some(sheet) = self.queued_sheet.take() {
                self.sheets.push(sheet);
            }
            let Some(sheet) = self.sheets.last_mut() else {
                return Ok(None);
            };
            let Some(step) = sheet.scanner.next_step() else {
                self.end_sheet()?;
                continue;
            };
            if let Some(pending) = self.handle_step(step)? {
                return Ok(Some(pending));
            }
        }
    }

    fn handle_step(&mut self, step: ScanStep) -> Result<Option<PendingExtension>, XcssError> {
        let was_expecting = self.expecting_name;

        // The text this step contributes to the value position, with any
        // mid-token assignment reattached.
        let step_text: String = if was_expecting {
            match &step.assignment {
                Some(a) => a.value.clone(),
                None => step.token.clone(),
            }
        } else {
            let mut text = step.token.clone();
            if let Some(a) = &step.assignment {
                text.push(a.op.as_char());
                if a.conditional {
                    text.push('?');
                }
                text.push_str(&a.value);
            }
            text
        };

        if was_expecting {
            if let Some(a) = &step.assignment {
                self.cur.name = Some(step.token.clone());
                self.cur.assign = Some(a.op);
                self.cur.conditional = a.conditional;
                self.cur.seq = if a.value.is_empty() {
                    None
                } else {
                    Some(self.value_token(&a.value))
                };
            } else if !step.token.is_empty() {
                self.cur.seq = Some(Value::Token(step.token.clone()));
            }
            self.expecting_name = false;
        } else if !step_text.is_empty() {
            let operand = self.value_token(&step_text);
            self.append_seq(operand);
        }

        // Selector text accumulates raw source; a `{` composes the
        // selector from what came before it instead.
        if step.op != Some('{') {
            self.selector.push_str(&step.raw);
        }

        match step.op {
            Some(q @ ('"' | '\'')) => {
                let scanned = match self.sheets.last_mut() {
                    Some(sheet) => sheet.scanner.scan_quoted(q),
                    None => return Ok(None),
                };
                match scanned {
                    Ok((body, raw)) => {
                        self.selector.push_str(&raw);
                        self.append_seq(Value::Quoted(body));
                    }
                    Err(()) => {
                        let (line, sheet) = self.position();
                        return Err(XcssError::UnterminatedString { line, sheet });
                    }
                }
                return Ok(None);
            }
            Some('\\') => {
                if let Some(sheet) = self.sheets.last_mut() {
                    if let Some(c) = sheet.scanner.scan_escaped_char() {
                        self.selector.push(c);
                        self.append_seq(Value::Token(format!("\\{c}")));
                    }
                }
                return Ok(None);
            }
            Some(o @ ('{' | '(' | '[')) => {
                let pending = self.open_frame(o, &step, &step_text)?;
                self.last_op = Some(o);
                return Ok(pending);
            }
            _ => {}
        }

        let pending = self.commit_check(step.op)?;
        if pending.is_some() {
            return Ok(pending);
        }
        self.op_epilogue(step.op)?;
        Ok(None)
    }

    fn open_frame(
        &mut self,
        opener: char,
        step: &ScanStep,
        step_text: &str,
    ) -> Result<Option<PendingExtension>, XcssError> {
        let sheet_index = self.sheets.len().saturating_sub(1);
        let start = self.sheets.last().map(|s| s.scanner.pos()).unwrap_or(0);

        if opener == '{' {
            let parent = self.current_rule();
            let assign = self.cur.assign;

            let mut sel_text = self.selector.clone();
            sel_text.push_str(&step.token);
            if let Some(a) = &step.assignment {
                if a.op == AssignOp::Assign {
                    sel_text.push(':');
                    sel_text.push_str(&a.value);
                }
            }
            let normalized = normalize_selector(&sel_text);

            let creating_declare = assign == Some(AssignOp::Declare);
            let creating_assign =
                assign == Some(AssignOp::Assign) && !self.arena.is_root_like(parent);
            let creating = creating_declare || creating_assign;

            let key = if creating {
                self.cur
                    .name
                    .clone()
                    .unwrap_or_else(|| normalized.clone())
            } else {
                normalized.clone()
            };
            let selector = if creating {
                String::new()
            } else {
                normalized.clone()
            };
            let child = self.arena.new_rule(parent, &key, selector);

            if creating {
                self.arena.rule_mut(child).flags |= RuleFlags::CREATING;
                self.browser_understood = false;
                if creating_declare {
                    let def = Definition {
                        value: Value::RuleRef(child),
                        conditional: self.cur.conditional,
                    };
                    self.arena
                        .rule_mut(parent)
                        .definitions
                        .push((key.clone(), def));
                }
            } else if self.arena.is_root_like(parent) && self.browser_understood {
                let mut paired = step.build_ref;
                if paired.is_none() {
                    if let Some(native) = self.native {
                        let mut i = self.native_index;
                        while let Some(sel) = native.selector_at(i) {
                            i += 1;
                            if sel.eq_ignore_ascii_case(&normalized) {
                                paired = Some(i - 1);
                                break;
                            }
                        }
                    }
                }
                if let Some(n) = paired {
                    self.native_index = n + 1;
                    self.arena.rule_mut(child).rule_ref = Some(n);
                }
            }

            self.append_seq(Value::RuleRef(child));
            let frame = Frame {
                kind: FrameKind::Rule(child),
                opened: Some('{'),
                start,
                sheet: sheet_index,
                saved: std::mem::take(&mut self.cur),
                saved_expecting: self.expecting_name,
            };
            self.stack.push(frame);
            self.expecting_name = true;
            self.selector.clear();

            // Bodied extension: `name = base, other { ... }` resolves its
            // bases now, snapshotting each one's definitions.
            if creating_declare {
                if let Some(a) = &step.assignment {
                    if !a.value.is_empty() {
                        if let Some(names) =
                            Self::extension_bases(&Value::Token(a.value.clone()))
                        {
                            let sources = self.probe_bases(parent, names);
                            return Ok(self.apply_bases(
                                child,
                                sources,
                                true,
                                ResumePoint::Body,
                            ));
                        }
                    }
                }
            }
            return Ok(None);
        }

        // `(` and `[` open call contexts.
        let scope = self.current_rule();
        let callee = if opener == '(' {
            crate::scanner::strings::trailing_ident(step_text).to_string()
        } else {
            String::new()
        };
        let definition = self.arena.resolve_definition(scope, &callee).cloned();
        let call = self.arena.new_call(callee, opener, scope);
        self.arena.call_mut(call).definition = definition;
        self.append_seq(Value::CallRef(call));
        let frame = Frame {
            kind: FrameKind::Call(call),
            opened: Some(opener),
            start,
            sheet: sheet_index,
            saved: std::mem::take(&mut self.cur),
            saved_expecting: self.expecting_name,
        };
        self.stack.push(frame);
        self.expecting_name = false;
        Ok(None)
    }

    /// Runs after every structural operator that is not an opener or a
    /// quote: commits the pending declaration, if any, against the
    /// innermost rule.
    fn commit_check(&mut self, op: Option<char>) -> Result<Option<PendingExtension>, XcssError> {
        let Some(seq) = self.cur.seq.clone() else {
            return Ok(None);
        };
        if self.cur.assign.is_none() && self.dispatch_directive(&seq) {
            self.cur.seq = None;
            return Ok(None);
        }
        // Inside a call, the sequence becomes arguments at the close.
        if matches!(
            self.stack.last(),
            Some(Frame {
                kind: FrameKind::Call(_),
                ..
            })
        ) {
            return Ok(None);
        }
        let (Some(assign), Some(name)) = (self.cur.assign, self.cur.name.clone()) else {
            return Ok(None);
        };
        match assign {
            AssignOp::Assign => {
                self.set_value(&name, seq);
                Ok(None)
            }
            AssignOp::Declare => {
                let conditional = self.cur.conditional;
                self.declare_property(&name, seq, conditional, op)
            }
        }
    }

    fn op_epilogue(&mut self, op: Option<char>) -> Result<(), XcssError> {
        match op {
            Some(':') => {
                if self.cur.assign == Some(AssignOp::Declare) {
                    // `name = value : property-value` declares, then
                    // assigns under the same name.
                    self.cur.assign = Some(AssignOp::Assign);
                    self.expecting_name = true;
                } else {
                    self.append_seq(Value::Token(":".to_string()));
                }
            }
            Some(c @ ('}' | ')' | ']')) => self.close_frame(c)?,
            Some(';') => {
                self.cur = DeclState::default();
                self.expecting_name = true;
                self.browser_understood = false;
                self.selector.clear();
            }
            None => self.end_sheet()?,
            _ => {}
        }
        self.last_op = op;
        Ok(())
    }

    fn close_frame(&mut self, closer: char) -> Result<(), XcssError> {
        let expected = match closer {
            '}' => '{',
            ')' => '(',
            _ => '[',
        };
        let closable = matches!(self.stack.last(), Some(f) if f.opened == Some(expected));
        if !closable {
            let (line, sheet) = self.position();
            return Err(XcssError::MismatchedOperator {
                found: closer,
                line,
                sheet,
            });
        }
        let Some(frame) = self.stack.pop() else {
            return Ok(());
        };

        let interior = if frame.sheet + 1 == self.sheets.len() {
            self.sheets
                .last()
                .map(|s| {
                    let end = s.scanner.pos().saturating_sub(1).max(frame.start);
                    s.scanner.text()[frame.start..end].to_string()
                })
                .unwrap_or_default()
        } else {
            String::new()
        };

        match frame.kind {
            FrameKind::Rule(id) => {
                if self.last_op == Some('}') {
                    if let Some(parent) = self.arena.rule(id).parent {
                        if !self.arena.is_root_like(parent)
                            && !self.arena.rule(parent).is_at_rule()
                        {
                            let (line, sheet) = self.position();
                            return Err(XcssError::MissingSemicolonBeforeNestedRule {
                                line,
                                sheet,
                            });
                        }
                    }
                }
                let rule = self.arena.rule_mut(id);
                rule.css_text = interior.trim().to_string();
                rule.flags |= RuleFlags::CLOSED;
                self.browser_understood = true;
                self.selector.clear();
            }
            FrameKind::Call(id) => {
                self.arena.call_mut(id).css_text = interior;
                if let Some(seq) = self.cur.seq.take() {
                    self.arena.call_mut(id).push_arg(seq);
                }
            }
        }

        self.cur = frame.saved;
        self.expecting_name = frame.saved_expecting;

        // A call closed with no assignment pending is immediately
        // invoked rather than kept as a value.
        if let FrameKind::Call(id) = frame.kind {
            if closer == ')' && self.cur.assign.is_none() {
                self.dispatch_call(id);
            }
        }

        // A bodied declaration is complete at its closing brace; commit
        // it so the next token starts fresh. At a root-like level a close
        // with nothing pending also returns to property-name mode, so
        // the rule or directive after a closed block starts clean. A `:`
        // assignment instead keeps accumulating until its semicolon.
        if matches!(frame.kind, FrameKind::Rule(_)) {
            match self.cur.assign {
                Some(AssignOp::Declare) => {
                    if let (Some(name), Some(seq)) =
                        (self.cur.name.clone(), self.cur.seq.clone())
                    {
                        let conditional = self.cur.conditional;
                        // A sequence holding the just-closed rule is never
                        // extension-shaped, so this cannot suspend.
                        let _ = self.declare_property(&name, seq, conditional, Some('}'))?;
                    }
                    self.cur = DeclState::default();
                    self.expecting_name = true;
                }
                None if self.arena.is_root_like(self.current_rule()) => {
                    self.cur = DeclState::default();
                    self.expecting_name = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn dispatch_call(&mut self, id: CallId) {
        let Some(handler) = self.call_handler.as_mut() else {
            return;
        };
        let result = {
            let call = &self.arena.call(id);
            handler.call(&call.callee, &call.args)
        };
        if let Err(reason) = result {
            let callee = self.arena.call(id).callee.clone();
            self.report(Diagnostic::CallHandlerFailure { callee, reason });
            self.cur.seq = None;
        }
    }

    fn end_sheet(&mut self) -> Result<(), XcssError> {
        let Some(sheet) = self.sheets.pop() else {
            return Ok(());
        };
        // Scope wrappers left open at end of sheet close implicitly.
        while self.stack.len() > sheet.base_depth
            && matches!(self.stack.last(), Some(Frame { opened: None, .. }))
        {
            if let Some(frame) = self.stack.pop() {
                self.cur = frame.saved;
                self.expecting_name = frame.saved_expecting;
            }
        }
        if self.stack.len() > sheet.base_depth {
            let opened = self.stack.last().and_then(|f| f.opened).unwrap_or('{');
            return Err(XcssError::UnclosedBlock {
                opened,
                line: sheet.scanner.line(),
                sheet: sheet.name(),
            });
        }
        Ok(())
    }

    /// Commits `name: value`. A name whose definition is a structured
    /// value (a rule or call) intercepts the property into metadata
    /// only; plain definitions and undefined names emit stock CSS.
    fn set_value(&mut self, name: &str, seq: Value) {
        let scope = self.current_rule();
        let value = self.resolve_references(scope, seq);
        let rendered = value.render(&self.arena);
        if rendered.is_empty() {
            return;
        }
        // Hyphenated names fall back to their prefixes, so a definition
        // for `grid` also intercepts `grid-columns`.
        let mut lookup = name;
        let intercepted = loop {
            if let Some(def) = self.arena.resolve_definition(scope, lookup) {
                break def.value.is_structured();
            }
            match lookup.rfind('-') {
                Some(i) if i > 0 => lookup = &lookup[..i],
                _ => break false,
            }
        };
        let structured = value.is_structured();
        let rule = self.arena.rule_mut(scope);
        if intercepted {
            rule.xstyle_css.push(format!("{name}:{rendered};"));
        } else {
            rule.browser_css.push(format!("{name}:{rendered}"));
            if structured {
                rule.xstyle_css.push(format!("{name}:{rendered};"));
            }
        }
    }

    /// Commits `name = value`: an extension when the value is a list of
    /// resolvable names, otherwise a plain definition.
    fn declare_property(
        &mut self,
        name: &str,
        seq: Value,
        conditional: bool,
        op: Option<char>,
    ) -> Result<Option<PendingExtension>, XcssError> {
        let scope = self.current_rule();
        if let Some(names) = Self::extension_bases(&seq) {
            let sources = self.probe_bases(scope, names.clone());
            let any_known = sources
                .iter()
                .any(|(_, s)| !matches!(s, extend::BaseSource::Missing));
            if any_known {
                let derived = self.arena.new_rule(scope, name, String::new());
                self.arena.rule_mut(derived).flags |= RuleFlags::CREATING;
                let def = Definition {
                    value: Value::RuleRef(derived),
                    conditional,
                };
                let rule = self.arena.rule_mut(scope);
                rule.definitions.push((name.to_string(), def));
                rule.xstyle_css.push(format!("{name}={};", names.join(",")));
                return Ok(self.apply_bases(
                    derived,
                    sources,
                    false,
                    ResumePoint::Epilogue(op),
                ));
            }
        }
        let value = self.resolve_references(scope, seq);
        let rendered = value.render(&self.arena);
        let has_rule = value.contains_rule_ref();
        let rule = self.arena.rule_mut(scope);
        rule.definitions.push((
            name.to_string(),
            Definition {
                value,
                conditional,
            },
        ));
        // Declarations whose value is a parsed rule serialize through
        // that rule's own metadata block instead.
        if !has_rule {
            rule.xstyle_css.push(format!("{name}={rendered};"));
        }
        Ok(None)
    }

    /// Substitutes `@name` references against visible definitions.
    /// Unresolved references stay literal.
    fn resolve_references(&self, scope: RuleId, value: Value) -> Value {
        match value {
            Value::Reference(name) => match self.arena.resolve_definition(scope, &name) {
                Some(def) => def.value.clone(),
                None => {
                    log::warn!("undefined reference @{name}");
                    Value::Token(format!("@{name}"))
                }
            },
            Value::Token(text) if text.contains('@') => {
                Value::Token(self.substitute_text(scope, &text))
            }
            Value::Seq(items) => Value::Seq(
                items
                    .into_iter()
                    .map(|item| self.resolve_references(scope, item))
                    .collect(),
            ),
            other => other,
        }
    }

    fn substitute_text(&self, scope: RuleId, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut chars = text.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if c != '@' {
                out.push(c);
                continue;
            }
            let rest = &text[i + 1..];
            let end = rest
                .find(|ch: char| !(ch.is_alphanumeric() || ch == '_' || ch == '-'))
                .unwrap_or(rest.len());
            if end == 0 {
                out.push('@');
                continue;
            }
            let name = &rest[..end];
            match self.arena.resolve_definition(scope, name) {
                Some(def) => {
                    let value = def.value.clone();
                    out.push_str(&value.render(&self.arena));
                }
                None => {
                    log::warn!("undefined reference @{name}");
                    out.push('@');
                    out.push_str(name);
                }
            }
            for _ in 0..name.chars().count() {
                chars.next();
            }
        }
        out
    }

    fn value_token(&self, text: &str) -> Value {
        if self.cur.assign.is_some() {
            if let Some(rest) = text.strip_prefix('@') {
                if !rest.is_empty()
                    && rest
                        .chars()
                        .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
                {
                    return Value::Reference(rest.to_string());
                }
            }
        }
        Value::Token(text.to_string())
    }

    fn append_seq(&mut self, operand: Value) {
        match self.cur.seq.as_mut() {
            Some(seq) => seq.append(operand),
            None => {
                if !matches!(&operand, Value::Token(t) if t.is_empty()) {
                    self.cur.seq = Some(operand);
                }
            }
        }
    }

    /// The innermost rule frame; call frames commit against the rule
    /// they appear in.
    fn current_rule(&self) -> RuleId {
        for frame in self.stack.iter().rev() {
            if let FrameKind::Rule(id) = frame.kind {
                return id;
            }
        }
        self.arena.root()
    }

    fn position(&self) -> (usize, String) {
        match self.sheets.last() {
            Some(sheet) => (sheet.scanner.line(), sheet.name()),
            None => (0, INLINE_SHEET.to_string()),
        }
    }

    pub(crate) fn report(&mut self, diagnostic: Diagnostic) {
        log::warn!("{diagnostic}");
        self.diagnostics.push(diagnostic);
    }
}

/// Normalizes selector text: whitespace collapses to single spaces and
/// bare element words lowercase, while class, id and pseudo segments
/// keep their case.
fn normalize_selector(text: &str) -> String {
    let mut collapsed = String::with_capacity(text.len());
    let mut last_ws = false;
    for c in text.trim().chars() {
        if c.is_whitespace() {
            if !last_ws {
                collapsed.push(' ');
            }
            last_ws = true;
        } else {
            collapsed.push(c);
            last_ws = false;
        }
    }

    let mut out = String::with_capacity(collapsed.len());
    let mut chars = collapsed.chars().peekable();
    while let Some(c) = chars.next() {
        if matches!(c, '.' | '#' | ':') {
            out.push(c);
            while let Some(&next) = chars.peek() {
                if next.is_whitespace() {
                    break;
                }
                out.push(next);
                chars.next();
            }
        } else if c.is_alphanumeric() || c == '_' {
            out.extend(c.to_lowercase());
            while let Some(&next) = chars.peek() {
                if next.is_alphanumeric() || next == '_' {
                    out.extend(next.to_lowercase());
                    chars.next();
                } else {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}
