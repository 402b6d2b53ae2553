//! Data model for the extended-CSS rule tree.
//!
//! Rules and calls live in an [`Arena`] owned by the parse context; links
//! between them are plain indices ([`RuleId`], [`CallId`]) so a rule's
//! `parent` is a back-pointer with no ownership. Definition lookup walks
//! parent links explicitly, consulting extension fallbacks along the way.

use bitflags::bitflags;

/// Index of a [`Rule`] in its [`Arena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RuleId(pub(crate) usize);

/// Index of a [`Call`] in its [`Arena`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CallId(pub(crate) usize);

bitflags! {
    /// State flags for a rule.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct RuleFlags: u8 {
        /// The synthetic stylesheet root. Exactly one per arena.
        const ROOT = 1;
        /// Synthesized as an extension target or property rule, not a
        /// literal selector. Emits no CSS of its own.
        const CREATING = 1 << 1;
        /// The matching `}` has been consumed; fragments are frozen.
        const CLOSED = 1 << 2;
        /// Anonymous wrapper pushed by `@xstyle start`. Behaves like its
        /// creator for root-sensitive decisions but owns a lexical scope.
        const SCOPE = 1 << 3;
    }
}

/// A parsed value: the right-hand side of a declaration, or a call
/// argument.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Bare token text, internal whitespace preserved.
    Token(String),
    /// A quoted string literal, stored unescaped. Re-escaped on output.
    Quoted(String),
    /// Adjacent lexemes accumulated for a single property.
    Seq(Vec<Value>),
    /// A rule created inline while this value was being accumulated.
    RuleRef(RuleId),
    /// A function-call expression.
    CallRef(CallId),
    /// A `@name` reference to a declared definition, kept unresolved.
    Reference(String),
}

impl Value {
    /// Appends `operand` to this value, merging adjacent token text and
    /// promoting to a sequence when shapes differ.
    pub fn append(&mut self, operand: Value) {
        if let Value::Token(t) = &operand {
            if t.is_empty() {
                return;
            }
        }
        match self {
            Value::Seq(items) => match (items.last_mut(), &operand) {
                (Some(Value::Token(last)), Value::Token(next)) => last.push_str(next),
                _ => items.push(operand),
            },
            Value::Token(text) => {
                if let Value::Token(next) = &operand {
                    text.push_str(next);
                } else {
                    let first = Value::Token(std::mem::take(text));
                    *self = Value::Seq(vec![first, operand]);
                }
            }
            _ => {
                let first = self.clone();
                *self = Value::Seq(vec![first, operand]);
            }
        }
    }

    /// True when the value carries anything beyond plain text: rule or
    /// call references, or unresolved definition references.
    pub fn is_structured(&self) -> bool {
        match self {
            Value::Token(_) | Value::Quoted(_) => false,
            Value::RuleRef(_) | Value::CallRef(_) | Value::Reference(_) => true,
            Value::Seq(items) => items.iter().any(Value::is_structured),
        }
    }

    /// True when any part of the value is a [`Value::RuleRef`].
    pub fn contains_rule_ref(&self) -> bool {
        match self {
            Value::RuleRef(_) => true,
            Value::Seq(items) => items.iter().any(Value::contains_rule_ref),
            _ => false,
        }
    }

    /// The leading bare text of the value, used for directive detection.
    pub fn first_text(&self) -> Option<&str> {
        match self {
            Value::Token(t) => Some(t),
            Value::Seq(items) => items.first().and_then(Value::first_text),
            _ => None,
        }
    }

    /// Renders the value back to stylesheet text. Quoted strings are
    /// re-escaped; calls render as `(args)` because the callee text is
    /// already part of the surrounding token stream.
    pub fn render(&self, arena: &Arena) -> String {
        match self {
            Value::Token(t) => t.clone(),
            Value::Quoted(t) => render_quoted(t),
            Value::Reference(name) => format!("@{name}"),
            Value::RuleRef(id) => arena.rule(*id).selector.clone(),
            Value::CallRef(id) => {
                let call = arena.call(*id);
                let args: Vec<String> = call.args.iter().map(|a| a.render(arena)).collect();
                let (open, close) = match call.operator {
                    '[' => ('[', ']'),
                    _ => ('(', ')'),
                };
                format!("{open}{}{close}", args.join(","))
            }
            Value::Seq(items) => items.iter().map(|v| v.render(arena)).collect(),
        }
    }
}

/// Escapes a string literal back to its quoted source form.
pub fn render_quoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        if matches!(c, '"' | '\\' | '\n' | '\r') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// A named, inheritable definition registered by a `=` declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct Definition {
    pub value: Value,
    /// Trailing `?` on the operator. Parsed and stored; reserved for
    /// feature-detection gating and otherwise unused.
    pub conditional: bool,
}

/// One CSS-like block: a selector rule, or the synthetic root.
#[derive(Clone, Debug)]
pub struct Rule {
    /// Normalized selector text: tag names lower-cased, whitespace
    /// collapsed. Empty for anonymous scope wrappers and creating rules.
    pub selector: String,
    /// Selector including the ancestor chain, fixed at creation.
    pub full_selector: String,
    pub parent: Option<RuleId>,
    /// Child rules in declaration order, keyed by normalized name. Name
    /// lookup resolves to the most recent entry.
    pub children: Vec<(String, RuleId)>,
    /// Declared definitions in declaration order.
    pub definitions: Vec<(String, Definition)>,
    /// Extension fallbacks, consulted after the local map. Later bases
    /// take precedence.
    pub fallbacks: Vec<RuleId>,
    /// Names of extension bases, for diagnostics and re-serialization.
    pub bases: Vec<String>,
    /// Standard-CSS declaration fragments (`name:value`), emission order.
    pub browser_css: Vec<String>,
    /// Extended declaration fragments for the metadata stream.
    pub xstyle_css: Vec<String>,
    /// Raw interior text recorded when the block closed.
    pub css_text: String,
    pub flags: RuleFlags,
    /// Index into the host's native rule list, runtime mode only.
    pub rule_ref: Option<usize>,
}

impl Rule {
    fn new(selector: String, full_selector: String, parent: Option<RuleId>) -> Self {
        Self {
            selector,
            full_selector,
            parent,
            children: Vec::new(),
            definitions: Vec::new(),
            fallbacks: Vec::new(),
            bases: Vec::new(),
            browser_css: Vec::new(),
            xstyle_css: Vec::new(),
            css_text: String::new(),
            flags: RuleFlags::empty(),
            rule_ref: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.flags.contains(RuleFlags::ROOT)
    }

    pub fn is_creating(&self) -> bool {
        self.flags.contains(RuleFlags::CREATING)
    }

    pub fn is_at_rule(&self) -> bool {
        self.selector.starts_with('@')
    }
}

/// A function-call expression: `name(arg, arg)` or an opaque `[...]`
/// group, which shares the argument-collection behavior.
#[derive(Clone, Debug)]
pub struct Call {
    pub callee: String,
    pub args: Vec<Value>,
    /// The definition the callee resolved to at parse time, if any.
    pub definition: Option<Definition>,
    /// `(` or `[`.
    pub operator: char,
    /// The rule whose definition chain scopes this call.
    pub scope: RuleId,
    pub css_text: String,
}

impl Call {
    /// Adds a parsed argument. Top-level token text is split on commas,
    /// matching how a flat scan delivers `f(a, b)` as one lexeme.
    pub fn push_arg(&mut self, value: Value) {
        match value {
            Value::Token(text) => {
                for part in text.split(',') {
                    let part = part.trim();
                    if !part.is_empty() {
                        self.args.push(Value::Token(part.to_string()));
                    }
                }
            }
            other => self.args.push(other),
        }
    }
}

/// Owns every rule and call produced by one parse.
#[derive(Clone, Debug)]
pub struct Arena {
    rules: Vec<Rule>,
    calls: Vec<Call>,
    root: RuleId,
}

impl Arena {
    /// Creates an arena holding only the synthetic root rule.
    pub fn new() -> Self {
        let mut root = Rule::new(String::new(), String::new(), None);
        root.flags = RuleFlags::ROOT;
        Self {
            rules: vec![root],
            calls: Vec::new(),
            root: RuleId(0),
        }
    }

    pub fn root(&self) -> RuleId {
        self.root
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.0]
    }

    pub fn rule_mut(&mut self, id: RuleId) -> &mut Rule {
        &mut self.rules[id.0]
    }

    pub fn call(&self, id: CallId) -> &Call {
        &self.calls[id.0]
    }

    pub fn call_mut(&mut self, id: CallId) -> &mut Call {
        &mut self.calls[id.0]
    }

    /// Creates a child rule under `parent`, registered by name in
    /// declaration order.
    pub fn new_rule(&mut self, parent: RuleId, name: &str, selector: String) -> RuleId {
        // At-rule blocks scope their children but do not combine into
        // descendant selectors.
        let parent_full = if self.rules[parent.0].is_at_rule() {
            ""
        } else {
            self.rules[parent.0].full_selector.as_str()
        };
        let full = if selector.is_empty() || parent_full.is_empty() {
            selector.clone()
        } else {
            format!("{parent_full} {selector}")
        };
        let id = RuleId(self.rules.len());
        self.rules.push(Rule::new(selector, full, Some(parent)));
        self.rules[parent.0].children.push((name.to_string(), id));
        id
    }

    pub fn new_call(&mut self, callee: String, operator: char, scope: RuleId) -> CallId {
        let id = CallId(self.calls.len());
        self.calls.push(Call {
            callee,
            args: Vec::new(),
            definition: None,
            operator,
            scope,
            css_text: String::new(),
        });
        id
    }

    /// Looks up a definition by walking `from` and its ancestors. At each
    /// rule the local map is consulted first (latest declaration wins),
    /// then extension fallbacks, later bases first.
    pub fn resolve_definition(&self, from: RuleId, name: &str) -> Option<&Definition> {
        let mut current = Some(from);
        while let Some(id) = current {
            if let Some(def) = self.local_definition(id, name) {
                return Some(def);
            }
            current = self.rules[id.0].parent;
        }
        None
    }

    fn local_definition(&self, id: RuleId, name: &str) -> Option<&Definition> {
        let rule = &self.rules[id.0];
        if let Some((_, def)) = rule.definitions.iter().rev().find(|(n, _)| n == name) {
            return Some(def);
        }
        rule.fallbacks
            .iter()
            .rev()
            .find_map(|fb| self.local_definition(*fb, name))
    }

    /// Finds a previously declared rule by name, searching the children
    /// of `from` and each ancestor, latest declaration first.
    pub fn find_rule(&self, from: RuleId, name: &str) -> Option<RuleId> {
        let mut current = Some(from);
        while let Some(id) = current {
            let rule = &self.rules[id.0];
            if let Some((_, child)) = rule.children.iter().rev().find(|(n, _)| n == name) {
                return Some(*child);
            }
            // Definitions can hold rules too (`c = a;` stores a rule ref).
            if let Some(def) = self.local_definition(id, name) {
                if let Value::RuleRef(rule_id) = def.value {
                    return Some(rule_id);
                }
            }
            current = rule.parent;
        }
        None
    }

    /// True for the root and for `@xstyle` scope wrappers created at the
    /// root, which inherit root behavior.
    pub fn is_root_like(&self, id: RuleId) -> bool {
        let rule = &self.rules[id.0];
        if rule.is_root() {
            return true;
        }
        if rule.flags.contains(RuleFlags::SCOPE) {
            if let Some(parent) = rule.parent {
                return self.is_root_like(parent);
            }
        }
        false
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}
