//! Scanner for the extended-CSS syntax.
//!
//! A single stateful cursor steps through the source, extracting on each
//! step: leading whitespace, a bare token, an optional assignment
//! operator with its trailing value text, and a single structural
//! operator. Quoted strings and escapes are handled by dedicated
//! sub-scans ([`strings`]) that fast-forward the main cursor past the
//! match. The cursor only ever moves forward.

pub mod strings;

use strings::{attr_group, build_ref, conditional_marker, quoted_body, unescape};

/// Structural operators recognized by the scanner.
fn is_structural(c: char) -> bool {
    matches!(
        c,
        '{' | '}' | '(' | ')' | '[' | ']' | ':' | '=' | ';' | '\'' | '"' | '\\'
    )
}

/// Stops for assignment value text: the structural set minus `=`.
fn is_value_stop(c: char) -> bool {
    is_structural(c) && c != '='
}

/// The two assignment operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
    /// `=`: registers a named, inheritable definition.
    Declare,
    /// `:`: assigns a property value.
    Assign,
}

impl AssignOp {
    pub fn as_char(self) -> char {
        match self {
            AssignOp::Declare => '=',
            AssignOp::Assign => ':',
        }
    }
}

/// An assignment operator with its trailing value text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Assignment {
    pub op: AssignOp,
    /// Trailing `?` on the operator.
    pub conditional: bool,
    /// Value text up to the next structural operator, trimmed.
    pub value: String,
}

/// One scanner step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanStep {
    /// The exact source span consumed, including leading whitespace and
    /// the structural operator. Used for selector accumulation.
    pub raw: String,
    /// The bare token, trimmed. Complete `[attr=value]` groups are folded
    /// into the token rather than treated as structural.
    pub token: String,
    pub assignment: Option<Assignment>,
    /// The structural operator ending the step; `None` at end of input.
    pub op: Option<char>,
    /// Numeric `/<n>` rule reference immediately following `{`.
    pub build_ref: Option<usize>,
}

/// Stateful cursor over one stylesheet source.
pub struct Scanner {
    text: String,
    pos: usize,
}

impl Scanner {
    /// Creates a scanner over `source` with comments blanked out:
    /// comment bytes are replaced by spaces, newlines preserved, so
    /// offsets and line numbers still refer to the original text.
    pub fn new(source: &str) -> Self {
        Self {
            text: blank_comments(source),
            pos: 0,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    /// 1-based line number at the current cursor.
    pub fn line(&self) -> usize {
        self.text[..self.pos].matches('\n').count() + 1
    }

    fn remaining(&self) -> &str {
        &self.text[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Scans the next step. `None` once the input is exhausted.
    pub fn next_step(&mut self) -> Option<ScanStep> {
        if self.pos >= self.text.len() {
            return None;
        }
        let start = self.pos;

        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }

        // Bare token: everything up to a structural operator. A complete
        // attribute group does not count as structural.
        let token_start = self.pos;
        while let Some(c) = self.peek() {
            if is_structural(c) {
                if c == '[' {
                    if let Ok((_, group)) = attr_group(self.remaining()) {
                        self.pos += group.len();
                        continue;
                    }
                }
                break;
            }
            self.advance();
        }
        let token = self.text[token_start..self.pos].trim().to_string();

        let assignment = match self.peek() {
            Some(c @ ('=' | ':')) => {
                self.advance();
                let op = if c == '=' {
                    AssignOp::Declare
                } else {
                    AssignOp::Assign
                };
                let conditional = match conditional_marker(self.remaining()) {
                    Ok((_, marker)) => marker,
                    Err(_) => false,
                };
                if conditional {
                    self.advance();
                }
                let value_start = self.pos;
                while matches!(self.peek(), Some(c) if !is_value_stop(c)) {
                    self.advance();
                }
                let value = self.text[value_start..self.pos].trim().to_string();
                Some(Assignment {
                    op,
                    conditional,
                    value,
                })
            }
            _ => None,
        };

        let op = self.advance();

        let build_ref = if op == Some('{') {
            match build_ref(self.remaining()) {
                Ok((rest, n)) => {
                    self.pos += self.remaining().len() - rest.len();
                    Some(n)
                }
                Err(_) => None,
            }
        } else {
            None
        };

        Some(ScanStep {
            raw: self.text[start..self.pos].to_string(),
            token,
            assignment,
            op,
            build_ref,
        })
    }

    /// Runs the quote sub-scan from the current cursor, which sits just
    /// past the opening quote. Returns the unescaped string contents and
    /// the raw span (contents plus closing quote); the cursor is
    /// fast-forwarded past the match. `Err` means no closing quote
    /// before end of input.
    pub fn scan_quoted(&mut self, quote: char) -> Result<(String, String), ()> {
        let input = self.remaining();
        match quoted_body(quote)(input) {
            Ok((rest, body)) => {
                let consumed = input.len() - rest.len();
                let raw = input[..consumed].to_string();
                let value = unescape(body);
                self.pos += consumed;
                Ok((value, raw))
            }
            Err(_) => Err(()),
        }
    }

    /// Consumes and returns the character following a `\` escape.
    pub fn scan_escaped_char(&mut self) -> Option<char> {
        self.advance()
    }
}

/// Replaces `/* ... */` comment contents with blank characters,
/// preserving newlines so line-based error reporting stays accurate.
fn blank_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        if c == '/' && matches!(chars.peek(), Some((_, '*'))) {
            chars.next();
            out.push_str("  ");
            let mut prev_star = false;
            for (_, inner) in chars.by_ref() {
                if inner == '\n' {
                    out.push('\n');
                    prev_star = false;
                } else {
                    out.push(' ');
                    if prev_star && inner == '/' {
                        break;
                    }
                    prev_star = inner == '*';
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps(source: &str) -> Vec<ScanStep> {
        let mut scanner = Scanner::new(source);
        let mut out = Vec::new();
        while let Some(step) = scanner.next_step() {
            out.push(step);
        }
        out
    }

    #[test]
    fn scan_simple_rule() {
        let all = steps("a { color: red; }");
        assert_eq!(all[0].token, "a");
        assert_eq!(all[0].op, Some('{'));
        assert_eq!(all[1].token, "color");
        let assign = all[1].assignment.as_ref().unwrap();
        assert_eq!(assign.op, AssignOp::Assign);
        assert_eq!(assign.value, "red");
        assert_eq!(all[1].op, Some(';'));
        assert_eq!(all[2].op, Some('}'));
    }

    #[test]
    fn scan_declaration_operator() {
        let all = steps("gap = 4px;");
        let assign = all[0].assignment.as_ref().unwrap();
        assert_eq!(assign.op, AssignOp::Declare);
        assert!(!assign.conditional);
        assert_eq!(assign.value, "4px");
    }

    #[test]
    fn scan_conditional_declaration() {
        let all = steps("gap =? 4px;");
        let assign = all[0].assignment.as_ref().unwrap();
        assert!(assign.conditional);
        assert_eq!(assign.value, "4px");
    }

    #[test]
    fn scan_attribute_group_folds_into_token() {
        let all = steps("input[type=text] { }");
        assert_eq!(all[0].token, "input[type=text]");
        assert_eq!(all[0].op, Some('{'));
    }

    #[test]
    fn scan_build_ref_after_brace() {
        let all = steps("a {/3 }");
        assert_eq!(all[0].op, Some('{'));
        assert_eq!(all[0].build_ref, Some(3));
        assert_eq!(all[1].op, Some('}'));
    }

    #[test]
    fn scan_quote_subscan() {
        let mut scanner = Scanner::new("content: \"a\\\"b\";");
        let step = scanner.next_step().unwrap();
        assert_eq!(step.op, Some('"'));
        let (value, raw) = scanner.scan_quoted('"').unwrap();
        assert_eq!(value, "a\"b");
        assert_eq!(raw, "a\\\"b\"");
        let next = scanner.next_step().unwrap();
        assert_eq!(next.op, Some(';'));
    }

    #[test]
    fn scan_unterminated_quote() {
        let mut scanner = Scanner::new("content: \"open");
        scanner.next_step();
        assert!(scanner.scan_quoted('"').is_err());
    }

    #[test]
    fn comments_blanked_with_lines_preserved() {
        let mut scanner = Scanner::new("/* one\ntwo */ a { }");
        let step = scanner.next_step().unwrap();
        assert_eq!(step.token, "a");
        assert_eq!(scanner.line(), 2);
    }

    #[test]
    fn cursor_is_monotonic() {
        let mut scanner = Scanner::new("a { b: c; }");
        let mut last = 0;
        while scanner.next_step().is_some() {
            assert!(scanner.pos() >= last);
            last = scanner.pos();
        }
    }
}
