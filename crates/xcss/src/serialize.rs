//! Build-mode output: minified stock CSS plus the metadata block that
//! lets a later runtime parse recover every non-CSS construct.

use crate::error::Diagnostic;
use crate::host::ResourceInliner;
use crate::model::{Arena, RuleId, render_quoted};
use crate::parser::ParseContext;

/// The two outputs of a build-mode compilation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Compiled {
    /// Minified CSS a stock parser accepts.
    pub css: String,
    /// Scoped extended-syntax declarations, re-parseable on their own.
    pub metadata: String,
    /// Conditions recovered during the parse.
    pub diagnostics: Vec<Diagnostic>,
}

impl Compiled {
    pub fn from_context(ctx: &ParseContext<'_>) -> Self {
        Self::with_inliner(ctx, None)
    }

    pub fn with_inliner(ctx: &ParseContext<'_>, inliner: Option<&dyn ResourceInliner>) -> Self {
        Compiled {
            css: css_text(ctx.arena(), inliner),
            metadata: metadata_text(ctx.arena()),
            diagnostics: ctx.diagnostics().to_vec(),
        }
    }

    /// The stock CSS with the metadata appended as the content of a
    /// sentinel `x-xstyle` rule, the single-file deployment format.
    pub fn css_with_metadata(&self) -> String {
        if self.metadata.is_empty() {
            return self.css.clone();
        }
        format!(
            "{}x-xstyle{{content:{};}}",
            self.css,
            render_quoted(&self.metadata)
        )
    }
}

/// Serializes every browser-understandable declaration, flattening
/// nested rules into their combined selectors.
pub fn css_text(arena: &Arena, inliner: Option<&dyn ResourceInliner>) -> String {
    let mut out = String::new();
    emit_css(arena, arena.root(), inliner, &mut out);
    out
}

fn emit_css(arena: &Arena, id: RuleId, inliner: Option<&dyn ResourceInliner>, out: &mut String) {
    let rule = arena.rule(id);
    // Creating rules describe definitions, not document styling.
    if rule.is_creating() {
        return;
    }
    if rule.is_at_rule() {
        let mut inner = String::new();
        push_declarations(&rule.browser_css, inliner, &mut inner);
        for (_, child) in &rule.children {
            emit_css(arena, *child, inliner, &mut inner);
        }
        if !inner.is_empty() {
            out.push_str(&rule.selector);
            out.push('{');
            out.push_str(&inner);
            out.push('}');
        }
        return;
    }
    if !rule.browser_css.is_empty() && !rule.full_selector.is_empty() {
        out.push_str(&rule.full_selector);
        out.push('{');
        push_declarations(&rule.browser_css, inliner, out);
        out.push('}');
    }
    for (_, child) in &rule.children {
        emit_css(arena, *child, inliner, out);
    }
}

fn push_declarations(decls: &[String], inliner: Option<&dyn ResourceInliner>, out: &mut String) {
    for decl in decls {
        match inliner {
            Some(inliner) => out.push_str(&correct_urls(decl, inliner)),
            None => out.push_str(decl),
        }
        out.push(';');
    }
}

/// Rewrites each `url(...)` occurrence through the inliner, leaving the
/// reference as-is when the inliner declines.
fn correct_urls(decl: &str, inliner: &dyn ResourceInliner) -> String {
    let mut out = String::with_capacity(decl.len());
    let mut rest = decl;
    while let Some(at) = rest.find("url(") {
        let (before, from) = rest.split_at(at);
        out.push_str(before);
        let Some(close) = from.find(')') else {
            out.push_str(from);
            return out;
        };
        let inside = from["url(".len()..close].trim().trim_matches(['"', '\'']);
        let suffix = inside.rsplit('.').next().unwrap_or("");
        match inliner.inline(inside, suffix) {
            Some(payload) => {
                out.push_str("url(");
                out.push_str(&payload);
                out.push(')');
            }
            None => out.push_str(&from[..=close]),
        }
        rest = &from[close + 1..];
    }
    out.push_str(rest);
    out
}

/// Serializes the extended-syntax declarations, scoped so a runtime
/// re-parse associates each with the same rule.
pub fn metadata_text(arena: &Arena) -> String {
    let mut out = String::new();
    emit_metadata(arena, arena.root(), None, &mut out);
    out
}

fn emit_metadata(arena: &Arena, id: RuleId, name: Option<&str>, out: &mut String) {
    let rule = arena.rule(id);

    // A bodied creating rule re-parses from its raw interior; the
    // `;`-form leaves its fragment on the declaring scope instead.
    if rule.is_creating() {
        let interior = rule.css_text.trim();
        if interior.is_empty() {
            return;
        }
        let label = name.unwrap_or(&rule.selector);
        out.push_str(label);
        out.push('=');
        out.push_str(&rule.bases.join(","));
        out.push('{');
        out.push_str(interior);
        out.push_str("};");
        return;
    }

    let is_scope = rule.flags.contains(crate::model::RuleFlags::SCOPE);
    let mut body: String = rule.xstyle_css.concat();
    let pass_through = rule.is_root() || is_scope;
    for (child_name, child) in &rule.children {
        let sink: &mut String = if pass_through { &mut *out } else { &mut body };
        emit_metadata(arena, *child, Some(child_name), sink);
    }
    // Declarations local to a scope wrapper end with the scope; emitting
    // them would re-declare them at the root on a runtime re-parse.
    if is_scope {
        return;
    }
    if body.is_empty() {
        return;
    }
    if pass_through {
        out.push_str(&body);
        return;
    }
    let label = if rule.selector.is_empty() {
        name.unwrap_or("")
    } else {
        &rule.selector
    };
    out.push_str(label);
    out.push('{');
    out.push_str(&body);
    out.push('}');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ParseContext, ParseOutcome};

    fn parse(source: &str) -> ParseContext<'static> {
        match ParseContext::new().parse(source, None) {
            Ok(ParseOutcome::Done(ctx)) => ctx,
            Ok(ParseOutcome::Suspended(_)) => panic!("unexpected suspension"),
            Err(e) => panic!("parse failed: {e}"),
        }
    }

    #[test]
    fn flattens_nested_selectors() {
        let ctx = parse(".box { color = red; .inner { color: @color; } }");
        let compiled = Compiled::from_context(&ctx);
        assert_eq!(compiled.css, ".box .inner{color:red;}");
        assert_eq!(compiled.metadata, ".box{color=red;}");
    }

    #[test]
    fn at_rule_wraps_its_children() {
        let ctx = parse("@media screen { .a { color: red; } }");
        let compiled = Compiled::from_context(&ctx);
        assert_eq!(compiled.css, "@media screen{.a{color:red;}}");
    }

    #[test]
    fn creating_rules_stay_out_of_css() {
        let ctx = parse("button = { background: blue; } .a { color: red; }");
        let compiled = Compiled::from_context(&ctx);
        assert_eq!(compiled.css, ".a{color:red;}");
        assert!(compiled.metadata.contains("button={"));
    }

    #[test]
    fn metadata_rides_in_a_sentinel_rule() {
        let ctx = parse(".box { color = red; }");
        let compiled = Compiled::from_context(&ctx);
        assert_eq!(
            compiled.css_with_metadata(),
            "x-xstyle{content:\".box{color=red;}\";}"
        );
    }

    #[test]
    fn scope_local_declarations_stay_out_of_metadata() {
        let ctx = parse(
            "@xstyle start; pad = 4px; .a { accent = red; margin: @pad; } @xstyle end;",
        );
        let compiled = Compiled::from_context(&ctx);
        // The scoped definition resolved while the scope was open...
        assert_eq!(compiled.css, ".a{margin:4px;}");
        // ...but does not re-declare at the root on a re-parse.
        assert!(!compiled.metadata.contains("pad=4px"));
        assert!(compiled.metadata.contains(".a{accent=red;}"));
    }

    struct FakeInliner;

    impl crate::host::ResourceInliner for FakeInliner {
        fn inline(&self, path: &str, suffix: &str) -> Option<String> {
            (suffix == "png").then(|| format!("data:image/png;base64,{path}"))
        }
    }

    #[test]
    fn inliner_rewrites_matching_urls() {
        let ctx = parse(".a { background: url(a.png); border-image: url(b.svg); }");
        let compiled = Compiled::with_inliner(&ctx, Some(&FakeInliner));
        assert!(compiled.css.contains("url(data:image/png;base64,a.png)"));
        assert!(compiled.css.contains("url(b.svg)"));
    }
}
