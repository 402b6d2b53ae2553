use xcss::{Diagnostic, ParseContext, ParseOutcome};

fn parse(source: &str) -> ParseContext<'static> {
    match ParseContext::new().parse(source, None) {
        Ok(ParseOutcome::Done(ctx)) => ctx,
        Ok(ParseOutcome::Suspended(_)) => panic!("unexpected suspension"),
        Err(e) => panic!("parse failed: {e}"),
    }
}

fn definition_text(ctx: &ParseContext<'_>, rule: xcss::RuleId, name: &str) -> Option<String> {
    ctx.arena()
        .resolve_definition(rule, name)
        .map(|def| def.value.render(ctx.arena()))
}

#[test]
fn test_extension_unions_definitions() {
    let ctx = parse(
        r#"
        a { x = 1; }
        b { y = 2; }
        c = a, b;
        "#,
    );
    let c = ctx.find_rule("c").expect("derived");
    assert_eq!(definition_text(&ctx, c, "x").as_deref(), Some("1"));
    assert_eq!(definition_text(&ctx, c, "y").as_deref(), Some("2"));
    assert_eq!(ctx.arena().rule(c).bases, vec!["a", "b"]);
}

#[test]
fn test_last_base_wins_on_conflict() {
    let ctx = parse(
        r#"
        a { x = 1; }
        b { x = 2; }
        c = a, b;
        "#,
    );
    let c = ctx.find_rule("c").expect("derived");
    assert_eq!(definition_text(&ctx, c, "x").as_deref(), Some("2"));
}

#[test]
fn test_own_declaration_beats_inherited() {
    let ctx = parse(
        r#"
        a { x = 1; }
        c = a { x = 3; }
        "#,
    );
    let c = ctx.find_rule("c").expect("derived");
    assert_eq!(definition_text(&ctx, c, "x").as_deref(), Some("3"));
}

#[test]
fn test_bodied_extension_snapshot_is_isolated() {
    // Declarations added to `c` must not leak back into `a`.
    let ctx = parse(
        r#"
        a { x = 1; }
        c = a { y = 2; }
        "#,
    );
    let a = ctx.find_rule("a").expect("base");
    assert!(ctx.arena().resolve_definition(a, "y").is_none());
    assert_eq!(definition_text(&ctx, a, "x").as_deref(), Some("1"));
}

#[test]
fn test_transitive_extension() {
    let ctx = parse(
        r#"
        a { x = 1; }
        b = a;
        c = b;
        "#,
    );
    let c = ctx.find_rule("c").expect("derived");
    assert_eq!(definition_text(&ctx, c, "x").as_deref(), Some("1"));
}

#[test]
fn test_missing_base_of_bodied_extension_is_a_diagnostic() {
    let ctx = parse("c = missing { x = 1; }");
    assert_eq!(
        ctx.diagnostics(),
        &[Diagnostic::UnresolvedExtensionBase("missing".to_string())]
    );
    // The derived rule still exists with its own declarations.
    let c = ctx.find_rule("c").expect("derived");
    assert_eq!(definition_text(&ctx, c, "x").as_deref(), Some("1"));
}

#[test]
fn test_lone_unresolvable_name_is_a_plain_definition() {
    // Indistinguishable from `color = red;`, so no extension is
    // attempted and no diagnostic is raised.
    let ctx = parse("c = missing;");
    assert!(ctx.diagnostics().is_empty());
    let root = ctx.root();
    assert_eq!(definition_text(&ctx, root, "c").as_deref(), Some("missing"));
    assert!(ctx.find_rule("c").is_none());
}

#[test]
fn test_partially_missing_bases_keep_the_resolved_ones() {
    let ctx = parse(
        r#"
        a { x = 1; }
        c = a, missing;
        "#,
    );
    let c = ctx.find_rule("c").expect("derived");
    assert_eq!(definition_text(&ctx, c, "x").as_deref(), Some("1"));
    assert_eq!(ctx.arena().rule(c).bases, vec!["a"]);
    assert_eq!(ctx.diagnostics().len(), 1);
}

#[test]
fn test_definitions_scope_to_the_declaring_subtree() {
    let ctx = parse(
        r#"
        .outer {
            pad = 4px;
            .inner { margin: @pad; }
        }
        .other { margin: @pad; }
        "#,
    );
    let outer = ctx.find_rule(".outer").expect("outer");
    let inner = ctx.arena().find_rule(outer, ".inner").expect("inner");
    assert_eq!(ctx.arena().rule(inner).browser_css, vec!["margin:4px"]);
    // Out of scope: the reference stays literal.
    let other = ctx.find_rule(".other").expect("other");
    assert_eq!(ctx.arena().rule(other).browser_css, vec!["margin:@pad"]);
}

#[test]
fn test_later_declaration_shadows_earlier() {
    let ctx = parse(".a { x = 1; x = 2; color: @x; }");
    let a = ctx.find_rule(".a").expect("rule");
    assert_eq!(ctx.arena().rule(a).browser_css, vec!["color:2"]);
}

#[test]
fn test_structured_definition_intercepts_assignment() {
    // `widget` is defined as a rule, so assignments to it become
    // metadata instead of stock CSS.
    let ctx = parse(
        r#"
        widget = { x = 1; }
        .a { widget: on; }
        "#,
    );
    let a = ctx.find_rule(".a").expect("rule");
    let rule = ctx.arena().rule(a);
    assert!(rule.browser_css.is_empty());
    assert_eq!(rule.xstyle_css, vec!["widget:on;"]);
}

#[test]
fn test_hyphenated_name_falls_back_to_prefix_definition() {
    let ctx = parse(
        r#"
        grid = { x = 1; }
        .a { grid-columns: 3; }
        "#,
    );
    let a = ctx.find_rule(".a").expect("rule");
    let rule = ctx.arena().rule(a);
    assert!(rule.browser_css.is_empty());
    assert_eq!(rule.xstyle_css, vec!["grid-columns:3;"]);
}
