use std::collections::HashMap;

use xcss::{DefinitionProvider, Diagnostic, ParseContext, ParseOutcome, Resolution, Value};

/// Provider that answers `Pending` for the listed names and resolves
/// everything else from a map.
struct SlowProvider {
    pending: Vec<String>,
    known: HashMap<String, Value>,
    asked: Vec<String>,
}

impl SlowProvider {
    fn new(pending: &[&str], known: &[(&str, &str)]) -> Self {
        SlowProvider {
            pending: pending.iter().map(|s| s.to_string()).collect(),
            known: known
                .iter()
                .map(|(k, v)| (k.to_string(), Value::Token(v.to_string())))
                .collect(),
            asked: Vec::new(),
        }
    }
}

impl DefinitionProvider for SlowProvider {
    fn resolve(&mut self, name: &str) -> Resolution {
        self.asked.push(name.to_string());
        if self.pending.iter().any(|p| p == name) {
            Resolution::Pending
        } else if let Some(value) = self.known.get(name) {
            Resolution::Definition(value.clone())
        } else {
            Resolution::Unknown
        }
    }
}

#[test]
fn test_pending_base_suspends_and_resumes() {
    let mut provider = SlowProvider::new(&["theme"], &[]);
    let outcome = ParseContext::new()
        .with_definition_provider(&mut provider)
        .parse("c = theme; .a { color: red; }", None)
        .expect("no fatal error");

    let continuation = match outcome {
        ParseOutcome::Suspended(c) => c,
        ParseOutcome::Done(_) => panic!("expected suspension"),
    };
    assert_eq!(continuation.pending_base(), "theme");

    let ctx = match continuation
        .resume(Some(Value::Token("dark".to_string())))
        .expect("no fatal error")
    {
        ParseOutcome::Done(ctx) => ctx,
        ParseOutcome::Suspended(_) => panic!("resumed parse suspended again"),
    };
    // The sheet after the suspension point was scanned on resume.
    assert!(ctx.find_rule(".a").is_some());
    let c = ctx.find_rule("c").expect("derived rule");
    let def = ctx
        .arena()
        .resolve_definition(c, "theme")
        .expect("provided definition installed");
    assert_eq!(def.value.render(ctx.arena()), "dark");
}

#[test]
fn test_resume_with_none_downgrades_to_diagnostic() {
    let mut provider = SlowProvider::new(&["theme"], &[]);
    let outcome = ParseContext::new()
        .with_definition_provider(&mut provider)
        .parse("c = theme;", None)
        .expect("no fatal error");
    let continuation = match outcome {
        ParseOutcome::Suspended(c) => c,
        ParseOutcome::Done(_) => panic!("expected suspension"),
    };
    let ctx = match continuation.resume(None).expect("no fatal error") {
        ParseOutcome::Done(ctx) => ctx,
        ParseOutcome::Suspended(_) => panic!("suspended again"),
    };
    assert_eq!(
        ctx.diagnostics(),
        &[Diagnostic::UnresolvedExtensionBase("theme".to_string())]
    );
}

#[test]
fn test_two_pending_bases_suspend_twice() {
    let mut provider = SlowProvider::new(&["one", "two"], &[]);
    let outcome = ParseContext::new()
        .with_definition_provider(&mut provider)
        .parse("c = one, two;", None)
        .expect("no fatal error");

    let first = match outcome {
        ParseOutcome::Suspended(c) => c,
        ParseOutcome::Done(_) => panic!("expected suspension"),
    };
    assert_eq!(first.pending_base(), "one");

    let second = match first
        .resume(Some(Value::Token("1".to_string())))
        .expect("no fatal error")
    {
        ParseOutcome::Suspended(c) => c,
        ParseOutcome::Done(_) => panic!("expected second suspension"),
    };
    assert_eq!(second.pending_base(), "two");

    let ctx = match second
        .resume(Some(Value::Token("2".to_string())))
        .expect("no fatal error")
    {
        ParseOutcome::Done(ctx) => ctx,
        ParseOutcome::Suspended(_) => panic!("suspended a third time"),
    };
    let c = ctx.find_rule("c").expect("derived");
    assert_eq!(ctx.arena().rule(c).bases, vec!["one", "two"]);
}

#[test]
fn test_immediate_provider_definitions_do_not_suspend() {
    let mut provider = SlowProvider::new(&[], &[("accent", "teal")]);
    let ctx = match ParseContext::new()
        .with_definition_provider(&mut provider)
        .parse("c = accent;", None)
        .expect("no fatal error")
    {
        ParseOutcome::Done(ctx) => ctx,
        ParseOutcome::Suspended(_) => panic!("suspended for an available definition"),
    };
    let c = ctx.find_rule("c").expect("derived");
    let def = ctx
        .arena()
        .resolve_definition(c, "accent")
        .expect("definition");
    assert_eq!(def.value.render(ctx.arena()), "teal");
}

#[test]
fn test_locally_declared_rules_never_reach_the_provider() {
    let mut provider = SlowProvider::new(&["local"], &[]);
    let outcome = ParseContext::new()
        .with_definition_provider(&mut provider)
        .parse("local { x = 1; } c = local;", None)
        .expect("no fatal error");
    assert!(matches!(outcome, ParseOutcome::Done(_)));
    assert!(provider.asked.is_empty());
}

#[test]
fn test_bodied_extension_suspends_before_its_body() {
    let mut provider = SlowProvider::new(&["theme"], &[]);
    let outcome = ParseContext::new()
        .with_definition_provider(&mut provider)
        .parse("c = theme { extra = 1; }", None)
        .expect("no fatal error");
    let continuation = match outcome {
        ParseOutcome::Suspended(c) => c,
        ParseOutcome::Done(_) => panic!("expected suspension"),
    };
    let ctx = match continuation
        .resume(Some(Value::Token("dark".to_string())))
        .expect("no fatal error")
    {
        ParseOutcome::Done(ctx) => ctx,
        ParseOutcome::Suspended(_) => panic!("suspended again"),
    };
    let c = ctx.find_rule("c").expect("derived");
    // Both the provided base and the body's own declaration landed.
    assert!(ctx.arena().resolve_definition(c, "theme").is_some());
    assert!(ctx.arena().resolve_definition(c, "extra").is_some());
}
