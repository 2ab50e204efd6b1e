//! Node rendering: macro expansion order, scoping and error reporting.

mod common;

use common::{global, render_one, render_with_state, session, session_with, story, with_state};
use firelight::errors::ErrorCategory;
use firelight::{EngineConfig, ErrorKind, Value};

#[test]
fn macros_expand_in_place() {
    assert_eq!(render_one("Hello (eval~ 1 + 1)!").unwrap(), "Hello 2!");
    assert_eq!(render_one("a \\~ b \\: c").unwrap(), "a ~ b : c");
}

#[test]
fn later_calls_see_earlier_writes() {
    let text = render_one("(set~ n ~ 1)(eval~ n)(set~ n ~ n + 1)(eval~ n)").unwrap();
    assert_eq!(text, "12");
}

#[test]
fn add_and_invert_undo_themselves() {
    let text = render_with_state(
        r#"{"x": 3, "flag": true}"#,
        "(add~ x ~ 5)(add~ x ~ -5)(invert~ flag)(invert~ flag)(eval~ x) (eval~ flag)",
    )
    .unwrap();
    assert_eq!(text, "3 true");
}

#[test]
fn set_creates_intermediate_mappings() {
    let mut s = session(story(&[(
        "main",
        "(set~ properties.turkey-tail ~ 2)(eval~ properties.turkey-tail)",
    )]));
    assert_eq!(s.start().unwrap().text, "2");
    assert!(global(&s, "properties").as_map().is_some());
}

#[test]
fn add_requires_an_existing_path() {
    let err = render_one("(add~ gold ~ 1)").unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Path);
    assert_eq!(err.origin.node.as_deref(), Some("main"));
    assert_eq!(err.origin.macro_name.as_deref(), Some("add"));
}

#[test]
fn conditionals_expand_only_the_chosen_branch() {
    let state = r#"{"gold": 3}"#;
    assert_eq!(
        render_with_state(state, "(if~ gold > 10 ~ rich ~ else ~ poor)").unwrap(),
        "poor"
    );
    assert_eq!(
        render_with_state(state, "(if~ gold > 1 ~ (set~ gold ~ 0)spent ~ else ~ (add~ nowhere ~ 1))(eval~ gold)")
            .unwrap(),
        "spent0"
    );
}

#[test]
fn included_nodes_write_globals_but_not_locals() {
    let mut s = session(story(&[
        ("a", "(b~ 5)/(eval~ gold)/(eval~ _node)"),
        ("b", "(set~ gold ~ _context[0] * 2)(set~ _local ~ 1)in (eval~ _node)[[Hidden|a]]"),
    ]));
    let rendered = s.start().unwrap();
    assert_eq!(rendered.text, "in aHidden/10/a");
    assert!(rendered.links.is_empty());

    let mut s = session(story(&[("a", "(b~)(eval~ _local)"), ("b", "(set~ _local ~ 1)")]));
    let err = s.start().unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Path);
}

#[test]
fn link_targets_and_context_are_resolved_on_render() {
    let mut s = session(story(&[
        ("a", "[[Go|(eval~ \"b\") & 1 + 1 & \"x\"]]"),
        ("b", "(context~ 1)-(context~ 2)-(context~ 3)-(eval~ _prev)"),
    ]));
    let a = s.start().unwrap();
    assert_eq!(a.links[0].target, "b");
    assert_eq!(a.links[0].context, vec![Value::Int(2), Value::from("x")]);
    assert_eq!(s.traverse(&a.links[0]).unwrap().text, "2-x--a");
}

#[test]
fn malformed_markup_is_a_syntax_error() {
    for source in ["(set~ x ~ )", "(if~ true ~ yes", "[[Go|", "[[Go|b|(eval~ 1)]]"] {
        let err = render_one(source).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Syntax, "{source}");
    }
}

#[test]
fn unknown_names_are_story_errors() {
    let err = render_one("x (nothing~ 1)").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnknownMacro { ref name } if name == "nothing"));
    assert_eq!(err.offset(), 2);
}

#[test]
fn self_inclusion_hits_the_recursion_limit() {
    let config = EngineConfig {
        max_depth: 8,
        ..EngineConfig::default()
    };
    let mut s = session_with(story(&[("loop", "again (loop~)")]), config);
    let err = s.start().unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Recursion);
}

#[test]
fn operator_errors_surface_from_the_render() {
    let err = render_one("(eval~ 1 / 0)").unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Value);
    let err = render_with_state(r#"{"m": {"a": 1}}"#, "(eval~ m * 2)").unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Type);
}

#[test]
fn text_concatenates_markup() {
    let s = with_state(story(&[("main", "(text~ a ~ (eval~ n) ~ \" c \")")]), r#"{"n": 2}"#);
    assert_eq!(session(s).start().unwrap().text, "a2 c ");
}

#[test]
fn oversized_repetition_is_a_value_error() {
    let err = render_one(r#"(eval~ "ab" * 9223372036854775807)"#).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Value);
    let err = render_one("(eval~ [1, 2] * 9223372036854775807)").unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Value);
    assert_eq!(render_one(r#"(eval~ "ab" * 3)"#).unwrap(), "ababab");
}

#[test]
fn pipe_with_a_signed_operand_is_bitwise_or() {
    assert_eq!(render_one("(eval~ 5 | -1)").unwrap(), "-1");
    assert_eq!(render_one("(eval~ [1, 2, 3] | - 0)").unwrap(), "-4");
}
