//! Playthrough behaviour: traversal, endings, rollback and extension modules.

mod common;

use common::{global, session, session_with, story, with_state};
use firelight::errors::ErrorCategory;
use firelight::runtime::Status;
use firelight::{EngineConfig, ErrorKind, Session, Value};

fn shop() -> firelight::Story {
    with_state(
        story(&[
            ("shop", "A shop. [[Buy|counter|(add~ gold ~ 5)(set~ bought ~ gold * 2)]]"),
            ("counter", "(eval~ gold) (eval~ bought) (eval~ _status_)"),
        ]),
        r#"{"gold": 0}"#,
    )
}

#[test]
fn commands_run_in_order_before_the_target_renders() {
    let mut s = session(shop());
    let shop = s.start().unwrap();
    assert_eq!(global(&s, "gold"), Value::Int(0));
    let counter = s.traverse(&shop.links[0]).unwrap();
    assert_eq!(counter.text, "5 10 unfolding");
    assert_eq!(s.current(), Some("counter"));
}

#[test]
fn rendering_never_runs_link_commands() {
    let mut s = session(with_state(
        story(&[("a", "[[Eat|b|(add~ inv.apple ~ -1)]]"), ("b", "Crunch.")]),
        r#"{"inv": {"apple": 1}}"#,
    ));
    for _ in 0..3 {
        s.render("a").unwrap();
    }
    assert_eq!(global(&s, "inv.apple"), Value::Int(1));
    let a = s.render("a").unwrap();
    s.traverse(&a.links[0]).unwrap();
    assert_eq!(global(&s, "inv.apple"), Value::Int(0));
}

#[test]
fn a_node_without_links_finishes_the_story() {
    let mut s = session(shop());
    let shop = s.start().unwrap();
    s.traverse(&shop.links[0]).unwrap();
    assert_eq!(s.status(), Status::Finished);

    let err = s.traverse(&shop.links[0]).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::StoryFinished));

    s.reset();
    assert_eq!(s.status(), Status::Unfolding);
    assert_eq!(s.current(), None);
    assert_eq!(global(&s, "gold"), Value::Int(0));
    assert!(s.world().visits.is_empty());
}

#[test]
fn visit_counts_and_once() {
    let mut s = session(story(&[(
        "a",
        "(eval~ _visited_.a)(once~ \" first\")(again~ \" again\") [[Again|a]]",
    )]));
    let first = s.start().unwrap();
    assert_eq!(first.text, "1 first Again");
    let second = s.traverse(&first.links[0]).unwrap();
    assert_eq!(second.text, "2 again Again");
    assert_eq!(s.world().visit_count("a"), 2);
}

#[test]
fn failed_traversals_leave_no_trace() {
    let mut s = session(with_state(
        story(&[("a", "[[Go|b|(add~ gold ~ 1)(add~ missing ~ 1)]]"), ("b", "B")]),
        r#"{"gold": 0}"#,
    ));
    let a = s.start().unwrap();
    let before = s.snapshot();

    let first = s.traverse(&a.links[0]).unwrap_err();
    assert_eq!(first.category(), ErrorCategory::Path);
    assert_eq!(s.snapshot(), before);
    assert_eq!(global(&s, "gold"), Value::Int(0));

    let second = s.traverse(&a.links[0]).unwrap_err();
    assert_eq!(first.kind, second.kind);
}

#[test]
fn failed_renders_leave_no_trace() {
    let mut s = session(with_state(
        story(&[("a", "(set~ gold ~ 99)(eval~ 1 / 0)")]),
        r#"{"gold": 0}"#,
    ));
    let before = s.snapshot();
    let err = s.start().unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Value);
    assert_eq!(err.origin.node.as_deref(), Some("a"));
    assert_eq!(s.snapshot(), before);
    assert_eq!(s.world().visit_count("a"), 0);
}

#[test]
fn traversing_to_a_missing_node_fails() {
    let mut s = session(story(&[("a", "[[Go|nowhere]]")]));
    let a = s.start().unwrap();
    let err = s.traverse(&a.links[0]).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnknownNode { ref name } if name == "nowhere"));
    assert_eq!(s.current(), Some("a"));
}

#[test]
fn preview_and_evaluate_are_side_effect_free() {
    let mut s = session(shop());
    s.start().unwrap();
    let before = s.snapshot();
    assert_eq!(s.preview("shop").unwrap().text, "A shop. Buy");
    assert_eq!(s.evaluate("gold + 1").unwrap(), Value::Int(1));
    assert_eq!(s.snapshot(), before);
}

#[test]
fn snapshots_restore_a_playthrough() {
    let mut s = session(shop());
    let shop = s.start().unwrap();
    let saved = s.snapshot();
    s.traverse(&shop.links[0]).unwrap();
    s.restore(saved.clone());
    assert_eq!(s.snapshot(), saved);
    assert_eq!(s.current(), Some("shop"));
    assert_eq!(s.status(), Status::Unfolding);
}

#[test]
fn sessions_are_isolated() {
    let mut one = session(shop());
    let mut two = session(shop());
    let shop = one.start().unwrap();
    one.traverse(&shop.links[0]).unwrap();
    two.start().unwrap();
    assert_eq!(global(&one, "gold"), Value::Int(5));
    assert_eq!(global(&two, "gold"), Value::Int(0));
}

#[test]
fn seeded_sessions_roll_the_same_dice() {
    let dice = || story(&[("roll", "(random~ 1 ~ 1000) (random~ 1 ~ 1000) (random~ [\"x\"])")]);
    let first = session(dice()).start().unwrap().text;
    let second = session(dice()).start().unwrap().text;
    assert_eq!(first, second);
    assert!(first.ends_with(" x"));
}

#[test]
fn inventory_module_tracks_items() {
    let mut inventory = with_state(
        story(&[(
            "pack",
            "(plus~ knife)(plus~ apple ~ 3)(minus~ apple)(count~)/(count~ #food)/(list~)/(inventory.count~ knife)",
        )]),
        r#"{"inv": {}, "inv-desc": {"knife": "a rusty knife"}, "inv-cat": {"knife": "tool", "apple": ["food"]}}"#,
    );
    inventory.modules = vec!["inventory".to_string()];
    let mut s = session(inventory);
    assert_eq!(s.start().unwrap().text, "3/2/a rusty knife, apple (2)/1");

    let mut s = session(with_state(
        story(&[("pack", "(minus~ apple ~ 2)")]),
        r#"{"inv": {"apple": 2}}"#,
    ));
    let err = s.start().unwrap_err();
    assert!(matches!(err.kind, ErrorKind::UnknownMacro { .. }));
}

fn inventory(content: &str) -> Session {
    let mut pack = with_state(story(&[("pack", content)]), r#"{"inv": {}}"#);
    pack.modules = vec!["inventory".to_string()];
    session(pack)
}

#[test]
fn negative_plus_removes_emptied_items() {
    let mut s = inventory("(plus~ a ~ 2)(plus~ b)(plus~ a ~ -2)(plus~ c ~ -1)(count~)");
    assert_eq!(s.start().unwrap().text, "1");
    let inv = global(&s, "inv");
    let inv = inv.as_map().unwrap();
    assert_eq!(inv.keys().collect::<Vec<_>>(), ["b"]);
}

#[test]
fn inventory_counts_do_not_overflow() {
    for content in [
        "(plus~ a ~ 9223372036854775807)(plus~ a ~ 1)",
        "(plus~ a ~ 9223372036854775807)(minus~ a ~ -1)",
        "(plus~ a ~ 9223372036854775807)(plus~ b ~ 1)(count~)",
    ] {
        let mut s = inventory(content);
        let err = s.start().unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Value, "{content}");
        assert!(global(&s, "inv").as_map().is_some_and(|inv| inv.is_empty()));
    }
}

#[test]
fn modules_can_be_enabled_by_configuration() {
    let config = EngineConfig {
        modules: vec!["inventory".to_string()],
        ..EngineConfig::default()
    };
    let mut s = session_with(
        with_state(story(&[("pack", "(minus~ apple ~ 2)(count~ apple)")]), r#"{"inv": {"apple": 2}}"#),
        config,
    );
    assert_eq!(s.start().unwrap().text, "0");
    assert!(global(&s, "inv").as_map().is_some_and(|inv| inv.is_empty()));
}

#[test]
fn unknown_modules_are_rejected() {
    let mut bad = story(&[("a", "A")]);
    bad.modules = vec!["alchemy".to_string()];
    let err = Session::new(bad).err().expect("unknown module");
    assert!(matches!(err.kind, ErrorKind::UnknownModule { ref name } if name == "alchemy"));
}
