//! Loading stories from disk in both formats.

mod common;

use common::{fixture, global, session};
use firelight::errors::{ErrorCategory, SourceContext};
use firelight::runtime::Status;
use firelight::{Story, Value};

#[test]
fn markup_story_plays_through() {
    let story = Story::load(fixture("forest.fls")).unwrap();
    assert_eq!(story.title, "The Turkey Tail");
    assert_eq!(story.modules, ["inventory"]);
    assert_eq!(story.nodes.keys().collect::<Vec<_>>(), ["forest", "clearing", "basket"]);

    let mut s = session(story);
    let forest = s.start().unwrap();
    assert_eq!(
        forest.text,
        "You are in a forest. Birds scatter as you arrive.\nYou carry a rusty knife.\nLook around"
    );
    let clearing = s.traverse(&forest.links[0]).unwrap();
    assert_eq!(clearing.links[0].label, "Pick a fungus");
    let basket = s.traverse(&clearing.links[0]).unwrap();
    assert_eq!(
        basket.text,
        "You carry a rusty knife, a turkey tail. You have 1 mushrooms."
    );
    assert!(basket.is_ending());
    assert_eq!(s.status(), Status::Finished);
}

#[test]
fn static_story_renders_verbatim() {
    let story = Story::load(fixture("cabin.flj")).unwrap();
    let mut s = session(story);
    let porch = s.start().unwrap();
    assert_eq!(porch.text, "A cabin in the snow. (eval~ 1) stays as written.");
    let labels: Vec<&str> = porch.links.iter().map(|l| l.label.as_str()).collect();
    assert_eq!(labels, ["Chop wood", "Go inside"]);

    let woodpile = s.traverse(&porch.links[0]).unwrap();
    assert_eq!(woodpile.text, "You stack the logs.");
    assert_eq!(global(&s, "wood"), Value::Int(2));
    assert_eq!(global(&s, "warm"), Value::Bool(true));

    let porch = s.traverse(&woodpile.links[0]).unwrap();
    let hearth = s.traverse(&porch.links[1]).unwrap();
    assert!(hearth.is_ending());
}

#[test]
fn static_stories_survive_a_write_and_reload() {
    let story = Story::load(fixture("cabin.flj")).unwrap();
    let text = story.to_json_string().unwrap();
    let again = Story::from_source(&SourceContext::from_file("cabin", text)).unwrap();
    assert_eq!(story, again);
}

#[test]
fn format_is_detected_from_content() {
    let json = r#"{"start": "a", "nodes": {"a": {"content": "A"}}}"#;
    let story = Story::from_source(&SourceContext::from_file("a", json)).unwrap();
    assert!(story.node("a").unwrap().is_static());

    let markup = "% start: a\n# a\nA (eval~ 1)\n";
    let story = Story::from_source(&SourceContext::from_file("a", markup)).unwrap();
    assert!(!story.node("a").unwrap().is_static());
}

#[test]
fn broken_markup_loads_but_fails_the_check() {
    let story = Story::load(fixture("broken/unbalanced.fls")).unwrap();
    let problems = story.check_markup();
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].category(), ErrorCategory::Syntax);
    assert_eq!(problems[0].origin.node.as_deref(), Some("cave"));
}

#[test]
fn missing_files_are_io_errors() {
    let err = Story::load(fixture("missing.fls")).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Story);
    assert!(err.to_string().contains("missing.fls"));
}
