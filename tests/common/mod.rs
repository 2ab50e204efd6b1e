//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use firelight::runtime::{Path, StateStore};
use firelight::{EngineConfig, Session, Story, Value};

pub const SEED: u64 = 7;

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// A markup story whose first node is the start node.
pub fn story(nodes: &[(&str, &str)]) -> Story {
    let mut story = Story::new(nodes[0].0);
    for (name, content) in nodes {
        story = story.with_node(name, content);
    }
    story
}

/// Replaces the story's initial state with a JSON object.
pub fn with_state(mut story: Story, json: &str) -> Story {
    let value: serde_json::Value = serde_json::from_str(json).expect("state fixture is JSON");
    story.initial_state = StateStore::from_value(Value::from(value)).expect("state is an object");
    story
}

pub fn session(story: Story) -> Session {
    session_with(story, EngineConfig::default())
}

pub fn session_with(story: Story, config: EngineConfig) -> Session {
    Session::with_config(story, config.with_seed(SEED)).expect("session opens")
}

/// Reads a global from the session's store.
pub fn global(session: &Session, path: &str) -> Value {
    let path = Path::parse(path).expect("valid path");
    session
        .world()
        .store
        .get(&path)
        .cloned()
        .unwrap_or_else(|e| panic!("{path} is not readable: {e}"))
}

/// Renders a one-node story and returns its text.
pub fn render_one(content: &str) -> Result<String, firelight::FirelightError> {
    let mut session = session(story(&[("main", content)]));
    session.start().map(|r| r.text)
}

pub fn render_with_state(state: &str, content: &str) -> Result<String, firelight::FirelightError> {
    let mut session = session(with_state(story(&[("main", content)]), state));
    session.start().map(|r| r.text)
}
