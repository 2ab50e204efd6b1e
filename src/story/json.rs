//! Static JSON story format.
//!
//! ```json
//! {
//!   "title": "The Beach",
//!   "author": "Anon",
//!   "start": "at_the_beach",
//!   "nodes": {
//!     "at_the_beach": {
//!       "name": "at_the_beach",
//!       "content": "The sea calls to you.",
//!       "successors": {
//!         "The sea": ["wading_out", ["set mood \"desolate\""]],
//!         "go home": "back_home"
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Commands are `"<verb> <dotted.path> <json>"` strings; `invert` takes no
//! value. They are parsed when the story loads.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ast::value::Value;
use crate::ast::Span;
use crate::errors::{ErrorKind, FirelightError, SourceContext};
use crate::runtime::path::Path;
use crate::runtime::world::StateStore;
use crate::story::{Command, CommandKind, Node, NodeBody, Story, Successor};

// ============================================================================
// WIRE RECORDS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryRecord {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_author")]
    pub author: String,
    pub start: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<serde_json::Value>,
    pub nodes: IndexMap<String, NodeRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub successors: IndexMap<String, SuccessorRecord>,
}

/// A bare target name, or a `[target, [commands]]` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SuccessorRecord {
    Target(String),
    WithCommands(String, Vec<String>),
}

fn default_title() -> String {
    "Untitled".to_string()
}

fn default_author() -> String {
    "Unknown".to_string()
}

// ============================================================================
// COMMANDS
// ============================================================================

/// Parses `"set mood \"desolate\""`, `"add gold 5"` or `"invert lamp.lit"`.
///
/// ```rust
/// use firelight::story::json::parse_command;
/// let cmd = parse_command("add gold 5").unwrap();
/// assert_eq!(cmd.to_string(), "add gold 5");
/// ```
pub fn parse_command(text: &str) -> Result<Command, ErrorKind> {
    let invalid = |reason: &str| ErrorKind::InvalidStory {
        message: format!("bad command '{text}': {reason}"),
    };
    let text = text.trim();
    let (verb, rest) = text.split_once(' ').unwrap_or((text, ""));
    let kind = CommandKind::from_verb(verb).ok_or_else(|| invalid("unknown verb"))?;
    let rest = rest.trim_start();
    let (path, value) = rest.split_once(' ').unwrap_or((rest, ""));
    let path = Path::parse(path).map_err(|_| invalid("missing or invalid path"))?;
    let value = value.trim();
    let value = match (kind, value.is_empty()) {
        (CommandKind::Invert, true) => None,
        (CommandKind::Invert, false) => return Err(invalid("invert takes no value")),
        (_, true) => return Err(invalid("missing value")),
        (_, false) => {
            let json: serde_json::Value =
                serde_json::from_str(value).map_err(|e| invalid(&e.to_string()))?;
            Some(Value::from(json))
        }
    };
    Ok(Command::Literal { kind, path, value })
}

// ============================================================================
// LOADING
// ============================================================================

pub fn parse_json_story(source: &SourceContext) -> Result<Story, FirelightError> {
    let record: StoryRecord = serde_json::from_str(&source.content).map_err(|e| {
        let offset = line_column_offset(&source.content, e.line(), e.column());
        FirelightError::new(
            ErrorKind::InvalidStory {
                message: e.to_string(),
            },
            source,
            Span::new(offset, offset),
            "load",
        )
    })?;
    let fail = |kind: ErrorKind| FirelightError::new(kind, source, Span::default(), "load");
    let story = from_record(record).map_err(fail)?;
    story.validate().map_err(fail)?;
    Ok(story)
}

pub fn from_record(record: StoryRecord) -> Result<Story, ErrorKind> {
    let mut story = Story::new(record.start);
    story.title = record.title;
    story.author = record.author;
    story.modules = record.modules;
    if let Some(state) = record.state {
        story.initial_state = StateStore::from_value(Value::from(state))?;
    }
    for (key, node) in record.nodes {
        if let Some(name) = node.name.as_deref().filter(|name| *name != key) {
            return Err(ErrorKind::InvalidStory {
                message: format!("node '{key}' is named '{name}'"),
            });
        }
        let successors = node
            .successors
            .into_iter()
            .map(|(anchor, successor)| -> Result<Successor, ErrorKind> {
                let (target, commands) = match successor {
                    SuccessorRecord::Target(target) => (target, Vec::new()),
                    SuccessorRecord::WithCommands(target, commands) => (target, commands),
                };
                let commands = commands
                    .iter()
                    .map(|c| parse_command(c))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Successor {
                    anchor,
                    target,
                    commands,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        story.add_node(Node {
            name: key,
            body: NodeBody::Static {
                content: node.content,
                successors,
            },
        })?;
    }
    Ok(story)
}

// ============================================================================
// WRITING
// ============================================================================

impl Story {
    /// The story as a static-format record. Markup nodes are written with
    /// their raw text and no successors.
    pub fn to_json_record(&self) -> StoryRecord {
        let nodes = self
            .nodes
            .iter()
            .map(|(name, node)| {
                let successors = match &node.body {
                    NodeBody::Markup(_) => IndexMap::new(),
                    NodeBody::Static { successors, .. } => successors
                        .iter()
                        .map(|s| {
                            let record = if s.commands.is_empty() {
                                SuccessorRecord::Target(s.target.clone())
                            } else {
                                SuccessorRecord::WithCommands(
                                    s.target.clone(),
                                    s.commands.iter().map(Command::to_string).collect(),
                                )
                            };
                            (s.anchor.clone(), record)
                        })
                        .collect(),
                };
                let record = NodeRecord {
                    name: Some(name.clone()),
                    content: node.content().to_string(),
                    successors,
                };
                (name.clone(), record)
            })
            .collect();
        StoryRecord {
            title: self.title.clone(),
            author: self.author.clone(),
            start: self.start.clone(),
            modules: self.modules.clone(),
            state: (!self.initial_state.is_empty())
                .then(|| serde_json::Value::from(&self.initial_state.to_value())),
            nodes,
        }
    }

    pub fn to_json_string(&self) -> Result<String, FirelightError> {
        serde_json::to_string_pretty(&self.to_json_record()).map_err(|e| {
            FirelightError::unsourced(
                ErrorKind::Io {
                    message: e.to_string(),
                },
                "save",
            )
        })
    }
}

/// Byte offset of a 1-based line and column.
fn line_column_offset(content: &str, line: usize, column: usize) -> usize {
    let line_start: usize = content
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    (line_start + column.saturating_sub(1)).min(content.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BEACH: &str = r#"{
  "title": "The Beach",
  "author": "Anon",
  "start": "at_the_beach",
  "nodes": {
    "at_the_beach": {
      "name": "at_the_beach",
      "content": "The sea calls to you, but you should go home.",
      "successors": {
        "The sea": ["wading_out", ["set mood \"desolate\"", "add steps 1"]],
        "go home": "back_home"
      }
    },
    "wading_out": { "content": "Cold water." },
    "back_home": { "content": "Home again." }
  }
}"#;

    fn load(text: &str) -> Result<Story, FirelightError> {
        parse_json_story(&SourceContext::from_file("beach.flj", text))
    }

    #[test]
    fn successors_keep_declaration_order() {
        let story = load(BEACH).unwrap();
        let NodeBody::Static { successors, .. } = &story.node("at_the_beach").unwrap().body else {
            panic!("expected a static node");
        };
        let anchors: Vec<&str> = successors.iter().map(|s| s.anchor.as_str()).collect();
        assert_eq!(anchors, ["The sea", "go home"]);
        assert_eq!(successors[0].commands.len(), 2);
        assert_eq!(successors[0].commands[0].to_string(), r#"set mood "desolate""#);
    }

    #[test]
    fn record_round_trip_preserves_commands() {
        let story = load(BEACH).unwrap();
        let text = story.to_json_string().unwrap();
        let again = load(&text).unwrap();
        assert_eq!(story, again);
    }

    #[test]
    fn malformed_commands_fail_at_load() {
        let bad = BEACH.replace("add steps 1", "frobnicate steps 1");
        let err = load(&bad).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidStory { .. }));
        assert!(parse_command("set mood").is_err());
        assert!(parse_command("invert lamp true").is_err());
    }

    #[test]
    fn unknown_targets_are_rejected() {
        let bad = BEACH.replace("\"back_home\"\n", "\"nowhere\"\n");
        assert!(load(&bad).is_err());
    }

    #[test]
    fn syntax_errors_point_into_the_file() {
        let text = "{\"start\": }";
        let err = load(text).unwrap_err();
        assert!(err.offset() > 0 && err.offset() <= text.len());
    }
}
