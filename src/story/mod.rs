//! # Stories
//!
//! A [`Story`] is a graph of named [`Node`]s plus the header data needed to
//! start a playthrough: the start node, the extension modules to enable and
//! the initial state snapshot.
//!
//! Stories come in two formats:
//!
//! - **Markup stories** (`.fls`), whose node bodies are Firelight markup with
//!   macros and links, parsed by [`crate::syntax::story`].
//! - **Static stories** (`.flj`), a JSON record of plain text nodes with
//!   successor maps, handled by [`json`].
//!
//! Rendering a node produces [`Link`]s; following a link runs its
//! [`Command`]s.

pub mod json;

use indexmap::IndexMap;
use std::fmt;
use std::path::Path as FsPath;

use crate::ast::value::Value;
use crate::errors::{ErrorKind, FirelightError, PhaseReporter, SourceContext};
use crate::macros::expander::parse_commands;
use crate::runtime::path::Path;
use crate::runtime::world::StateStore;
use crate::syntax::markup::{parse_markup, Fragment, LinkMarkup, Segment};

// ============================================================================
// NODES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum NodeBody {
    /// Firelight markup, expanded on every render.
    Markup(String),
    /// Text shown verbatim, with a fixed set of outgoing links.
    Static {
        content: String,
        successors: Vec<Successor>,
    },
}

/// One outgoing edge of a static node.
#[derive(Debug, Clone, PartialEq)]
pub struct Successor {
    pub anchor: String,
    pub target: String,
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub body: NodeBody,
}

impl Node {
    pub fn markup(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: NodeBody::Markup(content.into()),
        }
    }

    pub fn content(&self) -> &str {
        match &self.body {
            NodeBody::Markup(content) | NodeBody::Static { content, .. } => content,
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(self.body, NodeBody::Static { .. })
    }
}

// ============================================================================
// LINKS AND COMMANDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Set,
    Add,
    Invert,
}

impl CommandKind {
    pub fn verb(&self) -> &'static str {
        match self {
            CommandKind::Set => "set",
            CommandKind::Add => "add",
            CommandKind::Invert => "invert",
        }
    }

    pub fn from_verb(verb: &str) -> Option<Self> {
        match verb {
            "set" => Some(CommandKind::Set),
            "add" => Some(CommandKind::Add),
            "invert" => Some(CommandKind::Invert),
            _ => None,
        }
    }
}

/// A state change attached to a link. Nothing runs until the link is
/// followed.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// A `set`, `add` or `invert` call from link markup, kept as written and
    /// expanded against the state at traversal time.
    Call { kind: CommandKind, source: String },
    /// A command from a static story: a literal path and JSON value.
    Literal {
        kind: CommandKind,
        path: Path,
        value: Option<Value>,
    },
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Call { kind, .. } | Command::Literal { kind, .. } => *kind,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Call { source, .. } => f.write_str(source),
            Command::Literal { kind, path, value: None } => write!(f, "{} {path}", kind.verb()),
            Command::Literal {
                kind,
                path,
                value: Some(value),
            } => {
                let json = serde_json::Value::from(value);
                write!(f, "{} {path} {json}", kind.verb())
            }
        }
    }
}

/// A link produced by rendering a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub label: String,
    pub target: String,
    /// Values the target sees as `_context`.
    pub context: Vec<Value>,
    pub commands: Vec<Command>,
    /// Node whose text produced the link.
    pub origin: String,
}

// ============================================================================
// STORY
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Story {
    pub title: String,
    pub author: String,
    pub start: String,
    pub modules: Vec<String>,
    pub initial_state: StateStore,
    /// Header fields with no meaning to the engine.
    pub metadata: IndexMap<String, String>,
    pub nodes: IndexMap<String, Node>,
}

impl Story {
    pub fn new(start: impl Into<String>) -> Self {
        Self {
            title: "Untitled".to_string(),
            author: "Unknown".to_string(),
            start: start.into(),
            modules: Vec::new(),
            initial_state: StateStore::new(),
            metadata: IndexMap::new(),
            nodes: IndexMap::new(),
        }
    }

    /// Adds a node, rejecting duplicate names.
    pub fn add_node(&mut self, node: Node) -> Result<(), ErrorKind> {
        if self.nodes.contains_key(&node.name) {
            return Err(ErrorKind::InvalidStory {
                message: format!("node '{}' is defined twice", node.name),
            });
        }
        self.nodes.insert(node.name.clone(), node);
        Ok(())
    }

    pub fn with_node(mut self, name: &str, content: &str) -> Self {
        self.nodes.insert(name.to_string(), Node::markup(name, content));
        self
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn has_node(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Checks the invariants every loaded story must hold.
    pub fn validate(&self) -> Result<(), ErrorKind> {
        if !self.has_node(&self.start) {
            return Err(ErrorKind::InvalidStory {
                message: format!("start node '{}' does not exist", self.start),
            });
        }
        for node in self.nodes.values() {
            if let NodeBody::Static { successors, .. } = &node.body {
                if let Some(missing) = successors.iter().find(|s| !self.has_node(&s.target)) {
                    return Err(ErrorKind::InvalidStory {
                        message: format!(
                            "node '{}' links to unknown node '{}'",
                            node.name, missing.target
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    /// Scans every markup node without expanding it: unbalanced calls,
    /// broken links and traversal text that is not a command all surface
    /// here, in node order.
    pub fn check_markup(&self) -> Vec<FirelightError> {
        let mut errors = Vec::new();
        for node in self.nodes.values() {
            let NodeBody::Markup(content) = &node.body else {
                continue;
            };
            let source = SourceContext::from_file(node.name.clone(), content.as_str());
            let reporter = PhaseReporter {
                source: &source,
                phase: "parse",
            };
            let segments = match parse_markup(Fragment::new(content, 0), &reporter) {
                Ok(segments) => segments,
                Err(e) => {
                    errors.push(e.in_node(&node.name));
                    continue;
                }
            };
            for segment in segments {
                if let Segment::Link(LinkMarkup {
                    traversal: Some(traversal),
                    ..
                }) = segment
                {
                    if let Err(e) = parse_commands(traversal, &reporter) {
                        errors.push(e.in_node(&node.name));
                    }
                }
            }
        }
        errors
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    /// Parses story text, picking the format from its first characters: a
    /// JSON object is a static story, anything else markup.
    pub fn from_source(source: &SourceContext) -> Result<Story, FirelightError> {
        let is_json = source
            .content
            .trim_start()
            .strip_prefix('{')
            .is_some_and(|rest| rest.trim_start().starts_with('"'));
        if is_json {
            json::parse_json_story(source)
        } else {
            crate::syntax::story::parse_story(source)
        }
    }

    /// Loads a story file. `.flj` is always JSON and `.fls` always markup;
    /// other extensions are detected from the content.
    pub fn load(path: impl AsRef<FsPath>) -> Result<Story, FirelightError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FirelightError::unsourced(
                ErrorKind::Io {
                    message: format!("{}: {e}", path.display()),
                },
                "load",
            )
        })?;
        let source = SourceContext::from_file(path.display().to_string(), content);
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("flj") => json::parse_json_story(&source),
            Some("fls") => crate::syntax::story::parse_story(&source),
            _ => Story::from_source(&source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_nodes_are_rejected() {
        let mut story = Story::new("a");
        story.add_node(Node::markup("a", "one")).unwrap();
        assert!(matches!(
            story.add_node(Node::markup("a", "two")),
            Err(ErrorKind::InvalidStory { .. })
        ));
    }

    #[test]
    fn start_node_must_exist() {
        let story = Story::new("nowhere").with_node("a", "text");
        assert!(story.validate().is_err());
        let story = Story::new("a").with_node("a", "text");
        assert!(story.validate().is_ok());
    }

    #[test]
    fn markup_check_reports_each_broken_node() {
        let story = Story::new("a")
            .with_node("a", "fine (eval~ 1)")
            .with_node("b", "broken (eval~ 1")
            .with_node("c", "[[Go|a|(eval~ 2)]]");
        let errors = story.check_markup();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].origin.node.as_deref(), Some("b"));
        assert!(matches!(errors[1].kind, ErrorKind::MalformedLink { .. }));
    }

    #[test]
    fn literal_commands_print_as_verb_path_json() {
        let set = Command::Literal {
            kind: CommandKind::Set,
            path: Path::parse("mood").unwrap(),
            value: Some(Value::from("desolate")),
        };
        assert_eq!(set.to_string(), r#"set mood "desolate""#);
        let invert = Command::Literal {
            kind: CommandKind::Invert,
            path: Path::parse("lamp.lit").unwrap(),
            value: None,
        };
        assert_eq!(invert.to_string(), "invert lamp.lit");
    }
}
