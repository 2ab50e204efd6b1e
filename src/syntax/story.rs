//! Story source parser (`.fls`).
//!
//! ```text
//! % title: The Turkey Tail
//! % author: Anon
//! % start: forest
//! % modules: inventory
//! % state: {
//! %   "inv": {}
//! % }
//!
//! # forest
//! You are in a forest. [[Look around|clearing]]  `` comments run to end of line
//! ```
//!
//! Comments are stripped and newlines normalized before the pest grammar in
//! `story.pest` sees the text, so error offsets refer to the normalized text.

use indexmap::IndexMap;
use pest::{error::Error, iterators::Pair, Parser};
use pest_derive::Parser;

use crate::ast::value::Value;
use crate::ast::Span;
use crate::errors::{ErrorKind, ErrorReporting, FirelightError, PhaseReporter, SourceContext};
use crate::runtime::world::StateStore;
use crate::story::{Node, Story};

#[derive(Parser)]
#[grammar = "syntax/story.pest"]
struct StoryParser;

const COMMENT_START: &str = "``";

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parses a markup story.
pub fn parse_story(source: &SourceContext) -> Result<Story, FirelightError> {
    let normalized = SourceContext::from_file(source.name.clone(), normalize(&source.content));
    let reporter = PhaseReporter {
        source: &normalized,
        phase: "load",
    };
    let mut pairs = StoryParser::parse(Rule::story, &normalized.content)
        .map_err(|e| convert_parse_error(e, &reporter))?;
    let Some(root) = pairs.next() else {
        return Err(reporter.report(
            ErrorKind::InvalidStory {
                message: "empty story".into(),
            },
            Span::default(),
        ));
    };

    let mut fields = IndexMap::new();
    let mut header_span = Span::default();
    let mut nodes = Vec::new();
    for pair in root.into_inner() {
        match pair.as_rule() {
            Rule::header => {
                header_span = span_of(&pair);
                read_header(pair, &mut fields, &reporter)?;
            }
            Rule::node => nodes.push(read_node(pair)),
            _ => {}
        }
    }

    let mut story = build_story(fields)
        .map_err(|kind| reporter.report(kind, header_span))?;
    for (node, span) in nodes {
        story
            .add_node(node)
            .map_err(|kind| reporter.report(kind, span))?;
    }
    story
        .validate()
        .map_err(|kind| reporter.report(kind, header_span))?;
    tracing::debug!(story = %story.title, nodes = story.nodes.len(), "parsed story");
    Ok(story)
}

/// Newline normalization and comment removal. The result always ends in a
/// newline.
pub fn normalize(src: &str) -> String {
    let unified = src
        .replace("\n\r", "\n")
        .replace("\r\n", "\n")
        .replace('\r', "\n");
    let mut out = String::with_capacity(unified.len() + 1);
    for line in unified.split_inclusive('\n') {
        match line.find(COMMENT_START) {
            Some(at) => {
                out.push_str(&line[..at]);
                if line.ends_with('\n') {
                    out.push('\n');
                }
            }
            None => out.push_str(line),
        }
    }
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

// ============================================================================
// HEADER
// ============================================================================

fn read_header(
    header: Pair<Rule>,
    fields: &mut IndexMap<String, String>,
    reporter: &dyn ErrorReporting,
) -> Result<(), FirelightError> {
    let mut current: Option<String> = None;
    for line in header.into_inner() {
        let span = span_of(&line);
        let Some(part) = line.into_inner().next() else {
            continue;
        };
        match part.as_rule() {
            Rule::field_start => {
                let mut inner = part.into_inner();
                let key = inner.next().map(|p| p.as_str().to_string()).unwrap_or_default();
                let value = inner.next().map(|p| p.as_str().trim()).unwrap_or("");
                fields.insert(key.clone(), value.to_string());
                current = Some(key);
            }
            Rule::continuation => {
                let Some(key) = current.as_ref() else {
                    return Err(reporter.report(
                        ErrorKind::UnexpectedToken {
                            expected: "a '% key: value' field".into(),
                            found: "a continuation line".into(),
                        },
                        span,
                    ));
                };
                let text = part.as_str().trim();
                if let Some(value) = fields.get_mut(key) {
                    if !text.is_empty() {
                        if !value.is_empty() {
                            value.push(' ');
                        }
                        value.push_str(text);
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn build_story(mut fields: IndexMap<String, String>) -> Result<Story, ErrorKind> {
    let start = fields
        .shift_remove("start")
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ErrorKind::InvalidStory {
            message: "the header does not name a start node".into(),
        })?;
    let mut story = Story::new(start);
    if let Some(title) = fields.shift_remove("title") {
        story.title = title;
    }
    if let Some(author) = fields.shift_remove("author") {
        story.author = author;
    }
    if let Some(modules) = fields.shift_remove("modules") {
        story.modules = modules
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(state) = fields.shift_remove("state") {
        let json: serde_json::Value =
            serde_json::from_str(&state).map_err(|e| ErrorKind::InvalidStory {
                message: format!("the initial state is not valid JSON: {e}"),
            })?;
        story.initial_state = StateStore::from_value(Value::from(json))?;
    }
    story.metadata = fields;
    Ok(story)
}

// ============================================================================
// NODES
// ============================================================================

fn read_node(node: Pair<Rule>) -> (Node, Span) {
    let span = span_of(&node);
    let mut name = String::new();
    let mut body = "";
    for part in node.into_inner() {
        match part.as_rule() {
            Rule::node_header => {
                if let Some(n) = part.into_inner().next() {
                    name = n.as_str().to_string();
                }
            }
            Rule::node_body => body = part.as_str(),
            _ => {}
        }
    }
    (Node::markup(name, trim_blank_lines(body)), span)
}

/// Drops leading and trailing lines that hold only whitespace.
fn trim_blank_lines(body: &str) -> String {
    let lines: Vec<&str> = body.lines().collect();
    let first = lines.iter().position(|l| !l.trim().is_empty());
    let last = lines.iter().rposition(|l| !l.trim().is_empty());
    match (first, last) {
        (Some(first), Some(last)) => lines[first..=last].join("\n"),
        _ => String::new(),
    }
}

// ============================================================================
// ERRORS
// ============================================================================

fn span_of(pair: &Pair<Rule>) -> Span {
    let span = pair.as_span();
    Span::new(span.start(), span.end())
}

fn convert_parse_error(error: Error<Rule>, reporter: &dyn ErrorReporting) -> FirelightError {
    let span = match error.location {
        pest::error::InputLocation::Pos(pos) => Span::new(pos, pos),
        pest::error::InputLocation::Span((start, end)) => Span::new(start, end),
    };
    reporter
        .report(
            ErrorKind::UnexpectedToken {
                expected: "a '% key: value' header line or a '# node' header".into(),
                found: "text".into(),
            },
            span,
        )
        .with_help("node text must follow a '# name' line")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCategory;

    const FOREST: &str = "% title: The Turkey Tail\r\n\
% author: Anon\r\n\
% start: forest\r\n\
% modules: inventory\r\n\
% state: {\r\n\
%   \"inv\": {\"knife\": 1},\r\n\
%   \"mood\": \"calm\"\r\n\
% }\r\n\
% note: first line\r\n\
%    second line\r\n\
\r\n\
# forest\r\n\
\r\n\
You are in a forest. `` a comment\r\n\
[[Look around|clearing]]\r\n\
\r\n\
#clearing\r\n\
A clearing.\r\n";

    fn parse(text: &str) -> Result<Story, FirelightError> {
        parse_story(&SourceContext::from_file("test.fls", text))
    }

    #[test]
    fn header_fields_and_nodes() {
        let story = parse(FOREST).unwrap();
        assert_eq!(story.title, "The Turkey Tail");
        assert_eq!(story.author, "Anon");
        assert_eq!(story.start, "forest");
        assert_eq!(story.modules, ["inventory"]);
        assert_eq!(story.metadata["note"], "first line second line");
        let mood = crate::runtime::path::Path::parse("mood").unwrap();
        assert_eq!(story.initial_state.get(&mood).unwrap(), &Value::from("calm"));
        assert_eq!(
            story.node("forest").unwrap().content(),
            "You are in a forest. \n[[Look around|clearing]]"
        );
        assert_eq!(story.node("clearing").unwrap().content(), "A clearing.");
    }

    #[test]
    fn defaults_and_last_definition_wins() {
        let story = parse("% start: a\n% start: b\n# a\nA\n# b\nB").unwrap();
        assert_eq!(story.start, "b");
        assert_eq!(story.title, "Untitled");
        assert_eq!(story.author, "Unknown");
        assert!(story.initial_state.is_empty());
    }

    #[test]
    fn stray_text_before_the_first_node_is_a_syntax_error() {
        let err = parse("% start: a\nhello\n# a\nA\n").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Syntax);
        assert_eq!(err.offset(), 11);
    }

    #[test]
    fn story_level_errors() {
        let missing_start = parse("% title: x\n# a\nA\n").unwrap_err();
        assert_eq!(missing_start.category(), ErrorCategory::Story);
        let dangling = parse("% start: nowhere\n# a\nA\n").unwrap_err();
        assert_eq!(dangling.category(), ErrorCategory::Story);
        let duplicate = parse("% start: a\n# a\nA\n# a\nB\n").unwrap_err();
        assert!(matches!(duplicate.kind, ErrorKind::InvalidStory { .. }));
        let bad_state = parse("% start: a\n% state: {nope}\n# a\nA\n").unwrap_err();
        assert_eq!(bad_state.category(), ErrorCategory::Story);
    }

    #[test]
    fn hash_lines_that_are_not_headers_stay_in_the_body() {
        let story = parse("% start: a\n# a\n# not a header!\nmore\n").unwrap();
        assert_eq!(story.node("a").unwrap().content(), "# not a header!\nmore");
    }
}
