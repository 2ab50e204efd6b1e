//! # Sessions
//!
//! A [`Session`] is one playthrough of a story. It owns the play state
//! ([`World`]: store, visit table, position, PRNG) and exposes the calls a
//! presentation layer needs:
//!
//! - [`Session::render`] expands a node and returns its text and links;
//! - [`Session::traverse`] runs a link's commands, then renders its target;
//! - [`Session::reset`] starts the playthrough over.
//!
//! Rendering never runs link commands; only traversal does. Both calls are
//! transactional: if anything fails, the play state is put back exactly as
//! it was, so the same call fails the same way again.

use crate::ast::value::Value;
use crate::config::EngineConfig;
use crate::errors::{ErrorKind, ErrorReporting, FirelightError, PhaseReporter, SourceContext};
use crate::macros::{Expander, MacroRegistry};
use crate::runtime::context::{NodeContext, Status};
use crate::runtime::world::{Snapshot, World};
use crate::story::{Link, NodeBody, Story};
use crate::syntax::markup::Fragment;

/// The result of rendering one node.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub node: String,
    pub text: String,
    pub links: Vec<Link>,
}

impl Rendered {
    /// A node with no way out ends the story.
    pub fn is_ending(&self) -> bool {
        self.links.is_empty()
    }
}

pub struct Session {
    story: Story,
    registry: MacroRegistry,
    config: EngineConfig,
    world: World,
}

impl Session {
    pub fn new(story: Story) -> Result<Self, FirelightError> {
        Self::with_config(story, EngineConfig::default())
    }

    /// Enables the modules the story and the configuration name.
    pub fn with_config(story: Story, config: EngineConfig) -> Result<Self, FirelightError> {
        let mut registry = MacroRegistry::standard();
        for module in story.modules.iter().chain(&config.modules) {
            registry
                .enable_module(module)
                .map_err(|kind| FirelightError::unsourced(kind, "load"))?;
        }
        let world = World::new(story.initial_state.clone(), config.seed);
        Ok(Self {
            story,
            registry,
            config,
            world,
        })
    }

    pub fn story(&self) -> &Story {
        &self.story
    }

    pub fn registry(&self) -> &MacroRegistry {
        &self.registry
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn status(&self) -> Status {
        self.world.status
    }

    pub fn current(&self) -> Option<&str> {
        self.world.current.as_deref()
    }

    // ========================================================================
    // NAVIGATION
    // ========================================================================

    pub fn start(&mut self) -> Result<Rendered, FirelightError> {
        let start = self.story.start.clone();
        self.render(&start)
    }

    /// Renders `node` as the player's next stop, with an empty `_context`.
    pub fn render(&mut self, node: &str) -> Result<Rendered, FirelightError> {
        self.transaction("render", |story, registry, config, world| {
            render_node(story, registry, config, world, node, Vec::new())
        })
    }

    /// Follows a link: its commands run in order, then its target renders
    /// with the link's context values.
    pub fn traverse(&mut self, link: &Link) -> Result<Rendered, FirelightError> {
        if self.world.status == Status::Finished {
            return Err(FirelightError::unsourced(ErrorKind::StoryFinished, "traverse")
                .with_help("reset the session to play again"));
        }
        self.transaction("traverse", |story, registry, config, world| {
            if !story.has_node(&link.target) {
                return Err(FirelightError::unsourced(
                    ErrorKind::UnknownNode {
                        name: link.target.clone(),
                    },
                    "traverse",
                )
                .in_node(&link.origin));
            }
            let scope = NodeContext::new(link.origin.clone(), world.current.clone(), Vec::new())
                .with_visits(world.visit_count(&link.origin) <= 1, world.visited())
                .with_status(world.status);
            let source = SourceContext::from_file(link.origin.clone(), "");
            let mut exp = Expander::new(story, registry, world, scope, source)
                .with_phase("traverse")
                .with_max_depth(config.max_depth);
            for command in &link.commands {
                exp.run_command(command).map_err(|e| e.in_node(&link.origin))?;
            }
            render_node(story, registry, config, world, &link.target, link.context.clone())
        })
    }

    /// Back to the initial state: store, visit table and position.
    pub fn reset(&mut self) {
        tracing::debug!(story = %self.story.title, "resetting session");
        self.world = World::new(self.story.initial_state.clone(), self.config.seed);
    }

    // ========================================================================
    // SIDE-EFFECT-FREE ACCESS
    // ========================================================================

    /// Renders `node` against a copy of the play state.
    pub fn preview(&self, node: &str) -> Result<Rendered, FirelightError> {
        let mut scratch = self.world.clone();
        render_node(&self.story, &self.registry, &self.config, &mut scratch, node, Vec::new())
    }

    /// Evaluates an expression as if written in the current node, against
    /// a copy of the play state.
    pub fn evaluate(&self, expression: &str) -> Result<Value, FirelightError> {
        let mut scratch = self.world.clone();
        let node = scratch.current.clone().unwrap_or_else(|| self.story.start.clone());
        let scope = NodeContext::new(node.clone(), None, Vec::new())
            .with_visits(scratch.visit_count(&node) <= 1, scratch.visited())
            .with_status(scratch.status);
        let source = SourceContext::from_file("expression", expression);
        let mut exp = Expander::new(&self.story, &self.registry, &mut scratch, scope, source)
            .with_phase("evaluate")
            .with_max_depth(self.config.max_depth);
        exp.evaluate(Fragment::new(expression, 0))
    }

    pub fn snapshot(&self) -> Snapshot {
        self.world.snapshot()
    }

    pub fn restore(&mut self, snapshot: Snapshot) {
        self.world.restore(snapshot);
    }

    /// Runs `op` on the play state, rolling it back if `op` fails.
    fn transaction<T>(
        &mut self,
        phase: &str,
        op: impl FnOnce(&Story, &MacroRegistry, &EngineConfig, &mut World) -> Result<T, FirelightError>,
    ) -> Result<T, FirelightError> {
        let saved = self.world.clone();
        let result = op(&self.story, &self.registry, &self.config, &mut self.world);
        if let Err(error) = &result {
            tracing::warn!(phase, error = %error, "rolling back play state");
            self.world = saved;
        }
        result
    }
}

/// Records the visit and expands the node.
fn render_node(
    story: &Story,
    registry: &MacroRegistry,
    config: &EngineConfig,
    world: &mut World,
    name: &str,
    context: Vec<Value>,
) -> Result<Rendered, FirelightError> {
    let Some(node) = story.node(name) else {
        let source = SourceContext::from_file(name, name);
        let reporter = PhaseReporter {
            source: &source,
            phase: "render",
        };
        return Err(reporter.report(
            ErrorKind::UnknownNode {
                name: name.to_string(),
            },
            crate::ast::Span::new(0, name.len()),
        ));
    };
    let prev = world.current.replace(name.to_string());
    let visits = world.record_visit(name);
    tracing::debug!(node = name, visits, "rendering node");

    let (text, links) = match &node.body {
        NodeBody::Markup(content) => {
            let scope = NodeContext::new(name, prev, context)
                .with_visits(visits == 1, world.visited())
                .with_status(world.status);
            let source = SourceContext::from_file(name, content.as_str());
            let mut exp = Expander::new(story, registry, world, scope, source)
                .with_max_depth(config.max_depth);
            let text = exp
                .expand_markup(Fragment::new(content, 0))
                .map_err(|e| e.in_node(name))?;
            (text, exp.into_links())
        }
        NodeBody::Static {
            content,
            successors,
        } => {
            let links = successors
                .iter()
                .map(|s| Link {
                    label: s.anchor.clone(),
                    target: s.target.clone(),
                    context: Vec::new(),
                    commands: s.commands.clone(),
                    origin: name.to_string(),
                })
                .collect();
            (content.clone(), links)
        }
    };
    if links.is_empty() {
        world.status = Status::Finished;
    }
    Ok(Rendered {
        node: name.to_string(),
        text,
        links,
    })
}
