//! # Expansion Driver
//!
//! The [`Expander`] turns node markup into rendered text. It walks the
//! segments produced by [`parse_markup`] in document order and fully resolves
//! each macro call, nested calls included, before moving on, so later calls
//! see the state changes of earlier ones.
//!
//! ## Dispatch
//!
//! 1. Registered macros (built-ins and enabled modules).
//! 2. Story nodes: the node's text is expanded in place under a derived
//!    [`NodeContext`] whose `_context` holds the call's evaluated arguments.
//!    Locals written by the included node do not flow back, and its links
//!    are discarded.
//! 3. Anything else is an unknown macro.
//!
//! Every dispatch counts against the recursion limit, so a node that
//! includes itself without a base case fails instead of overflowing the
//! stack.
//!
//! ## Error Handling
//!
//! The expander implements [`ErrorReporting`] against whatever text it is
//! currently expanding; while a node is included, that is the included
//! node's text. Errors are tagged with the innermost macro name as they
//! propagate.

use crate::ast::value::{Value, ValueMap};
use crate::ast::Span;
use crate::errors::{ErrorKind, ErrorReporting, FirelightError, SourceContext};
use crate::macros::MacroRegistry;
use crate::runtime::context::NodeContext;
use crate::runtime::eval::{self, EvalContext};
use crate::runtime::path::Path;
use crate::runtime::world::World;
use crate::story::{Command, CommandKind, Link, Node, Story};
use crate::syntax::markup::{
    parse_markup, split_top_level, unescape_text, Fragment, LinkMarkup, MacroCall, Segment,
};

/// Default bound on nested macro calls and node inclusions.
pub const DEFAULT_MAX_DEPTH: usize = 64;

pub struct Expander<'s> {
    story: &'s Story,
    registry: &'s MacroRegistry,
    world: &'s mut World,
    scope: NodeContext,
    source: SourceContext,
    phase: &'static str,
    links: Vec<Link>,
    depth: usize,
    max_depth: usize,
}

impl<'s> Expander<'s> {
    pub fn new(
        story: &'s Story,
        registry: &'s MacroRegistry,
        world: &'s mut World,
        scope: NodeContext,
        source: SourceContext,
    ) -> Self {
        Self {
            story,
            registry,
            world,
            scope,
            source,
            phase: "render",
            links: Vec::new(),
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_phase(mut self, phase: &'static str) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn scope(&self) -> &NodeContext {
        &self.scope
    }

    pub fn world(&mut self) -> &mut World {
        &mut *self.world
    }

    pub fn source(&self) -> &SourceContext {
        &self.source
    }

    pub fn story(&self) -> &'s Story {
        self.story
    }

    /// Links recorded so far, in document order.
    pub fn into_links(self) -> Vec<Link> {
        self.links
    }

    // ========================================================================
    // EXPANSION
    // ========================================================================

    /// Expands markup to text: escapes resolved, macro results rendered,
    /// links recorded and replaced by their labels.
    pub fn expand_markup(&mut self, frag: Fragment<'_>) -> Result<String, FirelightError> {
        let segments = parse_markup(frag, &*self)?;
        let mut out = String::new();
        for segment in segments {
            match segment {
                Segment::Text(text) => out.push_str(&unescape_text(text.text)),
                Segment::Macro(call) => {
                    let value = self.call(&call)?;
                    out.push_str(&value.to_string());
                }
                Segment::Link(link) => {
                    let label = self.record_link(&link)?;
                    out.push_str(&label);
                }
            }
        }
        Ok(out)
    }

    /// Expands a macro body such as an `if` result. Surrounding whitespace
    /// is dropped, and a body that is a single quoted literal renders its
    /// inside.
    pub fn expand_body(&mut self, frag: Fragment<'_>) -> Result<Value, FirelightError> {
        let body = frag.quoted_body().unwrap_or_else(|| frag.trim());
        self.expand_markup(body).map(Value::Text)
    }

    /// Evaluates an expression fragment.
    pub fn evaluate(&mut self, frag: Fragment<'_>) -> Result<Value, FirelightError> {
        eval::evaluate(frag, self)
    }

    /// Expands a fragment as markup and parses the result as a dotted path,
    /// so `(set~ inv.(eval~ item) ~ 1)` writes to a computed location.
    pub fn path_arg(&mut self, frag: Fragment<'_>) -> Result<Path, FirelightError> {
        let text = self.expand_markup(frag.trim())?;
        Path::parse(&text).map_err(|kind| self.report(kind, frag.span()))
    }

    // ========================================================================
    // STATE ACCESS
    // ========================================================================

    pub fn read(&self, path: &Path) -> Result<Value, ErrorKind> {
        self.scope.resolve(path, &self.world.store)
    }

    pub fn write(&mut self, path: &Path, value: Value) -> Result<(), ErrorKind> {
        self.scope.scope_for(path, &mut self.world.store)?.set(path, value)
    }

    pub fn add(&mut self, path: &Path, delta: &Value) -> Result<Value, ErrorKind> {
        self.scope.scope_for(path, &mut self.world.store)?.add(path, delta)
    }

    pub fn invert(&mut self, path: &Path) -> Result<Value, ErrorKind> {
        self.scope.scope_for(path, &mut self.world.store)?.invert(path)
    }

    pub fn remove(&mut self, path: &Path) -> Result<Option<Value>, ErrorKind> {
        self.scope.scope_for(path, &mut self.world.store)?.remove(path)
    }

    // ========================================================================
    // DISPATCH
    // ========================================================================

    /// Resolves and runs one macro call.
    pub fn call(&mut self, call: &MacroCall<'_>) -> Result<Value, FirelightError> {
        if self.depth >= self.max_depth {
            return Err(self
                .report(
                    ErrorKind::RecursionLimit {
                        limit: self.max_depth,
                    },
                    call.span(),
                )
                .with_help("a node may be including itself without a base case"));
        }
        tracing::debug!(name = call.name, depth = self.depth, "dispatching macro");
        self.depth += 1;
        let result = self.dispatch(call);
        self.depth -= 1;
        result.map_err(|e| e.in_macro(call.name))
    }

    fn dispatch(&mut self, call: &MacroCall<'_>) -> Result<Value, FirelightError> {
        let registry = self.registry;
        if let Some(mac) = registry.get(call.name) {
            return mac.call(self, call);
        }
        let story = self.story;
        match story.node(call.name) {
            Some(node) => self.include(node, call),
            None => Err(self.report(
                ErrorKind::UnknownMacro {
                    name: call.name.to_string(),
                },
                call.span(),
            )),
        }
    }

    /// Expands `node` in place of `call`.
    fn include(&mut self, node: &'s Node, call: &MacroCall<'_>) -> Result<Value, FirelightError> {
        let context = call
            .args
            .iter()
            .map(|arg| {
                if arg.is_blank() {
                    Ok(Value::Null)
                } else {
                    self.evaluate(*arg)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        if node.is_static() {
            return Ok(Value::from(node.content()));
        }

        let derived = self.scope.derive(context);
        let outer_scope = std::mem::replace(&mut self.scope, derived);
        let outer_source = std::mem::replace(
            &mut self.source,
            SourceContext::from_file(node.name.clone(), node.content()),
        );
        let outer_links = self.links.len();

        let result = self.expand_markup(Fragment::new(node.content(), 0));

        self.links.truncate(outer_links);
        self.source = outer_source;
        self.scope = outer_scope;
        result.map(Value::Text).map_err(|e| e.in_node(&node.name))
    }

    // ========================================================================
    // LINKS
    // ========================================================================

    /// Records a link and returns its rendered label. Target and context
    /// are resolved now; traversal commands are only checked.
    fn record_link(&mut self, markup: &LinkMarkup<'_>) -> Result<String, FirelightError> {
        let label = self.expand_markup(markup.label.trim())?;
        let parts = split_top_level(markup.target, b'&');
        let Some((target_part, context_parts)) = parts.split_first() else {
            return Err(self.report(
                ErrorKind::MalformedLink {
                    reason: "missing target".into(),
                },
                markup.span,
            ));
        };
        let target = self.expand_markup(target_part.trim())?.trim().to_string();
        if target.is_empty() {
            return Err(self.report(
                ErrorKind::MalformedLink {
                    reason: "the target expands to nothing".into(),
                },
                target_part.span(),
            ));
        }
        let mut context = Vec::with_capacity(context_parts.len());
        for part in context_parts {
            context.push(self.evaluate(*part)?);
        }
        let commands = match markup.traversal {
            Some(traversal) => parse_commands(traversal, &*self)?,
            None => Vec::new(),
        };
        self.links.push(Link {
            label: label.clone(),
            target,
            context,
            commands,
            origin: self.source.name.clone(),
        });
        Ok(label)
    }

    // ========================================================================
    // TRAVERSAL COMMANDS
    // ========================================================================

    /// Runs one link command against the state.
    pub fn run_command(&mut self, command: &Command) -> Result<(), FirelightError> {
        tracing::debug!(verb = command.kind().verb(), command = %command, "running link command");
        match command {
            Command::Call { source, .. } => {
                let name = format!("{} (link)", self.source.name);
                let outer = std::mem::replace(
                    &mut self.source,
                    SourceContext::from_file(name, source.clone()),
                );
                let result = self.expand_markup(Fragment::new(source, 0));
                self.source = outer;
                result.map(|_| ())
            }
            Command::Literal { kind, path, value } => {
                let outcome = match (kind, value) {
                    (CommandKind::Set, Some(value)) => self.write(path, value.clone()),
                    (CommandKind::Add, Some(delta)) => self.add(path, delta).map(|_| ()),
                    (CommandKind::Invert, _) => self.invert(path).map(|_| ()),
                    (_, None) => Err(ErrorKind::MalformedLink {
                        reason: format!("'{command}' has no value"),
                    }),
                };
                outcome.map_err(|kind| {
                    let text = command.to_string();
                    let span = Span::new(0, text.len());
                    FirelightError::new(kind, &SourceContext::from_file("command", text), span, self.phase)
                })
            }
        }
    }
}

/// Checks link traversal text: only `set`, `add` and `invert` calls and
/// whitespace are allowed.
pub fn parse_commands(
    traversal: Fragment<'_>,
    reporter: &dyn ErrorReporting,
) -> Result<Vec<Command>, FirelightError> {
    let not_allowed = |span: Span| {
        reporter.report(
            ErrorKind::MalformedLink {
                reason: "traversal text may only contain set, add and invert calls".into(),
            },
            span,
        )
    };
    let mut commands = Vec::new();
    for segment in parse_markup(traversal, reporter)? {
        match segment {
            Segment::Text(text) if text.is_blank() => {}
            Segment::Text(text) => return Err(not_allowed(text.trim().span())),
            Segment::Link(link) => return Err(not_allowed(link.span)),
            Segment::Macro(call) => {
                let Some(kind) = CommandKind::from_verb(call.name) else {
                    return Err(not_allowed(call.span()));
                };
                crate::macros::std::check_command_args(kind, &call, reporter)?;
                commands.push(Command::Call {
                    kind,
                    source: call.source.text.to_string(),
                });
            }
        }
    }
    Ok(commands)
}

// ============================================================================
// CONTEXT IMPLEMENTATIONS
// ============================================================================

impl ErrorReporting for Expander<'_> {
    fn report(&self, kind: ErrorKind, span: Span) -> FirelightError {
        FirelightError::new(kind, &self.source, span, self.phase)
    }
}

impl EvalContext for Expander<'_> {
    fn reporter(&self) -> &dyn ErrorReporting {
        self
    }

    fn resolve(&self, path: &Path) -> Result<Value, ErrorKind> {
        self.read(path)
    }

    fn expand_call(&mut self, call: &MacroCall<'_>) -> Result<Value, FirelightError> {
        self.call(call)
    }

    fn push_bindings(&mut self, bindings: ValueMap) {
        self.scope.push_bindings(bindings);
    }

    fn pop_bindings(&mut self) {
        self.scope.pop_bindings();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCategory;
    use crate::runtime::world::StateStore;

    fn story() -> Story {
        Story::new("hall")
            .with_node("hall", "Hall")
            .with_node("greet", "Hello, (context~ 1)! You came from (eval~ _prev).")
            .with_node("loop", "again (loop~)")
            .with_node("scribble", "(set~ _mine ~ 1)(set~ seen ~ True)[[Away|porch]]")
    }

    fn expand(story: &Story, world: &mut World, text: &str) -> Result<(String, Vec<Link>), FirelightError> {
        let registry = MacroRegistry::standard();
        let scope = NodeContext::new("hall", Some("porch".into()), vec![]);
        let mut exp = Expander::new(story, &registry, world, scope, SourceContext::from_file("hall", text));
        let text = exp.expand_markup(Fragment::new(text, 0))?;
        Ok((text, exp.into_links()))
    }

    fn world() -> World {
        World::new(StateStore::new(), Some(1))
    }

    #[test]
    fn nodes_are_callable_with_context() {
        let story = story();
        let mut world = world();
        let (text, _) = expand(&story, &mut world, r#"(greet~ "Ada")"#).unwrap();
        assert_eq!(text, "Hello, Ada! You came from porch.");
    }

    #[test]
    fn included_nodes_keep_globals_but_not_locals_or_links() {
        let story = story();
        let mut world = world();
        let (text, links) = expand(
            &story,
            &mut world,
            "(set~ _mine ~ 0)(scribble~)(eval~ _mine) (eval~ seen)",
        )
        .unwrap();
        assert_eq!(text, "Away0 true");
        assert!(links.is_empty());
    }

    #[test]
    fn self_inclusion_hits_the_recursion_limit() {
        let story = story();
        let mut world = world();
        let err = expand(&story, &mut world, "(loop~)").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Recursion);
        assert_eq!(err.origin.node.as_deref(), Some("loop"));
    }

    #[test]
    fn links_resolve_targets_and_context_but_defer_commands() {
        let story = story();
        let mut world = world();
        world.store.set(&Path::parse("door").unwrap(), Value::from("porch")).unwrap();
        let (text, links) = expand(
            &story,
            &mut world,
            "Go [[Out|(eval~ door) & 1 + 1 & \"x\"|(set~ left ~ True)]].",
        )
        .unwrap();
        assert_eq!(text, "Go Out.");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].target, "porch");
        assert_eq!(links[0].context, vec![Value::Int(2), Value::from("x")]);
        assert_eq!(links[0].commands.len(), 1);
        assert!(!world.store.contains(&Path::parse("left").unwrap()));
    }

    #[test]
    fn traversal_text_rejects_other_macros() {
        let story = story();
        let mut world = world();
        let err = expand(&story, &mut world, "[[Out|porch|(eval~ 1)]]").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::MalformedLink { .. }));
        let err = expand(&story, &mut world, "[[Out|porch|hello]]").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::MalformedLink { .. }));
    }

    #[test]
    fn unknown_names_report_their_position() {
        let story = story();
        let mut world = world();
        let err = expand(&story, &mut world, "ab (nope~ 1)").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnknownMacro { .. }));
        assert_eq!(err.offset(), 3);
        assert_eq!(err.origin.macro_name.as_deref(), Some("nope"));
    }
}
