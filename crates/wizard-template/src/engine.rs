/*
 * engine.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The two-pass expansion driver.
//!
//! Pass 1 reads each appended wizard template line by line, interpreting
//! directives and collecting everything else into an intermediate buffer.
//! Port blocks cannot be written at that point because a later fragment may
//! still connect to the element, so `[ports:…]` lines are kept as
//! placeholders. Pass 2 runs once, after the last wizard has been appended,
//! and replaces each placeholder with the element's now complete port list.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, trace};

use crate::conditional::{Condition, ConditionStack};
use crate::config::{EngineConfig, WizardTemplate};
use crate::directive::{
    Connect, Directive, Include, InlineDirective, Output, expand_inline, is_statement_line,
    recognize_control, recognize_statement,
};
use crate::document::{DocumentFrame, escape_xml, render_ports};
use crate::error::{ExpandError, ExpandResult};
use crate::graph::ConnectionGraph;
use crate::host::TemplateHost;
use crate::ids::{ElementId, IdentifierTable};
use crate::loops::LoopStack;
use crate::names::{NameScope, dereference_source};
use crate::resolver::{FileSystemLoader, FragmentLoader, SearchPaths};
use crate::source::{FrameKind, LineSourceFrame, SourceStack};

/// Qualified name the project element is registered under.
pub const PROJECT_ELEMENT: &str = "#0.project";

/// Host field holding the project version.
const PROJECT_VERSION_FIELD: &str = "project.version";

/// Lifecycle of an [`Expander`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing appended yet.
    Idle,
    /// A wizard pass is being read.
    Collecting,
    /// At least one wizard pass has been read; more may be appended.
    Pass1Done,
    /// Port placeholders are being expanded.
    Pass2,
    /// The document has been produced.
    Finished,
}

/// One entry of the pass-1 buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intermediate {
    /// A fully expanded output line.
    Text(String),
    /// A `[ports:…]` placeholder, expanded in pass 2.
    Ports { indent: String, element: ElementId },
}

impl fmt::Display for Intermediate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intermediate::Text(text) => write!(f, "{}", text),
            Intermediate::Ports { indent, element } => write!(f, "{}[ports:#{}]", indent, element),
        }
    }
}

/// State shared by every wizard pass of one expander.
#[derive(Debug, Default)]
struct RunState {
    ids: IdentifierTable,
    graph: ConnectionGraph,
    once: HashMap<String, HashSet<PathBuf>>,
    buffer: Vec<Intermediate>,
}

/// Expands wizard templates into one project document.
///
/// Append any number of wizard passes with [`Expander::append_wizard`], then
/// produce the document with [`Expander::finish`] or
/// [`Expander::finish_project`]. Identifiers, connections and once-guards are
/// shared by all passes, which is what lets a later wizard refer to an
/// element created by an earlier one.
pub struct Expander {
    config: EngineConfig,
    loader: Box<dyn FragmentLoader>,
    state: RunState,
    project_id: ElementId,
    phase: Phase,
}

impl fmt::Debug for Expander {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expander")
            .field("config", &self.config)
            .field("project_id", &self.project_id)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl Expander {
    /// Create an expander that reads fragments from the filesystem.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_loader(config, FileSystemLoader)
    }

    /// Create an expander with a custom fragment loader.
    pub fn with_loader(config: EngineConfig, loader: impl FragmentLoader + 'static) -> Self {
        let mut state = RunState::default();
        let project_id = state.ids.require(PROJECT_ELEMENT);
        Self {
            config,
            loader: Box::new(loader),
            state,
            project_id,
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Identifier of the project element.
    pub fn project_id(&self) -> ElementId {
        self.project_id
    }

    /// The pass-1 buffer collected so far.
    pub fn intermediate(&self) -> &[Intermediate] {
        &self.state.buffer
    }

    pub fn identifiers(&self) -> &IdentifierTable {
        &self.state.ids
    }

    pub fn connections(&self) -> &ConnectionGraph {
        &self.state.graph
    }

    /// Run pass 1 over one wizard's template.
    pub fn append_wizard(
        &mut self,
        host: &dyn TemplateHost,
        template: &WizardTemplate,
    ) -> ExpandResult<()> {
        match self.phase {
            Phase::Idle | Phase::Pass1Done => {}
            found => {
                return Err(ExpandError::Phase {
                    expected: Phase::Pass1Done,
                    found,
                });
            }
        }
        self.phase = Phase::Collecting;

        info!(
            scope = host.wizard_scope_id(),
            template = ?template.path,
            "appending wizard"
        );

        let mut root = LineSourceFrame::new(FrameKind::Default, "", &template.source);
        if let Some(path) = &template.path {
            root = root.with_path(path);
        }

        let before = self.state.buffer.len();
        let mut pass = CollectPass {
            host,
            config: &self.config,
            loader: &*self.loader,
            include_dir: template.include_dir.as_deref(),
            state: &mut self.state,
            sources: SourceStack::new(),
            conditions: ConditionStack::new(),
            loops: LoopStack::new(),
        };
        pass.sources.push(root);
        pass.run();

        debug!(
            lines = self.state.buffer.len() - before,
            ids = self.state.ids.allocated(),
            connections = self.state.graph.connection_count(),
            "wizard pass collected"
        );
        self.phase = Phase::Pass1Done;
        Ok(())
    }

    /// Run pass 2 and return the complete document.
    ///
    /// `host` supplies the project-level fields written into the header.
    pub fn finish(&mut self, host: &dyn TemplateHost) -> ExpandResult<String> {
        match self.phase {
            Phase::Idle | Phase::Pass1Done => {}
            found => {
                return Err(ExpandError::Phase {
                    expected: Phase::Pass1Done,
                    found,
                });
            }
        }
        self.phase = Phase::Pass2;

        let mut body = Vec::with_capacity(self.state.buffer.len());
        for entry in &self.state.buffer {
            match entry {
                Intermediate::Text(text) => body.push(text.clone()),
                Intermediate::Ports { indent, element } => {
                    body.extend(render_ports(&self.state.graph, *element, indent));
                }
            }
        }

        let frame = DocumentFrame {
            format_version: self.config.format_version,
            project_id: self.project_id,
            project_version: project_version(host),
        };
        self.phase = Phase::Finished;
        Ok(frame.wrap(&body))
    }

    /// Run pass 2 and write the document to `destination`.
    ///
    /// The document is written next to the destination first and moved into
    /// place, so a failed run never leaves a truncated document behind.
    pub fn finish_project(
        &mut self,
        host: &dyn TemplateHost,
        destination: impl AsRef<Path>,
    ) -> ExpandResult<()> {
        let destination = destination.as_ref();
        let document = self.finish(host)?;
        write_atomically(destination, &document)?;
        info!(
            path = %destination.display(),
            bytes = document.len(),
            "wrote project document"
        );
        Ok(())
    }
}

fn project_version(host: &dyn TemplateHost) -> i64 {
    host.field(PROJECT_VERSION_FIELD)
        .and_then(|value| value.render().parse::<i64>().ok())
        .unwrap_or(0)
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

fn write_atomically(destination: &Path, document: &str) -> ExpandResult<()> {
    let partial = partial_path(destination);
    let result = fs::write(&partial, document).and_then(|()| fs::rename(&partial, destination));
    if let Err(source) = result {
        let _ = fs::remove_file(&partial);
        return Err(ExpandError::WriteDocument {
            path: destination.to_path_buf(),
            source,
        });
    }
    Ok(())
}

/// Pass 1 over one wizard template.
struct CollectPass<'a> {
    host: &'a dyn TemplateHost,
    config: &'a EngineConfig,
    loader: &'a dyn FragmentLoader,
    include_dir: Option<&'a Path>,
    state: &'a mut RunState,
    sources: SourceStack,
    conditions: ConditionStack,
    loops: LoopStack,
}

impl<'a> CollectPass<'a> {
    fn run(&mut self) {
        while !self.sources.is_empty() {
            match self.sources.read_line() {
                Some(line) => self.process(&line),
                None => self.drop_orphaned_loops(),
            }
        }

        if self.conditions.depth() > 0 {
            debug!(open = self.conditions.depth(), "unterminated conditional blocks");
        }
        if !self.loops.is_empty() {
            debug!(open = self.loops.frames().len(), "unterminated loops");
        }
    }

    /// Loops whose body lives in a frame that has been closed can never
    /// rewind again.
    fn drop_orphaned_loops(&mut self) {
        let depth = self.sources.depth();
        while let Some(frame) = self.loops.innermost() {
            if frame.rewind.depth() <= depth {
                break;
            }
            debug!(loop_name = %frame.name, "fragment ended inside loop");
            self.loops.pop();
        }
    }

    fn names(&self) -> NameScope<'_> {
        name_scope(&self.loops, &self.sources)
    }

    fn process(&mut self, line: &str) {
        if let Some(directive) = recognize_control(line) {
            trace!(?directive, "control directive");
            self.control(directive);
            return;
        }
        if !self.conditions.is_active() {
            return;
        }

        // Values are escaped only where they land in document text.
        let escape = !is_statement_line(line);
        let limit = self.config.max_inline_expansions;
        let expanded = expand_inline(line, limit, |inline| self.inline(inline, escape));

        match recognize_statement(&expanded) {
            Some(directive) => {
                trace!(?directive, "statement directive");
                self.statement(directive, &expanded);
            }
            None => self.state.buffer.push(Intermediate::Text(expanded)),
        }
    }

    fn control(&mut self, directive: Directive) {
        match directive {
            Directive::If(expr) => {
                let matched = self.conditions.is_active() && self.evaluate(&expr);
                self.conditions.open(matched);
            }
            Directive::ElseIf(expr) => {
                let names = name_scope(&self.loops, &self.sources);
                let host = self.host;
                self.conditions
                    .else_if(|| evaluate_condition(host, &names, &expr));
            }
            Directive::Else => self.conditions.otherwise(),
            Directive::EndIf => self.conditions.close(),
            Directive::Each(name) => self.enter_loop(&name),
            Directive::EndEach(name) => self.end_loop(&name),
            _ => {}
        }
    }

    fn evaluate(&self, expr: &str) -> bool {
        evaluate_condition(self.host, &self.names(), expr)
    }

    fn enter_loop(&mut self, name: &str) {
        if !self.conditions.is_active() {
            self.skip_loop_body(name);
            return;
        }

        let collection = self.names().resolve(name);
        let Some(rewind) = self.sources.position() else {
            return;
        };
        if !self.loops.enter(name, &collection, rewind, self.host) {
            self.skip_loop_body(name);
        }
    }

    /// Skip to the `endeach` balancing the `each` just read.
    fn skip_loop_body(&mut self, name: &str) {
        if !self.sources.skip_block(
            |line| matches!(recognize_control(line), Some(Directive::Each(_))),
            |line| matches!(recognize_control(line), Some(Directive::EndEach(_))),
        ) {
            debug!(loop_name = name, "no matching endeach");
        }
    }

    fn end_loop(&mut self, name: &str) {
        if !self.conditions.is_active() {
            return;
        }
        match self.loops.innermost() {
            None => {
                debug!(loop_name = name, "endeach outside of a loop");
                return;
            }
            Some(frame) if !name.is_empty() && frame.name != name => {
                debug!(loop_name = name, innermost = %frame.name, "endeach does not close the innermost loop");
                return;
            }
            Some(_) => {}
        }

        if let Some(rewind) = self.loops.advance(self.host) {
            if !self.sources.seek(rewind) {
                debug!(loop_name = name, "loop body is no longer readable");
                self.loops.pop();
            }
        }
    }

    fn inline(&mut self, directive: InlineDirective, escape: bool) -> String {
        match directive {
            InlineDirective::Id { name, minor } => {
                self.require_id(&name, minor.as_deref()).to_string()
            }
            InlineDirective::Value(name) => {
                let value = field_value(self.host, &self.names(), &name);
                if escape { escape_xml(&value) } else { value }
            }
            InlineDirective::Index(name) => self
                .names()
                .loop_index(&name)
                .map(|index| index.to_string())
                .unwrap_or_default(),
        }
    }

    /// Identifier for a template name, allocated on first use.
    fn require_id(&mut self, name: &str, minor: Option<&str>) -> ElementId {
        if name.is_empty() {
            return self.state.ids.fresh();
        }
        let resolved = self.names().resolve(name);
        let resolved = dereference_source(self.host, &resolved);
        let qualified = IdentifierTable::qualify(&resolved, minor, self.host.wizard_scope_id());
        self.state.ids.require(&qualified)
    }

    /// Element named by a `ports` directive: either a literal identifier, as
    /// produced by an inline `[id:…]`, or a name.
    fn element_of(&mut self, name: &str) -> ElementId {
        match name.parse::<ElementId>() {
            Ok(id) => id,
            Err(_) => self.require_id(name, None),
        }
    }

    fn statement(&mut self, directive: Directive, line: &str) {
        match directive {
            Directive::Connect(connect) => self.connect(connect),
            Directive::Ports(name) => {
                let indent: String = line.chars().take_while(|c| c.is_whitespace()).collect();
                let element = self.element_of(&name);
                self.state
                    .buffer
                    .push(Intermediate::Ports { indent, element });
            }
            Directive::Include(include) => self.include(include),
            Directive::Source(name) => self.open_source(&name),
            Directive::Output(output) => self.open_outputs(output),
            _ => {}
        }
    }

    fn connect(&mut self, connect: Connect) {
        let source = self.require_id(&connect.source.element, None);
        let target = self.require_id(&connect.target.element, None);
        let connection = match connect.connection.as_deref() {
            Some(name) => self.require_id(name, None),
            None => self.state.ids.fresh(),
        };
        let names = self.names();
        let source_port = names.resolve(&connect.source.port);
        let target_port = names.resolve(&connect.target.port);

        self.state.graph.connect(
            (source, &source_port),
            (target, &target_port),
            connection,
            connect.properties,
        );
    }

    fn can_nest(&self, what: &str, name: &str) -> bool {
        if self.sources.depth() >= self.config.max_include_depth {
            debug!(
                kind = what,
                name,
                depth = self.sources.depth(),
                "fragment nesting limit reached, skipping"
            );
            return false;
        }
        true
    }

    fn search_paths(&self, fixed_dir: Option<&'a Path>) -> SearchPaths<'_> {
        SearchPaths {
            template_dir: self.sources.template_dir(),
            include_dir: self.include_dir,
            fixed_dir,
        }
    }

    fn include(&mut self, include: Include) {
        if !self.can_nest("include", &include.file) {
            return;
        }
        let Some((path, content)) = self.search_paths(None).locate(&include.file, self.loader)
        else {
            debug!(file = %include.file, "include not found, skipping");
            return;
        };

        if let Some(guard) = include.guard {
            let seen = self.state.once.entry(guard).or_default();
            if !seen.insert(path.clone()) {
                debug!(path = %path.display(), "already included under guard");
                return;
            }
        }

        let scope = match include.scope {
            Some(scope) => self.names().resolve(&scope),
            None => self.sources.scope_name().to_string(),
        };
        debug!(path = %path.display(), scope = %scope, "including fragment");
        self.sources
            .push(LineSourceFrame::new(FrameKind::Default, scope, &content).with_path(path));
    }

    fn open_source(&mut self, name: &str) {
        let name = self.names().resolve(name);
        let Some(registration) = self.host.resolve_source(&name) else {
            debug!(source = %name, "unknown source, skipping");
            return;
        };
        if registration.is_reference {
            trace!(source = %name, "reference source has no fragment");
            return;
        }
        let Some(fragment) = registration.fragment.as_deref() else {
            return;
        };
        if !self.can_nest("source", fragment) {
            return;
        }

        let config = self.config;
        let fixed_dir = config.sources_dir.as_deref();
        let Some((path, content)) = self.search_paths(fixed_dir).locate(fragment, self.loader)
        else {
            debug!(source = %name, fragment, "source fragment not found, skipping");
            return;
        };
        debug!(path = %path.display(), scope = %registration.scope_name, "opening source fragment");
        self.sources.push(
            LineSourceFrame::new(FrameKind::SourceFragment, registration.scope_name, &content)
                .with_path(path),
        );
    }

    fn open_outputs(&mut self, output: Output) {
        let origin = {
            let resolved = self.names().resolve(&output.block);
            dereference_source(self.host, &resolved)
        };
        let config = self.config;
        let fixed_dir = config.outputs_dir.as_deref();

        let mut frames = Vec::new();
        for registration in self.host.outputs_for(&output.slot) {
            if !registration.enabled {
                trace!(slot = %output.slot, kind = %registration.kind, "output disabled");
                continue;
            }
            let Some((path, content)) = self
                .search_paths(fixed_dir)
                .locate(&registration.kind, self.loader)
            else {
                debug!(slot = %output.slot, kind = %registration.kind, "output fragment not found, skipping");
                continue;
            };
            frames.push(
                LineSourceFrame::new(
                    FrameKind::OutputFragment,
                    registration.source_block_scope,
                    &content,
                )
                .with_path(path)
                .with_origin(origin.clone()),
            );
        }

        if frames.is_empty() || !self.can_nest("output", &output.slot) {
            return;
        }
        debug!(slot = %output.slot, origin = %origin, count = frames.len(), "opening output fragments");
        // The stack reads the last pushed frame first.
        for frame in frames.into_iter().rev() {
            self.sources.push(frame);
        }
    }
}

fn name_scope<'s>(loops: &'s LoopStack, sources: &'s SourceStack) -> NameScope<'s> {
    NameScope {
        loops: loops.frames(),
        scope_name: sources.scope_name(),
        origin: sources.origin(),
    }
}

/// Value of a template name as text: a loop index for `LOOP.index`, otherwise
/// the host field the name resolves to, or empty.
fn field_value(host: &dyn TemplateHost, names: &NameScope<'_>, name: &str) -> String {
    if let Some(index) = names.index_reference(name) {
        return index.to_string();
    }
    let resolved = dereference_source(host, &names.resolve(name));
    host.field(&resolved)
        .map(|value| value.render())
        .unwrap_or_default()
}

fn evaluate_condition(host: &dyn TemplateHost, names: &NameScope<'_>, expr: &str) -> bool {
    Condition::parse(expr).evaluate(|name| field_value(host, names, name))
}
