/*
 * names.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Scoped name resolution.
//!
//! Names written in templates are relative: they mention loop variables, the
//! `this` scope of the current fragment, the `origin` element of an output
//! fragment, or another wizard pass's element through `source.X`. These
//! functions rewrite them into the fully qualified names the host and the
//! identifier table understand.

use tracing::debug;

use crate::host::TemplateHost;
use crate::loops::LoopFrame;

/// Maximum number of reference sources followed for one `source.X` name.
const MAX_REFERENCE_CHAIN: usize = 16;

/// Everything names are resolved against at one point of the expansion.
#[derive(Debug, Clone, Copy)]
pub struct NameScope<'a> {
    /// Active loops, outermost first.
    pub loops: &'a [LoopFrame],
    /// Scope name of the top line source frame.
    pub scope_name: &'a str,
    /// Origin element of the enclosing output fragment.
    pub origin: Option<&'a str>,
}

impl<'a> NameScope<'a> {
    /// Resolve loop variables, then a leading `this` or `origin` segment.
    pub fn resolve(&self, name: &str) -> String {
        let mut resolved = name.to_string();
        for frame in self.loops {
            resolved = substitute_loop(&resolved, frame);
        }

        if let Some(rest) = strip_leading_segment(&resolved, "this") {
            return join_scope(self.scope_name, rest);
        }
        if let Some(origin) = self.origin {
            if let Some(rest) = strip_leading_segment(&resolved, "origin") {
                return join_scope(origin, rest);
            }
        }
        resolved
    }

    /// Iteration index of the innermost active loop called `loop_name`.
    pub fn loop_index(&self, loop_name: &str) -> Option<usize> {
        self.loops
            .iter()
            .rev()
            .find(|frame| frame.name == loop_name)
            .map(|frame| frame.index)
    }

    /// Iteration index referenced by a `LOOP.index` name, if it is one.
    pub fn index_reference(&self, name: &str) -> Option<usize> {
        name.strip_suffix(".index")
            .and_then(|loop_name| self.loop_index(loop_name))
    }
}

/// Replace every occurrence of the loop's name (as whole dotted segments)
/// with its current item, or `NAME.index` with the iteration index.
///
/// The collection name is matched as well, since outer loops have already
/// rewritten a nested loop's name into its collection by the time the inner
/// frame is applied.
fn substitute_loop(name: &str, frame: &LoopFrame) -> String {
    let segments: Vec<&str> = name.split('.').collect();
    let written: Vec<&str> = frame.name.split('.').collect();
    let collection: Vec<&str> = frame.collection.split('.').collect();

    let mut out: Vec<String> = Vec::with_capacity(segments.len());
    let mut i = 0;
    while i < segments.len() {
        let matched = [written.as_slice(), collection.as_slice()]
            .into_iter()
            .find(|pattern| segments[i..].starts_with(pattern));
        if let Some(pattern) = matched {
            let after = i + pattern.len();
            if segments.get(after) == Some(&"index") {
                out.push(frame.index.to_string());
                i = after + 1;
            } else {
                out.push(frame.item.clone());
                i = after;
            }
        } else {
            out.push(segments[i].to_string());
            i += 1;
        }
    }
    out.join(".")
}

/// `Some(rest)` if `name` is `keyword` or starts with `keyword.`; `rest`
/// keeps its leading dot.
fn strip_leading_segment<'n>(name: &'n str, keyword: &str) -> Option<&'n str> {
    let rest = name.strip_prefix(keyword)?;
    (rest.is_empty() || rest.starts_with('.')).then_some(rest)
}

fn join_scope(scope: &str, rest: &str) -> String {
    if scope.is_empty() {
        rest.strip_prefix('.').unwrap_or(rest).to_string()
    } else {
        format!("{}{}", scope, rest)
    }
}

/// Rewrite a `source.X[.rest]` name to the element the source stands for.
///
/// A plain source stands for its own scope name. A reference source stands
/// for the value of its primary field; when that value is itself the name of
/// a registered source the chain is followed. Names that do not start with
/// `source.`, or that name an unknown source, are returned unchanged.
pub fn dereference_source(host: &dyn TemplateHost, name: &str) -> String {
    let Some(rest) = name.strip_prefix("source.") else {
        return name.to_string();
    };
    let (source_name, tail) = match rest.split_once('.') {
        Some((source_name, tail)) => (source_name, Some(tail)),
        None => (rest, None),
    };

    let Some(base) = chase_source(host, source_name) else {
        return name.to_string();
    };
    match tail {
        Some(tail) if base.is_empty() => tail.to_string(),
        Some(tail) => format!("{}.{}", base, tail),
        None => base,
    }
}

fn chase_source(host: &dyn TemplateHost, source_name: &str) -> Option<String> {
    let mut registration = host.resolve_source(source_name)?;
    let mut target = String::new();

    for _ in 0..MAX_REFERENCE_CHAIN {
        if !registration.is_reference {
            return Some(registration.scope_name);
        }
        target = host
            .field(&registration.primary_field)
            .map(|value| value.render())
            .unwrap_or_default();
        if target.starts_with('#') {
            return Some(target);
        }
        match host.resolve_source(&target) {
            Some(next) => registration = next,
            None => return Some(target),
        }
    }

    debug!(source = source_name, "source reference chain too long, stopping");
    Some(target)
}
