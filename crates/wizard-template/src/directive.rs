/*
 * directive.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Directive recognition.
//!
//! Template text is line oriented. A line is first tested against the control
//! directives (`if`/`elseif`/`else`/`endif`, `each`/`endeach`), which must make
//! up the whole line and short-circuit everything else. Otherwise the inline
//! directives (`id`, then `value`/`index`) are expanded in place, and the
//! expanded line is tested against the statement directives (`connect`,
//! `ports`, `include`, `source`, `output`). Anything left is plain text.
//!
//! Bracketed tokens that match none of these shapes are not errors; they pass
//! through unchanged.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static IF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[if:(.*)\]$").unwrap());
static ELSEIF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[elseif:(.*)\]$").unwrap());
static ELSE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[else:[^\]]*\]$").unwrap());
static ENDIF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[endif:[^\]]*\]$").unwrap());
static EACH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[each:([^\]]+)\]$").unwrap());
static ENDEACH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[endeach:([^\]]*)\]$").unwrap());

static ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[id:([^\[\]:]*)(?::([^\[\]]*))?\]").unwrap());
static VALUE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(value|index):([^\[\]]*)\]").unwrap());

static CONNECT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\[connect:([^#\]]+)#([^>\]]+)>([^#\]]+)#([^=:\]]+)(?:=([^:\]]+))?(?::([^\]]*))?\]$",
    )
    .unwrap()
});
static STATEMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[(?:connect|ports|include|source|output):").unwrap());
static PORTS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[ports:([^\]]+)\]$").unwrap());
static INCLUDE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[include:([^!:\]]+)(?:!([^:\]]+))?(?::([^\]]*))?\]$").unwrap()
});
static SOURCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[source:([^\]]+)\]$").unwrap());
static OUTPUT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[output:([^>\]]+)>([^\]]+)\]$").unwrap());

/// A full-line directive.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// `[if:EXPR]`
    If(String),
    /// `[elseif:EXPR]`
    ElseIf(String),
    /// `[else:]`
    Else,
    /// `[endif:]`
    EndIf,
    /// `[each:NAME]`
    Each(String),
    /// `[endeach:NAME]`
    EndEach(String),
    /// `[connect:SRC#PORT>DST#PORT(=CONN)?(:K=V,...)?]`
    Connect(Connect),
    /// `[ports:NAME]`
    Ports(String),
    /// `[include:FILE(!GUARD)?(:NAME)?]`
    Include(Include),
    /// `[source:NAME]`
    Source(String),
    /// `[output:BLOCK>NAME]`
    Output(Output),
}

/// One end of a connection: an element name and one of its ports.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub element: String,
    pub port: String,
}

/// A `connect` directive.
#[derive(Debug, Clone, PartialEq)]
pub struct Connect {
    pub source: Endpoint,
    pub target: Endpoint,
    /// Connection name; a fresh identifier is allocated when absent.
    pub connection: Option<String>,
    /// Connection properties in declaration order.
    pub properties: Vec<(String, String)>,
}

/// An `include` directive.
#[derive(Debug, Clone, PartialEq)]
pub struct Include {
    pub file: String,
    /// Once-guard name; the file is included at most once per guard.
    pub guard: Option<String>,
    /// Scope name for the included fragment; inherited when absent.
    pub scope: Option<String>,
}

/// An `output` directive.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    /// Element the output fragments augment.
    pub block: String,
    /// Output slot whose registrations are expanded.
    pub slot: String,
}

/// A directive expanded in place within a line.
#[derive(Debug, Clone, PartialEq)]
pub enum InlineDirective {
    /// `[id:NAME(:MINOR)?]`
    Id { name: String, minor: Option<String> },
    /// `[value:NAME]`
    Value(String),
    /// `[index:NAME]`
    Index(String),
}

fn capture(caps: &Captures, group: usize) -> String {
    caps.get(group)
        .map_or_else(String::new, |m| m.as_str().trim().to_string())
}

fn optional_capture(caps: &Captures, group: usize) -> Option<String> {
    caps.get(group)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Recognize a conditional or loop directive occupying the whole line.
pub fn recognize_control(line: &str) -> Option<Directive> {
    let line = line.trim();
    if !line.starts_with('[') {
        return None;
    }

    if let Some(caps) = IF_RE.captures(line) {
        return Some(Directive::If(capture(&caps, 1)));
    }
    if let Some(caps) = ELSEIF_RE.captures(line) {
        return Some(Directive::ElseIf(capture(&caps, 1)));
    }
    if ELSE_RE.is_match(line) {
        return Some(Directive::Else);
    }
    if ENDIF_RE.is_match(line) {
        return Some(Directive::EndIf);
    }
    if let Some(caps) = EACH_RE.captures(line) {
        return Some(Directive::Each(capture(&caps, 1)));
    }
    if let Some(caps) = ENDEACH_RE.captures(line) {
        return Some(Directive::EndEach(capture(&caps, 1)));
    }
    None
}

/// Recognize a statement directive occupying the whole (already expanded) line.
pub fn recognize_statement(line: &str) -> Option<Directive> {
    let line = line.trim();
    if !line.starts_with('[') {
        return None;
    }

    if let Some(caps) = CONNECT_RE.captures(line) {
        return Some(Directive::Connect(Connect {
            source: Endpoint {
                element: capture(&caps, 1),
                port: capture(&caps, 2),
            },
            target: Endpoint {
                element: capture(&caps, 3),
                port: capture(&caps, 4),
            },
            connection: optional_capture(&caps, 5),
            properties: caps
                .get(6)
                .map(|m| parse_properties(m.as_str()))
                .unwrap_or_default(),
        }));
    }
    if let Some(caps) = PORTS_RE.captures(line) {
        return Some(Directive::Ports(capture(&caps, 1)));
    }
    if let Some(caps) = INCLUDE_RE.captures(line) {
        return Some(Directive::Include(Include {
            file: capture(&caps, 1),
            guard: optional_capture(&caps, 2),
            scope: optional_capture(&caps, 3),
        }));
    }
    if let Some(caps) = SOURCE_RE.captures(line) {
        return Some(Directive::Source(capture(&caps, 1)));
    }
    if let Some(caps) = OUTPUT_RE.captures(line) {
        return Some(Directive::Output(Output {
            block: capture(&caps, 1),
            slot: capture(&caps, 2),
        }));
    }
    None
}

/// Parse a `key=value` list separated by commas.
///
/// Empty entries are dropped; an entry without `=` becomes a key with an
/// empty value.
pub fn parse_properties(text: &str) -> Vec<(String, String)> {
    text.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) => (key.trim().to_string(), value.trim().to_string()),
            None => (entry.to_string(), String::new()),
        })
        .collect()
}

/// Expand inline directives in `line`.
///
/// `id` directives are expanded before `value`/`index` directives, each left
/// to right. After every replacement the line is searched again from the
/// start, so directives formed by nesting (`[value:[value:x]]`) resolve inside
/// out and an `id` produced by a value is expanded in turn. At most `limit`
/// replacements are made.
pub fn expand_inline(
    line: &str,
    limit: usize,
    mut expand: impl FnMut(InlineDirective) -> String,
) -> String {
    let mut line = line.to_string();

    for _ in 0..limit {
        let Some((range, directive)) =
            next_inline(true, &line).or_else(|| next_inline(false, &line))
        else {
            break;
        };
        let replacement = expand(directive);
        line.replace_range(range, &replacement);
    }
    line
}

/// Whether `line` is written as a statement directive, judged before its
/// inline directives are expanded.
pub fn is_statement_line(line: &str) -> bool {
    STATEMENT_RE.is_match(line.trim_start())
}

fn next_inline(ids: bool, line: &str) -> Option<(std::ops::Range<usize>, InlineDirective)> {
    let pattern: &Regex = if ids { &ID_RE } else { &VALUE_RE };
    let caps = pattern.captures(line)?;
    let range = caps.get(0)?.range();
    let directive = if ids {
        InlineDirective::Id {
            name: capture(&caps, 1),
            minor: optional_capture(&caps, 2),
        }
    } else if caps.get(1).map(|m| m.as_str()) == Some("index") {
        InlineDirective::Index(capture(&caps, 2))
    } else {
        InlineDirective::Value(capture(&caps, 2))
    };
    Some((range, directive))
}
