/*
 * host.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The template host contract and field value types.
//!
//! The engine never owns wizard answers. It asks a [`TemplateHost`] for field
//! values, repeated-item iteration, and source/output registrations, and never
//! mutates what it is given.
//!
//! [`MemoryHost`] is a plain in-memory implementation. It deserializes from the
//! JSON answer files the command-line front end reads, and is what the tests use.

use std::collections::HashMap;

use serde::Deserialize;

/// A scalar value answered for a form field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A boolean (checkbox) answer.
    Bool(bool),

    /// A numeric answer.
    Number(f64),

    /// A text answer.
    Text(String),
}

impl FieldValue {
    /// Render this value as template text.
    ///
    /// - Text: returned as-is
    /// - Number: integral values render without a fractional part
    /// - Bool: "true" or "false"
    pub fn render(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Number(n) if n.is_finite() && n.fract() == 0.0 => {
                format!("{}", *n as i64)
            }
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Bool(b) => b.to_string(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// A data source registered with the host under a logical name.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SourceRegistration {
    /// Scope name that `this` resolves to inside the source's fragment.
    pub scope_name: String,

    /// Field holding the source's primary value. For a reference source this
    /// is the qualified name of an element allocated by an earlier pass.
    pub primary_field: String,

    /// Whether this source refers to an element another pass already created.
    pub is_reference: bool,

    /// Fragment file included for non-reference sources.
    pub fragment: Option<String>,
}

/// An output fragment registered for an output slot.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputRegistration {
    /// Output type; names the fragment file on the outputs search path.
    #[serde(rename = "type")]
    pub kind: String,

    /// Scope name that `this` resolves to inside the output fragment.
    #[serde(default)]
    pub source_block_scope: String,

    /// Disabled outputs are registered but not expanded.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

/// Everything the engine needs to know about the surrounding application.
///
/// All methods are synchronous read accesses.
pub trait TemplateHost {
    /// Value of a previously registered form field, if any.
    fn field(&self, name: &str) -> Option<FieldValue>;

    /// Next item of a repeated-item collection.
    ///
    /// `counter` is `0` for the first query and afterwards whatever the
    /// previous call returned. Returns the item identifier and the new counter,
    /// or `None` once the collection is exhausted.
    fn next_loop_item(&self, loop_name: &str, counter: usize) -> Option<(String, usize)>;

    /// Look up a registered data source by logical name.
    fn resolve_source(&self, name: &str) -> Option<SourceRegistration>;

    /// Output fragments registered for an output slot, in registration order.
    fn outputs_for(&self, name: &str) -> Vec<OutputRegistration>;

    /// Unique id of the wizard pass currently being appended.
    fn wizard_scope_id(&self) -> u32;
}

/// A [`TemplateHost`] backed by in-memory maps.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct MemoryHost {
    /// Wizard pass id used for identifier prefixing.
    pub scope_id: u32,

    /// Field answers by qualified name.
    pub fields: HashMap<String, FieldValue>,

    /// Repeated-item collections: loop name to item identifiers.
    pub loops: HashMap<String, Vec<String>>,

    /// Registered sources by logical name.
    pub sources: HashMap<String, SourceRegistration>,

    /// Registered outputs by slot name.
    pub outputs: HashMap<String, Vec<OutputRegistration>>,
}

impl MemoryHost {
    /// Create an empty host for the given wizard pass.
    pub fn new(scope_id: u32) -> Self {
        Self {
            scope_id,
            ..Self::default()
        }
    }

    /// Set a field answer.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Set the items of a repeated-item collection.
    pub fn with_loop(
        mut self,
        name: impl Into<String>,
        items: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.loops
            .insert(name.into(), items.into_iter().map(Into::into).collect());
        self
    }

    /// Register a data source.
    pub fn with_source(mut self, name: impl Into<String>, source: SourceRegistration) -> Self {
        self.sources.insert(name.into(), source);
        self
    }

    /// Register an output fragment for a slot.
    pub fn with_output(mut self, slot: impl Into<String>, output: OutputRegistration) -> Self {
        self.outputs.entry(slot.into()).or_default().push(output);
        self
    }
}

impl TemplateHost for MemoryHost {
    fn field(&self, name: &str) -> Option<FieldValue> {
        self.fields.get(name).cloned()
    }

    fn next_loop_item(&self, loop_name: &str, counter: usize) -> Option<(String, usize)> {
        self.loops
            .get(loop_name)
            .and_then(|items| items.get(counter))
            .map(|item| (item.clone(), counter + 1))
    }

    fn resolve_source(&self, name: &str) -> Option<SourceRegistration> {
        self.sources.get(name).cloned()
    }

    fn outputs_for(&self, name: &str) -> Vec<OutputRegistration> {
        self.outputs.get(name).cloned().unwrap_or_default()
    }

    fn wizard_scope_id(&self) -> u32 {
        self.scope_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_values() {
        assert_eq!(FieldValue::from("osc").render(), "osc");
        assert_eq!(FieldValue::from(3.0).render(), "3");
        assert_eq!(FieldValue::from(-12i64).render(), "-12");
        assert_eq!(FieldValue::from(0.5).render(), "0.5");
        assert_eq!(FieldValue::from(true).render(), "true");
        assert_eq!(FieldValue::from(false).render(), "false");
    }

    #[test]
    fn test_loop_iteration_follows_counter() {
        let host = MemoryHost::new(1).with_loop("voices", ["v0", "v1"]);

        let (first, counter) = host.next_loop_item("voices", 0).unwrap();
        assert_eq!(first, "v0");
        let (second, counter) = host.next_loop_item("voices", counter).unwrap();
        assert_eq!(second, "v1");
        assert!(host.next_loop_item("voices", counter).is_none());
        assert!(host.next_loop_item("missing", 0).is_none());
    }

    #[test]
    fn test_outputs_keep_registration_order() {
        let host = MemoryHost::new(1)
            .with_output(
                "midi",
                OutputRegistration {
                    kind: "note".to_string(),
                    source_block_scope: "a".to_string(),
                    enabled: true,
                },
            )
            .with_output(
                "midi",
                OutputRegistration {
                    kind: "cc".to_string(),
                    source_block_scope: "b".to_string(),
                    enabled: false,
                },
            );

        let kinds: Vec<_> = host
            .outputs_for("midi")
            .into_iter()
            .map(|o| o.kind)
            .collect();
        assert_eq!(kinds, vec!["note", "cc"]);
        assert!(host.outputs_for("audio").is_empty());
    }

    #[test]
    fn test_deserialize_from_json() {
        let host: MemoryHost = serde_json::from_str(
            r#"{
                "scope-id": 4,
                "fields": { "project.version": 2, "osc.wave": "saw", "osc.sync": true },
                "loops": { "voices": ["voices.0"] },
                "sources": {
                    "input": { "scope-name": "in", "primary-field": "in.name", "fragment": "input.tmpl" }
                },
                "outputs": { "main": [ { "type": "speaker", "source-block-scope": "spk" } ] }
            }"#,
        )
        .unwrap();

        assert_eq!(host.wizard_scope_id(), 4);
        assert_eq!(host.field("project.version"), Some(FieldValue::Number(2.0)));
        assert_eq!(host.field("osc.wave"), Some(FieldValue::from("saw")));
        assert_eq!(host.field("osc.sync"), Some(FieldValue::Bool(true)));
        let source = host.resolve_source("input").unwrap();
        assert_eq!(source.scope_name, "in");
        assert!(!source.is_reference);
        assert_eq!(source.fragment.as_deref(), Some("input.tmpl"));
        let outputs = host.outputs_for("main");
        assert_eq!(outputs[0].kind, "speaker");
        assert!(outputs[0].enabled);
    }
}
