/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Wizard template expansion for project documents.
//!
//! A wizard is a template plus the answers a user gave to its form. This
//! crate expands one or more wizards into a single XML project document. The
//! template language is a fixed set of bracketed, line-oriented directives:
//!
//! - Conditionals: `[if:a=1&b>2]` … `[elseif:…]` … `[else:]` … `[endif:]`
//! - Loops over host collections: `[each:voice]` … `[endeach:voice]`
//! - Inline identifiers and values: `[id:osc]`, `[id:osc:out]`, `[value:osc.wave]`, `[index:voice]`
//! - Connections between element ports: `[connect:osc#out>mixer#in=link:gain=1]`
//! - Port lists, written once every connection is known: `[ports:osc]`
//! - Fragments: `[include:file(!guard)?(:scope)?]`, `[source:name]`, `[output:block>slot]`
//!
//! # Architecture
//!
//! The engine never owns form data. Everything it knows about the wizard's
//! answers comes through the [`TemplateHost`] trait; [`MemoryHost`] is a
//! serde-deserializable implementation for tools and tests. Fragments are
//! loaded through a [`FragmentLoader`].
//!
//! Expansion runs in two passes. Pass 1 interprets directives and allocates
//! identifiers; it can be run for several wizards in turn, sharing one
//! identifier table and connection graph. Pass 2 writes the port lists and
//! frames the document.
//!
//! # Example
//!
//! ```ignore
//! use wizard_template::{EngineConfig, Expander, MemoryHost, WizardTemplate};
//!
//! let host = MemoryHost::new(1).with_loop("voice", ["v0", "v1"]);
//! let template = WizardTemplate::from_source(
//!     "[each:voice]\n<element id=\"[id:voice]\" type=\"voice\"/>\n[endeach:voice]",
//! );
//!
//! let mut expander = Expander::new(EngineConfig::default());
//! expander.append_wizard(&host, &template)?;
//! let document = expander.finish(&host)?;
//! ```

pub mod conditional;
pub mod config;
pub mod directive;
pub mod document;
pub mod engine;
pub mod error;
pub mod graph;
pub mod host;
pub mod ids;
pub mod loops;
pub mod names;
pub mod resolver;
pub mod source;

// Re-export main types at crate root
pub use config::{EngineConfig, WizardTemplate};
pub use directive::{Directive, InlineDirective};
pub use engine::{Expander, Intermediate, Phase};
pub use error::{ExpandError, ExpandResult};
pub use graph::{ConnectionGraph, ConnectionRecord};
pub use host::{FieldValue, MemoryHost, OutputRegistration, SourceRegistration, TemplateHost};
pub use ids::{ElementId, IdentifierTable};
pub use resolver::{FileSystemLoader, FragmentLoader, MemoryLoader};
