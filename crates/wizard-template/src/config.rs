/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Engine configuration and wizard template inputs.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ExpandError, ExpandResult};

/// Settings shared by every wizard pass of one engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct EngineConfig {
    /// Value of the document root's `format-version` attribute.
    pub format_version: u32,

    /// Fixed directory searched last for `source:` fragments.
    pub sources_dir: Option<PathBuf>,

    /// Fixed directory searched last for `output:` fragments.
    pub outputs_dir: Option<PathBuf>,

    /// Maximum depth of nested fragments before further includes are skipped.
    pub max_include_depth: usize,

    /// Maximum inline expansions applied to a single line.
    pub max_inline_expansions: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            format_version: 1,
            sources_dir: None,
            outputs_dir: None,
            max_include_depth: 50,
            max_inline_expansions: 1024,
        }
    }
}

impl EngineConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fixed sources directory.
    pub fn with_sources_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sources_dir = Some(dir.into());
        self
    }

    /// Set the fixed outputs directory.
    pub fn with_outputs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.outputs_dir = Some(dir.into());
        self
    }

    /// Set the document format version.
    pub fn with_format_version(mut self, version: u32) -> Self {
        self.format_version = version;
        self
    }

    /// Set the maximum include depth.
    pub fn with_max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }
}

/// The root template of one wizard pass.
#[derive(Debug, Clone)]
pub struct WizardTemplate {
    /// Template text.
    pub source: String,

    /// Path the template was read from, if any. Its directory is searched
    /// first when resolving fragments.
    pub path: Option<PathBuf>,

    /// The wizard's declared include directory.
    pub include_dir: Option<PathBuf>,
}

impl WizardTemplate {
    /// Create a template from text with no backing file.
    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            path: None,
            include_dir: None,
        }
    }

    /// Read a template from a file.
    pub fn from_file(path: impl AsRef<Path>) -> ExpandResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ExpandError::ReadTemplate {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            source,
            path: Some(path.to_path_buf()),
            include_dir: None,
        })
    }

    /// Set the path the template is considered to live at.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the wizard's include directory.
    pub fn with_include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dir = Some(dir.into());
        self
    }
}
