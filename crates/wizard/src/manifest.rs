/*
 * manifest.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Project manifest loading
 */

//! Project manifests.
//!
//! A manifest lists the wizards that make up one project, in the order they
//! are appended, together with the engine settings:
//!
//! ```toml
//! [engine]
//! format-version = 2
//! outputs-dir = "outputs"
//!
//! [[wizard]]
//! template = "synth/main.tmpl"
//! answers = "synth/answers.json"
//!
//! [[wizard]]
//! template = "effects/main.tmpl"
//! include-dir = "shared"
//! answers = "effects/answers.json"
//! ```
//!
//! Relative paths are resolved against the manifest's directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use wizard_template::{EngineConfig, Expander, MemoryHost, WizardTemplate};

/// A parsed project manifest.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Manifest {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default, rename = "wizard")]
    pub wizards: Vec<WizardEntry>,
}

/// One wizard of the project.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WizardEntry {
    pub template: PathBuf,
    pub include_dir: Option<PathBuf>,
    pub answers: PathBuf,
}

/// A wizard ready to be appended.
#[derive(Debug)]
pub struct LoadedWizard {
    pub host: MemoryHost,
    pub template: WizardTemplate,
}

impl Manifest {
    /// Read a manifest and resolve its paths against its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        let manifest: Manifest = toml::from_str(&text)
            .with_context(|| format!("Invalid manifest {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Ok(manifest.relative_to(base))
    }

    fn relative_to(mut self, base: &Path) -> Self {
        let resolve = |path: &Path| base.join(path);
        self.engine.sources_dir = self.engine.sources_dir.as_deref().map(resolve);
        self.engine.outputs_dir = self.engine.outputs_dir.as_deref().map(resolve);
        for wizard in &mut self.wizards {
            wizard.template = resolve(&wizard.template);
            wizard.answers = resolve(&wizard.answers);
            wizard.include_dir = wizard.include_dir.as_deref().map(resolve);
        }
        self
    }

    /// Load every wizard's template and answers.
    pub fn load_wizards(&self) -> Result<Vec<LoadedWizard>> {
        self.wizards.iter().map(WizardEntry::load).collect()
    }

    /// Run pass 1 for every wizard, in manifest order.
    ///
    /// Returns the expander together with the loaded wizards so the caller
    /// can finish the document with the project wizard's answers.
    pub fn collect(&self) -> Result<(Expander, Vec<LoadedWizard>)> {
        let wizards = self.load_wizards()?;
        let mut expander = Expander::new(self.engine.clone());
        for wizard in &wizards {
            expander
                .append_wizard(&wizard.host, &wizard.template)
                .context("Failed to expand wizard")?;
        }
        Ok((expander, wizards))
    }
}

impl WizardEntry {
    fn load(&self) -> Result<LoadedWizard> {
        debug!(template = %self.template.display(), answers = %self.answers.display(), "loading wizard");
        let json = std::fs::read_to_string(&self.answers)
            .with_context(|| format!("Failed to read answers {}", self.answers.display()))?;
        let host: MemoryHost = serde_json::from_str(&json)
            .with_context(|| format!("Invalid answers {}", self.answers.display()))?;

        let mut template = WizardTemplate::from_file(&self.template)?;
        if let Some(dir) = &self.include_dir {
            template = template.with_include_dir(dir);
        }
        Ok(LoadedWizard { host, template })
    }
}

/// Answers the document header is written with: the first wizard's, or an
/// empty host when the manifest lists none.
pub fn project_host(wizards: &[LoadedWizard]) -> MemoryHost {
    wizards
        .first()
        .map_or_else(MemoryHost::default, |wizard| wizard.host.clone())
}
