/*
 * expand.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Expand command implementation
 */

//! Expand command implementation.
//!
//! Runs every wizard of a manifest and writes the project document.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use crate::manifest::{Manifest, project_host};

/// Arguments for the expand command
#[derive(Debug)]
pub struct ExpandArgs {
    /// Project manifest
    pub manifest: PathBuf,
    /// Output file path; `-` writes to stdout
    pub output: String,
}

/// Execute the expand command
pub fn execute(args: ExpandArgs) -> Result<()> {
    let manifest = Manifest::load(&args.manifest)?;
    let (mut expander, wizards) = manifest.collect()?;
    let host = project_host(&wizards);

    if args.output == "-" {
        let document = expander.finish(&host)?;
        std::io::stdout()
            .write_all(document.as_bytes())
            .context("Failed to write document to stdout")?;
        return Ok(());
    }

    expander
        .finish_project(&host, &args.output)
        .with_context(|| format!("Failed to produce {}", args.output))?;
    info!(
        wizards = wizards.len(),
        elements = expander.identifiers().allocated(),
        connections = expander.connections().connection_count(),
        "project expanded"
    );
    Ok(())
}
