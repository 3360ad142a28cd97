/*
 * dump.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Dump command implementation
 */

//! Dump command implementation.
//!
//! Runs pass 1 only and prints the intermediate buffer, with port
//! placeholders shown as `[ports:#ID]`. Useful when debugging templates.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::manifest::Manifest;

/// Arguments for the dump command
#[derive(Debug)]
pub struct DumpArgs {
    /// Project manifest
    pub manifest: PathBuf,
}

/// Execute the dump command
pub fn execute(args: DumpArgs) -> Result<()> {
    let manifest = Manifest::load(&args.manifest)?;
    let (expander, _) = manifest.collect()?;

    let mut stdout = std::io::stdout().lock();
    for entry in expander.intermediate() {
        writeln!(stdout, "{}", entry).context("Failed to write to stdout")?;
    }
    Ok(())
}
