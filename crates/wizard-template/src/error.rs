/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for wizard expansion.
//!
//! Most problems a template can have are deliberately *not* errors: unknown
//! bracketed tokens pass through as text, unresolvable includes are skipped,
//! and missing host fields render empty. What remains are failures to read
//! the root template and failures to produce the output document.

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::Phase;

/// Errors that can occur during an expansion run.
#[derive(Debug, Error)]
pub enum ExpandError {
    /// The root wizard template could not be read.
    #[error("could not read wizard template {}: {source}", path.display())]
    ReadTemplate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The output document could not be written to its destination.
    #[error("could not write project document {}: {source}", path.display())]
    WriteDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An operation was invoked in the wrong phase of the run.
    #[error("expansion is in phase {found:?}, expected {expected:?}")]
    Phase { expected: Phase, found: Phase },
}

/// Result type for expansion operations.
pub type ExpandResult<T> = Result<T, ExpandError>;
