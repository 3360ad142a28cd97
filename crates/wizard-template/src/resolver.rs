/*
 * resolver.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Fragment resolution.
//!
//! This module provides the trait and implementations for loading template
//! fragments (`include`, `source` and `output` targets), plus the search order
//! used to locate them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Trait for loading fragment text.
///
/// Implementations return `None` for anything they cannot read; the engine
/// treats that as "not found here" and moves on to the next candidate.
pub trait FragmentLoader {
    /// Load the fragment at `path`.
    fn load(&self, path: &Path) -> Option<String>;
}

/// Loader that reads fragments from the filesystem.
#[derive(Debug, Clone, Default)]
pub struct FileSystemLoader;

impl FragmentLoader for FileSystemLoader {
    fn load(&self, path: &Path) -> Option<String> {
        std::fs::read_to_string(path).ok()
    }
}

/// Loader that serves fragments from an in-memory map keyed by path.
///
/// Useful for testing and for wizards whose templates are bundled
/// into the application.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    fragments: HashMap<PathBuf, String>,
}

impl MemoryLoader {
    /// Create a new empty memory loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fragment at the given path.
    pub fn add(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> &mut Self {
        self.fragments.insert(path.into(), content.into());
        self
    }

    /// Create a loader with the given fragments.
    pub fn with_fragments(
        fragments: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<String>)>,
    ) -> Self {
        let mut loader = Self::new();
        for (path, content) in fragments {
            loader.add(path, content);
        }
        loader
    }
}

impl FragmentLoader for MemoryLoader {
    fn load(&self, path: &Path) -> Option<String> {
        self.fragments.get(path).cloned()
    }
}

/// Directories searched for a fragment, in priority order.
///
/// 1. The directory containing the template that references the fragment
/// 2. The wizard's declared include directory
/// 3. A fixed directory (sources or outputs), for `source:`/`output:` only
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchPaths<'a> {
    pub template_dir: Option<&'a Path>,
    pub include_dir: Option<&'a Path>,
    pub fixed_dir: Option<&'a Path>,
}

impl<'a> SearchPaths<'a> {
    /// Candidate paths for `file`, first match wins.
    ///
    /// Absolute paths are returned as the only candidate.
    pub fn candidates(&self, file: &str) -> Vec<PathBuf> {
        let file_path = Path::new(file);
        if file_path.is_absolute() {
            return vec![file_path.to_path_buf()];
        }

        [self.template_dir, self.include_dir, self.fixed_dir]
            .into_iter()
            .flatten()
            .map(|dir| dir.join(file_path))
            .collect()
    }

    /// Locate and load `file`, returning the path it was found at.
    pub fn locate(&self, file: &str, loader: &dyn FragmentLoader) -> Option<(PathBuf, String)> {
        self.candidates(file).into_iter().find_map(|candidate| {
            loader
                .load(&candidate)
                .map(|content| (candidate, content))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_follow_search_order() {
        let paths = SearchPaths {
            template_dir: Some(Path::new("/wizards/synth")),
            include_dir: Some(Path::new("/wizards/common")),
            fixed_dir: Some(Path::new("/sources")),
        };
        assert_eq!(
            paths.candidates("osc.tmpl"),
            vec![
                PathBuf::from("/wizards/synth/osc.tmpl"),
                PathBuf::from("/wizards/common/osc.tmpl"),
                PathBuf::from("/sources/osc.tmpl"),
            ]
        );
    }

    #[test]
    fn test_candidates_skip_missing_directories() {
        let paths = SearchPaths {
            template_dir: None,
            include_dir: Some(Path::new("inc")),
            fixed_dir: None,
        };
        assert_eq!(paths.candidates("a.tmpl"), vec![PathBuf::from("inc/a.tmpl")]);
    }

    #[test]
    fn test_absolute_path_is_used_as_is() {
        let paths = SearchPaths {
            template_dir: Some(Path::new("/wizards")),
            ..SearchPaths::default()
        };
        assert_eq!(
            paths.candidates("/elsewhere/x.tmpl"),
            vec![PathBuf::from("/elsewhere/x.tmpl")]
        );
    }

    #[test]
    fn test_first_match_wins() {
        let loader = MemoryLoader::with_fragments([
            ("/common/osc.tmpl", "common"),
            ("/sources/osc.tmpl", "fixed"),
        ]);
        let paths = SearchPaths {
            template_dir: Some(Path::new("/synth")),
            include_dir: Some(Path::new("/common")),
            fixed_dir: Some(Path::new("/sources")),
        };

        let (path, content) = paths.locate("osc.tmpl", &loader).unwrap();
        assert_eq!(path, PathBuf::from("/common/osc.tmpl"));
        assert_eq!(content, "common");
        assert!(paths.locate("missing.tmpl", &loader).is_none());
    }

    #[test]
    fn test_filesystem_loader_missing_file() {
        let loader = FileSystemLoader;
        assert!(
            loader
                .load(Path::new("/definitely/not/here.tmpl"))
                .is_none()
        );
    }
}
