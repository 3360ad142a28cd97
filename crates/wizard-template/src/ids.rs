/*
 * ids.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The identifier table.
//!
//! Elements and connections in the output document refer to each other by
//! small integers. The table hands them out in increasing order and memoizes
//! them by fully qualified name, so every mention of the same scoped name gets
//! the same identifier.

use std::collections::HashMap;

/// Identifier of an element or connection in the output document.
pub type ElementId = u32;

/// Memoizing identifier allocator.
#[derive(Debug, Clone)]
pub struct IdentifierTable {
    next: ElementId,
    named: HashMap<String, ElementId>,
}

impl Default for IdentifierTable {
    fn default() -> Self {
        Self {
            next: 1,
            named: HashMap::new(),
        }
    }
}

impl IdentifierTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an identifier that is never handed out again.
    pub fn fresh(&mut self) -> ElementId {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Identifier for a qualified name, allocating it on first use.
    ///
    /// An empty name always allocates a fresh identifier.
    pub fn require(&mut self, qualified: &str) -> ElementId {
        if qualified.is_empty() {
            return self.fresh();
        }
        if let Some(id) = self.named.get(qualified) {
            return *id;
        }
        let id = self.fresh();
        self.named.insert(qualified.to_string(), id);
        id
    }

    /// Identifier previously allocated for a qualified name.
    pub fn get(&self, qualified: &str) -> Option<ElementId> {
        self.named.get(qualified).copied()
    }

    /// Number of identifiers allocated so far, named or not.
    pub fn allocated(&self) -> usize {
        (self.next - 1) as usize
    }

    /// Qualify a resolved name for lookup.
    ///
    /// `minor` is appended as a final segment. Names are prefixed with the
    /// owning wizard pass (`#<scope>.`) unless they are empty or already carry
    /// a prefix.
    pub fn qualify(name: &str, minor: Option<&str>, wizard_scope: u32) -> String {
        if name.is_empty() {
            return String::new();
        }
        let name = match minor {
            Some(minor) if !minor.is_empty() => format!("{}.{}", name, minor),
            _ => name.to_string(),
        };
        if name.starts_with('#') {
            name
        } else {
            format!("#{}.{}", wizard_scope, name)
        }
    }
}
