/*
 * graph.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The connection graph built by `connect` directives.
//!
//! Connections are stored from both ends: an outgoing record at the source
//! (element, port) and an incoming record at the target (element, port), both
//! carrying the same connection identifier. Ports keep the order in which
//! they were first connected.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::ids::ElementId;

/// One end's view of a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionRecord {
    pub connection: ElementId,
    pub peer_element: ElementId,
    pub peer_port: String,
    pub outgoing: bool,
    pub properties: IndexMap<String, String>,
}

/// Ports of one element with their connection records.
pub type PortMap = IndexMap<String, Vec<ConnectionRecord>>;

/// Element to port to connection records.
#[derive(Debug, Clone, Default)]
pub struct ConnectionGraph {
    elements: HashMap<ElementId, PortMap>,
    connections: usize,
}

impl ConnectionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a connection from `(source, source_port)` to `(target, target_port)`.
    pub fn connect(
        &mut self,
        (source, source_port): (ElementId, &str),
        (target, target_port): (ElementId, &str),
        connection: ElementId,
        properties: impl IntoIterator<Item = (String, String)>,
    ) {
        let properties: IndexMap<String, String> = properties.into_iter().collect();

        self.records_mut(source, source_port).push(ConnectionRecord {
            connection,
            peer_element: target,
            peer_port: target_port.to_string(),
            outgoing: true,
            properties: properties.clone(),
        });
        self.records_mut(target, target_port).push(ConnectionRecord {
            connection,
            peer_element: source,
            peer_port: source_port.to_string(),
            outgoing: false,
            properties,
        });
        self.connections += 1;
    }

    fn records_mut(&mut self, element: ElementId, port: &str) -> &mut Vec<ConnectionRecord> {
        self.elements
            .entry(element)
            .or_default()
            .entry(port.to_string())
            .or_default()
    }

    /// Ports registered against an element, in first-connection order.
    pub fn ports(&self, element: ElementId) -> Option<&PortMap> {
        self.elements.get(&element)
    }

    /// Records at one (element, port), both directions.
    pub fn records(&self, element: ElementId, port: &str) -> &[ConnectionRecord] {
        self.elements
            .get(&element)
            .and_then(|ports| ports.get(port))
            .map_or(&[][..], Vec::as_slice)
    }

    /// Number of `connect` directives recorded.
    pub fn connection_count(&self) -> usize {
        self.connections
    }
}
