/*
 * document.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Output document framing and port block rendering.
//!
//! The document is XML. Template lines are written verbatim between a fixed
//! header and footer; the header always starts the element list with the
//! project element itself.

use quick_xml::escape::escape;

use crate::graph::ConnectionGraph;
use crate::ids::ElementId;

const INDENT: &str = "  ";

/// Escape text for use in element content or attribute values.
pub fn escape_xml(text: &str) -> String {
    escape(text).into_owned()
}

/// Fixed framing around the expanded template lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentFrame {
    pub format_version: u32,
    pub project_id: ElementId,
    pub project_version: i64,
}

impl DocumentFrame {
    /// Lines preceding the template output.
    pub fn header(&self) -> Vec<String> {
        vec![
            r#"<?xml version="1.0" encoding="UTF-8"?>"#.to_string(),
            format!(r#"<wizard-project format-version="{}">"#, self.format_version),
            format!("{}<project>", INDENT),
            format!("{}<elements>", INDENT.repeat(2)),
            format!(
                r#"{}<element id="{}" type="project" version="{}"/>"#,
                INDENT.repeat(3),
                self.project_id,
                self.project_version
            ),
        ]
    }

    /// Lines following the template output.
    pub fn footer(&self) -> Vec<String> {
        vec![
            format!("{}</elements>", INDENT.repeat(2)),
            format!("{}</project>", INDENT),
            "</wizard-project>".to_string(),
        ]
    }

    /// Assemble the complete document around `body`.
    pub fn wrap(&self, body: &[String]) -> String {
        let mut out = String::new();
        for line in self.header().iter().chain(body).chain(self.footer().iter()) {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// Render the port blocks of `element`, one line per entry, each prefixed by
/// `indent`.
///
/// Every port registered against the element gets a block; only outgoing
/// connections are listed inside it.
pub fn render_ports(graph: &ConnectionGraph, element: ElementId, indent: &str) -> Vec<String> {
    let Some(ports) = graph.ports(element) else {
        return Vec::new();
    };

    let mut lines = Vec::new();
    for (port, records) in ports {
        let port = escape_xml(port);
        let outgoing: Vec<_> = records.iter().filter(|r| r.outgoing).collect();
        if outgoing.is_empty() {
            lines.push(format!(r#"{}<port name="{}"/>"#, indent, port));
            continue;
        }

        lines.push(format!(r#"{}<port name="{}">"#, indent, port));
        for record in outgoing {
            lines.push(format!(
                r#"{}{}<connection id="{}">"#,
                indent, INDENT, record.connection
            ));
            lines.push(format!(
                r#"{}{}<target element="{}" port="{}"/>"#,
                indent,
                INDENT.repeat(2),
                record.peer_element,
                escape_xml(&record.peer_port)
            ));
            for (key, value) in &record.properties {
                lines.push(format!(
                    r#"{}{}<property name="{}" value="{}"/>"#,
                    indent,
                    INDENT.repeat(2),
                    escape_xml(key),
                    escape_xml(value)
                ));
            }
            lines.push(format!("{}{}</connection>", indent, INDENT));
        }
        lines.push(format!("{}</port>", indent));
    }
    lines
}
