/*
 * expansion_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * End-to-end tests for wizard expansion using test fixtures.
 */

use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use wizard_template::{
    EngineConfig, ExpandError, Expander, Intermediate, MemoryHost, MemoryLoader, Phase,
    SourceRegistration, WizardTemplate,
};

/// Helper to get the path to test fixtures
fn fixture_path(name: &str) -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir).join("test-fixtures").join(name)
}

/// Helper to load a wizard's answers from fixtures
fn load_host(name: &str) -> MemoryHost {
    let path = fixture_path(name);
    let json = std::fs::read_to_string(&path)
        .unwrap_or_else(|_| panic!("Failed to read answers: {}", name));
    serde_json::from_str(&json).unwrap_or_else(|e| panic!("Invalid answers {}: {}", name, e))
}

fn load_template(name: &str) -> WizardTemplate {
    WizardTemplate::from_file(fixture_path(name))
        .unwrap_or_else(|_| panic!("Failed to load template: {}", name))
}

fn synth_config() -> EngineConfig {
    EngineConfig::default().with_outputs_dir(fixture_path("synth/outputs"))
}

fn buffer_lines(expander: &Expander) -> Vec<String> {
    expander
        .intermediate()
        .iter()
        .map(ToString::to_string)
        .collect()
}

#[test]
fn test_synth_pass_one_buffer() {
    let host = load_host("synth/answers.json");
    let mut expander = Expander::new(synth_config());
    expander
        .append_wizard(&host, &load_template("synth/main.tmpl"))
        .unwrap();

    assert_eq!(
        buffer_lines(&expander),
        vec![
            "      <!-- Lead &amp; Bass -->",
            r#"      <element id="2" type="oscillator" wave="saw">"#,
            "        [ports:#2]",
            "      </element>",
            r#"      <element id="5" type="oscillator" wave="square">"#,
            "        [ports:#5]",
            "      </element>",
            r#"      <element id="6" type="detune" amount="7"/>"#,
            r#"      <element id="3" type="mixer">"#,
            "        [ports:#3]",
            "      </element>",
        ]
    );
    assert_eq!(expander.phase(), Phase::Pass1Done);
}

#[test]
fn test_once_guard_includes_fragment_once() {
    let host = load_host("synth/answers.json");
    let mut expander = Expander::new(synth_config());
    expander
        .append_wizard(&host, &load_template("synth/main.tmpl"))
        .unwrap();

    let comments = buffer_lines(&expander)
        .iter()
        .filter(|line| line.contains("<!--"))
        .count();
    assert_eq!(comments, 1);
}

#[test]
fn test_missing_include_is_skipped_silently() {
    let host = MemoryHost::new(1);
    let mut expander = Expander::new(EngineConfig::default());
    expander
        .append_wizard(
            &host,
            &WizardTemplate::from_source("before\n[include:no-such-fragment.tmpl]\nafter")
                .with_path(fixture_path("synth/inline.tmpl")),
        )
        .unwrap();

    assert_eq!(buffer_lines(&expander), vec!["before", "after"]);
}

#[test]
fn test_loop_allocates_one_id_per_item() {
    let host = MemoryHost::new(1).with_loop("item", ["a", "b"]);
    let mut expander = Expander::with_loader(EngineConfig::default(), MemoryLoader::new());
    expander
        .append_wizard(
            &host,
            &WizardTemplate::from_source("[each:item]\n[id:item]\n[endeach:item]"),
        )
        .unwrap();

    let lines = buffer_lines(&expander);
    assert_eq!(lines.len(), 2);
    assert_ne!(lines[0], lines[1]);
    assert!(lines.iter().all(|line| !line.contains("each")));
    assert_eq!(expander.identifiers().get("#1.a"), Some(2));
    assert_eq!(expander.identifiers().get("#1.b"), Some(3));
}

#[test]
fn test_loop_index_is_zero_based() {
    let host = MemoryHost::new(1).with_loop("item", ["x", "y", "z"]);
    let mut expander = Expander::with_loader(EngineConfig::default(), MemoryLoader::new());
    expander
        .append_wizard(
            &host,
            &WizardTemplate::from_source(
                "[each:item]\n[if:item.index=1]\nsecond\n[else:]\n[index:item]\n[endif:]\n[endeach:item]",
            ),
        )
        .unwrap();

    assert_eq!(buffer_lines(&expander), vec!["0", "second", "2"]);
}

#[test]
fn test_exactly_one_branch_is_emitted() {
    let template = WizardTemplate::from_source(
        "[if:mode=a|mode=b]\nfirst\n[elseif:mode=c]\nsecond\n[else:]\nthird\n[endif:]",
    );
    for (mode, expected) in [("a", "first"), ("b", "first"), ("c", "second"), ("d", "third")] {
        let host = MemoryHost::new(1).with_field("mode", mode);
        let mut expander = Expander::with_loader(EngineConfig::default(), MemoryLoader::new());
        expander.append_wizard(&host, &template).unwrap();
        assert_eq!(buffer_lines(&expander), vec![expected], "mode = {}", mode);
    }
}

#[test]
fn test_nested_loop_variable_gives_one_id_per_item() {
    let host = MemoryHost::new(1)
        .with_loop("rows", ["r0", "r1"])
        .with_loop("r0.cells", ["r0.c0", "r0.c1"])
        .with_loop("r1.cells", ["r1.c0"])
        .with_field("r0.c0.x", "A")
        .with_field("r0.c1.x", "B")
        .with_field("r1.c0.x", "C");
    let mut expander = Expander::with_loader(EngineConfig::default(), MemoryLoader::new());
    expander
        .append_wizard(
            &host,
            &WizardTemplate::from_source(
                "[each:rows]\n[each:rows.cells]\n<cell id=\"[id:rows.cells]\" x=\"[value:rows.cells.x]\"/>\n[endeach:rows.cells]\n[endeach:rows]",
            ),
        )
        .unwrap();

    assert_eq!(
        buffer_lines(&expander),
        vec![
            r#"<cell id="2" x="A"/>"#,
            r#"<cell id="3" x="B"/>"#,
            r#"<cell id="4" x="C"/>"#,
        ]
    );
    assert_eq!(expander.identifiers().get("#1.r1.c0"), Some(4));
}

#[test]
fn test_directive_arguments_are_not_escaped_twice() {
    let host = MemoryHost::new(1).with_field("label", "Lead & Bass");
    let mut expander = Expander::with_loader(EngineConfig::default(), MemoryLoader::new());
    expander
        .append_wizard(
            &host,
            &WizardTemplate::from_source(
                "<element id=\"[id:osc]\" label=\"[value:label]\">\n  [connect:osc#out>mixer#in:label=[value:label]]\n  [ports:osc]\n</element>",
            ),
        )
        .unwrap();
    let document = expander.finish(&host).unwrap();

    assert!(document.contains(r#"<element id="2" label="Lead &amp; Bass">"#));
    assert!(document.contains(r#"<property name="label" value="Lead &amp; Bass"/>"#));
    assert!(!document.contains("&amp;amp;"));
}

#[test]
fn test_connection_is_recorded_at_both_ends() {
    let host = MemoryHost::new(1);
    let mut expander = Expander::with_loader(EngineConfig::default(), MemoryLoader::new());
    expander
        .append_wizard(
            &host,
            &WizardTemplate::from_source("[connect:a#p>b#q]\n[ports:a]\n[ports:b]"),
        )
        .unwrap();

    let graph = expander.connections();
    let a = expander.identifiers().get("#1.a").unwrap();
    let b = expander.identifiers().get("#1.b").unwrap();
    let outgoing = graph.records(a, "p");
    let incoming = graph.records(b, "q");
    assert_eq!(outgoing.len(), 1);
    assert_eq!(incoming.len(), 1);
    assert!(outgoing[0].outgoing);
    assert!(!incoming[0].outgoing);
    assert_eq!(outgoing[0].connection, incoming[0].connection);
    let connection = outgoing[0].connection;

    let document = expander.finish(&host).unwrap();
    assert!(document.contains(&format!(
        "<port name=\"p\">\n  <connection id=\"{}\">\n    <target element=\"{}\" port=\"q\"/>",
        connection, b
    )));
    assert!(document.contains("<port name=\"q\"/>"));
}

#[test]
fn test_later_pass_reuses_element_through_source_reference() {
    let mut expander = Expander::with_loader(EngineConfig::default(), MemoryLoader::new());

    let first = MemoryHost::new(1);
    expander
        .append_wizard(
            &first,
            &WizardTemplate::from_source("[id:X]\n[connect:X#out>Y#in=c1]\n[ports:X]"),
        )
        .unwrap();
    let x = expander.identifiers().get("#1.X").unwrap();

    let second = MemoryHost::new(2)
        .with_field("test.element", "#1.X")
        .with_source(
            "test",
            SourceRegistration {
                primary_field: "test.element".to_string(),
                is_reference: true,
                ..Default::default()
            },
        );
    expander
        .append_wizard(&second, &WizardTemplate::from_source("[id:source.test]"))
        .unwrap();

    assert_eq!(
        expander.intermediate().last(),
        Some(&Intermediate::Text(x.to_string()))
    );
}

#[test]
fn test_two_wizard_document() {
    let synth = load_host("synth/answers.json");
    let effects = load_host("synth/effects.json");

    let mut expander = Expander::new(synth_config());
    expander
        .append_wizard(&synth, &load_template("synth/main.tmpl"))
        .unwrap();
    expander
        .append_wizard(
            &effects,
            &load_template("synth/effects.tmpl").with_include_dir(fixture_path("synth/shared")),
        )
        .unwrap();
    let document = expander.finish(&synth).unwrap();

    insta::assert_snapshot!(document, @r#"
    <?xml version="1.0" encoding="UTF-8"?>
    <wizard-project format-version="1">
      <project>
        <elements>
          <element id="1" type="project" version="3"/>
          <!-- Lead &amp; Bass -->
          <element id="2" type="oscillator" wave="saw">
            <port name="out">
              <connection id="4">
                <target element="3" port="in.0"/>
                <property name="level" value="0"/>
              </connection>
            </port>
          </element>
          <element id="5" type="oscillator" wave="square">
            <port name="out">
              <connection id="7">
                <target element="3" port="in.1"/>
                <property name="level" value="7"/>
              </connection>
            </port>
          </element>
          <element id="6" type="detune" amount="7"/>
          <element id="3" type="mixer">
            <port name="in.0"/>
            <port name="in.1"/>
            <port name="send">
              <connection id="9">
                <target element="8" port="in"/>
              </connection>
            </port>
          </element>
          <!-- effects for Main -->
          <element id="8" type="reverb" size="large"/>
        </elements>
      </project>
    </wizard-project>
    "#);
}

#[test]
fn test_finish_project_writes_document() {
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("synth.xml");

    let host = load_host("synth/answers.json");
    let mut expander = Expander::new(synth_config());
    expander
        .append_wizard(&host, &load_template("synth/main.tmpl"))
        .unwrap();
    expander.finish_project(&host, &destination).unwrap();

    let written = std::fs::read_to_string(&destination).unwrap();
    assert!(written.starts_with("<?xml"));
    assert!(written.ends_with("</wizard-project>\n"));
    assert!(!dir.path().join("synth.xml.partial").exists());
    assert_eq!(expander.phase(), Phase::Finished);
}

#[test]
fn test_finish_project_reports_unwritable_destination() {
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("no-such-dir").join("synth.xml");

    let host = MemoryHost::new(1);
    let mut expander = Expander::new(EngineConfig::default());
    expander
        .append_wizard(&host, &WizardTemplate::from_source("<element/>"))
        .unwrap();
    let err = expander.finish_project(&host, &destination).unwrap_err();

    match err {
        ExpandError::WriteDocument { path, .. } => assert_eq!(path, destination),
        other => panic!("unexpected error: {}", other),
    }
    assert!(!destination.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
