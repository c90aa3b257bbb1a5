use std::fs;

use archiver_core::{ConfigError, DefaultPageSet, PageId};
use tempfile::TempDir;

const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<tracwikiwords>
  <tracwikiword name="WikiStart"/>
  <tracwikiword name="TitleIndex"></tracwikiword>
  <group>
    <tracwikiword name="TracGuide"/>
  </group>
</tracwikiwords>
"#;

#[test]
fn parses_names_at_any_depth() {
    let set = DefaultPageSet::parse_xml(SAMPLE).unwrap();
    assert_eq!(set.len(), 3);
    assert!(set.contains(&PageId::from("WikiStart")));
    assert!(set.contains(&PageId::from("TitleIndex")));
    assert!(set.contains(&PageId::from("TracGuide")));
    assert!(!set.contains(&PageId::from("wikistart")));
}

#[test]
fn any_within_matches_substrings() {
    let set = DefaultPageSet::parse_xml(SAMPLE).unwrap();
    assert!(set.any_within("/tobi/wiki/TitleIndex"));
    assert!(!set.any_within("/tobi/wiki/TobiPage"));
}

#[test]
fn load_reads_from_disk() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("defaults.xml");
    fs::write(&path, SAMPLE).unwrap();

    let set = DefaultPageSet::load(&path).unwrap();
    assert_eq!(set.len(), 3);
}

#[test]
fn missing_file_is_a_config_error() {
    let temp = TempDir::new().unwrap();
    let err = DefaultPageSet::load(&temp.path().join("absent.xml")).unwrap_err();
    assert!(matches!(err, ConfigError::Unreadable { .. }));
}

#[test]
fn element_without_name_is_malformed() {
    let err = DefaultPageSet::parse_xml("<list><tracwikiword/></list>").unwrap_err();
    assert!(matches!(err, ConfigError::Malformed { .. }));
}

#[test]
fn broken_markup_is_malformed() {
    let err = DefaultPageSet::parse_xml("<list><tracwikiword name=\"A\"></other></list>")
        .unwrap_err();
    assert!(matches!(err, ConfigError::Malformed { .. }));

    let err = DefaultPageSet::parse_xml("<list><tracwikiword name=\"A\"/>").unwrap_err();
    assert!(matches!(err, ConfigError::Malformed { .. }));
}

#[test]
fn empty_document_is_malformed() {
    let err = DefaultPageSet::parse_xml("   ").unwrap_err();
    assert!(err.to_string().contains("no root element"));
}
