use std::collections::HashSet;

use archiver_core::{ArtifactKind, Extensions, FileNaming, PageId, Placeholders};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

#[test]
fn separators_and_spaces_use_placeholders() {
    let naming = FileNaming::default();

    assert_eq!(
        naming.page_filename(&PageId::from("A/B"), ArtifactKind::Source),
        "A**B.txt"
    );
    assert_eq!(
        naming.page_filename(&PageId::from("C D"), ArtifactKind::Source),
        "C%20D.txt"
    );
}

#[test]
fn each_kind_has_its_own_extension() {
    let naming = FileNaming::default();
    let page = PageId::from("Guide/Start Here");

    assert_eq!(
        naming.page_filename(&page, ArtifactKind::Source),
        "Guide**Start%20Here.txt"
    );
    assert_eq!(
        naming.page_filename(&page, ArtifactKind::RawHtml),
        "Guide**Start%20Here.original.html"
    );
    assert_eq!(
        naming.page_filename(&page, ArtifactKind::CleanedHtml),
        "Guide**Start%20Here.html"
    );
}

#[test]
fn attachments_keep_their_own_extension() {
    let naming = FileNaming::default();
    assert_eq!(
        naming.attachment_filename("inception/Mockups/TOBI 04.png"),
        "inception**Mockups**TOBI%2004.png"
    );
}

#[test]
fn custom_tokens_and_extensions_are_honoured() {
    let naming = FileNaming::new(
        Placeholders {
            slash: "%SLASH%".to_string(),
            space: "_".to_string(),
        },
        Extensions {
            source: ".tracwiki.txt".to_string(),
            ..Extensions::default()
        },
    );
    assert_eq!(
        naming.page_filename(&PageId::from("a/b c"), ArtifactKind::Source),
        "a%SLASH%b_c.tracwiki.txt"
    );
}

#[test]
fn naming_is_deterministic() {
    let naming = FileNaming::default();
    let page = PageId::from("Dev/Release Notes");
    let first = naming.page_filename(&page, ArtifactKind::RawHtml);
    let second = naming.page_filename(&page, ArtifactKind::RawHtml);
    assert_eq!(first, second);
}

#[test]
fn literal_placeholder_in_identifier_is_flagged_and_collides() {
    let naming = FileNaming::default();
    let nested = PageId::from("A/B");
    let literal = PageId::from("A**B");

    assert!(naming.is_ambiguous(literal.as_str()));
    assert!(!naming.is_ambiguous(nested.as_str()));
    assert_eq!(
        naming.page_filename(&nested, ArtifactKind::Source),
        naming.page_filename(&literal, ArtifactKind::Source)
    );
}

proptest! {
    #[test]
    fn naming_is_injective_without_literal_tokens(
        names in prop::collection::hash_set("[A-Za-z0-9/ _.-]{1,24}", 1..40)
    ) {
        let naming = FileNaming::default();
        let filenames: HashSet<String> = names
            .iter()
            .map(|name| naming.page_filename(&PageId::from(name.as_str()), ArtifactKind::Source))
            .collect();
        prop_assert_eq!(filenames.len(), names.len());
    }

    #[test]
    fn flattened_names_never_contain_separators(name in "[A-Za-z0-9/ ]{0,32}") {
        let naming = FileNaming::default();
        let flat = naming.page_filename(&PageId::from(name.as_str()), ArtifactKind::CleanedHtml);
        prop_assert!(!flat.contains('/'));
        prop_assert!(!flat.contains(' '));
    }
}
