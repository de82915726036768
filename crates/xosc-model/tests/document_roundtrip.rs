//! Serialization stability of parsed documents

use proptest::prelude::*;
use xosc_model::{ContentHash, Element, EntityKind, NodeKind, ScenarioDocument, XmlTree};

const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<OpenSCENARIO>
  <!-- header -->
  <FileHeader revMajor="1" revMinor="0" description="a &amp; b"/>
  <Entities>
    <ScenarioObject name="ego_vehicle"><Vehicle name="car"/></ScenarioObject>
    <ScenarioObject nameRef="prop"><MiscObject name="box"/></ScenarioObject>
  </Entities>
</OpenSCENARIO>
"#;

#[test]
fn sample_keeps_comments_and_escapes() {
    let doc = ScenarioDocument::parse(SAMPLE).unwrap();
    let xml = doc.to_xml().unwrap();
    assert!(xml.contains("<!-- header -->"));
    assert!(xml.contains(r#"description="a &amp; b""#));
    assert_eq!(ScenarioDocument::parse(&xml).unwrap(), doc);
    assert_eq!(doc.entity("prop").map(|e| e.kind), Some(EntityKind::Misc));
}

#[test]
fn hash_ignores_surrounding_whitespace() {
    assert_eq!(
        ContentHash::of_text(SAMPLE),
        ContentHash::of_text(&format!("\n\n{SAMPLE}  "))
    );
    assert_ne!(
        ContentHash::of_text(SAMPLE),
        ContentHash::of_text(&SAMPLE.replace("header", "footer"))
    );
}

proptest! {
    #[test]
    fn attribute_and_text_values_survive(value in "[ -~]{0,24}", text in "[a-zA-Z0-9<>&\"' ]{1,24}") {
        let mut tree = XmlTree::new(Element::new("OpenSCENARIO"));
        let root = tree.root();
        let child = tree.append_element(root, Element::new("FileHeader").with_attr("description", value.clone()));
        tree.append(child, NodeKind::Text(text.clone()));
        let doc = ScenarioDocument::from_tree(tree).unwrap();
        let again = ScenarioDocument::parse(&doc.to_xml().unwrap()).unwrap();
        let header = again.tree().first_child_named(again.tree().root(), "FileHeader").unwrap();
        prop_assert_eq!(again.tree().attr(header, "description"), Some(value.as_str()));
        prop_assert_eq!(again, doc);
    }
}
