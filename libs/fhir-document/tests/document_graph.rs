//! Exercises `BundleDocument` only through the `DocumentGraph` trait, the way the
//! record primitives use it.

use serde_json::{json, Value};
use vitalis_document::{
    BundleDocument, ConceptRef, DocumentError, DocumentGraph, ResourceKind, SectionRef,
    StatementQuery,
};

const DOC_TYPE: ConceptRef<'static> = ConceptRef::new("http://loinc.org", "92011-4", "Birth report");
const NEWBORN: SectionRef<'static> =
    SectionRef::new("http://example.org/sections", "newborn-information", "Newborn");

fn observation(id: &str, code: &str, subject: &str) -> Value {
    json!({
        "resourceType": "Observation",
        "id": id,
        "status": "final",
        "code": { "coding": [{ "system": "http://loinc.org", "code": code }] },
        "subject": { "reference": subject }
    })
}

/// Attach, index, then fully detach a statement.
fn attach_and_detach<G: DocumentGraph + ?Sized>(graph: &mut G, resource: Value) {
    let id = graph.insert_resource(resource).unwrap();
    let reference = graph.reference_to(&id).unwrap();
    assert!(graph.add_section_entry(&NEWBORN, &reference));
    assert!(!graph.add_section_entry(&NEWBORN, &reference));
    assert_eq!(graph.section_entries(NEWBORN.code), vec![reference.clone()]);

    assert_eq!(graph.remove_section_references(&reference), 1);
    assert!(graph.remove_resource(&id).is_some());
    assert!(graph.resource(&id).is_none());
    assert!(graph.section_entries(NEWBORN.code).is_empty());
}

#[test]
fn trait_object_lifecycle() {
    let mut doc = BundleDocument::new(&DOC_TYPE);
    let graph: &mut dyn DocumentGraph = &mut doc;
    attach_and_detach(graph, observation("obs-1", "76689-9", "urn:uuid:kid"));
    assert_eq!(doc.resources().count(), 1);
}

#[test]
fn statements_are_found_by_code_and_subject() {
    let mut doc = BundleDocument::new(&DOC_TYPE);
    doc.insert_resource(observation("a", "76689-9", "urn:uuid:kid")).unwrap();
    doc.insert_resource(observation("b", "76689-9", "urn:uuid:mom")).unwrap();
    doc.insert_resource(observation("c", "8665-2", "urn:uuid:mom")).unwrap();

    let query = StatementQuery {
        kind: ResourceKind::Measurement,
        category: None,
        code: "76689-9",
        subject: "urn:uuid:mom",
        outcome: None,
    };
    assert_eq!(doc.find_statements(&query), vec!["b".to_string()]);
}

#[test]
fn loaded_document_keeps_nested_sections_consistent() {
    let text = json!({
        "resourceType": "Bundle",
        "type": "document",
        "entry": [
            { "fullUrl": "urn:uuid:comp", "resource": {
                "resourceType": "Composition", "id": "comp",
                "section": [{
                    "code": { "coding": [{ "code": "parent" }] },
                    "section": [{
                        "code": { "coding": [{ "code": "child" }] },
                        "entry": [{ "reference": "urn:uuid:x" }]
                    }]
                }]
            }},
            { "fullUrl": "urn:uuid:x", "resource": observation("x", "1-1", "urn:uuid:kid") }
        ]
    })
    .to_string();
    let mut doc = BundleDocument::from_json(&text).unwrap();

    assert_eq!(doc.remove_section_references("urn:uuid:x"), 1);
    let nested = &doc.composition().unwrap()["section"][0]["section"][0];
    assert!(nested["entry"].as_array().unwrap().is_empty());
    assert!(doc.resource("x").is_some());
}

#[test]
fn malformed_json_is_reported() {
    assert!(matches!(
        BundleDocument::from_json("{ not json"),
        Err(DocumentError::Json(_))
    ));
}
