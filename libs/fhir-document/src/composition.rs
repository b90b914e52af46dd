//! Composition section index
//!
//! Sections are matched by `section.code.coding[].code`. Nested sections are
//! searched when removing references so no dangling reference survives.

use crate::extension::{ensure_array, ensure_object};
use crate::graph::SectionRef;
use serde_json::{json, Value};

fn section_code_matches(section: &Value, code: &str) -> bool {
    section
        .get("code")
        .and_then(|c| c.get("coding"))
        .and_then(Value::as_array)
        .is_some_and(|codings| {
            codings
                .iter()
                .any(|c| c.get("code").and_then(Value::as_str) == Some(code))
        })
}

pub fn sections(composition: &Value) -> &[Value] {
    composition
        .get("section")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

pub fn find_section<'a>(composition: &'a Value, code: &str) -> Option<&'a Value> {
    sections(composition)
        .iter()
        .find(|s| section_code_matches(s, code))
}

/// The section for `section`, appended (empty) if the composition lacks it.
pub fn ensure_section<'a>(composition: &'a mut Value, section: &SectionRef<'_>) -> &'a mut Value {
    let slot = ensure_object(composition)
        .entry("section")
        .or_insert_with(|| Value::Array(Vec::new()));
    let list = ensure_array(slot);
    let idx = match list.iter().position(|s| section_code_matches(s, section.code)) {
        Some(idx) => idx,
        None => {
            tracing::debug!("Creating composition section {}", section.code);
            list.push(json!({
                "title": section.display,
                "code": { "coding": [section.to_coding()] },
                "entry": []
            }));
            list.len() - 1
        }
    };
    &mut list[idx]
}

/// References listed in a single section's `entry`.
pub fn section_references(section: &Value) -> Vec<String> {
    section
        .get("entry")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| e.get("reference").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Append `reference` to the section's entry list unless already present.
pub fn add_reference(section: &mut Value, reference: &str) -> bool {
    let slot = ensure_object(section)
        .entry("entry")
        .or_insert_with(|| Value::Array(Vec::new()));
    let entries = ensure_array(slot);
    let listed = entries
        .iter()
        .any(|e| e.get("reference").and_then(Value::as_str) == Some(reference));
    if listed {
        return false;
    }
    entries.push(json!({ "reference": reference }));
    true
}

/// Remove `reference` from every section (nested ones included).
pub fn remove_reference(composition: &mut Value, reference: &str) -> usize {
    let Some(list) = composition.get_mut("section").and_then(Value::as_array_mut) else {
        return 0;
    };
    let mut removed = 0;
    for section in list.iter_mut() {
        if let Some(entries) = section.get_mut("entry").and_then(Value::as_array_mut) {
            let before = entries.len();
            entries.retain(|e| e.get("reference").and_then(Value::as_str) != Some(reference));
            removed += before - entries.len();
        }
        removed += remove_reference(section, reference);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRENATAL: SectionRef<'static> = SectionRef::new("http://example.org/sections", "prenatal", "Prenatal");

    #[test]
    fn ensure_section_creates_once() {
        let mut composition = json!({ "resourceType": "Composition" });
        ensure_section(&mut composition, &PRENATAL);
        ensure_section(&mut composition, &PRENATAL);

        assert_eq!(sections(&composition).len(), 1);
        let section = find_section(&composition, "prenatal").unwrap();
        assert_eq!(section["title"], "Prenatal");
        assert!(section_references(section).is_empty());
    }

    #[test]
    fn add_reference_is_idempotent() {
        let mut composition = json!({});
        let section = ensure_section(&mut composition, &PRENATAL);
        assert!(add_reference(section, "urn:uuid:a"));
        assert!(!add_reference(section, "urn:uuid:a"));
        assert_eq!(
            section_references(find_section(&composition, "prenatal").unwrap()),
            vec!["urn:uuid:a".to_string()]
        );
    }

    #[test]
    fn remove_reference_walks_nested_sections() {
        let mut composition = json!({
            "section": [
                { "code": { "coding": [{ "code": "a" }] }, "entry": [{ "reference": "urn:uuid:x" }] },
                {
                    "code": { "coding": [{ "code": "b" }] },
                    "entry": [{ "reference": "urn:uuid:y" }],
                    "section": [
                        { "code": { "coding": [{ "code": "c" }] }, "entry": [{ "reference": "urn:uuid:x" }] }
                    ]
                }
            ]
        });

        assert_eq!(remove_reference(&mut composition, "urn:uuid:x"), 2);
        assert!(section_references(find_section(&composition, "a").unwrap()).is_empty());
        assert_eq!(
            section_references(find_section(&composition, "b").unwrap()),
            vec!["urn:uuid:y".to_string()]
        );
        assert_eq!(remove_reference(&mut composition, "urn:uuid:x"), 0);
    }
}
