//! FHIR document Bundle backed by `serde_json::Value`
//!
//! The first entry is the Composition; every other entry is a node addressed by
//! `fullUrl = urn:uuid:<id>`.

use crate::composition;
use crate::error::{DocumentError, Result};
use crate::extension::{self, ensure_array, ensure_object};
use crate::graph::{ConceptRef, DocumentGraph, SectionRef, StatementQuery};
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct BundleDocument {
    bundle: Value,
}

impl BundleDocument {
    /// Start an empty document whose Composition carries `composition_type`.
    pub fn new(composition_type: &ConceptRef<'_>) -> Self {
        let composition_id = Uuid::new_v4().to_string();
        let bundle = json!({
            "resourceType": "Bundle",
            "id": Uuid::new_v4().to_string(),
            "type": "document",
            "identifier": {},
            "entry": [{
                "fullUrl": format!("urn:uuid:{composition_id}"),
                "resource": {
                    "resourceType": "Composition",
                    "id": composition_id,
                    "status": "preliminary",
                    "type": composition_type.to_concept(),
                    "section": []
                }
            }]
        });
        Self { bundle }
    }

    pub fn from_value(bundle: Value) -> Result<Self> {
        let resource_type = bundle
            .get("resourceType")
            .and_then(Value::as_str)
            .unwrap_or("<none>");
        if resource_type != "Bundle" {
            return Err(DocumentError::NotABundle(resource_type.to_string()));
        }
        let document = Self { bundle };
        if document.composition().is_none() {
            return Err(DocumentError::MissingComposition);
        }
        Ok(document)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(text)?)
    }

    pub fn as_value(&self) -> &Value {
        &self.bundle
    }

    pub fn into_value(self) -> Value {
        self.bundle
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.bundle)?)
    }

    fn entries(&self) -> &[Value] {
        self.bundle
            .get("entry")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn entries_mut(&mut self) -> &mut Vec<Value> {
        let slot = ensure_object(&mut self.bundle)
            .entry("entry")
            .or_insert_with(|| Value::Array(Vec::new()));
        ensure_array(slot)
    }

    /// Every resource in the document, Composition included.
    pub fn resources(&self) -> impl Iterator<Item = &Value> {
        self.entries().iter().filter_map(|e| e.get("resource"))
    }

    pub fn composition(&self) -> Option<&Value> {
        self.resources().find(|r| is_type(r, "Composition"))
    }

    fn composition_mut(&mut self) -> Option<&mut Value> {
        self.entries_mut()
            .iter_mut()
            .filter_map(|e| e.get_mut("resource"))
            .find(|r| is_type(r, "Composition"))
    }

    fn position_of(&self, id: &str) -> Option<usize> {
        self.entries().iter().position(|e| {
            e.get("resource")
                .and_then(|r| r.get("id"))
                .and_then(Value::as_str)
                == Some(id)
        })
    }

    fn identifier_node_mut(&mut self) -> &mut Value {
        ensure_object(&mut self.bundle)
            .entry("identifier")
            .or_insert_with(|| json!({}))
    }
}

fn is_type(resource: &Value, resource_type: &str) -> bool {
    resource.get("resourceType").and_then(Value::as_str) == Some(resource_type)
}

impl DocumentGraph for BundleDocument {
    fn resource(&self, id: &str) -> Option<&Value> {
        let idx = self.position_of(id)?;
        self.entries()[idx].get("resource")
    }

    fn resource_mut(&mut self, id: &str) -> Option<&mut Value> {
        let idx = self.position_of(id)?;
        self.entries_mut()[idx].get_mut("resource")
    }

    fn reference_to(&self, id: &str) -> Option<String> {
        let entry = &self.entries()[self.position_of(id)?];
        if let Some(full_url) = entry.get("fullUrl").and_then(Value::as_str) {
            return Some(full_url.to_string());
        }
        let resource_type = entry.get("resource")?.get("resourceType")?.as_str()?;
        Some(format!("{resource_type}/{id}"))
    }

    fn references_to(&self, id: &str) -> Vec<String> {
        let Some(idx) = self.position_of(id) else {
            return Vec::new();
        };
        let entry = &self.entries()[idx];
        let mut references = Vec::new();
        if let Some(full_url) = entry.get("fullUrl").and_then(Value::as_str) {
            references.push(full_url.to_string());
        }
        let uuid_form = format!("urn:uuid:{id}");
        if !references.contains(&uuid_form) {
            references.push(uuid_form);
        }
        if let Some(resource_type) = entry
            .get("resource")
            .and_then(|r| r.get("resourceType"))
            .and_then(Value::as_str)
        {
            references.push(format!("{resource_type}/{id}"));
        }
        references
    }

    fn find_by_profile(&self, profile: &str) -> Option<String> {
        self.resources()
            .find(|r| {
                r.get("meta")
                    .and_then(|m| m.get("profile"))
                    .and_then(Value::as_array)
                    .is_some_and(|profiles| profiles.iter().any(|p| p.as_str() == Some(profile)))
            })
            .and_then(|r| r.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn find_statements(&self, query: &StatementQuery<'_>) -> Vec<String> {
        self.resources()
            .filter(|r| query.matches(r))
            .filter_map(|r| r.get("id").and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }

    fn insert_resource(&mut self, resource: Value) -> Result<String> {
        let id = resource
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or(DocumentError::MissingResourceId)?
            .to_string();
        if self.position_of(&id).is_some() {
            return Err(DocumentError::DuplicateResource(id));
        }
        let resource_type = resource
            .get("resourceType")
            .and_then(Value::as_str)
            .unwrap_or("resource");
        tracing::debug!("Attaching {} {}", resource_type, id);
        self.entries_mut().push(json!({
            "fullUrl": format!("urn:uuid:{id}"),
            "resource": resource
        }));
        Ok(id)
    }

    fn remove_resource(&mut self, id: &str) -> Option<Value> {
        let idx = self.position_of(id)?;
        if self.entries()[idx]
            .get("resource")
            .is_some_and(|r| is_type(r, "Composition"))
        {
            tracing::warn!("Refusing to detach the document Composition {}", id);
            return None;
        }
        tracing::debug!("Detaching {}", id);
        let mut entry = self.entries_mut().remove(idx);
        entry.get_mut("resource").map(Value::take)
    }

    fn section_entries(&self, section_code: &str) -> Vec<String> {
        self.composition()
            .and_then(|c| composition::find_section(c, section_code))
            .map(composition::section_references)
            .unwrap_or_default()
    }

    fn add_section_entry(&mut self, section: &SectionRef<'_>, reference: &str) -> bool {
        let Some(comp) = self.composition_mut() else {
            tracing::warn!("Document has no Composition; cannot index {}", reference);
            return false;
        };
        let section_node = composition::ensure_section(comp, section);
        composition::add_reference(section_node, reference)
    }

    fn remove_section_references(&mut self, reference: &str) -> usize {
        self.composition_mut()
            .map(|c| composition::remove_reference(c, reference))
            .unwrap_or(0)
    }

    fn identifier(&self) -> Option<&str> {
        self.bundle
            .get("identifier")
            .and_then(|i| i.get("value"))
            .and_then(Value::as_str)
    }

    fn set_identifier(&mut self, value: &str) {
        ensure_object(self.identifier_node_mut()).insert("value".to_string(), json!(value));
    }

    fn identifier_extension(&self, url: &str) -> Option<&str> {
        self.bundle
            .get("identifier")
            .and_then(|i| extension::find_extension(i, url))
            .and_then(|ext| ext.get("valueString"))
            .and_then(Value::as_str)
    }

    fn set_identifier_extension(&mut self, url: &str, value: Option<&str>) {
        let identifier = self.identifier_node_mut();
        match value {
            Some(value) => {
                extension::upsert_extension(identifier, url)["valueString"] = json!(value);
            }
            None => {
                extension::remove_extension(identifier, url);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC_TYPE: ConceptRef<'static> = ConceptRef::new("http://loinc.org", "92011-4", "Birth report");

    fn patient(id: &str, profile: &str) -> Value {
        json!({ "resourceType": "Patient", "id": id, "meta": { "profile": [profile] } })
    }

    #[test]
    fn new_document_has_composition_first() {
        let doc = BundleDocument::new(&DOC_TYPE);
        let first = doc.resources().next().unwrap();
        assert_eq!(first["resourceType"], "Composition");
        assert_eq!(first["type"]["coding"][0]["code"], "92011-4");
        assert_eq!(doc.as_value()["type"], "document");
    }

    #[test]
    fn from_value_rejects_other_resources() {
        let err = BundleDocument::from_value(json!({ "resourceType": "Patient" })).unwrap_err();
        assert!(matches!(err, DocumentError::NotABundle(t) if t == "Patient"));

        let err = BundleDocument::from_value(json!({ "resourceType": "Bundle", "entry": [] })).unwrap_err();
        assert!(matches!(err, DocumentError::MissingComposition));
    }

    #[test]
    fn insert_requires_unique_id() {
        let mut doc = BundleDocument::new(&DOC_TYPE);
        assert_eq!(doc.insert_resource(patient("child", "p")).unwrap(), "child");
        assert!(matches!(
            doc.insert_resource(patient("child", "p")),
            Err(DocumentError::DuplicateResource(_))
        ));
        assert!(matches!(
            doc.insert_resource(json!({ "resourceType": "Patient" })),
            Err(DocumentError::MissingResourceId)
        ));
    }

    #[test]
    fn reference_uses_full_url() {
        let mut doc = BundleDocument::new(&DOC_TYPE);
        doc.insert_resource(patient("mom", "p")).unwrap();
        assert_eq!(doc.reference_to("mom").as_deref(), Some("urn:uuid:mom"));
        assert_eq!(doc.reference_to("missing"), None);
    }

    #[test]
    fn references_to_lists_every_form() {
        let mut doc = BundleDocument::new(&DOC_TYPE);
        doc.insert_resource(patient("mom", "p")).unwrap();
        assert_eq!(doc.references_to("mom"), vec!["urn:uuid:mom", "Patient/mom"]);
        assert!(doc.references_to("missing").is_empty());
    }

    #[test]
    fn find_by_profile_picks_tagged_subject() {
        let mut doc = BundleDocument::new(&DOC_TYPE);
        doc.insert_resource(patient("mom", "mother-profile")).unwrap();
        doc.insert_resource(patient("kid", "child-profile")).unwrap();
        assert_eq!(doc.find_by_profile("child-profile").as_deref(), Some("kid"));
        assert_eq!(doc.find_by_profile("father-profile"), None);
    }

    #[test]
    fn composition_cannot_be_removed() {
        let mut doc = BundleDocument::new(&DOC_TYPE);
        let id = doc.composition().unwrap()["id"].as_str().unwrap().to_string();
        assert!(doc.remove_resource(&id).is_none());
        assert!(doc.composition().is_some());
    }

    #[test]
    fn identifier_and_extensions() {
        let mut doc = BundleDocument::new(&DOC_TYPE);
        assert_eq!(doc.identifier(), None);
        doc.set_identifier("2022MA000100");
        doc.set_identifier_extension("cert", Some("100"));
        assert_eq!(doc.identifier(), Some("2022MA000100"));
        assert_eq!(doc.identifier_extension("cert"), Some("100"));

        doc.set_identifier_extension("cert", None);
        assert_eq!(doc.identifier_extension("cert"), None);
        assert_eq!(doc.identifier(), Some("2022MA000100"));
    }

    #[test]
    fn json_round_trip_preserves_document() {
        let mut doc = BundleDocument::new(&DOC_TYPE);
        doc.insert_resource(patient("kid", "child-profile")).unwrap();
        let text = doc.to_json_pretty().unwrap();
        let reparsed = BundleDocument::from_json(&text).unwrap();
        assert_eq!(reparsed, doc);
    }
}
