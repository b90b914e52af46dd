//! Graph-manipulation seam used by the record primitives
//!
//! The primitives never touch a concrete document type directly. They go through
//! [`DocumentGraph`], which exposes node lookup by category + code + subject,
//! resource attach/detach and the composition's section index.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vitalis_models::{CodeableConcept, Coding};

/// Statement node types a clinical entry can be backed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Finding,
    Procedure,
    Measurement,
}

impl ResourceKind {
    pub fn resource_type(self) -> &'static str {
        match self {
            ResourceKind::Finding => "Condition",
            ResourceKind::Procedure => "Procedure",
            ResourceKind::Measurement => "Observation",
        }
    }

    /// `Procedure.category` is a single CodeableConcept; the others are lists.
    pub fn category_is_list(self) -> bool {
        !matches!(self, ResourceKind::Procedure)
    }

    /// Status assigned to freshly created statements.
    pub fn initial_status(self) -> Option<&'static str> {
        match self {
            ResourceKind::Finding => None,
            ResourceKind::Procedure => Some("completed"),
            ResourceKind::Measurement => Some("final"),
        }
    }
}

/// A borrowed (system, code, display) triple, usable in `const` tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConceptRef<'a> {
    pub system: &'a str,
    pub code: &'a str,
    pub display: &'a str,
}

impl<'a> ConceptRef<'a> {
    pub const fn new(system: &'a str, code: &'a str, display: &'a str) -> Self {
        Self {
            system,
            code,
            display,
        }
    }

    pub fn to_coding(&self) -> Coding {
        Coding::new(self.system, self.code, self.display)
    }

    pub fn to_concept(&self) -> CodeableConcept {
        CodeableConcept::from_coding(self.to_coding())
    }
}

/// A composition section, identified by its code.
pub type SectionRef<'a> = ConceptRef<'a>;

/// Locator for statement nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementQuery<'a> {
    pub kind: ResourceKind,
    pub category: Option<&'a str>,
    pub code: &'a str,
    /// Reference string of the subject node (e.g. `urn:uuid:...`)
    pub subject: &'a str,
    pub outcome: Option<&'a str>,
}

impl StatementQuery<'_> {
    /// Whether `resource` is a statement this query selects.
    pub fn matches(&self, resource: &Value) -> bool {
        if resource.get("resourceType").and_then(Value::as_str) != Some(self.kind.resource_type())
        {
            return false;
        }
        if !concept_has_code(resource.get("code"), self.code) {
            return false;
        }
        if let Some(category) = self.category {
            let found = match resource.get("category") {
                Some(Value::Array(items)) => items.iter().any(|c| concept_has_code(Some(c), category)),
                other => concept_has_code(other, category),
            };
            if !found {
                return false;
            }
        }
        let subject = resource
            .get("subject")
            .and_then(|s| s.get("reference"))
            .and_then(Value::as_str);
        if subject != Some(self.subject) {
            return false;
        }
        match self.outcome {
            Some(outcome) => concept_has_code(resource.get("outcome"), outcome),
            None => true,
        }
    }
}

fn concept_has_code(concept: Option<&Value>, code: &str) -> bool {
    concept
        .and_then(|c| c.get("coding"))
        .and_then(Value::as_array)
        .is_some_and(|codings| {
            codings
                .iter()
                .any(|c| c.get("code").and_then(Value::as_str) == Some(code))
        })
}

/// Host document model the mapping primitives read and write through.
pub trait DocumentGraph {
    /// Look up a node by logical id.
    fn resource(&self, id: &str) -> Option<&Value>;

    fn resource_mut(&mut self, id: &str) -> Option<&mut Value>;

    /// Reference string other nodes use to point at `id`.
    fn reference_to(&self, id: &str) -> Option<String>;

    /// Every reference form that resolves to `id` (`urn:uuid:<id>`, `<Type>/<id>`).
    fn references_to(&self, id: &str) -> Vec<String>;

    /// First node whose `meta.profile` lists `profile`.
    fn find_by_profile(&self, profile: &str) -> Option<String>;

    /// Ids of every statement node selected by `query`, in document order.
    fn find_statements(&self, query: &StatementQuery<'_>) -> Vec<String>;

    /// Attach a node. The node must carry an `id` not already in use.
    fn insert_resource(&mut self, resource: Value) -> Result<String>;

    /// Detach a node, returning it.
    fn remove_resource(&mut self, id: &str) -> Option<Value>;

    /// References listed by the section with `section_code`.
    fn section_entries(&self, section_code: &str) -> Vec<String>;

    /// Append `reference` to `section`, creating the section when needed.
    /// Returns `false` when the reference was already listed.
    fn add_section_entry(&mut self, section: &SectionRef<'_>, reference: &str) -> bool;

    /// Remove `reference` from every section that lists it. Returns the number removed.
    fn remove_section_references(&mut self, reference: &str) -> usize;

    /// The document's top-level identifier value.
    fn identifier(&self) -> Option<&str>;

    fn set_identifier(&mut self, value: &str);

    /// String annotation on the top-level identifier.
    fn identifier_extension(&self, url: &str) -> Option<&str>;

    /// Set (or with `None`, remove) a string annotation on the top-level identifier.
    fn set_identifier_extension(&mut self, url: &str, value: Option<&str>);
}
