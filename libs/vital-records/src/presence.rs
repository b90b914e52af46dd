//! Clinical entry presence engine
//!
//! A boolean field maps to the existence of one tagged statement about one
//! subject. Creating a statement attaches it before it is linked from its section;
//! removing one unlinks it from every section before detaching it.
//!
//! The ensure/remove helpers here also back coded and timed observation fields,
//! which create their statement on first write.

use crate::error::{Error, Result};
use crate::subject::SubjectRole;
use serde_json::{json, Map, Value};
use tracing::debug;
use uuid::Uuid;
use vitalis_document::{ConceptRef, DocumentGraph, ResourceKind, SectionRef, StatementQuery};

/// Everything needed to find or build one statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryLocator<'a> {
    pub kind: ResourceKind,
    pub category: Option<ConceptRef<'a>>,
    pub code: ConceptRef<'a>,
    pub section: SectionRef<'a>,
    pub subject: SubjectRole,
    /// Distinguishes variants sharing a code (successful vs. unsuccessful, ...)
    pub outcome: Option<ConceptRef<'a>>,
    /// Profile stamped on newly created statements
    pub profile: Option<&'a str>,
}

impl<'a> EntryLocator<'a> {
    /// Re-target the locator at the subject with role `code` (e.g. `"MTH"`).
    pub fn with_role_code(self, code: &str) -> Result<Self> {
        Ok(Self {
            subject: SubjectRole::from_code(code)?,
            ..self
        })
    }

    pub fn query<'q>(&'q self, subject: &'q str) -> StatementQuery<'q> {
        StatementQuery {
            kind: self.kind,
            category: self.category.as_ref().map(|c| c.code),
            code: self.code.code,
            subject,
            outcome: self.outcome.as_ref().map(|o| o.code),
        }
    }

    fn new_statement(&self, id: &str, subject: &str) -> Value {
        let mut resource = Map::new();
        resource.insert("resourceType".into(), json!(self.kind.resource_type()));
        resource.insert("id".into(), json!(id));
        if let Some(profile) = self.profile {
            resource.insert("meta".into(), json!({ "profile": [profile] }));
        }
        if let Some(status) = self.kind.initial_status() {
            resource.insert("status".into(), json!(status));
        }
        if let Some(category) = &self.category {
            let concept = category.to_concept().to_value();
            let category = if self.kind.category_is_list() {
                json!([concept])
            } else {
                concept
            };
            resource.insert("category".into(), category);
        }
        resource.insert("code".into(), self.code.to_concept().to_value());
        resource.insert("subject".into(), json!({ "reference": subject }));
        if let Some(outcome) = &self.outcome {
            resource.insert("outcome".into(), outcome.to_concept().to_value());
        }
        Value::Object(resource)
    }
}

/// Reference string of the anchor node for `role`, if the document has one.
pub fn subject_reference<G: DocumentGraph + ?Sized>(graph: &G, role: SubjectRole) -> Option<String> {
    let id = graph.find_by_profile(role.profile())?;
    graph.reference_to(&id)
}

/// Id of the anchor node for `role`.
pub fn subject_id<G: DocumentGraph + ?Sized>(graph: &G, role: SubjectRole) -> Result<String> {
    graph
        .find_by_profile(role.profile())
        .ok_or(Error::MissingSubject(role))
}

/// Ids of every statement the locator selects. Empty when the subject is missing.
pub fn find_entries<G: DocumentGraph + ?Sized>(graph: &G, locator: &EntryLocator<'_>) -> Vec<String> {
    match subject_reference(graph, locator.subject) {
        Some(subject) => graph.find_statements(&locator.query(&subject)),
        None => Vec::new(),
    }
}

pub fn find_entry<G: DocumentGraph + ?Sized>(graph: &G, locator: &EntryLocator<'_>) -> Option<String> {
    find_entries(graph, locator).into_iter().next()
}

pub fn exists<G: DocumentGraph + ?Sized>(graph: &G, locator: &EntryLocator<'_>) -> bool {
    !find_entries(graph, locator).is_empty()
}

/// Return the statement for `locator`, creating and indexing it when absent.
/// The flag is `true` when the statement was created.
pub fn ensure_entry<G: DocumentGraph + ?Sized>(
    graph: &mut G,
    locator: &EntryLocator<'_>,
) -> Result<(String, bool)> {
    let subject = subject_reference(graph, locator.subject).ok_or(Error::MissingSubject(locator.subject))?;
    if let Some(id) = graph.find_statements(&locator.query(&subject)).into_iter().next() {
        return Ok((id, false));
    }

    let id = Uuid::new_v4().to_string();
    let id = graph.insert_resource(locator.new_statement(&id, &subject))?;
    let reference = graph
        .reference_to(&id)
        .unwrap_or_else(|| format!("urn:uuid:{id}"));
    graph.add_section_entry(&locator.section, &reference);
    debug!(
        "Created {} {} for {} in section {}",
        locator.kind.resource_type(),
        locator.code.code,
        locator.subject,
        locator.section.code
    );
    Ok((id, true))
}

/// Unlink and detach every statement the locator selects. Returns how many were removed.
pub fn remove_entries<G: DocumentGraph + ?Sized>(graph: &mut G, locator: &EntryLocator<'_>) -> usize {
    let ids = find_entries(graph, locator);
    for id in &ids {
        for reference in graph.references_to(id) {
            graph.remove_section_references(&reference);
        }
        graph.remove_resource(id);
    }
    if !ids.is_empty() {
        debug!(
            "Removed {} {} {} for {}",
            ids.len(),
            locator.kind.resource_type(),
            locator.code.code,
            locator.subject
        );
    }
    ids.len()
}

/// Make the statement exist iff `present`. Returns whether the document changed.
pub fn set_presence<G: DocumentGraph + ?Sized>(
    graph: &mut G,
    locator: &EntryLocator<'_>,
    present: bool,
) -> Result<bool> {
    if present {
        let (_, created) = ensure_entry(graph, locator)?;
        Ok(created)
    } else {
        Ok(remove_entries(graph, locator) > 0)
    }
}
