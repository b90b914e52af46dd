//! In-memory FHIR document graph for vital records
//!
//! # Architecture
//!
//! ```text
//! DocumentGraph (trait) ← BundleDocument (serde_json::Value, Bundle of type "document")
//! ```
//!
//! - [`DocumentGraph`] is the seam the record primitives program against: node lookup
//!   by profile or by category + code + subject, attach/detach, and the composition's
//!   section index.
//! - [`BundleDocument`] is the default host: a document Bundle whose first entry is the
//!   Composition. Nodes are addressed by `urn:uuid:<id>`.
//! - [`extension`] holds the annotation helpers (get/set by canonical URL, primitive
//!   `_element` siblings, `data-absent-reason`).

mod bundle;
pub mod composition;
mod error;
pub mod extension;
mod graph;

pub use bundle::BundleDocument;
pub use error::{DocumentError, Result};
pub use graph::{ConceptRef, DocumentGraph, ResourceKind, SectionRef, StatementQuery};
