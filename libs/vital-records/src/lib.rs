//! Vital record mapping primitives
//!
//! Maps flat birth and fetal death record fields onto a FHIR document graph.
//!
//! # Architecture
//!
//! ```text
//! VitalRecord ──▶ fields (static routing tables)
//!     │
//!     ├── coded        CodedValue ⇄ CodeableConcept, value set defaulting, "other" fallback
//!     ├── partial_date year / month / day / time fragments ⇄ composite date
//!     ├── presence     checkbox ⇄ existence of one statement + section index
//!     └── record_id    (year, jurisdiction, certificate number) → YYYYJJNNNNNN
//!                 │
//!                 ▼
//!        vitalis_document::DocumentGraph
//! ```
//!
//! Primitives take the graph and an explicit locator; nothing looks up "the current
//! subject" implicitly. Extension keys for partial dates and the "other" coding come
//! from [`RecordConfig`], so one engine serves both record kinds.
//!
//! ```no_run
//! use vitalis_records::{RecordConfig, VitalRecord};
//!
//! # fn main() -> vitalis_records::Result<()> {
//! let mut record = VitalRecord::new(RecordConfig::birth())?;
//! record.set_delivery_year(Some(2022))?;
//! record.set_certificate_number(Some("100"));
//! record.set_sex_helper("F")?;
//! record.set_nicu_admission(true)?;
//! println!("{}", record.to_json_pretty()?);
//! # Ok(())
//! # }
//! ```

pub mod coded;
pub mod config;
mod error;
pub mod fields;
pub mod partial_date;
pub mod presence;
pub mod record_id;
mod record;
pub mod subject;
pub mod value_sets;

pub use coded::{CodeBridge, CodedValue};
pub use config::{OtherCoding, PartialDateKeys, RecordConfig, RecordKind};
pub use error::{Error, Result};
pub use partial_date::{
    DateFragment, FragmentValue, PartialDateEngine, PartialTemporalValue, TemporalSlot, TimeStorage,
};
pub use presence::EntryLocator;
pub use record::VitalRecord;
pub use record_id::{compose as compose_record_identifier, RecordIdentifier};
pub use subject::SubjectRole;
pub use value_sets::ValueSet;
