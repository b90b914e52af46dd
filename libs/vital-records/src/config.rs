//! Record configuration
//!
//! Declarative, serializable (YAML/JSON) settings injected into the primitives:
//! which record kind is being built, which extension keys the partial date engine
//! uses, and which coding stands in for unrecognised codes.

use crate::error::{Error, Result};
use crate::subject::SubjectRole;
use serde::{Deserialize, Serialize};
use vitalis_document::ConceptRef;

// ============================================================================
// Record kind
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordKind {
    #[default]
    Birth,
    FetalDeath,
}

impl RecordKind {
    /// Subject whose date and place identify the reported event.
    pub fn event_subject(self) -> SubjectRole {
        match self {
            RecordKind::Birth => SubjectRole::Child,
            RecordKind::FetalDeath => SubjectRole::DecedentFetus,
        }
    }

    /// Subjects materialised when a new record is started.
    pub fn anchors(self) -> [SubjectRole; 3] {
        [self.event_subject(), SubjectRole::Mother, SubjectRole::Father]
    }

    pub fn composition_type(self) -> ConceptRef<'static> {
        match self {
            RecordKind::Birth => ConceptRef::new("http://loinc.org", "92011-4", "Birth report"),
            RecordKind::FetalDeath => {
                ConceptRef::new("http://loinc.org", "69045-3", "Fetal death report")
            }
        }
    }
}

// ============================================================================
// Partial date keys
// ============================================================================

pub const NATALITY_PARTIAL_DATE_URL: &str =
    "http://hl7.org/fhir/us/vr-common-library/StructureDefinition/Extension-partial-date-time-vr";
pub const DEATH_REPORTING_PARTIAL_DATE_URL: &str =
    "http://hl7.org/fhir/us/vrdr/StructureDefinition/PartialDateTime";

/// Annotation keys used to store partial date fragments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialDateKeys {
    pub extension_url: String,
    pub year_key: String,
    pub month_key: String,
    pub day_key: String,
    pub time_key: String,
}

impl PartialDateKeys {
    pub fn natality() -> Self {
        Self {
            extension_url: NATALITY_PARTIAL_DATE_URL.to_string(),
            year_key: "year".to_string(),
            month_key: "month".to_string(),
            day_key: "day".to_string(),
            time_key: "time".to_string(),
        }
    }

    pub fn death_reporting() -> Self {
        Self {
            extension_url: DEATH_REPORTING_PARTIAL_DATE_URL.to_string(),
            year_key: "date-year".to_string(),
            month_key: "date-month".to_string(),
            day_key: "date-day".to_string(),
            time_key: "date-time".to_string(),
        }
    }

    fn validate(&self) -> Result<()> {
        let keys = [
            &self.extension_url,
            &self.year_key,
            &self.month_key,
            &self.day_key,
            &self.time_key,
        ];
        if keys.iter().any(|k| k.trim().is_empty()) {
            return Err(Error::Config("partial date keys must not be blank".into()));
        }
        for (i, a) in keys.iter().enumerate().skip(1) {
            if keys[i + 1..].contains(a) {
                return Err(Error::Config(format!("partial date key {a:?} is used twice")));
            }
        }
        Ok(())
    }
}

impl Default for PartialDateKeys {
    fn default() -> Self {
        Self::natality()
    }
}

// ============================================================================
// Other coding
// ============================================================================

/// Coding stored in place of a code the field's value set does not know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtherCoding {
    pub code: String,
    pub system: String,
    pub display: String,
}

impl Default for OtherCoding {
    fn default() -> Self {
        Self {
            code: "OTH".to_string(),
            system: "http://terminology.hl7.org/CodeSystem/v3-NullFlavor".to_string(),
            display: "Other".to_string(),
        }
    }
}

// ============================================================================
// Record config
// ============================================================================

pub const CERTIFICATE_NUMBER_URL: &str =
    "http://hl7.org/fhir/us/vr-common-library/StructureDefinition/CertificateNumber";
pub const ADDRESS_JURISDICTION_URL: &str =
    "http://hl7.org/fhir/us/vr-common-library/StructureDefinition/Extension-address-jurisdiction-vr";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordConfig {
    #[serde(default)]
    pub kind: RecordKind,
    #[serde(default)]
    pub partial_dates: PartialDateKeys,
    #[serde(default)]
    pub other: OtherCoding,
    #[serde(default = "default_certificate_number_url")]
    pub certificate_number_url: String,
    #[serde(default = "default_jurisdiction_url")]
    pub jurisdiction_url: String,
}

fn default_certificate_number_url() -> String {
    CERTIFICATE_NUMBER_URL.to_string()
}

fn default_jurisdiction_url() -> String {
    ADDRESS_JURISDICTION_URL.to_string()
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            kind: RecordKind::default(),
            partial_dates: PartialDateKeys::default(),
            other: OtherCoding::default(),
            certificate_number_url: default_certificate_number_url(),
            jurisdiction_url: default_jurisdiction_url(),
        }
    }
}

impl RecordConfig {
    pub fn birth() -> Self {
        Self::default()
    }

    pub fn fetal_death() -> Self {
        Self {
            kind: RecordKind::FetalDeath,
            ..Self::default()
        }
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.partial_dates.validate()?;
        if self.other.code.trim().is_empty() || self.other.system.trim().is_empty() {
            return Err(Error::Config("other coding needs a code and a system".into()));
        }
        if self.certificate_number_url.trim().is_empty() || self.jurisdiction_url.trim().is_empty()
        {
            return Err(Error::Config("extension URLs must not be blank".into()));
        }
        Ok(())
    }
}
