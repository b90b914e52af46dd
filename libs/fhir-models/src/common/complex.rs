//! FHIR complex types and shared data structures
//!
//! This module contains the handful of data types the vital records mapping layer
//! reads and writes. No validation - just data representation.

use super::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Canonical URL of the core `data-absent-reason` extension
pub const DATA_ABSENT_REASON_URL: &str = "http://hl7.org/fhir/StructureDefinition/data-absent-reason";

/// Reason a value is missing, carried by the `data-absent-reason` extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataAbsentReason {
    Unknown,
    AskedUnknown,
    TempUnknown,
    NotAsked,
    Masked,
    Unsupported,
}

impl DataAbsentReason {
    pub fn as_code(self) -> &'static str {
        match self {
            DataAbsentReason::Unknown => "unknown",
            DataAbsentReason::AskedUnknown => "asked-unknown",
            DataAbsentReason::TempUnknown => "temp-unknown",
            DataAbsentReason::NotAsked => "not-asked",
            DataAbsentReason::Masked => "masked",
            DataAbsentReason::Unsupported => "unsupported",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "unknown" => Some(DataAbsentReason::Unknown),
            "asked-unknown" => Some(DataAbsentReason::AskedUnknown),
            "temp-unknown" => Some(DataAbsentReason::TempUnknown),
            "not-asked" => Some(DataAbsentReason::NotAsked),
            "masked" => Some(DataAbsentReason::Masked),
            "unsupported" => Some(DataAbsentReason::Unsupported),
            _ => None,
        }
    }
}

/// FHIR Extension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extension {
    pub url: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Extension>,

    /// `value[x]` and its `_value[x]` sibling, kept verbatim
    #[serde(flatten)]
    pub value: Map<String, Value>,
}

impl Extension {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            extension: Vec::new(),
            value: Map::new(),
        }
    }

    /// Build an extension carrying a single `value[x]` entry (e.g. `valueString`).
    pub fn with_value(url: impl Into<String>, value_key: &str, value: Value) -> Self {
        let mut ext = Self::new(url);
        ext.value.insert(value_key.to_string(), value);
        ext
    }

    pub fn value_str(&self, value_key: &str) -> Option<&str> {
        self.value.get(value_key).and_then(Value::as_str)
    }
}

/// Coding - a reference to a code defined by a terminology system
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Coding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,

    #[serde(rename = "userSelected", skip_serializing_if = "Option::is_none")]
    pub user_selected: Option<bool>,
}

impl Coding {
    pub fn new(system: &str, code: &str, display: &str) -> Self {
        Self {
            system: non_blank(system),
            code: non_blank(code),
            display: non_blank(display),
            ..Default::default()
        }
    }

    pub fn matches(&self, code: &str) -> bool {
        self.code.as_deref() == Some(code)
    }
}

/// CodeableConcept - a set of codings plus optional free text
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CodeableConcept {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coding: Vec<Coding>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl CodeableConcept {
    pub fn from_coding(coding: Coding) -> Self {
        Self {
            coding: vec![coding],
            text: None,
        }
    }

    pub fn first_coding(&self) -> Option<&Coding> {
        self.coding.first()
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.coding.iter().any(|c| c.matches(code))
    }

    pub fn is_empty(&self) -> bool {
        self.coding.is_empty() && self.text.is_none()
    }

    /// Read a CodeableConcept out of an arbitrary JSON node.
    pub fn from_value(value: &Value) -> Result<Self> {
        if !value.is_object() {
            return Err(Error::UnexpectedShape {
                expected: "CodeableConcept",
                found: json_kind(value),
            });
        }
        Ok(serde_json::from_value(value.clone())?)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Postal address
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Extension>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub line: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl Address {
    pub fn extension(&self, url: &str) -> Option<&Extension> {
        self.extension.iter().find(|e| e.url == url)
    }
}

fn non_blank(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn codeable_concept_reads_wire_shape() {
        let value = json!({
            "coding": [{ "system": "http://loinc.org", "code": "76689-9", "display": "Sex assigned at birth" }],
            "text": "sex"
        });
        let concept = CodeableConcept::from_value(&value).unwrap();
        assert!(concept.has_code("76689-9"));
        assert_eq!(concept.first_coding().unwrap().system.as_deref(), Some("http://loinc.org"));
        assert_eq!(concept.text.as_deref(), Some("sex"));
        assert_eq!(concept.to_value(), value);
    }

    #[test]
    fn codeable_concept_rejects_non_objects() {
        let err = CodeableConcept::from_value(&json!("F")).unwrap_err();
        assert!(matches!(err, Error::UnexpectedShape { found: "string", .. }));
    }

    #[test]
    fn coding_new_drops_blank_parts() {
        let coding = Coding::new("", "F", " ");
        assert_eq!(coding.code.as_deref(), Some("F"));
        assert!(coding.system.is_none());
        assert!(coding.display.is_none());
    }

    #[test]
    fn extension_keeps_value_and_primitive_sibling() {
        let value = json!({
            "url": "year",
            "_valueUnsignedInt": {
                "extension": [{ "url": DATA_ABSENT_REASON_URL, "valueCode": "unknown" }]
            }
        });
        let ext: Extension = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(ext.url, "year");
        assert!(ext.value.contains_key("_valueUnsignedInt"));
        assert_eq!(serde_json::to_value(&ext).unwrap(), value);
    }

    #[test]
    fn address_uses_camel_case_postal_code() {
        let address: Address =
            serde_json::from_value(json!({ "state": "MA", "postalCode": "01730" })).unwrap();
        assert_eq!(address.postal_code.as_deref(), Some("01730"));
        assert_eq!(address.state.as_deref(), Some("MA"));
    }

    #[test]
    fn data_absent_reason_codes_round_trip() {
        for reason in [
            DataAbsentReason::Unknown,
            DataAbsentReason::AskedUnknown,
            DataAbsentReason::TempUnknown,
            DataAbsentReason::NotAsked,
        ] {
            assert_eq!(DataAbsentReason::from_code(reason.as_code()), Some(reason));
        }
        assert_eq!(DataAbsentReason::from_code("nope"), None);
    }
}
