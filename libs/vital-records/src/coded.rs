//! Coded value bridge
//!
//! Converts between the flat `{code, system, display, text}` map that callers work
//! with and the `CodeableConcept` stored on a statement. A bare code is completed
//! from the field's value set; a code the value set does not know is kept as free
//! text under the configured "other" coding instead of being rejected.

use crate::config::OtherCoding;
use crate::value_sets::ValueSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};
use vitalis_models::{CodeableConcept, Coding};

pub const CODE: &str = "code";
pub const SYSTEM: &str = "system";
pub const DISPLAY: &str = "display";
pub const TEXT: &str = "text";

/// Key of the coded value on an observation statement
pub const VALUE_KEY: &str = "valueCodeableConcept";

/// A controlled-vocabulary answer in caller-facing form.
///
/// The default value (blank code) is the canonical "no value".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CodedValue {
    pub code: String,
    pub system: String,
    pub display: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl CodedValue {
    pub fn new(code: impl Into<String>, system: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            system: system.into(),
            display: display.into(),
            text: None,
        }
    }

    /// A value carrying only a code; the system is resolved from the field's value set.
    pub fn bare(code: impl Into<String>) -> Self {
        Self::new(code, "", "")
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.code.trim().is_empty()
    }

    /// Flat map form. The empty value yields `{code: "", system: "", display: ""}`.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert(CODE.to_string(), self.code.clone());
        map.insert(SYSTEM.to_string(), self.system.clone());
        map.insert(DISPLAY.to_string(), self.display.clone());
        if let Some(text) = &self.text {
            map.insert(TEXT.to_string(), text.clone());
        }
        map
    }

    /// Read a flat map. A missing or blank `code` gives the empty value.
    pub fn from_map(map: &BTreeMap<String, String>) -> Self {
        let get = |key: &str| map.get(key).map(|v| v.trim().to_string()).unwrap_or_default();
        let code = get(CODE);
        if code.is_empty() {
            return Self::default();
        }
        Self {
            code,
            system: get(SYSTEM),
            display: get(DISPLAY),
            text: map
                .get(TEXT)
                .filter(|t| !t.trim().is_empty())
                .cloned(),
        }
    }

    pub fn from_concept(concept: &CodeableConcept) -> Self {
        let Some(coding) = concept.first_coding() else {
            return Self::default();
        };
        let part = |v: &Option<String>| v.clone().unwrap_or_default();
        let code = part(&coding.code);
        if code.is_empty() {
            return Self::default();
        }
        Self {
            code,
            system: part(&coding.system),
            display: part(&coding.display),
            text: concept.text.clone(),
        }
    }
}

/// Resolves caller values against value sets, with the configured "other" fallback.
#[derive(Debug, Clone, Copy)]
pub struct CodeBridge<'c> {
    other: &'c OtherCoding,
}

impl<'c> CodeBridge<'c> {
    pub fn new(other: &'c OtherCoding) -> Self {
        Self { other }
    }

    /// Read the coded value of `statement`. Missing statements, missing values and
    /// values that are not a CodeableConcept all read as the empty value.
    pub fn read(&self, statement: Option<&Value>) -> CodedValue {
        let Some(value) = statement.and_then(|s| s.get(VALUE_KEY)) else {
            return CodedValue::default();
        };
        match CodeableConcept::from_value(value) {
            Ok(concept) => CodedValue::from_concept(&concept),
            Err(e) => {
                debug!("Ignoring malformed coded value: {}", e);
                CodedValue::default()
            }
        }
    }

    /// Flat map of a statement's coded value.
    pub fn to_map(&self, statement: Option<&Value>) -> BTreeMap<String, String> {
        self.read(statement).to_map()
    }

    /// Structured value for a flat map; `None` for the empty map.
    pub fn from_map(
        &self,
        map: &BTreeMap<String, String>,
        value_set: Option<&ValueSet>,
    ) -> Option<CodeableConcept> {
        self.to_concept(&CodedValue::from_map(map), value_set)
    }

    /// Build the structured value, completing a bare code from `value_set`.
    ///
    /// A bare code missing from `value_set` becomes the "other" coding with the
    /// caller's text (or the raw code) kept in `text`.
    pub fn to_concept(&self, value: &CodedValue, value_set: Option<&ValueSet>) -> Option<CodeableConcept> {
        if value.is_empty() {
            return None;
        }
        let code = value.code.trim();
        let text = value.text.as_deref().filter(|t| !t.trim().is_empty());

        let coding = if !value.system.trim().is_empty() {
            Coding::new(&value.system, code, &value.display)
        } else {
            match value_set {
                Some(vs) => match vs.lookup(code) {
                    Some(concept) => {
                        let display = if value.display.trim().is_empty() {
                            concept.display
                        } else {
                            value.display.as_str()
                        };
                        Coding::new(concept.system, concept.code, display)
                    }
                    None => return Some(self.other_concept(vs.name, text.unwrap_or(code))),
                },
                None => Coding::new("", code, &value.display),
            }
        };

        Some(CodeableConcept {
            coding: vec![coding],
            text: text.map(str::to_string),
        })
    }

    /// The bare code of a flat map, or `None` when blank.
    pub fn helper_get(map: &BTreeMap<String, String>) -> Option<String> {
        map.get(CODE)
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string)
    }

    /// Structured value for a single code of `field`. A blank code yields `None`
    /// and callers leave the field untouched.
    pub fn helper_set(&self, field: &str, code: &str, allowed: &ValueSet) -> Option<CodeableConcept> {
        let code = code.trim();
        if code.is_empty() {
            return None;
        }
        match allowed.lookup(code) {
            Some(concept) => Some(concept.to_concept()),
            None => Some(self.other_concept(field, code)),
        }
    }

    fn other_concept(&self, field: &str, raw: &str) -> CodeableConcept {
        warn!(
            "{}: code {:?} is not in the value set, storing it as {}",
            field, raw, self.other.code
        );
        CodeableConcept {
            coding: vec![Coding::new(&self.other.system, &self.other.code, &self.other.display)],
            text: Some(raw.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_sets::{systems, EDUCATION_LEVEL, FETAL_PRESENTATION, SEX_ASSIGNED_AT_BIRTH};
    use serde_json::json;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn statement(concept: &CodeableConcept) -> Value {
        json!({ "resourceType": "Observation", VALUE_KEY: concept.to_value() })
    }

    // --- flat maps ---

    #[test]
    fn empty_value_has_canonical_map() {
        let empty = CodedValue::default().to_map();
        assert_eq!(empty, map(&[("code", ""), ("system", ""), ("display", "")]));
        assert_eq!(CodedValue::from_map(&empty), CodedValue::default());
        assert_eq!(CodedValue::from_map(&BTreeMap::new()).to_map(), empty);
    }

    #[test]
    fn blank_code_discards_other_keys() {
        let value = CodedValue::from_map(&map(&[("code", " "), ("system", "x"), ("text", "t")]));
        assert!(value.is_empty());
        assert_eq!(value, CodedValue::default());
    }

    // --- round trip ---

    #[test]
    fn recognized_map_round_trips() {
        let bridge_other = OtherCoding::default();
        let bridge = CodeBridge::new(&bridge_other);
        let m = map(&[
            ("code", "F"),
            ("system", systems::ADMINISTRATIVE_GENDER),
            ("display", "Female"),
        ]);
        let concept = bridge.from_map(&m, Some(&SEX_ASSIGNED_AT_BIRTH)).unwrap();
        assert_eq!(bridge.to_map(Some(&statement(&concept))), m);
    }

    #[test]
    fn structured_value_round_trips_through_map() {
        let other = OtherCoding::default();
        let bridge = CodeBridge::new(&other);
        let concept = CodeableConcept {
            coding: vec![Coding::new(systems::SNOMED_CT, "6096002", "Breech presentation")],
            text: Some("frank breech".to_string()),
        };
        let m = bridge.to_map(Some(&statement(&concept)));
        assert_eq!(bridge.from_map(&m, Some(&FETAL_PRESENTATION)), Some(concept));
    }

    #[test]
    fn missing_statement_reads_empty() {
        let other = OtherCoding::default();
        let bridge = CodeBridge::new(&other);
        assert!(bridge.read(None).is_empty());
        assert!(bridge.read(Some(&json!({ "resourceType": "Observation" }))).is_empty());
        assert!(bridge.read(Some(&json!({ VALUE_KEY: "F" }))).is_empty());
    }

    // --- system resolution ---

    #[test]
    fn bare_code_takes_value_set_system() {
        let other = OtherCoding::default();
        let bridge = CodeBridge::new(&other);
        let concept = bridge
            .to_concept(&CodedValue::bare("HS"), Some(&EDUCATION_LEVEL))
            .unwrap();
        let coding = concept.first_coding().unwrap();
        assert_eq!(coding.system.as_deref(), Some(systems::EDUCATION_LEVEL));
        assert_eq!(
            coding.display.as_deref(),
            Some("High School or secondary school degree complete")
        );
    }

    #[test]
    fn explicit_system_is_kept_verbatim() {
        let other = OtherCoding::default();
        let bridge = CodeBridge::new(&other);
        let value = CodedValue::new("X1", "http://example.org/local", "Local");
        let concept = bridge.to_concept(&value, Some(&EDUCATION_LEVEL)).unwrap();
        assert_eq!(CodedValue::from_concept(&concept), value);
    }

    #[test]
    fn unknown_bare_code_falls_back_to_other_with_caller_text() {
        let other = OtherCoding::default();
        let bridge = CodeBridge::new(&other);
        let value = CodedValue::bare("footling").with_text("Footling breech");
        let concept = bridge.to_concept(&value, Some(&FETAL_PRESENTATION)).unwrap();
        let read = CodedValue::from_concept(&concept);
        assert_eq!(read.code, "OTH");
        assert_eq!(read.text.as_deref(), Some("Footling breech"));
    }

    // --- helpers ---

    #[test]
    fn helper_get_returns_non_blank_code() {
        assert_eq!(CodeBridge::helper_get(&map(&[("code", "M")])).as_deref(), Some("M"));
        assert_eq!(CodeBridge::helper_get(&map(&[("code", "  ")])), None);
        assert_eq!(CodeBridge::helper_get(&BTreeMap::new()), None);
    }

    #[test]
    fn helper_set_uses_table_entry() {
        let other = OtherCoding::default();
        let bridge = CodeBridge::new(&other);
        let concept = bridge.helper_set("Sex", "M", &SEX_ASSIGNED_AT_BIRTH).unwrap();
        let value = CodedValue::from_concept(&concept);
        assert_eq!(value, CodedValue::new("M", systems::ADMINISTRATIVE_GENDER, "Male"));
    }

    #[test]
    fn helper_set_never_fails_on_unknown_codes() {
        let other = OtherCoding::default();
        let bridge = CodeBridge::new(&other);
        for raw in ["Q", "male", "Some regional wording", "0"] {
            let concept = bridge.helper_set("Sex", raw, &SEX_ASSIGNED_AT_BIRTH).unwrap();
            let value = CodedValue::from_concept(&concept);
            assert_eq!(value.code, "OTH");
            assert_eq!(value.system, systems::NULL_FLAVOR);
            assert_eq!(value.text.as_deref(), Some(raw));
        }
    }

    #[test]
    fn helper_set_ignores_blank_code() {
        let other = OtherCoding::default();
        let bridge = CodeBridge::new(&other);
        assert!(bridge.helper_set("Sex", " ", &SEX_ASSIGNED_AT_BIRTH).is_none());
    }

    #[test]
    fn configured_other_coding_is_used() {
        let other = OtherCoding {
            code: "OTHER".to_string(),
            system: "http://example.org/local".to_string(),
            display: "Something else".to_string(),
        };
        let bridge = CodeBridge::new(&other);
        let concept = bridge.helper_set("Education", "trade school", &EDUCATION_LEVEL).unwrap();
        assert!(concept.has_code("OTHER"));
        assert_eq!(concept.text.as_deref(), Some("trade school"));
    }
}
