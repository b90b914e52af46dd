//! Record facade
//!
//! [`VitalRecord`] owns one document and routes every field through the mapping
//! primitives using the static tables in [`crate::fields`]. The named accessors at
//! the bottom of this file are generated from those tables.

use crate::coded::{CodeBridge, CodedValue, VALUE_KEY};
use crate::config::{RecordConfig, RecordKind};
use crate::error::{Error, Result};
use crate::fields::{self, CodedField, PresenceField, TemporalField, BIRTH_PLACE_URL, EVENT_DATE};
use crate::partial_date::{
    parse_composite, parse_time, DateFragment, PartialDateEngine, PartialTemporalValue, UNKNOWN_SENTINEL,
};
use crate::presence::{self, EntryLocator};
use crate::record_id::{jurisdiction_from_address, RecordIdentifier};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;
use vitalis_document::extension::{ensure_object, find_extension, remove_extension, upsert_extension};
use vitalis_document::{BundleDocument, DocumentGraph};
use vitalis_models::{Address, CodeableConcept};

/// One birth or fetal death record
#[derive(Debug, Clone)]
pub struct VitalRecord {
    document: BundleDocument,
    config: RecordConfig,
}

impl VitalRecord {
    /// Start an empty record with the subject anchors its kind needs.
    pub fn new(config: RecordConfig) -> Result<Self> {
        config.validate()?;
        let mut document = BundleDocument::new(&config.kind.composition_type());
        for role in config.kind.anchors() {
            document.insert_resource(role.anchor_resource())?;
        }
        let mut record = Self { document, config };
        record.refresh_identifier();
        Ok(record)
    }

    pub fn birth() -> Result<Self> {
        Self::new(RecordConfig::birth())
    }

    pub fn fetal_death() -> Result<Self> {
        Self::new(RecordConfig::fetal_death())
    }

    /// Wrap an existing document. Anchors are not fabricated; fields about a
    /// subject the document lacks fail with [`Error::MissingSubject`].
    pub fn from_document(document: BundleDocument, config: RecordConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { document, config })
    }

    pub fn from_json(text: &str, config: RecordConfig) -> Result<Self> {
        Self::from_document(BundleDocument::from_json(text)?, config)
    }

    pub fn kind(&self) -> RecordKind {
        self.config.kind
    }

    pub fn config(&self) -> &RecordConfig {
        &self.config
    }

    pub fn document(&self) -> &BundleDocument {
        &self.document
    }

    pub fn into_document(self) -> BundleDocument {
        self.document
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(self.document.to_json_pretty()?)
    }

    // ------------------------------------------------------------------------
    // Checkboxes
    // ------------------------------------------------------------------------

    pub fn flag(&self, field: &PresenceField) -> bool {
        presence::exists(&self.document, &field.locator(self.kind()))
    }

    pub fn set_flag(&mut self, field: &PresenceField, value: bool) -> Result<()> {
        let locator = field.locator(self.kind());
        presence::set_presence(&mut self.document, &locator, value)?;
        Ok(())
    }

    /// Presence of an arbitrary statement, for fields outside the shipped tables.
    pub fn entry_exists(&self, locator: &EntryLocator<'_>) -> bool {
        presence::exists(&self.document, locator)
    }

    pub fn set_entry(&mut self, locator: &EntryLocator<'_>, present: bool) -> Result<()> {
        presence::set_presence(&mut self.document, locator, present)?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Coded values
    // ------------------------------------------------------------------------

    pub fn coded(&self, field: &CodedField) -> CodedValue {
        let statement = presence::find_entry(&self.document, &field.locator(self.kind()))
            .and_then(|id| self.document.resource(&id));
        CodeBridge::new(&self.config.other).read(statement)
    }

    /// Store `value`; the empty value removes the backing statement.
    pub fn set_coded(&mut self, field: &CodedField, value: &CodedValue) -> Result<()> {
        let locator = field.locator(self.kind());
        match CodeBridge::new(&self.config.other).to_concept(value, Some(field.value_set)) {
            Some(concept) => self.write_coded(&locator, concept),
            None => {
                presence::remove_entries(&mut self.document, &locator);
                Ok(())
            }
        }
    }

    pub fn coded_map(&self, field: &CodedField) -> BTreeMap<String, String> {
        self.coded(field).to_map()
    }

    pub fn set_coded_map(&mut self, field: &CodedField, map: &BTreeMap<String, String>) -> Result<()> {
        self.set_coded(field, &CodedValue::from_map(map))
    }

    /// Single-code view of a coded field.
    pub fn coded_code(&self, field: &CodedField) -> Option<String> {
        CodeBridge::helper_get(&self.coded_map(field))
    }

    /// Store a bare code. Codes outside the field's value set are kept as "other"
    /// with the raw input as text; a blank code leaves the field untouched.
    pub fn set_coded_code(&mut self, field: &CodedField, code: &str) -> Result<()> {
        let bridge = CodeBridge::new(&self.config.other);
        let Some(concept) = bridge.helper_set(field.name, code, field.value_set) else {
            return Ok(());
        };
        self.write_coded(&field.locator(self.kind()), concept)
    }

    fn write_coded(&mut self, locator: &EntryLocator<'_>, concept: CodeableConcept) -> Result<()> {
        let (id, _) = presence::ensure_entry(&mut self.document, locator)?;
        if let Some(node) = self.document.resource_mut(&id) {
            ensure_object(node).insert(VALUE_KEY.to_string(), concept.to_value());
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Dates and times
    // ------------------------------------------------------------------------

    fn temporal_node(&self, field: &TemporalField) -> Option<&Value> {
        let id = match field.locator(self.kind()) {
            Some(locator) => presence::find_entry(&self.document, &locator)?,
            None => self.document.find_by_profile(field.subject(self.kind()).profile())?,
        };
        self.document.resource(&id)
    }

    /// Apply `update` to the node carrying `field`, creating a backing observation
    /// when the field has one and it does not exist yet.
    fn update_temporal<F>(&mut self, field: &TemporalField, update: F) -> Result<()>
    where
        F: FnOnce(&PartialDateEngine<'_>, &mut Value) -> Result<()>,
    {
        let kind = self.kind();
        let role = field.subject(kind);
        let id = match field.locator(kind) {
            Some(locator) => presence::ensure_entry(&mut self.document, &locator)?.0,
            None => presence::subject_id(&self.document, role)?,
        };
        let engine = PartialDateEngine::new(&self.config.partial_dates);
        let node = self
            .document
            .resource_mut(&id)
            .ok_or(Error::MissingSubject(role))?;
        update(&engine, node)?;
        if field.identifies_record {
            self.refresh_identifier();
        }
        Ok(())
    }

    pub fn temporal(&self, field: &TemporalField) -> PartialTemporalValue {
        self.temporal_node(field)
            .map(|node| PartialDateEngine::new(&self.config.partial_dates).read(node, &field.slot))
            .unwrap_or_default()
    }

    /// `Some(v)` when known, `Some(-1)` when explicitly unknown, `None` when never set.
    pub fn date_fragment(&self, field: &TemporalField, fragment: DateFragment) -> Option<i32> {
        let node = self.temporal_node(field)?;
        PartialDateEngine::new(&self.config.partial_dates).get_fragment(node, &field.slot, fragment)
    }

    pub fn set_date_fragment(
        &mut self,
        field: &TemporalField,
        fragment: DateFragment,
        value: Option<i32>,
    ) -> Result<()> {
        let Some(value) = value else {
            return Ok(());
        };
        fragment.check(value)?;
        self.update_temporal(field, |engine, node| {
            engine.set_fragment(node, &field.slot, fragment, Some(value))
        })
    }

    pub fn time(&self, field: &TemporalField) -> Option<String> {
        let node = self.temporal_node(field)?;
        PartialDateEngine::new(&self.config.partial_dates).get_time(node, &field.slot)
    }

    pub fn set_time(&mut self, field: &TemporalField, value: Option<&str>) -> Result<()> {
        let Some(value) = value else {
            return Ok(());
        };
        if !field.slot.has_time() {
            return Err(Error::InvalidArgument(format!("{} does not carry a time", field.name)));
        }
        if parse_time(field.name, value)?.is_none() {
            return Ok(());
        }
        self.update_temporal(field, |engine, node| engine.set_time(node, &field.slot, Some(value)))
    }

    pub fn composite_date(&self, field: &TemporalField) -> Option<String> {
        let node = self.temporal_node(field)?;
        PartialDateEngine::new(&self.config.partial_dates).get_composite(node, &field.slot)
    }

    /// Set a whole date (or date-time). Blank is no value; anything unparsable is
    /// [`Error::InvalidDateFormat`].
    pub fn set_composite_date(&mut self, field: &TemporalField, value: Option<&str>) -> Result<()> {
        let Some(value) = value else {
            return Ok(());
        };
        if parse_composite(field.name, value)?.is_none() {
            return Ok(());
        }
        self.update_temporal(field, |engine, node| {
            engine.set_composite(node, &field.slot, Some(value))
        })
    }

    // ------------------------------------------------------------------------
    // Place of event, certificate number, identifier
    // ------------------------------------------------------------------------

    pub fn place_of_event(&self) -> Option<Address> {
        let id = self.document.find_by_profile(self.kind().event_subject().profile())?;
        let address = find_extension(self.document.resource(&id)?, BIRTH_PLACE_URL)?.get("valueAddress")?;
        match serde_json::from_value(address.clone()) {
            Ok(address) => Some(address),
            Err(e) => {
                debug!("Ignoring malformed place of event: {}", e);
                None
            }
        }
    }

    pub fn set_place_of_event(&mut self, address: Option<&Address>) -> Result<()> {
        let id = presence::subject_id(&self.document, self.kind().event_subject())?;
        let value = address.map(serde_json::to_value).transpose()?;
        if let Some(node) = self.document.resource_mut(&id) {
            match value {
                Some(value) => upsert_extension(node, BIRTH_PLACE_URL)["valueAddress"] = value,
                None => {
                    remove_extension(node, BIRTH_PLACE_URL);
                }
            }
        }
        self.refresh_identifier();
        Ok(())
    }

    /// Two-letter jurisdiction derived from the place of event.
    pub fn event_jurisdiction(&self) -> Option<String> {
        self.place_of_event()
            .and_then(|address| jurisdiction_from_address(&address, &self.config.jurisdiction_url))
    }

    pub fn certificate_number(&self) -> Option<String> {
        self.document
            .identifier_extension(&self.config.certificate_number_url)
            .map(str::to_string)
    }

    pub fn set_certificate_number(&mut self, value: Option<&str>) {
        let value = value.map(str::trim).filter(|v| !v.is_empty());
        self.document
            .set_identifier_extension(&self.config.certificate_number_url, value);
        self.refresh_identifier();
    }

    /// The stored `YYYYJJNNNNNN` identifier.
    pub fn record_identifier(&self) -> Option<&str> {
        self.document.identifier()
    }

    /// Identifier parts as currently derivable from the record.
    pub fn identifier_parts(&self) -> RecordIdentifier {
        let year = self
            .date_fragment(&EVENT_DATE, DateFragment::Year)
            .filter(|y| *y != UNKNOWN_SENTINEL);
        RecordIdentifier::new(
            year,
            self.event_jurisdiction().as_deref(),
            self.certificate_number().as_deref(),
        )
    }

    fn refresh_identifier(&mut self) {
        let identifier = self.identifier_parts().to_string();
        if self.document.identifier() != Some(identifier.as_str()) {
            debug!("Record identifier is now {}", identifier);
            self.document.set_identifier(&identifier);
        }
    }
}

// ============================================================================
// Generated accessors
// ============================================================================

macro_rules! flag_accessors {
    ($($get:ident, $set:ident => $field:path;)*) => {
        impl VitalRecord {
            $(
                pub fn $get(&self) -> bool {
                    self.flag(&$field)
                }

                pub fn $set(&mut self, value: bool) -> Result<()> {
                    self.set_flag(&$field, value)
                }
            )*
        }
    };
}

macro_rules! coded_accessors {
    ($($get:ident, $set:ident, $get_helper:ident, $set_helper:ident => $field:path;)*) => {
        impl VitalRecord {
            $(
                pub fn $get(&self) -> BTreeMap<String, String> {
                    self.coded_map(&$field)
                }

                pub fn $set(&mut self, value: &BTreeMap<String, String>) -> Result<()> {
                    self.set_coded_map(&$field, value)
                }

                pub fn $get_helper(&self) -> Option<String> {
                    self.coded_code(&$field)
                }

                pub fn $set_helper(&mut self, code: &str) -> Result<()> {
                    self.set_coded_code(&$field, code)
                }
            )*
        }
    };
}

macro_rules! date_accessors {
    ($(
        $year:ident, $set_year:ident,
        $month:ident, $set_month:ident,
        $day:ident, $set_day:ident,
        $date:ident, $set_date:ident => $field:path;
    )*) => {
        impl VitalRecord {
            $(
                pub fn $year(&self) -> Option<i32> {
                    self.date_fragment(&$field, DateFragment::Year)
                }

                pub fn $set_year(&mut self, value: Option<i32>) -> Result<()> {
                    self.set_date_fragment(&$field, DateFragment::Year, value)
                }

                pub fn $month(&self) -> Option<i32> {
                    self.date_fragment(&$field, DateFragment::Month)
                }

                pub fn $set_month(&mut self, value: Option<i32>) -> Result<()> {
                    self.set_date_fragment(&$field, DateFragment::Month, value)
                }

                pub fn $day(&self) -> Option<i32> {
                    self.date_fragment(&$field, DateFragment::Day)
                }

                pub fn $set_day(&mut self, value: Option<i32>) -> Result<()> {
                    self.set_date_fragment(&$field, DateFragment::Day, value)
                }

                pub fn $date(&self) -> Option<String> {
                    self.composite_date(&$field)
                }

                pub fn $set_date(&mut self, value: Option<&str>) -> Result<()> {
                    self.set_composite_date(&$field, value)
                }
            )*
        }
    };
}

flag_accessors! {
    gestational_diabetes, set_gestational_diabetes => fields::GESTATIONAL_DIABETES;
    gestational_hypertension, set_gestational_hypertension => fields::GESTATIONAL_HYPERTENSION;
    epidural_or_spinal_anesthesia, set_epidural_or_spinal_anesthesia => fields::EPIDURAL_OR_SPINAL_ANESTHESIA;
    induction_of_labor, set_induction_of_labor => fields::INDUCTION_OF_LABOR;
    successful_ecv, set_successful_ecv => fields::SUCCESSFUL_EXTERNAL_CEPHALIC_VERSION;
    unsuccessful_ecv, set_unsuccessful_ecv => fields::UNSUCCESSFUL_EXTERNAL_CEPHALIC_VERSION;
    assisted_ventilation, set_assisted_ventilation => fields::ASSISTED_VENTILATION;
    nicu_admission, set_nicu_admission => fields::NICU_ADMISSION;
    anencephaly, set_anencephaly => fields::ANENCEPHALY;
}

coded_accessors! {
    sex, set_sex, sex_helper, set_sex_helper => fields::SEX;
    mother_education_level, set_mother_education_level,
        mother_education_level_helper, set_mother_education_level_helper => fields::MOTHER_EDUCATION_LEVEL;
    fetal_presentation, set_fetal_presentation,
        fetal_presentation_helper, set_fetal_presentation_helper => fields::FETAL_PRESENTATION_AT_BIRTH;
    mother_transferred, set_mother_transferred,
        mother_transferred_helper, set_mother_transferred_helper => fields::MOTHER_TRANSFERRED;
}

date_accessors! {
    delivery_year, set_delivery_year,
    delivery_month, set_delivery_month,
    delivery_day, set_delivery_day,
    date_of_delivery, set_date_of_delivery => fields::EVENT_DATE;

    mother_birth_year, set_mother_birth_year,
    mother_birth_month, set_mother_birth_month,
    mother_birth_day, set_mother_birth_day,
    mother_date_of_birth, set_mother_date_of_birth => fields::MOTHER_DATE_OF_BIRTH;

    last_menses_year, set_last_menses_year,
    last_menses_month, set_last_menses_month,
    last_menses_day, set_last_menses_day,
    last_menses_date, set_last_menses_date => fields::LAST_MENSES;
}

impl VitalRecord {
    /// `HH:MM:SS`, or `"-1"` when explicitly unknown.
    pub fn delivery_time(&self) -> Option<String> {
        self.time(&EVENT_DATE)
    }

    /// Re-apply after [`VitalRecord::set_date_of_delivery`] when both are set.
    pub fn set_delivery_time(&mut self, value: Option<&str>) -> Result<()> {
        self.set_time(&EVENT_DATE, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subject::SubjectRole;

    // --- construction ---

    #[test]
    fn new_record_has_anchors_and_placeholder_identifier() {
        let record = VitalRecord::birth().unwrap();
        for role in RecordKind::Birth.anchors() {
            assert!(record.document().find_by_profile(role.profile()).is_some(), "{role}");
        }
        assert_eq!(record.record_identifier(), Some("0000XX000000"));
    }

    #[test]
    fn fetal_death_record_uses_fetus_anchor() {
        let record = VitalRecord::fetal_death().unwrap();
        let doc = record.document();
        assert!(doc.find_by_profile(SubjectRole::DecedentFetus.profile()).is_some());
        assert!(doc.find_by_profile(SubjectRole::Child.profile()).is_none());
        assert_eq!(doc.composition().unwrap()["type"]["coding"][0]["code"], "69045-3");
    }

    // --- identifier ---

    #[test]
    fn identifier_follows_inputs() {
        let mut record = VitalRecord::birth().unwrap();
        record.set_certificate_number(Some("100"));
        assert_eq!(record.record_identifier(), Some("0000XX000100"));

        record.set_delivery_year(Some(2022)).unwrap();
        let address = Address {
            state: Some("ma".to_string()),
            ..Default::default()
        };
        record.set_place_of_event(Some(&address)).unwrap();
        assert_eq!(record.record_identifier(), Some("2022MA000100"));

        record.set_delivery_year(Some(-1)).unwrap();
        assert_eq!(record.record_identifier(), Some("0000MA000100"));

        record.set_certificate_number(None);
        assert_eq!(record.certificate_number(), None);
        assert_eq!(record.record_identifier(), Some("0000MA000000"));
    }

    // --- coded ---

    #[test]
    fn empty_coded_value_removes_statement() {
        let mut record = VitalRecord::birth().unwrap();
        record.set_sex_helper("F").unwrap();
        assert_eq!(record.sex_helper().as_deref(), Some("F"));

        record.set_coded(&fields::SEX, &CodedValue::default()).unwrap();
        assert_eq!(record.sex(), CodedValue::default().to_map());
        assert!(!record.entry_exists(&fields::SEX.locator(RecordKind::Birth)));
    }

    #[test]
    fn blank_helper_code_keeps_value() {
        let mut record = VitalRecord::birth().unwrap();
        record.set_mother_education_level_helper("BD").unwrap();
        record.set_mother_education_level_helper("  ").unwrap();
        assert_eq!(record.mother_education_level_helper().as_deref(), Some("BD"));
    }

    // --- temporal ---

    #[test]
    fn observation_dates_are_created_on_first_write() {
        let mut record = VitalRecord::birth().unwrap();
        let locator = fields::LAST_MENSES.locator(RecordKind::Birth).unwrap();
        assert_eq!(record.last_menses_year(), None);
        record.set_last_menses_year(None).unwrap();
        assert!(!record.entry_exists(&locator));

        record.set_last_menses_date(Some("2021-03-04")).unwrap();
        assert!(record.entry_exists(&locator));
        assert_eq!(record.last_menses_month(), Some(3));
    }

    #[test]
    fn invalid_values_do_not_create_statements() {
        let mut record = VitalRecord::birth().unwrap();
        let locator = fields::LAST_MENSES.locator(RecordKind::Birth).unwrap();
        assert!(record.set_last_menses_month(Some(13)).is_err());
        assert!(record.set_last_menses_date(Some("March")).is_err());
        assert!(record.set_time(&fields::LAST_MENSES, Some("10:00")).is_err());
        assert!(!record.entry_exists(&locator));
    }

    #[test]
    fn missing_anchor_is_reported() {
        let document = BundleDocument::new(&RecordKind::Birth.composition_type());
        let mut record = VitalRecord::from_document(document, RecordConfig::birth()).unwrap();
        let err = record.set_mother_birth_year(Some(1980)).unwrap_err();
        assert!(matches!(err, Error::MissingSubject(SubjectRole::Mother)));
        assert!(!record.gestational_diabetes());
        assert!(matches!(
            record.set_gestational_diabetes(true),
            Err(Error::MissingSubject(SubjectRole::Mother))
        ));
    }
}
