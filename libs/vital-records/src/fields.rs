//! Field routing table
//!
//! Each record field is a static description of where its value lives: the
//! statement code, category and section, the subject it is about, and either the
//! value set (coded fields) or the date slot (temporal fields). The record facade
//! generates its accessors from these tables.

use crate::config::RecordKind;
use crate::partial_date::TemporalSlot;
use crate::presence::EntryLocator;
use crate::subject::SubjectRole;
use crate::value_sets::{
    systems, ValueSet, EDUCATION_LEVEL, FETAL_PRESENTATION, SEX_ASSIGNED_AT_BIRTH, YES_NO_UNKNOWN,
};
use vitalis_document::{ConceptRef, ResourceKind, SectionRef};

pub const BIRTH_TIME_URL: &str = "http://hl7.org/fhir/StructureDefinition/patient-birthTime";
pub const BIRTH_PLACE_URL: &str = "http://hl7.org/fhir/StructureDefinition/patient-birthPlace";

/// Who a field is about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSubject {
    /// The newborn on a birth record, the fetus on a fetal death record
    Event,
    Role(SubjectRole),
}

impl FieldSubject {
    pub fn resolve(self, kind: RecordKind) -> SubjectRole {
        match self {
            FieldSubject::Event => kind.event_subject(),
            FieldSubject::Role(role) => role,
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

pub mod sections {
    use super::*;

    pub const PRENATAL: SectionRef<'static> =
        SectionRef::new(systems::DOCUMENT_SECTIONS, "prenatal", "Prenatal Section");
    pub const LABOR_AND_DELIVERY: SectionRef<'static> = SectionRef::new(
        systems::DOCUMENT_SECTIONS,
        "labor-and-delivery",
        "Labor and Delivery Section",
    );
    pub const NEWBORN_INFORMATION: SectionRef<'static> = SectionRef::new(
        systems::DOCUMENT_SECTIONS,
        "newborn-information",
        "Newborn Information Section",
    );
    pub const MOTHER_INFORMATION: SectionRef<'static> = SectionRef::new(
        systems::DOCUMENT_SECTIONS,
        "mother-information",
        "Mother Information Section",
    );
}

const fn snomed(code: &'static str, display: &'static str) -> ConceptRef<'static> {
    ConceptRef::new(systems::SNOMED_CT, code, display)
}

const fn loinc(code: &'static str, display: &'static str) -> ConceptRef<'static> {
    ConceptRef::new(systems::LOINC, code, display)
}

// ============================================================================
// Field kinds
// ============================================================================

/// A checkbox: true iff its statement exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceField {
    pub name: &'static str,
    pub kind: ResourceKind,
    pub category: Option<ConceptRef<'static>>,
    pub code: ConceptRef<'static>,
    pub section: SectionRef<'static>,
    pub subject: FieldSubject,
    pub outcome: Option<ConceptRef<'static>>,
}

impl PresenceField {
    pub fn locator(&self, kind: RecordKind) -> EntryLocator<'static> {
        EntryLocator {
            kind: self.kind,
            category: self.category,
            code: self.code,
            section: self.section,
            subject: self.subject.resolve(kind),
            outcome: self.outcome,
            profile: None,
        }
    }
}

/// An observation whose `valueCodeableConcept` is drawn from a value set.
#[derive(Debug, Clone, Copy)]
pub struct CodedField {
    pub name: &'static str,
    pub code: ConceptRef<'static>,
    pub section: SectionRef<'static>,
    pub subject: FieldSubject,
    pub value_set: &'static ValueSet,
}

impl CodedField {
    pub fn locator(&self, kind: RecordKind) -> EntryLocator<'static> {
        EntryLocator {
            kind: ResourceKind::Measurement,
            category: None,
            code: self.code,
            section: self.section,
            subject: self.subject.resolve(kind),
            outcome: None,
            profile: None,
        }
    }
}

/// Node carrying a temporal field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalTarget {
    /// The subject anchor itself (e.g. `Patient.birthDate`)
    Subject(FieldSubject),
    /// An observation about the subject, created on first write
    Observation {
        code: ConceptRef<'static>,
        section: SectionRef<'static>,
        subject: FieldSubject,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalField {
    pub name: &'static str,
    pub target: TemporalTarget,
    pub slot: TemporalSlot,
    /// Whether the field's year feeds the record identifier
    pub identifies_record: bool,
}

impl TemporalField {
    pub fn subject(&self, kind: RecordKind) -> SubjectRole {
        match self.target {
            TemporalTarget::Subject(subject) | TemporalTarget::Observation { subject, .. } => {
                subject.resolve(kind)
            }
        }
    }

    /// Locator of the backing observation, for observation-backed fields.
    pub fn locator(&self, kind: RecordKind) -> Option<EntryLocator<'static>> {
        match self.target {
            TemporalTarget::Subject(_) => None,
            TemporalTarget::Observation { code, section, subject } => Some(EntryLocator {
                kind: ResourceKind::Measurement,
                category: None,
                code,
                section,
                subject: subject.resolve(kind),
                outcome: None,
                profile: None,
            }),
        }
    }
}

// ============================================================================
// Temporal fields
// ============================================================================

pub static EVENT_DATE: TemporalField = TemporalField {
    name: "DateOfDelivery",
    target: TemporalTarget::Subject(FieldSubject::Event),
    slot: TemporalSlot::date_with_time_extension("birthDate", BIRTH_TIME_URL),
    identifies_record: true,
};

pub static MOTHER_DATE_OF_BIRTH: TemporalField = TemporalField {
    name: "MotherDateOfBirth",
    target: TemporalTarget::Subject(FieldSubject::Role(SubjectRole::Mother)),
    slot: TemporalSlot::date("birthDate"),
    identifies_record: false,
};

pub static LAST_MENSES: TemporalField = TemporalField {
    name: "LastMenstrualPeriod",
    target: TemporalTarget::Observation {
        code: loinc("8665-2", "Last menstrual period start date"),
        section: sections::PRENATAL,
        subject: FieldSubject::Role(SubjectRole::Mother),
    },
    slot: TemporalSlot::date("valueDateTime"),
    identifies_record: false,
};

// ============================================================================
// Coded fields
// ============================================================================

pub static SEX: CodedField = CodedField {
    name: "Sex",
    code: loinc("76689-9", "Sex assigned at birth"),
    section: sections::NEWBORN_INFORMATION,
    subject: FieldSubject::Event,
    value_set: &SEX_ASSIGNED_AT_BIRTH,
};

pub static MOTHER_EDUCATION_LEVEL: CodedField = CodedField {
    name: "MotherEducationLevel",
    code: loinc("57712-2", "Highest level of education Mother"),
    section: sections::MOTHER_INFORMATION,
    subject: FieldSubject::Role(SubjectRole::Mother),
    value_set: &EDUCATION_LEVEL,
};

pub static FETAL_PRESENTATION_AT_BIRTH: CodedField = CodedField {
    name: "FetalPresentation",
    code: loinc("73761-9", "Fetal presentation at birth"),
    section: sections::LABOR_AND_DELIVERY,
    subject: FieldSubject::Role(SubjectRole::Mother),
    value_set: &FETAL_PRESENTATION,
};

pub static MOTHER_TRANSFERRED: CodedField = CodedField {
    name: "MotherTransferred",
    code: loinc("73757-7", "Mother transferred"),
    section: sections::LABOR_AND_DELIVERY,
    subject: FieldSubject::Role(SubjectRole::Mother),
    value_set: &YES_NO_UNKNOWN,
};

// ============================================================================
// Checkbox fields
// ============================================================================

const PROBLEM_LIST: ConceptRef<'static> =
    ConceptRef::new(systems::CONDITION_CATEGORY, "problem-list-item", "Problem List Item");

pub static GESTATIONAL_DIABETES: PresenceField = PresenceField {
    name: "GestationalDiabetes",
    kind: ResourceKind::Finding,
    category: Some(PROBLEM_LIST),
    code: snomed("11687002", "Gestational diabetes mellitus"),
    section: sections::PRENATAL,
    subject: FieldSubject::Role(SubjectRole::Mother),
    outcome: None,
};

pub static GESTATIONAL_HYPERTENSION: PresenceField = PresenceField {
    name: "GestationalHypertension",
    kind: ResourceKind::Finding,
    category: Some(PROBLEM_LIST),
    code: snomed("48194001", "Pregnancy-induced hypertension"),
    section: sections::PRENATAL,
    subject: FieldSubject::Role(SubjectRole::Mother),
    outcome: None,
};

pub static EPIDURAL_OR_SPINAL_ANESTHESIA: PresenceField = PresenceField {
    name: "EpiduralOrSpinalAnesthesia",
    kind: ResourceKind::Procedure,
    category: None,
    code: snomed("18946005", "Epidural anesthesia"),
    section: sections::LABOR_AND_DELIVERY,
    subject: FieldSubject::Role(SubjectRole::Mother),
    outcome: None,
};

pub static INDUCTION_OF_LABOR: PresenceField = PresenceField {
    name: "InductionOfLabor",
    kind: ResourceKind::Procedure,
    category: None,
    code: snomed("236958009", "Induction of labor"),
    section: sections::LABOR_AND_DELIVERY,
    subject: FieldSubject::Role(SubjectRole::Mother),
    outcome: None,
};

const EXTERNAL_CEPHALIC_VERSION: ConceptRef<'static> =
    snomed("240278000", "External cephalic version");

pub static SUCCESSFUL_EXTERNAL_CEPHALIC_VERSION: PresenceField = PresenceField {
    name: "SuccessfulExternalCephalicVersion",
    kind: ResourceKind::Procedure,
    category: None,
    code: EXTERNAL_CEPHALIC_VERSION,
    section: sections::PRENATAL,
    subject: FieldSubject::Role(SubjectRole::Mother),
    outcome: Some(snomed("385669000", "Successful")),
};

pub static UNSUCCESSFUL_EXTERNAL_CEPHALIC_VERSION: PresenceField = PresenceField {
    name: "UnsuccessfulExternalCephalicVersion",
    kind: ResourceKind::Procedure,
    category: None,
    code: EXTERNAL_CEPHALIC_VERSION,
    section: sections::PRENATAL,
    subject: FieldSubject::Role(SubjectRole::Mother),
    outcome: Some(snomed("385671000", "Unsuccessful")),
};

pub static ASSISTED_VENTILATION: PresenceField = PresenceField {
    name: "AssistedVentilationFollowingDelivery",
    kind: ResourceKind::Procedure,
    category: None,
    code: snomed("52765003", "Intubation"),
    section: sections::NEWBORN_INFORMATION,
    subject: FieldSubject::Event,
    outcome: None,
};

pub static NICU_ADMISSION: PresenceField = PresenceField {
    name: "NICUAdmission",
    kind: ResourceKind::Procedure,
    category: None,
    code: snomed("830077005", "Admission to neonatal intensive care unit"),
    section: sections::NEWBORN_INFORMATION,
    subject: FieldSubject::Event,
    outcome: None,
};

pub static ANENCEPHALY: PresenceField = PresenceField {
    name: "Anencephaly",
    kind: ResourceKind::Finding,
    category: None,
    code: snomed("89369001", "Anencephalus"),
    section: sections::NEWBORN_INFORMATION,
    subject: FieldSubject::Event,
    outcome: None,
};

/// Every checkbox field, in form order.
pub static PRESENCE_FIELDS: [&PresenceField; 9] = [
    &GESTATIONAL_DIABETES,
    &GESTATIONAL_HYPERTENSION,
    &SUCCESSFUL_EXTERNAL_CEPHALIC_VERSION,
    &UNSUCCESSFUL_EXTERNAL_CEPHALIC_VERSION,
    &INDUCTION_OF_LABOR,
    &EPIDURAL_OR_SPINAL_ANESTHESIA,
    &ASSISTED_VENTILATION,
    &NICU_ADMISSION,
    &ANENCEPHALY,
];

pub static CODED_FIELDS: [&CodedField; 4] = [
    &SEX,
    &MOTHER_EDUCATION_LEVEL,
    &FETAL_PRESENTATION_AT_BIRTH,
    &MOTHER_TRANSFERRED,
];

pub static TEMPORAL_FIELDS: [&TemporalField; 3] = [&EVENT_DATE, &MOTHER_DATE_OF_BIRTH, &LAST_MENSES];

pub fn presence_field(name: &str) -> Option<&'static PresenceField> {
    PRESENCE_FIELDS.iter().copied().find(|f| f.name == name)
}

pub fn coded_field(name: &str) -> Option<&'static CodedField> {
    CODED_FIELDS.iter().copied().find(|f| f.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn field_names_are_unique() {
        let mut names = HashSet::new();
        let all = PRESENCE_FIELDS
            .iter()
            .map(|f| f.name)
            .chain(CODED_FIELDS.iter().map(|f| f.name))
            .chain(TEMPORAL_FIELDS.iter().map(|f| f.name));
        for name in all {
            assert!(names.insert(name), "duplicate field {name}");
        }
    }

    #[test]
    fn checkbox_locators_are_distinct() {
        let locators: HashSet<_> = PRESENCE_FIELDS
            .iter()
            .map(|f| {
                let l = f.locator(RecordKind::Birth);
                (l.code.code, l.outcome.map(|o| o.code), l.subject)
            })
            .collect();
        assert_eq!(locators.len(), PRESENCE_FIELDS.len());
    }

    #[test]
    fn event_subject_follows_record_kind() {
        assert_eq!(NICU_ADMISSION.locator(RecordKind::Birth).subject, SubjectRole::Child);
        assert_eq!(
            ANENCEPHALY.locator(RecordKind::FetalDeath).subject,
            SubjectRole::DecedentFetus
        );
        assert_eq!(
            GESTATIONAL_DIABETES.locator(RecordKind::FetalDeath).subject,
            SubjectRole::Mother
        );
    }

    #[test]
    fn only_observation_backed_dates_have_locators() {
        assert!(EVENT_DATE.locator(RecordKind::Birth).is_none());
        let lmp = LAST_MENSES.locator(RecordKind::Birth).unwrap();
        assert_eq!(lmp.kind, ResourceKind::Measurement);
        assert_eq!(lmp.code.code, "8665-2");
        assert_eq!(LAST_MENSES.subject(RecordKind::Birth), SubjectRole::Mother);
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(presence_field("NICUAdmission"), Some(&NICU_ADMISSION));
        assert_eq!(coded_field("Sex").map(|f| f.value_set.name), Some("SexAssignedAtBirth"));
        assert!(presence_field("Sex").is_none());
    }
}
