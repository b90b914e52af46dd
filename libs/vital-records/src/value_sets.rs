//! Static value set tables
//!
//! Each table maps a bare code to the system and display it belongs to. The
//! coded value bridge uses them to fill in an implicit system and to decide
//! when a code has to fall back to "other".

use phf::phf_ordered_map;
use vitalis_document::ConceptRef;

pub mod systems {
    pub const LOINC: &str = "http://loinc.org";
    pub const SNOMED_CT: &str = "http://snomed.info/sct";
    pub const NULL_FLAVOR: &str = "http://terminology.hl7.org/CodeSystem/v3-NullFlavor";
    pub const ADMINISTRATIVE_GENDER: &str =
        "http://terminology.hl7.org/CodeSystem/v3-AdministrativeGender";
    pub const EDUCATION_LEVEL: &str = "http://terminology.hl7.org/CodeSystem/v3-EducationLevel";
    pub const YES_NO: &str = "http://terminology.hl7.org/CodeSystem/v2-0136";
    pub const OBSERVATION_CATEGORY: &str =
        "http://terminology.hl7.org/CodeSystem/observation-category";
    pub const CONDITION_CATEGORY: &str =
        "http://terminology.hl7.org/CodeSystem/condition-category";
    pub const DOCUMENT_SECTIONS: &str =
        "http://hl7.org/fhir/us/bfdr/CodeSystem/CodeSystem-document-section";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Concept {
    pub display: &'static str,
    pub system: &'static str,
}

/// A fixed table of allowed codes for one field
#[derive(Debug)]
pub struct ValueSet {
    pub name: &'static str,
    pub url: &'static str,
    codes: &'static phf::OrderedMap<&'static str, Concept>,
}

impl ValueSet {
    pub fn lookup(&self, code: &str) -> Option<ConceptRef<'static>> {
        self.codes
            .get_entry(code)
            .map(|(code, concept)| ConceptRef::new(concept.system, *code, concept.display))
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains_key(code)
    }

    /// Allowed codes in declaration order.
    pub fn concepts(&self) -> impl Iterator<Item = ConceptRef<'static>> + '_ {
        self.codes
            .entries()
            .map(|(code, concept)| ConceptRef::new(concept.system, *code, concept.display))
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

// ============================================================================
// Tables
// ============================================================================

static SEX_CODES: phf::OrderedMap<&'static str, Concept> = phf_ordered_map! {
    "M" => Concept { display: "Male", system: systems::ADMINISTRATIVE_GENDER },
    "F" => Concept { display: "Female", system: systems::ADMINISTRATIVE_GENDER },
    "UNK" => Concept { display: "unknown", system: systems::NULL_FLAVOR },
};

pub static SEX_ASSIGNED_AT_BIRTH: ValueSet = ValueSet {
    name: "SexAssignedAtBirth",
    url: "http://hl7.org/fhir/us/vr-common-library/ValueSet/ValueSet-sex-assigned-at-birth-vr",
    codes: &SEX_CODES,
};

static EDUCATION_CODES: phf::OrderedMap<&'static str, Concept> = phf_ordered_map! {
    "ELEM" => Concept { display: "Elementary School", system: systems::EDUCATION_LEVEL },
    "SEC" => Concept { display: "Some secondary or high school education", system: systems::EDUCATION_LEVEL },
    "HS" => Concept { display: "High School or secondary school degree complete", system: systems::EDUCATION_LEVEL },
    "SCOL" => Concept { display: "Some College education", system: systems::EDUCATION_LEVEL },
    "ASSOC" => Concept { display: "Associate's or technical degree complete", system: systems::EDUCATION_LEVEL },
    "BD" => Concept { display: "College or baccalaureate degree complete", system: systems::EDUCATION_LEVEL },
    "GD" => Concept { display: "Graduate or professional Degree complete", system: systems::EDUCATION_LEVEL },
    "POSTG" => Concept { display: "Doctoral or post graduate education", system: systems::EDUCATION_LEVEL },
    "UNK" => Concept { display: "unknown", system: systems::NULL_FLAVOR },
};

pub static EDUCATION_LEVEL: ValueSet = ValueSet {
    name: "EducationLevel",
    url: "http://hl7.org/fhir/us/vr-common-library/ValueSet/ValueSet-education-level-vr",
    codes: &EDUCATION_CODES,
};

static PRESENTATION_CODES: phf::OrderedMap<&'static str, Concept> = phf_ordered_map! {
    "70028003" => Concept { display: "Vertex presentation", system: systems::SNOMED_CT },
    "6096002" => Concept { display: "Breech presentation", system: systems::SNOMED_CT },
    "OTH" => Concept { display: "Other", system: systems::NULL_FLAVOR },
    "UNK" => Concept { display: "unknown", system: systems::NULL_FLAVOR },
};

pub static FETAL_PRESENTATION: ValueSet = ValueSet {
    name: "FetalPresentation",
    url: "http://hl7.org/fhir/us/bfdr/ValueSet/ValueSet-fetal-presentations",
    codes: &PRESENTATION_CODES,
};

static YES_NO_CODES: phf::OrderedMap<&'static str, Concept> = phf_ordered_map! {
    "Y" => Concept { display: "Yes", system: systems::YES_NO },
    "N" => Concept { display: "No", system: systems::YES_NO },
    "UNK" => Concept { display: "unknown", system: systems::NULL_FLAVOR },
};

pub static YES_NO_UNKNOWN: ValueSet = ValueSet {
    name: "YesNoUnknown",
    url: "http://hl7.org/fhir/us/vr-common-library/ValueSet/ValueSet-yes-no-unknown-vr",
    codes: &YES_NO_CODES,
};
