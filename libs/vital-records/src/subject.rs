//! Subject role table
//!
//! Every statement in a record is about one subject (the newborn, the mother, ...).
//! Roles resolve to the profile that tags their anchor node in the document.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubjectRole {
    Child,
    Mother,
    Father,
    DecedentFetus,
}

impl SubjectRole {
    pub const ALL: [SubjectRole; 4] = [
        SubjectRole::Child,
        SubjectRole::Mother,
        SubjectRole::Father,
        SubjectRole::DecedentFetus,
    ];

    pub fn code(self) -> &'static str {
        match self {
            SubjectRole::Child => "CHILD",
            SubjectRole::Mother => "MTH",
            SubjectRole::Father => "FTH",
            SubjectRole::DecedentFetus => "FETUS",
        }
    }

    /// Resolve a role code. Unknown codes are rejected rather than guessed,
    /// since a wrong role would file data under the wrong subject.
    pub fn from_code(code: &str) -> Result<Self> {
        let code = code.trim();
        Self::ALL
            .into_iter()
            .find(|role| role.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| Error::UnknownRole(code.to_string()))
    }

    pub fn profile(self) -> &'static str {
        match self {
            SubjectRole::Child => "http://hl7.org/fhir/us/bfdr/StructureDefinition/Patient-child",
            SubjectRole::Mother => "http://hl7.org/fhir/us/bfdr/StructureDefinition/Patient-mother",
            SubjectRole::Father => {
                "http://hl7.org/fhir/us/vr-common-library/StructureDefinition/RelatedPerson-father-natural-vr"
            }
            SubjectRole::DecedentFetus => {
                "http://hl7.org/fhir/us/bfdr/StructureDefinition/Patient-decedent-fetus"
            }
        }
    }

    pub fn resource_type(self) -> &'static str {
        match self {
            SubjectRole::Father => "RelatedPerson",
            _ => "Patient",
        }
    }

    /// A minimal anchor node for this role with a fresh identity.
    pub fn anchor_resource(self) -> Value {
        json!({
            "resourceType": self.resource_type(),
            "id": Uuid::new_v4().to_string(),
            "meta": { "profile": [self.profile()] }
        })
    }
}

impl fmt::Display for SubjectRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SubjectRole::Child => "child",
            SubjectRole::Mother => "mother",
            SubjectRole::Father => "father",
            SubjectRole::DecedentFetus => "decedent fetus",
        };
        f.write_str(label)
    }
}

impl FromStr for SubjectRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_code(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_codes_round_trip() {
        for role in SubjectRole::ALL {
            assert_eq!(SubjectRole::from_code(role.code()).unwrap(), role);
        }
        assert_eq!("mth".parse::<SubjectRole>().unwrap(), SubjectRole::Mother);
    }

    #[test]
    fn unknown_role_is_an_error() {
        let err = SubjectRole::from_code("GRANDMA").unwrap_err();
        assert!(matches!(err, Error::UnknownRole(code) if code == "GRANDMA"));
    }

    #[test]
    fn anchors_carry_role_profile() {
        let father = SubjectRole::Father.anchor_resource();
        assert_eq!(father["resourceType"], "RelatedPerson");
        assert_eq!(father["meta"]["profile"][0], SubjectRole::Father.profile());
        assert_ne!(
            SubjectRole::Child.anchor_resource()["id"],
            SubjectRole::Child.anchor_resource()["id"]
        );
    }
}
