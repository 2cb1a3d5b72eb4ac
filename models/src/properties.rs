// models/src/properties.rs
//! Closed property shapes for the three vertex kinds.
//!
//! The external formats carry loosely typed bags; everything that survives
//! import is normalized into these structs so the rest of the engine never
//! touches stringly-typed keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Administrative gender as recorded on a pedigree node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    M,
    F,
    #[default]
    U,
}

impl Gender {
    /// The FHIR administrative-gender code for this value.
    pub fn fhir_code(self) -> &'static str {
        match self {
            Gender::M => "male",
            Gender::F => "female",
            Gender::U => "unknown",
        }
    }

    pub fn from_fhir_code(code: &str) -> Gender {
        match code {
            "male" => Gender::M,
            "female" => Gender::F,
            _ => Gender::U,
        }
    }

    /// Opposite gender, used when synthesizing a missing partner.
    pub fn opposite(self) -> Gender {
        match self {
            Gender::M => Gender::F,
            Gender::F => Gender::M,
            Gender::U => Gender::U,
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Gender::M => "M",
            Gender::F => "F",
            Gender::U => "U",
        };
        write!(f, "{}", s)
    }
}

/// Life status beyond the implicit "alive".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifeStatus {
    Deceased,
    Stillborn,
    Miscarriage,
    Aborted,
    Unborn,
}

impl LifeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LifeStatus::Deceased => "deceased",
            LifeStatus::Stillborn => "stillborn",
            LifeStatus::Miscarriage => "miscarriage",
            LifeStatus::Aborted => "aborted",
            LifeStatus::Unborn => "unborn",
        }
    }

    /// The statuses that describe a pregnancy rather than a born person.
    pub fn is_fetal(self) -> bool {
        !matches!(self, LifeStatus::Deceased)
    }
}

impl FromStr for LifeStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deceased" => Ok(LifeStatus::Deceased),
            "stillborn" => Ok(LifeStatus::Stillborn),
            "miscarriage" => Ok(LifeStatus::Miscarriage),
            "aborted" => Ok(LifeStatus::Aborted),
            "unborn" => Ok(LifeStatus::Unborn),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CarrierStatus {
    Carrier,
    Presymptomatic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChildlessStatus {
    Childless,
    Infertile,
}

/// Consanguinity flag on a partnership.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Consanguinity {
    /// No blood relation recorded or detected.
    #[default]
    None,
    /// Explicitly recorded consanguineous partnership ("Y").
    Confirmed,
    /// Possible: partners share an ancestor within three generations ("A").
    Possible,
}

impl Consanguinity {
    pub fn code(self) -> Option<&'static str> {
        match self {
            Consanguinity::None => None,
            Consanguinity::Confirmed => Some("Y"),
            Consanguinity::Possible => Some("A"),
        }
    }
}

/// Everything known about one person in the pedigree.
///
/// All fields are optional except gender; absence of `life_status` means
/// alive. Dates are month/day/year display strings as entered; partial or
/// free-text dates live in `comments` instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonProperties {
    pub gender: Gender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub life_status: Option<LifeStatus>,
    /// Gestation age in weeks, for the fetal life statuses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gestation_age: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name_at_birth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dod: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disorders: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hpo_terms: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidate_genes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carrier_status: Option<CarrierStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub childless_status: Option<ChildlessStatus>,
    /// Shared id across co-twins; symmetric and transitive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twin_group: Option<u32>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub monozygotic: bool,
    /// Affects relationship-role wording only.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub adopted: bool,
}

impl PersonProperties {
    pub fn with_gender(gender: Gender) -> Self {
        PersonProperties {
            gender,
            ..Default::default()
        }
    }

    /// A synthesized stand-in for a known-to-exist but undocumented relative.
    pub fn placeholder(gender: Gender) -> Self {
        PersonProperties {
            gender,
            comments: Some("unknown".to_string()),
            ..Default::default()
        }
    }

    /// Appends a line to the free-text comments.
    pub fn push_comment(&mut self, line: &str) {
        match &mut self.comments {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(line);
            }
            None => self.comments = Some(line.to_string()),
        }
    }

    /// True when none of the identity fields survived extraction.
    pub fn has_identity(&self) -> bool {
        self.first_name.is_some() || self.external_id.is_some()
    }
}

/// Properties of a partnership vertex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipProperties {
    pub consangr: Consanguinity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_append_comment_lines() {
        let mut props = PersonProperties::default();
        props.push_comment("b. 1968");
        props.push_comment("d. 43y");
        assert_eq!(props.comments.as_deref(), Some("b. 1968\nd. 43y"));
    }

    #[test]
    fn placeholder_is_marked_unknown() {
        let props = PersonProperties::placeholder(Gender::F);
        assert_eq!(props.gender, Gender::F);
        assert_eq!(props.comments.as_deref(), Some("unknown"));
    }

    #[test]
    fn should_parse_life_status_strings() {
        assert_eq!("stillborn".parse(), Ok(LifeStatus::Stillborn));
        assert!("alive".parse::<LifeStatus>().is_err());
        assert!(LifeStatus::Stillborn.is_fetal());
        assert!(!LifeStatus::Deceased.is_fetal());
    }

    #[test]
    fn consanguinity_codes_match_the_wire_values() {
        assert_eq!(Consanguinity::Confirmed.code(), Some("Y"));
        assert_eq!(Consanguinity::Possible.code(), Some("A"));
        assert_eq!(Consanguinity::None.code(), None);
    }

    #[test]
    fn gender_fhir_codes_round_trip() {
        for g in [Gender::M, Gender::F, Gender::U] {
            assert_eq!(Gender::from_fhir_code(g.fhir_code()), g);
        }
        assert_eq!(Gender::from_fhir_code("other"), Gender::U);
    }
}
