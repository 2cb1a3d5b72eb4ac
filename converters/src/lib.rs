// converters/src/lib.rs
//! Format converters for the pedigree graph: three import reconcilers
//! (clinical FHIR, GA4GH pedigree FHIR, questionnaire), the kinship role
//! classifier, and the matching export assemblers.

pub mod dates;
pub mod fhir;
pub mod ga4gh;
pub mod json_util;
pub mod kinship;
pub mod name_splitter;
pub mod questionnaire;
pub mod reconcile;

pub use kinship::{classify, KinshipRoles, RoleToken};
pub use name_splitter::{NameSplitter, SplitName, WhitespaceNameSplitter};

use serde::{Deserialize, Serialize};

/// How much personal detail the exporters may emit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    /// Names, dates and free text are all emitted.
    #[default]
    All,
    /// Structure and medical data only; no names or dates.
    NoPersonal,
    /// As NoPersonal, and free-text comments are dropped too.
    Minimal,
}

impl Privacy {
    pub fn include_personal(self) -> bool {
        matches!(self, Privacy::All)
    }

    pub fn include_comments(self) -> bool {
        !matches!(self, Privacy::Minimal)
    }
}
