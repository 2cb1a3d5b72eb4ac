// terminology/src/role_codes.rs
//! Canonical coding tables for family-member roles.
//!
//! These vectors and maps act as the single source for every relationship
//! code the exporters may emit: the HL7 v3 RoleCode vocabulary used by
//! clinical FamilyMemberHistory resources and the GA4GH `rel.fhir` codes
//! used by the pedigree profile.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde_json::{json, Value};

use crate::systems;

/// One system/code/display row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coding {
    pub system: &'static str,
    pub code: &'static str,
    pub display: &'static str,
}

impl Coding {
    pub fn to_json(&self) -> Value {
        json!({
            "system": self.system,
            "code": self.code,
            "display": self.display,
        })
    }
}

const fn role(code: &'static str, display: &'static str) -> Coding {
    Coding {
        system: systems::V3_ROLE_CODE,
        code,
        display,
    }
}

const fn rel(code: &'static str, display: &'static str) -> Coding {
    Coding {
        system: systems::GA4GH_REL,
        code,
        display,
    }
}

/// Fallback coding for a person the classifier could not place.
pub static EXTENDED_FAMILY_MEMBER: Coding = role("EXT", "extended family member");

/// Fallback coding for a person with no role at all.
pub static FAMILY_MEMBER: Coding = role("FAMMEMB", "family member");

/// HL7 v3 RoleCode rows keyed by the kinship role token.
pub static FAMILY_MEMBER_ROLES: Lazy<HashMap<&'static str, Coding>> = Lazy::new(|| {
    HashMap::from([
        ("ONESELF", role("ONESELF", "self")),
        ("FAMMEMB", role("FAMMEMB", "family member")),
        ("NMTH", role("NMTH", "natural mother")),
        ("NFTH", role("NFTH", "natural father")),
        ("NPRN", role("NPRN", "natural parent")),
        ("ADOPTMTH", role("ADOPTM", "adoptive mother")),
        ("ADOPTFTH", role("ADOPTF", "adoptive father")),
        ("ADOPTPRN", role("ADOPTP", "adoptive parent")),
        ("DAU", role("DAU", "natural daughter")),
        ("SON", role("SON", "natural son")),
        ("NCHILD", role("NCHILD", "natural child")),
        ("DAUADOPT", role("DAUADOPT", "adopted daughter")),
        ("SONADOPT", role("SONADOPT", "adopted son")),
        ("CHLDADOPT", role("CHLDADOPT", "adopted child")),
        ("DAUINLAW", role("DAUINLAW", "daughter in-law")),
        ("SONINLAW", role("SONINLAW", "son in-law")),
        ("CHLDINLAW", role("CHLDINLAW", "child-in-law")),
        ("SIGOTHR", role("SIGOTHR", "significant other")),
        ("STPDAU", role("STPDAU", "stepdaughter")),
        ("STPSON", role("STPSON", "stepson")),
        ("STPCHLD", role("STPCHLD", "step child")),
        ("TWINSIS", role("TWINSIS", "twin sister")),
        ("TWINBRO", role("TWINBRO", "twin brother")),
        ("TWIN", role("TWIN", "twin")),
        ("FTWINSIS", role("FTWINSIS", "fraternal twin sister")),
        ("FTWINBRO", role("FTWINBRO", "fraternal twin brother")),
        ("NSIS", role("NSIS", "natural sister")),
        ("NBRO", role("NBRO", "natural brother")),
        ("NSIB", role("NSIB", "natural sibling")),
        ("HSIS", role("HSIS", "half-sister")),
        ("HBRO", role("HBRO", "half-brother")),
        ("HSIB", role("HSIB", "half-sibling")),
        ("STPSIS", role("STPSIS", "stepsister")),
        ("STPBRO", role("STPBRO", "stepbrother")),
        ("STPSIB", role("STPSIB", "step sibling")),
        ("BROINLAW", role("BROINLAW", "brother-in-law")),
        ("SISINLAW", role("SISINLAW", "sister-in-law")),
        ("SIBINLAW", role("SIBINLAW", "sibling in-law")),
        ("GRNDDAU", role("GRNDDAU", "granddaughter")),
        ("GRNDSON", role("GRNDSON", "grandson")),
        ("GRNDCHILD", role("GRNDCHILD", "grandchild")),
        ("GGRNDDAU", role("GGRNDDAU", "great granddaughter")),
        ("GGRNDSON", role("GGRNDSON", "great grandson")),
        ("GGRNDCHILD", role("GGRNDCHILD", "great grandchild")),
        ("NIECE", role("NIECE", "niece")),
        ("NEPHEW", role("NEPHEW", "nephew")),
        ("NIENEPH", role("NIENEPH", "niece/nephew")),
        ("GNIECE", role("GNIECE", "grandniece")),
        ("GNEPHEW", role("GNEPHEW", "grandnephew")),
        ("GNIENEPH", role("GNIENEPH", "grandniece/grandnephew")),
        ("MCOUSN", role("MCOUSN", "maternal cousin")),
        ("PCOUSN", role("PCOUSN", "paternal cousin")),
        ("COUSN", role("COUSN", "cousin")),
        ("MTHINLAW", role("MTHINLAW", "mother-in-law")),
        ("FTHINLAW", role("FTHINLAW", "father-in-law")),
        ("PRNINLAW", role("PRNINLAW", "parent in-law")),
        ("MAUNT", role("MAUNT", "maternal aunt")),
        ("PAUNT", role("PAUNT", "paternal aunt")),
        ("AUNT", role("AUNT", "aunt")),
        ("MUNCLE", role("MUNCLE", "maternal uncle")),
        ("PUNCLE", role("PUNCLE", "paternal uncle")),
        ("UNCLE", role("UNCLE", "uncle")),
        ("PIBLING", role("PIBLING", "parent sibling")),
        ("GRPRN", role("GRPRN", "grandparent")),
        ("GRFTH", role("GRFTH", "grandfather")),
        ("MGRFTH", role("MGRFTH", "maternal grandfather")),
        ("PGRFTH", role("PGRFTH", "paternal grandfather")),
        ("GRMTH", role("GRMTH", "grandmother")),
        ("MGRMTH", role("MGRMTH", "maternal grandmother")),
        ("PGRMTH", role("PGRMTH", "paternal grandmother")),
        ("MGRPRN", role("MGRPRN", "maternal grandparent")),
        ("PGRPRN", role("PGRPRN", "paternal grandparent")),
        ("GGRPRN", role("GGRPRN", "great grandparent")),
        ("GGRFTH", role("GGRFTH", "great grandfather")),
        ("MGGRFTH", role("MGGRFTH", "maternal great-grandfather")),
        ("PGGRFTH", role("PGGRFTH", "paternal great-grandfather")),
        ("GGRMTH", role("GGRMTH", "great grandmother")),
        ("MGGRMTH", role("MGGRMTH", "maternal great-grandmother")),
        ("PGGRMTH", role("PGGRMTH", "paternal great-grandmother")),
        ("MGGRPRN", role("MGGRPRN", "maternal great-grandparent")),
        ("PGGRPRN", role("PGGRPRN", "paternal great-grandparent")),
        ("STPMTH", role("STPMTH", "stepmother")),
        ("STPFTH", role("STPFTH", "stepfather")),
        ("STPPRN", role("STPPRN", "step parent")),
    ])
});

/// Administrative gender codings keyed by FHIR code.
pub static SEX_CODES: Lazy<HashMap<&'static str, Coding>> = Lazy::new(|| {
    HashMap::from([
        (
            "male",
            Coding {
                system: systems::ADMINISTRATIVE_GENDER,
                code: "male",
                display: "Male",
            },
        ),
        (
            "female",
            Coding {
                system: systems::ADMINISTRATIVE_GENDER,
                code: "female",
                display: "Female",
            },
        ),
        (
            "other",
            Coding {
                system: systems::ADMINISTRATIVE_GENDER,
                code: "other",
                display: "Other",
            },
        ),
        (
            "unknown",
            Coding {
                system: systems::ADMINISTRATIVE_GENDER,
                code: "unknown",
                display: "Unknown",
            },
        ),
    ])
});

/// GA4GH `rel.fhir` codings keyed by REL code.
pub static GA4GH_REL_CODES: Lazy<HashMap<&'static str, Coding>> = Lazy::new(|| {
    HashMap::from([
        ("REL:001", rel("REL:001", "Relative")),
        ("REL:002", rel("REL:002", "Biological relative")),
        ("REL:003", rel("REL:003", "Biological parent")),
        ("REL:004", rel("REL:004", "Sperm / ovum donor")),
        ("REL:005", rel("REL:005", "Gestational carrier")),
        ("REL:006", rel("REL:006", "Surrogate ovum donor")),
        ("REL:007", rel("REL:007", "Biological sibling")),
        ("REL:008", rel("REL:008", "Full sibling")),
        ("REL:009", rel("REL:009", "Twin")),
        ("REL:010", rel("REL:010", "Monozygotic twin")),
        ("REL:011", rel("REL:011", "Polyzygotic twin")),
        ("REL:012", rel("REL:012", "Half-sibling")),
        ("REL:013", rel("REL:013", "parental-sibling")),
        ("REL:014", rel("REL:014", "Cousin")),
        ("REL:015", rel("REL:015", "Maternal cousin")),
        ("REL:016", rel("REL:016", "Paternal cousin")),
        ("REL:017", rel("REL:017", "Grandparent")),
        ("REL:018", rel("REL:018", "Great-grandparent")),
        ("REL:019", rel("REL:019", "Social / legal relative")),
        ("REL:020", rel("REL:020", "Parent figure")),
        ("REL:021", rel("REL:021", "Foster parent")),
        ("REL:022", rel("REL:022", "Adoptive parent")),
        ("REL:023", rel("REL:023", "Step-parent")),
        ("REL:024", rel("REL:024", "Sibling figure")),
        ("REL:025", rel("REL:025", "Step-sibling")),
        ("REL:026", rel("REL:026", "Significant other")),
        ("REL:027", rel("REL:027", "Biological mother")),
        ("REL:028", rel("REL:028", "Biological father")),
        ("REL:029", rel("REL:029", "mitochondrial donor")),
        ("REL:030", rel("REL:030", "Consanguineous partner")),
    ])
});

/// Kinship role token → GA4GH REL code, for the pedigree-profile export.
pub static ROLE_TO_REL: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("NMTH", "REL:027"),
        ("NFTH", "REL:028"),
        ("NPRN", "REL:003"),
        ("ADOPTMTH", "REL:022"),
        ("ADOPTFTH", "REL:022"),
        ("ADOPTPRN", "REL:022"),
        ("SIGOTHR", "REL:026"),
        ("CONSANG", "REL:030"),
        ("TWIN", "REL:009"),
        ("TWINSIS", "REL:010"),
        ("TWINBRO", "REL:010"),
        ("FTWINSIS", "REL:011"),
        ("FTWINBRO", "REL:011"),
    ])
});

/// Looks up the v3 RoleCode coding for a role token. Unknown tokens fall
/// back to "extended family member"; an absent role means plain
/// "family member".
pub fn role_coding(role: Option<&str>) -> &'static Coding {
    match role {
        None | Some("") => &FAMILY_MEMBER,
        Some(token) => FAMILY_MEMBER_ROLES
            .get(token)
            .unwrap_or(&EXTENDED_FAMILY_MEMBER),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_fall_back_for_unknown_and_missing_roles() {
        assert_eq!(role_coding(Some("MGRMTH")).code, "MGRMTH");
        assert_eq!(role_coding(Some("NO-SUCH-ROLE")).code, "EXT");
        assert_eq!(role_coding(None).code, "FAMMEMB");
        assert_eq!(role_coding(Some("")).code, "FAMMEMB");
    }

    #[test]
    fn adoptive_roles_map_to_their_v3_codes() {
        assert_eq!(role_coding(Some("ADOPTMTH")).code, "ADOPTM");
        assert_eq!(role_coding(Some("ADOPTFTH")).code, "ADOPTF");
    }

    #[test]
    fn twin_roles_map_to_rel_codes() {
        assert_eq!(ROLE_TO_REL["TWINSIS"], "REL:010");
        assert_eq!(ROLE_TO_REL["FTWINBRO"], "REL:011");
        assert_eq!(GA4GH_REL_CODES["REL:030"].display, "Consanguineous partner");
    }
}
