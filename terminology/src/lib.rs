// terminology/src/lib.rs
pub mod resolver;
pub mod role_codes;
pub mod systems;

pub use resolver::{NullResolver, TerminologyResolver};
pub use role_codes::{
    role_coding, Coding, EXTENDED_FAMILY_MEMBER, FAMILY_MEMBER, FAMILY_MEMBER_ROLES,
    GA4GH_REL_CODES, ROLE_TO_REL, SEX_CODES,
};
