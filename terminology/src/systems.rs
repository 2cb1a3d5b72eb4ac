// terminology/src/systems.rs
//! Code system and profile URIs used across the converters.

pub const ADMINISTRATIVE_GENDER: &str = "http://hl7.org/fhir/administrative-gender";
pub const V3_ROLE_CODE: &str = "http://terminology.hl7.org/CodeSystem/v3-RoleCode";
pub const SNOMED_CT: &str = "http://snomed.info/sct";
pub const LOINC: &str = "http://loinc.org";
pub const GA4GH_REL: &str = "http://purl.org/ga4gh/rel.fhir";

pub const OMIM: &str = "http://www.omim.org";
pub const HPO: &str = "http://purl.obolibrary.org/obo/hp.owl";
pub const HGNC: &str = "http://www.genenames.org";

pub const PEDIGREE_PROFILE: &str =
    "http://purl.org/ga4gh/pedigree-fhir-ig/StructureDefinition/Pedigree";
pub const PEDIGREE_INDIVIDUAL_PROFILE: &str =
    "http://purl.org/ga4gh/pedigree-fhir-ig/StructureDefinition/PedigreeIndividual";
pub const PEDIGREE_RELATIONSHIP_PROFILE: &str =
    "http://purl.org/ga4gh/pedigree-fhir-ig/StructureDefinition/PedigreeRelationship";
pub const PEDIGREE_SECTION_TYPE: &str =
    "http://purl.org/ga4gh/pedigree-fhir-ig/CodeSystem/SectionType";
pub const PATIENT_UNBORN_EXTENSION: &str =
    "http://purl.org/ga4gh/pedigree-fhir-ig/StructureDefinition/patient-unborn";

pub const GENETICS_PARENT_EXTENSION: &str =
    "http://hl7.org/fhir/StructureDefinition/family-member-history-genetics-parent";
pub const GENETICS_OBSERVATION_EXTENSION: &str =
    "http://hl7.org/fhir/StructureDefinition/family-member-history-genetics-observation";
pub const PATIENT_RECORD_EXTENSION: &str =
    "http://hl7.org/fhir/StructureDefinition/familymemberhistory-patient-record";

pub const OPEN_PEDIGREE_EXTERNAL_ID: &str =
    "https://github.com/phenotips/open-pedigree?externalID";

// SNOMED codes for carrier / childless observations
pub const SNOMED_CARRIER: &str = "87955000";
pub const SNOMED_PRESYMPTOMATIC: &str = "24800002";
pub const SNOMED_INFERTILE: &str = "8619003";
pub const SNOMED_NUMBER_OF_OFFSPRING: &str = "224118004";
