// models/src/errors.rs
use serde_json::Error as SerdeJsonError;
pub use thiserror::Error;

use crate::identifiers::VertexId;

/// Errors raised while importing external records or mutating the graph.
///
/// Import failures carry the wording shown to the caller; no partial graph
/// is ever returned alongside one of these.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("unable to import pedigree: input is not a valid JSON string: {0}")]
    MalformedInput(String),
    #[error("unable to import pedigree: input is not a resource type we understand")]
    UnsupportedResource,
    #[error("unable to import pedigree: ambiguous reference to [{0}]")]
    AmbiguousReference(String),
    #[error("unable to import pedigree: [{reference}] is not a valid {role} reference (does not correspond to a name or an ID of another person)")]
    UnresolvedReference { reference: String, role: String },
    #[error("unable to import pedigree: multiple persons with the same ID [{0}]")]
    DuplicateExternalId(String),
    #[error("unable to import pedigree: a person is declared to be his or her own parent")]
    SelfParent,
    #[error("unable to import pedigree: a person declared as {declared} is also declared as being a {role} ({reference})")]
    ParentGenderContradiction {
        declared: String,
        role: String,
        reference: String,
    },
    #[error("unable to import pedigree: a node with no ID or name is found")]
    MissingIdentity,
    #[error("unable to import pedigree: record [{0}] cannot be placed in the family tree")]
    UnplaceableRecord(String),
    #[error("vertex {0} does not exist")]
    UnknownVertex(VertexId),
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

// JSON parse failures are always malformed input from the importer's
// point of view.
impl From<SerdeJsonError> for GraphError {
    fn from(err: SerdeJsonError) -> Self {
        GraphError::MalformedInput(err.to_string())
    }
}

/// Structural invariant violations detected by `validate()`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("edge from {from} ({from_kind}) to {to} ({to_kind}) is not a legal connection")]
    IllegalEdge {
        from: VertexId,
        from_kind: &'static str,
        to: VertexId,
        to_kind: &'static str,
    },
    #[error("person {0} is attached to more than one child hub")]
    MultipleParentSets(VertexId),
    #[error("relationship {0} must connect exactly two distinct persons")]
    MalformedRelationship(VertexId),
    #[error("relationship {0} must have exactly one child hub")]
    MissingChildHub(VertexId),
    #[error("child hub {0} is not attached to exactly one relationship")]
    OrphanChildHub(VertexId),
    #[error("persons {0} and {1} are connected by more than one relationship")]
    DuplicatePartnership(VertexId, VertexId),
    #[error("a relationship must connect two distinct persons, got {0} twice")]
    PartnerPairNotDistinct(VertexId),
}

/// A `Result` that fails with a `GraphError`.
pub type GraphResult<T> = Result<T, GraphError>;

/// A `Result` that fails with a `ValidationError`.
pub type ValidationResult<T> = Result<T, ValidationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_wrap_serde_errors_as_malformed_input() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let graph_err = GraphError::from(err);
        assert!(matches!(graph_err, GraphError::MalformedInput(_)));
        assert!(graph_err.to_string().starts_with("unable to import pedigree"));
    }

    #[test]
    fn should_render_reference_errors_with_role() {
        let err = GraphError::UnresolvedReference {
            reference: "aunt-42".to_string(),
            role: "mother".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("[aunt-42]"));
        assert!(msg.contains("mother reference"));
    }
}
