// models/src/lib.rs

// Declare all top-level modules within the 'models' crate
pub mod edges;
pub mod errors;
pub mod identifiers;
pub mod properties;
pub mod vertices;

// Re-export the core types for convenience when other crates use 'models::*'
pub use edges::{Edge, DEFAULT_EDGE_WEIGHT};
pub use errors::{GraphError, GraphResult, ValidationError, ValidationResult};
pub use identifiers::VertexId;
pub use properties::{
    CarrierStatus, ChildlessStatus, Consanguinity, Gender, LifeStatus, PersonProperties,
    RelationshipProperties,
};
pub use vertices::{Vertex, VertexKind};
