// graph_engine/src/lib.rs
pub mod graph;
pub mod relationship_tracker;
pub mod traversal;

// Re-export the exact types the rest of the engine uses
pub use graph::PedigreeGraph;
pub use models::edges::{Edge, DEFAULT_EDGE_WEIGHT};
pub use models::errors::{GraphError, GraphResult, ValidationError};
pub use models::identifiers::VertexId;
pub use models::properties::{Gender, PersonProperties, RelationshipProperties};
pub use models::vertices::{Vertex, VertexKind};
pub use relationship_tracker::RelationshipTracker;
