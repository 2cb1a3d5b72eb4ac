// models/src/identifiers.rs
use std::fmt;

use serde::{Deserialize, Serialize};

/// Dense vertex identifier, stable for the life of the graph.
///
/// Ids are handed out sequentially by the graph and double as the index
/// into its vertex table. The proband is vertex 0 by convention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VertexId(pub u32);

impl VertexId {
    pub const PROBAND: VertexId = VertexId(0);

    pub fn new(id: u32) -> Self {
        VertexId(id)
    }

    pub fn from_index(index: usize) -> Self {
        VertexId(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::VertexId;

    #[test]
    fn should_round_trip_through_index() {
        let id = VertexId::from_index(42);
        assert_eq!(id.index(), 42);
        assert_eq!(id, VertexId::new(42));
    }

    #[test]
    fn proband_is_vertex_zero() {
        assert_eq!(VertexId::PROBAND.index(), 0);
    }
}
