// graph_engine/src/relationship_tracker.rs
//! The only sanctioned way new parent pairs enter the graph during import.

use std::collections::HashMap;

use log::debug;
use models::errors::{GraphResult, ValidationError};
use models::identifiers::VertexId;
use models::properties::RelationshipProperties;

/// Tracks Relationship/ChildHub pairs per unordered parent pair, creating
/// them atomically on first use so callers never have to pre-check.
#[derive(Debug, Default)]
pub struct RelationshipTracker {
    default_weight: u32,
    hub_by_pair: HashMap<(VertexId, VertexId), VertexId>,
}

impl RelationshipTracker {
    pub fn new(default_weight: u32) -> Self {
        RelationshipTracker {
            default_weight,
            hub_by_pair: HashMap::new(),
        }
    }

    /// Returns the ChildHub joining the two parents, creating the
    /// Relationship + ChildHub pair if the parents are not partnered yet.
    /// Calling this twice for the same unordered pair returns the same hub.
    pub fn create_or_get_childhub(
        &mut self,
        graph: &mut crate::graph::PedigreeGraph,
        mother: VertexId,
        father: VertexId,
    ) -> GraphResult<VertexId> {
        if mother == father {
            return Err(ValidationError::PartnerPairNotDistinct(mother).into());
        }
        let key = if mother < father {
            (mother, father)
        } else {
            (father, mother)
        };
        if let Some(&hub) = self.hub_by_pair.get(&key) {
            return Ok(hub);
        }
        // The pair may already be partnered in a graph this tracker did not
        // build (e.g. a graph assembled across several import phases).
        if let Some(rel) = graph.get_relationship_node(mother, father) {
            if let Some(hub) = graph.child_hub_of(rel) {
                self.hub_by_pair.insert(key, hub);
                return Ok(hub);
            }
        }
        let rel = graph.add_relationship(RelationshipProperties::default());
        graph.add_edge(mother, rel, self.default_weight)?;
        graph.add_edge(father, rel, self.default_weight)?;
        let hub = graph.add_child_hub();
        graph.add_edge(rel, hub, self.default_weight)?;
        debug!(
            "created relationship {} with child hub {} for parents {} and {}",
            rel, hub, mother, father
        );
        self.hub_by_pair.insert(key, hub);
        Ok(hub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PedigreeGraph;
    use models::edges::DEFAULT_EDGE_WEIGHT;
    use models::properties::{Gender, PersonProperties};

    #[test]
    fn should_return_the_same_hub_for_the_same_pair() {
        let mut graph = PedigreeGraph::new();
        let mother = graph.add_person(PersonProperties::with_gender(Gender::F));
        let father = graph.add_person(PersonProperties::with_gender(Gender::M));
        let mut tracker = RelationshipTracker::new(DEFAULT_EDGE_WEIGHT);

        let hub1 = tracker
            .create_or_get_childhub(&mut graph, mother, father)
            .unwrap();
        let hub2 = tracker
            .create_or_get_childhub(&mut graph, father, mother)
            .unwrap();
        assert_eq!(hub1, hub2);
        // one relationship, one hub
        assert_eq!(graph.relationship_ids().count(), 1);
    }

    #[test]
    fn should_reuse_a_pair_already_in_the_graph() {
        let mut graph = PedigreeGraph::new();
        let mother = graph.add_person(PersonProperties::with_gender(Gender::F));
        let father = graph.add_person(PersonProperties::with_gender(Gender::M));
        let mut first = RelationshipTracker::new(DEFAULT_EDGE_WEIGHT);
        let hub1 = first
            .create_or_get_childhub(&mut graph, mother, father)
            .unwrap();

        let mut second = RelationshipTracker::new(DEFAULT_EDGE_WEIGHT);
        let hub2 = second
            .create_or_get_childhub(&mut graph, mother, father)
            .unwrap();
        assert_eq!(hub1, hub2);
    }

    #[test]
    fn should_reject_a_person_partnered_with_themself() {
        let mut graph = PedigreeGraph::new();
        let only = graph.add_person(PersonProperties::with_gender(Gender::U));
        let mut tracker = RelationshipTracker::new(DEFAULT_EDGE_WEIGHT);
        assert!(tracker
            .create_or_get_childhub(&mut graph, only, only)
            .is_err());
    }
}
