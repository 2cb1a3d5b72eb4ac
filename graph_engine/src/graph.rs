// graph_engine/src/graph.rs
//! Core in-memory pedigree graph.
//!
//! Vertices live in a dense table indexed by `VertexId`; edges are kept in
//! per-vertex adjacency lists in both directions. Mutation is append-only
//! plus in-place property edits; reconciliation never removes a vertex.

use std::collections::{HashMap, HashSet};

use models::edges::Edge;
use models::errors::{GraphResult, ValidationError};
use models::identifiers::VertexId;
use models::properties::{Gender, PersonProperties, RelationshipProperties};
use models::vertices::{Vertex, VertexKind};

#[derive(Debug, Default, Clone)]
pub struct PedigreeGraph {
    vertices: Vec<Vertex>,
    out_edges: Vec<Vec<Edge>>,
    in_edges: Vec<Vec<Edge>>,
}

impl PedigreeGraph {
    pub fn new() -> Self {
        PedigreeGraph::default()
    }

    fn push_vertex(&mut self, kind: VertexKind) -> VertexId {
        let id = VertexId::from_index(self.vertices.len());
        self.vertices.push(Vertex::new(id, kind));
        self.out_edges.push(Vec::new());
        self.in_edges.push(Vec::new());
        id
    }

    pub fn add_person(&mut self, properties: PersonProperties) -> VertexId {
        self.push_vertex(VertexKind::Person(Box::new(properties)))
    }

    pub fn add_relationship(&mut self, properties: RelationshipProperties) -> VertexId {
        self.push_vertex(VertexKind::Relationship(properties))
    }

    pub fn add_child_hub(&mut self) -> VertexId {
        self.push_vertex(VertexKind::ChildHub)
    }

    /// Adds a directed edge, rejecting connections the pedigree shape does
    /// not allow (the only legal ones are Person→Relationship,
    /// Relationship→ChildHub and ChildHub→Person).
    pub fn add_edge(&mut self, from: VertexId, to: VertexId, weight: u32) -> GraphResult<()> {
        let from_kind = self
            .vertex(from)
            .ok_or(models::errors::GraphError::UnknownVertex(from))?
            .kind
            .name();
        let to_kind = self
            .vertex(to)
            .ok_or(models::errors::GraphError::UnknownVertex(to))?
            .kind
            .name();
        let legal = matches!(
            (from_kind, to_kind),
            ("Person", "Relationship") | ("Relationship", "ChildHub") | ("ChildHub", "Person")
        );
        if !legal {
            return Err(ValidationError::IllegalEdge {
                from,
                from_kind,
                to,
                to_kind,
            }
            .into());
        }
        let edge = Edge::new(from, to, weight);
        self.out_edges[from.index()].push(edge);
        self.in_edges[to.index()].push(edge);
        Ok(())
    }

    // ---------------------------------------------------------------
    // Vertex access
    // ---------------------------------------------------------------

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(id.index())
    }

    pub fn person(&self, id: VertexId) -> Option<&PersonProperties> {
        self.vertex(id).and_then(Vertex::as_person)
    }

    pub fn person_mut(&mut self, id: VertexId) -> Option<&mut PersonProperties> {
        self.vertices.get_mut(id.index()).and_then(Vertex::as_person_mut)
    }

    pub fn relationship(&self, id: VertexId) -> Option<&RelationshipProperties> {
        self.vertex(id).and_then(Vertex::as_relationship)
    }

    pub fn relationship_mut(&mut self, id: VertexId) -> Option<&mut RelationshipProperties> {
        self.vertices
            .get_mut(id.index())
            .and_then(Vertex::as_relationship_mut)
    }

    pub fn is_person(&self, id: VertexId) -> bool {
        self.vertex(id).is_some_and(Vertex::is_person)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn max_vertex_id(&self) -> Option<VertexId> {
        self.vertices.last().map(|v| v.id)
    }

    /// All Person vertex ids, in id order.
    pub fn person_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices
            .iter()
            .filter(|v| v.is_person())
            .map(|v| v.id)
    }

    pub fn outgoing(&self, id: VertexId) -> &[Edge] {
        self.out_edges.get(id.index()).map_or(&[], Vec::as_slice)
    }

    pub fn incoming(&self, id: VertexId) -> &[Edge] {
        self.in_edges.get(id.index()).map_or(&[], Vec::as_slice)
    }

    // ---------------------------------------------------------------
    // Family structure queries
    // ---------------------------------------------------------------

    /// The ChildHub this person hangs off, if any.
    pub fn parent_hub(&self, person: VertexId) -> Option<VertexId> {
        self.incoming(person)
            .iter()
            .map(|e| e.from)
            .find(|&v| matches!(self.vertex(v).map(|v| &v.kind), Some(VertexKind::ChildHub)))
    }

    /// The Relationship that owns a ChildHub.
    pub fn relationship_of_hub(&self, hub: VertexId) -> Option<VertexId> {
        self.incoming(hub)
            .iter()
            .map(|e| e.from)
            .find(|&v| self.relationship(v).is_some())
    }

    /// The ChildHub of a Relationship.
    pub fn child_hub_of(&self, relationship: VertexId) -> Option<VertexId> {
        self.outgoing(relationship)
            .iter()
            .map(|e| e.to)
            .find(|&v| matches!(self.vertex(v).map(|v| &v.kind), Some(VertexKind::ChildHub)))
    }

    /// The two persons joined by a Relationship, in id order.
    pub fn partners_of(&self, relationship: VertexId) -> Vec<VertexId> {
        let mut partners: Vec<VertexId> = self
            .incoming(relationship)
            .iter()
            .map(|e| e.from)
            .filter(|&v| self.is_person(v))
            .collect();
        partners.sort_unstable();
        partners.dedup();
        partners
    }

    /// Children attached to a Relationship (through its ChildHub).
    pub fn get_children(&self, relationship: VertexId) -> Vec<VertexId> {
        self.child_hub_of(relationship)
            .map(|hub| self.children_of_hub(hub))
            .unwrap_or_default()
    }

    pub fn children_of_hub(&self, hub: VertexId) -> Vec<VertexId> {
        self.outgoing(hub)
            .iter()
            .map(|e| e.to)
            .filter(|&v| self.is_person(v))
            .collect()
    }

    /// Both parents of a person, in id order; fewer when parents are absent.
    pub fn get_parents(&self, person: VertexId) -> Vec<VertexId> {
        self.parent_hub(person)
            .and_then(|hub| self.relationship_of_hub(hub))
            .map(|rel| self.partners_of(rel))
            .unwrap_or_default()
    }

    pub fn get_mother(&self, person: VertexId) -> Option<VertexId> {
        self.get_parents(person)
            .into_iter()
            .find(|&p| self.person(p).map(|props| props.gender) == Some(Gender::F))
    }

    pub fn get_father(&self, person: VertexId) -> Option<VertexId> {
        self.get_parents(person)
            .into_iter()
            .find(|&p| self.person(p).map(|props| props.gender) == Some(Gender::M))
    }

    /// Mother/father with the genderless fallback: when only one of the
    /// two slots is known and the person has two parents, the remaining
    /// parent takes the other slot.
    pub fn mother_father_slots(&self, person: VertexId) -> (Option<VertexId>, Option<VertexId>) {
        let parents = self.get_parents(person);
        let mut mother = self.get_mother(person);
        let mut father = self.get_father(person);
        if (mother.is_none() || father.is_none()) && parents.len() == 2 {
            if let Some(m) = mother {
                if father.is_none() {
                    father = parents.iter().copied().find(|&p| p != m);
                }
            } else if let Some(f) = father {
                mother = parents.iter().copied().find(|&p| p != f);
            }
        }
        (mother, father)
    }

    /// Every person this one shares a Relationship vertex with.
    pub fn get_all_partners(&self, person: VertexId) -> Vec<VertexId> {
        let mut partners: Vec<VertexId> = self
            .outgoing(person)
            .iter()
            .map(|e| e.to)
            .filter(|&rel| self.relationship(rel).is_some())
            .flat_map(|rel| self.partners_of(rel))
            .filter(|&p| p != person)
            .collect();
        partners.sort_unstable();
        partners.dedup();
        partners
    }

    /// The Relationship vertex joining two persons, if one exists.
    pub fn get_relationship_node(&self, a: VertexId, b: VertexId) -> Option<VertexId> {
        self.outgoing(a)
            .iter()
            .map(|e| e.to)
            .filter(|&rel| self.relationship(rel).is_some())
            .find(|&rel| self.partners_of(rel).contains(&b))
    }

    /// All Relationship vertex ids.
    pub fn relationship_ids(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.vertices
            .iter()
            .filter(|v| v.as_relationship().is_some())
            .map(|v| v.id)
    }

    // ---------------------------------------------------------------
    // Twin groups
    // ---------------------------------------------------------------

    pub fn get_twin_group_id(&self, person: VertexId) -> Option<u32> {
        self.person(person).and_then(|p| p.twin_group)
    }

    /// All members of this person's twin group, including the person; just
    /// the person when no group is recorded.
    pub fn get_all_twins_of(&self, person: VertexId) -> Vec<VertexId> {
        match self.get_twin_group_id(person) {
            None => vec![person],
            Some(group) => self
                .person_ids()
                .filter(|&p| self.get_twin_group_id(p) == Some(group))
                .collect(),
        }
    }

    // ---------------------------------------------------------------
    // Validation
    // ---------------------------------------------------------------

    /// Checks every structural invariant; the graph is considered frozen
    /// from the importer's point of view once this passes.
    pub fn validate(&self) -> GraphResult<()> {
        let mut pairs: HashMap<(VertexId, VertexId), VertexId> = HashMap::new();

        for vertex in &self.vertices {
            match &vertex.kind {
                VertexKind::Person(_) => {
                    let hub_parents: Vec<VertexId> = self
                        .incoming(vertex.id)
                        .iter()
                        .map(|e| e.from)
                        .filter(|&v| {
                            matches!(self.vertex(v).map(|v| &v.kind), Some(VertexKind::ChildHub))
                        })
                        .collect();
                    if hub_parents.len() > 1 {
                        return Err(ValidationError::MultipleParentSets(vertex.id).into());
                    }
                }
                VertexKind::Relationship(_) => {
                    let partners = self.partners_of(vertex.id);
                    if partners.len() != 2 {
                        return Err(ValidationError::MalformedRelationship(vertex.id).into());
                    }
                    let key = (partners[0], partners[1]);
                    if pairs.insert(key, vertex.id).is_some() {
                        return Err(ValidationError::DuplicatePartnership(key.0, key.1).into());
                    }
                    let hubs: Vec<VertexId> = self
                        .outgoing(vertex.id)
                        .iter()
                        .map(|e| e.to)
                        .filter(|&v| {
                            matches!(self.vertex(v).map(|v| &v.kind), Some(VertexKind::ChildHub))
                        })
                        .collect();
                    if hubs.len() != 1 {
                        return Err(ValidationError::MissingChildHub(vertex.id).into());
                    }
                }
                VertexKind::ChildHub => {
                    let owners: Vec<VertexId> = self
                        .incoming(vertex.id)
                        .iter()
                        .map(|e| e.from)
                        .filter(|&v| self.relationship(v).is_some())
                        .collect();
                    if owners.len() != 1 {
                        return Err(ValidationError::OrphanChildHub(vertex.id).into());
                    }
                }
            }
        }

        // Twin groups must have at least two members to mean anything;
        // singletons indicate a half-merged import.
        let mut group_sizes: HashMap<u32, usize> = HashMap::new();
        for id in self.person_ids() {
            if let Some(group) = self.get_twin_group_id(id) {
                *group_sizes.entry(group).or_insert(0) += 1;
            }
        }
        for (group, size) in &group_sizes {
            if *size < 2 {
                log::warn!("twin group {} has a single member", group);
            }
        }

        Ok(())
    }

    /// Person ids reachable from `start` through parent/partner/child
    /// links, `start` included.
    pub fn connected_persons(&self, start: VertexId) -> HashSet<VertexId> {
        let mut visited: HashSet<VertexId> = HashSet::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            for parent in self.get_parents(current) {
                stack.push(parent);
            }
            for partner in self.get_all_partners(current) {
                stack.push(partner);
            }
            for rel in self
                .outgoing(current)
                .iter()
                .map(|e| e.to)
                .filter(|&v| self.relationship(v).is_some())
                .collect::<Vec<_>>()
            {
                for child in self.get_children(rel) {
                    stack.push(child);
                }
            }
        }
        visited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationship_tracker::RelationshipTracker;
    use models::edges::DEFAULT_EDGE_WEIGHT;

    fn person(graph: &mut PedigreeGraph, gender: Gender) -> VertexId {
        graph.add_person(PersonProperties::with_gender(gender))
    }

    /// proband (0) with mother (1) and father (2), one sibling (3).
    fn family() -> (PedigreeGraph, VertexId, VertexId, VertexId, VertexId) {
        let mut graph = PedigreeGraph::new();
        let proband = person(&mut graph, Gender::M);
        let mother = person(&mut graph, Gender::F);
        let father = person(&mut graph, Gender::M);
        let sibling = person(&mut graph, Gender::F);
        let mut tracker = RelationshipTracker::new(DEFAULT_EDGE_WEIGHT);
        let hub = tracker
            .create_or_get_childhub(&mut graph, mother, father)
            .unwrap();
        graph.add_edge(hub, proband, DEFAULT_EDGE_WEIGHT).unwrap();
        graph.add_edge(hub, sibling, DEFAULT_EDGE_WEIGHT).unwrap();
        (graph, proband, mother, father, sibling)
    }

    #[test]
    fn should_resolve_parents_and_gender_roles() {
        let (graph, proband, mother, father, sibling) = family();
        // 4 persons + relationship + child hub
        assert_eq!(graph.max_vertex_id(), Some(VertexId::new(5)));
        assert_eq!(graph.get_parents(proband), vec![mother, father]);
        assert_eq!(graph.get_mother(proband), Some(mother));
        assert_eq!(graph.get_father(proband), Some(father));
        assert_eq!(graph.get_parents(sibling), vec![mother, father]);
        assert!(graph.get_parents(mother).is_empty());
        assert!(graph.get_parents(proband).len() <= 2);
    }

    #[test]
    fn should_list_partners_and_relationship_node() {
        let (graph, _, mother, father, _) = family();
        assert_eq!(graph.get_all_partners(mother), vec![father]);
        assert_eq!(graph.get_all_partners(father), vec![mother]);
        let rel = graph.get_relationship_node(mother, father).unwrap();
        assert_eq!(graph.get_relationship_node(father, mother), Some(rel));
        assert_eq!(graph.get_children(rel).len(), 2);
    }

    #[test]
    fn should_reject_illegal_edges() {
        let mut graph = PedigreeGraph::new();
        let a = person(&mut graph, Gender::M);
        let b = person(&mut graph, Gender::F);
        let err = graph.add_edge(a, b, DEFAULT_EDGE_WEIGHT).unwrap_err();
        assert!(err.to_string().contains("not a legal connection"));
    }

    #[test]
    fn validate_accepts_a_well_formed_family() {
        let (graph, ..) = family();
        graph.validate().unwrap();
    }

    #[test]
    fn validate_rejects_person_with_two_parent_hubs() {
        let (mut graph, proband, ..) = family();
        let m2 = person(&mut graph, Gender::F);
        let f2 = person(&mut graph, Gender::M);
        let mut tracker = RelationshipTracker::new(DEFAULT_EDGE_WEIGHT);
        let hub = tracker
            .create_or_get_childhub(&mut graph, m2, f2)
            .unwrap();
        graph.add_edge(hub, proband, DEFAULT_EDGE_WEIGHT).unwrap();
        let err = graph.validate().unwrap_err();
        assert!(err.to_string().contains("more than one child hub"));
    }

    #[test]
    fn twin_queries_report_the_whole_group() {
        let (mut graph, proband, _, _, sibling) = family();
        graph.person_mut(proband).unwrap().twin_group = Some(1);
        graph.person_mut(sibling).unwrap().twin_group = Some(1);
        assert_eq!(graph.get_twin_group_id(proband), Some(1));
        let twins = graph.get_all_twins_of(proband);
        assert!(twins.contains(&proband) && twins.contains(&sibling));
    }

    #[test]
    fn connected_persons_spans_the_family() {
        let (graph, proband, mother, father, sibling) = family();
        let reach = graph.connected_persons(proband);
        for id in [proband, mother, father, sibling] {
            assert!(reach.contains(&id));
        }
    }
}
