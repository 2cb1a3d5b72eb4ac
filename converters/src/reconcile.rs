// converters/src/reconcile.rs
//! Machinery shared by the three import front ends: soft cross-reference
//! maps with ambiguity tracking, and the second-pass child attachment that
//! synthesizes placeholder parents.

use std::collections::{HashMap, HashSet};

use graph_engine::{PedigreeGraph, RelationshipTracker};
use log::debug;
use models::edges::DEFAULT_EDGE_WEIGHT;
use models::errors::{GraphError, GraphResult};
use models::identifiers::VertexId;
use models::properties::{Gender, PersonProperties};

/// External-id and first-name reference maps.
///
/// A key claimed by two different vertices is removed from both maps and
/// marked ambiguous; any later reference through it is a hard error
/// rather than a silent best guess.
#[derive(Debug, Default)]
pub struct ReferenceMaps {
    external_id_to_vertex: HashMap<String, VertexId>,
    name_to_vertex: HashMap<String, VertexId>,
    ambiguous: HashSet<String>,
    has_primary_id: HashSet<VertexId>,
}

impl ReferenceMaps {
    pub fn new() -> Self {
        ReferenceMaps::default()
    }

    /// Registers one freshly created person under its record id, first
    /// name and external id.
    pub fn register(
        &mut self,
        record_id: Option<&str>,
        first_name: Option<&str>,
        external_id: Option<&str>,
        vertex: VertexId,
    ) -> GraphResult<()> {
        if let Some(id) = record_id {
            if self.external_id_to_vertex.contains_key(id) {
                return Err(GraphError::DuplicateExternalId(id.to_string()));
            }
            if let Some(&other) = self.name_to_vertex.get(id) {
                if other != vertex {
                    self.name_to_vertex.remove(id);
                    self.ambiguous.insert(id.to_string());
                }
            } else {
                self.external_id_to_vertex.insert(id.to_string(), vertex);
                self.has_primary_id.insert(vertex);
            }
        }
        if let Some(name) = first_name {
            if let Some(&other) = self.name_to_vertex.get(name) {
                if other != vertex {
                    // multiple nodes share this first name
                    self.name_to_vertex.remove(name);
                    self.ambiguous.insert(name.to_string());
                }
            } else if let Some(&other) = self.external_id_to_vertex.get(name) {
                if other != vertex {
                    // some other node has this name as an id
                    self.external_id_to_vertex.remove(name);
                    self.ambiguous.insert(name.to_string());
                }
            } else {
                self.name_to_vertex.insert(name.to_string(), vertex);
            }
        }
        // external id only counts when the record has no primary id
        if let Some(ext) = external_id {
            if !self.has_primary_id.contains(&vertex) {
                self.external_id_to_vertex.insert(ext.to_string(), vertex);
                self.has_primary_id.insert(vertex);
            }
        }
        Ok(())
    }

    /// Resolves a reference by id first, then by first name.
    pub fn resolve(&self, reference: &str, role: &str) -> GraphResult<VertexId> {
        if self.ambiguous.contains(reference) {
            return Err(GraphError::AmbiguousReference(reference.to_string()));
        }
        if let Some(&vertex) = self.external_id_to_vertex.get(reference) {
            return Ok(vertex);
        }
        if let Some(&vertex) = self.name_to_vertex.get(reference) {
            return Ok(vertex);
        }
        Err(GraphError::UnresolvedReference {
            reference: reference.to_string(),
            role: role.to_string(),
        })
    }

}

/// A resolved parent link, keeping the original reference for error
/// wording.
#[derive(Debug, Clone)]
pub struct ParentLink {
    pub vertex: VertexId,
    pub reference: String,
}

/// Second-pass child attachment.
///
/// Synthesizes a virtual opposite-gender parent when only one parent is
/// declared, reusing one synthesized partner per known parent so siblings
/// with the same missing parent share it.
#[derive(Debug, Default)]
pub struct ChildLinker {
    tracker: RelationshipTracker,
    fake_partner_for: HashMap<VertexId, VertexId>,
}

impl ChildLinker {
    pub fn new() -> Self {
        ChildLinker {
            tracker: RelationshipTracker::new(DEFAULT_EDGE_WEIGHT),
            fake_partner_for: HashMap::new(),
        }
    }

    /// Attaches a child to its parents' child hub, creating whatever is
    /// missing. No-op when neither parent is declared.
    pub fn attach(
        &mut self,
        graph: &mut PedigreeGraph,
        child: VertexId,
        mother: Option<ParentLink>,
        father: Option<ParentLink>,
    ) -> GraphResult<()> {
        if mother.is_none() && father.is_none() {
            return Ok(());
        }

        if let Some(link) = &father {
            if graph.person(link.vertex).map(|p| p.gender) == Some(Gender::F) {
                return Err(GraphError::ParentGenderContradiction {
                    declared: "female".to_string(),
                    role: "father".to_string(),
                    reference: link.reference.clone(),
                });
            }
            if link.vertex == child {
                return Err(GraphError::SelfParent);
            }
        }
        if let Some(link) = &mother {
            if graph.person(link.vertex).map(|p| p.gender) == Some(Gender::M) {
                return Err(GraphError::ParentGenderContradiction {
                    declared: "male".to_string(),
                    role: "mother".to_string(),
                    reference: link.reference.clone(),
                });
            }
            if link.vertex == child {
                return Err(GraphError::SelfParent);
            }
        }

        let father_id = match &father {
            Some(link) => link.vertex,
            None => {
                let known = mother.as_ref().expect("one parent present").vertex;
                self.placeholder_partner(graph, known, Gender::M)
            }
        };
        let mother_id = match &mother {
            Some(link) => link.vertex,
            None => self.placeholder_partner(graph, father_id, Gender::F),
        };

        let hub = self
            .tracker
            .create_or_get_childhub(graph, mother_id, father_id)?;
        graph.add_edge(hub, child, DEFAULT_EDGE_WEIGHT)?;
        Ok(())
    }

    fn placeholder_partner(
        &mut self,
        graph: &mut PedigreeGraph,
        known: VertexId,
        gender: Gender,
    ) -> VertexId {
        if let Some(&existing) = self.fake_partner_for.get(&known) {
            return existing;
        }
        let created = graph.add_person(PersonProperties::placeholder(gender));
        debug!(
            "synthesized {} placeholder {} as partner of {}",
            gender, created, known
        );
        self.fake_partner_for.insert(known, created);
        created
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with_persons(n: usize) -> (PedigreeGraph, Vec<VertexId>) {
        let mut graph = PedigreeGraph::new();
        let ids = (0..n)
            .map(|_| graph.add_person(PersonProperties::default()))
            .collect();
        (graph, ids)
    }

    #[test]
    fn duplicate_record_ids_are_rejected() {
        let (_, ids) = graph_with_persons(2);
        let mut maps = ReferenceMaps::new();
        maps.register(Some("p1"), None, None, ids[0]).unwrap();
        let err = maps.register(Some("p1"), None, None, ids[1]).unwrap_err();
        assert!(matches!(err, GraphError::DuplicateExternalId(_)));
    }

    #[test]
    fn shared_first_names_become_ambiguous() {
        let (_, ids) = graph_with_persons(3);
        let mut maps = ReferenceMaps::new();
        maps.register(None, Some("Alex"), None, ids[0]).unwrap();
        maps.register(None, Some("Alex"), None, ids[1]).unwrap();
        let err = maps.resolve("Alex", "mother").unwrap_err();
        assert!(matches!(err, GraphError::AmbiguousReference(_)));
    }

    #[test]
    fn resolution_prefers_ids_over_names() {
        let (_, ids) = graph_with_persons(2);
        let mut maps = ReferenceMaps::new();
        maps.register(Some("x"), None, None, ids[0]).unwrap();
        maps.register(None, Some("y"), None, ids[1]).unwrap();
        assert_eq!(maps.resolve("x", "father").unwrap(), ids[0]);
        assert_eq!(maps.resolve("y", "mother").unwrap(), ids[1]);
        assert!(maps.resolve("z", "mother").is_err());
    }

    #[test]
    fn attach_synthesizes_and_reuses_a_missing_father() {
        let mut graph = PedigreeGraph::new();
        let mother = graph.add_person(PersonProperties::with_gender(Gender::F));
        let child_a = graph.add_person(PersonProperties::default());
        let child_b = graph.add_person(PersonProperties::default());
        let mut linker = ChildLinker::new();
        let link = |v| {
            Some(ParentLink {
                vertex: v,
                reference: "mother".to_string(),
            })
        };
        linker.attach(&mut graph, child_a, link(mother), None).unwrap();
        linker.attach(&mut graph, child_b, link(mother), None).unwrap();

        let parents_a = graph.get_parents(child_a);
        let parents_b = graph.get_parents(child_b);
        assert_eq!(parents_a, parents_b);
        assert_eq!(parents_a.len(), 2);
        let father = graph.get_father(child_a).unwrap();
        assert_eq!(
            graph.person(father).unwrap().comments.as_deref(),
            Some("unknown")
        );
        graph.validate().unwrap();
    }

    #[test]
    fn attach_rejects_self_parenthood() {
        let mut graph = PedigreeGraph::new();
        let only = graph.add_person(PersonProperties::with_gender(Gender::F));
        let mut linker = ChildLinker::new();
        let err = linker
            .attach(
                &mut graph,
                only,
                Some(ParentLink {
                    vertex: only,
                    reference: "self".to_string(),
                }),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::SelfParent));
    }

    #[test]
    fn attach_rejects_gender_contradictions() {
        let mut graph = PedigreeGraph::new();
        let man = graph.add_person(PersonProperties::with_gender(Gender::M));
        let child = graph.add_person(PersonProperties::default());
        let mut linker = ChildLinker::new();
        let err = linker
            .attach(
                &mut graph,
                child,
                Some(ParentLink {
                    vertex: man,
                    reference: "bob".to_string(),
                }),
                None,
            )
            .unwrap_err();
        assert!(err.to_string().contains("declared as male"));
    }
}
