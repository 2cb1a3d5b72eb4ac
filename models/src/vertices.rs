// models/src/vertices.rs
use serde::{Deserialize, Serialize};

use crate::identifiers::VertexId;
use crate::properties::{PersonProperties, RelationshipProperties};

/// The three vertex kinds of a pedigree graph.
///
/// Children attach to the ChildHub of their parents' Relationship, never to
/// the parents directly; that is what lets N children share one connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VertexKind {
    Person(Box<PersonProperties>),
    Relationship(RelationshipProperties),
    ChildHub,
}

impl VertexKind {
    /// Human-readable kind name, used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            VertexKind::Person(_) => "Person",
            VertexKind::Relationship(_) => "Relationship",
            VertexKind::ChildHub => "ChildHub",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: VertexId,
    pub kind: VertexKind,
}

impl Vertex {
    pub fn new(id: VertexId, kind: VertexKind) -> Self {
        Vertex { id, kind }
    }

    pub fn is_person(&self) -> bool {
        matches!(self.kind, VertexKind::Person(_))
    }

    pub fn as_person(&self) -> Option<&PersonProperties> {
        match &self.kind {
            VertexKind::Person(props) => Some(props),
            _ => None,
        }
    }

    pub fn as_person_mut(&mut self) -> Option<&mut PersonProperties> {
        match &mut self.kind {
            VertexKind::Person(props) => Some(props),
            _ => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&RelationshipProperties> {
        match &self.kind {
            VertexKind::Relationship(props) => Some(props),
            _ => None,
        }
    }

    pub fn as_relationship_mut(&mut self) -> Option<&mut RelationshipProperties> {
        match &mut self.kind {
            VertexKind::Relationship(props) => Some(props),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::properties::Gender;

    #[test]
    fn should_expose_kind_accessors() {
        let person = Vertex::new(
            VertexId::new(0),
            VertexKind::Person(Box::new(PersonProperties::with_gender(Gender::F))),
        );
        assert!(person.is_person());
        assert_eq!(person.as_person().unwrap().gender, Gender::F);
        assert!(person.as_relationship().is_none());

        let hub = Vertex::new(VertexId::new(1), VertexKind::ChildHub);
        assert!(!hub.is_person());
        assert_eq!(hub.kind.name(), "ChildHub");
    }
}
