// graph_engine/src/traversal.rs
// Ancestor traversal used for consanguinity distance checks.

use std::collections::HashSet;

use models::identifiers::VertexId;

use crate::graph::PedigreeGraph;

impl PedigreeGraph {
    /// Ancestors of `person` up to `generations` levels (parents are level
    /// 1). A second cousin shares a great-grandparent, so depth 3 covers
    /// the "second cousin or closer" consanguinity test.
    pub fn get_parent_generations(
        &self,
        person: VertexId,
        generations: usize,
    ) -> HashSet<VertexId> {
        let mut ancestors: HashSet<VertexId> = HashSet::new();
        let mut frontier = vec![person];
        for _ in 0..generations {
            let mut next = Vec::new();
            for node in frontier {
                for parent in self.get_parents(node) {
                    if ancestors.insert(parent) {
                        next.push(parent);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        ancestors
    }

    /// True when the two persons share an ancestor within the given number
    /// of generations.
    pub fn shares_recent_ancestor(
        &self,
        a: VertexId,
        b: VertexId,
        generations: usize,
    ) -> bool {
        let mine = self.get_parent_generations(a, generations);
        if mine.is_empty() {
            return false;
        }
        self.get_parent_generations(b, generations)
            .iter()
            .any(|ancestor| mine.contains(ancestor))
    }
}
