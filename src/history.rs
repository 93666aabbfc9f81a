//! Cross-feature shape history.
//!
//! Each feature's [`EvolutionLedger`](crate::evolution::EvolutionLedger) only
//! knows how *its* ids relate to its inputs. A document-level history stitches
//! those ledgers together so a reference taken in one feature can be carried
//! to any downstream (or upstream) feature.
//!
//! [`ShapeHistory`] is the write interface the ledger publishes through;
//! [`HistoryGraph`] is an arena-backed implementation whose nodes are
//! `(feature, shape id)` pairs.
//!
//! # Citations
//! - Persistent naming across features: Kripac, "A mechanism for persistently naming topological entities in history-based parametric solid models" (1997)

use crate::arena::{arena_index, Arena, ArenaIndex};
use crate::id::StableId;
use std::collections::{HashMap, HashSet, VecDeque};

/// Sink for genealogy published by a feature.
pub trait ShapeHistory {
    /// Returns `true` if any feature has published `id`.
    fn contains(&self, id: &StableId) -> bool;

    /// Registers `id` as a root entity of `feature`. Returns `false` when it
    /// was already registered.
    fn add_shape(&mut self, feature: StableId, id: StableId) -> bool;

    /// Links the most recent publication of `from` by another feature to
    /// `to` owned by `feature`. Returns `false` when nothing changed.
    fn add_connection(&mut self, from: StableId, to: StableId, feature: StableId) -> bool;
}

arena_index!(
    /// Handle of a node in a [`HistoryGraph`].
    HistoryNodeId
);

#[derive(Debug, Clone)]
struct HistoryNode {
    feature: StableId,
    id: StableId,
    next: Vec<HistoryNodeId>,
    prev: Vec<HistoryNodeId>,
}

/// Genealogy of shape ids across every feature of a document.
#[derive(Debug, Clone, Default)]
pub struct HistoryGraph {
    nodes: Arena<HistoryNodeId, HistoryNode>,
    by_key: HashMap<(StableId, StableId), HistoryNodeId>,
    by_id: HashMap<StableId, Vec<HistoryNodeId>>,
    edge_count: usize,
}

impl HistoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    fn node(&mut self, feature: StableId, id: StableId) -> (HistoryNodeId, bool) {
        if let Some(&existing) = self.by_key.get(&(feature, id)) {
            return (existing, false);
        }
        let handle = self.nodes.allocate(HistoryNode {
            feature,
            id,
            next: Vec::new(),
            prev: Vec::new(),
        });
        self.by_key.insert((feature, id), handle);
        self.by_id.entry(id).or_default().push(handle);
        (handle, true)
    }

    /// Features that published `id`, in publication order.
    pub fn features_of(&self, id: &StableId) -> Vec<StableId> {
        self.by_id
            .get(id)
            .map(|nodes| nodes.iter().map(|&n| self.nodes[n].feature).collect())
            .unwrap_or_default()
    }

    /// Ids owned by `feature` that descend from `id`.
    pub fn evolve(&self, id: &StableId, feature: &StableId) -> Vec<StableId> {
        self.walk(id, feature, true)
    }

    /// Ids owned by `feature` that `id` descends from.
    pub fn devolve(&self, id: &StableId, feature: &StableId) -> Vec<StableId> {
        self.walk(id, feature, false)
    }

    fn walk(&self, id: &StableId, feature: &StableId, forward: bool) -> Vec<StableId> {
        let Some(starts) = self.by_id.get(id) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut reported: HashSet<StableId> = HashSet::new();
        let mut visited: HashSet<HistoryNodeId> = starts.iter().copied().collect();
        let mut queue: VecDeque<HistoryNodeId> = starts.iter().copied().collect();
        while let Some(handle) = queue.pop_front() {
            let node = &self.nodes[handle];
            if node.feature == *feature && reported.insert(node.id) {
                out.push(node.id);
            }
            let neighbors = if forward { &node.next } else { &node.prev };
            for &n in neighbors {
                if visited.insert(n) {
                    queue.push_back(n);
                }
            }
        }
        out
    }
}

impl ShapeHistory for HistoryGraph {
    fn contains(&self, id: &StableId) -> bool {
        self.by_id.contains_key(id)
    }

    fn add_shape(&mut self, feature: StableId, id: StableId) -> bool {
        self.node(feature, id).1
    }

    fn add_connection(&mut self, from: StableId, to: StableId, feature: StableId) -> bool {
        let source = self.by_id.get(&from).and_then(|nodes| {
            nodes
                .iter()
                .rev()
                .copied()
                .find(|&n| self.nodes[n].feature != feature)
        });
        let Some(source) = source else {
            return false;
        };
        let (target, created) = self.node(feature, to);
        if self.nodes[source].next.contains(&target) {
            return created;
        }
        self.nodes[source].next.push(target);
        self.nodes[target].prev.push(source);
        self.edge_count += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{IdSource, SequentialIds};

    #[test]
    fn lineage_across_three_features() {
        let source = SequentialIds::new(42);
        let (f1, f2, f3) = (source.next_id(), source.next_id(), source.next_id());
        let (a, b, c, d) = (source.next_id(), source.next_id(), source.next_id(), source.next_id());

        let mut history = HistoryGraph::new();
        assert!(history.add_shape(f1, a));
        assert!(!history.add_shape(f1, a));
        // f2 keeps a and splits it into b.
        assert!(history.add_connection(a, a, f2));
        assert!(history.add_connection(a, b, f2));
        // f3 turns f2's b into c and d.
        assert!(history.add_connection(b, c, f3));
        assert!(history.add_connection(b, d, f3));

        assert_eq!(history.evolve(&a, &f3), vec![c, d]);
        assert_eq!(history.evolve(&a, &f2), vec![a, b]);
        assert_eq!(history.devolve(&d, &f1), vec![a]);
        assert_eq!(history.features_of(&a), vec![f1, f2]);
        assert_eq!(history.node_count(), 5);
        assert_eq!(history.edge_count(), 4);
    }

    #[test]
    fn connection_needs_a_published_source() {
        let source = SequentialIds::new(43);
        let (feature, from, to) = (source.next_id(), source.next_id(), source.next_id());
        let mut history = HistoryGraph::new();
        assert!(!history.add_connection(from, to, feature));
        assert!(!history.contains(&to));
    }

    #[test]
    fn connection_is_idempotent() {
        let source = SequentialIds::new(44);
        let (f1, f2, a, b) = (source.next_id(), source.next_id(), source.next_id(), source.next_id());
        let mut history = HistoryGraph::new();
        history.add_shape(f1, a);
        assert!(history.add_connection(a, b, f2));
        assert!(!history.add_connection(a, b, f2));
        assert_eq!(history.edge_count(), 1);
    }
}
