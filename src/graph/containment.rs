//! Arena-backed bidirectional containment graph.
//!
//! `ContainmentGraph` stores one [`VertexData`] per enumerated sub-entity with
//! explicit forward (`children`) and reverse (`parents`) adjacency lists.
//!
//! # Invariants
//! - At most one edge exists between any ordered pair of vertices.
//! - `b ∈ children(a)` ⇔ `a ∈ parents(b)`.
//! - Adjacency lists keep insertion order, which follows the kernel's
//!   decomposition order; traversals are therefore deterministic.

use super::Direction;
use crate::arena::{arena_index, Arena, ArenaIndex};
use crate::kernel::{Shape, ShapeType};
use std::collections::{HashSet, VecDeque};
use std::fmt::Write as _;

arena_index!(
    /// Dense handle of a vertex in a [`ContainmentGraph`].
    VertexId
);

/// Data stored for each vertex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexData {
    /// Topological type of the entity this vertex stands for.
    pub ty: ShapeType,
    /// Direct sub-entities (forward graph).
    pub children: Vec<VertexId>,
    /// Direct containers (reverse graph).
    pub parents: Vec<VertexId>,
}

impl VertexData {
    fn new(ty: ShapeType) -> Self {
        Self {
            ty,
            children: Vec::new(),
            parents: Vec::new(),
        }
    }

    fn neighbors(&self, direction: Direction) -> &[VertexId] {
        match direction {
            Direction::Descendants => &self.children,
            Direction::Ancestors => &self.parents,
        }
    }
}

/// Forward and reverse containment graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainmentGraph {
    arena: Arena<VertexId, VertexData>,
    edge_count: usize,
}

impl ContainmentGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes every vertex and edge.
    pub fn clear(&mut self) {
        self.arena.clear();
        self.edge_count = 0;
    }

    /// Adds an isolated vertex for an entity of type `ty`.
    pub fn add_vertex(&mut self, ty: ShapeType) -> VertexId {
        self.arena.allocate(VertexData::new(ty))
    }

    /// Returns `true` if `vertex` belongs to this graph.
    pub fn contains(&self, vertex: VertexId) -> bool {
        self.arena.contains(vertex)
    }

    /// Returns the vertex data, if the vertex exists.
    pub fn vertex(&self, vertex: VertexId) -> Option<&VertexData> {
        self.arena.get(vertex)
    }

    /// Returns the topological type of `vertex`.
    ///
    /// # Panics
    /// Panics if `vertex` is not part of the graph.
    pub fn shape_type(&self, vertex: VertexId) -> ShapeType {
        self.arena[vertex].ty
    }

    /// Returns `true` if the forward edge `parent → child` exists.
    pub fn has_edge(&self, parent: VertexId, child: VertexId) -> bool {
        self.arena
            .get(parent)
            .is_some_and(|data| data.children.contains(&child))
    }

    /// Adds `parent → child` and its mirror `child → parent`.
    ///
    /// Returns `false` (and changes nothing) when the edge already exists.
    ///
    /// # Panics
    /// Panics if either vertex is not part of the graph.
    pub fn add_edge(&mut self, parent: VertexId, child: VertexId) -> bool {
        assert!(
            self.contains(parent) && self.contains(child),
            "edge endpoints must be graph vertices"
        );
        if self.has_edge(parent, child) {
            return false;
        }
        self.arena[parent].children.push(child);
        self.arena[child].parents.push(parent);
        self.edge_count += 1;
        true
    }

    /// Direct children of `vertex` (empty for unknown vertices).
    pub fn children(&self, vertex: VertexId) -> &[VertexId] {
        self.arena.get(vertex).map_or(&[], |d| d.children.as_slice())
    }

    /// Direct parents of `vertex` (empty for unknown vertices).
    pub fn parents(&self, vertex: VertexId) -> &[VertexId] {
        self.arena.get(vertex).map_or(&[], |d| d.parents.as_slice())
    }

    pub fn vertex_count(&self) -> usize {
        self.arena.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Iterates over every vertex handle in allocation order.
    pub fn vertices(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.arena.ids()
    }

    /// Wires the graph by a single descent of `root`'s decomposition.
    ///
    /// `lookup` maps a shape to its vertex. Children it cannot map are skipped:
    /// they are duplicates the canonical enumeration already merged. Each
    /// distinct sub-tree is descended once however many parents share it.
    pub fn connect<S, F>(&mut self, root: &S, lookup: F)
    where
        S: Shape,
        F: Fn(&S) -> Option<VertexId>,
    {
        let Some(root_vertex) = lookup(root) else {
            return;
        };
        let mut descended: HashSet<S::Key> = HashSet::from([root.key()]);
        let mut stack: Vec<(S, VertexId)> = vec![(root.clone(), root_vertex)];
        while let Some((parent, parent_vertex)) = stack.pop() {
            let mut pending = Vec::new();
            for child in parent.children() {
                if child.is_null() {
                    continue;
                }
                let Some(child_vertex) = lookup(&child) else {
                    log::debug!("skipping {:?}: not in identity table", child);
                    continue;
                };
                self.add_edge(parent_vertex, child_vertex);
                if descended.insert(child.key()) {
                    pending.push((child, child_vertex));
                }
            }
            stack.extend(pending.into_iter().rev());
        }
    }

    /// Breadth-first collection of every vertex of type `ty` reachable from
    /// `start` in `direction`. The start vertex itself is never reported.
    ///
    /// Results are in discovery order. The search continues through vertices
    /// of other types, so a vertex's faces are found through its wires.
    ///
    /// # Citations
    /// - Breadth-first search: Cormen et al., "Introduction to Algorithms", Section 22.2 (2009)
    pub fn collect(&self, start: VertexId, ty: ShapeType, direction: Direction) -> Vec<VertexId> {
        let mut out = Vec::new();
        if !self.contains(start) {
            return out;
        }
        let mut visited: HashSet<VertexId> = HashSet::from([start]);
        let mut queue: VecDeque<VertexId> = VecDeque::from([start]);
        while let Some(v) = queue.pop_front() {
            for &next in self.arena[v].neighbors(direction) {
                if !visited.insert(next) {
                    continue;
                }
                if self.arena[next].ty == ty {
                    out.push(next);
                }
                queue.push_back(next);
            }
        }
        out
    }

    /// Renders the graph in Graphviz DOT syntax.
    ///
    /// `Direction::Descendants` renders the forward graph, `Ancestors` the
    /// reverse graph. `label` supplies the text of each vertex.
    pub fn to_dot<F>(&self, direction: Direction, label: F) -> String
    where
        F: Fn(VertexId) -> String,
    {
        let name = match direction {
            Direction::Descendants => "containment",
            Direction::Ancestors => "containment_reverse",
        };
        let mut out = String::new();
        let _ = writeln!(out, "digraph {name} {{");
        for (id, data) in self.arena.iter() {
            let text = label(id).replace('"', "\\\"");
            let _ = writeln!(out, "  v{} [label=\"{}\\n{}\"];", id.as_raw(), data.ty, text);
        }
        for (id, data) in self.arena.iter() {
            for next in data.neighbors(direction) {
                let _ = writeln!(out, "  v{} -> v{};", id.as_raw(), next.as_raw());
            }
        }
        out.push_str("}\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::canonical_enumeration;
    use crate::reference::{box_topology, ReferenceShape};
    use std::collections::HashMap;

    fn graph_of(root: &ReferenceShape) -> (ContainmentGraph, HashMap<u64, VertexId>, Vec<ReferenceShape>) {
        let shapes = canonical_enumeration(root);
        let mut graph = ContainmentGraph::new();
        let mut map = HashMap::new();
        for s in &shapes {
            map.insert(s.key(), graph.add_vertex(s.shape_type()));
        }
        graph.connect(root, |s| map.get(&s.key()).copied());
        (graph, map, shapes)
    }

    #[test]
    fn add_edge_is_idempotent() {
        let mut graph = ContainmentGraph::new();
        let a = graph.add_vertex(ShapeType::Face);
        let b = graph.add_vertex(ShapeType::Wire);
        assert!(graph.add_edge(a, b));
        assert!(!graph.add_edge(a, b));
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.children(a), &[b]);
        assert_eq!(graph.parents(b), &[a]);
    }

    #[test]
    fn box_graph_shape() {
        let topo = box_topology(1.0, 1.0, 1.0);
        let (graph, _, shapes) = graph_of(&topo.solid);
        assert_eq!(graph.vertex_count(), shapes.len());
        // solid→shell 1, shell→faces 6, faces→wires 6, wires→edges 24, edges→vertices 24
        assert_eq!(graph.edge_count(), 61);
    }

    #[test]
    fn edge_has_two_parent_faces() {
        let topo = box_topology(1.0, 1.0, 1.0);
        let (graph, map, _) = graph_of(&topo.solid);
        for edge in &topo.edges {
            let faces = graph.collect(map[&edge.key()], ShapeType::Face, Direction::Ancestors);
            assert_eq!(faces.len(), 2, "every box edge bounds two faces");
        }
        let vertex = map[&topo.vertices[0].key()];
        assert_eq!(graph.collect(vertex, ShapeType::Edge, Direction::Ancestors).len(), 3);
        assert_eq!(graph.collect(vertex, ShapeType::Solid, Direction::Ancestors).len(), 1);
    }

    #[test]
    fn descendants_by_type() {
        let topo = box_topology(1.0, 1.0, 1.0);
        let (graph, map, _) = graph_of(&topo.solid);
        let face = map[&topo.faces[0].key()];
        assert_eq!(graph.collect(face, ShapeType::Edge, Direction::Descendants).len(), 4);
        assert_eq!(graph.collect(face, ShapeType::Vertex, Direction::Descendants).len(), 4);
        assert!(graph.collect(face, ShapeType::Face, Direction::Descendants).is_empty());
    }

    #[test]
    fn unknown_children_are_skipped() {
        let topo = box_topology(1.0, 1.0, 1.0);
        let mut graph = ContainmentGraph::new();
        let wire = graph.add_vertex(ShapeType::Wire);
        let wire_key = topo.wires[0].key();
        graph.connect(&topo.wires[0], |s| (s.key() == wire_key).then_some(wire));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn dot_export_lists_vertices_and_edges() {
        let mut graph = ContainmentGraph::new();
        let a = graph.add_vertex(ShapeType::Edge);
        let b = graph.add_vertex(ShapeType::Vertex);
        graph.add_edge(a, b);
        let forward = graph.to_dot(Direction::Descendants, |v| format!("n{}", v.as_raw()));
        assert!(forward.starts_with("digraph containment {"));
        assert!(forward.contains("v0 -> v1;"));
        let reverse = graph.to_dot(Direction::Ancestors, |_| String::new());
        assert!(reverse.contains("v1 -> v0;"));
    }
}
