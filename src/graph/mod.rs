//! Containment graph over the sub-entities of a shape.
//!
//! The graph mirrors the kernel's decomposition: an edge `A → B` means "A
//! structurally contains B" (a face contains a wire, a wire contains edges).
//! Every edge is stored in both directions so ancestor and descendant queries
//! are equally cheap.

pub mod containment;

pub use containment::{ContainmentGraph, VertexData, VertexId};

/// Direction of a traversal over the containment graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Follow parent → child edges (the forward graph).
    Descendants,
    /// Follow child → parent edges (the reverse graph).
    Ancestors,
}
