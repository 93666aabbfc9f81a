//! Geometry kernel contract.
//!
//! SeerShape never inspects geometry itself. Everything it needs from the
//! B-rep kernel is expressed by three traits:
//!
//! - [`Shape`]: an opaque, immutable shape value with orientation-insensitive
//!   identity ([`Shape::key`]), a topological type tag and a deterministic
//!   decomposition into children.
//! - [`ModifiedOracle`]: the operation-specific "what did X become" query a
//!   feature algorithm exposes after it ran.
//! - [`Geometry`]: geometric evaluation (points, distances, outer wires) used
//!   by the query API and by outer-wire matching.
//!
//! # Determinism
//! [`canonical_enumeration`] defines the order records are created in. The
//! persisted shape-id table stores offsets into this order, so a kernel must
//! return children in the same order every time a given shape is decomposed.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;

/// Topological type of a B-rep sub-entity, from the largest container down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeType {
    Compound,
    CompSolid,
    Solid,
    Shell,
    Face,
    Wire,
    Edge,
    Vertex,
}

impl ShapeType {
    /// Every type, in containment order.
    pub const ALL: [ShapeType; 8] = [
        ShapeType::Compound,
        ShapeType::CompSolid,
        ShapeType::Solid,
        ShapeType::Shell,
        ShapeType::Face,
        ShapeType::Wire,
        ShapeType::Edge,
        ShapeType::Vertex,
    ];

    /// Lower-case name used in dumps and DOT labels.
    pub const fn name(&self) -> &'static str {
        match self {
            ShapeType::Compound => "compound",
            ShapeType::CompSolid => "compsolid",
            ShapeType::Solid => "solid",
            ShapeType::Shell => "shell",
            ShapeType::Face => "face",
            ShapeType::Wire => "wire",
            ShapeType::Edge => "edge",
            ShapeType::Vertex => "vertex",
        }
    }
}

impl fmt::Display for ShapeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// An opaque shape value supplied by the geometry kernel.
///
/// # Invariants
/// - `key()` is orientation-insensitive: a reversed edge and its forward twin
///   produce equal keys.
/// - `children()` is deterministic for a given shape.
pub trait Shape: Clone + fmt::Debug {
    /// Hashable identity of a shape value.
    type Key: Eq + Hash + Clone + fmt::Debug;

    /// Returns the orientation-insensitive identity of this shape.
    fn key(&self) -> Self::Key;

    /// Returns the topological type of this shape.
    fn shape_type(&self) -> ShapeType;

    /// Returns `true` for the kernel's null shape.
    fn is_null(&self) -> bool;

    /// Returns the direct sub-shapes, in the kernel's native order.
    fn children(&self) -> Vec<Self>;

    /// Returns `true` if both values denote the same entity, ignoring orientation.
    fn is_same(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

/// Operation-specific history oracle.
///
/// Feature algorithms (booleans, fillets, ...) know which of their input
/// shapes became which output shapes. An input that survived untouched is
/// reported as modified into itself.
pub trait ModifiedOracle<S: Shape> {
    /// Returns the shapes `shape` became. Empty when unknown or deleted.
    fn modified(&self, shape: &S) -> Vec<S>;
}

impl<S: Shape, F> ModifiedOracle<S> for F
where
    F: Fn(&S) -> Vec<S>,
{
    fn modified(&self, shape: &S) -> Vec<S> {
        self(shape)
    }
}

/// A point in model space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Point halfway between `self` and `other`.
    pub fn midpoint(&self, other: &Point3) -> Point3 {
        Point3::new(
            (self.x + other.x) / 2.0,
            (self.y + other.y) / 2.0,
            (self.z + other.z) / 2.0,
        )
    }
}

impl fmt::Display for Point3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Geometric evaluation delegated to the kernel.
///
/// Every method may decline by returning `None` (or an empty vector) when the
/// shape's type or geometry does not support the query.
pub trait Geometry<S: Shape> {
    /// Outer boundary wire of a face.
    fn outer_wire(&self, face: &S) -> Option<S>;

    /// Start vertex of an edge, honouring the edge's orientation.
    fn first_vertex(&self, edge: &S) -> Option<S>;

    /// End vertex of an edge, honouring the edge's orientation.
    fn last_vertex(&self, edge: &S) -> Option<S>;

    /// Location of a vertex.
    fn vertex_point(&self, vertex: &S) -> Option<Point3>;

    /// Parametric midpoint of an edge.
    fn mid_point(&self, edge: &S) -> Option<Point3>;

    /// Center of a circular edge or the centroid of any other shape.
    fn center_point(&self, shape: &S) -> Option<Point3>;

    /// Quadrant points of a circular edge.
    fn quadrant_points(&self, edge: &S) -> Vec<Point3>;

    /// Closest point on `shape` to `point`.
    fn nearest_point(&self, shape: &S, point: &Point3) -> Option<Point3>;

    /// Minimum distance between `shape` and `point`.
    fn distance(&self, shape: &S, point: &Point3) -> Option<f64> {
        self.nearest_point(shape, point).map(|p| p.distance(point))
    }
}

/// Enumerates every distinct sub-shape of `root`, root first.
///
/// Pre-order depth-first walk of [`Shape::children`]. A shape reached a second
/// time (shared edges, seam edges revisited with opposite orientation) is
/// skipped; null shapes are skipped. The position of a shape in the returned
/// vector is its canonical offset.
pub fn canonical_enumeration<S: Shape>(root: &S) -> Vec<S> {
    let mut out = Vec::new();
    if root.is_null() {
        return out;
    }
    let mut seen: HashSet<S::Key> = HashSet::new();
    // Reverse-pushed stack keeps the pre-order of a recursive walk.
    let mut stack = vec![root.clone()];
    while let Some(shape) = stack.pop() {
        if shape.is_null() || !seen.insert(shape.key()) {
            continue;
        }
        let children = shape.children();
        out.push(shape);
        for child in children.into_iter().rev() {
            stack.push(child);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{make_box, ReferenceShape};

    #[test]
    fn enumeration_counts_box_entities() {
        let solid = make_box(1.0, 2.0, 3.0);
        let all = canonical_enumeration(&solid);
        let count = |ty: ShapeType| all.iter().filter(|s| s.shape_type() == ty).count();
        assert_eq!(count(ShapeType::Solid), 1);
        assert_eq!(count(ShapeType::Shell), 1);
        assert_eq!(count(ShapeType::Face), 6);
        assert_eq!(count(ShapeType::Wire), 6);
        assert_eq!(count(ShapeType::Edge), 12);
        assert_eq!(count(ShapeType::Vertex), 8);
        assert!(all[0].is_same(&solid));
    }

    #[test]
    fn enumeration_is_deterministic() {
        let solid = make_box(1.0, 1.0, 1.0);
        let first: Vec<_> = canonical_enumeration(&solid).iter().map(|s| s.key()).collect();
        let second: Vec<_> = canonical_enumeration(&solid).iter().map(|s| s.key()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn null_shape_enumerates_nothing() {
        assert!(canonical_enumeration(&ReferenceShape::null()).is_empty());
    }

    #[test]
    fn closure_is_an_oracle() {
        let solid = make_box(1.0, 1.0, 1.0);
        let oracle = |s: &ReferenceShape| vec![s.clone()];
        assert_eq!(oracle.modified(&solid).len(), 1);
    }

    #[test]
    fn point_math() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(3.0, 4.0, 0.0);
        assert_eq!(a.distance(&b), 5.0);
        assert_eq!(a.midpoint(&b), Point3::new(1.5, 2.0, 0.0));
    }
}
