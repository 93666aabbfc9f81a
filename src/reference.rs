//! In-memory reference kernel.
//!
//! A deliberately small B-rep implementation of the [`kernel`](crate::kernel)
//! traits: shapes are reference-counted nodes carrying a topological type,
//! ordered children and just enough geometry (points, straight edges, circles)
//! to answer the point queries. Every constructed node gets a process-wide
//! serial number, which is its identity key, so rebuilding a model yields new
//! keys exactly as a real kernel regeneration does.
//!
//! Used by the test-suite and the benchmarks; also a readable template for
//! binding a production kernel.

use crate::kernel::{canonical_enumeration, Geometry, ModifiedOracle, Point3, Shape, ShapeType};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Geometry attached to a node.
#[derive(Debug, Clone, PartialEq)]
enum Carrier {
    None,
    Point(Point3),
    Line,
    Circle { center: Point3, radius: f64 },
}

#[derive(Debug)]
struct Node {
    serial: u64,
    ty: ShapeType,
    children: Vec<ReferenceShape>,
    carrier: Carrier,
}

/// Shape value of the reference kernel.
///
/// Cloning is cheap. Two values are the same entity when they share a node;
/// orientation is a per-value flag and does not take part in identity.
#[derive(Clone)]
pub struct ReferenceShape {
    node: Option<Arc<Node>>,
    reversed: bool,
}

impl ReferenceShape {
    fn build(ty: ShapeType, children: Vec<ReferenceShape>, carrier: Carrier) -> Self {
        let serial = NEXT_SERIAL.fetch_add(1, Ordering::Relaxed);
        Self {
            node: Some(Arc::new(Node {
                serial,
                ty,
                children,
                carrier,
            })),
            reversed: false,
        }
    }

    /// The null shape.
    pub fn null() -> Self {
        Self {
            node: None,
            reversed: false,
        }
    }

    /// A vertex at `point`.
    pub fn vertex(point: Point3) -> Self {
        Self::build(ShapeType::Vertex, Vec::new(), Carrier::Point(point))
    }

    /// A straight edge from `start` to `end`.
    pub fn line(start: &ReferenceShape, end: &ReferenceShape) -> Self {
        Self::build(ShapeType::Edge, vec![start.clone(), end.clone()], Carrier::Line)
    }

    /// A full circle in the XY plane, closed on `seam`.
    pub fn circle(seam: &ReferenceShape, center: Point3, radius: f64) -> Self {
        Self::build(
            ShapeType::Edge,
            vec![seam.clone(), seam.reversed()],
            Carrier::Circle { center, radius },
        )
    }

    pub fn wire(edges: Vec<ReferenceShape>) -> Self {
        Self::build(ShapeType::Wire, edges, Carrier::None)
    }

    /// A face bounded by `wires`; the first wire is the outer one.
    pub fn face(wires: Vec<ReferenceShape>) -> Self {
        Self::build(ShapeType::Face, wires, Carrier::None)
    }

    pub fn shell(faces: Vec<ReferenceShape>) -> Self {
        Self::build(ShapeType::Shell, faces, Carrier::None)
    }

    pub fn solid(shells: Vec<ReferenceShape>) -> Self {
        Self::build(ShapeType::Solid, shells, Carrier::None)
    }

    pub fn compound(children: Vec<ReferenceShape>) -> Self {
        Self::build(ShapeType::Compound, children, Carrier::None)
    }

    /// The same entity with flipped orientation.
    pub fn reversed(&self) -> Self {
        Self {
            node: self.node.clone(),
            reversed: !self.reversed,
        }
    }

    /// Returns `true` when this value carries reversed orientation.
    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Process-wide serial number of the underlying node, `0` for null.
    pub fn serial(&self) -> u64 {
        self.node.as_ref().map_or(0, |n| n.serial)
    }

    fn carrier(&self) -> &Carrier {
        self.node.as_ref().map_or(&Carrier::None, |n| &n.carrier)
    }

    fn child(&self, index: usize) -> Option<&ReferenceShape> {
        self.node.as_ref().and_then(|n| n.children.get(index))
    }
}

impl Shape for ReferenceShape {
    type Key = u64;

    fn key(&self) -> u64 {
        self.serial()
    }

    fn shape_type(&self) -> ShapeType {
        // The null shape reports as an empty compound.
        self.node.as_ref().map_or(ShapeType::Compound, |n| n.ty)
    }

    fn is_null(&self) -> bool {
        self.node.is_none()
    }

    fn children(&self) -> Vec<Self> {
        self.node.as_ref().map_or_else(Vec::new, |n| n.children.clone())
    }
}

impl PartialEq for ReferenceShape {
    fn eq(&self, other: &Self) -> bool {
        self.is_same(other)
    }
}

impl Eq for ReferenceShape {}

impl fmt::Debug for ReferenceShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            None => write!(f, "Null"),
            Some(node) => {
                write!(f, "{}#{}", node.ty, node.serial)?;
                if self.reversed {
                    write!(f, "(R)")?;
                }
                Ok(())
            }
        }
    }
}

/// Geometry evaluator for [`ReferenceShape`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceGeometry;

impl ReferenceGeometry {
    fn edge_ends(&self, edge: &ReferenceShape) -> Option<(Point3, Point3)> {
        let start = self.first_vertex(edge)?;
        let end = self.last_vertex(edge)?;
        Some((self.vertex_point(&start)?, self.vertex_point(&end)?))
    }
}

impl Geometry<ReferenceShape> for ReferenceGeometry {
    fn outer_wire(&self, face: &ReferenceShape) -> Option<ReferenceShape> {
        if face.shape_type() != ShapeType::Face {
            return None;
        }
        face.child(0).cloned()
    }

    fn first_vertex(&self, edge: &ReferenceShape) -> Option<ReferenceShape> {
        if edge.shape_type() != ShapeType::Edge {
            return None;
        }
        let index = if edge.reversed { 1 } else { 0 };
        edge.child(index).cloned()
    }

    fn last_vertex(&self, edge: &ReferenceShape) -> Option<ReferenceShape> {
        if edge.shape_type() != ShapeType::Edge {
            return None;
        }
        let index = if edge.reversed { 0 } else { 1 };
        edge.child(index).cloned()
    }

    fn vertex_point(&self, vertex: &ReferenceShape) -> Option<Point3> {
        match vertex.carrier() {
            Carrier::Point(p) => Some(*p),
            _ => None,
        }
    }

    fn mid_point(&self, edge: &ReferenceShape) -> Option<Point3> {
        match edge.carrier() {
            Carrier::Line => self.edge_ends(edge).map(|(a, b)| a.midpoint(&b)),
            Carrier::Circle { center, .. } => {
                // Half way round from the seam.
                let seam = self.vertex_point(edge.child(0)?)?;
                Some(Point3::new(2.0 * center.x - seam.x, 2.0 * center.y - seam.y, seam.z))
            }
            _ => None,
        }
    }

    fn center_point(&self, shape: &ReferenceShape) -> Option<Point3> {
        if let Carrier::Circle { center, .. } = shape.carrier() {
            return Some(*center);
        }
        let points: Vec<Point3> = canonical_enumeration(shape)
            .iter()
            .filter_map(|s| self.vertex_point(s))
            .collect();
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f64;
        let sum = points.iter().fold(Point3::default(), |acc, p| {
            Point3::new(acc.x + p.x, acc.y + p.y, acc.z + p.z)
        });
        Some(Point3::new(sum.x / n, sum.y / n, sum.z / n))
    }

    fn quadrant_points(&self, edge: &ReferenceShape) -> Vec<Point3> {
        match edge.carrier() {
            Carrier::Circle { center, radius } => vec![
                Point3::new(center.x + radius, center.y, center.z),
                Point3::new(center.x, center.y + radius, center.z),
                Point3::new(center.x - radius, center.y, center.z),
                Point3::new(center.x, center.y - radius, center.z),
            ],
            _ => Vec::new(),
        }
    }

    fn nearest_point(&self, shape: &ReferenceShape, point: &Point3) -> Option<Point3> {
        match (shape.shape_type(), shape.carrier()) {
            (ShapeType::Vertex, Carrier::Point(p)) => Some(*p),
            (ShapeType::Edge, Carrier::Line) => {
                let (a, b) = self.edge_ends(shape)?;
                Some(project_on_segment(&a, &b, point))
            }
            (ShapeType::Edge, Carrier::Circle { center, radius }) => {
                let dx = point.x - center.x;
                let dy = point.y - center.y;
                let len = (dx * dx + dy * dy).sqrt();
                if len == 0.0 {
                    return self.vertex_point(shape.child(0)?);
                }
                Some(Point3::new(
                    center.x + dx / len * radius,
                    center.y + dy / len * radius,
                    center.z,
                ))
            }
            _ => canonical_enumeration(shape)
                .iter()
                .filter(|s| s.shape_type() == ShapeType::Edge || s.shape_type() == ShapeType::Vertex)
                .filter_map(|s| self.nearest_point(s, point))
                .min_by(|a, b| a.distance(point).total_cmp(&b.distance(point))),
        }
    }
}

fn project_on_segment(a: &Point3, b: &Point3, p: &Point3) -> Point3 {
    let (abx, aby, abz) = (b.x - a.x, b.y - a.y, b.z - a.z);
    let len2 = abx * abx + aby * aby + abz * abz;
    if len2 == 0.0 {
        return *a;
    }
    let t = ((p.x - a.x) * abx + (p.y - a.y) * aby + (p.z - a.z) * abz) / len2;
    let t = t.clamp(0.0, 1.0);
    Point3::new(a.x + t * abx, a.y + t * aby, a.z + t * abz)
}

/// Modified-shapes oracle backed by an explicit map.
///
/// Plays the part of a feature algorithm's history: `record(from, to)` states
/// that `from` became (among others) `to`.
#[derive(Debug, Default, Clone)]
pub struct ReferenceHistory {
    modified: HashMap<u64, Vec<ReferenceShape>>,
}

impl ReferenceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `from` became `to`.
    pub fn record(&mut self, from: &ReferenceShape, to: &ReferenceShape) {
        self.modified.entry(from.key()).or_default().push(to.clone());
    }
}

impl ModifiedOracle<ReferenceShape> for ReferenceHistory {
    fn modified(&self, shape: &ReferenceShape) -> Vec<ReferenceShape> {
        self.modified.get(&shape.key()).cloned().unwrap_or_default()
    }
}

/// Every sub-shape of an axis-aligned box, grouped by type.
///
/// Vertex `i` sits at `((i & 1) * dx, (i >> 1 & 1) * dy, (i >> 2 & 1) * dz)`.
/// Faces are ordered bottom, top, front, back, left, right.
#[derive(Debug, Clone)]
pub struct BoxTopology {
    pub vertices: Vec<ReferenceShape>,
    pub edges: Vec<ReferenceShape>,
    pub wires: Vec<ReferenceShape>,
    pub faces: Vec<ReferenceShape>,
    pub shell: ReferenceShape,
    pub solid: ReferenceShape,
}

const BOX_EDGES: [(usize, usize); 12] = [
    (0, 1),
    (2, 3),
    (4, 5),
    (6, 7),
    (0, 2),
    (1, 3),
    (4, 6),
    (5, 7),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

const BOX_FACES: [[usize; 4]; 6] = [
    [0, 2, 3, 1],
    [4, 5, 7, 6],
    [0, 1, 5, 4],
    [2, 6, 7, 3],
    [0, 4, 6, 2],
    [1, 3, 7, 5],
];

/// Builds a fresh box with new identities for every sub-shape.
pub fn box_topology(dx: f64, dy: f64, dz: f64) -> BoxTopology {
    let vertices: Vec<ReferenceShape> = (0..8)
        .map(|i| {
            let f = |bit: usize| ((i >> bit) & 1) as f64;
            ReferenceShape::vertex(Point3::new(f(0) * dx, f(1) * dy, f(2) * dz))
        })
        .collect();
    let edges: Vec<ReferenceShape> = BOX_EDGES
        .iter()
        .map(|&(a, b)| ReferenceShape::line(&vertices[a], &vertices[b]))
        .collect();

    let oriented_edge = |a: usize, b: usize| -> ReferenceShape {
        for (index, &(s, e)) in BOX_EDGES.iter().enumerate() {
            if (s, e) == (a, b) {
                return edges[index].clone();
            }
            if (s, e) == (b, a) {
                return edges[index].reversed();
            }
        }
        unreachable!("box face cycles only use box edges")
    };

    let wires: Vec<ReferenceShape> = BOX_FACES
        .iter()
        .map(|cycle| {
            let loop_edges = (0..4)
                .map(|k| oriented_edge(cycle[k], cycle[(k + 1) % 4]))
                .collect();
            ReferenceShape::wire(loop_edges)
        })
        .collect();
    let faces: Vec<ReferenceShape> = wires
        .iter()
        .map(|w| ReferenceShape::face(vec![w.clone()]))
        .collect();
    let shell = ReferenceShape::shell(faces.clone());
    let solid = ReferenceShape::solid(vec![shell.clone()]);

    BoxTopology {
        vertices,
        edges,
        wires,
        faces,
        shell,
        solid,
    }
}

/// Builds a fresh box solid.
pub fn make_box(dx: f64, dy: f64, dz: f64) -> ReferenceShape {
    box_topology(dx, dy, dz).solid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orientation_does_not_change_identity() {
        let a = ReferenceShape::vertex(Point3::new(0.0, 0.0, 0.0));
        let b = ReferenceShape::vertex(Point3::new(1.0, 0.0, 0.0));
        let edge = ReferenceShape::line(&a, &b);
        assert!(edge.is_same(&edge.reversed()));
        assert_eq!(edge.key(), edge.reversed().key());
        assert!(edge.reversed().is_reversed());
    }

    #[test]
    fn rebuilding_yields_new_identities() {
        let first = make_box(1.0, 1.0, 1.0);
        let second = make_box(1.0, 1.0, 1.0);
        assert!(!first.is_same(&second));
    }

    #[test]
    fn first_and_last_vertex_follow_orientation() {
        let geometry = ReferenceGeometry;
        let a = ReferenceShape::vertex(Point3::new(0.0, 0.0, 0.0));
        let b = ReferenceShape::vertex(Point3::new(2.0, 0.0, 0.0));
        let edge = ReferenceShape::line(&a, &b);
        assert_eq!(geometry.first_vertex(&edge), Some(a.clone()));
        assert_eq!(geometry.first_vertex(&edge.reversed()), Some(b.clone()));
        assert_eq!(geometry.mid_point(&edge), Some(Point3::new(1.0, 0.0, 0.0)));
        assert_eq!(
            geometry.nearest_point(&edge, &Point3::new(5.0, 3.0, 0.0)),
            Some(Point3::new(2.0, 0.0, 0.0))
        );
    }

    #[test]
    fn circle_queries() {
        let geometry = ReferenceGeometry;
        let seam = ReferenceShape::vertex(Point3::new(2.0, 0.0, 0.0));
        let circle = ReferenceShape::circle(&seam, Point3::new(0.0, 0.0, 0.0), 2.0);
        assert_eq!(geometry.center_point(&circle), Some(Point3::new(0.0, 0.0, 0.0)));
        assert_eq!(geometry.mid_point(&circle), Some(Point3::new(-2.0, 0.0, 0.0)));
        assert_eq!(geometry.quadrant_points(&circle).len(), 4);
    }

    #[test]
    fn box_center() {
        let geometry = ReferenceGeometry;
        let solid = make_box(2.0, 4.0, 6.0);
        assert_eq!(geometry.center_point(&solid), Some(Point3::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn history_oracle_reports_recorded_results() {
        let before = make_box(1.0, 1.0, 1.0);
        let after = make_box(1.0, 1.0, 1.0);
        let mut history = ReferenceHistory::new();
        history.record(&before, &after);
        assert_eq!(history.modified(&before), vec![after]);
        assert!(history.modified(&ReferenceShape::null()).is_empty());
    }
}
