//! Traversal and point queries over the current shape.
//!
//! Structural queries walk the containment graph; point queries resolve an id
//! to its shape and hand it to the kernel's [`Geometry`]. An unknown shape or
//! id is data drift, not a bug: the query logs a warning and returns an empty
//! result.

use crate::graph::Direction;
use crate::id::StableId;
use crate::kernel::{Geometry, Point3, Shape, ShapeType};
use crate::seer::SeerShape;
use crate::table::RecordHandle;

impl<S: Shape> SeerShape<S> {
    /// Every ancestor of `shape` of type `ty`, nearest first.
    pub fn parents_of_type(&self, shape: &S, ty: ShapeType) -> Vec<S> {
        self.related_shapes(shape, ty, Direction::Ancestors)
    }

    /// Every descendant of `shape` of type `ty`, nearest first.
    pub fn children_of_type(&self, shape: &S, ty: ShapeType) -> Vec<S> {
        self.related_shapes(shape, ty, Direction::Descendants)
    }

    /// Ids of the ancestors of `id` of type `ty`.
    pub fn parent_ids_of_type(&self, id: &StableId, ty: ShapeType) -> Vec<StableId> {
        self.handle_or_warn(id)
            .map(|h| self.related_ids(h, ty, Direction::Ancestors))
            .unwrap_or_default()
    }

    /// Ids of the descendants of `id` of type `ty`.
    pub fn child_ids_of_type(&self, id: &StableId, ty: ShapeType) -> Vec<StableId> {
        self.handle_or_warn(id)
            .map(|h| self.related_ids(h, ty, Direction::Descendants))
            .unwrap_or_default()
    }

    /// The wire of `face` that uses `edge`.
    pub fn wire_of(&self, edge: &S, face: &S) -> Option<S> {
        let face_wires = self.children_of_type(face, ShapeType::Wire);
        self.parents_of_type(edge, ShapeType::Wire)
            .into_iter()
            .find(|wire| face_wires.iter().any(|w| w.is_same(wire)))
    }

    /// Wires using `edge` that bound no face.
    pub fn faceless_wires(&self, edge: &S) -> Vec<S> {
        self.parents_of_type(edge, ShapeType::Wire)
            .into_iter()
            .filter(|wire| self.parents_of_type(wire, ShapeType::Face).is_empty())
            .collect()
    }

    /// The wire of `face` nearest to `point`.
    pub fn closest_wire(&self, face: &S, point: &Point3, geometry: &dyn Geometry<S>) -> Option<S> {
        self.children_of_type(face, ShapeType::Wire)
            .into_iter()
            .filter_map(|wire| geometry.distance(&wire, point).map(|d| (d, wire)))
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, wire)| wire)
    }

    /// Start vertex of `edge` as a shape of this table.
    pub fn first_vertex(&self, edge: &S, geometry: &dyn Geometry<S>) -> Option<S> {
        self.known(geometry.first_vertex(edge)?)
    }

    /// End vertex of `edge` as a shape of this table.
    pub fn last_vertex(&self, edge: &S, geometry: &dyn Geometry<S>) -> Option<S> {
        self.known(geometry.last_vertex(edge)?)
    }

    // ---- point queries ----

    /// Location of a vertex, or the two end points of an edge.
    pub fn end_points(&self, id: &StableId, geometry: &dyn Geometry<S>) -> Vec<Point3> {
        let Some(shape) = self.shape_or_warn(id) else {
            return Vec::new();
        };
        match shape.shape_type() {
            ShapeType::Vertex => geometry.vertex_point(shape).into_iter().collect(),
            ShapeType::Edge => [geometry.first_vertex(shape), geometry.last_vertex(shape)]
                .into_iter()
                .flatten()
                .filter_map(|v| geometry.vertex_point(&v))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn mid_point(&self, id: &StableId, geometry: &dyn Geometry<S>) -> Vec<Point3> {
        self.shape_or_warn(id)
            .and_then(|s| geometry.mid_point(s))
            .into_iter()
            .collect()
    }

    pub fn center_point(&self, id: &StableId, geometry: &dyn Geometry<S>) -> Vec<Point3> {
        self.shape_or_warn(id)
            .and_then(|s| geometry.center_point(s))
            .into_iter()
            .collect()
    }

    pub fn quadrant_points(&self, id: &StableId, geometry: &dyn Geometry<S>) -> Vec<Point3> {
        self.shape_or_warn(id)
            .map(|s| geometry.quadrant_points(s))
            .unwrap_or_default()
    }

    /// Point of the entity `id` closest to `point`.
    pub fn nearest_point(&self, id: &StableId, point: &Point3, geometry: &dyn Geometry<S>) -> Vec<Point3> {
        self.shape_or_warn(id)
            .and_then(|s| geometry.nearest_point(s, point))
            .into_iter()
            .collect()
    }

    fn related_shapes(&self, shape: &S, ty: ShapeType, direction: Direction) -> Vec<S> {
        let Some(handle) = self.table.handle_of_shape(shape) else {
            log::warn!("{shape:?} is not part of the current shape");
            return Vec::new();
        };
        self.related_handles(handle, ty, direction)
            .into_iter()
            .map(|h| self.table.record(h).shape.clone())
            .collect()
    }

    fn known(&self, shape: S) -> Option<S> {
        let handle = self.table.handle_of_shape(&shape)?;
        Some(self.table.record(handle).shape.clone())
    }

    fn handle_or_warn(&self, id: &StableId) -> Option<RecordHandle> {
        let handle = self.table.handle_of_id(id);
        if handle.is_none() {
            log::warn!("no entity with id {id}");
        }
        handle
    }

    fn shape_or_warn(&self, id: &StableId) -> Option<&S> {
        self.handle_or_warn(id).map(|h| &self.table.record(h).shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::SequentialIds;
    use crate::reference::{box_topology, ReferenceGeometry, ReferenceShape};
    use std::sync::Arc;

    fn resolved(root: ReferenceShape) -> SeerShape<ReferenceShape> {
        let mut seer = SeerShape::with_id_source(Arc::new(SequentialIds::new(7)));
        seer.set_shape(root);
        seer.ensure_no_nils();
        seer
    }

    #[test]
    fn parents_and_children_by_type() {
        let topo = box_topology(1.0, 1.0, 1.0);
        let seer = resolved(topo.solid.clone());
        let edge = &topo.edges[0];
        assert_eq!(seer.parents_of_type(edge, ShapeType::Face).len(), 2);
        assert_eq!(seer.children_of_type(edge, ShapeType::Vertex).len(), 2);
        assert_eq!(seer.children_of_type(&topo.faces[0], ShapeType::Edge).len(), 4);
        assert_eq!(seer.children_of_type(&topo.solid, ShapeType::Vertex).len(), 8);
        assert!(seer.parents_of_type(&topo.solid, ShapeType::Face).is_empty());

        let edge_id = seer.find_id(edge);
        let face_ids = seer.parent_ids_of_type(&edge_id, ShapeType::Face);
        assert_eq!(face_ids.len(), 2);
        for id in face_ids {
            assert!(seer.child_ids_of_type(&id, ShapeType::Edge).contains(&edge_id));
        }
    }

    #[test]
    fn unknown_entities_yield_nothing() {
        let topo = box_topology(1.0, 1.0, 1.0);
        let seer = resolved(topo.solid.clone());
        let stranger = box_topology(1.0, 1.0, 1.0).edges[0].clone();
        assert!(seer.parents_of_type(&stranger, ShapeType::Face).is_empty());
        let missing = StableId::nil();
        assert!(seer.parent_ids_of_type(&missing, ShapeType::Face).is_empty());
        assert!(seer.end_points(&missing, &ReferenceGeometry).is_empty());
        assert!(seer.mid_point(&missing, &ReferenceGeometry).is_empty());
    }

    #[test]
    fn wire_lookups() {
        let topo = box_topology(1.0, 1.0, 1.0);
        let seer = resolved(topo.solid.clone());
        let edge = &topo.edges[0];
        let face = &seer.parents_of_type(edge, ShapeType::Face)[0];
        let wire = seer.wire_of(edge, face).unwrap();
        assert!(seer.children_of_type(face, ShapeType::Wire)[0].is_same(&wire));
        assert!(seer.faceless_wires(edge).is_empty());

        let near = seer.closest_wire(face, &Point3::new(0.5, 0.0, 0.0), &ReferenceGeometry);
        assert!(near.is_some_and(|w| w.is_same(&wire)));
    }

    #[test]
    fn faceless_wire_is_found() {
        let a = ReferenceShape::vertex(Point3::new(0.0, 0.0, 0.0));
        let b = ReferenceShape::vertex(Point3::new(1.0, 0.0, 0.0));
        let edge = ReferenceShape::line(&a, &b);
        let wire = ReferenceShape::wire(vec![edge.clone()]);
        let seer = resolved(ReferenceShape::compound(vec![wire.clone()]));
        let found = seer.faceless_wires(&edge);
        assert_eq!(found.len(), 1);
        assert!(found[0].is_same(&wire));
    }

    #[test]
    fn point_queries_delegate_to_geometry() {
        let a = ReferenceShape::vertex(Point3::new(0.0, 0.0, 0.0));
        let b = ReferenceShape::vertex(Point3::new(4.0, 0.0, 0.0));
        let line = ReferenceShape::line(&a, &b);
        let seam = ReferenceShape::vertex(Point3::new(2.0, 0.0, 0.0));
        let circle = ReferenceShape::circle(&seam, Point3::new(0.0, 0.0, 0.0), 2.0);
        let seer = resolved(ReferenceShape::compound(vec![
            ReferenceShape::wire(vec![line.clone()]),
            ReferenceShape::wire(vec![circle.clone()]),
        ]));
        let g = ReferenceGeometry;

        let line_id = seer.find_id(&line);
        assert_eq!(
            seer.end_points(&line_id, &g),
            vec![Point3::new(0.0, 0.0, 0.0), Point3::new(4.0, 0.0, 0.0)]
        );
        assert_eq!(seer.mid_point(&line_id, &g), vec![Point3::new(2.0, 0.0, 0.0)]);
        assert_eq!(
            seer.nearest_point(&line_id, &Point3::new(1.0, 5.0, 0.0), &g),
            vec![Point3::new(1.0, 0.0, 0.0)]
        );
        assert_eq!(seer.first_vertex(&line.reversed(), &g), Some(b.clone()));
        assert_eq!(seer.last_vertex(&line, &g), Some(b));

        let circle_id = seer.find_id(&circle);
        assert_eq!(seer.center_point(&circle_id, &g), vec![Point3::new(0.0, 0.0, 0.0)]);
        assert_eq!(seer.quadrant_points(&circle_id, &g).len(), 4);
        assert_eq!(seer.end_points(&seer.find_id(&seam), &g), vec![Point3::new(2.0, 0.0, 0.0)]);
    }
}
