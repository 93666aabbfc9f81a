//! The SeerShape container.
//!
//! A [`SeerShape`] binds one kernel shape to persistent identities. It owns
//! the identity table and containment graph of the current shape, plus the
//! genealogy ledger, feature tags and derived ids that survive every
//! regeneration of the owning feature.
//!
//! # States
//! - *Empty*: no root shape (`is_null()`).
//! - *Populated*: [`set_shape`](SeerShape::set_shape) rebuilt table and graph;
//!   every id is nil.
//! - *Resolved*: matching and cleanup assigned a unique id to every record.
//!
//! The matching strategies live in [`crate::matching`], the traversal helpers
//! in [`crate::query`] and persistence in [`crate::persist`]; all of them are
//! further `impl` blocks on this type.

use crate::evolution::EvolutionLedger;
use crate::graph::{ContainmentGraph, Direction, VertexId};
use crate::history::ShapeHistory;
use crate::id::{IdSource, RandomIds, StableId};
use crate::kernel::{canonical_enumeration, Shape, ShapeType};
use crate::table::{IdentityTable, RecordHandle, ShapeRecord};
use crate::tags::{DerivedTable, FeatureTagTable};
use std::fmt::Write as _;
use std::sync::Arc;

/// Shape plus persistent identity bookkeeping.
#[derive(Clone)]
pub struct SeerShape<S: Shape> {
    root: Option<S>,
    pub(crate) table: IdentityTable<S>,
    pub(crate) graph: ContainmentGraph,
    pub(crate) evolution: EvolutionLedger,
    pub(crate) tags: FeatureTagTable,
    pub(crate) derived: DerivedTable,
    ids: Arc<dyn IdSource>,
}

impl<S: Shape> SeerShape<S> {
    /// An empty SeerShape minting random ids.
    pub fn new() -> Self {
        Self::with_id_source(Arc::new(RandomIds))
    }

    /// An empty SeerShape minting ids from `ids`.
    pub fn with_id_source(ids: Arc<dyn IdSource>) -> Self {
        Self {
            root: None,
            table: IdentityTable::new(),
            graph: ContainmentGraph::new(),
            evolution: EvolutionLedger::new(),
            tags: FeatureTagTable::new(),
            derived: DerivedTable::new(),
            ids,
        }
    }

    /// The id source shared by this SeerShape.
    pub fn id_source(&self) -> &Arc<dyn IdSource> {
        &self.ids
    }

    /// Installs a freshly computed shape.
    ///
    /// Table and graph are rebuilt from the canonical enumeration with nil ids.
    /// Ledger, tags and derived ids are kept. A null shape leaves the
    /// SeerShape empty.
    pub fn set_shape(&mut self, shape: S) {
        self.table.clear();
        self.graph.clear();
        self.root = None;
        if shape.is_null() {
            return;
        }

        let shapes = canonical_enumeration(&shape);
        for s in shapes {
            let vertex = self.graph.add_vertex(s.shape_type());
            self.table.insert(ShapeRecord::new(StableId::nil(), s, vertex));
        }
        let table = &self.table;
        self.graph
            .connect(&shape, |s| table.handle_of_shape(s).map(|h| table.record(h).vertex));
        log::debug!(
            "installed {:?}: {} records, {} containment edges",
            shape,
            self.table.len(),
            self.graph.edge_count()
        );
        self.root = Some(shape);
    }

    /// Drops the shape and every table, ledger included.
    pub fn reset(&mut self) {
        self.root = None;
        self.table.clear();
        self.graph.clear();
        self.evolution = EvolutionLedger::new();
        self.tags = FeatureTagTable::new();
        self.derived = DerivedTable::new();
    }

    /// Returns `true` when no shape is installed.
    pub fn is_null(&self) -> bool {
        self.root.is_none()
    }

    pub fn root_shape(&self) -> Option<&S> {
        self.root.as_ref()
    }

    /// Id of the root entity; nil when empty or not yet resolved.
    pub fn root_shape_id(&self) -> StableId {
        self.root
            .as_ref()
            .and_then(|root| self.table.handle_of_shape(root))
            .map_or(StableId::nil(), |h| self.table.record(h).id)
    }

    pub(crate) fn mint_id(&self) -> StableId {
        self.ids.next_id()
    }

    // ---- component access ----

    pub fn table(&self) -> &IdentityTable<S> {
        &self.table
    }

    pub fn graph(&self) -> &ContainmentGraph {
        &self.graph
    }

    pub fn evolution(&self) -> &EvolutionLedger {
        &self.evolution
    }

    pub fn feature_tags(&self) -> &FeatureTagTable {
        &self.tags
    }

    pub fn derived(&self) -> &DerivedTable {
        &self.derived
    }

    // ---- identity table ----

    pub fn has_id(&self, id: &StableId) -> bool {
        self.table.has_id(id)
    }

    pub fn has_shape(&self, shape: &S) -> bool {
        self.table.has_shape(shape)
    }

    /// # Panics
    /// Panics if `shape` has no record.
    pub fn find_id(&self, shape: &S) -> StableId {
        self.table.find_by_shape(shape).id
    }

    /// # Panics
    /// Panics if no record carries `id`.
    pub fn find_shape(&self, id: &StableId) -> &S {
        &self.table.find_by_id(id).shape
    }

    /// Shape carrying `id`, if any.
    pub fn shape_of(&self, id: &StableId) -> Option<&S> {
        self.table.handle_of_id(id).map(|h| &self.table.record(h).shape)
    }

    /// Id of `shape`, if it has a record.
    pub fn id_of(&self, shape: &S) -> Option<StableId> {
        self.table.handle_of_shape(shape).map(|h| self.table.record(h).id)
    }

    /// # Panics
    /// Panics if `shape` has no record.
    pub fn update_id(&mut self, shape: &S, id: StableId) {
        self.table.update_id(shape, id);
    }

    /// # Panics
    /// Panics if no record carries `id`.
    pub fn update_shape(&mut self, id: &StableId, shape: S) {
        self.table.update_shape(id, shape);
    }

    /// Every non-nil id in canonical order.
    pub fn all_ids(&self) -> Vec<StableId> {
        self.table.ids()
    }

    /// Every shape in canonical order.
    pub fn all_shapes(&self) -> Vec<S> {
        self.table.shapes()
    }

    /// Shapes whose id is still nil.
    pub fn all_nil_shapes(&self) -> Vec<S> {
        self.table
            .nil_handles()
            .into_iter()
            .map(|h| self.table.record(h).shape.clone())
            .collect()
    }

    /// Shapes of type `ty`, in canonical order.
    pub fn shapes_of_type(&self, ty: ShapeType) -> Vec<S> {
        self.handles_of_type(ty)
            .into_iter()
            .map(|h| self.table.record(h).shape.clone())
            .collect()
    }

    pub(crate) fn handles_of_type(&self, ty: ShapeType) -> Vec<RecordHandle> {
        self.table
            .iter()
            .filter(|(_, r)| r.shape.shape_type() == ty)
            .map(|(h, _)| h)
            .collect()
    }

    /// Records of type `ty` reachable from `handle` in `direction`.
    pub(crate) fn related_handles(
        &self,
        handle: RecordHandle,
        ty: ShapeType,
        direction: Direction,
    ) -> Vec<RecordHandle> {
        let start = self.table.record(handle).vertex;
        self.graph
            .collect(start, ty, direction)
            .into_iter()
            .filter_map(|v| self.table.handle_of_vertex(v))
            .collect()
    }

    /// Ids of the records `related_handles` reports, nils included.
    pub(crate) fn related_ids(&self, handle: RecordHandle, ty: ShapeType, direction: Direction) -> Vec<StableId> {
        self.related_handles(handle, ty, direction)
            .into_iter()
            .map(|h| self.table.record(h).id)
            .collect()
    }

    // ---- evolution ledger ----

    pub fn insert_evolve(&mut self, in_id: StableId, out_id: StableId) -> bool {
        self.evolution.insert(in_id, out_id)
    }

    pub fn evolve(&self, in_id: &StableId) -> Vec<StableId> {
        self.evolution.evolve(in_id)
    }

    pub fn devolve(&self, out_id: &StableId) -> Vec<StableId> {
        self.evolution.devolve(out_id)
    }

    pub fn has_evolve_in(&self, in_id: &StableId) -> bool {
        self.evolution.has_in(in_id)
    }

    pub fn has_evolve_out(&self, out_id: &StableId) -> bool {
        self.evolution.has_out(out_id)
    }

    /// Canonicalizes a provisional id in the ledger's in-column.
    ///
    /// Only the ledger's in-column is rewritten; out-ids, the identity table
    /// and feature tags keep the stale id.
    pub fn replace_id(&mut self, stale: &StableId, fresh: &StableId) -> usize {
        self.evolution.replace_id(stale, fresh)
    }

    /// Publishes the ledger into a document-level history for `feature`.
    pub fn fill_in_history<H: ShapeHistory + ?Sized>(&self, history: &mut H, feature: StableId) -> usize {
        self.evolution.fill_in_history(&self.table, history, feature)
    }

    // ---- feature tags ----

    pub fn insert_feature_tag(&mut self, id: StableId, tag: impl Into<String>) {
        self.tags.insert(id, tag);
    }

    pub fn feature_tag_id(&self, tag: &str) -> Option<StableId> {
        self.tags.id_of(tag)
    }

    pub fn feature_tag(&self, id: &StableId) -> Option<&str> {
        self.tags.tag_of(id)
    }

    // ---- diagnostics ----

    pub fn dump_shape_ids(&self) -> String {
        self.table.to_string()
    }

    pub fn dump_evolve(&self) -> String {
        self.evolution.to_string()
    }

    pub fn dump_feature_tags(&self) -> String {
        self.tags.to_string()
    }

    pub fn dump_derived(&self) -> String {
        self.derived.to_string()
    }

    /// Records still carrying a nil id.
    pub fn dump_nils(&self) -> String {
        let nils = self.table.nil_handles();
        let mut out = format!("nil ids: {}\n", nils.len());
        for handle in nils {
            let record = self.table.record(handle);
            let _ = writeln!(out, "  {:?}  {}", record.shape, record.vertex);
        }
        out
    }

    /// Ids shared by more than one record.
    pub fn dump_duplicates(&self) -> String {
        let duplicates = self.table.duplicates();
        let mut out = format!("duplicate ids: {}\n", duplicates.len());
        for (id, handles) in duplicates {
            let shapes: Vec<String> = handles
                .iter()
                .map(|h| format!("{:?}", self.table.record(*h).shape))
                .collect();
            let _ = writeln!(out, "  {}  {}", id, shapes.join(" "));
        }
        out
    }

    /// DOT rendering of the containment graph.
    pub fn graph_dot(&self) -> String {
        self.graph.to_dot(Direction::Descendants, |v| self.vertex_label(v))
    }

    /// DOT rendering of the reverse containment graph.
    pub fn reverse_graph_dot(&self) -> String {
        self.graph.to_dot(Direction::Ancestors, |v| self.vertex_label(v))
    }

    fn vertex_label(&self, vertex: VertexId) -> String {
        self.table
            .handle_of_vertex(vertex)
            .map(|h| self.table.record(h).id.to_string())
            .unwrap_or_default()
    }
}

impl<S: Shape> Default for SeerShape<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Shape> std::fmt::Debug for SeerShape<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeerShape")
            .field("root", &self.root)
            .field("records", &self.table.len())
            .field("evolve", &self.evolution.len())
            .field("feature_tags", &self.tags.len())
            .field("derived", &self.derived.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::SequentialIds;
    use crate::reference::{box_topology, make_box, ReferenceShape};

    fn seer() -> SeerShape<ReferenceShape> {
        SeerShape::with_id_source(Arc::new(SequentialIds::new(1)))
    }

    #[test]
    fn null_shape_is_empty() {
        let mut s = seer();
        assert!(s.is_null());
        s.set_shape(ReferenceShape::null());
        assert!(s.is_null());
        assert!(s.all_ids().is_empty());
        assert!(s.all_shapes().is_empty());
        assert!(s.root_shape_id().is_nil());
    }

    #[test]
    fn install_populates_with_nils() {
        let mut s = seer();
        let topo = box_topology(1.0, 1.0, 1.0);
        s.set_shape(topo.solid.clone());
        assert!(!s.is_null());
        assert_eq!(s.all_shapes().len(), 34);
        assert_eq!(s.all_nil_shapes().len(), 34);
        assert!(s.all_ids().is_empty());
        assert_eq!(s.shapes_of_type(ShapeType::Face).len(), 6);
        assert_eq!(s.graph().vertex_count(), 34);
        assert!(s.root_shape().is_some_and(|r| r.is_same(&topo.solid)));
    }

    #[test]
    fn reinstall_keeps_ledger_and_tags() {
        let mut s = seer();
        s.set_shape(make_box(1.0, 1.0, 1.0));
        let id = s.mint_id();
        s.insert_evolve(StableId::nil(), id);
        s.insert_feature_tag(id, "top");
        s.set_shape(make_box(2.0, 2.0, 2.0));
        assert_eq!(s.evolution().len(), 1);
        assert_eq!(s.feature_tag_id("top"), Some(id));
        assert_eq!(s.all_nil_shapes().len(), 34);

        s.reset();
        assert!(s.is_null());
        assert!(s.evolution().is_empty());
        assert!(s.feature_tags().is_empty());
    }

    #[test]
    fn root_id_follows_root_record() {
        let mut s = seer();
        let solid = make_box(1.0, 1.0, 1.0);
        s.set_shape(solid.clone());
        let id = s.mint_id();
        s.update_id(&solid, id);
        assert_eq!(s.root_shape_id(), id);
        assert_eq!(s.find_shape(&id), &solid);
        assert_eq!(s.find_id(&solid), id);
    }

    #[test]
    fn dumps_mention_every_table() {
        let mut s = seer();
        s.set_shape(make_box(1.0, 1.0, 1.0));
        assert!(s.dump_shape_ids().starts_with("shape id container: 34 records"));
        assert!(s.dump_nils().starts_with("nil ids: 34"));
        assert!(s.dump_duplicates().starts_with("duplicate ids: 0"));
        assert!(s.dump_evolve().starts_with("evolve container"));
        assert!(s.dump_feature_tags().starts_with("feature tag container"));
        assert!(s.dump_derived().starts_with("derived container"));
        assert!(s.graph_dot().contains("->"));
        assert!(s.reverse_graph_dot().starts_with("digraph containment_reverse"));
    }
}
