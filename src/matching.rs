//! Identity matching between two versions of a shape.
//!
//! Every strategy reads a *source* SeerShape (the previous version, or an
//! upstream feature's output) and assigns ids to nil records of `self`, the
//! *target*. Each assignment is recorded in the target's evolution ledger.
//! Strategies only touch nil records, so running one twice is a no-op, and
//! none of them fails: an entity that cannot be matched unambiguously is
//! skipped and left to the next strategy or to cleanup.
//!
//! # Evolved ids
//! When a target entity descends from source id `S` but is not `S` itself, it
//! takes the first out-id of `evolve(S)` not already used in the target table.
//! Only when every such id is taken is a fresh one minted and `(S, fresh)`
//! recorded. Splits therefore receive the same distinct ids on every
//! regeneration.
//!
//! # Citations
//! - Topological naming via face adjacency: Capoyleas, Chen, Hoffmann, "Generic naming in generative, constraint-based design" (1996)

use crate::config::{MatchContext, MatchPlan, MatchReport, Strategy};
use crate::graph::Direction;
use crate::id::StableId;
use crate::kernel::{Geometry, ModifiedOracle, Shape, ShapeType};
use crate::seer::SeerShape;
use crate::table::RecordHandle;
use crate::tags::DerivedKey;
use std::collections::BTreeSet;

impl<S: Shape> SeerShape<S> {
    /// Installs `shape` and resolves its ids against `source`.
    pub fn regenerate(
        &mut self,
        shape: S,
        source: &SeerShape<S>,
        plan: &MatchPlan,
        ctx: &MatchContext<'_, S>,
    ) -> MatchReport {
        self.set_shape(shape);
        self.apply_plan(source, plan, ctx)
    }

    /// Runs the strategies of `plan` in order, then cleanup if enabled.
    ///
    /// Strategies whose capability is missing from `ctx` are reported as
    /// skipped.
    pub fn apply_plan(&mut self, source: &SeerShape<S>, plan: &MatchPlan, ctx: &MatchContext<'_, S>) -> MatchReport {
        let mut report = MatchReport::default();
        for &strategy in &plan.strategies {
            let resolved = match strategy {
                Strategy::Shape => Some(self.shape_match(source)),
                Strategy::UniqueType => Some(self.unique_type_match(source)),
                Strategy::OuterWire => ctx.geometry.map(|g| self.outer_wire_match(source, g)),
                Strategy::Modified => ctx.oracle.map(|o| self.modified_match(source, o)),
                Strategy::Derived => Some(self.derived_match()),
                Strategy::FaceEdge => Some(self.face_edge_match(source)),
                Strategy::EdgeVertex => Some(self.edge_vertex_match(source)),
            };
            match resolved {
                Some(count) => {
                    log::debug!("{strategy} matching resolved {count} records");
                    report.resolved.push((strategy, count));
                }
                None => {
                    log::debug!("{strategy} matching skipped: capability not supplied");
                    report.skipped.push(strategy);
                }
            }
        }
        if plan.cleanup {
            report.nils_minted = self.ensure_no_nils();
            report.duplicates_minted = self.ensure_no_duplicates();
        }
        report
    }

    /// Target records whose shape value is also in `source` take its id as is.
    pub fn shape_match(&mut self, source: &SeerShape<S>) -> usize {
        let mut resolved = 0;
        for (_, record) in source.table.iter() {
            if record.id.is_nil() {
                continue;
            }
            let Some(handle) = self.nil_handle_of(&record.shape) else {
                continue;
            };
            self.table.set_id(handle, record.id);
            self.evolution.insert(record.id, record.id);
            resolved += 1;
        }
        resolved
    }

    /// Pairs the sole entity of a type with the sole source entity of that type.
    pub fn unique_type_match(&mut self, source: &SeerShape<S>) -> usize {
        let mut resolved = 0;
        for ty in ShapeType::ALL {
            let targets = self.handles_of_type(ty);
            let sources = source.handles_of_type(ty);
            let ([target], [origin]) = (targets.as_slice(), sources.as_slice()) else {
                continue;
            };
            let source_id = source.table.record(*origin).id;
            if source_id.is_nil() || !self.table.record(*target).id.is_nil() {
                continue;
            }
            let id = self.evolved_id(source_id);
            self.table.set_id(*target, id);
            resolved += 1;
        }
        resolved
    }

    /// Resolves the outer wire of every resolved face from its source face.
    pub fn outer_wire_match(&mut self, source: &SeerShape<S>, geometry: &dyn Geometry<S>) -> usize {
        let mut resolved = 0;
        for face in self.handles_of_type(ShapeType::Face) {
            let record = self.table.record(face);
            if record.id.is_nil() {
                continue;
            }
            let face_id = record.id;
            let Some(wire) = geometry.outer_wire(&record.shape) else {
                continue;
            };
            let Some(wire_handle) = self.nil_handle_of(&wire) else {
                continue;
            };
            let Some(source_face) = self.source_counterpart(source, &face_id, ShapeType::Face) else {
                log::debug!("outer wire of face {face_id}: no source face");
                continue;
            };
            let source_wire_id = geometry
                .outer_wire(&source.table.record(source_face).shape)
                .and_then(|w| source.id_of(&w))
                .filter(|id| !id.is_nil());
            let Some(source_wire_id) = source_wire_id else {
                log::debug!("outer wire of face {face_id}: source face has no resolved outer wire");
                continue;
            };
            let id = self.evolved_id(source_wire_id);
            self.table.set_id(wire_handle, id);
            resolved += 1;
        }
        resolved
    }

    /// Follows the feature algorithm's "modified" oracle from every source
    /// entity into the target.
    ///
    /// An entity the oracle reports as unmodified keeps the source id; any
    /// other result takes the evolved id. A result that is already resolved
    /// keeps its id and gains the genealogy edge, so merges devolve to every
    /// contributing source id.
    pub fn modified_match(&mut self, source: &SeerShape<S>, oracle: &dyn ModifiedOracle<S>) -> usize {
        let mut resolved = 0;
        for (_, record) in source.table.iter() {
            if record.id.is_nil() {
                continue;
            }
            for result in oracle.modified(&record.shape) {
                let Some(handle) = self.table.handle_of_shape(&result) else {
                    continue;
                };
                let existing = self.table.record(handle).id;
                if !existing.is_nil() {
                    self.evolution.insert(record.id, existing);
                    continue;
                }
                let id = if result.is_same(&record.shape) {
                    self.evolution.insert(record.id, record.id);
                    record.id
                } else {
                    self.evolved_id(record.id)
                };
                self.table.set_id(handle, id);
                resolved += 1;
            }
        }
        resolved
    }

    /// Names new edges by their faces and new vertices by their edges.
    ///
    /// The id is looked up in, or added to, the derived table, so the same
    /// parent set yields the same id on every regeneration.
    pub fn derived_match(&mut self) -> usize {
        let mut resolved = 0;
        for (ty, parent_ty) in [(ShapeType::Edge, ShapeType::Face), (ShapeType::Vertex, ShapeType::Edge)] {
            for handle in self.nil_handles_of_type(ty) {
                let key: DerivedKey = self.related_ids(handle, parent_ty, Direction::Ancestors).into_iter().collect();
                if key.is_empty() || key.has_nil() {
                    log::debug!("derived {ty} {}: unresolved parents", handle);
                    continue;
                }
                let id = self.derived.get(&key).unwrap_or_else(|| self.mint_id());
                if self.table.has_id(&id) {
                    log::debug!("derived {ty} {}: id {id} already in use", handle);
                    continue;
                }
                self.derived.insert(key, id);
                self.table.set_id(handle, id);
                if !self.evolution.has_out(&id) {
                    self.evolution.insert(StableId::nil(), id);
                }
                resolved += 1;
            }
        }
        resolved
    }

    /// Resolves an edge from the one source edge its two faces share.
    pub fn face_edge_match(&mut self, source: &SeerShape<S>) -> usize {
        self.match_by_shared_child(source, ShapeType::Edge, ShapeType::Face, |count| count == 2)
    }

    /// Resolves a vertex from the one source vertex its edges share.
    pub fn edge_vertex_match(&mut self, source: &SeerShape<S>) -> usize {
        self.match_by_shared_child(source, ShapeType::Vertex, ShapeType::Edge, |count| count >= 1)
    }

    /// Gives every nil record a fresh id. Returns the number minted.
    pub fn ensure_no_nils(&mut self) -> usize {
        let nils = self.table.nil_handles();
        for &handle in &nils {
            self.assign_fresh(handle);
        }
        if !nils.is_empty() {
            log::debug!("minted {} ids for unmatched records", nils.len());
        }
        nils.len()
    }

    /// Re-mints every occurrence of a shared id but the first in canonical
    /// order. Returns the number minted.
    pub fn ensure_no_duplicates(&mut self) -> usize {
        let mut minted = 0;
        for (id, handles) in self.table.duplicates() {
            log::debug!("id {id} shared by {} records", handles.len());
            for &handle in &handles[1..] {
                self.assign_fresh(handle);
                minted += 1;
            }
        }
        minted
    }

    // ---- helpers ----

    /// Shared body of face-edge and edge-vertex matching.
    ///
    /// A nil `ty` record whose `parent_ty` parents are all resolved, and whose
    /// parent count passes `accept`, maps each parent to its source
    /// counterpart and intersects their `ty` children. A single survivor
    /// yields the evolved id.
    fn match_by_shared_child(
        &mut self,
        source: &SeerShape<S>,
        ty: ShapeType,
        parent_ty: ShapeType,
        accept: fn(usize) -> bool,
    ) -> usize {
        let mut resolved = 0;
        for handle in self.nil_handles_of_type(ty) {
            let parents = self.related_ids(handle, parent_ty, Direction::Ancestors);
            if !accept(parents.len()) || parents.iter().any(StableId::is_nil) {
                continue;
            }
            let mut shared: Option<BTreeSet<StableId>> = None;
            for parent in &parents {
                let Some(origin) = self.source_counterpart(source, parent, parent_ty) else {
                    shared = None;
                    break;
                };
                let children: BTreeSet<StableId> = source
                    .related_ids(origin, ty, Direction::Descendants)
                    .into_iter()
                    .filter(|id| !id.is_nil())
                    .collect();
                shared = Some(match shared {
                    None => children,
                    Some(acc) => acc.intersection(&children).copied().collect(),
                });
            }
            let mut candidates = shared.unwrap_or_default().into_iter();
            let (Some(source_id), None) = (candidates.next(), candidates.next()) else {
                log::debug!("{ty} {handle}: no unique shared source {ty}");
                continue;
            };
            let id = self.evolved_id(source_id);
            self.table.set_id(handle, id);
            resolved += 1;
        }
        resolved
    }

    /// The evolved id of `source_id`, minting and recording one if needed.
    fn evolved_id(&mut self, source_id: StableId) -> StableId {
        if let Some(out) = self
            .evolution
            .evolve(&source_id)
            .into_iter()
            .find(|out| !self.table.has_id(out))
        {
            return out;
        }
        let fresh = self.mint_id();
        self.evolution.insert(source_id, fresh);
        fresh
    }

    /// The source record of type `ty` that target id `id` descends from.
    ///
    /// A source record carrying `id` itself wins; otherwise the ledger's
    /// in-ids for `id` are tried in insertion order.
    fn source_counterpart(&self, source: &SeerShape<S>, id: &StableId, ty: ShapeType) -> Option<RecordHandle> {
        let of_type = |h: &RecordHandle| source.table.record(*h).shape.shape_type() == ty;
        if let Some(direct) = source.table.handle_of_id(id).filter(of_type) {
            return Some(direct);
        }
        self.evolution
            .devolve(id)
            .into_iter()
            .filter(|in_id| !in_id.is_nil())
            .filter_map(|in_id| source.table.handle_of_id(&in_id))
            .find(of_type)
    }

    fn nil_handle_of(&self, shape: &S) -> Option<RecordHandle> {
        self.table
            .handle_of_shape(shape)
            .filter(|&h| self.table.record(h).id.is_nil())
    }

    fn nil_handles_of_type(&self, ty: ShapeType) -> Vec<RecordHandle> {
        self.handles_of_type(ty)
            .into_iter()
            .filter(|&h| self.table.record(h).id.is_nil())
            .collect()
    }

    fn assign_fresh(&mut self, handle: RecordHandle) -> StableId {
        let fresh = self.mint_id();
        self.table.set_id(handle, fresh);
        self.evolution.insert(StableId::nil(), fresh);
        fresh
    }
}
