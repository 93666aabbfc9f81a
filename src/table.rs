//! Identity table: (stable id, shape, graph vertex) triples.
//!
//! Records live in one arena and are addressed by [`RecordHandle`]; three hash
//! indexes map each key (id, shape key, vertex) back into that handle space.
//! Every mutation goes through the handle: the record is copied, modified,
//! un-indexed under its old keys and re-indexed under the new ones.
//!
//! # Invariants
//! - Shape keys and vertices are unique across records.
//! - Nil ids are never indexed. Non-nil ids are indexed as a handle list so a
//!   matching pass may temporarily assign one id twice; the cleanup pass
//!   restores uniqueness. `find_by_id` returns the earliest record.
//! - A record's handle equals its offset in the canonical enumeration it was
//!   installed from.
//!
//! # Contract
//! `find_*` panics when the record is absent: callers establish existence with
//! `has_*` first. `has_*` never fails.

use crate::arena::{arena_index, Arena, ArenaIndex};
use crate::graph::VertexId;
use crate::id::StableId;
use crate::kernel::Shape;
use std::collections::HashMap;
use std::fmt;

arena_index!(
    /// Handle of a [`ShapeRecord`]; also its canonical offset.
    RecordHandle
);

/// One enumerated sub-entity of the current shape.
#[derive(Debug, Clone)]
pub struct ShapeRecord<S> {
    pub id: StableId,
    pub shape: S,
    pub vertex: VertexId,
}

impl<S> ShapeRecord<S> {
    pub fn new(id: StableId, shape: S, vertex: VertexId) -> Self {
        Self { id, shape, vertex }
    }
}

/// Multi-keyed record store.
#[derive(Clone)]
pub struct IdentityTable<S: Shape> {
    records: Arena<RecordHandle, ShapeRecord<S>>,
    by_id: HashMap<StableId, Vec<RecordHandle>>,
    by_shape: HashMap<S::Key, RecordHandle>,
    by_vertex: HashMap<VertexId, RecordHandle>,
}

impl<S: Shape> IdentityTable<S> {
    pub fn new() -> Self {
        Self {
            records: Arena::new(),
            by_id: HashMap::new(),
            by_shape: HashMap::new(),
            by_vertex: HashMap::new(),
        }
    }

    /// Drops every record.
    pub fn clear(&mut self) {
        self.records.clear();
        self.by_id.clear();
        self.by_shape.clear();
        self.by_vertex.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Inserts a record and returns its handle.
    ///
    /// # Panics
    /// Panics if the shape or the vertex is already indexed.
    pub fn insert(&mut self, record: ShapeRecord<S>) -> RecordHandle {
        let key = record.shape.key();
        assert!(
            !self.by_shape.contains_key(&key),
            "shape {:?} already has a record",
            record.shape
        );
        assert!(
            !self.by_vertex.contains_key(&record.vertex),
            "vertex {} already has a record",
            record.vertex
        );
        let id = record.id;
        let vertex = record.vertex;
        let handle = self.records.allocate(record);
        self.by_shape.insert(key, handle);
        self.by_vertex.insert(vertex, handle);
        self.index_id(id, handle);
        handle
    }

    fn index_id(&mut self, id: StableId, handle: RecordHandle) {
        if id.is_nil() {
            return;
        }
        let handles = self.by_id.entry(id).or_default();
        if let Err(pos) = handles.binary_search(&handle) {
            handles.insert(pos, handle);
        }
    }

    fn unindex_id(&mut self, id: StableId, handle: RecordHandle) {
        if id.is_nil() {
            return;
        }
        if let Some(handles) = self.by_id.get_mut(&id) {
            handles.retain(|h| *h != handle);
            if handles.is_empty() {
                self.by_id.remove(&id);
            }
        }
    }

    // ---- lookups ----

    pub fn has_id(&self, id: &StableId) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn has_shape(&self, shape: &S) -> bool {
        self.by_shape.contains_key(&shape.key())
    }

    pub fn has_vertex(&self, vertex: VertexId) -> bool {
        self.by_vertex.contains_key(&vertex)
    }

    /// Earliest record carrying `id`.
    pub fn handle_of_id(&self, id: &StableId) -> Option<RecordHandle> {
        self.by_id.get(id).and_then(|handles| handles.first().copied())
    }

    pub fn handle_of_shape(&self, shape: &S) -> Option<RecordHandle> {
        self.by_shape.get(&shape.key()).copied()
    }

    pub fn handle_of_vertex(&self, vertex: VertexId) -> Option<RecordHandle> {
        self.by_vertex.get(&vertex).copied()
    }

    /// Returns the record behind `handle`, if any.
    pub fn get(&self, handle: RecordHandle) -> Option<&ShapeRecord<S>> {
        self.records.get(handle)
    }

    /// # Panics
    /// Panics if `handle` is stale.
    pub fn record(&self, handle: RecordHandle) -> &ShapeRecord<S> {
        &self.records[handle]
    }

    /// # Panics
    /// Panics if no record carries `id`.
    pub fn find_by_id(&self, id: &StableId) -> &ShapeRecord<S> {
        let handle = self
            .handle_of_id(id)
            .unwrap_or_else(|| panic!("no record for id {id}"));
        &self.records[handle]
    }

    /// # Panics
    /// Panics if `shape` has no record.
    pub fn find_by_shape(&self, shape: &S) -> &ShapeRecord<S> {
        let handle = self
            .handle_of_shape(shape)
            .unwrap_or_else(|| panic!("no record for shape {shape:?}"));
        &self.records[handle]
    }

    /// # Panics
    /// Panics if `vertex` has no record.
    pub fn find_by_vertex(&self, vertex: VertexId) -> &ShapeRecord<S> {
        let handle = self
            .handle_of_vertex(vertex)
            .unwrap_or_else(|| panic!("no record for vertex {vertex}"));
        &self.records[handle]
    }

    // ---- copy-modify-replace updates ----

    fn replace(&mut self, handle: RecordHandle, next: ShapeRecord<S>) {
        let prev = self.records[handle].clone();
        self.unindex_id(prev.id, handle);
        self.by_shape.remove(&prev.shape.key());
        self.by_vertex.remove(&prev.vertex);

        let key = next.shape.key();
        assert!(
            !self.by_shape.contains_key(&key),
            "shape {:?} already has a record",
            next.shape
        );
        assert!(
            !self.by_vertex.contains_key(&next.vertex),
            "vertex {} already has a record",
            next.vertex
        );
        self.by_shape.insert(key, handle);
        self.by_vertex.insert(next.vertex, handle);
        self.index_id(next.id, handle);
        self.records[handle] = next;
    }

    /// Replaces the id of the record behind `handle`.
    pub fn set_id(&mut self, handle: RecordHandle, id: StableId) {
        let mut next = self.records[handle].clone();
        next.id = id;
        self.replace(handle, next);
    }

    /// Replaces the shape of the record behind `handle`.
    pub fn set_shape(&mut self, handle: RecordHandle, shape: S) {
        let mut next = self.records[handle].clone();
        next.shape = shape;
        self.replace(handle, next);
    }

    /// Replaces the vertex of the record behind `handle`.
    pub fn set_vertex(&mut self, handle: RecordHandle, vertex: VertexId) {
        let mut next = self.records[handle].clone();
        next.vertex = vertex;
        self.replace(handle, next);
    }

    /// Assigns `id` to the record of `shape`.
    ///
    /// # Panics
    /// Panics if `shape` has no record.
    pub fn update_id(&mut self, shape: &S, id: StableId) {
        let handle = self.find_handle_of_shape(shape);
        self.set_id(handle, id);
    }

    /// Swaps in a new shape value for the record carrying `id`.
    ///
    /// # Panics
    /// Panics if no record carries `id`.
    pub fn update_shape(&mut self, id: &StableId, shape: S) {
        let handle = self
            .handle_of_id(id)
            .unwrap_or_else(|| panic!("no record for id {id}"));
        self.set_shape(handle, shape);
    }

    fn find_handle_of_shape(&self, shape: &S) -> RecordHandle {
        self.handle_of_shape(shape)
            .unwrap_or_else(|| panic!("no record for shape {shape:?}"))
    }

    // ---- enumeration ----

    /// Iterates over all records in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (RecordHandle, &ShapeRecord<S>)> {
        self.records.iter()
    }

    /// All non-nil ids, in canonical order (repeated if shared).
    pub fn ids(&self) -> Vec<StableId> {
        self.records
            .iter()
            .map(|(_, r)| r.id)
            .filter(|id| !id.is_nil())
            .collect()
    }

    /// All shapes, in canonical order.
    pub fn shapes(&self) -> Vec<S> {
        self.records.iter().map(|(_, r)| r.shape.clone()).collect()
    }

    /// Handles of every record whose id is still nil.
    pub fn nil_handles(&self) -> Vec<RecordHandle> {
        self.records
            .iter()
            .filter(|(_, r)| r.id.is_nil())
            .map(|(h, _)| h)
            .collect()
    }

    /// Ids carried by more than one record, with the sharing handles.
    ///
    /// Ordered by the first occurrence of each id.
    pub fn duplicates(&self) -> Vec<(StableId, Vec<RecordHandle>)> {
        let mut out: Vec<(StableId, Vec<RecordHandle>)> = self
            .by_id
            .iter()
            .filter(|(_, handles)| handles.len() > 1)
            .map(|(id, handles)| (*id, handles.clone()))
            .collect();
        out.sort_by_key(|(_, handles)| handles[0]);
        out
    }
}

impl<S: Shape> Default for IdentityTable<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Shape> fmt::Debug for IdentityTable<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityTable")
            .field("records", &self.records)
            .finish()
    }
}

impl<S: Shape> fmt::Display for IdentityTable<S> {
    /// One line per record: offset, id, type, vertex.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "shape id container: {} records", self.len())?;
        for (handle, record) in self.records.iter() {
            writeln!(
                f,
                "  {:>5}  {}  {:<9} {}",
                handle.as_raw(),
                record.id,
                record.shape.shape_type(),
                record.vertex
            )?;
        }
        Ok(())
    }
}
