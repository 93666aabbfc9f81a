//! Append-only genealogy ledger.
//!
//! An [`EvolveRecord`] `(in, out)` states that entity `in` of an earlier
//! version (or of an upstream feature) became entity `out`. The ledger is
//! many-to-many: one `in` with several outs is a split, one `out` with several
//! ins a merge. A nil `in` marks an entity that has no ancestor.
//!
//! The ledger belongs to one SeerShape and outlives its regenerations: records
//! are never dropped, so genealogy can be queried from arbitrarily old
//! versions.
//!
//! # Invariants
//! - No `(in, out)` pair is stored twice.
//! - `replace_id` rewrites the in-column only. When a rewrite produces a pair
//!   that already exists, the rewritten record is absorbed by the existing one.

use crate::history::ShapeHistory;
use crate::id::StableId;
use crate::kernel::Shape;
use crate::table::IdentityTable;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Directed genealogy edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvolveRecord {
    pub in_id: StableId,
    pub out_id: StableId,
}

impl EvolveRecord {
    pub fn new(in_id: StableId, out_id: StableId) -> Self {
        Self { in_id, out_id }
    }
}

/// Ledger of [`EvolveRecord`]s indexed in both directions.
#[derive(Debug, Clone, Default)]
pub struct EvolutionLedger {
    /// Insertion-ordered records; `None` marks a record absorbed by `replace_id`.
    records: Vec<Option<EvolveRecord>>,
    by_in: HashMap<StableId, Vec<usize>>,
    by_out: HashMap<StableId, Vec<usize>>,
    pairs: HashSet<(StableId, StableId)>,
}

impl EvolutionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Records `in_id → out_id`. Returns `false` if the pair already existed.
    pub fn insert(&mut self, in_id: StableId, out_id: StableId) -> bool {
        if !self.pairs.insert((in_id, out_id)) {
            return false;
        }
        let pos = self.records.len();
        self.records.push(Some(EvolveRecord::new(in_id, out_id)));
        self.by_in.entry(in_id).or_default().push(pos);
        self.by_out.entry(out_id).or_default().push(pos);
        true
    }

    /// Every out-id recorded for `in_id`, in insertion order.
    pub fn evolve(&self, in_id: &StableId) -> Vec<StableId> {
        self.by_in
            .get(in_id)
            .map(|positions| positions.iter().filter_map(|&p| self.records[p]).map(|r| r.out_id).collect())
            .unwrap_or_default()
    }

    /// Every in-id recorded for `out_id`, in insertion order.
    pub fn devolve(&self, out_id: &StableId) -> Vec<StableId> {
        self.by_out
            .get(out_id)
            .map(|positions| positions.iter().filter_map(|&p| self.records[p]).map(|r| r.in_id).collect())
            .unwrap_or_default()
    }

    pub fn has_in(&self, in_id: &StableId) -> bool {
        self.by_in.contains_key(in_id)
    }

    pub fn has_out(&self, out_id: &StableId) -> bool {
        self.by_out.contains_key(out_id)
    }

    pub fn has(&self, in_id: &StableId, out_id: &StableId) -> bool {
        self.pairs.contains(&(*in_id, *out_id))
    }

    /// Rewrites every record `stale → x` to `fresh → x`.
    ///
    /// Out-ids are left untouched, as is any tag table. Returns the number of
    /// records rewritten.
    pub fn replace_id(&mut self, stale: &StableId, fresh: &StableId) -> usize {
        if stale == fresh {
            return 0;
        }
        let mut rewritten = 0;
        // One record per round: the index of `stale` is mutated underneath.
        while let Some(pos) = self.by_in.get(stale).and_then(|positions| positions.first().copied()) {
            remove_position(&mut self.by_in, stale, pos);
            let Some(record) = self.records[pos] else {
                continue;
            };
            let out_id = record.out_id;
            self.pairs.remove(&(*stale, out_id));
            if self.pairs.insert((*fresh, out_id)) {
                self.records[pos] = Some(EvolveRecord::new(*fresh, out_id));
                self.by_in.entry(*fresh).or_default().push(pos);
            } else {
                self.records[pos] = None;
                remove_position(&mut self.by_out, &out_id, pos);
            }
            rewritten += 1;
        }
        rewritten
    }

    /// Live records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &EvolveRecord> {
        self.records.iter().flatten()
    }

    /// Publishes the genealogy relevant to the current snapshot into a
    /// cross-feature history.
    ///
    /// Only records whose out-id is in `table` are considered. A nil in-id
    /// starts a new lineage owned by `feature`; an in-id the history already
    /// knows is linked to the out-id. Everything else is stale and ignored.
    /// Returns the number of records published.
    pub fn fill_in_history<S, H>(&self, table: &IdentityTable<S>, history: &mut H, feature: StableId) -> usize
    where
        S: Shape,
        H: ShapeHistory + ?Sized,
    {
        let mut published = 0;
        for record in self.iter() {
            if !table.has_id(&record.out_id) {
                continue;
            }
            let added = if record.in_id.is_nil() {
                history.add_shape(feature, record.out_id)
            } else {
                history.contains(&record.in_id) && history.add_connection(record.in_id, record.out_id, feature)
            };
            if added {
                published += 1;
            }
        }
        published
    }
}

fn remove_position(index: &mut HashMap<StableId, Vec<usize>>, key: &StableId, pos: usize) {
    if let Some(positions) = index.get_mut(key) {
        positions.retain(|&p| p != pos);
        if positions.is_empty() {
            index.remove(key);
        }
    }
}

impl fmt::Display for EvolutionLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "evolve container: {} records", self.len())?;
        for record in self.iter() {
            writeln!(f, "  {}  ->  {}", record.in_id, record.out_id)?;
        }
        Ok(())
    }
}
