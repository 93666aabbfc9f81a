//! Snapshot persistence.
//!
//! Shapes are never persisted; the host re-creates them with the kernel and
//! installs them before loading. The shape-id table is therefore stored as
//! `(id, offset)` pairs, where the offset indexes the canonical enumeration of
//! the installed shape. The ledger, feature tags and derived table are stored
//! whole.
//!
//! Ids are written as hyphenated UUID strings in both the CBOR and the JSON
//! encoding, so a file can be inspected and a damaged entry skipped on load
//! without rejecting the rest.

use crate::arena::ArenaIndex;
use crate::error::{Result, SeerError};
use crate::evolution::EvolutionLedger;
use crate::fingerprint::HashValue;
use crate::id::StableId;
use crate::kernel::Shape;
use crate::seer::SeerShape;
use crate::table::RecordHandle;
use crate::tags::{DerivedKey, DerivedTable, FeatureTagTable};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeIdEntry {
    pub id: String,
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvolveEntry {
    pub in_id: String,
    pub out_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureTagEntry {
    pub id: String,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedEntry {
    pub ids: Vec<String>,
    pub id: String,
}

/// Serializable state of one SeerShape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub root_id: String,
    pub shape_ids: Vec<ShapeIdEntry>,
    pub evolve: Vec<EvolveEntry>,
    pub feature_tags: Vec<FeatureTagEntry>,
    pub derived: Vec<DerivedEntry>,
}

impl Snapshot {
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        Ok(serde_cbor::to_vec(self)?)
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        Ok(serde_cbor::from_slice(bytes)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Writes the CBOR encoding to `path`.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_cbor()?)?;
        Ok(())
    }

    /// Reads a CBOR encoding from `path`.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_cbor(&bytes)
    }

    /// Domain-separated hash of the CBOR encoding.
    pub fn fingerprint(&self) -> Result<HashValue> {
        Ok(HashValue::hash_with_domain(b"SNAPSHOT", &self.to_cbor()?))
    }
}

/// What a load applied and what it had to drop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub shape_ids: usize,
    pub evolve: usize,
    pub feature_tags: usize,
    pub derived: usize,
    /// Entries dropped for a bad id or offset.
    pub skipped: usize,
    /// The root record was filled from the snapshot's root id.
    pub root_restored: bool,
}

impl<S: Shape> SeerShape<S> {
    /// Captures the persistent state.
    pub fn serial_out(&self) -> Snapshot {
        Snapshot {
            root_id: self.root_shape_id().to_string(),
            shape_ids: self
                .table
                .iter()
                .map(|(handle, record)| ShapeIdEntry {
                    id: record.id.to_string(),
                    offset: u64::from(handle.as_raw()),
                })
                .collect(),
            evolve: self
                .evolution
                .iter()
                .map(|r| EvolveEntry {
                    in_id: r.in_id.to_string(),
                    out_id: r.out_id.to_string(),
                })
                .collect(),
            feature_tags: self
                .tags
                .iter()
                .map(|(id, tag)| FeatureTagEntry {
                    id: id.to_string(),
                    tag: tag.to_owned(),
                })
                .collect(),
            derived: self
                .derived
                .iter()
                .map(|(key, id)| DerivedEntry {
                    ids: key.ids().map(ToString::to_string).collect(),
                    id: id.to_string(),
                })
                .collect(),
        }
    }

    /// Restores state captured by [`serial_out`](Self::serial_out).
    ///
    /// The shape must already be installed, enumerating in the same order as
    /// when the snapshot was taken. Ledger, tags and derived table are
    /// replaced. Entries with an unparseable id or an out-of-range offset are
    /// logged and skipped. A root record left nil that way takes the
    /// snapshot's root id.
    pub fn serial_in(&mut self, snapshot: &Snapshot) -> Result<LoadReport> {
        if self.is_null() && !snapshot.shape_ids.is_empty() {
            return Err(SeerError::NoShape(snapshot.shape_ids.len()));
        }
        let mut report = LoadReport::default();

        for entry in &snapshot.shape_ids {
            let Some(id) = parse_or_warn(&entry.id) else {
                report.skipped += 1;
                continue;
            };
            let handle = u32::try_from(entry.offset)
                .ok()
                .filter(|&raw| (raw as usize) < self.table.len())
                .map(RecordHandle::from_raw);
            let Some(handle) = handle else {
                log::warn!("skipping shape id {id}: offset {} out of range", entry.offset);
                report.skipped += 1;
                continue;
            };
            self.table.set_id(handle, id);
            report.shape_ids += 1;
        }
        report.root_restored = self.restore_root_id(&snapshot.root_id);

        let mut evolution = EvolutionLedger::new();
        for entry in &snapshot.evolve {
            match (parse_or_warn(&entry.in_id), parse_or_warn(&entry.out_id)) {
                (Some(in_id), Some(out_id)) => {
                    evolution.insert(in_id, out_id);
                    report.evolve += 1;
                }
                _ => report.skipped += 1,
            }
        }
        self.evolution = evolution;

        let mut tags = FeatureTagTable::new();
        for entry in &snapshot.feature_tags {
            match parse_or_warn(&entry.id) {
                Some(id) => {
                    tags.insert(id, entry.tag.clone());
                    report.feature_tags += 1;
                }
                None => report.skipped += 1,
            }
        }
        self.tags = tags;

        let mut derived = DerivedTable::new();
        for entry in &snapshot.derived {
            let parents: Option<Vec<StableId>> = entry.ids.iter().map(|text| parse_or_warn(text)).collect();
            match (parents, parse_or_warn(&entry.id)) {
                (Some(parents), Some(id)) => {
                    derived.insert(DerivedKey::new(parents), id);
                    report.derived += 1;
                }
                _ => report.skipped += 1,
            }
        }
        self.derived = derived;

        if report.skipped > 0 {
            log::warn!("snapshot load skipped {} entries", report.skipped);
        }
        Ok(report)
    }

    /// Checks the root record against `root_id`, filling it when nil.
    ///
    /// A disagreement is logged and the table entry kept.
    fn restore_root_id(&mut self, root_id: &str) -> bool {
        let Some(handle) = self.root_shape().and_then(|root| self.table.handle_of_shape(root)) else {
            return false;
        };
        let Some(saved) = parse_or_warn(root_id).filter(|id| !id.is_nil()) else {
            return false;
        };
        let current = self.table.record(handle).id;
        if current == saved {
            return false;
        }
        if !current.is_nil() {
            log::warn!("root id {current} disagrees with saved root id {saved}");
            return false;
        }
        if self.table.has_id(&saved) {
            log::warn!("saved root id {saved} already names another record");
            return false;
        }
        self.table.set_id(handle, saved);
        true
    }

    /// Saves the persistent state to `path` as CBOR.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        self.serial_out().save_to_file(path)
    }

    /// Loads state saved by [`save_to_file`](Self::save_to_file).
    pub fn load_from_file(&mut self, path: &Path) -> Result<LoadReport> {
        let snapshot = Snapshot::load_from_file(path)?;
        self.serial_in(&snapshot)
    }

    /// Fingerprint of the current persistent state.
    pub fn fingerprint(&self) -> Result<HashValue> {
        self.serial_out().fingerprint()
    }
}

fn parse_or_warn(text: &str) -> Option<StableId> {
    match StableId::parse(text) {
        Ok(id) => Some(id),
        Err(err) => {
            log::warn!("skipping unparseable id {text:?}: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::SequentialIds;
    use crate::reference::{box_topology, ReferenceShape};
    use std::sync::Arc;

    fn saved() -> (SeerShape<ReferenceShape>, ReferenceShape) {
        let topo = box_topology(1.0, 2.0, 3.0);
        let mut seer = SeerShape::with_id_source(Arc::new(SequentialIds::new(11)));
        seer.set_shape(topo.solid.clone());
        seer.ensure_no_nils();
        let face = seer.find_id(&topo.faces[1]);
        seer.insert_feature_tag(face, "top");
        let upstream = seer.mint_id();
        seer.insert_evolve(upstream, face);
        let edge = seer.find_id(&topo.edges[0]);
        seer.derived.insert(DerivedKey::new([face, upstream]), edge);
        (seer, topo.solid)
    }

    fn reloaded(solid: &ReferenceShape) -> SeerShape<ReferenceShape> {
        let mut seer = SeerShape::with_id_source(Arc::new(SequentialIds::new(12)));
        seer.set_shape(solid.clone());
        seer
    }

    fn assert_same_state(a: &SeerShape<ReferenceShape>, b: &SeerShape<ReferenceShape>) {
        let ids_a: Vec<_> = a.table().iter().map(|(_, r)| r.id).collect();
        let ids_b: Vec<_> = b.table().iter().map(|(_, r)| r.id).collect();
        assert_eq!(ids_a, ids_b);
        assert_eq!(a.root_shape_id(), b.root_shape_id());
        assert_eq!(a.serial_out(), b.serial_out());
    }

    #[test]
    fn file_roundtrip_restores_every_table() {
        let (seer, solid) = saved();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feature.seer");
        seer.save_to_file(&path).unwrap();

        let mut back = reloaded(&solid);
        let report = back.load_from_file(&path).unwrap();
        assert_eq!(report.shape_ids, 34);
        assert_eq!(report.feature_tags, 1);
        assert_eq!(report.derived, 1);
        assert_eq!(report.skipped, 0);
        assert_same_state(&seer, &back);
        assert_eq!(back.feature_tag_id("top"), seer.feature_tag_id("top"));
        assert_eq!(seer.fingerprint().unwrap(), back.fingerprint().unwrap());
    }

    #[test]
    fn json_roundtrip() {
        let (seer, solid) = saved();
        let text = seer.serial_out().to_json().unwrap();
        assert!(text.contains("\"top\""));
        let snapshot = Snapshot::from_json(&text).unwrap();
        let mut back = reloaded(&solid);
        back.serial_in(&snapshot).unwrap();
        assert_same_state(&seer, &back);
    }

    #[test]
    fn bad_entries_are_skipped() {
        let (seer, solid) = saved();
        let mut snapshot = seer.serial_out();
        snapshot.shape_ids[0].offset = 10_000;
        snapshot.shape_ids[1].id = "not-a-uuid".into();
        snapshot.evolve[0].out_id = String::new();

        let mut back = reloaded(&solid);
        let report = back.serial_in(&snapshot).unwrap();
        assert_eq!(report.skipped, 3);
        assert_eq!(report.shape_ids, 32);
        // The lost root entry is recovered from the root id.
        assert!(report.root_restored);
        assert_eq!(back.root_shape_id(), seer.root_shape_id());
        assert_eq!(back.all_nil_shapes().len(), 1);
    }

    #[test]
    fn root_id_fills_only_a_nil_root() {
        let (seer, solid) = saved();
        let mut snapshot = seer.serial_out();
        assert_eq!(snapshot.shape_ids[0].offset, 0);
        snapshot.shape_ids.remove(0);

        let mut back = reloaded(&solid);
        let report = back.serial_in(&snapshot).unwrap();
        assert!(report.root_restored);
        assert_eq!(report.skipped, 0);
        assert_eq!(back.root_shape_id(), seer.root_shape_id());
        assert_same_state(&seer, &back);

        // A root entry that disagrees with the root id wins over it.
        let mut snapshot = seer.serial_out();
        let other = seer.find_id(&seer.all_shapes()[1]);
        snapshot.root_id = other.to_string();
        let mut back = reloaded(&solid);
        let report = back.serial_in(&snapshot).unwrap();
        assert!(!report.root_restored);
        assert_eq!(back.root_shape_id(), seer.root_shape_id());
    }

    #[test]
    fn loading_into_empty_seer_fails() {
        let (seer, _) = saved();
        let mut empty: SeerShape<ReferenceShape> = SeerShape::new();
        let err = empty.serial_in(&seer.serial_out()).unwrap_err();
        assert!(matches!(err, SeerError::NoShape(34)));
    }

    #[test]
    fn fingerprint_tracks_content() {
        let (mut seer, _) = saved();
        let before = seer.fingerprint().unwrap();
        assert_eq!(before, seer.serial_out().fingerprint().unwrap());
        let id = seer.mint_id();
        seer.insert_feature_tag(id, "spine");
        assert_ne!(before, seer.fingerprint().unwrap());
    }
}
