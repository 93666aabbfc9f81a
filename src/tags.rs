//! Side tables: feature tags and derived identities.
//!
//! - [`FeatureTagTable`] names entities an algorithm refers to by role rather
//!   than by graph position ("top face", "sweep spine").
//! - [`DerivedTable`] gives identity to entities with no counterpart in the
//!   previous version, keyed by the ids of the entities they touch.
//!
//! Both tables grow for the lifetime of their SeerShape and are never pruned.

use crate::id::StableId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Bidirectional id ↔ tag table. Both columns are unique.
#[derive(Debug, Clone, Default)]
pub struct FeatureTagTable {
    by_id: HashMap<StableId, String>,
    by_tag: HashMap<String, StableId>,
    /// Ids in first-insertion order, for dumps and persistence.
    order: Vec<StableId>,
}

impl FeatureTagTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Binds `tag` to `id`, unbinding any previous partner of either.
    pub fn insert(&mut self, id: StableId, tag: impl Into<String>) {
        let tag = tag.into();
        if let Some(old_tag) = self.by_id.remove(&id) {
            self.by_tag.remove(&old_tag);
        }
        if let Some(old_id) = self.by_tag.remove(&tag) {
            self.by_id.remove(&old_id);
            self.order.retain(|i| *i != old_id);
        }
        if !self.order.contains(&id) {
            self.order.push(id);
        }
        self.by_id.insert(id, tag.clone());
        self.by_tag.insert(tag, id);
    }

    pub fn has_id(&self, id: &StableId) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.by_tag.contains_key(tag)
    }

    pub fn id_of(&self, tag: &str) -> Option<StableId> {
        self.by_tag.get(tag).copied()
    }

    pub fn tag_of(&self, id: &StableId) -> Option<&str> {
        self.by_id.get(id).map(String::as_str)
    }

    /// `(id, tag)` pairs in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (StableId, &str)> {
        self.order
            .iter()
            .filter_map(|id| self.by_id.get(id).map(|tag| (*id, tag.as_str())))
    }
}

impl fmt::Display for FeatureTagTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "feature tag container: {} records", self.len())?;
        for (id, tag) in self.iter() {
            writeln!(f, "  {}  {}", id, tag)?;
        }
        Ok(())
    }
}

/// Ordered set of parent ids identifying a derived entity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DerivedKey(BTreeSet<StableId>);

impl DerivedKey {
    pub fn new(ids: impl IntoIterator<Item = StableId>) -> Self {
        Self(ids.into_iter().collect())
    }

    pub fn ids(&self) -> impl Iterator<Item = &StableId> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if any member is nil.
    pub fn has_nil(&self) -> bool {
        self.0.iter().any(StableId::is_nil)
    }
}

impl FromIterator<StableId> for DerivedKey {
    fn from_iter<T: IntoIterator<Item = StableId>>(iter: T) -> Self {
        Self::new(iter)
    }
}

/// Map from parent-id sets to derived ids.
///
/// Never compacted: dropping an entry would hand a re-derived entity a new id.
#[derive(Debug, Clone, Default)]
pub struct DerivedTable {
    entries: BTreeMap<DerivedKey, StableId>,
}

impl DerivedTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &DerivedKey) -> Option<StableId> {
        self.entries.get(key).copied()
    }

    /// Records `key → id`. An existing mapping is kept and returned.
    pub fn insert(&mut self, key: DerivedKey, id: StableId) -> StableId {
        *self.entries.entry(key).or_insert(id)
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&DerivedKey, &StableId)> {
        self.entries.iter()
    }
}

impl fmt::Display for DerivedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "derived container: {} records", self.len())?;
        for (key, id) in self.iter() {
            let parents: Vec<String> = key.ids().map(ToString::to_string).collect();
            writeln!(f, "  [{}]  ->  {}", parents.join(", "), id)?;
        }
        Ok(())
    }
}
