//! Stable identifiers and id minting.
//!
//! A [`StableId`] is the persistent name SeerShape gives a sub-entity. It is a
//! UUID; the nil UUID means "not yet resolved". Fresh ids come from an injected
//! [`IdSource`] instead of ambient global state, so tests can mint
//! deterministic sequences while applications use random v4 UUIDs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Persistent identifier of a sub-entity.
///
/// # Invariant
/// - Ordering and hashing follow the underlying UUID bytes, so ordered id sets
///   (derived keys) are stable across runs.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StableId(Uuid);

impl StableId {
    /// The unresolved id.
    pub const NIL: StableId = StableId(Uuid::nil());

    #[inline]
    pub const fn nil() -> Self {
        Self::NIL
    }

    #[inline]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    #[inline]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    #[inline]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Parses a hyphenated (or any uuid-crate accepted) representation.
    pub fn parse(text: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(text).map(Self)
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl FromStr for StableId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Uuid> for StableId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Source of fresh, never-nil identifiers.
///
/// Shared between threads: a single source may back every SeerShape of a
/// document.
pub trait IdSource: fmt::Debug + Send + Sync {
    /// Returns an id that has not been handed out before.
    fn next_id(&self) -> StableId;
}

/// Random version-4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_id(&self) -> StableId {
        StableId(Uuid::new_v4())
    }
}

/// Deterministic ids `prefix:counter`, for reproducible tests and benchmarks.
///
/// The counter starts at 1 so the first id is never nil.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: u64,
    counter: AtomicU64,
}

impl SequentialIds {
    /// Creates a source whose ids carry `prefix` in their upper 64 bits.
    pub fn new(prefix: u64) -> Self {
        Self {
            prefix,
            counter: AtomicU64::new(1),
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new(0)
    }
}

impl IdSource for SequentialIds {
    fn next_id(&self) -> StableId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        StableId(Uuid::from_u64_pair(self.prefix, n))
    }
}
