//! Dense-handle arena storage.
//!
//! Provides `Arena<I, T>`: contiguous, append-only storage addressed by a
//! small `Copy` handle type `I`. Both the identity table (record handles) and
//! the containment graph (vertex handles) are built on it.
//!
//! # Determinism
//! - Handles are allocated in strictly increasing order starting at zero.
//! - Iteration order is by handle (allocation order).
//! - There is no free list: entries live until the whole arena is cleared,
//!   which is the only way records leave a SeerShape.

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// A dense handle into an [`Arena`].
///
/// Implemented by the index newtypes of this crate. The handle is nothing more
/// than a `u32` offset; ordering and hashing follow that offset.
pub trait ArenaIndex: Copy + Eq + Ord + Hash + fmt::Debug {
    /// Builds a handle from a raw offset.
    fn from_raw(raw: u32) -> Self;

    /// Returns the raw offset.
    fn as_raw(&self) -> u32;

    /// Returns the raw offset as a `usize`.
    #[inline]
    fn index(&self) -> usize {
        self.as_raw() as usize
    }
}

/// Declares a `#[repr(transparent)]` arena handle newtype.
macro_rules! arena_index {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u32);

        impl $crate::arena::ArenaIndex for $name {
            #[inline]
            fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            #[inline]
            fn as_raw(&self) -> u32 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

pub(crate) use arena_index;

/// Contiguous append-only storage.
#[derive(Clone, PartialEq, Eq)]
pub struct Arena<I, T> {
    slots: Vec<T>,
    _index: PhantomData<fn() -> I>,
}

impl<I: ArenaIndex, T> Arena<I, T> {
    /// Creates a new empty arena.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            _index: PhantomData,
        }
    }

    /// Creates an empty arena with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            _index: PhantomData,
        }
    }

    /// Appends `data` and returns its handle.
    ///
    /// # Panics
    /// Panics if the arena already holds `u32::MAX` entries.
    pub fn allocate(&mut self, data: T) -> I {
        let raw = u32::try_from(self.slots.len()).expect("arena handle space exhausted");
        self.slots.push(data);
        I::from_raw(raw)
    }

    /// Returns the entry behind `id`, if present.
    pub fn get(&self, id: I) -> Option<&T> {
        self.slots.get(id.index())
    }

    /// Returns the entry behind `id` mutably, if present.
    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        self.slots.get_mut(id.index())
    }

    /// Returns `true` if `id` addresses a live entry.
    pub fn contains(&self, id: I) -> bool {
        id.index() < self.slots.len()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the arena holds no entries.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drops every entry. Handles handed out earlier become dangling.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Iterates over all entries in handle order.
    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
        self.slots
            .iter()
            .enumerate()
            .map(|(idx, data)| (I::from_raw(idx as u32), data))
    }

    /// Iterates over all entries mutably in handle order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (I, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .map(|(idx, data)| (I::from_raw(idx as u32), data))
    }

    /// Iterates over all handles in order.
    pub fn ids(&self) -> impl Iterator<Item = I> {
        (0..self.slots.len() as u32).map(I::from_raw)
    }
}

impl<I: ArenaIndex, T> Default for Arena<I, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: ArenaIndex, T: fmt::Debug> fmt::Debug for Arena<I, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<I: ArenaIndex, T> std::ops::Index<I> for Arena<I, T> {
    type Output = T;

    fn index(&self, id: I) -> &T {
        &self.slots[id.index()]
    }
}

impl<I: ArenaIndex, T> std::ops::IndexMut<I> for Arena<I, T> {
    fn index_mut(&mut self, id: I) -> &mut T {
        &mut self.slots[id.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    arena_index!(TestId);

    #[test]
    fn arena_basic() {
        let mut arena: Arena<TestId, &'static str> = Arena::new();
        assert!(arena.is_empty());

        let id1 = arena.allocate("hello");
        assert_eq!(id1.as_raw(), 0);
        assert_eq!(arena.get(id1), Some(&"hello"));

        let id2 = arena.allocate("world");
        assert_eq!(id2.as_raw(), 1);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena[id2], "world");

        arena[id1] = "replaced";
        assert_eq!(arena.get(id1), Some(&"replaced"));
        assert!(!arena.contains(TestId::from_raw(2)));
    }

    #[test]
    fn deterministic_iteration() {
        let mut arena: Arena<TestId, i32> = Arena::new();
        for i in 0..5 {
            arena.allocate(i * 10);
        }
        let collected: Vec<_> = arena.iter().map(|(id, &val)| (id.as_raw(), val)).collect();
        assert_eq!(collected, vec![(0, 0), (1, 10), (2, 20), (3, 30), (4, 40)]);
    }

    #[test]
    fn clear_resets_handles() {
        let mut arena: Arena<TestId, ()> = Arena::new();
        arena.allocate(());
        arena.allocate(());
        arena.clear();
        assert_eq!(arena.len(), 0);
        assert_eq!(arena.allocate(()).as_raw(), 0);
    }

    #[test]
    #[should_panic]
    fn indexing_past_end_panics() {
        let arena: Arena<TestId, ()> = Arena::new();
        let _unit: () = arena[TestId::from_raw(3)];
    }
}
