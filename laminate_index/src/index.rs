// Copyright 2025 the Laminate Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public `Index` API and generic implementation over a pluggable backend.

use alloc::vec::Vec;
use core::fmt::Debug;

use crate::backend::Backend;
use crate::backends::flatvec::FlatVec;
use crate::backends::rtree::RTree;
use crate::damage::Damage;
use crate::types::Aabb2D;

/// Generational handle for entries.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(u32, u32);

impl Key {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Index keys are 32-bit; a layer never holds 2^32 pieces."
    )]
    const fn new(idx: usize, generation: u32) -> Self {
        Self(idx as u32, generation)
    }

    const fn idx(self) -> usize {
        self.0 as usize
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Mark {
    Added,
    Updated,
    Removed,
}

#[derive(Clone, Debug)]
struct Entry<T, P> {
    generation: u32,
    aabb: Aabb2D<T>,
    payload: P,
    mark: Option<Mark>,
    // Position at the last commit, for moved damage.
    committed: Option<Aabb2D<T>>,
}

/// A generic AABB index parameterized by a spatial backend.
///
/// Mutations are staged and reach the backend on [`commit`](Self::commit);
/// queries only see committed state.
#[derive(Debug)]
pub struct IndexGeneric<T: Copy + PartialOrd + Debug, P: Copy + Debug, B: Backend<T, P>> {
    entries: Vec<Option<Entry<T, P>>>,
    generations: Vec<u32>,
    free_list: Vec<usize>,
    backend: B,
}

impl<T, P, B> Default for IndexGeneric<T, P, B>
where
    T: Copy + PartialOrd + Debug,
    P: Copy + Debug,
    B: Backend<T, P> + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, P, B> IndexGeneric<T, P, B>
where
    T: Copy + PartialOrd + Debug,
    P: Copy + Debug,
    B: Backend<T, P> + Default,
{
    /// Create an empty index using the backend's default constructor.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            backend: B::default(),
        }
    }

    /// Build a committed index from `entries` in one pass.
    ///
    /// Keys are assigned in input order; the backend gets a single bulk load.
    pub fn from_entries(entries: &[(Aabb2D<T>, P)]) -> (Self, Vec<Key>) {
        let mut idx = Self::new();
        idx.entries.reserve(entries.len());
        let mut pairs = Vec::with_capacity(entries.len());
        let mut keys = Vec::with_capacity(entries.len());
        for (i, (aabb, payload)) in entries.iter().copied().enumerate() {
            idx.entries.push(Some(Entry {
                generation: 1,
                aabb,
                payload,
                mark: None,
                committed: Some(aabb),
            }));
            idx.generations.push(1);
            pairs.push((i, aabb));
            keys.push(Key::new(i, 1));
        }
        idx.backend.bulk_load(&pairs);
        (idx, keys)
    }
}

impl<T, P, B> IndexGeneric<T, P, B>
where
    T: Copy + PartialOrd + Debug,
    P: Copy + Debug,
    B: Backend<T, P>,
{
    /// Insert a new AABB with payload. Returns a stable handle `Key`.
    pub fn insert(&mut self, aabb: Aabb2D<T>, payload: P) -> Key {
        let idx = match self.free_list.pop() {
            Some(idx) => idx,
            None => {
                self.entries.push(None);
                self.generations.push(0);
                self.entries.len() - 1
            }
        };
        // Generations survive frees so a reused slot never aliases an old key.
        let generation = self.generations[idx].wrapping_add(1);
        self.generations[idx] = generation;
        self.entries[idx] = Some(Entry {
            generation,
            aabb,
            payload,
            mark: Some(Mark::Added),
            committed: None,
        });
        Key::new(idx, generation)
    }

    /// Relocate an existing AABB. Stale keys are ignored.
    pub fn update(&mut self, key: Key, aabb: Aabb2D<T>) {
        if let Some(e) = self.entry_mut(key) {
            e.aabb = aabb;
            if e.mark.is_none() {
                e.mark = Some(Mark::Updated);
            }
        }
    }

    /// Remove an existing AABB. Stale keys are ignored.
    pub fn remove(&mut self, key: Key) {
        let Some(e) = self.entry_mut(key) else {
            return;
        };
        if e.mark == Some(Mark::Added) {
            // Never reached the backend.
            self.entries[key.idx()] = None;
            self.free_list.push(key.idx());
        } else {
            e.mark = Some(Mark::Removed);
        }
    }

    /// Payload and current (possibly uncommitted) AABB for `key`.
    pub fn get(&self, key: Key) -> Option<(Aabb2D<T>, P)> {
        let e = self.entries.get(key.idx())?.as_ref()?;
        (e.generation == key.1 && e.mark != Some(Mark::Removed)).then_some((e.aabb, e.payload))
    }

    /// Number of live entries, committed or not.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .flatten()
            .filter(|e| e.mark != Some(Mark::Removed))
            .count()
    }

    /// True when no live entries remain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear the index (without reporting damage).
    pub fn clear(&mut self) {
        // Generations are kept so keys from before the clear stay dead.
        self.entries.fill(None);
        self.free_list.clear();
        self.free_list.extend((0..self.entries.len()).rev());
        self.backend.clear();
    }

    /// Apply pending changes to the backend and report what moved.
    pub fn commit(&mut self) -> Damage<T> {
        let mut dmg = Damage::default();
        for i in 0..self.entries.len() {
            let Some(entry) = self.entries[i].as_mut() else {
                continue;
            };
            match entry.mark.take() {
                Some(Mark::Added) => {
                    self.backend.insert(i, entry.aabb);
                    entry.committed = Some(entry.aabb);
                    dmg.added.push(entry.aabb);
                }
                Some(Mark::Updated) => {
                    self.backend.update(i, entry.aabb);
                    if let Some(prev) = entry.committed.replace(entry.aabb)
                        && prev != entry.aabb
                    {
                        dmg.moved.push((prev, entry.aabb));
                    }
                }
                Some(Mark::Removed) => {
                    self.backend.remove(i);
                    dmg.removed.push(entry.committed.unwrap_or(entry.aabb));
                    self.entries[i] = None;
                    self.free_list.push(i);
                }
                None => {}
            }
        }
        dmg
    }

    /// Committed entries whose AABB intersects the rectangle (touching included).
    pub fn query_rect(&self, rect: Aabb2D<T>) -> impl Iterator<Item = (Key, P)> + '_ {
        self.backend
            .query_rect(rect)
            .into_iter()
            .filter_map(|i| match self.entries.get(i) {
                Some(Some(e)) => Some((Key::new(i, e.generation), e.payload)),
                _ => None,
            })
    }

    fn entry_mut(&mut self, key: Key) -> Option<&mut Entry<T, P>> {
        let e = self.entries.get_mut(key.idx())?.as_mut()?;
        (e.generation == key.1).then_some(e)
    }
}

/// Index over a flat vector backend (linear scans).
pub type Index<T, P> = IndexGeneric<T, P, FlatVec<T, P>>;

/// Index over the R-tree backend.
pub type RTreeIndex<T, P> = IndexGeneric<T, P, RTree<T, P>>;
