// Copyright 2025 the Laminate Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Batched damage returned by [`IndexGeneric::commit`](crate::IndexGeneric::commit).

use alloc::vec::Vec;

use crate::types::{Aabb2D, union_aabb};

/// What changed in an index since the previous commit.
#[derive(Clone, Debug)]
pub struct Damage<T> {
    /// Newly added AABBs.
    pub added: Vec<Aabb2D<T>>,
    /// Removed AABBs.
    pub removed: Vec<Aabb2D<T>>,
    /// Relocated AABBs: (old, new).
    pub moved: Vec<(Aabb2D<T>, Aabb2D<T>)>,
}

impl<T> Default for Damage<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            moved: Vec::new(),
        }
    }
}

impl<T: Copy + PartialOrd> Damage<T> {
    /// True if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.moved.is_empty()
    }

    /// Number of entries touched by the commit.
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.moved.len()
    }

    /// Union of all affected AABBs, old and new positions alike. `None` if empty.
    pub fn union(&self) -> Option<Aabb2D<T>> {
        let mut it = self
            .added
            .iter()
            .copied()
            .chain(self.removed.iter().copied())
            .chain(self.moved.iter().flat_map(|(a, b)| [*a, *b]));
        let first = it.next()?;
        Some(it.fold(first, union_aabb))
    }

    /// Fold another batch into this one.
    pub fn extend(&mut self, other: Self) {
        self.added.extend(other.added);
        self.removed.extend(other.removed);
        self.moved.extend(other.moved);
    }
}
