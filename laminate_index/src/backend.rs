// Copyright 2025 the Laminate Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend trait for spatial indexing implementations.

use alloc::vec::Vec;

use crate::types::Aabb2D;
use core::fmt::Debug;

/// Spatial backend abstraction used by `IndexGeneric`.
///
/// Backends only see slot numbers; payloads and generations live in the index.
pub trait Backend<T: Copy + PartialOrd + Debug, P: Copy + Debug> {
    /// Insert a new slot into the spatial structure.
    fn insert(&mut self, slot: usize, aabb: Aabb2D<T>);

    /// Update an existing slot's AABB.
    fn update(&mut self, slot: usize, aabb: Aabb2D<T>);

    /// Remove a slot from the spatial structure.
    fn remove(&mut self, slot: usize);

    /// Clear all spatial structures.
    fn clear(&mut self);

    /// Replace the whole structure with `pairs`.
    ///
    /// The default inserts one slot at a time; tree backends override this with a packed build.
    fn bulk_load(&mut self, pairs: &[(usize, Aabb2D<T>)]) {
        self.clear();
        for (slot, aabb) in pairs.iter().copied() {
            self.insert(slot, aabb);
        }
    }

    /// Slots whose AABB intersects the rectangle (touching included).
    fn query_rect(&self, rect: Aabb2D<T>) -> Vec<usize>;
}
