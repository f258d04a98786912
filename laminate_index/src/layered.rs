// Copyright 2025 the Laminate Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One R-tree per layer, addressed by caller ids.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::fmt::Debug;

use crate::index::{Key, RTreeIndex};
use crate::types::Aabb2D;

#[derive(Copy, Clone, Debug)]
struct Placement<L> {
    layer: L,
    key: Key,
}

/// Per-layer spatial index keyed by item id.
///
/// Every mutation is committed immediately, so queries always reflect the
/// latest `upsert`/`remove`. Queries against a layer that was never loaded
/// return nothing; callers treat that as "no shortlist", not "no neighbors".
pub struct LayeredIndex<L, K: Copy + Debug> {
    layers: BTreeMap<L, RTreeIndex<f64, K>>,
    items: BTreeMap<K, Placement<L>>,
}

impl<L, K: Copy + Debug> Default for LayeredIndex<L, K> {
    fn default() -> Self {
        Self {
            layers: BTreeMap::new(),
            items: BTreeMap::new(),
        }
    }
}

impl<L: Debug, K: Copy + Debug> Debug for LayeredIndex<L, K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LayeredIndex")
            .field("layers", &self.layers.keys().collect::<Vec<_>>())
            .field("items", &self.items.len())
            .finish_non_exhaustive()
    }
}

impl<L, K> LayeredIndex<L, K>
where
    L: Copy + Ord + Debug,
    K: Copy + Ord + Debug,
{
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `id`, or relocate it if already known (possibly to another layer).
    pub fn upsert(&mut self, id: K, layer: L, aabb: Aabb2D<f64>) {
        if let Some(p) = self.items.get(&id).copied() {
            if p.layer == layer {
                if let Some(tree) = self.layers.get_mut(&layer) {
                    tree.update(p.key, aabb);
                    let _ = tree.commit();
                }
                return;
            }
            self.remove(id);
        }
        let tree = self.layers.entry(layer).or_default();
        let key = tree.insert(aabb, id);
        let _ = tree.commit();
        self.items.insert(id, Placement { layer, key });
    }

    /// Forget `id`. Returns whether it was present.
    pub fn remove(&mut self, id: K) -> bool {
        let Some(p) = self.items.remove(&id) else {
            return false;
        };
        if let Some(tree) = self.layers.get_mut(&p.layer) {
            tree.remove(p.key);
            let _ = tree.commit();
        }
        true
    }

    /// Replace a layer's contents wholesale with a packed bulk build.
    pub fn load(&mut self, layer: L, items: impl IntoIterator<Item = (K, Aabb2D<f64>)>) {
        self.clear_layer(layer);
        let mut entries = Vec::new();
        for (id, aabb) in items {
            // An id can live on one layer only.
            if self.items.contains_key(&id) {
                self.remove(id);
            }
            entries.push((aabb, id));
        }
        let (tree, keys) = RTreeIndex::from_entries(&entries);
        for ((_, id), key) in entries.iter().zip(keys) {
            self.items.insert(*id, Placement { layer, key });
        }
        self.layers.insert(layer, tree);
    }

    /// Drop one layer's tree and its items.
    pub fn clear_layer(&mut self, layer: L) {
        if self.layers.remove(&layer).is_some() {
            self.items.retain(|_, p| p.layer != layer);
        }
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.layers.clear();
        self.items.clear();
    }

    /// Stored layer and box of `id`.
    pub fn get(&self, id: K) -> Option<(L, Aabb2D<f64>)> {
        let p = self.items.get(&id)?;
        let (aabb, _) = self.layers.get(&p.layer)?.get(p.key)?;
        Some((p.layer, aabb))
    }

    /// Number of indexed items across all layers.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Ids on `layer` whose box intersects `window`. Order is unspecified.
    pub fn query(&self, layer: L, window: Aabb2D<f64>) -> Vec<K> {
        self.layers
            .get(&layer)
            .map(|tree| tree.query_rect(window).map(|(_, id)| id).collect())
            .unwrap_or_default()
    }

    /// Ids on any layer whose box intersects `window`.
    pub fn query_all(&self, window: Aabb2D<f64>) -> Vec<K> {
        self.layers
            .values()
            .flat_map(|tree| tree.query_rect(window).map(|(_, id)| id))
            .collect()
    }

    /// Same-layer ids within `margin` of `id`'s stored box, excluding `id`.
    ///
    /// Results are ordered by edge-to-edge distance (ties by id) before being
    /// cut to `limit`, so the shortlist keeps the closest neighbors.
    pub fn neighbors(&self, id: K, margin: f64, limit: usize) -> Vec<K> {
        let Some((layer, aabb)) = self.get(id) else {
            return Vec::new();
        };
        let Some(tree) = self.layers.get(&layer) else {
            return Vec::new();
        };
        let mut found: Vec<(f64, K)> = tree
            .query_rect(aabb.inflate(margin))
            .filter(|(_, other)| *other != id)
            .map(|(key, other)| {
                let gap = tree.get(key).map_or(f64::INFINITY, |(b, _)| aabb.gap(&b));
                (gap, other)
            })
            .collect();
        found.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        found.truncate(limit);
        found.into_iter().map(|(_, k)| k).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn sq(x: f64, y: f64) -> Aabb2D<f64> {
        Aabb2D::<f64>::from_xywh(x, y, 10.0, 10.0)
    }

    fn sorted(mut v: Vec<u32>) -> Vec<u32> {
        v.sort_unstable();
        v
    }

    #[test]
    fn default_and_debug_summarize_layers() {
        let mut idx: LayeredIndex<u8, u32> = LayeredIndex::default();
        idx.load(3, [(7, sq(0.0, 0.0))]);
        let text = alloc::format!("{idx:?}");
        assert!(text.starts_with("LayeredIndex { layers: [3], items: 1"), "{text}");
    }

    #[test]
    fn upsert_is_idempotent_and_relocates() {
        let mut idx: LayeredIndex<u8, u32> = LayeredIndex::new();
        idx.upsert(1, 0, sq(0.0, 0.0));
        idx.upsert(1, 0, sq(0.0, 0.0));
        assert_eq!(idx.len(), 1);
        idx.upsert(1, 0, sq(100.0, 0.0));
        assert!(idx.query(0, sq(0.0, 0.0)).is_empty());
        assert_eq!(idx.query(0, sq(100.0, 0.0)), vec![1]);
    }

    #[test]
    fn upsert_moves_between_layers() {
        let mut idx: LayeredIndex<u8, u32> = LayeredIndex::new();
        idx.upsert(7, 0, sq(0.0, 0.0));
        idx.upsert(7, 1, sq(0.0, 0.0));
        assert!(idx.query(0, sq(0.0, 0.0)).is_empty());
        assert_eq!(idx.query(1, sq(0.0, 0.0)), vec![7]);
        assert_eq!(idx.get(7).map(|(l, _)| l), Some(1));
    }

    #[test]
    fn remove_is_idempotent() {
        let mut idx: LayeredIndex<u8, u32> = LayeredIndex::new();
        idx.upsert(1, 0, sq(0.0, 0.0));
        assert!(idx.remove(1));
        assert!(!idx.remove(1));
        assert!(idx.query(0, sq(0.0, 0.0)).is_empty());
    }

    #[test]
    fn unknown_layer_yields_empty() {
        let idx: LayeredIndex<u8, u32> = LayeredIndex::new();
        assert!(idx.query(3, sq(0.0, 0.0)).is_empty());
        assert!(idx.neighbors(42, 5.0, 8).is_empty());
    }

    #[test]
    fn neighbors_respect_margin_layer_and_limit() {
        let mut idx: LayeredIndex<u8, u32> = LayeredIndex::new();
        idx.load(0, [(1, sq(0.0, 0.0)), (2, sq(12.0, 0.0)), (3, sq(30.0, 0.0)), (4, sq(0.0, 11.0))]);
        idx.upsert(5, 1, sq(0.0, 0.0));
        assert_eq!(sorted(idx.neighbors(1, 2.0, 16)), vec![2, 4]);
        assert_eq!(idx.neighbors(1, 2.0, 1), vec![4], "closest first");
        assert_eq!(sorted(idx.neighbors(1, 25.0, 16)), vec![2, 3, 4]);
    }

    #[test]
    fn zero_margin_includes_touching() {
        let mut idx: LayeredIndex<u8, u32> = LayeredIndex::new();
        idx.load(0, [(1, sq(0.0, 0.0)), (2, sq(10.0, 0.0))]);
        assert_eq!(idx.neighbors(1, 0.0, 16), vec![2]);
    }

    #[test]
    fn load_replaces_layer() {
        let mut idx: LayeredIndex<u8, u32> = LayeredIndex::new();
        idx.load(0, [(1, sq(0.0, 0.0)), (2, sq(20.0, 0.0))]);
        idx.load(0, [(3, sq(40.0, 0.0))]);
        assert_eq!(idx.len(), 1);
        assert!(idx.get(1).is_none());
        assert_eq!(idx.query_all(Aabb2D::new(-1.0, -1.0, 100.0, 100.0)), vec![3]);
        idx.upsert(4, 0, sq(60.0, 0.0));
        assert_eq!(sorted(idx.query(0, Aabb2D::new(-1.0, -1.0, 100.0, 100.0))), vec![3, 4]);
    }
}
