// Copyright 2025 the Laminate Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cross-layer index that switches itself on and off with the item count.
//!
//! Below a few hundred boxes a linear scan beats keeping a tree in sync, so
//! [`GlobalIndex`] keeps a plain map of boxes and only builds an R-tree once the
//! count crosses [`AutoEnable::min_on`]. It drops the tree again when the count
//! falls to [`AutoEnable::max_off`]; the gap between the two thresholds is the
//! hysteresis band that stops it flapping around the break-even point.
//!
//! The index never reads a clock. Mutations and [`GlobalIndex::tick`] take a
//! monotonic `now`, and pending changes are applied only after
//! [`AutoEnable::debounce`] has passed without further edits.

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;
use core::fmt::Debug;
use core::time::Duration;

use crate::damage::Damage;
use crate::index::{Key, RTreeIndex};
use crate::types::Aabb2D;

/// Hysteresis thresholds and debounce window for [`GlobalIndex`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AutoEnable {
    /// Build the tree once at least this many items are held.
    pub min_on: usize,
    /// Drop the tree once at most this many items are held.
    pub max_off: usize,
    /// Quiet period after the last edit before changes are applied.
    pub debounce: Duration,
}

impl Default for AutoEnable {
    fn default() -> Self {
        Self {
            min_on: 120,
            max_off: 100,
            debounce: Duration::from_millis(50),
        }
    }
}

/// Which query path the global index is on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum IndexMode {
    /// Queries scan every held box.
    Linear,
    /// Queries go through the R-tree.
    Indexed,
}

/// Observer invoked with the new mode and item count on every mode change.
pub type ModeObserver = Box<dyn FnMut(IndexMode, usize)>;

/// Cross-layer box index with count-driven auto-enable.
pub struct GlobalIndex<K: Copy + Debug> {
    policy: AutoEnable,
    items: BTreeMap<K, Aabb2D<f64>>,
    tree: Option<(RTreeIndex<f64, K>, BTreeMap<K, Key>)>,
    pending: BTreeSet<K>,
    last_edit: Option<Duration>,
    mode: IndexMode,
    observer: Option<ModeObserver>,
}

impl<K: Copy + Debug> Debug for GlobalIndex<K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GlobalIndex")
            .field("policy", &self.policy)
            .field("mode", &self.mode)
            .field("items", &self.items.len())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl<K: Copy + Ord + Debug> Default for GlobalIndex<K> {
    fn default() -> Self {
        Self::new(AutoEnable::default())
    }
}

impl<K: Copy + Ord + Debug> GlobalIndex<K> {
    /// Create an empty index in [`IndexMode::Linear`].
    pub fn new(policy: AutoEnable) -> Self {
        debug_assert!(
            policy.max_off < policy.min_on,
            "hysteresis band must be non-empty"
        );
        Self {
            policy,
            items: BTreeMap::new(),
            tree: None,
            pending: BTreeSet::new(),
            last_edit: None,
            mode: IndexMode::Linear,
            observer: None,
        }
    }

    /// Register the mode-change observer, replacing any previous one.
    pub fn set_observer(&mut self, observer: impl FnMut(IndexMode, usize) + 'static) {
        self.observer = Some(Box::new(observer));
    }

    /// Current query path.
    pub fn mode(&self) -> IndexMode {
        self.mode
    }

    /// Number of held boxes, including edits not yet applied to the tree.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when no boxes are held.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True when edits are waiting for the debounce window to pass.
    pub fn is_dirty(&self) -> bool {
        self.last_edit.is_some()
    }

    /// Insert or relocate `id`.
    pub fn upsert(&mut self, id: K, aabb: Aabb2D<f64>, now: Duration) {
        if self.items.insert(id, aabb) != Some(aabb) {
            self.touch(id, now);
        }
    }

    /// Forget `id`. Returns whether it was present.
    pub fn remove(&mut self, id: K, now: Duration) -> bool {
        let present = self.items.remove(&id).is_some();
        if present {
            self.touch(id, now);
        }
        present
    }

    /// Replace every box and settle immediately, bypassing the debounce.
    pub fn load(&mut self, items: impl IntoIterator<Item = (K, Aabb2D<f64>)>) {
        self.items = items.into_iter().collect();
        self.tree = None;
        self.pending.clear();
        self.last_edit = None;
        self.settle();
    }

    /// Drop every box and return to [`IndexMode::Linear`].
    pub fn clear(&mut self) {
        self.load(core::iter::empty());
    }

    /// Apply pending edits if the debounce window has passed.
    ///
    /// Returns the tree damage when edits were applied to a live tree.
    pub fn tick(&mut self, now: Duration) -> Option<Damage<f64>> {
        let last = self.last_edit?;
        if now.saturating_sub(last) < self.policy.debounce {
            return None;
        }
        self.flush()
    }

    /// Apply pending edits now, regardless of the debounce window.
    pub fn flush(&mut self) -> Option<Damage<f64>> {
        self.last_edit = None;
        self.settle()
    }

    /// Ids whose box intersects `window`, on every layer. Order is unspecified.
    ///
    /// Goes through the tree only when it is live and current; otherwise scans.
    pub fn query(&self, window: Aabb2D<f64>) -> Vec<K> {
        match &self.tree {
            Some((tree, _)) if self.pending.is_empty() => {
                tree.query_rect(window).map(|(_, id)| id).collect()
            }
            _ => self
                .items
                .iter()
                .filter(|(_, b)| b.intersects(&window))
                .map(|(id, _)| *id)
                .collect(),
        }
    }

    fn touch(&mut self, id: K, now: Duration) {
        self.pending.insert(id);
        self.last_edit = Some(now);
    }

    fn settle(&mut self) -> Option<Damage<f64>> {
        let count = self.items.len();
        let next = match self.mode {
            IndexMode::Linear if count >= self.policy.min_on => IndexMode::Indexed,
            IndexMode::Indexed if count <= self.policy.max_off => IndexMode::Linear,
            mode => mode,
        };
        let damage = match next {
            IndexMode::Linear => {
                self.tree = None;
                self.pending.clear();
                None
            }
            IndexMode::Indexed if self.tree.is_none() => {
                self.rebuild();
                None
            }
            IndexMode::Indexed => Some(self.apply_pending()),
        };
        if next != self.mode {
            self.mode = next;
            if let Some(observer) = self.observer.as_mut() {
                observer(next, count);
            }
        }
        damage
    }

    fn rebuild(&mut self) {
        let entries: Vec<(Aabb2D<f64>, K)> = self.items.iter().map(|(id, b)| (*b, *id)).collect();
        let (tree, keys) = RTreeIndex::from_entries(&entries);
        let keys = entries.iter().map(|(_, id)| *id).zip(keys).collect();
        self.tree = Some((tree, keys));
        self.pending.clear();
    }

    fn apply_pending(&mut self) -> Damage<f64> {
        let Some((tree, keys)) = self.tree.as_mut() else {
            return Damage::default();
        };
        for id in core::mem::take(&mut self.pending) {
            match (self.items.get(&id), keys.get(&id).copied()) {
                (Some(b), Some(key)) => tree.update(key, *b),
                (Some(b), None) => {
                    keys.insert(id, tree.insert(*b, id));
                }
                (None, Some(key)) => {
                    tree.remove(key);
                    keys.remove(&id);
                }
                (None, None) => {}
            }
        }
        tree.commit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use alloc::vec;
    use core::cell::RefCell;

    const MS: Duration = Duration::from_millis(1);

    fn small_policy() -> AutoEnable {
        AutoEnable {
            min_on: 4,
            max_off: 2,
            debounce: Duration::from_millis(50),
        }
    }

    fn cell(i: u32) -> Aabb2D<f64> {
        Aabb2D::<f64>::from_xywh(f64::from(i) * 20.0, 0.0, 10.0, 10.0)
    }

    #[test]
    fn default_policy_and_debug() {
        let mut g: GlobalIndex<u32> = GlobalIndex::default();
        assert_eq!(g.mode(), IndexMode::Linear);
        g.upsert(1, cell(1), Duration::ZERO);
        let text = alloc::format!("{g:?}");
        assert!(text.contains("items: 1"), "{text}");
        assert!(text.contains("pending: 1"), "{text}");
    }

    #[test]
    fn enables_after_debounce_and_reports_transition() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let mut g: GlobalIndex<u32> = GlobalIndex::new(small_policy());
        g.set_observer(move |mode, n| sink.borrow_mut().push((mode, n)));
        for i in 0..4 {
            g.upsert(i, cell(i), MS * i);
        }
        assert_eq!(g.mode(), IndexMode::Linear);
        assert!(g.tick(MS * 10).is_none(), "still inside the debounce window");
        assert_eq!(g.mode(), IndexMode::Linear);
        let _ = g.tick(MS * 60);
        assert_eq!(g.mode(), IndexMode::Indexed);
        assert_eq!(*seen.borrow(), vec![(IndexMode::Indexed, 4)]);
    }

    #[test]
    fn hysteresis_band_holds_mode() {
        let mut g: GlobalIndex<u32> = GlobalIndex::new(small_policy());
        g.load((0..5).map(|i| (i, cell(i))));
        assert_eq!(g.mode(), IndexMode::Indexed);
        g.remove(4, MS);
        g.remove(3, MS);
        let _ = g.flush();
        assert_eq!(g.mode(), IndexMode::Indexed, "3 items is inside the band");
        g.remove(2, MS);
        let _ = g.flush();
        assert_eq!(g.mode(), IndexMode::Linear);
        g.upsert(2, cell(2), MS);
        let _ = g.flush();
        assert_eq!(g.mode(), IndexMode::Linear, "3 items is inside the band");
    }

    #[test]
    fn queries_are_correct_in_both_modes_and_while_dirty() {
        let mut g: GlobalIndex<u32> = GlobalIndex::new(small_policy());
        g.load((0..6).map(|i| (i, cell(i))));
        let window = Aabb2D::<f64>::from_xywh(15.0, 0.0, 30.0, 5.0);
        let mut hits = g.query(window);
        hits.sort_unstable();
        assert_eq!(hits, vec![1, 2]);

        g.upsert(1, cell(40), MS);
        assert!(g.is_dirty());
        assert_eq!(g.query(window), vec![2], "pending edits are visible");
        let damage = g.flush().expect("tree was live");
        assert_eq!(damage.moved.len(), 1);
        assert_eq!(g.query(window), vec![2]);
    }

    #[test]
    fn unchanged_upsert_does_not_dirty() {
        let mut g: GlobalIndex<u32> = GlobalIndex::new(small_policy());
        g.load([(1, cell(1))]);
        g.upsert(1, cell(1), MS);
        assert!(!g.is_dirty());
    }
}
