// Copyright 2025 the Laminate Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! R-tree backend generic over scalar `T: Scalar` with SAH-like split.

use alloc::vec;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt::Debug;
use core::marker::PhantomData;

use crate::backend::Backend;
use crate::types::{Aabb2D, Scalar, ScalarAcc, area, union_aabb};

const MAX_CHILDREN: usize = 8;
const MIN_CHILDREN: usize = 4;

/// R-tree backend using SAH-like splits and widened accumulator metrics.
pub struct RTree<T: Scalar, P: Copy + Debug> {
    root: Option<usize>,
    arena: Vec<Node<T>>,
    slots: Vec<Option<Aabb2D<T>>>,
    _p: PhantomData<P>,
}

#[derive(Clone, Debug)]
struct Node<T: Scalar> {
    bbox: Aabb2D<T>,
    leaf: bool,
    children: Vec<Child<T>>,
}

#[derive(Copy, Clone, Debug)]
enum Child<T: Scalar> {
    Node(usize),
    Item { slot: usize, bbox: Aabb2D<T> },
}

type Split<T> = (Vec<Child<T>>, Vec<Child<T>>);

impl<T: Scalar, P: Copy + Debug> Default for RTree<T, P> {
    fn default() -> Self {
        Self {
            root: None,
            arena: Vec::new(),
            slots: Vec::new(),
            _p: PhantomData,
        }
    }
}

fn by_centroid<T: Scalar>(axis: usize, a: &Aabb2D<T>, b: &Aabb2D<T>) -> Ordering {
    let (ca, cb) = if axis == 0 {
        (T::mid(a.min_x, a.max_x), T::mid(b.min_x, b.max_x))
    } else {
        (T::mid(a.min_y, a.max_y), T::mid(b.min_y, b.max_y))
    };
    ca.partial_cmp(&cb).unwrap_or(Ordering::Equal)
}

/// Side length of the STR tiling grid for `n` groups.
fn str_slices(n: usize) -> usize {
    let mut g = 1_usize;
    while g * g < n {
        g += 1;
    }
    g
}

impl<T: Scalar, P: Copy + Debug> RTree<T, P> {
    /// Build an `RTree` from a set of (slot, bbox) pairs using a packed layout.
    pub fn bulk_build(pairs: &[(usize, Aabb2D<T>)]) -> Self {
        let mut tree = Self::default();
        tree.bulk_load(pairs);
        tree
    }

    fn child_bbox(arena: &[Node<T>], c: &Child<T>) -> Aabb2D<T> {
        match c {
            Child::Node(i) => arena[*i].bbox,
            Child::Item { bbox, .. } => *bbox,
        }
    }

    fn node_bbox(arena: &[Node<T>], children: &[Child<T>]) -> Aabb2D<T> {
        let mut it = children.iter().map(|c| Self::child_bbox(arena, c));
        let Some(first) = it.next() else {
            return Aabb2D::new(T::zero(), T::zero(), T::zero(), T::zero());
        };
        it.fold(first, union_aabb)
    }

    fn push_node(arena: &mut Vec<Node<T>>, leaf: bool, children: Vec<Child<T>>) -> usize {
        let bbox = Self::node_bbox(arena, &children);
        arena.push(Node {
            bbox,
            leaf,
            children,
        });
        arena.len() - 1
    }

    /// STR-like packing: tile by x centroid, then by y centroid inside each slice.
    fn pack_level(arena: &mut Vec<Node<T>>, level: Vec<Child<T>>, leaf: bool) -> Vec<usize> {
        let n = level.len();
        let groups = n.div_ceil(MAX_CHILDREN);
        let slice_size = n.div_ceil(str_slices(groups)).max(1);
        let mut keyed: Vec<(Aabb2D<T>, Child<T>)> = level
            .into_iter()
            .map(|c| (Self::child_bbox(arena, &c), c))
            .collect();
        keyed.sort_by(|a, b| by_centroid(0, &a.0, &b.0));
        let mut out = Vec::with_capacity(groups);
        for slice in keyed.chunks_mut(slice_size) {
            slice.sort_by(|a, b| by_centroid(1, &a.0, &b.0));
            for chunk in slice.chunks(MAX_CHILDREN) {
                let children = chunk.iter().map(|(_, c)| *c).collect();
                out.push(Self::push_node(arena, leaf, children));
            }
        }
        out
    }

    /// SAH-like split: sort along each axis, precompute prefix/suffix AABBs, and
    /// choose `k` that minimizes `area(LB_k) * k + area(RB_k) * (n - k)`.
    fn split(arena: &[Node<T>], children: Vec<Child<T>>) -> Split<T> {
        let n = children.len();
        let mut best: Option<(ScalarAcc<T>, usize, usize)> = None;
        let mut sorted: [Vec<Child<T>>; 2] = [children.clone(), children];
        for (axis, v) in sorted.iter_mut().enumerate() {
            v.sort_by(|a, b| {
                by_centroid(axis, &Self::child_bbox(arena, a), &Self::child_bbox(arena, b))
            });
            let boxes: Vec<Aabb2D<T>> = v.iter().map(|c| Self::child_bbox(arena, c)).collect();
            let mut prefix = boxes.clone();
            for i in 1..n {
                prefix[i] = union_aabb(prefix[i - 1], boxes[i]);
            }
            let mut suffix = boxes;
            for i in (0..n - 1).rev() {
                suffix[i] = union_aabb(suffix[i], suffix[i + 1]);
            }
            for k in MIN_CHILDREN..=(n - MIN_CHILDREN) {
                let cost = area(&prefix[k - 1]) * T::acc_from_usize(k)
                    + area(&suffix[k]) * T::acc_from_usize(n - k);
                if best.is_none_or(|(c, _, _)| cost < c) {
                    best = Some((cost, axis, k));
                }
            }
        }
        let (_, axis, k) = best.unwrap_or((T::widen(T::zero()), 0, n / 2));
        let mut left = core::mem::take(&mut sorted[axis]);
        let right = left.split_off(k);
        (left, right)
    }

    fn choose_child(arena: &[Node<T>], children: &[Child<T>], bbox: &Aabb2D<T>) -> usize {
        let mut best_idx = 0_usize;
        let mut best_cost: Option<T::Acc> = None;
        for (i, c) in children.iter().enumerate() {
            let cb = Self::child_bbox(arena, c);
            let cost = area(&union_aabb(cb, *bbox)) - area(&cb);
            if best_cost.is_none_or(|bc| cost < bc) {
                best_cost = Some(cost);
                best_idx = i;
            }
        }
        best_idx
    }

    /// Replace an overfull node with its left half and return the new right sibling.
    fn split_node(arena: &mut Vec<Node<T>>, node_idx: usize) -> usize {
        let children = core::mem::take(&mut arena[node_idx].children);
        let leaf = arena[node_idx].leaf;
        let (left, right) = Self::split(arena, children);
        arena[node_idx].bbox = Self::node_bbox(arena, &left);
        arena[node_idx].children = left;
        Self::push_node(arena, leaf, right)
    }

    fn insert_node(
        arena: &mut Vec<Node<T>>,
        node_idx: usize,
        slot: usize,
        bbox: Aabb2D<T>,
    ) -> Option<usize> {
        arena[node_idx].bbox = union_aabb(arena[node_idx].bbox, bbox);
        if arena[node_idx].leaf {
            arena[node_idx].children.push(Child::Item { slot, bbox });
        } else {
            let idx = Self::choose_child(arena, &arena[node_idx].children, &bbox);
            let Child::Node(child) = arena[node_idx].children[idx] else {
                return None;
            };
            if let Some(sibling) = Self::insert_node(arena, child, slot, bbox) {
                arena[node_idx]
                    .children
                    .insert(idx + 1, Child::Node(sibling));
            }
        }
        (arena[node_idx].children.len() > MAX_CHILDREN).then(|| Self::split_node(arena, node_idx))
    }

    fn child_nodes(node: &Node<T>) -> Vec<usize> {
        node.children
            .iter()
            .filter_map(|c| match c {
                Child::Node(i) => Some(*i),
                Child::Item { .. } => None,
            })
            .collect()
    }

    fn search_remove(arena: &mut Vec<Node<T>>, node_idx: usize, slot: usize, old: &Aabb2D<T>) -> bool {
        if !arena[node_idx].bbox.intersects(old) {
            return false;
        }
        let removed = if arena[node_idx].leaf {
            let before = arena[node_idx].children.len();
            arena[node_idx]
                .children
                .retain(|c| !matches!(c, Child::Item { slot: s, .. } if *s == slot));
            arena[node_idx].children.len() != before
        } else {
            let hit = Self::child_nodes(&arena[node_idx])
                .into_iter()
                .any(|ci| Self::search_remove(arena, ci, slot, old));
            if hit {
                let children = core::mem::take(&mut arena[node_idx].children);
                arena[node_idx].children = children
                    .into_iter()
                    .filter(|c| match c {
                        Child::Node(i) => !arena[*i].children.is_empty(),
                        Child::Item { .. } => true,
                    })
                    .collect();
            }
            hit
        };
        if removed && !arena[node_idx].children.is_empty() {
            arena[node_idx].bbox = Self::node_bbox(arena, &arena[node_idx].children);
        }
        removed
    }

    /// Update an item's AABB without remove+insert.
    /// Returns true if the item was found; recomputes ancestor bboxes on the path.
    fn update_in_place(
        arena: &mut Vec<Node<T>>,
        node_idx: usize,
        slot: usize,
        old: Aabb2D<T>,
        new: Aabb2D<T>,
    ) -> bool {
        if !arena[node_idx].bbox.intersects(&old) {
            return false;
        }
        let found = if arena[node_idx].leaf {
            let mut found = false;
            for c in &mut arena[node_idx].children {
                if let Child::Item { slot: s, bbox } = c
                    && *s == slot
                {
                    *bbox = new;
                    found = true;
                    break;
                }
            }
            found
        } else {
            Self::child_nodes(&arena[node_idx])
                .into_iter()
                .any(|ci| Self::update_in_place(arena, ci, slot, old, new))
        };
        if found {
            arena[node_idx].bbox = Self::node_bbox(arena, &arena[node_idx].children);
        }
        found
    }
}

impl<T: Scalar, P: Copy + Debug> Backend<T, P> for RTree<T, P> {
    fn insert(&mut self, slot: usize, aabb: Aabb2D<T>) {
        if self.slots.len() <= slot {
            self.slots.resize_with(slot + 1, || None);
        }
        self.slots[slot] = Some(aabb);
        let Some(root) = self.root else {
            let leaf = Self::push_node(&mut self.arena, true, vec![Child::Item { slot, bbox: aabb }]);
            self.root = Some(leaf);
            return;
        };
        if let Some(sibling) = Self::insert_node(&mut self.arena, root, slot, aabb) {
            let new_root = Self::push_node(
                &mut self.arena,
                false,
                vec![Child::Node(root), Child::Node(sibling)],
            );
            self.root = Some(new_root);
        }
    }

    fn update(&mut self, slot: usize, aabb: Aabb2D<T>) {
        if let Some(old) = self.slots.get(slot).copied().flatten()
            && let Some(root) = self.root
        {
            if Self::update_in_place(&mut self.arena, root, slot, old, aabb) {
                self.slots[slot] = Some(aabb);
                return;
            }
            Self::search_remove(&mut self.arena, root, slot, &old);
        }
        self.insert(slot, aabb);
    }

    fn remove(&mut self, slot: usize) {
        let Some(old) = self.slots.get(slot).copied().flatten() else {
            return;
        };
        if let Some(root) = self.root {
            Self::search_remove(&mut self.arena, root, slot, &old);
        }
        self.slots[slot] = None;
    }

    fn clear(&mut self) {
        self.root = None;
        self.arena.clear();
        self.slots.clear();
    }

    fn bulk_load(&mut self, pairs: &[(usize, Aabb2D<T>)]) {
        self.clear();
        for (slot, bbox) in pairs.iter().copied() {
            if self.slots.len() <= slot {
                self.slots.resize_with(slot + 1, || None);
            }
            self.slots[slot] = Some(bbox);
        }
        if pairs.is_empty() {
            return;
        }
        let items = pairs
            .iter()
            .map(|&(slot, bbox)| Child::Item { slot, bbox })
            .collect();
        let mut level = Self::pack_level(&mut self.arena, items, true);
        while level.len() > MAX_CHILDREN {
            let nodes = level.into_iter().map(Child::Node).collect();
            level = Self::pack_level(&mut self.arena, nodes, false);
        }
        self.root = Some(if level.len() == 1 {
            level[0]
        } else {
            let children = level.into_iter().map(Child::Node).collect();
            Self::push_node(&mut self.arena, false, children)
        });
    }

    fn query_rect(&self, rect: Aabb2D<T>) -> Vec<usize> {
        let mut out = Vec::new();
        let Some(root) = self.root else {
            return out;
        };
        let mut stack = vec![root];
        while let Some(i) = stack.pop() {
            let n = &self.arena[i];
            if !n.bbox.intersects(&rect) {
                continue;
            }
            for c in &n.children {
                match c {
                    Child::Item { slot, bbox } if bbox.intersects(&rect) => out.push(*slot),
                    Child::Node(ci) => stack.push(*ci),
                    Child::Item { .. } => {}
                }
            }
        }
        out
    }
}

impl<T: Scalar, P: Copy + Debug> Debug for RTree<T, P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RTree")
            .field("arena_nodes", &self.arena.len())
            .field("total_slots", &self.slots.len())
            .field("alive", &self.slots.iter().flatten().count())
            .field("has_root", &self.root.is_some())
            .finish_non_exhaustive()
    }
}

/// R-tree with i64 coordinates and i128 metrics.
pub type RTreeI64<P> = RTree<i64, P>;

/// R-tree with f64 coordinates and f64 metrics.
pub type RTreeF64<P> = RTree<f64, P>;
