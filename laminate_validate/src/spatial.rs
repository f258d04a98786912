// Copyright 2025 the Laminate Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene-level spatial index: per-layer trees plus the global auto-enabling index.

use std::time::{Duration, Instant};

use kurbo::Rect;
use laminate_index::{AutoEnable, Damage, GlobalIndex, IndexMode, LayeredIndex};

use crate::geometry::to_aabb;
use crate::scene::{LayerId, Piece, PieceId, Scene};

/// Owned index over one scene's pieces.
///
/// Kept in sync by explicit [`upsert_piece`](Self::upsert_piece) and
/// [`remove_piece`](Self::remove_piece) calls; it never watches the scene.
#[derive(Debug)]
pub struct SceneIndex {
    layers: LayeredIndex<LayerId, PieceId>,
    global: GlobalIndex<PieceId>,
    epoch: Instant,
}

impl Default for SceneIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneIndex {
    /// Empty index with the default auto-enable policy.
    pub fn new() -> Self {
        Self::with_policy(AutoEnable::default())
    }

    /// Empty index with a custom auto-enable policy.
    pub fn with_policy(policy: AutoEnable) -> Self {
        let mut global = GlobalIndex::new(policy);
        global.set_observer(|mode, count| {
            tracing::debug!(?mode, count, "global index mode changed");
        });
        Self {
            layers: LayeredIndex::new(),
            global,
            epoch: Instant::now(),
        }
    }

    /// Index built from every piece of `scene`.
    pub fn from_scene(scene: &Scene) -> Self {
        let mut index = Self::new();
        index.load_scene(scene);
        index
    }

    /// Replace the index contents with `scene`'s pieces, one bulk load per layer.
    pub fn load_scene(&mut self, scene: &Scene) {
        self.layers.clear();
        let mut layer_ids: Vec<LayerId> = scene.pieces.iter().map(|p| p.layer_id).collect();
        layer_ids.sort_unstable();
        layer_ids.dedup();
        for layer in layer_ids {
            self.layers.load(
                layer,
                scene.pieces_on(layer).map(|p| (p.id, to_aabb(p.aabb()))),
            );
        }
        self.global
            .load(scene.pieces.iter().map(|p| (p.id, to_aabb(p.aabb()))));
        tracing::debug!(
            pieces = scene.pieces.len(),
            mode = ?self.global.mode(),
            "scene index rebuilt"
        );
    }

    /// Insert or relocate a piece.
    pub fn upsert_piece(&mut self, piece: &Piece) {
        let aabb = to_aabb(piece.aabb());
        self.layers.upsert(piece.id, piece.layer_id, aabb);
        let now = self.now();
        self.global.upsert(piece.id, aabb, now);
    }

    /// Forget a piece. Returns whether it was indexed.
    pub fn remove_piece(&mut self, id: PieceId) -> bool {
        let now = self.now();
        self.global.remove(id, now);
        self.layers.remove(id)
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.layers.clear();
        self.global.clear();
    }

    /// Let the global index apply edits whose debounce window has passed.
    pub fn tick(&mut self, now: Instant) -> Option<Damage<f64>> {
        let now = now.saturating_duration_since(self.epoch);
        self.global.tick(now)
    }

    /// Apply pending global edits immediately.
    pub fn flush(&mut self) -> Option<Damage<f64>> {
        self.global.flush()
    }

    /// Current global query path.
    pub fn global_mode(&self) -> IndexMode {
        self.global.mode()
    }

    /// Number of indexed pieces.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// True when nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Ids on `layer` whose stored box touches `window`. Empty when the layer is unknown.
    pub fn query(&self, layer: LayerId, window: Rect) -> Vec<PieceId> {
        self.layers.query(layer, to_aabb(window))
    }

    /// Closest same-layer ids within `margin` of `id`'s stored box.
    pub fn neighbors(&self, id: PieceId, margin: f64, limit: usize) -> Vec<PieceId> {
        self.layers.neighbors(id, margin, limit)
    }

    /// Ids on any layer whose stored box touches `window`.
    pub fn cross_layer_query(&self, window: Rect) -> Vec<PieceId> {
        self.global.query(to_aabb(window))
    }

    /// Same-layer pieces whose box touches `window`, in scene order.
    ///
    /// Falls back to every piece on `layer` when the index has nothing, so an
    /// unbuilt index costs a scan rather than hiding neighbors. Pieces for
    /// which `skip` returns true are left out.
    pub fn shortlist<'s>(
        &self,
        scene: &'s Scene,
        layer: LayerId,
        window: Rect,
        skip: impl Fn(PieceId) -> bool,
    ) -> Vec<&'s Piece> {
        let hits = self.query(layer, window);
        if hits.is_empty() {
            tracing::trace!(?layer, "empty shortlist, scanning layer");
            return scene
                .pieces_on(layer)
                .filter(|p| !skip(p.id))
                .collect();
        }
        scene
            .pieces_on(layer)
            .filter(|p| hits.contains(&p.id) && !skip(p.id))
            .collect()
    }

    /// Same-layer pieces near `window`, closest first, cut to `limit`.
    pub fn nearest<'s>(
        &self,
        scene: &'s Scene,
        layer: LayerId,
        window: Rect,
        margin: f64,
        limit: usize,
        skip: impl Fn(PieceId) -> bool,
    ) -> Vec<&'s Piece> {
        let query = window.inflate(margin, margin);
        let reach = to_aabb(window);
        let mut found: Vec<(f64, &Piece)> = self
            .shortlist(scene, layer, query, skip)
            .into_iter()
            .map(|p| (reach.gap(&to_aabb(p.aabb())), p))
            .filter(|(gap, _)| *gap <= margin)
            .collect();
        found.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.id.cmp(&b.1.id)));
        found.truncate(limit);
        found.into_iter().map(|(_, p)| p).collect()
    }

    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene() -> Scene {
        Scene::new(500.0, 500.0)
            .with_layer(0, 0)
            .with_layer(1, 1)
            .with_piece(Piece::new(1, 0, 0.0, 0.0, 10.0, 10.0))
            .with_piece(Piece::new(2, 0, 11.0, 0.0, 10.0, 10.0))
            .with_piece(Piece::new(3, 0, 100.0, 0.0, 10.0, 10.0))
            .with_piece(Piece::new(4, 1, 0.0, 0.0, 10.0, 10.0))
    }

    #[test]
    fn shortlist_is_same_layer() {
        let s = scene();
        let idx = SceneIndex::from_scene(&s);
        let ids: Vec<_> = idx
            .shortlist(&s, LayerId(0), Rect::new(0.0, 0.0, 12.0, 10.0), |id| id == PieceId(1))
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, [PieceId(2)]);
        assert_eq!(idx.cross_layer_query(Rect::new(0.0, 0.0, 1.0, 1.0)).len(), 2);
    }

    #[test]
    fn unbuilt_index_falls_back_to_scan() {
        let s = scene();
        let idx = SceneIndex::new();
        let ids: Vec<_> = idx
            .shortlist(&s, LayerId(0), Rect::new(0.0, 0.0, 1.0, 1.0), |_| false)
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, [PieceId(1), PieceId(2), PieceId(3)]);
    }

    #[test]
    fn nearest_orders_by_gap() {
        let s = scene();
        let idx = SceneIndex::from_scene(&s);
        let got: Vec<_> = idx
            .nearest(&s, LayerId(0), Rect::new(0.0, 0.0, 10.0, 10.0), 200.0, 16, |id| {
                id == PieceId(1)
            })
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(got, [PieceId(2), PieceId(3)]);
    }

    #[test]
    fn upsert_and_remove_follow_pieces() {
        let mut s = scene();
        let mut idx = SceneIndex::from_scene(&s);
        s.pieces[2].x = 12.0;
        s.pieces[2].y = 15.0;
        idx.upsert_piece(&s.pieces[2]);
        assert_eq!(idx.neighbors(PieceId(3), 12.0, 16), [PieceId(2), PieceId(1)]);
        assert!(idx.remove_piece(PieceId(3)));
        assert!(!idx.remove_piece(PieceId(3)));
        assert_eq!(idx.len(), 3);
        let _ = idx.tick(Instant::now() + Duration::from_secs(1));
        assert!(idx.cross_layer_query(Rect::new(12.0, 15.0, 13.0, 16.0)).is_empty());
    }
}
