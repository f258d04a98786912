// Copyright 2025 the Laminate Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Alignment snapping, edge collage, and gap normalization.
//!
//! All three work on world bounding boxes against a same-layer shortlist and
//! never fail: an unbuilt index degrades to a layer scan, and anything that
//! would introduce overlap is silently skipped.

use kurbo::{Rect, Vec2};
use serde::{Deserialize, Serialize};

use crate::config::ValidationConfig;
use crate::scene::{LayerId, PieceId, Scene};
use crate::spatial::SceneIndex;

/// World axis.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Axis {
    /// Horizontal.
    X,
    /// Vertical.
    Y,
}

/// Guide line to draw while a snap is active.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapGuide {
    /// `X` for a vertical line at `x = position`, `Y` for a horizontal one.
    pub axis: Axis,
    /// Line coordinate.
    pub position: f64,
}

/// Alignment snap result.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snap {
    /// Offset to apply to the candidate.
    pub delta: Vec2,
    /// At most one guide per axis.
    pub guides: Vec<SnapGuide>,
}

/// Align `candidate` with the edges and centers of `neighbors`.
///
/// Per axis, five alignments are tried against each neighbor: start, center,
/// and end to their counterparts, plus each of the candidate's edges meeting
/// the neighbor's opposite edge. Of the offsets within `threshold`, the
/// largest wins, and the later one wins a tie.
pub fn snap_to_pieces(candidate: Rect, neighbors: &[Rect], threshold: f64) -> Snap {
    let mut best_x: Option<(f64, f64)> = None;
    let mut best_y: Option<(f64, f64)> = None;
    for n in neighbors {
        let cc = candidate.center();
        let nc = n.center();
        let xs = [
            (n.x0 - candidate.x0, n.x0),
            (nc.x - cc.x, nc.x),
            (n.x1 - candidate.x1, n.x1),
            (n.x1 - candidate.x0, n.x1),
            (n.x0 - candidate.x1, n.x0),
        ];
        let ys = [
            (n.y0 - candidate.y0, n.y0),
            (nc.y - cc.y, nc.y),
            (n.y1 - candidate.y1, n.y1),
            (n.y1 - candidate.y0, n.y1),
            (n.y0 - candidate.y1, n.y0),
        ];
        keep_largest(&mut best_x, &xs, threshold);
        keep_largest(&mut best_y, &ys, threshold);
    }
    let mut snap = Snap::default();
    if let Some((dx, at)) = best_x {
        snap.delta.x = dx;
        snap.guides.push(SnapGuide {
            axis: Axis::X,
            position: at,
        });
    }
    if let Some((dy, at)) = best_y {
        snap.delta.y = dy;
        snap.guides.push(SnapGuide {
            axis: Axis::Y,
            position: at,
        });
    }
    snap
}

fn keep_largest(best: &mut Option<(f64, f64)>, options: &[(f64, f64)], threshold: f64) {
    for &(delta, at) in options {
        if delta.abs() > threshold {
            continue;
        }
        if best.is_none_or(|(b, _)| delta.abs() >= b.abs()) {
            *best = Some((delta, at));
        }
    }
}

/// Edge collage result.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Collage {
    /// Candidate after the pass; unchanged unless `target` is set.
    pub rect: Rect,
    /// Neighbor the candidate was pushed flush against.
    pub target: Option<PieceId>,
    /// Axis the candidate moved along.
    pub axis: Option<Axis>,
    /// Smallest open facing gap seen before snapping. Feed it back as the
    /// previous gap on the next call to keep the approach test working.
    /// Neighbors already touching the candidate do not count.
    pub nearest_gap: Option<f64>,
}

impl Collage {
    fn unchanged(rect: Rect, nearest_gap: Option<f64>) -> Self {
        Self {
            rect,
            target: None,
            axis: None,
            nearest_gap,
        }
    }

    /// Whether the candidate was moved.
    pub fn snapped(&self) -> bool {
        self.target.is_some()
    }
}

/// A neighbor edge facing the candidate across a gap.
#[derive(Copy, Clone, Debug)]
struct Facing {
    id: PieceId,
    axis: Axis,
    gap: f64,
    shift: f64,
}

fn facing(candidate: Rect, id: PieceId, n: Rect) -> Option<Facing> {
    let overlap_x = candidate.x1.min(n.x1) - candidate.x0.max(n.x0);
    let overlap_y = candidate.y1.min(n.y1) - candidate.y0.max(n.y0);
    if overlap_y > 0.0 {
        let right = n.x0 - candidate.x1;
        let left = candidate.x0 - n.x1;
        if right >= 0.0 {
            return Some(Facing { id, axis: Axis::X, gap: right, shift: right });
        }
        if left >= 0.0 {
            return Some(Facing { id, axis: Axis::X, gap: left, shift: -left });
        }
    } else if overlap_x > 0.0 {
        let below = n.y0 - candidate.y1;
        let above = candidate.y0 - n.y1;
        if below >= 0.0 {
            return Some(Facing { id, axis: Axis::Y, gap: below, shift: below });
        }
        if above >= 0.0 {
            return Some(Facing { id, axis: Axis::Y, gap: above, shift: -above });
        }
    }
    None
}

fn shifted(rect: Rect, axis: Axis, by: f64) -> Rect {
    match axis {
        Axis::X => rect + Vec2::new(by, 0.0),
        Axis::Y => rect + Vec2::new(0.0, by),
    }
}

fn overlaps_any(rect: Rect, neighbors: &[(PieceId, Rect)], slack: f64) -> bool {
    neighbors.iter().any(|(_, n)| {
        let ox = rect.x1.min(n.x1) - rect.x0.max(n.x0);
        let oy = rect.y1.min(n.y1) - rect.y0.max(n.y0);
        ox > slack && oy > slack
    })
}

/// Push `candidate` flush against a neighbor whose facing gap is inside `(0, threshold)`.
///
/// Only open gaps compete for the nearest neighbor, so a piece the candidate
/// already touches never hides one a fraction of a millimeter away.
///
/// With `prev_gap`, a candidate whose gap grew by more than `direction_eps`
/// is receding and is left alone. The snapped box is checked against every
/// neighbor; if it would overlap any of them the candidate is returned as is.
/// The overlap check is box-against-box.
pub fn edge_collage(
    candidate: Rect,
    neighbors: &[(PieceId, Rect)],
    threshold: f64,
    prev_gap: Option<f64>,
    direction_eps: f64,
) -> Collage {
    let nearest = neighbors
        .iter()
        .filter_map(|(id, n)| facing(candidate, *id, *n))
        .filter(|f| f.gap > 0.0)
        .min_by(|a, b| a.gap.total_cmp(&b.gap).then(a.id.cmp(&b.id)));
    let Some(f) = nearest else {
        return Collage::unchanged(candidate, None);
    };
    if f.gap >= threshold {
        return Collage::unchanged(candidate, Some(f.gap));
    }
    if prev_gap.is_some_and(|prev| f.gap > prev + direction_eps) {
        tracing::trace!(gap = f.gap, ?prev_gap, "receding, no collage");
        return Collage::unchanged(candidate, Some(f.gap));
    }
    let rect = shifted(candidate, f.axis, f.shift);
    if overlaps_any(rect, neighbors, 1e-9) {
        tracing::trace!(neighbor = %f.id, "collage would overlap, skipped");
        return Collage::unchanged(candidate, Some(f.gap));
    }
    Collage {
        rect,
        target: Some(f.id),
        axis: Some(f.axis),
        nearest_gap: Some(f.gap),
    }
}

/// Round a facing gap in `(target, target + window]` down to exactly `target`.
///
/// Returns `None` when there is nothing to round, or when rounding would
/// overlap a neighbor or leave `bounds` by more than `bounds_eps`.
pub fn normalize_gap(
    candidate: Rect,
    neighbors: &[(PieceId, Rect)],
    bounds: Rect,
    bounds_eps: f64,
    target: f64,
    window: f64,
) -> Option<Rect> {
    let f = neighbors
        .iter()
        .filter_map(|(id, n)| facing(candidate, *id, *n))
        .filter(|f| f.gap > target)
        .min_by(|a, b| a.gap.total_cmp(&b.gap).then(a.id.cmp(&b.id)))?;
    let excess = f.gap - target;
    if !(excess > 0.0 && excess <= window + 1e-9) {
        return None;
    }
    let rect = shifted(candidate, f.axis, f.shift.signum() * excess);
    let inside = rect.x0 >= bounds.x0 - bounds_eps
        && rect.y0 >= bounds.y0 - bounds_eps
        && rect.x1 <= bounds.x1 + bounds_eps
        && rect.y1 <= bounds.y1 + bounds_eps;
    (inside && !overlaps_any(rect, neighbors, 1e-9)).then_some(rect)
}

/// Which snap passes a drag runs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SnapOptions {
    /// Alignment to neighbor edges and centers.
    pub align: bool,
    /// Edge collage.
    pub collage: bool,
}

impl Default for SnapOptions {
    fn default() -> Self {
        Self {
            align: true,
            collage: true,
        }
    }
}

/// Combined drag snap.
#[derive(Clone, Debug, PartialEq)]
pub struct DragSnap {
    /// Where the candidate ends up.
    pub rect: Rect,
    /// Alignment guides that apply to `rect`.
    pub guides: Vec<SnapGuide>,
    /// Collage outcome, computed on the raw candidate.
    pub collage: Collage,
}

/// Snapping against one scene, with its shortlist and tolerances.
#[derive(Debug, Clone, Copy)]
pub struct SnapEngine<'a> {
    scene: &'a Scene,
    index: &'a SceneIndex,
    config: &'a ValidationConfig,
}

impl<'a> SnapEngine<'a> {
    /// Engine over `scene`.
    pub fn new(scene: &'a Scene, index: &'a SceneIndex, config: &'a ValidationConfig) -> Self {
        Self {
            scene,
            index,
            config,
        }
    }

    /// Closest same-layer boxes around `candidate`, minus `exclude`.
    pub fn shortlist(&self, layer: LayerId, candidate: Rect, exclude: &[PieceId]) -> Vec<(PieceId, Rect)> {
        self.index
            .nearest(
                self.scene,
                layer,
                candidate,
                self.config.neighbor_margin,
                self.config.neighbor_limit,
                |id| exclude.contains(&id),
            )
            .into_iter()
            .map(|p| (p.id, p.aabb()))
            .collect()
    }

    /// Alignment snap for `candidate` (a piece or a group's bounds).
    pub fn align(&self, layer: LayerId, candidate: Rect, exclude: &[PieceId]) -> Snap {
        let rects: Vec<Rect> = self
            .shortlist(layer, candidate, exclude)
            .into_iter()
            .map(|(_, r)| r)
            .collect();
        snap_to_pieces(candidate, &rects, self.config.snap_threshold)
    }

    /// Edge collage for `candidate`.
    pub fn collage(&self, layer: LayerId, candidate: Rect, exclude: &[PieceId], prev_gap: Option<f64>) -> Collage {
        let neighbors = self.shortlist(layer, candidate, exclude);
        edge_collage(
            candidate,
            &neighbors,
            self.config.collage_threshold,
            prev_gap,
            self.config.direction_epsilon,
        )
    }

    /// Gap normalization for `candidate`.
    pub fn normalize(&self, layer: LayerId, candidate: Rect, exclude: &[PieceId]) -> Option<Rect> {
        let neighbors = self.shortlist(layer, candidate, exclude);
        normalize_gap(
            candidate,
            &neighbors,
            self.scene.bounds(),
            self.config.scene_epsilon,
            self.config.gap_target,
            self.config.gap_window,
        )
    }

    /// Run the enabled passes for one drag step.
    ///
    /// Collage sees the raw candidate and owns the axis it moves on;
    /// alignment only applies on the other axis. Turning alignment on or off
    /// therefore never changes the collage outcome.
    pub fn drag(
        &self,
        layer: LayerId,
        candidate: Rect,
        exclude: &[PieceId],
        options: SnapOptions,
        prev_gap: Option<f64>,
    ) -> DragSnap {
        let collage = if options.collage {
            self.collage(layer, candidate, exclude, prev_gap)
        } else {
            Collage::unchanged(candidate, None)
        };
        if !options.align {
            return DragSnap {
                rect: collage.rect,
                guides: Vec::new(),
                collage,
            };
        }
        let snap = self.align(layer, candidate, exclude);
        let mut delta = snap.delta;
        let mut guides = snap.guides;
        match collage.axis {
            Some(Axis::X) => delta.x = 0.0,
            Some(Axis::Y) => delta.y = 0.0,
            None => {}
        }
        if let Some(axis) = collage.axis {
            guides.retain(|g| g.axis != axis);
        }
        DragSnap {
            rect: collage.rect + delta,
            guides,
            collage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Piece;

    #[test]
    fn aligns_left_edges_within_threshold() {
        let c = Rect::new(1.5, 40.0, 21.5, 60.0);
        let n = Rect::new(0.0, 0.0, 20.0, 20.0);
        let s = snap_to_pieces(c, &[n], 2.0);
        // Every matching alignment gives -1.5; the last one found wins.
        assert_eq!(s.delta, Vec2::new(-1.5, 0.0));
        assert_eq!(s.guides, [SnapGuide { axis: Axis::X, position: 20.0 }]);
    }

    #[test]
    fn keeps_largest_offset_inside_threshold() {
        let c = Rect::new(0.0, 0.0, 10.0, 10.0);
        let n1 = Rect::new(0.5, 50.0, 10.5, 60.0);
        let n2 = Rect::new(1.8, 80.0, 11.8, 90.0);
        let s = snap_to_pieces(c, &[n1, n2], 2.0);
        assert!((s.delta.x - 1.8).abs() < 1e-12);
    }

    #[test]
    fn both_axes_can_snap() {
        let c = Rect::new(21.0, 1.0, 31.0, 11.0);
        let n = Rect::new(0.0, 0.0, 20.0, 20.0);
        let s = snap_to_pieces(c, &[n], 2.0);
        assert_eq!(s.delta, Vec2::new(-1.0, -1.0));
        assert_eq!(s.guides.len(), 2);
    }

    #[test]
    fn nothing_in_reach() {
        let s = snap_to_pieces(Rect::new(0.0, 0.0, 10.0, 10.0), &[Rect::new(50.0, 50.0, 53.0, 53.0)], 2.0);
        assert_eq!(s, Snap::default());
    }

    #[test]
    fn collage_closes_small_gap() {
        let c = Rect::new(0.0, 0.0, 10.0, 10.0);
        let n = [(PieceId(2), Rect::new(10.4, 0.0, 20.0, 10.0))];
        let out = edge_collage(c, &n, 1.0, None, 0.001);
        assert_eq!(out.target, Some(PieceId(2)));
        assert!((out.rect.x1 - 10.4).abs() < 1e-12);
        assert_eq!(out.axis, Some(Axis::X));
    }

    #[test]
    fn collage_ignores_receding_and_wide_gaps() {
        let c = Rect::new(0.0, 0.0, 10.0, 10.0);
        let n = [(PieceId(2), Rect::new(10.5, 0.0, 20.0, 10.0))];
        assert!(!edge_collage(c, &n, 1.0, Some(0.3), 0.001).snapped());
        assert!(edge_collage(c, &n, 1.0, Some(0.5), 0.001).snapped());
        let far = [(PieceId(2), Rect::new(11.0, 0.0, 20.0, 10.0))];
        assert!(!edge_collage(c, &far, 1.0, None, 0.001).snapped());
        let touching = [(PieceId(2), Rect::new(10.0, 0.0, 20.0, 10.0))];
        assert!(!edge_collage(c, &touching, 1.0, None, 0.001).snapped());
    }

    #[test]
    fn collage_aborts_on_new_overlap() {
        let c = Rect::new(0.0, 0.0, 10.0, 10.0);
        let n = [
            (PieceId(2), Rect::new(10.5, 0.0, 20.0, 10.0)),
            // Already overlapping; the shifted box still would.
            (PieceId(3), Rect::new(2.0, 2.0, 4.0, 4.0)),
        ];
        let out = edge_collage(c, &n, 1.0, None, 0.001);
        assert!(!out.snapped());
        assert_eq!(out.rect, c);
    }

    #[test]
    fn collage_looks_past_touching_neighbor() {
        let c = Rect::new(0.0, 0.0, 10.0, 10.0);
        let n = [
            // Flush below the candidate.
            (PieceId(2), Rect::new(0.0, 10.0, 10.0, 20.0)),
            (PieceId(3), Rect::new(10.5, 0.0, 20.0, 10.0)),
        ];
        let out = edge_collage(c, &n, 1.0, None, 0.001);
        assert_eq!(out.target, Some(PieceId(3)));
        assert_eq!(out.axis, Some(Axis::X));
        assert_eq!(out.nearest_gap, Some(0.5));
        assert!((out.rect.x1 - 10.5).abs() < 1e-12, "{:?}", out.rect);
        assert_eq!(out.rect.y1, 10.0);

        // The reported gap keeps the approach test usable on the next nudge.
        let next = edge_collage(c, &n, 1.0, out.nearest_gap, 0.001);
        assert!(next.snapped());
    }

    #[test]
    fn collage_closes_vertical_gaps() {
        let c = Rect::new(0.0, 0.0, 10.0, 10.0);
        let below = [(PieceId(2), Rect::new(2.0, 10.3, 12.0, 20.0))];
        let out = edge_collage(c, &below, 1.0, None, 0.001);
        assert_eq!(out.axis, Some(Axis::Y));
        assert!((out.rect.y1 - 10.3).abs() < 1e-12, "{:?}", out.rect);
        assert_eq!(out.rect.x0, 0.0);

        let above = [(PieceId(2), Rect::new(-5.0, -20.0, 5.0, -0.4))];
        let out = edge_collage(c, &above, 1.0, None, 0.001);
        assert_eq!(out.axis, Some(Axis::Y));
        assert!((out.rect.y0 + 0.4).abs() < 1e-12, "{:?}", out.rect);
    }

    #[test]
    fn normalize_rounds_near_target_gap() {
        let c = Rect::new(0.0, 0.0, 10.0, 10.0);
        let n = [(PieceId(2), Rect::new(11.08, 0.0, 20.0, 10.0))];
        let bounds = Rect::new(0.0, 0.0, 100.0, 100.0);
        let r = normalize_gap(c, &n, bounds, 0.1, 1.0, 0.12).unwrap();
        assert!((r.x1 - 10.08).abs() < 1e-9, "{r:?}");
        let wide = [(PieceId(2), Rect::new(11.5, 0.0, 20.0, 10.0))];
        assert!(normalize_gap(c, &wide, bounds, 0.1, 1.0, 0.12).is_none());
    }

    #[test]
    fn normalize_respects_bounds() {
        let c = Rect::new(0.0, 0.0, 10.0, 10.0);
        let n = [(PieceId(2), Rect::new(-11.1, 0.0, -1.1, 10.0))];
        let bounds = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert!(normalize_gap(c, &n, bounds, 0.05, 1.0, 0.12).is_none());
    }

    #[test]
    fn normalize_skips_touching_and_settled_neighbors() {
        let c = Rect::new(0.0, 0.0, 10.0, 10.0);
        let bounds = Rect::new(-50.0, -50.0, 100.0, 100.0);
        let n = [
            (PieceId(2), Rect::new(0.0, 10.0, 10.0, 20.0)),
            // Already at the target gap on the far side.
            (PieceId(3), Rect::new(-11.0, 0.0, -1.0, 10.0)),
            (PieceId(4), Rect::new(11.08, 0.0, 20.0, 10.0)),
        ];
        let r = normalize_gap(c, &n, bounds, 0.1, 1.0, 0.12).unwrap();
        assert!((r.x1 - 10.08).abs() < 1e-9, "{r:?}");
        assert_eq!(r.y0, 0.0);
    }

    #[test]
    fn drag_collage_independent_of_alignment() {
        let scene = Scene::new(300.0, 300.0)
            .with_layer(0, 0)
            .with_piece(Piece::new(1, 0, 0.0, 0.0, 20.0, 20.0))
            .with_piece(Piece::new(2, 0, 20.6, 1.5, 20.0, 20.0))
            .with_piece(Piece::new(3, 0, 60.0, 0.0, 20.0, 20.0));
        let index = SceneIndex::from_scene(&scene);
        let cfg = ValidationConfig::default();
        let engine = SnapEngine::new(&scene, &index, &cfg);
        let candidate = scene.pieces[0].aabb();
        let on = SnapOptions { align: true, collage: true };
        let off = SnapOptions { align: false, collage: true };
        let a = engine.drag(LayerId(0), candidate, &[PieceId(1)], on, Some(0.7));
        let b = engine.drag(LayerId(0), candidate, &[PieceId(1)], off, Some(0.7));
        assert_eq!(a.collage, b.collage);
        assert!(a.collage.snapped());
        assert!((a.rect.x1 - 20.6).abs() < 1e-9);
        // Alignment still works on the free axis.
        assert!((a.rect.y0 - 1.5).abs() < 1e-9, "{:?}", a.rect);
        assert!(a.guides.iter().all(|g| g.axis == Axis::Y));
    }
}
