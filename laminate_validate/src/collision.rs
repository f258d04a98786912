// Copyright 2025 the Laminate Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Same-layer collision detection: index broad phase, separating-axis narrow phase.

use std::collections::BTreeSet;

use kurbo::{Line, ParamCurveNearest, Point, Rect, Vec2};
use serde::{Deserialize, Serialize};

use crate::config::ValidationConfig;
use crate::geometry::{self, Quad, Rotation};
use crate::resize::ResizeContext;
use crate::scene::{LayerId, Piece, PieceId, Scene};
use crate::spatial::SceneIndex;

/// World-space outline of a piece or candidate.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Footprint {
    /// Bounds.
    pub aabb: Rect,
    /// Corners.
    pub quad: Quad,
    axis_aligned: bool,
}

impl Footprint {
    /// Outline of `rect` rotated by `degrees` about its center.
    pub fn new(rect: Rect, degrees: f64) -> Self {
        let quad = geometry::to_polygon(rect, degrees);
        let axis_aligned = (degrees / 90.0).fract().abs() < 1e-9;
        let aabb = if axis_aligned {
            geometry::rotated_aabb(rect, Rotation::from_degrees(degrees))
        } else {
            geometry::polygon_aabb(&quad)
        };
        Self {
            aabb,
            quad,
            axis_aligned,
        }
    }

    /// Outline of a committed piece.
    pub fn of_piece(piece: &Piece) -> Self {
        Self::new(piece.local_rect(), f64::from(piece.rot.degrees()))
    }

    /// Whether the outline is its own bounding box.
    pub fn is_axis_aligned(&self) -> bool {
        self.axis_aligned
    }
}

/// Penetration depth of two outlines, or `None` when they are apart or only touch.
///
/// Axis-aligned pairs reduce to interval overlap; anything rotated goes
/// through the separating-axis test on both outlines' edge normals.
pub fn penetration(a: &Footprint, b: &Footprint) -> Option<f64> {
    if a.axis_aligned && b.axis_aligned {
        let ox = a.aabb.x1.min(b.aabb.x1) - a.aabb.x0.max(b.aabb.x0);
        let oy = a.aabb.y1.min(b.aabb.y1) - a.aabb.y0.max(b.aabb.y0);
        return (ox > 0.0 && oy > 0.0).then(|| ox.min(oy));
    }
    let mut depth = f64::INFINITY;
    for axis in edge_normals(&a.quad).into_iter().chain(edge_normals(&b.quad)).flatten() {
        let (min_a, max_a) = project(&a.quad, axis);
        let (min_b, max_b) = project(&b.quad, axis);
        let overlap = max_a.min(max_b) - min_a.max(min_b);
        if overlap <= 0.0 {
            return None;
        }
        depth = depth.min(overlap);
    }
    depth.is_finite().then_some(depth)
}

/// True when the outlines overlap by more than `tolerance`.
pub fn collides(a: &Footprint, b: &Footprint, tolerance: f64) -> bool {
    penetration(a, b).is_some_and(|d| d > tolerance)
}

/// Edge-to-edge distance between two outlines; zero when they touch or overlap.
pub fn gap(a: &Footprint, b: &Footprint) -> f64 {
    if a.axis_aligned && b.axis_aligned {
        return geometry::to_aabb(a.aabb).gap(&geometry::to_aabb(b.aabb));
    }
    if penetration(a, b).is_some() {
        return 0.0;
    }
    let mut best = f64::INFINITY;
    for (points, edges) in [(&a.quad, &b.quad), (&b.quad, &a.quad)] {
        for p in points {
            for i in 0..4 {
                let edge = Line::new(edges[i], edges[(i + 1) % 4]);
                best = best.min(edge.nearest(*p, 1e-9).distance_sq);
            }
        }
    }
    best.sqrt()
}

fn edge_normals(quad: &Quad) -> [Option<Vec2>; 2] {
    // Opposite edges are parallel, so two normals cover a rectangle.
    [0, 1].map(|i| {
        let e = quad[i + 1] - quad[i];
        let len = e.hypot();
        (len > 0.0).then(|| Vec2::new(-e.y / len, e.x / len))
    })
}

fn project(quad: &Quad, axis: Vec2) -> (f64, f64) {
    quad.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p: &Point| {
        let d = p.to_vec2().dot(axis);
        (lo.min(d), hi.max(d))
    })
}

/// Every overlapping same-layer pair in `scene`, each unordered pair once.
///
/// Pairs come out as `(smaller id, larger id)` in scene order of first sighting.
pub fn pairs_in_layer(scene: &Scene, index: &SceneIndex, config: &ValidationConfig) -> Vec<(PieceId, PieceId)> {
    let mut seen = BTreeSet::new();
    let mut pairs = Vec::new();
    for a in &scene.pieces {
        let fa = Footprint::of_piece(a);
        for b in index.shortlist(scene, a.layer_id, fa.aabb, |id| id == a.id) {
            let key = if a.id < b.id { (a.id, b.id) } else { (b.id, a.id) };
            if !seen.insert(key) {
                continue;
            }
            if collides(&fa, &Footprint::of_piece(b), config.touch_epsilon) {
                pairs.push(key);
            }
        }
    }
    pairs
}

/// A not-yet-committed placement of a piece.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    /// Piece being moved or resized.
    pub piece_id: PieceId,
    /// Layer it lands on.
    pub layer_id: LayerId,
    /// Local box, before rotation.
    pub rect: Rect,
    /// Rotation in degrees; may be non-cardinal during a rotation preview.
    pub degrees: f64,
    /// Whether the piece is marked as joined.
    pub joined: bool,
}

impl Candidate {
    /// The piece where it is now.
    pub fn from_piece(piece: &Piece) -> Self {
        Self {
            piece_id: piece.id,
            layer_id: piece.layer_id,
            rect: piece.local_rect(),
            degrees: f64::from(piece.rot.degrees()),
            joined: piece.joined,
        }
    }

    /// The piece with its local box replaced.
    pub fn moved(piece: &Piece, rect: Rect) -> Self {
        Self {
            rect,
            ..Self::from_piece(piece)
        }
    }

    /// Replace the rotation.
    #[must_use]
    pub fn with_degrees(mut self, degrees: f64) -> Self {
        self.degrees = degrees;
        self
    }

    /// World outline.
    pub fn footprint(&self) -> Footprint {
        Footprint::new(self.rect, self.degrees)
    }
}

/// Result of a candidate collision query.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateCollisions {
    /// Whether anything overlaps.
    pub overlap: bool,
    /// Overlapping pieces, in scene order.
    pub colliding_ids: Vec<PieceId>,
}

/// Same-layer pieces a candidate would overlap.
///
/// Pieces in `exclude`, the candidate's own committed copy, and members of
/// the resize group are never reported. With a resize context, penetration
/// up to its tolerance counts as contact.
pub fn candidate_collisions(
    scene: &Scene,
    index: &SceneIndex,
    candidate: &Candidate,
    exclude: &[PieceId],
    resize: Option<&ResizeContext>,
    config: &ValidationConfig,
) -> CandidateCollisions {
    let footprint = candidate.footprint();
    let tolerance = resize.map_or(config.touch_epsilon, |r| r.tolerance.max(config.touch_epsilon));
    let skip = |id: PieceId| {
        id == candidate.piece_id
            || exclude.contains(&id)
            || resize.is_some_and(|r| r.is_grouped(id))
    };
    let colliding_ids: Vec<PieceId> = index
        .shortlist(scene, candidate.layer_id, footprint.aabb, skip)
        .into_iter()
        .filter(|other| collides(&footprint, &Footprint::of_piece(other), tolerance))
        .map(|other| other.id)
        .collect();
    CandidateCollisions {
        overlap: !colliding_ids.is_empty(),
        colliding_ids,
    }
}
