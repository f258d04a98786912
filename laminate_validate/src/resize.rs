// Copyright 2025 the Laminate Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Context carried through candidate validation while a resize is in progress.

use std::collections::{BTreeMap, BTreeSet};

use kurbo::Rect;

use crate::config::ValidationConfig;
use crate::geometry::{Edges, to_aabb};
use crate::scene::{Piece, PieceId, Scene};
use crate::spatial::SceneIndex;

/// What an active resize is doing, so candidate checks can tell a neighbor the
/// resize moves towards from one that merely sits beside the moving edge.
#[derive(Clone, Debug, PartialEq)]
pub struct ResizeContext {
    /// Moving edges, in the piece's local frame.
    pub edges: Edges,
    /// Whether the piece is turned a quarter, so local x runs along world y.
    pub quarter_turn: bool,
    /// Penetration and gap accepted as contact.
    pub tolerance: f64,
    /// Gap to each neighbor when the resize started.
    pub baseline_gaps: BTreeMap<PieceId, f64>,
    /// Pieces resized together; never checked against each other.
    pub group: BTreeSet<PieceId>,
}

impl ResizeContext {
    /// A context with no baselines.
    pub fn new(edges: Edges, tolerance: f64) -> Self {
        Self {
            edges,
            quarter_turn: false,
            tolerance,
            baseline_gaps: BTreeMap::new(),
            group: BTreeSet::new(),
        }
    }

    /// Start resizing `piece`: snapshot the gap to every nearby same-layer piece.
    pub fn begin(
        scene: &Scene,
        index: &SceneIndex,
        piece: &Piece,
        edges: Edges,
        config: &ValidationConfig,
    ) -> Self {
        let aabb = piece.aabb();
        let reach = to_aabb(aabb);
        let baseline_gaps = index
            .nearest(
                scene,
                piece.layer_id,
                aabb,
                config.neighbor_margin,
                config.neighbor_limit,
                |id| id == piece.id,
            )
            .into_iter()
            .map(|n| (n.id, reach.gap(&to_aabb(n.aabb()))))
            .collect();
        Self {
            edges,
            quarter_turn: piece.rot.is_quarter_turn(),
            tolerance: config.resize_tolerance,
            baseline_gaps,
            group: BTreeSet::new(),
        }
    }

    /// Add pieces resized together with the subject.
    #[must_use]
    pub fn with_group(mut self, ids: impl IntoIterator<Item = PieceId>) -> Self {
        self.group.extend(ids);
        self
    }

    /// Whether `id` is part of the resized group.
    pub fn is_grouped(&self, id: PieceId) -> bool {
        self.group.contains(&id)
    }

    /// Whether the resize changes the world x extent.
    pub fn moves_world_x(&self) -> bool {
        if self.quarter_turn {
            self.edges.moves_vertically()
        } else {
            self.edges.moves_horizontally()
        }
    }

    /// Whether the resize changes the world y extent.
    pub fn moves_world_y(&self) -> bool {
        if self.quarter_turn {
            self.edges.moves_horizontally()
        } else {
            self.edges.moves_vertically()
        }
    }

    /// Whether `other` sits across an axis the resize does not move.
    pub fn is_orthogonal(&self, subject: Rect, other: Rect) -> bool {
        let overlap_x = subject.x1.min(other.x1) - subject.x0.max(other.x0);
        let overlap_y = subject.y1.min(other.y1) - subject.y0.max(other.y0);
        if overlap_x > 0.0 {
            // Stacked vertically: the gap runs along y.
            !self.moves_world_y()
        } else if overlap_y > 0.0 {
            !self.moves_world_x()
        } else {
            false
        }
    }

    /// Whether a spacing complaint about `other` at `gap` should be dropped.
    ///
    /// Contact within tolerance is fine while resizing, and so is any gap
    /// across an unmoved axis that has not shrunk since the resize began.
    pub fn suppresses_spacing(&self, other: PieceId, subject: Rect, other_rect: Rect, gap: f64) -> bool {
        if gap <= self.tolerance {
            return true;
        }
        if !self.is_orthogonal(subject, other_rect) {
            return false;
        }
        self.baseline_gaps
            .get(&other)
            .is_none_or(|baseline| gap >= baseline - self.tolerance)
    }
}
