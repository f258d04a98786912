// Copyright 2025 the Laminate Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer support: every piece above the bottom layer must sit on what is below it.

use std::collections::BTreeMap;

use kurbo::Rect;

use crate::boolean::{self, Contour};
use crate::collision::Footprint;
use crate::config::{SupportStrategy, ValidationConfig};
use crate::geometry::{self, group_bounds};
use crate::problem::{Problem, ProblemCode};
use crate::scene::{LayerId, Piece, PieceId, Scene};
use crate::spatial::SceneIndex;

/// Outcome of a support test for one piece.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Support {
    /// Covered by the layers below.
    Supported,
    /// Not covered, or the exact backend failed.
    Unsupported,
    /// No piece exists on any lower layer.
    NothingBelow,
    /// On the bottom layer, or on a layer the scene does not list.
    NotApplicable,
}

/// Uncovered area accepted by the exact test, as a share of the piece's area.
const UNCOVERED_SHARE: f64 = 1e-6;

/// Support checker for one scene and strategy.
///
/// Supporters are grown by `support_epsilon` before the exact test, so a piece
/// may hang past the layers below by at most that distance on any edge.
#[derive(Debug)]
pub struct SupportValidator<'a> {
    scene: &'a Scene,
    index: &'a SceneIndex,
    config: &'a ValidationConfig,
    strategy: SupportStrategy,
    pieces: BTreeMap<PieceId, &'a Piece>,
    layer_order: BTreeMap<LayerId, i32>,
    bottom: Option<i32>,
    // Union box of everything strictly below each stack index.
    below_bounds: BTreeMap<i32, Option<Rect>>,
}

impl<'a> SupportValidator<'a> {
    /// Prepare a checker. `strategy` is used as given.
    pub fn new(
        scene: &'a Scene,
        index: &'a SceneIndex,
        config: &'a ValidationConfig,
        strategy: SupportStrategy,
    ) -> Self {
        let layer_order: BTreeMap<LayerId, i32> =
            scene.layers.iter().map(|l| (l.id, l.index)).collect();
        let below_bounds = layer_order
            .values()
            .map(|&i| (i, group_bounds(scene.pieces_below(i).map(Piece::aabb))))
            .collect();
        Self {
            scene,
            index,
            config,
            strategy,
            pieces: scene.pieces.iter().map(|p| (p.id, p)).collect(),
            layer_order,
            bottom: scene.lowest_layer_index(),
            below_bounds,
        }
    }

    /// Strategy in use.
    pub fn strategy(&self) -> SupportStrategy {
        self.strategy
    }

    /// `unsupported_above` warnings for every piece, in scene order.
    pub fn validate(&self) -> Vec<Problem> {
        self.scene
            .pieces
            .iter()
            .filter_map(|p| self.problem_for(p.id, p.layer_id, &Footprint::of_piece(p)))
            .collect()
    }

    /// Warning for a piece (or candidate) at `footprint`, if it is not supported.
    pub fn problem_for(&self, id: PieceId, layer: LayerId, footprint: &Footprint) -> Option<Problem> {
        let message = match self.check(id, layer, footprint) {
            Support::Supported | Support::NotApplicable => return None,
            Support::Unsupported => format!("Piece {id} is not fully supported by the layers below"),
            Support::NothingBelow => format!("Piece {id} has nothing below it"),
        };
        Some(Problem::warn(ProblemCode::UnsupportedAbove, id, message))
    }

    /// Test a piece (or candidate) at `footprint` on `layer`.
    pub fn check(&self, id: PieceId, layer: LayerId, footprint: &Footprint) -> Support {
        let Some(&level) = self.layer_order.get(&layer) else {
            tracing::warn!(piece = %id, ?layer, "piece on unknown layer, support not checked");
            return Support::NotApplicable;
        };
        let Some(below) = self.below_bounds.get(&level).copied() else {
            return Support::NotApplicable;
        };
        if self.bottom == Some(level) {
            return Support::NotApplicable;
        }
        let Some(below) = below else {
            return Support::NothingBelow;
        };
        match self.strategy {
            SupportStrategy::Approximate => self.check_bounds(footprint, below),
            SupportStrategy::Exact => self.check_exact(id, level, footprint),
        }
    }

    fn check_bounds(&self, footprint: &Footprint, below: Rect) -> Support {
        let eps = self.config.support_epsilon;
        let b = footprint.aabb;
        let inside = b.x0 >= below.x0 - eps
            && b.y0 >= below.y0 - eps
            && b.x1 <= below.x1 + eps
            && b.y1 <= below.y1 + eps;
        if inside { Support::Supported } else { Support::Unsupported }
    }

    fn check_exact(&self, id: PieceId, level: i32, footprint: &Footprint) -> Support {
        let eps = self.config.support_epsilon;
        let halo = self.config.support_halo.max(eps);
        let window = footprint.aabb.inflate(halo, halo);
        let cover: Vec<Contour> = self
            .supporters(level, window)
            .into_iter()
            .map(|p| grown_outline(p, eps))
            .collect();
        if cover.is_empty() {
            return Support::Unsupported;
        }
        match boolean::uncovered_area(&footprint.quad, &cover) {
            Ok(uncovered) => {
                let b = footprint.aabb;
                let limit = UNCOVERED_SHARE * b.area().max(1.0);
                tracing::trace!(piece = %id, uncovered, limit, "exact support");
                if uncovered <= limit {
                    Support::Supported
                } else {
                    Support::Unsupported
                }
            }
            Err(err) => {
                tracing::warn!(piece = %id, %err, "exact support failed, treating as unsupported");
                Support::Unsupported
            }
        }
    }

    /// Pieces strictly below `level` whose box touches `window`.
    fn supporters(&self, level: i32, window: Rect) -> Vec<&'a Piece> {
        let lower = |p: &&'a Piece| self.layer_order.get(&p.layer_id).is_some_and(|i| *i < level);
        if self.index.is_empty() {
            tracing::trace!("scene index empty, scanning for supporters");
            return self
                .scene
                .pieces_below(level)
                .filter(|p| touches(p.aabb(), window))
                .collect();
        }
        self.index
            .cross_layer_query(window)
            .into_iter()
            .filter_map(|id| self.pieces.get(&id).copied())
            .filter(lower)
            .collect()
    }
}

/// World outline of `piece` with every edge pushed out by `by`.
fn grown_outline(piece: &Piece, by: f64) -> Contour {
    let rect = piece.local_rect().inflate(by, by);
    geometry::to_polygon(rect, f64::from(piece.rot.degrees())).to_vec()
}

fn touches(a: Rect, b: Rect) -> bool {
    a.x0 <= b.x1 && b.x0 <= a.x1 && a.y0 <= b.y1 && b.y0 <= a.y1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rotation;

    // Lower layer forms an L: a wide bar along the bottom plus a post on the left.
    fn l_scene(top: Piece) -> Scene {
        Scene::new(200.0, 200.0)
            .with_layer(0, 0)
            .with_layer(1, 1)
            .with_piece(Piece::new(1, 0, 0.0, 50.0, 100.0, 50.0))
            .with_piece(Piece::new(2, 0, 0.0, 0.0, 50.0, 50.0))
            .with_piece(top)
    }

    fn check(scene: &Scene, strategy: SupportStrategy) -> Support {
        let index = SceneIndex::from_scene(scene);
        let cfg = ValidationConfig::default();
        let v = SupportValidator::new(scene, &index, &cfg, strategy);
        let top = scene.pieces.last().unwrap();
        v.check(top.id, top.layer_id, &Footprint::of_piece(top))
    }

    fn on_square(top: Piece) -> Scene {
        Scene::new(200.0, 200.0)
            .with_layer(0, 0)
            .with_layer(1, 1)
            .with_piece(Piece::new(1, 0, 0.0, 0.0, 100.0, 100.0))
            .with_piece(top)
    }

    #[test]
    fn inside_union_box_is_supported_approximately() {
        let s = l_scene(Piece::new(9, 1, 10.0, 60.0, 30.0, 30.0));
        assert_eq!(check(&s, SupportStrategy::Approximate), Support::Supported);
    }

    #[test]
    fn notch_fools_the_box_but_not_the_union() {
        let s = l_scene(Piece::new(9, 1, 60.0, 10.0, 30.0, 30.0));
        assert_eq!(check(&s, SupportStrategy::Approximate), Support::Supported);
        if boolean::available() {
            assert_eq!(check(&s, SupportStrategy::Exact), Support::Unsupported);
        }
    }

    #[test]
    fn bridge_across_both_is_supported_by_both_strategies() {
        let s = l_scene(Piece::new(9, 1, 10.0, 30.0, 30.0, 40.0));
        assert_eq!(check(&s, SupportStrategy::Approximate), Support::Supported);
        if boolean::available() {
            assert_eq!(check(&s, SupportStrategy::Exact), Support::Supported);
        }
    }

    #[test]
    fn overhang_is_unsupported() {
        let s = l_scene(Piece::new(9, 1, 90.0, 60.0, 30.0, 30.0));
        assert_eq!(check(&s, SupportStrategy::Approximate), Support::Unsupported);
        if boolean::available() {
            assert_eq!(check(&s, SupportStrategy::Exact), Support::Unsupported);
        }
    }

    #[test]
    fn exact_tolerance_is_a_distance_not_an_area() {
        if !boolean::available() {
            return;
        }
        let within = on_square(Piece::new(9, 1, 0.0, 0.0, 100.05, 100.0));
        assert_eq!(check(&within, SupportStrategy::Exact), Support::Supported);
        let past = on_square(Piece::new(9, 1, 0.0, 0.0, 100.3, 100.0));
        assert_eq!(check(&past, SupportStrategy::Exact), Support::Unsupported);
        assert_eq!(check(&past, SupportStrategy::Approximate), Support::Unsupported);
    }

    #[test]
    fn large_piece_over_a_corner_hole_is_unsupported() {
        // A 1 m board over two boards that leave a 19 mm square corner open.
        let s = Scene::new(1200.0, 1200.0)
            .with_layer(0, 0)
            .with_layer(1, 1)
            .with_piece(Piece::new(1, 0, 0.0, 0.0, 981.0, 1000.0))
            .with_piece(Piece::new(2, 0, 981.0, 19.0, 19.0, 981.0))
            .with_piece(Piece::new(9, 1, 0.0, 0.0, 1000.0, 1000.0));
        assert_eq!(check(&s, SupportStrategy::Approximate), Support::Supported);
        if boolean::available() {
            assert_eq!(check(&s, SupportStrategy::Exact), Support::Unsupported);
        }
    }

    #[test]
    fn quarter_turned_pieces_use_their_world_outline() {
        if !boolean::available() {
            return;
        }
        // 60 x 20 turned upright: world box 40..60 by 20..80.
        let upright = on_square(Piece::new(9, 1, 20.0, 40.0, 60.0, 20.0).rotated(Rotation::R90));
        assert_eq!(check(&upright, SupportStrategy::Exact), Support::Supported);
        // Flat it would fit; turned it reaches y = 115.
        let tipped = on_square(Piece::new(9, 1, 10.0, 90.0, 40.0, 10.0).rotated(Rotation::R90));
        assert_eq!(check(&tipped, SupportStrategy::Exact), Support::Unsupported);
        // A turned supporter covers its world box, not its local one.
        let s = Scene::new(200.0, 200.0)
            .with_layer(0, 0)
            .with_layer(1, 1)
            .with_piece(Piece::new(1, 0, 25.0, -25.0, 50.0, 150.0).rotated(Rotation::R270))
            .with_piece(Piece::new(9, 1, 0.0, 30.0, 100.0, 40.0));
        assert_eq!(check(&s, SupportStrategy::Exact), Support::Supported);
    }

    #[test]
    fn empty_lower_layers_flag_everything() {
        let s = Scene::new(100.0, 100.0)
            .with_layer(0, 0)
            .with_layer(1, 1)
            .with_piece(Piece::new(1, 1, 0.0, 0.0, 10.0, 10.0))
            .with_piece(Piece::new(2, 1, 20.0, 0.0, 10.0, 10.0));
        let index = SceneIndex::from_scene(&s);
        let cfg = ValidationConfig::default();
        for strategy in [SupportStrategy::Approximate, SupportStrategy::Exact] {
            let problems = SupportValidator::new(&s, &index, &cfg, strategy).validate();
            assert_eq!(problems.len(), 2);
            assert!(problems.iter().all(|p| !p.is_blocking()));
        }
    }

    #[test]
    fn bottom_layer_is_exempt() {
        let s = l_scene(Piece::new(9, 1, 10.0, 60.0, 30.0, 30.0));
        let index = SceneIndex::from_scene(&s);
        let cfg = ValidationConfig::default();
        let v = SupportValidator::new(&s, &index, &cfg, SupportStrategy::Approximate);
        assert!(v.validate().is_empty());
    }

    #[test]
    fn cold_index_still_finds_supporters() {
        let s = l_scene(Piece::new(9, 1, 10.0, 30.0, 30.0, 40.0));
        let index = SceneIndex::new();
        let cfg = ValidationConfig::default();
        let v = SupportValidator::new(&s, &index, &cfg, SupportStrategy::Exact);
        let top = &s.pieces[2];
        let expected = if boolean::available() { Support::Supported } else { Support::Unsupported };
        assert_eq!(v.check(top.id, top.layer_id, &Footprint::of_piece(top)), expected);
    }
}
