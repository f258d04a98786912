// Copyright 2025 the Laminate Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Validation passes over a scene, for committed pieces and for candidates.

use std::collections::BTreeSet;

use kurbo::Rect;

use crate::collision::{self, Candidate, Footprint};
use crate::config::{SupportStrategy, ValidationConfig};
use crate::geometry::Rotation;
use crate::problem::{Problem, ProblemCode, Severity};
use crate::resize::ResizeContext;
use crate::scene::{LayerId, Piece, PieceId, Scene};
use crate::spatial::SceneIndex;
use crate::support::SupportValidator;

/// The shape every rule looks at: a committed piece or a candidate.
#[derive(Clone, Debug)]
struct Subject {
    id: PieceId,
    layer: LayerId,
    local: Rect,
    footprint: Footprint,
    joined: bool,
}

impl Subject {
    fn of_piece(p: &Piece) -> Self {
        Self {
            id: p.id,
            layer: p.layer_id,
            local: p.local_rect(),
            footprint: Footprint::of_piece(p),
            joined: p.joined,
        }
    }

    fn of_candidate(c: &Candidate) -> Self {
        Self {
            id: c.piece_id,
            layer: c.layer_id,
            local: c.rect,
            footprint: c.footprint(),
            joined: c.joined,
        }
    }
}

/// Runs every rule against one scene.
#[derive(Debug)]
pub struct Validator<'a> {
    scene: &'a Scene,
    index: &'a SceneIndex,
    config: &'a ValidationConfig,
    strategy: SupportStrategy,
}

impl<'a> Validator<'a> {
    /// Validator with the support strategy resolved from `config` and the environment.
    pub fn new(scene: &'a Scene, index: &'a SceneIndex, config: &'a ValidationConfig) -> Self {
        Self {
            scene,
            index,
            config,
            strategy: config.strategy(),
        }
    }

    /// Override the support strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: SupportStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Support strategy in use.
    pub fn strategy(&self) -> SupportStrategy {
        self.strategy
    }

    /// Overlapping same-layer pairs.
    pub fn overlaps(&self) -> Vec<(PieceId, PieceId)> {
        collision::pairs_in_layer(self.scene, self.index, self.config)
    }

    /// Every problem in the scene.
    ///
    /// Ordered by rule: overlap, scene bounds, minimum size, spacing, support.
    pub fn validate_all(&self) -> Vec<Problem> {
        let mut problems = Vec::new();
        for (a, b) in self.overlaps() {
            if let (Some(pa), Some(pb)) = (self.scene.piece(a), self.scene.piece(b)) {
                let depth = collision::penetration(&Footprint::of_piece(pa), &Footprint::of_piece(pb));
                problems.push(overlap_problem(a, b, depth.unwrap_or(0.0)));
            }
        }
        let subjects: Vec<Subject> = self.scene.pieces.iter().map(Subject::of_piece).collect();
        problems.extend(subjects.iter().filter_map(|s| self.bounds_problem(s)));
        problems.extend(subjects.iter().filter_map(|s| self.min_size_problem(s)));
        let mut seen = BTreeSet::new();
        for s in &subjects {
            for other in self.spacing_neighbors(s, &[], None) {
                let key = if s.id < other.id { (s.id, other.id) } else { (other.id, s.id) };
                if seen.insert(key)
                    && let Some(p) = self.spacing_problem(s, other, None)
                {
                    problems.push(p);
                }
            }
        }
        problems.extend(self.support().validate());
        self.log_pass("scene", &problems);
        problems
    }

    /// Every problem the candidate would have if committed.
    ///
    /// The same rules as [`validate_all`](Self::validate_all), applied to one
    /// piece at its candidate geometry. The rotation is snapped to a quarter
    /// turn first. Pieces in `exclude` and the resize group are ignored.
    pub fn validate_candidate(
        &self,
        candidate: &Candidate,
        exclude: &[PieceId],
        resize: Option<&ResizeContext>,
    ) -> Vec<Problem> {
        let committed = candidate
            .clone()
            .with_degrees(f64::from(Rotation::from_degrees(candidate.degrees).degrees()));
        let subject = Subject::of_candidate(&committed);
        let mut problems = Vec::new();

        let hits = collision::candidate_collisions(
            self.scene,
            self.index,
            &committed,
            exclude,
            resize,
            self.config,
        );
        for other in hits.colliding_ids {
            let depth = self
                .scene
                .piece(other)
                .and_then(|p| collision::penetration(&subject.footprint, &Footprint::of_piece(p)));
            problems.push(overlap_problem(subject.id, other, depth.unwrap_or(0.0)));
        }
        problems.extend(self.bounds_problem(&subject));
        problems.extend(self.min_size_problem(&subject));
        for other in self.spacing_neighbors(&subject, exclude, resize) {
            problems.extend(self.spacing_problem(&subject, other, resize));
        }
        problems.extend(
            self.support()
                .problem_for(subject.id, subject.layer, &subject.footprint),
        );
        self.log_pass("candidate", &problems);
        problems
    }

    fn support(&self) -> SupportValidator<'a> {
        SupportValidator::new(self.scene, self.index, self.config, self.strategy)
    }

    fn bounds_problem(&self, s: &Subject) -> Option<Problem> {
        let eps = self.config.scene_epsilon;
        let b = s.footprint.aabb;
        let bounds = self.scene.bounds();
        let inside = b.x0 >= bounds.x0 - eps
            && b.y0 >= bounds.y0 - eps
            && b.x1 <= bounds.x1 + eps
            && b.y1 <= bounds.y1 + eps;
        (!inside).then(|| {
            Problem::block(
                ProblemCode::OutsideScene,
                s.id,
                format!("Piece {} extends outside the board", s.id),
            )
        })
    }

    fn min_size_problem(&self, s: &Subject) -> Option<Problem> {
        let min = self.config.min_piece_size;
        let (w, h) = (s.local.width(), s.local.height());
        (w < min || h < min).then(|| {
            Problem::block(
                ProblemCode::MinSizeViolation,
                s.id,
                format!("Piece {} is {w:.1} × {h:.1} mm; both sides must be at least {min} mm", s.id),
            )
            .with_distance(w.min(h))
        })
    }

    fn spacing_neighbors(
        &self,
        s: &Subject,
        exclude: &[PieceId],
        resize: Option<&ResizeContext>,
    ) -> Vec<&'a Piece> {
        let reach = self.config.spacing_warn;
        self.index.shortlist(
            self.scene,
            s.layer,
            s.footprint.aabb.inflate(reach, reach),
            |id| id == s.id || exclude.contains(&id) || resize.is_some_and(|r| r.is_grouped(id)),
        )
    }

    fn spacing_problem(&self, s: &Subject, other: &Piece, resize: Option<&ResizeContext>) -> Option<Problem> {
        if s.joined || other.joined {
            return None;
        }
        let theirs = Footprint::of_piece(other);
        let gap = collision::gap(&s.footprint, &theirs);
        if gap <= self.config.touch_epsilon {
            return None;
        }
        if resize.is_some_and(|r| r.suppresses_spacing(other.id, s.footprint.aabb, theirs.aabb, gap)) {
            return None;
        }
        let severity = if gap < self.config.spacing_block {
            Severity::Block
        } else if gap < self.config.spacing_warn {
            Severity::Warn
        } else {
            return None;
        };
        let limit = match severity {
            Severity::Block => self.config.spacing_block,
            Severity::Warn => self.config.spacing_warn,
        };
        let message = format!(
            "Pieces {} and {} are {gap:.2} mm apart (minimum {limit} mm)",
            s.id, other.id
        );
        let problem = match severity {
            Severity::Block => Problem::block(ProblemCode::SpacingTooSmall, s.id, message),
            Severity::Warn => Problem::warn(ProblemCode::SpacingTooSmall, s.id, message),
        };
        Some(problem.with_other(other.id).with_distance(gap))
    }

    fn log_pass(&self, pass: &'static str, problems: &[Problem]) {
        let blocking = problems.iter().filter(|p| p.is_blocking()).count();
        tracing::debug!(
            pass,
            pieces = self.scene.pieces.len(),
            problems = problems.len(),
            blocking,
            strategy = %self.strategy,
            "validation pass"
        );
    }
}

fn overlap_problem(a: PieceId, b: PieceId, depth: f64) -> Problem {
    Problem::block(
        ProblemCode::OverlapSameLayer,
        a,
        format!("Pieces {a} and {b} overlap on the same layer"),
    )
    .with_other(b)
    .with_distance(depth)
}

/// Validate a whole scene with the configured strategy.
pub fn validate_all(scene: &Scene, index: &SceneIndex, config: &ValidationConfig) -> Vec<Problem> {
    Validator::new(scene, index, config).validate_all()
}

/// Validate one candidate placement with the configured strategy.
pub fn validate_candidate(
    scene: &Scene,
    index: &SceneIndex,
    config: &ValidationConfig,
    candidate: &Candidate,
    exclude: &[PieceId],
    resize: Option<&ResizeContext>,
) -> Vec<Problem> {
    Validator::new(scene, index, config).validate_candidate(candidate, exclude, resize)
}
