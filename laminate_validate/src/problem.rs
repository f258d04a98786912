// Copyright 2025 the Laminate Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Problem taxonomy produced by a validation pass.

use serde::{Deserialize, Serialize};

use crate::scene::PieceId;

/// Stable problem codes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemCode {
    /// Two pieces on one layer overlap.
    OverlapSameLayer,
    /// A piece leaves the board.
    OutsideScene,
    /// A piece is narrower or shorter than the minimum.
    MinSizeViolation,
    /// Two pieces on one layer are too close.
    SpacingTooSmall,
    /// A piece is not covered by the layers below.
    UnsupportedAbove,
    /// Piece and material grain disagree. Emitted by material-aware
    /// collaborators; part of the shared taxonomy.
    MaterialOrientationMismatch,
}

/// Whether a problem gates committing.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Advisory.
    Warn,
    /// Blocks commit.
    Block,
}

/// Extra facts about a problem.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemMeta {
    /// The other piece of a pair problem.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_piece_id: Option<PieceId>,
    /// Measured gap or penetration, in mm.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

/// One finding of a validation pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    /// What went wrong.
    pub code: ProblemCode,
    /// Whether it blocks commit.
    pub severity: Severity,
    /// The offending piece.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub piece_id: Option<PieceId>,
    /// Human-readable description.
    pub message: String,
    /// Pair and distance details.
    #[serde(default)]
    pub meta: ProblemMeta,
}

impl Problem {
    /// A blocking problem on `piece`.
    pub fn block(code: ProblemCode, piece: PieceId, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Block, piece, message)
    }

    /// An advisory problem on `piece`.
    pub fn warn(code: ProblemCode, piece: PieceId, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Warn, piece, message)
    }

    fn new(code: ProblemCode, severity: Severity, piece: PieceId, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            piece_id: Some(piece),
            message: message.into(),
            meta: ProblemMeta::default(),
        }
    }

    /// Attach the other piece of a pair.
    #[must_use]
    pub fn with_other(mut self, other: PieceId) -> Self {
        self.meta.other_piece_id = Some(other);
        self
    }

    /// Attach a measured distance.
    #[must_use]
    pub fn with_distance(mut self, distance: f64) -> Self {
        self.meta.distance = Some(distance);
        self
    }

    /// Whether this problem gates commit.
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Block
    }
}

/// True when none of `problems` block.
pub fn can_commit(problems: &[Problem]) -> bool {
    !problems.iter().any(Problem::is_blocking)
}
