// Copyright 2025 the Laminate Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tolerances and strategy selection.

use core::fmt;
use core::str::FromStr;
use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::boolean;

/// Environment variable consulted when no explicit strategy is configured.
pub const STRATEGY_ENV: &str = "LAMINATE_SUPPORT_STRATEGY";

/// How layer support is decided.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SupportStrategy {
    /// Containment in the bounding box of everything below. Never accepts an
    /// unsupported piece, but rejects pieces over L-shaped coverage.
    #[serde(rename = "AABB")]
    Approximate,
    /// Containment in the true polygon union of what is below.
    #[serde(rename = "PATHOPS")]
    Exact,
}

impl SupportStrategy {
    /// Wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approximate => "AABB",
            Self::Exact => "PATHOPS",
        }
    }
}

impl fmt::Display for SupportStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized strategy name.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown support strategy {0:?}, expected AABB or PATHOPS")]
pub struct UnknownStrategy(pub String);

impl FromStr for SupportStrategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AABB" => Ok(Self::Approximate),
            "PATHOPS" => Ok(Self::Exact),
            _ => Err(UnknownStrategy(s.to_owned())),
        }
    }
}

/// Pick a support strategy.
///
/// Priority is `explicit`, then the environment value, then the build
/// default. Exact is only returned when `backend_available`.
pub fn resolve_strategy(
    explicit: Option<SupportStrategy>,
    env: Option<&str>,
    backend_available: bool,
) -> SupportStrategy {
    let requested = explicit.or_else(|| {
        let raw = env?;
        match raw.parse() {
            Ok(s) => Some(s),
            Err(err) => {
                tracing::warn!(%err, "ignoring {STRATEGY_ENV}");
                None
            }
        }
    });
    match requested {
        Some(SupportStrategy::Exact) if !backend_available => {
            tracing::warn!("exact support requested without a boolean backend, using AABB");
            SupportStrategy::Approximate
        }
        Some(s) => s,
        None if backend_available => SupportStrategy::Exact,
        None => SupportStrategy::Approximate,
    }
}

/// Every tolerance used by validation and snapping, in millimetres.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationConfig {
    /// Slack when testing a piece against the scene rectangle.
    pub scene_epsilon: f64,
    /// Smallest allowed local width or height.
    pub min_piece_size: f64,
    /// Same-layer gaps below this block a commit.
    pub spacing_block: f64,
    /// Same-layer gaps below this (and at least `spacing_block`) warn.
    pub spacing_warn: f64,
    /// Gaps and penetrations at or below this count as touching.
    pub touch_epsilon: f64,
    /// Slack when testing support containment.
    pub support_epsilon: f64,
    /// Halo added around a piece when pre-filtering supporters.
    pub support_halo: f64,
    /// Window margin for neighbor shortlists.
    pub neighbor_margin: f64,
    /// Maximum shortlist length.
    pub neighbor_limit: usize,
    /// Alignment snapping capture distance.
    pub snap_threshold: f64,
    /// Edge collage capture distance; gaps inside `(0, threshold)` close.
    pub collage_threshold: f64,
    /// Rounding absorbed by the collage approach test.
    pub direction_epsilon: f64,
    /// Penetration tolerated during an active resize.
    pub resize_tolerance: f64,
    /// Gap that normalization rounds to.
    pub gap_target: f64,
    /// How far above `gap_target` a gap may be and still be rounded.
    pub gap_window: f64,
    /// Explicit support strategy; overrides the environment.
    pub support_strategy: Option<SupportStrategy>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            scene_epsilon: 0.1,
            min_piece_size: 5.0,
            spacing_block: 1.0,
            spacing_warn: 1.5,
            touch_epsilon: 0.01,
            support_epsilon: 0.1,
            support_halo: 0.5,
            neighbor_margin: 12.0,
            neighbor_limit: 16,
            snap_threshold: 2.0,
            collage_threshold: 1.0,
            direction_epsilon: 0.001,
            resize_tolerance: 0.10,
            gap_target: 1.0,
            gap_window: 0.12,
            support_strategy: None,
        }
    }
}

impl ValidationConfig {
    /// Resolve the support strategy against the process environment.
    pub fn strategy(&self) -> SupportStrategy {
        let env = std::env::var(STRATEGY_ENV).ok();
        resolve_strategy(self.support_strategy, env.as_deref(), boolean::available())
    }

    /// Set an explicit strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: SupportStrategy) -> Self {
        self.support_strategy = Some(strategy);
        self
    }
}

/// Default per-request deadline at the execution boundary.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(10);
