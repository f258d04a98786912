// Copyright 2025 the Laminate Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Exact polygon booleans, backed by `i_overlay` when the `exact` feature is on.
//!
//! Contours are closed point lists; a shape is an outer contour followed by
//! its holes. Every operation uses the non-zero fill rule, so inputs should
//! share one winding direction (all [`to_polygon`](crate::geometry::to_polygon)
//! output does).

use kurbo::Point;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::geometry::signed_area;

/// Closed polygon ring.
pub type Contour = Vec<Point>;

/// Outer ring followed by hole rings.
pub type Shape = Vec<Contour>;

/// Boolean operation between a subject and a clip set.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BooleanOp {
    /// Covered by either.
    Union,
    /// Covered by both.
    Intersect,
    /// Covered by the subject but not the clip.
    Difference,
}

/// Whether exact booleans are compiled in.
pub const fn available() -> bool {
    cfg!(feature = "exact")
}

/// Run `op` on two contour sets.
pub fn overlay(subject: &[Contour], clip: &[Contour], op: BooleanOp) -> Result<Vec<Shape>, BackendError> {
    check_finite(subject)?;
    check_finite(clip)?;
    backend::overlay(subject, clip, op)
}

/// Union of every contour.
pub fn union(polygons: &[Contour]) -> Result<Vec<Shape>, BackendError> {
    let Some((first, rest)) = polygons.split_first() else {
        return Ok(Vec::new());
    };
    let shapes = overlay(core::slice::from_ref(first), rest, BooleanOp::Union)?;
    if shapes.is_empty() && polygons.iter().any(|c| signed_area(c).abs() > 0.0) {
        return Err(BackendError::EmptyUnion(polygons.len()));
    }
    Ok(shapes)
}

/// Area of `piece` left uncovered by the union of `cover`.
pub fn uncovered_area(piece: &[Point], cover: &[Contour]) -> Result<f64, BackendError> {
    let rest = overlay(&[piece.to_vec()], cover, BooleanOp::Difference)?;
    Ok(shapes_area(&rest))
}

/// Total area of a shape list, holes subtracted.
pub fn shapes_area(shapes: &[Shape]) -> f64 {
    shapes
        .iter()
        .map(|shape| {
            let mut rings = shape.iter().map(|c| signed_area(c).abs());
            let outer = rings.next().unwrap_or(0.0);
            (outer - rings.sum::<f64>()).max(0.0)
        })
        .sum()
}

fn check_finite(contours: &[Contour]) -> Result<(), BackendError> {
    let finite = contours
        .iter()
        .flatten()
        .all(|p| p.x.is_finite() && p.y.is_finite());
    if finite { Ok(()) } else { Err(BackendError::NonFinite) }
}

#[cfg(feature = "exact")]
mod backend {
    use i_overlay::core::fill_rule::FillRule;
    use i_overlay::core::overlay_rule::OverlayRule;
    use i_overlay::float::single::SingleFloatOverlay;
    use kurbo::Point;

    use super::{BooleanOp, Contour, Shape};
    use crate::error::BackendError;

    pub(super) fn overlay(
        subject: &[Contour],
        clip: &[Contour],
        op: BooleanOp,
    ) -> Result<Vec<Shape>, BackendError> {
        let subject: Vec<Vec<[f64; 2]>> = subject.iter().map(|c| to_raw(c)).collect();
        let clip: Vec<Vec<[f64; 2]>> = clip.iter().map(|c| to_raw(c)).collect();
        let rule = match op {
            BooleanOp::Union => OverlayRule::Union,
            BooleanOp::Intersect => OverlayRule::Intersect,
            BooleanOp::Difference => OverlayRule::Difference,
        };
        let shapes = subject.overlay(&clip, rule, FillRule::NonZero);
        Ok(shapes
            .into_iter()
            .map(|shape| {
                shape
                    .into_iter()
                    .filter(|contour| contour.len() >= 3)
                    .map(|contour| contour.into_iter().map(|[x, y]| Point::new(x, y)).collect())
                    .collect::<Shape>()
            })
            .filter(|shape| !shape.is_empty())
            .collect())
    }

    fn to_raw(contour: &[Point]) -> Vec<[f64; 2]> {
        contour.iter().map(|p| [p.x, p.y]).collect()
    }
}

#[cfg(not(feature = "exact"))]
mod backend {
    use super::{BooleanOp, Contour, Shape};
    use crate::error::BackendError;

    pub(super) fn overlay(
        _subject: &[Contour],
        _clip: &[Contour],
        _op: BooleanOp,
    ) -> Result<Vec<Shape>, BackendError> {
        Err(BackendError::Unavailable)
    }
}

#[cfg(all(test, feature = "exact"))]
mod tests {
    use super::*;
    use crate::geometry::to_polygon;
    use kurbo::Rect;

    fn quad(x0: f64, y0: f64, x1: f64, y1: f64) -> Contour {
        to_polygon(Rect::new(x0, y0, x1, y1), 0.0).to_vec()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn union_of_overlapping_squares() {
        let shapes = union(&[quad(0.0, 0.0, 10.0, 10.0), quad(5.0, 0.0, 15.0, 10.0)]).unwrap();
        assert_eq!(shapes.len(), 1);
        assert!(close(shapes_area(&shapes), 150.0));
    }

    #[test]
    fn difference_leaves_uncovered_part() {
        let piece = quad(0.0, 0.0, 10.0, 10.0);
        let area = uncovered_area(&piece, &[quad(0.0, 0.0, 10.0, 6.0)]).unwrap();
        assert!(close(area, 40.0), "{area}");
        let covered = uncovered_area(&piece, &[quad(-1.0, -1.0, 11.0, 11.0)]).unwrap();
        assert!(close(covered, 0.0), "{covered}");
    }

    #[test]
    fn intersect_two_squares() {
        let shapes = overlay(
            &[quad(0.0, 0.0, 10.0, 10.0)],
            &[quad(5.0, 5.0, 15.0, 15.0)],
            BooleanOp::Intersect,
        )
        .unwrap();
        assert!(close(shapes_area(&shapes), 25.0));
    }

    #[test]
    fn non_finite_input_is_rejected() {
        let bad = vec![Point::new(f64::NAN, 0.0), Point::new(1.0, 0.0), Point::new(1.0, 1.0)];
        assert_eq!(union(&[bad]), Err(BackendError::NonFinite));
    }

    #[test]
    fn empty_union_is_empty() {
        assert_eq!(union(&[]), Ok(Vec::new()));
    }
}
