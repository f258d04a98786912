// Copyright 2025 the Laminate Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Geometry kernel: rotated bounds, rectangle polygons, and resize math.
//!
//! Everything here is pure. Rectangles are the local, pre-rotation box of a
//! piece; rotation always turns about the rectangle's center.

use bitflags::bitflags;
use kurbo::{Affine, Point, Rect, Vec2};
use laminate_index::Aabb2D;
use serde::{Deserialize, Serialize};

use crate::error::InvalidRotation;

/// Four corners of a (possibly rotated) rectangle, in a consistent winding.
pub type Quad = [Point; 4];

/// Committed piece rotation. Only the four cardinal angles are valid.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Rotation {
    /// 0°
    #[default]
    R0,
    /// 90°
    R90,
    /// 180°
    R180,
    /// 270°
    R270,
}

impl Rotation {
    /// Angle in degrees, in `0..360`.
    pub const fn degrees(self) -> i32 {
        match self {
            Self::R0 => 0,
            Self::R90 => 90,
            Self::R180 => 180,
            Self::R270 => 270,
        }
    }

    /// Snap an arbitrary angle to the nearest cardinal rotation.
    pub fn from_degrees(degrees: f64) -> Self {
        let quarter = (degrees / 90.0).round().rem_euclid(4.0);
        match quarter as u8 {
            1 => Self::R90,
            2 => Self::R180,
            3 => Self::R270,
            _ => Self::R0,
        }
    }

    /// Rotate a further 90°.
    pub const fn rotate_cw(self) -> Self {
        match self {
            Self::R0 => Self::R90,
            Self::R90 => Self::R180,
            Self::R180 => Self::R270,
            Self::R270 => Self::R0,
        }
    }

    /// Rotate back 90°.
    pub const fn rotate_ccw(self) -> Self {
        match self {
            Self::R0 => Self::R270,
            Self::R90 => Self::R0,
            Self::R180 => Self::R90,
            Self::R270 => Self::R180,
        }
    }

    /// Whether width and height trade places.
    pub const fn is_quarter_turn(self) -> bool {
        matches!(self, Self::R90 | Self::R270)
    }
}

impl TryFrom<i32> for Rotation {
    type Error = InvalidRotation;

    fn try_from(degrees: i32) -> Result<Self, Self::Error> {
        match degrees.rem_euclid(360) {
            0 => Ok(Self::R0),
            90 => Ok(Self::R90),
            180 => Ok(Self::R180),
            270 => Ok(Self::R270),
            _ => Err(InvalidRotation(degrees)),
        }
    }
}

impl From<Rotation> for i32 {
    fn from(r: Rotation) -> Self {
        r.degrees()
    }
}

/// Bounds of `rect` after a cardinal rotation about its center.
pub fn rotated_aabb(rect: Rect, rot: Rotation) -> Rect {
    if rot.is_quarter_turn() {
        Rect::from_center_size(rect.center(), (rect.height(), rect.width()))
    } else {
        rect
    }
}

/// Bounds of `rect` after rotating by an arbitrary angle about its center.
///
/// Only used for live rotation previews; committed pieces use [`rotated_aabb`].
pub fn rotated_aabb_degrees(rect: Rect, degrees: f64) -> Rect {
    if let Some(rot) = cardinal(degrees) {
        return rotated_aabb(rect, rot);
    }
    let (sin, cos) = degrees.to_radians().sin_cos();
    let (w, h) = (rect.width(), rect.height());
    let bw = w * cos.abs() + h * sin.abs();
    let bh = w * sin.abs() + h * cos.abs();
    Rect::from_center_size(rect.center(), (bw, bh))
}

/// Corners of `rect` rotated by `degrees` about its center.
///
/// The unrotated order is top-left, top-right, bottom-right, bottom-left.
pub fn to_polygon(rect: Rect, degrees: f64) -> Quad {
    let corners = [
        Point::new(rect.x0, rect.y0),
        Point::new(rect.x1, rect.y0),
        Point::new(rect.x1, rect.y1),
        Point::new(rect.x0, rect.y1),
    ];
    if cardinal(degrees) == Some(Rotation::R0) {
        return corners;
    }
    let t = Affine::rotate_about(degrees.to_radians(), rect.center());
    let mut quad = corners.map(|p| t * p);
    // Quarter turns land exactly on the swapped box; remove trig noise.
    if let Some(rot) = cardinal(degrees) {
        let b = rotated_aabb(rect, rot);
        for p in &mut quad {
            p.x = nearest_of(p.x, b.x0, b.x1);
            p.y = nearest_of(p.y, b.y0, b.y1);
        }
    }
    quad
}

/// Bounds of a point list. An empty list gives the zero box at the origin.
pub fn polygon_aabb(points: &[Point]) -> Rect {
    let Some((first, rest)) = points.split_first() else {
        return Rect::ZERO;
    };
    rest.iter()
        .fold(Rect::from_points(*first, *first), |r, p| r.union_pt(*p))
}

/// Shoelace area of a closed contour; positive for counter-clockwise in y-up.
pub fn signed_area(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let twice: f64 = (0..n)
        .map(|i| {
            let (a, b) = (points[i], points[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum();
    0.5 * twice
}

/// Bounds of several rectangles, e.g. a dragged group. `None` when empty.
pub fn group_bounds(rects: impl IntoIterator<Item = Rect>) -> Option<Rect> {
    rects.into_iter().reduce(|a, b| a.union(b))
}

/// Convert a kurbo rectangle into the index's box type.
pub fn to_aabb(r: Rect) -> Aabb2D<f64> {
    Aabb2D::new(r.x0, r.y0, r.x1, r.y1)
}

fn cardinal(degrees: f64) -> Option<Rotation> {
    let quarters = degrees / 90.0;
    ((quarters - quarters.round()).abs() < 1e-9).then(|| Rotation::from_degrees(degrees))
}

fn nearest_of(v: f64, a: f64, b: f64) -> f64 {
    if (v - a).abs() <= (v - b).abs() { a } else { b }
}

bitflags! {
    /// Edges of a piece that a resize handle moves. Corner handles set two bits.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Edges: u8 {
        /// Local minimum-x edge.
        const LEFT   = 0b0001;
        /// Local maximum-x edge.
        const RIGHT  = 0b0010;
        /// Local minimum-y edge.
        const TOP    = 0b0100;
        /// Local maximum-y edge.
        const BOTTOM = 0b1000;
    }
}

impl Edges {
    /// Whether any moving edge changes the local width.
    pub fn moves_horizontally(self) -> bool {
        self.intersects(Self::LEFT | Self::RIGHT)
    }

    /// Whether any moving edge changes the local height.
    pub fn moves_vertically(self) -> bool {
        self.intersects(Self::TOP | Self::BOTTOM)
    }

    /// A corner handle: one horizontal and one vertical edge.
    pub fn is_corner(self) -> bool {
        self.moves_horizontally() && self.moves_vertically()
    }
}

/// Local (un-rotated) frame of a rectangle rotated about its center.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LocalFrame {
    /// Rotation center in world space.
    pub center: Point,
    /// Rotation in radians.
    pub angle: f64,
}

impl LocalFrame {
    /// Frame of `rect` rotated by `degrees`.
    pub fn new(rect: Rect, degrees: f64) -> Self {
        Self {
            center: rect.center(),
            angle: degrees.to_radians(),
        }
    }

    /// Express a world-space displacement along the local axes.
    pub fn world_delta_to_local(&self, delta: Vec2) -> Vec2 {
        Affine::rotate(-self.angle) * delta.to_point() - Point::ORIGIN
    }

    /// Express a local displacement in world space.
    pub fn local_delta_to_world(&self, delta: Vec2) -> Vec2 {
        Affine::rotate(self.angle) * delta.to_point() - Point::ORIGIN
    }
}

/// Resize `rect` (rotated by `degrees`) by dragging the `handle` edges by `world_delta`.
///
/// Edge handles change the local dimension they face no matter how the piece
/// is rotated on screen; the opposite edge stays put in world space. Corner
/// handles on a rotated piece scale both axes by the same factor. Sizes
/// never go below zero.
pub fn apply_local_resize(rect: Rect, degrees: f64, handle: Edges, world_delta: Vec2) -> Rect {
    let frame = LocalFrame::new(rect, degrees);
    let d = frame.world_delta_to_local(world_delta);
    let (w, h) = (rect.width(), rect.height());

    let mut new_w = w;
    if handle.contains(Edges::RIGHT) {
        new_w += d.x;
    } else if handle.contains(Edges::LEFT) {
        new_w -= d.x;
    }
    let mut new_h = h;
    if handle.contains(Edges::BOTTOM) {
        new_h += d.y;
    } else if handle.contains(Edges::TOP) {
        new_h -= d.y;
    }
    new_w = new_w.max(0.0);
    new_h = new_h.max(0.0);

    let rotated = cardinal(degrees) != Some(Rotation::R0);
    if handle.is_corner() && rotated && w > 0.0 && h > 0.0 {
        let (sx, sy) = (new_w / w, new_h / h);
        let s = if (sx - 1.0).abs() >= (sy - 1.0).abs() { sx } else { sy };
        new_w = w * s;
        new_h = h * s;
    }

    // Shift the center by half the growth towards the moving edges.
    let dir_x = if handle.contains(Edges::RIGHT) {
        1.0
    } else if handle.contains(Edges::LEFT) {
        -1.0
    } else {
        0.0
    };
    let dir_y = if handle.contains(Edges::BOTTOM) {
        1.0
    } else if handle.contains(Edges::TOP) {
        -1.0
    } else {
        0.0
    };
    let local_shift = Vec2::new(dir_x * (new_w - w) * 0.5, dir_y * (new_h - h) * 0.5);
    let center = rect.center() + frame.local_delta_to_world(local_shift);
    Rect::from_center_size(center, (new_w, new_h))
}
