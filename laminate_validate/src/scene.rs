// Copyright 2025 the Laminate Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Immutable scene snapshot handed to validation.

use core::fmt;

use kurbo::Rect;
use serde::{Deserialize, Serialize};

use crate::geometry::{self, Quad, Rotation};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Piece identifier.
    PieceId
);
id_type!(
    /// Layer identifier.
    LayerId
);
id_type!(
    /// Material identifier.
    MaterialId
);

/// A stacking level. Higher `index` sits on top.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Identifier.
    pub id: LayerId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Stack order, unique per scene.
    pub index: i32,
}

/// Board material. Orientation is carried for other consumers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Identifier.
    pub id: MaterialId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Grain or pattern direction, if the material has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Rotation>,
}

/// Shape of a piece before rotation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShapeKind {
    /// Axis-aligned rectangle.
    #[default]
    Rect,
}

/// A rectangular piece placed on a layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Piece {
    /// Identifier.
    pub id: PieceId,
    /// Shape kind.
    #[serde(default)]
    pub kind: ShapeKind,
    /// Local left edge, before rotation.
    pub x: f64,
    /// Local top edge, before rotation.
    pub y: f64,
    /// Local width.
    pub w: f64,
    /// Local height.
    pub h: f64,
    /// Cardinal rotation about the center.
    #[serde(default)]
    pub rot: Rotation,
    /// Owning layer.
    pub layer_id: LayerId,
    /// Board material.
    pub material_id: MaterialId,
    /// Intentionally flush against a neighbor; no spacing checks.
    #[serde(default)]
    pub joined: bool,
}

impl Piece {
    /// A new unrotated piece.
    pub fn new(id: u32, layer: u32, x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            id: PieceId(id),
            kind: ShapeKind::Rect,
            x,
            y,
            w,
            h,
            rot: Rotation::R0,
            layer_id: LayerId(layer),
            material_id: MaterialId::default(),
            joined: false,
        }
    }

    /// Set the rotation.
    #[must_use]
    pub fn rotated(mut self, rot: Rotation) -> Self {
        self.rot = rot;
        self
    }

    /// Mark as joined.
    #[must_use]
    pub fn joined(mut self) -> Self {
        self.joined = true;
        self
    }

    /// Local box, before rotation.
    pub fn local_rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.w, self.y + self.h)
    }

    /// World bounds after rotation.
    pub fn aabb(&self) -> Rect {
        geometry::rotated_aabb(self.local_rect(), self.rot)
    }

    /// World corners after rotation.
    pub fn polygon(&self) -> Quad {
        geometry::to_polygon(self.local_rect(), f64::from(self.rot.degrees()))
    }

    /// Move the local box so its world bounds start at `aabb`'s origin.
    ///
    /// Used to write a snapped world rectangle back into local coordinates.
    pub fn place_aabb_at(&mut self, x0: f64, y0: f64) {
        let current = self.aabb();
        self.x += x0 - current.x0;
        self.y += y0 - current.y0;
    }
}

/// Immutable validation snapshot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    /// Board width.
    pub width: f64,
    /// Board height.
    pub height: f64,
    /// Layers, in any order; `index` decides stacking.
    #[serde(default)]
    pub layers: Vec<Layer>,
    /// Materials.
    #[serde(default)]
    pub materials: Vec<Material>,
    /// Pieces, in paint order.
    #[serde(default)]
    pub pieces: Vec<Piece>,
}

impl Scene {
    /// Empty scene of the given size.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Add a layer.
    #[must_use]
    pub fn with_layer(mut self, id: u32, index: i32) -> Self {
        self.layers.push(Layer {
            id: LayerId(id),
            name: format!("Layer {index}"),
            index,
        });
        self
    }

    /// Add a piece.
    #[must_use]
    pub fn with_piece(mut self, piece: Piece) -> Self {
        self.pieces.push(piece);
        self
    }

    /// The board rectangle.
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }

    /// Look up a piece.
    pub fn piece(&self, id: PieceId) -> Option<&Piece> {
        self.pieces.iter().find(|p| p.id == id)
    }

    /// Stack index of a layer.
    pub fn layer_index(&self, id: LayerId) -> Option<i32> {
        self.layers.iter().find(|l| l.id == id).map(|l| l.index)
    }

    /// The bottom layer's stack index.
    pub fn lowest_layer_index(&self) -> Option<i32> {
        self.layers.iter().map(|l| l.index).min()
    }

    /// Pieces on `layer`, in paint order.
    pub fn pieces_on(&self, layer: LayerId) -> impl Iterator<Item = &Piece> + '_ {
        self.pieces.iter().filter(move |p| p.layer_id == layer)
    }

    /// Pieces on layers stacked strictly below `index`.
    pub fn pieces_below(&self, index: i32) -> impl Iterator<Item = &Piece> + '_ {
        self.pieces
            .iter()
            .filter(move |p| self.layer_index(p.layer_id).is_some_and(|i| i < index))
    }

    /// Insert or replace a piece by id. Returns whether it was new.
    pub fn upsert_piece(&mut self, piece: Piece) -> bool {
        match self.pieces.iter_mut().find(|p| p.id == piece.id) {
            Some(slot) => {
                *slot = piece;
                false
            }
            None => {
                self.pieces.push(piece);
                true
            }
        }
    }

    /// Remove a piece by id. Returns it if present.
    pub fn remove_piece(&mut self, id: PieceId) -> Option<Piece> {
        let at = self.pieces.iter().position(|p| p.id == id)?;
        Some(self.pieces.remove(at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn piece_json_is_camel_case_with_integer_rotation() {
        let json = r#"{"id":3,"x":1,"y":2,"w":10,"h":20,"rot":90,"layerId":1,"materialId":7}"#;
        let p: Piece = serde_json::from_str(json).unwrap();
        assert_eq!(p.rot, Rotation::R90);
        assert_eq!(p.layer_id, LayerId(1));
        assert!(!p.joined);
        let back = serde_json::to_value(&p).unwrap();
        assert_eq!(back["rot"], 90);
        assert_eq!(back["materialId"], 7);
        assert_eq!(back["kind"], "rect");
    }

    #[test]
    fn non_cardinal_rotation_is_rejected() {
        let json = r#"{"id":3,"x":1,"y":2,"w":10,"h":20,"rot":45,"layerId":1,"materialId":7}"#;
        assert!(serde_json::from_str::<Piece>(json).is_err());
    }

    #[test]
    fn place_aabb_at_moves_rotated_piece() {
        let mut p = Piece::new(1, 0, 0.0, 0.0, 40.0, 10.0).rotated(Rotation::R90);
        p.place_aabb_at(100.0, 50.0);
        let b = p.aabb();
        assert_eq!((b.x0, b.y0), (100.0, 50.0));
        assert_eq!((b.width(), b.height()), (10.0, 40.0));
    }

    #[test]
    fn lookups_by_layer() {
        let scene = Scene::new(100.0, 100.0)
            .with_layer(10, 1)
            .with_layer(20, 0)
            .with_piece(Piece::new(1, 10, 0.0, 0.0, 10.0, 10.0))
            .with_piece(Piece::new(2, 20, 0.0, 0.0, 10.0, 10.0));
        assert_eq!(scene.lowest_layer_index(), Some(0));
        let below: Vec<_> = scene.pieces_below(1).map(|p| p.id).collect();
        assert_eq!(below, [PieceId(2)]);
        assert_eq!(scene.pieces_on(LayerId(10)).count(), 1);
    }

    #[test]
    fn upsert_appends_unknown() {
        let mut scene = Scene::new(10.0, 10.0);
        assert!(scene.upsert_piece(Piece::new(1, 0, 0.0, 0.0, 1.0, 1.0)));
        assert!(!scene.upsert_piece(Piece::new(1, 0, 5.0, 0.0, 1.0, 1.0)));
        assert_eq!(scene.pieces.len(), 1);
        assert_eq!(scene.pieces[0].x, 5.0);
        assert!(scene.remove_piece(PieceId(1)).is_some());
        assert!(scene.remove_piece(PieceId(1)).is_none());
    }
}
