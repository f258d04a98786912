// Copyright 2025 the Laminate Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Laminate Index: 2D AABB indexing for layered piece layouts.
//!
//! - [`IndexGeneric`]: insert, update, and remove boxes with user payloads, batch
//!   the changes with [`IndexGeneric::commit`], and receive coarse [`Damage`].
//! - [`LayeredIndex`]: one R-tree per layer, addressed by caller ids, with
//!   windowed queries, margin-based neighbor shortlists, and bulk layer loads.
//! - [`GlobalIndex`]: a cross-layer index that only builds a tree once the item
//!   count makes it worthwhile, with hysteresis and a caller-clocked debounce.
//!
//! Backends are pluggable via the [`Backend`] trait. [`FlatVec`] scans linearly;
//! [`RTreeF64`]/[`RTreeI64`] use SAH-like splits with widened area metrics and an
//! STR-like packed bulk build.
//!
//! # Example
//!
//! ```rust
//! use laminate_index::{Aabb2D, LayeredIndex};
//!
//! let mut idx: LayeredIndex<u8, u32> = LayeredIndex::new();
//! idx.load(0, [
//!     (1, Aabb2D::<f64>::from_xywh(0.0, 0.0, 50.0, 50.0)),
//!     (2, Aabb2D::<f64>::from_xywh(51.0, 0.0, 50.0, 50.0)),
//!     (3, Aabb2D::<f64>::from_xywh(300.0, 0.0, 50.0, 50.0)),
//! ]);
//!
//! // Piece 2 sits 1 mm away; piece 3 is far outside a 12 mm margin.
//! assert_eq!(idx.neighbors(1, 12.0, 16), vec![2]);
//!
//! // Unknown layers have no tree: the caller must fall back to a scan.
//! assert!(idx.query(9, Aabb2D::<f64>::from_xywh(0.0, 0.0, 10.0, 10.0)).is_empty());
//! ```
//!
//! ### Float semantics
//!
//! This crate assumes no NaNs for floating-point coordinates.
//!
//! ## Features
//!
//! - `std` (enabled by default): float math through Kurbo's `std` backend.
//! - `libm`: float math through Kurbo's `libm` backend for `no_std` targets.

#![no_std]

extern crate alloc;

pub mod backend;
pub mod backends;
pub mod damage;
pub mod global;
pub mod index;
pub mod layered;
pub mod types;

pub use backend::Backend;
pub use backends::flatvec::FlatVec;
pub use backends::rtree::{RTreeF64, RTreeI64};
pub use damage::Damage;
pub use global::{AutoEnable, GlobalIndex, IndexMode, ModeObserver};
pub use index::{Index, IndexGeneric, Key, RTreeIndex};
pub use layered::LayeredIndex;
pub use types::Aabb2D;
