// Copyright 2025 the Laminate Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Backend implementations for different spatial strategies.
//!
//! - `flatvec`: flat vector with linear scans (small, simple).
//! - `rtree`: generic R-tree (`T: Scalar`) with SAH-like split (aliases: `RTreeI64`, `RTreeF64`).
//!
//! SAH note
//! --------
//! For a split point `k` along a sorted axis the R-tree minimizes:
//!
//! `cost(k) = area(LB_k) * k + area(RB_k) * (n - k)`
//!
//! where `LB_k` and `RB_k` are the bounding boxes of the first `k` and remaining `n - k` items.
//! All `k` are evaluated in O(n) per axis using prefix/suffix bounding boxes.
//! Bulk loads use an STR-like pass to seed packed leaves and parents.

pub mod flatvec;
pub mod rtree;
