// Copyright 2025 the Laminate Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Laminate Validate: geometry validation for layered panel layouts.
//!
//! A [`Scene`] is a board with ordered layers of rectangular pieces. This crate
//! answers the questions an editor asks while pieces are dragged, resized, and
//! committed:
//!
//! - [`collision`]: do two pieces on one layer overlap? Exact for rotated
//!   outlines, touching edges allowed.
//! - [`snap`]: alignment to neighbor edges and centers, edge-to-edge collage,
//!   and gap normalization.
//! - [`support`]: is a piece above the bottom layer carried by what is below it?
//!   Approximate (bounding box of the lower layers) or exact (polygon union,
//!   with the `exact` feature).
//! - [`pipeline`]: every rule at once, producing [`Problem`]s with a `BLOCK` or
//!   `WARN` severity. A scene or candidate may be committed when
//!   [`can_commit`] holds.
//! - [`rpc`]: a request/response boundary that runs all of the above inline or
//!   on a worker thread.
//!
//! All lengths are millimetres.
//!
//! # Example
//!
//! ```rust
//! use laminate_validate::{Piece, Scene, SceneIndex, ValidationConfig, can_commit, validate_all};
//!
//! let scene = Scene::new(200.0, 200.0)
//!     .with_layer(0, 0)
//!     .with_piece(Piece::new(1, 0, 0.0, 0.0, 50.0, 50.0))
//!     .with_piece(Piece::new(2, 0, 50.6, 0.0, 50.0, 50.0));
//! let index = SceneIndex::from_scene(&scene);
//!
//! let problems = validate_all(&scene, &index, &ValidationConfig::default());
//! // 0.6 mm apart: too close to cut.
//! assert!(!can_commit(&problems));
//! ```

pub mod boolean;
pub mod collision;
pub mod config;
pub mod error;
pub mod geometry;
pub mod pipeline;
pub mod problem;
pub mod resize;
pub mod rpc;
pub mod scene;
pub mod snap;
pub mod spatial;
pub mod support;

pub use collision::{Candidate, CandidateCollisions, Footprint};
pub use config::{SupportStrategy, ValidationConfig};
pub use error::{BackendError, Error, Result};
pub use geometry::{Edges, Rotation};
pub use pipeline::{Validator, validate_all, validate_candidate};
pub use problem::{Problem, ProblemCode, Severity, can_commit};
pub use resize::ResizeContext;
pub use rpc::{Engine, Executor, InlineExecutor, Operation, Reply, Request, Response, WorkerExecutor};
pub use scene::{Layer, LayerId, Material, MaterialId, Piece, PieceId, Scene};
pub use snap::{SnapEngine, SnapOptions};
pub use spatial::SceneIndex;
pub use support::{Support, SupportValidator};
