// Copyright 2025 the Laminate Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.

use thiserror::Error;

use crate::scene::PieceId;

/// Errors surfaced to callers of the execution boundary.
///
/// Validation itself never fails: index misses fall back to scans and
/// boolean backend failures become `unsupported_above` warnings.
#[derive(Debug, Error)]
pub enum Error {
    /// A request outlived its deadline. There is no retry.
    #[error("request {id} timed out after {millis} ms")]
    Timeout {
        /// Correlation id of the abandoned request.
        id: u64,
        /// Deadline that was exceeded.
        millis: u64,
    },
    /// The worker thread hung up.
    #[error("validation worker is gone")]
    WorkerGone,
    /// The worker thread could not be started.
    #[error("failed to spawn validation worker: {0}")]
    Spawn(#[from] std::io::Error),
    /// A message failed to encode or decode.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
    /// A request named a piece the engine does not hold.
    #[error("unknown piece {0}")]
    UnknownPiece(PieceId),
    /// The boolean geometry backend rejected a request.
    #[error("boolean backend: {0}")]
    Backend(#[from] BackendError),
    /// The worker answered with an error string.
    #[error("worker error: {0}")]
    Remote(String),
    /// The reply did not match the operation that was sent.
    #[error("unexpected reply to {0}")]
    UnexpectedReply(&'static str),
}

/// Result alias for the execution boundary.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Failures of the exact boolean geometry backend.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BackendError {
    /// Built without the `exact` feature.
    #[error("exact boolean backend is not compiled in")]
    Unavailable,
    /// An input polygon carried NaN or infinite coordinates.
    #[error("non-finite coordinate in polygon input")]
    NonFinite,
    /// A union of non-empty input came back empty.
    #[error("union of {0} polygons came back empty")]
    EmptyUnion(usize),
}

/// A committed rotation that is not a multiple of 90°.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("rotation must be 0, 90, 180, or 270 degrees, got {0}")]
pub struct InvalidRotation(pub i32);
