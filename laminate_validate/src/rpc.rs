// Copyright 2025 the Laminate Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Execution boundary: a request/response protocol over the validation core.
//!
//! An [`Engine`] holds the last scene, its index, and the configuration, and
//! answers [`Operation`]s. It is driven either on the caller's thread
//! ([`InlineExecutor`]) or on a dedicated worker thread that exchanges JSON
//! messages over channels ([`WorkerExecutor`]). The choice is made once, at
//! construction.
//!
//! Wire format:
//!
//! ```json
//! {"id": 7, "type": "collisionsForPiece", "payload": {"pieceId": 3, "exclude": []}}
//! {"id": 7, "ok": true, "result": {"kind": "collisions", "value": {"overlap": false, "collidingIds": []}}}
//! ```

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use kurbo::Rect;
use serde::{Deserialize, Serialize};

use crate::boolean::{self, BooleanOp, Contour, Shape};
use crate::collision::{self, Candidate, CandidateCollisions};
use crate::config::{DEFAULT_RPC_TIMEOUT, ValidationConfig};
use crate::error::{Error, Result};
use crate::pipeline::Validator;
use crate::problem::Problem;
use crate::scene::{Piece, PieceId, Scene};
use crate::spatial::SceneIndex;

/// A correlated request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id, echoed in the response.
    pub id: u64,
    /// What to do.
    #[serde(flatten)]
    pub op: Operation,
}

/// Operations the engine understands.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Operation {
    /// Replace the held scene and rebuild the index from it.
    RebuildIndex {
        /// New scene.
        scene: Scene,
    },
    /// Insert a piece, or replace the one with the same id.
    UpdatePiece {
        /// New piece state.
        piece: Piece,
    },
    /// Drop a piece from the scene and index.
    RemovePiece {
        /// Piece to drop.
        piece_id: PieceId,
    },
    /// Same-layer collisions for a piece, optionally at a candidate geometry.
    CollisionsForPiece {
        /// Subject piece.
        piece_id: PieceId,
        /// Candidate local box; the committed one when absent.
        #[serde(default)]
        rect: Option<Rect>,
        /// Candidate rotation in degrees; the committed one when absent.
        #[serde(default)]
        rot: Option<f64>,
        /// Pieces to ignore.
        #[serde(default)]
        exclude: Vec<PieceId>,
    },
    /// Polygon boolean on raw contours.
    BooleanOpPolys {
        /// Operation.
        op: BooleanOp,
        /// Subject contours.
        subject: Vec<Contour>,
        /// Clip contours.
        clip: Vec<Contour>,
    },
    /// Overlapping same-layer pairs in the held scene.
    ValidateOverlaps {},
    /// Every problem in the held scene.
    ValidateAll {},
}

impl Operation {
    /// Wire name of the operation.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RebuildIndex { .. } => "rebuildIndex",
            Self::UpdatePiece { .. } => "updatePiece",
            Self::RemovePiece { .. } => "removePiece",
            Self::CollisionsForPiece { .. } => "collisionsForPiece",
            Self::BooleanOpPolys { .. } => "booleanOpPolys",
            Self::ValidateOverlaps {} => "validateOverlaps",
            Self::ValidateAll {} => "validateAll",
        }
    }
}

/// Successful result of an operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Reply {
    /// Index rebuilt over this many pieces.
    Indexed(usize),
    /// Piece stored; true when it was new.
    Updated(bool),
    /// True when the piece existed.
    Removed(bool),
    /// Collision query result.
    Collisions(CandidateCollisions),
    /// Boolean result shapes.
    Shapes(Vec<Shape>),
    /// Overlapping pairs, lower id first.
    Overlaps(Vec<(PieceId, PieceId)>),
    /// Validation problems.
    Problems(Vec<Problem>),
}

/// Response to a [`Request`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Id of the request this answers.
    pub id: u64,
    /// Whether `result` is set.
    pub ok: bool,
    /// Result on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Reply>,
    /// Message on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// Successful response.
    pub fn success(id: u64, reply: Reply) -> Self {
        Self {
            id,
            ok: true,
            result: Some(reply),
            error: None,
        }
    }

    /// Failed response.
    pub fn failure(id: u64, message: impl Into<String>) -> Self {
        Self {
            id,
            ok: false,
            result: None,
            error: Some(message.into()),
        }
    }

    /// Convert back into a result.
    pub fn into_result(self) -> Result<Reply> {
        match (self.ok, self.result) {
            (true, Some(reply)) => Ok(reply),
            (true, None) => Err(Error::UnexpectedReply("empty response")),
            (false, _) => Err(Error::Remote(self.error.unwrap_or_default())),
        }
    }
}

/// Validation state behind the boundary.
#[derive(Debug, Default)]
pub struct Engine {
    config: ValidationConfig,
    scene: Scene,
    index: SceneIndex,
}

impl Engine {
    /// Engine with an empty scene.
    pub fn new(config: ValidationConfig) -> Self {
        Self {
            config,
            scene: Scene::default(),
            index: SceneIndex::new(),
        }
    }

    /// The held scene.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// The held index.
    pub fn index(&self) -> &SceneIndex {
        &self.index
    }

    /// Configuration in use.
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Run one operation.
    pub fn handle(&mut self, op: Operation) -> Result<Reply> {
        let reply = match op {
            Operation::RebuildIndex { scene } => {
                self.scene = scene;
                self.index.load_scene(&self.scene);
                Reply::Indexed(self.scene.pieces.len())
            }
            Operation::UpdatePiece { piece } => {
                self.index.upsert_piece(&piece);
                let inserted = self.scene.upsert_piece(piece);
                self.index.tick(Instant::now());
                Reply::Updated(inserted)
            }
            Operation::RemovePiece { piece_id } => {
                let existed = self.scene.remove_piece(piece_id).is_some();
                self.index.remove_piece(piece_id);
                self.index.tick(Instant::now());
                Reply::Removed(existed)
            }
            Operation::CollisionsForPiece {
                piece_id,
                rect,
                rot,
                exclude,
            } => {
                let piece = self
                    .scene
                    .piece(piece_id)
                    .ok_or(Error::UnknownPiece(piece_id))?;
                let mut candidate = match rect {
                    Some(rect) => Candidate::moved(piece, rect),
                    None => Candidate::from_piece(piece),
                };
                if let Some(degrees) = rot {
                    candidate = candidate.with_degrees(degrees);
                }
                Reply::Collisions(collision::candidate_collisions(
                    &self.scene,
                    &self.index,
                    &candidate,
                    &exclude,
                    None,
                    &self.config,
                ))
            }
            Operation::BooleanOpPolys { op, subject, clip } => {
                Reply::Shapes(boolean::overlay(&subject, &clip, op)?)
            }
            Operation::ValidateOverlaps {} => {
                Reply::Overlaps(Validator::new(&self.scene, &self.index, &self.config).overlaps())
            }
            Operation::ValidateAll {} => Reply::Problems(
                Validator::new(&self.scene, &self.index, &self.config).validate_all(),
            ),
        };
        Ok(reply)
    }

    /// Answer a request. Failures become `ok: false` responses.
    pub fn respond(&mut self, request: Request) -> Response {
        let name = request.op.name();
        match self.handle(request.op) {
            Ok(reply) => Response::success(request.id, reply),
            Err(err) => {
                tracing::debug!(id = request.id, op = name, %err, "request failed");
                Response::failure(request.id, err.to_string())
            }
        }
    }
}

/// Something that runs operations against an [`Engine`].
pub trait Executor {
    /// Run one operation and wait for its reply.
    fn call(&mut self, op: Operation) -> Result<Reply>;

    /// Replace the scene. Returns the number of indexed pieces.
    fn rebuild_index(&mut self, scene: Scene) -> Result<usize> {
        match self.call(Operation::RebuildIndex { scene })? {
            Reply::Indexed(n) => Ok(n),
            _ => Err(Error::UnexpectedReply("rebuildIndex")),
        }
    }

    /// Upsert a piece. Returns true if it was new.
    fn update_piece(&mut self, piece: Piece) -> Result<bool> {
        match self.call(Operation::UpdatePiece { piece })? {
            Reply::Updated(inserted) => Ok(inserted),
            _ => Err(Error::UnexpectedReply("updatePiece")),
        }
    }

    /// Remove a piece. Returns true if it existed.
    fn remove_piece(&mut self, piece_id: PieceId) -> Result<bool> {
        match self.call(Operation::RemovePiece { piece_id })? {
            Reply::Removed(existed) => Ok(existed),
            _ => Err(Error::UnexpectedReply("removePiece")),
        }
    }

    /// Collisions of `piece_id` at an optional candidate geometry.
    fn collisions_for_piece(
        &mut self,
        piece_id: PieceId,
        rect: Option<Rect>,
        rot: Option<f64>,
        exclude: Vec<PieceId>,
    ) -> Result<CandidateCollisions> {
        let op = Operation::CollisionsForPiece {
            piece_id,
            rect,
            rot,
            exclude,
        };
        match self.call(op)? {
            Reply::Collisions(c) => Ok(c),
            _ => Err(Error::UnexpectedReply("collisionsForPiece")),
        }
    }

    /// Polygon boolean.
    fn boolean_op(&mut self, op: BooleanOp, subject: Vec<Contour>, clip: Vec<Contour>) -> Result<Vec<Shape>> {
        match self.call(Operation::BooleanOpPolys { op, subject, clip })? {
            Reply::Shapes(shapes) => Ok(shapes),
            _ => Err(Error::UnexpectedReply("booleanOpPolys")),
        }
    }

    /// Overlapping pairs in the held scene.
    fn validate_overlaps(&mut self) -> Result<Vec<(PieceId, PieceId)>> {
        match self.call(Operation::ValidateOverlaps {})? {
            Reply::Overlaps(pairs) => Ok(pairs),
            _ => Err(Error::UnexpectedReply("validateOverlaps")),
        }
    }

    /// Every problem in the held scene.
    fn validate_all(&mut self) -> Result<Vec<Problem>> {
        match self.call(Operation::ValidateAll {})? {
            Reply::Problems(problems) => Ok(problems),
            _ => Err(Error::UnexpectedReply("validateAll")),
        }
    }
}

/// Runs operations synchronously on the calling thread.
#[derive(Debug, Default)]
pub struct InlineExecutor {
    engine: Engine,
}

impl InlineExecutor {
    /// Executor over a fresh engine.
    pub fn new(config: ValidationConfig) -> Self {
        Self {
            engine: Engine::new(config),
        }
    }

    /// The engine, for direct inspection.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

impl Executor for InlineExecutor {
    fn call(&mut self, op: Operation) -> Result<Reply> {
        self.engine.handle(op)
    }
}

/// Runs operations on a dedicated thread, one at a time, in arrival order.
///
/// Each call waits up to the configured timeout. A timed-out request is not
/// retried; its late response is dropped when it eventually arrives.
#[derive(Debug)]
pub struct WorkerExecutor {
    sender: Option<mpsc::Sender<String>>,
    receiver: mpsc::Receiver<String>,
    handle: Option<JoinHandle<()>>,
    timeout: Duration,
    next_id: u64,
}

impl WorkerExecutor {
    /// Start a worker with the default timeout.
    pub fn spawn(config: ValidationConfig) -> Result<Self> {
        let (tx, worker_rx) = mpsc::channel::<String>();
        let (worker_tx, rx) = mpsc::channel::<String>();
        let handle = thread::Builder::new()
            .name("laminate-worker".into())
            .spawn(move || worker_loop(Engine::new(config), worker_rx, worker_tx))?;
        tracing::debug!("validation worker started");
        Ok(Self {
            sender: Some(tx),
            receiver: rx,
            handle: Some(handle),
            timeout: DEFAULT_RPC_TIMEOUT,
            next_id: 1,
        })
    }

    /// Per-call deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Change the per-call deadline.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Current per-call deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Executor for WorkerExecutor {
    fn call(&mut self, op: Operation) -> Result<Reply> {
        let id = self.next_id;
        self.next_id += 1;
        let line = serde_json::to_string(&Request { id, op })?;
        let sender = self.sender.as_ref().ok_or(Error::WorkerGone)?;
        sender.send(line).map_err(|_| Error::WorkerGone)?;

        let deadline = Instant::now() + self.timeout;
        loop {
            let wait = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(wait) {
                Ok(line) => {
                    let response: Response = serde_json::from_str(&line)?;
                    if response.id != id {
                        tracing::trace!(stale = response.id, waiting = id, "dropping stale response");
                        continue;
                    }
                    return response.into_result();
                }
                Err(RecvTimeoutError::Timeout) => {
                    let millis = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                    tracing::warn!(id, millis, "validation request timed out");
                    return Err(Error::Timeout { id, millis });
                }
                Err(RecvTimeoutError::Disconnected) => return Err(Error::WorkerGone),
            }
        }
    }
}

impl Drop for WorkerExecutor {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop.
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn worker_loop(mut engine: Engine, rx: mpsc::Receiver<String>, tx: mpsc::Sender<String>) {
    for line in rx {
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => engine.respond(request),
            Err(err) => Response::failure(request_id(&line), err.to_string()),
        };
        let encoded = match serde_json::to_string(&response) {
            Ok(encoded) => encoded,
            Err(err) => match serde_json::to_string(&Response::failure(response.id, err.to_string())) {
                Ok(encoded) => encoded,
                Err(_) => continue,
            },
        };
        if tx.send(encoded).is_err() {
            break;
        }
    }
    tracing::debug!("validation worker stopped");
}

// Best effort id for a request that failed to decode.
fn request_id(line: &str) -> u64 {
    serde_json::from_str::<serde_json::Value>(line)
        .ok()
        .and_then(|v| v.get("id").and_then(serde_json::Value::as_u64))
        .unwrap_or(0)
}
