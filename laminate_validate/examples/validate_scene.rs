// Copyright 2025 the Laminate Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Validate a scene read from a JSON file, or a built-in demo scene.
//!
//! ```text
//! RUST_LOG=laminate_validate=debug cargo run --example validate_scene -- scene.json
//! ```

use laminate_validate::{
    Executor, InlineExecutor, Piece, Scene, ValidationConfig, WorkerExecutor, can_commit,
};
use tracing_subscriber::EnvFilter;

fn demo() -> Scene {
    Scene::new(600.0, 400.0)
        .with_layer(0, 0)
        .with_layer(1, 1)
        .with_piece(Piece::new(1, 0, 0.0, 0.0, 300.0, 200.0))
        .with_piece(Piece::new(2, 0, 300.0, 0.0, 200.0, 200.0))
        .with_piece(Piece::new(3, 0, 0.0, 200.6, 300.0, 150.0))
        .with_piece(Piece::new(4, 1, 250.0, 50.0, 100.0, 100.0))
        .with_piece(Piece::new(5, 1, 450.0, 150.0, 100.0, 100.0))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let scene = match std::env::args().nth(1) {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => demo(),
    };
    let config = ValidationConfig::default();
    println!("support strategy: {}", config.strategy());

    let mut executor: Box<dyn Executor> = if std::env::var_os("LAMINATE_INLINE").is_some() {
        Box::new(InlineExecutor::new(config))
    } else {
        Box::new(WorkerExecutor::spawn(config)?)
    };
    let pieces = executor.rebuild_index(scene)?;
    let problems = executor.validate_all()?;
    println!("{pieces} pieces, {} problems", problems.len());
    for p in &problems {
        println!("  {:?} {:?}: {}", p.severity, p.code, p.message);
    }
    println!("can commit: {}", can_commit(&problems));
    Ok(())
}
