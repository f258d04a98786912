// Copyright 2025 the Laminate Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use laminate_index::{Aabb2D, LayeredIndex};
use laminate_validate::{
    Piece, PieceId, Scene, SceneIndex, SupportStrategy, ValidationConfig, Validator,
};

// Two layers: a base sheet of panels and a smaller top layer resting on it.
fn gen_scene(per_side: u32) -> Scene {
    let size = 50.0;
    let step = size + 1.2;
    let extent = f64::from(per_side) * step;
    let mut scene = Scene::new(extent, extent).with_layer(0, 0).with_layer(1, 1);
    let mut id = 0;
    for y in 0..per_side {
        for x in 0..per_side {
            let (fx, fy) = (f64::from(x) * step, f64::from(y) * step);
            scene = scene.with_piece(Piece::new(id, 0, fx, fy, size, size));
            id += 1;
            if (x + y) % 3 == 0 {
                scene = scene.with_piece(Piece::new(id, 1, fx + 5.0, fy + 5.0, 30.0, 30.0));
                id += 1;
            }
        }
    }
    scene
}

fn bench_neighbors(c: &mut Criterion) {
    let scene = gen_scene(24);
    let mut layered: LayeredIndex<u32, u32> = LayeredIndex::new();
    for layer in [0_u32, 1] {
        layered.load(
            layer,
            scene
                .pieces
                .iter()
                .filter(|p| p.layer_id.0 == layer)
                .map(|p| {
                    let b = p.aabb();
                    (p.id.0, Aabb2D::new(b.x0, b.y0, b.x1, b.y1))
                }),
        );
    }
    let probes: Vec<&Piece> = scene.pieces.iter().step_by(7).collect();

    let mut group = c.benchmark_group("neighbors_12mm");
    group.throughput(Throughput::Elements(probes.len() as u64));
    group.bench_function("layered_index", |b| {
        b.iter(|| {
            let n: usize = probes
                .iter()
                .map(|p| layered.neighbors(p.id.0, 12.0, 16).len())
                .sum();
            black_box(n);
        });
    });
    group.bench_function("linear_scan", |b| {
        b.iter(|| {
            let n: usize = probes
                .iter()
                .map(|p| {
                    let window = p.aabb().inflate(12.0, 12.0);
                    scene
                        .pieces_on(p.layer_id)
                        .filter(|o| o.id != p.id && o.aabb().overlaps(window))
                        .take(16)
                        .count()
                })
                .sum();
            black_box(n);
        });
    });
    group.finish();
}

fn bench_validate_all(c: &mut Criterion) {
    let cfg = ValidationConfig::default();
    let mut group = c.benchmark_group("validate_all");
    for per_side in [8_u32, 16, 24] {
        let scene = gen_scene(per_side);
        let index = SceneIndex::from_scene(&scene);
        group.throughput(Throughput::Elements(scene.pieces.len() as u64));
        for strategy in [SupportStrategy::Approximate, SupportStrategy::Exact] {
            let validator = Validator::new(&scene, &index, &cfg).with_strategy(strategy);
            group.bench_function(format!("{strategy}_{}", scene.pieces.len()), |b| {
                b.iter(|| black_box(validator.validate_all().len()));
            });
        }
    }
    group.finish();
}

fn bench_rebuild(c: &mut Criterion) {
    let scene = gen_scene(24);
    let mut group = c.benchmark_group("scene_index");
    group.throughput(Throughput::Elements(scene.pieces.len() as u64));
    group.bench_function("load_scene", |b| {
        b.iter_batched(
            SceneIndex::new,
            |mut index| {
                index.load_scene(&scene);
                black_box(index.len());
            },
            BatchSize::SmallInput,
        );
    });
    group.bench_function("upsert_one", |b| {
        let mut index = SceneIndex::from_scene(&scene);
        let mut piece = scene.pieces[0].clone();
        b.iter(|| {
            piece.x += 0.25;
            index.upsert_piece(&piece);
            black_box(index.query(piece.layer_id, piece.aabb()).len());
        });
    });
    group.bench_function("remove_reinsert", |b| {
        let mut index = SceneIndex::from_scene(&scene);
        let piece = scene.pieces[10].clone();
        b.iter(|| {
            black_box(index.remove_piece(PieceId(piece.id.0)));
            index.upsert_piece(&piece);
        });
    });
    group.finish();
}

criterion_group!(benches, bench_neighbors, bench_validate_all, bench_rebuild);
criterion_main!(benches);
