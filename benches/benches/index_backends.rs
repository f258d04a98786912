// Copyright 2025 the Laminate Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use laminate_index::{Aabb2D, Index, RTreeIndex};

// Pieces laid out in rows with a 1 mm kerf, like a cut sheet.
fn gen_sheet(n: usize, size: f64) -> Vec<Aabb2D<f64>> {
    let mut out = Vec::with_capacity(n * n);
    for y in 0..n {
        for x in 0..n {
            let x0 = x as f64 * (size + 1.0);
            let y0 = y as f64 * (size + 1.0);
            out.push(Aabb2D::<f64>::from_xywh(x0, y0, size, size));
        }
    }
    out
}

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_f64(&mut self) -> f64 {
        let v = self.next_u64() >> 11;
        (v as f64) / ((1u64 << 53) as f64)
    }
}

fn gen_scattered(count: usize, board: f64) -> Vec<Aabb2D<f64>> {
    let mut rng = Rng::new(0xCAFE_F00D_DEAD_BEEF);
    (0..count)
        .map(|_| {
            let w = 20.0 + rng.next_f64() * 180.0;
            let h = 20.0 + rng.next_f64() * 180.0;
            let x0 = rng.next_f64() * (board - w);
            let y0 = rng.next_f64() * (board - h);
            Aabb2D::<f64>::from_xywh(x0, y0, w, h)
        })
        .collect()
}

fn bench_insert_query(c: &mut Criterion) {
    let window = Aabb2D::<f64>::from_xywh(100.0, 100.0, 400.0, 400.0);
    let mut group = c.benchmark_group("insert_commit_query");
    for &n in &[8usize, 16, 32, 64] {
        let rects = gen_sheet(n, 50.0);
        group.throughput(Throughput::Elements((n * n) as u64));
        group.bench_function(format!("flatvec_n{}", n * n), |b| {
            b.iter_batched(
                Index::<f64, u32>::new,
                |mut idx| {
                    for (i, r) in rects.iter().copied().enumerate() {
                        let _ = idx.insert(r, i as u32);
                    }
                    let _ = idx.commit();
                    black_box(idx.query_rect(window).count());
                },
                BatchSize::SmallInput,
            );
        });
        group.bench_function(format!("rtree_n{}", n * n), |b| {
            b.iter_batched(
                RTreeIndex::<f64, u32>::new,
                |mut idx| {
                    for (i, r) in rects.iter().copied().enumerate() {
                        let _ = idx.insert(r, i as u32);
                    }
                    let _ = idx.commit();
                    black_box(idx.query_rect(window).count());
                },
                BatchSize::SmallInput,
            );
        });
        let entries: Vec<_> = rects
            .iter()
            .copied()
            .enumerate()
            .map(|(i, r)| (r, i as u32))
            .collect();
        group.bench_function(format!("rtree_bulk_n{}", n * n), |b| {
            b.iter(|| {
                let (idx, _) = RTreeIndex::<f64, u32>::from_entries(&entries);
                black_box(idx.query_rect(window).count());
            });
        });
    }
    group.finish();
}

fn bench_query_only(c: &mut Criterion) {
    let rects = gen_scattered(2048, 3000.0);
    let entries: Vec<_> = rects
        .iter()
        .copied()
        .enumerate()
        .map(|(i, r)| (r, i as u32))
        .collect();
    let (flat, _) = Index::<f64, u32>::from_entries(&entries);
    let (tree, _) = RTreeIndex::<f64, u32>::from_entries(&entries);
    let probes: Vec<_> = rects.iter().take(256).map(|r| r.inflate(12.0)).collect();

    let mut group = c.benchmark_group("neighbor_window_query");
    group.throughput(Throughput::Elements(probes.len() as u64));
    group.bench_function("flatvec", |b| {
        b.iter(|| {
            let hits: usize = probes.iter().map(|p| flat.query_rect(*p).count()).sum();
            black_box(hits);
        });
    });
    group.bench_function("rtree", |b| {
        b.iter(|| {
            let hits: usize = probes.iter().map(|p| tree.query_rect(*p).count()).sum();
            black_box(hits);
        });
    });
    group.finish();
}

fn bench_update_churn(c: &mut Criterion) {
    // A drag: one piece moves a little on every frame.
    let rects = gen_sheet(32, 50.0);
    let entries: Vec<_> = rects
        .iter()
        .copied()
        .enumerate()
        .map(|(i, r)| (r, i as u32))
        .collect();
    let mut group = c.benchmark_group("drag_update_commit");
    group.bench_function("rtree", |b| {
        b.iter_batched(
            || RTreeIndex::<f64, u32>::from_entries(&entries),
            |(mut idx, keys)| {
                let key = keys[500];
                for step in 0..60 {
                    let dx = f64::from(step) * 0.5;
                    idx.update(key, Aabb2D::<f64>::from_xywh(dx, 0.0, 50.0, 50.0));
                    black_box(idx.commit());
                }
            },
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_insert_query, bench_query_only, bench_update_churn);
criterion_main!(benches);
