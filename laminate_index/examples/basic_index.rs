// Copyright 2025 the Laminate Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-layer neighbor shortlists and the self-enabling global index.

use core::time::Duration;

use laminate_index::{Aabb2D, AutoEnable, GlobalIndex, LayeredIndex};

fn main() {
    let mut layers: LayeredIndex<u8, u32> = LayeredIndex::new();
    layers.load(
        0,
        (0..10_u32).map(|i| (i, Aabb2D::<f64>::from_xywh(f64::from(i) * 51.0, 0.0, 50.0, 50.0))),
    );
    println!("neighbors of 4 within 12 mm: {:?}", layers.neighbors(4, 12.0, 16));

    // Move piece 4 onto layer 1; it no longer has same-layer neighbors.
    layers.upsert(4, 1, Aabb2D::<f64>::from_xywh(204.0, 0.0, 50.0, 50.0));
    println!("after moving to layer 1: {:?}", layers.neighbors(4, 12.0, 16));

    let mut global: GlobalIndex<u32> = GlobalIndex::new(AutoEnable {
        min_on: 8,
        max_off: 4,
        debounce: Duration::from_millis(50),
    });
    global.set_observer(|mode, n| println!("global index -> {mode:?} at {n} items"));
    for i in 0..10_u32 {
        global.upsert(i, Aabb2D::<f64>::from_xywh(f64::from(i) * 51.0, 0.0, 50.0, 50.0), Duration::ZERO);
    }
    let _ = global.tick(Duration::from_millis(60));
    let hits = global.query(Aabb2D::<f64>::from_xywh(100.0, 10.0, 60.0, 10.0));
    println!("window hits: {hits:?}");
}
