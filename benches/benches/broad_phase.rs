// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use kurbo::{Rect, Vec2};
use understory_broad::Tree;

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

fn gen_grid_rects(n: usize, cell: f64) -> Vec<Rect> {
    let mut out = Vec::with_capacity(n * n);
    for y in 0..n {
        for x in 0..n {
            let x0 = x as f64 * cell;
            let y0 = y as f64 * cell;
            out.push(Rect::new(x0, y0, x0 + cell, y0 + cell));
        }
    }
    out
}

fn gen_clustered_rects(n_clusters: usize, per_cluster: usize, spread: f64) -> Vec<Rect> {
    let mut out = Vec::with_capacity(n_clusters * per_cluster);
    let mut rng = Rng::new(0xC1A5_7E55_9999_ABCD);
    let mut centers = Vec::with_capacity(n_clusters);
    for _ in 0..n_clusters {
        centers.push((rng.next_f64() * 2000.0, rng.next_f64() * 2000.0));
    }
    for (cx, cy) in centers {
        for _ in 0..per_cluster {
            let x0 = cx + (rng.next_f64() - 0.5) * spread;
            let y0 = cy + (rng.next_f64() - 0.5) * spread;
            out.push(Rect::new(x0, y0, x0 + 12.0, y0 + 12.0));
        }
    }
    out
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("broad_build");
    for &n in &[32usize, 64, 128] {
        let rects = gen_grid_rects(n, 10.0);
        group.throughput(Throughput::Elements((n * n) as u64));
        group.bench_function(format!("insert_n{}", n), |b| {
            b.iter_batched(
                Tree::<u32>::new,
                |mut tree| {
                    for (i, r) in rects.iter().copied().enumerate() {
                        tree.insert(i as u32, r);
                    }
                    black_box(tree.height());
                },
                BatchSize::SmallInput,
            )
        });
        group.bench_function(format!("load_n{}", n), |b| {
            b.iter_batched(
                Tree::<u32>::new,
                |mut tree| {
                    tree.load(rects.iter().copied().enumerate().map(|(i, r)| (i as u32, r)));
                    black_box(tree.height());
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("broad_query");
    let query = Rect::new(100.0, 100.0, 500.0, 500.0);
    for (name, rects) in [
        ("grid", gen_grid_rects(128, 10.0)),
        ("clustered", gen_clustered_rects(32, 512, 200.0)),
    ] {
        let mut tree = Tree::new();
        tree.load(rects.iter().copied().enumerate().map(|(i, r)| (i as u32, r)));
        group.bench_function(format!("{name}_rect"), |b| {
            b.iter(|| black_box(tree.query_rect(black_box(query)).count()));
        });
        group.bench_function(format!("{name}_point"), |b| {
            b.iter(|| black_box(tree.query_point(black_box(query.center())).count()));
        });
    }
    group.finish();
}

fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("broad_update");
    let rects = gen_clustered_rects(16, 256, 400.0);
    group.throughput(Throughput::Elements(rects.len() as u64));
    for &step in &[0.5_f64, 25.0] {
        group.bench_function(format!("jitter_{step}"), |b| {
            b.iter_batched(
                || {
                    let mut tree = Tree::new();
                    tree.load(rects.iter().copied().enumerate().map(|(i, r)| (i as u32, r)));
                    (tree, Rng::new(0xFACE_FEED_CAFE_BABE))
                },
                |(mut tree, mut rng)| {
                    for (i, r) in rects.iter().enumerate() {
                        let d = Vec2::new(rng.next_f64() - 0.5, rng.next_f64() - 0.5) * step;
                        tree.update(i as u32, *r + d);
                    }
                    black_box(tree.len());
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_build, bench_query, bench_update);
criterion_main!(benches);
