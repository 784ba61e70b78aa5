// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::ops::ControlFlow;

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use kurbo::{Point, Vec2};
use understory_collide::{Body, System};

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

/// A mix of every body kind scattered over a `size` by `size` square.
fn gen_bodies(count: usize, size: f64) -> Vec<Body> {
    let mut rng = Rng::new(0xCAFE_F00D_DEAD_BEEF);
    (0..count)
        .map(|i| {
            let p = Point::new(rng.next_f64() * size, rng.next_f64() * size);
            let s = 2.0 + rng.next_f64() * 10.0;
            match i % 5 {
                0 => Body::circle(p, s),
                1 => Body::rect(p, s * 2.0, s),
                2 => Body::ellipse(p, s, s * 0.5, None),
                3 => Body::line(p, p + Vec2::new(s * 2.0, s)),
                _ => Body::polygon(p, [Vec2::ZERO, Vec2::new(s, 0.0), Vec2::new(0.0, s)]),
            }
        })
        .collect()
}

fn bench_check_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("system_check_all");
    for &n in &[1000usize, 4000] {
        let mut system = System::new();
        system.extend(gen_bodies(n, 2000.0));
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("n{}", n), |b| {
            b.iter(|| {
                let mut pairs = 0_usize;
                let _ = system.check_all(|_| {
                    pairs += 1;
                    ControlFlow::Continue(())
                });
                black_box(pairs)
            });
        });
    }
    group.finish();
}

fn bench_separate(c: &mut Criterion) {
    let bodies = gen_bodies(2000, 1000.0);
    c.bench_function("system_separate_n2000", |b| {
        b.iter_batched(
            || {
                let mut system = System::new();
                system.extend(bodies.iter().cloned());
                system
            },
            |mut system| black_box(system.separate()),
            BatchSize::LargeInput,
        )
    });
}

fn bench_raycast(c: &mut Criterion) {
    let mut system = System::new();
    system.extend(gen_bodies(4000, 2000.0));
    let mut rng = Rng::new(0xBADC_F00D_1234_5678);
    let rays: Vec<(Point, Point)> = (0..64)
        .map(|_| {
            let a = Point::new(rng.next_f64() * 2000.0, rng.next_f64() * 2000.0);
            let b = Point::new(rng.next_f64() * 2000.0, rng.next_f64() * 2000.0);
            (a, b)
        })
        .collect();
    c.bench_function("system_raycast_64_rays", |b| {
        b.iter(|| {
            let hits = rays
                .iter()
                .filter_map(|&(s, e)| system.raycast(s, e, |_, _| true))
                .count();
            black_box(hits)
        });
    });
}

criterion_group!(benches, bench_check_all, bench_separate, bench_raycast);
criterion_main!(benches);
