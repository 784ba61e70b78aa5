// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Broad phase nodes.
//!
//! Scatter bodies, move them around, and dump the R-tree layout as the
//! system sees it.
//!
//! Run:
//! - `RUST_LOG=trace cargo run -p understory_collide_demos --example broad_phase_nodes`

use kurbo::{Point, Vec2};
use understory_broad::TreeConfig;
use understory_collide::{Body, BodyOptions, System, SystemConfig};

fn main() {
    env_logger::init();

    let mut system = System::with_config(SystemConfig {
        tree: TreeConfig {
            max_children: 4,
            min_children: 2,
            ..Default::default()
        },
        ..Default::default()
    });

    let options = BodyOptions {
        padding: 5.0,
        ..Default::default()
    };
    let handles = system.extend((0..40).map(|i| {
        let x = f64::from(i % 8) * 30.0;
        let y = f64::from(i / 8) * 30.0;
        Body::circle_with(Point::new(x, y), 8.0, options)
    }));
    print_nodes(&system, "after bulk load");

    // Small moves stay inside the padded boxes; big ones relocate.
    for (i, &h) in handles.iter().enumerate() {
        let delta = if i % 5 == 0 {
            Vec2::new(120.0, 60.0)
        } else {
            Vec2::new(2.0, -2.0)
        };
        system.translate(h, delta).unwrap();
    }
    print_nodes(&system, "after moves");

    let near = system.query_point(Point::new(122.0, 58.0));
    log::info!("bodies whose box covers (122, 58): {near:?}");
    system.tree().validate();
}

fn print_nodes(system: &System, label: &str) {
    println!("{label}: {} bodies, height {}", system.len(), system.tree().height());
    for node in system.tree().nodes() {
        println!(
            "{:indent$}{} {} entries {:?}",
            "",
            if node.is_leaf { "leaf" } else { "node" },
            node.len,
            node.bbox,
            indent = node.depth * 2
        );
    }
}
