// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Collide basics.
//!
//! Drop a few bodies onto a static floor, list the overlaps, and separate them.
//!
//! Run:
//! - `RUST_LOG=debug cargo run -p understory_collide_demos --example collide_basics`

use core::ops::ControlFlow;

use kurbo::{Point, Vec2};
use understory_collide::{Body, BodyFlags, BodyOptions, System};

fn main() {
    env_logger::init();

    let mut system = System::new();
    let floor = system.insert(Body::rect_with(
        Point::new(0.0, 100.0),
        300.0,
        20.0,
        BodyOptions {
            flags: BodyFlags::STATIC,
            ..Default::default()
        },
    ));
    let ball = system.insert(Body::circle(Point::new(40.0, 95.0), 10.0));
    let crate_box = system.insert(Body::rect(Point::new(120.0, 85.0), 30.0, 30.0));
    let wedge = system.insert(Body::polygon(
        Point::new(200.0, 90.0),
        [Vec2::ZERO, Vec2::new(40.0, 0.0), Vec2::new(0.0, 20.0)],
    ));
    let sensor = system.insert(Body::circle_with(
        Point::new(45.0, 95.0),
        20.0,
        BodyOptions {
            flags: BodyFlags::TRIGGER,
            ..Default::default()
        },
    ));

    println!("before separation:");
    let _ = system.check_all(|r| {
        println!(
            "  {:?} x {:?}: depth {:.3} along {:?}",
            r.a, r.b, r.overlap.depth, r.overlap.normal
        );
        ControlFlow::Continue(())
    });

    let corrections = system.separate();
    println!("applied {corrections} correction(s)");

    for handle in [ball, crate_box, wedge] {
        assert!(
            !system.check_collision(handle, floor),
            "{handle:?} should rest on the floor"
        );
        let body = system.body(handle).unwrap();
        println!("  {:?} now at {:?}", body.kind(), body.position());
    }

    // Triggers report overlaps but are never pushed around.
    let mut sensed = Vec::new();
    let _ = system.check_one(sensor, |r| {
        sensed.push(r.b);
        ControlFlow::Continue(())
    });
    println!("sensor overlaps {sensed:?}");
    assert_eq!(
        system.body(sensor).unwrap().position(),
        Point::new(45.0, 95.0),
        "trigger bodies stay put"
    );
}
