// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Raycast scan.
//!
//! Sweep a fan of rays from the origin and report what each one hits first.
//!
//! Run:
//! - `cargo run -p understory_collide_demos --example raycast_scan`

use kurbo::{Point, Vec2};
use understory_collide::{Body, BodyKind, System};

fn main() {
    env_logger::init();

    let mut system = System::new();
    system.insert(Body::circle(Point::new(80.0, 10.0), 12.0));
    system.insert(Body::rect(Point::new(40.0, 50.0), 20.0, 30.0));
    system.insert(Body::ellipse(Point::new(10.0, 90.0), 15.0, 6.0, None));
    system.insert(Body::line(Point::new(120.0, -40.0), Point::new(120.0, 140.0)));
    system.insert(Body::point(Point::new(60.0, 0.0)));

    let origin = Point::ORIGIN;
    for step in 0..=8 {
        let angle = f64::from(step) * core::f64::consts::FRAC_PI_2 / 8.0;
        let end = origin + Vec2::from_angle(angle) * 200.0;
        // Skip bare points; rays through them are a curiosity, not cover.
        let hit = system.raycast(origin, end, |_, body| body.kind() != BodyKind::Point);
        match hit {
            Some(hit) => {
                let kind = system.body(hit.body).map(|b| b.kind());
                println!(
                    "{:5.1} deg: {:?} at ({:.1}, {:.1}), distance {:.1}",
                    angle.to_degrees(),
                    kind,
                    hit.point.x,
                    hit.point.y,
                    hit.distance
                );
            }
            None => println!("{:5.1} deg: clear", angle.to_degrees()),
        }
    }
}
