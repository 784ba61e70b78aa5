// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Collide: 2D collision detection over Kurbo geometry.
//!
//! A two-stage pipeline for simulations and games:
//!
//! - A broad phase ([`understory_broad::Tree`]) keeps every body's padded
//!   bounding box in a dynamic R-tree and turns the all-pairs problem into a
//!   short list of [potentials](System::potentials) per body.
//! - A narrow phase ([`narrow`]) confirms overlap with the Separating Axis
//!   Theorem and returns the minimum translation that separates the pair.
//!
//! On top of that, [`System`] reports overlaps for one body or for every pair,
//! nudges bodies apart with [`System::separate`], and answers
//! [raycasts](System::raycast).
//!
//! Bodies are convex: points, circles, segments, boxes, ellipses (as
//! polygons), and caller-supplied polygons. Detection only: there is no
//! velocity, mass, or impulse anywhere in this crate.
//!
//! # Example
//!
//! ```rust
//! use core::ops::ControlFlow;
//! use kurbo::Point;
//! use understory_collide::{Body, BodyFlags, BodyOptions, System};
//!
//! let mut system = System::new();
//! let floor = system.insert(Body::rect_with(
//!     Point::new(0.0, 100.0),
//!     200.0,
//!     20.0,
//!     BodyOptions { flags: BodyFlags::STATIC, ..Default::default() },
//! ));
//! let ball = system.insert(Body::circle(Point::new(50.0, 95.0), 10.0));
//!
//! // The ball sinks into the floor.
//! let mut hits = Vec::new();
//! let _ = system.check_one(ball, |r| {
//!     hits.push(r.b);
//!     ControlFlow::Continue(())
//! });
//! assert_eq!(hits, [floor]);
//!
//! // Separation moves the ball, never the static floor.
//! system.separate();
//! assert!(!system.check_collision(ball, floor));
//! assert_eq!(system.body(floor).unwrap().position(), Point::new(0.0, 100.0));
//!
//! // Rays stop at the nearest body.
//! let hit = system
//!     .raycast(Point::new(150.0, 0.0), Point::new(150.0, 200.0), |_, _| true)
//!     .unwrap();
//! assert_eq!(hit.body, floor);
//! assert!((hit.distance - 100.0).abs() < 1e-9);
//! ```
//!
//! ## Contact policy
//!
//! Shapes that only touch (zero penetration, within [`narrow::EPSILON`]) are
//! not colliding. A point exactly on a segment is the exception and is
//! reported with zero depth.
//!
//! ## Features
//!
//! - `std` (default): use the standard library for float math.
//! - `libm`: float math through `libm` for `no_std` targets.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod body;
mod error;
pub mod narrow;
mod system;
mod types;

pub use body::{Body, MIN_ELLIPSE_STEPS};
pub use error::Error;
pub use narrow::Overlap;
pub use system::{RaycastHit, Response, System, SystemConfig};
pub use types::{BodyFlags, BodyHandle, BodyKind, BodyOptions};

pub use understory_broad::{self, NodeView, TreeConfig};
