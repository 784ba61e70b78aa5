// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Broad: a dynamic 2D R-tree for collision broad phases.
//!
//! The tree maps caller keys to axis-aligned [`kurbo::Rect`]s and answers
//! "which boxes might touch this one?" quickly enough to run every frame.
//!
//! - Insert, relocate, and remove rectangles by key; a key is never stored twice.
//! - Query by rectangle or point. Intersection is inclusive, so boxes that only
//!   touch are reported; a broad phase must never drop a real contact.
//! - Bulk load with Sort-Tile-Recursive packing, and let the tree rebuild itself
//!   once enough removals and relocations have degraded its layout.
//! - Walk the node hierarchy with [`Tree::nodes`] to draw it.
//!
//! Node splits use a SAH-like heuristic: children are sorted by centroid along
//! each axis and the cut minimizing `area(L) * |L| + area(R) * |R|` wins.
//!
//! # Example
//!
//! ```rust
//! use kurbo::{Point, Rect};
//! use understory_broad::Tree;
//!
//! let mut tree: Tree<u32> = Tree::new();
//! tree.insert(1, Rect::new(0.0, 0.0, 10.0, 10.0));
//! tree.insert(2, Rect::new(10.0, 0.0, 20.0, 10.0));
//!
//! // Touching boxes are reported.
//! let mut hits: Vec<u32> = tree.query_rect(Rect::new(9.0, 2.0, 10.0, 3.0)).map(|(k, _)| k).collect();
//! hits.sort();
//! assert_eq!(hits, [1, 2]);
//!
//! // Move the first box away.
//! tree.update(1, Rect::new(100.0, 100.0, 110.0, 110.0));
//! assert_eq!(tree.query_point(Point::new(105.0, 105.0)).count(), 1);
//! ```
//!
//! ### Float semantics
//!
//! Rectangles are assumed to be free of NaNs. Degenerate (zero-area) rectangles
//! are fine and are how points and axis-aligned segments are indexed.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod tree;
mod types;

pub use tree::{Query, Tree};
pub use types::{NodeView, TreeConfig, contains_rect, intersects};
