// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree configuration, traversal views, and rectangle helpers.

use core::cmp::Ordering;

use kurbo::Rect;

/// Tuning knobs for [`Tree`](crate::Tree).
///
/// Use struct-update syntax to override a subset:
///
/// ```
/// use understory_broad::TreeConfig;
///
/// let cfg = TreeConfig { max_children: 16, ..Default::default() };
/// assert_eq!(cfg.normalized().min_children, 4);
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TreeConfig {
    /// Fill threshold: a node holding more than this many children is split.
    pub max_children: usize,
    /// Minimum number of children on either side of a split.
    pub min_children: usize,
    /// Structural churn (removals and relocations) tolerated before the tree
    /// rebuilds itself in bulk, as a fraction of the item count.
    ///
    /// Zero, negative, or non-finite values disable automatic rebuilds.
    pub rebuild_ratio: f64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_children: 9,
            min_children: 4,
            rebuild_ratio: 0.5,
        }
    }
}

impl TreeConfig {
    /// Smallest accepted `max_children`.
    pub const MIN_FILL: usize = 4;

    /// Clamp the configuration into a range the split heuristic can honor.
    ///
    /// `max_children` is raised to at least [`Self::MIN_FILL`] and
    /// `min_children` is kept within `2..=max_children / 2`.
    #[must_use]
    pub fn normalized(self) -> Self {
        let max_children = self.max_children.max(Self::MIN_FILL);
        let min_children = self.min_children.clamp(2, max_children / 2);
        Self {
            max_children,
            min_children,
            rebuild_ratio: self.rebuild_ratio,
        }
    }
}

/// A node of the tree as seen by a depth-first traversal.
///
/// Returned by [`Tree::nodes`](crate::Tree::nodes); enough to draw the hierarchy.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct NodeView {
    /// Bounding box covering the node's subtree.
    pub bbox: Rect,
    /// Depth from the root (root is 0).
    pub depth: usize,
    /// Whether the node stores items rather than child nodes.
    pub is_leaf: bool,
    /// Number of direct children (items for leaves).
    pub len: usize,
}

/// Inclusive rectangle intersection: touching edges count as intersecting.
#[inline]
pub fn intersects(a: &Rect, b: &Rect) -> bool {
    a.x0 <= b.x1 && b.x0 <= a.x1 && a.y0 <= b.y1 && b.y0 <= a.y1
}

/// Whether `outer` fully contains `inner` (inclusive).
#[inline]
pub fn contains_rect(outer: &Rect, inner: &Rect) -> bool {
    outer.x0 <= inner.x0 && outer.y0 <= inner.y0 && inner.x1 <= outer.x1 && inner.y1 <= outer.y1
}

#[inline]
pub(crate) fn union(a: Rect, b: Rect) -> Rect {
    Rect::new(a.x0.min(b.x0), a.y0.min(b.y0), a.x1.max(b.x1), a.y1.max(b.y1))
}

#[inline]
pub(crate) fn area(r: &Rect) -> f64 {
    (r.x1 - r.x0).max(0.0) * (r.y1 - r.y0).max(0.0)
}

#[inline]
pub(crate) fn margin(r: &Rect) -> f64 {
    (r.x1 - r.x0).max(0.0) + (r.y1 - r.y0).max(0.0)
}

#[inline]
pub(crate) fn enlargement(r: &Rect, with: &Rect) -> f64 {
    area(&union(*r, *with)) - area(r)
}

/// Split axis used by the SAH-like heuristic and the STR bulk loader.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Axis {
    X,
    Y,
}

impl Axis {
    pub(crate) const BOTH: [Self; 2] = [Self::X, Self::Y];

    #[inline]
    pub(crate) fn mid(self, r: &Rect) -> f64 {
        match self {
            Self::X => 0.5 * (r.x0 + r.x1),
            Self::Y => 0.5 * (r.y0 + r.y1),
        }
    }

    #[inline]
    pub(crate) fn order(self, a: &Rect, b: &Rect) -> Ordering {
        self.mid(a).partial_cmp(&self.mid(b)).unwrap_or(Ordering::Equal)
    }
}
