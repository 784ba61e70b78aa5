// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types shared by bodies and the system: handles, flags, and options.

use kurbo::Vec2;

/// Identifier for a body owned by a [`System`](crate::System).
///
/// A slot index plus a generation counter. Removing a body frees its slot; when
/// the slot is reused the generation increments, so a stale handle never
/// aliases the new occupant.
///
/// Handles order by slot first, which is also the order
/// [`System::check_all`](crate::System::check_all) visits bodies in.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyHandle(pub(crate) u32, pub(crate) u32);

impl BodyHandle {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }

    /// Generation of the slot this handle was issued for.
    pub const fn generation(self) -> u32 {
        self.1
    }
}

bitflags::bitflags! {
    /// Per-body behavior flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct BodyFlags: u8 {
        /// Never moved by [`System::separate`](crate::System::separate); still collides.
        const STATIC   = 0b0000_0001;
        /// Reported by checks but ignored by separation.
        const TRIGGER  = 0b0000_0010;
        /// `position` is the shape's centroid rather than its first vertex or corner.
        const CENTERED = 0b0000_0100;
    }
}

impl Default for BodyFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// The shape variant of a [`Body`](crate::Body).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BodyKind {
    /// A single point.
    Point,
    /// A circle around `position`.
    Circle,
    /// A segment from `position` to an end point.
    Line,
    /// An axis-aligned rectangle before rotation, four vertices.
    Box,
    /// A polygonal approximation of an ellipse around `position`.
    Ellipse,
    /// A caller-supplied convex polygon.
    Polygon,
}

/// Creation-time options for a [`Body`](crate::Body).
///
/// ```
/// use understory_collide::{BodyFlags, BodyOptions};
///
/// let opts = BodyOptions { flags: BodyFlags::STATIC, padding: 2.0, ..Default::default() };
/// assert_eq!(opts.angle, 0.0);
/// ```
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BodyOptions {
    /// Behavior flags.
    pub flags: BodyFlags,
    /// Slack added around the bounding box stored in the broad phase. Negative
    /// values are treated as zero.
    pub padding: f64,
    /// Initial rotation in radians. Ignored by points and circles.
    pub angle: f64,
    /// Initial scale. Circles use `x` only.
    pub scale: Vec2,
}

impl Default for BodyOptions {
    fn default() -> Self {
        Self {
            flags: BodyFlags::default(),
            padding: 0.0,
            angle: 0.0,
            scale: Vec2::new(1.0, 1.0),
        }
    }
}
