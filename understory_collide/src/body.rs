// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bodies: shape, placement, and cached world-space geometry.

use alloc::vec;
use alloc::vec::Vec;
use core::f64::consts::{PI, TAU};

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs;
use kurbo::{Affine, Point, Rect, Vec2};

use crate::types::{BodyFlags, BodyKind, BodyOptions};

/// Smallest vertex count used for ellipses.
pub const MIN_ELLIPSE_STEPS: usize = 4;

const DEFAULT_ELLIPSE_STEPS: (usize, usize) = (8, 64);

#[derive(Clone, Debug)]
enum Shape {
    Point,
    Circle {
        radius: f64,
    },
    /// Lines, boxes, ellipses, and polygons. `offset` is subtracted from every
    /// vertex and is the centroid of `base` while the body is centered.
    Polygon {
        kind: BodyKind,
        base: Vec<Vec2>,
        offset: Vec2,
    },
}

/// A convex collision body.
///
/// World geometry is `position + rotate(angle) * (scale * local)`. The bounding
/// box and world vertices are cached and recomputed by every mutator, so
/// reading them is free.
///
/// ```
/// use kurbo::{Point, Rect};
/// use understory_collide::Body;
///
/// let mut b = Body::rect(Point::new(10.0, 10.0), 4.0, 2.0);
/// assert_eq!(b.bbox(), Rect::new(10.0, 10.0, 14.0, 12.0));
/// b.set_scale(2.0, 2.0);
/// assert_eq!(b.bbox(), Rect::new(10.0, 10.0, 18.0, 14.0));
/// ```
#[derive(Clone, Debug)]
pub struct Body {
    shape: Shape,
    position: Point,
    angle: f64,
    scale: Vec2,
    padding: f64,
    flags: BodyFlags,
    bbox: Rect,
    world: Vec<Point>,
}

impl Body {
    /// A point at `position`.
    pub fn point(position: Point) -> Self {
        Self::point_with(position, BodyOptions::default())
    }

    /// A point with options.
    pub fn point_with(position: Point, options: BodyOptions) -> Self {
        Self::build(Shape::Point, position, options)
    }

    /// A circle of `radius` around `position`. Negative radii are treated as zero.
    pub fn circle(position: Point, radius: f64) -> Self {
        Self::circle_with(position, radius, BodyOptions::default())
    }

    /// A circle with options.
    pub fn circle_with(position: Point, radius: f64, options: BodyOptions) -> Self {
        Self::build(
            Shape::Circle {
                radius: radius.max(0.0),
            },
            position,
            options,
        )
    }

    /// A segment from `start` to `end`; `position` is `start`.
    pub fn line(start: Point, end: Point) -> Self {
        Self::line_with(start, end, BodyOptions::default())
    }

    /// A segment with options.
    pub fn line_with(start: Point, end: Point, options: BodyOptions) -> Self {
        let base = vec![Vec2::ZERO, end - start];
        Self::polygon_shape(BodyKind::Line, start, base, options)
    }

    /// A `width` by `height` box whose corner (or center, with
    /// [`BodyFlags::CENTERED`]) sits at `position`.
    pub fn rect(position: Point, width: f64, height: f64) -> Self {
        Self::rect_with(position, width, height, BodyOptions::default())
    }

    /// A box with options.
    pub fn rect_with(position: Point, width: f64, height: f64, options: BodyOptions) -> Self {
        let base = vec![
            Vec2::ZERO,
            Vec2::new(width, 0.0),
            Vec2::new(width, height),
            Vec2::new(0.0, height),
        ];
        Self::polygon_shape(BodyKind::Box, position, base, options)
    }

    /// An ellipse around `position` approximated by `steps` vertices.
    ///
    /// Without an explicit count the vertex count follows the perimeter,
    /// between 8 and 64. Explicit counts below [`MIN_ELLIPSE_STEPS`] are raised.
    pub fn ellipse(position: Point, radius_x: f64, radius_y: f64, steps: Option<usize>) -> Self {
        Self::ellipse_with(position, radius_x, radius_y, steps, BodyOptions::default())
    }

    /// An ellipse with options.
    pub fn ellipse_with(
        position: Point,
        radius_x: f64,
        radius_y: f64,
        steps: Option<usize>,
        options: BodyOptions,
    ) -> Self {
        let n = steps
            .unwrap_or_else(|| default_ellipse_steps(radius_x, radius_y))
            .max(MIN_ELLIPSE_STEPS);
        let base = (0..n)
            .map(|i| {
                let theta = TAU * i as f64 / n as f64;
                Vec2::new(radius_x * theta.cos(), radius_y * theta.sin())
            })
            .collect();
        Self::polygon_shape(BodyKind::Ellipse, position, base, options)
    }

    /// A convex polygon with vertices given relative to `position`, in a
    /// consistent winding.
    pub fn polygon(position: Point, points: impl IntoIterator<Item = Vec2>) -> Self {
        Self::polygon_with(position, points, BodyOptions::default())
    }

    /// A polygon with options.
    pub fn polygon_with(
        position: Point,
        points: impl IntoIterator<Item = Vec2>,
        options: BodyOptions,
    ) -> Self {
        let base = points.into_iter().collect();
        Self::polygon_shape(BodyKind::Polygon, position, base, options)
    }

    fn polygon_shape(kind: BodyKind, position: Point, base: Vec<Vec2>, options: BodyOptions) -> Self {
        let offset = if options.flags.contains(BodyFlags::CENTERED) {
            centroid(&base)
        } else {
            Vec2::ZERO
        };
        Self::build(Shape::Polygon { kind, base, offset }, position, options)
    }

    fn build(shape: Shape, position: Point, options: BodyOptions) -> Self {
        let mut body = Self {
            shape,
            position,
            angle: options.angle,
            scale: options.scale,
            padding: options.padding.max(0.0),
            flags: options.flags,
            bbox: Rect::ZERO,
            world: Vec::new(),
        };
        body.refresh();
        body
    }

    /// The shape variant.
    pub fn kind(&self) -> BodyKind {
        match &self.shape {
            Shape::Point => BodyKind::Point,
            Shape::Circle { .. } => BodyKind::Circle,
            Shape::Polygon { kind, .. } => *kind,
        }
    }

    /// Reference origin of the shape.
    pub fn position(&self) -> Point {
        self.position
    }

    /// Rotation in radians.
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Scale applied to local geometry.
    pub fn scale(&self) -> Vec2 {
        self.scale
    }

    /// Broad-phase slack around the bounding box.
    pub fn padding(&self) -> f64 {
        self.padding
    }

    /// Behavior flags.
    pub fn flags(&self) -> BodyFlags {
        self.flags
    }

    /// Whether separation leaves this body in place.
    pub fn is_static(&self) -> bool {
        self.flags.contains(BodyFlags::STATIC)
    }

    /// Whether this body is excluded from separation.
    pub fn is_trigger(&self) -> bool {
        self.flags.contains(BodyFlags::TRIGGER)
    }

    /// Whether `position` is the shape's centroid. Always true for points and circles.
    pub fn is_centered(&self) -> bool {
        match self.shape {
            Shape::Point | Shape::Circle { .. } => true,
            Shape::Polygon { .. } => self.flags.contains(BodyFlags::CENTERED),
        }
    }

    /// Every body kind is convex.
    pub fn is_convex(&self) -> bool {
        true
    }

    /// Exact world-space bounding box.
    pub fn bbox(&self) -> Rect {
        self.bbox
    }

    /// Bounding box grown by [`padding`](Self::padding), as stored in the broad phase.
    pub fn padded_bbox(&self) -> Rect {
        self.bbox.inflate(self.padding, self.padding)
    }

    /// Scaled radius for circles.
    pub fn radius(&self) -> Option<f64> {
        match self.shape {
            Shape::Circle { radius } => Some(radius * self.scale.x.abs()),
            Shape::Point | Shape::Polygon { .. } => None,
        }
    }

    /// World-space vertices of lines and the polygon family; empty otherwise.
    pub fn world_points(&self) -> &[Point] {
        &self.world
    }

    /// Vertices relative to `position` before rotation and scale, with the
    /// centering offset applied.
    pub fn local_points(&self) -> impl Iterator<Item = Vec2> + '_ {
        let (base, offset): (&[Vec2], Vec2) = match &self.shape {
            Shape::Polygon { base, offset, .. } => (base, *offset),
            Shape::Point | Shape::Circle { .. } => (&[], Vec2::ZERO),
        };
        base.iter().map(move |v| *v - offset)
    }

    /// Local-to-world transform.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.position.to_vec2())
            * Affine::rotate(self.angle)
            * Affine::scale_non_uniform(self.scale.x, self.scale.y)
    }

    /// Move the reference origin.
    pub fn set_position(&mut self, position: Point) {
        self.position = position;
        self.refresh();
    }

    /// Move by `delta`.
    pub fn translate(&mut self, delta: Vec2) {
        self.set_position(self.position + delta);
    }

    /// Set the rotation in radians.
    pub fn set_angle(&mut self, angle: f64) {
        self.angle = angle;
        self.refresh();
    }

    /// Rotate by `delta` radians on top of the current angle.
    pub fn rotate(&mut self, delta: f64) {
        self.set_angle(self.angle + delta);
    }

    /// Set the scale. Circles use `x` for their radius and ignore `y`.
    pub fn set_scale(&mut self, x: f64, y: f64) {
        self.scale = match self.shape {
            Shape::Circle { .. } => Vec2::new(x, x),
            Shape::Point | Shape::Polygon { .. } => Vec2::new(x, y),
        };
        self.refresh();
    }

    /// Set the broad-phase slack. Negative values are treated as zero.
    pub fn set_padding(&mut self, padding: f64) {
        self.padding = padding.max(0.0);
    }

    /// Replace the behavior flags; toggling [`BodyFlags::CENTERED`] recenters.
    pub fn set_flags(&mut self, flags: BodyFlags) {
        let centered = flags.contains(BodyFlags::CENTERED);
        self.flags = flags;
        self.set_centered(centered);
    }

    /// Anchor polygon-family vertices at their centroid, or restore the
    /// original anchoring. No effect on the geometry of points and circles.
    pub fn set_centered(&mut self, centered: bool) {
        self.flags.set(BodyFlags::CENTERED, centered);
        if let Shape::Polygon { base, offset, .. } = &mut self.shape {
            *offset = if centered { centroid(base) } else { Vec2::ZERO };
            self.refresh();
        }
    }

    fn refresh(&mut self) {
        let xf = self.transform();
        self.world.clear();
        if let Shape::Polygon { base, offset, .. } = &self.shape {
            self.world
                .extend(base.iter().map(|v| xf * (*v - *offset).to_point()));
        }
        let p = self.position;
        self.bbox = match self.shape {
            Shape::Point => Rect::from_points(p, p),
            Shape::Circle { radius } => {
                let r = radius * self.scale.x.abs();
                Rect::new(p.x - r, p.y - r, p.x + r, p.y + r)
            }
            Shape::Polygon { .. } => bounds_of(&self.world).unwrap_or(Rect::from_points(p, p)),
        };
        debug_assert!(
            self.bbox.x0 <= self.bbox.x1 && self.bbox.y0 <= self.bbox.y1,
            "bounding box must be ordered"
        );
    }
}

fn default_ellipse_steps(radius_x: f64, radius_y: f64) -> usize {
    let (lo, hi) = DEFAULT_ELLIPSE_STEPS;
    let n = (PI * (radius_x.abs() + radius_y.abs()) / 8.0)
        .ceil()
        .clamp(lo as f64, hi as f64);
    #[allow(
        clippy::cast_possible_truncation,
        reason = "clamped to a small positive range; NaN maps to zero and is raised below"
    )]
    let n = n as usize;
    n.max(lo)
}

fn bounds_of(points: &[Point]) -> Option<Rect> {
    let (first, rest) = points.split_first()?;
    Some(
        rest.iter()
            .fold(Rect::from_points(*first, *first), |r, p| r.union_pt(*p)),
    )
}

/// Area centroid, falling back to the vertex mean for degenerate outlines.
fn centroid(points: &[Vec2]) -> Vec2 {
    if points.is_empty() {
        return Vec2::ZERO;
    }
    let n = points.len();
    let mut twice_area = 0.0;
    let mut acc = Vec2::ZERO;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        let cross = a.cross(b);
        twice_area += cross;
        acc += (a + b) * cross;
    }
    if twice_area.abs() > 1e-12 {
        acc / (3.0 * twice_area)
    } else {
        let inv = 1.0 / n as f64;
        points.iter().fold(Vec2::ZERO, |s, p| s + *p) * inv
    }
}
