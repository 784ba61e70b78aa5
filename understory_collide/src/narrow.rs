// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Narrow phase: exact pairwise overlap tests and ray intersection.
//!
//! Overlap uses the Separating Axis Theorem. Candidate axes are the unit
//! normals of every non-degenerate edge, the direction of a segment, and for
//! circles the axis from the center to the nearest polygon vertex. The axis
//! with the smallest interval overlap gives the separation.
//!
//! Contacts whose depth does not exceed [`EPSILON`] are not collisions, so
//! shapes that merely touch are reported as disjoint. The one exception is a
//! point lying on a segment: that contact is reported with zero depth, since a
//! point can never be strictly inside a segment.

use core::cmp::Ordering;

#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs;
use kurbo::{Point, Vec2};

use crate::Body;
use crate::types::BodyKind;

/// Tolerance for interval comparisons and degenerate lengths.
pub const EPSILON: f64 = 1e-9;

/// Result of a positive overlap test between bodies `a` and `b`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Overlap {
    /// Penetration depth along [`normal`](Self::normal).
    pub depth: f64,
    /// Unit direction in which to move `a` to separate it from `b`.
    pub normal: Vec2,
    /// `a` lies entirely inside `b`.
    pub a_in_b: bool,
    /// `b` lies entirely inside `a`.
    pub b_in_a: bool,
}

impl Overlap {
    /// Minimum translation vector: moving `a` by this (or `b` by its negation)
    /// leaves the pair touching but no longer overlapping.
    pub fn mtv(&self) -> Vec2 {
        self.normal * self.depth
    }

    fn flipped(self) -> Self {
        Self {
            depth: self.depth,
            normal: -self.normal,
            a_in_b: self.b_in_a,
            b_in_a: self.a_in_b,
        }
    }
}

/// World geometry reduced to what the tests dispatch on.
#[derive(Copy, Clone, Debug)]
enum Geom<'a> {
    Empty,
    Point(Point),
    Circle(Point, f64),
    /// At least two distinct vertices; exactly two is a segment.
    Poly(&'a [Point]),
}

fn geom(body: &Body) -> Geom<'_> {
    match body.kind() {
        BodyKind::Point => Geom::Point(body.position()),
        BodyKind::Circle => Geom::Circle(body.position(), body.radius().unwrap_or(0.0)),
        BodyKind::Line | BodyKind::Box | BodyKind::Ellipse | BodyKind::Polygon => {
            match body.world_points() {
                [] => Geom::Empty,
                [first, rest @ ..]
                    if rest
                        .iter()
                        .all(|p| (*p - *first).length_squared() <= EPSILON * EPSILON) =>
                {
                    Geom::Point(*first)
                }
                points => Geom::Poly(points),
            }
        }
    }
}

/// Test `a` against `b`; `None` when they do not overlap.
///
/// ```
/// use kurbo::Point;
/// use understory_collide::{Body, narrow};
///
/// let a = Body::circle(Point::new(0.0, 0.0), 2.0);
/// let b = Body::circle(Point::new(3.0, 0.0), 2.0);
/// let hit = narrow::test(&a, &b).unwrap();
/// assert!((hit.depth - 1.0).abs() < 1e-12);
/// assert!((hit.mtv().x + 1.0).abs() < 1e-12);
/// ```
pub fn test(a: &Body, b: &Body) -> Option<Overlap> {
    match (geom(a), geom(b)) {
        (Geom::Empty, _) | (_, Geom::Empty) => None,
        (Geom::Point(p), Geom::Point(q)) => circles(p, 0.0, q, 0.0),
        (Geom::Point(p), Geom::Circle(c, r)) => circles(p, 0.0, c, r),
        (Geom::Circle(c, r), Geom::Point(p)) => circles(c, r, p, 0.0),
        (Geom::Circle(ca, ra), Geom::Circle(cb, rb)) => circles(ca, ra, cb, rb),
        (Geom::Point(p), Geom::Poly(poly)) => point_poly(p, poly),
        (Geom::Poly(poly), Geom::Point(p)) => point_poly(p, poly).map(Overlap::flipped),
        (Geom::Circle(c, r), Geom::Poly(poly)) => circle_poly(c, r, poly),
        (Geom::Poly(poly), Geom::Circle(c, r)) => circle_poly(c, r, poly).map(Overlap::flipped),
        (Geom::Poly(pa), Geom::Poly(pb)) => polys(pa, pb),
    }
}

fn circles(ca: Point, ra: f64, cb: Point, rb: f64) -> Option<Overlap> {
    let d = ca - cb;
    let sum = ra + rb;
    let dist2 = d.length_squared();
    if dist2 >= sum * sum {
        return None;
    }
    let dist = dist2.sqrt();
    let depth = sum - dist;
    if depth <= EPSILON {
        return None;
    }
    let normal = unit(d).unwrap_or(Vec2::new(1.0, 0.0));
    Some(Overlap {
        depth,
        normal,
        a_in_b: ra <= rb && dist <= rb - ra,
        b_in_a: rb <= ra && dist <= ra - rb,
    })
}

fn point_poly(p: Point, poly: &[Point]) -> Option<Overlap> {
    if let [s0, s1] = *poly {
        return on_segment(p, s0, s1).then(|| Overlap {
            depth: 0.0,
            normal: unit(perp(s1 - s0)).unwrap_or(Vec2::new(1.0, 0.0)),
            a_in_b: true,
            b_in_a: false,
        });
    }
    polys(&[p], poly)
}

fn circle_poly(c: Point, r: f64, poly: &[Point]) -> Option<Overlap> {
    let nearest = poly.iter().min_by(|x, y| {
        (c - **x)
            .length_squared()
            .partial_cmp(&(c - **y).length_squared())
            .unwrap_or(Ordering::Equal)
    });
    let vertex_axis = nearest.and_then(|v| unit(c - *v));
    let mut sat = Sat::new();
    for axis in axes(poly).chain(vertex_axis) {
        let m = c.to_vec2().dot(axis);
        sat.axis(axis, (m - r, m + r), project(poly, axis))?;
    }
    // Projections cannot prove a polygon sits inside a disc; every vertex must.
    let reach = r + EPSILON;
    let poly_in_circle = poly.iter().all(|v| (*v - c).length_squared() <= reach * reach);
    sat.finish().map(|o| Overlap {
        b_in_a: poly_in_circle,
        ..o
    })
}

fn polys(a: &[Point], b: &[Point]) -> Option<Overlap> {
    let mut sat = Sat::new();
    for axis in axes(a).chain(axes(b)) {
        sat.axis(axis, project(a, axis), project(b, axis))?;
    }
    sat.finish()
}

/// Running minimum over the tested axes.
struct Sat {
    depth: f64,
    normal: Vec2,
    a_in_b: bool,
    b_in_a: bool,
}

impl Sat {
    fn new() -> Self {
        Self {
            depth: f64::INFINITY,
            normal: Vec2::ZERO,
            a_in_b: true,
            b_in_a: true,
        }
    }

    /// `None` when `axis` separates the projected intervals.
    fn axis(&mut self, axis: Vec2, a: (f64, f64), b: (f64, f64)) -> Option<()> {
        // Moving `a` by -axis * `back` or +axis * `forward` clears `b`.
        let back = a.1 - b.0;
        let forward = b.1 - a.0;
        let (depth, normal) = if back < forward {
            (back, -axis)
        } else {
            (forward, axis)
        };
        if depth <= EPSILON {
            return None;
        }
        self.a_in_b &= a.0 >= b.0 && a.1 <= b.1;
        self.b_in_a &= b.0 >= a.0 && b.1 <= a.1;
        if depth < self.depth {
            self.depth = depth;
            self.normal = normal;
        }
        Some(())
    }

    fn finish(self) -> Option<Overlap> {
        self.depth.is_finite().then_some(Overlap {
            depth: self.depth,
            normal: self.normal,
            a_in_b: self.a_in_b,
            b_in_a: self.b_in_a,
        })
    }
}

fn perp(v: Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}

fn unit(v: Vec2) -> Option<Vec2> {
    let len = v.length();
    (len > EPSILON).then(|| v / len)
}

fn edge_count(n: usize) -> usize {
    // A segment has one edge; closed outlines wrap around.
    if n > 2 { n } else { n.saturating_sub(1) }
}

fn axes(poly: &[Point]) -> impl Iterator<Item = Vec2> + '_ {
    let n = poly.len();
    let direction = match *poly {
        [s0, s1] => unit(s1 - s0),
        _ => None,
    };
    (0..edge_count(n))
        .filter_map(move |i| unit(perp(poly[(i + 1) % n] - poly[i])))
        .chain(direction)
}

fn project(poly: &[Point], axis: Vec2) -> (f64, f64) {
    poly.iter()
        .map(|p| p.to_vec2().dot(axis))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        })
}

fn on_segment(p: Point, a: Point, b: Point) -> bool {
    let ab = b - a;
    let len2 = ab.length_squared();
    let t = if len2 > 0.0 {
        ((p - a).dot(ab) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (a + ab * t - p).length() <= EPSILON
}

/// Nearest intersection of the segment `start → end` with `body`.
///
/// Returns the hit point and its distance from `start`. A segment starting
/// inside a circle or polygon hits where it leaves the shape. Zero-length
/// segments never hit.
pub fn ray_cast(body: &Body, start: Point, end: Point) -> Option<(Point, f64)> {
    let d = end - start;
    let len = d.length();
    if len <= EPSILON {
        return None;
    }
    let t = match geom(body) {
        Geom::Empty => None,
        Geom::Point(p) => {
            on_segment(p, start, end).then(|| ((p - start).dot(d) / (len * len)).clamp(0.0, 1.0))
        }
        Geom::Circle(c, r) => ray_circle(start, d, c, r),
        Geom::Poly(poly) => ray_poly(start, d, poly),
    }?;
    Some((start + d * t, t * len))
}

fn ray_circle(start: Point, d: Vec2, c: Point, r: f64) -> Option<f64> {
    let f = start - c;
    let a = d.dot(d);
    let b = 2.0 * f.dot(d);
    let k = f.dot(f) - r * r;
    let disc = b * b - 4.0 * a * k;
    if disc < 0.0 {
        return None;
    }
    let s = disc.sqrt();
    [(-b - s) / (2.0 * a), (-b + s) / (2.0 * a)]
        .into_iter()
        .find(|t| (0.0..=1.0).contains(t))
}

fn ray_poly(start: Point, d: Vec2, poly: &[Point]) -> Option<f64> {
    let n = poly.len();
    (0..edge_count(n))
        .filter_map(|i| segment_hit(start, d, poly[i], poly[(i + 1) % n]))
        .min_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))
}

/// Parameter `t` along `start + t * d` where it meets `q0 → q1`.
fn segment_hit(start: Point, d: Vec2, q0: Point, q1: Point) -> Option<f64> {
    let s = q1 - q0;
    let w = q0 - start;
    let denom = d.cross(s);
    let d_len = d.length();
    if denom.abs() <= EPSILON * d_len * s.length() {
        if w.cross(d).abs() > EPSILON * d_len {
            return None;
        }
        // Collinear: first point of the shared stretch.
        let dd = d.dot(d);
        let t0 = w.dot(d) / dd;
        let t1 = (q1 - start).dot(d) / dd;
        let (lo, hi) = (t0.min(t1), t0.max(t1));
        return (hi >= 0.0 && lo <= 1.0).then(|| lo.max(0.0));
    }
    let t = w.cross(s) / denom;
    let u = w.cross(d) / denom;
    ((0.0..=1.0).contains(&t) && (-EPSILON..=1.0 + EPSILON).contains(&u)).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn near(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn circles_overlap_below_radius_sum() {
        let a = Body::circle(Point::new(0.0, 0.0), 1.0);
        let b = Body::circle(Point::new(1.5, 0.0), 1.0);
        let hit = test(&a, &b).unwrap();
        assert!(near(hit.depth, 0.5), "depth {}", hit.depth);
        assert!(near(hit.normal.x, -1.0), "normal {:?}", hit.normal);
        assert!(!hit.a_in_b && !hit.b_in_a, "partial overlap");
    }

    #[test]
    fn tangent_contacts_are_not_collisions() {
        let a = Body::circle(Point::new(0.0, 0.0), 1.0);
        let b = Body::circle(Point::new(2.0, 0.0), 1.0);
        assert!(test(&a, &b).is_none());
        let r1 = Body::rect(Point::new(0.0, 0.0), 10.0, 10.0);
        let r2 = Body::rect(Point::new(10.0, 0.0), 10.0, 10.0);
        assert!(test(&r1, &r2).is_none());
    }

    #[test]
    fn boxes_separate_along_shallowest_axis() {
        let a = Body::rect(Point::new(0.0, 0.0), 10.0, 10.0);
        let mut b = Body::rect(Point::new(8.0, 2.0), 10.0, 6.0);
        let hit = test(&a, &b).unwrap();
        assert!(near(hit.depth, 2.0), "depth {}", hit.depth);
        assert!(near(hit.mtv().x, -2.0) && near(hit.mtv().y, 0.0), "{:?}", hit.mtv());

        let back = test(&b, &a).unwrap();
        assert!(near(back.mtv().x, 2.0), "{:?}", back.mtv());

        b.translate(-hit.mtv());
        assert!(test(&a, &b).is_none(), "applying the mtv must separate");
    }

    #[test]
    fn containment_is_reported() {
        let big = Body::circle(Point::new(0.0, 0.0), 10.0);
        let small = Body::circle(Point::new(1.0, 1.0), 2.0);
        let hit = test(&small, &big).unwrap();
        assert!(hit.a_in_b && !hit.b_in_a, "{hit:?}");

        let room = Body::rect(Point::new(0.0, 0.0), 10.0, 10.0);
        let dot = Body::point(Point::new(3.0, 4.0));
        let hit = test(&room, &dot).unwrap();
        assert!(hit.b_in_a && !hit.a_in_b, "{hit:?}");
        assert!(near(hit.depth, 3.0), "nearest wall is 3 away: {}", hit.depth);
    }

    #[test]
    fn polygon_in_circle_needs_every_vertex_inside() {
        let c = Body::circle(Point::new(0.0, 0.0), 1.0);
        // Corners at (0.9, ±0.6) are about 1.08 from the center.
        let poking = Body::polygon(
            Point::ZERO,
            [
                Vec2::new(0.0, -0.6),
                Vec2::new(0.9, -0.6),
                Vec2::new(0.9, 0.6),
                Vec2::new(0.0, 0.6),
            ],
        );
        let hit = test(&c, &poking).unwrap();
        assert!(!hit.b_in_a && !hit.a_in_b, "{hit:?}");
        assert!(!test(&poking, &c).unwrap().a_in_b, "flipped order agrees");

        let chord = Body::line(Point::new(0.0, -0.9), Point::new(0.9, -0.9));
        let hit = test(&c, &chord).unwrap();
        assert!(!hit.b_in_a, "segment end is outside the circle: {hit:?}");

        let tucked = Body::rect(Point::new(-0.5, -0.5), 1.0, 1.0);
        let hit = test(&c, &tucked).unwrap();
        assert!(hit.b_in_a && !hit.a_in_b, "{hit:?}");
        assert!(test(&tucked, &c).unwrap().a_in_b, "flipped order agrees");

        let inner = Body::line(Point::new(-0.5, 0.0), Point::new(0.5, 0.0));
        assert!(test(&c, &inner).unwrap().b_in_a);
    }

    #[test]
    fn point_cases() {
        let dot = Body::point(Point::new(1.0, 1.0));
        let c = Body::circle(Point::new(0.0, 0.0), 2.0);
        assert!(test(&dot, &c).unwrap().a_in_b);
        assert!(test(&dot, &Body::circle(Point::new(5.0, 5.0), 1.0)).is_none());
        assert!(test(&dot, &Body::point(Point::new(1.0, 1.0))).is_none());

        let line = Body::line(Point::new(0.0, 0.0), Point::new(2.0, 2.0));
        let hit = test(&dot, &line).unwrap();
        assert_eq!(hit.depth, 0.0);
        assert!(test(&line, &dot).unwrap().b_in_a);
        assert!(test(&Body::point(Point::new(1.0, 1.5)), &line).is_none());
        assert!(test(&Body::point(Point::new(3.0, 3.0)), &line).is_none());
    }

    #[test]
    fn crossing_lines_collide() {
        let a = Body::line(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        let b = Body::line(Point::new(0.0, 10.0), Point::new(10.0, 0.0));
        assert!(test(&a, &b).is_some());
        let c = Body::line(Point::new(20.0, 0.0), Point::new(30.0, 10.0));
        assert!(test(&a, &c).is_none());
    }

    #[test]
    fn circle_against_box_corner() {
        let b = Body::rect(Point::new(0.0, 0.0), 10.0, 10.0);
        // Inside both slabs but beyond the corner's reach.
        let miss = Body::circle(Point::new(11.0, 11.0), 1.2);
        assert!(test(&miss, &b).is_none());
        let hit = Body::circle(Point::new(11.0, 11.0), 1.5);
        let o = test(&hit, &b).unwrap();
        assert!(near(o.depth, 1.5 - 2.0_f64.sqrt()), "depth {}", o.depth);
        assert!(o.normal.x > 0.0 && o.normal.y > 0.0, "{:?}", o.normal);
    }

    #[test]
    fn degenerate_polygons_only_collide_as_points() {
        let collapsed = Body::polygon(Point::new(1.0, 1.0), [Vec2::ZERO, Vec2::ZERO, Vec2::ZERO]);
        let room = Body::rect(Point::new(0.0, 0.0), 4.0, 4.0);
        assert!(test(&collapsed, &room).unwrap().a_in_b);
        let empty = Body::polygon(Point::new(1.0, 1.0), []);
        assert!(test(&empty, &room).is_none());
    }

    #[test]
    fn ray_hits_circle_front() {
        let c = Body::circle(Point::new(5.0, 0.0), 1.0);
        let (p, dist) = ray_cast(&c, Point::new(0.0, 0.0), Point::new(10.0, 0.0)).unwrap();
        assert!(near(p.x, 4.0) && near(p.y, 0.0), "{p:?}");
        assert!(near(dist, 4.0), "{dist}");
        assert!(ray_cast(&c, Point::new(0.0, 5.0), Point::new(10.0, 5.0)).is_none());
        assert!(ray_cast(&c, Point::new(0.0, 0.0), Point::new(3.0, 0.0)).is_none());
        assert!(ray_cast(&c, Point::new(1.0, 1.0), Point::new(1.0, 1.0)).is_none());
    }

    #[test]
    fn ray_from_inside_exits() {
        let c = Body::circle(Point::new(0.0, 0.0), 2.0);
        let (p, dist) = ray_cast(&c, Point::new(0.0, 0.0), Point::new(10.0, 0.0)).unwrap();
        assert!(near(p.x, 2.0) && near(dist, 2.0), "{p:?} {dist}");
    }

    #[test]
    fn ray_hits_nearest_polygon_edge() {
        let b = Body::rect(Point::new(4.0, -1.0), 2.0, 2.0);
        let (p, dist) = ray_cast(&b, Point::new(0.0, 0.0), Point::new(10.0, 0.0)).unwrap();
        assert!(near(p.x, 4.0) && near(dist, 4.0), "{p:?} {dist}");
        let (p, _) = ray_cast(&b, Point::new(10.0, 0.0), Point::new(0.0, 0.0)).unwrap();
        assert!(near(p.x, 6.0), "{p:?}");
    }

    #[test]
    fn ray_hits_lines_and_points() {
        let wall = Body::line(Point::new(3.0, -5.0), Point::new(3.0, 5.0));
        let (p, dist) = ray_cast(&wall, Point::new(0.0, 0.0), Point::new(10.0, 0.0)).unwrap();
        assert!(near(p.x, 3.0) && near(dist, 3.0), "{p:?} {dist}");

        let along = Body::line(Point::new(2.0, 0.0), Point::new(8.0, 0.0));
        let (_, dist) = ray_cast(&along, Point::new(0.0, 0.0), Point::new(10.0, 0.0)).unwrap();
        assert!(near(dist, 2.0), "collinear hit starts at the near end: {dist}");

        let dot = Body::point(Point::new(7.0, 0.0));
        let (_, dist) = ray_cast(&dot, Point::new(0.0, 0.0), Point::new(10.0, 0.0)).unwrap();
        assert!(near(dist, 7.0), "{dist}");
    }
}
