// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The collision system: body storage, broad phase, and queries.

use alloc::vec::Vec;
use core::fmt;
use core::ops::ControlFlow;

use kurbo::{Point, Rect, Vec2};
use understory_broad::{Tree, TreeConfig, intersects};

use crate::Body;
use crate::error::Error;
use crate::narrow::{self, EPSILON, Overlap};
use crate::types::BodyHandle;

/// Configuration for [`System`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SystemConfig {
    /// Broad-phase tree tuning.
    pub tree: TreeConfig,
    /// Maximum number of passes [`System::separate`] makes. Each pass re-tests
    /// every candidate pair against current positions; a pass that moves
    /// nothing ends the loop early.
    pub separate_iterations: usize,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            tree: TreeConfig::default(),
            separate_iterations: 4,
        }
    }
}

/// A confirmed overlap between two bodies of a [`System`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Response {
    /// The body the overlap is expressed for.
    pub a: BodyHandle,
    /// The other body.
    pub b: BodyHandle,
    /// Depth, direction, and containment; move `a` by
    /// [`overlap.mtv()`](Overlap::mtv) to separate.
    pub overlap: Overlap,
}

/// Nearest body hit by [`System::raycast`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RaycastHit {
    /// Where the segment first meets the body.
    pub point: Point,
    /// The body that was hit.
    pub body: BodyHandle,
    /// Distance from the segment start to `point`.
    pub distance: f64,
}

#[derive(Clone, Debug)]
struct Slot {
    generation: u32,
    body: Body,
}

/// Owns bodies and keeps a broad-phase index of their padded bounding boxes.
///
/// Mutating a body through [`set_position`](Self::set_position) and friends
/// re-indexes it immediately. Bodies changed through
/// [`body_mut`](Self::body_mut) are picked up by [`update_body`](Self::update_body)
/// or by the next [`update`](Self::update).
///
/// A body is only moved in the index when its exact box escapes the padded
/// box stored for it, so small motions are free.
///
/// ```
/// use core::ops::ControlFlow;
/// use kurbo::Point;
/// use understory_collide::{Body, System};
///
/// let mut system = System::new();
/// let a = system.insert(Body::circle(Point::new(0.0, 0.0), 2.0));
/// let b = system.insert(Body::circle(Point::new(3.0, 0.0), 2.0));
///
/// let mut pairs = 0;
/// let _ = system.check_all(|r| {
///     assert_eq!((r.a, r.b), (a, b));
///     pairs += 1;
///     ControlFlow::Continue(())
/// });
/// assert_eq!(pairs, 1);
///
/// system.separate();
/// assert!(!system.check_collision(a, b));
/// ```
pub struct System {
    config: SystemConfig,
    slots: Vec<Option<Slot>>,
    generations: Vec<u32>,
    free_list: Vec<usize>,
    tree: Tree<BodyHandle>,
}

impl Default for System {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("System")
            .field("config", &self.config)
            .field("bodies", &self.len())
            .field("free_list", &self.free_list.len())
            .field("tree", &self.tree)
            .finish_non_exhaustive()
    }
}

impl System {
    /// Create an empty system with [`SystemConfig::default`].
    pub fn new() -> Self {
        Self::with_config(SystemConfig::default())
    }

    /// Create an empty system with the given configuration.
    pub fn with_config(config: SystemConfig) -> Self {
        Self {
            config,
            slots: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            tree: Tree::with_config(config.tree),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> SystemConfig {
        self.config
    }

    /// Number of live bodies.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Whether the system holds no bodies.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Whether `handle` refers to a live body.
    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.slot(handle).is_some()
    }

    /// Borrow a live body.
    pub fn body(&self, handle: BodyHandle) -> Option<&Body> {
        self.slot(handle).map(|s| &s.body)
    }

    /// Mutably borrow a live body. The index is not told about changes made
    /// here until [`update_body`](Self::update_body) or [`update`](Self::update).
    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        let slot = self.slots.get_mut(handle.idx())?.as_mut()?;
        (slot.generation == handle.generation()).then_some(&mut slot.body)
    }

    /// All live bodies in slot order.
    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, &Body)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.as_ref()
                .map(|s| (Self::handle_for(i, s.generation), &s.body))
        })
    }

    /// Read-only access to the broad-phase tree, for drawing or diagnostics.
    pub fn tree(&self) -> &Tree<BodyHandle> {
        &self.tree
    }

    /// Add a body and index it.
    pub fn insert(&mut self, body: Body) -> BodyHandle {
        let padded = body.padded_bbox();
        let handle = self.alloc(body);
        self.tree.insert(handle, padded);
        handle
    }

    /// Add many bodies at once and repack the index in bulk.
    pub fn extend<I>(&mut self, bodies: I) -> Vec<BodyHandle>
    where
        I: IntoIterator<Item = Body>,
    {
        let handles: Vec<BodyHandle> = bodies.into_iter().map(|b| self.alloc(b)).collect();
        let items: Vec<(BodyHandle, Rect)> =
            self.bodies().map(|(h, b)| (h, b.padded_bbox())).collect();
        self.tree.load(items);
        log::debug!(
            "bulk loaded {} bodies ({} total)",
            handles.len(),
            self.len()
        );
        handles
    }

    /// Remove a body, returning it. Stale handles are a no-op.
    pub fn remove(&mut self, handle: BodyHandle) -> Option<Body> {
        self.slot(handle)?;
        self.tree.remove(handle);
        self.release(handle.idx())
    }

    /// Remove the first body, in index order, for which `pred` returns true.
    pub fn remove_by<F>(&mut self, mut pred: F) -> Option<(BodyHandle, Body)>
    where
        F: FnMut(BodyHandle, &Body) -> bool,
    {
        let slots = &self.slots;
        let handle = self.tree.remove_by(None, |h| {
            slots
                .get(h.idx())
                .and_then(Option::as_ref)
                .is_some_and(|s| pred(*h, &s.body))
        })?;
        let body = self.release(handle.idx())?;
        Some((handle, body))
    }

    /// Remove every body. Outstanding handles become stale.
    pub fn clear(&mut self) {
        for idx in 0..self.slots.len() {
            if self.slots[idx].is_some() {
                self.slots[idx] = None;
                self.free_list.push(idx);
            }
        }
        self.tree.clear();
    }

    /// Move a body and re-index it.
    pub fn set_position(&mut self, handle: BodyHandle, position: Point) -> Result<(), Error> {
        self.live_mut(handle)?.set_position(position);
        self.reindex(handle);
        Ok(())
    }

    /// Move a body by `delta` and re-index it.
    pub fn translate(&mut self, handle: BodyHandle, delta: Vec2) -> Result<(), Error> {
        self.live_mut(handle)?.translate(delta);
        self.reindex(handle);
        Ok(())
    }

    /// Rotate a body to `angle` radians and re-index it.
    pub fn set_angle(&mut self, handle: BodyHandle, angle: f64) -> Result<(), Error> {
        self.live_mut(handle)?.set_angle(angle);
        self.reindex(handle);
        Ok(())
    }

    /// Rescale a body and re-index it.
    pub fn set_scale(&mut self, handle: BodyHandle, x: f64, y: f64) -> Result<(), Error> {
        self.live_mut(handle)?.set_scale(x, y);
        self.reindex(handle);
        Ok(())
    }

    /// Store the body's current padded box in the index, whether or not it moved.
    pub fn update_body(&mut self, handle: BodyHandle) -> Result<(), Error> {
        let padded = self.live(handle)?.padded_bbox();
        self.tree.update(handle, padded);
        Ok(())
    }

    /// Re-index every body whose exact box escaped its stored padded box.
    ///
    /// Call once per tick after moving bodies through [`body_mut`](Self::body_mut).
    pub fn update(&mut self) {
        let handles: Vec<BodyHandle> = self.tree.keys().collect();
        for handle in handles {
            self.reindex(handle);
        }
    }

    /// Other bodies whose stored boxes intersect this body's box, in index
    /// order. Empty for stale handles.
    pub fn potentials(&self, handle: BodyHandle) -> Vec<BodyHandle> {
        let Some(body) = self.body(handle) else {
            return Vec::new();
        };
        let mut out: Vec<BodyHandle> = self
            .tree
            .query_rect(body.bbox())
            .map(|(h, _)| h)
            .filter(|h| *h != handle)
            .collect();
        out.sort_unstable();
        out
    }

    /// Narrow-phase test between two live bodies, bypassing the index.
    pub fn test(&self, a: BodyHandle, b: BodyHandle) -> Option<Response> {
        if a == b {
            return None;
        }
        let overlap = narrow::test(self.body(a)?, self.body(b)?)?;
        Some(Response { a, b, overlap })
    }

    /// Whether two live bodies overlap.
    pub fn check_collision(&self, a: BodyHandle, b: BodyHandle) -> bool {
        self.test(a, b).is_some()
    }

    /// Report every body overlapping `handle`. `callback` may return
    /// [`ControlFlow::Break`] to stop early, which is passed back out.
    pub fn check_one<F>(&self, handle: BodyHandle, mut callback: F) -> ControlFlow<()>
    where
        F: FnMut(&Response) -> ControlFlow<()>,
    {
        for other in self.potentials(handle) {
            if let Some(response) = self.test(handle, other) {
                callback(&response)?;
            }
        }
        ControlFlow::Continue(())
    }

    /// Report every overlapping pair once, with `a` ordered before `b`.
    pub fn check_all<F>(&self, mut callback: F) -> ControlFlow<()>
    where
        F: FnMut(&Response) -> ControlFlow<()>,
    {
        for (a, b) in self.candidate_pairs() {
            if let Some(response) = self.test(a, b) {
                callback(&response)?;
            }
        }
        ControlFlow::Continue(())
    }

    /// Push overlapping bodies apart, returning how many corrections were applied.
    ///
    /// Triggers never move and never push. A static body stays put and its
    /// partner takes the whole correction; two movable bodies split it. Pairs
    /// are re-tested against current positions as the pass goes, so a pair
    /// already cleared by an earlier correction is skipped. Up to
    /// [`SystemConfig::separate_iterations`] passes run; two bodies are
    /// resolved in one pass, larger clusters may need several.
    pub fn separate(&mut self) -> usize {
        let mut total = 0;
        for pass in 0..self.config.separate_iterations {
            let mut moved = 0;
            for (a, b) in self.candidate_pairs() {
                if self.separate_pair(a, b) {
                    moved += 1;
                }
            }
            log::trace!("separation pass {pass}: {moved} corrections");
            total += moved;
            if moved == 0 {
                break;
            }
        }
        total
    }

    /// Nearest hit along `start → end` among bodies `allow` accepts.
    ///
    /// Returns `None` for a zero-length segment or when nothing is hit.
    pub fn raycast<F>(&self, start: Point, end: Point, mut allow: F) -> Option<RaycastHit>
    where
        F: FnMut(BodyHandle, &Body) -> bool,
    {
        if (end - start).length() <= EPSILON {
            return None;
        }
        let mut best: Option<RaycastHit> = None;
        for (handle, _) in self.tree.query_rect(Rect::from_points(start, end)) {
            let Some(body) = self.body(handle) else {
                continue;
            };
            if !allow(handle, body) {
                continue;
            }
            if let Some((point, distance)) = narrow::ray_cast(body, start, end)
                && best.is_none_or(|b| distance < b.distance)
            {
                best = Some(RaycastHit {
                    point,
                    body: handle,
                    distance,
                });
            }
        }
        best
    }

    /// Bodies whose exact bounding box intersects `rect` (inclusive), in index order.
    pub fn query_rect(&self, rect: Rect) -> Vec<BodyHandle> {
        let mut out: Vec<BodyHandle> = self
            .tree
            .query_rect(rect)
            .filter_map(|(h, _)| {
                let body = self.body(h)?;
                intersects(&body.bbox(), &rect).then_some(h)
            })
            .collect();
        out.sort_unstable();
        out
    }

    /// Bodies whose exact bounding box contains `point`.
    pub fn query_point(&self, point: Point) -> Vec<BodyHandle> {
        self.query_rect(Rect::from_points(point, point))
    }

    // --- internals ---

    fn handle_for(idx: usize, generation: u32) -> BodyHandle {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "BodyHandle uses 32-bit slot indices."
        )]
        BodyHandle::new(idx as u32, generation)
    }

    fn slot(&self, handle: BodyHandle) -> Option<&Slot> {
        self.slots
            .get(handle.idx())?
            .as_ref()
            .filter(|s| s.generation == handle.generation())
    }

    fn live(&self, handle: BodyHandle) -> Result<&Body, Error> {
        self.body(handle).ok_or(Error::StaleHandle(handle))
    }

    fn live_mut(&mut self, handle: BodyHandle) -> Result<&mut Body, Error> {
        self.body_mut(handle).ok_or(Error::StaleHandle(handle))
    }

    fn alloc(&mut self, body: Body) -> BodyHandle {
        if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.slots[idx] = Some(Slot { generation, body });
            Self::handle_for(idx, generation)
        } else {
            let generation = 1_u32;
            self.slots.push(Some(Slot { generation, body }));
            self.generations.push(generation);
            Self::handle_for(self.slots.len() - 1, generation)
        }
    }

    fn release(&mut self, idx: usize) -> Option<Body> {
        let slot = self.slots.get_mut(idx)?.take()?;
        self.free_list.push(idx);
        Some(slot.body)
    }

    /// Relocate `handle` in the index if its exact box left the stored one.
    fn reindex(&mut self, handle: BodyHandle) {
        let Some(body) = self.body(handle) else {
            return;
        };
        let (exact, padded) = (body.bbox(), body.padded_bbox());
        let fits = self
            .tree
            .get(handle)
            .is_some_and(|stored| understory_broad::contains_rect(&stored, &exact));
        if !fits {
            log::trace!("reindex {handle:?} to {padded:?}");
            self.tree.insert(handle, padded);
        }
    }

    /// Every broad-phase pair once, ordered by handle.
    fn candidate_pairs(&self) -> Vec<(BodyHandle, BodyHandle)> {
        let mut pairs = Vec::new();
        for a in self.tree.keys() {
            pairs.extend(
                self.potentials(a)
                    .into_iter()
                    .filter(|b| a < *b)
                    .map(|b| (a, b)),
            );
        }
        pairs
    }

    /// Apply one separation step to a pair if it still overlaps.
    fn separate_pair(&mut self, a: BodyHandle, b: BodyHandle) -> bool {
        let (Some(body_a), Some(body_b)) = (self.body(a), self.body(b)) else {
            return false;
        };
        if body_a.is_trigger() || body_b.is_trigger() {
            return false;
        }
        let (a_moves, b_moves) = (!body_a.is_static(), !body_b.is_static());
        if !a_moves && !b_moves {
            return false;
        }
        let Some(overlap) = narrow::test(body_a, body_b) else {
            return false;
        };
        if overlap.depth <= EPSILON {
            return false;
        }
        let mtv = overlap.mtv();
        let (shift_a, shift_b) = match (a_moves, b_moves) {
            (true, true) => (mtv * 0.5, -mtv * 0.5),
            (true, false) => (mtv, Vec2::ZERO),
            _ => (Vec2::ZERO, -mtv),
        };
        for (handle, shift) in [(a, shift_a), (b, shift_b)] {
            if shift != Vec2::ZERO
                && let Some(body) = self.body_mut(handle)
            {
                body.translate(shift);
                self.reindex(handle);
            }
        }
        true
    }
}
