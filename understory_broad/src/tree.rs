// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Arena-backed dynamic R-tree.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use kurbo::{Point, Rect};

use crate::types::{
    Axis, NodeView, TreeConfig, area, contains_rect, enlargement, intersects, margin, union,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct NodeIdx(usize);

#[derive(Clone)]
struct Node<K> {
    bbox: Rect,
    leaf: bool,
    children: Vec<Child<K>>,
}

#[derive(Copy, Clone)]
enum Child<K> {
    Node(NodeIdx),
    Item { key: K, bbox: Rect },
}

/// A dynamic R-tree mapping keys to axis-aligned rectangles.
///
/// Each key appears at most once. Nodes live in an arena with a free list, so
/// steady insert/remove churn reuses storage instead of growing it. Queries are
/// inclusive: rectangles that only touch along an edge or at a corner are
/// reported as intersecting.
pub struct Tree<K> {
    config: TreeConfig,
    root: Option<NodeIdx>,
    nodes: Vec<Node<K>>,
    free: Vec<NodeIdx>,
    items: BTreeMap<K, Rect>,
    churn: usize,
}

impl<K: Copy + Ord + fmt::Debug> Default for Tree<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Copy + Ord + fmt::Debug> fmt::Debug for Tree<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("config", &self.config)
            .field("len", &self.items.len())
            .field("height", &self.height())
            .field("live_nodes", &(self.nodes.len() - self.free.len()))
            .field("churn", &self.churn)
            .finish_non_exhaustive()
    }
}

impl<K: Copy + Ord + fmt::Debug> Tree<K> {
    /// Create an empty tree with [`TreeConfig::default`].
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    /// Create an empty tree with the given configuration (normalized first).
    pub fn with_config(config: TreeConfig) -> Self {
        Self {
            config: config.normalized(),
            root: None,
            nodes: Vec::new(),
            free: Vec::new(),
            items: BTreeMap::new(),
            churn: 0,
        }
    }

    /// The effective configuration.
    pub fn config(&self) -> TreeConfig {
        self.config
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the tree holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The rectangle currently stored for `key`.
    pub fn get(&self, key: K) -> Option<Rect> {
        self.items.get(&key).copied()
    }

    /// Whether `key` is stored.
    pub fn contains(&self, key: K) -> bool {
        self.items.contains_key(&key)
    }

    /// All stored keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.items.keys().copied()
    }

    /// All stored `(key, rect)` pairs in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (K, Rect)> + '_ {
        self.items.iter().map(|(k, r)| (*k, *r))
    }

    /// Bounding box of everything in the tree.
    pub fn bounds(&self) -> Option<Rect> {
        self.root.map(|r| self.nodes[r.0].bbox)
    }

    /// Number of node levels from the root down to the leaves (0 when empty).
    pub fn height(&self) -> usize {
        let mut height = 0;
        let mut cursor = self.root;
        while let Some(idx) = cursor {
            height += 1;
            let node = &self.nodes[idx.0];
            cursor = if node.leaf {
                None
            } else {
                node.children.iter().find_map(|c| match c {
                    Child::Node(i) => Some(*i),
                    Child::Item { .. } => None,
                })
            };
        }
        height
    }

    /// Drop every item and node.
    pub fn clear(&mut self) {
        self.root = None;
        self.nodes.clear();
        self.free.clear();
        self.items.clear();
        self.churn = 0;
    }

    /// Insert `key` with `bbox`, returning the previous rectangle if `key` was
    /// already present. An existing key is relocated, never duplicated.
    pub fn insert(&mut self, key: K, bbox: Rect) -> Option<Rect> {
        if let Some(old) = self.items.get(&key).copied() {
            self.relocate(key, old, bbox);
            return Some(old);
        }
        self.items.insert(key, bbox);
        self.insert_item(key, bbox);
        None
    }

    /// Move `key` to `bbox`. Returns `false` when `key` is not stored.
    ///
    /// If the new rectangle still fits inside the item's leaf, the leaf is
    /// patched in place; otherwise the item is detached and reinserted.
    pub fn update(&mut self, key: K, bbox: Rect) -> bool {
        let Some(old) = self.items.get(&key).copied() else {
            return false;
        };
        self.relocate(key, old, bbox);
        true
    }

    /// Remove `key`, returning its rectangle.
    pub fn remove(&mut self, key: K) -> Option<Rect> {
        let bbox = self.items.remove(&key)?;
        let found = self.detach(key, bbox);
        debug_assert!(found, "lookup and tree disagree about {key:?}");
        self.churn += 1;
        self.maybe_rebuild();
        Some(bbox)
    }

    /// Remove the first item whose key satisfies `eq`.
    ///
    /// When `hint` is given only items whose rectangle intersects it are
    /// considered, which prunes the search to the relevant subtrees.
    pub fn remove_by<F>(&mut self, hint: Option<Rect>, mut eq: F) -> Option<K>
    where
        F: FnMut(&K) -> bool,
    {
        let root = self.root?;
        let (key, _) = self.remove_from(root, hint.as_ref(), &mut eq)?;
        self.collapse_root();
        self.items.remove(&key);
        self.churn += 1;
        self.maybe_rebuild();
        Some(key)
    }

    /// Iterate the items whose rectangles intersect `rect` (inclusive).
    pub fn query_rect(&self, rect: Rect) -> Query<'_, K> {
        Query {
            tree: self,
            rect,
            stack: self.root.into_iter().collect(),
            cursor: None,
        }
    }

    /// Iterate the items whose rectangles contain `point` (inclusive).
    pub fn query_point(&self, point: Point) -> Query<'_, K> {
        self.query_rect(Rect::from_points(point, point))
    }

    /// Replace the contents with `items`, packing them bottom-up.
    ///
    /// Later duplicates of a key win.
    pub fn load<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = (K, Rect)>,
    {
        self.clear();
        self.items.extend(items);
        self.rebuild();
    }

    /// Rebuild the node hierarchy from the current items with STR packing.
    pub fn rebuild(&mut self) {
        self.root = None;
        self.nodes.clear();
        self.free.clear();
        self.churn = 0;
        let entries: Vec<Child<K>> = self
            .items
            .iter()
            .map(|(key, bbox)| Child::Item {
                key: *key,
                bbox: *bbox,
            })
            .collect();
        self.root = self.pack(entries);
        log::debug!(
            "packed broad-phase tree: {} items, height {}, {} nodes",
            self.items.len(),
            self.height(),
            self.nodes.len()
        );
    }

    /// Depth-first (pre-order) view of every node, root first.
    pub fn nodes(&self) -> Vec<NodeView> {
        let mut out = Vec::new();
        let mut stack: Vec<(NodeIdx, usize)> = self.root.map(|r| (r, 0)).into_iter().collect();
        while let Some((idx, depth)) = stack.pop() {
            let node = &self.nodes[idx.0];
            out.push(NodeView {
                bbox: node.bbox,
                depth,
                is_leaf: node.leaf,
                len: node.children.len(),
            });
            for child in node.children.iter().rev() {
                if let Child::Node(i) = child {
                    stack.push((*i, depth + 1));
                }
            }
        }
        out
    }

    /// Check structural invariants, panicking with a description on failure.
    ///
    /// Every node's box covers its children, no node is empty or over-full,
    /// all leaves sit at the same depth, and every stored key is reachable
    /// exactly once with the rectangle the lookup reports.
    pub fn validate(&self) {
        let mut seen = BTreeSet::new();
        let mut leaf_depth = None;
        if let Some(root) = self.root {
            self.validate_node(root, 0, &mut seen, &mut leaf_depth);
        }
        assert_eq!(
            seen.len(),
            self.items.len(),
            "every stored key must be reachable from the root"
        );
    }

    fn validate_node(
        &self,
        idx: NodeIdx,
        depth: usize,
        seen: &mut BTreeSet<K>,
        leaf_depth: &mut Option<usize>,
    ) {
        let node = &self.nodes[idx.0];
        assert!(!node.children.is_empty(), "node {idx:?} is empty");
        assert!(
            node.children.len() <= self.config.max_children,
            "node {idx:?} holds {} children",
            node.children.len()
        );
        if node.leaf {
            let expected = *leaf_depth.get_or_insert(depth);
            assert_eq!(expected, depth, "leaves must share one depth");
        }
        for child in &node.children {
            let bbox = self.child_bbox(child);
            assert!(
                contains_rect(&node.bbox, &bbox),
                "node {idx:?} box {:?} does not cover child {bbox:?}",
                node.bbox
            );
            match *child {
                Child::Item { key, bbox } => {
                    assert!(node.leaf, "item {key:?} stored in an internal node");
                    assert!(seen.insert(key), "item {key:?} reachable twice");
                    assert_eq!(
                        self.items.get(&key),
                        Some(&bbox),
                        "stale rectangle for {key:?}"
                    );
                }
                Child::Node(i) => {
                    assert!(!node.leaf, "leaf {idx:?} holds a node");
                    self.validate_node(i, depth + 1, seen, leaf_depth);
                }
            }
        }
    }

    fn alloc(&mut self, node: Node<K>) -> NodeIdx {
        if let Some(idx) = self.free.pop() {
            self.nodes[idx.0] = node;
            idx
        } else {
            self.nodes.push(node);
            NodeIdx(self.nodes.len() - 1)
        }
    }

    fn release(&mut self, idx: NodeIdx) {
        self.nodes[idx.0].children.clear();
        self.free.push(idx);
    }

    fn child_bbox(&self, child: &Child<K>) -> Rect {
        match child {
            Child::Node(i) => self.nodes[i.0].bbox,
            Child::Item { bbox, .. } => *bbox,
        }
    }

    fn bbox_of(&self, children: &[Child<K>]) -> Rect {
        let mut it = children.iter().map(|c| self.child_bbox(c));
        let first = it.next().unwrap_or(Rect::ZERO);
        it.fold(first, union)
    }

    fn refit(&mut self, idx: NodeIdx) {
        let bbox = self.bbox_of(&self.nodes[idx.0].children);
        self.nodes[idx.0].bbox = bbox;
    }

    fn relocate(&mut self, key: K, old: Rect, new: Rect) {
        self.items.insert(key, new);
        if old == new {
            return;
        }
        if let Some(root) = self.root
            && self.update_in_place(root, key, &old, new) == Some(true)
        {
            return;
        }
        let found = self.detach(key, old);
        debug_assert!(found, "lookup and tree disagree about {key:?}");
        self.insert_item(key, new);
        self.churn += 1;
        log::trace!("relocated {key:?} from {old:?} to {new:?}");
        self.maybe_rebuild();
    }

    /// `None` when the key was not found below `idx`, `Some(false)` when it was
    /// found but `new` escapes its leaf, `Some(true)` when patched.
    fn update_in_place(&mut self, idx: NodeIdx, key: K, old: &Rect, new: Rect) -> Option<bool> {
        if !intersects(&self.nodes[idx.0].bbox, old) {
            return None;
        }
        if self.nodes[idx.0].leaf {
            let node = &mut self.nodes[idx.0];
            let pos = node
                .children
                .iter()
                .position(|c| matches!(c, Child::Item { key: k, .. } if *k == key))?;
            if !contains_rect(&node.bbox, &new) {
                return Some(false);
            }
            node.children[pos] = Child::Item { key, bbox: new };
            self.refit(idx);
            return Some(true);
        }
        for pos in 0..self.nodes[idx.0].children.len() {
            let Child::Node(child) = self.nodes[idx.0].children[pos] else {
                continue;
            };
            match self.update_in_place(child, key, old, new) {
                Some(true) => {
                    self.refit(idx);
                    return Some(true);
                }
                Some(false) => return Some(false),
                None => {}
            }
        }
        None
    }

    fn detach(&mut self, key: K, bbox: Rect) -> bool {
        let Some(root) = self.root else {
            return false;
        };
        let found = self
            .remove_from(root, Some(&bbox), &mut |k: &K| *k == key)
            .is_some();
        self.collapse_root();
        found
    }

    fn remove_from<F>(
        &mut self,
        idx: NodeIdx,
        hint: Option<&Rect>,
        eq: &mut F,
    ) -> Option<(K, Rect)>
    where
        F: FnMut(&K) -> bool,
    {
        if let Some(hint) = hint
            && !intersects(&self.nodes[idx.0].bbox, hint)
        {
            return None;
        }
        if self.nodes[idx.0].leaf {
            let node = &mut self.nodes[idx.0];
            let pos = node.children.iter().position(|c| match c {
                Child::Item { key, bbox } => hint.is_none_or(|h| intersects(bbox, h)) && eq(key),
                Child::Node(_) => false,
            })?;
            let removed = match node.children.swap_remove(pos) {
                Child::Item { key, bbox } => (key, bbox),
                Child::Node(_) => return None,
            };
            self.refit(idx);
            return Some(removed);
        }
        for pos in 0..self.nodes[idx.0].children.len() {
            let Child::Node(child) = self.nodes[idx.0].children[pos] else {
                continue;
            };
            if let Some(found) = self.remove_from(child, hint, eq) {
                if self.nodes[child.0].children.is_empty() {
                    self.nodes[idx.0].children.remove(pos);
                    self.release(child);
                }
                self.refit(idx);
                return Some(found);
            }
        }
        None
    }

    fn collapse_root(&mut self) {
        while let Some(root) = self.root {
            let node = &self.nodes[root.0];
            match (node.leaf, node.children.as_slice()) {
                (_, []) => {
                    self.release(root);
                    self.root = None;
                }
                (false, [Child::Node(only)]) => {
                    let only = *only;
                    self.release(root);
                    self.root = Some(only);
                }
                _ => return,
            }
        }
    }

    fn maybe_rebuild(&mut self) {
        let ratio = self.config.rebuild_ratio;
        if !(ratio.is_finite() && ratio > 0.0) || self.churn <= self.config.max_children {
            return;
        }
        if self.churn as f64 > ratio * self.items.len() as f64 {
            log::debug!(
                "rebuilding after {} structural changes over {} items",
                self.churn,
                self.items.len()
            );
            self.rebuild();
        }
    }

    fn insert_item(&mut self, key: K, bbox: Rect) {
        let Some(root) = self.root else {
            let root = self.alloc(Node {
                bbox,
                leaf: true,
                children: vec![Child::Item { key, bbox }],
            });
            self.root = Some(root);
            return;
        };
        if let Some(sibling) = self.insert_into(root, key, bbox) {
            let bbox = union(self.nodes[root.0].bbox, self.nodes[sibling.0].bbox);
            let new_root = self.alloc(Node {
                bbox,
                leaf: false,
                children: vec![Child::Node(root), Child::Node(sibling)],
            });
            self.root = Some(new_root);
            log::trace!("root split, height now {}", self.height());
        }
    }

    /// Returns the new right sibling when `idx` had to split.
    fn insert_into(&mut self, idx: NodeIdx, key: K, bbox: Rect) -> Option<NodeIdx> {
        let node = &mut self.nodes[idx.0];
        node.bbox = if node.children.is_empty() {
            bbox
        } else {
            union(node.bbox, bbox)
        };
        match self.choose_child(idx, &bbox) {
            Some((pos, child)) if !self.nodes[idx.0].leaf => {
                if let Some(sibling) = self.insert_into(child, key, bbox) {
                    self.nodes[idx.0]
                        .children
                        .insert(pos + 1, Child::Node(sibling));
                }
            }
            _ => {
                let node = &mut self.nodes[idx.0];
                node.leaf = true;
                node.children.push(Child::Item { key, bbox });
            }
        }
        (self.nodes[idx.0].children.len() > self.config.max_children).then(|| self.split(idx))
    }

    /// Child node needing the least area enlargement; ties go to the smaller box.
    fn choose_child(&self, idx: NodeIdx, bbox: &Rect) -> Option<(usize, NodeIdx)> {
        let mut best: Option<(f64, f64, usize, NodeIdx)> = None;
        for (pos, child) in self.nodes[idx.0].children.iter().enumerate() {
            let Child::Node(c) = *child else {
                continue;
            };
            let cb = self.nodes[c.0].bbox;
            let grow = enlargement(&cb, bbox);
            let size = area(&cb);
            let better = match best {
                None => true,
                Some((bg, bs, ..)) => grow < bg || (grow == bg && size < bs),
            };
            if better {
                best = Some((grow, size, pos, c));
            }
        }
        best.map(|(_, _, pos, c)| (pos, c))
    }

    fn split(&mut self, idx: NodeIdx) -> NodeIdx {
        let children = core::mem::take(&mut self.nodes[idx.0].children);
        let leaf = self.nodes[idx.0].leaf;
        let (left, right) = self.partition(children);
        let left_bbox = self.bbox_of(&left);
        let right_bbox = self.bbox_of(&right);
        let node = &mut self.nodes[idx.0];
        node.children = left;
        node.bbox = left_bbox;
        log::trace!(
            "split {} node {idx:?}: {} | {} children",
            if leaf { "leaf" } else { "internal" },
            node.children.len(),
            right.len()
        );
        self.alloc(Node {
            bbox: right_bbox,
            leaf,
            children: right,
        })
    }

    /// SAH-like split: for each axis, sort by centroid, build prefix/suffix
    /// boxes, and pick the cut minimizing `area(L) * |L| + area(R) * |R|`.
    /// Ties prefer the smaller combined margin.
    fn partition(&self, mut children: Vec<Child<K>>) -> (Vec<Child<K>>, Vec<Child<K>>) {
        let n = children.len();
        let min = self.config.min_children.min(n / 2).max(1);
        let mut best: Option<(f64, f64, Axis, usize)> = None;
        for axis in Axis::BOTH {
            children.sort_by(|a, b| axis.order(&self.child_bbox(a), &self.child_bbox(b)));
            let boxes: Vec<Rect> = children.iter().map(|c| self.child_bbox(c)).collect();
            let mut prefix = Vec::with_capacity(n);
            let mut acc = boxes[0];
            for b in &boxes {
                acc = union(acc, *b);
                prefix.push(acc);
            }
            let mut suffix = vec![Rect::ZERO; n];
            let mut acc = boxes[n - 1];
            for (i, b) in boxes.iter().enumerate().rev() {
                acc = union(acc, *b);
                suffix[i] = acc;
            }
            for k in min..=(n - min) {
                let (l, r) = (prefix[k - 1], suffix[k]);
                let cost = area(&l) * k as f64 + area(&r) * (n - k) as f64;
                let tie = margin(&l) + margin(&r);
                let better = match best {
                    None => true,
                    Some((bc, bt, ..)) => cost < bc || (cost == bc && tie < bt),
                };
                if better {
                    best = Some((cost, tie, axis, k));
                }
            }
        }
        let (axis, k) = best.map_or((Axis::X, n / 2), |(_, _, axis, k)| (axis, k));
        children.sort_by(|a, b| axis.order(&self.child_bbox(a), &self.child_bbox(b)));
        let right = children.split_off(k);
        (children, right)
    }

    /// Sort-Tile-Recursive packing of one level at a time until one root remains.
    fn pack(&mut self, mut level: Vec<Child<K>>) -> Option<NodeIdx> {
        let mut leaf = true;
        loop {
            if level.is_empty() {
                return None;
            }
            let groups = self.tile(level);
            let mut parents = Vec::with_capacity(groups.len());
            for children in groups {
                let bbox = self.bbox_of(&children);
                parents.push(self.alloc(Node {
                    bbox,
                    leaf,
                    children,
                }));
            }
            if let [root] = parents.as_slice() {
                return Some(*root);
            }
            level = parents.into_iter().map(Child::Node).collect();
            leaf = false;
        }
    }

    fn tile(&self, mut level: Vec<Child<K>>) -> Vec<Vec<Child<K>>> {
        let fill = self.config.max_children;
        let n = level.len();
        let parents = n.div_ceil(fill);
        let mut slices = 1_usize;
        while slices * slices < parents {
            slices += 1;
        }
        level.sort_by(|a, b| Axis::X.order(&self.child_bbox(a), &self.child_bbox(b)));
        let mut groups = Vec::with_capacity(parents);
        for slice in level.chunks_mut(n.div_ceil(slices)) {
            slice.sort_by(|a, b| Axis::Y.order(&self.child_bbox(a), &self.child_bbox(b)));
            groups.extend(slice.chunks(fill).map(<[_]>::to_vec));
        }
        groups
    }
}

/// Iterator returned by [`Tree::query_rect`] and [`Tree::query_point`].
///
/// Yields `(key, rect)` for every stored rectangle intersecting the query.
pub struct Query<'a, K> {
    tree: &'a Tree<K>,
    rect: Rect,
    stack: Vec<NodeIdx>,
    cursor: Option<(NodeIdx, usize)>,
}

impl<K> fmt::Debug for Query<'_, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("rect", &self.rect)
            .field("pending", &self.stack.len())
            .finish_non_exhaustive()
    }
}

impl<K: Copy> Iterator for Query<'_, K> {
    type Item = (K, Rect);

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        loop {
            if let Some((idx, pos)) = self.cursor {
                if let Some(child) = tree.nodes[idx.0].children.get(pos) {
                    self.cursor = Some((idx, pos + 1));
                    if let Child::Item { key, bbox } = *child
                        && intersects(&bbox, &self.rect)
                    {
                        return Some((key, bbox));
                    }
                    continue;
                }
                self.cursor = None;
            }
            let idx = self.stack.pop()?;
            let node = &tree.nodes[idx.0];
            if !intersects(&node.bbox, &self.rect) {
                continue;
            }
            if node.leaf {
                self.cursor = Some((idx, 0));
            } else {
                self.stack.extend(node.children.iter().filter_map(|c| match c {
                    Child::Node(i) => Some(*i),
                    Child::Item { .. } => None,
                }));
            }
        }
    }
}
