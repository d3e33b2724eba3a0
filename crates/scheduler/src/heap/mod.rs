//! Fibonacci heap keyed by `f64` priority (lower = extracted first).
//!
//! Nodes live in an arena (`Vec<Option<Node>>`) and refer to each other by
//! index. Siblings at every level form a circular doubly linked list through
//! `left`/`right`; the minimum root is tracked explicitly.
//!
//! Equal keys are extracted in insertion order: every node carries a
//! monotonically increasing sequence number, and ordering is by
//! `(key, seq)`. Keys compare with [`f64::total_cmp`].
//!
//! | operation      | amortized |
//! |----------------|-----------|
//! | `insert`       | O(1)      |
//! | `find_min`     | O(1)      |
//! | `merge`        | O(m)      |
//! | `decrease_key` | O(1)      |
//! | `extract_min`  | O(log n)  |
//! | `delete`       | O(log n)  |
//!
//! `merge` is linear in the absorbed heap because its arena is copied over.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use crate::error::SchedulerError;


/// Golden ratio. A root of degree `d` has at least `F(d+2) >= PHI^d` nodes.
const PHI: f64 = 1.618_033_988_749_895;

static NEXT_HEAP_ID: AtomicU64 = AtomicU64::new(0);

/// Reference to a node returned by [`FibonacciHeap::insert`].
///
/// Becomes stale once the node is extracted or deleted, or once its heap is
/// merged into another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapHandle {
    heap_id: u64,
    index: usize,
    seq: u64,
}

#[derive(Debug)]
struct Node<T> {
    key: f64,
    seq: u64,
    value: T,
    degree: usize,
    marked: bool,
    parent: Option<usize>,
    child: Option<usize>,
    left: usize,
    right: usize,
}

#[derive(Debug)]
pub struct FibonacciHeap<T> {
    heap_id: u64,
    slots: Vec<Option<Node<T>>>,
    free: Vec<usize>,
    min: Option<usize>,
    len: usize,
    next_seq: u64,
}

impl<T> Default for FibonacciHeap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FibonacciHeap<T> {
    pub fn new() -> Self {
        Self {
            heap_id: NEXT_HEAP_ID.fetch_add(1, AtomicOrdering::Relaxed),
            slots: Vec::new(),
            free: Vec::new(),
            min: None,
            len: 0,
            next_seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Add `value` with priority `key` to the root list.
    pub fn insert(&mut self, key: f64, value: T) -> HeapHandle {
        let seq = self.next_seq;
        self.next_seq += 1;

        let index = self.reserve_slot();
        self.slots[index] = Some(Node {
            key,
            seq,
            value,
            degree: 0,
            marked: false,
            parent: None,
            child: None,
            left: index,
            right: index,
        });
        self.add_root(index);
        self.len += 1;

        HeapHandle {
            heap_id: self.heap_id,
            index,
            seq,
        }
    }

    /// Minimum key and its value, without removing it.
    pub fn find_min(&self) -> Option<(f64, &T)> {
        self.min.map(|m| {
            let node = self.node(m);
            (node.key, &node.value)
        })
    }

    /// Remove and return the minimum entry.
    pub fn extract_min(&mut self) -> Option<(f64, T)> {
        let z = self.min?;

        for child in self.ring(self.node(z).child) {
            self.unlink(child);
            let node = self.node_mut(child);
            node.parent = None;
            node.marked = false;
            self.splice_after(z, child);
        }
        let node = self.node_mut(z);
        node.child = None;
        node.degree = 0;

        let next = self.node(z).right;
        self.unlink(z);
        if next == z {
            self.min = None;
        } else {
            self.min = Some(next);
            self.consolidate();
        }

        self.len -= 1;
        let node = self.release(z);
        Some((node.key, node.value))
    }

    /// Lower the key of a live node. Equal keys are accepted.
    pub fn decrease_key(&mut self, handle: HeapHandle, key: f64) -> Result<(), SchedulerError> {
        let x = self.resolve(handle)?;
        let current = self.node(x).key;
        if key.total_cmp(&current) == Ordering::Greater {
            return Err(SchedulerError::KeyIncrease {
                current,
                requested: key,
            });
        }

        self.node_mut(x).key = key;
        if let Some(p) = self.node(x).parent {
            if self.precedes(x, p) {
                self.cut(x, p);
                self.cascading_cut(p);
            }
        }
        if let Some(m) = self.min {
            if self.precedes(x, m) {
                self.min = Some(x);
            }
        }
        Ok(())
    }

    /// Remove an arbitrary live node, returning its key and value.
    pub fn delete(&mut self, handle: HeapHandle) -> Result<(f64, T), SchedulerError> {
        let x = self.resolve(handle)?;
        if let Some(p) = self.node(x).parent {
            self.cut(x, p);
            self.cascading_cut(p);
        }
        self.min = Some(x);
        Ok(self
            .extract_min()
            .expect("heap holds the node being deleted"))
    }

    /// Absorb every entry of `other`.
    ///
    /// Entries from `other` keep their relative order and sort after this
    /// heap's entries among equal keys. Handles issued by `other` are stale
    /// afterwards.
    pub fn merge(&mut self, other: FibonacciHeap<T>) {
        let FibonacciHeap {
            slots,
            min: other_min,
            len: other_len,
            next_seq: other_next_seq,
            ..
        } = other;
        let Some(other_min) = other_min else {
            return;
        };

        let mut remap: Vec<Option<usize>> = vec![None; slots.len()];
        for (old, slot) in slots.iter().enumerate() {
            if slot.is_some() {
                remap[old] = Some(self.reserve_slot());
            }
        }
        let at = |i: usize| remap[i].expect("live node links only to live nodes");

        let base_seq = self.next_seq;
        for (old, slot) in slots.into_iter().enumerate() {
            if let Some(mut node) = slot {
                node.seq += base_seq;
                node.left = at(node.left);
                node.right = at(node.right);
                node.parent = node.parent.map(at);
                node.child = node.child.map(at);
                self.slots[at(old)] = Some(node);
            }
        }

        let b = at(other_min);
        match self.min {
            None => self.min = Some(b),
            Some(a) => {
                let a_right = self.node(a).right;
                let b_left = self.node(b).left;
                self.node_mut(a).right = b;
                self.node_mut(b).left = a;
                self.node_mut(b_left).right = a_right;
                self.node_mut(a_right).left = b_left;
                if self.precedes(b, a) {
                    self.min = Some(b);
                }
            }
        }

        self.len += other_len;
        self.next_seq += other_next_seq;
    }

    // ── Structural maintenance ───────────────────────────────

    /// Link roots of equal degree until every root degree is distinct, then
    /// rescan the surviving roots for the new minimum.
    fn consolidate(&mut self) {
        let roots = self.ring(self.min);
        let mut by_degree: Vec<Option<usize>> = vec![None; self.degree_bound()];

        for root in roots {
            let mut x = root;
            let mut degree = self.node(x).degree;
            loop {
                if degree >= by_degree.len() {
                    by_degree.resize(degree + 1, None);
                }
                match by_degree[degree].take() {
                    None => {
                        by_degree[degree] = Some(x);
                        break;
                    }
                    Some(mut y) => {
                        if self.precedes(y, x) {
                            std::mem::swap(&mut x, &mut y);
                        }
                        self.link(y, x);
                        degree += 1;
                    }
                }
            }
        }

        let min = by_degree
            .into_iter()
            .flatten()
            .reduce(|best, r| if self.precedes(r, best) { r } else { best });
        self.min = min;
    }

    /// Upper bound on root degree for the current size, plus slack.
    fn degree_bound(&self) -> usize {
        ((self.len.max(1) as f64).ln() / PHI.ln()) as usize + 2
    }

    /// Make root `y` a child of root `x`.
    fn link(&mut self, y: usize, x: usize) {
        self.unlink(y);
        match self.node(x).child {
            None => self.node_mut(x).child = Some(y),
            Some(c) => self.splice_after(c, y),
        }
        let child = self.node_mut(y);
        child.parent = Some(x);
        child.marked = false;
        self.node_mut(x).degree += 1;
    }

    /// Move `x` from `p`'s child list to the root list.
    fn cut(&mut self, x: usize, p: usize) {
        if self.node(p).child == Some(x) {
            let next = self.node(x).right;
            self.node_mut(p).child = if next == x { None } else { Some(next) };
        }
        self.unlink(x);
        self.node_mut(p).degree -= 1;

        let node = self.node_mut(x);
        node.parent = None;
        node.marked = false;
        self.add_root(x);
    }

    fn cascading_cut(&mut self, mut y: usize) {
        while let Some(z) = self.node(y).parent {
            if !self.node(y).marked {
                self.node_mut(y).marked = true;
                return;
            }
            self.cut(y, z);
            y = z;
        }
    }

    // ── Arena and list primitives ────────────────────────────

    fn reserve_slot(&mut self) -> usize {
        match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(None);
                self.slots.len() - 1
            }
        }
    }

    fn release(&mut self, index: usize) -> Node<T> {
        let node = self.slots[index]
            .take()
            .expect("released heap slot holds a live node");
        self.free.push(index);
        node
    }

    fn resolve(&self, handle: HeapHandle) -> Result<usize, SchedulerError> {
        if handle.heap_id != self.heap_id {
            return Err(SchedulerError::StaleHandle);
        }
        match self.slots.get(handle.index) {
            Some(Some(node)) if node.seq == handle.seq => Ok(handle.index),
            _ => Err(SchedulerError::StaleHandle),
        }
    }

    fn node(&self, index: usize) -> &Node<T> {
        self.slots[index]
            .as_ref()
            .expect("heap link refers to a live node")
    }

    fn node_mut(&mut self, index: usize) -> &mut Node<T> {
        self.slots[index]
            .as_mut()
            .expect("heap link refers to a live node")
    }

    /// Strict `(key, seq)` ordering.
    fn precedes(&self, a: usize, b: usize) -> bool {
        let (a, b) = (self.node(a), self.node(b));
        a.key.total_cmp(&b.key).then(a.seq.cmp(&b.seq)) == Ordering::Less
    }

    /// Indices of the circular list containing `start`.
    fn ring(&self, start: Option<usize>) -> Vec<usize> {
        let mut out = Vec::new();
        if let Some(start) = start {
            let mut cur = start;
            loop {
                out.push(cur);
                cur = self.node(cur).right;
                if cur == start {
                    break;
                }
            }
        }
        out
    }

    /// Insert self-looped `x` to the right of `anchor`.
    fn splice_after(&mut self, anchor: usize, x: usize) {
        let right = self.node(anchor).right;
        let node = self.node_mut(x);
        node.left = anchor;
        node.right = right;
        self.node_mut(anchor).right = x;
        self.node_mut(right).left = x;
    }

    /// Detach `x` from its list, leaving it self-looped.
    fn unlink(&mut self, x: usize) {
        let (left, right) = {
            let node = self.node(x);
            (node.left, node.right)
        };
        if left == x {
            return;
        }
        self.node_mut(left).right = right;
        self.node_mut(right).left = left;
        let node = self.node_mut(x);
        node.left = x;
        node.right = x;
    }

    /// Put self-looped `x` into the root list, updating the minimum.
    fn add_root(&mut self, x: usize) {
        match self.min {
            None => self.min = Some(x),
            Some(m) => {
                self.splice_after(m, x);
                if self.precedes(x, m) {
                    self.min = Some(x);
                }
            }
        }
    }
}
