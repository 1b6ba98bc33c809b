//! In-process reference order-statistic tree.
//!
//! [`MemoryStructure`] answers the same queries a remote tree service does
//! and is laid out the same way: nodes live in a map keyed by their own key,
//! key `0` is the anchor whose right child is the real root, and repeated
//! insertions of a key are folded into that node's `dupes` counter.
//! Insertions of key `0` itself land on the anchor's counter.
//!
//! It backs the offline sandbox mode and serves as the known-good structure
//! in tests. [`MemoryStructure::tamper`] lets tests break it on purpose.

use core::cmp::max;
use std::collections::HashMap;

use async_trait::async_trait;
use ostcheck_primitives::handle::{NodeHandle, Side};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::{ClientError, StructureClient};

const ANCHOR: u64 = 0;
const LEFT: bool = false;
const RIGHT: bool = true;

#[derive(Clone, Copy, Debug, Default)]
struct Node {
    parent: u64,
    right_side: bool,
    children: [u64; 2],
    height: u64,
    count: u64,
    dupes: u64,
}

impl Node {
    const fn child(&self, right: bool) -> u64 {
        self.children[right as usize]
    }
}

#[derive(Debug)]
struct Tree {
    nodes: HashMap<u64, Node>,
}

impl Default for Tree {
    fn default() -> Self {
        let mut nodes = HashMap::new();
        let _previous = nodes.insert(ANCHOR, Node::default());

        Self { nodes }
    }
}

impl Tree {
    /// Unknown keys read as an all-zero node, like an unset storage slot.
    fn node(&self, key: u64) -> Node {
        self.nodes.get(&key).copied().unwrap_or_default()
    }

    fn node_mut(&mut self, key: u64) -> &mut Node {
        self.nodes.entry(key).or_default()
    }

    fn child(&self, key: u64, right: bool) -> u64 {
        self.node(key).child(right)
    }

    fn height(&self, key: u64) -> u64 {
        if key == ANCHOR {
            0
        } else {
            self.node(key).height
        }
    }

    fn count(&self, key: u64) -> u64 {
        if key == ANCHOR {
            0
        } else {
            self.node(key).count
        }
    }

    fn root(&self) -> u64 {
        self.child(ANCHOR, RIGHT)
    }

    fn set_child(&mut self, parent: u64, right: bool, child: u64) {
        self.node_mut(parent).children[right as usize] = child;

        if child != ANCHOR {
            let node = self.node_mut(child);
            node.parent = parent;
            node.right_side = right;
        }
    }

    fn refresh(&mut self, key: u64) {
        let node = self.node(key);
        let [left, right] = node.children;

        let height = 1 + max(self.height(left), self.height(right));
        let count = 1 + node.dupes + self.count(left) + self.count(right);

        let node = self.node_mut(key);
        node.height = height;
        node.count = count;
    }

    /// Rotates `key` towards `toward`, returning the subtree's new root.
    fn rotate(&mut self, key: u64, toward: bool) -> u64 {
        let pivot = self.child(key, !toward);
        let inner = self.child(pivot, toward);

        self.set_child(key, !toward, inner);
        self.refresh(key);
        self.set_child(pivot, toward, key);
        self.refresh(pivot);

        pivot
    }

    fn balance(&mut self, key: u64) -> u64 {
        self.refresh(key);

        let [left, right] = self.node(key).children;
        let (left_height, right_height) = (self.height(left), self.height(right));

        if left_height > right_height + 1 {
            let [outer, inner] = self.node(left).children;
            if self.height(outer) < self.height(inner) {
                let left = self.rotate(left, LEFT);
                self.set_child(key, LEFT, left);
            }
            return self.rotate(key, RIGHT);
        }

        if right_height > left_height + 1 {
            let [inner, outer] = self.node(right).children;
            if self.height(outer) < self.height(inner) {
                let right = self.rotate(right, RIGHT);
                self.set_child(key, RIGHT, right);
            }
            return self.rotate(key, LEFT);
        }

        key
    }

    fn insert(&mut self, key: u64) {
        if key == ANCHOR {
            self.node_mut(ANCHOR).dupes += 1;
            return;
        }

        let root = self.insert_at(self.root(), key);
        self.set_child(ANCHOR, RIGHT, root);
    }

    fn insert_at(&mut self, cur: u64, key: u64) -> u64 {
        if cur == ANCHOR {
            let _previous = self.nodes.insert(
                key,
                Node {
                    height: 1,
                    count: 1,
                    ..Node::default()
                },
            );
            return key;
        }

        if cur == key {
            self.node_mut(cur).dupes += 1;
            self.refresh(cur);
            return cur;
        }

        let right = key > cur;
        let subtree = self.insert_at(self.child(cur, right), key);
        self.set_child(cur, right, subtree);

        self.balance(cur)
    }

    fn remove(&mut self, key: u64) {
        if key == ANCHOR {
            let anchor = self.node_mut(ANCHOR);
            anchor.dupes = anchor.dupes.saturating_sub(1);
            return;
        }

        let root = self.remove_at(self.root(), key);
        self.set_child(ANCHOR, RIGHT, root);
    }

    fn remove_at(&mut self, cur: u64, key: u64) -> u64 {
        if cur == ANCHOR {
            return ANCHOR;
        }

        if cur != key {
            let right = key > cur;
            let subtree = self.remove_at(self.child(cur, right), key);
            self.set_child(cur, right, subtree);
            return self.balance(cur);
        }

        let node = self.node(cur);
        if node.dupes > 0 {
            self.node_mut(cur).dupes -= 1;
            self.refresh(cur);
            return cur;
        }

        let _removed = self.nodes.remove(&cur);

        match node.children {
            [ANCHOR, only] | [only, ANCHOR] => only,
            [left, right] => {
                let (rest, successor) = self.detach_min(right);
                self.set_child(successor, LEFT, left);
                self.set_child(successor, RIGHT, rest);
                self.balance(successor)
            }
        }
    }

    /// Unlinks the smallest node under `cur`, returning the remaining
    /// subtree and the detached key.
    fn detach_min(&mut self, cur: u64) -> (u64, u64) {
        let left = self.child(cur, LEFT);
        if left == ANCHOR {
            return (self.child(cur, RIGHT), cur);
        }

        let (rest, min) = self.detach_min(left);
        self.set_child(cur, LEFT, rest);

        (self.balance(cur), min)
    }

    /// Number of stored elements strictly smaller than `key`.
    fn rank(&self, key: u64) -> u64 {
        if key == ANCHOR {
            return 0;
        }

        let mut smaller = self.node(ANCHOR).dupes;
        let mut cur = self.root();

        while cur != ANCHOR {
            let node = self.node(cur);
            if cur < key {
                smaller += 1 + node.dupes + self.count(node.child(LEFT));
                cur = node.child(RIGHT);
            } else {
                if cur == key {
                    smaller += self.count(node.child(LEFT));
                    break;
                }
                cur = node.child(LEFT);
            }
        }

        smaller
    }

    fn multiplicity(&self, key: u64) -> u64 {
        if key == ANCHOR {
            return self.node(ANCHOR).dupes;
        }

        self.nodes.get(&key).map_or(0, |node| node.dupes + 1)
    }

    fn total(&self) -> u64 {
        self.node(ANCHOR).dupes + self.count(self.root())
    }

    /// Midpoint percentile: elements below `key` count fully, copies of
    /// `key` count half.
    fn percentile(&self, key: u64) -> u64 {
        let total = self.total();
        if total == 0 {
            return 0;
        }

        (100 * self.rank(key) + 50 * self.multiplicity(key)) / total
    }
}

/// A deliberate fault injected into a [`MemoryStructure`] node.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Tamper {
    Count(u64),
    Height(u64),
    Dupes(u64),
    Parent(u64),
    /// Overwrites the left child reference without relinking anything.
    LeftChild(u64),
    /// Overwrites the right child reference without relinking anything.
    RightChild(u64),
}

#[derive(Debug, Default)]
pub struct MemoryStructure {
    tree: Mutex<Tree>,
}

impl MemoryStructure {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored elements, duplicates included.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.tree.lock().total()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn tamper(&self, handle: NodeHandle, tamper: Tamper) {
        let mut tree = self.tree.lock();
        let node = tree.node_mut(handle.key());

        match tamper {
            Tamper::Count(count) => node.count = count,
            Tamper::Height(height) => node.height = height,
            Tamper::Dupes(dupes) => node.dupes = dupes,
            Tamper::Parent(parent) => node.parent = parent,
            Tamper::LeftChild(child) => node.children[LEFT as usize] = child,
            Tamper::RightChild(child) => node.children[RIGHT as usize] = child,
        }
    }
}

#[async_trait]
impl StructureClient for MemoryStructure {
    async fn node_side(&self, handle: NodeHandle) -> Result<Side, ClientError> {
        Ok(Side::from_flag(self.tree.lock().node(handle.key()).right_side))
    }

    async fn node_dupes(&self, handle: NodeHandle) -> Result<u64, ClientError> {
        Ok(self.tree.lock().node(handle.key()).dupes)
    }

    async fn node_parent(&self, handle: NodeHandle) -> Result<NodeHandle, ClientError> {
        Ok(NodeHandle::new(self.tree.lock().node(handle.key()).parent))
    }

    async fn node_height(&self, handle: NodeHandle) -> Result<u64, ClientError> {
        Ok(self.tree.lock().node(handle.key()).height)
    }

    async fn node_count(&self, handle: NodeHandle) -> Result<u64, ClientError> {
        Ok(self.tree.lock().node(handle.key()).count)
    }

    async fn node_left_child(&self, handle: NodeHandle) -> Result<Option<NodeHandle>, ClientError> {
        Ok(NodeHandle::child(self.tree.lock().child(handle.key(), LEFT)))
    }

    async fn node_right_child(
        &self,
        handle: NodeHandle,
    ) -> Result<Option<NodeHandle>, ClientError> {
        Ok(NodeHandle::child(self.tree.lock().child(handle.key(), RIGHT)))
    }

    async fn insert(&self, key: u64) -> Result<(), ClientError> {
        debug!(key, "Inserting into memory structure");
        self.tree.lock().insert(key);
        Ok(())
    }

    async fn remove(&self, key: u64) -> Result<(), ClientError> {
        debug!(key, "Removing from memory structure");
        self.tree.lock().remove(key);
        Ok(())
    }

    async fn rank(&self, key: u64) -> Result<Value, ClientError> {
        Ok(self.tree.lock().rank(key).into())
    }

    async fn percentile(&self, key: u64) -> Result<Value, ClientError> {
        Ok(self.tree.lock().percentile(key).into())
    }

    async fn count(&self) -> Result<Value, ClientError> {
        Ok(self.tree.lock().total().into())
    }
}
