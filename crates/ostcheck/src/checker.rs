//! Structural verification of reconstructed snapshots.
//!
//! Counts and heights are recomputed bottom-up from the children and compared
//! against what each node reported; the AVL balance bound is checked along
//! the way. The walk is post-order over an explicit stack, right subtree
//! before left, and stops at the first violation.

use core::cmp::max;

use ostcheck_primitives::handle::{NodeHandle, Side};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

use crate::snapshot::Snapshot;

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOptions {
    /// Also verify parent references, child sides and key ordering.
    #[serde(default)]
    pub links: bool,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize, ThisError)]
#[serde(tag = "kind", rename_all = "camelCase")]
#[non_exhaustive]
pub enum Violation {
    #[error("node {value} reports count {reported}, its subtree holds {computed}")]
    CountMismatch {
        value: NodeHandle,
        reported: u64,
        computed: u64,
    },

    #[error("node {value} reports height {reported}, its subtree is {computed} high")]
    HeightMismatch {
        value: NodeHandle,
        reported: u64,
        computed: u64,
    },

    #[error("node {value} is unbalanced: left height {left}, right height {right}")]
    Unbalanced {
        value: NodeHandle,
        left: u64,
        right: u64,
    },

    #[error("node {value} did not report its count and height")]
    MissingAttribute { value: NodeHandle },

    #[error("node {value} names {reported:?} as parent, but hangs below {actual}")]
    ParentMismatch {
        value: NodeHandle,
        reported: Option<NodeHandle>,
        actual: NodeHandle,
    },

    #[error("node {value} claims side {reported:?}, but occupies the {actual} slot")]
    SideMismatch {
        value: NodeHandle,
        reported: Option<Side>,
        actual: Side,
    },

    #[error("node {value} is out of order below {parent}")]
    OrderViolation {
        value: NodeHandle,
        parent: NodeHandle,
    },
}

#[derive(Clone, Copy, Debug, Default)]
struct Measure {
    count: u64,
    height: u64,
}

/// Key range a node must fall in, exclusive on both ends.
#[derive(Clone, Copy, Debug)]
struct Bounds {
    lower: Option<u64>,
    upper: Option<u64>,
}

impl Bounds {
    const UNBOUNDED: Self = Self {
        lower: None,
        upper: None,
    };

    fn admits(self, key: u64) -> bool {
        self.lower.map_or(true, |lower| key > lower) && self.upper.map_or(true, |upper| key < upper)
    }
}

enum Frame<'a> {
    Enter(&'a Snapshot, Bounds, Option<NodeHandle>),
    Exit(&'a Snapshot),
}

/// Whether the subtree rooted at `snapshot` breaks an invariant.
///
/// `None` stands for an empty subtree and is never corrupt.
#[must_use]
pub fn is_corrupt(snapshot: Option<&Snapshot>) -> bool {
    check(snapshot).is_err()
}

pub fn check(snapshot: Option<&Snapshot>) -> Result<(), Violation> {
    check_with(snapshot, CheckOptions::default())
}

pub fn check_with(snapshot: Option<&Snapshot>, options: CheckOptions) -> Result<(), Violation> {
    let Some(root) = snapshot else {
        return Ok(());
    };

    let mut frames = vec![Frame::Enter(root, Bounds::UNBOUNDED, root.parent)];
    let mut measures: Vec<Measure> = Vec::new();

    while let Some(frame) = frames.pop() {
        match frame {
            Frame::Enter(node, bounds, parent) => {
                let key = node.value.key();

                if options.links {
                    if !bounds.admits(key) {
                        return Err(Violation::OrderViolation {
                            value: node.value,
                            parent: parent.unwrap_or(NodeHandle::ANCHOR),
                        });
                    }
                    check_links(node)?;
                }

                frames.push(Frame::Exit(node));
                if let Some(left) = node.left.as_deref() {
                    let bounds = Bounds {
                        upper: Some(key),
                        ..bounds
                    };
                    frames.push(Frame::Enter(left, bounds, Some(node.value)));
                }
                if let Some(right) = node.right.as_deref() {
                    let bounds = Bounds {
                        lower: Some(key),
                        ..bounds
                    };
                    frames.push(Frame::Enter(right, bounds, Some(node.value)));
                }
            }
            Frame::Exit(node) => {
                // The left subtree finishes last, so its measure is on top.
                let left = node
                    .left
                    .as_ref()
                    .and_then(|_| measures.pop())
                    .unwrap_or_default();
                let right = node
                    .right
                    .as_ref()
                    .and_then(|_| measures.pop())
                    .unwrap_or_default();

                measures.push(measure(node, left, right)?);
            }
        }
    }

    Ok(())
}

fn measure(node: &Snapshot, left: Measure, right: Measure) -> Result<Measure, Violation> {
    let (Some(reported_count), Some(reported_height)) = (node.count, node.height) else {
        return Err(Violation::MissingAttribute { value: node.value });
    };

    if left.height.abs_diff(right.height) >= 2 {
        return Err(Violation::Unbalanced {
            value: node.value,
            left: left.height,
            right: right.height,
        });
    }

    let height = max(left.height, right.height).saturating_add(1);
    if height != reported_height {
        return Err(Violation::HeightMismatch {
            value: node.value,
            reported: reported_height,
            computed: height,
        });
    }

    let count = node
        .dupes
        .saturating_add(1)
        .saturating_add(left.count)
        .saturating_add(right.count);
    if count != reported_count {
        return Err(Violation::CountMismatch {
            value: node.value,
            reported: reported_count,
            computed: count,
        });
    }

    Ok(Measure { count, height })
}

fn check_links(node: &Snapshot) -> Result<(), Violation> {
    for side in [Side::Left, Side::Right] {
        let Some(child) = node.child(side) else {
            continue;
        };

        if child.parent != Some(node.value) {
            return Err(Violation::ParentMismatch {
                value: child.value,
                reported: child.parent,
                actual: node.value,
            });
        }

        if child.side != Some(side) {
            return Err(Violation::SideMismatch {
                value: child.value,
                reported: child.side,
                actual: side,
            });
        }
    }

    Ok(())
}
