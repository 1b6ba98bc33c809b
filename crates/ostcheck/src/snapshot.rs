use ostcheck_primitives::handle::{NodeHandle, Side};
use serde::{Deserialize, Serialize};

/// A locally rebuilt copy of one remote node and everything below it.
///
/// Augmented attributes are recorded exactly as the remote structure reported
/// them. They are absent on the anchor, whose height and count are never
/// asserted.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Snapshot {
    pub value: NodeHandle,
    pub dupes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<NodeHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<Box<Snapshot>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<Box<Snapshot>>,
}

impl Snapshot {
    /// A childless node with the given reported attributes.
    #[must_use]
    pub const fn node(value: NodeHandle, dupes: u64, height: u64, count: u64) -> Self {
        Self {
            value,
            dupes,
            side: None,
            parent: None,
            height: Some(height),
            count: Some(count),
            left: None,
            right: None,
        }
    }

    #[must_use]
    pub const fn anchor(dupes: u64) -> Self {
        Self {
            value: NodeHandle::ANCHOR,
            dupes,
            side: None,
            parent: None,
            height: None,
            count: None,
            left: None,
            right: None,
        }
    }

    #[must_use]
    pub fn with_child(mut self, side: Side, child: Self) -> Self {
        self.attach(side, child);
        self
    }

    pub fn attach(&mut self, side: Side, child: Self) {
        *self.child_mut(side) = Some(Box::new(child));
    }

    #[must_use]
    pub fn child(&self, side: Side) -> Option<&Self> {
        match side {
            Side::Left => self.left.as_deref(),
            Side::Right => self.right.as_deref(),
        }
    }

    fn child_mut(&mut self, side: Side) -> &mut Option<Box<Self>> {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    /// The real root hanging off the anchor.
    #[must_use]
    pub fn root(&self) -> Option<&Self> {
        self.right.as_deref()
    }

    /// Whether an anchor snapshot describes a tree holding no elements.
    #[must_use]
    pub const fn holds_nothing(&self) -> bool {
        self.right.is_none() && self.dupes == 0
    }

    /// Number of stored elements in this snapshot, duplicates included.
    ///
    /// The anchor itself is not an element, but its duplicates are.
    #[must_use]
    pub fn element_count(&self) -> u64 {
        let mut pending = vec![self];
        let mut total = 0_u64;

        while let Some(node) = pending.pop() {
            let own = u64::from(!node.value.is_anchor());
            total = total.saturating_add(own).saturating_add(node.dupes);
            pending.extend(node.left.as_deref());
            pending.extend(node.right.as_deref());
        }

        total
    }
}
