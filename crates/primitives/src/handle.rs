use core::fmt;

use serde::{Deserialize, Serialize};

/// Names a node of the remote tree.
///
/// Nodes are identified by their own key. The raw value `0` is never a tree
/// node: as a traversal start it designates the anchor, the sentinel whose
/// right child is the real root, and as a child reference on the wire it
/// means "no node". Child references are therefore decoded into
/// `Option<NodeHandle>` via [`NodeHandle::child`].
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct NodeHandle(u64);

impl NodeHandle {
    pub const ANCHOR: Self = Self(0);

    #[must_use]
    pub const fn new(key: u64) -> Self {
        Self(key)
    }

    /// Decodes a child reference, mapping the null reference to `None`.
    #[must_use]
    pub const fn child(raw: u64) -> Option<Self> {
        if raw == 0 {
            None
        } else {
            Some(Self(raw))
        }
    }

    #[must_use]
    pub const fn key(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn is_anchor(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_anchor() {
            f.write_str("anchor")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// The child slot of its parent a node occupies.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Decodes the wire flag, where `true` means right.
    #[must_use]
    pub const fn from_flag(right: bool) -> Self {
        if right {
            Self::Right
        } else {
            Self::Left
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Left => "left",
            Self::Right => "right",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_child_reference_decodes_to_none() {
        assert_eq!(NodeHandle::child(0), None);
        assert_eq!(NodeHandle::child(7), Some(NodeHandle::new(7)));
    }

    #[test]
    fn anchor_displays_by_role() {
        assert_eq!(NodeHandle::ANCHOR.to_string(), "anchor");
        assert_eq!(NodeHandle::new(42).to_string(), "42");
    }

    #[test]
    fn side_flag_true_is_right() {
        assert_eq!(Side::from_flag(true), Side::Right);
        assert_eq!(Side::from_flag(false), Side::Left);
        assert_eq!(serde_json::to_string(&Side::Right).unwrap(), r#""right""#);
    }
}
