use std::collections::HashSet;

use ostcheck_client::{ClientError, StructureClient};
use ostcheck_primitives::handle::{NodeHandle, Side};
use tracing::{debug, warn};

use crate::snapshot::Snapshot;

/// The outcome of one reconstruction pass.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Reconstruction {
    pub snapshot: Snapshot,
    /// Set when a handle was reached twice. The snapshot is then partial and
    /// must not be trusted or checked.
    pub cycle: bool,
}

struct Fetched {
    snapshot: Snapshot,
    left: Option<NodeHandle>,
    right: Option<NodeHandle>,
}

/// Rebuilds the remote tree below `start` by querying every node.
///
/// Only reads are issued. The walk is depth first, left before right, and
/// stops at the first handle it has already seen.
pub async fn reconstruct<C>(client: &C, start: NodeHandle) -> Result<Reconstruction, ClientError>
where
    C: StructureClient + ?Sized,
{
    let mut visited = HashSet::new();
    let _fresh = visited.insert(start);

    let Fetched {
        snapshot: mut root,
        left,
        right,
    } = fetch(client, start).await?;

    // Each entry is a node together with the index of its parent in this
    // list (0 for the start node, i + 1 for entry i) and the slot it fills.
    let mut descendants: Vec<(Snapshot, usize, Side)> = Vec::new();
    let mut pending = Vec::new();
    push_children(&mut pending, 0, left, right);

    let mut cycle = false;

    while let Some((handle, parent, side)) = pending.pop() {
        if !visited.insert(handle) {
            warn!(%handle, "Cycle detected while reconstructing tree");
            cycle = true;
            break;
        }

        let fetched = fetch(client, handle).await?;

        descendants.push((fetched.snapshot, parent, side));
        push_children(&mut pending, descendants.len(), fetched.left, fetched.right);
    }

    debug!(
        nodes = descendants.len() + 1,
        cycle, "Reconstructed tree from {start}"
    );

    // Children always come after their parent, so attaching from the back
    // completes every subtree before it is moved into its parent.
    while let Some((child, parent, side)) = descendants.pop() {
        let target = match parent.checked_sub(1) {
            None => &mut root,
            Some(index) => match descendants.get_mut(index) {
                Some((snapshot, _, _)) => snapshot,
                None => continue,
            },
        };
        target.attach(side, child);
    }

    Ok(Reconstruction {
        snapshot: root,
        cycle,
    })
}

fn push_children(
    pending: &mut Vec<(NodeHandle, usize, Side)>,
    parent: usize,
    left: Option<NodeHandle>,
    right: Option<NodeHandle>,
) {
    if let Some(right) = right {
        pending.push((right, parent, Side::Right));
    }
    if let Some(left) = left {
        pending.push((left, parent, Side::Left));
    }
}

async fn fetch<C>(client: &C, handle: NodeHandle) -> Result<Fetched, ClientError>
where
    C: StructureClient + ?Sized,
{
    let side = client.node_side(handle).await?;
    let dupes = client.node_dupes(handle).await?;

    let mut snapshot = Snapshot::anchor(dupes);
    snapshot.value = handle;

    if !handle.is_anchor() {
        snapshot.side = Some(side);
        snapshot.parent = Some(client.node_parent(handle).await?);
        snapshot.height = Some(client.node_height(handle).await?);
        snapshot.count = Some(client.node_count(handle).await?);
    }

    let left = client.node_left_child(handle).await?;
    let right = client.node_right_child(handle).await?;

    Ok(Fetched {
        snapshot,
        left,
        right,
    })
}
