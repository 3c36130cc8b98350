//! Placement Engine
//!
//! Finds the true parent for a new registrant by walking the spine below the
//! sponsor: follow the requested side's child link until a node has that slot free.
//! Only one direction is ever explored, so the cost is the spine depth.

use std::collections::HashSet;

use super::types::{MemberCode, Side};
use crate::storage::store::{NodeStore, StoreError};

/// Returns the code of the first node on the `side` spine below `sponsor`
/// (the sponsor included) whose `side` slot is empty.
///
/// `Ok(None)` means the walk hit a dangling link or a cycle, which only
/// happens when the stored tree is damaged.
pub async fn resolve_placement<S>(
    store: &S,
    sponsor: &MemberCode,
    side: Side,
) -> Result<Option<MemberCode>, StoreError>
where
    S: NodeStore + ?Sized,
{
    let mut current = sponsor.clone();
    let mut visited: HashSet<MemberCode> = HashSet::new();

    loop {
        if !visited.insert(current.clone()) {
            tracing::error!("Placement walk revisited {}, {} spine has a cycle", current, side);
            return Ok(None);
        }

        let node = match store.get(&current).await? {
            Some(node) => node,
            None => {
                tracing::warn!(
                    "Placement walk from {} hit missing node {} on the {} spine",
                    sponsor,
                    current,
                    side
                );
                return Ok(None);
            }
        };

        match node.child(side) {
            None => {
                tracing::debug!(
                    "Placement for sponsor {} ({}) resolved to {} after {} step(s)",
                    sponsor,
                    side,
                    current,
                    visited.len() - 1
                );
                return Ok(Some(current));
            }
            Some(next) => current = next.clone(),
        }
    }
}
