//! Downline Reporter
//!
//! Flattens each side's subtree into a pre-order list (node, then its left
//! subtree, then its right subtree). Uses an explicit stack so chain-shaped
//! trees of any depth cannot overflow the call stack.
//!
//! Missing nodes and store errors are logged and skipped: a partial report is
//! returned instead of failing the request.

use std::collections::HashSet;

use super::error::TreeError;
use super::types::{Downline, MemberCode, Participant, ParticipantSummary, Side};
use crate::storage::store::NodeStore;

/// Collects every node of the subtree rooted at `start`, pre-order, left first.
pub async fn collect_subtree<S>(store: &S, start: Option<&MemberCode>) -> Vec<ParticipantSummary>
where
    S: NodeStore + ?Sized,
{
    let mut members = Vec::new();
    let mut stack: Vec<MemberCode> = start.into_iter().cloned().collect();
    let mut visited: HashSet<MemberCode> = HashSet::new();

    while let Some(code) = stack.pop() {
        if !visited.insert(code.clone()) {
            tracing::warn!("Downline walk reached {} twice, skipping", code);
            continue;
        }

        let node = match store.get(&code).await {
            Ok(Some(node)) => node,
            Ok(None) => {
                tracing::warn!("Downline walk skipped dangling link to {}", code);
                continue;
            }
            Err(e) => {
                tracing::warn!("Downline walk could not load {}: {}", code, e);
                continue;
            }
        };

        members.push(node.summary());

        // Right is pushed first so the left subtree is emitted before it.
        if let Some(right) = node.right_child {
            stack.push(right);
        }
        if let Some(left) = node.left_child {
            stack.push(left);
        }
    }

    members
}

/// All descendants hanging below `node`'s `side` link.
pub async fn collect_side<S>(store: &S, node: &Participant, side: Side) -> Vec<ParticipantSummary>
where
    S: NodeStore + ?Sized,
{
    collect_subtree(store, node.child(side)).await
}

pub async fn downline<S>(store: &S, code: &MemberCode) -> Result<Downline, TreeError>
where
    S: NodeStore + ?Sized,
{
    let node = store
        .get(code)
        .await?
        .ok_or_else(|| TreeError::NodeNotFound(code.clone()))?;

    Ok(Downline {
        left_members: collect_side(store, &node, Side::Left).await,
        right_members: collect_side(store, &node, Side::Right).await,
    })
}
