//! Count auditing: recomputes subtree sizes from the child links and reports
//! every node whose stored `left_count`/`right_count` disagrees.
//!
//! Used after `PropagationIncomplete` to find the damaged ancestors.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::error::TreeError;
use super::types::{MemberCode, Participant, Side};
use crate::storage::store::NodeStore;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CountMismatch {
    pub member_code: MemberCode,
    pub side: Side,
    pub stored: u64,
    pub actual: u64,
}

/// Audits the subtree rooted at `code`.
///
/// Dangling links contribute zero nodes, matching what the downline report shows.
pub async fn audit_counts<S>(store: &S, code: &MemberCode) -> Result<Vec<CountMismatch>, TreeError>
where
    S: NodeStore + ?Sized,
{
    let root = store
        .get(code)
        .await?
        .ok_or_else(|| TreeError::NodeNotFound(code.clone()))?;

    // Pre-order load; walking it backwards visits children before parents.
    let mut order: Vec<Participant> = Vec::new();
    let mut stack = vec![root];
    let mut seen: HashSet<MemberCode> = HashSet::new();
    while let Some(node) = stack.pop() {
        if !seen.insert(node.member_code.clone()) {
            continue;
        }
        for side in [Side::Right, Side::Left] {
            if let Some(child) = node.child(side) {
                match store.get(child).await? {
                    Some(child) => stack.push(child),
                    None => tracing::warn!("Audit found dangling {} link {} -> {}", side, node.member_code, child),
                }
            }
        }
        order.push(node);
    }

    let mut sizes: HashMap<MemberCode, u64> = HashMap::new();
    let mut mismatches = Vec::new();
    for node in order.iter().rev() {
        let mut total = 1u64;
        for side in [Side::Left, Side::Right] {
            let actual = node
                .child(side)
                .and_then(|child| sizes.get(child).copied())
                .unwrap_or(0);
            total += actual;

            let stored = node.count(side);
            if stored != actual {
                mismatches.push(CountMismatch {
                    member_code: node.member_code.clone(),
                    side,
                    stored,
                    actual,
                });
            }
        }
        sizes.insert(node.member_code.clone(), total);
    }

    if mismatches.is_empty() {
        tracing::debug!("Audit of {} checked {} node(s), counts consistent", code, order.len());
    } else {
        tracing::warn!("Audit of {} found {} count mismatch(es)", code, mismatches.len());
    }
    Ok(mismatches)
}
