//! Count Propagator
//!
//! After a node is linked under `start` on `side`, every ancestor from `start` up
//! to the root gains one node in one of its subtrees. The walk follows
//! `parent_id` links and increments exactly one counter per ancestor.
//!
//! Which counter is decided by `CountRule`. `Subtree` checks which child link of
//! each ancestor the walk arrived through, so `left_count`/`right_count` stay
//! exact subtree sizes. `InsertionSide` applies the insertion side all the way
//! up; the two only differ once a placement happens on the opposite side of an
//! ancestor's own position.
//!
//! Each step reads the ancestor, then bumps its counter through the store's
//! atomic `increment_count`, so child links claimed by other writers survive.
//! The walk as a whole is not atomic: callers serialize writers (see
//! `ReferralService`) and a failed step leaves the lower increments in place.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use super::error::BrokenChain;
use super::types::{MemberCode, Side};
use crate::storage::store::{NodeStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountRule {
    /// Each ancestor counts the new node on the side that holds it.
    #[default]
    Subtree,
    /// Every ancestor counts the new node on the insertion side.
    InsertionSide,
}

impl fmt::Display for CountRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountRule::Subtree => f.write_str("subtree"),
            CountRule::InsertionSide => f.write_str("insertion-side"),
        }
    }
}

impl FromStr for CountRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "subtree" => Ok(CountRule::Subtree),
            "insertion-side" | "insertion_side" => Ok(CountRule::InsertionSide),
            other => Err(format!(
                "unknown count rule '{}', expected 'subtree' or 'insertion-side'",
                other
            )),
        }
    }
}

/// Increments one counter on `start` and on each of its ancestors.
///
/// `start` always gets its `side` counter bumped. Returns the number of nodes
/// updated (placement depth + 1).
pub async fn propagate<S>(
    store: &S,
    start: &MemberCode,
    side: Side,
    rule: CountRule,
) -> Result<usize, BrokenChain>
where
    S: NodeStore + ?Sized,
{
    let mut current = start.clone();
    let mut below: Option<MemberCode> = None;
    let mut counted_side = side;
    let mut visited: HashSet<MemberCode> = HashSet::new();
    let mut applied = 0usize;

    loop {
        if !visited.insert(current.clone()) {
            tracing::error!("Propagation revisited {}, ancestor chain has a cycle", current);
            return Err(BrokenChain {
                applied,
                broken_at: current,
                cause: None,
            });
        }

        let node = match store.get(&current).await {
            Ok(Some(node)) => node,
            Ok(None) => {
                tracing::error!(
                    "Propagation of {} insertion below {} stopped: ancestor {} missing ({} applied)",
                    side,
                    start,
                    current,
                    applied
                );
                return Err(BrokenChain {
                    applied,
                    broken_at: current.clone(),
                    cause: Some(StoreError::NotFound(current)),
                });
            }
            Err(e) => {
                return Err(BrokenChain {
                    applied,
                    broken_at: current,
                    cause: Some(e),
                });
            }
        };

        if rule == CountRule::Subtree
            && let Some(child) = &below
        {
            counted_side = match node.side_of(child) {
                Some(s) => s,
                None => {
                    tracing::error!(
                        "Propagation stopped: {} is recorded as parent of {} but does not link to it",
                        current,
                        child
                    );
                    return Err(BrokenChain {
                        applied,
                        broken_at: current,
                        cause: None,
                    });
                }
            };
        }

        // Counter only, child links are never written back from `node`.
        let node = match store.increment_count(&current, counted_side).await {
            Ok(node) => node,
            Err(e) => {
                tracing::error!("Propagation failed to persist {}: {}", current, e);
                return Err(BrokenChain {
                    applied,
                    broken_at: current,
                    cause: Some(e),
                });
            }
        };
        applied += 1;

        match node.parent_id {
            Some(parent) => below = Some(std::mem::replace(&mut current, parent)),
            None => break,
        }
    }

    tracing::debug!(
        "Propagated {} insertion below {} to {} ancestor(s) ({})",
        side,
        start,
        applied,
        rule
    );
    Ok(applied)
}
