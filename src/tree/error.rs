use thiserror::Error;

use super::types::{MemberCode, Side};
use crate::storage::store::StoreError;

/// Count propagation stopped before reaching the root.
///
/// Increments already applied to lower ancestors are kept; nothing is rolled back.
#[derive(Debug, Error)]
#[error("count propagation stopped at {broken_at} after {applied} ancestor update(s)")]
pub struct BrokenChain {
    pub applied: usize,
    pub broken_at: MemberCode,
    #[source]
    pub cause: Option<StoreError>,
}

#[derive(Debug, Error)]
pub enum TreeError {
    /// The supplied sponsor code does not reference an existing participant.
    #[error("invalid sponsor code: '{0}'")]
    InvalidSponsor(String),

    /// A non-root registration did not say which side to join.
    #[error("a side (left or right) is required below the root")]
    MissingSide,

    /// The placement walk ran into a broken link or lost every slot race.
    #[error("no available {side} position below {sponsor}")]
    NoAvailablePosition { sponsor: MemberCode, side: Side },

    #[error("participant not found: {0}")]
    NodeNotFound(MemberCode),

    #[error("email already registered: {0}")]
    EmailTaken(String),

    /// The participant was stored but some ancestor counters were not updated.
    #[error("registered {member_code}, counts may be inconsistent: {chain}")]
    PropagationIncomplete {
        member_code: MemberCode,
        #[source]
        chain: BrokenChain,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}
