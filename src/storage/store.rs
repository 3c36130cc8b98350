//! Node Store Contract
//!
//! The persistence seam consumed by placement, propagation and reporting.
//! Implementations only need keyed lookups, a unique email index, whole-record
//! updates and two atomic primitives: claiming an empty child slot and bumping
//! a subtree counter.

use async_trait::async_trait;
use thiserror::Error;

use crate::tree::types::{MemberCode, Participant, Side};

/// Secondary lookup keys supported by `NodeStore::get_by_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexField {
    MemberCode,
    Email,
}

impl IndexField {
    pub fn name(&self) -> &'static str {
        match self {
            IndexField::MemberCode => "member_code",
            IndexField::Email => "email",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("entity not found: {0}")]
    NotFound(MemberCode),

    #[error("duplicate primary key: {0}")]
    DuplicateKey(MemberCode),

    #[error("duplicate index key in: {index}")]
    DuplicateIndexKey { index: &'static str },

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Outcome of `NodeStore::claim_slot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotClaim {
    /// The slot was empty and now points at the new child.
    Claimed,
    /// Another writer got there first; carries the occupant.
    Occupied(MemberCode),
}

#[async_trait]
pub trait NodeStore: Send + Sync {
    async fn get(&self, code: &MemberCode) -> Result<Option<Participant>, StoreError>;

    async fn get_by_index(
        &self,
        field: IndexField,
        value: &str,
    ) -> Result<Option<Participant>, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;

    /// Fails with `DuplicateKey` or `DuplicateIndexKey` instead of overwriting.
    async fn insert(&self, participant: Participant) -> Result<MemberCode, StoreError>;

    /// Replaces an existing record. Fails with `NotFound` if it was never inserted.
    async fn update(&self, participant: Participant) -> Result<(), StoreError>;

    /// Adds one to `code`'s `side` counter in place and returns the updated
    /// record. Child links written concurrently are left untouched.
    async fn increment_count(
        &self,
        code: &MemberCode,
        side: Side,
    ) -> Result<Participant, StoreError>;

    /// Sets `parent.<side>_child = child` only if that slot is still empty.
    async fn claim_slot(
        &self,
        parent: &MemberCode,
        side: Side,
        child: &MemberCode,
    ) -> Result<SlotClaim, StoreError>;

    /// Undoes a claim. Clears the slot only while it still holds `child`;
    /// returns whether anything was cleared.
    async fn release_slot(
        &self,
        parent: &MemberCode,
        side: Side,
        child: &MemberCode,
    ) -> Result<bool, StoreError>;
}
