use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

use super::store::{IndexField, NodeStore, SlotClaim, StoreError};
use crate::tree::types::{MemberCode, Participant, Side, now_ms};

/// In-process `NodeStore` backed by sharded concurrent maps.
///
/// Records live in `nodes`; `email_index` maps normalized emails to member codes
/// and is kept in step by `insert` and `update`. Clones share the same maps.
#[derive(Clone, Default)]
pub struct MemoryNodeStore {
    nodes: Arc<DashMap<MemberCode, Participant>>,
    email_index: Arc<DashMap<String, MemberCode>>,
}

impl MemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Snapshot of every stored record, unordered.
    #[cfg(test)]
    pub fn dump(&self) -> Vec<Participant> {
        self.nodes
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[async_trait]
impl NodeStore for MemoryNodeStore {
    async fn get(&self, code: &MemberCode) -> Result<Option<Participant>, StoreError> {
        Ok(self.nodes.get(code).map(|entry| entry.value().clone()))
    }

    async fn get_by_index(
        &self,
        field: IndexField,
        value: &str,
    ) -> Result<Option<Participant>, StoreError> {
        let code = match field {
            IndexField::MemberCode => MemberCode(value.to_string()),
            IndexField::Email => match self.email_index.get(&normalize_email(value)) {
                Some(code) => code.value().clone(),
                None => return Ok(None),
            },
        };
        self.get(&code).await
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.nodes.len() as u64)
    }

    async fn insert(&self, participant: Participant) -> Result<MemberCode, StoreError> {
        let email = normalize_email(&participant.email);
        let code = participant.member_code.clone();

        // Index entry is taken first so two inserts racing on one email cannot both land.
        let index_slot = match self.email_index.entry(email) {
            Entry::Occupied(_) => {
                return Err(StoreError::DuplicateIndexKey {
                    index: IndexField::Email.name(),
                });
            }
            Entry::Vacant(slot) => slot,
        };

        match self.nodes.entry(code.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateKey(code)),
            Entry::Vacant(node_slot) => {
                node_slot.insert(participant);
                index_slot.insert(code.clone());
                tracing::debug!("Inserted participant {}", code);
                Ok(code)
            }
        }
    }

    async fn update(&self, participant: Participant) -> Result<(), StoreError> {
        let code = participant.member_code.clone();
        let old_email = match self.nodes.get(&code) {
            Some(existing) => normalize_email(&existing.email),
            None => return Err(StoreError::NotFound(code)),
        };

        // Same lock order as `insert`: index first, then the record.
        let new_email = normalize_email(&participant.email);
        if old_email != new_email {
            match self.email_index.entry(new_email) {
                Entry::Occupied(_) => {
                    return Err(StoreError::DuplicateIndexKey {
                        index: IndexField::Email.name(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(code.clone());
                }
            }
            self.email_index.remove(&old_email);
        }

        match self.nodes.get_mut(&code) {
            Some(mut existing) => {
                *existing = participant;
                Ok(())
            }
            None => Err(StoreError::NotFound(code)),
        }
    }

    async fn increment_count(
        &self,
        code: &MemberCode,
        side: Side,
    ) -> Result<Participant, StoreError> {
        let mut node = self
            .nodes
            .get_mut(code)
            .ok_or_else(|| StoreError::NotFound(code.clone()))?;

        node.increment_count(side);
        node.updated_at = now_ms();
        Ok(node.clone())
    }

    async fn claim_slot(
        &self,
        parent: &MemberCode,
        side: Side,
        child: &MemberCode,
    ) -> Result<SlotClaim, StoreError> {
        let mut node = self
            .nodes
            .get_mut(parent)
            .ok_or_else(|| StoreError::NotFound(parent.clone()))?;

        let slot = node.child_mut(side);
        if let Some(existing) = slot.as_ref() {
            return Ok(SlotClaim::Occupied(existing.clone()));
        }
        *slot = Some(child.clone());
        node.updated_at = now_ms();

        tracing::debug!("Claimed {} slot of {} for {}", side, parent, child);
        Ok(SlotClaim::Claimed)
    }

    async fn release_slot(
        &self,
        parent: &MemberCode,
        side: Side,
        child: &MemberCode,
    ) -> Result<bool, StoreError> {
        let mut node = self
            .nodes
            .get_mut(parent)
            .ok_or_else(|| StoreError::NotFound(parent.clone()))?;

        let slot = node.child_mut(side);
        if slot.as_ref() != Some(child) {
            return Ok(false);
        }
        *slot = None;
        node.updated_at = now_ms();

        tracing::debug!("Released {} slot of {} (was {})", side, parent, child);
        Ok(true)
    }
}
