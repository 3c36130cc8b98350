//! Registration Orchestration
//!
//! Runs the insertion saga: resolve placement, claim the slot, store the
//! record, propagate counts. Also serves profile, downline and audit reads.
//!
//! ## Write serialization
//! Every insertion walks its ancestor chain up to the root, so all chains share
//! the root and a per-chain lock would serialize everything anyway. Writers take
//! one async mutex for the whole saga. The slot claim itself is still a
//! compare-and-set in the store, so a writer outside this process racing for
//! the same slot is detected and the placement walk is retried. Propagation only
//! bumps counters in place, so it never overwrites a link claimed that way.

use std::sync::Arc;
use tokio::sync::Mutex;

use super::credentials::CredentialHasher;
use crate::storage::store::{IndexField, NodeStore, SlotClaim};
use crate::tree::audit::{CountMismatch, audit_counts};
use crate::tree::downline::downline;
use crate::tree::error::TreeError;
use crate::tree::placement::resolve_placement;
use crate::tree::propagation::{CountRule, propagate};
use crate::tree::types::{Downline, MemberCode, Participant, ROOT_SPONSOR, Side, now_ms};

pub const DEFAULT_MAX_CLAIM_RETRIES: usize = 8;

/// Input to `ReferralService::register`, already validated by the transport layer.
#[derive(Debug, Clone)]
pub struct NewRegistration {
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub password: String,
    /// Ignored for the first registration.
    pub sponsor_code: Option<String>,
    /// Ignored for the first registration.
    pub side: Option<Side>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registered {
    pub member_code: MemberCode,
    pub is_root: bool,
    /// Resolved tree parent, `None` for the root.
    pub parent: Option<MemberCode>,
}

/// Tunables for `ReferralService`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSettings {
    /// How often a lost slot race is re-resolved before giving up.
    pub max_claim_retries: usize,
    pub count_rule: CountRule,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            max_claim_retries: DEFAULT_MAX_CLAIM_RETRIES,
            count_rule: CountRule::default(),
        }
    }
}

pub struct ReferralService {
    store: Arc<dyn NodeStore>,
    hasher: Arc<dyn CredentialHasher>,
    write_lock: Mutex<()>,
    settings: ServiceSettings,
}

impl ReferralService {
    pub fn new(store: Arc<dyn NodeStore>, hasher: Arc<dyn CredentialHasher>) -> Arc<Self> {
        Self::with_settings(store, hasher, ServiceSettings::default())
    }

    pub fn with_settings(
        store: Arc<dyn NodeStore>,
        hasher: Arc<dyn CredentialHasher>,
        settings: ServiceSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            hasher,
            write_lock: Mutex::new(()),
            settings,
        })
    }

    pub async fn register(&self, req: NewRegistration) -> Result<Registered, TreeError> {
        let _guard = self.write_lock.lock().await;
        let op_id = uuid::Uuid::new_v4();

        let existing = self.store.count().await?;
        let member_code = MemberCode::from_sequence(existing + 1);

        if existing == 0 {
            self.ensure_email_free(&req.email).await?;
            let root = self.build_record(&req, member_code.clone(), None, None);
            self.store.insert(root).await?;
            tracing::info!("[{}] Registered root participant {}", op_id, member_code);
            return Ok(Registered {
                member_code,
                is_root: true,
                parent: None,
            });
        }

        let sponsor_code = req.sponsor_code.clone().unwrap_or_default();
        let sponsor = self
            .store
            .get_by_index(IndexField::MemberCode, sponsor_code.trim())
            .await?
            .ok_or_else(|| TreeError::InvalidSponsor(sponsor_code.clone()))?;
        let side = req.side.ok_or(TreeError::MissingSide)?;
        self.ensure_email_free(&req.email).await?;

        let parent = self
            .claim_position(&sponsor.member_code, side, &member_code)
            .await?;
        tracing::debug!(
            "[{}] {} claimed {} slot of {} (sponsor {})",
            op_id,
            member_code,
            side,
            parent,
            sponsor.member_code
        );

        let record = self.build_record(
            &req,
            member_code.clone(),
            Some(parent.clone()),
            Some(sponsor.member_code.clone()),
        );
        if let Err(e) = self.store.insert(record).await {
            tracing::error!("[{}] Insert of {} failed, releasing slot: {}", op_id, member_code, e);
            if let Err(release_err) = self.store.release_slot(&parent, side, &member_code).await {
                tracing::error!(
                    "[{}] Could not release {} slot of {}: {}",
                    op_id,
                    side,
                    parent,
                    release_err
                );
            }
            return Err(e.into());
        }

        let rule = self.settings.count_rule;
        if let Err(chain) = propagate(self.store.as_ref(), &parent, side, rule).await {
            tracing::error!("[{}] Registered {} with incomplete counts: {}", op_id, member_code, chain);
            return Err(TreeError::PropagationIncomplete { member_code, chain });
        }

        tracing::info!(
            "[{}] Registered {} under {} ({}), sponsor {}",
            op_id,
            member_code,
            parent,
            side,
            sponsor.member_code
        );
        Ok(Registered {
            member_code,
            is_root: false,
            parent: Some(parent),
        })
    }

    async fn ensure_email_free(&self, email: &str) -> Result<(), TreeError> {
        match self.store.get_by_index(IndexField::Email, email).await? {
            Some(_) => Err(TreeError::EmailTaken(email.to_string())),
            None => Ok(()),
        }
    }

    /// Resolves placement and claims the slot, re-walking from the contested
    /// parent when another writer took it first.
    async fn claim_position(
        &self,
        sponsor: &MemberCode,
        side: Side,
        child: &MemberCode,
    ) -> Result<MemberCode, TreeError> {
        let mut anchor = sponsor.clone();

        for attempt in 0..=self.settings.max_claim_retries {
            let parent = resolve_placement(self.store.as_ref(), &anchor, side)
                .await?
                .ok_or_else(|| TreeError::NoAvailablePosition {
                    sponsor: sponsor.clone(),
                    side,
                })?;

            match self.store.claim_slot(&parent, side, child).await? {
                SlotClaim::Claimed => return Ok(parent),
                SlotClaim::Occupied(occupant) => {
                    tracing::warn!(
                        "{} slot of {} taken by {} (attempt {}), re-resolving",
                        side,
                        parent,
                        occupant,
                        attempt + 1
                    );
                    anchor = parent;
                }
            }
        }

        Err(TreeError::NoAvailablePosition {
            sponsor: sponsor.clone(),
            side,
        })
    }

    fn build_record(
        &self,
        req: &NewRegistration,
        member_code: MemberCode,
        parent: Option<MemberCode>,
        referred_by: Option<MemberCode>,
    ) -> Participant {
        let now = now_ms();
        Participant {
            member_code,
            name: req.name.trim().to_string(),
            email: req.email.trim().to_string(),
            mobile: req.mobile.trim().to_string(),
            credential_hash: self.hasher.hash(&req.password),
            sponsor_code: parent
                .as_ref()
                .map(|p| p.0.clone())
                .unwrap_or_else(|| ROOT_SPONSOR.to_string()),
            referred_by,
            parent_id: parent,
            left_child: None,
            right_child: None,
            left_count: 0,
            right_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub async fn get_profile(&self, code: &MemberCode) -> Result<Participant, TreeError> {
        self.store
            .get(code)
            .await?
            .ok_or_else(|| TreeError::NodeNotFound(code.clone()))
    }

    /// Read-only; may observe a registration half-way through.
    pub async fn get_downline(&self, code: &MemberCode) -> Result<Downline, TreeError> {
        downline(self.store.as_ref(), code).await
    }

    pub async fn audit(&self, code: &MemberCode) -> Result<Vec<CountMismatch>, TreeError> {
        let _guard = self.write_lock.lock().await;
        audit_counts(self.store.as_ref(), code).await
    }

    #[cfg(test)]
    pub fn verify_credential(&self, participant: &Participant, secret: &str) -> bool {
        self.hasher.verify(secret, &participant.credential_hash)
    }
}
