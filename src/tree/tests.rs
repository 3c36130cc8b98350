//! Tree Module Tests
//!
//! Exercises the tree algorithms directly against a `MemoryNodeStore`, with
//! trees assembled by hand so damaged shapes (dangling links, cycles, broken
//! ancestor chains) can be set up too.
//!
//! ## Test Scopes
//! - **Placement**: spine walk on one side only, zero-length walk, broken links.
//! - **Propagation**: both count rules up to the root, partial failure, unlinked parents,
//!   slot claims landing mid-walk.
//! - **Downline**: pre-order flattening per initial side, dangling links, deep chains.
//! - **Audit**: recount oracle against stored counters.

#[cfg(test)]
mod tests {
    use crate::storage::memory::MemoryNodeStore;
    use crate::storage::store::{IndexField, NodeStore, SlotClaim, StoreError};
    use crate::tree::audit::{CountMismatch, audit_counts};
    use crate::tree::downline::{collect_subtree, downline};
    use crate::tree::error::TreeError;
    use crate::tree::placement::resolve_placement;
    use crate::tree::propagation::{CountRule, propagate};
    use crate::tree::types::{MemberCode, Participant, Side};
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn code(s: &str) -> MemberCode {
        MemberCode::from(s)
    }

    /// Inserts `name` and links it into `parent`'s `side` slot. Counts are left alone.
    async fn add(store: &MemoryNodeStore, name: &str, parent: Option<(&str, Side)>) {
        let record = Participant {
            member_code: code(name),
            name: format!("Member {}", name),
            email: format!("{}@example.com", name.to_lowercase()),
            mobile: "555-0100".to_string(),
            credential_hash: String::new(),
            sponsor_code: parent.map(|(p, _)| p.to_string()).unwrap_or_else(|| "ROOT".to_string()),
            referred_by: parent.map(|(p, _)| code(p)),
            parent_id: parent.map(|(p, _)| code(p)),
            left_child: None,
            right_child: None,
            left_count: 0,
            right_count: 0,
            created_at: 0,
            updated_at: 0,
        };
        store.insert(record).await.unwrap();
        if let Some((p, side)) = parent {
            store.claim_slot(&code(p), side, &code(name)).await.unwrap();
        }
    }

    /// Links and propagates, the way a registration does.
    async fn attach(store: &MemoryNodeStore, name: &str, parent: &str, side: Side) {
        add(store, name, Some((parent, side))).await;
        propagate(store, &code(parent), side, CountRule::Subtree)
            .await
            .unwrap();
    }

    async fn node(store: &MemoryNodeStore, name: &str) -> Participant {
        store.get(&code(name)).await.unwrap().unwrap()
    }

    async fn corrupt<F: FnOnce(&mut Participant)>(store: &MemoryNodeStore, name: &str, f: F) {
        let mut record = node(store, name).await;
        f(&mut record);
        store.update(record).await.unwrap();
    }

    fn codes(members: &[crate::tree::types::ParticipantSummary]) -> Vec<&str> {
        members.iter().map(|m| m.member_code.as_str()).collect()
    }

    // ============================================================
    // PLACEMENT
    // ============================================================

    #[tokio::test]
    async fn test_placement_sponsor_with_free_slot_is_target() {
        let store = MemoryNodeStore::new();
        add(&store, "R", None).await;

        let target = resolve_placement(&store, &code("R"), Side::Left).await.unwrap();

        assert_eq!(target, Some(code("R")));
    }

    #[tokio::test]
    async fn test_placement_walks_the_requested_spine() {
        // R -L-> A -L-> B ; A also has a right child that must be ignored
        let store = MemoryNodeStore::new();
        add(&store, "R", None).await;
        add(&store, "A", Some(("R", Side::Left))).await;
        add(&store, "B", Some(("A", Side::Left))).await;
        add(&store, "X", Some(("A", Side::Right))).await;

        let left = resolve_placement(&store, &code("R"), Side::Left).await.unwrap();
        let right_from_a = resolve_placement(&store, &code("A"), Side::Right).await.unwrap();
        let right_from_r = resolve_placement(&store, &code("R"), Side::Right).await.unwrap();

        assert_eq!(left, Some(code("B")));
        assert_eq!(right_from_a, Some(code("X")));
        assert_eq!(right_from_r, Some(code("R")));
    }

    #[tokio::test]
    async fn test_placement_never_leaves_the_spine() {
        // B is a free left slot but sits on A's right, off R's left spine
        let store = MemoryNodeStore::new();
        add(&store, "R", None).await;
        add(&store, "A", Some(("R", Side::Left))).await;
        add(&store, "B", Some(("A", Side::Right))).await;

        let target = resolve_placement(&store, &code("R"), Side::Left).await.unwrap();

        assert_eq!(target, Some(code("A")));
    }

    #[tokio::test]
    async fn test_placement_dangling_link_is_none() {
        let store = MemoryNodeStore::new();
        add(&store, "R", None).await;
        corrupt(&store, "R", |r| r.left_child = Some(code("GHOST"))).await;

        let target = resolve_placement(&store, &code("R"), Side::Left).await.unwrap();

        assert_eq!(target, None);
    }

    #[tokio::test]
    async fn test_placement_cycle_is_none() {
        let store = MemoryNodeStore::new();
        add(&store, "R", None).await;
        add(&store, "A", Some(("R", Side::Right))).await;
        corrupt(&store, "A", |a| a.right_child = Some(code("R"))).await;

        let target = resolve_placement(&store, &code("R"), Side::Right).await.unwrap();

        assert_eq!(target, None);
    }

    // ============================================================
    // PROPAGATION
    // ============================================================

    /// R -L-> A -R-> B, with C linked into B's left slot but not yet counted.
    async fn zigzag_store() -> MemoryNodeStore {
        let store = MemoryNodeStore::new();
        add(&store, "R", None).await;
        attach(&store, "A", "R", Side::Left).await;
        attach(&store, "B", "A", Side::Right).await;
        add(&store, "C", Some(("B", Side::Left))).await;
        store
    }

    #[tokio::test]
    async fn test_propagation_subtree_rule_follows_links() {
        let store = zigzag_store().await;

        let applied = propagate(&store, &code("B"), Side::Left, CountRule::Subtree)
            .await
            .unwrap();

        assert_eq!(applied, 3);
        let (r, a, b) = (node(&store, "R").await, node(&store, "A").await, node(&store, "B").await);
        assert_eq!((r.left_count, r.right_count), (3, 0));
        assert_eq!((a.left_count, a.right_count), (0, 2));
        assert_eq!((b.left_count, b.right_count), (1, 0));
        assert!(audit_counts(&store, &code("R")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_propagation_insertion_side_rule_applies_side_everywhere() {
        let store = zigzag_store().await;

        let applied = propagate(&store, &code("B"), Side::Left, CountRule::InsertionSide)
            .await
            .unwrap();

        assert_eq!(applied, 3);
        let (r, a, b) = (node(&store, "R").await, node(&store, "A").await, node(&store, "B").await);
        assert_eq!((r.left_count, r.right_count), (3, 0));
        assert_eq!((a.left_count, a.right_count), (1, 1));
        assert_eq!((b.left_count, b.right_count), (1, 0));

        // A's counters no longer match its subtree
        let mismatches = audit_counts(&store, &code("R")).await.unwrap();
        assert_eq!(mismatches.len(), 2);
        assert!(mismatches.iter().all(|m| m.member_code == code("A")));
    }

    #[tokio::test]
    async fn test_propagation_stops_at_parent_without_back_link() {
        let store = MemoryNodeStore::new();
        add(&store, "R", None).await;
        attach(&store, "A", "R", Side::Left).await;
        add(&store, "B", Some(("A", Side::Left))).await;
        corrupt(&store, "R", |r| r.left_child = None).await;

        let err = propagate(&store, &code("A"), Side::Left, CountRule::Subtree)
            .await
            .unwrap_err();

        assert_eq!(err.applied, 1);
        assert_eq!(err.broken_at, code("R"));
        assert_eq!(err.cause, None);
        assert_eq!(node(&store, "A").await.left_count, 1);
        assert_eq!(node(&store, "R").await.left_count, 1);
    }

    #[tokio::test]
    async fn test_propagation_cycle_is_broken_chain() {
        let store = MemoryNodeStore::new();
        add(&store, "R", None).await;
        attach(&store, "A", "R", Side::Right).await;
        add(&store, "B", Some(("A", Side::Right))).await;
        corrupt(&store, "R", |r| r.parent_id = Some(code("A"))).await;

        let err = propagate(&store, &code("A"), Side::Right, CountRule::InsertionSide)
            .await
            .unwrap_err();

        assert_eq!(err.applied, 2);
        assert_eq!(err.broken_at, code("A"));
        assert_eq!(err.cause, None);
    }

    /// Lets another writer claim `(parent, side, child)` right after the
    /// first read of `parent`, before the caller writes anything back.
    struct RacingStore {
        inner: MemoryNodeStore,
        rival: Mutex<Option<(MemberCode, Side, MemberCode)>>,
    }

    #[async_trait]
    impl NodeStore for RacingStore {
        async fn get(&self, code: &MemberCode) -> Result<Option<Participant>, StoreError> {
            let snapshot = self.inner.get(code).await?;
            let rival = {
                let mut slot = self.rival.lock().unwrap();
                let due = matches!(slot.as_ref(), Some((parent, _, _)) if parent == code);
                if due { slot.take() } else { None }
            };
            if let Some((parent, side, child)) = rival {
                self.inner.claim_slot(&parent, side, &child).await?;
            }
            Ok(snapshot)
        }

        async fn get_by_index(
            &self,
            field: IndexField,
            value: &str,
        ) -> Result<Option<Participant>, StoreError> {
            self.inner.get_by_index(field, value).await
        }

        async fn count(&self) -> Result<u64, StoreError> {
            self.inner.count().await
        }

        async fn insert(&self, participant: Participant) -> Result<MemberCode, StoreError> {
            self.inner.insert(participant).await
        }

        async fn update(&self, participant: Participant) -> Result<(), StoreError> {
            self.inner.update(participant).await
        }

        async fn increment_count(
            &self,
            code: &MemberCode,
            side: Side,
        ) -> Result<Participant, StoreError> {
            self.inner.increment_count(code, side).await
        }

        async fn claim_slot(
            &self,
            parent: &MemberCode,
            side: Side,
            child: &MemberCode,
        ) -> Result<SlotClaim, StoreError> {
            self.inner.claim_slot(parent, side, child).await
        }

        async fn release_slot(
            &self,
            parent: &MemberCode,
            side: Side,
            child: &MemberCode,
        ) -> Result<bool, StoreError> {
            self.inner.release_slot(parent, side, child).await
        }
    }

    #[tokio::test]
    async fn test_propagation_keeps_slot_claimed_during_walk() {
        // R -L-> A; while the walk holds its read of R, Z claims R's right slot
        let inner = MemoryNodeStore::new();
        add(&inner, "R", None).await;
        attach(&inner, "A", "R", Side::Left).await;
        add(&inner, "B", Some(("A", Side::Left))).await;
        let store = RacingStore {
            inner,
            rival: Mutex::new(Some((code("R"), Side::Right, code("Z")))),
        };

        let applied = propagate(&store, &code("A"), Side::Left, CountRule::Subtree)
            .await
            .unwrap();

        assert_eq!(applied, 2);
        let r = node(&store.inner, "R").await;
        assert_eq!(r.right_child, Some(code("Z")));
        assert_eq!(r.left_child, Some(code("A")));
        assert_eq!(r.left_count, 2);
        assert!(store.rival.lock().unwrap().is_none());
    }

    #[test]
    fn test_count_rule_parses_and_displays() {
        assert_eq!("subtree".parse::<CountRule>(), Ok(CountRule::Subtree));
        assert_eq!(" Insertion-Side ".parse::<CountRule>(), Ok(CountRule::InsertionSide));
        assert_eq!("insertion_side".parse::<CountRule>(), Ok(CountRule::InsertionSide));
        assert!("sideways".parse::<CountRule>().is_err());
        assert_eq!(CountRule::default(), CountRule::Subtree);
        assert_eq!(CountRule::InsertionSide.to_string(), "insertion-side");
    }

    #[tokio::test]
    async fn test_propagation_from_root_touches_only_root() {
        let store = MemoryNodeStore::new();
        add(&store, "R", None).await;
        add(&store, "A", Some(("R", Side::Right))).await;

        let applied = propagate(&store, &code("R"), Side::Right, CountRule::Subtree)
            .await
            .unwrap();

        assert_eq!(applied, 1);
        assert_eq!(node(&store, "R").await.right_count, 1);
        assert_eq!(node(&store, "A").await.right_count, 0);
    }

    #[tokio::test]
    async fn test_propagation_broken_chain_keeps_applied_increments() {
        let store = MemoryNodeStore::new();
        add(&store, "R", None).await;
        attach(&store, "A", "R", Side::Left).await;
        attach(&store, "B", "A", Side::Left).await;
        corrupt(&store, "A", |a| a.parent_id = Some(code("GHOST"))).await;
        add(&store, "C", Some(("B", Side::Left))).await;

        let err = propagate(&store, &code("B"), Side::Left, CountRule::Subtree)
            .await
            .unwrap_err();

        assert_eq!(err.applied, 2);
        assert_eq!(err.broken_at, code("GHOST"));
        assert_eq!(err.cause, Some(StoreError::NotFound(code("GHOST"))));
        // No rollback: B and A were incremented, R was never reached
        assert_eq!(node(&store, "B").await.left_count, 1);
        assert_eq!(node(&store, "A").await.left_count, 2);
        assert_eq!(node(&store, "R").await.left_count, 2);
    }

    #[tokio::test]
    async fn test_propagation_missing_start_applies_nothing() {
        let store = MemoryNodeStore::new();

        let err = propagate(&store, &code("NOPE"), Side::Right, CountRule::Subtree)
            .await
            .unwrap_err();

        assert_eq!(err.applied, 0);
        assert_eq!(err.broken_at, code("NOPE"));
    }

    // ============================================================
    // DOWNLINE
    // ============================================================

    #[tokio::test]
    async fn test_downline_of_leaf_is_empty() {
        let store = MemoryNodeStore::new();
        add(&store, "R", None).await;

        let report = downline(&store, &code("R")).await.unwrap();

        assert!(report.left_members.is_empty());
        assert!(report.right_members.is_empty());
    }

    #[tokio::test]
    async fn test_downline_flattens_each_side_pre_order() {
        //          R
        //        /   \
        //       A     C
        //      / \     \
        //     B   D     E
        //    /
        //   F
        let store = MemoryNodeStore::new();
        add(&store, "R", None).await;
        attach(&store, "A", "R", Side::Left).await;
        attach(&store, "C", "R", Side::Right).await;
        attach(&store, "B", "A", Side::Left).await;
        attach(&store, "D", "A", Side::Right).await;
        attach(&store, "E", "C", Side::Right).await;
        attach(&store, "F", "B", Side::Left).await;

        let report = downline(&store, &code("R")).await.unwrap();

        assert_eq!(codes(&report.left_members), vec!["A", "B", "F", "D"]);
        assert_eq!(codes(&report.right_members), vec!["C", "E"]);

        let a = &report.left_members[0];
        assert_eq!(a.name, "Member A");
        assert_eq!((a.left_count, a.right_count), (2, 1));
    }

    #[tokio::test]
    async fn test_downline_skips_dangling_links() {
        let store = MemoryNodeStore::new();
        add(&store, "R", None).await;
        attach(&store, "A", "R", Side::Left).await;
        attach(&store, "B", "A", Side::Right).await;
        corrupt(&store, "A", |a| a.left_child = Some(code("GHOST"))).await;
        corrupt(&store, "R", |r| r.right_child = Some(code("VANISHED"))).await;

        let report = downline(&store, &code("R")).await.unwrap();

        assert_eq!(codes(&report.left_members), vec!["A", "B"]);
        assert!(report.right_members.is_empty());
    }

    #[tokio::test]
    async fn test_downline_unknown_member_is_not_found() {
        let store = MemoryNodeStore::new();

        let result = downline(&store, &code("M000404")).await;

        assert!(matches!(result, Err(TreeError::NodeNotFound(c)) if c == code("M000404")));
    }

    #[tokio::test]
    async fn test_collect_subtree_handles_deep_chain() {
        let store = MemoryNodeStore::new();
        add(&store, "N0", None).await;
        for i in 1..5_000 {
            let parent = format!("N{}", i - 1);
            add(&store, &format!("N{}", i), Some((parent.as_str(), Side::Left))).await;
        }

        let members = collect_subtree(&store, Some(&code("N1"))).await;

        assert_eq!(members.len(), 4_999);
        assert_eq!(members.first().unwrap().member_code, code("N1"));
        assert_eq!(members.last().unwrap().member_code, code("N4999"));
    }

    #[tokio::test]
    async fn test_collect_subtree_of_nothing_is_empty() {
        let store = MemoryNodeStore::new();

        assert!(collect_subtree(&store, None).await.is_empty());
    }

    // ============================================================
    // AUDIT
    // ============================================================

    #[tokio::test]
    async fn test_audit_consistent_tree() {
        let store = MemoryNodeStore::new();
        add(&store, "R", None).await;
        attach(&store, "A", "R", Side::Left).await;
        attach(&store, "B", "A", Side::Right).await;
        attach(&store, "C", "R", Side::Right).await;

        let mismatches = audit_counts(&store, &code("R")).await.unwrap();

        assert!(mismatches.is_empty(), "Unexpected mismatches: {:?}", mismatches);
    }

    #[tokio::test]
    async fn test_audit_reports_stale_counters() {
        let store = MemoryNodeStore::new();
        add(&store, "R", None).await;
        attach(&store, "A", "R", Side::Left).await;
        // Linked but never propagated
        add(&store, "B", Some(("A", Side::Right))).await;

        let mismatches = audit_counts(&store, &code("R")).await.unwrap();

        assert_eq!(
            mismatches,
            vec![
                CountMismatch {
                    member_code: code("A"),
                    side: Side::Right,
                    stored: 0,
                    actual: 1,
                },
                CountMismatch {
                    member_code: code("R"),
                    side: Side::Left,
                    stored: 1,
                    actual: 2,
                },
            ]
        );
    }
}
