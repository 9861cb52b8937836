//! # Tip Allocation Pipeline
//!
//! Turns one paid payment into ledger credits.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  allocate_tips_for_payment(payment)                                     │
//! │                                                                         │
//! │  1. GATE        tips_enabled off → Disabled (no-op success)            │
//! │                 tip_cents == 0   → ZeroTip  (no-op success)            │
//! │                                                                         │
//! │  2. REPLAY      tip_transactions row exists → Replayed, return the     │
//! │                 originally posted credits                              │
//! │                                                                         │
//! │  3. OWNERSHIP   resolver → owners with bps shares (sum = 10000)        │
//! │                 split_by_ownership → cents per owner, conserved        │
//! │                                                                         │
//! │  4. ROUTING     each owner share goes to the segment the owner was     │
//! │                 in at paid_at, or straight to the owner.               │
//! │                 Shares landing in the SAME segment merge before the    │
//! │                 group split so each member gets one credit per         │
//! │                 payment per group.                                     │
//! │                                                                         │
//! │  5. POST        one transaction: all credits + the tip_transactions    │
//! │                 row commit together or not at all                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A single-member segment is credited as a direct tip: a "group of one"
//! is not a pool, and reporting should not claim it was.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::EngineResult;
use crate::resolver::OwnershipResolver;
use tiprail_core::{
    keys, split_by_ownership, split_equal, split_weighted, validation, CoreError,
    EntrySourceType, LedgerEntry, NewLedgerEntry, SplitMode, SplitShare, TipPayment,
    TipTransaction,
};
use tiprail_db::Database;

// =============================================================================
// Outcome Types
// =============================================================================

/// How an allocation request concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationStatus {
    /// Credits were posted by this invocation.
    Posted,
    /// This payment was already allocated; nothing was posted.
    Replayed,
    /// Tips are disabled for the location; nothing was posted.
    Disabled,
    /// The payment carried no tip; nothing was posted.
    ZeroTip,
}

/// Result of one allocation request.
#[derive(Debug, Clone)]
pub struct AllocationOutcome {
    pub status: AllocationStatus,
    /// The allocation record, present unless the pipeline was gated off.
    pub transaction: Option<TipTransaction>,
    /// The credits belonging to this payment (freshly posted, or the
    /// originals on replay). Debt-reclaim debits carved out of fresh
    /// credits are included.
    pub entries: Vec<LedgerEntry>,
}

/// One owner share with its routing decision, after segment lookup.
enum Routed {
    Direct { employee_id: String, cents: i64 },
    Grouped { segment_index: usize, cents: i64 },
}

// =============================================================================
// Allocator
// =============================================================================

/// The allocation pipeline service.
pub struct TipAllocator {
    db: Database,
    resolver: Arc<dyn OwnershipResolver>,
}

impl TipAllocator {
    pub fn new(db: Database, resolver: Arc<dyn OwnershipResolver>) -> Self {
        TipAllocator { db, resolver }
    }

    /// Allocates one payment's tip to employee balances.
    ///
    /// Idempotent at the payment level: re-invoking for an allocated
    /// payment returns the original credits with status `Replayed`.
    /// Total credited always equals `payment.tip_cents` exactly.
    pub async fn allocate_tips_for_payment(
        &self,
        payment: &TipPayment,
    ) -> EngineResult<AllocationOutcome> {
        validation::validate_entity_id("order_id", &payment.order_id)?;
        validation::validate_entity_id("payment_id", &payment.payment_id)?;
        validation::validate_entity_id("location_id", &payment.location_id)?;
        validation::validate_entity_id("primary_employee_id", &payment.primary_employee_id)?;

        if payment.tip_cents < 0 {
            return Err(CoreError::NonPositiveAmount(payment.tip_cents).into());
        }

        let settings = self
            .db
            .settings()
            .get(self.db.pool(), &payment.location_id)
            .await?;
        if !settings.tips_enabled {
            debug!(
                order_id = %payment.order_id,
                location_id = %payment.location_id,
                "Tips disabled for location, skipping allocation"
            );
            return Ok(AllocationOutcome {
                status: AllocationStatus::Disabled,
                transaction: None,
                entries: Vec::new(),
            });
        }

        if payment.tip_cents == 0 {
            return Ok(AllocationOutcome {
                status: AllocationStatus::ZeroTip,
                transaction: None,
                entries: Vec::new(),
            });
        }

        // Resolve ownership before opening the transaction; the resolver
        // reads through the pool.
        let owners = self.resolver.resolve(payment).await?;
        validation::validate_share_set(&owners)?;
        let owner_shares = split_by_ownership(payment.tip_cents, &owners);

        let transactions = self.db.transactions();
        let ledger = self.db.ledger();
        let groups = self.db.groups();

        let mut tx = self.db.pool().begin().await?;

        // Replay check inside the transaction so a concurrent retry
        // serializes against us instead of double-posting.
        if let Some(existing) = transactions
            .find_allocation(&mut *tx, &payment.order_id, &payment.payment_id)
            .await?
        {
            let entries = ledger
                .entries_for_payment(&mut *tx, &payment.order_id, &payment.payment_id)
                .await?;
            tx.commit().await?;

            debug!(
                order_id = %payment.order_id,
                payment_id = %payment.payment_id,
                "Allocation replay, returning original entries"
            );
            return Ok(AllocationOutcome {
                status: AllocationStatus::Replayed,
                transaction: Some(existing),
                entries,
            });
        }

        // Route each owner share: to the segment the owner was in at
        // paid_at, or directly to the owner. Shares hitting the same
        // segment are merged so the group splits once.
        let mut segments = Vec::new();
        let mut segment_index: HashMap<String, usize> = HashMap::new();
        let mut routed = Vec::new();

        for share in &owner_shares {
            if share.cents == 0 {
                continue;
            }

            let segment = groups
                .segment_for_member_at(
                    &mut *tx,
                    &share.employee_id,
                    &payment.location_id,
                    payment.paid_at,
                )
                .await?;

            match segment {
                Some(segment) => {
                    let index = *segment_index.entry(segment.id.clone()).or_insert_with(|| {
                        segments.push(segment);
                        segments.len() - 1
                    });
                    routed.push(Routed::Grouped {
                        segment_index: index,
                        cents: share.cents,
                    });
                }
                None => routed.push(Routed::Direct {
                    employee_id: share.employee_id.clone(),
                    cents: share.cents,
                }),
            }
        }

        let mut grouped_totals: HashMap<usize, i64> = HashMap::new();
        let mut entries = Vec::new();

        for route in &routed {
            match route {
                Routed::Direct { employee_id, cents } => {
                    let outcome = ledger
                        .post(
                            &mut tx,
                            NewLedgerEntry::credit(
                                employee_id,
                                &payment.location_id,
                                *cents,
                                EntrySourceType::DirectTip,
                            )
                            .with_payment(&payment.order_id, &payment.payment_id)
                            .with_idempotency_key(keys::tip_entry(
                                &payment.order_id,
                                &payment.payment_id,
                                employee_id,
                                None,
                            ))
                            .with_memo(format!("Tip on order {}", payment.order_id)),
                        )
                        .await?;
                    entries.push(outcome.entry);
                    entries.extend(outcome.reclaim_entries);
                }
                Routed::Grouped {
                    segment_index,
                    cents,
                } => {
                    *grouped_totals.entry(*segment_index).or_insert(0) += cents;
                }
            }
        }

        let mut grouped: Vec<(usize, i64)> = grouped_totals.into_iter().collect();
        grouped.sort_unstable();

        for (index, pool_cents) in grouped {
            let segment = &segments[index];
            let members = groups.members(&mut *tx, &segment.id).await?;

            // A one-person segment is the member's own money, not a pool.
            if members.len() == 1 {
                let member = &members[0];
                let outcome = ledger
                    .post(
                        &mut tx,
                        NewLedgerEntry::credit(
                            &member.employee_id,
                            &payment.location_id,
                            pool_cents,
                            EntrySourceType::DirectTip,
                        )
                        .with_payment(&payment.order_id, &payment.payment_id)
                        .with_idempotency_key(keys::tip_entry(
                            &payment.order_id,
                            &payment.payment_id,
                            &member.employee_id,
                            None,
                        ))
                        .with_memo(format!("Tip on order {}", payment.order_id)),
                    )
                    .await?;
                entries.push(outcome.entry);
                entries.extend(outcome.reclaim_entries);
                continue;
            }

            let shares: Vec<SplitShare> = match segment.split_mode {
                SplitMode::Equal => split_equal(pool_cents, &members),
                SplitMode::RoleWeighted => split_weighted(pool_cents, &members),
            };

            for share in shares {
                if share.cents == 0 {
                    continue;
                }
                let outcome = ledger
                    .post(
                        &mut tx,
                        NewLedgerEntry::credit(
                            &share.employee_id,
                            &payment.location_id,
                            share.cents,
                            EntrySourceType::TipGroup,
                        )
                        .with_payment(&payment.order_id, &payment.payment_id)
                        .with_group(&segment.group_id)
                        .with_idempotency_key(keys::tip_entry(
                            &payment.order_id,
                            &payment.payment_id,
                            &share.employee_id,
                            Some(&segment.group_id),
                        ))
                        .with_memo(format!(
                            "Group tip share on order {}",
                            payment.order_id
                        )),
                    )
                    .await?;
                entries.push(outcome.entry);
                entries.extend(outcome.reclaim_entries);
            }
        }

        let transaction = transactions.record_allocation(&mut tx, payment).await?;
        tx.commit().await?;

        info!(
            order_id = %payment.order_id,
            payment_id = %payment.payment_id,
            tip = %payment.tip_cents,
            entries = %entries.len(),
            "Allocated payment tip"
        );

        Ok(AllocationOutcome {
            status: AllocationStatus::Posted,
            transaction: Some(transaction),
            entries,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::DbOwnershipResolver;
    use chrono::Utc;
    use tiprail_core::{
        EntryDirection, GroupMember, LocationSettings, TipTransactionKind,
        DEFAULT_LOCATION_ID as LOC,
    };
    use tiprail_db::DbConfig;

    async fn setup() -> (Database, TipAllocator) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let resolver = Arc::new(DbOwnershipResolver::new(db.clone()));
        let allocator = TipAllocator::new(db.clone(), resolver);
        (db, allocator)
    }

    fn payment(order: &str, pay: &str, cents: i64) -> TipPayment {
        TipPayment {
            order_id: order.to_string(),
            payment_id: pay.to_string(),
            location_id: LOC.to_string(),
            primary_employee_id: "alice".to_string(),
            tip_cents: cents,
            kind: TipTransactionKind::Tip,
            paid_at: Utc::now(),
        }
    }

    fn credited(entries: &[LedgerEntry], employee: &str) -> i64 {
        entries
            .iter()
            .filter(|e| e.employee_id == employee && e.direction == EntryDirection::Credit)
            .map(|e| e.amount_cents)
            .sum()
    }

    // Scenario: plain tip, no shares, no group. Everything to the server.
    #[tokio::test]
    async fn test_direct_tip_to_primary_employee() {
        let (db, allocator) = setup().await;

        let outcome = allocator
            .allocate_tips_for_payment(&payment("o1", "p1", 1200))
            .await
            .unwrap();

        assert_eq!(outcome.status, AllocationStatus::Posted);
        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(outcome.entries[0].source_type, EntrySourceType::DirectTip);
        assert_eq!(db.ledger().balance("alice", LOC).await.unwrap(), 1200);
    }

    #[tokio::test]
    async fn test_replay_returns_original_entries() {
        let (db, allocator) = setup().await;
        let pay = payment("o1", "p1", 1200);

        let first = allocator.allocate_tips_for_payment(&pay).await.unwrap();
        let second = allocator.allocate_tips_for_payment(&pay).await.unwrap();

        assert_eq!(second.status, AllocationStatus::Replayed);
        assert_eq!(second.entries.len(), first.entries.len());
        assert_eq!(second.entries[0].id, first.entries[0].id);
        // No double credit
        assert_eq!(db.ledger().balance("alice", LOC).await.unwrap(), 1200);
    }

    #[tokio::test]
    async fn test_zero_tip_posts_nothing() {
        let (db, allocator) = setup().await;

        let outcome = allocator
            .allocate_tips_for_payment(&payment("o1", "p1", 0))
            .await
            .unwrap();

        assert_eq!(outcome.status, AllocationStatus::ZeroTip);
        assert!(outcome.entries.is_empty());
        assert_eq!(db.ledger().balance("alice", LOC).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_negative_tip_rejected() {
        let (_db, allocator) = setup().await;
        assert!(allocator
            .allocate_tips_for_payment(&payment("o1", "p1", -100))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_disabled_location_is_noop_success() {
        let (db, allocator) = setup().await;

        let mut settings = LocationSettings::defaults(LOC);
        settings.tips_enabled = false;
        db.settings().upsert(&settings).await.unwrap();

        let outcome = allocator
            .allocate_tips_for_payment(&payment("o1", "p1", 1200))
            .await
            .unwrap();

        assert_eq!(outcome.status, AllocationStatus::Disabled);
        assert_eq!(db.ledger().balance("alice", LOC).await.unwrap(), 0);
        // Not recorded as allocated: enabling tips later allows allocation
        assert!(db
            .transactions()
            .find_allocation(db.pool(), "o1", "p1")
            .await
            .unwrap()
            .is_none());
    }

    // Scenario: $20.00 tip on an order owned 60/40.
    #[tokio::test]
    async fn test_ownership_split_allocation() {
        let (db, allocator) = setup().await;
        db.ownership()
            .assign(
                "o1",
                None,
                &[("alice".to_string(), 6000), ("bob".to_string(), 4000)],
            )
            .await
            .unwrap();

        let outcome = allocator
            .allocate_tips_for_payment(&payment("o1", "p1", 2000))
            .await
            .unwrap();

        assert_eq!(outcome.status, AllocationStatus::Posted);
        assert_eq!(credited(&outcome.entries, "alice"), 1200);
        assert_eq!(credited(&outcome.entries, "bob"), 800);
    }

    // Odd cents through an ownership split: remainder goes to the last
    // owner in id order, and the total is conserved.
    #[tokio::test]
    async fn test_ownership_split_conserves_odd_cents() {
        let (db, allocator) = setup().await;
        db.ownership()
            .assign(
                "o1",
                None,
                &[("alice".to_string(), 3333), ("bob".to_string(), 6667)],
            )
            .await
            .unwrap();

        let outcome = allocator
            .allocate_tips_for_payment(&payment("o1", "p1", 1001))
            .await
            .unwrap();

        let total: i64 = outcome.entries.iter().map(|e| e.amount_cents).sum();
        assert_eq!(total, 1001);
    }

    // Scenario: the owner is in a three-person equal group when the
    // payment lands. $10.01 splits 333/334/334 with the extra cents going
    // to the later members in id order.
    #[tokio::test]
    async fn test_group_split_allocation() {
        let (db, allocator) = setup().await;
        db.groups()
            .start_segment(
                "g1",
                LOC,
                SplitMode::Equal,
                &[
                    GroupMember::new("alice", 1),
                    GroupMember::new("bob", 1),
                    GroupMember::new("carol", 1),
                ],
            )
            .await
            .unwrap();

        let outcome = allocator
            .allocate_tips_for_payment(&payment("o1", "p1", 1001))
            .await
            .unwrap();

        assert_eq!(outcome.status, AllocationStatus::Posted);
        assert_eq!(credited(&outcome.entries, "alice"), 333);
        assert_eq!(credited(&outcome.entries, "bob"), 334);
        assert_eq!(credited(&outcome.entries, "carol"), 334);
        assert!(outcome
            .entries
            .iter()
            .all(|e| e.source_type == EntrySourceType::TipGroup));
        assert!(outcome.entries.iter().all(|e| e.group_id.as_deref() == Some("g1")));
    }

    #[tokio::test]
    async fn test_weighted_group_split() {
        let (db, allocator) = setup().await;
        db.groups()
            .start_segment(
                "g1",
                LOC,
                SplitMode::RoleWeighted,
                &[GroupMember::new("alice", 2), GroupMember::new("bob", 1)],
            )
            .await
            .unwrap();

        let outcome = allocator
            .allocate_tips_for_payment(&payment("o1", "p1", 900))
            .await
            .unwrap();

        assert_eq!(credited(&outcome.entries, "alice"), 600);
        assert_eq!(credited(&outcome.entries, "bob"), 300);
    }

    // A single-member "group" is reported as a direct tip.
    #[tokio::test]
    async fn test_single_member_group_credits_as_direct() {
        let (db, allocator) = setup().await;
        db.groups()
            .start_segment("g1", LOC, SplitMode::Equal, &[GroupMember::new("alice", 1)])
            .await
            .unwrap();

        let outcome = allocator
            .allocate_tips_for_payment(&payment("o1", "p1", 1200))
            .await
            .unwrap();

        assert_eq!(outcome.entries.len(), 1);
        assert_eq!(outcome.entries[0].source_type, EntrySourceType::DirectTip);
        assert_eq!(outcome.entries[0].employee_id, "alice");
    }

    // Scenario: $20.00 tip owned 60/40 by alice and bob. Alice is in a
    // two-person equal group, bob is not. Her $12.00 splits $6.00/$6.00,
    // his $8.00 lands directly. Three entries, $20.00 conserved.
    #[tokio::test]
    async fn test_mixed_group_and_direct_owners() {
        let (db, allocator) = setup().await;
        db.ownership()
            .assign(
                "o1",
                None,
                &[("alice".to_string(), 6000), ("bob".to_string(), 4000)],
            )
            .await
            .unwrap();
        db.groups()
            .start_segment(
                "g1",
                LOC,
                SplitMode::Equal,
                &[GroupMember::new("alice", 1), GroupMember::new("dave", 1)],
            )
            .await
            .unwrap();

        let outcome = allocator
            .allocate_tips_for_payment(&payment("o1", "p1", 2000))
            .await
            .unwrap();

        assert_eq!(outcome.entries.len(), 3);
        assert_eq!(credited(&outcome.entries, "alice"), 600);
        assert_eq!(credited(&outcome.entries, "dave"), 600);
        assert_eq!(credited(&outcome.entries, "bob"), 800);
        let total: i64 = outcome.entries.iter().map(|e| e.amount_cents).sum();
        assert_eq!(total, 2000);
    }

    // Two owners in the same group: their shares merge into one pool
    // before the split, so each member gets exactly one credit.
    #[tokio::test]
    async fn test_co_owners_in_same_group_merge_before_split() {
        let (db, allocator) = setup().await;
        db.ownership()
            .assign(
                "o1",
                None,
                &[("alice".to_string(), 5000), ("bob".to_string(), 5000)],
            )
            .await
            .unwrap();
        db.groups()
            .start_segment(
                "g1",
                LOC,
                SplitMode::Equal,
                &[GroupMember::new("alice", 1), GroupMember::new("bob", 1)],
            )
            .await
            .unwrap();

        let outcome = allocator
            .allocate_tips_for_payment(&payment("o1", "p1", 1000))
            .await
            .unwrap();

        assert_eq!(outcome.entries.len(), 2);
        assert_eq!(credited(&outcome.entries, "alice"), 500);
        assert_eq!(credited(&outcome.entries, "bob"), 500);
    }

    // Membership at paid_at governs, not membership at allocation time.
    #[tokio::test]
    async fn test_allocation_uses_membership_at_payment_time() {
        let (db, allocator) = setup().await;
        db.groups()
            .start_segment(
                "g1",
                LOC,
                SplitMode::Equal,
                &[GroupMember::new("alice", 1), GroupMember::new("bob", 1)],
            )
            .await
            .unwrap();

        let pay = payment("o1", "p1", 1000);

        // carol joins after the payment happened
        db.groups()
            .start_segment(
                "g1",
                LOC,
                SplitMode::Equal,
                &[
                    GroupMember::new("alice", 1),
                    GroupMember::new("bob", 1),
                    GroupMember::new("carol", 1),
                ],
            )
            .await
            .unwrap();

        let outcome = allocator.allocate_tips_for_payment(&pay).await.unwrap();

        assert_eq!(credited(&outcome.entries, "alice"), 500);
        assert_eq!(credited(&outcome.entries, "bob"), 500);
        assert_eq!(credited(&outcome.entries, "carol"), 0);
    }

    // A fresh allocation credit pays down an open debt immediately.
    #[tokio::test]
    async fn test_allocation_credit_triggers_debt_reclaim() {
        let (db, allocator) = setup().await;

        let mut tx = db.pool().begin().await.unwrap();
        db.debts().open_debt(&mut tx, "alice", LOC, 300).await.unwrap();
        tx.commit().await.unwrap();

        let outcome = allocator
            .allocate_tips_for_payment(&payment("o1", "p1", 1000))
            .await
            .unwrap();

        assert!(outcome
            .entries
            .iter()
            .any(|e| e.source_type == EntrySourceType::DebtReclaim));
        assert_eq!(db.ledger().balance("alice", LOC).await.unwrap(), 700);
    }
}
