//! # Chargeback / Reversal Service
//!
//! Unwinds a payment's tip credits after a void or refund.
//!
//! ## Reversal Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  reverse_for_payment(order, payment, refund_bps)                        │
//! │                                                                         │
//! │  1. Already reversed? → AlreadyReversed, nothing posted                 │
//! │  2. Never allocated?  → error (nothing to unwind)                       │
//! │                                                                         │
//! │  3. For EACH original credit (owner share, group share):               │
//! │       target = floor(credit × refund_bps / 10000)                      │
//! │                                                                         │
//! │       allow_negative_balance?                                          │
//! │         yes → debit the full target                                    │
//! │         no  → debit min(target, current balance)                       │
//! │               shortfall becomes TipDebt, recovered from               │
//! │               future credits automatically                             │
//! │                                                                         │
//! │  4. Record the reversal row; everything commits atomically             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The employee's balance may have been paid out between allocation and
//! reversal; that is exactly the case the debt mechanism exists for. The
//! house is made whole on paper immediately, the employee pays it back out
//! of future tips.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use tiprail_core::{
    keys, validation, EntrySourceType, LedgerEntry, NewLedgerEntry, TipDebt, ValidationError,
    FULL_SHARE_BPS,
};
use tiprail_db::{Database, ReversalRecord};

// =============================================================================
// Request / Outcome Types
// =============================================================================

/// A request to reverse a payment's tip allocation.
#[derive(Debug, Clone)]
pub struct ReversalRequest {
    pub order_id: String,
    pub payment_id: String,
    /// Fraction of the original allocation to reverse, in basis points.
    /// `None` means a full reversal (10000).
    pub refund_bps: Option<u32>,
    pub memo: String,
}

impl ReversalRequest {
    /// A full reversal of the payment's tips.
    pub fn full(order_id: impl Into<String>, payment_id: impl Into<String>) -> Self {
        ReversalRequest {
            order_id: order_id.into(),
            payment_id: payment_id.into(),
            refund_bps: None,
            memo: String::new(),
        }
    }

    pub fn with_refund_bps(mut self, bps: u32) -> Self {
        self.refund_bps = Some(bps);
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }
}

/// How a reversal request concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReversalStatus {
    /// Debits (and possibly debts) were posted by this invocation.
    Reversed,
    /// This payment was already reversed; nothing was posted.
    AlreadyReversed,
}

/// Result of one reversal request.
#[derive(Debug, Clone)]
pub struct ReversalOutcome {
    pub status: ReversalStatus,
    /// Cents actually debited across all employees.
    pub reversed_cents: i64,
    /// Cents turned into tip debt instead of debited.
    pub debt_cents: i64,
    /// The chargeback debits (freshly posted, or the originals when
    /// replayed).
    pub entries: Vec<LedgerEntry>,
    /// Debts opened or extended by this reversal.
    pub debts: Vec<TipDebt>,
    /// The reversal bookkeeping row.
    pub record: ReversalRecord,
}

// =============================================================================
// Service
// =============================================================================

/// The chargeback/reversal service.
#[derive(Debug, Clone)]
pub struct ChargebackService {
    db: Database,
}

impl ChargebackService {
    pub fn new(db: Database) -> Self {
        ChargebackService { db }
    }

    /// Reverses (part of) a payment's tip allocation.
    ///
    /// Idempotent per payment: one reversal ever takes effect, later calls
    /// return `AlreadyReversed`. Conservation: for every original credit,
    /// `debited + debt == floor(credit × refund_bps / 10000)`.
    pub async fn reverse_for_payment(
        &self,
        request: &ReversalRequest,
    ) -> EngineResult<ReversalOutcome> {
        validation::validate_entity_id("order_id", &request.order_id)?;
        validation::validate_entity_id("payment_id", &request.payment_id)?;
        validation::validate_memo(&request.memo)?;

        let refund_bps = request.refund_bps.unwrap_or(FULL_SHARE_BPS);
        validation::validate_bps("refund_bps", refund_bps)?;
        if refund_bps == 0 {
            return Err(ValidationError::MustBePositive {
                field: "refund_bps".to_string(),
            }
            .into());
        }

        let transactions = self.db.transactions();
        let ledger = self.db.ledger();
        let debts_repo = self.db.debts();

        let mut tx = self.db.pool().begin().await?;

        if let Some(record) = transactions
            .find_reversal(&mut *tx, &request.order_id, &request.payment_id)
            .await?
        {
            let entries = ledger
                .entries_for_payment(&mut *tx, &request.order_id, &request.payment_id)
                .await?
                .into_iter()
                .filter(|e| e.source_type == EntrySourceType::Chargeback)
                .collect();
            tx.commit().await?;

            debug!(
                order_id = %request.order_id,
                payment_id = %request.payment_id,
                "Reversal replay, returning original record"
            );
            return Ok(ReversalOutcome {
                status: ReversalStatus::AlreadyReversed,
                reversed_cents: record.reversed_cents,
                debt_cents: record.debt_cents,
                entries,
                debts: Vec::new(),
                record,
            });
        }

        let allocation = transactions
            .find_allocation(&mut *tx, &request.order_id, &request.payment_id)
            .await?
            .ok_or_else(|| EngineError::NotAllocated {
                order_id: request.order_id.clone(),
                payment_id: request.payment_id.clone(),
            })?;

        let settings = self
            .db
            .settings()
            .get(&mut *tx, &allocation.location_id)
            .await?;

        let credits = ledger
            .allocation_credits_for_payment(&mut *tx, &request.order_id, &request.payment_id)
            .await?;

        let mut reversed_cents = 0;
        let mut debt_cents = 0;
        let mut entries = Vec::new();
        let mut debts = Vec::new();

        for credit in &credits {
            let target = credit.amount().share_floor(refund_bps).cents();
            if target == 0 {
                continue;
            }

            let debit_cents = if settings.allow_negative_balance {
                target
            } else {
                let balance = ledger
                    .balance_in(&mut *tx, &credit.employee_id, &credit.location_id)
                    .await?;
                target.min(balance.max(0))
            };

            if debit_cents > 0 {
                let outcome = ledger
                    .post(
                        &mut tx,
                        NewLedgerEntry::debit(
                            &credit.employee_id,
                            &credit.location_id,
                            debit_cents,
                            EntrySourceType::Chargeback,
                        )
                        .with_payment(&request.order_id, &request.payment_id)
                        .with_idempotency_key(keys::chargeback(
                            &request.order_id,
                            &request.payment_id,
                            &credit.id,
                        ))
                        .with_memo(if request.memo.is_empty() {
                            format!("Chargeback on order {}", request.order_id)
                        } else {
                            request.memo.clone()
                        }),
                    )
                    .await?;
                reversed_cents += debit_cents;
                entries.push(outcome.entry);
            }

            let shortfall = target - debit_cents;
            if shortfall > 0 {
                let debt = debts_repo
                    .open_or_extend(&mut tx, &credit.employee_id, &credit.location_id, shortfall)
                    .await?;
                debt_cents += shortfall;

                warn!(
                    employee_id = %credit.employee_id,
                    order_id = %request.order_id,
                    shortfall = %shortfall,
                    debt_id = %debt.id,
                    "Chargeback capped by balance, shortfall tracked as debt"
                );
                debts.push(debt);
            }
        }

        let record = ReversalRecord {
            order_id: request.order_id.clone(),
            payment_id: request.payment_id.clone(),
            refund_bps,
            reversed_cents,
            debt_cents,
            memo: request.memo.clone(),
            created_at: Utc::now(),
        };
        transactions.record_reversal(&mut tx, &record).await?;

        tx.commit().await?;

        info!(
            order_id = %request.order_id,
            payment_id = %request.payment_id,
            refund_bps = %refund_bps,
            reversed = %reversed_cents,
            debt = %debt_cents,
            "Reversed payment tips"
        );

        Ok(ReversalOutcome {
            status: ReversalStatus::Reversed,
            reversed_cents,
            debt_cents,
            entries,
            debts,
            record,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::TipAllocator;
    use crate::resolver::DbOwnershipResolver;
    use chrono::Utc;
    use std::sync::Arc;
    use tiprail_core::{
        GroupMember, LocationSettings, SplitMode, TipDebtStatus, TipPayment,
        TipTransactionKind, DEFAULT_LOCATION_ID as LOC,
    };
    use tiprail_db::DbConfig;

    async fn setup() -> (Database, TipAllocator, ChargebackService) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let resolver = Arc::new(DbOwnershipResolver::new(db.clone()));
        let allocator = TipAllocator::new(db.clone(), resolver);
        let chargebacks = ChargebackService::new(db.clone());
        (db, allocator, chargebacks)
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

    async fn cash_out_directly(db: &Database, employee: &str, cents: i64, key: &str) {
        let mut tx = db.pool().begin().await.unwrap();
        db.ledger()
            .post(
                &mut tx,
                NewLedgerEntry::debit(employee, LOC, cents, EntrySourceType::PayoutCash)
                    .with_idempotency_key(key),
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();
    }

    // Scenario: tip allocated, payment voided same shift. Full unwind,
    // no debt.
    #[tokio::test]
    async fn test_full_reversal_with_sufficient_balance() {
        let (db, allocator, chargebacks) = setup().await;
        allocator
            .allocate_tips_for_payment(&payment("o1", "p1", 1200))
            .await
            .unwrap();

        let outcome = chargebacks
            .reverse_for_payment(&ReversalRequest::full("o1", "p1"))
            .await
            .unwrap();

        assert_eq!(outcome.status, ReversalStatus::Reversed);
        assert_eq!(outcome.reversed_cents, 1200);
        assert_eq!(outcome.debt_cents, 0);
        assert!(outcome.debts.is_empty());
        assert_eq!(db.ledger().balance("alice", LOC).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reversal_is_idempotent() {
        let (db, allocator, chargebacks) = setup().await;
        allocator
            .allocate_tips_for_payment(&payment("o1", "p1", 1200))
            .await
            .unwrap();

        let first = chargebacks
            .reverse_for_payment(&ReversalRequest::full("o1", "p1"))
            .await
            .unwrap();
        let second = chargebacks
            .reverse_for_payment(&ReversalRequest::full("o1", "p1"))
            .await
            .unwrap();

        assert_eq!(first.status, ReversalStatus::Reversed);
        assert_eq!(second.status, ReversalStatus::AlreadyReversed);
        assert_eq!(second.reversed_cents, 1200);
        // Balance debited exactly once
        assert_eq!(db.ledger().balance("alice", LOC).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reversing_unallocated_payment_is_an_error() {
        let (_db, _allocator, chargebacks) = setup().await;
        let err = chargebacks
            .reverse_for_payment(&ReversalRequest::full("o1", "p1"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotAllocated { .. }));
    }

    // Partial refund: 50% of a $10.00 allocation comes back.
    #[tokio::test]
    async fn test_partial_refund_reverses_proportionally() {
        let (db, allocator, chargebacks) = setup().await;
        allocator
            .allocate_tips_for_payment(&payment("o1", "p1", 1000))
            .await
            .unwrap();

        let outcome = chargebacks
            .reverse_for_payment(&ReversalRequest::full("o1", "p1").with_refund_bps(5000))
            .await
            .unwrap();

        assert_eq!(outcome.reversed_cents, 500);
        assert_eq!(db.ledger().balance("alice", LOC).await.unwrap(), 500);
    }

    #[tokio::test]
    async fn test_zero_refund_bps_rejected() {
        let (_db, _allocator, chargebacks) = setup().await;
        assert!(chargebacks
            .reverse_for_payment(&ReversalRequest::full("o1", "p1").with_refund_bps(0))
            .await
            .is_err());
    }

    // Scenario: $10.00 allocated, $8.00 already cashed out, then the
    // payment is charged back. $2.00 is debited, $8.00 becomes debt, and
    // the next tip pays the debt down.
    #[tokio::test]
    async fn test_capped_chargeback_creates_debt_then_reclaims() {
        let (db, allocator, chargebacks) = setup().await;
        allocator
            .allocate_tips_for_payment(&payment("o1", "p1", 1000))
            .await
            .unwrap();
        cash_out_directly(&db, "alice", 800, "cashout:r1").await;

        let outcome = chargebacks
            .reverse_for_payment(&ReversalRequest::full("o1", "p1"))
            .await
            .unwrap();

        assert_eq!(outcome.reversed_cents, 200);
        assert_eq!(outcome.debt_cents, 800);
        assert_eq!(outcome.debts.len(), 1);
        assert_eq!(outcome.debts[0].status, TipDebtStatus::Open);
        assert_eq!(db.ledger().balance("alice", LOC).await.unwrap(), 0);

        // The next tip is swallowed by the debt
        allocator
            .allocate_tips_for_payment(&payment("o2", "p2", 500))
            .await
            .unwrap();
        assert_eq!(db.ledger().balance("alice", LOC).await.unwrap(), 0);

        let debt = db.debts().get(&outcome.debts[0].id).await.unwrap();
        assert_eq!(debt.remaining_cents, 300);
        assert_eq!(debt.status, TipDebtStatus::Partial);
    }

    #[tokio::test]
    async fn test_negative_balance_allowed_skips_debt() {
        let (db, allocator, chargebacks) = setup().await;

        let mut settings = LocationSettings::defaults(LOC);
        settings.allow_negative_balance = true;
        db.settings().upsert(&settings).await.unwrap();

        allocator
            .allocate_tips_for_payment(&payment("o1", "p1", 1000))
            .await
            .unwrap();
        cash_out_directly(&db, "alice", 800, "cashout:r1").await;

        let outcome = chargebacks
            .reverse_for_payment(&ReversalRequest::full("o1", "p1"))
            .await
            .unwrap();

        assert_eq!(outcome.reversed_cents, 1000);
        assert_eq!(outcome.debt_cents, 0);
        assert_eq!(db.ledger().balance("alice", LOC).await.unwrap(), -800);
    }

    // Group allocation reversed: every member's share comes back, and
    // debited + debt equals the reversal target per member.
    #[tokio::test]
    async fn test_group_allocation_reversal_covers_all_members() {
        let (db, allocator, chargebacks) = setup().await;
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
        allocator
            .allocate_tips_for_payment(&payment("o1", "p1", 1001))
            .await
            .unwrap();

        // bob spends his share before the reversal
        cash_out_directly(&db, "bob", 334, "cashout:bob").await;

        let outcome = chargebacks
            .reverse_for_payment(&ReversalRequest::full("o1", "p1"))
            .await
            .unwrap();

        // Conservation across debits and debt
        assert_eq!(outcome.reversed_cents + outcome.debt_cents, 1001);
        assert_eq!(outcome.debt_cents, 334);
        assert_eq!(db.ledger().balance("alice", LOC).await.unwrap(), 0);
        assert_eq!(db.ledger().balance("carol", LOC).await.unwrap(), 0);
    }
}
