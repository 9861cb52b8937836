//! # Integrity Diagnostics
//!
//! Cross-table invariant checks for operators and tests.
//!
//! ## Checks
//! ```text
//! ┌───────────────────────────────┬──────────────────────────────────────┐
//! │ Check                         │ Repairable?                          │
//! ├───────────────────────────────┼──────────────────────────────────────┤
//! │ cached balance vs ledger sum  │ yes - cache rewritten from ledger    │
//! │ allocation credits without a  │ no - needs human judgment            │
//! │   tip_transactions row        │                                      │
//! │ debt invariant violations     │ no - needs human judgment            │
//! │ unbalanced transfer pairs     │ no - needs human judgment            │
//! └───────────────────────────────┴──────────────────────────────────────┘
//! ```
//!
//! Only the cached balance is derived data, so only it can be mechanically
//! repaired. Everything else is reported with ids and left alone: an
//! automated "fix" of a half-missing transfer would be guessing which half
//! is the truth.

use tracing::{info, warn};

use crate::error::EngineResult;
use tiprail_db::{BalanceDrift, Database};

/// Result of one diagnostics run.
#[derive(Debug, Clone)]
pub struct IntegrityReport {
    /// Cached balances that disagreed with the ledger sum.
    pub balance_drifts: Vec<BalanceDrift>,
    /// Whether this run actually rewrote any drifted cache rows. False
    /// when repair mode found nothing to fix.
    pub drifts_repaired: bool,
    /// Allocation credits (DIRECT_TIP / TIP_GROUP) whose payment has no
    /// allocation record.
    pub orphaned_entry_ids: Vec<String>,
    /// Debts violating `0 <= remaining <= original` or carrying a status
    /// inconsistent with their remaining amount.
    pub invalid_debt_ids: Vec<String>,
    /// Transfer ids whose legs do not sum to zero.
    pub unbalanced_transfer_ids: Vec<String>,
}

impl IntegrityReport {
    /// True when every check passed.
    pub fn is_clean(&self) -> bool {
        self.balance_drifts.is_empty()
            && self.orphaned_entry_ids.is_empty()
            && self.invalid_debt_ids.is_empty()
            && self.unbalanced_transfer_ids.is_empty()
    }
}

/// The diagnostics service.
#[derive(Debug, Clone)]
pub struct IntegrityChecker {
    db: Database,
}

impl IntegrityChecker {
    pub fn new(db: Database) -> Self {
        IntegrityChecker { db }
    }

    /// Runs every check. With `repair`, cached-balance drift is fixed
    /// from the ledger; all other findings are report-only.
    pub async fn run(&self, repair: bool) -> EngineResult<IntegrityReport> {
        let balance_drifts = self.db.ledger().reconcile(repair).await?;

        let orphaned_entry_ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT e.id FROM tip_ledger_entries e
            LEFT JOIN tip_transactions t
                ON t.order_id = e.order_id AND t.payment_id = e.payment_id
            WHERE e.direction = 'credit'
              AND e.source_type IN ('direct_tip', 'tip_group')
              AND e.order_id IS NOT NULL
              AND t.id IS NULL
            ORDER BY e.created_at, e.id
            "#,
        )
        .fetch_all(self.db.pool())
        .await
        .map_err(tiprail_db::DbError::from)?;

        let invalid_debt_ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT id FROM tip_debts
            WHERE remaining_cents < 0
               OR remaining_cents > original_amount_cents
               OR (status = 'recovered' AND remaining_cents != 0)
               OR (status IN ('open', 'partial') AND remaining_cents = 0)
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(self.db.pool())
        .await
        .map_err(tiprail_db::DbError::from)?;

        let unbalanced_transfer_ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT transfer_id FROM tip_ledger_entries
            WHERE transfer_id IS NOT NULL
            GROUP BY transfer_id
            HAVING SUM(CASE WHEN direction = 'credit' THEN amount_cents ELSE -amount_cents END) != 0
            ORDER BY transfer_id
            "#,
        )
        .fetch_all(self.db.pool())
        .await
        .map_err(tiprail_db::DbError::from)?;

        let report = IntegrityReport {
            drifts_repaired: repair && !balance_drifts.is_empty(),
            balance_drifts,
            orphaned_entry_ids,
            invalid_debt_ids,
            unbalanced_transfer_ids,
        };

        if report.is_clean() {
            info!("Integrity check clean");
        } else {
            warn!(
                drifts = %report.balance_drifts.len(),
                orphans = %report.orphaned_entry_ids.len(),
                bad_debts = %report.invalid_debt_ids.len(),
                bad_transfers = %report.unbalanced_transfer_ids.len(),
                repaired = %repair,
                "Integrity check found problems"
            );
        }

        Ok(report)
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
        EntrySourceType, NewLedgerEntry, TipPayment, TipTransactionKind,
        DEFAULT_LOCATION_ID as LOC,
    };
    use tiprail_db::DbConfig;

    async fn setup() -> (Database, IntegrityChecker) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let checker = IntegrityChecker::new(db.clone());
        (db, checker)
    }

    async fn allocate(db: &Database, order: &str, pay: &str, cents: i64) {
        let allocator = TipAllocator::new(db.clone(), Arc::new(DbOwnershipResolver::new(db.clone())));
        allocator
            .allocate_tips_for_payment(&TipPayment {
                order_id: order.to_string(),
                payment_id: pay.to_string(),
                location_id: LOC.to_string(),
                primary_employee_id: "alice".to_string(),
                tip_cents: cents,
                kind: TipTransactionKind::Tip,
                paid_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_healthy_ledger_is_clean() {
        let (db, checker) = setup().await;
        allocate(&db, "o1", "p1", 1200).await;

        let report = checker.run(false).await.unwrap();
        assert!(report.is_clean());
    }

    // Repair mode with nothing to repair must not claim it repaired.
    #[tokio::test]
    async fn test_repair_run_without_drift_reports_no_repairs() {
        let (db, checker) = setup().await;
        allocate(&db, "o1", "p1", 1200).await;

        let report = checker.run(true).await.unwrap();
        assert!(report.is_clean());
        assert!(!report.drifts_repaired);
    }

    #[tokio::test]
    async fn test_detects_and_repairs_balance_drift() {
        let (db, checker) = setup().await;
        allocate(&db, "o1", "p1", 1200).await;

        sqlx::query("UPDATE employee_balances SET balance_cents = 1")
            .execute(db.pool())
            .await
            .unwrap();

        let report = checker.run(true).await.unwrap();
        assert_eq!(report.balance_drifts.len(), 1);
        assert!(report.drifts_repaired);

        // Second run is clean
        assert!(checker.run(false).await.unwrap().is_clean());
    }

    // A full service lifecycle leaves no findings: allocate, cash out,
    // charge back into debt, earn the debt back, sweep to payroll.
    #[tokio::test]
    async fn test_full_lifecycle_stays_clean() {
        let (db, checker) = setup().await;
        let engine = crate::TipEngine::new(db.clone());

        allocate(&db, "o1", "p1", 1000).await;
        engine.payouts().cash_out("r1", "alice", LOC, 800, "").await.unwrap();
        engine
            .chargebacks()
            .reverse_for_payment(&crate::ReversalRequest::full("o1", "p1"))
            .await
            .unwrap();
        allocate(&db, "o2", "p2", 900).await;
        engine.payouts().payroll_batch("b1", LOC, None).await.unwrap();

        let report = checker.run(false).await.unwrap();
        assert!(report.is_clean());
        assert_eq!(db.ledger().balance("alice", LOC).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_detects_orphaned_allocation_credit() {
        let (db, checker) = setup().await;

        // A DIRECT_TIP credit posted outside the pipeline, with payment
        // refs but no allocation record
        let mut tx = db.pool().begin().await.unwrap();
        db.ledger()
            .post(
                &mut tx,
                NewLedgerEntry::credit("alice", LOC, 500, EntrySourceType::DirectTip)
                    .with_payment("o9", "p9")
                    .with_idempotency_key("rogue"),
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let report = checker.run(false).await.unwrap();
        assert_eq!(report.orphaned_entry_ids.len(), 1);
    }

    #[tokio::test]
    async fn test_detects_debt_invariant_violation() {
        let (db, checker) = setup().await;

        let mut tx = db.pool().begin().await.unwrap();
        let debt = db.debts().open_debt(&mut tx, "alice", LOC, 100).await.unwrap();
        tx.commit().await.unwrap();

        sqlx::query("UPDATE tip_debts SET remaining_cents = 999 WHERE id = ?1")
            .bind(&debt.id)
            .execute(db.pool())
            .await
            .unwrap();

        let report = checker.run(false).await.unwrap();
        assert_eq!(report.invalid_debt_ids, vec![debt.id]);
    }

    #[tokio::test]
    async fn test_detects_unbalanced_transfer() {
        let (db, checker) = setup().await;

        // Credit alice first so the lone transfer debit doesn't also
        // register as drift weirdness
        let mut tx = db.pool().begin().await.unwrap();
        db.ledger()
            .post(
                &mut tx,
                NewLedgerEntry::credit("alice", LOC, 500, EntrySourceType::Adjustment)
                    .with_idempotency_key("seed"),
            )
            .await
            .unwrap();
        // One leg of a transfer, no counterpart
        db.ledger()
            .post(
                &mut tx,
                NewLedgerEntry::debit("alice", LOC, 200, EntrySourceType::Transfer)
                    .with_transfer("x-broken")
                    .with_idempotency_key("xfer-half"),
            )
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let report = checker.run(false).await.unwrap();
        assert_eq!(report.unbalanced_transfer_ids, vec!["x-broken".to_string()]);
    }
}
