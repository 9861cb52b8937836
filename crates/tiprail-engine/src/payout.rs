//! # Payout Service
//!
//! Moves earned tips off (or between) employee balances.
//!
//! ## Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  cash_out        one employee, one debit, caller-supplied request id   │
//! │  payroll_batch   sweep every positive balance into payroll;            │
//! │                  one transaction PER employee so a bad row never       │
//! │                  sinks the rest of the run                             │
//! │  transfer        paired debit+credit between two employees, one        │
//! │                  transaction, amounts always equal                     │
//! │  role_tip_out    same pairing as transfer, tagged ROLE_TIPOUT so       │
//! │                  reporting can tell server→busser money from           │
//! │                  peer-to-peer money                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Payouts never overdraw. There is no debt mechanism behind a payout the
//! way there is behind a chargeback; an over-ask is refused with
//! [`EngineError::InsufficientBalance`].

use tracing::{info, warn};

use crate::error::{EngineError, EngineResult};
use tiprail_core::{keys, validation, EntrySourceType, LedgerEntry, NewLedgerEntry};
use tiprail_db::Database;

// =============================================================================
// Outcome Types
// =============================================================================

/// Result of a cash-out request.
#[derive(Debug, Clone)]
pub struct CashOutOutcome {
    pub entry: LedgerEntry,
    pub replayed: bool,
}

/// Result of a transfer or tip-out: two legs, equal amounts.
#[derive(Debug, Clone)]
pub struct PairedOutcome {
    pub out_entry: LedgerEntry,
    pub in_entry: LedgerEntry,
    /// Debt-reclaim debits triggered by the receiving credit, if the
    /// recipient carried open debt.
    pub reclaim_entries: Vec<LedgerEntry>,
    pub replayed: bool,
}

/// One employee's debit within a payroll batch.
#[derive(Debug, Clone)]
pub struct PayrollLine {
    pub employee_id: String,
    pub amount_cents: i64,
    pub entry: LedgerEntry,
    pub replayed: bool,
}

/// One employee the batch could not process. The rest of the batch is
/// unaffected.
#[derive(Debug, Clone)]
pub struct PayrollFailure {
    pub employee_id: String,
    pub error: String,
}

/// Result of a payroll batch run.
#[derive(Debug, Clone)]
pub struct PayrollBatchOutcome {
    pub batch_id: String,
    pub lines: Vec<PayrollLine>,
    pub failures: Vec<PayrollFailure>,
}

impl PayrollBatchOutcome {
    /// Total cents swept into payroll by this run.
    pub fn total_cents(&self) -> i64 {
        self.lines.iter().map(|l| l.amount_cents).sum()
    }
}

// =============================================================================
// Service
// =============================================================================

/// The payout service.
#[derive(Debug, Clone)]
pub struct PayoutService {
    db: Database,
}

impl PayoutService {
    pub fn new(db: Database) -> Self {
        PayoutService { db }
    }

    // -------------------------------------------------------------------------
    // Cash Out
    // -------------------------------------------------------------------------

    /// Pays out cash over the counter.
    ///
    /// `request_id` is the caller's idempotency handle: retrying with the
    /// same id returns the original debit.
    pub async fn cash_out(
        &self,
        request_id: &str,
        employee_id: &str,
        location_id: &str,
        amount_cents: i64,
        memo: &str,
    ) -> EngineResult<CashOutOutcome> {
        validation::validate_entity_id("request_id", request_id)?;
        validation::validate_amount_cents(amount_cents)?;

        let ledger = self.db.ledger();
        let key = keys::cash_out(request_id);

        let mut tx = self.db.pool().begin().await?;

        if let Some(entry) = ledger.find_by_key(&mut *tx, &key).await? {
            tx.commit().await?;
            return Ok(CashOutOutcome {
                entry,
                replayed: true,
            });
        }

        let balance = ledger.balance_in(&mut *tx, employee_id, location_id).await?;
        if amount_cents > balance {
            return Err(EngineError::InsufficientBalance {
                employee_id: employee_id.to_string(),
                available_cents: balance,
                requested_cents: amount_cents,
            });
        }

        let outcome = ledger
            .post(
                &mut tx,
                NewLedgerEntry::debit(
                    employee_id,
                    location_id,
                    amount_cents,
                    EntrySourceType::PayoutCash,
                )
                .with_idempotency_key(key)
                .with_memo(if memo.is_empty() {
                    "Cash tip payout".to_string()
                } else {
                    memo.to_string()
                }),
            )
            .await?;
        tx.commit().await?;

        info!(
            employee_id = %employee_id,
            amount = %amount_cents,
            request_id = %request_id,
            "Cashed out tips"
        );

        Ok(CashOutOutcome {
            entry: outcome.entry,
            replayed: false,
        })
    }

    // -------------------------------------------------------------------------
    // Payroll
    // -------------------------------------------------------------------------

    /// Sweeps positive balances into a payroll run.
    ///
    /// Each employee is processed in their own transaction: one failure is
    /// recorded and skipped, the others still commit. Per-employee keys
    /// (`payroll:{batch}:{employee}`) make a re-run of the same batch safe.
    pub async fn payroll_batch(
        &self,
        batch_id: &str,
        location_id: &str,
        employee_ids: Option<&[String]>,
    ) -> EngineResult<PayrollBatchOutcome> {
        validation::validate_entity_id("batch_id", batch_id)?;

        let candidates: Vec<String> = match employee_ids {
            Some(ids) => ids.to_vec(),
            None => self
                .db
                .ledger()
                .positive_balances(location_id, None)
                .await?
                .into_iter()
                .map(|(employee_id, _)| employee_id)
                .collect(),
        };

        let mut lines = Vec::new();
        let mut failures = Vec::new();

        for employee_id in &candidates {
            match self.payroll_single(batch_id, employee_id, location_id).await {
                Ok(Some(line)) => lines.push(line),
                Ok(None) => {} // nothing to sweep
                Err(err) => {
                    warn!(
                        batch_id = %batch_id,
                        employee_id = %employee_id,
                        error = %err,
                        "Payroll line failed, continuing batch"
                    );
                    failures.push(PayrollFailure {
                        employee_id: employee_id.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            batch_id = %batch_id,
            swept = %lines.len(),
            failed = %failures.len(),
            "Payroll batch complete"
        );

        Ok(PayrollBatchOutcome {
            batch_id: batch_id.to_string(),
            lines,
            failures,
        })
    }

    /// One employee's slice of a payroll batch, in its own transaction.
    async fn payroll_single(
        &self,
        batch_id: &str,
        employee_id: &str,
        location_id: &str,
    ) -> EngineResult<Option<PayrollLine>> {
        let ledger = self.db.ledger();
        let key = keys::payroll(batch_id, employee_id);

        let mut tx = self.db.pool().begin().await?;

        if let Some(entry) = ledger.find_by_key(&mut *tx, &key).await? {
            tx.commit().await?;
            return Ok(Some(PayrollLine {
                employee_id: employee_id.to_string(),
                amount_cents: entry.amount_cents,
                entry,
                replayed: true,
            }));
        }

        let balance = ledger.balance_in(&mut *tx, employee_id, location_id).await?;
        if balance <= 0 {
            tx.commit().await?;
            return Ok(None);
        }

        let outcome = ledger
            .post(
                &mut tx,
                NewLedgerEntry::debit(
                    employee_id,
                    location_id,
                    balance,
                    EntrySourceType::PayoutPayroll,
                )
                .with_idempotency_key(key)
                .with_memo(format!("Payroll batch {batch_id}")),
            )
            .await?;
        tx.commit().await?;

        Ok(Some(PayrollLine {
            employee_id: employee_id.to_string(),
            amount_cents: outcome.entry.amount_cents,
            entry: outcome.entry,
            replayed: false,
        }))
    }

    // -------------------------------------------------------------------------
    // Transfers
    // -------------------------------------------------------------------------

    /// Moves tips between two employees. Both legs post in one
    /// transaction; the ledger-wide sum is unchanged.
    pub async fn transfer(
        &self,
        transfer_id: &str,
        from_employee_id: &str,
        to_employee_id: &str,
        location_id: &str,
        amount_cents: i64,
        memo: &str,
    ) -> EngineResult<PairedOutcome> {
        self.paired_move(
            transfer_id,
            from_employee_id,
            to_employee_id,
            location_id,
            amount_cents,
            memo,
            EntrySourceType::Transfer,
            keys::transfer_out(transfer_id),
            keys::transfer_in(transfer_id),
        )
        .await
    }

    /// A role tip-out (server → busser etc.). Mechanically a transfer,
    /// tagged separately for reporting and compliance.
    pub async fn role_tip_out(
        &self,
        tip_out_id: &str,
        from_employee_id: &str,
        to_employee_id: &str,
        location_id: &str,
        amount_cents: i64,
        memo: &str,
    ) -> EngineResult<PairedOutcome> {
        self.paired_move(
            tip_out_id,
            from_employee_id,
            to_employee_id,
            location_id,
            amount_cents,
            memo,
            EntrySourceType::RoleTipout,
            keys::tip_out_out(tip_out_id),
            keys::tip_out_in(tip_out_id),
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn paired_move(
        &self,
        move_id: &str,
        from_employee_id: &str,
        to_employee_id: &str,
        location_id: &str,
        amount_cents: i64,
        memo: &str,
        source_type: EntrySourceType,
        out_key: String,
        in_key: String,
    ) -> EngineResult<PairedOutcome> {
        validation::validate_entity_id("move_id", move_id)?;
        validation::validate_transfer_parties(from_employee_id, to_employee_id)?;
        validation::validate_amount_cents(amount_cents)?;
        validation::validate_memo(memo)?;

        let ledger = self.db.ledger();
        let mut tx = self.db.pool().begin().await?;

        if let Some(out_entry) = ledger.find_by_key(&mut *tx, &out_key).await? {
            let in_entry = ledger
                .find_by_key(&mut *tx, &in_key)
                .await?
                .ok_or_else(|| {
                    // Both legs post in one transaction, so a lone out-leg
                    // means external tampering with the ledger.
                    tiprail_db::DbError::not_found("LedgerEntry", &in_key)
                })?;
            tx.commit().await?;
            return Ok(PairedOutcome {
                out_entry,
                in_entry,
                reclaim_entries: Vec::new(),
                replayed: true,
            });
        }

        let balance = ledger
            .balance_in(&mut *tx, from_employee_id, location_id)
            .await?;
        if amount_cents > balance {
            return Err(EngineError::InsufficientBalance {
                employee_id: from_employee_id.to_string(),
                available_cents: balance,
                requested_cents: amount_cents,
            });
        }

        let out_outcome = ledger
            .post(
                &mut tx,
                NewLedgerEntry::debit(from_employee_id, location_id, amount_cents, source_type)
                    .with_transfer(move_id)
                    .with_idempotency_key(out_key)
                    .with_memo(if memo.is_empty() {
                        format!("Tips to {to_employee_id}")
                    } else {
                        memo.to_string()
                    }),
            )
            .await?;

        let in_outcome = ledger
            .post(
                &mut tx,
                NewLedgerEntry::credit(to_employee_id, location_id, amount_cents, source_type)
                    .with_transfer(move_id)
                    .with_idempotency_key(in_key)
                    .with_memo(if memo.is_empty() {
                        format!("Tips from {from_employee_id}")
                    } else {
                        memo.to_string()
                    }),
            )
            .await?;
        tx.commit().await?;

        info!(
            move_id = %move_id,
            from = %from_employee_id,
            to = %to_employee_id,
            amount = %amount_cents,
            source = ?source_type,
            "Moved tips between employees"
        );

        Ok(PairedOutcome {
            out_entry: out_outcome.entry,
            in_entry: in_outcome.entry,
            reclaim_entries: in_outcome.reclaim_entries,
            replayed: false,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
