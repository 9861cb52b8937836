//! # Tip Transaction Repository
//!
//! Allocation and reversal bookkeeping rows.
//!
//! `tip_transactions` carries one row per allocated payment; its
//! UNIQUE(order_id, payment_id) index is the top-level replay guard for the
//! allocation pipeline. `tip_reversals` does the same for chargebacks.
//! Neither table is part of the ledger itself; they record that a pipeline
//! ran, the ledger records what it posted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use tiprail_core::{TipPayment, TipTransaction};

/// One recorded chargeback/reversal of a payment's tips.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReversalRecord {
    pub order_id: String,
    pub payment_id: String,
    /// Fraction of the original allocation reversed, in basis points.
    pub refund_bps: u32,
    /// Cents actually debited across all affected employees.
    pub reversed_cents: i64,
    /// Cents that could not be debited and became tip debt.
    pub debt_cents: i64,
    pub memo: String,
    pub created_at: DateTime<Utc>,
}

/// Repository for allocation and reversal records.
#[derive(Debug, Clone)]
pub struct TipTransactionRepository {
    pool: SqlitePool,
}

impl TipTransactionRepository {
    /// Creates a new TipTransactionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TipTransactionRepository { pool }
    }

    /// Records that a payment's tips were allocated. Must run inside the
    /// same transaction as the ledger credits it summarizes.
    pub async fn record_allocation(
        &self,
        conn: &mut SqliteConnection,
        payment: &TipPayment,
    ) -> DbResult<TipTransaction> {
        let txn = TipTransaction {
            id: Uuid::new_v4().to_string(),
            order_id: payment.order_id.clone(),
            payment_id: payment.payment_id.clone(),
            location_id: payment.location_id.clone(),
            kind: payment.kind,
            tip_cents: payment.tip_cents,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO tip_transactions (
                id, order_id, payment_id, location_id, kind, tip_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&txn.id)
        .bind(&txn.order_id)
        .bind(&txn.payment_id)
        .bind(&txn.location_id)
        .bind(txn.kind)
        .bind(txn.tip_cents)
        .bind(txn.created_at)
        .execute(conn)
        .await?;

        debug!(
            order_id = %txn.order_id,
            payment_id = %txn.payment_id,
            tip = %txn.tip_cents,
            "Recorded tip allocation"
        );

        Ok(txn)
    }

    /// The allocation record for a payment, if its tips were allocated.
    pub async fn find_allocation(
        &self,
        executor: impl SqliteExecutor<'_>,
        order_id: &str,
        payment_id: &str,
    ) -> DbResult<Option<TipTransaction>> {
        let txn = sqlx::query_as::<_, TipTransaction>(
            "SELECT id, order_id, payment_id, location_id, kind, tip_cents, created_at \
             FROM tip_transactions WHERE order_id = ?1 AND payment_id = ?2",
        )
        .bind(order_id)
        .bind(payment_id)
        .fetch_optional(executor)
        .await?;

        Ok(txn)
    }

    /// Records a completed reversal. Must run inside the same transaction
    /// as the chargeback debits it summarizes.
    pub async fn record_reversal(
        &self,
        conn: &mut SqliteConnection,
        record: &ReversalRecord,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tip_reversals (
                order_id, payment_id, refund_bps, reversed_cents, debt_cents, memo, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&record.order_id)
        .bind(&record.payment_id)
        .bind(record.refund_bps)
        .bind(record.reversed_cents)
        .bind(record.debt_cents)
        .bind(&record.memo)
        .bind(record.created_at)
        .execute(conn)
        .await?;

        debug!(
            order_id = %record.order_id,
            payment_id = %record.payment_id,
            reversed = %record.reversed_cents,
            debt = %record.debt_cents,
            "Recorded tip reversal"
        );

        Ok(())
    }

    /// The reversal record for a payment, if one was ever processed.
    pub async fn find_reversal(
        &self,
        executor: impl SqliteExecutor<'_>,
        order_id: &str,
        payment_id: &str,
    ) -> DbResult<Option<ReversalRecord>> {
        let record = sqlx::query_as::<_, ReversalRecord>(
            "SELECT order_id, payment_id, refund_bps, reversed_cents, debt_cents, memo, created_at \
             FROM tip_reversals WHERE order_id = ?1 AND payment_id = ?2",
        )
        .bind(order_id)
        .bind(payment_id)
        .fetch_optional(executor)
        .await?;

        Ok(record)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
