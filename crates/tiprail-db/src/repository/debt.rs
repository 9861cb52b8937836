//! # Tip Debt Repository
//!
//! Tracks chargeback shortfalls until later credits recover them.
//!
//! ## Lifecycle
//! ```text
//!   chargeback capped by balance
//!              │
//!              ▼
//!   ┌──────── open ────────┐
//!   │                      │ credit reclaims part
//!   │ credit reclaims all  ▼
//!   │                   partial ──── credit reclaims rest ──► recovered
//!   ▼                      │
//! recovered                └── manager writes off ──► written_off
//! ```
//!
//! Reclaim itself lives in the ledger's posting path; this repository only
//! owns the debt rows. The two conn-taking associated functions exist so
//! the ledger can touch debts inside its caller's transaction.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tiprail_core::{validation, TipDebt, TipDebtStatus};

const DEBT_COLUMNS: &str = "id, employee_id, location_id, original_amount_cents, \
     remaining_cents, status, created_at, updated_at";

/// Repository for chargeback debt records.
#[derive(Debug, Clone)]
pub struct TipDebtRepository {
    pool: SqlitePool,
}

impl TipDebtRepository {
    /// Creates a new TipDebtRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TipDebtRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Writes (caller's transaction)
    // -------------------------------------------------------------------------

    /// Opens a fresh debt inside the caller's transaction.
    pub async fn open_debt(
        &self,
        conn: &mut SqliteConnection,
        employee_id: &str,
        location_id: &str,
        amount_cents: i64,
    ) -> DbResult<TipDebt> {
        validation::validate_amount_cents(amount_cents)?;

        let now = Utc::now();
        let debt = TipDebt {
            id: Uuid::new_v4().to_string(),
            employee_id: employee_id.to_string(),
            location_id: location_id.to_string(),
            original_amount_cents: amount_cents,
            remaining_cents: amount_cents,
            status: TipDebtStatus::Open,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO tip_debts (
                id, employee_id, location_id, original_amount_cents,
                remaining_cents, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&debt.id)
        .bind(&debt.employee_id)
        .bind(&debt.location_id)
        .bind(debt.original_amount_cents)
        .bind(debt.remaining_cents)
        .bind(debt.status)
        .bind(debt.created_at)
        .bind(debt.updated_at)
        .execute(conn)
        .await?;

        info!(
            debt_id = %debt.id,
            employee_id = %employee_id,
            amount = %amount_cents,
            "Opened tip debt"
        );

        Ok(debt)
    }

    /// Extends the employee's newest collectible debt by `amount_cents`,
    /// or opens a fresh one when none exists. The chargeback path calls
    /// this so repeated shortfalls for one employee pile into one record
    /// instead of scattering.
    pub async fn open_or_extend(
        &self,
        conn: &mut SqliteConnection,
        employee_id: &str,
        location_id: &str,
        amount_cents: i64,
    ) -> DbResult<TipDebt> {
        validation::validate_amount_cents(amount_cents)?;

        let existing = sqlx::query_as::<_, TipDebt>(&format!(
            "SELECT {DEBT_COLUMNS} FROM tip_debts \
             WHERE employee_id = ?1 AND location_id = ?2 \
               AND status IN ('open', 'partial') AND remaining_cents > 0 \
             ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(employee_id)
        .bind(location_id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(mut debt) = existing else {
            return self.open_debt(conn, employee_id, location_id, amount_cents).await;
        };

        debt.original_amount_cents += amount_cents;
        debt.remaining_cents += amount_cents;
        debt.updated_at = Utc::now();

        sqlx::query(
            "UPDATE tip_debts SET original_amount_cents = ?1, remaining_cents = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(debt.original_amount_cents)
        .bind(debt.remaining_cents)
        .bind(debt.updated_at)
        .bind(&debt.id)
        .execute(conn)
        .await?;

        info!(
            debt_id = %debt.id,
            employee_id = %employee_id,
            extended_by = %amount_cents,
            remaining = %debt.remaining_cents,
            "Extended existing tip debt"
        );

        Ok(debt)
    }

    /// Marks a debt written off. Collection stops; the ledger never posts
    /// an entry for a write-off (the debit that created the shortfall was
    /// already capped).
    pub async fn write_off(&self, debt_id: &str) -> DbResult<TipDebt> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE tip_debts SET status = ?1, updated_at = ?2 \
             WHERE id = ?3 AND status IN ('open', 'partial')",
        )
        .bind(TipDebtStatus::WrittenOff)
        .bind(now)
        .bind(debt_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("TipDebt", debt_id));
        }

        info!(debt_id = %debt_id, "Wrote off tip debt");
        self.get(debt_id).await
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Fetches one debt by id.
    pub async fn get(&self, debt_id: &str) -> DbResult<TipDebt> {
        sqlx::query_as::<_, TipDebt>(&format!(
            "SELECT {DEBT_COLUMNS} FROM tip_debts WHERE id = ?1"
        ))
        .bind(debt_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("TipDebt", debt_id))
    }

    /// All debts for one employee at a location, newest first.
    pub async fn for_employee(
        &self,
        employee_id: &str,
        location_id: &str,
    ) -> DbResult<Vec<TipDebt>> {
        let debts = sqlx::query_as::<_, TipDebt>(&format!(
            "SELECT {DEBT_COLUMNS} FROM tip_debts \
             WHERE employee_id = ?1 AND location_id = ?2 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(employee_id)
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(debts)
    }

    // -------------------------------------------------------------------------
    // Ledger hooks (associated functions, caller's connection)
    // -------------------------------------------------------------------------

    /// Collectible debts for an employee, oldest first. The ledger's
    /// credit path walks these when reclaiming.
    pub async fn collectible_for(
        conn: &mut SqliteConnection,
        employee_id: &str,
        location_id: &str,
    ) -> DbResult<Vec<TipDebt>> {
        let debts = sqlx::query_as::<_, TipDebt>(&format!(
            "SELECT {DEBT_COLUMNS} FROM tip_debts \
             WHERE employee_id = ?1 AND location_id = ?2 \
               AND status IN ('open', 'partial') AND remaining_cents > 0 \
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(employee_id)
        .bind(location_id)
        .fetch_all(conn)
        .await?;

        Ok(debts)
    }

    /// Applies a reclaim of `take_cents` against one debt. Caller
    /// guarantees `take_cents <= debt.remaining_cents`.
    pub async fn apply_reclaim(
        conn: &mut SqliteConnection,
        debt: &TipDebt,
        take_cents: i64,
    ) -> DbResult<()> {
        let remaining = debt.remaining_cents - take_cents;
        let status = if remaining == 0 {
            TipDebtStatus::Recovered
        } else {
            TipDebtStatus::Partial
        };

        sqlx::query(
            "UPDATE tip_debts SET remaining_cents = ?1, status = ?2, updated_at = ?3 WHERE id = ?4",
        )
        .bind(remaining)
        .bind(status)
        .bind(Utc::now())
        .bind(&debt.id)
        .execute(conn)
        .await?;

        debug!(
            debt_id = %debt.id,
            taken = %take_cents,
            remaining = %remaining,
            status = ?status,
            "Applied debt reclaim"
        );

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use tiprail_core::DEFAULT_LOCATION_ID as LOC;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_open_and_get() {
        let db = test_db().await;
        let debts = db.debts();

        let mut tx = db.pool().begin().await.unwrap();
        let debt = debts.open_debt(&mut tx, "alice", LOC, 500).await.unwrap();
        tx.commit().await.unwrap();

        let fetched = debts.get(&debt.id).await.unwrap();
        assert_eq!(fetched.status, TipDebtStatus::Open);
        assert_eq!(fetched.original_amount_cents, 500);
        assert_eq!(fetched.remaining_cents, 500);
    }

    #[tokio::test]
    async fn test_open_or_extend_piles_onto_existing_debt() {
        let db = test_db().await;
        let debts = db.debts();

        let mut tx = db.pool().begin().await.unwrap();
        let first = debts.open_or_extend(&mut tx, "alice", LOC, 300).await.unwrap();
        let second = debts.open_or_extend(&mut tx, "alice", LOC, 200).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.original_amount_cents, 500);
        assert_eq!(second.remaining_cents, 500);
    }

    #[tokio::test]
    async fn test_open_or_extend_skips_written_off_debt() {
        let db = test_db().await;
        let debts = db.debts();

        let mut tx = db.pool().begin().await.unwrap();
        let first = debts.open_or_extend(&mut tx, "alice", LOC, 300).await.unwrap();
        tx.commit().await.unwrap();

        debts.write_off(&first.id).await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        let second = debts.open_or_extend(&mut tx, "alice", LOC, 200).await.unwrap();
        tx.commit().await.unwrap();

        assert_ne!(second.id, first.id);
        assert_eq!(second.remaining_cents, 200);
    }

    #[tokio::test]
    async fn test_write_off_requires_collectible_debt() {
        let db = test_db().await;
        let debts = db.debts();

        assert!(debts.write_off("no-such-debt").await.is_err());
    }

    #[tokio::test]
    async fn test_collectible_ordering_is_oldest_first() {
        let db = test_db().await;
        let debts = db.debts();

        let mut tx = db.pool().begin().await.unwrap();
        let a = debts.open_debt(&mut tx, "alice", LOC, 100).await.unwrap();
        let b = debts.open_debt(&mut tx, "alice", LOC, 200).await.unwrap();
        let listed = TipDebtRepository::collectible_for(&mut tx, "alice", LOC)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, a.id);
        assert_eq!(listed[1].id, b.id);
    }
}
