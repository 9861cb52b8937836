//! # Ledger Repository
//!
//! The append-only entry store, balance derivation, and idempotency guard.
//!
//! ## Posting Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      post(conn, entry)                                  │
//! │                                                                         │
//! │  1. VALIDATE                                                           │
//! │     └── amount > 0, ids present, memo bounded (no write on failure)    │
//! │                                                                         │
//! │  2. REPLAY CHECK                                                       │
//! │     └── idempotency_key already used? → return existing entry,         │
//! │         no duplicate, no error                                         │
//! │                                                                         │
//! │  3. INSERT + cached balance upsert                                     │
//! │                                                                         │
//! │  4. DEBT RECLAIM (credits only)                                        │
//! │     └── open/partial TipDebt? → redirect min(credit, remaining)        │
//! │         into DEBT_RECLAIM debits, oldest debt first                    │
//! │                                                                         │
//! │  All inside the CALLER's connection/transaction. post() never opens    │
//! │  its own transaction: the backing store does not nest them, and the    │
//! │  caller may be composing a larger atomic operation (e.g. void payment  │
//! │  + chargeback in one commit).                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, SqliteConnection, SqlitePool, SqliteExecutor};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::debt::TipDebtRepository;
use tiprail_core::{
    keys, validation, EntryDirection, EntrySourceType, LedgerEntry, NewLedgerEntry,
};

/// Every column of `tip_ledger_entries`, in FromRow order.
const ENTRY_COLUMNS: &str = "id, employee_id, location_id, amount_cents, direction, \
     source_type, order_id, payment_id, group_id, transfer_id, idempotency_key, memo, created_at";

// =============================================================================
// Outcome Types
// =============================================================================

/// Result of posting one entry.
#[derive(Debug, Clone)]
pub struct PostOutcome {
    /// The posted (or replayed) entry.
    pub entry: LedgerEntry,
    /// True when the idempotency key had already been used and the existing
    /// entry was returned unchanged.
    pub replayed: bool,
    /// Cents redirected into open debts out of this credit.
    pub reclaimed_cents: i64,
    /// The DEBT_RECLAIM debits carved out of this credit, if any.
    pub reclaim_entries: Vec<LedgerEntry>,
}

/// Filters for ledger history queries.
#[derive(Debug, Clone, Default)]
pub struct LedgerFilter {
    pub location_id: Option<String>,
    pub direction: Option<EntryDirection>,
    pub source_type: Option<EntrySourceType>,
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

/// One employee whose cached balance disagrees with the ledger sum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceDrift {
    pub employee_id: String,
    pub location_id: String,
    pub cached_cents: i64,
    pub actual_cents: i64,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for the append-only tip ledger.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    // -------------------------------------------------------------------------
    // Posting
    // -------------------------------------------------------------------------

    /// Posts one entry inside the caller's connection/transaction.
    ///
    /// Replay-safe: if the entry's idempotency key was already used, the
    /// existing entry is returned unchanged (`replayed = true`) and nothing
    /// is written. For credits, open tip debts are reclaimed before the
    /// credit is considered final.
    pub async fn post(
        &self,
        conn: &mut SqliteConnection,
        new: NewLedgerEntry,
    ) -> DbResult<PostOutcome> {
        validation::validate_amount_cents(new.amount_cents)?;
        validation::validate_entity_id("employee_id", &new.employee_id)?;
        validation::validate_entity_id("location_id", &new.location_id)?;
        validation::validate_memo(&new.memo)?;

        if let Some(key) = &new.idempotency_key {
            if let Some(existing) = self.find_by_key(&mut *conn, key).await? {
                debug!(key = %key, entry_id = %existing.id, "Replayed idempotency key, returning existing entry");
                return Ok(PostOutcome {
                    entry: existing,
                    replayed: true,
                    reclaimed_cents: 0,
                    reclaim_entries: Vec::new(),
                });
            }
        }

        let entry = self.insert_entry(&mut *conn, &new).await?;

        let (reclaimed_cents, reclaim_entries) = match entry.direction {
            EntryDirection::Credit => self.reclaim_open_debts(&mut *conn, &entry).await?,
            EntryDirection::Debit => (0, Vec::new()),
        };

        Ok(PostOutcome {
            entry,
            replayed: false,
            reclaimed_cents,
            reclaim_entries,
        })
    }

    /// Looks up an entry by its idempotency key.
    pub async fn find_by_key(
        &self,
        executor: impl SqliteExecutor<'_>,
        key: &str,
    ) -> DbResult<Option<LedgerEntry>> {
        let entry = sqlx::query_as::<_, LedgerEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM tip_ledger_entries WHERE idempotency_key = ?1"
        ))
        .bind(key)
        .fetch_optional(executor)
        .await?;

        Ok(entry)
    }

    /// Raw insert + cached balance upkeep. No replay check, no debt
    /// reclaim; `post` is the only caller besides the reclaim loop itself.
    async fn insert_entry(
        &self,
        conn: &mut SqliteConnection,
        new: &NewLedgerEntry,
    ) -> DbResult<LedgerEntry> {
        let entry = LedgerEntry {
            id: Uuid::new_v4().to_string(),
            employee_id: new.employee_id.clone(),
            location_id: new.location_id.clone(),
            amount_cents: new.amount_cents,
            direction: new.direction,
            source_type: new.source_type,
            order_id: new.order_id.clone(),
            payment_id: new.payment_id.clone(),
            group_id: new.group_id.clone(),
            transfer_id: new.transfer_id.clone(),
            idempotency_key: new.idempotency_key.clone(),
            memo: new.memo.clone(),
            created_at: Utc::now(),
        };

        debug!(
            entry_id = %entry.id,
            employee_id = %entry.employee_id,
            amount = %entry.amount_cents,
            direction = ?entry.direction,
            source = ?entry.source_type,
            "Posting ledger entry"
        );

        sqlx::query(
            r#"
            INSERT INTO tip_ledger_entries (
                id, employee_id, location_id, amount_cents, direction,
                source_type, order_id, payment_id, group_id, transfer_id,
                idempotency_key, memo, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.employee_id)
        .bind(&entry.location_id)
        .bind(entry.amount_cents)
        .bind(entry.direction)
        .bind(entry.source_type)
        .bind(&entry.order_id)
        .bind(&entry.payment_id)
        .bind(&entry.group_id)
        .bind(&entry.transfer_id)
        .bind(&entry.idempotency_key)
        .bind(&entry.memo)
        .bind(entry.created_at)
        .execute(&mut *conn)
        .await?;

        self.apply_balance_delta(
            &mut *conn,
            &entry.employee_id,
            &entry.location_id,
            entry.signed_cents(),
        )
        .await?;

        Ok(entry)
    }

    /// Redirects as much of a fresh credit as open debts can absorb into
    /// DEBT_RECLAIM debits, oldest debt first.
    async fn reclaim_open_debts(
        &self,
        conn: &mut SqliteConnection,
        credit: &LedgerEntry,
    ) -> DbResult<(i64, Vec<LedgerEntry>)> {
        let debts = TipDebtRepository::collectible_for(
            &mut *conn,
            &credit.employee_id,
            &credit.location_id,
        )
        .await?;

        let mut available = credit.amount_cents;
        let mut reclaimed = 0;
        let mut entries = Vec::new();

        for debt in debts {
            if available == 0 {
                break;
            }

            let take = available.min(debt.remaining_cents);
            let mut reclaim = NewLedgerEntry::debit(
                &credit.employee_id,
                &credit.location_id,
                take,
                EntrySourceType::DebtReclaim,
            )
            .with_memo(format!("Recovered tip debt {}", debt.id));
            if let Some(credit_key) = credit.idempotency_key.as_deref() {
                reclaim = reclaim.with_idempotency_key(keys::debt_reclaim(credit_key, &debt.id));
            }

            let reclaim_entry = self.insert_entry(&mut *conn, &reclaim).await?;
            TipDebtRepository::apply_reclaim(&mut *conn, &debt, take).await?;

            debug!(
                debt_id = %debt.id,
                employee_id = %credit.employee_id,
                reclaimed = %take,
                "Reclaimed tip debt from credit"
            );

            available -= take;
            reclaimed += take;
            entries.push(reclaim_entry);
        }

        Ok((reclaimed, entries))
    }

    // -------------------------------------------------------------------------
    // Balances
    // -------------------------------------------------------------------------

    /// Signed ledger sum for one employee at one location. The source of
    /// truth; the cached balance exists only for dashboard reads.
    pub async fn balance(&self, employee_id: &str, location_id: &str) -> DbResult<i64> {
        self.balance_in(&self.pool, employee_id, location_id).await
    }

    /// Same as [`balance`](Self::balance) against a caller-supplied executor,
    /// for use inside a transaction.
    pub async fn balance_in(
        &self,
        executor: impl SqliteExecutor<'_>,
        employee_id: &str,
        location_id: &str,
    ) -> DbResult<i64> {
        let sum: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT SUM(CASE WHEN direction = 'credit' THEN amount_cents ELSE -amount_cents END)
            FROM tip_ledger_entries
            WHERE employee_id = ?1 AND location_id = ?2
            "#,
        )
        .bind(employee_id)
        .bind(location_id)
        .fetch_one(executor)
        .await?;

        Ok(sum.unwrap_or(0))
    }

    /// The cached balance row, if one exists.
    pub async fn cached_balance(
        &self,
        employee_id: &str,
        location_id: &str,
    ) -> DbResult<Option<i64>> {
        let cached: Option<i64> = sqlx::query_scalar(
            "SELECT balance_cents FROM employee_balances WHERE employee_id = ?1 AND location_id = ?2",
        )
        .bind(employee_id)
        .bind(location_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(cached)
    }

    async fn apply_balance_delta(
        &self,
        conn: &mut SqliteConnection,
        employee_id: &str,
        location_id: &str,
        delta_cents: i64,
    ) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO employee_balances (employee_id, location_id, balance_cents, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (employee_id, location_id)
            DO UPDATE SET balance_cents = balance_cents + ?3, updated_at = ?4
            "#,
        )
        .bind(employee_id)
        .bind(location_id)
        .bind(delta_cents)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Employees with a positive ledger balance at a location, optionally
    /// restricted to a set of ids. Feeds payroll batches.
    pub async fn positive_balances(
        &self,
        location_id: &str,
        employee_ids: Option<&[String]>,
    ) -> DbResult<Vec<(String, i64)>> {
        let mut qb: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
            "SELECT employee_id, \
             SUM(CASE WHEN direction = 'credit' THEN amount_cents ELSE -amount_cents END) AS balance \
             FROM tip_ledger_entries WHERE location_id = ",
        );
        qb.push_bind(location_id);

        if let Some(ids) = employee_ids {
            qb.push(" AND employee_id IN (");
            let mut separated = qb.separated(", ");
            for id in ids {
                separated.push_bind(id);
            }
            qb.push(")");
        }

        qb.push(" GROUP BY employee_id HAVING balance > 0 ORDER BY employee_id");

        let rows = qb
            .build_query_as::<(String, i64)>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    // -------------------------------------------------------------------------
    // History
    // -------------------------------------------------------------------------

    /// All entries referencing one payment, oldest first.
    pub async fn entries_for_payment(
        &self,
        executor: impl SqliteExecutor<'_>,
        order_id: &str,
        payment_id: &str,
    ) -> DbResult<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM tip_ledger_entries \
             WHERE order_id = ?1 AND payment_id = ?2 \
             ORDER BY created_at, id"
        ))
        .bind(order_id)
        .bind(payment_id)
        .fetch_all(executor)
        .await?;

        Ok(entries)
    }

    /// The allocation credits (DIRECT_TIP / TIP_GROUP) posted for a
    /// payment. The chargeback path reverses exactly these.
    pub async fn allocation_credits_for_payment(
        &self,
        executor: impl SqliteExecutor<'_>,
        order_id: &str,
        payment_id: &str,
    ) -> DbResult<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM tip_ledger_entries \
             WHERE order_id = ?1 AND payment_id = ?2 \
               AND direction = 'credit' \
               AND source_type IN ('direct_tip', 'tip_group') \
             ORDER BY employee_id, id"
        ))
        .bind(order_id)
        .bind(payment_id)
        .fetch_all(executor)
        .await?;

        Ok(entries)
    }

    /// Filtered ledger history for one employee, newest first.
    pub async fn ledger(
        &self,
        employee_id: &str,
        filter: &LedgerFilter,
    ) -> DbResult<Vec<LedgerEntry>> {
        let mut qb: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(format!(
            "SELECT {ENTRY_COLUMNS} FROM tip_ledger_entries WHERE employee_id = "
        ));
        qb.push_bind(employee_id);

        if let Some(location_id) = &filter.location_id {
            qb.push(" AND location_id = ").push_bind(location_id);
        }
        if let Some(direction) = filter.direction {
            qb.push(" AND direction = ").push_bind(direction);
        }
        if let Some(source_type) = filter.source_type {
            qb.push(" AND source_type = ").push_bind(source_type);
        }
        if let Some(order_id) = &filter.order_id {
            qb.push(" AND order_id = ").push_bind(order_id);
        }
        if let Some(payment_id) = &filter.payment_id {
            qb.push(" AND payment_id = ").push_bind(payment_id);
        }
        if let Some(since) = filter.since {
            qb.push(" AND created_at >= ").push_bind(since);
        }
        if let Some(until) = filter.until {
            qb.push(" AND created_at < ").push_bind(until);
        }

        qb.push(" ORDER BY created_at DESC, id DESC");

        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }

        let entries = qb
            .build_query_as::<LedgerEntry>()
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    // -------------------------------------------------------------------------
    // Reconciliation
    // -------------------------------------------------------------------------

    /// Compares every cached balance against the true ledger sum.
    ///
    /// Returns the drifts found. With `repair`, cached rows are rewritten
    /// to the ledger sum (the ledger always wins; the cache is derived).
    pub async fn reconcile(&self, repair: bool) -> DbResult<Vec<BalanceDrift>> {
        let drifts = sqlx::query_as::<_, (String, String, i64, i64)>(
            r#"
            SELECT
                COALESCE(e.employee_id, b.employee_id) AS employee_id,
                COALESCE(e.location_id, b.location_id) AS location_id,
                COALESCE(b.balance_cents, 0) AS cached,
                COALESCE(e.actual, 0) AS actual
            FROM (
                SELECT employee_id, location_id,
                       SUM(CASE WHEN direction = 'credit' THEN amount_cents ELSE -amount_cents END) AS actual
                FROM tip_ledger_entries
                GROUP BY employee_id, location_id
            ) e
            FULL OUTER JOIN employee_balances b
                ON b.employee_id = e.employee_id AND b.location_id = e.location_id
            WHERE COALESCE(b.balance_cents, 0) != COALESCE(e.actual, 0)
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let drifts: Vec<BalanceDrift> = drifts
            .into_iter()
            .map(|(employee_id, location_id, cached_cents, actual_cents)| BalanceDrift {
                employee_id,
                location_id,
                cached_cents,
                actual_cents,
            })
            .collect();

        for drift in &drifts {
            warn!(
                employee_id = %drift.employee_id,
                cached = %drift.cached_cents,
                actual = %drift.actual_cents,
                "Cached balance drift detected"
            );

            if repair {
                let now = Utc::now();
                sqlx::query(
                    r#"
                    INSERT INTO employee_balances (employee_id, location_id, balance_cents, updated_at)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT (employee_id, location_id)
                    DO UPDATE SET balance_cents = ?3, updated_at = ?4
                    "#,
                )
                .bind(&drift.employee_id)
                .bind(&drift.location_id)
                .bind(drift.actual_cents)
                .bind(now)
                .execute(&self.pool)
                .await?;
            }
        }

        Ok(drifts)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
