//! # Ownership Repository
//!
//! Percentage claims on an order's tips.
//!
//! Reassignment never edits rows: the whole current set is stamped with
//! `superseded_at` and a fresh set is inserted. Allocation reads only the
//! unsuperseded rows, so a payment allocated before a reassignment keeps
//! the split it actually used.

use chrono::Utc;
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::error::DbResult;
use tiprail_core::{validation, OwnershipShare};

const SHARE_COLUMNS: &str =
    "id, order_id, table_id, employee_id, share_bps, assigned_at, superseded_at";

/// Repository for tip ownership shares.
#[derive(Debug, Clone)]
pub struct OwnershipRepository {
    pool: SqlitePool,
}

impl OwnershipRepository {
    /// Creates a new OwnershipRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OwnershipRepository { pool }
    }

    /// Replaces the current ownership set for an order.
    ///
    /// Shares must be non-empty, all positive, and sum to exactly 10000
    /// bps; anything else is rejected before any row changes. The old set
    /// is superseded and the new set inserted atomically.
    pub async fn assign(
        &self,
        order_id: &str,
        table_id: Option<&str>,
        shares: &[(String, u32)],
    ) -> DbResult<Vec<OwnershipShare>> {
        validation::validate_entity_id("order_id", order_id)?;
        validation::validate_share_set(shares)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let superseded = sqlx::query(
            "UPDATE ownership_shares SET superseded_at = ?1 \
             WHERE order_id = ?2 AND superseded_at IS NULL",
        )
        .bind(now)
        .bind(order_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let mut inserted = Vec::with_capacity(shares.len());
        for (employee_id, share_bps) in shares {
            let share = OwnershipShare {
                id: Uuid::new_v4().to_string(),
                order_id: order_id.to_string(),
                table_id: table_id.map(str::to_string),
                employee_id: employee_id.clone(),
                share_bps: *share_bps,
                assigned_at: now,
                superseded_at: None,
            };

            sqlx::query(
                r#"
                INSERT INTO ownership_shares (
                    id, order_id, table_id, employee_id, share_bps, assigned_at, superseded_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)
                "#,
            )
            .bind(&share.id)
            .bind(&share.order_id)
            .bind(&share.table_id)
            .bind(&share.employee_id)
            .bind(share.share_bps)
            .bind(share.assigned_at)
            .execute(&mut *tx)
            .await?;

            inserted.push(share);
        }

        tx.commit().await?;

        info!(
            order_id = %order_id,
            superseded = %superseded,
            shares = %inserted.len(),
            "Assigned ownership shares"
        );

        Ok(inserted)
    }

    /// The current (unsuperseded) shares for an order, ordered by
    /// employee id so downstream splits are deterministic.
    pub async fn current_shares(
        &self,
        executor: impl SqliteExecutor<'_>,
        order_id: &str,
    ) -> DbResult<Vec<OwnershipShare>> {
        let shares = sqlx::query_as::<_, OwnershipShare>(&format!(
            "SELECT {SHARE_COLUMNS} FROM ownership_shares \
             WHERE order_id = ?1 AND superseded_at IS NULL \
             ORDER BY employee_id"
        ))
        .bind(order_id)
        .fetch_all(executor)
        .await?;

        Ok(shares)
    }

    /// Full assignment history for an order, oldest set first.
    pub async fn history(&self, order_id: &str) -> DbResult<Vec<OwnershipShare>> {
        let shares = sqlx::query_as::<_, OwnershipShare>(&format!(
            "SELECT {SHARE_COLUMNS} FROM ownership_shares \
             WHERE order_id = ?1 \
             ORDER BY assigned_at, employee_id"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(shares)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn shares(pairs: &[(&str, u32)]) -> Vec<(String, u32)> {
        pairs.iter().map(|(e, b)| (e.to_string(), *b)).collect()
    }

    #[tokio::test]
    async fn test_assign_and_read_current() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.ownership();

        repo.assign("o1", Some("t5"), &shares(&[("bob", 4000), ("alice", 6000)]))
            .await
            .unwrap();

        let current = repo.current_shares(db.pool(), "o1").await.unwrap();
        assert_eq!(current.len(), 2);
        // Ordered by employee id regardless of assignment order
        assert_eq!(current[0].employee_id, "alice");
        assert_eq!(current[0].share_bps, 6000);
        assert_eq!(current[1].employee_id, "bob");
        assert_eq!(current[1].table_id.as_deref(), Some("t5"));
    }

    #[tokio::test]
    async fn test_reassign_supersedes_old_set() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.ownership();

        repo.assign("o1", None, &shares(&[("alice", 10_000)])).await.unwrap();
        repo.assign("o1", None, &shares(&[("bob", 10_000)])).await.unwrap();

        let current = repo.current_shares(db.pool(), "o1").await.unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].employee_id, "bob");

        // History keeps the superseded set
        let history = repo.history("o1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().any(|s| s.superseded_at.is_some()));
    }

    #[tokio::test]
    async fn test_assign_rejects_bad_share_sets() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.ownership();

        // Does not sum to 10000
        assert!(repo
            .assign("o1", None, &shares(&[("alice", 5000), ("bob", 4000)]))
            .await
            .is_err());

        // Zero share
        assert!(repo
            .assign("o1", None, &shares(&[("alice", 10_000), ("bob", 0)]))
            .await
            .is_err());

        // Empty set
        assert!(repo.assign("o1", None, &[]).await.is_err());

        // Nothing was written
        assert!(repo.current_shares(db.pool(), "o1").await.unwrap().is_empty());
    }
}
