//! # Tip Group Repository
//!
//! Segment-based group membership storage.
//!
//! ## Segment Model
//! ```text
//!  group g1 timeline ───────────────────────────────────────────────►
//!
//!  seg A [alice, bob]          seg B [alice, bob, carol]
//!  ├──────────────────────────┤├──────────────────────────── (open)
//!  started_at          ended_at = started_at of B
//!
//!  payment paid_at here ▲ splits among seg A's members, even if the
//!  allocation itself runs after carol joined.
//! ```
//!
//! Membership never mutates a segment. Joining or leaving closes the
//! current segment and opens a new one with the new roster; that
//! transition is a single transaction here so no payment can land between
//! the close and the open.

use chrono::{DateTime, Utc};
use sqlx::{SqliteExecutor, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tiprail_core::{CoreError, GroupMember, SplitMode, TipGroupSegment};

const SEGMENT_COLUMNS: &str = "id, group_id, location_id, split_mode, started_at, ended_at";

/// Repository for tip group segments and their members.
#[derive(Debug, Clone)]
pub struct GroupRepository {
    pool: SqlitePool,
}

impl GroupRepository {
    /// Creates a new GroupRepository.
    pub fn new(pool: SqlitePool) -> Self {
        GroupRepository { pool }
    }

    /// Opens a new segment with the given roster, closing the group's
    /// current segment (if any) at the same instant.
    ///
    /// Fails on an empty roster: a memberless segment could never split a
    /// payment.
    pub async fn start_segment(
        &self,
        group_id: &str,
        location_id: &str,
        split_mode: SplitMode,
        members: &[GroupMember],
    ) -> DbResult<TipGroupSegment> {
        if members.is_empty() {
            return Err(DbError::Domain(CoreError::EmptyGroup {
                segment_id: group_id.to_string(),
            }));
        }

        let now = Utc::now();
        let segment = TipGroupSegment {
            id: Uuid::new_v4().to_string(),
            group_id: group_id.to_string(),
            location_id: location_id.to_string(),
            split_mode,
            started_at: now,
            ended_at: None,
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE tip_group_segments SET ended_at = ?1 \
             WHERE group_id = ?2 AND ended_at IS NULL",
        )
        .bind(now)
        .bind(group_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO tip_group_segments (id, group_id, location_id, split_mode, started_at, ended_at)
            VALUES (?1, ?2, ?3, ?4, ?5, NULL)
            "#,
        )
        .bind(&segment.id)
        .bind(&segment.group_id)
        .bind(&segment.location_id)
        .bind(segment.split_mode)
        .bind(segment.started_at)
        .execute(&mut *tx)
        .await?;

        for member in members {
            sqlx::query(
                "INSERT INTO tip_group_members (segment_id, employee_id, tip_weight) VALUES (?1, ?2, ?3)",
            )
            .bind(&segment.id)
            .bind(&member.employee_id)
            .bind(member.tip_weight)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(
            group_id = %group_id,
            segment_id = %segment.id,
            members = %members.len(),
            mode = ?split_mode,
            "Started tip group segment"
        );

        Ok(segment)
    }

    /// Closes the group's current segment without opening a successor.
    /// Returns the closed segment, or NotFound when nothing was open.
    pub async fn close_current(&self, group_id: &str) -> DbResult<TipGroupSegment> {
        let now = Utc::now();
        let segment = sqlx::query_as::<_, TipGroupSegment>(&format!(
            "UPDATE tip_group_segments SET ended_at = ?1 \
             WHERE group_id = ?2 AND ended_at IS NULL \
             RETURNING {SEGMENT_COLUMNS}"
        ))
        .bind(now)
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("TipGroupSegment", group_id))?;

        info!(group_id = %group_id, segment_id = %segment.id, "Closed tip group segment");
        Ok(segment)
    }

    /// The group's currently open segment, if any.
    pub async fn current_segment(
        &self,
        executor: impl SqliteExecutor<'_>,
        group_id: &str,
    ) -> DbResult<Option<TipGroupSegment>> {
        let segment = sqlx::query_as::<_, TipGroupSegment>(&format!(
            "SELECT {SEGMENT_COLUMNS} FROM tip_group_segments \
             WHERE group_id = ?1 AND ended_at IS NULL"
        ))
        .bind(group_id)
        .fetch_optional(executor)
        .await?;

        Ok(segment)
    }

    /// The segment an employee belonged to at a given instant, if any.
    ///
    /// Window is half-open `[started_at, ended_at)`; the allocation
    /// pipeline resolves against the payment's `paid_at`, never "now".
    pub async fn segment_for_member_at(
        &self,
        executor: impl SqliteExecutor<'_>,
        employee_id: &str,
        location_id: &str,
        at: DateTime<Utc>,
    ) -> DbResult<Option<TipGroupSegment>> {
        let segment = sqlx::query_as::<_, TipGroupSegment>(&format!(
            "SELECT s.{} FROM tip_group_segments s \
             JOIN tip_group_members m ON m.segment_id = s.id \
             WHERE m.employee_id = ?1 AND s.location_id = ?2 \
               AND s.started_at <= ?3 \
               AND (s.ended_at IS NULL OR s.ended_at > ?3) \
             ORDER BY s.started_at DESC LIMIT 1",
            SEGMENT_COLUMNS.replace(", ", ", s.")
        ))
        .bind(employee_id)
        .bind(location_id)
        .bind(at)
        .fetch_optional(executor)
        .await?;

        Ok(segment)
    }

    /// A segment's roster, ordered by employee id for deterministic splits.
    pub async fn members(
        &self,
        executor: impl SqliteExecutor<'_>,
        segment_id: &str,
    ) -> DbResult<Vec<GroupMember>> {
        let members = sqlx::query_as::<_, GroupMember>(
            "SELECT employee_id, tip_weight FROM tip_group_members \
             WHERE segment_id = ?1 ORDER BY employee_id",
        )
        .bind(segment_id)
        .fetch_all(executor)
        .await?;

        Ok(members)
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

    fn roster(ids: &[&str]) -> Vec<GroupMember> {
        ids.iter().map(|id| GroupMember::new(*id, 1)).collect()
    }

    #[tokio::test]
    async fn test_start_and_read_segment() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.groups();

        let seg = repo
            .start_segment("g1", LOC, SplitMode::Equal, &roster(&["bob", "alice"]))
            .await
            .unwrap();

        let current = repo.current_segment(db.pool(), "g1").await.unwrap().unwrap();
        assert_eq!(current.id, seg.id);
        assert!(current.ended_at.is_none());

        let members = repo.members(db.pool(), &seg.id).await.unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].employee_id, "alice");
    }

    #[tokio::test]
    async fn test_empty_roster_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.groups();

        assert!(repo
            .start_segment("g1", LOC, SplitMode::Equal, &[])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_new_segment_closes_previous() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.groups();

        let first = repo
            .start_segment("g1", LOC, SplitMode::Equal, &roster(&["alice"]))
            .await
            .unwrap();
        let second = repo
            .start_segment("g1", LOC, SplitMode::Equal, &roster(&["alice", "bob"]))
            .await
            .unwrap();

        let current = repo.current_segment(db.pool(), "g1").await.unwrap().unwrap();
        assert_eq!(current.id, second.id);

        // A paid_at before the transition still resolves to the first segment
        let resolved = repo
            .segment_for_member_at(db.pool(), "alice", LOC, first.started_at)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.id, first.id);
    }

    #[tokio::test]
    async fn test_segment_lookup_respects_membership_and_window() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.groups();

        let seg = repo
            .start_segment("g1", LOC, SplitMode::Equal, &roster(&["alice"]))
            .await
            .unwrap();

        // bob is not a member
        assert!(repo
            .segment_for_member_at(db.pool(), "bob", LOC, Utc::now())
            .await
            .unwrap()
            .is_none());

        repo.close_current("g1").await.unwrap();

        // After closing, a current-instant lookup finds nothing
        assert!(repo
            .segment_for_member_at(db.pool(), "alice", LOC, Utc::now())
            .await
            .unwrap()
            .is_none());

        // But the historical window still resolves
        assert!(repo
            .segment_for_member_at(db.pool(), "alice", LOC, seg.started_at)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_close_without_open_segment_is_not_found() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.groups().close_current("nope").await.is_err());
    }
}
