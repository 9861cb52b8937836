//! # Group Membership Service
//!
//! Join/leave choreography on top of the segment store.
//!
//! Every membership change is a segment transition: close the current
//! window, open a new one with the new roster. Payments that landed inside
//! a closed window keep splitting against that window's roster forever.

use std::sync::Arc;

use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::resolver::RoleWeights;
use tiprail_core::{validation, GroupMember, SplitMode, TipGroupSegment};
use tiprail_db::{Database, DbError};

/// The tip group service.
pub struct GroupService {
    db: Database,
    weights: Arc<dyn RoleWeights>,
}

impl GroupService {
    pub fn new(db: Database, weights: Arc<dyn RoleWeights>) -> Self {
        GroupService { db, weights }
    }

    /// Opens a group with an initial roster.
    pub async fn open_group(
        &self,
        group_id: &str,
        location_id: &str,
        split_mode: SplitMode,
        members: &[GroupMember],
    ) -> EngineResult<TipGroupSegment> {
        validation::validate_entity_id("group_id", group_id)?;
        validation::validate_entity_id("location_id", location_id)?;

        let segment = self
            .db
            .groups()
            .start_segment(group_id, location_id, split_mode, members)
            .await?;
        Ok(segment)
    }

    /// Closes the group. Payments after this instant no longer split
    /// through it.
    pub async fn close_group(&self, group_id: &str) -> EngineResult<TipGroupSegment> {
        let segment = self.db.groups().close_current(group_id).await?;
        Ok(segment)
    }

    /// Adds an employee to an open group.
    ///
    /// Idempotent: joining a group you are already in returns the current
    /// segment unchanged. When no explicit weight is given, the role
    /// weight source supplies one (only relevant in role-weighted mode).
    pub async fn join(
        &self,
        group_id: &str,
        employee_id: &str,
        weight: Option<i64>,
    ) -> EngineResult<TipGroupSegment> {
        validation::validate_entity_id("employee_id", employee_id)?;

        let groups = self.db.groups();
        let current = groups
            .current_segment(self.db.pool(), group_id)
            .await?
            .ok_or_else(|| EngineError::Db(DbError::not_found("TipGroupSegment", group_id)))?;

        let mut roster = groups.members(self.db.pool(), &current.id).await?;
        if roster.iter().any(|m| m.employee_id == employee_id) {
            debug!(group_id = %group_id, employee_id = %employee_id, "Already a member, join is a no-op");
            return Ok(current);
        }

        let weight = match weight {
            Some(w) => w,
            None => self.weights.tip_weight(employee_id).await?,
        };
        roster.push(GroupMember::new(employee_id, weight));

        let segment = groups
            .start_segment(group_id, &current.location_id, current.split_mode, &roster)
            .await?;
        Ok(segment)
    }

    /// Removes an employee from an open group.
    ///
    /// Idempotent: leaving a group you are not in returns the current
    /// segment unchanged. The last member leaving closes the group
    /// (`None`).
    pub async fn leave(
        &self,
        group_id: &str,
        employee_id: &str,
    ) -> EngineResult<Option<TipGroupSegment>> {
        let groups = self.db.groups();
        let current = groups
            .current_segment(self.db.pool(), group_id)
            .await?
            .ok_or_else(|| EngineError::Db(DbError::not_found("TipGroupSegment", group_id)))?;

        let roster = groups.members(self.db.pool(), &current.id).await?;
        let remaining: Vec<GroupMember> = roster
            .iter()
            .filter(|m| m.employee_id != employee_id)
            .cloned()
            .collect();

        if remaining.len() == roster.len() {
            debug!(group_id = %group_id, employee_id = %employee_id, "Not a member, leave is a no-op");
            return Ok(Some(current));
        }

        if remaining.is_empty() {
            groups.close_current(group_id).await?;
            return Ok(None);
        }

        let segment = groups
            .start_segment(group_id, &current.location_id, current.split_mode, &remaining)
            .await?;
        Ok(Some(segment))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
