//! # Compliance Service
//!
//! Wires stored settings and declarations into the pure advisory checks.
//!
//! Every method returns warnings, never errors-for-policy: a short
//! declaration or an over-cap tip-out is the manager's call to make, not
//! the engine's to block.

use tracing::debug;

use crate::error::EngineResult;
use tiprail_core::compliance::{
    check_declaration_minimum, check_pool_eligibility, check_tip_out_cap, ComplianceWarning,
    PoolMemberRole, ShiftSummary,
};
use tiprail_db::Database;

/// The compliance check service.
#[derive(Debug, Clone)]
pub struct ComplianceService {
    db: Database,
}

impl ComplianceService {
    pub fn new(db: Database) -> Self {
        ComplianceService { db }
    }

    /// Warnings to surface when an employee closes a shift.
    ///
    /// Currently one check: declared cash tips against the location's
    /// minimum fraction of shift sales. The current (newest) declaration
    /// counts; zero if the employee never declared.
    pub async fn shift_close_warnings(
        &self,
        employee_id: &str,
        shift_id: &str,
        location_id: &str,
        shift_sales_cents: i64,
    ) -> EngineResult<Vec<ComplianceWarning>> {
        let settings = self.db.settings().get(self.db.pool(), location_id).await?;

        let declared_cash_cents = self
            .db
            .declarations()
            .current_for_shift(employee_id, shift_id)
            .await?
            .map_or(0, |d| d.amount_cents);

        let summary = ShiftSummary {
            employee_id: employee_id.to_string(),
            shift_id: shift_id.to_string(),
            declared_cash_cents,
            shift_sales_cents,
        };

        let warnings: Vec<ComplianceWarning> =
            check_declaration_minimum(&summary, settings.declaration_minimum_bps)
                .into_iter()
                .collect();

        debug!(
            employee_id = %employee_id,
            shift_id = %shift_id,
            warnings = %warnings.len(),
            "Ran shift-close compliance checks"
        );

        Ok(warnings)
    }

    /// Warns when a configured tip-out percentage exceeds the location's
    /// cap. No cap configured means no warning.
    pub async fn tip_out_config_warning(
        &self,
        location_id: &str,
        role_id: &str,
        tip_out_bps: u32,
    ) -> EngineResult<Option<ComplianceWarning>> {
        let settings = self.db.settings().get(self.db.pool(), location_id).await?;

        Ok(settings
            .tip_out_cap_bps
            .and_then(|cap| check_tip_out_cap(role_id, tip_out_bps, cap)))
    }

    /// Flags pool members holding roles that may not share tips. Roles
    /// come from the caller's staffing data; the engine stores none.
    pub fn pool_warnings(
        &self,
        members: &[PoolMemberRole],
        disallowed_roles: &[&str],
    ) -> Vec<ComplianceWarning> {
        check_pool_eligibility(members, disallowed_roles)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
