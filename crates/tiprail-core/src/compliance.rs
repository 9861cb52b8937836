//! # Compliance Checks
//!
//! Pure, advisory checks that ride alongside the ledger.
//!
//! ## Advisory Means Advisory
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  These functions:                                                       │
//! │    • take shift/pool data in, return warnings out                       │
//! │    • NEVER mutate state                                                 │
//! │    • NEVER block an operation                                           │
//! │                                                                         │
//! │  The caller (manager dashboard, shift-close flow) decides what to do   │
//! │  with a warning. The engine just computes it.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Warning Types
// =============================================================================

/// Machine-readable reason for a compliance warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceCode {
    /// Declared cash tips fall below the configured fraction of shift sales.
    DeclarationBelowMinimum,
    /// A configured tip-out percentage exceeds the location's cap.
    TipOutAboveCap,
    /// A pool contains a role that is not allowed to share tips.
    IneligiblePoolMember,
}

/// A structured, non-blocking compliance warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ComplianceWarning {
    pub code: ComplianceCode,
    /// Employee the warning concerns, when there is a single one.
    pub employee_id: Option<String>,
    /// Human-readable explanation for the dashboard.
    pub message: String,
}

// =============================================================================
// Inputs
// =============================================================================

/// Shift data consumed by the declaration-minimum check.
///
/// Assembled by the caller from shift records and
/// [`crate::types::CashTipDeclaration`] rows; the check itself reads nothing.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShiftSummary {
    pub employee_id: String,
    pub shift_id: String,
    /// Sum of the employee's cash declarations for the shift.
    pub declared_cash_cents: i64,
    /// The employee's attributable sales for the shift.
    pub shift_sales_cents: i64,
}

/// A pool member with the role they held, for eligibility checks.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PoolMemberRole {
    pub employee_id: String,
    pub role_id: String,
}

// =============================================================================
// Checks
// =============================================================================

/// Flags a shift whose declared cash tips fall below `minimum_bps` of shift
/// sales (the IRS convention is 8%, i.e. 800 bps).
///
/// Returns `None` when the declaration meets the minimum, or when there were
/// no sales to declare against.
pub fn check_declaration_minimum(
    shift: &ShiftSummary,
    minimum_bps: u32,
) -> Option<ComplianceWarning> {
    if shift.shift_sales_cents <= 0 {
        return None;
    }

    let expected = Money::from_cents(shift.shift_sales_cents).share_floor(minimum_bps);
    if shift.declared_cash_cents >= expected.cents() {
        return None;
    }

    Some(ComplianceWarning {
        code: ComplianceCode::DeclarationBelowMinimum,
        employee_id: Some(shift.employee_id.clone()),
        message: format!(
            "Shift {}: declared {} is below {}.{:02}% of sales ({} expected)",
            shift.shift_id,
            Money::from_cents(shift.declared_cash_cents),
            minimum_bps / 100,
            minimum_bps % 100,
            expected,
        ),
    })
}

/// Flags a configured tip-out percentage that exceeds the location's cap.
pub fn check_tip_out_cap(
    role_id: &str,
    tip_out_bps: u32,
    cap_bps: u32,
) -> Option<ComplianceWarning> {
    if tip_out_bps <= cap_bps {
        return None;
    }

    Some(ComplianceWarning {
        code: ComplianceCode::TipOutAboveCap,
        employee_id: None,
        message: format!(
            "Tip-out for role {role_id} is {}.{:02}%, above the {}.{:02}% cap",
            tip_out_bps / 100,
            tip_out_bps % 100,
            cap_bps / 100,
            cap_bps % 100,
        ),
    })
}

/// Flags every pool member whose role is not allowed to share tips
/// (classically: managers in a server pool).
pub fn check_pool_eligibility(
    members: &[PoolMemberRole],
    disallowed_roles: &[&str],
) -> Vec<ComplianceWarning> {
    members
        .iter()
        .filter(|m| disallowed_roles.contains(&m.role_id.as_str()))
        .map(|m| ComplianceWarning {
            code: ComplianceCode::IneligiblePoolMember,
            employee_id: Some(m.employee_id.clone()),
            message: format!(
                "Employee {} holds role {} which may not share in a tip pool",
                m.employee_id, m.role_id
            ),
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
