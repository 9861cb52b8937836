//! # Domain Types
//!
//! Core domain types used throughout the TipRail engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   LedgerEntry   │   │ TipTransaction  │   │ OwnershipShare  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  employee_id    │   │  order_id       │   │  order_id       │       │
//! │  │  amount_cents   │   │  payment_id     │   │  employee_id    │       │
//! │  │  direction      │   │  kind           │   │  share_bps      │       │
//! │  │  source_type    │   │  tip_cents      │   │  superseded_at  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ TipGroupSegment │   │     TipDebt     │   │ CashTipDecl.    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  split_mode     │   │  original_cents │   │  shift_id       │       │
//! │  │  [started, end) │   │  remaining      │   │  amount_cents   │       │
//! │  │  members[]      │   │  status         │   │  source         │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Append-Only Discipline
//! `LedgerEntry` is never updated or deleted. Every correction (chargeback,
//! adjustment, debt reclaim) is a **new** entry; an employee's balance is the
//! signed sum of their entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Ledger Entry
// =============================================================================

/// Which side of the ledger an entry sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum EntryDirection {
    /// Money owed to the employee increases.
    Credit,
    /// Money owed to the employee decreases.
    Debit,
}

/// Why a ledger entry exists.
///
/// The source type is what reporting slices on, so the set is closed and
/// every posting path tags its entries explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum EntrySourceType {
    /// Tip credited straight to the order's owner.
    DirectTip,
    /// Tip-out from one role to another (e.g., server → busser).
    RoleTipout,
    /// Share of a tip-group split.
    TipGroup,
    /// Cash paid out over the counter.
    PayoutCash,
    /// Balance swept into a payroll run.
    PayoutPayroll,
    /// Manual manager adjustment.
    Adjustment,
    /// Reversal of previously credited tips after a void/refund.
    Chargeback,
    /// Recovery of an outstanding tip debt out of a fresh credit.
    DebtReclaim,
    /// Peer-to-peer transfer between employees.
    Transfer,
}

/// An immutable movement of tip funds to or from one employee's balance.
///
/// ## Immutability
/// Entries are append-only. There is no update or delete path anywhere in
/// the engine; corrections are new entries with their own source type.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LedgerEntry {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Employee whose balance this entry moves.
    pub employee_id: String,

    /// Operational location the entry belongs to.
    pub location_id: String,

    /// Amount in cents. Always positive; `direction` carries the sign.
    pub amount_cents: i64,

    /// Credit or debit.
    pub direction: EntryDirection,

    /// Business reason for the entry.
    pub source_type: EntrySourceType,

    /// Order that produced this entry, if any.
    pub order_id: Option<String>,

    /// Payment that produced this entry, if any.
    pub payment_id: Option<String>,

    /// Tip group the entry was split through, if any.
    pub group_id: Option<String>,

    /// Transfer this entry is half of, if any.
    pub transfer_id: Option<String>,

    /// Globally unique replay guard. `None` for entries that can
    /// legitimately repeat (e.g., manual adjustments).
    pub idempotency_key: Option<String>,

    /// Human-readable note shown in the employee's tip history.
    pub memo: String,

    /// When the entry was posted.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Returns the unsigned amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    /// Returns the signed contribution of this entry to a balance:
    /// positive for credits, negative for debits.
    #[inline]
    pub fn signed_cents(&self) -> i64 {
        match self.direction {
            EntryDirection::Credit => self.amount_cents,
            EntryDirection::Debit => -self.amount_cents,
        }
    }
}

/// Input for posting a new ledger entry.
///
/// The repository assigns `id` and `created_at`; callers provide everything
/// else. Built with the `credit`/`debit` constructors plus `with_*` setters
/// so call sites read like the operation they perform.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub employee_id: String,
    pub location_id: String,
    pub amount_cents: i64,
    pub direction: EntryDirection,
    pub source_type: EntrySourceType,
    pub order_id: Option<String>,
    pub payment_id: Option<String>,
    pub group_id: Option<String>,
    pub transfer_id: Option<String>,
    pub idempotency_key: Option<String>,
    pub memo: String,
}

impl NewLedgerEntry {
    /// Starts a credit entry.
    pub fn credit(
        employee_id: impl Into<String>,
        location_id: impl Into<String>,
        amount_cents: i64,
        source_type: EntrySourceType,
    ) -> Self {
        NewLedgerEntry {
            employee_id: employee_id.into(),
            location_id: location_id.into(),
            amount_cents,
            direction: EntryDirection::Credit,
            source_type,
            order_id: None,
            payment_id: None,
            group_id: None,
            transfer_id: None,
            idempotency_key: None,
            memo: String::new(),
        }
    }

    /// Starts a debit entry.
    pub fn debit(
        employee_id: impl Into<String>,
        location_id: impl Into<String>,
        amount_cents: i64,
        source_type: EntrySourceType,
    ) -> Self {
        NewLedgerEntry {
            direction: EntryDirection::Debit,
            ..NewLedgerEntry::credit(employee_id, location_id, amount_cents, source_type)
        }
    }

    /// Attaches the originating payment references.
    pub fn with_payment(mut self, order_id: impl Into<String>, payment_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self.payment_id = Some(payment_id.into());
        self
    }

    /// Attaches the tip group the entry was split through.
    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// Attaches the transfer this entry is half of.
    pub fn with_transfer(mut self, transfer_id: impl Into<String>) -> Self {
        self.transfer_id = Some(transfer_id.into());
        self
    }

    /// Sets the replay guard for this entry.
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Sets the memo shown in tip history.
    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }
}

// =============================================================================
// Tip Transaction
// =============================================================================

/// IRS-relevant classification of the gratuity.
///
/// Voluntary tips and mandatory charges are taxed differently downstream;
/// the engine records the distinction and otherwise treats them alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TipTransactionKind {
    /// Voluntary gratuity left by the guest.
    Tip,
    /// Mandatory service charge added by the house.
    ServiceCharge,
    /// Automatic gratuity (large parties etc.).
    AutoGratuity,
}

/// Parent record for one payment's full allocation.
///
/// `(order_id, payment_id)` is unique and is the top-level idempotency key
/// for the allocation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TipTransaction {
    pub id: String,
    pub order_id: String,
    pub payment_id: String,
    pub location_id: String,
    pub kind: TipTransactionKind,
    /// Total tip allocated by this transaction, in cents.
    pub tip_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// The payment-side input to the allocation pipeline.
///
/// Produced by the order/payment workflow (out of scope here); the engine
/// only reads it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TipPayment {
    pub order_id: String,
    pub payment_id: String,
    pub location_id: String,
    /// The server/bartender recorded on the order. Ownership resolution
    /// falls back to this employee at 100% when no share records exist.
    pub primary_employee_id: String,
    /// Tip amount in cents. Zero is valid and allocates nothing.
    pub tip_cents: i64,
    pub kind: TipTransactionKind,
    /// When the payment happened. Group membership is resolved against this
    /// timestamp, never against "now", so replays are stable.
    #[ts(as = "String")]
    pub paid_at: DateTime<Utc>,
}

// =============================================================================
// Ownership Share
// =============================================================================

/// One employee's percentage claim on a table/order's tips.
///
/// Shares for an order sum to 10000 bps while current. Reassignment
/// supersedes the whole set (sets `superseded_at`); rows are never edited
/// in place, so a historical payment always sees the shares that were
/// current when it was read.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OwnershipShare {
    pub id: String,
    pub order_id: String,
    /// Physical table, when the share came from a table hand-off.
    pub table_id: Option<String>,
    pub employee_id: String,
    /// Share in basis points (6000 = 60%).
    pub share_bps: u32,
    #[ts(as = "String")]
    pub assigned_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub superseded_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Tip Groups
// =============================================================================

/// How a segment divides pooled tips among its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SplitMode {
    /// Everyone gets the same share.
    Equal,
    /// Shares proportional to each member's tip weight.
    RoleWeighted,
}

/// One member of a tip-group segment.
///
/// Membership is an explicit ordered list, never a map: split determinism
/// must not depend on collection iteration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct GroupMember {
    pub employee_id: String,
    /// Relative weight for role-weighted splits. Ignored in equal mode.
    pub tip_weight: i64,
}

impl GroupMember {
    pub fn new(employee_id: impl Into<String>, tip_weight: i64) -> Self {
        GroupMember {
            employee_id: employee_id.into(),
            tip_weight,
        }
    }
}

/// A time-bounded membership window of a tip group.
///
/// A membership change closes the current segment (`ended_at`) and opens a
/// new one; closed segments are immutable. A payment splits against the
/// segment that was active at its `paid_at`, so historical allocations
/// replay against historical membership.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TipGroupSegment {
    pub id: String,
    /// Stable group identity across segments.
    pub group_id: String,
    pub location_id: String,
    pub split_mode: SplitMode,
    #[ts(as = "String")]
    pub started_at: DateTime<Utc>,
    /// `None` while the segment is the group's current one.
    #[ts(as = "Option<String>")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl TipGroupSegment {
    /// Whether this segment's window covers the given instant.
    /// The window is half-open: `[started_at, ended_at)`.
    pub fn covers(&self, at: DateTime<Utc>) -> bool {
        self.started_at <= at && self.ended_at.map_or(true, |end| at < end)
    }
}

// =============================================================================
// Tip Debt
// =============================================================================

/// Lifecycle of a recoverable chargeback shortfall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TipDebtStatus {
    /// Nothing recovered yet.
    Open,
    /// Some, but not all, recovered.
    Partial,
    /// Fully recovered from later credits.
    Recovered,
    /// Management decided to stop collecting.
    WrittenOff,
}

/// A tracked shortfall from a chargeback that exceeded the employee's
/// balance at a location that disallows negative balances.
///
/// Created only by the chargeback path; recovered automatically by the
/// ledger's credit path (DEBT_RECLAIM entries).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TipDebt {
    pub id: String,
    pub employee_id: String,
    pub location_id: String,
    /// Shortfall at creation time (grows if a later chargeback extends it).
    pub original_amount_cents: i64,
    /// Still uncollected. Invariant: `0 <= remaining <= original`.
    pub remaining_cents: i64,
    pub status: TipDebtStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl TipDebt {
    /// Whether new credits should still be redirected into this debt.
    #[inline]
    pub fn is_collectible(&self) -> bool {
        matches!(self.status, TipDebtStatus::Open | TipDebtStatus::Partial)
            && self.remaining_cents > 0
    }
}

// =============================================================================
// Cash Tip Declaration
// =============================================================================

/// Who declared the cash tips for a shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationSource {
    /// Employee self-declared at shift close.
    Employee,
    /// Manager entered or corrected the amount.
    ManagerOverride,
}

/// Cash tips declared for a shift.
///
/// Reporting/compliance input only: a declaration never posts ledger
/// entries in this engine. If the calling system wants declared cash on
/// the balance it posts its own credit.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashTipDeclaration {
    pub id: String,
    pub employee_id: String,
    pub shift_id: String,
    pub location_id: String,
    pub amount_cents: i64,
    pub source: DeclarationSource,
    /// Required when `source` is `ManagerOverride`.
    pub override_reason: Option<String>,
    #[ts(as = "String")]
    pub declared_at: DateTime<Utc>,
}

// =============================================================================
// Location Settings
// =============================================================================

/// Per-location policy knobs consulted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LocationSettings {
    pub location_id: String,

    /// Feature flag: when off, `allocate_tips_for_payment` is a no-op
    /// success, never an error.
    pub tips_enabled: bool,

    /// When false (the default), chargebacks are capped at the current
    /// balance and the shortfall becomes a TipDebt.
    pub allow_negative_balance: bool,

    /// Declared cash tips below this fraction of shift sales raise an
    /// advisory compliance warning. 800 bps = the IRS 8% convention.
    pub declaration_minimum_bps: u32,

    /// Advisory cap on configured tip-out percentages, if the location
    /// sets one.
    pub tip_out_cap_bps: Option<u32>,
}

impl LocationSettings {
    /// Policy defaults for a location with no stored settings row.
    pub fn defaults(location_id: impl Into<String>) -> Self {
        LocationSettings {
            location_id: location_id.into(),
            tips_enabled: true,
            allow_negative_balance: false,
            declaration_minimum_bps: crate::DEFAULT_DECLARATION_MINIMUM_BPS,
            tip_out_cap_bps: None,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_signed_cents() {
        let mut entry = LedgerEntry {
            id: "e1".into(),
            employee_id: "alice".into(),
            location_id: "loc1".into(),
            amount_cents: 500,
            direction: EntryDirection::Credit,
            source_type: EntrySourceType::DirectTip,
            order_id: None,
            payment_id: None,
            group_id: None,
            transfer_id: None,
            idempotency_key: None,
            memo: String::new(),
            created_at: Utc::now(),
        };
        assert_eq!(entry.signed_cents(), 500);

        entry.direction = EntryDirection::Debit;
        assert_eq!(entry.signed_cents(), -500);
    }

    #[test]
    fn test_new_entry_builder() {
        let entry = NewLedgerEntry::credit("alice", "loc1", 1200, EntrySourceType::DirectTip)
            .with_payment("order-1", "pay-1")
            .with_idempotency_key("tip:order-1:pay-1:alice")
            .with_memo("Tip on order-1");

        assert_eq!(entry.direction, EntryDirection::Credit);
        assert_eq!(entry.order_id.as_deref(), Some("order-1"));
        assert_eq!(entry.idempotency_key.as_deref(), Some("tip:order-1:pay-1:alice"));
    }

    #[test]
    fn test_segment_covers_half_open_window() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 17, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 3, 1, 23, 0, 0).unwrap();

        let mut segment = TipGroupSegment {
            id: "seg1".into(),
            group_id: "grp1".into(),
            location_id: "loc1".into(),
            split_mode: SplitMode::Equal,
            started_at: start,
            ended_at: Some(end),
        };

        assert!(segment.covers(start));
        assert!(segment.covers(start + chrono::Duration::hours(2)));
        // End instant belongs to the next segment
        assert!(!segment.covers(end));

        segment.ended_at = None;
        assert!(segment.covers(end + chrono::Duration::days(30)));
    }

    #[test]
    fn test_debt_collectible() {
        let now = Utc::now();
        let mut debt = TipDebt {
            id: "d1".into(),
            employee_id: "alice".into(),
            location_id: "loc1".into(),
            original_amount_cents: 500,
            remaining_cents: 500,
            status: TipDebtStatus::Open,
            created_at: now,
            updated_at: now,
        };
        assert!(debt.is_collectible());

        debt.status = TipDebtStatus::Partial;
        debt.remaining_cents = 200;
        assert!(debt.is_collectible());

        debt.status = TipDebtStatus::Recovered;
        debt.remaining_cents = 0;
        assert!(!debt.is_collectible());

        debt.status = TipDebtStatus::WrittenOff;
        debt.remaining_cents = 300;
        assert!(!debt.is_collectible());
    }

    #[test]
    fn test_location_defaults() {
        let settings = LocationSettings::defaults("loc1");
        assert!(settings.tips_enabled);
        assert!(!settings.allow_negative_balance);
        assert_eq!(settings.declaration_minimum_bps, 800);
    }
}
