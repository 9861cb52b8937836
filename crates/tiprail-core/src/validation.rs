//! # Validation Module
//!
//! Input validation for the tip engine.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (order/payment system)                                │
//! │  ├── Type validation (deserialization)                                 │
//! │  └── Permission checks (assumed done before we are invoked)            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - business rule validation                       │
//! │  ├── Rejected before any write; no partial effect ever                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (amount_cents > 0)                                          │
//! │  ├── UNIQUE (idempotency_key)                                          │
//! │  └── Foreign key constraints                                           │
//! │                                                                         │
//! │  Defense in depth: multiple layers catch different errors              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::FULL_SHARE_BPS;
use crate::{MAX_ID_LEN, MAX_MEMO_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Amount Validators
// =============================================================================

/// Validates a ledger amount in cents.
///
/// ## Rules
/// - Must be strictly positive; the entry's direction carries the sign
/// - Zero-tip payments are handled upstream (they post nothing), so a zero
///   amount reaching a posting path is a caller bug
///
/// ## Example
/// ```rust
/// use tiprail_core::validation::validate_amount_cents;
///
/// assert!(validate_amount_cents(1200).is_ok());
/// assert!(validate_amount_cents(0).is_err());
/// assert!(validate_amount_cents(-500).is_err());
/// ```
pub fn validate_amount_cents(cents: i64) -> CoreResult<()> {
    if cents <= 0 {
        return Err(CoreError::NonPositiveAmount(cents));
    }
    Ok(())
}

/// Validates a basis-points value (0% to 100%).
pub fn validate_bps(field: &str, bps: u32) -> ValidationResult<()> {
    if bps > FULL_SHARE_BPS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: FULL_SHARE_BPS as i64,
        });
    }
    Ok(())
}

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates an entity identifier (employee, order, payment, location).
///
/// Ids come from the calling POS and are opaque strings here, so the rules
/// are deliberately loose: non-empty after trimming, bounded length.
pub fn validate_entity_id(field: &str, id: &str) -> ValidationResult<()> {
    let id = id.trim();

    if id.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if id.len() > MAX_ID_LEN {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_ID_LEN,
        });
    }

    Ok(())
}

/// Validates a ledger entry memo.
///
/// Empty memos are fine; over-long ones are rejected rather than truncated
/// (silent truncation would make audit text lie).
pub fn validate_memo(memo: &str) -> ValidationResult<()> {
    if memo.len() > MAX_MEMO_LEN {
        return Err(ValidationError::TooLong {
            field: "memo".to_string(),
            max: MAX_MEMO_LEN,
        });
    }
    Ok(())
}

// =============================================================================
// Composite Validators
// =============================================================================

/// Validates an ownership share set: every owner present, every share
/// positive, the total exactly 100%.
///
/// ## Example
/// ```rust
/// use tiprail_core::validation::validate_share_set;
///
/// let good = vec![("alice".to_string(), 6000), ("bob".to_string(), 4000)];
/// assert!(validate_share_set(&good).is_ok());
///
/// let short = vec![("alice".to_string(), 6000)];
/// assert!(validate_share_set(&short).is_err());
/// ```
pub fn validate_share_set(shares: &[(String, u32)]) -> CoreResult<()> {
    if shares.is_empty() {
        return Err(ValidationError::Required {
            field: "ownership shares".to_string(),
        }
        .into());
    }

    for (employee_id, bps) in shares {
        validate_entity_id("employee_id", employee_id)?;
        if *bps == 0 {
            return Err(ValidationError::InvalidFormat {
                field: "ownership shares".to_string(),
                reason: format!("{employee_id} has a zero share"),
            }
            .into());
        }
    }

    let total_bps: u64 = shares.iter().map(|(_, bps)| *bps as u64).sum();
    if total_bps != FULL_SHARE_BPS as u64 {
        return Err(CoreError::InvalidShareTotal { total_bps });
    }

    Ok(())
}

/// Validates the two parties of a transfer.
pub fn validate_transfer_parties(from_id: &str, to_id: &str) -> CoreResult<()> {
    validate_entity_id("from employee", from_id)?;
    validate_entity_id("to employee", to_id)?;

    if from_id == to_id {
        return Err(CoreError::SelfTransfer(from_id.to_string()));
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_amount_cents() {
        assert!(validate_amount_cents(1).is_ok());
        assert!(validate_amount_cents(100_000).is_ok());

        assert!(validate_amount_cents(0).is_err());
        assert!(validate_amount_cents(-1).is_err());
    }

    #[test]
    fn test_validate_entity_id() {
        assert!(validate_entity_id("employee_id", "alice").is_ok());
        assert!(validate_entity_id("employee_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());

        assert!(validate_entity_id("employee_id", "").is_err());
        assert!(validate_entity_id("employee_id", "   ").is_err());
        assert!(validate_entity_id("employee_id", &"x".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_memo() {
        assert!(validate_memo("").is_ok());
        assert!(validate_memo("Tip on order 42").is_ok());
        assert!(validate_memo(&"m".repeat(501)).is_err());
    }

    #[test]
    fn test_validate_bps() {
        assert!(validate_bps("refund", 0).is_ok());
        assert!(validate_bps("refund", 10_000).is_ok());
        assert!(validate_bps("refund", 10_001).is_err());
    }

    #[test]
    fn test_validate_share_set() {
        let good = vec![("alice".to_string(), 6000), ("bob".to_string(), 4000)];
        assert!(validate_share_set(&good).is_ok());

        let empty: Vec<(String, u32)> = vec![];
        assert!(validate_share_set(&empty).is_err());

        let zero = vec![("alice".to_string(), 10_000), ("bob".to_string(), 0)];
        assert!(validate_share_set(&zero).is_err());

        let over = vec![("alice".to_string(), 6000), ("bob".to_string(), 5000)];
        assert!(matches!(
            validate_share_set(&over),
            Err(CoreError::InvalidShareTotal { total_bps: 11000 })
        ));
    }

    #[test]
    fn test_validate_transfer_parties() {
        assert!(validate_transfer_parties("alice", "bob").is_ok());
        assert!(matches!(
            validate_transfer_parties("alice", "alice"),
            Err(CoreError::SelfTransfer(_))
        ));
        assert!(validate_transfer_parties("", "bob").is_err());
    }
}
