//! # Error Types
//!
//! Domain-specific error types for tiprail-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tiprail-core errors (this file)                                       │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tiprail-db errors (separate crate)                                    │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  tiprail-engine errors (separate crate)                                │
//! │  └── EngineError      - Orchestration failures (wraps the above)       │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (employee id, cents, etc.)
//! 3. Errors are enum variants, never String
//! 4. Business rejections are values, never exceptions-as-control-flow:
//!    a capped chargeback or a disabled feature flag is a *success* with
//!    recorded follow-up state, not an error

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// Every variant is a rejection **before any write**: nothing partial ever
/// hits the ledger when one of these is returned.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Ledger amounts are positive integers; zero and negatives are
    /// rejected at the door (the direction field carries the sign).
    #[error("Amount must be a positive number of cents, got {0}")]
    NonPositiveAmount(i64),

    /// An employee cannot transfer tips to themselves.
    #[error("Employee {0} cannot transfer tips to themselves")]
    SelfTransfer(String),

    /// Ownership shares for an order must sum to exactly 100%.
    #[error("Ownership shares sum to {total_bps} bps, expected 10000")]
    InvalidShareTotal { total_bps: u64 },

    /// A split was requested against a group with no members.
    #[error("Tip group segment {segment_id} has no members")]
    EmptyGroup { segment_id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., a share set with a zero-bps owner).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
