//! # Engine Error Types
//!
//! Operation-level errors returned by the engine services.
//!
//! Most rejections are not errors here: a disabled feature flag, a zero
//! tip, or a replayed request all come back as successful outcomes with a
//! status the caller can branch on. Errors are reserved for inputs the
//! engine refuses to act on at all.

use thiserror::Error;
use tiprail_core::{CoreError, ValidationError};
use tiprail_db::DbError;

/// Errors from engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Database layer failure.
    #[error(transparent)]
    Db(#[from] DbError),

    /// Business rule rejection from the core layer.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A reversal was requested for a payment whose tips were never
    /// allocated.
    #[error("Payment {payment_id} on order {order_id} has no tip allocation to reverse")]
    NotAllocated {
        order_id: String,
        payment_id: String,
    },

    /// A payout or transfer asked for more than the employee holds.
    ///
    /// Payouts never overdraw: unlike chargebacks there is no debt
    /// mechanism behind them, the request is simply refused.
    #[error("Insufficient balance for {employee_id}: available {available_cents}, requested {requested_cents}")]
    InsufficientBalance {
        employee_id: String,
        available_cents: i64,
        requested_cents: i64,
    },
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Db(DbError::from(err))
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Core(CoreError::Validation(err))
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
