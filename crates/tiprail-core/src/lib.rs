//! # tiprail-core: Pure Business Logic for the TipRail Engine
//!
//! This crate is the **heart** of the tip ledger. It contains all business
//! logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        TipRail Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Order / Payment System (the caller)                │   │
//! │  │   pay order ──► allocate tips ──► void ──► reverse ──► payout  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                tiprail-engine (services)                        │   │
//! │  │    TipAllocator, ChargebackService, PayoutService, ...         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tiprail-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   split   │  │compliance │  │   │
//! │  │   │LedgerEntry│  │   Money   │  │  equal/   │  │ advisory  │  │   │
//! │  │   │  TipDebt  │  │ cents i64 │  │ weighted  │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                   tiprail-db (Database Layer)                   │   │
//! │  │            SQLite queries, migrations, repositories             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (LedgerEntry, TipDebt, TipGroupSegment, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`split`] - Deterministic equal/weighted/ownership splits
//! - [`keys`] - Idempotency key derivation
//! - [`compliance`] - Advisory IRS-style checks
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use tiprail_core::split::split_equal;
//! use tiprail_core::types::GroupMember;
//!
//! // $12.00 across a two-person equal-split group
//! let members = vec![GroupMember::new("alice", 1), GroupMember::new("dave", 1)];
//! let shares = split_equal(1200, &members);
//!
//! assert_eq!(shares[0].cents, 600);
//! assert_eq!(shares[1].cents, 600);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod compliance;
pub mod error;
pub mod keys;
pub mod money;
pub mod split;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use tiprail_core::Money` instead of
// `use tiprail_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, FULL_SHARE_BPS};
pub use split::{split_by_ownership, split_equal, split_weighted, SplitShare};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default location ID for single-location deployments.
///
/// ## Why a constant?
/// v0.1 runs one operational location, but every table carries location_id
/// for future multi-location rollout. This constant is used by callers that
/// have not wired location resolution yet.
pub const DEFAULT_LOCATION_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Default declared-cash minimum as a fraction of shift sales.
///
/// ## Business Reason
/// 800 bps = 8%, the IRS allocated-tips convention. Locations can override
/// it per `LocationSettings`.
pub const DEFAULT_DECLARATION_MINIMUM_BPS: u32 = 800;

/// Maximum length of a ledger entry memo.
///
/// ## Business Reason
/// Memos show up in tip-history UIs and exports; unbounded text there is a
/// formatting and storage hazard.
pub const MAX_MEMO_LEN: usize = 500;

/// Maximum length of any entity identifier we accept from the caller.
pub const MAX_ID_LEN: usize = 64;
