//! # tiprail-db: Database Layer for the TipRail Engine
//!
//! This crate provides database access for the TipRail tip ledger.
//! It uses SQLite for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        TipRail Data Flow                                │
//! │                                                                         │
//! │  Engine service (allocate_tips_for_payment)                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    tiprail-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ (ledger.rs…)  │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ SqlitePool    │    │ LedgerRepo    │    │ 001_init.sql │  │   │
//! │  │   │ Connection    │◄───│ GroupRepo     │    │ ...          │  │   │
//! │  │   │ Management    │    │ TipDebtRepo   │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database (one file per deployment, or :memory: in tests)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (ledger, groups, debts, ...)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tiprail_db::{Database, DbConfig};
//!
//! let config = DbConfig::new("path/to/tiprail.db");
//! let db = Database::new(config).await?;
//!
//! // Posting joins the caller's transaction
//! let mut tx = db.pool().begin().await?;
//! let outcome = db.ledger().post(&mut tx, entry).await?;
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::{
    BalanceDrift, DeclarationRepository, GroupRepository, LedgerFilter, LedgerRepository,
    NewDeclaration, OwnershipRepository, PostOutcome, ReversalRecord, SettingsRepository,
    TipDebtRepository, TipTransactionRepository,
};
