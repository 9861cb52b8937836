//! # Repository Modules
//!
//! Data access organized by aggregate.
//!
//! ## Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Repository Pattern                                 │
//! │                                                                         │
//! │  Service layer (tiprail-engine)                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Repository (this module) ← owns the SQL                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SqlitePool / caller's transaction                                     │
//! │                                                                         │
//! │  Write rules:                                                          │
//! │  • Multi-row invariants (ledger post + balance + debt reclaim)         │
//! │    take the CALLER's connection so they join its transaction           │
//! │  • Self-contained writes (ownership assign, segment start) open        │
//! │    their own transaction                                               │
//! │  • Single reads take any executor: pool outside a transaction,         │
//! │    the transaction connection inside one                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod debt;
pub mod declaration;
pub mod group;
pub mod ledger;
pub mod ownership;
pub mod settings;
pub mod transaction;

pub use debt::TipDebtRepository;
pub use declaration::{DeclarationRepository, NewDeclaration};
pub use group::GroupRepository;
pub use ledger::{BalanceDrift, LedgerFilter, LedgerRepository, PostOutcome};
pub use ownership::OwnershipRepository;
pub use settings::SettingsRepository;
pub use transaction::{ReversalRecord, TipTransactionRepository};
