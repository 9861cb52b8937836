//! # tiprail-engine: Business Operations for the TipRail Ledger
//!
//! Composes the pure math in `tiprail-core` and the repositories in
//! `tiprail-db` into the atomic operations callers invoke.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              Order / Payment System (the caller)                        │
//! │   pay ──► allocate   void ──► reverse   shift close ──► compliance     │
//! └──────────────────────────────┬──────────────────────────────────────────┘
//! │                              │                                          │
//! │  ┌───────────────────────────▼──────────────────────────────────────┐  │
//! │  │                 tiprail-engine (THIS CRATE)                      │  │
//! │  │                                                                  │  │
//! │  │  TipAllocator        one payment → conserved set of credits     │  │
//! │  │  ChargebackService   void/refund → debits + debt                │  │
//! │  │  PayoutService       cash out, payroll sweep, transfers         │  │
//! │  │  GroupService        segment-based membership transitions       │  │
//! │  │  ComplianceService   advisory warnings, never blocking          │  │
//! │  │  IntegrityChecker    cross-table diagnostics + drift repair     │  │
//! │  └───────────────────────────┬──────────────────────────────────────┘  │
//! │                              │                                          │
//! │                    tiprail-db / tiprail-core                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use tiprail_db::{Database, DbConfig};
//! use tiprail_engine::TipEngine;
//!
//! let db = Database::new(DbConfig::new("./tiprail.db")).await?;
//! let engine = TipEngine::new(db);
//!
//! let outcome = engine.allocator().allocate_tips_for_payment(&payment).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod allocation;
pub mod chargeback;
pub mod compliance;
pub mod error;
pub mod groups;
pub mod integrity;
pub mod payout;
pub mod resolver;

// =============================================================================
// Re-exports
// =============================================================================

pub use allocation::{AllocationOutcome, AllocationStatus, TipAllocator};
pub use chargeback::{ChargebackService, ReversalOutcome, ReversalRequest, ReversalStatus};
pub use compliance::ComplianceService;
pub use error::{EngineError, EngineResult};
pub use groups::GroupService;
pub use integrity::{IntegrityChecker, IntegrityReport};
pub use payout::{
    CashOutOutcome, PairedOutcome, PayoutService, PayrollBatchOutcome, PayrollFailure, PayrollLine,
};
pub use resolver::{DbOwnershipResolver, OwnershipResolver, RoleWeights, StaticRoleWeights};

use std::sync::Arc;
use tiprail_db::Database;

/// Convenience facade bundling every service over one database handle.
///
/// Deployments that need a custom [`OwnershipResolver`] or [`RoleWeights`]
/// source construct the services directly instead.
pub struct TipEngine {
    db: Database,
    resolver: Arc<dyn OwnershipResolver>,
    weights: Arc<dyn RoleWeights>,
}

impl TipEngine {
    /// Builds an engine with the default resolver (stored shares, primary
    /// employee fallback) and uniform role weights.
    pub fn new(db: Database) -> Self {
        let resolver = Arc::new(DbOwnershipResolver::new(db.clone()));
        let weights = Arc::new(StaticRoleWeights::default());
        TipEngine {
            db,
            resolver,
            weights,
        }
    }

    /// Builds an engine with caller-supplied ownership and weight sources.
    pub fn with_sources(
        db: Database,
        resolver: Arc<dyn OwnershipResolver>,
        weights: Arc<dyn RoleWeights>,
    ) -> Self {
        TipEngine {
            db,
            resolver,
            weights,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn allocator(&self) -> TipAllocator {
        TipAllocator::new(self.db.clone(), self.resolver.clone())
    }

    pub fn chargebacks(&self) -> ChargebackService {
        ChargebackService::new(self.db.clone())
    }

    pub fn payouts(&self) -> PayoutService {
        PayoutService::new(self.db.clone())
    }

    pub fn groups(&self) -> GroupService {
        GroupService::new(self.db.clone(), self.weights.clone())
    }

    pub fn compliance(&self) -> ComplianceService {
        ComplianceService::new(self.db.clone())
    }

    pub fn integrity(&self) -> IntegrityChecker {
        IntegrityChecker::new(self.db.clone())
    }
}
