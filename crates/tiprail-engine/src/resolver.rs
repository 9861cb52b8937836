//! # Ownership Resolution
//!
//! Answers "whose tip is this?" for a payment.
//!
//! ## Resolution Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  resolve(payment)                                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Current ownership shares for the order?                               │
//! │       │                                                                 │
//! │       ├── yes ──► use them (they sum to 10000 bps by construction)     │
//! │       │                                                                 │
//! │       └── no ───► primary employee on the payment, 100%                │
//! │                                                                         │
//! │  The common case is the fallback: most orders are never reassigned    │
//! │  and carry no share records at all.                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The trait exists so a calling system with its own ownership model (seat
//! assignments, table hand-off history) can plug it in without touching
//! the allocation pipeline.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use crate::error::EngineResult;
use tiprail_core::{TipPayment, FULL_SHARE_BPS};
use tiprail_db::Database;

/// Resolves a payment to the set of employees who own its tip, with their
/// shares in basis points. A returned set always sums to 10000 bps.
#[async_trait]
pub trait OwnershipResolver: Send + Sync {
    async fn resolve(&self, payment: &TipPayment) -> EngineResult<Vec<(String, u32)>>;
}

/// The default resolver: stored ownership shares, falling back to the
/// payment's primary employee at 100%.
#[derive(Debug, Clone)]
pub struct DbOwnershipResolver {
    db: Database,
}

impl DbOwnershipResolver {
    pub fn new(db: Database) -> Self {
        DbOwnershipResolver { db }
    }
}

#[async_trait]
impl OwnershipResolver for DbOwnershipResolver {
    async fn resolve(&self, payment: &TipPayment) -> EngineResult<Vec<(String, u32)>> {
        let shares = self
            .db
            .ownership()
            .current_shares(self.db.pool(), &payment.order_id)
            .await?;

        if shares.is_empty() {
            debug!(
                order_id = %payment.order_id,
                employee_id = %payment.primary_employee_id,
                "No ownership shares, falling back to primary employee"
            );
            return Ok(vec![(payment.primary_employee_id.clone(), FULL_SHARE_BPS)]);
        }

        Ok(shares
            .into_iter()
            .map(|s| (s.employee_id, s.share_bps))
            .collect())
    }
}

/// Tip weights by employee for role-weighted group splits.
///
/// Weights come from the staffing system (role seniority, hours on the
/// floor); the engine only consumes them when a member joins a
/// role-weighted group without an explicit weight.
#[async_trait]
pub trait RoleWeights: Send + Sync {
    async fn tip_weight(&self, employee_id: &str) -> EngineResult<i64>;
}

/// Fixed weight table, default weight 1. Enough for single-venue
/// deployments and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticRoleWeights {
    weights: HashMap<String, i64>,
}

impl StaticRoleWeights {
    pub fn new(weights: HashMap<String, i64>) -> Self {
        StaticRoleWeights { weights }
    }
}

#[async_trait]
impl RoleWeights for StaticRoleWeights {
    async fn tip_weight(&self, employee_id: &str) -> EngineResult<i64> {
        Ok(self.weights.get(employee_id).copied().unwrap_or(1))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tiprail_core::{TipTransactionKind, DEFAULT_LOCATION_ID as LOC};
    use tiprail_db::DbConfig;

    fn payment(order: &str) -> TipPayment {
        TipPayment {
            order_id: order.to_string(),
            payment_id: "p1".to_string(),
            location_id: LOC.to_string(),
            primary_employee_id: "alice".to_string(),
            tip_cents: 1000,
            kind: TipTransactionKind::Tip,
            paid_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_fallback_to_primary_employee() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let resolver = DbOwnershipResolver::new(db);

        let owners = resolver.resolve(&payment("o1")).await.unwrap();
        assert_eq!(owners, vec![("alice".to_string(), FULL_SHARE_BPS)]);
    }

    #[tokio::test]
    async fn test_stored_shares_win_over_primary() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.ownership()
            .assign(
                "o1",
                None,
                &[("bob".to_string(), 6000), ("carol".to_string(), 4000)],
            )
            .await
            .unwrap();

        let resolver = DbOwnershipResolver::new(db);
        let owners = resolver.resolve(&payment("o1")).await.unwrap();

        assert_eq!(owners.len(), 2);
        assert!(owners.contains(&("bob".to_string(), 6000)));
        assert!(!owners.iter().any(|(e, _)| e == "alice"));
    }

    #[tokio::test]
    async fn test_static_role_weights() {
        let weights = StaticRoleWeights::new(HashMap::from([("lead".to_string(), 3)]));
        assert_eq!(weights.tip_weight("lead").await.unwrap(), 3);
        assert_eq!(weights.tip_weight("unknown").await.unwrap(), 1);
    }
}
