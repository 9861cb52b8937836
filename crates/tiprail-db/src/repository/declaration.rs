//! # Cash Declaration Repository
//!
//! Declared cash tips per shift. Append-only like the ledger: a
//! re-declaration adds a row and the newest row is the shift's current
//! declaration, so the correction history survives for audits.
//!
//! Declarations never post ledger entries; they feed compliance checks
//! and reporting only.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tiprail_core::{validation, CashTipDeclaration, DeclarationSource, ValidationError};

const DECLARATION_COLUMNS: &str =
    "id, employee_id, shift_id, location_id, amount_cents, source, override_reason, declared_at";

/// Input for recording a declaration.
#[derive(Debug, Clone)]
pub struct NewDeclaration {
    pub employee_id: String,
    pub shift_id: String,
    pub location_id: String,
    /// Zero is a valid declaration ("no cash tips this shift").
    pub amount_cents: i64,
    pub source: DeclarationSource,
    pub override_reason: Option<String>,
}

/// Repository for cash tip declarations.
#[derive(Debug, Clone)]
pub struct DeclarationRepository {
    pool: SqlitePool,
}

impl DeclarationRepository {
    /// Creates a new DeclarationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        DeclarationRepository { pool }
    }

    /// Records a declaration. Manager overrides must carry a reason.
    pub async fn declare(&self, new: NewDeclaration) -> DbResult<CashTipDeclaration> {
        validation::validate_entity_id("employee_id", &new.employee_id)?;
        validation::validate_entity_id("shift_id", &new.shift_id)?;
        validation::validate_entity_id("location_id", &new.location_id)?;

        if new.amount_cents < 0 {
            return Err(DbError::from(ValidationError::OutOfRange {
                field: "amount_cents".to_string(),
                min: 0,
                max: i64::MAX,
            }));
        }
        if new.source == DeclarationSource::ManagerOverride
            && new.override_reason.as_deref().map_or(true, |r| r.trim().is_empty())
        {
            return Err(DbError::from(ValidationError::Required {
                field: "override_reason".to_string(),
            }));
        }

        let declaration = CashTipDeclaration {
            id: Uuid::new_v4().to_string(),
            employee_id: new.employee_id,
            shift_id: new.shift_id,
            location_id: new.location_id,
            amount_cents: new.amount_cents,
            source: new.source,
            override_reason: new.override_reason,
            declared_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO cash_tip_declarations (
                id, employee_id, shift_id, location_id, amount_cents,
                source, override_reason, declared_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&declaration.id)
        .bind(&declaration.employee_id)
        .bind(&declaration.shift_id)
        .bind(&declaration.location_id)
        .bind(declaration.amount_cents)
        .bind(declaration.source)
        .bind(&declaration.override_reason)
        .bind(declaration.declared_at)
        .execute(&self.pool)
        .await?;

        info!(
            employee_id = %declaration.employee_id,
            shift_id = %declaration.shift_id,
            amount = %declaration.amount_cents,
            source = ?declaration.source,
            "Recorded cash tip declaration"
        );

        Ok(declaration)
    }

    /// The newest declaration for one employee's shift, if any. This is
    /// the amount compliance checks use.
    pub async fn current_for_shift(
        &self,
        employee_id: &str,
        shift_id: &str,
    ) -> DbResult<Option<CashTipDeclaration>> {
        let declaration = sqlx::query_as::<_, CashTipDeclaration>(&format!(
            "SELECT {DECLARATION_COLUMNS} FROM cash_tip_declarations \
             WHERE employee_id = ?1 AND shift_id = ?2 \
             ORDER BY declared_at DESC, id DESC LIMIT 1"
        ))
        .bind(employee_id)
        .bind(shift_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(declaration)
    }

    /// Full declaration history for one employee's shift, oldest first.
    pub async fn history_for_shift(
        &self,
        employee_id: &str,
        shift_id: &str,
    ) -> DbResult<Vec<CashTipDeclaration>> {
        let declarations = sqlx::query_as::<_, CashTipDeclaration>(&format!(
            "SELECT {DECLARATION_COLUMNS} FROM cash_tip_declarations \
             WHERE employee_id = ?1 AND shift_id = ?2 \
             ORDER BY declared_at ASC, id ASC"
        ))
        .bind(employee_id)
        .bind(shift_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(declarations)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use tiprail_core::DEFAULT_LOCATION_ID as LOC;

    fn declaration(cents: i64, source: DeclarationSource, reason: Option<&str>) -> NewDeclaration {
        NewDeclaration {
            employee_id: "alice".to_string(),
            shift_id: "shift-1".to_string(),
            location_id: LOC.to_string(),
            amount_cents: cents,
            source,
            override_reason: reason.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_declare_and_read_current() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.declarations();

        repo.declare(declaration(2500, DeclarationSource::Employee, None))
            .await
            .unwrap();

        let current = repo.current_for_shift("alice", "shift-1").await.unwrap().unwrap();
        assert_eq!(current.amount_cents, 2500);
    }

    #[tokio::test]
    async fn test_redeclaration_newest_wins() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.declarations();

        repo.declare(declaration(2500, DeclarationSource::Employee, None))
            .await
            .unwrap();
        repo.declare(declaration(3000, DeclarationSource::ManagerOverride, Some("till recount")))
            .await
            .unwrap();

        let current = repo.current_for_shift("alice", "shift-1").await.unwrap().unwrap();
        assert_eq!(current.amount_cents, 3000);
        assert_eq!(current.source, DeclarationSource::ManagerOverride);

        // Both rows survive for audit
        let history = repo.history_for_shift("alice", "shift-1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].amount_cents, 2500);
    }

    #[tokio::test]
    async fn test_zero_declaration_is_valid() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.declarations();

        assert!(repo
            .declare(declaration(0, DeclarationSource::Employee, None))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_override_requires_reason() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.declarations();

        assert!(repo
            .declare(declaration(1000, DeclarationSource::ManagerOverride, None))
            .await
            .is_err());
        assert!(repo
            .declare(declaration(1000, DeclarationSource::ManagerOverride, Some("  ")))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_negative_declaration_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db
            .declarations()
            .declare(declaration(-5, DeclarationSource::Employee, None))
            .await
            .is_err());
    }
}
