//! # Location Settings Repository
//!
//! Per-location policy rows. A location with no stored row gets
//! [`LocationSettings::defaults`], so every read path sees a full policy
//! without null-handling.

use sqlx::{SqliteExecutor, SqlitePool};
use tracing::info;

use crate::error::DbResult;
use tiprail_core::LocationSettings;

/// Repository for location settings.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    /// Creates a new SettingsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    /// Settings for a location, falling back to defaults when no row
    /// exists.
    pub async fn get(
        &self,
        executor: impl SqliteExecutor<'_>,
        location_id: &str,
    ) -> DbResult<LocationSettings> {
        let settings = sqlx::query_as::<_, LocationSettings>(
            "SELECT location_id, tips_enabled, allow_negative_balance, \
             declaration_minimum_bps, tip_out_cap_bps \
             FROM location_settings WHERE location_id = ?1",
        )
        .bind(location_id)
        .fetch_optional(executor)
        .await?;

        Ok(settings.unwrap_or_else(|| LocationSettings::defaults(location_id)))
    }

    /// Inserts or replaces a location's settings row.
    pub async fn upsert(&self, settings: &LocationSettings) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO location_settings (
                location_id, tips_enabled, allow_negative_balance,
                declaration_minimum_bps, tip_out_cap_bps
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (location_id) DO UPDATE SET
                tips_enabled = ?2,
                allow_negative_balance = ?3,
                declaration_minimum_bps = ?4,
                tip_out_cap_bps = ?5
            "#,
        )
        .bind(&settings.location_id)
        .bind(settings.tips_enabled)
        .bind(settings.allow_negative_balance)
        .bind(settings.declaration_minimum_bps)
        .bind(settings.tip_out_cap_bps)
        .execute(&self.pool)
        .await?;

        info!(
            location_id = %settings.location_id,
            tips_enabled = %settings.tips_enabled,
            "Updated location settings"
        );

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_missing_row_yields_defaults() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let settings = db.settings().get(db.pool(), "loc-1").await.unwrap();

        assert!(settings.tips_enabled);
        assert!(!settings.allow_negative_balance);
        assert_eq!(settings.declaration_minimum_bps, 800);
        assert!(settings.tip_out_cap_bps.is_none());
    }

    #[tokio::test]
    async fn test_upsert_roundtrip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.settings();

        let mut settings = LocationSettings::defaults("loc-1");
        settings.tips_enabled = false;
        settings.tip_out_cap_bps = Some(2500);
        repo.upsert(&settings).await.unwrap();

        let read = repo.get(db.pool(), "loc-1").await.unwrap();
        assert!(!read.tips_enabled);
        assert_eq!(read.tip_out_cap_bps, Some(2500));

        // Second upsert overwrites
        settings.tips_enabled = true;
        repo.upsert(&settings).await.unwrap();
        assert!(repo.get(db.pool(), "loc-1").await.unwrap().tips_enabled);
    }
}
