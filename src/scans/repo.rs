use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::matcher::SafetyVerdict;

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_COMPLETE: &str = "complete";
pub const STATUS_FAILED: &str = "failed";

pub const PLACEHOLDER_FOOD_NAME: &str = "Analyzing...";
pub const PLACEHOLDER_REASON: &str = "Analysis in progress";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FoodScan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub food_name: String,
    pub image_key: String,
    pub ingredients: Vec<String>,
    pub is_safe: Option<bool>,
    pub safety_reason: String,
    pub unsafe_reasons: Vec<String>,
    pub description: String,
    pub status: String,
    pub scanned_at: OffsetDateTime,
}

/// Result of an analysis, ready to be written onto a scan row.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub food_name: String,
    pub ingredients: Vec<String>,
    pub verdict: SafetyVerdict,
    pub description: String,
    pub status: &'static str,
}

#[derive(Debug, Clone, Default, FromRow)]
pub struct ScanCounts {
    pub total: i64,
    pub safe_count: i64,
    pub unsafe_count: i64,
    pub caution_count: i64,
    pub pending_count: i64,
    pub this_month: i64,
}

const SCAN_COLUMNS: &str = "id, user_id, food_name, image_key, ingredients, is_safe, \
     safety_reason, unsafe_reasons, description, status, scanned_at";

impl FoodScan {
    pub async fn insert_pending(
        db: &PgPool,
        id: Uuid,
        user_id: Uuid,
        image_key: &str,
    ) -> anyhow::Result<FoodScan> {
        let row = sqlx::query_as::<_, FoodScan>(&format!(
            r#"
            INSERT INTO food_scans (id, user_id, food_name, image_key, safety_reason, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {SCAN_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(PLACEHOLDER_FOOD_NAME)
        .bind(image_key)
        .bind(PLACEHOLDER_REASON)
        .bind(STATUS_PENDING)
        .fetch_one(db)
        .await
        .context("insert pending scan")?;
        Ok(row)
    }

    pub async fn insert_complete(
        db: &PgPool,
        id: Uuid,
        user_id: Uuid,
        image_key: &str,
        outcome: &ScanOutcome,
    ) -> anyhow::Result<FoodScan> {
        let row = sqlx::query_as::<_, FoodScan>(&format!(
            r#"
            INSERT INTO food_scans (id, user_id, food_name, image_key, ingredients, is_safe,
                                    safety_reason, unsafe_reasons, description, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {SCAN_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(&outcome.food_name)
        .bind(image_key)
        .bind(&outcome.ingredients)
        .bind(outcome.verdict.is_safe)
        .bind(&outcome.verdict.safety_reason)
        .bind(&outcome.verdict.unsafe_reasons)
        .bind(&outcome.description)
        .bind(outcome.status)
        .fetch_one(db)
        .await
        .context("insert complete scan")?;
        Ok(row)
    }

    /// Writes the analysis onto a pending scan. `false` when the scan was
    /// deleted meanwhile.
    pub async fn apply_outcome(db: &PgPool, id: Uuid, outcome: &ScanOutcome) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE food_scans
               SET food_name = $2, ingredients = $3, is_safe = $4, safety_reason = $5,
                   unsafe_reasons = $6, description = $7, status = $8
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&outcome.food_name)
        .bind(&outcome.ingredients)
        .bind(outcome.verdict.is_safe)
        .bind(&outcome.verdict.safety_reason)
        .bind(&outcome.verdict.unsafe_reasons)
        .bind(&outcome.description)
        .bind(outcome.status)
        .execute(db)
        .await
        .context("update scan outcome")?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn list_by_user(
        db: &PgPool,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<FoodScan>> {
        let rows = sqlx::query_as::<_, FoodScan>(&format!(
            r#"
            SELECT {SCAN_COLUMNS}
              FROM food_scans
             WHERE user_id = $1
             ORDER BY scanned_at DESC
             LIMIT $2 OFFSET $3
            "#
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
        .context("list scans")?;
        Ok(rows)
    }

    pub async fn get(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<FoodScan>> {
        let row = sqlx::query_as::<_, FoodScan>(&format!(
            "SELECT {SCAN_COLUMNS} FROM food_scans WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await
        .context("get scan")?;
        Ok(row)
    }

    /// Returns the image key of the deleted scan.
    pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<String>> {
        let key = sqlx::query_scalar::<_, String>(
            "DELETE FROM food_scans WHERE id = $1 AND user_id = $2 RETURNING image_key",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await
        .context("delete scan")?;
        Ok(key)
    }

    pub async fn image_keys_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<String>> {
        let keys = sqlx::query_scalar::<_, String>(
            "SELECT image_key FROM food_scans WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(db)
        .await
        .context("list scan image keys")?;
        Ok(keys)
    }

    pub async fn counts(
        db: &PgPool,
        user_id: Uuid,
        month_start: OffsetDateTime,
    ) -> anyhow::Result<ScanCounts> {
        let row = sqlx::query_as::<_, ScanCounts>(
            r#"
            SELECT COUNT(*)                                                    AS total,
                   COUNT(*) FILTER (WHERE is_safe = TRUE)                      AS safe_count,
                   COUNT(*) FILTER (WHERE is_safe = FALSE)                     AS unsafe_count,
                   COUNT(*) FILTER (WHERE is_safe IS NULL AND status <> 'pending') AS caution_count,
                   COUNT(*) FILTER (WHERE status = 'pending')                  AS pending_count,
                   COUNT(*) FILTER (WHERE scanned_at >= $2)                    AS this_month
              FROM food_scans
             WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(month_start)
        .fetch_one(db)
        .await
        .context("scan counts")?;
        Ok(row)
    }
}
