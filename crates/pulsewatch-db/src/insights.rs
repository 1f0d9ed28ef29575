//! Insight record persistence and the atomic watermark advance.

use chrono::{DateTime, Utc};
use pulsewatch_core::types::ConsolidatedInsight;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the append-only `insight_records` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InsightRecordRow {
    pub id: i64,
    pub public_id: Uuid,
    pub client_id: String,
    pub run_time: DateTime<Utc>,
    pub body: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

const INSIGHT_COLUMNS: &str = "id, public_id, client_id, run_time, body, created_at";

/// Stores a validated insight and advances the client's watermark, as one
/// transaction: either both become visible or neither does.
///
/// Idempotent with respect to re-delivery — committing the same
/// `(client_id, run_time)` again keeps the originally stored record and the
/// watermark never moves backwards (`GREATEST` on conflict).
///
/// # Errors
///
/// Returns [`DbError::Serialize`] if the insight body cannot be serialised,
/// or [`DbError::Sqlx`] if any statement or the commit fails. On error the
/// transaction rolls back and the watermark is untouched.
pub async fn commit_insight(
    pool: &PgPool,
    insight: &ConsolidatedInsight,
    watermark: DateTime<Utc>,
) -> Result<InsightRecordRow, DbError> {
    let body = serde_json::to_value(insight)?;

    let mut tx = pool.begin().await?;

    let inserted = sqlx::query_as::<_, InsightRecordRow>(&format!(
        "INSERT INTO insight_records (public_id, client_id, run_time, body) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (client_id, run_time) DO NOTHING \
         RETURNING {INSIGHT_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&insight.client_id)
    .bind(insight.run_time)
    .bind(&body)
    .fetch_optional(&mut *tx)
    .await?;

    let row = match inserted {
        Some(row) => row,
        // Re-delivery of an already-committed run: the stored record is
        // immutable, so return it as-is.
        None => {
            sqlx::query_as::<_, InsightRecordRow>(&format!(
                "SELECT {INSIGHT_COLUMNS} FROM insight_records \
                 WHERE client_id = $1 AND run_time = $2"
            ))
            .bind(&insight.client_id)
            .bind(insight.run_time)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NotFound)?
        }
    };

    sqlx::query(
        "INSERT INTO watermarks (client_id, last_sync_time) \
         VALUES ($1, $2) \
         ON CONFLICT (client_id) DO UPDATE SET \
             last_sync_time = GREATEST(watermarks.last_sync_time, EXCLUDED.last_sync_time), \
             updated_at = NOW()",
    )
    .bind(&insight.client_id)
    .bind(watermark)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(row)
}

/// Returns the most recent insight record for a client, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_latest_insight(
    pool: &PgPool,
    client_id: &str,
) -> Result<Option<InsightRecordRow>, DbError> {
    let row = sqlx::query_as::<_, InsightRecordRow>(&format!(
        "SELECT {INSIGHT_COLUMNS} FROM insight_records \
         WHERE client_id = $1 \
         ORDER BY run_time DESC \
         LIMIT 1"
    ))
    .bind(client_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
