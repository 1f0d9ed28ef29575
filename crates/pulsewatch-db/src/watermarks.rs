//! Watermark reads.
//!
//! The watermark is only ever written inside [`crate::insights::commit_insight`]'s
//! transaction, so there is no public write operation here.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// Returns the client's watermark, or `None` if it has never been analyzed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_watermark(
    pool: &PgPool,
    client_id: &str,
) -> Result<Option<DateTime<Utc>>, DbError> {
    let watermark = sqlx::query_scalar::<_, DateTime<Utc>>(
        "SELECT last_sync_time FROM watermarks WHERE client_id = $1",
    )
    .bind(client_id)
    .fetch_optional(pool)
    .await?;

    Ok(watermark)
}
