//! Database operations for the `sync_logs` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `sync_logs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SyncLogRow {
    pub id: i64,
    pub merchant_id: i64,
    /// `IN_PROGRESS`, `SUCCESS`, `PARTIAL_SUCCESS`, or `FAILED`.
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub records_processed: i32,
    pub records_failed: i32,
    pub notes: Option<String>,
}

/// Opens a sync log entry in `IN_PROGRESS` and returns its id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn start_sync_log(pool: &PgPool, merchant_id: i64, notes: &str) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO sync_logs (merchant_id, status, started_at, notes) \
         VALUES ($1, 'IN_PROGRESS', NOW(), $2) \
         RETURNING id",
    )
    .bind(merchant_id)
    .bind(notes)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Closes a sync log entry with its final status and counts.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn finish_sync_log(
    pool: &PgPool,
    id: i64,
    status: &str,
    records_processed: i32,
    records_failed: i32,
    notes: &str,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE sync_logs \
         SET status = $2, finished_at = NOW(), records_processed = $3, \
             records_failed = $4, notes = $5 \
         WHERE id = $1",
    )
    .bind(id)
    .bind(status)
    .bind(records_processed)
    .bind(records_failed)
    .bind(notes)
    .execute(pool)
    .await?;

    Ok(())
}

/// Returns the most recent sync logs for a merchant.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_sync_logs(
    pool: &PgPool,
    merchant_id: i64,
    limit: i64,
) -> Result<Vec<SyncLogRow>, DbError> {
    let rows = sqlx::query_as::<_, SyncLogRow>(
        "SELECT id, merchant_id, status, started_at, finished_at, \
                records_processed, records_failed, notes \
         FROM sync_logs \
         WHERE merchant_id = $1 \
         ORDER BY started_at DESC, id DESC \
         LIMIT $2",
    )
    .bind(merchant_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
