// Database queries for manual override records

use crate::domain::overrides::{ManualOverride, OverrideStatistics};
use crate::errors::Result;
use sqlx::{FromRow, PgPool};

/// Persist a manual override record. Immutable once written.
pub async fn insert(pool: &PgPool, record: &ManualOverride) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO manual_overrides (
            id, project_id, action, reason, notes,
            previous_status, new_status, previous_caps, new_caps,
            performed_by, performed_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(record.id)
    .bind(record.project_id)
    .bind(&record.action)
    .bind(&record.reason)
    .bind(&record.notes)
    .bind(&record.previous_status)
    .bind(&record.new_status)
    .bind(&record.previous_caps)
    .bind(&record.new_caps)
    .bind(record.performed_by)
    .bind(record.performed_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Page through override history, newest first
pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<ManualOverride>> {
    let records = sqlx::query_as::<_, ManualOverride>(
        r#"
        SELECT id, project_id, action, reason, notes,
               previous_status, new_status, previous_caps, new_caps,
               performed_by, performed_at
        FROM manual_overrides
        ORDER BY performed_at DESC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(records)
}

#[derive(Debug, FromRow)]
struct StatisticsRow {
    total: i64,
    suspends: i64,
    unsuspends: i64,
    cap_adjustments: i64,
    last_24h: i64,
    last_7d: i64,
}

/// Aggregate counts across the whole override history
pub async fn statistics(pool: &PgPool) -> Result<OverrideStatistics> {
    let row = sqlx::query_as::<_, StatisticsRow>(
        r#"
        SELECT
            COUNT(*) AS total,
            COUNT(*) FILTER (WHERE action = 'suspend') AS suspends,
            COUNT(*) FILTER (WHERE action = 'unsuspend') AS unsuspends,
            COUNT(*) FILTER (WHERE action = 'adjust_caps') AS cap_adjustments,
            COUNT(*) FILTER (WHERE performed_at >= NOW() - interval '24 hours') AS last_24h,
            COUNT(*) FILTER (WHERE performed_at >= NOW() - interval '7 days') AS last_7d
        FROM manual_overrides
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(OverrideStatistics {
        total: row.total,
        suspends: row.suspends,
        unsuspends: row.unsuspends,
        cap_adjustments: row.cap_adjustments,
        last_24h: row.last_24h,
        last_7d: row.last_7d,
    })
}
