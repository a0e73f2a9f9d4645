// Queries against the platform-owned projects table. This crate only
// reads service flags and flips them on suspension/resolution.

use crate::domain::project::{DataAccess, ProjectStatus};
use crate::errors::Result;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct ProjectFlags {
    pub id: Uuid,
    pub status: String,
    pub data_access: String,
}

pub async fn get_flags(pool: &PgPool, project_id: Uuid) -> Result<Option<ProjectFlags>> {
    let flags = sqlx::query_as::<_, ProjectFlags>(
        r#"SELECT id, status, data_access FROM projects WHERE id = $1"#,
    )
    .bind(project_id)
    .fetch_optional(pool)
    .await?;

    Ok(flags)
}

/// Flip a project to suspended/read_only. Conditional on it being
/// active; returns false when another actor already moved it.
pub async fn mark_suspended(pool: &PgPool, project_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE projects
        SET status = $2, data_access = $3
        WHERE id = $1 AND status = $4
        "#,
    )
    .bind(project_id)
    .bind(ProjectStatus::Suspended.as_str())
    .bind(DataAccess::ReadOnly.as_str())
    .bind(ProjectStatus::Active.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Restore a suspended project to active/full access. Conditional on it
/// being suspended.
pub async fn mark_active(pool: &PgPool, project_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE projects
        SET status = $2, data_access = $3
        WHERE id = $1 AND status = $4
        "#,
    )
    .bind(project_id)
    .bind(ProjectStatus::Active.as_str())
    .bind(DataAccess::Full.as_str())
    .bind(ProjectStatus::Suspended.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Developers attached to a project, for notification fan-out
pub async fn get_member_ids(pool: &PgPool, project_id: Uuid) -> Result<Vec<Uuid>> {
    let ids = sqlx::query_scalar::<_, Uuid>(
        r#"SELECT developer_id FROM project_members WHERE project_id = $1"#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}
