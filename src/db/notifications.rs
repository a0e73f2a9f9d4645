// Read-side queries for notification preferences. The preference rows
// are owned by the platform's account settings surface.

use crate::errors::Result;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct NotificationPreference {
    pub developer_id: Uuid,
    pub notification_type: String,
    pub enabled: bool,
    /// Delivery channels, e.g. ["email", "slack"]
    pub channels: Vec<String>,
}

/// Preferences for a set of developers and one notification type.
/// Developers with no row default to enabled on the email channel.
pub async fn get_preferences(
    pool: &PgPool,
    developer_ids: &[Uuid],
    notification_type: &str,
) -> Result<Vec<NotificationPreference>> {
    if developer_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, NotificationPreference>(
        r#"
        SELECT developer_id, notification_type, enabled, channels
        FROM notification_preferences
        WHERE developer_id = ANY($1) AND notification_type = $2
        "#,
    )
    .bind(developer_ids)
    .bind(notification_type)
    .fetch_all(pool)
    .await?;

    let mut prefs = rows;
    for id in developer_ids {
        if !prefs.iter().any(|p| p.developer_id == *id) {
            prefs.push(NotificationPreference {
                developer_id: *id,
                notification_type: notification_type.to_string(),
                enabled: true,
                channels: vec!["email".to_string()],
            });
        }
    }

    Ok(prefs)
}
