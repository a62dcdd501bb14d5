use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub title: Option<String>,
    pub location: Option<String>,
    pub github: Option<String>,
    pub linkedin: Option<String>,
    pub created_at: DateTime<Utc>,
}
