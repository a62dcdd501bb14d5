use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Portfolio site settings. One row per user; the row itself is the
/// "portfolio" counted against the plan limit.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PortfolioRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subdomain: Option<String>,
    pub theme: String,
    pub sections: Value,
    pub font: String,
    pub layout: String,
    pub profile_image: Option<String>,
    pub custom_logo: Option<String>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub template: String,
    pub data: Value,
    pub visible_sections: Value,
    pub color_scheme: Option<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
