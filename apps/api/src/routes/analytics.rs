use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::entitlement::evaluator::UsageCheck;
use crate::errors::AppError;
use crate::routes::subscriptions::UserIdQuery;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnalyticsEventRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub portfolio_id: Option<Uuid>,
    pub event_type: String,
    pub path: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// GET /api/v1/analytics
///
/// Portfolio traffic events, oldest first. Gated by the `analytics` plan
/// flag; free-tier callers get a 403 upgrade prompt.
pub async fn handle_list(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<AnalyticsEventRow>>, AppError> {
    state
        .gate
        .check(params.user_id, UsageCheck::Feature("analytics".to_string()))
        .await?;

    let events: Vec<AnalyticsEventRow> = sqlx::query_as(
        "SELECT * FROM analytics_events WHERE user_id = $1 ORDER BY created_at ASC",
    )
    .bind(params.user_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(events))
}

/// Records a public portfolio view. Failures are logged and swallowed so a
/// broken analytics write never breaks the public page.
pub async fn record_view(state: &AppState, user_id: Uuid, portfolio_id: Uuid, path: &str) {
    let result = sqlx::query(
        r#"
        INSERT INTO analytics_events (user_id, portfolio_id, event_type, path)
        VALUES ($1, $2, 'view', $3)
        "#,
    )
    .bind(user_id)
    .bind(portfolio_id)
    .bind(path)
    .execute(&state.db)
    .await;

    if let Err(e) = result {
        tracing::warn!("failed to record portfolio view: {e}");
    }
}
