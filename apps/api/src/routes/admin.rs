use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::catalog;
use crate::errors::AppError;
use crate::models::subscription::{GiftedAccessRow, SubscriptionRow, STATUS_TRIALING};
use crate::state::AppState;

/// Longest administrable trial, roughly ten years. An absurd day count is a
/// client bug and must come back as a 400, not overflow date arithmetic.
const MAX_GIFT_DAYS: i64 = 3650;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftAccessRequest {
    pub granted_by: Uuid,
    pub plan: String,
    pub days: i64,
    pub reason: Option<String>,
}

/// Validated trial length, narrowed to the i32 the audit table stores.
fn gift_days(days: i64) -> Result<i32, AppError> {
    if !(1..=MAX_GIFT_DAYS).contains(&days) {
        return Err(AppError::Validation(format!(
            "days must be between 1 and {MAX_GIFT_DAYS}"
        )));
    }
    Ok(days as i32)
}

/// POST /api/v1/admin/users/:id/gift-access
///
/// Administrative trial override. Unlike the billing-driven transitions,
/// this path resets all three usage counters so the recipient starts the
/// trial with a clean slate.
pub async fn handle_gift_access(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<GiftAccessRequest>,
) -> Result<Json<Value>, AppError> {
    let days = gift_days(req.days)?;

    let plan = catalog::get_plan(&state.db, &req.plan)
        .await?
        .ok_or_else(|| AppError::NotFound("Pricing plan not found".to_string()))?;

    let expires_at = Utc::now() + Duration::days(i64::from(days));

    let gifted: GiftedAccessRow = sqlx::query_as(
        r#"
        INSERT INTO gifted_access (user_id, granted_by, plan, days_granted, expires_at, reason)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(req.granted_by)
    .bind(&plan.name)
    .bind(days)
    .bind(expires_at)
    .bind(&req.reason)
    .fetch_one(&state.db)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO subscriptions
            (user_id, plan, status, trial_ends_at, trial_days_granted,
             ai_credits_limit, portfolios_limit, resumes_limit,
             ai_credits_used, portfolios_used, resumes_used)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, 0, 0)
        ON CONFLICT (user_id) DO UPDATE
        SET plan = EXCLUDED.plan,
            status = EXCLUDED.status,
            trial_ends_at = EXCLUDED.trial_ends_at,
            trial_days_granted = EXCLUDED.trial_days_granted,
            ai_credits_limit = EXCLUDED.ai_credits_limit,
            portfolios_limit = EXCLUDED.portfolios_limit,
            resumes_limit = EXCLUDED.resumes_limit,
            ai_credits_used = 0,
            portfolios_used = 0,
            resumes_used = 0,
            updated_at = now()
        "#,
    )
    .bind(user_id)
    .bind(&plan.name)
    .bind(STATUS_TRIALING)
    .bind(expires_at)
    .bind(days)
    .bind(plan.ai_credits_per_month)
    .bind(plan.portfolios_limit)
    .bind(plan.resumes_limit)
    .execute(&state.db)
    .await?;

    Ok(Json(json!({
        "message": "Access granted successfully",
        "giftedAccess": gifted,
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustCreditsRequest {
    pub ai_credits_used: Option<i32>,
    pub ai_credits_limit: Option<i32>,
}

/// Fields to write on a credits adjustment: the provided values, validated,
/// with omitted ones falling back to the current row.
fn merged_credits(
    current: &SubscriptionRow,
    req: &AdjustCreditsRequest,
) -> Result<(i32, i32), AppError> {
    let used = req.ai_credits_used.unwrap_or(current.ai_credits_used);
    let limit = req.ai_credits_limit.unwrap_or(current.ai_credits_limit);
    if used < 0 || limit < 0 {
        return Err(AppError::Validation(
            "credit values must not be negative".to_string(),
        ));
    }
    Ok((used, limit))
}

/// PUT /api/v1/admin/users/:id/credits
///
/// Manual correction of an account's AI credit counter or allowance, e.g.
/// refunding a failed generation. Partial: either field may be omitted.
pub async fn handle_adjust_credits(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<AdjustCreditsRequest>,
) -> Result<Json<Value>, AppError> {
    let sub: SubscriptionRow = sqlx::query_as("SELECT * FROM subscriptions WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Subscription not found".to_string()))?;

    let (used, limit) = merged_credits(&sub, &req)?;

    let updated: SubscriptionRow = sqlx::query_as(
        r#"
        UPDATE subscriptions
        SET ai_credits_used = $2, ai_credits_limit = $3, updated_at = now()
        WHERE user_id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(used)
    .bind(limit)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(json!({
        "message": "Credits updated successfully",
        "subscription": updated,
    })))
}
