use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::billing::events::BillingEvent;
use crate::billing::stripe_client::CheckoutParams;
use crate::catalog;
use crate::errors::AppError;
use crate::models::plan::PlanRow;
use crate::models::subscription::{
    SubscriptionRow, TransactionRow, FREE_PLAN, STATUS_ACTIVE, STATUS_CANCELED,
};
use crate::models::user::UserRow;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

/// GET /api/v1/plans
pub async fn handle_list_plans(
    State(state): State<AppState>,
) -> Result<Json<Vec<PlanRow>>, AppError> {
    let plans = catalog::list_active_plans(&state.db).await?;
    Ok(Json(plans))
}

/// GET /api/v1/subscriptions/current
///
/// Lazily creates a free subscription on first read. A `trialing` row whose
/// trial window has closed is dropped back to the free plan here; its limit
/// snapshots are left as-is, matching the grant flow which rewrites them on
/// the next grant.
pub async fn handle_current(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<SubscriptionRow>, AppError> {
    let sub = state.gate.load_or_create(params.user_id).await?;

    if sub.trial_expired(Utc::now()) {
        let sub: SubscriptionRow = sqlx::query_as(
            r#"
            UPDATE subscriptions
            SET status = $2, plan = $3, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(sub.id)
        .bind(STATUS_ACTIVE)
        .bind(FREE_PLAN)
        .fetch_one(&state.db)
        .await?;
        return Ok(Json(sub));
    }

    Ok(Json(sub))
}

#[derive(Debug, Serialize, PartialEq)]
pub struct UsageStat {
    pub used: i32,
    pub limit: i32,
    pub percentage: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageResponse {
    pub ai_credits: UsageStat,
    pub portfolios: UsageStat,
    pub resumes: UsageStat,
}

fn usage_stat(used: i32, limit: i32) -> UsageStat {
    let percentage = if limit > 0 {
        f64::from(used) / f64::from(limit) * 100.0
    } else {
        0.0
    };
    UsageStat {
        used,
        limit,
        percentage,
    }
}

/// GET /api/v1/subscriptions/usage
pub async fn handle_usage(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<UsageResponse>, AppError> {
    let sub = state
        .gate
        .load(params.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Subscription not found".to_string()))?;

    Ok(Json(UsageResponse {
        ai_credits: usage_stat(sub.ai_credits_used, sub.ai_credits_limit),
        portfolios: usage_stat(sub.portfolios_used, sub.portfolios_limit),
        resumes: usage_stat(sub.resumes_used, sub.resumes_limit),
    }))
}

/// GET /api/v1/subscriptions/transactions
///
/// Payment history, newest first. Rows are appended by the billing
/// reconciler and never mutated.
pub async fn handle_transactions(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<TransactionRow>>, AppError> {
    let transactions: Vec<TransactionRow> =
        sqlx::query_as("SELECT * FROM transactions WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(params.user_id)
            .fetch_all(&state.db)
            .await?;
    Ok(Json(transactions))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub user_id: Uuid,
    pub plan_name: String,
    /// "monthly" or "yearly".
    pub billing_period: String,
}

/// POST /api/v1/subscriptions/checkout
pub async fn handle_checkout(
    State(state): State<AppState>,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<Value>, AppError> {
    let plan = catalog::get_plan(&state.db, &req.plan_name)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound("Plan not found".to_string()))?;

    let price_id = match req.billing_period.as_str() {
        "yearly" => plan.stripe_yearly_price_id.clone(),
        _ => plan.stripe_monthly_price_id.clone(),
    }
    .ok_or_else(|| {
        AppError::Validation("Stripe price ID not configured for this plan".to_string())
    })?;

    let sub = state.gate.load_or_create(req.user_id).await?;

    let customer_id = match sub.stripe_customer_id.clone() {
        Some(id) => id,
        None => {
            let user: UserRow = sqlx::query_as("SELECT * FROM users WHERE id = $1")
                .bind(req.user_id)
                .fetch_optional(&state.db)
                .await?
                .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

            let customer = state.stripe.create_customer(&user.email, user.id).await?;
            sqlx::query("UPDATE subscriptions SET stripe_customer_id = $2, updated_at = now() WHERE id = $1")
                .bind(sub.id)
                .bind(&customer.id)
                .execute(&state.db)
                .await?;
            customer.id
        }
    };

    let session = state
        .stripe
        .create_checkout_session(&CheckoutParams {
            customer_id,
            price_id,
            success_url: format!(
                "{}/dashboard?session_id={{CHECKOUT_SESSION_ID}}",
                state.config.frontend_url
            ),
            cancel_url: format!("{}/pricing", state.config.frontend_url),
            user_id: req.user_id,
            plan_name: plan.name.clone(),
            billing_period: req.billing_period.clone(),
        })
        .await?;

    Ok(Json(json!({ "sessionId": session.id, "url": session.url })))
}

/// POST /api/v1/subscriptions/cancel
///
/// Flags the gateway subscription to lapse at the period boundary and marks
/// the local row `canceled` immediately.
pub async fn handle_cancel(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Value>, AppError> {
    let sub = state
        .gate
        .load(params.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No active subscription found".to_string()))?;

    let subscription_id = sub
        .stripe_subscription_id
        .as_deref()
        .ok_or_else(|| AppError::NotFound("No active subscription found".to_string()))?;

    state.stripe.cancel_at_period_end(subscription_id).await?;

    sqlx::query("UPDATE subscriptions SET status = $2, updated_at = now() WHERE id = $1")
        .bind(sub.id)
        .bind(STATUS_CANCELED)
        .execute(&state.db)
        .await?;

    Ok(Json(json!({
        "message": "Subscription will be canceled at the end of the billing period"
    })))
}

/// POST /api/v1/subscriptions/webhook
///
/// Gateway lifecycle events. Signature verification happens at the ingress
/// proxy; payloads reaching this handler are treated as authenticated.
pub async fn handle_webhook(
    State(state): State<AppState>,
    Json(event): Json<BillingEvent>,
) -> Result<Json<Value>, AppError> {
    state.reconciler.handle(event).await?;
    Ok(Json(json!({ "received": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_stat_percentage() {
        assert_eq!(
            usage_stat(4, 5),
            UsageStat {
                used: 4,
                limit: 5,
                percentage: 80.0,
            }
        );
    }

    #[test]
    fn test_usage_stat_zero_limit_reports_zero_percent() {
        assert_eq!(usage_stat(3, 0).percentage, 0.0);
    }

    #[test]
    fn test_usage_stat_over_limit_exceeds_hundred() {
        // Limits can shrink under a downgrade while usage carries over.
        assert!(usage_stat(10, 5).percentage > 100.0);
    }
}
