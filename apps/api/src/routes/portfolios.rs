use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::entitlement::evaluator::UsageCheck;
use crate::errors::AppError;
use crate::models::content::{PortfolioRow, ResumeRow};
use crate::routes::subscriptions::UserIdQuery;
use crate::state::AppState;

/// GET /api/v1/portfolios
///
/// Returns the user's portfolio settings, creating a default row on first
/// read. The lazy default is not gated; only explicit creation through the
/// upsert path consumes the portfolio allowance.
pub async fn handle_get(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<PortfolioRow>, AppError> {
    if let Some(portfolio) = load(&state, params.user_id).await? {
        return Ok(Json(portfolio));
    }

    let portfolio: PortfolioRow = sqlx::query_as(
        r#"
        INSERT INTO portfolios (user_id)
        VALUES ($1)
        ON CONFLICT (user_id) DO UPDATE SET updated_at = now()
        RETURNING *
        "#,
    )
    .bind(params.user_id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(portfolio))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertPortfolioRequest {
    pub user_id: Uuid,
    pub subdomain: Option<String>,
    pub theme: Option<String>,
    pub sections: Option<Value>,
    pub font: Option<String>,
    pub layout: Option<String>,
    pub profile_image: Option<String>,
    pub custom_logo: Option<String>,
    pub is_published: Option<bool>,
}

/// PUT /api/v1/portfolios
///
/// Creates or updates the user's portfolio. The create path passes through
/// the portfolio-count gate first.
pub async fn handle_upsert(
    State(state): State<AppState>,
    Json(req): Json<UpsertPortfolioRequest>,
) -> Result<Json<PortfolioRow>, AppError> {
    let existing = load(&state, req.user_id).await?;

    if existing.is_none() {
        state.gate.check(req.user_id, UsageCheck::Portfolio).await?;
    }

    let result: Result<PortfolioRow, sqlx::Error> = sqlx::query_as(
        r#"
        INSERT INTO portfolios
            (user_id, subdomain, theme, sections, font, layout,
             profile_image, custom_logo, is_published)
        VALUES ($1, $2, COALESCE($3, 'minimal'), COALESCE($4, '[]'::jsonb),
                COALESCE($5, 'inter'), COALESCE($6, 'single-column'), $7, $8,
                COALESCE($9, FALSE))
        ON CONFLICT (user_id) DO UPDATE
        SET subdomain = $2,
            theme = COALESCE($3, portfolios.theme),
            sections = COALESCE($4, portfolios.sections),
            font = COALESCE($5, portfolios.font),
            layout = COALESCE($6, portfolios.layout),
            profile_image = COALESCE($7, portfolios.profile_image),
            custom_logo = COALESCE($8, portfolios.custom_logo),
            is_published = COALESCE($9, portfolios.is_published),
            updated_at = now()
        RETURNING *
        "#,
    )
    .bind(req.user_id)
    .bind(&req.subdomain)
    .bind(&req.theme)
    .bind(&req.sections)
    .bind(&req.font)
    .bind(&req.layout)
    .bind(&req.profile_image)
    .bind(&req.custom_logo)
    .bind(req.is_published)
    .fetch_one(&state.db)
    .await;

    match result {
        Ok(portfolio) => Ok(Json(portfolio)),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(AppError::Validation("Subdomain already taken".to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /api/v1/portfolios/public/:subdomain
///
/// Public view: published portfolio joined with the owner's profile and
/// their most recently updated resume.
pub async fn handle_public(
    State(state): State<AppState>,
    Path(subdomain): Path<String>,
) -> Result<Json<Value>, AppError> {
    let portfolio: Option<PortfolioRow> =
        sqlx::query_as("SELECT * FROM portfolios WHERE subdomain = $1")
            .bind(&subdomain)
            .fetch_optional(&state.db)
            .await?;

    let portfolio = portfolio
        .filter(|p| p.is_published)
        .ok_or_else(|| AppError::NotFound("Portfolio not found".to_string()))?;

    crate::routes::analytics::record_view(&state, portfolio.user_id, portfolio.id, &subdomain)
        .await;

    let owner: Option<(Option<String>, Option<String>, Option<String>, String, Option<String>, Option<String>)> =
        sqlx::query_as(
            "SELECT full_name, title, location, email, github, linkedin FROM users WHERE id = $1",
        )
        .bind(portfolio.user_id)
        .fetch_optional(&state.db)
        .await?;

    let resume: Option<ResumeRow> = sqlx::query_as(
        "SELECT * FROM resumes WHERE user_id = $1 ORDER BY updated_at DESC LIMIT 1",
    )
    .bind(portfolio.user_id)
    .fetch_optional(&state.db)
    .await?;

    let user = owner.map(|(full_name, title, location, email, github, linkedin)| {
        json!({
            "fullName": full_name,
            "title": title,
            "location": location,
            "email": email,
            "github": github,
            "linkedin": linkedin,
        })
    });

    Ok(Json(json!({
        "portfolio": portfolio,
        "resume": resume,
        "user": user,
    })))
}

async fn load(state: &AppState, user_id: Uuid) -> Result<Option<PortfolioRow>, AppError> {
    let portfolio: Option<PortfolioRow> =
        sqlx::query_as("SELECT * FROM portfolios WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&state.db)
            .await?;
    Ok(portfolio)
}
