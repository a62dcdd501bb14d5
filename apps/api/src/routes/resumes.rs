use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::entitlement::evaluator::UsageCheck;
use crate::errors::AppError;
use crate::models::content::ResumeRow;
use crate::routes::subscriptions::UserIdQuery;
use crate::state::AppState;

/// GET /api/v1/resumes
pub async fn handle_list(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<ResumeRow>>, AppError> {
    let resumes: Vec<ResumeRow> =
        sqlx::query_as("SELECT * FROM resumes WHERE user_id = $1 ORDER BY updated_at DESC")
            .bind(params.user_id)
            .fetch_all(&state.db)
            .await?;
    Ok(Json(resumes))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<ResumeRow>, AppError> {
    let resume = load_owned(&state, id, params.user_id).await?;
    Ok(Json(resume))
}

#[derive(Deserialize)]
pub struct CreateResumeRequest {
    pub user_id: Uuid,
    pub name: String,
    pub template: Option<String>,
    pub data: Option<Value>,
}

/// POST /api/v1/resumes
///
/// Gated by the resume-count allowance. The counter is consumed before the
/// insert; a failed insert does not refund it.
pub async fn handle_create(
    State(state): State<AppState>,
    Json(req): Json<CreateResumeRequest>,
) -> Result<(StatusCode, Json<ResumeRow>), AppError> {
    state.gate.check(req.user_id, UsageCheck::Resume).await?;

    let resume: ResumeRow = sqlx::query_as(
        r#"
        INSERT INTO resumes (user_id, name, template, data)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(req.user_id)
    .bind(&req.name)
    .bind(req.template.as_deref().unwrap_or("classic"))
    .bind(req.data.unwrap_or_else(|| json!({})))
    .fetch_one(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(resume)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResumeRequest {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub template: Option<String>,
    pub data: Option<Value>,
    pub visible_sections: Option<Value>,
    pub color_scheme: Option<String>,
    pub is_public: Option<bool>,
}

/// PUT /api/v1/resumes/:id
pub async fn handle_update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateResumeRequest>,
) -> Result<Json<ResumeRow>, AppError> {
    let existing = load_owned(&state, id, req.user_id).await?;

    let updated: ResumeRow = sqlx::query_as(
        r#"
        UPDATE resumes
        SET name = $2, template = $3, data = $4, visible_sections = $5,
            color_scheme = $6, is_public = $7, updated_at = now()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(req.name.unwrap_or(existing.name))
    .bind(req.template.unwrap_or(existing.template))
    .bind(req.data.unwrap_or(existing.data))
    .bind(req.visible_sections.unwrap_or(existing.visible_sections))
    .bind(req.color_scheme.or(existing.color_scheme))
    .bind(req.is_public.unwrap_or(existing.is_public))
    .fetch_one(&state.db)
    .await?;

    Ok(Json(updated))
}

/// DELETE /api/v1/resumes/:id
///
/// Deletion does not decrement the usage counter; the allowance measures
/// resumes created within the period, not currently held.
pub async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Value>, AppError> {
    load_owned(&state, id, params.user_id).await?;

    sqlx::query("DELETE FROM resumes WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;

    Ok(Json(json!({ "message": "Resume deleted successfully" })))
}

pub(crate) async fn load_owned(
    state: &AppState,
    id: Uuid,
    user_id: Uuid,
) -> Result<ResumeRow, AppError> {
    let resume: Option<ResumeRow> = sqlx::query_as("SELECT * FROM resumes WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;

    let resume = resume.ok_or_else(|| AppError::NotFound("Resume not found".to_string()))?;
    if resume.user_id != user_id {
        return Err(AppError::Forbidden);
    }
    Ok(resume)
}
