//! AI resume-analysis routes. Every call passes through the usage gate and
//! consumes its credit price before the LLM is contacted; a failed LLM call
//! does not refund the credits. Most operations cost one credit; the heavier
//! full-document rewrites (fix-resume, career-analysis) cost two.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::entitlement::evaluator::UsageCheck;
use crate::errors::AppError;
use crate::llm_client::prompts;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMatchRequest {
    pub user_id: Uuid,
    pub resume: Value,
    pub job_description: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMatchReport {
    pub score: u32,
    pub matching_keywords: Vec<String>,
    pub missing_keywords: Vec<String>,
    pub advice: String,
}

/// POST /api/v1/ai/job-match
pub async fn handle_job_match(
    State(state): State<AppState>,
    Json(req): Json<JobMatchRequest>,
) -> Result<Json<JobMatchReport>, AppError> {
    state
        .gate
        .check(req.user_id, UsageCheck::AiCredits { quantity: 1 })
        .await?;

    let report: JobMatchReport = state
        .llm
        .call_json(
            &prompts::job_match_prompt(&req.resume, &req.job_description),
            &format!("{} {}", prompts::JOB_MATCH_SYSTEM, prompts::JSON_ONLY_SYSTEM),
        )
        .await
        .map_err(|e| AppError::Llm(e.to_string()))?;

    Ok(Json(report))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteRequest {
    pub user_id: Uuid,
    pub text: String,
    /// What is being rewritten, e.g. "summary" or "experience bullet".
    pub section_type: String,
    pub instructions: Option<String>,
}

/// POST /api/v1/ai/rewrite
pub async fn handle_rewrite(
    State(state): State<AppState>,
    Json(req): Json<RewriteRequest>,
) -> Result<Json<Value>, AppError> {
    state
        .gate
        .check(req.user_id, UsageCheck::AiCredits { quantity: 1 })
        .await?;

    let response = state
        .llm
        .call(
            &req.text,
            &prompts::rewrite_system(&req.section_type, req.instructions.as_deref()),
        )
        .await
        .map_err(|e| AppError::Llm(e.to_string()))?;

    let content = response
        .text()
        .ok_or_else(|| AppError::Llm("empty rewrite response".to_string()))?;

    Ok(Json(json!({ "content": content })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverLetterRequest {
    pub user_id: Uuid,
    pub resume: Value,
    pub job_description: String,
}

/// POST /api/v1/ai/cover-letter
pub async fn handle_cover_letter(
    State(state): State<AppState>,
    Json(req): Json<CoverLetterRequest>,
) -> Result<Json<Value>, AppError> {
    state
        .gate
        .check(req.user_id, UsageCheck::AiCredits { quantity: 1 })
        .await?;

    let response = state
        .llm
        .call(
            &prompts::cover_letter_prompt(&req.resume, &req.job_description),
            prompts::COVER_LETTER_SYSTEM,
        )
        .await
        .map_err(|e| AppError::Llm(e.to_string()))?;

    let content = response
        .text()
        .ok_or_else(|| AppError::Llm("empty cover letter response".to_string()))?;

    Ok(Json(json!({ "content": content })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewPrepRequest {
    pub user_id: Uuid,
    pub resume: Value,
    pub job_description: String,
}

/// POST /api/v1/ai/interview-prep
///
/// Returns `{"questions": [{"question", "answerTips"}, ...]}`.
pub async fn handle_interview_prep(
    State(state): State<AppState>,
    Json(req): Json<InterviewPrepRequest>,
) -> Result<Json<Value>, AppError> {
    state
        .gate
        .check(req.user_id, UsageCheck::AiCredits { quantity: 1 })
        .await?;

    let questions: Value = state
        .llm
        .call_json(
            &prompts::job_match_prompt(&req.resume, &req.job_description),
            &format!(
                "{} {}",
                prompts::INTERVIEW_PREP_SYSTEM,
                prompts::JSON_ONLY_SYSTEM
            ),
        )
        .await
        .map_err(|e| AppError::Llm(e.to_string()))?;

    Ok(Json(questions))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtsScoreRequest {
    pub user_id: Uuid,
    pub resume: Value,
    pub job_description: Option<String>,
    /// "en" or "ar"; controls the language of the analysis text.
    pub language: Option<String>,
}

/// POST /api/v1/ai/ats-score
///
/// Scores the resume against the job description, or against general best
/// practices when none is supplied.
pub async fn handle_ats_score(
    State(state): State<AppState>,
    Json(req): Json<AtsScoreRequest>,
) -> Result<Json<Value>, AppError> {
    state
        .gate
        .check(req.user_id, UsageCheck::AiCredits { quantity: 1 })
        .await?;

    let target_lang = prompts::target_language(req.language.as_deref());
    let report: Value = state
        .llm
        .call_json(
            &prompts::ats_score_prompt(&req.resume, req.job_description.as_deref()),
            &format!(
                "{} {}",
                prompts::ats_score_system(target_lang),
                prompts::JSON_ONLY_SYSTEM
            ),
        )
        .await
        .map_err(|e| AppError::Llm(e.to_string()))?;

    Ok(Json(report))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixResumeRequest {
    pub user_id: Uuid,
    pub resume: Value,
    pub ats_feedback: Option<Value>,
    pub language: Option<String>,
}

/// POST /api/v1/ai/fix-resume
///
/// Full-document rewrite; costs two credits. Returns the improved resume
/// with the same structure as the input.
pub async fn handle_fix_resume(
    State(state): State<AppState>,
    Json(req): Json<FixResumeRequest>,
) -> Result<Json<Value>, AppError> {
    state
        .gate
        .check(req.user_id, UsageCheck::AiCredits { quantity: 2 })
        .await?;

    let target_lang = prompts::target_language(req.language.as_deref());
    let fixed: Value = state
        .llm
        .call_json(
            &prompts::fix_resume_prompt(&req.resume, req.ats_feedback.as_ref()),
            &format!(
                "{} {}",
                prompts::fix_resume_system(target_lang),
                prompts::JSON_ONLY_SYSTEM
            ),
        )
        .await
        .map_err(|e| AppError::Llm(e.to_string()))?;

    Ok(Json(json!({ "success": true, "data": fixed })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CareerAnalysisRequest {
    pub user_id: Uuid,
    pub resume: Value,
    pub language: Option<String>,
}

/// POST /api/v1/ai/career-analysis
///
/// Comprehensive career assessment; costs two credits.
pub async fn handle_career_analysis(
    State(state): State<AppState>,
    Json(req): Json<CareerAnalysisRequest>,
) -> Result<Json<Value>, AppError> {
    state
        .gate
        .check(req.user_id, UsageCheck::AiCredits { quantity: 2 })
        .await?;

    let target_lang = prompts::target_language(req.language.as_deref());
    let analysis: Value = state
        .llm
        .call_json(
            &prompts::career_analysis_prompt(&req.resume),
            &format!(
                "{} {}",
                prompts::career_analysis_system(target_lang),
                prompts::JSON_ONLY_SYSTEM
            ),
        )
        .await
        .map_err(|e| AppError::Llm(e.to_string()))?;

    Ok(Json(json!({ "success": true, "data": analysis })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioDesignRequest {
    pub user_id: Uuid,
    pub resume_id: Uuid,
}

/// POST /api/v1/ai/generate-portfolio-design
///
/// Suggests a portfolio theme (colors, font, layout, sections) derived from
/// a stored resume.
pub async fn handle_portfolio_design(
    State(state): State<AppState>,
    Json(req): Json<PortfolioDesignRequest>,
) -> Result<Json<Value>, AppError> {
    state
        .gate
        .check(req.user_id, UsageCheck::AiCredits { quantity: 1 })
        .await?;

    let resume = crate::routes::resumes::load_owned(&state, req.resume_id, req.user_id).await?;

    let design: Value = state
        .llm
        .call_json(
            &prompts::portfolio_design_prompt(&resume.data),
            &format!(
                "{} {}",
                prompts::PORTFOLIO_DESIGN_SYSTEM,
                prompts::JSON_ONLY_SYSTEM
            ),
        )
        .await
        .map_err(|e| AppError::Llm(e.to_string()))?;

    Ok(Json(design))
}
