pub mod admin;
pub mod ai;
pub mod analytics;
pub mod health;
pub mod portfolios;
pub mod resumes;
pub mod subscriptions;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Plan catalog
        .route("/api/v1/plans", get(subscriptions::handle_list_plans))
        // Subscriptions & billing
        .route(
            "/api/v1/subscriptions/current",
            get(subscriptions::handle_current),
        )
        .route(
            "/api/v1/subscriptions/usage",
            get(subscriptions::handle_usage),
        )
        .route(
            "/api/v1/subscriptions/transactions",
            get(subscriptions::handle_transactions),
        )
        .route(
            "/api/v1/subscriptions/checkout",
            post(subscriptions::handle_checkout),
        )
        .route(
            "/api/v1/subscriptions/cancel",
            post(subscriptions::handle_cancel),
        )
        .route(
            "/api/v1/subscriptions/webhook",
            post(subscriptions::handle_webhook),
        )
        // Admin
        .route(
            "/api/v1/admin/users/:id/gift-access",
            post(admin::handle_gift_access),
        )
        .route(
            "/api/v1/admin/users/:id/credits",
            put(admin::handle_adjust_credits),
        )
        // Analytics (feature-gated)
        .route("/api/v1/analytics", get(analytics::handle_list))
        // AI analysis (each call consumes AI credits)
        .route("/api/v1/ai/job-match", post(ai::handle_job_match))
        .route("/api/v1/ai/rewrite", post(ai::handle_rewrite))
        .route("/api/v1/ai/cover-letter", post(ai::handle_cover_letter))
        .route("/api/v1/ai/interview-prep", post(ai::handle_interview_prep))
        .route("/api/v1/ai/ats-score", post(ai::handle_ats_score))
        .route("/api/v1/ai/fix-resume", post(ai::handle_fix_resume))
        .route(
            "/api/v1/ai/career-analysis",
            post(ai::handle_career_analysis),
        )
        .route(
            "/api/v1/ai/generate-portfolio-design",
            post(ai::handle_portfolio_design),
        )
        // Resumes
        .route(
            "/api/v1/resumes",
            get(resumes::handle_list).post(resumes::handle_create),
        )
        .route(
            "/api/v1/resumes/:id",
            get(resumes::handle_get)
                .put(resumes::handle_update)
                .delete(resumes::handle_delete),
        )
        // Portfolios
        .route(
            "/api/v1/portfolios",
            get(portfolios::handle_get).put(portfolios::handle_upsert),
        )
        .route(
            "/api/v1/portfolios/public/:subdomain",
            get(portfolios::handle_public),
        )
        .with_state(state)
}
