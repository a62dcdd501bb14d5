use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::entitlement::evaluator::CounterKind;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Entitlement denials (`QuotaExceeded`, `FeatureUnavailable`, `NoSubscription`)
/// render the flat upgrade-prompt payload consumed by the dashboard:
/// `{error, feature?, used?, limit?, upgradeRequired: true}`. Everything else
/// uses the `{error: {code, message}}` envelope.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("{resource} quota exhausted ({used}/{limit})")]
    QuotaExceeded {
        resource: CounterKind,
        used: i32,
        limit: i32,
    },

    #[error("Feature '{feature}' not available in plan '{plan}'")]
    FeatureUnavailable { feature: String, plan: String },

    #[error("No subscription found")]
    NoSubscription { feature: String },

    /// A subscription references a plan the catalog no longer has.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Payment gateway error: {0}")]
    Billing(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::QuotaExceeded {
                resource,
                used,
                limit,
            } => (
                StatusCode::PAYMENT_REQUIRED,
                Json(json!({
                    "error": resource.exhausted_message(),
                    "used": used,
                    "limit": limit,
                    "upgradeRequired": true,
                })),
            )
                .into_response(),
            AppError::FeatureUnavailable { feature, plan } => (
                StatusCode::FORBIDDEN,
                Json(json!({
                    "error": format!("Feature '{feature}' not available in your plan"),
                    "feature": feature,
                    "currentPlan": plan,
                    "upgradeRequired": true,
                })),
            )
                .into_response(),
            AppError::NoSubscription { feature } => (
                StatusCode::FORBIDDEN,
                Json(json!({
                    "error": "No subscription found",
                    "feature": feature,
                    "upgradeRequired": true,
                })),
            )
                .into_response(),
            other => other.into_envelope(),
        }
    }
}

impl AppError {
    fn into_envelope(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Access denied".to_string(),
            ),
            AppError::Configuration(msg) => {
                tracing::error!("Configuration error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIGURATION_ERROR",
                    "A configuration error occurred".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "LLM_ERROR",
                    "An AI processing error occurred".to_string(),
                )
            }
            AppError::Billing(msg) => {
                tracing::error!("Payment gateway error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "PAYMENT_ERROR",
                    "A payment processing error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
            // Handled by into_response above; unreachable here.
            AppError::QuotaExceeded { .. }
            | AppError::FeatureUnavailable { .. }
            | AppError::NoSubscription { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal server error occurred".to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
