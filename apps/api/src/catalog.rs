//! Plan Catalog — named pricing tiers with feature flags and usage limits.
//!
//! The catalog is seeded at startup with the three stock tiers; edits made
//! directly to the rows survive restarts. Lookups are by unique plan name.

use serde_json::{json, Value};
use sqlx::PgPool;
use tracing::info;

use crate::errors::AppError;
use crate::models::plan::{PlanRow, UNLIMITED};

/// Seed definition for a stock pricing tier.
pub struct PlanSeed {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub monthly_price: f64,
    pub yearly_price: f64,
    pub features: Value,
    pub ai_credits_per_month: i32,
    pub portfolios_limit: i32,
    pub resumes_limit: i32,
    pub sort_order: i32,
}

/// The stock tiers: free / pro / enterprise.
pub fn default_plans() -> Vec<PlanSeed> {
    vec![
        PlanSeed {
            name: "free",
            display_name: "Free",
            description: "Perfect for getting started",
            monthly_price: 0.0,
            yearly_price: 0.0,
            features: json!({
                "customColors": false,
                "customBackground": false,
                "animations": false,
                "customFonts": false,
                "analytics": false,
                "customDomain": false,
                "prioritySupport": false,
            }),
            ai_credits_per_month: 5,
            portfolios_limit: 1,
            resumes_limit: 1,
            sort_order: 1,
        },
        PlanSeed {
            name: "pro",
            display_name: "Professional",
            description: "For serious job seekers",
            monthly_price: 9.99,
            yearly_price: 99.99,
            features: json!({
                "customColors": true,
                "customBackground": true,
                "animations": true,
                "customFonts": true,
                "analytics": true,
                "customDomain": false,
                "prioritySupport": false,
            }),
            ai_credits_per_month: 50,
            portfolios_limit: 10,
            resumes_limit: 10,
            sort_order: 2,
        },
        PlanSeed {
            name: "enterprise",
            display_name: "Enterprise",
            description: "For professionals and agencies",
            monthly_price: 29.99,
            yearly_price: 299.99,
            features: json!({
                "customColors": true,
                "customBackground": true,
                "animations": true,
                "customFonts": true,
                "analytics": true,
                "customDomain": true,
                "prioritySupport": true,
                "whiteLabel": true,
            }),
            ai_credits_per_month: UNLIMITED,
            portfolios_limit: UNLIMITED,
            resumes_limit: UNLIMITED,
            sort_order: 3,
        },
    ]
}

/// Inserts the stock tiers if missing. Existing rows are left untouched so
/// admin edits survive restarts.
pub async fn ensure_default_plans(pool: &PgPool) -> Result<(), AppError> {
    for seed in default_plans() {
        sqlx::query(
            r#"
            INSERT INTO pricing_plans
                (name, display_name, description, monthly_price, yearly_price,
                 features, ai_credits_per_month, portfolios_limit, resumes_limit,
                 sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(seed.name)
        .bind(seed.display_name)
        .bind(seed.description)
        .bind(seed.monthly_price)
        .bind(seed.yearly_price)
        .bind(&seed.features)
        .bind(seed.ai_credits_per_month)
        .bind(seed.portfolios_limit)
        .bind(seed.resumes_limit)
        .bind(seed.sort_order)
        .execute(pool)
        .await?;
    }
    info!("Plan catalog seeded");
    Ok(())
}

pub async fn get_plan(pool: &PgPool, name: &str) -> Result<Option<PlanRow>, AppError> {
    let plan: Option<PlanRow> = sqlx::query_as("SELECT * FROM pricing_plans WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(plan)
}

pub async fn list_active_plans(pool: &PgPool) -> Result<Vec<PlanRow>, AppError> {
    let plans: Vec<PlanRow> =
        sqlx::query_as("SELECT * FROM pricing_plans WHERE is_active = TRUE ORDER BY sort_order")
            .fetch_all(pool)
            .await?;
    Ok(plans)
}
