use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Sentinel limit meaning "unlimited". Large enough that no real account
/// reaches it within a billing period.
pub const UNLIMITED: i32 = 999_999;

/// A pricing tier: feature flags plus numeric usage allowances.
/// `features` is a JSON object mapping flag name to a boolean.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlanRow {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub monthly_price: f64,
    pub yearly_price: f64,
    pub currency: String,
    pub features: Value,
    pub ai_credits_per_month: i32,
    pub portfolios_limit: i32,
    pub resumes_limit: i32,
    pub stripe_monthly_price_id: Option<String>,
    pub stripe_yearly_price_id: Option<String>,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

impl PlanRow {
    /// A feature is enabled only when the flag is the JSON boolean `true`.
    /// Absent, `false`, or non-boolean values all read as disabled.
    pub fn has_feature(&self, flag: &str) -> bool {
        self.features.get(flag) == Some(&Value::Bool(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plan_with_features(features: Value) -> PlanRow {
        PlanRow {
            id: Uuid::new_v4(),
            name: "pro".to_string(),
            display_name: "Professional".to_string(),
            description: String::new(),
            monthly_price: 9.99,
            yearly_price: 99.99,
            currency: "USD".to_string(),
            features,
            ai_credits_per_month: 50,
            portfolios_limit: 10,
            resumes_limit: 10,
            stripe_monthly_price_id: None,
            stripe_yearly_price_id: None,
            is_active: true,
            sort_order: 2,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_feature_enabled_only_when_true() {
        let plan = plan_with_features(json!({
            "analytics": true,
            "customDomain": false,
        }));
        assert!(plan.has_feature("analytics"));
        assert!(!plan.has_feature("customDomain"));
    }

    #[test]
    fn test_absent_flag_reads_disabled() {
        let plan = plan_with_features(json!({}));
        assert!(!plan.has_feature("analytics"));
    }

    #[test]
    fn test_non_boolean_flag_reads_disabled() {
        let plan = plan_with_features(json!({
            "analytics": "yes",
            "customFonts": 1,
        }));
        assert!(!plan.has_feature("analytics"));
        assert!(!plan.has_feature("customFonts"));
    }
}
