//! Entitlement Evaluator — pure decision logic over a subscription snapshot.
//!
//! Given a subscription, an optional plan (needed only for feature checks),
//! and a requested action, decide allow/deny and the counter value to persist
//! on allow. No I/O happens here; the gate owns persistence.
//!
//! Counter semantics, preserved exactly:
//! - AI credits allow reaching the limit: `used + quantity <= limit`.
//! - Resource counts do not: `used < limit` (strict). A limit of 0 always
//!   denies a count check.

use serde::Serialize;

use crate::errors::AppError;
use crate::models::plan::PlanRow;
use crate::models::subscription::SubscriptionRow;

/// A requested action to check against the subscription. Each counter is an
/// explicit variant with its own update path; no runtime field-name lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageCheck {
    AiCredits { quantity: i32 },
    Portfolio,
    Resume,
    Feature(String),
}

impl UsageCheck {
    /// Label reported in rejection payloads.
    pub fn label(&self) -> String {
        match self {
            UsageCheck::AiCredits { .. } => "aiCredits".to_string(),
            UsageCheck::Portfolio => "portfolios".to_string(),
            UsageCheck::Resume => "resumes".to_string(),
            UsageCheck::Feature(flag) => flag.clone(),
        }
    }
}

/// The three metered counters on a subscription row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CounterKind {
    AiCredits,
    Portfolios,
    Resumes,
}

impl CounterKind {
    /// Client-facing message for a 402 rejection.
    pub fn exhausted_message(&self) -> &'static str {
        match self {
            CounterKind::AiCredits => "AI credits exhausted",
            CounterKind::Portfolios => "portfolios limit reached",
            CounterKind::Resumes => "resumes limit reached",
        }
    }
}

impl std::fmt::Display for CounterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CounterKind::AiCredits => "AI credits",
            CounterKind::Portfolios => "portfolios",
            CounterKind::Resumes => "resumes",
        };
        f.write_str(name)
    }
}

/// Counter write the gate must persist when a decision allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterUpdate {
    pub counter: CounterKind,
    pub new_used: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DenyReason {
    NoSubscription,
    LimitReached {
        counter: CounterKind,
        used: i32,
        limit: i32,
    },
    FeatureUnavailable {
        feature: String,
        plan: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum UsageDecision {
    /// Permitted. `Some` carries the counter value to persist; feature
    /// checks consume nothing and carry `None`.
    Allow(Option<CounterUpdate>),
    Deny(DenyReason),
}

/// Evaluates a usage check against a subscription snapshot.
///
/// `plan` is consulted only for `Feature` checks and must be the plan named
/// by the subscription; a subscription referencing a plan the catalog no
/// longer has is a fatal configuration error, not a denial.
pub fn evaluate(
    subscription: Option<&SubscriptionRow>,
    plan: Option<&PlanRow>,
    check: &UsageCheck,
) -> Result<UsageDecision, AppError> {
    let Some(sub) = subscription else {
        return Ok(UsageDecision::Deny(DenyReason::NoSubscription));
    };

    match check {
        UsageCheck::Feature(flag) => {
            let plan = plan.ok_or_else(|| {
                AppError::Configuration(format!(
                    "subscription {} references unknown plan '{}'",
                    sub.id, sub.plan
                ))
            })?;
            if plan.has_feature(flag) {
                Ok(UsageDecision::Allow(None))
            } else {
                Ok(UsageDecision::Deny(DenyReason::FeatureUnavailable {
                    feature: flag.clone(),
                    plan: sub.plan.clone(),
                }))
            }
        }
        UsageCheck::AiCredits { quantity } => {
            let (used, limit) = (sub.ai_credits_used, sub.ai_credits_limit);
            if used + quantity <= limit {
                Ok(UsageDecision::Allow(Some(CounterUpdate {
                    counter: CounterKind::AiCredits,
                    new_used: used + quantity,
                })))
            } else {
                Ok(UsageDecision::Deny(DenyReason::LimitReached {
                    counter: CounterKind::AiCredits,
                    used,
                    limit,
                }))
            }
        }
        UsageCheck::Portfolio => evaluate_count(CounterKind::Portfolios, sub.portfolios_used, sub.portfolios_limit),
        UsageCheck::Resume => evaluate_count(CounterKind::Resumes, sub.resumes_used, sub.resumes_limit),
    }
}

fn evaluate_count(counter: CounterKind, used: i32, limit: i32) -> Result<UsageDecision, AppError> {
    if used < limit {
        Ok(UsageDecision::Allow(Some(CounterUpdate {
            counter,
            new_used: used + 1,
        })))
    } else {
        Ok(UsageDecision::Deny(DenyReason::LimitReached {
            counter,
            used,
            limit,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn make_sub(credits: (i32, i32), portfolios: (i32, i32), resumes: (i32, i32)) -> SubscriptionRow {
        let now = Utc::now();
        SubscriptionRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            plan: "free".to_string(),
            status: "active".to_string(),
            ai_credits_used: credits.0,
            ai_credits_limit: credits.1,
            portfolios_used: portfolios.0,
            portfolios_limit: portfolios.1,
            resumes_used: resumes.0,
            resumes_limit: resumes.1,
            trial_ends_at: None,
            trial_days_granted: None,
            stripe_customer_id: None,
            stripe_subscription_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn make_plan(name: &str, features: serde_json::Value) -> PlanRow {
        PlanRow {
            id: Uuid::new_v4(),
            name: name.to_string(),
            display_name: name.to_string(),
            description: String::new(),
            monthly_price: 0.0,
            yearly_price: 0.0,
            currency: "USD".to_string(),
            features,
            ai_credits_per_month: 5,
            portfolios_limit: 1,
            resumes_limit: 1,
            stripe_monthly_price_id: None,
            stripe_yearly_price_id: None,
            is_active: true,
            sort_order: 1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_no_subscription_denies() {
        let decision = evaluate(None, None, &UsageCheck::AiCredits { quantity: 1 }).unwrap();
        assert_eq!(decision, UsageDecision::Deny(DenyReason::NoSubscription));
    }

    #[test]
    fn test_credits_allow_up_to_limit_inclusive() {
        // used 4 of 5, requesting 1: reaches the limit exactly, allowed.
        let sub = make_sub((4, 5), (0, 1), (0, 1));
        let decision = evaluate(Some(&sub), None, &UsageCheck::AiCredits { quantity: 1 }).unwrap();
        assert_eq!(
            decision,
            UsageDecision::Allow(Some(CounterUpdate {
                counter: CounterKind::AiCredits,
                new_used: 5,
            }))
        );
    }

    #[test]
    fn test_two_credit_request_needs_two_remaining() {
        // Two-credit operations: allowed when both fit, denied when only one
        // credit is left even though a one-credit request would pass.
        let sub = make_sub((3, 5), (0, 1), (0, 1));
        let decision = evaluate(Some(&sub), None, &UsageCheck::AiCredits { quantity: 2 }).unwrap();
        assert_eq!(
            decision,
            UsageDecision::Allow(Some(CounterUpdate {
                counter: CounterKind::AiCredits,
                new_used: 5,
            }))
        );

        let sub = make_sub((4, 5), (0, 1), (0, 1));
        let decision = evaluate(Some(&sub), None, &UsageCheck::AiCredits { quantity: 2 }).unwrap();
        assert_eq!(
            decision,
            UsageDecision::Deny(DenyReason::LimitReached {
                counter: CounterKind::AiCredits,
                used: 4,
                limit: 5,
            })
        );
    }

    #[test]
    fn test_credits_deny_past_limit_with_verbatim_counters() {
        let sub = make_sub((5, 5), (0, 1), (0, 1));
        let decision = evaluate(Some(&sub), None, &UsageCheck::AiCredits { quantity: 1 }).unwrap();
        assert_eq!(
            decision,
            UsageDecision::Deny(DenyReason::LimitReached {
                counter: CounterKind::AiCredits,
                used: 5,
                limit: 5,
            })
        );
    }

    #[test]
    fn test_credits_multi_quantity() {
        let sub = make_sub((2, 5), (0, 1), (0, 1));
        let allow = evaluate(Some(&sub), None, &UsageCheck::AiCredits { quantity: 3 }).unwrap();
        assert_eq!(
            allow,
            UsageDecision::Allow(Some(CounterUpdate {
                counter: CounterKind::AiCredits,
                new_used: 5,
            }))
        );
        let deny = evaluate(Some(&sub), None, &UsageCheck::AiCredits { quantity: 4 }).unwrap();
        assert!(matches!(deny, UsageDecision::Deny(DenyReason::LimitReached { .. })));
    }

    #[test]
    fn test_count_check_is_strict() {
        // Resource counts may not reach the limit: used == limit denies,
        // unlike credits which allow landing exactly on it.
        let sub = make_sub((0, 5), (0, 1), (1, 1));
        let decision = evaluate(Some(&sub), None, &UsageCheck::Resume).unwrap();
        assert_eq!(
            decision,
            UsageDecision::Deny(DenyReason::LimitReached {
                counter: CounterKind::Resumes,
                used: 1,
                limit: 1,
            })
        );
    }

    #[test]
    fn test_count_allow_increments_by_one() {
        let sub = make_sub((0, 5), (3, 10), (0, 1));
        let decision = evaluate(Some(&sub), None, &UsageCheck::Portfolio).unwrap();
        assert_eq!(
            decision,
            UsageDecision::Allow(Some(CounterUpdate {
                counter: CounterKind::Portfolios,
                new_used: 4,
            }))
        );
    }

    #[test]
    fn test_zero_limit_always_denies_counts() {
        let sub = make_sub((0, 5), (0, 0), (0, 0));
        for check in [UsageCheck::Portfolio, UsageCheck::Resume] {
            let decision = evaluate(Some(&sub), None, &check).unwrap();
            assert!(matches!(decision, UsageDecision::Deny(DenyReason::LimitReached { limit: 0, .. })));
        }
    }

    #[test]
    fn test_feature_allowed_when_flag_true() {
        let sub = make_sub((0, 5), (0, 1), (0, 1));
        let plan = make_plan("free", json!({"analytics": true}));
        let decision = evaluate(
            Some(&sub),
            Some(&plan),
            &UsageCheck::Feature("analytics".to_string()),
        )
        .unwrap();
        assert_eq!(decision, UsageDecision::Allow(None));
    }

    #[test]
    fn test_feature_denied_when_flag_false_or_absent() {
        let sub = make_sub((0, 5), (0, 1), (0, 1));
        let plan = make_plan("free", json!({"analytics": false}));
        for flag in ["analytics", "customDomain"] {
            let decision = evaluate(
                Some(&sub),
                Some(&plan),
                &UsageCheck::Feature(flag.to_string()),
            )
            .unwrap();
            assert_eq!(
                decision,
                UsageDecision::Deny(DenyReason::FeatureUnavailable {
                    feature: flag.to_string(),
                    plan: "free".to_string(),
                })
            );
        }
    }

    #[test]
    fn test_feature_denied_when_flag_not_boolean() {
        let sub = make_sub((0, 5), (0, 1), (0, 1));
        let plan = make_plan("free", json!({"analytics": "true"}));
        let decision = evaluate(
            Some(&sub),
            Some(&plan),
            &UsageCheck::Feature("analytics".to_string()),
        )
        .unwrap();
        assert!(matches!(decision, UsageDecision::Deny(DenyReason::FeatureUnavailable { .. })));
    }

    #[test]
    fn test_missing_plan_on_feature_check_is_configuration_error() {
        let sub = make_sub((0, 5), (0, 1), (0, 1));
        let result = evaluate(Some(&sub), None, &UsageCheck::Feature("analytics".to_string()));
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_counter_checks_ignore_plan() {
        // Counter state lives on the subscription snapshot; the catalog is
        // not consulted.
        let sub = make_sub((0, 5), (0, 1), (0, 1));
        let decision = evaluate(Some(&sub), None, &UsageCheck::AiCredits { quantity: 1 }).unwrap();
        assert!(matches!(decision, UsageDecision::Allow(Some(_))));
    }

    #[test]
    fn test_check_labels() {
        assert_eq!(UsageCheck::AiCredits { quantity: 1 }.label(), "aiCredits");
        assert_eq!(UsageCheck::Portfolio.label(), "portfolios");
        assert_eq!(UsageCheck::Resume.label(), "resumes");
        assert_eq!(UsageCheck::Feature("customDomain".to_string()).label(), "customDomain");
    }
}
