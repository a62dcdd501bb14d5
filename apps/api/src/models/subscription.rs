use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Free-tier defaults applied on lazy subscription creation and on
/// billing-driven downgrade.
pub const FREE_PLAN: &str = "free";
pub const FREE_AI_CREDITS: i32 = 5;
pub const FREE_PORTFOLIOS: i32 = 1;
pub const FREE_RESUMES: i32 = 1;

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_TRIALING: &str = "trialing";
pub const STATUS_PAST_DUE: &str = "past_due";
pub const STATUS_CANCELED: &str = "canceled";

/// An account's plan assignment plus live usage counters and billing status.
/// One row per user; mutated by the usage gate, admin grants, and the
/// billing reconciler; never deleted independently of the owning user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SubscriptionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan: String,
    pub status: String,
    pub ai_credits_used: i32,
    pub ai_credits_limit: i32,
    pub portfolios_used: i32,
    pub portfolios_limit: i32,
    pub resumes_used: i32,
    pub resumes_limit: i32,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub trial_days_granted: Option<i32>,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionRow {
    /// True when a trialing subscription's trial window has closed.
    /// Only `trialing` rows expire; a paid `active` row with a stale
    /// `trial_ends_at` left over from an earlier grant is untouched.
    pub fn trial_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.trial_ends_at, Some(ends_at) if now > ends_at)
            && self.status == STATUS_TRIALING
    }
}

/// Immutable payment ledger entry, appended by the billing reconciler.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TransactionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subscription_id: Uuid,
    pub amount: f64,
    pub currency: String,
    pub status: String,
    pub gateway: String,
    pub gateway_transaction_id: Option<String>,
    pub gateway_invoice_id: Option<String>,
    pub description: Option<String>,
    pub tx_type: String,
    pub created_at: DateTime<Utc>,
}

/// Audit record for an administrator-granted trial override.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GiftedAccessRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub granted_by: Uuid,
    pub plan: String,
    pub days_granted: i32,
    pub expires_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn make_sub(status: &str, trial_ends_at: Option<DateTime<Utc>>) -> SubscriptionRow {
        let now = Utc::now();
        SubscriptionRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            plan: "pro".to_string(),
            status: status.to_string(),
            ai_credits_used: 0,
            ai_credits_limit: 50,
            portfolios_used: 0,
            portfolios_limit: 10,
            resumes_used: 0,
            resumes_limit: 10,
            trial_ends_at,
            trial_days_granted: trial_ends_at.map(|_| 7),
            stripe_customer_id: None,
            stripe_subscription_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_trialing_past_window_is_expired() {
        let now = Utc::now();
        let sub = make_sub(STATUS_TRIALING, Some(now - Duration::days(1)));
        assert!(sub.trial_expired(now));
    }

    #[test]
    fn test_trialing_within_window_is_not_expired() {
        let now = Utc::now();
        let sub = make_sub(STATUS_TRIALING, Some(now + Duration::days(3)));
        assert!(!sub.trial_expired(now));
    }

    #[test]
    fn test_active_with_stale_trial_timestamp_is_not_expired() {
        let now = Utc::now();
        let sub = make_sub(STATUS_ACTIVE, Some(now - Duration::days(30)));
        assert!(!sub.trial_expired(now));
    }

    #[test]
    fn test_no_trial_timestamp_never_expires() {
        let sub = make_sub(STATUS_TRIALING, None);
        assert!(!sub.trial_expired(Utc::now()));
    }
}
