//! Usage Gate — loads (or lazily creates) the caller's subscription, runs the
//! evaluator, and persists counter consumption before the protected handler
//! logic runs.
//!
//! Counter writes are single guarded UPDATEs (`SET used = used + q WHERE
//! used + q <= limit`), so two concurrent requests can never both be granted
//! the last unit of quota: the losing request sees zero rows affected,
//! re-reads, and is denied with fresh counters. Lazy creation uses
//! `ON CONFLICT DO NOTHING` for the same reason.
//!
//! Known limitation, kept on purpose: consumption is committed before the
//! gated operation executes, so a downstream failure does not refund the
//! counter.

use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::catalog;
use crate::entitlement::evaluator::{
    evaluate, CounterKind, CounterUpdate, DenyReason, UsageCheck, UsageDecision,
};
use crate::errors::AppError;
use crate::models::subscription::{
    SubscriptionRow, FREE_AI_CREDITS, FREE_PLAN, FREE_PORTFOLIOS, FREE_RESUMES, STATUS_ACTIVE,
};

#[derive(Clone)]
pub struct UsageGate {
    pool: PgPool,
}

impl UsageGate {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Checks and, for counter checks, consumes quota. Returns `Ok(())` when
    /// the protected operation may proceed.
    pub async fn check(&self, user_id: Uuid, check: UsageCheck) -> Result<(), AppError> {
        let sub = self.load_or_create(user_id).await?;

        let plan = match &check {
            UsageCheck::Feature(_) => catalog::get_plan(&self.pool, &sub.plan).await?,
            _ => None,
        };

        match evaluate(Some(&sub), plan.as_ref(), &check)? {
            UsageDecision::Allow(None) => Ok(()),
            UsageDecision::Allow(Some(update)) => self.consume(user_id, &check, update).await,
            UsageDecision::Deny(reason) => Err(deny_to_error(reason, &check)),
        }
    }

    /// Loads the subscription, creating the free-tier default row on first
    /// contact. The insert is conflict-tolerant so concurrent first requests
    /// converge on a single row.
    pub async fn load_or_create(&self, user_id: Uuid) -> Result<SubscriptionRow, AppError> {
        if let Some(sub) = self.load(user_id).await? {
            return Ok(sub);
        }

        debug!("Creating default free subscription for user {user_id}");
        sqlx::query(
            r#"
            INSERT INTO subscriptions
                (user_id, plan, status, ai_credits_limit, portfolios_limit, resumes_limit)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(FREE_PLAN)
        .bind(STATUS_ACTIVE)
        .bind(FREE_AI_CREDITS)
        .bind(FREE_PORTFOLIOS)
        .bind(FREE_RESUMES)
        .execute(&self.pool)
        .await?;

        let sub = self
            .load(user_id)
            .await?
            .ok_or_else(|| AppError::Configuration(format!("subscription row for user {user_id} vanished after insert")))?;
        Ok(sub)
    }

    pub async fn load(&self, user_id: Uuid) -> Result<Option<SubscriptionRow>, AppError> {
        let sub: Option<SubscriptionRow> =
            sqlx::query_as("SELECT * FROM subscriptions WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(sub)
    }

    /// Persists an allowed counter consumption atomically. The WHERE clause
    /// repeats the evaluator's predicate against the live row, which is the
    /// actual decision authority under concurrency; the snapshot evaluation
    /// above is advisory.
    async fn consume(
        &self,
        user_id: Uuid,
        check: &UsageCheck,
        update: CounterUpdate,
    ) -> Result<(), AppError> {
        let quantity = match check {
            UsageCheck::AiCredits { quantity } => *quantity,
            _ => 1,
        };

        let query = match update.counter {
            CounterKind::AiCredits => {
                r#"
                UPDATE subscriptions
                SET ai_credits_used = ai_credits_used + $2, updated_at = now()
                WHERE user_id = $1 AND ai_credits_used + $2 <= ai_credits_limit
                "#
            }
            CounterKind::Portfolios => {
                r#"
                UPDATE subscriptions
                SET portfolios_used = portfolios_used + $2, updated_at = now()
                WHERE user_id = $1 AND portfolios_used + $2 - 1 < portfolios_limit
                "#
            }
            CounterKind::Resumes => {
                r#"
                UPDATE subscriptions
                SET resumes_used = resumes_used + $2, updated_at = now()
                WHERE user_id = $1 AND resumes_used + $2 - 1 < resumes_limit
                "#
            }
        };

        let affected = sqlx::query(query)
            .bind(user_id)
            .bind(quantity)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 1 {
            return Ok(());
        }

        // A concurrent request consumed the remaining quota between our read
        // and this write. Re-read and deny with the live counters.
        let sub = self.load_or_create(user_id).await?;
        let (used, limit) = match update.counter {
            CounterKind::AiCredits => (sub.ai_credits_used, sub.ai_credits_limit),
            CounterKind::Portfolios => (sub.portfolios_used, sub.portfolios_limit),
            CounterKind::Resumes => (sub.resumes_used, sub.resumes_limit),
        };
        Err(AppError::QuotaExceeded {
            resource: update.counter,
            used,
            limit,
        })
    }
}

fn deny_to_error(reason: DenyReason, check: &UsageCheck) -> AppError {
    match reason {
        DenyReason::NoSubscription => AppError::NoSubscription {
            feature: check.label(),
        },
        DenyReason::LimitReached {
            counter,
            used,
            limit,
        } => AppError::QuotaExceeded {
            resource: counter,
            used,
            limit,
        },
        DenyReason::FeatureUnavailable { feature, plan } => {
            AppError::FeatureUnavailable { feature, plan }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_reached_maps_to_quota_exceeded() {
        let err = deny_to_error(
            DenyReason::LimitReached {
                counter: CounterKind::Resumes,
                used: 1,
                limit: 1,
            },
            &UsageCheck::Resume,
        );
        assert!(matches!(
            err,
            AppError::QuotaExceeded {
                resource: CounterKind::Resumes,
                used: 1,
                limit: 1,
            }
        ));
    }

    #[test]
    fn test_no_subscription_carries_check_label() {
        let err = deny_to_error(
            DenyReason::NoSubscription,
            &UsageCheck::Feature("customDomain".to_string()),
        );
        match err {
            AppError::NoSubscription { feature } => assert_eq!(feature, "customDomain"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
