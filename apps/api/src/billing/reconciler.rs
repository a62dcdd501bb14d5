//! Billing Event Reconciler — maps authenticated gateway lifecycle events
//! onto subscription state.
//!
//! Handlers are idempotent and deliberately tolerant: an event referencing a
//! subscription we cannot locate is logged and dropped, which keeps replays
//! harmless. Each handler loads the affected row, applies one of the pure
//! transition functions below, and stores the result. The store path writes
//! plan, status, gateway subscription id and the three limit snapshots, never
//! the usage counters; only the administrative grant path resets those.
//!
//! The reconciler runs unsynchronized with the usage gate. A limit upgrade
//! and a concurrent consumption check may interleave; billing events are rare
//! enough that eventual consistency is acceptable here.

use sqlx::PgPool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::catalog;
use crate::errors::AppError;
use crate::models::plan::PlanRow;
use crate::models::subscription::{
    SubscriptionRow, FREE_AI_CREDITS, FREE_PLAN, FREE_PORTFOLIOS, FREE_RESUMES, STATUS_ACTIVE,
    STATUS_PAST_DUE,
};

use super::events::{
    BillingEvent, CheckoutSessionObject, EventKind, InvoiceObject, SubscriptionObject,
};

/// Checkout finished: assign the purchased plan, mark the row active and
/// snapshot the plan's limits. Usage counters carry over at their current
/// values, so a mid-cycle upgrade does not hand out a fresh allowance.
fn apply_checkout(
    mut sub: SubscriptionRow,
    plan: &PlanRow,
    gateway_subscription_id: Option<&str>,
) -> SubscriptionRow {
    sub.plan = plan.name.clone();
    sub.status = STATUS_ACTIVE.to_string();
    sub.stripe_subscription_id = gateway_subscription_id.map(str::to_string);
    sub.ai_credits_limit = plan.ai_credits_per_month;
    sub.portfolios_limit = plan.portfolios_limit;
    sub.resumes_limit = plan.resumes_limit;
    sub
}

/// Subscription ended upstream: back to the free tier with its limit
/// snapshots and no gateway subscription reference. Usage carries over, so
/// counters already above the free limits simply read as exhausted.
fn apply_free_downgrade(mut sub: SubscriptionRow) -> SubscriptionRow {
    sub.plan = FREE_PLAN.to_string();
    sub.status = STATUS_ACTIVE.to_string();
    sub.stripe_subscription_id = None;
    sub.ai_credits_limit = FREE_AI_CREDITS;
    sub.portfolios_limit = FREE_PORTFOLIOS;
    sub.resumes_limit = FREE_RESUMES;
    sub
}

/// Gateway-reported status change, stored verbatim. The gateway owns the
/// status vocabulary; we do not re-validate it.
fn apply_status(mut sub: SubscriptionRow, status: &str) -> SubscriptionRow {
    sub.status = status.to_string();
    sub
}

#[derive(Clone)]
pub struct BillingReconciler {
    pool: PgPool,
}

impl BillingReconciler {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn handle(&self, event: BillingEvent) -> Result<(), AppError> {
        debug!(
            "processing billing event '{}' (id {:?})",
            event.kind, event.id
        );
        match EventKind::parse(&event.kind) {
            EventKind::CheckoutCompleted => {
                let session: CheckoutSessionObject = decode(event.data.object)?;
                self.on_checkout_completed(session).await
            }
            EventKind::SubscriptionUpdated => {
                let sub: SubscriptionObject = decode(event.data.object)?;
                self.on_subscription_updated(sub).await
            }
            EventKind::SubscriptionDeleted => {
                let sub: SubscriptionObject = decode(event.data.object)?;
                self.on_subscription_deleted(sub).await
            }
            EventKind::InvoicePaymentSucceeded => {
                let invoice: InvoiceObject = decode(event.data.object)?;
                self.on_payment_succeeded(invoice).await
            }
            EventKind::InvoicePaymentFailed => {
                let invoice: InvoiceObject = decode(event.data.object)?;
                self.on_payment_failed(invoice).await
            }
            EventKind::Unknown => {
                debug!("Unhandled billing event type '{}'", event.kind);
                Ok(())
            }
        }
    }

    async fn on_checkout_completed(&self, session: CheckoutSessionObject) -> Result<(), AppError> {
        let (Some(user_id), Some(plan_name)) = (
            session.metadata.user_uuid(),
            session.metadata.plan_name.as_deref(),
        ) else {
            warn!(
                "checkout.session.completed {} missing userId/planName metadata",
                session.id
            );
            return Ok(());
        };

        let Some(plan) = catalog::get_plan(&self.pool, plan_name).await? else {
            warn!("checkout.session.completed references unknown plan '{plan_name}'");
            return Ok(());
        };

        let Some(sub) = self.find_by_user(user_id).await? else {
            warn!("checkout.session.completed for user {user_id} with no subscription row");
            return Ok(());
        };

        self.store(&apply_checkout(sub, &plan, session.subscription.as_deref()))
            .await
    }

    async fn on_subscription_updated(&self, sub: SubscriptionObject) -> Result<(), AppError> {
        let Some(row) = self.find_by_customer(&sub.customer).await? else {
            warn!("subscription.updated for unknown customer {}", sub.customer);
            return Ok(());
        };
        self.store(&apply_status(row, &sub.status)).await
    }

    async fn on_subscription_deleted(&self, sub: SubscriptionObject) -> Result<(), AppError> {
        let Some(row) = self.find_by_customer(&sub.customer).await? else {
            warn!("subscription.deleted for unknown customer {}", sub.customer);
            return Ok(());
        };
        self.store(&apply_free_downgrade(row)).await
    }

    /// Successful payment: append a ledger entry. No subscription mutation.
    async fn on_payment_succeeded(&self, invoice: InvoiceObject) -> Result<(), AppError> {
        let Some(sub) = self.find_by_customer(&invoice.customer).await? else {
            warn!(
                "invoice.payment_succeeded for unknown customer {}",
                invoice.customer
            );
            return Ok(());
        };

        sqlx::query(
            r#"
            INSERT INTO transactions
                (user_id, subscription_id, amount, currency, status, gateway,
                 gateway_transaction_id, gateway_invoice_id, description, tx_type)
            VALUES ($1, $2, $3, $4, 'completed', 'stripe', $5, $6, $7, 'subscription')
            "#,
        )
        .bind(sub.user_id)
        .bind(sub.id)
        .bind(invoice.amount_major())
        .bind(invoice.currency.to_uppercase())
        .bind(invoice.transaction_reference())
        .bind(&invoice.id)
        .bind(format!("Subscription payment - {}", sub.plan))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn on_payment_failed(&self, invoice: InvoiceObject) -> Result<(), AppError> {
        let Some(row) = self.find_by_customer(&invoice.customer).await? else {
            warn!(
                "invoice.payment_failed for unknown customer {}",
                invoice.customer
            );
            return Ok(());
        };
        self.store(&apply_status(row, STATUS_PAST_DUE)).await
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<SubscriptionRow>, AppError> {
        let sub: Option<SubscriptionRow> =
            sqlx::query_as("SELECT * FROM subscriptions WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(sub)
    }

    async fn find_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<SubscriptionRow>, AppError> {
        let sub: Option<SubscriptionRow> =
            sqlx::query_as("SELECT * FROM subscriptions WHERE stripe_customer_id = $1")
                .bind(customer_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(sub)
    }

    /// Persist a transitioned row. Writes only the billing-owned columns;
    /// usage counters are out of bounds for this path.
    async fn store(&self, sub: &SubscriptionRow) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE subscriptions
            SET plan = $2,
                status = $3,
                stripe_subscription_id = $4,
                ai_credits_limit = $5,
                portfolios_limit = $6,
                resumes_limit = $7,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(sub.id)
        .bind(&sub.plan)
        .bind(&sub.status)
        .bind(sub.stripe_subscription_id.as_deref())
        .bind(sub.ai_credits_limit)
        .bind(sub.portfolios_limit)
        .bind(sub.resumes_limit)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn decode<T: serde::de::DeserializeOwned>(object: serde_json::Value) -> Result<T, AppError> {
    serde_json::from_value(object)
        .map_err(|e| AppError::Validation(format!("malformed billing event object: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use crate::models::subscription::STATUS_TRIALING;

    fn make_sub() -> SubscriptionRow {
        let now = Utc::now();
        SubscriptionRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            plan: FREE_PLAN.to_string(),
            status: STATUS_ACTIVE.to_string(),
            ai_credits_used: 4,
            ai_credits_limit: FREE_AI_CREDITS,
            portfolios_used: 1,
            portfolios_limit: FREE_PORTFOLIOS,
            resumes_used: 3,
            resumes_limit: FREE_RESUMES,
            trial_ends_at: None,
            trial_days_granted: None,
            stripe_customer_id: Some("cus_1".to_string()),
            stripe_subscription_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn make_pro_plan() -> PlanRow {
        PlanRow {
            id: Uuid::new_v4(),
            name: "pro".to_string(),
            display_name: "Professional".to_string(),
            description: String::new(),
            monthly_price: 9.99,
            yearly_price: 99.99,
            currency: "USD".to_string(),
            features: json!({"analytics": true}),
            ai_credits_per_month: 50,
            portfolios_limit: 10,
            resumes_limit: 10,
            stripe_monthly_price_id: None,
            stripe_yearly_price_id: None,
            is_active: true,
            sort_order: 1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_checkout_overwrites_limits_but_keeps_usage() {
        let before = make_sub();
        let after = apply_checkout(before.clone(), &make_pro_plan(), Some("sub_9"));

        assert_eq!(after.plan, "pro");
        assert_eq!(after.status, STATUS_ACTIVE);
        assert_eq!(after.stripe_subscription_id.as_deref(), Some("sub_9"));
        assert_eq!(after.ai_credits_limit, 50);
        assert_eq!(after.portfolios_limit, 10);
        assert_eq!(after.resumes_limit, 10);

        // Counters already spent on the old plan are not handed back.
        assert_eq!(after.ai_credits_used, before.ai_credits_used);
        assert_eq!(after.portfolios_used, before.portfolios_used);
        assert_eq!(after.resumes_used, before.resumes_used);
    }

    #[test]
    fn test_downgrade_resets_limits_and_gateway_ref_not_usage() {
        let mut sub = make_sub();
        sub.plan = "pro".to_string();
        sub.ai_credits_limit = 50;
        sub.portfolios_limit = 10;
        sub.resumes_limit = 10;
        sub.ai_credits_used = 37;
        sub.stripe_subscription_id = Some("sub_9".to_string());

        let after = apply_free_downgrade(sub);
        assert_eq!(after.plan, FREE_PLAN);
        assert_eq!(after.status, STATUS_ACTIVE);
        assert!(after.stripe_subscription_id.is_none());
        assert_eq!(after.ai_credits_limit, FREE_AI_CREDITS);
        assert_eq!(after.portfolios_limit, FREE_PORTFOLIOS);
        assert_eq!(after.resumes_limit, FREE_RESUMES);
        // 37 used against a limit of 5: the account simply reads exhausted.
        assert_eq!(after.ai_credits_used, 37);
    }

    #[test]
    fn test_status_update_is_stored_verbatim() {
        let after = apply_status(make_sub(), "incomplete_expired");
        assert_eq!(after.status, "incomplete_expired");

        let after = apply_status(make_sub(), STATUS_TRIALING);
        assert_eq!(after.status, STATUS_TRIALING);
    }

    #[test]
    fn test_payment_failed_transition_is_idempotent() {
        let once = apply_status(make_sub(), STATUS_PAST_DUE);
        let twice = apply_status(once.clone(), STATUS_PAST_DUE);
        assert_eq!(once.status, twice.status);
        assert_eq!(once.ai_credits_used, twice.ai_credits_used);
        assert_eq!(once.plan, twice.plan);
    }

    #[test]
    fn test_checkout_without_gateway_ref_clears_it() {
        let mut sub = make_sub();
        sub.stripe_subscription_id = Some("sub_old".to_string());
        let after = apply_checkout(sub, &make_pro_plan(), None);
        assert!(after.stripe_subscription_id.is_none());
    }
}
