use sqlx::PgPool;

use crate::billing::reconciler::BillingReconciler;
use crate::billing::stripe_client::StripeClient;
use crate::config::Config;
use crate::entitlement::gate::UsageGate;
use crate::llm_client::LlmClient;

/// Shared application state injected into all route handlers via Axum
/// extractors. Built once in `main`; every component receives its
/// dependencies here rather than reaching for globals.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub llm: LlmClient,
    pub stripe: StripeClient,
    pub gate: UsageGate,
    pub reconciler: BillingReconciler,
    pub config: Config,
}
