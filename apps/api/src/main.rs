mod billing;
mod catalog;
mod config;
mod db;
mod entitlement;
mod errors;
mod llm_client;
mod models;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::billing::reconciler::BillingReconciler;
use crate::billing::stripe_client::StripeClient;
use crate::config::Config;
use crate::db::create_pool;
use crate::entitlement::gate::UsageGate;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

/// Default tracing directive scoped to this crate. The crate name must be
/// underscored here, since that is the target prefix tracing emits.
fn default_log_filter(level: &str) -> String {
    format!("{}={level}", env!("CARGO_CRATE_NAME"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_log_filter(&config.rust_log))),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Folio API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL and seed the plan catalog
    let db = create_pool(&config.database_url).await?;
    catalog::ensure_default_plans(&db).await?;

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone());
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Initialize Stripe client
    let stripe = StripeClient::new(config.stripe_secret_key.clone());
    info!("Stripe client initialized");

    // Entitlement components share the pool by value; no global client state
    let gate = UsageGate::new(db.clone());
    let reconciler = BillingReconciler::new(db.clone());

    let state = AppState {
        db,
        llm,
        stripe,
        gate,
        reconciler,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_filter_uses_underscored_crate_name() {
        // `folio-api` as a filter directive would match nothing; tracing
        // targets use the underscored module path.
        assert_eq!(default_log_filter("info"), "folio_api=info");
    }

    #[test]
    fn log_filter_carries_configured_level() {
        assert_eq!(default_log_filter("debug"), "folio_api=debug");
    }
}
