//! Stripe REST client — the single point of entry for outbound calls to the
//! payment gateway. Requests are form-encoded per the Stripe API; responses
//! and error bodies are decoded with serde.

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;
use uuid::Uuid;

use crate::errors::AppError;

const STRIPE_API_URL: &str = "https://api.stripe.com/v1";

#[derive(Debug, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: String,
}

/// Inputs for a subscription checkout session.
pub struct CheckoutParams {
    pub customer_id: String,
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
    pub user_id: Uuid,
    pub plan_name: String,
    pub billing_period: String,
}

#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
}

impl StripeClient {
    pub fn new(secret_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            secret_key,
        }
    }

    pub async fn create_customer(
        &self,
        email: &str,
        user_id: Uuid,
    ) -> Result<StripeCustomer, AppError> {
        let form = vec![
            ("email".to_string(), email.to_string()),
            ("metadata[userId]".to_string(), user_id.to_string()),
        ];
        self.post_form("/customers", &form).await
    }

    pub async fn create_checkout_session(
        &self,
        params: &CheckoutParams,
    ) -> Result<StripeCheckoutSession, AppError> {
        self.post_form("/checkout/sessions", &checkout_form(params))
            .await
    }

    /// Flags the gateway subscription to end at the period boundary instead
    /// of cancelling immediately.
    pub async fn cancel_at_period_end(&self, subscription_id: &str) -> Result<(), AppError> {
        let form = vec![("cancel_at_period_end".to_string(), "true".to_string())];
        let _: serde_json::Value = self
            .post_form(&format!("/subscriptions/{subscription_id}"), &form)
            .await?;
        Ok(())
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, AppError> {
        let response = self
            .client
            .post(format!("{STRIPE_API_URL}{path}"))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::Billing(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorBody>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(AppError::Billing(format!("{path} returned {status}: {message}")));
        }

        debug!("Stripe call succeeded: POST {path}");
        response
            .json()
            .await
            .map_err(|e| AppError::Billing(format!("malformed response from {path}: {e}")))
    }
}

fn checkout_form(params: &CheckoutParams) -> Vec<(String, String)> {
    vec![
        ("customer".to_string(), params.customer_id.clone()),
        ("mode".to_string(), "subscription".to_string()),
        ("payment_method_types[0]".to_string(), "card".to_string()),
        ("line_items[0][price]".to_string(), params.price_id.clone()),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        ("success_url".to_string(), params.success_url.clone()),
        ("cancel_url".to_string(), params.cancel_url.clone()),
        ("metadata[userId]".to_string(), params.user_id.to_string()),
        ("metadata[planName]".to_string(), params.plan_name.clone()),
        (
            "metadata[billingPeriod]".to_string(),
            params.billing_period.clone(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_form_carries_metadata() {
        let user_id = Uuid::new_v4();
        let params = CheckoutParams {
            customer_id: "cus_123".to_string(),
            price_id: "price_abc".to_string(),
            success_url: "https://app.example/dashboard".to_string(),
            cancel_url: "https://app.example/pricing".to_string(),
            user_id,
            plan_name: "pro".to_string(),
            billing_period: "yearly".to_string(),
        };

        let form = checkout_form(&params);
        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("customer"), Some("cus_123"));
        assert_eq!(get("mode"), Some("subscription"));
        assert_eq!(get("line_items[0][price]"), Some("price_abc"));
        assert_eq!(get("metadata[userId]"), Some(user_id.to_string().as_str()));
        assert_eq!(get("metadata[planName]"), Some("pro"));
        assert_eq!(get("metadata[billingPeriod]"), Some("yearly"));
    }
}
