//! Payment-gateway webhook payloads. Events arriving here have already been
//! authenticated upstream; this module only decodes the Stripe wire shapes
//! the reconciler consumes.

use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

/// An envelope as delivered by the gateway: an event type string plus the
/// affected object.
#[derive(Debug, Deserialize)]
pub struct BillingEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: EventData,
}

#[derive(Debug, Deserialize)]
pub struct EventData {
    pub object: Value,
}

/// The lifecycle events the reconciler acts on. Everything else is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    CheckoutCompleted,
    SubscriptionUpdated,
    SubscriptionDeleted,
    InvoicePaymentSucceeded,
    InvoicePaymentFailed,
    Unknown,
}

impl EventKind {
    pub fn parse(kind: &str) -> Self {
        match kind {
            "checkout.session.completed" => EventKind::CheckoutCompleted,
            "customer.subscription.updated" => EventKind::SubscriptionUpdated,
            "customer.subscription.deleted" => EventKind::SubscriptionDeleted,
            "invoice.payment_succeeded" => EventKind::InvoicePaymentSucceeded,
            "invoice.payment_failed" => EventKind::InvoicePaymentFailed,
            _ => EventKind::Unknown,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    /// Gateway-assigned subscription reference created by the session.
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub metadata: CheckoutMetadata,
}

/// Metadata we attach when creating the session; echoed back in the event.
///
/// `userId` is kept as a raw string so a mangled value degrades to a logged
/// no-op instead of failing the whole event decode and triggering gateway
/// redelivery.
#[derive(Debug, Default, Deserialize)]
pub struct CheckoutMetadata {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    #[serde(rename = "planName")]
    pub plan_name: Option<String>,
    #[serde(rename = "billingPeriod")]
    pub billing_period: Option<String>,
}

impl CheckoutMetadata {
    /// Parsed user id, warn-logging and returning `None` on malformed input.
    pub fn user_uuid(&self) -> Option<Uuid> {
        let raw = self.user_id.as_deref()?;
        match Uuid::parse_str(raw) {
            Ok(id) => Some(id),
            Err(_) => {
                tracing::warn!(user_id = raw, "checkout metadata carries malformed userId");
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionObject {
    pub id: String,
    pub customer: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceObject {
    pub id: String,
    pub customer: String,
    /// Minor currency units as reported by the gateway.
    pub amount_paid: i64,
    pub currency: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
}

impl InvoiceObject {
    /// Ledger amounts are stored in major units.
    pub fn amount_major(&self) -> f64 {
        self.amount_paid as f64 / 100.0
    }

    /// Payment intent when present, otherwise the invoice id.
    pub fn transaction_reference(&self) -> &str {
        self.payment_intent.as_deref().unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_kind_mapping() {
        assert_eq!(
            EventKind::parse("checkout.session.completed"),
            EventKind::CheckoutCompleted
        );
        assert_eq!(
            EventKind::parse("customer.subscription.updated"),
            EventKind::SubscriptionUpdated
        );
        assert_eq!(
            EventKind::parse("customer.subscription.deleted"),
            EventKind::SubscriptionDeleted
        );
        assert_eq!(
            EventKind::parse("invoice.payment_succeeded"),
            EventKind::InvoicePaymentSucceeded
        );
        assert_eq!(
            EventKind::parse("invoice.payment_failed"),
            EventKind::InvoicePaymentFailed
        );
        assert_eq!(EventKind::parse("charge.refunded"), EventKind::Unknown);
    }

    #[test]
    fn test_decode_checkout_event() {
        let user_id = Uuid::new_v4();
        let raw = json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {
                "object": {
                    "id": "cs_test_123",
                    "customer": "cus_456",
                    "subscription": "sub_789",
                    "metadata": {
                        "userId": user_id.to_string(),
                        "planName": "pro",
                        "billingPeriod": "monthly"
                    }
                }
            }
        });

        let event: BillingEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(event.kind, "checkout.session.completed");

        let session: CheckoutSessionObject = serde_json::from_value(event.data.object).unwrap();
        assert_eq!(session.metadata.user_uuid(), Some(user_id));
        assert_eq!(session.metadata.plan_name.as_deref(), Some("pro"));
        assert_eq!(session.subscription.as_deref(), Some("sub_789"));
    }

    #[test]
    fn test_malformed_user_id_decodes_but_yields_none() {
        // A mangled userId must not fail the decode; the reconciler drops the
        // event instead of bouncing it back for redelivery.
        let raw = json!({
            "id": "cs_2",
            "metadata": {"userId": "not-a-uuid", "planName": "pro"}
        });
        let session: CheckoutSessionObject = serde_json::from_value(raw).unwrap();
        assert_eq!(session.metadata.user_id.as_deref(), Some("not-a-uuid"));
        assert!(session.metadata.user_uuid().is_none());
        assert_eq!(session.metadata.plan_name.as_deref(), Some("pro"));
    }

    #[test]
    fn test_decode_checkout_without_metadata() {
        let raw = json!({"id": "cs_1"});
        let session: CheckoutSessionObject = serde_json::from_value(raw).unwrap();
        assert!(session.metadata.user_id.is_none());
        assert!(session.metadata.plan_name.is_none());
    }

    #[test]
    fn test_invoice_minor_to_major_units() {
        let invoice = InvoiceObject {
            id: "in_1".to_string(),
            customer: "cus_1".to_string(),
            amount_paid: 999,
            currency: "usd".to_string(),
            payment_intent: Some("pi_1".to_string()),
        };
        assert_eq!(invoice.amount_major(), 9.99);
        assert_eq!(invoice.transaction_reference(), "pi_1");
    }

    #[test]
    fn test_invoice_reference_falls_back_to_invoice_id() {
        let invoice = InvoiceObject {
            id: "in_2".to_string(),
            customer: "cus_1".to_string(),
            amount_paid: 0,
            currency: "usd".to_string(),
            payment_intent: None,
        };
        assert_eq!(invoice.transaction_reference(), "in_2");
    }
}
