//! Cashfree payment webhook processing
//!
//! Verifies the HMAC signature, maps the provider payload onto a
//! subscription update and applies it to the subscription store.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::storage::{Subscription, SubscriptionStore, SubscriptionUpdate, StorageError};

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";
pub const LEGACY_SIGNATURE_HEADER: &str = "x-cashfree-signature";

const DEFAULT_EVENT: &str = "payment.updated";
const CAPTURED_EVENT: &str = "payment.captured";
const DEFAULT_CURRENCY: &str = "INR";
const DEFAULT_PLAN: &str = "default";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Invalid webhook signature")]
    InvalidSignature,
    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    #[error("Missing customerId")]
    MissingCustomerId,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Check `signature` against base64(HMAC-SHA256(secret, body))
pub fn verify_signature(
    secret: &str,
    body: &[u8],
    signature: Option<&str>,
) -> Result<(), WebhookError> {
    let signature = signature.ok_or(WebhookError::InvalidSignature)?;
    let expected = STANDARD
        .decode(signature.trim())
        .map_err(|_| WebhookError::InvalidSignature)?;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::InvalidSignature)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| WebhookError::InvalidSignature)
}

/// Compute the signature a sender would attach to `body`
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(body);
    STANDARD.encode(mac.finalize().into_bytes())
}

/// Normalised view of a Cashfree webhook body
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentEvent {
    pub event: String,
    pub order_id: Option<String>,
    pub payment_status: String,
    pub amount: f64,
    pub currency: String,
    pub payment_id: Option<String>,
    pub plan_id: String,
    pub customer_id: Option<String>,
}

impl PaymentEvent {
    /// Accepts both the nested (`data.order`, `data.payment`) layout and a
    /// flat one; empty strings, zero and null count as absent.
    pub fn from_payload(body: &Value) -> Self {
        let data = present(body.get("data")).unwrap_or(body);
        let order = data.get("order");
        let payment = present(data.get("payment")).unwrap_or(data);

        let event = first_string(&[body.get("type"), body.get("event")])
            .unwrap_or_else(|| DEFAULT_EVENT.to_string());
        let order_id = first_string(&[at(order, "order_id"), data.get("order_id")]);
        let payment_status =
            first_string(&[payment.get("payment_status"), payment.get("status")])
                .unwrap_or_default()
                .to_uppercase();
        let amount = first_present(&[
            payment.get("payment_amount"),
            payment.get("amount"),
            at(order, "order_amount"),
        ])
        .map(parse_amount)
        .unwrap_or(0.0);
        let currency = first_string(&[payment.get("payment_currency"), at(order, "order_currency")])
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
        let payment_id = first_string(&[
            payment.get("cf_payment_id"),
            payment.get("payment_id"),
            payment.get("id"),
        ]);
        let plan_id = first_string(&[
            at(order.and_then(|o| o.get("order_meta")), "plan_id"),
            at(data.get("order_meta"), "plan_id"),
        ])
        .unwrap_or_else(|| DEFAULT_PLAN.to_string());
        let customer_id = first_string(&[
            at(data.get("customer_details"), "customer_id"),
            data.get("customer_id"),
            at(data.get("customer"), "id"),
        ]);

        Self {
            event,
            order_id,
            payment_status,
            amount,
            currency,
            payment_id,
            plan_id,
            customer_id,
        }
    }

    pub fn is_successful(&self) -> bool {
        matches!(self.payment_status.as_str(), "SUCCESS" | "PAID") || self.event == CAPTURED_EVENT
    }

    pub fn subscription_update(&self) -> Result<SubscriptionUpdate, WebhookError> {
        let user_id = self
            .customer_id
            .clone()
            .ok_or(WebhookError::MissingCustomerId)?;
        Ok(SubscriptionUpdate {
            user_id,
            plan_id: self.plan_id.clone(),
            amount: self.amount,
            currency: self.currency.clone(),
            payment_id: self.payment_id.clone(),
            order_id: self.order_id.clone(),
            auto_renew: true,
        })
    }
}

/// Result of a processed webhook
#[derive(Debug)]
pub enum WebhookOutcome {
    Activated(Subscription),
    Ignored { event: String, payment_status: String },
}

/// Verify, parse and apply one webhook delivery
pub async fn process_webhook(
    store: &dyn SubscriptionStore,
    secret: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
) -> Result<WebhookOutcome, WebhookError> {
    if let Some(secret) = secret.filter(|s| !s.is_empty()) {
        if let Err(e) = verify_signature(secret, body, signature) {
            warn!("Invalid Cashfree webhook signature");
            return Err(e);
        }
    }

    let payload: Value = serde_json::from_slice(body)?;
    let event = PaymentEvent::from_payload(&payload);
    debug!(?event, "Parsed Cashfree webhook");

    let update = event.subscription_update()?;

    if !event.is_successful() {
        info!(
            event = %event.event,
            payment_status = %event.payment_status,
            customer_id = %update.user_id,
            "Webhook acknowledged without subscription change"
        );
        return Ok(WebhookOutcome::Ignored {
            event: event.event,
            payment_status: event.payment_status,
        });
    }

    let subscription = store.upsert_active(update).await?;
    info!(
        customer_id = %subscription.user_id,
        plan_id = %subscription.plan_id,
        order_id = ?subscription.order_id,
        "Subscription activated from payment webhook"
    );
    Ok(WebhookOutcome::Activated(subscription))
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| is_present(v))
}

fn at<'a>(parent: Option<&'a Value>, key: &str) -> Option<&'a Value> {
    parent.and_then(|p| p.get(key))
}

fn first_present<'a>(candidates: &[Option<&'a Value>]) -> Option<&'a Value> {
    candidates.iter().copied().find_map(present)
}

fn first_string(candidates: &[Option<&Value>]) -> Option<String> {
    first_present(candidates).and_then(|value| match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn parse_amount(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => leading_number(s).unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Longest numeric prefix of `s`, so `"499.00 INR"` reads as 499
fn leading_number(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let end = s
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')))
        .unwrap_or(s.len());
    let numeric = &s[..end];
    (1..=numeric.len())
        .rev()
        .find_map(|len| numeric[..len].parse::<f64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemorySubscriptionStore;
    use serde_json::json;

    fn captured_payload() -> Value {
        json!({
            "type": "payment.captured",
            "data": {
                "order": {
                    "order_id": "order_123",
                    "order_amount": "499",
                    "order_currency": "INR",
                    "order_meta": { "plan_id": "premium_monthly" }
                },
                "payment": {
                    "payment_status": "SUCCESS",
                    "payment_amount": "499",
                    "payment_currency": "INR",
                    "cf_payment_id": "pay_abc"
                },
                "customer_details": { "customer_id": "user-123" }
            }
        })
    }

    #[test]
    fn test_parse_nested_payload() {
        let event = PaymentEvent::from_payload(&captured_payload());

        assert_eq!(event.event, "payment.captured");
        assert_eq!(event.order_id.as_deref(), Some("order_123"));
        assert_eq!(event.payment_status, "SUCCESS");
        assert_eq!(event.amount, 499.0);
        assert_eq!(event.currency, "INR");
        assert_eq!(event.payment_id.as_deref(), Some("pay_abc"));
        assert_eq!(event.plan_id, "premium_monthly");
        assert_eq!(event.customer_id.as_deref(), Some("user-123"));
        assert!(event.is_successful());
    }

    #[test]
    fn test_parse_flat_payload_with_defaults() {
        let body = json!({
            "event": "payment.updated",
            "order_id": "order_9",
            "status": "paid",
            "amount": 199.5,
            "payment_id": 987654,
            "customer_id": "user-9"
        });

        let event = PaymentEvent::from_payload(&body);
        assert_eq!(event.order_id.as_deref(), Some("order_9"));
        assert_eq!(event.payment_status, "PAID");
        assert_eq!(event.amount, 199.5);
        assert_eq!(event.currency, "INR");
        assert_eq!(event.payment_id.as_deref(), Some("987654"));
        assert_eq!(event.plan_id, "default");
        assert!(event.is_successful());
    }

    #[test]
    fn test_parse_empty_payload() {
        let event = PaymentEvent::from_payload(&json!({}));

        assert_eq!(event.event, "payment.updated");
        assert_eq!(event.payment_status, "");
        assert_eq!(event.amount, 0.0);
        assert!(event.customer_id.is_none());
        assert!(!event.is_successful());
        assert!(matches!(
            event.subscription_update(),
            Err(WebhookError::MissingCustomerId)
        ));
    }

    #[test]
    fn test_unparseable_amount_is_zero() {
        let body = json!({ "customer_id": "u", "amount": "not-a-number" });
        assert_eq!(PaymentEvent::from_payload(&body).amount, 0.0);
    }

    #[test]
    fn test_amount_reads_leading_number() {
        let body = json!({ "customer_id": "u", "amount": "499.00 INR" });
        assert_eq!(PaymentEvent::from_payload(&body).amount, 499.0);

        let body = json!({ "customer_id": "u", "amount": " 12.5e1xyz" });
        assert_eq!(PaymentEvent::from_payload(&body).amount, 125.0);

        let body = json!({ "customer_id": "u", "amount": "99-" });
        assert_eq!(PaymentEvent::from_payload(&body).amount, 99.0);

        let body = json!({ "customer_id": "u", "amount": "INR 499" });
        assert_eq!(PaymentEvent::from_payload(&body).amount, 0.0);
    }

    #[test]
    fn test_signature_roundtrip_and_rejection() {
        let body = br#"{"type":"payment.captured"}"#;
        let signature = sign("whsec", body);

        assert!(verify_signature("whsec", body, Some(&signature)).is_ok());
        assert!(verify_signature("other", body, Some(&signature)).is_err());
        assert!(verify_signature("whsec", b"{}", Some(&signature)).is_err());
        assert!(verify_signature("whsec", body, Some("not base64!")).is_err());
        assert!(verify_signature("whsec", body, None).is_err());
    }

    #[tokio::test]
    async fn test_process_successful_payment_activates_subscription() {
        let store = MemorySubscriptionStore::new();
        let body = serde_json::to_vec(&captured_payload()).unwrap();

        let outcome = process_webhook(&store, None, None, &body).await.unwrap();
        let WebhookOutcome::Activated(subscription) = outcome else {
            panic!("expected activation");
        };
        assert_eq!(subscription.user_id, "user-123");
        assert_eq!(subscription.plan_id, "premium_monthly");
        assert_eq!(subscription.amount, 499.0);
        assert_eq!(subscription.order_id.as_deref(), Some("order_123"));
        assert!(subscription.auto_renew);

        assert!(store.get_by_user_id("user-123").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_process_failed_payment_is_ignored() {
        let store = MemorySubscriptionStore::new();
        let body = serde_json::to_vec(&json!({
            "type": "payment.failed",
            "data": {
                "payment": { "payment_status": "FAILED" },
                "customer_details": { "customer_id": "user-1" }
            }
        }))
        .unwrap();

        let outcome = process_webhook(&store, None, None, &body).await.unwrap();
        assert!(matches!(outcome, WebhookOutcome::Ignored { .. }));
        assert!(store.get_by_user_id("user-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_process_requires_signature_when_secret_set() {
        let store = MemorySubscriptionStore::new();
        let body = serde_json::to_vec(&captured_payload()).unwrap();

        let result = process_webhook(&store, Some("whsec"), Some("bogus"), &body).await;
        assert!(matches!(result, Err(WebhookError::InvalidSignature)));

        let signature = sign("whsec", &body);
        let result = process_webhook(&store, Some("whsec"), Some(&signature), &body).await;
        assert!(matches!(result, Ok(WebhookOutcome::Activated(_))));
    }

    #[tokio::test]
    async fn test_process_rejects_malformed_json() {
        let store = MemorySubscriptionStore::new();
        let result = process_webhook(&store, None, None, b"{not json").await;
        assert!(matches!(result, Err(WebhookError::InvalidPayload(_))));
    }
}
