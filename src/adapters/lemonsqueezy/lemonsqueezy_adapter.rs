//! Lemon Squeezy implementation of the `PaymentProvider` port.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use super::pricing::LsPrice;
use super::webhook_types::{
    LsDocument, LsId, LsOrder, LsOrderItem, LsSubscription, LsSubscriptionInvoice, LsWebhook,
};
use crate::config::ProviderConfig;
use crate::domain::billing::signature::{constant_time_eq, hmac_sha256};
use crate::domain::billing::{
    non_empty, normalize_currency, BillingError, EventType, NormalizedEvent, SubscriptionStatus,
};
use crate::domain::foundation::Timestamp;
use crate::ports::{PaymentProvider, ProviderHttpClient, SubscriptionInfo, WebhookRequest};

/// Default Lemon Squeezy API host.
pub const DEFAULT_API_BASE_URL: &str = "https://api.lemonsqueezy.com";

/// Header carrying the hex HMAC of the body.
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Subscriptions and order items carry no currency of their own.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Lemon Squeezy webhook and API adapter.
pub struct LemonSqueezyProvider {
    name: String,
    webhook_secret: SecretString,
    api_key: SecretString,
    api_base_url: String,
    http: Arc<dyn ProviderHttpClient>,
}

/// Maps a Lemon Squeezy `event_name` onto the normalized vocabulary.
pub fn map_event_type(event_name: &str) -> EventType {
    match event_name {
        "subscription_created" => EventType::SubscriptionCreated,
        "subscription_updated" | "subscription_plan_changed" => EventType::SubscriptionUpdated,
        "subscription_cancelled" => EventType::SubscriptionCancelled,
        "subscription_resumed" | "subscription_unpaused" => EventType::SubscriptionResumed,
        "subscription_expired" => EventType::SubscriptionExpired,
        "subscription_paused" => EventType::SubscriptionPaused,
        "subscription_payment_success" | "subscription_payment_recovered" => {
            EventType::PaymentSucceeded
        }
        "subscription_payment_failed" => EventType::PaymentFailed,
        "subscription_payment_refunded" | "order_refunded" => EventType::PaymentRefunded,
        "order_created" => EventType::PaymentSucceeded,
        other => EventType::Other(other.to_string()),
    }
}

/// Status implied by a subscription payment event.
fn payment_status(event_name: &str) -> Option<SubscriptionStatus> {
    match event_name {
        "subscription_payment_success" | "subscription_payment_recovered" => {
            Some(SubscriptionStatus::Active)
        }
        "subscription_payment_failed" => Some(SubscriptionStatus::PastDue),
        _ => None,
    }
}

fn parse_time(value: Option<&str>) -> Option<Timestamp> {
    value.and_then(Timestamp::parse_rfc3339)
}

fn from_attributes<T: DeserializeOwned>(attributes: Value) -> Result<T, BillingError> {
    serde_json::from_value(attributes).map_err(BillingError::parsing)
}

impl LemonSqueezyProvider {
    pub fn new(
        config: &ProviderConfig,
        http: Arc<dyn ProviderHttpClient>,
    ) -> Result<Self, BillingError> {
        let secret = config
            .webhook_secret()
            .ok_or_else(|| BillingError::MissingWebhookSecret(config.provider_name.clone()))?;
        Ok(Self {
            name: config.provider_name.clone(),
            webhook_secret: SecretString::new(secret.to_string()),
            api_key: SecretString::new(config.api_key().to_string()),
            api_base_url: config.api_base_url_or(DEFAULT_API_BASE_URL),
            http,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, BillingError> {
        let url = format!("{}{}", self.api_base_url, path);
        let body = self
            .http
            .get_json(&url, self.api_key.expose_secret())
            .await?;
        let document: LsDocument<T> = serde_json::from_value(body).map_err(|e| {
            tracing::warn!(path, error = %e, "Unexpected Lemon Squeezy API response");
            BillingError::parsing(format!("Lemon Squeezy response for {}: {}", path, e))
        })?;
        Ok(document.data.attributes)
    }

    /// Amount and billing interval for a subscription.
    ///
    /// The price object is authoritative when the item references one;
    /// otherwise the order item's price is used.
    async fn resolve_price(
        &self,
        sub: &LsSubscription,
    ) -> Result<(i64, Option<String>), BillingError> {
        let item = sub.first_subscription_item.as_ref();
        let quantity = item.and_then(|i| i.quantity).unwrap_or(1);

        if let Some(price_id) = item.and_then(|i| i.price_id.as_ref()) {
            let price: LsPrice = self.get(&format!("/v1/prices/{}", price_id)).await?;
            let amount = price.amount_for(quantity)?;
            tracing::debug!(%price_id, scheme = ?price.scheme, quantity, amount, "Resolved Lemon Squeezy price");
            return Ok((amount, price.renewal_interval_unit));
        }
        if let Some(order_item_id) = &sub.order_item_id {
            let order_item: LsOrderItem = self
                .get(&format!("/v1/order-items/{}", order_item_id))
                .await?;
            return Ok((order_item.price, None));
        }
        Ok((0, None))
    }

    async fn parse_subscription(
        &self,
        event: &mut NormalizedEvent,
        subscription_id: &LsId,
        sub: LsSubscription,
    ) -> Result<(), BillingError> {
        let (amount, interval) = self.resolve_price(&sub).await?;

        event.subscription_id = Some(subscription_id.to_string());
        event.customer_id = sub.customer_id.as_ref().map(LsId::to_string);
        event.customer_email = non_empty(sub.user_email.as_deref());
        event.customer_name = non_empty(sub.user_name.as_deref());
        event.status = Some(SubscriptionStatus::normalize(&sub.status));
        event.plan_name = non_empty(sub.product_name.as_deref());
        event.plan_id = sub.variant_id.as_ref().map(LsId::to_string);
        event.billing_interval = interval;
        event.amount = amount;
        event.currency = DEFAULT_CURRENCY.to_string();
        event.next_billing_date = parse_time(sub.renews_at.as_deref());
        event.available_until_date = parse_time(sub.ends_at.as_deref());
        event.trial_ends_at = parse_time(sub.trial_ends_at.as_deref());
        event.provider_created_at = parse_time(sub.created_at.as_deref());
        event.provider_updated_at = parse_time(sub.updated_at.as_deref());
        event.cancel_url = non_empty(sub.urls.customer_portal.as_deref());
        event.update_url = non_empty(sub.urls.update_payment_method.as_deref());
        if let Some(variant) = non_empty(sub.variant_name.as_deref()) {
            event.metadata.insert("variant_name".into(), variant);
        }
        if let Some(product_id) = &sub.product_id {
            event.metadata.insert("product_id".into(), product_id.to_string());
        }
        Ok(())
    }

    fn parse_invoice(
        &self,
        event: &mut NormalizedEvent,
        event_name: &str,
        invoice: LsSubscriptionInvoice,
    ) {
        event.subscription_id = invoice.subscription_id.as_ref().map(LsId::to_string);
        event.is_one_off = event.subscription_id.is_none();
        event.customer_id = invoice.customer_id.as_ref().map(LsId::to_string);
        event.customer_email = non_empty(invoice.user_email.as_deref());
        event.customer_name = non_empty(invoice.user_name.as_deref());
        event.status = payment_status(event_name);
        event.amount = if event.event_type == EventType::PaymentRefunded {
            invoice.refunded_amount
        } else {
            invoice.total
        };
        event.currency = normalize_currency(invoice.currency.as_deref().unwrap_or(DEFAULT_CURRENCY));
        event.receipt_url = non_empty(invoice.urls.invoice_url.as_deref());
        event.provider_created_at = parse_time(invoice.created_at.as_deref());
        event.provider_updated_at = parse_time(invoice.updated_at.as_deref());
        if let Some(reason) = non_empty(invoice.billing_reason.as_deref()) {
            event.metadata.insert("billing_reason".into(), reason);
        }
        if event_name == "subscription_payment_recovered" {
            event.metadata.insert("payment_recovered".into(), "true".into());
        }
    }

    fn parse_order(&self, event: &mut NormalizedEvent, order: LsOrder) {
        event.is_one_off = true;
        event.customer_id = order.customer_id.as_ref().map(LsId::to_string);
        event.customer_email = non_empty(order.user_email.as_deref());
        event.customer_name = non_empty(order.user_name.as_deref());
        event.amount = if event.event_type == EventType::PaymentRefunded {
            order.refunded_amount
        } else {
            order.total
        };
        event.currency = normalize_currency(order.currency.as_deref().unwrap_or(DEFAULT_CURRENCY));
        event.plan_name = order
            .first_order_item
            .as_ref()
            .and_then(|item| non_empty(item.product_name.as_deref()));
        event.receipt_url = non_empty(order.urls.receipt.as_deref());
        event.provider_created_at = parse_time(order.created_at.as_deref());
        event.provider_updated_at = parse_time(order.updated_at.as_deref());
    }
}

#[async_trait]
impl PaymentProvider for LemonSqueezyProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn verify(&self, request: &WebhookRequest) -> Result<(), BillingError> {
        let header = request
            .header(SIGNATURE_HEADER)
            .ok_or(BillingError::MissingSignature)?;
        let provided = hex::decode(header).map_err(|_| {
            tracing::warn!("X-Signature is not valid hex");
            BillingError::InvalidSignature
        })?;
        let expected = hmac_sha256(self.webhook_secret.expose_secret().as_bytes(), &request.body)?;
        if !constant_time_eq(&expected, &provided) {
            tracing::warn!("Invalid Lemon Squeezy webhook signature");
            return Err(BillingError::InvalidSignature);
        }
        if request.body.is_empty() {
            return Err(BillingError::InvalidPayload("empty body".into()));
        }
        Ok(())
    }

    async fn parse(&self, request: &WebhookRequest) -> Result<NormalizedEvent, BillingError> {
        let hook: LsWebhook = serde_json::from_slice(&request.body).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse Lemon Squeezy webhook payload");
            BillingError::parsing(format!("invalid JSON: {}", e))
        })?;
        let event_name = hook.meta.event_name.trim().to_string();
        if event_name.is_empty() {
            return Err(BillingError::InvalidEventType(String::new()));
        }

        let attributes = hook.data.attributes;
        let updated_at = attributes
            .get("updated_at")
            .and_then(Value::as_str)
            .or_else(|| attributes.get("created_at").and_then(Value::as_str))
            .ok_or(BillingError::MissingRequiredField("updated_at"))?
            .to_string();
        let event_time =
            Timestamp::parse_rfc3339(&updated_at).ok_or(BillingError::MissingRequiredField("updated_at"))?;

        // No delivery id exists; the resource version identifies the event.
        let event_id = format!("{}:{}:{}", event_name, hook.data.id, updated_at);
        let event_type = map_event_type(&event_name);
        let mut event = NormalizedEvent::new(event_type, event_id, event_time);
        event.raw_payload = request.body.clone();
        event
            .metadata
            .insert("test_mode".into(), hook.meta.test_mode.to_string());
        if let Some(custom) = &hook.meta.custom_data {
            for (key, value) in custom {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                event.metadata.insert(format!("custom_{}", key), value);
            }
        }

        if event_name.starts_with("subscription_payment_") {
            let invoice: LsSubscriptionInvoice = from_attributes(attributes)?;
            self.parse_invoice(&mut event, &event_name, invoice);
        } else if event_name.starts_with("subscription_") {
            let sub: LsSubscription = from_attributes(attributes)?;
            self.parse_subscription(&mut event, &hook.data.id, sub).await?;
        } else if event_name.starts_with("order_") {
            let order: LsOrder = from_attributes(attributes)?;
            self.parse_order(&mut event, order);
        } else {
            event.is_one_off = true;
            event.customer_email = non_empty(attributes.get("user_email").and_then(Value::as_str));
        }

        tracing::debug!(
            event_id = %event.event_id,
            event_type = %event.event_type.as_str(),
            resource = %hook.data.resource_type,
            "Parsed Lemon Squeezy webhook"
        );
        Ok(event)
    }

    async fn lookup_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionInfo, BillingError> {
        let sub: LsSubscription = self
            .get(&format!("/v1/subscriptions/{}", subscription_id))
            .await?;
        let (amount, _) = self.resolve_price(&sub).await?;
        Ok(SubscriptionInfo {
            subscription_id: subscription_id.to_string(),
            customer_id: sub.customer_id.as_ref().map(LsId::to_string),
            customer_email: non_empty(sub.user_email.as_deref()),
            status: SubscriptionStatus::normalize(&sub.status),
            plan_name: non_empty(sub.product_name.as_deref()),
            amount,
            currency: DEFAULT_CURRENCY.to_string(),
            next_billing_date: parse_time(sub.renews_at.as_deref()),
            cancel_url: non_empty(sub.urls.customer_portal.as_deref()),
            update_url: non_empty(sub.urls.update_payment_method.as_deref()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http_client::MockHttpClient;
    use crate::domain::billing::signature::hmac_sha256_hex;
    use http::{HeaderMap, HeaderValue};
    use serde_json::json;

    const SECRET: &str = "ls_signing_secret";

    fn provider(http: MockHttpClient) -> LemonSqueezyProvider {
        let config = ProviderConfig::new("lemonsqueezy", SECRET).with_api_key("ls_api_key");
        LemonSqueezyProvider::new(&config, Arc::new(http)).unwrap()
    }

    fn signed(body: &[u8]) -> WebhookRequest {
        let mut headers = HeaderMap::new();
        let sig = hmac_sha256_hex(SECRET.as_bytes(), body).unwrap();
        headers.insert("X-Signature", HeaderValue::from_str(&sig).unwrap());
        WebhookRequest::new(headers, body.to_vec())
    }

    fn subscription_created() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "meta": {"event_name": "subscription_created", "test_mode": true},
            "data": {"type": "subscriptions", "id": "101", "attributes": {
                "customer_id": 55,
                "order_item_id": 77,
                "variant_id": 3,
                "product_name": "Team",
                "user_name": "Dana",
                "user_email": "Dana@Example.com",
                "status": "on_trial",
                "first_subscription_item": {"id": 9, "price_id": 12, "quantity": 5},
                "urls": {
                    "update_payment_method": "https://ls.test/update",
                    "customer_portal": "https://ls.test/portal"
                },
                "renews_at": "2025-02-01T00:00:00.000000Z",
                "ends_at": null,
                "trial_ends_at": "2025-01-15T00:00:00.000000Z",
                "created_at": "2025-01-01T00:00:00.000000Z",
                "updated_at": "2025-01-01T00:00:05.000000Z"
            }}
        }))
        .unwrap()
    }

    fn graduated_price() -> MockHttpClient {
        MockHttpClient::new().with_response(
            "/v1/prices/12",
            json!({"data": {"type": "prices", "id": "12", "attributes": {
                "scheme": "graduated",
                "unit_price": null,
                "renewal_interval_unit": "month",
                "tiers": [
                    {"last_unit": 2, "unit_price": 10000, "fixed_fee": 1000},
                    {"last_unit": "inf", "unit_price": 1000, "fixed_fee": 1000}
                ]
            }}}),
        )
    }

    #[tokio::test]
    async fn verify_accepts_hex_hmac_of_body() {
        let body = subscription_created();
        assert!(provider(MockHttpClient::new()).verify(&signed(&body)).await.is_ok());
    }

    #[tokio::test]
    async fn verify_rejects_modified_body() {
        let mut request = signed(&subscription_created());
        request.body.push(b' ');
        assert_eq!(
            provider(MockHttpClient::new()).verify(&request).await,
            Err(BillingError::InvalidSignature)
        );
    }

    #[tokio::test]
    async fn verify_requires_header() {
        let request = WebhookRequest::new(HeaderMap::new(), subscription_created());
        assert_eq!(
            provider(MockHttpClient::new()).verify(&request).await,
            Err(BillingError::MissingSignature)
        );
    }

    #[tokio::test]
    async fn parse_subscription_created_with_graduated_price() {
        let http = graduated_price();
        let event = provider(http.clone())
            .parse(&signed(&subscription_created()))
            .await
            .unwrap();

        assert_eq!(event.event_type, EventType::SubscriptionCreated);
        assert_eq!(
            event.event_id,
            "subscription_created:101:2025-01-01T00:00:05.000000Z"
        );
        assert_eq!(event.subscription_id.as_deref(), Some("101"));
        assert_eq!(event.customer_id.as_deref(), Some("55"));
        assert_eq!(event.amount, 25000);
        assert_eq!(event.status, Some(SubscriptionStatus::Trialing));
        assert_eq!(event.plan_name.as_deref(), Some("Team"));
        assert_eq!(event.billing_interval.as_deref(), Some("month"));
        assert_eq!(event.cancel_url.as_deref(), Some("https://ls.test/portal"));
        assert!(event.trial_ends_at.is_some());
        assert_eq!(http.requests()[0].bearer_token, "ls_api_key");
    }

    #[tokio::test]
    async fn parse_falls_back_to_order_item_price() {
        let mut payload: Value = serde_json::from_slice(&subscription_created()).unwrap();
        payload["data"]["attributes"]["first_subscription_item"]["price_id"] = Value::Null;
        let body = serde_json::to_vec(&payload).unwrap();
        let http = MockHttpClient::new().with_response(
            "/v1/order-items/77",
            json!({"data": {"type": "order-items", "id": "77", "attributes": {
                "product_name": "Team", "price": 1999, "quantity": 1
            }}}),
        );
        let event = provider(http).parse(&signed(&body)).await.unwrap();
        assert_eq!(event.amount, 1999);
    }

    #[tokio::test]
    async fn parse_payment_failed_marks_past_due() {
        let body = serde_json::to_vec(&json!({
            "meta": {"event_name": "subscription_payment_failed"},
            "data": {"type": "subscription-invoices", "id": "900", "attributes": {
                "subscription_id": 101,
                "customer_id": 55,
                "user_email": "dana@example.com",
                "currency": "eur",
                "total": 2500,
                "status": "pending",
                "urls": {"invoice_url": "https://ls.test/invoice/900"},
                "created_at": "2025-02-01T00:00:00Z",
                "updated_at": "2025-02-01T00:00:00Z"
            }}
        }))
        .unwrap();
        let event = provider(MockHttpClient::new()).parse(&signed(&body)).await.unwrap();
        assert_eq!(event.event_type, EventType::PaymentFailed);
        assert_eq!(event.status, Some(SubscriptionStatus::PastDue));
        assert_eq!(event.subscription_id.as_deref(), Some("101"));
        assert_eq!(event.currency, "EUR");
        assert_eq!(event.amount, 2500);
        assert!(event.is_subscription_bound());
    }

    #[tokio::test]
    async fn parse_refund_keeps_status_unset() {
        let body = serde_json::to_vec(&json!({
            "meta": {"event_name": "subscription_payment_refunded"},
            "data": {"type": "subscription-invoices", "id": "901", "attributes": {
                "subscription_id": 101,
                "user_email": "dana@example.com",
                "total": 2500,
                "refunded_amount": 2500,
                "updated_at": "2025-02-02T00:00:00Z"
            }}
        }))
        .unwrap();
        let event = provider(MockHttpClient::new()).parse(&signed(&body)).await.unwrap();
        assert_eq!(event.event_type, EventType::PaymentRefunded);
        assert_eq!(event.status, None);
        assert_eq!(event.amount, 2500);
    }

    #[tokio::test]
    async fn parse_order_created_is_one_off() {
        let body = serde_json::to_vec(&json!({
            "meta": {"event_name": "order_created", "custom_data": {"user_id": "u-dana"}},
            "data": {"type": "orders", "id": "31", "attributes": {
                "user_email": "dana@example.com",
                "currency": "USD",
                "total": 4900,
                "first_order_item": {"product_name": "Ebook", "price": 4900},
                "updated_at": "2025-03-01T00:00:00Z"
            }}
        }))
        .unwrap();
        let event = provider(MockHttpClient::new()).parse(&signed(&body)).await.unwrap();
        assert!(event.is_one_off);
        assert!(!event.is_subscription_bound());
        assert_eq!(event.plan_name.as_deref(), Some("Ebook"));
        assert_eq!(
            event.metadata.get("custom_user_id").map(String::as_str),
            Some("u-dana")
        );
    }

    #[tokio::test]
    async fn parse_without_timestamp_fails() {
        let body = serde_json::to_vec(&json!({
            "meta": {"event_name": "subscription_updated"},
            "data": {"type": "subscriptions", "id": "1", "attributes": {"status": "active"}}
        }))
        .unwrap();
        let result = provider(MockHttpClient::new()).parse(&signed(&body)).await;
        assert_eq!(result.unwrap_err(), BillingError::MissingRequiredField("updated_at"));
    }

    #[test]
    fn event_names_map_to_normalized_types() {
        assert_eq!(map_event_type("subscription_unpaused"), EventType::SubscriptionResumed);
        assert_eq!(map_event_type("subscription_expired"), EventType::SubscriptionExpired);
        assert_eq!(
            map_event_type("subscription_payment_recovered"),
            EventType::PaymentSucceeded
        );
        assert_eq!(
            map_event_type("license_key_created"),
            EventType::Other("license_key_created".into())
        );
    }
}
