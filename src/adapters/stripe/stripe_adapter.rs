//! Stripe implementation of the `PaymentProvider` port.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use super::webhook_types::{
    Expandable, SignatureHeader, StripeCharge, StripeCustomer, StripeEvent, StripeEventData,
    StripeInvoice, StripePlan, StripePrice, StripeProduct, StripeSubscription,
};
use crate::config::ProviderConfig;
use crate::domain::billing::signature::{constant_time_eq, hmac_sha256};
use crate::domain::billing::{
    non_empty, normalize_currency, BillingError, EventType, NormalizedEvent, SubscriptionStatus,
};
use crate::domain::foundation::Timestamp;
use crate::ports::{Clock, PaymentProvider, ProviderHttpClient, SubscriptionInfo, WebhookRequest};

/// Default Stripe API host.
pub const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";

/// Maximum age of a signed webhook, in seconds.
pub const MAX_TIMESTAMP_AGE_SECS: i64 = 300;

/// Header carrying the webhook signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Stripe webhook and API adapter.
pub struct StripeProvider {
    name: String,
    webhook_secret: SecretString,
    api_key: SecretString,
    api_base_url: String,
    http: Arc<dyn ProviderHttpClient>,
    clock: Arc<dyn Clock>,
}

impl StripeProvider {
    pub fn new(
        config: &ProviderConfig,
        http: Arc<dyn ProviderHttpClient>,
        clock: Arc<dyn Clock>,
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
            clock,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, BillingError> {
        let url = format!("{}{}", self.api_base_url, path);
        let body = self
            .http
            .get_json(&url, self.api_key.expose_secret())
            .await?;
        serde_json::from_value(body).map_err(|e| {
            tracing::warn!(path, error = %e, "Unexpected Stripe API response");
            BillingError::parsing(format!("Stripe response for {}: {}", path, e))
        })
    }

    /// Email and name for a customer, fetched when the webhook only
    /// carries the id.
    async fn resolve_customer(
        &self,
        customer: &Expandable<StripeCustomer>,
    ) -> Result<StripeCustomer, BillingError> {
        if let Some(obj) = customer.object() {
            if non_empty(obj.email.as_deref()).is_some() {
                return Ok(obj.clone());
            }
        }
        self.get(&format!("/v1/customers/{}", customer.id())).await
    }

    async fn product_name(&self, price: &StripePrice) -> Result<Option<String>, BillingError> {
        let Some(product) = &price.product else {
            return Ok(None);
        };
        if let Some(name) = product.object().and_then(|p| non_empty(p.name.as_deref())) {
            return Ok(Some(name));
        }
        let product: StripeProduct = self.get(&format!("/v1/products/{}", product.id())).await?;
        Ok(non_empty(product.name.as_deref()))
    }

    /// Legacy plan attributes; a failed lookup only loses metadata.
    async fn plan_metadata(&self, plan_id: &str, event: &mut NormalizedEvent) {
        match self.get::<StripePlan>(&format!("/v1/plans/{}", plan_id)).await {
            Ok(plan) => {
                event.metadata.insert("stripe_plan_id".into(), plan.id);
                if let Some(interval) = plan.interval {
                    event.metadata.insert("plan_interval".into(), interval);
                }
                if let Some(usage_type) = plan.usage_type {
                    event.metadata.insert("plan_usage_type".into(), usage_type);
                }
                if let Some(nickname) = plan.nickname {
                    event.metadata.insert("plan_nickname".into(), nickname);
                }
            }
            Err(e) => {
                tracing::debug!(plan_id, error = %e, "Stripe plan lookup skipped");
            }
        }
    }

    async fn parse_subscription(
        &self,
        event: &mut NormalizedEvent,
        object: Value,
    ) -> Result<(), BillingError> {
        let sub: StripeSubscription = from_object(object)?;
        let customer = self.resolve_customer(&sub.customer).await?;

        event.subscription_id = Some(sub.id.clone());
        event.customer_id = Some(sub.customer.id().to_string());
        event.customer_email = non_empty(customer.email.as_deref());
        event.customer_name = non_empty(customer.name.as_deref());
        event.status = Some(SubscriptionStatus::normalize(&sub.status));
        event.next_billing_date = sub.period_end().and_then(Timestamp::from_unix_secs);
        event.available_until_date = sub.access_ends_at().and_then(Timestamp::from_unix_secs);
        event.trial_ends_at = sub.trial_end.and_then(Timestamp::from_unix_secs);
        event.provider_created_at = sub.created.and_then(Timestamp::from_unix_secs);
        event.metadata.extend(sub.metadata.clone());
        if let Some(canceled_at) = sub.canceled_at {
            event
                .metadata
                .insert("stripe_canceled_at".into(), canceled_at.to_string());
        }

        if let Some(item) = sub.first_item() {
            if let Some(price) = &item.price {
                event.amount = line_amount(price.unit_amount, item.quantity)?;
                event.plan_id = Some(price.id.clone());
                event.billing_interval = price.recurring.as_ref().map(|r| r.interval.clone());
                event.plan_name = self.product_name(price).await?;
                if let Some(currency) = &price.currency {
                    event.currency = normalize_currency(currency);
                }
            }
            if let Some(plan) = &item.plan {
                self.plan_metadata(&plan.id, event).await;
            }
        }
        if event.currency.is_empty() {
            event.currency = normalize_currency(sub.currency.as_deref().unwrap_or_default());
        }
        Ok(())
    }

    async fn parse_invoice(
        &self,
        event: &mut NormalizedEvent,
        object: Value,
    ) -> Result<(), BillingError> {
        let invoice: StripeInvoice = from_object(object)?;

        event.subscription_id = invoice.subscription_id().map(str::to_string);
        event.is_one_off = event.subscription_id.is_none();
        event.customer_id = invoice.customer.as_ref().map(|c| c.id().to_string());
        event.customer_email = non_empty(invoice.customer_email.as_deref());
        event.customer_name = non_empty(invoice.customer_name.as_deref());
        if event.customer_email.is_none() {
            if let Some(customer) = &invoice.customer {
                let customer = self.resolve_customer(customer).await?;
                event.customer_email = non_empty(customer.email.as_deref());
                event.customer_name = event
                    .customer_name
                    .take()
                    .or_else(|| non_empty(customer.name.as_deref()));
            }
        }

        event.amount = match event.event_type {
            EventType::PaymentSucceeded => invoice.amount_paid,
            _ => invoice.amount_due,
        };
        event.currency = normalize_currency(invoice.currency.as_deref().unwrap_or_default());
        event.receipt_url = non_empty(invoice.hosted_invoice_url.as_deref());
        event.status = match event.event_type {
            EventType::PaymentSucceeded => Some(SubscriptionStatus::Active),
            EventType::PaymentFailed => Some(SubscriptionStatus::PastDue),
            EventType::PaymentActionRequired => Some(SubscriptionStatus::Incomplete),
            _ => None,
        };
        event.metadata.insert("stripe_invoice_id".into(), invoice.id.clone());

        if let Some(line) = invoice.lines.data.first() {
            if let Some(price) = &line.price {
                event.plan_id = Some(price.id.clone());
                event.billing_interval = price.recurring.as_ref().map(|r| r.interval.clone());
                event.plan_name = self.product_name(price).await?;
            }
            if event.event_type == EventType::PaymentSucceeded {
                event.next_billing_date = line
                    .period
                    .as_ref()
                    .and_then(|p| p.end)
                    .and_then(Timestamp::from_unix_secs);
            }
        }
        Ok(())
    }

    async fn parse_charge(
        &self,
        event: &mut NormalizedEvent,
        object: Value,
    ) -> Result<(), BillingError> {
        let charge: StripeCharge = from_object(object)?;

        event.is_one_off = true;
        event.customer_id = charge.customer.as_ref().map(|c| c.id().to_string());
        let details = charge.billing_details.as_ref();
        event.customer_email = non_empty(details.and_then(|d| d.email.as_deref()))
            .or_else(|| non_empty(charge.receipt_email.as_deref()));
        event.customer_name = non_empty(details.and_then(|d| d.name.as_deref()));
        if event.customer_email.is_none() {
            if let Some(customer) = &charge.customer {
                let customer = self.resolve_customer(customer).await?;
                event.customer_email = non_empty(customer.email.as_deref());
            }
        }
        event.amount = charge.amount_refunded;
        event.currency = normalize_currency(charge.currency.as_deref().unwrap_or_default());
        event.receipt_url = non_empty(charge.receipt_url.as_deref());
        event.metadata.insert("stripe_charge_id".into(), charge.id);
        Ok(())
    }

    fn parse_customer(
        &self,
        event: &mut NormalizedEvent,
        object: Value,
    ) -> Result<(), BillingError> {
        let customer: StripeCustomer = from_object(object)?;
        event.is_one_off = true;
        event.customer_id = Some(customer.id);
        event.customer_email = non_empty(customer.email.as_deref());
        event.customer_name = non_empty(customer.name.as_deref());
        Ok(())
    }

    /// Best-effort extraction for event types without a dedicated mapping.
    fn parse_other(&self, event: &mut NormalizedEvent, object: &Value) {
        let text = |key: &str| non_empty(object.get(key).and_then(Value::as_str));
        event.subscription_id = text("subscription");
        event.is_one_off = event.subscription_id.is_none();
        event.customer_id = text("customer");
        event.customer_email = text("customer_email")
            .or_else(|| text("receipt_email"))
            .or_else(|| text("email"))
            .or_else(|| {
                non_empty(
                    object
                        .pointer("/customer_details/email")
                        .and_then(Value::as_str),
                )
            });
        if let Some(currency) = object.get("currency").and_then(Value::as_str) {
            event.currency = normalize_currency(currency);
        }
    }
}

/// Maps a Stripe event type onto the normalized vocabulary.
pub fn map_event_type(stripe_type: &str) -> EventType {
    match stripe_type {
        "customer.subscription.created" => EventType::SubscriptionCreated,
        "customer.subscription.updated" => EventType::SubscriptionUpdated,
        "customer.subscription.deleted" => EventType::SubscriptionCancelled,
        "customer.subscription.paused" => EventType::SubscriptionPaused,
        "customer.subscription.resumed" => EventType::SubscriptionResumed,
        "customer.subscription.trial_will_end" => EventType::TrialWillEnd,
        "invoice.payment_succeeded" => EventType::PaymentSucceeded,
        "invoice.payment_failed" => EventType::PaymentFailed,
        "invoice.payment_action_required" => EventType::PaymentActionRequired,
        "charge.refunded" => EventType::PaymentRefunded,
        "customer.updated" => EventType::CustomerUpdated,
        other => EventType::Other(other.to_string()),
    }
}

/// An update whose previous status was `trialing` and whose current one
/// is not. Stripe has no dedicated trial-ended event.
fn left_trial(data: &StripeEventData) -> bool {
    let was_trialing = data
        .previous_attributes
        .as_ref()
        .and_then(|prev| prev.get("status"))
        .and_then(Value::as_str)
        == Some("trialing");
    let now_trialing = data.object.get("status").and_then(Value::as_str) == Some("trialing");
    was_trialing && !now_trialing
}

/// Unit amount times quantity; a missing quantity counts as one.
fn line_amount(unit_amount: Option<i64>, quantity: Option<i64>) -> Result<i64, BillingError> {
    let quantity = quantity.unwrap_or(1).max(0);
    unit_amount
        .unwrap_or(0)
        .checked_mul(quantity)
        .ok_or_else(|| BillingError::parsing("item amount overflows"))
}

fn from_object<T: DeserializeOwned>(object: Value) -> Result<T, BillingError> {
    serde_json::from_value(object).map_err(|e| BillingError::parsing(e.to_string()))
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn verify(&self, request: &WebhookRequest) -> Result<(), BillingError> {
        let header = request
            .header(SIGNATURE_HEADER)
            .ok_or(BillingError::MissingSignature)?;
        let header = SignatureHeader::parse(header).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse Stripe-Signature header");
            e
        })?;

        let now = self.clock.now().as_unix_secs();
        // `t` is unauthenticated at this point; an unrepresentable age is stale.
        let age = now.checked_sub(header.timestamp).unwrap_or(i64::MAX);
        if age > MAX_TIMESTAMP_AGE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                age_secs = age,
                "Webhook event too old - possible replay"
            );
            return Err(BillingError::WebhookTimestampTooOld);
        }

        let mut signed_payload = format!("{}.", header.timestamp).into_bytes();
        signed_payload.extend_from_slice(&request.body);
        let expected = hmac_sha256(
            self.webhook_secret.expose_secret().as_bytes(),
            &signed_payload,
        )?;

        if !header
            .v1_signatures
            .iter()
            .any(|candidate| constant_time_eq(&expected, candidate))
        {
            tracing::warn!("Invalid Stripe webhook signature");
            return Err(BillingError::InvalidSignature);
        }

        if request.body.is_empty() {
            return Err(BillingError::InvalidPayload("empty body".into()));
        }
        Ok(())
    }

    async fn parse(&self, request: &WebhookRequest) -> Result<NormalizedEvent, BillingError> {
        let stripe_event: StripeEvent = serde_json::from_slice(&request.body).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse Stripe webhook payload");
            BillingError::parsing(format!("invalid JSON: {}", e))
        })?;
        if stripe_event.id.trim().is_empty() {
            return Err(BillingError::MissingRequiredField("id"));
        }
        if stripe_event.event_type.trim().is_empty() {
            return Err(BillingError::InvalidEventType(String::new()));
        }

        let event_time = Timestamp::from_unix_secs(stripe_event.created)
            .ok_or(BillingError::MissingRequiredField("created"))?;
        let mut event_type = map_event_type(&stripe_event.event_type);
        if event_type == EventType::SubscriptionUpdated && left_trial(&stripe_event.data) {
            event_type = EventType::TrialEnded;
        }
        let mut event = NormalizedEvent::new(event_type.clone(), stripe_event.id.clone(), event_time);
        event.provider_updated_at = Some(event_time);
        event.raw_payload = request.body.clone();
        event
            .metadata
            .insert("stripe_livemode".into(), stripe_event.livemode.to_string());

        let object = stripe_event.data.object;
        match &event_type {
            t if t.is_subscription_lifecycle()
                || matches!(t, EventType::TrialWillEnd | EventType::TrialEnded) =>
            {
                self.parse_subscription(&mut event, object).await?
            }
            EventType::PaymentSucceeded
            | EventType::PaymentFailed
            | EventType::PaymentActionRequired => self.parse_invoice(&mut event, object).await?,
            EventType::PaymentRefunded => self.parse_charge(&mut event, object).await?,
            EventType::CustomerUpdated => self.parse_customer(&mut event, object)?,
            _ => self.parse_other(&mut event, &object),
        }

        // Known mappings need an email to reach a user.
        if !matches!(event_type, EventType::Other(_)) && event.customer_email.is_none() {
            return Err(BillingError::MissingPayloadCustomerEmail);
        }

        tracing::debug!(
            event_id = %event.event_id,
            stripe_type = %stripe_event.event_type,
            event_type = %event.event_type.as_str(),
            subscription_id = event.subscription_id.as_deref().unwrap_or(""),
            "Parsed Stripe webhook"
        );
        Ok(event)
    }

    async fn lookup_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionInfo, BillingError> {
        let sub: StripeSubscription = self
            .get(&format!("/v1/subscriptions/{}", subscription_id))
            .await?;

        let customer_email = match self.resolve_customer(&sub.customer).await {
            Ok(customer) => non_empty(customer.email.as_deref()),
            Err(e) => {
                tracing::debug!(subscription_id, error = %e, "Stripe customer lookup skipped");
                None
            }
        };

        let mut amount = 0;
        let mut currency = normalize_currency(sub.currency.as_deref().unwrap_or_default());
        let mut plan_name = None;
        if let Some(item) = sub.first_item() {
            if let Some(price) = &item.price {
                amount = line_amount(price.unit_amount, item.quantity)?;
                if let Some(c) = &price.currency {
                    currency = normalize_currency(c);
                }
                plan_name = self.product_name(price).await?;
            }
        }

        Ok(SubscriptionInfo {
            subscription_id: sub.id.clone(),
            customer_id: Some(sub.customer.id().to_string()),
            customer_email,
            status: SubscriptionStatus::normalize(&sub.status),
            plan_name,
            amount,
            currency,
            next_billing_date: sub.period_end().and_then(Timestamp::from_unix_secs),
            cancel_url: None,
            update_url: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::clock::FixedClock;
    use crate::adapters::http_client::MockHttpClient;
    use crate::domain::billing::signature::hmac_sha256_hex;
    use http::{HeaderMap, HeaderValue};
    use serde_json::json;

    const SECRET: &str = "whsec_test_secret";
    const NOW: i64 = 1_735_000_000;

    fn sign(timestamp: i64, payload: &[u8]) -> String {
        let mut signed = format!("{}.", timestamp).into_bytes();
        signed.extend_from_slice(payload);
        format!("t={},v1={}", timestamp, hmac_sha256_hex(SECRET.as_bytes(), &signed).unwrap())
    }

    fn request(signature: Option<&str>, body: &[u8]) -> WebhookRequest {
        let mut headers = HeaderMap::new();
        if let Some(sig) = signature {
            headers.insert("Stripe-Signature", HeaderValue::from_str(sig).unwrap());
        }
        WebhookRequest::new(headers, body.to_vec())
    }

    fn provider(http: MockHttpClient) -> StripeProvider {
        let config = ProviderConfig::new("stripe", SECRET).with_api_key("sk_test_key");
        StripeProvider::new(&config, Arc::new(http), Arc::new(FixedClock::at_unix(NOW))).unwrap()
    }

    fn subscription_created() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "evt_1",
            "type": "customer.subscription.created",
            "created": NOW,
            "livemode": false,
            "data": {"object": {
                "id": "sub_S1",
                "customer": "cus_C1",
                "status": "active",
                "current_period_end": 1735689600,
                "items": {"data": [{
                    "id": "si_1",
                    "quantity": 1,
                    "price": {
                        "id": "price_1",
                        "unit_amount": 2999,
                        "currency": "usd",
                        "product": "prod_P1",
                        "recurring": {"interval": "month"}
                    }
                }]}
            }}
        }))
        .unwrap()
    }

    fn enrichment() -> MockHttpClient {
        MockHttpClient::new()
            .with_response(
                "/v1/customers/cus_C1",
                json!({"id": "cus_C1", "email": "alice@example.com", "name": "Alice"}),
            )
            .with_response("/v1/products/prod_P1", json!({"id": "prod_P1", "name": "Pro"}))
    }

    #[test]
    fn missing_webhook_secret_is_rejected() {
        let config = ProviderConfig {
            webhook_secret: None,
            ..ProviderConfig::new("stripe", "")
        };
        let result = StripeProvider::new(
            &config,
            Arc::new(MockHttpClient::new()),
            Arc::new(FixedClock::at_unix(NOW)),
        );
        assert!(matches!(result, Err(BillingError::MissingWebhookSecret(_))));
    }

    #[tokio::test]
    async fn verify_accepts_valid_signature() {
        let body = subscription_created();
        let sig = sign(NOW - 10, &body);
        let result = provider(MockHttpClient::new())
            .verify(&request(Some(&sig), &body))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn verify_accepts_any_matching_v1() {
        let body = subscription_created();
        let good = sign(NOW, &body);
        let header = format!("{},v1={}", good.replacen("v1=", "v1=00ff,v1=", 1), "abcd");
        let result = provider(MockHttpClient::new())
            .verify(&request(Some(&header), &body))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn verify_rejects_missing_header() {
        let result = provider(MockHttpClient::new())
            .verify(&request(None, b"{}"))
            .await;
        assert_eq!(result, Err(BillingError::MissingSignature));
    }

    #[tokio::test]
    async fn verify_rejects_tampered_body() {
        let body = subscription_created();
        let sig = sign(NOW, &body);
        let result = provider(MockHttpClient::new())
            .verify(&request(Some(&sig), br#"{"id":"evt_forged"}"#))
            .await;
        assert_eq!(result, Err(BillingError::InvalidSignature));
    }

    #[tokio::test]
    async fn verify_rejects_stale_timestamp() {
        let body = subscription_created();
        let sig = sign(NOW - 600, &body);
        let result = provider(MockHttpClient::new())
            .verify(&request(Some(&sig), &body))
            .await;
        assert_eq!(result, Err(BillingError::WebhookTimestampTooOld));
    }

    #[tokio::test]
    async fn verify_rejects_extreme_timestamps_without_overflow() {
        let body = subscription_created();
        for t in [i64::MIN, i64::MAX] {
            let header = format!("t={},v1=00", t);
            let result = provider(MockHttpClient::new())
                .verify(&request(Some(&header), &body))
                .await;
            assert!(result.is_err(), "t={} must be rejected", t);
        }

        let header = format!("t={},v1=00", i64::MIN);
        let result = provider(MockHttpClient::new())
            .verify(&request(Some(&header), &body))
            .await;
        assert_eq!(result, Err(BillingError::WebhookTimestampTooOld));
    }

    #[test]
    fn line_amount_rejects_overflow() {
        assert_eq!(line_amount(Some(2999), Some(3)), Ok(8997));
        assert_eq!(line_amount(Some(2999), None), Ok(2999));
        assert!(matches!(
            line_amount(Some(i64::MAX), Some(2)),
            Err(BillingError::PayloadParsing(_))
        ));
    }

    #[tokio::test]
    async fn verify_accepts_window_boundary() {
        let body = subscription_created();
        let sig = sign(NOW - MAX_TIMESTAMP_AGE_SECS, &body);
        let result = provider(MockHttpClient::new())
            .verify(&request(Some(&sig), &body))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn parse_subscription_created_enriches_customer_and_product() {
        let http = enrichment();
        let event = provider(http.clone())
            .parse(&request(None, &subscription_created()))
            .await
            .unwrap();

        assert_eq!(event.event_type, EventType::SubscriptionCreated);
        assert_eq!(event.event_id, "evt_1");
        assert_eq!(event.subscription_id.as_deref(), Some("sub_S1"));
        assert_eq!(event.customer_id.as_deref(), Some("cus_C1"));
        assert_eq!(event.customer_email.as_deref(), Some("alice@example.com"));
        assert_eq!(event.plan_name.as_deref(), Some("Pro"));
        assert_eq!(event.amount, 2999);
        assert_eq!(event.currency, "USD");
        assert_eq!(event.billing_interval.as_deref(), Some("month"));
        assert_eq!(event.status, Some(SubscriptionStatus::Active));
        assert_eq!(
            event.next_billing_date.map(|t| t.to_rfc3339()).as_deref(),
            Some("2025-01-01T00:00:00Z")
        );
        assert!(event.is_subscription_bound());

        let requests = http.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.bearer_token == "sk_test_key"));
    }

    #[tokio::test]
    async fn parse_multiplies_unit_amount_by_quantity() {
        let mut payload: Value = serde_json::from_slice(&subscription_created()).unwrap();
        payload["data"]["object"]["items"]["data"][0]["quantity"] = json!(3);
        let body = serde_json::to_vec(&payload).unwrap();
        let event = provider(enrichment()).parse(&request(None, &body)).await.unwrap();
        assert_eq!(event.amount, 8997);
    }

    #[tokio::test]
    async fn parse_update_leaving_trial_is_trial_ended() {
        let mut payload: Value = serde_json::from_slice(&subscription_created()).unwrap();
        payload["type"] = json!("customer.subscription.updated");
        payload["data"]["previous_attributes"] = json!({"status": "trialing"});
        let body = serde_json::to_vec(&payload).unwrap();
        let event = provider(enrichment()).parse(&request(None, &body)).await.unwrap();

        assert_eq!(event.event_type, EventType::TrialEnded);
        assert_eq!(event.status, Some(SubscriptionStatus::Active));
        assert!(event.is_subscription_bound());

        payload["data"]["previous_attributes"] = json!({"cancel_at_period_end": true});
        let body = serde_json::to_vec(&payload).unwrap();
        let event = provider(enrichment()).parse(&request(None, &body)).await.unwrap();
        assert_eq!(event.event_type, EventType::SubscriptionUpdated);
    }

    #[tokio::test]
    async fn parse_deleted_maps_to_cancelled() {
        let mut payload: Value = serde_json::from_slice(&subscription_created()).unwrap();
        payload["type"] = json!("customer.subscription.deleted");
        payload["data"]["object"]["status"] = json!("canceled");
        let body = serde_json::to_vec(&payload).unwrap();
        let event = provider(enrichment()).parse(&request(None, &body)).await.unwrap();
        assert_eq!(event.event_type, EventType::SubscriptionCancelled);
        assert_eq!(event.status, Some(SubscriptionStatus::Cancelled));
    }

    #[tokio::test]
    async fn parse_stores_plan_attributes_as_metadata_only() {
        let mut payload: Value = serde_json::from_slice(&subscription_created()).unwrap();
        payload["data"]["object"]["items"]["data"][0]["plan"] = json!({"id": "plan_1"});
        let body = serde_json::to_vec(&payload).unwrap();
        let http = enrichment().with_response(
            "/v1/plans/plan_1",
            json!({"id": "plan_1", "interval": "month", "usage_type": "licensed"}),
        );
        let event = provider(http).parse(&request(None, &body)).await.unwrap();
        assert_eq!(event.plan_name.as_deref(), Some("Pro"));
        assert_eq!(
            event.metadata.get("plan_usage_type").map(String::as_str),
            Some("licensed")
        );
    }

    #[tokio::test]
    async fn parse_without_customer_email_fails() {
        let http = MockHttpClient::new()
            .with_response("/v1/customers/cus_C1", json!({"id": "cus_C1", "email": null}))
            .with_response("/v1/products/prod_P1", json!({"id": "prod_P1", "name": "Pro"}));
        let result = provider(http)
            .parse(&request(None, &subscription_created()))
            .await;
        assert_eq!(result.unwrap_err(), BillingError::MissingPayloadCustomerEmail);
    }

    #[tokio::test]
    async fn parse_invoice_payment_failed() {
        let body = serde_json::to_vec(&json!({
            "id": "evt_inv",
            "type": "invoice.payment_failed",
            "created": NOW,
            "data": {"object": {
                "id": "in_1",
                "customer": "cus_C1",
                "customer_email": "alice@example.com",
                "subscription": "sub_S1",
                "amount_due": 2999,
                "amount_paid": 0,
                "currency": "usd",
                "lines": {"data": [{
                    "price": {"id": "price_1", "product": {"id": "prod_P1", "name": "Pro"}},
                    "period": {"start": 1733011200, "end": 1735689600}
                }]}
            }}
        }))
        .unwrap();
        let http = MockHttpClient::new();
        let event = provider(http.clone()).parse(&request(None, &body)).await.unwrap();

        assert_eq!(event.event_type, EventType::PaymentFailed);
        assert_eq!(event.status, Some(SubscriptionStatus::PastDue));
        assert_eq!(event.amount, 2999);
        assert_eq!(event.plan_name.as_deref(), Some("Pro"));
        assert!(event.next_billing_date.is_none());
        assert_eq!(http.request_count(), 0);
    }

    #[tokio::test]
    async fn parse_charge_refunded_is_not_subscription_bound() {
        let body = serde_json::to_vec(&json!({
            "id": "evt_ref",
            "type": "charge.refunded",
            "created": NOW,
            "data": {"object": {
                "id": "ch_1",
                "customer": "cus_C1",
                "billing_details": {"email": "alice@example.com"},
                "amount_refunded": 500,
                "currency": "eur"
            }}
        }))
        .unwrap();
        let event = provider(MockHttpClient::new())
            .parse(&request(None, &body))
            .await
            .unwrap();
        assert_eq!(event.event_type, EventType::PaymentRefunded);
        assert_eq!(event.amount, 500);
        assert_eq!(event.currency, "EUR");
        assert!(!event.is_subscription_bound());
    }

    #[tokio::test]
    async fn parse_unknown_type_passes_through() {
        let body = serde_json::to_vec(&json!({
            "id": "evt_x",
            "type": "checkout.session.completed",
            "created": NOW,
            "data": {"object": {"id": "cs_1", "customer_details": {"email": "bob@example.com"}}}
        }))
        .unwrap();
        let event = provider(MockHttpClient::new())
            .parse(&request(None, &body))
            .await
            .unwrap();
        assert_eq!(
            event.event_type,
            EventType::Other("checkout.session.completed".into())
        );
        assert_eq!(event.customer_email.as_deref(), Some("bob@example.com"));
    }

    #[tokio::test]
    async fn parse_rejects_invalid_json() {
        let result = provider(MockHttpClient::new())
            .parse(&request(None, b"not json"))
            .await;
        assert!(matches!(result, Err(BillingError::PayloadParsing(_))));
    }

    #[tokio::test]
    async fn lookup_subscription_reads_live_state() {
        let http = enrichment().with_response(
            "/v1/subscriptions/sub_S1",
            json!({
                "id": "sub_S1",
                "customer": "cus_C1",
                "status": "past_due",
                "current_period_end": 1735689600,
                "items": {"data": [{"quantity": 2, "price": {
                    "id": "price_1", "unit_amount": 1000, "currency": "usd", "product": "prod_P1"
                }}]}
            }),
        );
        let info = provider(http).lookup_subscription("sub_S1").await.unwrap();
        assert_eq!(info.status, SubscriptionStatus::PastDue);
        assert_eq!(info.amount, 2000);
        assert_eq!(info.plan_name.as_deref(), Some("Pro"));
        assert_eq!(info.customer_email.as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn event_type_mapping() {
        assert_eq!(
            map_event_type("customer.subscription.deleted"),
            EventType::SubscriptionCancelled
        );
        assert_eq!(map_event_type("invoice.payment_succeeded"), EventType::PaymentSucceeded);
        assert_eq!(map_event_type("charge.refunded"), EventType::PaymentRefunded);
    }
}
