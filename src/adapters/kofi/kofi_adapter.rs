//! Ko-fi implementation of the `PaymentProvider` port.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::webhook_types::{decode_form, parse_amount, KofiKind, KofiPayload};
use crate::config::ProviderConfig;
use crate::domain::billing::signature::{constant_time_eq, hmac_sha256_hex};
use crate::domain::billing::{
    non_empty, normalize_currency, normalize_email, BillingError, EventType, NormalizedEvent,
    PaymentType, SubscriptionStatus,
};
use crate::domain::foundation::Timestamp;
use crate::ports::{PaymentProvider, SubscriptionInfo, WebhookRequest};

/// HMAC key used to derive stable customer ids from emails.
pub const CUSTOMER_ID_KEY: &str = "kofi-customer-id";

/// Prefix of synthesized subscription ids.
pub const SUBSCRIPTION_ID_PREFIX: &str = "kofi_sub_";

/// Deterministic customer id: first 16 hex chars of
/// `HMAC-SHA256("kofi-customer-id", email)`.
pub fn customer_id_for_email(email: &str) -> Result<String, BillingError> {
    let digest = hmac_sha256_hex(CUSTOMER_ID_KEY.as_bytes(), normalize_email(email).as_bytes())?;
    Ok(digest[..16].to_string())
}

/// Ko-fi webhook adapter. Ko-fi has no API, only the shared token.
pub struct KofiProvider {
    name: String,
    verification_token: SecretString,
}

impl KofiProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, BillingError> {
        let token = config
            .webhook_secret()
            .ok_or_else(|| BillingError::MissingWebhookSecret(config.provider_name.clone()))?;
        Ok(Self {
            name: config.provider_name.clone(),
            verification_token: SecretString::new(token.to_string()),
        })
    }

    fn map_event(payload: &KofiPayload, kind: KofiKind) -> (EventType, PaymentType) {
        match kind {
            KofiKind::Subscription if payload.is_first_subscription_payment => {
                (EventType::SubscriptionCreated, PaymentType::Subscription)
            }
            KofiKind::Subscription => (EventType::PaymentSucceeded, PaymentType::Subscription),
            KofiKind::Donation => (EventType::PaymentSucceeded, PaymentType::Donation),
            KofiKind::ShopOrder => (EventType::PaymentSucceeded, PaymentType::ShopOrder),
            KofiKind::Commission => (EventType::PaymentSucceeded, PaymentType::Commission),
        }
    }
}

#[async_trait]
impl PaymentProvider for KofiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn verify(&self, request: &WebhookRequest) -> Result<(), BillingError> {
        let payload = decode_form(&request.body).map_err(|e| match e {
            BillingError::PayloadParsing(msg) => BillingError::InvalidPayload(msg),
            other => other,
        })?;
        let token = payload
            .verification_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(BillingError::MissingSignature)?;
        if !constant_time_eq(
            token.as_bytes(),
            self.verification_token.expose_secret().as_bytes(),
        ) {
            tracing::warn!("Ko-fi verification token mismatch");
            return Err(BillingError::InvalidSignature);
        }
        Ok(())
    }

    async fn parse(&self, request: &WebhookRequest) -> Result<NormalizedEvent, BillingError> {
        let payload = decode_form(&request.body)?;
        let kind = KofiKind::parse(&payload.kind)
            .ok_or_else(|| BillingError::InvalidEventType(payload.kind.clone()))?;

        let event_id = non_empty(payload.message_id.as_deref())
            .or_else(|| non_empty(payload.kofi_transaction_id.as_deref()))
            .ok_or(BillingError::MissingRequiredField("message_id"))?;
        let event_time = payload
            .timestamp
            .as_deref()
            .and_then(Timestamp::parse_rfc3339)
            .ok_or(BillingError::MissingRequiredField("timestamp"))?;

        let (event_type, payment_type) = Self::map_event(&payload, kind);
        let mut event = NormalizedEvent::new(event_type, event_id, event_time);
        event.payment_type = payment_type;
        event.raw_payload = request.body.clone();
        event.customer_email = non_empty(payload.email.as_deref());
        event.customer_name = non_empty(payload.from_name.as_deref());
        event.currency = normalize_currency(payload.currency.as_deref().unwrap_or_default());
        event.amount = match payload.amount.as_deref() {
            Some(raw) => parse_amount(raw, &event.currency)?,
            None => 0,
        };
        event.receipt_url = non_empty(payload.url.as_deref());
        event.provider_created_at = Some(event_time);
        event.provider_updated_at = Some(event_time);
        event
            .metadata
            .insert("kofi_type".into(), payload.kind.trim().to_string());
        event
            .metadata
            .insert("is_public".into(), payload.is_public.to_string());
        if let Some(tx) = non_empty(payload.kofi_transaction_id.as_deref()) {
            event.metadata.insert("kofi_transaction_id".into(), tx);
        }
        if payload.is_public {
            if let Some(message) = non_empty(payload.message.as_deref()) {
                event.metadata.insert("message".into(), message);
            }
        }

        if let Some(email) = &event.customer_email {
            event.customer_id = Some(customer_id_for_email(email)?);
        }

        if kind == KofiKind::Subscription {
            let customer_id = event
                .customer_id
                .clone()
                .ok_or(BillingError::MissingPayloadCustomerEmail)?;
            event.subscription_id = Some(format!("{}{}", SUBSCRIPTION_ID_PREFIX, customer_id));
            event.status = Some(SubscriptionStatus::Active);
            event.plan_name = non_empty(payload.tier_name.as_deref());
            event.billing_interval = Some("month".to_string());
            event.next_billing_date = Some(event_time.plus_months(1));
        } else {
            event.is_one_off = true;
            event.plan_name = match kind {
                KofiKind::Donation => None,
                _ => non_empty(payload.tier_name.as_deref()),
            };
        }

        tracing::debug!(
            event_id = %event.event_id,
            event_type = %event.event_type.as_str(),
            payment_type = event.payment_type.as_str(),
            "Parsed Ko-fi webhook"
        );
        Ok(event)
    }

    async fn lookup_subscription(
        &self,
        _subscription_id: &str,
    ) -> Result<SubscriptionInfo, BillingError> {
        Err(BillingError::KofiNoSubscriptionAPI)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderMap;
    use serde_json::{json, Value};

    const TOKEN: &str = "kofi-verification-token";

    fn provider() -> KofiProvider {
        KofiProvider::new(&ProviderConfig::new("kofi", TOKEN)).unwrap()
    }

    fn form(payload: &Value) -> WebhookRequest {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("data", &payload.to_string())
            .finish();
        WebhookRequest::new(HeaderMap::new(), body.into_bytes())
    }

    fn first_subscription_payment() -> Value {
        json!({
            "verification_token": TOKEN,
            "message_id": "msg-1",
            "timestamp": "2025-01-10T12:00:00Z",
            "type": "Subscription",
            "is_public": true,
            "from_name": "Bob",
            "amount": "5.00",
            "email": "bob@example.com",
            "currency": "USD",
            "is_subscription_payment": true,
            "is_first_subscription_payment": true,
            "kofi_transaction_id": "tx-1",
            "tier_name": "Gold"
        })
    }

    #[test]
    fn customer_id_is_deterministic_prefix_of_hmac() {
        let expected =
            &hmac_sha256_hex(b"kofi-customer-id", b"bob@example.com").unwrap()[..16];
        assert_eq!(customer_id_for_email("bob@example.com").unwrap(), expected);
        assert_eq!(
            customer_id_for_email("Bob@Example.com").unwrap(),
            customer_id_for_email("bob@example.com").unwrap()
        );
    }

    #[tokio::test]
    async fn verify_checks_token() {
        assert!(provider().verify(&form(&first_subscription_payment())).await.is_ok());

        let mut wrong = first_subscription_payment();
        wrong["verification_token"] = json!("nope");
        assert_eq!(
            provider().verify(&form(&wrong)).await,
            Err(BillingError::InvalidSignature)
        );
    }

    #[tokio::test]
    async fn verify_without_token_is_missing_signature() {
        let mut payload = first_subscription_payment();
        if let Some(fields) = payload.as_object_mut() {
            fields.remove("verification_token");
        }
        assert_eq!(
            provider().verify(&form(&payload)).await,
            Err(BillingError::MissingSignature)
        );
    }

    #[tokio::test]
    async fn verify_rejects_body_without_json() {
        let request = WebhookRequest::new(HeaderMap::new(), b"data=not-json".to_vec());
        assert!(matches!(
            provider().verify(&request).await,
            Err(BillingError::InvalidPayload(_))
        ));
    }

    #[tokio::test]
    async fn first_subscription_payment_creates_subscription() {
        let event = provider()
            .parse(&form(&first_subscription_payment()))
            .await
            .unwrap();
        let customer_id = customer_id_for_email("bob@example.com").unwrap();

        assert_eq!(event.event_type, EventType::SubscriptionCreated);
        assert_eq!(event.amount, 500);
        assert_eq!(event.currency, "USD");
        assert_eq!(event.plan_name.as_deref(), Some("Gold"));
        assert_eq!(event.customer_id.as_deref(), Some(customer_id.as_str()));
        assert_eq!(
            event.subscription_id,
            Some(format!("kofi_sub_{}", customer_id))
        );
        assert_eq!(
            event.next_billing_date.map(|t| t.to_date_string()).as_deref(),
            Some("2025-02-10")
        );
        assert!(event.is_subscription_bound());
    }

    #[tokio::test]
    async fn renewal_is_payment_succeeded() {
        let mut payload = first_subscription_payment();
        payload["is_first_subscription_payment"] = json!(false);
        let event = provider().parse(&form(&payload)).await.unwrap();
        assert_eq!(event.event_type, EventType::PaymentSucceeded);
        assert_eq!(event.payment_type, PaymentType::Subscription);
        assert!(event.is_subscription_bound());
    }

    #[tokio::test]
    async fn donation_is_one_off() {
        let mut payload = first_subscription_payment();
        payload["type"] = json!("Donation");
        payload["is_subscription_payment"] = json!(false);
        payload["is_first_subscription_payment"] = json!(false);
        payload["amount"] = json!("3.00");
        let event = provider().parse(&form(&payload)).await.unwrap();

        assert_eq!(event.event_type, EventType::PaymentSucceeded);
        assert_eq!(event.payment_type, PaymentType::Donation);
        assert!(event.is_one_off);
        assert!(event.subscription_id.is_none());
        assert_eq!(event.amount, 300);
    }

    #[tokio::test]
    async fn yen_amounts_stay_in_whole_units() {
        let mut payload = first_subscription_payment();
        payload["currency"] = json!("JPY");
        payload["amount"] = json!("500");
        let event = provider().parse(&form(&payload)).await.unwrap();
        assert_eq!(event.currency, "JPY");
        assert_eq!(event.amount, 500);
    }

    #[tokio::test]
    async fn missing_data_field_fails_verify_and_parse_differently() {
        let request = WebhookRequest::new(HeaderMap::new(), b"payload=%7B%7D".to_vec());
        assert!(matches!(
            provider().verify(&request).await,
            Err(BillingError::InvalidPayload(_))
        ));
        assert!(matches!(
            provider().parse(&request).await,
            Err(BillingError::PayloadParsing(_))
        ));
    }

    #[tokio::test]
    async fn unknown_type_is_invalid_event_type() {
        let mut payload = first_subscription_payment();
        payload["type"] = json!("Refund");
        assert_eq!(
            provider().parse(&form(&payload)).await.unwrap_err(),
            BillingError::InvalidEventType("Refund".into())
        );
    }

    #[tokio::test]
    async fn parse_does_not_require_valid_token() {
        let mut payload = first_subscription_payment();
        payload["verification_token"] = json!("wrong");
        assert!(provider().parse(&form(&payload)).await.is_ok());
    }

    #[tokio::test]
    async fn lookup_is_unsupported() {
        assert_eq!(
            provider().lookup_subscription("kofi_sub_x").await.unwrap_err(),
            BillingError::KofiNoSubscriptionAPI
        );
    }
}
