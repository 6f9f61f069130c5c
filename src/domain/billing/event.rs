//! Normalized webhook event.
//!
//! Every provider adapter produces a `NormalizedEvent`; the reconciliation
//! handler never sees vendor payload shapes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

use super::SubscriptionStatus;
use crate::domain::foundation::Timestamp;

/// Vendor-agnostic event type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionCancelled,
    SubscriptionPaused,
    SubscriptionResumed,
    SubscriptionExpired,
    PaymentSucceeded,
    PaymentFailed,
    PaymentRefunded,
    PaymentActionRequired,
    CustomerUpdated,
    TrialWillEnd,
    TrialEnded,
    /// Provider event type with no normalized counterpart, kept verbatim.
    Other(String),
}

impl EventType {
    /// Canonical dotted form, e.g. `subscription.created`.
    pub fn as_str(&self) -> &str {
        match self {
            EventType::SubscriptionCreated => "subscription.created",
            EventType::SubscriptionUpdated => "subscription.updated",
            EventType::SubscriptionCancelled => "subscription.cancelled",
            EventType::SubscriptionPaused => "subscription.paused",
            EventType::SubscriptionResumed => "subscription.resumed",
            EventType::SubscriptionExpired => "subscription.expired",
            EventType::PaymentSucceeded => "payment.succeeded",
            EventType::PaymentFailed => "payment.failed",
            EventType::PaymentRefunded => "payment.refunded",
            EventType::PaymentActionRequired => "payment.action_required",
            EventType::CustomerUpdated => "customer.updated",
            EventType::TrialWillEnd => "trial.will_end",
            EventType::TrialEnded => "trial.ended",
            EventType::Other(value) => value,
        }
    }

    /// Parses the canonical dotted form; anything else becomes `Other`.
    pub fn parse(value: &str) -> Self {
        match value {
            "subscription.created" => EventType::SubscriptionCreated,
            "subscription.updated" => EventType::SubscriptionUpdated,
            "subscription.cancelled" => EventType::SubscriptionCancelled,
            "subscription.paused" => EventType::SubscriptionPaused,
            "subscription.resumed" => EventType::SubscriptionResumed,
            "subscription.expired" => EventType::SubscriptionExpired,
            "payment.succeeded" => EventType::PaymentSucceeded,
            "payment.failed" => EventType::PaymentFailed,
            "payment.refunded" => EventType::PaymentRefunded,
            "payment.action_required" => EventType::PaymentActionRequired,
            "customer.updated" => EventType::CustomerUpdated,
            "trial.will_end" => EventType::TrialWillEnd,
            "trial.ended" => EventType::TrialEnded,
            other => EventType::Other(other.to_string()),
        }
    }

    /// True for the `subscription.*` family.
    pub fn is_subscription_lifecycle(&self) -> bool {
        matches!(
            self,
            EventType::SubscriptionCreated
                | EventType::SubscriptionUpdated
                | EventType::SubscriptionCancelled
                | EventType::SubscriptionPaused
                | EventType::SubscriptionResumed
                | EventType::SubscriptionExpired
        )
    }

    /// True for events that confirm money was collected.
    pub fn is_successful_payment(&self) -> bool {
        matches!(
            self,
            EventType::SubscriptionCreated | EventType::PaymentSucceeded
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(EventType::parse(&raw))
    }
}

/// What kind of purchase produced the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    #[default]
    Subscription,
    Donation,
    ShopOrder,
    Commission,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Subscription => "subscription",
            PaymentType::Donation => "donation",
            PaymentType::ShopOrder => "shop_order",
            PaymentType::Commission => "commission",
        }
    }

    /// Parses the stored form; unknown values are `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "subscription" => Some(PaymentType::Subscription),
            "donation" => Some(PaymentType::Donation),
            "shop_order" => Some(PaymentType::ShopOrder),
            "commission" => Some(PaymentType::Commission),
            _ => None,
        }
    }
}

/// One provider webhook, translated into the shared vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub event_type: EventType,
    /// Vendor-unique id; the replay-suppression key together with the integrator.
    pub event_id: String,
    pub event_time: Timestamp,
    pub payment_type: PaymentType,
    pub is_one_off: bool,

    pub subscription_id: Option<String>,
    pub customer_id: Option<String>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,

    /// `None` when the event says nothing about subscription state.
    pub status: Option<SubscriptionStatus>,
    pub plan_name: Option<String>,
    pub plan_id: Option<String>,
    pub billing_interval: Option<String>,
    /// Smallest currency unit.
    pub amount: i64,
    /// ISO 4217, upper-case.
    pub currency: String,

    pub next_billing_date: Option<Timestamp>,
    pub available_until_date: Option<Timestamp>,
    pub trial_ends_at: Option<Timestamp>,
    pub provider_created_at: Option<Timestamp>,
    pub provider_updated_at: Option<Timestamp>,

    pub cancel_url: Option<String>,
    pub update_url: Option<String>,
    pub receipt_url: Option<String>,

    pub metadata: HashMap<String, String>,

    /// Verbatim request body.
    #[serde(skip)]
    pub raw_payload: Vec<u8>,
}

impl NormalizedEvent {
    /// Creates an event with the required identity fields; adapters fill
    /// in the rest before handing it over.
    pub fn new(event_type: EventType, event_id: impl Into<String>, event_time: Timestamp) -> Self {
        Self {
            event_type,
            event_id: event_id.into(),
            event_time,
            payment_type: PaymentType::Subscription,
            is_one_off: false,
            subscription_id: None,
            customer_id: None,
            customer_email: None,
            customer_name: None,
            status: None,
            plan_name: None,
            plan_id: None,
            billing_interval: None,
            amount: 0,
            currency: String::new(),
            next_billing_date: None,
            available_until_date: None,
            trial_ends_at: None,
            provider_created_at: None,
            provider_updated_at: None,
            cancel_url: None,
            update_url: None,
            receipt_url: None,
            metadata: HashMap::new(),
            raw_payload: Vec::new(),
        }
    }

    /// True when the event refers to a recurring subscription the store
    /// should track.
    pub fn is_subscription_bound(&self) -> bool {
        self.payment_type == PaymentType::Subscription
            && !self.is_one_off
            && self.subscription_id.is_some()
    }

    /// Raw payload as lossy UTF-8, for audit records.
    pub fn raw_payload_text(&self) -> String {
        String::from_utf8_lossy(&self.raw_payload).into_owned()
    }
}

/// Returns `Some(trimmed)` for non-blank strings.
pub fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Upper-cases an ISO 4217 currency code.
pub fn normalize_currency(value: &str) -> String {
    value.trim().to_ascii_uppercase()
}

/// ISO 4217 currencies whose minor unit is the major unit.
const ZERO_DECIMAL_CURRENCIES: &[&str] = &[
    "BIF", "CLP", "DJF", "GNF", "JPY", "KMF", "KRW", "MGA", "PYG", "RWF", "UGX", "VND", "VUV",
    "XAF", "XOF", "XPF",
];

/// Number of decimal places between major and minor units (0 or 2).
pub fn currency_exponent(currency: &str) -> u32 {
    if ZERO_DECIMAL_CURRENCIES.contains(&normalize_currency(currency).as_str()) {
        0
    } else {
        2
    }
}
