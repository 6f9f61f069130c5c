//! Stripe wire types.
//!
//! Only the fields the adapter reads are modelled. Stripe objects often
//! carry either an id or the expanded object in the same slot; those are
//! [`Expandable`] so both shapes parse.

use serde::Deserialize;
use std::collections::HashMap;

use crate::domain::billing::BillingError;

// ════════════════════════════════════════════════════════════════════════════════
// Signature Header
// ════════════════════════════════════════════════════════════════════════════════

/// Parsed `Stripe-Signature` header: `t=<unix>,v1=<hex>[,v1=<hex>][,v0=..]`.
///
/// Stripe sends several `v1` entries while a signing secret is being
/// rolled; any of them may match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, BillingError> {
        let mut timestamp: Option<i64> = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let Some((key, value)) = part.split_once('=') else {
                return Err(BillingError::InvalidSignature);
            };
            match key.trim() {
                "t" => {
                    timestamp = Some(
                        value
                            .trim()
                            .parse()
                            .map_err(|_| BillingError::InvalidSignature)?,
                    );
                }
                "v1" => {
                    let bytes =
                        hex::decode(value.trim()).map_err(|_| BillingError::InvalidSignature)?;
                    v1_signatures.push(bytes);
                }
                // v0 and unknown schemes are ignored
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(BillingError::InvalidSignature)?;
        if v1_signatures.is_empty() {
            return Err(BillingError::MissingSignature);
        }
        Ok(Self {
            timestamp,
            v1_signatures,
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Event Envelope
// ════════════════════════════════════════════════════════════════════════════════

/// Webhook event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    /// `evt_...`
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix seconds.
    pub created: i64,

    pub data: StripeEventData,

    #[serde(default)]
    pub livemode: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,

    /// Fields an `*.updated` event changed, with their old values.
    #[serde(default)]
    pub previous_attributes: Option<serde_json::Value>,
}

/// Either a bare id or the expanded object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Expandable<T> {
    Id(String),
    Object(Box<T>),
}

impl<T: HasId> Expandable<T> {
    pub fn id(&self) -> &str {
        match self {
            Expandable::Id(id) => id,
            Expandable::Object(obj) => obj.id(),
        }
    }

    pub fn object(&self) -> Option<&T> {
        match self {
            Expandable::Id(_) => None,
            Expandable::Object(obj) => Some(obj.as_ref()),
        }
    }
}

/// Objects addressable by a Stripe id.
pub trait HasId {
    fn id(&self) -> &str;
}

macro_rules! has_id {
    ($($ty:ty),*) => {
        $(impl HasId for $ty {
            fn id(&self) -> &str {
                &self.id
            }
        })*
    };
}

has_id!(StripeCustomer, StripeProduct, StripeSubscription);

// ════════════════════════════════════════════════════════════════════════════════
// API Objects
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeProduct {
    pub id: String,
    pub name: Option<String>,
}

/// Legacy plan object; `interval` and `usage_type` are kept as metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct StripePlan {
    pub id: String,
    pub interval: Option<String>,
    pub usage_type: Option<String>,
    pub nickname: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    /// `sub_...`
    pub id: String,
    pub customer: Expandable<StripeCustomer>,
    pub status: String,
    pub currency: Option<String>,
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    pub cancel_at: Option<i64>,
    pub canceled_at: Option<i64>,
    pub ended_at: Option<i64>,
    pub trial_end: Option<i64>,
    pub created: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub items: StripeList<StripeSubscriptionItem>,
}

impl StripeSubscription {
    pub fn first_item(&self) -> Option<&StripeSubscriptionItem> {
        self.items.data.first()
    }

    /// Period end, read from the item on API versions that moved it there.
    pub fn period_end(&self) -> Option<i64> {
        self.current_period_end
            .or_else(|| self.first_item().and_then(|i| i.current_period_end))
    }

    /// When access lapses for a subscription set to cancel.
    pub fn access_ends_at(&self) -> Option<i64> {
        if self.cancel_at_period_end {
            return self.period_end();
        }
        self.cancel_at.or(self.ended_at)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

impl<T> Default for StripeList<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscriptionItem {
    pub id: Option<String>,
    pub price: Option<StripePrice>,
    pub plan: Option<StripePlanRef>,
    pub quantity: Option<i64>,
    pub current_period_end: Option<i64>,
}

/// Plan as embedded in items; only the id is used.
#[derive(Debug, Clone, Deserialize)]
pub struct StripePlanRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePrice {
    pub id: String,
    pub product: Option<Expandable<StripeProduct>>,
    pub unit_amount: Option<i64>,
    pub currency: Option<String>,
    pub recurring: Option<StripeRecurring>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeRecurring {
    pub interval: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoice {
    /// `in_...`
    pub id: String,
    pub customer: Option<Expandable<StripeCustomer>>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub subscription: Option<Expandable<StripeSubscription>>,
    pub parent: Option<StripeInvoiceParent>,
    #[serde(default)]
    pub amount_paid: i64,
    #[serde(default)]
    pub amount_due: i64,
    pub currency: Option<String>,
    pub hosted_invoice_url: Option<String>,
    #[serde(default)]
    pub lines: StripeList<StripeInvoiceLine>,
}

impl StripeInvoice {
    /// Subscription id from either the legacy field or `parent`.
    pub fn subscription_id(&self) -> Option<&str> {
        self.subscription.as_ref().map(|s| s.id()).or_else(|| {
            self.parent
                .as_ref()
                .and_then(|p| p.subscription_details.as_ref())
                .and_then(|d| d.subscription.as_deref())
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoiceParent {
    pub subscription_details: Option<StripeSubscriptionDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscriptionDetails {
    pub subscription: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoiceLine {
    pub price: Option<StripePrice>,
    pub period: Option<StripePeriod>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePeriod {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCharge {
    /// `ch_...`
    pub id: String,
    pub customer: Option<Expandable<StripeCustomer>>,
    pub receipt_email: Option<String>,
    pub billing_details: Option<StripeBillingDetails>,
    #[serde(default)]
    pub amount_refunded: i64,
    pub currency: Option<String>,
    pub receipt_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeBillingDetails {
    pub email: Option<String>,
    pub name: Option<String>,
}
