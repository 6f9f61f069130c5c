//! Lemon Squeezy wire types (JSON:API shaped).

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

/// Lemon Squeezy ids arrive as numbers in attributes and strings in
/// resource identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LsId {
    Number(u64),
    Text(String),
}

impl fmt::Display for LsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LsId::Number(n) => write!(f, "{}", n),
            LsId::Text(s) => f.write_str(s),
        }
    }
}

/// Webhook body: `meta` plus one JSON:API resource.
#[derive(Debug, Clone, Deserialize)]
pub struct LsWebhook {
    pub meta: LsMeta,
    pub data: LsResource<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LsMeta {
    pub event_name: String,
    #[serde(default)]
    pub test_mode: bool,
    /// Checkout `custom` fields passed through by the store.
    #[serde(default)]
    pub custom_data: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LsResource<T> {
    #[serde(rename = "type", default)]
    pub resource_type: String,
    pub id: LsId,
    pub attributes: T,
}

/// API response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct LsDocument<T> {
    pub data: LsResource<T>,
}

/// `subscriptions` resource attributes.
#[derive(Debug, Clone, Deserialize)]
pub struct LsSubscription {
    pub customer_id: Option<LsId>,
    pub order_item_id: Option<LsId>,
    pub product_id: Option<LsId>,
    pub variant_id: Option<LsId>,
    pub product_name: Option<String>,
    pub variant_name: Option<String>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub status: String,
    pub first_subscription_item: Option<LsSubscriptionItem>,
    #[serde(default)]
    pub urls: LsSubscriptionUrls,
    pub renews_at: Option<String>,
    pub ends_at: Option<String>,
    pub trial_ends_at: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LsSubscriptionItem {
    pub price_id: Option<LsId>,
    pub quantity: Option<u64>,
    #[serde(default)]
    pub is_usage_based: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LsSubscriptionUrls {
    pub update_payment_method: Option<String>,
    pub customer_portal: Option<String>,
}

/// `subscription-invoices` resource attributes.
#[derive(Debug, Clone, Deserialize)]
pub struct LsSubscriptionInvoice {
    pub subscription_id: Option<LsId>,
    pub customer_id: Option<LsId>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub billing_reason: Option<String>,
    pub currency: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub refunded_amount: i64,
    #[serde(default)]
    pub urls: LsInvoiceUrls,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LsInvoiceUrls {
    pub invoice_url: Option<String>,
}

/// `orders` resource attributes.
#[derive(Debug, Clone, Deserialize)]
pub struct LsOrder {
    pub customer_id: Option<LsId>,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub currency: Option<String>,
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub refunded_amount: i64,
    pub first_order_item: Option<LsOrderItem>,
    #[serde(default)]
    pub urls: LsOrderUrls,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LsOrderUrls {
    pub receipt: Option<String>,
}

/// `order-items` resource attributes.
#[derive(Debug, Clone, Deserialize)]
pub struct LsOrderItem {
    pub product_name: Option<String>,
    pub variant_name: Option<String>,
    /// Minor units.
    #[serde(default)]
    pub price: i64,
    pub quantity: Option<u64>,
}
