//! Ko-fi webhook payload.
//!
//! Ko-fi posts `application/x-www-form-urlencoded` with a single `data`
//! field holding JSON.

use serde::Deserialize;

use crate::domain::billing::{currency_exponent, BillingError};

/// Name of the form field carrying the JSON payload.
pub const DATA_FIELD: &str = "data";

#[derive(Debug, Clone, Deserialize)]
pub struct KofiPayload {
    pub verification_token: Option<String>,
    pub message_id: Option<String>,
    pub timestamp: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub is_public: bool,
    pub from_name: Option<String>,
    pub message: Option<String>,
    /// Decimal string, e.g. `"5.00"`.
    pub amount: Option<String>,
    pub url: Option<String>,
    pub email: Option<String>,
    pub currency: Option<String>,
    #[serde(default)]
    pub is_subscription_payment: bool,
    #[serde(default)]
    pub is_first_subscription_payment: bool,
    pub kofi_transaction_id: Option<String>,
    pub tier_name: Option<String>,
}

/// Ko-fi transaction kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KofiKind {
    Donation,
    Subscription,
    ShopOrder,
    Commission,
}

impl KofiKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "donation" => Some(KofiKind::Donation),
            "subscription" => Some(KofiKind::Subscription),
            "shop order" => Some(KofiKind::ShopOrder),
            "commission" => Some(KofiKind::Commission),
            _ => None,
        }
    }
}

/// Extracts and decodes the `data` field of a form body.
pub fn decode_form(body: &[u8]) -> Result<KofiPayload, BillingError> {
    let data = url::form_urlencoded::parse(body)
        .find(|(key, _)| key == DATA_FIELD)
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| BillingError::parsing("missing form field `data`"))?;
    serde_json::from_str(&data).map_err(BillingError::parsing)
}

/// Converts a decimal string to minor units of `currency`: `"5.00"` USD
/// becomes `500`, `"500"` JPY stays `500`. Digits past the currency's
/// precision must be zero.
pub fn parse_amount(raw: &str, currency: &str) -> Result<i64, BillingError> {
    let invalid = || BillingError::parsing(format!("invalid amount {:?}", raw));
    let raw = raw.trim();
    let (whole, fraction) = raw.split_once('.').unwrap_or((raw, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    let digits_only = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !digits_only(whole) || !digits_only(fraction) {
        return Err(invalid());
    }

    let exponent = currency_exponent(currency) as usize;
    let (kept, dropped) = fraction.split_at(fraction.len().min(exponent));
    if dropped.chars().any(|c| c != '0') {
        return Err(invalid());
    }

    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let minor: i64 = if kept.is_empty() {
        0
    } else {
        format!("{:0<width$}", kept, width = exponent)
            .parse()
            .map_err(|_| invalid())?
    };
    whole
        .checked_mul(10_i64.pow(exponent as u32))
        .and_then(|w| w.checked_add(minor))
        .ok_or_else(|| BillingError::parsing(format!("amount out of range {:?}", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_amounts() {
        assert_eq!(parse_amount("5.00", "USD").unwrap(), 500);
        assert_eq!(parse_amount("3", "USD").unwrap(), 300);
        assert_eq!(parse_amount("12.5", "EUR").unwrap(), 1250);
        assert_eq!(parse_amount("0.99", "GBP").unwrap(), 99);
        assert_eq!(parse_amount(".75", "USD").unwrap(), 75);
    }

    #[test]
    fn zero_decimal_currencies_are_not_scaled() {
        assert_eq!(parse_amount("500", "JPY").unwrap(), 500);
        assert_eq!(parse_amount("500.00", "jpy").unwrap(), 500);
        assert_eq!(parse_amount("1000", "KRW").unwrap(), 1000);
        assert!(matches!(
            parse_amount("500.5", "JPY"),
            Err(BillingError::PayloadParsing(_))
        ));
    }

    #[test]
    fn rejects_malformed_amounts() {
        assert!(parse_amount("", "USD").is_err());
        assert!(parse_amount("five", "USD").is_err());
        assert!(parse_amount("-1.00", "USD").is_err());
        assert!(parse_amount("1,00", "USD").is_err());
        assert!(parse_amount("1.005", "USD").is_err());
        assert!(parse_amount("92233720368547758.08", "USD").is_err());
    }

    #[test]
    fn decodes_form_data_field() {
        let body = b"data=%7B%22type%22%3A%22Donation%22%2C%22amount%22%3A%223.00%22%7D";
        let payload = decode_form(body).unwrap();
        assert_eq!(payload.kind, "Donation");
        assert_eq!(payload.amount.as_deref(), Some("3.00"));
    }

    #[test]
    fn missing_data_field_is_parsing_error() {
        assert!(matches!(
            decode_form(b"other=1"),
            Err(BillingError::PayloadParsing(_))
        ));
    }

    #[test]
    fn kinds_are_case_insensitive() {
        assert_eq!(KofiKind::parse("Shop Order"), Some(KofiKind::ShopOrder));
        assert_eq!(KofiKind::parse("SUBSCRIPTION"), Some(KofiKind::Subscription));
        assert_eq!(KofiKind::parse("Refund"), None);
    }
}
