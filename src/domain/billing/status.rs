//! Normalized subscription status.
//!
//! Providers publish overlapping vocabularies (`canceled` vs `cancelled`,
//! `on_trial` vs `trialing`). `SubscriptionStatus::normalize` is the single
//! mapping table; values outside it are kept verbatim in `Other` so a new
//! vendor state is visible rather than silently folded into a default.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Subscription lifecycle status shared by all providers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Cancelled,
    Paused,
    Expired,
    Incomplete,
    Unpaid,
    /// Vendor value outside the mapping table, lower-cased.
    Other(String),
}

impl SubscriptionStatus {
    /// Maps any provider status string onto the normalized set.
    pub fn normalize(raw: &str) -> Self {
        let value = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match value.as_str() {
            "active" | "paid" => SubscriptionStatus::Active,
            "trialing" | "on_trial" | "trial" => SubscriptionStatus::Trialing,
            "past_due" | "pastdue" => SubscriptionStatus::PastDue,
            "canceled" | "cancelled" => SubscriptionStatus::Cancelled,
            "paused" => SubscriptionStatus::Paused,
            "expired" | "incomplete_expired" => SubscriptionStatus::Expired,
            "incomplete" => SubscriptionStatus::Incomplete,
            "unpaid" => SubscriptionStatus::Unpaid,
            _ => SubscriptionStatus::Other(value),
        }
    }

    /// Canonical string form.
    pub fn as_str(&self) -> &str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Paused => "paused",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Other(value) => value,
        }
    }

    /// Active or trialing.
    pub fn is_active(&self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::Trialing)
    }

    /// Cancelled or expired.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SubscriptionStatus::Cancelled | SubscriptionStatus::Expired)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SubscriptionStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SubscriptionStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(SubscriptionStatus::normalize(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stripe_canceled_maps_to_cancelled() {
        assert_eq!(SubscriptionStatus::normalize("canceled"), SubscriptionStatus::Cancelled);
    }

    #[test]
    fn lemonsqueezy_on_trial_maps_to_trialing() {
        assert_eq!(SubscriptionStatus::normalize("on_trial"), SubscriptionStatus::Trialing);
    }

    #[test]
    fn normalization_ignores_case_and_separators() {
        assert_eq!(SubscriptionStatus::normalize("Past-Due"), SubscriptionStatus::PastDue);
        assert_eq!(SubscriptionStatus::normalize(" ACTIVE "), SubscriptionStatus::Active);
    }

    #[test]
    fn unknown_values_pass_through_lowercased() {
        let status = SubscriptionStatus::normalize("Frozen");
        assert_eq!(status, SubscriptionStatus::Other("frozen".to_string()));
        assert_eq!(status.as_str(), "frozen");
    }

    #[test]
    fn active_predicate_covers_trialing() {
        assert!(SubscriptionStatus::Active.is_active());
        assert!(SubscriptionStatus::Trialing.is_active());
        assert!(!SubscriptionStatus::PastDue.is_active());
    }

    #[test]
    fn terminal_predicate() {
        assert!(SubscriptionStatus::Cancelled.is_terminal());
        assert!(SubscriptionStatus::Expired.is_terminal());
        assert!(!SubscriptionStatus::Paused.is_terminal());
    }

    #[test]
    fn serde_uses_canonical_strings() {
        let json = serde_json::to_string(&SubscriptionStatus::PastDue).unwrap();
        assert_eq!(json, "\"past_due\"");
        let back: SubscriptionStatus = serde_json::from_str("\"canceled\"").unwrap();
        assert_eq!(back, SubscriptionStatus::Cancelled);
    }
}
