//! Human-readable billing summaries.

use super::{Subscription, SubscriptionStatus};

/// Formats minor currency units as `"<major>.<minor> <CUR>"`.
pub fn format_amount(amount: i64, currency: &str) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    let major = format!("{}{}.{:02}", sign, abs / 100, abs % 100);
    if currency.is_empty() {
        major
    } else {
        format!("{} {}", major, currency)
    }
}

/// One-sentence description of where a subscription stands.
pub fn billing_summary(subscription: &Subscription) -> String {
    let plan = subscription.plan_name.as_deref().unwrap_or("current");
    let price = format_amount(subscription.amount, &subscription.currency);

    match (&subscription.status, subscription.next_billing_date, subscription.available_until_date) {
        (SubscriptionStatus::Active, Some(next), _) => format!(
            "Your {} plan will automatically renew on {} for {}",
            plan,
            next.to_date_string(),
            price
        ),
        (SubscriptionStatus::Trialing, Some(next), _) => format!(
            "Your trial will end on {}. You'll then be charged {} for {}",
            next.to_date_string(),
            price,
            plan
        ),
        (SubscriptionStatus::PastDue, _, _) => {
            "Your subscription payment is past due. Please update your payment method.".to_string()
        }
        (SubscriptionStatus::Cancelled, _, Some(until)) => format!(
            "Your subscription was cancelled and will expire on {}",
            until.to_date_string()
        ),
        (status, _, _) => format!("Subscription status: {}", status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{EventType, NormalizedEvent};
    use crate::domain::foundation::{SubscriptionId, Timestamp};

    fn subscription(status: SubscriptionStatus) -> Subscription {
        let mut event = NormalizedEvent::new(EventType::SubscriptionCreated, "evt", Timestamp::now());
        event.subscription_id = Some("sub_1".into());
        event.status = Some(status);
        event.plan_name = Some("Pro".into());
        event.amount = 2999;
        event.currency = "USD".into();
        Subscription::from_event(SubscriptionId::new(), None, "stripe", &event, Timestamp::now())
            .unwrap()
    }

    fn jan_first() -> Timestamp {
        Timestamp::from_unix_secs(1_735_689_600).unwrap()
    }

    #[test]
    fn formats_minor_units() {
        assert_eq!(format_amount(2999, "USD"), "29.99 USD");
        assert_eq!(format_amount(500, "EUR"), "5.00 EUR");
        assert_eq!(format_amount(-5, "USD"), "-0.05 USD");
    }

    #[test]
    fn active_with_renewal_date() {
        let mut sub = subscription(SubscriptionStatus::Active);
        sub.next_billing_date = Some(jan_first());
        assert_eq!(
            billing_summary(&sub),
            "Your Pro plan will automatically renew on 2025-01-01 for 29.99 USD"
        );
    }

    #[test]
    fn trialing_with_renewal_date() {
        let mut sub = subscription(SubscriptionStatus::Trialing);
        sub.next_billing_date = Some(jan_first());
        assert_eq!(
            billing_summary(&sub),
            "Your trial will end on 2025-01-01. You'll then be charged 29.99 USD for Pro"
        );
    }

    #[test]
    fn past_due() {
        let sub = subscription(SubscriptionStatus::PastDue);
        assert_eq!(
            billing_summary(&sub),
            "Your subscription payment is past due. Please update your payment method."
        );
    }

    #[test]
    fn cancelled_with_expiry() {
        let mut sub = subscription(SubscriptionStatus::Cancelled);
        sub.available_until_date = Some(jan_first());
        assert_eq!(
            billing_summary(&sub),
            "Your subscription was cancelled and will expire on 2025-01-01"
        );
    }

    #[test]
    fn falls_back_to_status() {
        let sub = subscription(SubscriptionStatus::Active);
        assert_eq!(billing_summary(&sub), "Subscription status: active");
        let cancelled = subscription(SubscriptionStatus::Cancelled);
        assert_eq!(billing_summary(&cancelled), "Subscription status: cancelled");
    }
}
