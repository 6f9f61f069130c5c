//! Append-only record of every webhook the service accepted.

use serde::{Deserialize, Serialize};

use super::{EventType, NormalizedEvent, PaymentType, SubscriptionStatus};
use crate::domain::foundation::{BillingEventId, SubscriptionId, Timestamp, UserId};

/// A billing event as stored. Unique per `(integrator, integrator_event_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingEvent {
    pub id: BillingEventId,
    /// `None` for donations and other non-subscription payments.
    pub subscription_id: Option<SubscriptionId>,
    pub user_id: Option<UserId>,
    pub event_type: EventType,
    pub payment_type: PaymentType,
    pub integrator: String,
    pub integrator_event_id: String,
    pub integrator_subscription_id: Option<String>,
    pub status: Option<SubscriptionStatus>,
    pub amount: i64,
    pub currency: String,
    pub plan_name: Option<String>,
    pub receipt_url: Option<String>,
    pub raw_payload: String,
    pub provider_event_time: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl BillingEvent {
    /// Captures a normalized event together with what reconciliation
    /// resolved for it.
    pub fn from_event(
        id: BillingEventId,
        integrator: &str,
        event: &NormalizedEvent,
        subscription_id: Option<SubscriptionId>,
        user_id: Option<UserId>,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            subscription_id,
            user_id,
            event_type: event.event_type.clone(),
            payment_type: event.payment_type,
            integrator: integrator.to_string(),
            integrator_event_id: event.event_id.clone(),
            integrator_subscription_id: event.subscription_id.clone(),
            status: event.status.clone(),
            amount: event.amount,
            currency: event.currency.clone(),
            plan_name: event.plan_name.clone(),
            receipt_url: event.receipt_url.clone(),
            raw_payload: event.raw_payload_text(),
            provider_event_time: event.event_time,
            created_at: now,
            updated_at: now,
        }
    }

    /// Human-readable line for billing history views.
    pub fn description(&self) -> String {
        describe_event(&self.event_type, self.plan_name.as_deref())
    }
}

/// Describes an event type, naming the plan when one is known.
pub fn describe_event(event_type: &EventType, plan_name: Option<&str>) -> String {
    let plan = plan_name.filter(|p| !p.trim().is_empty());
    let with_plan = |base: &str| match plan {
        Some(plan) => format!("{} ({})", base, plan),
        None => base.to_string(),
    };
    match event_type {
        EventType::SubscriptionCreated => match plan {
            Some(plan) => format!("Subscribed to {}", plan),
            None => "Subscription started".to_string(),
        },
        EventType::SubscriptionUpdated => with_plan("Subscription updated"),
        EventType::SubscriptionCancelled => with_plan("Subscription cancelled"),
        EventType::SubscriptionPaused => with_plan("Subscription paused"),
        EventType::SubscriptionResumed => with_plan("Subscription resumed"),
        EventType::SubscriptionExpired => with_plan("Subscription expired"),
        EventType::PaymentSucceeded => match plan {
            Some(plan) => format!("Payment for {}", plan),
            None => "Payment received".to_string(),
        },
        EventType::PaymentFailed => with_plan("Payment failed"),
        EventType::PaymentRefunded => with_plan("Payment refunded"),
        EventType::PaymentActionRequired => with_plan("Payment requires action"),
        EventType::CustomerUpdated => "Billing details updated".to_string(),
        EventType::TrialWillEnd => with_plan("Trial ending soon"),
        EventType::TrialEnded => with_plan("Trial ended"),
        EventType::Other(raw) => with_plan(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_event_copies_identity_and_payload() {
        let mut event = NormalizedEvent::new(
            EventType::PaymentSucceeded,
            "evt_9",
            Timestamp::from_unix_secs(1_700_000_000).unwrap(),
        );
        event.subscription_id = Some("sub_1".into());
        event.amount = 500;
        event.currency = "USD".into();
        event.raw_payload = br#"{"id":"evt_9"}"#.to_vec();

        let record = BillingEvent::from_event(
            BillingEventId::new(),
            "stripe",
            &event,
            None,
            None,
            Timestamp::now(),
        );

        assert_eq!(record.integrator, "stripe");
        assert_eq!(record.integrator_event_id, "evt_9");
        assert_eq!(record.integrator_subscription_id.as_deref(), Some("sub_1"));
        assert_eq!(record.raw_payload, r#"{"id":"evt_9"}"#);
        assert_eq!(record.provider_event_time, event.event_time);
    }

    #[test]
    fn descriptions_name_the_plan() {
        assert_eq!(
            describe_event(&EventType::SubscriptionCreated, Some("Pro")),
            "Subscribed to Pro"
        );
        assert_eq!(
            describe_event(&EventType::PaymentFailed, Some("Pro")),
            "Payment failed (Pro)"
        );
    }

    #[test]
    fn descriptions_without_plan() {
        assert_eq!(
            describe_event(&EventType::PaymentSucceeded, None),
            "Payment received"
        );
        assert_eq!(
            describe_event(&EventType::SubscriptionCreated, Some("  ")),
            "Subscription started"
        );
    }

    #[test]
    fn unknown_event_types_describe_verbatim() {
        assert_eq!(
            describe_event(&EventType::Other("invoice.finalized".into()), None),
            "invoice.finalized"
        );
    }
}
