//! PostgreSQL implementation of BillingStore.
//!
//! Uniqueness of `(integrator, integrator_subscription_id)` and
//! `(integrator, integrator_event_id)` is enforced by table constraints;
//! violations surface as `DuplicateSubscription` / `DuplicateBillingEvent`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::Postgres;
use sqlx::types::Json;
use sqlx::{PgPool, QueryBuilder};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::adapters::clock::SystemClock;

use crate::domain::billing::{
    normalize_email, BillingEvent, EventType, Page, PageRequest, PaymentType, SortOrder,
    Subscription, SubscriptionStatus,
};
use crate::domain::foundation::{
    BillingEventId, DomainError, ErrorCode, SubscriptionId, Timestamp, UserId,
};
use crate::ports::{BillingEventFilter, BillingStore, Clock, SubscriptionFilter};

const SUBSCRIPTION_UNIQUE: &str = "subscriptions_integrator_subscription_key";
const BILLING_EVENT_UNIQUE: &str = "billing_events_integrator_event_key";

const SUBSCRIPTION_COLUMNS: &str = r#"
    id, user_id, email, status, integrator, integrator_subscription_id, integrator_customer_id,
    plan_name, plan_id, amount, currency, billing_interval,
    next_billing_date, available_until_date, trial_ends_at, cancelled_at,
    provider_created_at, provider_updated_at, cancel_url, update_url, metadata,
    created_at, updated_at
"#;

const BILLING_EVENT_COLUMNS: &str = r#"
    id, subscription_id, user_id, event_type, payment_type, integrator, integrator_event_id,
    integrator_subscription_id, status, amount, currency, plan_name, receipt_url, raw_payload,
    provider_event_time, created_at, updated_at
"#;

/// PostgreSQL implementation of the BillingStore port.
pub struct PostgresBillingStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl PostgresBillingStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            clock: Arc::new(SystemClock),
        }
    }

    /// Clock used for timestamps the store writes itself.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    user_id: Option<String>,
    email: Option<String>,
    status: String,
    integrator: String,
    integrator_subscription_id: String,
    integrator_customer_id: Option<String>,
    plan_name: Option<String>,
    plan_id: Option<String>,
    amount: i64,
    currency: String,
    billing_interval: Option<String>,
    next_billing_date: Option<DateTime<Utc>>,
    available_until_date: Option<DateTime<Utc>>,
    trial_ends_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    provider_created_at: Option<DateTime<Utc>>,
    provider_updated_at: Option<DateTime<Utc>>,
    cancel_url: Option<String>,
    update_url: Option<String>,
    metadata: Json<HashMap<String, String>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_user_id(raw: Option<String>) -> Result<Option<UserId>, DomainError> {
    raw.filter(|s| !s.trim().is_empty())
        .map(UserId::new)
        .transpose()
        .map_err(|e| DomainError::new(ErrorCode::DatabaseError, format!("Invalid user_id: {}", e)))
}

fn ts(value: Option<DateTime<Utc>>) -> Option<Timestamp> {
    value.map(Timestamp::from_datetime)
}

fn dt(value: Option<Timestamp>) -> Option<DateTime<Utc>> {
    value.map(|t| *t.as_datetime())
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(Subscription {
            id: SubscriptionId::from_uuid(row.id),
            user_id: parse_user_id(row.user_id)?,
            email: row.email,
            status: SubscriptionStatus::normalize(&row.status),
            integrator: row.integrator,
            integrator_subscription_id: row.integrator_subscription_id,
            integrator_customer_id: row.integrator_customer_id,
            plan_name: row.plan_name,
            plan_id: row.plan_id,
            amount: row.amount,
            currency: row.currency,
            billing_interval: row.billing_interval,
            next_billing_date: ts(row.next_billing_date),
            available_until_date: ts(row.available_until_date),
            trial_ends_at: ts(row.trial_ends_at),
            cancelled_at: ts(row.cancelled_at),
            provider_created_at: ts(row.provider_created_at),
            provider_updated_at: ts(row.provider_updated_at),
            cancel_url: row.cancel_url,
            update_url: row.update_url,
            metadata: row.metadata.0,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BillingEventRow {
    id: Uuid,
    subscription_id: Option<Uuid>,
    user_id: Option<String>,
    event_type: String,
    payment_type: String,
    integrator: String,
    integrator_event_id: String,
    integrator_subscription_id: Option<String>,
    status: Option<String>,
    amount: i64,
    currency: String,
    plan_name: Option<String>,
    receipt_url: Option<String>,
    raw_payload: String,
    provider_event_time: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BillingEventRow> for BillingEvent {
    type Error = DomainError;

    fn try_from(row: BillingEventRow) -> Result<Self, Self::Error> {
        let payment_type = PaymentType::parse(&row.payment_type).ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid payment_type value: {}", row.payment_type),
            )
        })?;
        Ok(BillingEvent {
            id: BillingEventId::from_uuid(row.id),
            subscription_id: row.subscription_id.map(SubscriptionId::from_uuid),
            user_id: parse_user_id(row.user_id)?,
            event_type: EventType::parse(&row.event_type),
            payment_type,
            integrator: row.integrator,
            integrator_event_id: row.integrator_event_id,
            integrator_subscription_id: row.integrator_subscription_id,
            status: row.status.as_deref().map(SubscriptionStatus::normalize),
            amount: row.amount,
            currency: row.currency,
            plan_name: row.plan_name,
            receipt_url: row.receipt_url,
            raw_payload: row.raw_payload,
            provider_event_time: Timestamp::from_datetime(row.provider_event_time),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

fn order_clause(order: SortOrder) -> &'static str {
    match order {
        SortOrder::CreatedAtAsc => " ORDER BY created_at ASC, id ASC",
        SortOrder::CreatedAtDesc => " ORDER BY created_at DESC, id DESC",
        SortOrder::UpdatedAtAsc => " ORDER BY updated_at ASC, id ASC",
        SortOrder::UpdatedAtDesc => " ORDER BY updated_at DESC, id DESC",
    }
}

fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.constraint() == Some(constraint))
}

fn user_id_strings(ids: &[UserId]) -> Vec<String> {
    ids.iter().map(|id| id.as_str().to_string()).collect()
}

/// Appends subscription filter conditions. The builder must already end
/// in a `WHERE` clause.
fn push_subscription_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &SubscriptionFilter) {
    if !filter.user_ids.is_empty() {
        builder
            .push(" AND user_id = ANY(")
            .push_bind(user_id_strings(&filter.user_ids))
            .push(")");
    }
    if !filter.emails.is_empty() {
        let emails: Vec<String> = filter.emails.iter().map(|e| normalize_email(e)).collect();
        builder.push(" AND email = ANY(").push_bind(emails).push(")");
    }
    if let Some(integrator) = &filter.integrator {
        builder.push(" AND integrator = ").push_bind(integrator.clone());
    }
    if !filter.statuses.is_empty() {
        let statuses: Vec<String> = filter.statuses.iter().map(|s| s.as_str().to_string()).collect();
        builder.push(" AND status = ANY(").push_bind(statuses).push(")");
    }
    if let Some(currency) = &filter.currency {
        builder
            .push(" AND UPPER(currency) = ")
            .push_bind(currency.to_ascii_uppercase());
    }
    if let Some(interval) = &filter.billing_interval {
        builder.push(" AND billing_interval = ").push_bind(interval.clone());
    }
    if let Some(needle) = &filter.plan_name_contains {
        builder
            .push(" AND plan_name ILIKE ")
            .push_bind(format!("%{}%", escape_like(needle)));
    }
    if let Some(after) = filter.created_after {
        builder.push(" AND created_at >= ").push_bind(*after.as_datetime());
    }
    if let Some(before) = filter.created_before {
        builder.push(" AND created_at <= ").push_bind(*before.as_datetime());
    }
    if let Some(after) = filter.next_billing_after {
        builder
            .push(" AND next_billing_date >= ")
            .push_bind(*after.as_datetime());
    }
    if let Some(before) = filter.next_billing_before {
        builder
            .push(" AND next_billing_date <= ")
            .push_bind(*before.as_datetime());
    }
}

fn push_billing_event_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &BillingEventFilter) {
    if !filter.user_ids.is_empty() {
        builder
            .push(" AND user_id = ANY(")
            .push_bind(user_id_strings(&filter.user_ids))
            .push(")");
    }
    if let Some(integrator) = &filter.integrator {
        builder.push(" AND integrator = ").push_bind(integrator.clone());
    }
    if !filter.event_types.is_empty() {
        let types: Vec<String> = filter.event_types.iter().map(|t| t.as_str().to_string()).collect();
        builder.push(" AND event_type = ANY(").push_bind(types).push(")");
    }
    if !filter.subscription_ids.is_empty() {
        let ids: Vec<Uuid> = filter.subscription_ids.iter().map(|id| *id.as_uuid()).collect();
        builder.push(" AND subscription_id = ANY(").push_bind(ids).push(")");
    }
    if let Some(sub_id) = &filter.integrator_subscription_id {
        builder
            .push(" AND integrator_subscription_id = ")
            .push_bind(sub_id.clone());
    }
    if let Some(after) = filter.created_after {
        builder.push(" AND created_at >= ").push_bind(*after.as_datetime());
    }
    if let Some(before) = filter.created_before {
        builder.push(" AND created_at <= ").push_bind(*before.as_datetime());
    }
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn page_bounds(page: &PageRequest) -> Result<(i64, i64), DomainError> {
    let offset = i64::try_from(page.offset())
        .map_err(|_| DomainError::validation("page", "Page is too large"))?;
    Ok((i64::from(page.per_page()), offset))
}

#[async_trait]
impl BillingStore for PostgresBillingStore {
    async fn create_subscription(&self, subscription: &Subscription) -> Result<(), DomainError> {
        sqlx::query(&format!(
            "INSERT INTO subscriptions ({}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, \
              $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23)",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(subscription.id.as_uuid())
        .bind(subscription.user_id.as_ref().map(|u| u.as_str().to_string()))
        .bind(subscription.email.as_deref().map(normalize_email))
        .bind(subscription.status.as_str())
        .bind(&subscription.integrator)
        .bind(&subscription.integrator_subscription_id)
        .bind(&subscription.integrator_customer_id)
        .bind(&subscription.plan_name)
        .bind(&subscription.plan_id)
        .bind(subscription.amount)
        .bind(&subscription.currency)
        .bind(&subscription.billing_interval)
        .bind(dt(subscription.next_billing_date))
        .bind(dt(subscription.available_until_date))
        .bind(dt(subscription.trial_ends_at))
        .bind(dt(subscription.cancelled_at))
        .bind(dt(subscription.provider_created_at))
        .bind(dt(subscription.provider_updated_at))
        .bind(&subscription.cancel_url)
        .bind(&subscription.update_url)
        .bind(Json(&subscription.metadata))
        .bind(subscription.created_at.as_datetime())
        .bind(subscription.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, SUBSCRIPTION_UNIQUE) || is_unique_violation(&e, "subscriptions_pkey") {
                return DomainError::new(
                    ErrorCode::DuplicateSubscription,
                    format!(
                        "Subscription {}/{} already exists",
                        subscription.integrator, subscription.integrator_subscription_id
                    ),
                );
            }
            DomainError::database("Failed to create subscription", e)
        })?;
        Ok(())
    }

    async fn update_subscription(&self, subscription: &Subscription) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET
                user_id = $2,
                email = $3,
                status = $4,
                integrator_customer_id = $5,
                plan_name = $6,
                plan_id = $7,
                amount = $8,
                currency = $9,
                billing_interval = $10,
                next_billing_date = $11,
                available_until_date = $12,
                trial_ends_at = $13,
                cancelled_at = $14,
                provider_created_at = $15,
                provider_updated_at = $16,
                cancel_url = $17,
                update_url = $18,
                metadata = $19,
                updated_at = $20
            WHERE id = $1
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.user_id.as_ref().map(|u| u.as_str().to_string()))
        .bind(subscription.email.as_deref().map(normalize_email))
        .bind(subscription.status.as_str())
        .bind(&subscription.integrator_customer_id)
        .bind(&subscription.plan_name)
        .bind(&subscription.plan_id)
        .bind(subscription.amount)
        .bind(&subscription.currency)
        .bind(&subscription.billing_interval)
        .bind(dt(subscription.next_billing_date))
        .bind(dt(subscription.available_until_date))
        .bind(dt(subscription.trial_ends_at))
        .bind(dt(subscription.cancelled_at))
        .bind(dt(subscription.provider_created_at))
        .bind(dt(subscription.provider_updated_at))
        .bind(&subscription.cancel_url)
        .bind(&subscription.update_url)
        .bind(Json(&subscription.metadata))
        .bind(subscription.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to update subscription", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::SubscriptionNotFound,
                "Subscription not found",
            ));
        }
        Ok(())
    }

    async fn delete_subscription(&self, id: &SubscriptionId) -> Result<(), DomainError> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to delete subscription", e))?;
        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::SubscriptionNotFound,
                "Subscription not found",
            ));
        }
        Ok(())
    }

    async fn get_subscription_by_id(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE id = $1",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to fetch subscription", e))?;
        row.map(Subscription::try_from).transpose()
    }

    async fn get_subscription_by_integrator_id(
        &self,
        integrator: &str,
        integrator_subscription_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE integrator = $1 AND integrator_subscription_id = $2",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(integrator)
        .bind(integrator_subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to fetch subscription", e))?;
        row.map(Subscription::try_from).transpose()
    }

    async fn get_subscriptions(
        &self,
        filter: &SubscriptionFilter,
        page: &PageRequest,
        order: SortOrder,
    ) -> Result<Page<Subscription>, DomainError> {
        let total = self.get_total_subscriptions(filter).await?;
        page.ensure_in_range(total)?;
        let (limit, offset) = page_bounds(page)?;

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM subscriptions WHERE TRUE",
            SUBSCRIPTION_COLUMNS
        ));
        push_subscription_filters(&mut builder, filter);
        builder.push(order_clause(order));
        builder.push(" LIMIT ").push_bind(limit);
        builder.push(" OFFSET ").push_bind(offset);

        let rows: Vec<SubscriptionRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to list subscriptions", e))?;
        let items = rows
            .into_iter()
            .map(Subscription::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total, page))
    }

    async fn get_total_subscriptions(
        &self,
        filter: &SubscriptionFilter,
    ) -> Result<u64, DomainError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM subscriptions WHERE TRUE");
        push_subscription_filters(&mut builder, filter);
        let total: i64 = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to count subscriptions", e))?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    async fn get_subscriptions_by_email(
        &self,
        email: &str,
    ) -> Result<Vec<Subscription>, DomainError> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE email = $1 ORDER BY created_at DESC",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(normalize_email(email))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to fetch subscriptions by email", e))?;
        rows.into_iter().map(Subscription::try_from).collect()
    }

    async fn associate_subscriptions_with_user(
        &self,
        user_id: &UserId,
        email: &str,
    ) -> Result<u64, DomainError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET user_id = $1, updated_at = $2
            WHERE email = $3 AND (user_id IS NULL OR user_id = '')
            "#,
        )
        .bind(user_id.as_str())
        .bind(self.clock.now().as_datetime())
        .bind(&email)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to associate subscriptions", e))?;
        Ok(result.rows_affected())
    }

    async fn create_billing_event(&self, event: &BillingEvent) -> Result<(), DomainError> {
        sqlx::query(&format!(
            "INSERT INTO billing_events ({}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
            BILLING_EVENT_COLUMNS
        ))
        .bind(event.id.as_uuid())
        .bind(event.subscription_id.map(|id| *id.as_uuid()))
        .bind(event.user_id.as_ref().map(|u| u.as_str().to_string()))
        .bind(event.event_type.as_str())
        .bind(event.payment_type.as_str())
        .bind(&event.integrator)
        .bind(&event.integrator_event_id)
        .bind(&event.integrator_subscription_id)
        .bind(event.status.as_ref().map(|s| s.as_str().to_string()))
        .bind(event.amount)
        .bind(&event.currency)
        .bind(&event.plan_name)
        .bind(&event.receipt_url)
        .bind(&event.raw_payload)
        .bind(event.provider_event_time.as_datetime())
        .bind(event.created_at.as_datetime())
        .bind(event.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, BILLING_EVENT_UNIQUE) || is_unique_violation(&e, "billing_events_pkey") {
                return DomainError::new(
                    ErrorCode::DuplicateBillingEvent,
                    format!(
                        "Billing event {}/{} already recorded",
                        event.integrator, event.integrator_event_id
                    ),
                );
            }
            DomainError::database("Failed to create billing event", e)
        })?;
        Ok(())
    }

    async fn get_billing_event_by_id(
        &self,
        id: &BillingEventId,
    ) -> Result<Option<BillingEvent>, DomainError> {
        let row: Option<BillingEventRow> = sqlx::query_as(&format!(
            "SELECT {} FROM billing_events WHERE id = $1",
            BILLING_EVENT_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to fetch billing event", e))?;
        row.map(BillingEvent::try_from).transpose()
    }

    async fn get_billing_events(
        &self,
        filter: &BillingEventFilter,
        page: &PageRequest,
        order: SortOrder,
    ) -> Result<Page<BillingEvent>, DomainError> {
        let total = self.get_total_billing_events(filter).await?;
        page.ensure_in_range(total)?;
        let (limit, offset) = page_bounds(page)?;

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM billing_events WHERE TRUE",
            BILLING_EVENT_COLUMNS
        ));
        push_billing_event_filters(&mut builder, filter);
        builder.push(order_clause(order));
        builder.push(" LIMIT ").push_bind(limit);
        builder.push(" OFFSET ").push_bind(offset);

        let rows: Vec<BillingEventRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to list billing events", e))?;
        let items = rows
            .into_iter()
            .map(BillingEvent::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total, page))
    }

    async fn get_total_billing_events(
        &self,
        filter: &BillingEventFilter,
    ) -> Result<u64, DomainError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM billing_events WHERE TRUE");
        push_billing_event_filters(&mut builder, filter);
        let total: i64 = builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to count billing events", e))?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    async fn get_first_successful_billing_event_with_plan_name(
        &self,
        integrator: &str,
        integrator_subscription_id: &str,
    ) -> Result<Option<BillingEvent>, DomainError> {
        let successful: Vec<String> = [EventType::SubscriptionCreated, EventType::PaymentSucceeded]
        .iter()
        .map(|t| t.as_str().to_string())
        .collect();

        let row: Option<BillingEventRow> = sqlx::query_as(&format!(
            "SELECT {} FROM billing_events \
             WHERE integrator = $1 AND integrator_subscription_id = $2 \
               AND event_type = ANY($3) \
               AND plan_name IS NOT NULL AND btrim(plan_name) <> '' \
             ORDER BY provider_event_time ASC, created_at ASC \
             LIMIT 1",
            BILLING_EVENT_COLUMNS
        ))
        .bind(integrator)
        .bind(integrator_subscription_id)
        .bind(successful)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to fetch first successful billing event", e))?;
        row.map(BillingEvent::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_clause_breaks_ties_by_id() {
        assert!(order_clause(SortOrder::CreatedAtDesc).ends_with("id DESC"));
        assert!(order_clause(SortOrder::UpdatedAtAsc).starts_with(" ORDER BY updated_at ASC"));
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
    }

    #[test]
    fn blank_user_id_reads_as_orphan() {
        assert_eq!(parse_user_id(Some("  ".into())).unwrap(), None);
        assert_eq!(
            parse_user_id(Some("u-1".into())).unwrap().map(|u| u.to_string()),
            Some("u-1".to_string())
        );
    }

    #[test]
    fn subscription_filters_render_bind_placeholders() {
        let filter = SubscriptionFilter {
            emails: vec!["A@B.C".into()],
            plan_name_contains: Some("pro".into()),
            ..SubscriptionFilter::default()
        };
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM subscriptions WHERE TRUE");
        push_subscription_filters(&mut builder, &filter);
        assert_eq!(
            builder.sql(),
            "SELECT COUNT(*) FROM subscriptions WHERE TRUE AND email = ANY($1) AND plan_name ILIKE $2"
        );
    }

    #[test]
    fn billing_event_rows_convert() {
        let row = BillingEventRow {
            id: Uuid::new_v4(),
            subscription_id: None,
            user_id: None,
            event_type: "payment.succeeded".into(),
            payment_type: "donation".into(),
            integrator: "kofi".into(),
            integrator_event_id: "msg-1".into(),
            integrator_subscription_id: None,
            status: None,
            amount: 300,
            currency: "USD".into(),
            plan_name: None,
            receipt_url: None,
            raw_payload: "data=...".into(),
            provider_event_time: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let event = BillingEvent::try_from(row).unwrap();
        assert_eq!(event.payment_type, PaymentType::Donation);
        assert_eq!(event.event_type, EventType::PaymentSucceeded);
    }
}
