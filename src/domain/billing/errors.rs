//! Billing error taxonomy.
//!
//! Every failure the ingestion pipeline and the read façade can surface,
//! with a stable machine code, a human title, HTTP status mapping and
//! retryability semantics. Providers redeliver on any non-2xx response, so
//! the status code doubles as the retry signal.

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Errors raised while configuring, verifying, parsing, reconciling or
/// querying billing data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BillingError {
    // Configuration
    /// A provider configuration entry has no `provider_name`.
    #[error("Provider name is missing from configuration")]
    MissingProviderName,

    /// A provider configuration entry has no webhook secret.
    #[error("Webhook secret is missing for provider '{0}'")]
    MissingWebhookSecret(String),

    /// A provider configuration entry is otherwise unusable.
    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),

    /// No adapter variant exists for this provider name.
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    // Registry
    /// No adapter is registered under this name.
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    // Verification
    /// The signature header (or token) is absent.
    #[error("Missing webhook signature")]
    MissingSignature,

    /// The signature does not match the payload.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    /// The signed timestamp is outside the replay window.
    #[error("Webhook timestamp is too old")]
    WebhookTimestampTooOld,

    /// The raw bytes could not be read as the provider's envelope.
    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    // Parsing
    /// The payload is well-formed but does not match the expected schema.
    #[error("Failed to parse payload: {0}")]
    PayloadParsing(String),

    /// A field required to build the normalized event is absent.
    #[error("Missing required field: {0}")]
    MissingRequiredField(&'static str),

    /// The provider event type is not one this adapter understands.
    #[error("Invalid event type: {0}")]
    InvalidEventType(String),

    /// Neither the payload nor the provider API yielded a customer email.
    #[error("Customer email is missing from payload")]
    MissingPayloadCustomerEmail,

    // Resolution
    /// No subscription owner and no customer email to fall back on.
    #[error("No user identifying information in payload")]
    NoUserIdentifyingInformationInPayload,

    /// The user directory could not resolve the customer.
    #[error("Unable to resolve user id: {0}")]
    UnableToResolveUserId(String),

    /// A read request did not name a target user.
    #[error("Target user id is required")]
    MissingTargetUser,

    /// A query parameter could not be understood.
    #[error("Invalid query parameter: {0}")]
    InvalidQuery(String),

    /// The caller is neither the target user nor an administrator.
    #[error("Forbidden")]
    Forbidden,

    // Store
    /// The requested record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A subscription with the same integrator id already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The BillingEvent for this integrator event id was already recorded.
    #[error("Event already processed")]
    EventAlreadyProcessed,

    /// The requested page is beyond the last page.
    #[error("Page {page} is out of range (total pages: {total_pages})")]
    PageOutOfRange { page: u32, total_pages: u32 },

    /// Persistence failed.
    #[error("Store error: {0}")]
    Store(String),

    // Enrichment
    /// Ko-fi has no subscription API to query.
    #[error("Ko-fi does not provide a subscription API")]
    KofiNoSubscriptionAPI,

    /// A provider API call failed.
    #[error("Upstream provider error: {0}")]
    Upstream(String),

    // Internal
    /// Unexpected failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BillingError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            BillingError::MissingProviderName => "MISSING_PROVIDER_NAME",
            BillingError::MissingWebhookSecret(_) => "MISSING_WEBHOOK_SECRET",
            BillingError::InvalidConfig(_) => "INVALID_CONFIG",
            BillingError::UnsupportedProvider(_) => "UNSUPPORTED_PROVIDER",
            BillingError::ProviderNotFound(_) => "PROVIDER_NOT_FOUND",
            BillingError::MissingSignature => "MISSING_SIGNATURE",
            BillingError::InvalidSignature => "INVALID_SIGNATURE",
            BillingError::WebhookTimestampTooOld => "WEBHOOK_TIMESTAMP_TOO_OLD",
            BillingError::InvalidPayload(_) => "INVALID_PAYLOAD",
            BillingError::PayloadParsing(_) => "PAYLOAD_PARSING",
            BillingError::MissingRequiredField(_) => "MISSING_REQUIRED_FIELD",
            BillingError::InvalidEventType(_) => "INVALID_EVENT_TYPE",
            BillingError::MissingPayloadCustomerEmail => "MISSING_PAYLOAD_CUSTOMER_EMAIL",
            BillingError::NoUserIdentifyingInformationInPayload => {
                "NO_USER_IDENTIFYING_INFORMATION_IN_PAYLOAD"
            }
            BillingError::UnableToResolveUserId(_) => "UNABLE_TO_RESOLVE_USER_ID",
            BillingError::MissingTargetUser => "MISSING_TARGET_USER",
            BillingError::InvalidQuery(_) => "INVALID_QUERY",
            BillingError::Forbidden => "FORBIDDEN",
            BillingError::NotFound(_) => "NOT_FOUND",
            BillingError::Conflict(_) => "CONFLICT",
            BillingError::EventAlreadyProcessed => "EVENT_ALREADY_PROCESSED",
            BillingError::PageOutOfRange { .. } => "PAGE_OUT_OF_RANGE",
            BillingError::Store(_) => "STORE_ERROR",
            BillingError::KofiNoSubscriptionAPI => "KOFI_NO_SUBSCRIPTION_API",
            BillingError::Upstream(_) => "UPSTREAM_ERROR",
            BillingError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Short human title for error responses.
    pub fn title(&self) -> &'static str {
        match self {
            BillingError::MissingProviderName
            | BillingError::MissingWebhookSecret(_)
            | BillingError::InvalidConfig(_)
            | BillingError::UnsupportedProvider(_) => "Provider misconfigured",
            BillingError::ProviderNotFound(_) => "Unknown provider",
            BillingError::MissingSignature
            | BillingError::InvalidSignature
            | BillingError::WebhookTimestampTooOld
            | BillingError::InvalidPayload(_) => "Webhook verification failed",
            BillingError::PayloadParsing(_)
            | BillingError::MissingRequiredField(_)
            | BillingError::InvalidEventType(_)
            | BillingError::MissingPayloadCustomerEmail => "Webhook payload rejected",
            BillingError::NoUserIdentifyingInformationInPayload
            | BillingError::UnableToResolveUserId(_) => "User not resolvable",
            BillingError::MissingTargetUser | BillingError::InvalidQuery(_) => "Bad request",
            BillingError::Forbidden => "Forbidden",
            BillingError::NotFound(_) => "Not found",
            BillingError::Conflict(_) => "Conflict",
            BillingError::EventAlreadyProcessed => "Already processed",
            BillingError::PageOutOfRange { .. } => "Page out of range",
            BillingError::KofiNoSubscriptionAPI => "Not supported",
            BillingError::Upstream(_) => "Provider API error",
            BillingError::Store(_) | BillingError::Internal(_) => "Internal error",
        }
    }

    /// Maps the error to an HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            BillingError::MissingSignature
            | BillingError::InvalidSignature
            | BillingError::WebhookTimestampTooOld
            | BillingError::InvalidPayload(_)
            | BillingError::PayloadParsing(_)
            | BillingError::MissingRequiredField(_)
            | BillingError::InvalidEventType(_)
            | BillingError::MissingPayloadCustomerEmail
            | BillingError::MissingTargetUser
            | BillingError::InvalidQuery(_)
            | BillingError::PageOutOfRange { .. } => StatusCode::BAD_REQUEST,

            BillingError::Forbidden => StatusCode::FORBIDDEN,

            BillingError::ProviderNotFound(_)
            | BillingError::NoUserIdentifyingInformationInPayload
            | BillingError::UnableToResolveUserId(_)
            | BillingError::NotFound(_) => StatusCode::NOT_FOUND,

            BillingError::Conflict(_) => StatusCode::CONFLICT,

            BillingError::EventAlreadyProcessed => StatusCode::OK,

            BillingError::KofiNoSubscriptionAPI => StatusCode::NOT_IMPLEMENTED,

            BillingError::MissingProviderName
            | BillingError::MissingWebhookSecret(_)
            | BillingError::InvalidConfig(_)
            | BillingError::UnsupportedProvider(_)
            | BillingError::Store(_)
            | BillingError::Upstream(_)
            | BillingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns true if a provider redelivery may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BillingError::Store(_) | BillingError::Upstream(_) | BillingError::Internal(_)
        )
    }

    /// Returns true for verification failures.
    pub fn is_verification(&self) -> bool {
        matches!(
            self,
            BillingError::MissingSignature
                | BillingError::InvalidSignature
                | BillingError::WebhookTimestampTooOld
                | BillingError::InvalidPayload(_)
        )
    }

    /// Creates a payload parsing error from any displayable cause.
    pub fn parsing(err: impl std::fmt::Display) -> Self {
        BillingError::PayloadParsing(err.to_string())
    }
}

impl From<DomainError> for BillingError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::DuplicateBillingEvent => BillingError::EventAlreadyProcessed,
            ErrorCode::DuplicateSubscription => BillingError::Conflict(err.message),
            ErrorCode::PageOutOfRange => {
                let read = |key: &str| {
                    err.details
                        .get(key)
                        .and_then(|v| v.parse().ok())
                        .unwrap_or_default()
                };
                BillingError::PageOutOfRange {
                    page: read("page"),
                    total_pages: read("total_pages"),
                }
            }
            ErrorCode::Forbidden | ErrorCode::Unauthorized => BillingError::Forbidden,
            ErrorCode::UpstreamError => BillingError::Upstream(err.message),
            ErrorCode::InternalError => BillingError::Internal(err.message),
            ErrorCode::DatabaseError | ErrorCode::ValidationFailed => BillingError::Store(err.message),
            code if code.is_not_found() => BillingError::NotFound(err.message),
            _ => BillingError::Internal(err.message),
        }
    }
}
