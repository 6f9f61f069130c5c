//! Axum router configuration for the billing endpoints.

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use super::handlers::{
    get_billing_detail, get_billing_events, get_subscription_status, receive_webhook,
    BillingAppState,
};
use crate::adapters::http::middleware::{auth_middleware, AuthState};

/// Mount point of every billing route.
pub const API_PREFIX: &str = "/api/v1/bms";

/// Create the billing API router (without prefix or outer layers).
///
/// # Routes
///
/// ## Webhook Endpoints (no auth, signature verified)
/// - `POST /billings/:provider_name/webhooks`
///
/// ## Read Endpoints (require authentication)
/// - `GET /billings/users/:user_id/events`
/// - `GET /users/:user_id/details/subscription`
/// - `GET /users/:user_id/details/billing`
pub fn billing_routes(validator: AuthState) -> Router<BillingAppState> {
    let reads = Router::new()
        .route("/billings/users/:user_id/events", get(get_billing_events))
        .route(
            "/users/:user_id/details/subscription",
            get(get_subscription_status),
        )
        .route("/users/:user_id/details/billing", get(get_billing_detail))
        .route_layer(middleware::from_fn_with_state(validator, auth_middleware));

    Router::new()
        .route("/billings/:provider_name/webhooks", post(receive_webhook))
        .merge(reads)
}

/// Browser origins allowed to call the read endpoints.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Create the complete billing application: routes under [`API_PREFIX`]
/// with tracing, an end-to-end timeout and CORS.
pub fn billing_router(
    state: BillingAppState,
    validator: AuthState,
    request_timeout: Duration,
    cors_origins: &[String],
) -> Router {
    Router::new()
        .nest(API_PREFIX, billing_routes(validator))
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
}
