//! Canned-response HTTP client for tests.
//!
//! Responses are keyed by URL path (`/v1/customers/cus_1`), so tests don't
//! depend on the configured base URL. Every request is recorded.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::domain::billing::BillingError;
use crate::ports::ProviderHttpClient;

/// A recorded GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub url: String,
    pub bearer_token: String,
}

#[derive(Default)]
struct MockState {
    responses: HashMap<String, Result<Value, BillingError>>,
    requests: Vec<RecordedRequest>,
}

/// In-memory `ProviderHttpClient`.
#[derive(Clone, Default)]
pub struct MockHttpClient {
    state: Arc<Mutex<MockState>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `body` for requests whose path equals `path`.
    pub fn with_response(self, path: impl Into<String>, body: Value) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.responses.insert(path.into(), Ok(body));
        }
        self
    }

    /// Fails requests for `path` with `error`.
    pub fn with_error(self, path: impl Into<String>, error: BillingError) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.responses.insert(path.into(), Err(error));
        }
        self
    }

    /// Requests made so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state
            .lock()
            .map(|s| s.requests.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests().len()
    }
}

fn path_of(url: &str) -> String {
    match url.split_once("://") {
        Some((_, rest)) => match rest.find('/') {
            Some(idx) => rest[idx..].to_string(),
            None => "/".to_string(),
        },
        None => url.to_string(),
    }
}

#[async_trait]
impl ProviderHttpClient for MockHttpClient {
    async fn get_json(&self, url: &str, bearer_token: &str) -> Result<Value, BillingError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| BillingError::Internal("mock http client poisoned".into()))?;
        state.requests.push(RecordedRequest {
            url: url.to_string(),
            bearer_token: bearer_token.to_string(),
        });
        let path = path_of(url);
        state
            .responses
            .get(&path)
            .cloned()
            .unwrap_or_else(|| Err(BillingError::Upstream(format!("{} returned 404", url))))
    }
}
