//! Outbound HTTP adapters for provider enrichment calls.

mod mock;
mod reqwest_client;

pub use mock::{MockHttpClient, RecordedRequest};
pub use reqwest_client::ReqwestProviderClient;
