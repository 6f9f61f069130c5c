//! Provider registry and the scriptable mock provider.

mod mock_provider;
mod registry;

pub use mock_provider::MockProvider;
pub use registry::ProviderRegistry;
