//! In-memory adapters for the billing store and user directory.

mod in_memory_billing_store;
mod in_memory_user_directory;

pub use in_memory_billing_store::InMemoryBillingStore;
pub use in_memory_user_directory::InMemoryUserDirectory;
