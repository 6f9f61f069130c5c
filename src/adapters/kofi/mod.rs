//! Ko-fi payment provider adapter.
//!
//! Ko-fi authenticates with a shared verification token embedded in the
//! payload rather than a signature. It issues neither customer nor
//! subscription ids; both are derived from the supporter's email.

mod kofi_adapter;
mod webhook_types;

pub use kofi_adapter::{customer_id_for_email, KofiProvider, CUSTOMER_ID_KEY, SUBSCRIPTION_ID_PREFIX};
pub use webhook_types::{decode_form, parse_amount, KofiKind, KofiPayload};
