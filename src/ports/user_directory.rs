//! User directory port.
//!
//! Resolves webhook customers to internal users by email and tells the
//! read façade who is an administrator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, UserId};

/// A user as known to the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub id: UserId,
    pub email: String,
    pub is_admin: bool,
}

/// Read-only lookup of users. Not-found is `Ok(None)`, not an error.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user_by_id(&self, id: &UserId) -> Result<Option<DirectoryUser>, DomainError>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<DirectoryUser>, DomainError>;
}
