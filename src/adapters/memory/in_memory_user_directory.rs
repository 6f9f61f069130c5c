//! In-Memory User Directory Adapter

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::billing::normalize_email;
use crate::domain::foundation::{DomainError, UserId};
use crate::ports::{DirectoryUser, UserDirectory};

/// Directory backed by a map; emails are matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<UserId, DirectoryUser>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a user.
    pub async fn insert(&self, user: DirectoryUser) {
        self.users.write().await.insert(user.id.clone(), user);
    }

    /// Builder-style helper for tests and seeding.
    pub async fn with_user(self, id: &str, email: &str, is_admin: bool) -> Result<Self, DomainError> {
        let user = DirectoryUser {
            id: UserId::new(id)?,
            email: email.to_string(),
            is_admin,
        };
        self.insert(user).await;
        Ok(self)
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get_user_by_id(&self, id: &UserId) -> Result<Option<DirectoryUser>, DomainError> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<DirectoryUser>, DomainError> {
        let wanted = normalize_email(email);
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| normalize_email(&u.email) == wanted)
            .cloned())
    }
}
