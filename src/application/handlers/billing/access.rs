//! Authorization predicate shared by the billing read queries.

use crate::domain::billing::BillingError;
use crate::domain::foundation::UserId;
use crate::ports::UserDirectory;

/// Parses the user named in the request path.
pub fn parse_target_user(raw: &str) -> Result<UserId, BillingError> {
    UserId::new(raw.trim()).map_err(|_| BillingError::MissingTargetUser)
}

/// Allows the subject themselves or an administrator.
///
/// Without a directory only the subject is allowed. A directory failure
/// denies access.
pub async fn authorize(
    directory: Option<&dyn UserDirectory>,
    target: &UserId,
    requester: &UserId,
) -> Result<(), BillingError> {
    if target == requester {
        return Ok(());
    }
    let Some(directory) = directory else {
        return Err(BillingError::Forbidden);
    };
    match directory.get_user_by_id(requester).await {
        Ok(Some(user)) if user.is_admin => Ok(()),
        Ok(_) => Err(BillingError::Forbidden),
        Err(e) => {
            tracing::warn!(requester = %requester, error = %e, "Admin lookup failed");
            Err(BillingError::Forbidden)
        }
    }
}
