// Catalog services
pub mod product_media;
pub mod product_query;
pub mod products;
pub mod taxonomy;

// Accounts and tokens
pub mod accounts;

use uuid::Uuid;

use crate::auth::{AuthUser, CREDENTIALS_NOT_PROVIDED};
use crate::errors::ServiceError;

/// The signed-in requester, or 401.
pub(crate) fn authenticated(requester: Option<&AuthUser>) -> Result<&AuthUser, ServiceError> {
    requester.ok_or_else(|| ServiceError::Unauthorized(CREDENTIALS_NOT_PROVIDED.into()))
}

/// Field message for a reference to a row that does not exist.
pub(crate) fn missing_reference(id: Uuid) -> String {
    format!("Invalid pk \"{}\" - object does not exist.", id)
}
