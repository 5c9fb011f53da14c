/*!
 * # Authentication and Authorization Module
 *
 * Opaque token authentication for the catalog API:
 *
 * - `Authorization: Token <key>` (or `Bearer <key>`) resolved against `auth_tokens`
 * - Argon2 password hashing
 * - Per-operation access policies (see [`policy`])
 */

pub mod password_policy;
pub mod policy;

use argon2::password_hash::{rand_core::OsRng, PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use rand::RngCore;
use sea_orm::{ConnectionTrait, EntityTrait};
use tracing::debug;
use uuid::Uuid;

use crate::entities::{auth_token, user};
use crate::errors::ServiceError;
use crate::AppState;

pub use password_policy::{PasswordPolicy, PasswordPolicyError, PasswordStrength, UserAttributes};
pub use policy::{Action, Policy, PolicyTable, Resource};

pub const CREDENTIALS_NOT_PROVIDED: &str = "Authentication credentials were not provided.";
pub const INVALID_TOKEN: &str = "Invalid token.";
pub const PERMISSION_DENIED: &str = "You do not have permission to perform this action.";

/// Byte length of a token key before hex encoding (40 hex characters).
const TOKEN_BYTES: usize = 20;

/// Authenticated requester resolved from the request's token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: user::Model,
    pub token: String,
}

impl AuthUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn is_admin(&self) -> bool {
        self.user.is_admin()
    }
}

/// Requester that may be anonymous. A present but invalid token is still rejected.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl MaybeAuthUser {
    pub fn requester(&self) -> Option<&AuthUser> {
        self.0.as_ref()
    }
}

/// Extracts the token key from an `Authorization` header value.
///
/// `Ok(None)` means the header uses some other scheme and carries no credentials
/// for us.
pub fn parse_authorization(value: &str) -> Result<Option<&str>, ServiceError> {
    let mut parts = value.split_whitespace();
    let scheme = match parts.next() {
        Some(scheme) => scheme,
        None => return Ok(None),
    };
    if !scheme.eq_ignore_ascii_case("token") && !scheme.eq_ignore_ascii_case("bearer") {
        return Ok(None);
    }
    match (parts.next(), parts.next()) {
        (Some(key), None) => Ok(Some(key)),
        (None, _) => Err(ServiceError::Unauthorized(
            "Invalid token header. No credentials provided.".into(),
        )),
        (Some(_), Some(_)) => Err(ServiceError::Unauthorized(
            "Invalid token header. Token string should not contain spaces.".into(),
        )),
    }
}

/// Resolves a token key to its active user.
pub async fn authenticate_token<C>(db: &C, key: &str) -> Result<AuthUser, ServiceError>
where
    C: ConnectionTrait,
{
    let found = auth_token::Entity::find_by_id(key.to_string())
        .find_also_related(user::Entity)
        .one(db)
        .await?;

    match found {
        Some((token, Some(user))) if user.is_active => Ok(AuthUser {
            user,
            token: token.key,
        }),
        Some((_, Some(_))) => Err(ServiceError::Unauthorized(
            "User inactive or deleted.".into(),
        )),
        _ => Err(ServiceError::Unauthorized(INVALID_TOKEN.into())),
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(cached) = parts.extensions.get::<AuthUser>() {
            return Ok(MaybeAuthUser(Some(cached.clone())));
        }

        let header_value = match parts.headers.get(header::AUTHORIZATION) {
            Some(value) => value
                .to_str()
                .map_err(|_| ServiceError::Unauthorized(INVALID_TOKEN.into()))?,
            None => return Ok(MaybeAuthUser(None)),
        };

        let key = match parse_authorization(header_value)? {
            Some(key) => key,
            None => return Ok(MaybeAuthUser(None)),
        };

        let auth_user = authenticate_token(state.db.as_ref(), key).await?;
        debug!(user_id = %auth_user.id(), "request authenticated");
        parts.extensions.insert(auth_user.clone());
        Ok(MaybeAuthUser(Some(auth_user)))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        MaybeAuthUser::from_request_parts(parts, state)
            .await?
            .0
            .ok_or_else(|| ServiceError::Unauthorized(CREDENTIALS_NOT_PROVIDED.into()))
    }
}

/// Argon2id hash in PHC string format.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::HashError(e.to_string()))
}

/// `false` for a wrong password; `Err` only when the stored hash is unreadable.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, ServiceError> {
    let parsed =
        PasswordHash::new(stored_hash).map_err(|e| ServiceError::HashError(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Fresh 40-character hex token key.
pub fn generate_token_key() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse battery", &hash).unwrap());
        assert!(!verify_password("wrong horse battery", &hash).unwrap());
    }

    #[test]
    fn unreadable_hash_is_an_error() {
        assert_matches!(
            verify_password("x", "not-a-phc-string"),
            Err(ServiceError::HashError(_))
        );
    }

    #[test]
    fn token_keys_are_40_hex_chars_and_unique() {
        let a = generate_token_key();
        let b = generate_token_key();
        assert_eq!(a.len(), 40);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[rstest]
    #[case("Token abc123", Some("abc123"))]
    #[case("token abc123", Some("abc123"))]
    #[case("Bearer abc123", Some("abc123"))]
    #[case("Basic dXNlcjpwYXNz", None)]
    #[case("", None)]
    fn authorization_header_schemes(#[case] header: &str, #[case] expected: Option<&str>) {
        assert_eq!(parse_authorization(header).unwrap(), expected);
    }

    #[rstest]
    #[case("Token")]
    #[case("Token abc def")]
    fn malformed_token_headers_are_rejected(#[case] header: &str) {
        assert_matches!(
            parse_authorization(header),
            Err(ServiceError::Unauthorized(_))
        );
    }
}
