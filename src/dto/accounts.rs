use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::user::{self, Role};
use crate::media::media_url;
use crate::validation::{validate_not_blank, validate_phone};

/// Body of `POST /auth/register`.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email, length(max = 254))]
    pub email: Option<String>,
    #[validate(custom = "validate_phone")]
    pub phone: Option<String>,
    #[validate(length(max = 150))]
    pub first_name: Option<String>,
    #[validate(length(max = 150))]
    pub last_name: Option<String>,
    #[validate(length(max = 128))]
    pub password1: Option<String>,
    #[validate(length(max = 128))]
    pub password2: Option<String>,
    /// Optional base64 avatar image
    pub avatar: Option<String>,
}

/// Body of `POST /auth/login`.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(custom = "validate_not_blank")]
    pub password: Option<String>,
}

/// Body of `PATCH /auth/me`.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 150))]
    pub first_name: Option<String>,
    #[validate(length(max = 150))]
    pub last_name: Option<String>,
    #[validate(custom = "validate_phone")]
    pub phone: Option<String>,
    /// Replacement avatar as base64
    pub avatar: Option<String>,
}

/// Owner block embedded in product representations.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<&user::Model> for UserSummary {
    fn from(user: &user::Model) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub role: Role,
    /// Public URL of the avatar image
    pub avatar: Option<String>,
}

impl UserResponse {
    pub fn from_model(user: &user::Model, media_prefix: &str) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            phone: user.phone.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            full_name: user.full_name(),
            role: user.role,
            avatar: user
                .avatar
                .as_deref()
                .map(|path| media_url(media_prefix, path)),
        }
    }
}

/// User fields with the issued token alongside.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub token: String,
}
