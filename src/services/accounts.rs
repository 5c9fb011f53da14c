use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::{
    generate_token_key, hash_password, verify_password, AuthUser, PasswordStrength,
    UserAttributes,
};
use crate::db::transaction::transaction_scope;
use crate::db::DbPool;
use crate::dto::accounts::{
    AuthResponse, LoginRequest, RegisterRequest, UpdateProfileRequest, UserResponse,
};
use crate::entities::auth_token;
use crate::entities::user::{self, Role};
use crate::errors::{FieldErrors, ServiceError};
use crate::media::{
    decode_base64_image, image_path, remove_all, DecodedImage, ImageStorage, AVATARS_DIR,
};
use crate::validation::{
    check_password_pair, collect_errors, normalize_phone, require, validate_phone,
};

pub const INVALID_CREDENTIALS: &str = "The user does not exist or incorrect password.";

/// Validated input for a new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub role: Role,
}

/// Registration, login and profile management.
pub struct AccountService {
    db_pool: Arc<DbPool>,
    storage: Arc<dyn ImageStorage>,
    password_policy: Arc<dyn PasswordStrength>,
    media_url: String,
}

impl AccountService {
    pub fn new(
        db_pool: Arc<DbPool>,
        storage: Arc<dyn ImageStorage>,
        password_policy: Arc<dyn PasswordStrength>,
        media_url: impl Into<String>,
    ) -> Self {
        Self {
            db_pool,
            storage,
            password_policy,
            media_url: media_url.into(),
        }
    }

    fn user_response(&self, user: &user::Model) -> UserResponse {
        UserResponse::from_model(user, &self.media_url)
    }

    /// Creates a customer account and issues its token.
    #[instrument(skip(self, request))]
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, ServiceError> {
        let mut errors = collect_errors(&request);
        let email = require(&mut errors, "email", request.email);
        let phone = require(&mut errors, "phone", request.phone);
        let password1 = require(&mut errors, "password1", request.password1);
        let password2 = require(&mut errors, "password2", request.password2);
        let avatar = request.avatar.as_deref().and_then(|raw| {
            decode_base64_image(raw, &Uuid::new_v4().to_string())
                .map_err(|err| errors.add("avatar", format!("Upload a valid image: {}.", err)))
                .ok()
        });

        let (Some(email), Some(phone), Some(password1), Some(password2)) =
            (email, phone, password1, password2)
        else {
            return Err(errors.into());
        };

        let account = NewAccount {
            email,
            phone,
            first_name: request.first_name.unwrap_or_default(),
            last_name: request.last_name.unwrap_or_default(),
            password: password1,
            role: Role::Customer,
        };
        check_password_pair(&account.password, &password2, &mut errors);
        self.check_new_account(&account, &mut errors).await?;
        errors.into_result()?;

        let (user, token) = self.create_account(account, avatar).await?;
        counter!("storefront.accounts.registered", 1);
        info!(user_id = %user.id, "account registered");

        Ok(AuthResponse {
            user: self.user_response(&user),
            token,
        })
    }

    /// Verifies credentials and returns the user's token, issuing one on first login.
    #[instrument(skip(self, request))]
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, ServiceError> {
        let mut errors = collect_errors(&request);
        let email = require(&mut errors, "email", request.email);
        let password = require(&mut errors, "password", request.password);
        let (Some(email), Some(password)) = (email, password) else {
            return Err(errors.into());
        };
        errors.into_result()?;

        let db = &*self.db_pool;
        let found = user::Entity::find()
            .filter(user::Column::Email.eq(normalize_email(&email)))
            .one(db)
            .await?;

        let user = match found {
            Some(user) if user.is_active && verify_password(&password, &user.password_hash)? => {
                user
            }
            _ => {
                counter!("storefront.accounts.login_failed", 1);
                warn!("login rejected");
                return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.into()));
            }
        };

        let token = match auth_token::Entity::find()
            .filter(auth_token::Column::UserId.eq(user.id))
            .one(db)
            .await?
        {
            Some(existing) => existing.key,
            None => issue_token(db, user.id).await?,
        };

        info!(user_id = %user.id, "user logged in");
        Ok(AuthResponse {
            user: self.user_response(&user),
            token,
        })
    }

    pub fn profile(&self, requester: &AuthUser) -> UserResponse {
        self.user_response(&requester.user)
    }

    /// Partial profile edit: names, phone, avatar.
    #[instrument(skip(self, requester, request), fields(user_id = %requester.id()))]
    pub async fn update_profile(
        &self,
        requester: &AuthUser,
        request: UpdateProfileRequest,
    ) -> Result<UserResponse, ServiceError> {
        let db = &*self.db_pool;
        let mut errors = collect_errors(&request);
        let phone = request.phone.as_deref().map(normalize_phone);
        if let Some(phone) = &phone {
            if phone_taken(db, phone, Some(requester.id())).await? {
                errors.add("phone", "user with this phone already exists.");
            }
        }
        let avatar = request.avatar.as_deref().and_then(|raw| {
            decode_base64_image(raw, &Uuid::new_v4().to_string())
                .map_err(|err| errors.add("avatar", format!("Upload a valid image: {}.", err)))
                .ok()
        });
        errors.into_result()?;

        let previous_avatar = requester.user.avatar.clone();
        let mut model: user::ActiveModel = requester.user.clone().into();
        if let Some(first_name) = request.first_name {
            model.first_name = Set(first_name);
        }
        if let Some(last_name) = request.last_name {
            model.last_name = Set(last_name);
        }
        if let Some(phone) = phone {
            model.phone = Set(phone);
        }

        let new_avatar = match avatar {
            Some(image) => {
                let path = image_path(AVATARS_DIR, &image);
                self.storage.save(&path, image.bytes).await?;
                model.avatar = Set(Some(path.clone()));
                Some(path)
            }
            None => None,
        };

        if !model.is_changed() {
            return Ok(self.user_response(&requester.user));
        }
        let updated = match model.update(db).await {
            Ok(updated) => updated,
            Err(err) => {
                if let Some(path) = new_avatar {
                    remove_all(self.storage.as_ref(), &[path]).await;
                }
                return Err(err.into());
            }
        };
        if let (Some(_), Some(previous)) = (&new_avatar, previous_avatar) {
            remove_all(self.storage.as_ref(), &[previous]).await;
        }

        info!("profile updated");
        Ok(self.user_response(&updated))
    }

    /// Creates an admin account, bypassing registration. Used by the CLI.
    #[instrument(skip(self, account), fields(email = %account.email))]
    pub async fn create_admin(&self, mut account: NewAccount) -> Result<UserResponse, ServiceError> {
        account.role = Role::Admin;
        let mut errors = FieldErrors::new();
        self.check_new_account(&account, &mut errors).await?;
        errors.into_result()?;

        let (user, _) = self.create_account(account, None).await?;
        info!(user_id = %user.id, role = %user.role, "admin account created");
        Ok(self.user_response(&user))
    }

    /// Uniqueness, phone shape and password strength.
    async fn check_new_account(
        &self,
        account: &NewAccount,
        errors: &mut FieldErrors,
    ) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let email = normalize_email(&account.email);
        if !errors.contains("email") && !validator::validate_email(email.as_str()) {
            errors.add("email", "Enter a valid email address.");
        }
        if user::Entity::find()
            .filter(user::Column::Email.eq(email.as_str()))
            .one(db)
            .await?
            .is_some()
        {
            errors.add("email", "user with this email already exists.");
        }

        let phone = normalize_phone(&account.phone);
        if let Err(err) = validate_phone(&phone) {
            if !errors.contains("phone") {
                errors.add(
                    "phone",
                    err.message
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Enter a valid phone number.".into()),
                );
            }
        } else if phone_taken(db, &phone, None).await? {
            errors.add("phone", "user with this phone already exists.");
        }

        let attributes = UserAttributes {
            email: Some(&email),
            phone: Some(&phone),
            first_name: Some(&account.first_name),
            last_name: Some(&account.last_name),
        };
        if let Err(failures) = self
            .password_policy
            .validate(&account.password, &attributes)
        {
            for failure in failures {
                errors.add("password1", failure.to_string());
            }
        }
        Ok(())
    }

    /// Inserts the user and its token in one transaction, storing the avatar first.
    async fn create_account(
        &self,
        account: NewAccount,
        avatar: Option<DecodedImage>,
    ) -> Result<(user::Model, String), ServiceError> {
        let password_hash = hash_password(&account.password)?;

        let avatar_path = match avatar {
            Some(image) => {
                let path = image_path(AVATARS_DIR, &image);
                self.storage.save(&path, image.bytes).await?;
                Some(path)
            }
            None => None,
        };

        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(normalize_email(&account.email)),
            phone: Set(normalize_phone(&account.phone)),
            first_name: Set(account.first_name),
            last_name: Set(account.last_name),
            role: Set(account.role),
            avatar: Set(avatar_path.clone()),
            password_hash: Set(password_hash),
            is_active: Set(true),
            date_joined: Set(Utc::now()),
        };

        let result = transaction_scope(&*self.db_pool, move |txn| {
            Box::pin(async move {
                let user = model.insert(txn).await?;
                let token = issue_token(txn, user.id).await?;
                Ok::<_, ServiceError>((user, token))
            })
        })
        .await;

        if result.is_err() {
            if let Some(path) = avatar_path {
                remove_all(self.storage.as_ref(), &[path]).await;
            }
        }
        result
    }
}

/// Emails are compared and stored lower-cased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

async fn phone_taken<C: ConnectionTrait>(
    db: &C,
    phone: &str,
    exclude: Option<Uuid>,
) -> Result<bool, ServiceError> {
    let mut query = user::Entity::find().filter(user::Column::Phone.eq(phone));
    if let Some(id) = exclude {
        query = query.filter(user::Column::Id.ne(id));
    }
    Ok(query.one(db).await?.is_some())
}

async fn issue_token<C: ConnectionTrait>(db: &C, user_id: Uuid) -> Result<String, ServiceError> {
    let token = auth_token::ActiveModel {
        key: Set(generate_token_key()),
        user_id: Set(user_id),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await?;
    Ok(token.key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }
}
