use axum::{extract::State, http::StatusCode, Json};

use super::common::AppJson;
use crate::auth::AuthUser;
use crate::dto::accounts::{
    AuthResponse, LoginRequest, RegisterRequest, UpdateProfileRequest, UserResponse,
};
use crate::errors::ServiceError;
use crate::AppState;

/// Registers a customer account and returns it with a fresh token.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid registration", body = crate::errors::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ServiceError> {
    let account = state.account_service().register(payload).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 400, description = "Missing credentials", body = crate::errors::ErrorResponse),
        (status = 401, description = "Wrong email or password", body = crate::errors::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<AuthResponse>, ServiceError> {
    Ok(Json(state.account_service().login(payload).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "auth"
)]
pub async fn me(State(state): State<AppState>, user: AuthUser) -> Json<UserResponse> {
    Json(state.account_service().profile(&user))
}

#[utoipa::path(
    patch,
    path = "/api/v1/auth/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "auth"
)]
pub async fn update_me(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ServiceError> {
    let profile = state
        .account_service()
        .update_profile(&user, payload)
        .await?;
    Ok(Json(profile))
}
