use axum::{extract::State, http::StatusCode, Json};
use uuid::Uuid;

use super::common::{AppJson, AppPath};
use crate::auth::MaybeAuthUser;
use crate::dto::taxonomy::{CategoryRequest, CategoryResponse};
use crate::errors::ServiceError;
use crate::AppState;

/// All categories ordered by name. Not paginated.
#[utoipa::path(
    get,
    path = "/api/v1/categories",
    responses((status = 200, description = "Categories listed", body = Vec<CategoryResponse>)),
    tag = "categories"
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryResponse>>, ServiceError> {
    Ok(Json(state.category_service().list().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category fetched", body = CategoryResponse),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn get_category(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<CategoryResponse>, ServiceError> {
    Ok(Json(state.category_service().get(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/categories",
    request_body = CategoryRequest,
    responses(
        (status = 201, description = "Category created", body = CategoryResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "categories"
)]
pub async fn create_category(
    State(state): State<AppState>,
    requester: MaybeAuthUser,
    AppJson(payload): AppJson<CategoryRequest>,
) -> Result<(StatusCode, Json<CategoryResponse>), ServiceError> {
    let created = state
        .category_service()
        .create(requester.requester(), payload)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    put,
    path = "/api/v1/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "Category replaced", body = CategoryResponse),
        (status = 403, description = "Not the owner", body = crate::errors::ErrorResponse),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "categories"
)]
pub async fn replace_category(
    State(state): State<AppState>,
    requester: MaybeAuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<CategoryRequest>,
) -> Result<Json<CategoryResponse>, ServiceError> {
    let updated = state
        .category_service()
        .update(requester.requester(), id, payload, false)
        .await?;
    Ok(Json(updated))
}

#[utoipa::path(
    patch,
    path = "/api/v1/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "Category updated", body = CategoryResponse),
        (status = 403, description = "Not the owner", body = crate::errors::ErrorResponse),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "categories"
)]
pub async fn update_category(
    State(state): State<AppState>,
    requester: MaybeAuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<CategoryRequest>,
) -> Result<Json<CategoryResponse>, ServiceError> {
    let updated = state
        .category_service()
        .update(requester.requester(), id, payload, true)
        .await?;
    Ok(Json(updated))
}

/// Refused with 409 while products still reference the category.
#[utoipa::path(
    delete,
    path = "/api/v1/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 403, description = "Not the owner", body = crate::errors::ErrorResponse),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Category in use", body = crate::errors::ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "categories"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    requester: MaybeAuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state
        .category_service()
        .delete(requester.requester(), id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
