use axum::{extract::State, http::StatusCode, Json};
use uuid::Uuid;

use super::common::{AppJson, AppPath};
use crate::auth::MaybeAuthUser;
use crate::dto::taxonomy::{TagRequest, TagResponse};
use crate::errors::ServiceError;
use crate::AppState;

/// All tags ordered by name. Not paginated.
#[utoipa::path(
    get,
    path = "/api/v1/tags",
    responses((status = 200, description = "Tags listed", body = Vec<TagResponse>)),
    tag = "tags"
)]
pub async fn list_tags(
    State(state): State<AppState>,
) -> Result<Json<Vec<TagResponse>>, ServiceError> {
    Ok(Json(state.tag_service().list().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/tags/{id}",
    params(("id" = Uuid, Path, description = "Tag ID")),
    responses(
        (status = 200, description = "Tag fetched", body = TagResponse),
        (status = 404, description = "Tag not found", body = crate::errors::ErrorResponse)
    ),
    tag = "tags"
)]
pub async fn get_tag(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<TagResponse>, ServiceError> {
    Ok(Json(state.tag_service().get(id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/tags",
    request_body = TagRequest,
    responses(
        (status = 201, description = "Tag created", body = TagResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "tags"
)]
pub async fn create_tag(
    State(state): State<AppState>,
    requester: MaybeAuthUser,
    AppJson(payload): AppJson<TagRequest>,
) -> Result<(StatusCode, Json<TagResponse>), ServiceError> {
    let created = state
        .tag_service()
        .create(requester.requester(), payload)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    put,
    path = "/api/v1/tags/{id}",
    params(("id" = Uuid, Path, description = "Tag ID")),
    request_body = TagRequest,
    responses(
        (status = 200, description = "Tag replaced", body = TagResponse),
        (status = 403, description = "Not the owner", body = crate::errors::ErrorResponse),
        (status = 404, description = "Tag not found", body = crate::errors::ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "tags"
)]
pub async fn replace_tag(
    State(state): State<AppState>,
    requester: MaybeAuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<TagRequest>,
) -> Result<Json<TagResponse>, ServiceError> {
    let updated = state
        .tag_service()
        .update(requester.requester(), id, payload, false)
        .await?;
    Ok(Json(updated))
}

#[utoipa::path(
    patch,
    path = "/api/v1/tags/{id}",
    params(("id" = Uuid, Path, description = "Tag ID")),
    request_body = TagRequest,
    responses(
        (status = 200, description = "Tag updated", body = TagResponse),
        (status = 403, description = "Not the owner", body = crate::errors::ErrorResponse),
        (status = 404, description = "Tag not found", body = crate::errors::ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "tags"
)]
pub async fn update_tag(
    State(state): State<AppState>,
    requester: MaybeAuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<TagRequest>,
) -> Result<Json<TagResponse>, ServiceError> {
    let updated = state
        .tag_service()
        .update(requester.requester(), id, payload, true)
        .await?;
    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/api/v1/tags/{id}",
    params(("id" = Uuid, Path, description = "Tag ID")),
    responses(
        (status = 204, description = "Tag deleted"),
        (status = 403, description = "Not the owner", body = crate::errors::ErrorResponse),
        (status = 404, description = "Tag not found", body = crate::errors::ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "tags"
)]
pub async fn delete_tag(
    State(state): State<AppState>,
    requester: MaybeAuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state
        .tag_service()
        .delete(requester.requester(), id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
