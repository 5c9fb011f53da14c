use axum::{extract::State, http::StatusCode, Json};
use uuid::Uuid;

use super::common::{AppJson, AppPath};
use crate::auth::MaybeAuthUser;
use crate::dto::products::{
    CreateProductAttributeRequest, CreateProductImageRequest, ProductAttributeResponse,
    ProductImageResponse, UpdateProductAttributeRequest,
};
use crate::errors::ServiceError;
use crate::AppState;

#[utoipa::path(
    post,
    path = "/api/v1/products/images",
    request_body = CreateProductImageRequest,
    responses(
        (status = 201, description = "Image uploaded", body = ProductImageResponse),
        (status = 400, description = "Invalid image or product", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not the product owner", body = crate::errors::ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "product-media"
)]
pub async fn upload_image(
    State(state): State<AppState>,
    requester: MaybeAuthUser,
    AppJson(payload): AppJson<CreateProductImageRequest>,
) -> Result<(StatusCode, Json<ProductImageResponse>), ServiceError> {
    let image = state
        .product_media_service()
        .create_image(requester.requester(), payload)
        .await?;
    Ok((StatusCode::CREATED, Json(image)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/products/images/{id}",
    params(("id" = Uuid, Path, description = "Product image ID")),
    responses(
        (status = 204, description = "Image deleted"),
        (status = 403, description = "Not the uploader", body = crate::errors::ErrorResponse),
        (status = 404, description = "Image not found", body = crate::errors::ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "product-media"
)]
pub async fn delete_image(
    State(state): State<AppState>,
    requester: MaybeAuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state
        .product_media_service()
        .delete_image(requester.requester(), id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/products/attributes",
    request_body = CreateProductAttributeRequest,
    responses(
        (status = 201, description = "Attribute created", body = ProductAttributeResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not the product owner", body = crate::errors::ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "product-media"
)]
pub async fn create_attribute(
    State(state): State<AppState>,
    requester: MaybeAuthUser,
    AppJson(payload): AppJson<CreateProductAttributeRequest>,
) -> Result<(StatusCode, Json<ProductAttributeResponse>), ServiceError> {
    let attribute = state
        .product_media_service()
        .create_attribute(requester.requester(), payload)
        .await?;
    Ok((StatusCode::CREATED, Json(attribute)))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/attributes/{id}",
    params(("id" = Uuid, Path, description = "Product attribute ID")),
    request_body = UpdateProductAttributeRequest,
    responses(
        (status = 200, description = "Attribute replaced", body = ProductAttributeResponse),
        (status = 404, description = "Attribute not found", body = crate::errors::ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "product-media"
)]
pub async fn replace_attribute(
    State(state): State<AppState>,
    requester: MaybeAuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateProductAttributeRequest>,
) -> Result<Json<ProductAttributeResponse>, ServiceError> {
    let attribute = state
        .product_media_service()
        .update_attribute(requester.requester(), id, payload, false)
        .await?;
    Ok(Json(attribute))
}

#[utoipa::path(
    patch,
    path = "/api/v1/products/attributes/{id}",
    params(("id" = Uuid, Path, description = "Product attribute ID")),
    request_body = UpdateProductAttributeRequest,
    responses(
        (status = 200, description = "Attribute updated", body = ProductAttributeResponse),
        (status = 404, description = "Attribute not found", body = crate::errors::ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "product-media"
)]
pub async fn update_attribute(
    State(state): State<AppState>,
    requester: MaybeAuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateProductAttributeRequest>,
) -> Result<Json<ProductAttributeResponse>, ServiceError> {
    let attribute = state
        .product_media_service()
        .update_attribute(requester.requester(), id, payload, true)
        .await?;
    Ok(Json(attribute))
}

#[utoipa::path(
    delete,
    path = "/api/v1/products/attributes/{id}",
    params(("id" = Uuid, Path, description = "Product attribute ID")),
    responses(
        (status = 204, description = "Attribute deleted"),
        (status = 404, description = "Attribute not found", body = crate::errors::ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "product-media"
)]
pub async fn delete_attribute(
    State(state): State<AppState>,
    requester: MaybeAuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state
        .product_media_service()
        .delete_attribute(requester.requester(), id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
