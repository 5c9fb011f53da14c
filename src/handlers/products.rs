use axum::{extract::State, http::StatusCode, Json};
use uuid::Uuid;

use super::common::{AppJson, AppPath, AppQuery};
use crate::auth::MaybeAuthUser;
use crate::dto::products::{
    CreateProductRequest, ProductDetail, ProductListItem, ProductListParams, UpdateProductRequest,
};
use crate::dto::Page;
use crate::errors::ServiceError;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(ProductListParams),
    responses(
        (status = 200, description = "Products listed", body = Page<ProductListItem>),
        (status = 400, description = "Invalid filter", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<ProductListParams>,
) -> Result<Json<Page<ProductListItem>>, ServiceError> {
    Ok(Json(state.product_service().list(params).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product fetched", body = ProductDetail),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<ProductDetail>, ServiceError> {
    Ok(Json(state.product_service().get(id).await?))
}

/// Creates a product with nested tags, attributes and base64 images.
#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ProductDetail),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    requester: MaybeAuthUser,
    AppJson(payload): AppJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductDetail>), ServiceError> {
    let product = state
        .product_service()
        .create(requester.requester(), payload)
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product replaced", body = ProductDetail),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not the owner", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "products"
)]
pub async fn replace_product(
    State(state): State<AppState>,
    requester: MaybeAuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateProductRequest>,
) -> Result<Json<ProductDetail>, ServiceError> {
    let product = state
        .product_service()
        .update(requester.requester(), id, payload, false)
        .await?;
    Ok(Json(product))
}

#[utoipa::path(
    patch,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ProductDetail),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not the owner", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    requester: MaybeAuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateProductRequest>,
) -> Result<Json<ProductDetail>, ServiceError> {
    let product = state
        .product_service()
        .update(requester.requester(), id, payload, true)
        .await?;
    Ok(Json(product))
}

#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 403, description = "Not the owner", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("token_auth" = [])),
    tag = "products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    requester: MaybeAuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state
        .product_service()
        .delete(requester.requester(), id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
