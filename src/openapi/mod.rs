use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::dto::accounts::{
    AuthResponse, LoginRequest, RegisterRequest, UpdateProfileRequest, UserResponse, UserSummary,
};
use crate::dto::products::{
    AttributeInput, CreateProductAttributeRequest, CreateProductImageRequest,
    CreateProductRequest, ProductAttributeResponse, ProductDetail, ProductImageResponse,
    ProductListItem, UpdateProductAttributeRequest, UpdateProductRequest,
};
use crate::dto::taxonomy::{CategoryRequest, CategoryResponse, TagRequest, TagResponse};
use crate::handlers;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "1.0.0",
        description = r#"
# Storefront catalog API

Products with categories, tags, attributes and base64-uploaded images, plus token authentication.

## Authentication

Register or log in to obtain a token, then send it on write requests:

```
Authorization: Token <key>
```

Reads are public. Updates and deletes are limited to the owner of a record or an admin.

## Listing products

- `search`: case-insensitive match on name, description and content
- `category`, `tags` (comma-separated ids), `user`, `is_published`, `receive_type`, `rating`, `min_price`, `max_price`
- `ordering`: one of `name`, `price`, `created_at`, `rating`, `receive_type`, prefixed with `-` for descending
- `page`, `page_size`
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers((url = "http://localhost:8000", description = "Local development")),
    tags(
        (name = "products", description = "Product catalog"),
        (name = "product-media", description = "Product images and attributes"),
        (name = "categories", description = "Product categories"),
        (name = "tags", description = "Product tags"),
        (name = "auth", description = "Registration, login and profile"),
        (name = "health", description = "Health check")
    ),
    paths(
        handlers::products::list_products,
        handlers::products::get_product,
        handlers::products::create_product,
        handlers::products::replace_product,
        handlers::products::update_product,
        handlers::products::delete_product,
        handlers::product_media::upload_image,
        handlers::product_media::delete_image,
        handlers::product_media::create_attribute,
        handlers::product_media::replace_attribute,
        handlers::product_media::update_attribute,
        handlers::product_media::delete_attribute,
        handlers::categories::list_categories,
        handlers::categories::get_category,
        handlers::categories::create_category,
        handlers::categories::replace_category,
        handlers::categories::update_category,
        handlers::categories::delete_category,
        handlers::tags::list_tags,
        handlers::tags::get_tag,
        handlers::tags::create_tag,
        handlers::tags::replace_tag,
        handlers::tags::update_tag,
        handlers::tags::delete_tag,
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::me,
        handlers::auth::update_me,
        handlers::health::health_check,
    ),
    components(
        schemas(
            // Catalog
            ProductListItem,
            ProductDetail,
            CreateProductRequest,
            UpdateProductRequest,
            AttributeInput,
            ProductImageResponse,
            CreateProductImageRequest,
            ProductAttributeResponse,
            CreateProductAttributeRequest,
            UpdateProductAttributeRequest,
            CategoryRequest,
            CategoryResponse,
            TagRequest,
            TagResponse,

            // Accounts
            RegisterRequest,
            LoginRequest,
            UpdateProfileRequest,
            UserResponse,
            UserSummary,
            AuthResponse,

            // Error types
            crate::errors::ErrorResponse,
            crate::errors::FieldErrors
        )
    ),
    modifiers(&TokenAuth)
)]
pub struct ApiDocV1;

/// Registers the `Authorization: Token <key>` scheme referenced by write endpoints.
struct TokenAuth;

impl Modify for TokenAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "token_auth",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "Authorization",
                    "Token <key> (Bearer is accepted too)",
                ))),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_documents_catalog_and_auth() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Storefront API"));
        assert!(json.contains("/api/v1/products/{id}"));
        assert!(json.contains("/api/v1/auth/login"));
        assert!(json.contains("token_auth"));
    }
}
