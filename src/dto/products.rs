use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::accounts::UserSummary;
use super::taxonomy::{CategoryResponse, TagResponse};
use crate::entities::product::ReceiveType;
use crate::entities::{product_attribute, product_image};
use crate::media::media_url;
use crate::validation::{
    validate_not_blank, validate_price, validate_rating, PRICE_DECIMAL_PLACES,
    RATING_DECIMAL_PLACES,
};

/// Query string of `GET /products`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductListParams {
    /// Case-insensitive substring of name, description or content
    pub search: Option<String>,
    pub category: Option<Uuid>,
    /// Comma-separated tag ids; products carrying any of them match
    pub tags: Option<String>,
    pub user: Option<Uuid>,
    pub is_published: Option<bool>,
    #[param(value_type = Option<String>)]
    pub receive_type: Option<ReceiveType>,
    #[param(value_type = Option<String>)]
    pub rating: Option<Decimal>,
    #[param(value_type = Option<String>)]
    pub min_price: Option<Decimal>,
    #[param(value_type = Option<String>)]
    pub max_price: Option<Decimal>,
    /// One of name, price, created_at, rating, receive_type; `-` prefix for descending
    pub ordering: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

/// `{name, value}` pair attached to a product.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct AttributeInput {
    #[validate(length(max = 50), custom = "validate_not_blank")]
    pub name: Option<String>,
    #[validate(length(max = 50), custom = "validate_not_blank")]
    pub value: Option<String>,
}

/// Body of `POST /products`: the product with its tags, attributes and base64 images.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(max = 100), custom = "validate_not_blank")]
    pub name: Option<String>,
    #[validate(length(max = 255), custom = "validate_not_blank")]
    pub description: Option<String>,
    #[validate(custom = "validate_not_blank")]
    pub content: Option<String>,
    pub category: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<Uuid>,
    #[schema(value_type = Option<String>, example = "19.99")]
    #[validate(custom = "validate_price")]
    pub price: Option<Decimal>,
    pub receive_type: Option<ReceiveType>,
    #[schema(value_type = Option<String>, example = "4.5")]
    #[validate(custom = "validate_rating")]
    pub rating: Option<Decimal>,
    pub is_published: Option<bool>,
    #[serde(default)]
    pub attributes: Vec<AttributeInput>,
    /// Raw base64 or `data:<mime>;base64,<payload>`
    #[serde(default)]
    pub images: Vec<String>,
}

/// Body of `PUT`/`PATCH /products/{id}`. PUT needs every field without a default.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    #[validate(length(max = 100), custom = "validate_not_blank")]
    pub name: Option<String>,
    #[validate(length(max = 255), custom = "validate_not_blank")]
    pub description: Option<String>,
    #[validate(custom = "validate_not_blank")]
    pub content: Option<String>,
    pub category: Option<Uuid>,
    pub tags: Option<Vec<Uuid>>,
    #[schema(value_type = Option<String>)]
    #[validate(custom = "validate_price")]
    pub price: Option<Decimal>,
    pub receive_type: Option<ReceiveType>,
    #[schema(value_type = Option<String>)]
    #[validate(custom = "validate_rating")]
    pub rating: Option<Decimal>,
    pub is_published: Option<bool>,
}

/// Body of `POST /products/images`.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct CreateProductImageRequest {
    pub product: Option<Uuid>,
    #[validate(custom = "validate_not_blank")]
    pub image: Option<String>,
}

/// Body of `POST /products/attributes`.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct CreateProductAttributeRequest {
    pub product: Option<Uuid>,
    #[validate(length(max = 50), custom = "validate_not_blank")]
    pub name: Option<String>,
    #[validate(length(max = 50), custom = "validate_not_blank")]
    pub value: Option<String>,
}

/// Body of `PUT`/`PATCH /products/attributes/{id}`.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProductAttributeRequest {
    #[validate(length(max = 50), custom = "validate_not_blank")]
    pub name: Option<String>,
    #[validate(length(max = 50), custom = "validate_not_blank")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductImageResponse {
    pub id: Uuid,
    pub product: Uuid,
    /// Public URL of the stored file
    pub image: String,
    pub user: Uuid,
}

impl ProductImageResponse {
    pub fn from_model(model: &product_image::Model, media_prefix: &str) -> Self {
        Self {
            id: model.id,
            product: model.product_id,
            image: media_url(media_prefix, &model.image),
            user: model.user_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductAttributeResponse {
    pub id: Uuid,
    pub product: Uuid,
    pub name: String,
    pub value: String,
    pub user: Uuid,
}

impl From<product_attribute::Model> for ProductAttributeResponse {
    fn from(model: product_attribute::Model) -> Self {
        Self {
            id: model.id,
            product: model.product_id,
            name: model.name,
            value: model.value,
            user: model.user_id,
        }
    }
}

/// Collection representation: no content or timestamps.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductListItem {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: CategoryResponse,
    pub tags: Vec<TagResponse>,
    pub user: UserSummary,
    #[schema(value_type = String, example = "19.99")]
    pub price: Decimal,
    pub receive_type: ReceiveType,
    #[schema(value_type = String, example = "4.5")]
    pub rating: Decimal,
    pub is_published: bool,
    /// URL of the first image, if any
    pub image: Option<String>,
    pub images: Vec<ProductImageResponse>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductDetail {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub content: String,
    pub category: CategoryResponse,
    pub tags: Vec<TagResponse>,
    pub user: UserSummary,
    #[schema(value_type = String, example = "19.99")]
    pub price: Decimal,
    pub receive_type: ReceiveType,
    #[schema(value_type = String, example = "4.5")]
    pub rating: Decimal,
    pub is_published: bool,
    pub image: Option<String>,
    pub images: Vec<ProductImageResponse>,
    pub attributes: Vec<ProductAttributeResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProductDetail> for ProductListItem {
    fn from(detail: ProductDetail) -> Self {
        Self {
            id: detail.id,
            name: detail.name,
            description: detail.description,
            category: detail.category,
            tags: detail.tags,
            user: detail.user,
            price: detail.price,
            receive_type: detail.receive_type,
            rating: detail.rating,
            is_published: detail.is_published,
            image: detail.image,
            images: detail.images,
        }
    }
}

/// Fixed-scale rendering (`12.5` → `12.50`); some backends hand decimals back as floats.
pub fn fixed_scale(value: Decimal, scale: u32) -> Decimal {
    let mut value = value.round_dp(scale);
    value.rescale(scale);
    value
}

pub fn format_price(value: Decimal) -> Decimal {
    fixed_scale(value, PRICE_DECIMAL_PLACES)
}

pub fn format_rating(value: Decimal) -> Decimal {
    fixed_scale(value, RATING_DECIMAL_PLACES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn prices_render_with_two_places() {
        assert_eq!(format_price(dec!(12.5)).to_string(), "12.50");
        assert_eq!(format_price(dec!(0)).to_string(), "0.00");
        assert_eq!(format_rating(dec!(4)).to_string(), "4.0");
    }

    #[test]
    fn create_request_collects_every_field_failure() {
        let request: CreateProductRequest = serde_json::from_value(serde_json::json!({
            "name": "x".repeat(101),
            "price": "-1",
            "rating": "3.3",
        }))
        .unwrap();

        let errors = crate::errors::FieldErrors::from(&request.validate().unwrap_err());
        assert!(errors.contains("name"));
        assert!(errors.contains("price"));
        assert!(errors.contains("rating"));
    }

    #[test]
    fn legacy_pickup_spelling_is_accepted() {
        let request: UpdateProductRequest =
            serde_json::from_value(serde_json::json!({ "receive_type": "pick_up" })).unwrap();
        assert_eq!(request.receive_type, Some(ReceiveType::Pickup));
    }
}
