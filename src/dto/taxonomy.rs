use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::{category, tag};
use crate::validation::validate_not_blank;

/// Body of `POST /categories`, `PUT /categories/{id}` and `PATCH /categories/{id}`.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct CategoryRequest {
    #[validate(length(max = 250), custom = "validate_not_blank")]
    pub name: Option<String>,
}

/// Body of `POST /tags`, `PUT /tags/{id}` and `PATCH /tags/{id}`.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct TagRequest {
    #[validate(length(max = 255), custom = "validate_not_blank")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CategoryResponse {
    pub id: Uuid,
    pub name: String,
    /// Owner
    pub user: Uuid,
}

impl From<category::Model> for CategoryResponse {
    fn from(model: category::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            user: model.user_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TagResponse {
    pub id: Uuid,
    pub name: String,
    /// Owner
    pub user: Uuid,
}

impl From<tag::Model> for TagResponse {
    fn from(model: tag::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            user: model.user_id,
        }
    }
}
