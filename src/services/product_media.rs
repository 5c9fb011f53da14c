use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, ModelTrait, Set};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{authenticated, missing_reference};
use crate::auth::{Action, AuthUser, PolicyTable, Resource};
use crate::db::DbPool;
use crate::dto::products::{
    CreateProductAttributeRequest, CreateProductImageRequest, ProductAttributeResponse,
    ProductImageResponse, UpdateProductAttributeRequest,
};
use crate::entities::{product, product_attribute, product_image};
use crate::errors::{FieldErrors, ServiceError};
use crate::media::{decode_base64_image, image_path, ImageStorage, PRODUCT_IMAGES_DIR};
use crate::validation::{collect_errors, require};

/// Standalone image upload/removal and attribute CRUD against existing products.
pub struct ProductMediaService {
    db_pool: Arc<DbPool>,
    storage: Arc<dyn ImageStorage>,
    policies: PolicyTable,
    media_url: String,
}

impl ProductMediaService {
    pub fn new(
        db_pool: Arc<DbPool>,
        storage: Arc<dyn ImageStorage>,
        policies: PolicyTable,
        media_url: impl Into<String>,
    ) -> Self {
        Self {
            db_pool,
            storage,
            policies,
            media_url: media_url.into(),
        }
    }

    /// Parent product of a media row, or a `product` field error.
    async fn parent_product(
        &self,
        id: Option<Uuid>,
        errors: &mut FieldErrors,
    ) -> Result<Option<product::Model>, ServiceError> {
        let Some(id) = require(errors, "product", id) else {
            return Ok(None);
        };
        let found = product::Entity::find_by_id(id).one(&*self.db_pool).await?;
        if found.is_none() {
            errors.add("product", missing_reference(id));
        }
        Ok(found)
    }

    #[instrument(skip(self, requester, request))]
    pub async fn create_image(
        &self,
        requester: Option<&AuthUser>,
        request: CreateProductImageRequest,
    ) -> Result<ProductImageResponse, ServiceError> {
        let user = authenticated(requester)?;

        let mut errors = collect_errors(&request);
        let product = self.parent_product(request.product, &mut errors).await?;
        let decoded = require(&mut errors, "image", request.image.as_deref()).and_then(|raw| {
            decode_base64_image(raw, &Uuid::new_v4().to_string())
                .map_err(|err| errors.add("image", format!("Upload a valid image: {}.", err)))
                .ok()
        });
        let (Some(product), Some(decoded)) = (product, decoded) else {
            return Err(errors.into());
        };
        errors.into_result()?;

        self.policies.authorize(
            Resource::ProductImage,
            Action::Create,
            requester,
            Some(product.user_id),
        )?;

        let path = image_path(PRODUCT_IMAGES_DIR, &decoded);
        self.storage.save(&path, decoded.bytes).await?;

        let now = Utc::now();
        let row = product_image::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product.id),
            image: Set(path.clone()),
            user_id: Set(user.id()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let image = match row.insert(&*self.db_pool).await {
            Ok(image) => image,
            Err(err) => {
                if let Err(cleanup) = self.storage.delete(&path).await {
                    warn!(path = %path, error = %cleanup, "failed to remove orphaned image");
                }
                return Err(err.into());
            }
        };

        info!(image_id = %image.id, product_id = %product.id, "product image uploaded");
        Ok(ProductImageResponse::from_model(&image, &self.media_url))
    }

    #[instrument(skip(self, requester))]
    pub async fn delete_image(
        &self,
        requester: Option<&AuthUser>,
        id: Uuid,
    ) -> Result<(), ServiceError> {
        authenticated(requester)?;
        let db = &*self.db_pool;
        let image = product_image::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product image {} not found", id)))?;
        self.policies.authorize(
            Resource::ProductImage,
            Action::Delete,
            requester,
            Some(image.user_id),
        )?;

        let path = image.image.clone();
        image.delete(db).await?;
        if let Err(err) = self.storage.delete(&path).await {
            warn!(path = %path, error = %err, "failed to remove image file");
        }

        info!(image_id = %id, "product image deleted");
        Ok(())
    }

    #[instrument(skip(self, requester, request))]
    pub async fn create_attribute(
        &self,
        requester: Option<&AuthUser>,
        request: CreateProductAttributeRequest,
    ) -> Result<ProductAttributeResponse, ServiceError> {
        let user = authenticated(requester)?;

        let mut errors = collect_errors(&request);
        let product = self.parent_product(request.product, &mut errors).await?;
        let name = require(&mut errors, "name", request.name);
        let value = require(&mut errors, "value", request.value);
        let (Some(product), Some(name), Some(value)) = (product, name, value) else {
            return Err(errors.into());
        };
        errors.into_result()?;

        self.policies.authorize(
            Resource::ProductAttribute,
            Action::Create,
            requester,
            Some(product.user_id),
        )?;

        let now = Utc::now();
        let attribute = product_attribute::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product.id),
            name: Set(name),
            value: Set(value),
            user_id: Set(user.id()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await?;

        info!(attribute_id = %attribute.id, product_id = %product.id, "product attribute created");
        Ok(attribute.into())
    }

    #[instrument(skip(self, requester, request))]
    pub async fn update_attribute(
        &self,
        requester: Option<&AuthUser>,
        id: Uuid,
        request: UpdateProductAttributeRequest,
        partial: bool,
    ) -> Result<ProductAttributeResponse, ServiceError> {
        authenticated(requester)?;
        let db = &*self.db_pool;
        let existing = find_attribute(db, id).await?;
        self.policies.authorize(
            Resource::ProductAttribute,
            Action::Update,
            requester,
            Some(existing.user_id),
        )?;

        let mut errors = collect_errors(&request);
        if !partial {
            require(&mut errors, "name", request.name.as_ref());
            require(&mut errors, "value", request.value.as_ref());
        }
        errors.into_result()?;

        let mut model: product_attribute::ActiveModel = existing.into();
        if let Some(name) = request.name {
            model.name = Set(name);
        }
        if let Some(value) = request.value {
            model.value = Set(value);
        }
        model.updated_at = Set(Utc::now());
        let attribute = model.update(db).await?;

        info!(attribute_id = %id, partial, "product attribute updated");
        Ok(attribute.into())
    }

    #[instrument(skip(self, requester))]
    pub async fn delete_attribute(
        &self,
        requester: Option<&AuthUser>,
        id: Uuid,
    ) -> Result<(), ServiceError> {
        authenticated(requester)?;
        let db = &*self.db_pool;
        let existing = find_attribute(db, id).await?;
        self.policies.authorize(
            Resource::ProductAttribute,
            Action::Delete,
            requester,
            Some(existing.user_id),
        )?;

        existing.delete(db).await?;
        info!(attribute_id = %id, "product attribute deleted");
        Ok(())
    }

}

async fn find_attribute(
    db: &DbPool,
    id: Uuid,
) -> Result<product_attribute::Model, ServiceError> {
    product_attribute::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product attribute {} not found", id)))
}
