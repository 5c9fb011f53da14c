use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use chrono::{Duration, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::product_query::ProductQueryPipeline;
use super::{authenticated, missing_reference};
use crate::auth::{Action, AuthUser, PolicyTable, Resource};
use crate::db::transaction::transaction_scope;
use crate::db::DbPool;
use crate::dto::accounts::UserSummary;
use crate::dto::products::{
    format_price, format_rating, AttributeInput, CreateProductRequest, ProductAttributeResponse,
    ProductDetail, ProductImageResponse, ProductListItem, ProductListParams, UpdateProductRequest,
};
use crate::dto::Page;
use crate::entities::{
    category, product, product_attribute, product_image, product_tag, tag, user,
};
use crate::errors::{FieldErrors, ServiceError};
use crate::media::{
    decode_base64_image, image_path, remove_all, DecodedImage, ImageStorage, PRODUCT_IMAGES_DIR,
};
use crate::validation::{collect_errors, require};

/// Product listing, nested creation, update and removal.
pub struct ProductService {
    db_pool: Arc<DbPool>,
    storage: Arc<dyn ImageStorage>,
    policies: PolicyTable,
    pipeline: ProductQueryPipeline,
    media_url: String,
}

impl ProductService {
    pub fn new(
        db_pool: Arc<DbPool>,
        storage: Arc<dyn ImageStorage>,
        policies: PolicyTable,
        pipeline: ProductQueryPipeline,
        media_url: impl Into<String>,
    ) -> Self {
        Self {
            db_pool,
            storage,
            policies,
            pipeline,
            media_url: media_url.into(),
        }
    }

    /// Searched, filtered, ordered page of products.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        params: ProductListParams,
    ) -> Result<Page<ProductListItem>, ServiceError> {
        let db = &*self.db_pool;
        let query = self.pipeline.prepare(params)?;

        let paginator = query
            .apply(product::Entity::find())
            .paginate(db, query.page.page_size);
        let count = paginator.num_items().await?;
        // The offset of a page past the end can overflow; it has no rows anyway.
        if query.page.is_past_end(count) {
            return Ok(Page::new(Vec::new(), count, query.page));
        }
        let products = paginator.fetch_page(query.page.index()).await?;

        let results = self
            .hydrate(db, products, false)
            .await?
            .into_iter()
            .map(ProductListItem::from)
            .collect();

        Ok(Page::new(results, count, query.page))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<ProductDetail, ServiceError> {
        let db = &*self.db_pool;
        let product = find_product(db, id).await?;
        self.detail(db, product).await
    }

    /// Creates a product together with its tag links, attributes and images.
    ///
    /// Images are decoded and references checked before anything is written; the
    /// writes run in one transaction and stored files are removed if it fails.
    #[instrument(skip(self, requester, request))]
    pub async fn create(
        &self,
        requester: Option<&AuthUser>,
        request: CreateProductRequest,
    ) -> Result<ProductDetail, ServiceError> {
        self.policies
            .authorize(Resource::Product, Action::Create, requester, None)?;
        let requester = authenticated(requester)?;
        let db = &*self.db_pool;

        let mut errors = collect_errors(&request);
        let name = require(&mut errors, "name", request.name);
        let description = require(&mut errors, "description", request.description);
        let content = require(&mut errors, "content", request.content);
        let category_id = require(&mut errors, "category", request.category);
        let rating = require(&mut errors, "rating", request.rating);
        let attributes = collect_attributes(&request.attributes, &mut errors);
        let images = decode_images(&request.images, &mut errors);
        let tag_ids = unique_ids(request.tags);

        if let Some(category_id) = category_id {
            check_category(db, category_id, &mut errors).await?;
        }
        check_tags(db, &tag_ids, &mut errors).await?;

        let (Some(name), Some(description), Some(content), Some(category_id), Some(rating)) =
            (name, description, content, category_id, rating)
        else {
            return Err(errors.into());
        };
        errors.into_result()?;

        let now = Utc::now();
        let product_id = Uuid::new_v4();
        let user_id = requester.id();

        let product = product::ActiveModel {
            id: Set(product_id),
            name: Set(name),
            description: Set(description),
            content: Set(content),
            category_id: Set(category_id),
            price: Set(request.price.unwrap_or_default()),
            user_id: Set(user_id),
            receive_type: Set(request.receive_type.unwrap_or_default()),
            rating: Set(rating),
            is_published: Set(request.is_published.unwrap_or(true)),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let links = tag_links(product_id, &tag_ids);
        let attribute_rows: Vec<product_attribute::ActiveModel> = attributes
            .into_iter()
            .map(|(name, value)| product_attribute::ActiveModel {
                id: Set(Uuid::new_v4()),
                product_id: Set(product_id),
                name: Set(name),
                value: Set(value),
                user_id: Set(user_id),
                created_at: Set(now),
                updated_at: Set(now),
            })
            .collect();
        let stored = image_rows(product_id, user_id, images);
        let paths: Vec<String> = stored.iter().map(|(_, path, _)| path.clone()).collect();
        let storage = self.storage.clone();

        let result = transaction_scope(db, move |txn| {
            Box::pin(async move {
                product.insert(txn).await?;
                if !links.is_empty() {
                    product_tag::Entity::insert_many(links)
                        .exec_without_returning(txn)
                        .await?;
                }
                if !attribute_rows.is_empty() {
                    product_attribute::Entity::insert_many(attribute_rows)
                        .exec_without_returning(txn)
                        .await?;
                }
                for (row, path, bytes) in stored {
                    row.insert(txn).await?;
                    storage.save(&path, bytes).await?;
                }
                Ok::<_, ServiceError>(())
            })
        })
        .await;

        if let Err(err) = result {
            remove_all(self.storage.as_ref(), &paths).await;
            return Err(err);
        }

        counter!("storefront.products.created", 1);
        info!(product_id = %product_id, user_id = %user_id, images = paths.len(), "product created");
        self.get(product_id).await
    }

    /// Full (`partial = false`) or partial update by the owner or an admin.
    #[instrument(skip(self, requester, request))]
    pub async fn update(
        &self,
        requester: Option<&AuthUser>,
        id: Uuid,
        request: UpdateProductRequest,
        partial: bool,
    ) -> Result<ProductDetail, ServiceError> {
        authenticated(requester)?;
        let db = &*self.db_pool;
        let existing = find_product(db, id).await?;
        self.policies.authorize(
            Resource::Product,
            Action::Update,
            requester,
            Some(existing.user_id),
        )?;

        let mut errors = collect_errors(&request);
        if !partial {
            require(&mut errors, "name", request.name.as_ref());
            require(&mut errors, "description", request.description.as_ref());
            require(&mut errors, "content", request.content.as_ref());
            require(&mut errors, "category", request.category.as_ref());
            require(&mut errors, "tags", request.tags.as_ref());
            require(&mut errors, "rating", request.rating.as_ref());
        }
        if let Some(category_id) = request.category {
            check_category(db, category_id, &mut errors).await?;
        }
        let tag_ids = request.tags.map(unique_ids);
        if let Some(tag_ids) = &tag_ids {
            check_tags(db, tag_ids, &mut errors).await?;
        }
        errors.into_result()?;

        let mut model: product::ActiveModel = existing.into();
        if let Some(name) = request.name {
            model.name = Set(name);
        }
        if let Some(description) = request.description {
            model.description = Set(description);
        }
        if let Some(content) = request.content {
            model.content = Set(content);
        }
        if let Some(category_id) = request.category {
            model.category_id = Set(category_id);
        }
        if let Some(price) = request.price {
            model.price = Set(price);
        }
        if let Some(receive_type) = request.receive_type {
            model.receive_type = Set(receive_type);
        }
        if let Some(rating) = request.rating {
            model.rating = Set(rating);
        }
        if let Some(is_published) = request.is_published {
            model.is_published = Set(is_published);
        }
        model.updated_at = Set(Utc::now());

        transaction_scope(db, move |txn| {
            Box::pin(async move {
                model.update(txn).await?;
                if let Some(tag_ids) = tag_ids {
                    product_tag::Entity::delete_many()
                        .filter(product_tag::Column::ProductId.eq(id))
                        .exec(txn)
                        .await?;
                    let links = tag_links(id, &tag_ids);
                    if !links.is_empty() {
                        product_tag::Entity::insert_many(links)
                            .exec_without_returning(txn)
                            .await?;
                    }
                }
                Ok::<_, ServiceError>(())
            })
        })
        .await?;

        info!(product_id = %id, partial, "product updated");
        self.get(id).await
    }

    /// Removes the product with its links, attributes and images, then the image files.
    #[instrument(skip(self, requester))]
    pub async fn delete(&self, requester: Option<&AuthUser>, id: Uuid) -> Result<(), ServiceError> {
        authenticated(requester)?;
        let db = &*self.db_pool;
        let existing = find_product(db, id).await?;
        self.policies.authorize(
            Resource::Product,
            Action::Delete,
            requester,
            Some(existing.user_id),
        )?;

        let paths: Vec<String> = product_image::Entity::find()
            .filter(product_image::Column::ProductId.eq(id))
            .all(db)
            .await?
            .into_iter()
            .map(|image| image.image)
            .collect();

        transaction_scope(db, move |txn| {
            Box::pin(async move {
                product_tag::Entity::delete_many()
                    .filter(product_tag::Column::ProductId.eq(id))
                    .exec(txn)
                    .await?;
                product_attribute::Entity::delete_many()
                    .filter(product_attribute::Column::ProductId.eq(id))
                    .exec(txn)
                    .await?;
                product_image::Entity::delete_many()
                    .filter(product_image::Column::ProductId.eq(id))
                    .exec(txn)
                    .await?;
                product::Entity::delete_by_id(id).exec(txn).await?;
                Ok::<_, ServiceError>(())
            })
        })
        .await?;

        remove_all(self.storage.as_ref(), &paths).await;
        counter!("storefront.products.deleted", 1);
        info!(product_id = %id, images = paths.len(), "product deleted");
        Ok(())
    }

    async fn detail<C: ConnectionTrait>(
        &self,
        db: &C,
        product: product::Model,
    ) -> Result<ProductDetail, ServiceError> {
        let id = product.id;
        self.hydrate(db, vec![product], true)
            .await?
            .pop()
            .ok_or_else(|| ServiceError::InternalError(format!("product {} not assembled", id)))
    }

    /// Loads the related rows of `products` in batches and assembles representations.
    async fn hydrate<C: ConnectionTrait>(
        &self,
        db: &C,
        products: Vec<product::Model>,
        with_attributes: bool,
    ) -> Result<Vec<ProductDetail>, ServiceError> {
        if products.is_empty() {
            return Ok(Vec::new());
        }

        let product_ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();
        let category_ids: HashSet<Uuid> = products.iter().map(|p| p.category_id).collect();
        let user_ids: HashSet<Uuid> = products.iter().map(|p| p.user_id).collect();

        let categories: HashMap<Uuid, category::Model> = category::Entity::find()
            .filter(category::Column::Id.is_in(category_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        let users: HashMap<Uuid, user::Model> = user::Entity::find()
            .filter(user::Column::Id.is_in(user_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let links = product_tag::Entity::find()
            .filter(product_tag::Column::ProductId.is_in(product_ids.clone()))
            .all(db)
            .await?;
        let tag_ids: HashSet<Uuid> = links.iter().map(|link| link.tag_id).collect();
        let tags: HashMap<Uuid, tag::Model> = if tag_ids.is_empty() {
            HashMap::new()
        } else {
            tag::Entity::find()
                .filter(tag::Column::Id.is_in(tag_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|t| (t.id, t))
                .collect()
        };
        let mut tags_by_product: HashMap<Uuid, Vec<tag::Model>> = HashMap::new();
        for link in links {
            if let Some(tag) = tags.get(&link.tag_id) {
                tags_by_product
                    .entry(link.product_id)
                    .or_default()
                    .push(tag.clone());
            }
        }

        let mut images_by_product: HashMap<Uuid, Vec<ProductImageResponse>> = HashMap::new();
        for image in product_image::Entity::find()
            .filter(product_image::Column::ProductId.is_in(product_ids.clone()))
            .order_by_asc(product_image::Column::CreatedAt)
            .order_by_asc(product_image::Column::Id)
            .all(db)
            .await?
        {
            images_by_product
                .entry(image.product_id)
                .or_default()
                .push(ProductImageResponse::from_model(&image, &self.media_url));
        }

        let mut attributes_by_product: HashMap<Uuid, Vec<ProductAttributeResponse>> =
            HashMap::new();
        if with_attributes {
            for attribute in product_attribute::Entity::find()
                .filter(product_attribute::Column::ProductId.is_in(product_ids))
                .order_by_asc(product_attribute::Column::CreatedAt)
                .order_by_asc(product_attribute::Column::Name)
                .all(db)
                .await?
            {
                attributes_by_product
                    .entry(attribute.product_id)
                    .or_default()
                    .push(attribute.into());
            }
        }

        products
            .into_iter()
            .map(|product| {
                let category = categories.get(&product.category_id).cloned().ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "category {} of product {} missing",
                        product.category_id, product.id
                    ))
                })?;
                let owner = users.get(&product.user_id).ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "owner {} of product {} missing",
                        product.user_id, product.id
                    ))
                })?;

                let mut tags = tags_by_product.remove(&product.id).unwrap_or_default();
                tags.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
                let images = images_by_product.remove(&product.id).unwrap_or_default();

                Ok(ProductDetail {
                    id: product.id,
                    name: product.name,
                    description: product.description,
                    content: product.content,
                    category: category.into(),
                    tags: tags.into_iter().map(Into::into).collect(),
                    user: UserSummary::from(owner),
                    price: format_price(product.price),
                    receive_type: product.receive_type,
                    rating: format_rating(product.rating),
                    is_published: product.is_published,
                    image: images.first().map(|image| image.image.clone()),
                    images,
                    attributes: attributes_by_product
                        .remove(&product.id)
                        .unwrap_or_default(),
                    created_at: product.created_at,
                    updated_at: product.updated_at,
                })
            })
            .collect()
    }
}

pub(crate) async fn find_product<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<product::Model, ServiceError> {
    product::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))
}

async fn check_category<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    errors: &mut FieldErrors,
) -> Result<(), ServiceError> {
    if category::Entity::find_by_id(id).one(db).await?.is_none() {
        errors.add("category", missing_reference(id));
    }
    Ok(())
}

async fn check_tags<C: ConnectionTrait>(
    db: &C,
    ids: &[Uuid],
    errors: &mut FieldErrors,
) -> Result<(), ServiceError> {
    if ids.is_empty() {
        return Ok(());
    }
    let found: HashSet<Uuid> = tag::Entity::find()
        .filter(tag::Column::Id.is_in(ids.to_vec()))
        .all(db)
        .await?
        .into_iter()
        .map(|t| t.id)
        .collect();
    for id in ids.iter().filter(|id| !found.contains(id)) {
        errors.add("tags", missing_reference(*id));
    }
    Ok(())
}

/// First-seen order, duplicates dropped.
fn unique_ids(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

fn tag_links(product_id: Uuid, tag_ids: &[Uuid]) -> Vec<product_tag::ActiveModel> {
    tag_ids
        .iter()
        .map(|tag_id| product_tag::ActiveModel {
            product_id: Set(product_id),
            tag_id: Set(*tag_id),
        })
        .collect()
}

/// Validated `(name, value)` pairs; failures are reported under `attributes` with
/// the index of the offending entry.
fn collect_attributes(
    inputs: &[AttributeInput],
    errors: &mut FieldErrors,
) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        let mut item = collect_errors(input);
        let name = require(&mut item, "name", input.name.clone());
        let value = require(&mut item, "value", input.value.clone());
        for (field, messages) in item.iter() {
            for message in messages {
                errors.add("attributes", format!("[{}] {}: {}", index, field, message));
            }
        }
        if let (Some(name), Some(value)) = (name, value) {
            pairs.push((name, value));
        }
    }
    pairs
}

fn decode_images(inputs: &[String], errors: &mut FieldErrors) -> Vec<DecodedImage> {
    inputs
        .iter()
        .enumerate()
        .filter_map(
            |(index, input)| match decode_base64_image(input, &Uuid::new_v4().to_string()) {
                Ok(image) => Some(image),
                Err(err) => {
                    errors.add(
                        "images",
                        format!("Upload a valid image. Image {} is invalid: {}.", index, err),
                    );
                    None
                }
            },
        )
        .collect()
}

/// Image rows with their storage paths and contents. Timestamps step by a
/// microsecond so the upload order survives as the display order.
fn image_rows(
    product_id: Uuid,
    user_id: Uuid,
    images: Vec<DecodedImage>,
) -> Vec<(product_image::ActiveModel, String, Bytes)> {
    let now = Utc::now();
    images
        .into_iter()
        .enumerate()
        .map(|(index, image)| {
            let path = image_path(PRODUCT_IMAGES_DIR, &image);
            let created_at = now + Duration::microseconds(index as i64);
            let row = product_image::ActiveModel {
                id: Set(Uuid::new_v4()),
                product_id: Set(product_id),
                image: Set(path.clone()),
                user_id: Set(user_id),
                created_at: Set(created_at),
                updated_at: Set(created_at),
            };
            (row, path, image.bytes)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::base64_image::encode_data_uri;

    #[test]
    fn duplicate_tag_ids_collapse_in_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(unique_ids(vec![a, b, a, b]), vec![a, b]);
    }

    #[test]
    fn malformed_image_is_reported_by_index() {
        let good = encode_data_uri("image/png", b"\x89PNG");
        let mut errors = FieldErrors::new();
        let decoded = decode_images(&[good.clone(), "@@not base64@@".into(), good], &mut errors);

        assert_eq!(decoded.len(), 2);
        let messages = errors.get("images").unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Image 1"));
        assert!(!messages[0].contains(".."), "{}", messages[0]);
    }

    #[test]
    fn attribute_errors_name_the_entry() {
        let mut errors = FieldErrors::new();
        let pairs = collect_attributes(
            &[
                AttributeInput {
                    name: Some("color".into()),
                    value: Some("red".into()),
                },
                AttributeInput {
                    name: Some("size".into()),
                    value: None,
                },
            ],
            &mut errors,
        );

        assert_eq!(pairs, vec![("color".to_string(), "red".to_string())]);
        assert_eq!(
            errors.get("attributes").unwrap(),
            ["[1] value: This field is required.".to_string()]
        );
    }

    #[test]
    fn image_rows_keep_upload_order() {
        let images = (0..3)
            .map(|i| DecodedImage {
                name: format!("img{}.png", i),
                extension: "png".into(),
                bytes: Bytes::from_static(b"x"),
            })
            .collect();
        let rows = image_rows(Uuid::new_v4(), Uuid::new_v4(), images);

        assert_eq!(rows[0].1, "product_images/img0.png");
        let stamps: Vec<_> = rows
            .iter()
            .map(|(row, _, _)| row.created_at.clone().unwrap())
            .collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }
}
