//! Categories and tags.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, SqlErr,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::authenticated;
use crate::auth::{Action, AuthUser, PolicyTable, Resource};
use crate::db::transaction::transaction_scope;
use crate::db::DbPool;
use crate::dto::taxonomy::{CategoryRequest, CategoryResponse, TagRequest, TagResponse};
use crate::entities::{category, product, product_tag, tag};
use crate::errors::ServiceError;
use crate::validation::{collect_errors, require};

pub struct CategoryService {
    db_pool: Arc<DbPool>,
    policies: PolicyTable,
}

impl CategoryService {
    pub fn new(db_pool: Arc<DbPool>, policies: PolicyTable) -> Self {
        Self { db_pool, policies }
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<CategoryResponse>, ServiceError> {
        let categories = category::Entity::find()
            .order_by_asc(category::Column::Name)
            .order_by_asc(category::Column::Id)
            .all(&*self.db_pool)
            .await?;
        Ok(categories.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<CategoryResponse, ServiceError> {
        Ok(self.find(id).await?.into())
    }

    #[instrument(skip(self, requester, request))]
    pub async fn create(
        &self,
        requester: Option<&AuthUser>,
        request: CategoryRequest,
    ) -> Result<CategoryResponse, ServiceError> {
        self.policies
            .authorize(Resource::Category, Action::Create, requester, None)?;
        let requester = authenticated(requester)?;

        let mut errors = collect_errors(&request);
        let name = require(&mut errors, "name", request.name).map(|n| n.trim().to_string());
        errors.into_result()?;
        let name = name.unwrap_or_default();
        self.ensure_unique_name(&name, None).await?;

        let now = Utc::now();
        let created = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            user_id: Set(requester.id()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await?;

        info!(category_id = %created.id, name = %created.name, "category created");
        Ok(created.into())
    }

    #[instrument(skip(self, requester, request))]
    pub async fn update(
        &self,
        requester: Option<&AuthUser>,
        id: Uuid,
        request: CategoryRequest,
        partial: bool,
    ) -> Result<CategoryResponse, ServiceError> {
        authenticated(requester)?;
        let existing = self.find(id).await?;
        self.policies.authorize(
            Resource::Category,
            Action::Update,
            requester,
            Some(existing.user_id),
        )?;

        let mut errors = collect_errors(&request);
        if !partial {
            require(&mut errors, "name", request.name.as_ref());
        }
        errors.into_result()?;

        let mut model: category::ActiveModel = existing.into();
        if let Some(name) = request.name {
            let name = name.trim().to_string();
            self.ensure_unique_name(&name, Some(id)).await?;
            model.name = Set(name);
        }
        model.updated_at = Set(Utc::now());
        let updated = model.update(&*self.db_pool).await?;

        info!(category_id = %id, "category updated");
        Ok(updated.into())
    }

    /// Refused with 409 while any product still references the category.
    #[instrument(skip(self, requester))]
    pub async fn delete(&self, requester: Option<&AuthUser>, id: Uuid) -> Result<(), ServiceError> {
        authenticated(requester)?;
        let db = &*self.db_pool;
        let existing = self.find(id).await?;
        self.policies.authorize(
            Resource::Category,
            Action::Delete,
            requester,
            Some(existing.user_id),
        )?;

        transaction_scope(db, move |txn| {
            Box::pin(async move { remove_unused_category(txn, existing).await })
        })
        .await?;
        info!(category_id = %id, "category deleted");
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<category::Model, ServiceError> {
        category::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", id)))
    }

    async fn ensure_unique_name(&self, name: &str, exclude: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query = category::Entity::find().filter(category::Column::Name.eq(name));
        if let Some(id) = exclude {
            query = query.filter(category::Column::Id.ne(id));
        }
        if query.one(&*self.db_pool).await?.is_some() {
            return Err(ServiceError::field(
                "name",
                "category with this name already exists.",
            ));
        }
        Ok(())
    }
}

/// Deletes `category` unless products reference it. A product inserted after the
/// count still trips the RESTRICT foreign key, which is reported the same way.
async fn remove_unused_category<C: ConnectionTrait>(
    db: &C,
    category: category::Model,
) -> Result<(), ServiceError> {
    let in_use = product::Entity::find()
        .filter(product::Column::CategoryId.eq(category.id))
        .count(db)
        .await?;
    if in_use > 0 {
        return Err(category_in_use(&category.name, Some(in_use)));
    }

    let name = category.name.clone();
    category.delete(db).await.map_err(|err| match err.sql_err() {
        Some(SqlErr::ForeignKeyConstraintViolation(_)) => category_in_use(&name, None),
        _ => err.into(),
    })?;
    Ok(())
}

fn category_in_use(name: &str, products: Option<u64>) -> ServiceError {
    match products {
        Some(count) => ServiceError::Conflict(format!(
            "Cannot delete category \"{}\": it is referenced by {} product(s).",
            name, count
        )),
        None => ServiceError::Conflict(format!(
            "Cannot delete category \"{}\": it is referenced by products.",
            name
        )),
    }
}

pub struct TagService {
    db_pool: Arc<DbPool>,
    policies: PolicyTable,
}

impl TagService {
    pub fn new(db_pool: Arc<DbPool>, policies: PolicyTable) -> Self {
        Self { db_pool, policies }
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<TagResponse>, ServiceError> {
        let tags = tag::Entity::find()
            .order_by_asc(tag::Column::Name)
            .order_by_asc(tag::Column::Id)
            .all(&*self.db_pool)
            .await?;
        Ok(tags.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<TagResponse, ServiceError> {
        Ok(self.find(id).await?.into())
    }

    #[instrument(skip(self, requester, request))]
    pub async fn create(
        &self,
        requester: Option<&AuthUser>,
        request: TagRequest,
    ) -> Result<TagResponse, ServiceError> {
        self.policies
            .authorize(Resource::Tag, Action::Create, requester, None)?;
        let requester = authenticated(requester)?;

        let mut errors = collect_errors(&request);
        let name = require(&mut errors, "name", request.name);
        errors.into_result()?;

        let now = Utc::now();
        let created = tag::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.unwrap_or_default().trim().to_string()),
            user_id: Set(requester.id()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await?;

        info!(tag_id = %created.id, name = %created.name, "tag created");
        Ok(created.into())
    }

    #[instrument(skip(self, requester, request))]
    pub async fn update(
        &self,
        requester: Option<&AuthUser>,
        id: Uuid,
        request: TagRequest,
        partial: bool,
    ) -> Result<TagResponse, ServiceError> {
        authenticated(requester)?;
        let existing = self.find(id).await?;
        self.policies.authorize(
            Resource::Tag,
            Action::Update,
            requester,
            Some(existing.user_id),
        )?;

        let mut errors = collect_errors(&request);
        if !partial {
            require(&mut errors, "name", request.name.as_ref());
        }
        errors.into_result()?;

        let mut model: tag::ActiveModel = existing.into();
        if let Some(name) = request.name {
            model.name = Set(name.trim().to_string());
        }
        model.updated_at = Set(Utc::now());
        let updated = model.update(&*self.db_pool).await?;

        info!(tag_id = %id, "tag updated");
        Ok(updated.into())
    }

    /// Products lose the tag; the products themselves stay.
    #[instrument(skip(self, requester))]
    pub async fn delete(&self, requester: Option<&AuthUser>, id: Uuid) -> Result<(), ServiceError> {
        authenticated(requester)?;
        let db = &*self.db_pool;
        let existing = self.find(id).await?;
        self.policies.authorize(
            Resource::Tag,
            Action::Delete,
            requester,
            Some(existing.user_id),
        )?;

        transaction_scope(db, move |txn| {
            Box::pin(async move {
                product_tag::Entity::delete_many()
                    .filter(product_tag::Column::TagId.eq(id))
                    .exec(txn)
                    .await?;
                existing.delete(txn).await?;
                Ok::<_, ServiceError>(())
            })
        })
        .await?;
        info!(tag_id = %id, "tag deleted");
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<tag::Model, ServiceError> {
        tag::Entity::find_by_id(id)
            .one(&*self.db_pool)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Tag {} not found", id)))
    }
}
