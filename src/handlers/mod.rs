pub mod auth;
pub mod categories;
pub mod common;
pub mod health;
pub mod product_media;
pub mod products;
pub mod tags;

use std::sync::Arc;

use crate::auth::{PasswordPolicy, PasswordStrength, PolicyTable};
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::media::ImageStorage;
use crate::services::{
    accounts::AccountService,
    product_media::ProductMediaService,
    product_query::ProductQueryPipeline,
    products::ProductService,
    taxonomy::{CategoryService, TagService},
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub products: Arc<ProductService>,
    pub product_media: Arc<ProductMediaService>,
    pub categories: Arc<CategoryService>,
    pub tags: Arc<TagService>,
    pub accounts: Arc<AccountService>,
}

impl AppServices {
    /// Wires every service against one pool, one image store and the configured policies.
    pub fn new(db_pool: Arc<DbPool>, config: &AppConfig, storage: Arc<dyn ImageStorage>) -> Self {
        let policies = PolicyTable::new(config.taxonomy_write_policy);
        let pipeline = ProductQueryPipeline::from_config(config);
        let password_policy: Arc<dyn PasswordStrength> =
            Arc::new(PasswordPolicy::with_min_length(config.password_min_length));

        Self {
            products: Arc::new(ProductService::new(
                db_pool.clone(),
                storage.clone(),
                policies,
                pipeline,
                config.media_url.clone(),
            )),
            product_media: Arc::new(ProductMediaService::new(
                db_pool.clone(),
                storage.clone(),
                policies,
                config.media_url.clone(),
            )),
            categories: Arc::new(CategoryService::new(db_pool.clone(), policies)),
            tags: Arc::new(TagService::new(db_pool.clone(), policies)),
            accounts: Arc::new(AccountService::new(
                db_pool,
                storage,
                password_policy,
                config.media_url.clone(),
            )),
        }
    }
}
