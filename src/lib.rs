//! Storefront catalog API
//!
//! Products, categories, tags, product media and token authentication over axum and SeaORM.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod dto;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod media;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;
pub mod validation;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use http::HeaderValue;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
};

use crate::media::ImageStorage;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        storage: Arc<dyn ImageStorage>,
    ) -> Self {
        let services = handlers::AppServices::new(db.clone(), &config, storage);
        Self {
            db,
            config,
            services,
        }
    }

    pub fn product_service(&self) -> Arc<services::products::ProductService> {
        self.services.products.clone()
    }

    pub fn product_media_service(&self) -> Arc<services::product_media::ProductMediaService> {
        self.services.product_media.clone()
    }

    pub fn category_service(&self) -> Arc<services::taxonomy::CategoryService> {
        self.services.categories.clone()
    }

    pub fn tag_service(&self) -> Arc<services::taxonomy::TagService> {
        self.services.tags.clone()
    }

    pub fn account_service(&self) -> Arc<services::accounts::AccountService> {
        self.services.accounts.clone()
    }
}

/// Routes mounted under `/api/v1`.
pub fn api_v1_routes() -> Router<AppState> {
    use handlers::{auth, categories, product_media, products, tags};

    let catalog = Router::new()
        .route(
            "/products",
            get(products::list_products).post(products::create_product),
        )
        // Static segments win over `:id`, so these sit beside the product routes.
        .route("/products/images", post(product_media::upload_image))
        .route("/products/images/:id", delete(product_media::delete_image))
        .route("/products/attributes", post(product_media::create_attribute))
        .route(
            "/products/attributes/:id",
            put(product_media::replace_attribute)
                .patch(product_media::update_attribute)
                .delete(product_media::delete_attribute),
        )
        .route(
            "/products/:id",
            get(products::get_product)
                .put(products::replace_product)
                .patch(products::update_product)
                .delete(products::delete_product),
        );

    let taxonomy = Router::new()
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/:id",
            get(categories::get_category)
                .put(categories::replace_category)
                .patch(categories::update_category)
                .delete(categories::delete_category),
        )
        .route("/tags", get(tags::list_tags).post(tags::create_tag))
        .route(
            "/tags/:id",
            get(tags::get_tag)
                .put(tags::replace_tag)
                .patch(tags::update_tag)
                .delete(tags::delete_tag),
        );

    let accounts = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me).patch(auth::update_me));

    Router::new()
        .merge(catalog)
        .merge(taxonomy)
        .nest("/auth", accounts)
}

/// Full application: health, v1 API, media files and Swagger UI behind the shared layers.
pub fn build_router(state: AppState) -> Router {
    let config = &state.config;

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/api/v1", api_v1_routes())
        .nest_service(&config.media_url, ServeDir::new(&config.media_root))
        .merge(openapi::swagger_ui())
        .layer(DefaultBodyLimit::max(config.max_body_size))
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        // Outside the trace layer so its span picks up the id
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(cors_layer(config))
        .with_state(state)
}

/// Explicit origins when configured, permissive otherwise.
///
/// Configuration validation already refuses the permissive fallback outside development
/// unless it was opted into.
pub fn cors_layer(config: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
