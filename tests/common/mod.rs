#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use bytes::Bytes;
use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::{json, Value};
use storefront_api::{
    config::AppConfig,
    db,
    entities::{product, product_attribute, product_image, product_tag, user::Role},
    media::{
        base64_image::encode_data_uri, ImageStorage, InMemoryImageStorage, StorageError,
    },
    services::accounts::NewAccount,
    AppState,
};
use tempfile::TempDir;
use tower::ServiceExt;

pub const PASSWORD: &str = "velvet-harbor-1987";
pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 1, 2, 3];

/// Application over a throwaway SQLite file and in-memory image storage.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub storage: Arc<InMemoryImageStorage>,
    _db_dir: TempDir,
}

/// A registered account and its token.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: String,
    pub email: String,
    pub token: String,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Fresh database with migrations applied; `configure` can adjust settings first.
    pub async fn with_config(configure: impl FnOnce(&mut AppConfig)) -> Self {
        let storage = Arc::new(InMemoryImageStorage::new());
        Self::build(configure, storage.clone(), storage).await
    }

    /// Image storage accepts `saves` writes, then every further save fails.
    /// `storage` still shows what was actually kept.
    pub async fn with_failing_storage_after(saves: usize) -> Self {
        let inner = Arc::new(InMemoryImageStorage::new());
        let failing = Arc::new(FailingImageStorage {
            inner: inner.clone(),
            remaining: AtomicUsize::new(saves),
        });
        Self::build(|_| {}, failing, inner).await
    }

    async fn build(
        configure: impl FnOnce(&mut AppConfig),
        backend: Arc<dyn ImageStorage>,
        storage: Arc<InMemoryImageStorage>,
    ) -> Self {
        let db_dir = tempfile::tempdir().expect("temp dir for test database");
        let db_path = db_dir.path().join("storefront_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18_000,
            "test".to_string(),
        );
        cfg.db_max_connections = 4;
        cfg.db_min_connections = 1;
        cfg.media_root = db_dir.path().join("media").display().to_string();
        configure(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg, backend);
        let router = storefront_api::build_router(state.clone());

        Self {
            router,
            state,
            storage,
            _db_dir: db_dir,
        }
    }

    /// Send a request against the router with an optional token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Token {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Request with a raw `Authorization` header value.
    pub async fn request_with_authorization(
        &self,
        method: Method,
        uri: &str,
        authorization: &str,
    ) -> axum::response::Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", authorization)
            .body(Body::empty())
            .expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Same as [`TestApp::request`] but returns status and parsed JSON body (`Null` if empty).
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let response = self.request(method, uri, body, token).await;
        read_json(response).await
    }

    /// Rows in (products, product_tags, product_attributes, product_images).
    pub async fn catalog_row_counts(&self) -> (u64, u64, u64, u64) {
        let db = &*self.state.db;
        (
            product::Entity::find().count(db).await.expect("count products"),
            product_tag::Entity::find().count(db).await.expect("count tag links"),
            product_attribute::Entity::find()
                .count(db)
                .await
                .expect("count attributes"),
            product_image::Entity::find().count(db).await.expect("count images"),
        )
    }

    pub async fn register(&self, email: &str, phone: &str) -> TestUser {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/v1/auth/register",
                Some(json!({
                    "email": email,
                    "phone": phone,
                    "first_name": "Test",
                    "last_name": "User",
                    "password1": PASSWORD,
                    "password2": PASSWORD,
                })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        TestUser {
            id: body["id"].as_str().expect("user id").to_string(),
            email: email.to_string(),
            token: body["token"].as_str().expect("token").to_string(),
        }
    }

    /// Admin created through the service (as the CLI does), then logged in.
    pub async fn admin(&self) -> TestUser {
        let email = "admin@storefront.test";
        let admin = self
            .state
            .account_service()
            .create_admin(NewAccount {
                email: email.to_string(),
                phone: "+15550000000".to_string(),
                first_name: "Ada".to_string(),
                last_name: "Admin".to_string(),
                password: PASSWORD.to_string(),
                role: Role::Admin,
            })
            .await
            .expect("create admin");
        let token = self.login(email, PASSWORD).await;
        TestUser {
            id: admin.id.to_string(),
            email: email.to_string(),
            token,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/v1/auth/login",
                Some(json!({ "email": email, "password": password })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["token"].as_str().expect("token").to_string()
    }

    pub async fn create_category(&self, token: &str, name: &str) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/v1/categories",
                Some(json!({ "name": name })),
                Some(token),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "category create failed: {body}");
        body["id"].as_str().expect("category id").to_string()
    }

    pub async fn create_tag(&self, token: &str, name: &str) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/v1/tags",
                Some(json!({ "name": name })),
                Some(token),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "tag create failed: {body}");
        body["id"].as_str().expect("tag id").to_string()
    }

    /// Creates a product from `product_body(...)` merged with `overrides`.
    pub async fn create_product(&self, token: &str, category: &str, overrides: Value) -> Value {
        let mut body = product_body(category);
        if let (Some(target), Some(extra)) = (body.as_object_mut(), overrides.as_object()) {
            for (key, value) in extra {
                target.insert(key.clone(), value.clone());
            }
        }
        let (status, created) = self
            .call(Method::POST, "/api/v1/products", Some(body), Some(token))
            .await;
        assert_eq!(status, StatusCode::CREATED, "product create failed: {created}");
        created
    }
}

/// Delegates to an in-memory store until its save budget runs out.
struct FailingImageStorage {
    inner: Arc<InMemoryImageStorage>,
    remaining: AtomicUsize,
}

#[async_trait]
impl ImageStorage for FailingImageStorage {
    async fn save(&self, path: &str, bytes: Bytes) -> Result<String, StorageError> {
        let allowed = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if !allowed {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.inner.save(path, bytes).await
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.inner.delete(path).await
    }
}

/// Minimal valid product payload.
pub fn product_body(category: &str) -> Value {
    json!({
        "name": "Walnut desk",
        "description": "Solid walnut writing desk",
        "content": "Hand-finished, oiled walnut top with steel legs.",
        "category": category,
        "price": "249.5",
        "rating": "4.5",
    })
}

pub fn png_data_uri() -> String {
    encode_data_uri("image/png", PNG_BYTES)
}

pub async fn read_json(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body is json")
    };
    (status, body)
}
