mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;
use storefront_api::config::TaxonomyWritePolicy;

#[tokio::test]
async fn categories_list_alphabetically_without_pagination() {
    let app = TestApp::new().await;
    let user = app.register("seller@example.com", "+15551230001").await;
    for name in ["Lighting", "Furniture", "Textiles"] {
        app.create_category(&user.token, name).await;
    }

    let (status, body) = app
        .call(Method::GET, "/api/v1/categories", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .expect("plain array")
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Furniture", "Lighting", "Textiles"]);
    assert_eq!(body[0]["user"], user.id.as_str());
}

#[tokio::test]
async fn category_names_are_unique_and_validated() {
    let app = TestApp::new().await;
    let user = app.register("seller@example.com", "+15551230001").await;
    app.create_category(&user.token, "Furniture").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/categories",
            Some(json!({ "name": "Furniture" })),
            Some(&user.token),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["name"][0], "category with this name already exists.");

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/categories",
            Some(json!({ "name": "x".repeat(251) })),
            Some(&user.token),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("name").is_some());

    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/categories",
            Some(json!({ "name": "Anonymous" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn category_in_use_cannot_be_deleted() {
    let app = TestApp::new().await;
    let user = app.register("seller@example.com", "+15551230001").await;
    let category = app.create_category(&user.token, "Furniture").await;
    let product = app.create_product(&user.token, &category, json!({})).await;
    let uri = format!("/api/v1/categories/{category}");

    let (status, body) = app
        .call(Method::DELETE, &uri, None, Some(&user.token))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["detail"].as_str().unwrap().contains("Furniture"));

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/products/{}", product["id"].as_str().unwrap()),
            None,
            Some(&user.token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .request(Method::DELETE, &uri, None, Some(&user.token))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn deleting_a_tag_detaches_it_from_products() {
    let app = TestApp::new().await;
    let user = app.register("seller@example.com", "+15551230001").await;
    let category = app.create_category(&user.token, "Furniture").await;
    let oak = app.create_tag(&user.token, "oak").await;
    let product = app
        .create_product(&user.token, &category, json!({ "tags": [oak] }))
        .await;

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/tags/{oak}"),
            None,
            Some(&user.token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (status, detail) = app
        .call(
            Method::GET,
            &format!("/api/v1/products/{}", product["id"].as_str().unwrap()),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(detail["tags"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn only_owner_or_admin_may_rename() {
    let app = TestApp::new().await;
    let owner = app.register("owner@example.com", "+15551230001").await;
    let stranger = app.register("stranger@example.com", "+15551230002").await;
    let admin = app.admin().await;
    let tag = app.create_tag(&owner.token, "oak").await;
    let uri = format!("/api/v1/tags/{tag}");

    let (status, _) = app
        .call(
            Method::PATCH,
            &uri,
            Some(json!({ "name": "pine" })),
            Some(&stranger.token),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(
            Method::PUT,
            &uri,
            Some(json!({ "name": "walnut" })),
            Some(&admin.token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "walnut");
    assert_eq!(body["user"], owner.id.as_str());

    let (status, body) = app
        .call(Method::PUT, &uri, Some(json!({})), Some(&owner.token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("name").is_some());
}

#[tokio::test]
async fn admin_only_taxonomy_policy() {
    let app = TestApp::with_config(|cfg| {
        cfg.taxonomy_write_policy = TaxonomyWritePolicy::Admin;
    })
    .await;
    let user = app.register("seller@example.com", "+15551230001").await;
    let admin = app.admin().await;

    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/tags",
            Some(json!({ "name": "oak" })),
            Some(&user.token),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let tag = app.create_tag(&admin.token, "oak").await;
    let (status, body) = app
        .call(Method::GET, &format!("/api/v1/tags/{tag}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "oak");
}
