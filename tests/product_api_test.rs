mod common;

use axum::http::{Method, StatusCode};
use common::{png_data_uri, product_body, TestApp, PNG_BYTES};
use serde_json::json;

#[tokio::test]
async fn create_product_with_nested_tags_attributes_and_images() {
    let app = TestApp::new().await;
    let seller = app.register("seller@example.com", "+15551230001").await;
    let category = app.create_category(&seller.token, "Furniture").await;
    let oak = app.create_tag(&seller.token, "oak").await;
    let handmade = app.create_tag(&seller.token, "handmade").await;

    let product = app
        .create_product(
            &seller.token,
            &category,
            json!({
                "tags": [oak, handmade, oak],
                "attributes": [
                    { "name": "width", "value": "120cm" },
                    { "name": "finish", "value": "oil" }
                ],
                "images": [png_data_uri(), png_data_uri()],
            }),
        )
        .await;

    assert_eq!(product["name"], "Walnut desk");
    assert_eq!(product["price"], "249.50");
    assert_eq!(product["rating"], "4.5");
    assert_eq!(product["receive_type"], "order");
    assert_eq!(product["is_published"], true);
    assert_eq!(product["category"]["id"], category.as_str());
    assert_eq!(product["user"]["id"], seller.id.as_str());

    // tags are deduplicated and ordered by name
    let tag_names: Vec<&str> = product["tags"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(tag_names, vec!["handmade", "oak"]);

    assert_eq!(product["attributes"].as_array().unwrap().len(), 2);

    let images = product["images"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    assert_eq!(product["image"], images[0]["image"]);
    let first_url = images[0]["image"].as_str().unwrap();
    assert!(first_url.starts_with("/media/product_images/"));
    assert!(first_url.ends_with(".png"));

    let stored = app.storage.paths().await;
    assert_eq!(stored.len(), 2);
    let path = first_url.trim_start_matches("/media/");
    assert_eq!(&app.storage.get(path).await.unwrap()[..], PNG_BYTES);
}

#[tokio::test]
async fn create_requires_authentication() {
    let app = TestApp::new().await;
    let seller = app.register("seller@example.com", "+15551230001").await;
    let category = app.create_category(&seller.token, "Furniture").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/products",
            Some(product_body(&category)),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Authentication credentials were not provided.");

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/products",
            Some(product_body(&category)),
            Some("0000000000000000000000000000000000000000"),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid token.");
}

#[tokio::test]
async fn invalid_fields_are_reported_together() {
    let app = TestApp::new().await;
    let seller = app.register("seller@example.com", "+15551230001").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "name": "Desk",
                "price": "-5",
                "rating": "3.3",
                "category": uuid::Uuid::new_v4(),
                "images": ["***not base64***"],
                "attributes": [{ "name": "", "value": "x" }],
            })),
            Some(&seller.token),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    for field in [
        "price",
        "rating",
        "description",
        "content",
        "category",
        "images",
        "attributes",
    ] {
        assert!(body.get(field).is_some(), "missing error for {field}: {body}");
    }
    assert_eq!(body["price"][0], "Price cannot be negative.");
    assert_eq!(body["rating"][0], "This rating value is not allowed.");
    assert!(app.storage.is_empty().await);
}

#[tokio::test]
async fn one_malformed_image_among_valid_ones_aborts_creation() {
    let app = TestApp::new().await;
    let seller = app.register("seller@example.com", "+15551230001").await;
    let category = app.create_category(&seller.token, "Furniture").await;

    let mut body = product_body(&category);
    body["images"] = json!([png_data_uri(), "@@not base64@@", png_data_uri()]);

    let (status, errors) = app
        .call(Method::POST, "/api/v1/products", Some(body), Some(&seller.token))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let messages = errors["images"].as_array().expect("images errors");
    assert_eq!(messages.len(), 1);
    assert!(
        messages[0].as_str().unwrap_or_default().contains("Image 1 is invalid"),
        "{errors}"
    );
    assert_eq!(app.catalog_row_counts().await, (0, 0, 0, 0));
    assert!(app.storage.is_empty().await);
}

#[tokio::test]
async fn storage_failure_mid_creation_rolls_back_every_row_and_file() {
    let app = TestApp::with_failing_storage_after(1).await;
    let seller = app.register("seller@example.com", "+15551230001").await;
    let category = app.create_category(&seller.token, "Furniture").await;
    let oak = app.create_tag(&seller.token, "oak").await;

    let mut body = product_body(&category);
    body["tags"] = json!([oak]);
    body["attributes"] = json!([{ "name": "color", "value": "walnut" }]);
    body["images"] = json!([png_data_uri(), png_data_uri()]);

    let (status, errors) = app
        .call(Method::POST, "/api/v1/products", Some(body), Some(&seller.token))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{errors}");
    assert_eq!(app.catalog_row_counts().await, (0, 0, 0, 0));
    assert!(app.storage.is_empty().await, "{:?}", app.storage.paths().await);

    let (status, listing) = app.call(Method::GET, "/api/v1/products", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["count"], 0);
}

#[tokio::test]
async fn unknown_tag_rejects_the_whole_product() {
    let app = TestApp::new().await;
    let seller = app.register("seller@example.com", "+15551230001").await;
    let category = app.create_category(&seller.token, "Furniture").await;

    let mut body = product_body(&category);
    body["tags"] = json!([uuid::Uuid::new_v4()]);
    body["images"] = json!([png_data_uri()]);

    let (status, errors) = app
        .call(Method::POST, "/api/v1/products", Some(body), Some(&seller.token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(errors.get("tags").is_some());

    let (_, listing) = app.call(Method::GET, "/api/v1/products", None, None).await;
    assert_eq!(listing["count"], 0);
    assert!(app.storage.is_empty().await);
}

#[tokio::test]
async fn retrieve_shows_content_and_list_does_not() {
    let app = TestApp::new().await;
    let seller = app.register("seller@example.com", "+15551230001").await;
    let category = app.create_category(&seller.token, "Furniture").await;
    let product = app.create_product(&seller.token, &category, json!({})).await;
    let id = product["id"].as_str().unwrap();

    let (status, detail) = app
        .call(Method::GET, &format!("/api/v1/products/{id}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(detail.get("content").is_some());
    assert!(detail.get("attributes").is_some());

    let (_, listing) = app.call(Method::GET, "/api/v1/products", None, None).await;
    let item = &listing["results"][0];
    assert_eq!(item["id"], id);
    assert!(item.get("content").is_none());
    assert!(item.get("created_at").is_none());
}

#[tokio::test]
async fn missing_and_malformed_ids_are_not_found() {
    let app = TestApp::new().await;

    let (status, _) = app
        .call(
            Method::GET,
            &format!("/api/v1/products/{}", uuid::Uuid::new_v4()),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call(Method::GET, "/api/v1/products/not-a-uuid", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_owner_or_admin_may_modify() {
    let app = TestApp::new().await;
    let owner = app.register("owner@example.com", "+15551230001").await;
    let stranger = app.register("stranger@example.com", "+15551230002").await;
    let admin = app.admin().await;
    let category = app.create_category(&owner.token, "Furniture").await;
    let product = app.create_product(&owner.token, &category, json!({})).await;
    let uri = format!("/api/v1/products/{}", product["id"].as_str().unwrap());

    let (status, _) = app
        .call(Method::PATCH, &uri, Some(json!({ "price": "1" })), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app
        .call(
            Method::PATCH,
            &uri,
            Some(json!({ "price": "1" })),
            Some(&stranger.token),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["detail"],
        "You do not have permission to perform this action."
    );

    let (status, body) = app
        .call(
            Method::PATCH,
            &uri,
            Some(json!({ "price": "10", "receive_type": "pick_up" })),
            Some(&owner.token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["price"], "10.00");
    assert_eq!(body["receive_type"], "pickup");
    assert_eq!(body["name"], "Walnut desk");

    let (status, body) = app
        .call(
            Method::PATCH,
            &uri,
            Some(json!({ "is_published": false })),
            Some(&admin.token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_published"], false);

    let (status, _) = app
        .call(Method::DELETE, &uri, None, Some(&stranger.token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn put_requires_every_field_and_replaces_tags() {
    let app = TestApp::new().await;
    let owner = app.register("owner@example.com", "+15551230001").await;
    let category = app.create_category(&owner.token, "Furniture").await;
    let oak = app.create_tag(&owner.token, "oak").await;
    let pine = app.create_tag(&owner.token, "pine").await;
    let product = app
        .create_product(&owner.token, &category, json!({ "tags": [oak] }))
        .await;
    let uri = format!("/api/v1/products/{}", product["id"].as_str().unwrap());

    let (status, errors) = app
        .call(Method::PUT, &uri, Some(json!({ "name": "Desk" })), Some(&owner.token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    for field in ["description", "content", "category", "tags", "rating"] {
        assert!(errors.get(field).is_some(), "missing error for {field}");
    }

    let mut replacement = product_body(&category);
    replacement["name"] = json!("Pine desk");
    replacement["tags"] = json!([pine]);
    let (status, body) = app
        .call(Method::PUT, &uri, Some(replacement), Some(&owner.token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Pine desk");
    assert_eq!(body["tags"].as_array().unwrap().len(), 1);
    assert_eq!(body["tags"][0]["name"], "pine");
}

#[tokio::test]
async fn delete_removes_product_and_its_files() {
    let app = TestApp::new().await;
    let owner = app.register("owner@example.com", "+15551230001").await;
    let category = app.create_category(&owner.token, "Furniture").await;
    let product = app
        .create_product(
            &owner.token,
            &category,
            json!({
                "images": [png_data_uri()],
                "attributes": [{ "name": "width", "value": "120cm" }],
            }),
        )
        .await;
    let uri = format!("/api/v1/products/{}", product["id"].as_str().unwrap());
    assert_eq!(app.storage.len().await, 1);

    let response = app
        .request(Method::DELETE, &uri, None, Some(&owner.token))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (status, _) = app.call(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.storage.is_empty().await);
}

#[tokio::test]
async fn images_and_attributes_can_be_managed_separately() {
    let app = TestApp::new().await;
    let owner = app.register("owner@example.com", "+15551230001").await;
    let stranger = app.register("stranger@example.com", "+15551230002").await;
    let category = app.create_category(&owner.token, "Furniture").await;
    let product = app.create_product(&owner.token, &category, json!({})).await;
    let product_id = product["id"].as_str().unwrap();

    let (status, _) = app
        .call(
            Method::POST,
            "/api/v1/products/images",
            Some(json!({ "product": product_id, "image": png_data_uri() })),
            Some(&stranger.token),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, image) = app
        .call(
            Method::POST,
            "/api/v1/products/images",
            Some(json!({ "product": product_id, "image": png_data_uri() })),
            Some(&owner.token),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(image["product"], product_id);
    assert_eq!(app.storage.len().await, 1);

    let (status, errors) = app
        .call(
            Method::POST,
            "/api/v1/products/images",
            Some(json!({ "product": uuid::Uuid::new_v4(), "image": "%%%" })),
            Some(&owner.token),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(errors.get("product").is_some());
    assert!(errors.get("image").is_some());

    let (status, attribute) = app
        .call(
            Method::POST,
            "/api/v1/products/attributes",
            Some(json!({ "product": product_id, "name": "color", "value": "brown" })),
            Some(&owner.token),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let attribute_uri = format!(
        "/api/v1/products/attributes/{}",
        attribute["id"].as_str().unwrap()
    );

    let (status, updated) = app
        .call(
            Method::PATCH,
            &attribute_uri,
            Some(json!({ "value": "black" })),
            Some(&owner.token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "color");
    assert_eq!(updated["value"], "black");

    let (status, errors) = app
        .call(
            Method::PUT,
            &attribute_uri,
            Some(json!({ "value": "grey" })),
            Some(&owner.token),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(errors.get("name").is_some());

    let (_, detail) = app
        .call(Method::GET, &format!("/api/v1/products/{product_id}"), None, None)
        .await;
    assert_eq!(detail["attributes"][0]["value"], "black");
    assert_eq!(detail["image"], image["image"]);

    let response = app
        .request(Method::DELETE, &attribute_uri, None, Some(&owner.token))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let image_uri = format!("/api/v1/products/images/{}", image["id"].as_str().unwrap());
    let response = app
        .request(Method::DELETE, &image_uri, None, Some(&owner.token))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(app.storage.is_empty().await);
}
