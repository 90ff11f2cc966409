mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn test_login_required() {
    let app = TestApp::new();
    for uri in ["/api/recipe/tags", "/api/recipe/ingredients"] {
        let (status, _) = app.request("GET", uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
    }
}

#[tokio::test]
async fn test_retrieve_tags_ordered_by_name_desc() {
    let app = TestApp::new();
    let token = app.login("tags@example.com").await;
    app.create_tag(&token, "Dessert").await;
    app.create_tag(&token, "Vegan").await;

    let (status, body) = app.request("GET", "/api/recipe/tags", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Vegan", "Dessert"]);
}

#[tokio::test]
async fn test_tags_limited_to_user() {
    let app = TestApp::new();
    let other = app.login("other@example.com").await;
    let other_tag = app.create_tag(&other, "Fruity").await;

    let token = app.login("owner@example.com").await;
    let tag = app.create_tag(&token, "Comfort Food").await;

    let (status, body) = app.request("GET", "/api/recipe/tags", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{ "id": tag, "name": "Comfort Food" }]));
    assert!(body
        .as_array()
        .unwrap()
        .iter()
        .all(|t| t["id"].as_i64() != Some(other_tag)));
}

#[tokio::test]
async fn test_create_tag() {
    let app = TestApp::new();
    let token = app.login("create@example.com").await;

    let (status, body) = app
        .request(
            "POST",
            "/api/recipe/tags",
            Some(&token),
            Some(json!({ "name": "  Simple  " })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "Simple");
    assert!(body["id"].is_i64());
}

#[tokio::test]
async fn test_create_tag_invalid() {
    let app = TestApp::new();
    let token = app.login("invalid@example.com").await;

    let (status, body) = app
        .request("POST", "/api/recipe/tags", Some(&token), Some(json!({ "name": "" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["name"].is_array());

    let (status, body) = app
        .request("POST", "/api/recipe/tags", Some(&token), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["name"][0], "This field is required.");

    let long = "x".repeat(256);
    let (status, _) = app
        .request(
            "POST",
            "/api/recipe/ingredients",
            Some(&token),
            Some(json!({ "name": long })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_duplicate_names_are_allowed() {
    let app = TestApp::new();
    let token = app.login("dupes@example.com").await;
    let a = app.create_ingredient(&token, "Salt").await;
    let b = app.create_ingredient(&token, "Salt").await;
    assert_ne!(a, b);

    let (_, body) = app
        .request("GET", "/api/recipe/ingredients", Some(&token), None)
        .await;
    assert_eq!(body, json!([{ "id": b, "name": "Salt" }, { "id": a, "name": "Salt" }]));
}

#[tokio::test]
async fn test_ingredients_limited_to_user() {
    let app = TestApp::new();
    let other = app.login("other2@example.com").await;
    app.create_ingredient(&other, "Vinegar").await;

    let token = app.login("cook@example.com").await;
    let kale = app.create_ingredient(&token, "Kale").await;

    let (status, body) = app
        .request("GET", "/api/recipe/ingredients", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{ "id": kale, "name": "Kale" }]));
}

#[tokio::test]
async fn test_unsupported_method() {
    let app = TestApp::new();
    let token = app.login("method@example.com").await;
    let (status, _) = app
        .request("DELETE", "/api/recipe/tags", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}
