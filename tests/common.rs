use std::io::Cursor;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use image::{ImageBuffer, ImageFormat, Rgb};
use recipe_api::{app::build_app, state::AppState, storage::FakeStorage};
use serde_json::{json, Value};
use tower::ServiceExt;

pub const BOUNDARY: &str = "recipe-api-test-boundary";

#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub storage: Arc<FakeStorage>,
}

#[allow(dead_code)]
impl TestApp {
    pub fn new() -> Self {
        let storage = Arc::new(FakeStorage::default());
        let state = AppState::fake_with_storage(storage.clone());
        Self {
            router: build_app(state.clone()),
            state,
            storage,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(body) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    pub async fn register(&self, email: &str, password: &str, name: &str) -> (StatusCode, Value) {
        self.request(
            "POST",
            "/api/user/create",
            None,
            Some(json!({ "email": email, "password": password, "name": name })),
        )
        .await
    }

    pub async fn token(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.request(
            "POST",
            "/api/user/token",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await
    }

    /// Registers `email` with a fixed password and returns a bearer token.
    pub async fn login(&self, email: &str) -> String {
        let (status, _) = self.register(email, "testpass123", "Test User").await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) = self.token(email, "testpass123").await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn create_tag(&self, token: &str, name: &str) -> i64 {
        let (status, body) = self
            .request("POST", "/api/recipe/tags", Some(token), Some(json!({ "name": name })))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    }

    pub async fn create_ingredient(&self, token: &str, name: &str) -> i64 {
        let (status, body) = self
            .request(
                "POST",
                "/api/recipe/ingredients",
                Some(token),
                Some(json!({ "name": name })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap()
    }

    pub async fn create_recipe(&self, token: &str, payload: Value) -> Value {
        let (status, body) = self
            .request("POST", "/api/recipe/recipes", Some(token), Some(payload))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }

    pub async fn upload(
        &self,
        token: &str,
        recipe_id: i64,
        field: &str,
        bytes: &[u8],
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/recipe/recipes/{recipe_id}/upload-image"))
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(field, "upload.png", bytes)))
            .unwrap();
        self.send(request).await
    }
}

pub fn multipart_body(field: &str, filename: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

#[allow(dead_code)]
pub fn png_bytes() -> Vec<u8> {
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(10, 10, Rgb([10, 120, 200]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

#[allow(dead_code)]
pub fn sample_recipe() -> Value {
    json!({
        "title": "Sample recipe",
        "time_minutes": 22,
        "price": "5.25",
    })
}
