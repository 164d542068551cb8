#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

use app_forge_server::{
    config::Config,
    create_app,
    database::MemoryStore,
    errors::{AppError, Result},
    handlers::AppState,
    services::{ModelClient, ModelRequest},
};

pub const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
];

/// Model client that answers every request with a canned document.
pub struct FakeModelClient {
    response: std::result::Result<String, String>,
    pub calls: AtomicUsize,
}

impl FakeModelClient {
    pub fn returning(document: Value) -> Self {
        Self {
            response: Ok(document.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ModelClient for FakeModelClient {
    async fn generate_json(&self, _request: ModelRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response
            .clone()
            .map_err(AppError::UpstreamGeneration)
    }
}

pub fn sample_specification() -> Value {
    json!({
        "appName": "Notes",
        "packageName": "com.example.notes",
        "mainActivity": "MainActivity",
        "pages": [
            { "name": "Home", "description": "list of notes", "composableFunction": "HomeScreen" },
            { "name": "Editor", "description": "edit a note", "composableFunction": "EditorScreen" }
        ],
        "firebaseIntegration": { "auth": false, "firestore": false, "storage": false },
        "dependencies": ["androidx.core:core-ktx:1.12.0"],
        "files": [
            {
                "path": "app/src/main/java/com/example/notes/MainActivity.kt",
                "content": "package com.example.notes\n\nclass MainActivity"
            },
            {
                "path": "app/src/main/java/com/example/notes/ui/HomeScreen.kt",
                "content": "package com.example.notes.ui\n"
            }
        ]
    })
}

pub struct TestApp {
    pub temp: TempDir,
    pub config: Config,
    pub store: Arc<MemoryStore>,
    pub router: Router,
}

impl TestApp {
    pub fn new(client: FakeModelClient) -> Self {
        let temp = tempfile::tempdir().unwrap();
        let config = Config::for_directory(temp.path());
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(config.clone(), store.clone(), store.clone(), Arc::new(client)).unwrap();

        Self {
            temp,
            config,
            store,
            router: create_app(state),
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    pub async fn send_json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, body) = self.send(request).await;
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, value)
    }

    /// Registers a user whose bearer token is `uid`.
    pub async fn register(&self, uid: &str) -> Value {
        let (status, user) = self
            .send_json(json_request(
                "POST",
                "/api/users",
                None,
                json!({ "email": format!("{}@example.com", uid), "name": uid, "firebaseUid": uid }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        user
    }

    /// Polls the project list until `project_id` leaves `generating`.
    pub async fn wait_for_terminal(&self, uid: &str, project_id: &str) -> Value {
        for _ in 0..200 {
            let (_, projects) = self
                .send_json(get_request("/api/projects", Some(uid)))
                .await;
            let project = projects
                .as_array()
                .unwrap()
                .iter()
                .find(|p| p["id"] == project_id)
                .cloned()
                .unwrap();
            if project["status"] != "generating" {
                return project;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("project {} never finished", project_id);
    }
}

pub fn generate_body() -> Value {
    json!({
        "appName": "Notes",
        "prompt": "A simple note taking app",
        "pages": [
            { "title": "Home", "description": "list of notes" },
            { "title": "Editor", "description": "edit a note" }
        ],
        "iconType": "ai_generated",
        "firebaseIntegration": { "auth": false, "firestore": false, "storage": false },
        "databaseIntegration": { "type": "none", "features": [] },
        "includeProductImages": false,
        "productImageCount": 0
    })
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    request("GET", uri, token)
}

pub fn request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

/// Builds a multipart body from text fields and an optional icon part.
pub fn multipart_request(
    uri: &str,
    token: &str,
    fields: &[(&str, String)],
    icon: Option<(&str, &[u8])>,
) -> Request<Body> {
    let boundary = "----app-forge-test-boundary";
    let mut body: Vec<u8> = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((content_type, data)) = icon {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"icon\"; filename=\"icon.png\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(body))
        .unwrap()
}
