//! Router-level test harness
//!
//! Builds the full router over a fresh `MemoryStorage` and a temporary
//! uploads directory, with two seeded users.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use ptrack_api::collaborators::Collaborators;
use ptrack_api::config::ServiceSettings;
use ptrack_api::services::AudioStore;
use ptrack_api::AppState;
use ptrack_common::config::StorageBackend;
use ptrack_common::models::{NewUser, User};
use ptrack_common::{MemoryStorage, Storage};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub const BOUNDARY: &str = "ptrack-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub storage: Arc<dyn Storage>,
    pub alice: User,
    pub bob: User,
    /// Keeps the uploads directory alive
    pub root: TempDir,
}

async fn seed_user(storage: &dyn Storage, username: &str, display_name: &str) -> User {
    storage
        .create_user(NewUser {
            username: username.to_string(),
            display_name: display_name.to_string(),
            email: format!("{}@example.com", username),
            avatar: None,
        })
        .await
        .unwrap()
}

impl TestApp {
    pub async fn new(collaborators: Option<Collaborators>) -> Self {
        Self::with_settings(collaborators, ServiceSettings {
            storage: StorageBackend::Memory,
            ..ServiceSettings::default()
        })
        .await
    }

    pub async fn with_settings(
        collaborators: Option<Collaborators>,
        settings: ServiceSettings,
    ) -> Self {
        let root = TempDir::new().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let audio = AudioStore::new(root.path().join("uploads"));
        audio.ensure_dir().await.unwrap();

        let alice = seed_user(storage.as_ref(), "alice", "Alice").await;
        let bob = seed_user(storage.as_ref(), "bob", "Bob").await;

        let state = AppState::new(Arc::clone(&storage), audio, collaborators, settings, None);
        let router = ptrack_api::build_router(state.clone());

        Self {
            router,
            state,
            storage,
            alice,
            bob,
            root,
        }
    }

    pub fn uploads_dir(&self) -> std::path::PathBuf {
        self.root.path().join("uploads")
    }

    /// Send a request and decode the body as JSON (`Null` when empty)
    pub async fn request(&self, request: Request<Body>) -> (StatusCode, Value) {
        send(&self.router, request).await
    }

    pub async fn get(&self, uri: &str, user: &User) -> (StatusCode, Value) {
        self.request(
            Request::builder()
                .uri(uri)
                .header("x-user-id", user.id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn put_json(&self, uri: &str, user: &User, body: Value) -> (StatusCode, Value) {
        self.request(
            Request::builder()
                .method("PUT")
                .uri(uri)
                .header("x-user-id", user.id.to_string())
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn delete(&self, uri: &str, user: &User) -> (StatusCode, Value) {
        self.request(
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .header("x-user-id", user.id.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn upload(&self, user: &User, parts: &[MultipartPart<'_>]) -> (StatusCode, Value) {
        self.request(
            Request::builder()
                .method("POST")
                .uri("/voice-journals")
                .header("x-user-id", user.id.to_string())
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(multipart_body(parts)))
                .unwrap(),
        )
        .await
    }

    /// Upload a small audio payload with default metadata
    pub async fn upload_audio(&self, user: &User) -> Value {
        let (status, body) = self
            .upload(
                user,
                &[
                    MultipartPart::file("audio", "memo.webm", b"webm-audio-bytes"),
                    MultipartPart::text("title", "Morning thoughts"),
                    MultipartPart::text("duration", "42"),
                ],
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "upload failed: {}", body);
        body
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

/// One multipart form field
pub enum MultipartPart<'a> {
    Text { name: &'a str, value: &'a str },
    File { name: &'a str, file_name: &'a str, bytes: &'a [u8] },
}

impl<'a> MultipartPart<'a> {
    pub fn text(name: &'a str, value: &'a str) -> Self {
        MultipartPart::Text { name, value }
    }

    pub fn file(name: &'a str, file_name: &'a str, bytes: &'a [u8]) -> Self {
        MultipartPart::File { name, file_name, bytes }
    }
}

pub fn multipart_body(parts: &[MultipartPart<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            MultipartPart::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            MultipartPart::File { name, file_name, bytes } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name, file_name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}
