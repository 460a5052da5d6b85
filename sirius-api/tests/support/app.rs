//! In-process test application.
//!
//! Wires the real router over an instrumented in-memory store and a chosen
//! cache backend. Requests go through `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use sirius_api::{
    create_api_router, generate_jwt_token, ApiConfig, AuthConfig, CachedCatalog, FixedClock,
    JwtSecret,
};
use sirius_core::{Role, UserId};
use sirius_storage::{CacheBackend, CacheConfig, CacheKeyBuilder, ReadThroughCache};
use sirius_test_utils::{CountingStore, RecordingCacheBackend};
use tower::ServiceExt;

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// 2024-01-01T00:00:00Z, inside every issued token's lifetime.
const TEST_NOW: i64 = 1_704_067_200;

pub struct TestApp {
    pub router: Router,
    pub store: Arc<CountingStore>,
    pub catalog: CachedCatalog,
    auth: AuthConfig,
}

/// Response status with its JSON body (`Null` when empty).
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestResponse {
    pub fn json<T: DeserializeOwned>(&self) -> TestResult<T> {
        Ok(serde_json::from_value(self.body.clone())?)
    }

    pub fn error_code(&self) -> Option<&str> {
        self.body.get("code").and_then(Value::as_str)
    }
}

impl TestApp {
    /// App over a working in-memory cache that records evictions.
    pub fn new() -> TestResult<Self> {
        Self::with_backend(Arc::new(RecordingCacheBackend::new()))
    }

    pub fn with_backend(backend: Arc<dyn CacheBackend>) -> TestResult<Self> {
        let store = Arc::new(CountingStore::new());
        let cache = ReadThroughCache::new(backend, CacheKeyBuilder::default(), CacheConfig::new());
        let catalog = CachedCatalog::new(store.clone(), cache);

        let auth = AuthConfig::default()
            .with_secret(JwtSecret::new(
                "integration_test_secret_that_is_long_enough".to_string(),
            )?)
            .with_clock(Arc::new(FixedClock(TEST_NOW)));

        let router = create_api_router(catalog.clone(), &ApiConfig::default(), auth.clone())?;
        Ok(Self {
            router,
            store,
            catalog,
            auth,
        })
    }

    pub fn token(&self, user_id: i64, role: Role) -> TestResult<String> {
        Ok(generate_jwt_token(&self.auth, UserId::new(user_id), role)?)
    }

    pub fn admin(&self) -> TestResult<String> {
        self.token(1, Role::Administrator)
    }

    pub fn staff(&self) -> TestResult<String> {
        self.token(2, Role::Staff)
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResult<TestResponse> {
        match body {
            Some(json) => {
                let bytes = serde_json::to_vec(&json)?;
                self.send_raw(method, uri, token, Some("application/json"), bytes)
                    .await
            }
            None => self.send_raw(method, uri, token, None, Vec::new()).await,
        }
    }

    /// Send an arbitrary body, optionally without a content type.
    pub async fn send_raw(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        content_type: Option<&str>,
        body: impl Into<Vec<u8>>,
    ) -> TestResult<TestResponse> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        let request = builder.body(Body::from(body.into()))?;

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        Ok(TestResponse { status, body })
    }

    pub async fn get(&self, uri: &str) -> TestResult<TestResponse> {
        self.send(Method::GET, uri, None, None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> TestResult<TestResponse> {
        self.send(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> TestResult<TestResponse> {
        self.send(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> TestResult<TestResponse> {
        self.send(Method::DELETE, uri, Some(token), None).await
    }
}
