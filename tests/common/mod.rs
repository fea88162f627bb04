#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use learnhub_api::app::{app, AppSettings, AppState};
use learnhub_api::auth::{generate_jwt, AuthGate, Claims, JwtClaimResolver, Role};
use learnhub_api::progress::{CatalogTotals, MemoryStore};

pub const SECRET: &str = "integration-test-secret";
pub const COOKIE: &str = "learnhub.session-token";

/// In-process router over in-memory stores
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    pub fn new(totals: CatalogTotals) -> Self {
        Self::with_settings(totals, AppSettings::default())
    }

    pub fn with_settings(totals: CatalogTotals, settings: AppSettings) -> Self {
        let store = Arc::new(MemoryStore::with_catalog(totals));
        let state = AppState {
            gate: AuthGate::new(Arc::new(JwtClaimResolver::new(SECRET, COOKIE))),
            progress: store.clone(),
            catalog: store.clone(),
            settings,
        };
        Self { router: app(state), store }
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<(StatusCode, Value)> {
        self.send(Method::GET, path, token, None).await
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> Result<(StatusCode, Value)> {
        self.send(Method::POST, path, token, Some(body)).await
    }

    pub async fn send(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };

        self.request(request).await
    }

    pub async fn request(&self, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, body))
    }
}

pub fn token(subject: &str, role: Role) -> String {
    generate_jwt(&Claims::new(subject, role, 1), SECRET).expect("sign test token")
}

pub fn expired_token(subject: &str, role: Role) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims { sub: subject.to_string(), role, exp: now - 60, iat: now - 3600 };
    generate_jwt(&claims, SECRET).expect("sign test token")
}
