use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::{config::Config, db::Database, otp, routes::create_router, state::AppState};

/// Code stored by [`force_known_otp`].
pub const KNOWN_CODE: &str = "123456";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

pub async fn setup() -> TestApp {
    let db = Database::in_memory().await.unwrap();
    db.run_migrations().await.unwrap();

    let mut config = Config::default();
    config.smtp.dev_log = String::new();
    config.auth.jwt_secret = "test-secret".to_string();

    let state = AppState::new(db, config);
    TestApp {
        router: create_router(state.clone()),
        state,
    }
}

impl TestApp {
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call(Method::DELETE, uri, token, None).await
    }

    pub async fn register(&self, email: &str) -> (StatusCode, Value) {
        self.post(
            "/auth/register",
            None,
            json!({ "email": email, "password": "pw123" }),
        )
        .await
    }

    /// Replace the user's pending code with [`KNOWN_CODE`], valid for ten minutes.
    pub async fn force_known_otp(&self, email: &str) -> i64 {
        let user = self.state.db.get_user_by_email(email).await.unwrap().unwrap();
        let hash = otp::hash_secret(KNOWN_CODE).unwrap();
        self.state
            .db
            .upsert_otp(user.id, &hash, Utc::now() + Duration::minutes(10))
            .await
            .unwrap();
        user.id
    }

    pub async fn login(&self, email: &str) -> (StatusCode, Value) {
        self.post(
            "/auth/login",
            None,
            json!({ "email": email, "password": "pw123" }),
        )
        .await
    }

    /// Register, verify and log in; returns (token, user id).
    pub async fn signup(&self, email: &str) -> (String, i64) {
        let (status, _) = self.register(email).await;
        assert_eq!(status, StatusCode::CREATED);
        let user_id = self.force_known_otp(email).await;
        let (status, _) = self
            .post("/auth/verify-otp", None, json!({ "email": email, "otp": KNOWN_CODE }))
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = self.login(email).await;
        assert_eq!(status, StatusCode::OK);
        (body["token"].as_str().unwrap().to_string(), user_id)
    }

    pub async fn create_task(&self, token: &str, title: &str) -> i64 {
        let (status, body) = self
            .post("/tasks", Some(token), json!({ "title": title, "description": "" }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["task"]["id"].as_i64().unwrap()
    }
}
