//! Shared fixtures for the API integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use polls_api::{
    adapters::InMemoryDb,
    config::{AdminConfig, Config},
    web::{router, state::AppState},
};
use polls_core::{ports::DatabaseService, NewQuestion, QuestionDetail, RecencyWindow};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub const STAFF_USERNAME: &str = "staff";
pub const PASSWORD: &str = "c0rrect-h0rse";

/// Create a test configuration.
pub fn create_test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:3000".parse().unwrap(),
        database_url: "memory://".to_string(),
        db_max_connections: 1,
        log_level: tracing::Level::INFO,
        recency_window: RecencyWindow::default(),
        session_ttl: Duration::days(30),
        cookie_secure: false,
        cors_origin: "http://localhost:3000".to_string(),
        admin: AdminConfig {
            site_title: "Admin Panel".to_string(),
            staff_usernames: [STAFF_USERNAME.to_string()].into_iter().collect(),
        },
    }
}

pub struct TestApp {
    pub db: Arc<InMemoryDb>,
    pub state: Arc<AppState>,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let db = Arc::new(InMemoryDb::new());
        let state = Arc::new(AppState::new(db.clone(), Arc::new(create_test_config())));
        let router = router(state.clone());
        Self { db, state, router }
    }

    /// Creates a question published `days` from now (negative is past).
    pub async fn create_question(&self, text: &str, days: i64, choices: &[&str]) -> QuestionDetail {
        self.state
            .polls
            .create_question(NewQuestion {
                text: text.to_string(),
                publication_time: Utc::now() + Duration::days(days),
                choices: choices.iter().map(|c| c.to_string()).collect(),
            })
            .await
            .unwrap()
    }

    /// Registers `username` and opens a session for it without going
    /// through the password forms. Returns the `Cookie` header value.
    pub async fn signed_in_cookie(&self, username: &str) -> String {
        let user = self.db.create_user(username, "not-a-real-hash").await.unwrap();
        let session_id = Uuid::new_v4().to_string();
        self.db
            .create_auth_session(&session_id, user.user_id, Utc::now() + Duration::days(1))
            .await
            .unwrap();
        format!("session={}", session_id)
    }

    pub async fn vote_counts(&self, question_id: i64) -> Vec<i64> {
        self.db
            .get_choices_for_question(question_id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.vote_count)
            .collect()
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(&self, uri: &str, body: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap()).await
    }

    pub async fn send_json(
        &self,
        method: &str,
        uri: &str,
        body: Value,
        cookie: Option<&str>,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap()).await
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("redirect without Location")
        .to_str()
        .unwrap()
}

pub fn assert_redirect(response: &Response<Body>, to: &str) {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(response), to);
}

pub fn question_texts(index: &Value) -> Vec<String> {
    index["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["text"].as_str().unwrap().to_string())
        .collect()
}
