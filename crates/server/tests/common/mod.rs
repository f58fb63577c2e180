//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process router
//! with mock collaborators injected, so research sessions run end to end
//! without any external service.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use delver_core::{
    config::ServerConfig,
    testing::{MockExtractor, MockRefiner, MockSearchBackend},
    Config, ContentExtractor, Refiner, SearchBackend,
};
use delver_server::state::AppState;

/// Re-export fixtures for test convenience
pub use delver_core::testing::fixtures;

/// Test fixture for API testing with mock collaborators.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Shared state, for inspecting registered sessions
    pub state: Arc<AppState>,
    /// Mock search backend - configure links per query
    pub search: Arc<MockSearchBackend>,
    /// Mock extractor - configure page content per URL
    pub extractor: Arc<MockExtractor>,
    /// Mock refiner - queue improved targets and plans
    pub refiner: Arc<MockRefiner>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a fixture with all collaborators wired to mocks.
    pub fn new() -> Self {
        Self::build(true)
    }

    /// Create a fixture without collaborators, as a server with no
    /// search/extractor/refiner sections would run.
    pub fn unconfigured() -> Self {
        Self::build(false)
    }

    fn build(with_collaborators: bool) -> Self {
        let search = Arc::new(MockSearchBackend::new());
        let extractor = Arc::new(MockExtractor::new());
        let refiner = Arc::new(MockRefiner::new());

        let config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            research: fixtures::fast_research_config(),
            ..Config::default()
        };

        let state = if with_collaborators {
            AppState::new(
                config,
                Some(Arc::clone(&search) as Arc<dyn SearchBackend>),
                Some(Arc::clone(&extractor) as Arc<dyn ContentExtractor>),
                Some(Arc::clone(&refiner) as Arc<dyn Refiner>),
            )
        } else {
            AppState::new(config, None, None, None)
        };
        let state = Arc::new(state);

        let router = delver_server::api::create_router(Arc::clone(&state));

        Self {
            router,
            state,
            search,
            extractor,
            refiner,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Poll a session until it reaches a terminal state.
    pub async fn wait_for_terminal(&self, session_id: &str) -> Value {
        let path = format!("/api/v1/research/{}", session_id);
        for _ in 0..200 {
            let response = self.get(&path).await;
            let state = response.body["state"].as_str().unwrap_or_default();
            if matches!(state, "done" | "exhausted" | "canceled" | "failed") {
                return response.body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("session {} never reached a terminal state", session_id);
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
