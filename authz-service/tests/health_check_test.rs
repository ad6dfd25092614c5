//! Health endpoint integration tests.

mod common;

use axum::http::StatusCode;
use common::{expect_json, TestApp};

#[tokio::test]
#[ignore] // Requires running PostgreSQL
async fn health_check_reports_healthy() {
    let app = TestApp::spawn().await;

    let body = expect_json(app.get("/health").await, StatusCode::OK).await;

    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["postgres"], "up");
}
