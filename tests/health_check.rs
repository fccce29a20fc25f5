//! Health check endpoint integration tests.

mod common;

use common::TestApp;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn health_check_returns_ok() {
    let app = TestApp::spawn().await;

    let response = app.get_public("/health").await;

    assert_eq!(response.status().as_u16(), 200);
    let body = response.text().await.expect("Failed to read response body");
    assert_eq!(body, "OK");
}

#[tokio::test]
#[serial]
async fn readiness_reports_database() {
    let app = TestApp::spawn().await;

    let response = app.get_public("/health/ready").await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["checks"]["database"]["status"], "up");
    assert_eq!(body["checks"]["guest_cleanup"]["status"], "up");
}

#[tokio::test]
#[serial]
async fn unknown_route_returns_json_404() {
    let app = TestApp::spawn().await;

    let response = app.get_public("/nonexistent-endpoint").await;

    assert_eq!(response.status().as_u16(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
#[serial]
async fn openapi_document_is_served() {
    let app = TestApp::spawn().await;

    let response = app.get_public("/api-docs/openapi.json").await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["paths"]["/api/leaderboard/naturalists"].is_object());
}
