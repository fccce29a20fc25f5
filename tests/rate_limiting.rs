//! Integration tests for rate limiting.

mod common;

use common::*;
use reqwest::StatusCode;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn test_requests_pass_when_rate_limiting_is_disabled() {
    let app = TestApp::spawn().await;

    // The test config disables limiting, so nothing should be rejected.
    for _ in 0..20 {
        let response = app.get_public("/health").await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
#[serial]
async fn test_activation_endpoint_is_reachable_behind_its_limiter() {
    let app = TestApp::spawn().await;

    for _ in 0..5 {
        let response = app.activate("NO-SUCH-CODE").await;
        assert!(
            response.status() == StatusCode::NOT_FOUND
                || response.status() == StatusCode::TOO_MANY_REQUESTS
        );
    }
}
