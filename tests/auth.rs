//! Authentication integration tests: registration, login, refresh and the
//! auth middleware.

mod common;

use common::{create_test_user, TestApp, TEST_PASSWORD};
use serde_json::json;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn register_returns_tokens_and_user_role() {
    let app = TestApp::spawn().await;
    let email = TestApp::unique_email();

    let response = app
        .post_public(
            "/api/auth/register",
            json!({ "email": email, "password": TEST_PASSWORD, "full_name": "Ada" }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["user"]["email"], email.as_str());
    assert_eq!(body["user"]["role"], "User");
    assert_eq!(body["user"]["is_premium"], false);
    assert!(body["access_token"].as_str().is_some());
    assert!(body["refresh_token"].as_str().is_some());
}

#[tokio::test]
#[serial]
async fn register_rejects_invalid_email_and_short_password() {
    let app = TestApp::spawn().await;

    let response = app
        .post_public(
            "/api/auth/register",
            json!({ "email": "not-an-email", "password": TEST_PASSWORD }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);

    let response = app
        .post_public(
            "/api/auth/register",
            json!({ "email": TestApp::unique_email(), "password": "short" }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "PASSWORD_POLICY_VIOLATION");
}

#[tokio::test]
#[serial]
async fn register_returns_409_for_duplicate_email() {
    let app = TestApp::spawn().await;
    let user = create_test_user(&app).await;

    let response = app
        .post_public(
            "/api/auth/register",
            json!({ "email": user.email, "password": TEST_PASSWORD }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 409);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "USER_EXISTS");
}

#[tokio::test]
#[serial]
async fn register_rejects_guest_domain_addresses() {
    let app = TestApp::spawn().await;

    let response = app
        .post_public(
            "/api/auth/register",
            json!({ "email": "guest_0123456789abcdef@habitat.guest", "password": TEST_PASSWORD }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "RESERVED_EMAIL");
}

#[tokio::test]
#[serial]
async fn login_returns_401_for_wrong_password() {
    let app = TestApp::spawn().await;
    let user = create_test_user(&app).await;

    let response = app
        .post_public(
            "/api/auth/login",
            json!({ "email": user.email, "password": "WrongPassword1" }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
#[serial]
async fn login_returns_403_for_inactive_account() {
    use diesel::prelude::*;
    use habitat::schema::users;

    let app = TestApp::spawn().await;
    let user = create_test_user(&app).await;
    diesel::update(users::table.find(user.id))
        .set(users::is_active.eq(false))
        .execute(&mut app.conn())
        .unwrap();

    let response = app
        .post_public(
            "/api/auth/login",
            json!({ "email": user.email, "password": TEST_PASSWORD }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
#[serial]
async fn refresh_rotates_and_old_token_stops_working() {
    let app = TestApp::spawn().await;
    let user = create_test_user(&app).await;

    let response = app
        .post_public(
            "/api/auth/refresh",
            json!({ "refresh_token": user.refresh_token }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    let new_access = body["access_token"].as_str().unwrap().to_string();

    let me = app.get("/api/auth/me", &new_access).await;
    assert_eq!(me.status().as_u16(), 200);

    let replay = app
        .post_public(
            "/api/auth/refresh",
            json!({ "refresh_token": user.refresh_token }),
        )
        .await;
    assert_eq!(replay.status().as_u16(), 401);
}

#[tokio::test]
#[serial]
async fn logout_invalidates_refresh_token() {
    let app = TestApp::spawn().await;
    let user = create_test_user(&app).await;

    let response = app
        .post_public(
            "/api/auth/logout",
            json!({ "refresh_token": user.refresh_token }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 204);

    let response = app
        .post_public(
            "/api/auth/refresh",
            json!({ "refresh_token": user.refresh_token }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
#[serial]
async fn protected_routes_require_a_valid_bearer_token() {
    let app = TestApp::spawn().await;

    let response = app.get_public("/api/auth/me").await;
    assert_eq!(response.status().as_u16(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "MISSING_AUTH_HEADER");

    let response = app.get("/api/auth/me", "not-a-jwt").await;
    assert_eq!(response.status().as_u16(), 401);

    let response = app
        .client
        .get(format!("{}/api/auth/me", app.base_url))
        .header("Authorization", "Token abc")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
#[serial]
async fn me_returns_current_user() {
    let app = TestApp::spawn().await;
    let user = create_test_user(&app).await;

    let response = app.get("/api/auth/me", &user.access_token).await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["id"], user.id.to_string());
    assert_eq!(body["full_name"], "Test User");
}

#[tokio::test]
#[serial]
async fn admin_routes_reject_regular_users() {
    let app = TestApp::spawn().await;
    let user = create_test_user(&app).await;

    let response = app.get("/api/guest-access/campaigns", &user.access_token).await;

    assert_eq!(response.status().as_u16(), 403);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "ADMIN_REQUIRED");
}
