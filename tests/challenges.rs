//! Challenge assignment, NGO opt-in and progress.

mod common;

use common::{create_test_user, TestApp};
use serde_json::{json, Value};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn assign_random_is_idempotent_while_active() {
    let app = TestApp::spawn().await;
    app.seed_template("Spot a heron", 3, 2);
    let user = create_test_user(&app).await;

    let first = app
        .post("/api/challenges/assign-random", &user.access_token, json!({}))
        .await;
    assert_eq!(first.status().as_u16(), 201);
    let first: Value = first.json().await.unwrap();
    assert_eq!(first["assigned"], true);
    assert_eq!(first["challenge"]["status"], "active");
    assert_eq!(first["challenge"]["progress"], 0);
    assert!(first["challenge"]["template"]["title"].is_string());

    let second = app
        .post("/api/challenges/assign-random", &user.access_token, json!({}))
        .await;
    assert_eq!(second.status().as_u16(), 200);
    let second: Value = second.json().await.unwrap();
    assert_eq!(second["assigned"], false);
    assert_eq!(second["challenge"]["id"], first["challenge"]["id"]);
}

#[tokio::test]
#[serial]
async fn progress_completes_and_awards_points() {
    let app = TestApp::spawn().await;
    app.seed_template("Count frogs", 1, 2);
    let user = create_test_user(&app).await;

    let assigned: Value = app
        .post("/api/challenges/assign-random", &user.access_token, json!({}))
        .await
        .json()
        .await
        .unwrap();
    let id = assigned["challenge"]["id"].as_str().unwrap();
    let target = assigned["challenge"]["target"].as_i64().unwrap();
    let path = format!("/api/challenges/user/{}/progress", id);

    let response = app
        .post(&path, &user.access_token, json!({ "amount": target }))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["completed"], true);
    assert_eq!(body["challenge"]["status"], "completed");
    assert_eq!(body["challenge"]["progress"], target);

    let awarded = body["points_awarded"].as_i64().unwrap() as i32;
    if awarded > 0 {
        assert_eq!(app.total_points(user.id), Some(awarded));
    }

    let response = app.post(&path, &user.access_token, json!({ "amount": 1 })).await;
    assert_eq!(response.status().as_u16(), 409);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "CHALLENGE_NOT_ACTIVE");
}

#[tokio::test]
#[serial]
async fn progress_rejects_zero_and_foreign_challenges() {
    let app = TestApp::spawn().await;
    app.seed_template("Find moss", 1, 3);
    let owner = create_test_user(&app).await;
    let other = create_test_user(&app).await;

    let assigned: Value = app
        .post("/api/challenges/assign-random", &owner.access_token, json!({}))
        .await
        .json()
        .await
        .unwrap();
    let path = format!(
        "/api/challenges/user/{}/progress",
        assigned["challenge"]["id"].as_str().unwrap()
    );

    let response = app.post(&path, &owner.access_token, json!({ "amount": 0 })).await;
    assert_eq!(response.status().as_u16(), 400);

    let response = app.post(&path, &other.access_token, json!({ "amount": 1 })).await;
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
#[serial]
async fn ngo_challenge_join_flow() {
    let app = TestApp::spawn().await;
    let admin = app.create_admin().await;
    let user = create_test_user(&app).await;

    let response = app
        .post(
            "/api/challenges/ngo",
            &user.access_token,
            json!({
                "ngo_name": "Ocean Guardians",
                "title": "Beach clean-up",
                "description": "Collect litter",
                "target_count": 3,
                "duration_days": 7,
                "points_reward": 100
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 403);

    let response = app
        .post(
            "/api/challenges/ngo",
            &admin.access_token,
            json!({
                "ngo_name": "Ocean Guardians",
                "title": "Beach clean-up",
                "description": "Collect litter",
                "target_count": 3,
                "duration_days": 7,
                "points_reward": 100
            }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);
    let ngo: Value = response.json().await.unwrap();
    let ngo_id = ngo["id"].as_str().unwrap();

    let list: Value = app
        .get("/api/challenges/ngo", &user.access_token)
        .await
        .json()
        .await
        .unwrap();
    let listed = list
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["id"] == ngo_id)
        .expect("ngo challenge listed");
    assert_eq!(listed["joined"], false);

    let response = app
        .post(
            "/api/challenges/user",
            &user.access_token,
            json!({ "ngo_challenge_id": ngo_id }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);
    let joined: Value = response.json().await.unwrap();
    assert_eq!(joined["challenge_kind"], "ngo");
    assert_eq!(joined["target"], 3);
    assert_eq!(joined["template"]["ngo_name"], "Ocean Guardians");

    let response = app
        .post(
            "/api/challenges/user",
            &user.access_token,
            json!({ "ngo_challenge_id": ngo_id }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 409);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "ALREADY_JOINED");

    let mine: Value = app
        .get("/api/challenges/user?status=active", &user.access_token)
        .await
        .json()
        .await
        .unwrap();
    assert!(mine
        .as_array()
        .unwrap()
        .iter()
        .any(|c| c["id"] == joined["id"]));

    let response = app
        .get("/api/challenges/user?status=paused", &user.access_token)
        .await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
#[serial]
async fn joining_unknown_ngo_challenge_returns_404() {
    let app = TestApp::spawn().await;
    let user = create_test_user(&app).await;

    let response = app
        .post(
            "/api/challenges/user",
            &user.access_token,
            json!({ "ngo_challenge_id": uuid::Uuid::new_v4() }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "NGO_CHALLENGE_NOT_FOUND");
}

#[tokio::test]
#[serial]
async fn concurrent_assignment_creates_one_challenge() {
    let app = TestApp::spawn().await;
    app.seed_template("Listen for owls", 2, 1);
    let user = create_test_user(&app).await;

    let results = app
        .post_concurrently(
            "/api/challenges/assign-random",
            Some(&user.access_token),
            json!({}),
            10,
        )
        .await;

    assert!(results
        .iter()
        .all(|(status, _)| *status == 200 || *status == 201));
    let assigned = results
        .iter()
        .filter(|(_, body)| body["assigned"] == true)
        .count();
    assert_eq!(assigned, 1);

    let first_id = &results[0].1["challenge"]["id"];
    assert!(results
        .iter()
        .all(|(_, body)| &body["challenge"]["id"] == first_id));

    let active: Value = app
        .get("/api/challenges/user?status=active", &user.access_token)
        .await
        .json()
        .await
        .unwrap();
    let random_active = active
        .as_array()
        .unwrap()
        .iter()
        .filter(|c| c["challenge_kind"] == "unpredictable")
        .count();
    assert_eq!(random_active, 1);
}
