//! Species journeys, observations, the map and the leaderboard.

mod common;

use common::{create_test_user, TestApp};
use serde_json::{json, Value};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn starting_a_journey_grants_the_welcome_bonus_once() {
    let app = TestApp::spawn().await;
    let avatar = app.seed_avatar("Hawksbill turtle");
    let user = create_test_user(&app).await;

    let response = app.get("/api/species-journey", &user.access_token).await;
    assert_eq!(response.status().as_u16(), 404);

    let response = app
        .post(
            "/api/species-journey",
            &user.access_token,
            json!({ "species_avatar_id": avatar }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["total_points"], 50);
    assert_eq!(body["avatar"]["name"], "Hawksbill turtle");

    let response = app
        .post(
            "/api/species-journey",
            &user.access_token,
            json!({ "species_avatar_id": avatar }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 409);
    assert_eq!(app.total_points(user.id), Some(50));

    let history: Value = app
        .get("/api/species-journey/history", &user.access_token)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(history["pagination"]["total_count"], 1);
    assert_eq!(history["data"][0]["source"], "welcome");
    assert_eq!(history["data"][0]["balance_after"], 50);
}

#[tokio::test]
#[serial]
async fn unknown_avatar_returns_404() {
    let app = TestApp::spawn().await;
    let user = create_test_user(&app).await;

    let response = app
        .post(
            "/api/species-journey",
            &user.access_token,
            json!({ "species_avatar_id": uuid::Uuid::new_v4() }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
#[serial]
async fn observations_award_points_and_sum_exactly() {
    let app = TestApp::spawn().await;
    let user = create_test_user(&app).await;

    for i in 0..3 {
        let response = app
            .post(
                "/api/observations",
                &user.access_token,
                json!({
                    "species_name": "Eurasian otter",
                    "latitude": 51.5 + f64::from(i) * 0.01,
                    "longitude": -0.12
                }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201);
    }

    assert_eq!(app.total_points(user.id), Some(30));

    let response = app
        .post(
            "/api/observations",
            &user.access_token,
            json!({ "species_name": "Otter", "latitude": 95.0, "longitude": 0.0 }),
        )
        .await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
#[serial]
async fn map_clusters_once_there_are_enough_points() {
    let app = TestApp::spawn().await;
    let user = create_test_user(&app).await;

    // A dedicated corner of the globe keeps other tests' points out of the box.
    for i in 0..12 {
        app.post(
            "/api/observations",
            &user.access_token,
            json!({
                "species_name": "Snow petrel",
                "latitude": -75.1 - f64::from(i % 2) * 0.01,
                "longitude": 120.1
            }),
        )
        .await;
    }

    let bbox = "min_lat=-76&max_lat=-75&min_lng=120&max_lng=121";
    let body: Value = app
        .get(
            &format!("/api/observations/map?grid_size=0.5&{}", bbox),
            &user.access_token,
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["clustered"], true);
    let total: u64 = body["features"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| {
            assert_eq!(f["kind"], "cluster");
            f["count"].as_u64().unwrap()
        })
        .sum();
    assert!(total >= 12);

    for grid_size in ["0", "1e-300"] {
        let response = app
            .get(
                &format!("/api/observations/map?grid_size={}", grid_size),
                &user.access_token,
            )
            .await;
        assert_eq!(response.status().as_u16(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["code"], "INVALID_GRID_SIZE");
    }
}

#[tokio::test]
#[serial]
async fn leaderboard_ranks_and_reports_current_user() {
    let app = TestApp::spawn().await;
    let user = create_test_user(&app).await;

    app.post(
        "/api/observations",
        &user.access_token,
        json!({ "species_name": "Robin", "latitude": 10.0, "longitude": 10.0 }),
    )
    .await;

    let response = app
        .get("/api/leaderboard/naturalists?limit=500", &user.access_token)
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();

    let entries = body["entries"].as_array().unwrap();
    assert!(entries.len() <= 100);

    let points: Vec<i64> = entries
        .iter()
        .map(|e| e["total_points"].as_i64().unwrap())
        .collect();
    for (i, entry) in entries.iter().enumerate() {
        let greater = points.iter().filter(|p| **p > points[i]).count() as i64;
        assert_eq!(entry["rank"].as_i64().unwrap(), greater + 1);
    }
    assert!(points.windows(2).all(|w| w[0] >= w[1]));

    let current = &body["current_user"];
    assert_eq!(current["user_id"], user.id.to_string());
    assert_eq!(current["is_current_user"], true);
    assert_eq!(current["total_points"], 10);
    assert!(body["total_participants"].as_i64().unwrap() >= 1);
}

#[tokio::test]
#[serial]
async fn leaderboard_current_user_is_null_without_journey() {
    let app = TestApp::spawn().await;
    let user = create_test_user(&app).await;

    let body: Value = app
        .get("/api/leaderboard/naturalists", &user.access_token)
        .await
        .json()
        .await
        .unwrap();

    assert!(body["current_user"].is_null());
}

#[tokio::test]
#[serial]
async fn concurrent_observations_never_lose_points() {
    let app = TestApp::spawn().await;
    let user = create_test_user(&app).await;

    let results = app
        .post_concurrently(
            "/api/observations",
            Some(&user.access_token),
            json!({ "species_name": "Common swift", "latitude": 48.2, "longitude": 16.37 }),
            20,
        )
        .await;

    assert!(results.iter().all(|(status, _)| *status == 201));
    assert_eq!(app.total_points(user.id), Some(200));

    let history: Value = app
        .get("/api/species-journey/history?per_page=100", &user.access_token)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(history["pagination"]["total_count"], 20);
    let mut balances: Vec<i64> = history["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["balance_after"].as_i64().unwrap())
        .collect();
    balances.sort_unstable();
    let expected: Vec<i64> = (1..=20).map(|i| i * 10).collect();
    assert_eq!(balances, expected);
}
