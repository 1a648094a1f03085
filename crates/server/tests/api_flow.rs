//! End-to-end flow over the public API: register, track competitors,
//! start an ads-fetch job against a stub fetcher, poll it to completion,
//! and exercise admission control along the way.

use std::sync::Arc;
use std::time::Duration;

use adscope_db::Database;
use adscope_server::jobs::{AdsFetcher, FetchOutcome};
use adscope_server::{create_app, AppState, ServerConfig};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

/// Fetcher stub that always succeeds with a fixed count.
struct OkFetcher;

#[async_trait]
impl AdsFetcher for OkFetcher {
    async fn run_for_user(&self, _user_id: &str, _platform: &str) -> FetchOutcome {
        FetchOutcome {
            success: true,
            log: "ok".to_string(),
            ads_count: 42,
        }
    }
}

/// Fetcher stub that hangs until the test is over, keeping jobs running.
struct HangingFetcher;

#[async_trait]
impl AdsFetcher for HangingFetcher {
    async fn run_for_user(&self, _user_id: &str, _platform: &str) -> FetchOutcome {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        unreachable!("test fetcher should never complete");
    }
}

async fn state_with(fetcher: Arc<dyn AdsFetcher>) -> Arc<AppState> {
    let db = Database::new_in_memory().await.expect("in-memory DB");
    AppState::new(db, ServerConfig::for_tests(), fetcher)
}

fn request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Register a user and return their token.
async fn signup(app: &Router, email: &str) -> String {
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/auth/signup",
            None,
            Some(serde_json::json!({
                "name": "Ada",
                "email": email,
                "password": "hunter2hunter2",
                "confirmPassword": "hunter2hunter2",
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["token"]
        .as_str()
        .unwrap()
        .to_string()
}

async fn add_competitor(app: &Router, token: &str, name: &str) {
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/competitors",
            Some(token),
            Some(serde_json::json!({
                "name": name,
                "domain": format!("{}.example.com", name),
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

/// Poll the status endpoint until the job reaches a terminal state.
async fn poll_until_terminal(app: &Router, token: &str, job_id: &str) -> serde_json::Value {
    for _ in 0..100 {
        let response = app
            .clone()
            .oneshot(request(
                "GET",
                &format!("/api/ads-status/{}", job_id),
                Some(token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let snapshot = body_json(response).await;
        let status = snapshot["status"].as_str().unwrap();
        if status == "completed" || status == "failed" {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job {} never reached a terminal state", job_id);
}

#[tokio::test]
async fn test_full_fetch_flow() {
    let state = state_with(Arc::new(OkFetcher)).await;
    let app = create_app(state);

    let token = signup(&app, "ada@example.com").await;
    for name in ["acme", "globex", "initech"] {
        add_competitor(&app, &token, name).await;
    }

    // 3 competitors on the all-platforms scope: min(300, 3*30*4) = 300.
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/ads-refresh",
            Some(&token),
            Some(serde_json::json!({"platform": "all"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let started = body_json(response).await;
    assert_eq!(started["status"], "started");
    assert_eq!(started["estimated_time"], 300);
    assert_eq!(started["competitors_count"], 3);
    let job_id = started["job_id"].as_str().unwrap().to_string();

    let snapshot = poll_until_terminal(&app, &token, &job_id).await;
    assert_eq!(snapshot["status"], "completed");
    assert_eq!(snapshot["ads_fetched"], 42);
    assert_eq!(snapshot["progress"], 100.0);
    assert_eq!(snapshot["total_competitors"], 3);
    assert!(snapshot["duration_formatted"].is_string());

    // The finished job shows up in the user's listing and stats.
    let response = app
        .clone()
        .oneshot(request("GET", "/api/user-jobs", Some(&token), None))
        .await
        .unwrap();
    let listing = body_json(response).await;
    assert_eq!(listing["count"], 1);
    assert_eq!(listing["stats"]["completed"], 1);
    assert_eq!(listing["stats"]["total_ads_fetched"], 42);
}

#[tokio::test]
async fn test_admission_conflict_and_force() {
    let state = state_with(Arc::new(HangingFetcher)).await;
    let app = create_app(state);

    let token = signup(&app, "ada@example.com").await;
    add_competitor(&app, &token, "acme").await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/ads-refresh",
            Some(&token),
            Some(serde_json::json!({})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let first_job = body_json(response).await["job_id"]
        .as_str()
        .unwrap()
        .to_string();

    // Wait for the executor to claim the job.
    for _ in 0..100 {
        let response = app
            .clone()
            .oneshot(request(
                "GET",
                &format!("/api/ads-status/{}", first_job),
                Some(&token),
                None,
            ))
            .await
            .unwrap();
        if body_json(response).await["status"] == "running" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // A second request without force is rejected with the conflicting id.
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/ads-refresh",
            Some(&token),
            Some(serde_json::json!({})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let conflict = body_json(response).await;
    assert_eq!(conflict["code"], "JOB_ALREADY_RUNNING");
    assert_eq!(conflict["existing_jobs"][0], first_job);

    // With force, a new job is admitted regardless.
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/ads-refresh",
            Some(&token),
            Some(serde_json::json!({"force": true})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    // Cancelling the first job frees the admission slot.
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/cancel-job/{}", first_job),
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(request(
            "GET",
            &format!("/api/ads-status/{}", first_job),
            Some(&token),
            None,
        ))
        .await
        .unwrap();
    let snapshot = body_json(response).await;
    assert_eq!(snapshot["status"], "failed");
    assert_eq!(snapshot["progress"], 0.0);
    assert_eq!(snapshot["error_message"], "Cancelled by user");
}

#[tokio::test]
async fn test_disabled_fetcher_rejects_refresh_but_polling_works() {
    let state = state_with(Arc::new(adscope_server::jobs::DisabledFetcher)).await;
    let app = create_app(state);

    let token = signup(&app, "ada@example.com").await;

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/ads-refresh",
            Some(&token),
            Some(serde_json::json!({})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    // The rest of the surface stays up.
    let response = app
        .clone()
        .oneshot(request("GET", "/api/user-jobs", Some(&token), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
