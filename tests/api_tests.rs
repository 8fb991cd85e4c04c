//! HTTP API tests against the axum router

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::{Fixture, DARK_SUNDAY_PROFILE};
use depg::api::{router, AppState};
use depg::cli::load_app_state;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn app(fixture: &Fixture) -> (Router, Arc<AppState>) {
    let state = Arc::new(load_app_state(&fixture.config_path, false).unwrap());
    (router(Arc::clone(&state)), state)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_form(uri: &str, form: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════
// FORM ENDPOINTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_get_catalog() {
    let fixture = Fixture::new();
    let (app, _) = app(&fixture);

    let (status, body) = send(app, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["properties"]["sheet_name"], "Generator");

    let dropdowns = body["data"]["dropdowns"].as_array().unwrap();
    assert_eq!(dropdowns.len(), 3);
    assert_eq!(dropdowns[0]["coord"], "B3");
    assert_eq!(dropdowns[0]["category"], "Roast");
    assert_eq!(dropdowns[0]["values"][2], "Dark");
    assert_eq!(dropdowns[0]["selected_idx"], 0);
}

#[tokio::test]
async fn test_post_generates_profile() {
    let fixture = Fixture::new();
    let (app, _) = app(&fixture);

    let (status, body) = send(
        app,
        post_form("/", "B3=Dark&B4=20&profile_title=Sunday+Shot&ignored=1"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["profile"], DARK_SUNDAY_PROFILE);
    assert_eq!(body["data"]["notes"], "Roast: Dark, Dose: 20, Basket: ");

    let dropdowns = body["data"]["dropdowns"].as_array().unwrap();
    assert_eq!(dropdowns[0]["selected_idx"], 2);
    assert_eq!(dropdowns[1]["selected_idx"], 1);
    assert_eq!(dropdowns[2]["selected_idx"], 0);
}

#[tokio::test]
async fn test_post_does_not_leak_selection_into_get() {
    let fixture = Fixture::new();
    let (app, _) = app(&fixture);

    send(app.clone(), post_form("/", "B3=Dark")).await;
    let (_, body) = send(app, get("/")).await;
    assert_eq!(body["data"]["dropdowns"][0]["selected_idx"], 0);
}

#[tokio::test]
async fn test_post_evaluation_error_is_422() {
    let fixture = Fixture::new();
    let (app, _) = app(&fixture);

    let (status, body) = send(app, post_form("/", "B3=Blonde")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("#N/A"));
    assert!(body.get("data").is_none());
}

// ═══════════════════════════════════════════════════════════════════════════
// INFO AND ADMIN ENDPOINTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_health_and_version() {
    let fixture = Fixture::new();
    let (app, _) = app(&fixture);

    let (status, body) = send(app.clone(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["dropdowns"], 3);

    let (_, body) = send(app, get("/version")).await;
    assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
    assert!(body["data"]["spreadsheet"]
        .as_str()
        .unwrap()
        .ends_with("profile_generator.xlsx"));
}

#[tokio::test]
async fn test_rebuild_swaps_cache() {
    let fixture = Fixture::new();
    let (app, state) = app(&fixture);

    // Serve a stale, hand-edited cache
    let mut stale = (*state.cache()).clone();
    stale.dropdown_data.remove("B5");
    state.replace_cache(stale);
    assert_eq!(state.cache().dropdown_data.len(), 2);

    let (status, body) = send(
        app,
        Request::builder()
            .method("POST")
            .uri("/api/v1/cache/rebuild")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["dropdowns"], 3);
    assert_eq!(body["data"]["sheet_name"], "Generator");
    assert_eq!(state.cache().dropdown_data.len(), 3);
}

#[tokio::test]
async fn test_unknown_route() {
    let fixture = Fixture::new();
    let (app, _) = app(&fixture);
    let response = app.oneshot(get("/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
