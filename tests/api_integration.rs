//! Integration tests for the energy ledger API endpoints.
//!
//! These tests verify the full request/response cycle through the HTTP API,
//! against an in-memory database seeded through [`Storage`].

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum_test::TestServer;
use chrono::{DateTime, TimeDelta, Utc};
use tower::ServiceExt;

use energy_ledger::api::{AppState, router};
use energy_ledger::cost::{HomePricing, SavingsAssumptions};
use energy_ledger::model::{DeviceState, SwitchState};
use energy_ledger::storage::{NewDevice, Storage};

struct Fixture {
    server: TestServer,
    home_id: i64,
    plug_id: i64,
}

/// One home priced at EUR 0.25/kWh with a 100 W plug switched on an hour ago.
async fn create_test_server() -> Fixture {
    let storage = Storage::new("sqlite::memory:").await.unwrap();

    let home_id = storage
        .insert_home("Flat", Some("LU"), Some(&HomePricing::new("EUR", 25)))
        .await
        .unwrap();
    let room_id = storage.insert_room(home_id, "Kitchen").await.unwrap();
    // Whole seconds, as the store keeps them.
    let switched_on =
        DateTime::from_timestamp((Utc::now() - TimeDelta::hours(1)).timestamp(), 0).unwrap();
    let plug_id = storage
        .insert_device(&NewDevice {
            room_id,
            name: "Kettle".to_string(),
            state: DeviceState::Plug(SwitchState { on: true }),
            rating_watts: 100,
            last_active: Some(switched_on),
        })
        .await
        .unwrap();

    let app = router(AppState::new(storage, SavingsAssumptions::default()));

    Fixture {
        server: TestServer::new(app).unwrap(),
        home_id,
        plug_id,
    }
}

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = create_test_server().await;

    let response = fixture.server.get("/health").await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_dashboard() {
    let fixture = create_test_server().await;

    let response = fixture
        .server
        .get(&format!("/homes/{}/dashboard", fixture.home_id))
        .await;

    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["summary"]["total_devices"], 1);
    assert_eq!(body["summary"]["on_count"], 1);
    assert_eq!(body["summary"]["current_load_watts"], 100);

    // At most an hour at 100 W, plus the seconds the request itself takes.
    let kwh_today = body["summary"]["kwh_today"].as_f64().unwrap();
    assert!((0.0..=0.1 + 1e-4).contains(&kwh_today), "{kwh_today}");

    assert_eq!(body["hourly_series"].as_array().unwrap().len(), 24);

    let longest = body["longest_running"].as_array().unwrap();
    assert_eq!(longest.len(), 1);
    assert_eq!(longest[0]["name"], "Kettle");
    assert_eq!(longest[0]["type"], "plug");
    assert_eq!(longest[0]["room"], "Kitchen");
    assert!(longest[0]["duration_seconds"].as_i64().unwrap() >= 3600);
}

#[tokio::test]
async fn test_dashboard_unknown_home() {
    let fixture = create_test_server().await;

    let response = fixture.server.get("/homes/999/dashboard").await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_report() {
    let fixture = create_test_server().await;

    let response = fixture
        .server
        .get(&format!("/homes/{}/report", fixture.home_id))
        .await;

    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["home_name"], "Flat");
    assert_eq!(body["currency"], "EUR");
    assert_eq!(body["price_cents_per_kwh"], 25);

    let kwh_today = body["kwh_today"].as_f64().unwrap();
    let cost_today = body["cost_today"].as_f64().unwrap();
    assert!((cost_today - kwh_today * 0.25).abs() < 1e-9);
    assert!(body["cost_ytd"].as_f64().unwrap() >= body["cost_mtd"].as_f64().unwrap());
}

#[tokio::test]
async fn test_savings() {
    let fixture = create_test_server().await;

    let response = fixture
        .server
        .get(&format!("/homes/{}/savings", fixture.home_id))
        .await;

    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["country_code"], "LU");
    assert_eq!(body["currency"], "EUR");
    assert_eq!(body["baseline_month_kwh"], 800.0);
    assert_eq!(body["override_applied"], false);
    let save_month_kwh = body["save_month_kwh"].as_f64().unwrap();
    assert!((save_month_kwh - 33.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_report_and_savings_unknown_home() {
    let fixture = create_test_server().await;

    fixture
        .server
        .get("/homes/999/report")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    fixture
        .server
        .get("/homes/999/savings")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_toggle_then_dashboard() {
    let fixture = create_test_server().await;

    let response = fixture
        .server
        .post(&format!("/devices/{}/toggle", fixture.plug_id))
        .await;

    response.assert_status_ok();

    let event: serde_json::Value = response.json();
    assert_eq!(event["device_id"], fixture.plug_id);
    assert_eq!(event["from"], true);
    assert_eq!(event["to"], false);

    let body: serde_json::Value = fixture
        .server
        .get(&format!("/homes/{}/dashboard", fixture.home_id))
        .await
        .json();
    assert_eq!(body["summary"]["on_count"], 0);
    assert_eq!(body["summary"]["current_load_watts"], 0);
    assert!(body["longest_running"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_toggle_unknown_device() {
    let fixture = create_test_server().await;

    let response = fixture.server.post("/devices/999/toggle").await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_device() {
    let fixture = create_test_server().await;
    let path = format!("/devices/{}", fixture.plug_id);

    fixture
        .server
        .delete(&path)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    fixture
        .server
        .delete(&path)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let body: serde_json::Value = fixture
        .server
        .get(&format!("/homes/{}/dashboard", fixture.home_id))
        .await
        .json();
    assert_eq!(body["summary"]["total_devices"], 0);
}

#[tokio::test]
async fn test_health_via_oneshot() {
    let storage = Storage::new("sqlite::memory:").await.unwrap();
    let app = router(AppState::new(storage, SavingsAssumptions::default()));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
