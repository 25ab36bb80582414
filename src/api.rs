//! HTTP API handlers for the energy ledger.
//!
//! Handlers read a household snapshot from [`Storage`], hand it to the
//! accounting engine with the request time, and serialize the result.
//!
//! # Endpoints
//!
//! - `GET /homes/:home_id/dashboard` - Live load, today's energy, hourly series and longest-running devices
//! - `GET /homes/:home_id/report` - Today's energy and cost with month and year extrapolations
//! - `GET /homes/:home_id/savings` - Baseline-versus-savings projection
//! - `POST /devices/:device_id/toggle` - Flip a device's power switch
//! - `DELETE /devices/:device_id` - Remove a device and its history
//! - `GET /health` - Health check

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use chrono::Utc;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

use crate::aggregation::{dashboard, energy_report};
use crate::cost::{SavingsAssumptions, SavingsProjection, project_savings};
use crate::error::StorageError;
use crate::model::{DashboardResponse, DeviceEvent, EnergyReport, Home, Household};
use crate::storage::Storage;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub savings: Arc<SavingsAssumptions>,
}

impl AppState {
    pub fn new(storage: Storage, savings: SavingsAssumptions) -> Self {
        Self {
            storage,
            savings: Arc::new(savings),
        }
    }
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/homes/:home_id/dashboard", get(get_dashboard))
        .route("/homes/:home_id/report", get(get_report))
        .route("/homes/:home_id/savings", get(get_savings))
        .route("/devices/:device_id/toggle", post(toggle_device))
        .route("/devices/:device_id", delete(delete_device))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn status_for(error: &StorageError) -> StatusCode {
    match error {
        StorageError::NotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn fetch_home(storage: &Storage, home_id: i64) -> Result<Home, StatusCode> {
    match storage.get_home(home_id).await {
        Ok(Some(home)) => Ok(home),
        Ok(None) => {
            info!(home_id, "Home not found");
            Err(StatusCode::NOT_FOUND)
        }
        Err(e) => {
            warn!(home_id, error = %e, "Failed to load home");
            Err(status_for(&e))
        }
    }
}

async fn load_home(storage: &Storage, home_id: i64) -> Result<(Home, Household), StatusCode> {
    let home = fetch_home(storage, home_id).await?;

    match storage.load_household(home_id).await {
        Ok(household) => Ok((home, household)),
        Err(e) => {
            warn!(home_id, error = %e, "Failed to load household");
            Err(status_for(&e))
        }
    }
}

/// GET /homes/:home_id/dashboard - Dashboard bundle for a home.
///
/// # Response
///
/// ```json
/// {
///     "timestamp": "2025-03-14T14:25:00Z",
///     "summary": {"total_devices": 4, "on_count": 2, "current_load_watts": 1305, "kwh_today": 6.42},
///     "hourly_series": [0, 0, 120, ...],
///     "longest_running": [{"device_id": 3, "name": "AC", "type": "ac", "duration_label": "02:10:00", ...}]
/// }
/// ```
#[instrument(skip(state))]
pub async fn get_dashboard(
    State(state): State<AppState>,
    Path(home_id): Path<i64>,
) -> Result<Json<DashboardResponse>, StatusCode> {
    let (_, household) = load_home(&state.storage, home_id).await?;
    let response = dashboard(&household, Utc::now());

    info!(
        home_id,
        devices = response.summary.total_devices,
        load_watts = response.summary.current_load_watts,
        kwh_today = %response.summary.kwh_today,
        "Dashboard queried"
    );

    Ok(Json(response))
}

/// GET /homes/:home_id/report - Energy and cost report for a home.
///
/// Month-to-date and year-to-date costs extrapolate today's cost over the
/// elapsed days.
#[instrument(skip(state))]
pub async fn get_report(
    State(state): State<AppState>,
    Path(home_id): Path<i64>,
) -> Result<Json<EnergyReport>, StatusCode> {
    let (home, household) = load_home(&state.storage, home_id).await?;
    let report = energy_report(&home, &household, Utc::now());

    info!(
        home_id,
        kwh_today = %report.kwh_today,
        cost_today = %report.cost_today,
        currency = %report.currency,
        "Report queried"
    );

    Ok(Json(report))
}

/// GET /homes/:home_id/savings - Savings projection for a home.
#[instrument(skip(state))]
pub async fn get_savings(
    State(state): State<AppState>,
    Path(home_id): Path<i64>,
) -> Result<Json<SavingsProjection>, StatusCode> {
    let home = fetch_home(&state.storage, home_id).await?;
    let projection = project_savings(home.country.as_deref(), &home.pricing, &state.savings);

    info!(
        home_id,
        country = %projection.country_code,
        save_year = %projection.save_year_value,
        override_applied = projection.override_applied,
        "Savings queried"
    );

    Ok(Json(projection))
}

/// POST /devices/:device_id/toggle - Flip a device on or off.
///
/// Returns the event appended to the device's log.
#[instrument(skip(state))]
pub async fn toggle_device(
    State(state): State<AppState>,
    Path(device_id): Path<i64>,
) -> Result<Json<DeviceEvent>, StatusCode> {
    match state.storage.toggle_device(device_id, Utc::now()).await {
        Ok(event) => {
            info!(device_id, on = event.to, "Device toggled");
            Ok(Json(event))
        }
        Err(e) => {
            warn!(device_id, error = %e, "Failed to toggle device");
            Err(status_for(&e))
        }
    }
}

/// DELETE /devices/:device_id - Remove a device and its events.
#[instrument(skip(state))]
pub async fn delete_device(
    State(state): State<AppState>,
    Path(device_id): Path<i64>,
) -> StatusCode {
    match state.storage.delete_device(device_id).await {
        Ok(true) => {
            info!(device_id, "Device deleted");
            StatusCode::NO_CONTENT
        }
        Ok(false) => StatusCode::NOT_FOUND,
        Err(e) => {
            warn!(device_id, error = %e, "Failed to delete device");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// GET /health - Health check endpoint.
pub async fn health_check() -> StatusCode {
    StatusCode::OK
}
