use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::rest::extract::{AppJson, AppPath};
use crate::auth::AuthUser;
use crate::engine::presence;
use crate::error::AppError;
use crate::models::driver::{DriverLocation, DriverLocationView, DriverPresence, DriverProfile};
use crate::models::identity::Role;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/drivers/me/status", get(get_status).post(set_status))
        .route("/drivers/me/heartbeat", post(heartbeat))
        .route("/drivers/me/location", post(update_location))
        .route("/drivers/:id", get(get_driver))
        .route("/drivers/:id/location", get(get_location))
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub online: bool,
}

#[derive(Deserialize)]
pub struct LocationRequest {
    pub lat: f64,
    #[serde(alias = "lon")]
    pub lng: f64,
    #[serde(alias = "acc")]
    pub accuracy: Option<f64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatResponse {
    pub ok: bool,
    pub last_seen_at: DateTime<Utc>,
}

async fn get_status(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<DriverPresence>, AppError> {
    let driver = user.require(Role::Driver)?;
    Ok(Json(presence::presence(&state, driver.id)))
}

async fn set_status(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(payload): AppJson<StatusRequest>,
) -> Result<Json<DriverPresence>, AppError> {
    let driver = user.require(Role::Driver)?;
    Ok(Json(presence::set_online(&state, driver.id, payload.online)))
}

async fn heartbeat(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<HeartbeatResponse>, AppError> {
    let driver = user.require(Role::Driver)?;
    Ok(Json(HeartbeatResponse {
        ok: true,
        last_seen_at: presence::heartbeat(&state, driver.id),
    }))
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(payload): AppJson<LocationRequest>,
) -> Result<Json<DriverLocation>, AppError> {
    let driver = user.require(Role::Driver)?;
    Ok(Json(presence::update_location(
        &state,
        driver.id,
        payload.lat,
        payload.lng,
        payload.accuracy,
    )?))
}

async fn get_driver(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<DriverProfile>, AppError> {
    Ok(Json(state.driver_profile(id)))
}

async fn get_location(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<DriverLocationView>, AppError> {
    Ok(Json(presence::driver_location(&state, id)?))
}
