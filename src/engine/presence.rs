//! Driver presence and live location.
//!
//! Presence is what the driver app reports about itself: an online flag, a
//! heartbeat that refreshes `last_seen_at`, and its latest position. It is
//! independent of the event stream; an open stream only counts as a heartbeat.

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::is_on_globe;
use crate::models::driver::{DriverLocation, DriverLocationView, DriverPresence};
use crate::models::order::GeoPoint;
use crate::state::AppState;

pub fn presence(state: &AppState, driver_id: Uuid) -> DriverPresence {
    state.driver_profile(driver_id).presence()
}

/// Goes online or offline. Either way the driver was just seen.
pub fn set_online(state: &AppState, driver_id: Uuid, online: bool) -> DriverPresence {
    let now = Utc::now();
    let presence = state.with_driver(driver_id, |profile| {
        profile.online = online;
        profile.last_seen_at = Some(now);
        profile.presence()
    });

    debug!(driver_id = %driver_id, online, "driver presence changed");
    presence
}

pub fn heartbeat(state: &AppState, driver_id: Uuid) -> DateTime<Utc> {
    let now = Utc::now();
    state.with_driver(driver_id, |profile| profile.last_seen_at = Some(now));
    now
}

pub fn update_location(
    state: &AppState,
    driver_id: Uuid,
    lat: f64,
    lng: f64,
    accuracy: Option<f64>,
) -> Result<DriverLocation, AppError> {
    let point = GeoPoint {
        name: None,
        lat,
        lng,
    };
    if !is_on_globe(&point) {
        return Err(AppError::Validation("lat/lng out of range".to_string()));
    }
    if accuracy.is_some_and(|acc| !acc.is_finite() || acc < 0.0) {
        return Err(AppError::Validation("accuracy must be >= 0".to_string()));
    }

    let now = Utc::now();
    let location = DriverLocation {
        lat,
        lng,
        accuracy,
        recorded_at: now,
    };
    state.with_driver(driver_id, |profile| {
        profile.location = Some(location.clone());
        profile.last_seen_at = Some(now);
    });

    Ok(location)
}

/// Last known position of a driver this service has seen.
pub fn driver_location(state: &AppState, driver_id: Uuid) -> Result<DriverLocationView, AppError> {
    state
        .find_driver(driver_id)
        .map(|profile| DriverLocationView::from(&profile))
        .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))
}
