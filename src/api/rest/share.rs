use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::Json;
use axum::Router;

use crate::api::rest::extract::AppPath;
use crate::error::AppError;
use crate::models::tracking::{Resolution, TrackingView};
use crate::state::AppState;
use crate::tracking;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/share/:token", get(resolve_share))
}

/// Unauthenticated: status and redirect only.
async fn resolve_share(
    State(state): State<Arc<AppState>>,
    AppPath(token): AppPath<String>,
) -> Result<Json<TrackingView>, AppError> {
    match tracking::resolve_link(&state, &token).await? {
        Resolution::Active(view) => Ok(Json(view)),
        Resolution::Expired => Err(AppError::Expired("tracking unavailable".to_string())),
    }
}
