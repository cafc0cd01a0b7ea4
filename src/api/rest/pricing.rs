use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::extract::{AppJson, AppPath};
use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::identity::Role;
use crate::pricing::{Promo, PromoKind, Tariff, TariffUpdate};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/pricing/public", get(get_tariff))
        .route("/pricing/admin", put(update_tariff))
        .route("/promos/admin", get(list_promos).post(create_promo))
        .route("/promos/admin/:id/toggle", post(toggle_promo))
        .route("/promos/admin/:id", delete(delete_promo))
}

#[derive(Deserialize)]
pub struct CreatePromoRequest {
    pub code: String,
    #[serde(rename = "type", default)]
    pub kind: PromoKind,
    pub value: f64,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

async fn get_tariff(State(state): State<Arc<AppState>>) -> Json<Tariff> {
    Json(state.pricing.tariff().await)
}

async fn update_tariff(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(payload): AppJson<TariffUpdate>,
) -> Result<Json<Tariff>, AppError> {
    user.require(Role::Admin)?;
    Ok(Json(state.pricing.update_tariff(payload).await?))
}

async fn list_promos(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<Promo>>, AppError> {
    user.require(Role::Admin)?;
    Ok(Json(state.pricing.list_promos()))
}

async fn create_promo(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(payload): AppJson<CreatePromoRequest>,
) -> Result<(StatusCode, Json<Promo>), AppError> {
    user.require(Role::Admin)?;
    let promo = state
        .pricing
        .create_promo(&payload.code, payload.kind, payload.value, payload.active)?;
    Ok((StatusCode::CREATED, Json(promo)))
}

async fn toggle_promo(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Promo>, AppError> {
    user.require(Role::Admin)?;
    Ok(Json(state.pricing.toggle_promo(id)?))
}

async fn delete_promo(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, AppError> {
    user.require(Role::Admin)?;
    state.pricing.delete_promo(id)?;
    Ok(StatusCode::NO_CONTENT)
}
