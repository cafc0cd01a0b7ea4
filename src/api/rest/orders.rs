use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::api::rest::extract::{AppJson, AppPath, AppQuery, JsonOrDefault};
use crate::auth::AuthUser;
use crate::engine::assignment::{self, FinalizeRequest};
use crate::engine::queries;
use crate::error::AppError;
use crate::models::driver::DriverStats;
use crate::models::identity::Role;
use crate::models::payment::PaymentRecord;
use crate::models::order::{GeoPoint, Order, OrderStatus, PendingOrderSummary, ReceiptPreference, TripRequest};
use crate::models::tracking::TrackingLink;
use crate::pricing::Discount;
use crate::state::AppState;
use crate::tracking;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/available", get(list_available))
        .route("/orders/driver/active", get(driver_active))
        .route("/orders/driver/stats", get(driver_stats))
        .route("/orders/client/recent", get(client_recent))
        .route("/orders/admin/list", get(admin_list))
        .route("/orders/admin/cancelled", get(admin_cancelled))
        .route("/orders/admin/payments", get(admin_payments))
        .route("/orders/admin/:id/apply-promo", post(apply_promo))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/accept", post(accept_order))
        .route("/orders/:id/start", post(start_order))
        .route("/orders/:id/complete", post(complete_order))
        .route("/orders/:id/cancel", post(cancel_order))
        .route("/orders/:id/finalize", post(finalize_order))
        .route("/orders/:id/rate", post(rate_order))
        .route("/orders/:id/share", post(share_order))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub start: Option<GeoPoint>,
    pub destination: Option<GeoPoint>,
    pub passengers: Option<u8>,
    pub bags: Option<u8>,
    pub bag_offer: Option<u64>,
    pub bag_description: Option<String>,
    pub accessible: Option<bool>,
    pub promo_code: Option<String>,
    pub price_estimate: Option<u64>,
}

#[derive(Deserialize, Default)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeBody {
    pub tip: Option<u64>,
    pub payment_method: Option<String>,
    pub receipt_requested: Option<ReceiptPreference>,
    pub receipt_email: Option<String>,
}

#[derive(Deserialize)]
pub struct RateRequest {
    pub rating: Value,
    pub review: Option<String>,
}

#[derive(Deserialize)]
pub struct ApplyPromoRequest {
    pub code: String,
}

#[derive(Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct AdminListParams {
    pub status: Option<OrderStatus>,
    pub limit: Option<usize>,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(payload): AppJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let client = user.require(Role::Client)?;

    let (Some(start), Some(destination)) = (payload.start, payload.destination) else {
        return Err(AppError::Validation(
            "start and destination are required".to_string(),
        ));
    };

    let trip = TripRequest {
        start,
        destination,
        passengers: payload.passengers.unwrap_or(1),
        bags: payload.bags.unwrap_or(0),
        bag_offer: payload.bag_offer,
        bag_description: payload.bag_description,
        accessible: payload.accessible.unwrap_or(false),
        promo_code: payload.promo_code,
        price_estimate: payload.price_estimate,
    };

    let order = assignment::create_order(&state, client.id, trip).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn list_available(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<PendingOrderSummary>>, AppError> {
    user.require(Role::Driver)?;
    Ok(Json(queries::list_pending(&state).await?))
}

async fn driver_active(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Option<Order>>, AppError> {
    let driver = user.require(Role::Driver)?;
    Ok(Json(queries::driver_active_order(&state, driver.id).await?))
}

async fn driver_stats(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<DriverStats>, AppError> {
    let driver = user.require(Role::Driver)?;
    Ok(Json(queries::driver_stats(&state, driver.id).await?))
}

async fn client_recent(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppQuery(params): AppQuery<LimitParams>,
) -> Result<Json<Vec<Order>>, AppError> {
    let client = user.require(Role::Client)?;
    Ok(Json(
        queries::client_recent_orders(&state, client.id, params.limit).await?,
    ))
}

async fn admin_list(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppQuery(params): AppQuery<AdminListParams>,
) -> Result<Json<Vec<Order>>, AppError> {
    user.require(Role::Admin)?;
    Ok(Json(
        queries::admin_list_orders(&state, params.status, params.limit).await?,
    ))
}

async fn admin_cancelled(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppQuery(params): AppQuery<LimitParams>,
) -> Result<Json<Vec<Order>>, AppError> {
    user.require(Role::Admin)?;
    Ok(Json(queries::admin_list_cancelled(&state, params.limit).await?))
}

async fn admin_payments(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppQuery(params): AppQuery<LimitParams>,
) -> Result<Json<Vec<PaymentRecord>>, AppError> {
    user.require(Role::Admin)?;
    Ok(Json(queries::admin_list_payments(&state, params.limit).await?))
}

async fn apply_promo(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<ApplyPromoRequest>,
) -> Result<Json<Discount>, AppError> {
    user.require(Role::Admin)?;
    Ok(Json(assignment::apply_promo(&state, id, &payload.code).await?))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(queries::get_order(&state, actor, id).await?))
}

async fn accept_order(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Order>, AppError> {
    let driver = user.require(Role::Driver)?;
    Ok(Json(assignment::claim_order(&state, driver.id, id).await?))
}

async fn start_order(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Order>, AppError> {
    let driver = user.require(Role::Driver)?;
    Ok(Json(assignment::start_order(&state, driver.id, id).await?))
}

async fn complete_order(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Order>, AppError> {
    let driver = user.require(Role::Driver)?;
    Ok(Json(assignment::complete_order(&state, driver.id, id).await?))
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    AuthUser(actor): AuthUser,
    AppPath(id): AppPath<Uuid>,
    JsonOrDefault(payload): JsonOrDefault<CancelRequest>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(
        assignment::cancel_order(&state, actor, id, payload.reason).await?,
    ))
}

async fn finalize_order(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    JsonOrDefault(payload): JsonOrDefault<FinalizeBody>,
) -> Result<Json<Order>, AppError> {
    let client = user.require(Role::Client)?;

    let request = FinalizeRequest {
        tip: payload.tip,
        payment_method: payload.payment_method,
        receipt_preference: payload.receipt_requested,
        receipt_email: payload.receipt_email,
    };
    Ok(Json(
        assignment::finalize_order(&state, client.id, id, request).await?,
    ))
}

async fn rate_order(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<RateRequest>,
) -> Result<Json<Order>, AppError> {
    let client = user.require(Role::Client)?;
    let rating = payload
        .rating
        .as_i64()
        .ok_or_else(|| AppError::Validation("rating must be a whole number".to_string()))?;

    Ok(Json(
        assignment::rate_order(&state, client.id, id, rating, payload.review).await?,
    ))
}

async fn share_order(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<(StatusCode, Json<TrackingLink>), AppError> {
    let client = user.require(Role::Client)?;
    let link = tracking::issue_link(&state, client.id, id).await?;
    Ok((StatusCode::CREATED, Json(link)))
}
