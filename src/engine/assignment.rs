//! Order lifecycle: creation, the exclusive claim, and every later transition.
//!
//! ```text
//! pending     -> assigned     driver claims
//! assigned    -> in_progress  same driver starts
//! in_progress -> completed    same driver ends
//! pending | assigned | in_progress -> cancelled   owner, assigned driver, or admin
//! ```
//!
//! Each transition is one conditional write against the ledger. Preconditions
//! are checked up front so callers get a precise error, and re-checked inside
//! the write so a concurrent actor can never slip in between.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::ratings::recompute_driver_rating;
use crate::error::AppError;
use crate::geo::is_on_globe;
use crate::ledger::{Change, DriverMatch, Expect};
use crate::models::identity::{Actor, Role};
use crate::models::order::{
    Cancellation, DisputeStatus, Order, OrderStatus, ReceiptPreference, TripRequest, MAX_BAGS,
    MAX_PASSENGERS,
};
use crate::pricing::{normalize_code, Discount};
use crate::state::AppState;

const DEFAULT_CANCEL_REASON: &str = "cancelled";

const CANCELLABLE: [OrderStatus; 3] = [
    OrderStatus::Pending,
    OrderStatus::Assigned,
    OrderStatus::InProgress,
];

#[derive(Debug, Clone, Default)]
pub struct FinalizeRequest {
    pub tip: Option<u64>,
    pub payment_method: Option<String>,
    pub receipt_preference: Option<ReceiptPreference>,
    pub receipt_email: Option<String>,
}

fn record_transition(state: &AppState, transition: &str, started: Instant) {
    state
        .metrics
        .transitions_total
        .with_label_values(&[transition])
        .inc();
    state
        .metrics
        .transition_latency_seconds
        .with_label_values(&[transition])
        .observe(started.elapsed().as_secs_f64());
}

async fn load(state: &AppState, order_id: Uuid) -> Result<Order, AppError> {
    state
        .ledger
        .get(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn create_order(
    state: &Arc<AppState>,
    client_id: Uuid,
    mut trip: TripRequest,
) -> Result<Order, AppError> {
    if !is_on_globe(&trip.start) || !is_on_globe(&trip.destination) {
        return Err(AppError::Validation(
            "start and destination need valid lat/lng".to_string(),
        ));
    }
    if !(1..=MAX_PASSENGERS).contains(&trip.passengers) {
        return Err(AppError::Validation(format!(
            "passengers must be between 1 and {MAX_PASSENGERS}"
        )));
    }
    if trip.bags > MAX_BAGS {
        return Err(AppError::Validation(format!(
            "bags must be between 0 and {MAX_BAGS}"
        )));
    }

    trip.bag_description = non_empty(trip.bag_description);
    trip.promo_code = non_empty(trip.promo_code).map(|code| normalize_code(&code));

    let mut price = match trip.price_estimate {
        Some(price) => price,
        None => state.pricing.estimate(&trip.start, &trip.destination).await,
    };

    if let Some(code) = &trip.promo_code {
        let discount = state.pricing.discount(code, price).map_err(|err| match err {
            AppError::NotFound(msg) | AppError::Conflict(msg) => AppError::Validation(msg),
            other => other,
        })?;
        price = discount.amount_after;
    }
    trip.price_estimate = Some(price);

    let order = Order::new(client_id, trip);
    state.ledger.insert(order.clone()).await?;
    state
        .metrics
        .transitions_total
        .with_label_values(&["create"])
        .inc();

    info!(order_id = %order.id, client_id = %client_id, price = price, "order created");
    Ok(order)
}

/// Claims a pending order for `driver_id`. Exactly one concurrent claimant
/// wins; the others get `Conflict`.
pub async fn claim_order(
    state: &Arc<AppState>,
    driver_id: Uuid,
    order_id: Uuid,
) -> Result<Order, AppError> {
    let started = Instant::now();
    let current = load(state, order_id).await?;

    // Only a claim on an order that was still open counts toward the accept
    // rate; stale list entries do not.
    if current.status == OrderStatus::Pending {
        state.with_driver(driver_id, |profile| profile.claims_attempted += 1);
    }

    let expect = Expect::status_in(&[OrderStatus::Pending]).driver(DriverMatch::Unset);
    let claimed = state
        .ledger
        .update_where(
            order_id,
            &expect,
            Change::Claim {
                driver_id,
                at: Utc::now(),
            },
        )
        .await?;

    let Some(order) = claimed else {
        state
            .metrics
            .claims_total
            .with_label_values(&["lost"])
            .inc();
        debug!(order_id = %order_id, driver_id = %driver_id, "claim lost the race");
        return Err(AppError::Conflict("order already assigned".to_string()));
    };

    state.with_driver(driver_id, |profile| profile.claims_won += 1);
    state
        .metrics
        .claims_total
        .with_label_values(&["won"])
        .inc();
    record_transition(state, "claim", started);

    let notified = state.hub.broadcast_order_assigned(order.id);
    info!(
        order_id = %order.id,
        driver_id = %driver_id,
        notified,
        "order claimed"
    );

    Ok(order)
}

/// Guards shared by start and complete: the caller must be the assigned
/// driver, and the order must be in `from`.
async fn driver_transition(
    state: &Arc<AppState>,
    driver_id: Uuid,
    order_id: Uuid,
    from: OrderStatus,
    change: Change,
) -> Result<Order, AppError> {
    let current = load(state, order_id).await?;
    if current.driver_id != Some(driver_id) {
        return Err(AppError::Unauthorized(
            "only the assigned driver can do this".to_string(),
        ));
    }
    if current.status != from {
        return Err(AppError::Conflict(format!(
            "order is {}, expected {}",
            current.status.as_str(),
            from.as_str()
        )));
    }

    let expect = Expect::status_in(&[from]).driver(DriverMatch::Is(driver_id));
    state
        .ledger
        .update_where(order_id, &expect, change)
        .await?
        .ok_or_else(|| AppError::Conflict("order changed concurrently".to_string()))
}

pub async fn start_order(
    state: &Arc<AppState>,
    driver_id: Uuid,
    order_id: Uuid,
) -> Result<Order, AppError> {
    let started = Instant::now();
    let order = driver_transition(
        state,
        driver_id,
        order_id,
        OrderStatus::Assigned,
        Change::Start { at: Utc::now() },
    )
    .await?;

    record_transition(state, "start", started);
    info!(order_id = %order_id, driver_id = %driver_id, "trip started");
    Ok(order)
}

pub async fn complete_order(
    state: &Arc<AppState>,
    driver_id: Uuid,
    order_id: Uuid,
) -> Result<Order, AppError> {
    let started = Instant::now();
    let order = driver_transition(
        state,
        driver_id,
        order_id,
        OrderStatus::InProgress,
        Change::Complete { at: Utc::now() },
    )
    .await?;

    let revoked = state.tracking.revoke_for_order(order_id);
    record_transition(state, "complete", started);
    info!(order_id = %order_id, driver_id = %driver_id, revoked, "trip completed");
    Ok(order)
}

/// Cancels an order. Cancelling an already-cancelled order returns it as is.
pub async fn cancel_order(
    state: &Arc<AppState>,
    actor: Actor,
    order_id: Uuid,
    reason: Option<String>,
) -> Result<Order, AppError> {
    let started = Instant::now();
    let current = load(state, order_id).await?;

    let by = if actor.is_admin() {
        Role::Admin
    } else if current.driver_id == Some(actor.id) {
        Role::Driver
    } else if current.client_id == actor.id {
        Role::Client
    } else {
        return Err(AppError::Unauthorized(
            "only the client, the assigned driver or an admin can cancel".to_string(),
        ));
    };

    match current.status {
        OrderStatus::Cancelled => return Ok(current),
        OrderStatus::Completed => {
            return Err(AppError::Conflict("trip is already completed".to_string()));
        }
        _ => {}
    }

    let reason = non_empty(reason).unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_string());
    let expect = match by {
        Role::Admin => Expect::status_in(&CANCELLABLE),
        Role::Driver => Expect::status_in(&CANCELLABLE).driver(DriverMatch::Is(actor.id)),
        Role::Client => Expect::status_in(&CANCELLABLE).client(actor.id),
    };
    let change = Change::Cancel {
        cancellation: Cancellation {
            by,
            reason: reason.clone(),
            fee_applied: false,
            dispute_status: DisputeStatus::Open,
            action: None,
        },
        at: Utc::now(),
    };

    let Some(order) = state.ledger.update_where(order_id, &expect, change).await? else {
        let latest = load(state, order_id).await?;
        if latest.status == OrderStatus::Cancelled {
            return Ok(latest);
        }
        return Err(AppError::Conflict(format!(
            "order is {} and can no longer be cancelled",
            latest.status.as_str()
        )));
    };

    let revoked = state.tracking.revoke_for_order(order_id);
    if let Some(driver_id) = order.driver_id {
        let notified = state.hub.notify_order_cancelled(driver_id, order_id, &reason);
        if notified == 0 {
            debug!(order_id = %order_id, driver_id = %driver_id, "assigned driver not connected");
        }
    }

    record_transition(state, "cancel", started);
    info!(order_id = %order_id, by = ?by, revoked, "order cancelled");
    Ok(order)
}

pub async fn finalize_order(
    state: &Arc<AppState>,
    client_id: Uuid,
    order_id: Uuid,
    request: FinalizeRequest,
) -> Result<Order, AppError> {
    let started = Instant::now();
    let current = load(state, order_id).await?;
    if current.client_id != client_id {
        return Err(AppError::Unauthorized(
            "only the ordering client can finalize".to_string(),
        ));
    }
    if current.status != OrderStatus::Completed {
        return Err(AppError::Conflict("trip must be completed first".to_string()));
    }

    let expect = Expect::status_in(&[OrderStatus::Completed]).client(client_id);
    let change = Change::Finalize {
        tip: request.tip,
        payment_method: non_empty(request.payment_method),
        receipt_preference: request.receipt_preference,
        receipt_email: non_empty(request.receipt_email),
        at: Utc::now(),
    };
    let order = state
        .ledger
        .update_where(order_id, &expect, change)
        .await?
        .ok_or_else(|| AppError::Conflict("order changed concurrently".to_string()))?;

    state.tracking.revoke_for_order(order_id);
    record_transition(state, "finalize", started);
    info!(order_id = %order_id, tip = order.tip, "order finalized");
    Ok(order)
}

/// Records the client's rating, then refreshes the driver's average in the
/// background. A failed refresh never fails the rating itself.
pub async fn rate_order(
    state: &Arc<AppState>,
    client_id: Uuid,
    order_id: Uuid,
    rating: i64,
    review: Option<String>,
) -> Result<Order, AppError> {
    let started = Instant::now();
    let current = load(state, order_id).await?;
    if current.client_id != client_id {
        return Err(AppError::Unauthorized(
            "only the ordering client can rate".to_string(),
        ));
    }
    if !(1..=5).contains(&rating) {
        return Err(AppError::Validation("rating must be between 1 and 5".to_string()));
    }
    if current.status != OrderStatus::Completed {
        return Err(AppError::Conflict(
            "trip must be completed before it can be rated".to_string(),
        ));
    }

    let expect = Expect::status_in(&[OrderStatus::Completed]).client(client_id);
    let change = Change::Rate {
        rating: rating as u8,
        review: non_empty(review),
    };
    let order = state
        .ledger
        .update_where(order_id, &expect, change)
        .await?
        .ok_or_else(|| AppError::Conflict("order changed concurrently".to_string()))?;

    if let Some(driver_id) = order.driver_id {
        let state = Arc::clone(state);
        tokio::spawn(async move {
            if let Err(err) = recompute_driver_rating(&state, driver_id).await {
                warn!(driver_id = %driver_id, error = %err, "driver rating refresh failed");
            }
        });
    }

    record_transition(state, "rate", started);
    info!(order_id = %order_id, rating, "order rated");
    Ok(order)
}

/// Applies a promo code to an open order's estimate.
pub async fn apply_promo(
    state: &Arc<AppState>,
    order_id: Uuid,
    code: &str,
) -> Result<Discount, AppError> {
    let code = normalize_code(code);
    if code.is_empty() {
        return Err(AppError::Validation("code is required".to_string()));
    }

    let current = load(state, order_id).await?;
    if current.status.is_terminal() {
        return Err(AppError::Conflict(format!(
            "order is {}",
            current.status.as_str()
        )));
    }

    let base = current.price_estimate.unwrap_or(0);
    let mut discount = state.pricing.discount(&code, base)?;

    let change = Change::Reprice {
        promo_code: discount.code.clone(),
        price_estimate: (base > 0).then_some(discount.amount_after),
    };
    let order = state
        .ledger
        .update_where(order_id, &Expect::status_in(&CANCELLABLE), change)
        .await?
        .ok_or_else(|| AppError::Conflict("order changed concurrently".to_string()))?;

    discount.amount_after = order.price_estimate.unwrap_or(base);
    info!(order_id = %order_id, code = %discount.code, discount = discount.discount, "promo applied");
    Ok(discount)
}
