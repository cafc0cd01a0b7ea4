use chrono::{DateTime, Datelike, TimeZone, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::ledger::{OrderQuery, SortKey};
use crate::models::driver::DriverStats;
use crate::models::identity::Actor;
use crate::models::order::{Order, OrderStatus, PendingOrderSummary};
use crate::models::payment::PaymentRecord;
use crate::state::AppState;

fn clamp_limit(requested: Option<usize>, default: usize, max: usize) -> usize {
    requested.unwrap_or(default).clamp(1, max)
}

/// Open requests, newest first.
pub async fn list_pending(state: &AppState) -> Result<Vec<PendingOrderSummary>, AppError> {
    let rows = state
        .ledger
        .find(&OrderQuery {
            statuses: Some(vec![OrderStatus::Pending]),
            limit: Some(state.config.pending_list_limit),
            ..OrderQuery::default()
        })
        .await?;

    Ok(rows.iter().map(PendingOrderSummary::from).collect())
}

/// Full order, visible to its client, its driver, or an admin.
pub async fn get_order(state: &AppState, actor: Actor, order_id: Uuid) -> Result<Order, AppError> {
    let order = state
        .ledger
        .get(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    if !(actor.is_admin() || order.is_party(actor.id)) {
        return Err(AppError::Unauthorized("not a party to this order".to_string()));
    }

    Ok(order)
}

pub async fn driver_active_order(state: &AppState, driver_id: Uuid) -> Result<Option<Order>, AppError> {
    let rows = state
        .ledger
        .find(&OrderQuery {
            statuses: Some(vec![OrderStatus::Assigned, OrderStatus::InProgress]),
            driver_id: Some(driver_id),
            sort: SortKey::LastTransition,
            limit: Some(1),
            ..OrderQuery::default()
        })
        .await?;

    Ok(rows.into_iter().next())
}

pub async fn client_recent_orders(
    state: &AppState,
    client_id: Uuid,
    limit: Option<usize>,
) -> Result<Vec<Order>, AppError> {
    Ok(state
        .ledger
        .find(&OrderQuery {
            client_id: Some(client_id),
            limit: Some(clamp_limit(limit, 10, 50)),
            ..OrderQuery::default()
        })
        .await?)
}

pub async fn admin_list_orders(
    state: &AppState,
    status: Option<OrderStatus>,
    limit: Option<usize>,
) -> Result<Vec<Order>, AppError> {
    Ok(state
        .ledger
        .find(&OrderQuery {
            statuses: status.map(|s| vec![s]),
            limit: Some(clamp_limit(limit, 50, 200)),
            ..OrderQuery::default()
        })
        .await?)
}

/// Cancelled orders with their dispute records, latest cancellation first.
pub async fn admin_list_cancelled(state: &AppState, limit: Option<usize>) -> Result<Vec<Order>, AppError> {
    Ok(state
        .ledger
        .find(&OrderQuery {
            statuses: Some(vec![OrderStatus::Cancelled]),
            sort: SortKey::CancelledAt,
            limit: Some(clamp_limit(limit, 100, 200)),
            ..OrderQuery::default()
        })
        .await?)
}

/// Payments as recorded on orders, most recently finalized first.
pub async fn admin_list_payments(
    state: &AppState,
    limit: Option<usize>,
) -> Result<Vec<PaymentRecord>, AppError> {
    let rows = state
        .ledger
        .find(&OrderQuery {
            payment_recorded: true,
            sort: SortKey::FinalizedAt,
            limit: Some(clamp_limit(limit, 100, 200)),
            ..OrderQuery::default()
        })
        .await?;

    Ok(rows.iter().map(PaymentRecord::from).collect())
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
        .single()
        .unwrap_or(now)
}

fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

pub async fn driver_stats(state: &AppState, driver_id: Uuid) -> Result<DriverStats, AppError> {
    let now = Utc::now();
    let day = start_of_day(now);

    let month_rows = state
        .ledger
        .find(&OrderQuery {
            statuses: Some(vec![OrderStatus::Completed]),
            driver_id: Some(driver_id),
            completed_since: Some(start_of_month(now)),
            ..OrderQuery::default()
        })
        .await?;

    let revenue = |order: &Order| order.price_estimate.unwrap_or(0);
    let day_rows: Vec<&Order> = month_rows
        .iter()
        .filter(|order| order.completed_at.is_some_and(|at| at >= day))
        .collect();

    Ok(DriverStats {
        day_trips: day_rows.len() as u64,
        day_revenue: day_rows.iter().map(|order| revenue(order)).sum(),
        month_trips: month_rows.len() as u64,
        month_revenue: month_rows.iter().map(revenue).sum(),
        accept_rate: state.driver_profile(driver_id).accept_rate(),
    })
}
