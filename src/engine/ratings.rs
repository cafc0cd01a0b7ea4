use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::ledger::OrderQuery;
use crate::models::order::OrderStatus;
use crate::state::AppState;

/// Mean of `ratings`, rounded to one decimal.
pub fn average_rating(ratings: &[u8]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }
    let sum: u64 = ratings.iter().map(|&r| u64::from(r)).sum();
    let mean = sum as f64 / ratings.len() as f64;
    Some((mean * 10.0).round() / 10.0)
}

/// Sets the driver's displayed rating to the mean over their rated,
/// completed orders. Leaves the profile untouched when there are none.
///
/// Refreshes for the same driver run one at a time, from the ledger read
/// through the profile write.
pub async fn recompute_driver_rating(
    state: &AppState,
    driver_id: Uuid,
) -> Result<Option<f64>, AppError> {
    let lock = state.rating_refresh_lock(driver_id);
    let _guard = lock.lock().await;

    let rated = state
        .ledger
        .find(&OrderQuery {
            statuses: Some(vec![OrderStatus::Completed]),
            driver_id: Some(driver_id),
            rated_only: true,
            ..OrderQuery::default()
        })
        .await?;

    let ratings: Vec<u8> = rated.iter().filter_map(|order| order.rating).collect();
    let Some(average) = average_rating(&ratings) else {
        return Ok(None);
    };

    state.with_driver(driver_id, |profile| profile.rating = average);
    debug!(driver_id = %driver_id, rating = average, samples = ratings.len(), "driver rating refreshed");
    Ok(Some(average))
}
