//! Shareable tracking links.
//!
//! A tracking token is an unguessable capability for one order. Holding it
//! grants only the order's status and where to send the viewer; nothing about
//! fares or parties. An order has at most one active token, and revocation is
//! terminal.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::RngCore;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::order::OrderStatus;
use crate::models::tracking::{Resolution, TrackingLink, TrackingToken, TrackingView};
use crate::state::AppState;

/// How often revoked tokens past their retention are swept.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// 256 bits of entropy per token.
const TOKEN_BYTES: usize = 32;

fn mint_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Frontend view a viewer is sent to for a given order status.
pub fn redirect_for(status: OrderStatus, order_id: Uuid) -> Option<String> {
    match status {
        OrderStatus::Assigned => Some(format!("/order-accepted?id={order_id}")),
        OrderStatus::InProgress => Some(format!("/trip-in-progress?id={order_id}")),
        _ => None,
    }
}

#[derive(Default)]
pub struct TrackingTokens {
    tokens: DashMap<String, TrackingToken>,
    active: DashMap<Uuid, TrackingToken>,
}

impl TrackingTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the order's active token, minting one if there is none.
    /// The flag is true when a new token was minted.
    pub fn active_or_mint(&self, order_id: Uuid, created_by: Uuid) -> (TrackingToken, bool) {
        let mut minted = false;
        let token = self
            .active
            .entry(order_id)
            .or_insert_with(|| {
                minted = true;
                let token = TrackingToken {
                    token: mint_token(),
                    order_id,
                    created_by,
                    created_at: Utc::now(),
                    expires_at: None,
                    revoked: false,
                };
                self.tokens.insert(token.token.clone(), token.clone());
                token
            })
            .value()
            .clone();

        (token, minted)
    }

    pub fn active_token(&self, order_id: Uuid) -> Option<TrackingToken> {
        self.active.get(&order_id).map(|entry| entry.value().clone())
    }

    pub fn lookup(&self, token: &str) -> Option<TrackingToken> {
        self.tokens.get(token).map(|entry| entry.value().clone())
    }

    /// Revokes every active token for the order and stamps its expiry.
    pub fn revoke_for_order(&self, order_id: Uuid) -> usize {
        self.active.remove(&order_id);

        let now = Utc::now();
        let mut revoked = 0;
        for mut entry in self.tokens.iter_mut() {
            let token = entry.value_mut();
            if token.order_id == order_id && !token.revoked {
                token.revoked = true;
                token.expires_at = Some(now);
                revoked += 1;
            }
        }

        revoked
    }

    /// Forgets revoked tokens that expired at or before `cutoff`. Until then a
    /// revoked token still resolves as expired rather than unknown.
    pub fn prune_revoked(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.tokens.len();
        self.tokens.retain(|_, token| {
            !(token.revoked && token.expires_at.is_some_and(|at| at <= cutoff))
        });
        before.saturating_sub(self.tokens.len())
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Issues (or re-issues) the tracking link for a client's in-flight order.
pub async fn issue_link(
    state: &AppState,
    client_id: Uuid,
    order_id: Uuid,
) -> Result<TrackingLink, AppError> {
    let order = state
        .ledger
        .get(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    if order.client_id != client_id {
        return Err(AppError::Unauthorized(
            "only the ordering client can share this trip".to_string(),
        ));
    }

    if !matches!(order.status, OrderStatus::Assigned | OrderStatus::InProgress) {
        return Err(AppError::Conflict(
            "sharing is only available for trips underway".to_string(),
        ));
    }

    let (token, minted) = state.tracking.active_or_mint(order_id, client_id);

    // The order may have finished between the status check and the mint.
    let still_underway = state
        .ledger
        .get(order_id)
        .await?
        .is_some_and(|order| matches!(order.status, OrderStatus::Assigned | OrderStatus::InProgress));
    if !still_underway {
        state.tracking.revoke_for_order(order_id);
        record_resolution(state, "raced");
        return Err(AppError::Conflict(
            "sharing is only available for trips underway".to_string(),
        ));
    }

    let outcome = if minted { "issued" } else { "reused" };
    state
        .metrics
        .tracking_links_total
        .with_label_values(&[outcome])
        .inc();

    info!(order_id = %order_id, minted, "tracking link issued");

    let url = format!("{}/track/{}", state.config.frontend_base, token.token);
    Ok(TrackingLink {
        token: token.token,
        url,
    })
}

/// Translates a tracking token into the order's current status and view.
/// Requires no authentication.
pub async fn resolve_link(state: &AppState, token: &str) -> Result<Resolution, AppError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::Validation("token is required".to_string()));
    }

    let Some(entry) = state.tracking.lookup(token) else {
        record_resolution(state, "not_found");
        return Err(AppError::NotFound("tracking link not found".to_string()));
    };

    if entry.revoked {
        record_resolution(state, "expired");
        return Ok(Resolution::Expired);
    }

    let Some(order) = state.ledger.get(entry.order_id).await? else {
        debug!(order_id = %entry.order_id, "tracking token points at a missing order");
        record_resolution(state, "expired");
        return Ok(Resolution::Expired);
    };

    match redirect_for(order.status, order.id) {
        Some(redirect_to) => {
            record_resolution(state, "resolved");
            Ok(Resolution::Active(TrackingView {
                order_id: order.id,
                status: order.status,
                redirect_to,
            }))
        }
        None => {
            record_resolution(state, "expired");
            Ok(Resolution::Expired)
        }
    }
}

/// Periodically drops revoked tokens older than the configured retention.
pub async fn run_sweeper(state: Arc<AppState>) {
    let retention = chrono::Duration::seconds(state.config.tracking_retention_secs);
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        ticker.tick().await;
        let pruned = state.tracking.prune_revoked(Utc::now() - retention);
        if pruned > 0 {
            debug!(pruned, remaining = state.tracking.len(), "revoked tracking tokens pruned");
        }
    }
}

fn record_resolution(state: &AppState, outcome: &str) {
    state
        .metrics
        .tracking_links_total
        .with_label_values(&[outcome])
        .inc();
}
