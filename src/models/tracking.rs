use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::OrderStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingToken {
    pub token: String,
    pub order_id: Uuid,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingLink {
    pub token: String,
    pub url: String,
}

/// What an unauthenticated holder of a tracking token gets to see.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackingView {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub redirect_to: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Active(TrackingView),
    Expired,
}
