use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::identity::Role;

pub const MAX_PASSENGERS: u8 = 3;
pub const MAX_BAGS: u8 = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub lat: f64,
    #[serde(alias = "lon")]
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Assigned => "assigned",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptPreference {
    Email,
    Pdf,
    None,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    Open,
    Closed,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Cancellation {
    pub by: Role,
    pub reason: String,
    pub fee_applied: bool,
    pub dispute_status: DisputeStatus,
    pub action: Option<String>,
}

/// Trip parameters supplied by the client at creation time.
#[derive(Debug, Clone)]
pub struct TripRequest {
    pub start: GeoPoint,
    pub destination: GeoPoint,
    pub passengers: u8,
    pub bags: u8,
    pub bag_offer: Option<u64>,
    pub bag_description: Option<String>,
    pub accessible: bool,
    pub promo_code: Option<String>,
    pub price_estimate: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub client_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub start: GeoPoint,
    pub destination: GeoPoint,
    pub passengers: u8,
    pub bags: u8,
    pub bag_offer: Option<u64>,
    pub bag_description: Option<String>,
    pub accessible: bool,
    pub promo_code: Option<String>,
    pub price_estimate: Option<u64>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub tip: u64,
    pub payment_method: Option<String>,
    pub receipt_preference: Option<ReceiptPreference>,
    pub receipt_email: Option<String>,
    pub rating: Option<u8>,
    pub review: Option<String>,
    pub cancellation: Option<Cancellation>,
}

impl Order {
    pub fn new(client_id: Uuid, trip: TripRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_id,
            driver_id: None,
            start: trip.start,
            destination: trip.destination,
            passengers: trip.passengers,
            bags: trip.bags,
            bag_offer: trip.bag_offer,
            bag_description: trip.bag_description,
            accessible: trip.accessible,
            promo_code: trip.promo_code,
            price_estimate: trip.price_estimate,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            accepted_at: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            finalized_at: None,
            tip: 0,
            payment_method: None,
            receipt_preference: None,
            receipt_email: None,
            rating: None,
            review: None,
            cancellation: None,
        }
    }

    /// Latest lifecycle timestamp recorded so far. New stamps never go below it.
    pub fn last_transition_at(&self) -> DateTime<Utc> {
        [
            Some(self.created_at),
            self.accepted_at,
            self.started_at,
            self.completed_at,
            self.cancelled_at,
            self.finalized_at,
        ]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(self.created_at)
    }

    pub fn is_party(&self, actor_id: Uuid) -> bool {
        self.client_id == actor_id || self.driver_id == Some(actor_id)
    }
}

/// Row shown to drivers browsing open requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOrderSummary {
    pub id: Uuid,
    pub start: GeoPoint,
    pub destination: GeoPoint,
    pub passengers: u8,
    pub bags: u8,
    pub bag_offer: Option<u64>,
    pub bag_description: Option<String>,
    pub accessible: bool,
    pub price_estimate: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
}

impl From<&Order> for PendingOrderSummary {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            start: order.start.clone(),
            destination: order.destination.clone(),
            passengers: order.passengers,
            bags: order.bags,
            bag_offer: order.bag_offer,
            bag_description: order.bag_description.clone(),
            accessible: order.accessible,
            price_estimate: order.price_estimate,
            created_at: order.created_at,
            status: order.status,
        }
    }
}
