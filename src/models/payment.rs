use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::{Order, OrderStatus};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Success,
    Refunded,
}

impl PaymentStatus {
    pub fn of(order: &Order) -> Self {
        match (order.status, order.finalized_at) {
            (OrderStatus::Completed, Some(_)) => PaymentStatus::Success,
            (OrderStatus::Cancelled, Some(_)) => PaymentStatus::Refunded,
            _ => PaymentStatus::Pending,
        }
    }
}

/// Payment row derived from an order; there is no separate payment store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub payment_id: String,
    pub order_id: Uuid,
    pub method: Option<String>,
    pub amount: u64,
    pub tip: u64,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl From<&Order> for PaymentRecord {
    fn from(order: &Order) -> Self {
        let hex = order.id.simple().to_string();
        let tail = hex[hex.len() - 3..].to_uppercase();

        Self {
            payment_id: format!("P-{tail}"),
            order_id: order.id,
            method: order.payment_method.clone(),
            amount: order.price_estimate.unwrap_or(0),
            tip: order.tip,
            status: PaymentStatus::of(order),
            created_at: order.created_at,
            finalized_at: order.finalized_at,
        }
    }
}
