//! Trip ledger: the durable record of every order.
//!
//! The ledger is a document store keyed by order id. Its one hard requirement is
//! [`TripLedger::update_where`], an atomic compare-then-write on a single order.
//! Every lifecycle transition goes through it, and the claim race is decided by
//! whichever conditional write lands first.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::order::{Cancellation, Order, OrderStatus, ReceiptPreference};

pub use memory::InMemoryLedger;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("order {0} already exists")]
    DuplicateId(Uuid),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverMatch {
    Any,
    Unset,
    Is(Uuid),
}

/// Precondition a stored order must satisfy for a conditional write to apply.
#[derive(Debug, Clone)]
pub struct Expect {
    pub statuses: Vec<OrderStatus>,
    pub driver: DriverMatch,
    pub client: Option<Uuid>,
}

impl Expect {
    pub fn status_in(statuses: &[OrderStatus]) -> Self {
        Self {
            statuses: statuses.to_vec(),
            driver: DriverMatch::Any,
            client: None,
        }
    }

    pub fn driver(mut self, driver: DriverMatch) -> Self {
        self.driver = driver;
        self
    }

    pub fn client(mut self, client_id: Uuid) -> Self {
        self.client = Some(client_id);
        self
    }

    pub fn matches(&self, order: &Order) -> bool {
        if !self.statuses.contains(&order.status) {
            return false;
        }

        let driver_ok = match self.driver {
            DriverMatch::Any => true,
            DriverMatch::Unset => order.driver_id.is_none(),
            DriverMatch::Is(id) => order.driver_id == Some(id),
        };

        driver_ok && self.client.is_none_or(|id| order.client_id == id)
    }
}

/// A single write applied to an order once its [`Expect`] holds.
#[derive(Debug, Clone)]
pub enum Change {
    Claim {
        driver_id: Uuid,
        at: DateTime<Utc>,
    },
    Start {
        at: DateTime<Utc>,
    },
    Complete {
        at: DateTime<Utc>,
    },
    Cancel {
        cancellation: Cancellation,
        at: DateTime<Utc>,
    },
    Finalize {
        tip: Option<u64>,
        payment_method: Option<String>,
        receipt_preference: Option<ReceiptPreference>,
        receipt_email: Option<String>,
        at: DateTime<Utc>,
    },
    Rate {
        rating: u8,
        review: Option<String>,
    },
    Reprice {
        promo_code: String,
        price_estimate: Option<u64>,
    },
}

/// Stamps strictly after `floor`, so two transitions never share an instant
/// even when the clock reads the same for both.
fn stamp_after(at: DateTime<Utc>, floor: DateTime<Utc>) -> DateTime<Utc> {
    if at > floor {
        at
    } else {
        floor + Duration::microseconds(1)
    }
}

impl Change {
    pub fn apply(self, order: &mut Order) {
        let floor = order.last_transition_at();

        match self {
            Change::Claim { driver_id, at } => {
                order.status = OrderStatus::Assigned;
                order.driver_id = Some(driver_id);
                order.accepted_at = Some(stamp_after(at, floor));
            }
            Change::Start { at } => {
                order.status = OrderStatus::InProgress;
                order.started_at = Some(stamp_after(at, floor));
            }
            Change::Complete { at } => {
                order.status = OrderStatus::Completed;
                order.completed_at = Some(stamp_after(at, floor));
            }
            Change::Cancel { cancellation, at } => {
                order.status = OrderStatus::Cancelled;
                order.cancelled_at = Some(stamp_after(at, floor));
                order.cancellation = Some(cancellation);
            }
            Change::Finalize {
                tip,
                payment_method,
                receipt_preference,
                receipt_email,
                at,
            } => {
                if let Some(tip) = tip {
                    order.tip = tip;
                }
                if payment_method.is_some() {
                    order.payment_method = payment_method;
                }
                if receipt_preference.is_some() {
                    order.receipt_preference = receipt_preference;
                }
                if receipt_email.is_some() {
                    order.receipt_email = receipt_email;
                }
                if order.finalized_at.is_none() {
                    order.finalized_at = Some(stamp_after(at, floor));
                }
            }
            Change::Rate { rating, review } => {
                order.rating = Some(rating);
                order.review = review;
            }
            Change::Reprice {
                promo_code,
                price_estimate,
            } => {
                order.promo_code = Some(promo_code);
                if price_estimate.is_some() {
                    order.price_estimate = price_estimate;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    CreatedAt,
    CancelledAt,
    FinalizedAt,
    LastTransition,
}

/// Simple predicate query. Results come back newest first by `sort`.
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    pub statuses: Option<Vec<OrderStatus>>,
    pub client_id: Option<Uuid>,
    pub driver_id: Option<Uuid>,
    pub rated_only: bool,
    /// Only orders that were finalized or carry a payment method.
    pub payment_recorded: bool,
    pub completed_since: Option<DateTime<Utc>>,
    pub sort: SortKey,
    pub limit: Option<usize>,
}

impl OrderQuery {
    pub fn matches(&self, order: &Order) -> bool {
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&order.status) {
                return false;
            }
        }
        if self.client_id.is_some_and(|id| order.client_id != id) {
            return false;
        }
        if self.driver_id.is_some_and(|id| order.driver_id != Some(id)) {
            return false;
        }
        if self.rated_only && order.rating.is_none() {
            return false;
        }
        if self.payment_recorded && order.finalized_at.is_none() && order.payment_method.is_none() {
            return false;
        }
        if let Some(since) = self.completed_since {
            if order.completed_at.is_none_or(|at| at < since) {
                return false;
            }
        }
        true
    }

    pub fn sort_value(&self, order: &Order) -> DateTime<Utc> {
        match self.sort {
            SortKey::CreatedAt => order.created_at,
            SortKey::CancelledAt => order.cancelled_at.unwrap_or(order.created_at),
            SortKey::FinalizedAt => order.finalized_at.unwrap_or(order.created_at),
            SortKey::LastTransition => order.last_transition_at(),
        }
    }
}

#[async_trait]
pub trait TripLedger: Send + Sync {
    async fn insert(&self, order: Order) -> Result<(), LedgerError>;

    async fn get(&self, id: Uuid) -> Result<Option<Order>, LedgerError>;

    /// Applies `change` only if the stored order satisfies `expect`, atomically.
    /// Returns the updated order, or `None` when no record matched.
    async fn update_where(
        &self,
        id: Uuid,
        expect: &Expect,
        change: Change,
    ) -> Result<Option<Order>, LedgerError>;

    async fn find(&self, query: &OrderQuery) -> Result<Vec<Order>, LedgerError>;

    async fn count(&self) -> Result<usize, LedgerError>;
}
