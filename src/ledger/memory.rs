use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::ledger::{Change, Expect, LedgerError, OrderQuery, TripLedger};
use crate::models::order::Order;

/// Process-local ledger. The dashmap write guard on an entry serializes
/// concurrent conditional updates to the same order.
#[derive(Default)]
pub struct InMemoryLedger {
    orders: DashMap<Uuid, Order>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TripLedger for InMemoryLedger {
    async fn insert(&self, order: Order) -> Result<(), LedgerError> {
        match self.orders.entry(order.id) {
            Entry::Occupied(_) => Err(LedgerError::DuplicateId(order.id)),
            Entry::Vacant(slot) => {
                slot.insert(order);
                Ok(())
            }
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, LedgerError> {
        Ok(self.orders.get(&id).map(|entry| entry.value().clone()))
    }

    async fn update_where(
        &self,
        id: Uuid,
        expect: &Expect,
        change: Change,
    ) -> Result<Option<Order>, LedgerError> {
        let Some(mut order) = self.orders.get_mut(&id) else {
            return Ok(None);
        };

        if !expect.matches(&order) {
            return Ok(None);
        }

        change.apply(&mut order);
        Ok(Some(order.clone()))
    }

    async fn find(&self, query: &OrderQuery) -> Result<Vec<Order>, LedgerError> {
        let mut rows: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| query.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        rows.sort_by(|a, b| query.sort_value(b).cmp(&query.sort_value(a)));
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        Ok(rows)
    }

    async fn count(&self) -> Result<usize, LedgerError> {
        Ok(self.orders.len())
    }
}
