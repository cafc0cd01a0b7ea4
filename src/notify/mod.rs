//! Live fan-out of lifecycle events to connected drivers.
//!
//! Every open driver stream registers a listener here and gets an unbounded
//! channel to drain. Sends never block and never fail the caller: an event
//! addressed to a listener whose receiver is gone is simply dropped. Entries
//! leave the live set when their [`DriverConnection`] is dropped, not from the
//! send path. There is no backlog; a reconnecting driver re-fetches the
//! pending list.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use dashmap::DashMap;
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::observability::metrics::Metrics;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum DriverEvent {
    OrderAssigned { order_id: Uuid },
    OrderCancelled { order_id: Uuid, reason: String },
}

impl DriverEvent {
    fn kind(&self) -> &'static str {
        match self {
            DriverEvent::OrderAssigned { .. } => "order_assigned",
            DriverEvent::OrderCancelled { .. } => "order_cancelled",
        }
    }
}

struct Listener {
    driver_id: Uuid,
    tx: mpsc::UnboundedSender<DriverEvent>,
}

pub struct NotificationHub {
    listeners: DashMap<Uuid, Listener>,
    metrics: Metrics,
}

impl NotificationHub {
    pub fn new(metrics: Metrics) -> Self {
        Self {
            listeners: DashMap::new(),
            metrics,
        }
    }

    /// Admits a driver to the live set. With `replace`, any earlier listeners
    /// for the same driver are evicted so a reconnect does not duplicate them.
    pub fn connect(self: &Arc<Self>, driver_id: Uuid, replace: bool) -> DriverConnection {
        if replace {
            self.listeners
                .retain(|_, listener| listener.driver_id != driver_id);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let connection_id = Uuid::new_v4();
        self.listeners
            .insert(connection_id, Listener { driver_id, tx });
        self.metrics.connected_drivers.set(self.listeners.len() as i64);

        info!(driver_id = %driver_id, connection_id = %connection_id, "driver stream connected");

        DriverConnection {
            id: connection_id,
            driver_id,
            hub: Arc::clone(self),
            rx,
        }
    }

    fn disconnect(&self, connection_id: Uuid) {
        if let Some((_, listener)) = self.listeners.remove(&connection_id) {
            info!(
                driver_id = %listener.driver_id,
                connection_id = %connection_id,
                "driver stream disconnected"
            );
        }
        self.metrics.connected_drivers.set(self.listeners.len() as i64);
    }

    /// Tells every connected driver that `order_id` is no longer pending.
    /// Returns how many listeners accepted the event.
    pub fn broadcast_order_assigned(&self, order_id: Uuid) -> usize {
        self.deliver(DriverEvent::OrderAssigned { order_id }, |_| true)
    }

    /// Tells only `driver_id`'s connections that their trip was cancelled.
    pub fn notify_order_cancelled(&self, driver_id: Uuid, order_id: Uuid, reason: &str) -> usize {
        self.deliver(
            DriverEvent::OrderCancelled {
                order_id,
                reason: reason.to_string(),
            },
            |listener| listener.driver_id == driver_id,
        )
    }

    fn deliver(&self, event: DriverEvent, target: impl Fn(&Listener) -> bool) -> usize {
        let mut delivered = 0;
        for entry in self.listeners.iter() {
            let listener = entry.value();
            if !target(listener) {
                continue;
            }
            if listener.tx.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                debug!(connection_id = %entry.key(), "skipping closed driver stream");
            }
        }

        self.metrics
            .events_delivered_total
            .with_label_values(&[event.kind()])
            .inc_by(delivered as u64);

        delivered
    }

    pub fn connected(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_connected(&self, driver_id: Uuid) -> bool {
        self.listeners
            .iter()
            .any(|entry| entry.value().driver_id == driver_id)
    }
}

/// One driver's registration in the hub. Dropping it leaves the live set.
pub struct DriverConnection {
    id: Uuid,
    driver_id: Uuid,
    hub: Arc<NotificationHub>,
    rx: mpsc::UnboundedReceiver<DriverEvent>,
}

impl DriverConnection {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn driver_id(&self) -> Uuid {
        self.driver_id
    }

    /// Next event, or `None` once this connection has been replaced.
    pub async fn recv(&mut self) -> Option<DriverEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<DriverEvent> {
        self.rx.try_recv().ok()
    }
}

impl Stream for DriverConnection {
    type Item = DriverEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for DriverConnection {
    fn drop(&mut self) {
        self.hub.disconnect(self.id);
    }
}
