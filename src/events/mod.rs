use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::inventory_item::ItemState;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Builds a connected sender/receiver pair with a sensible buffer.
pub fn channel() -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(256);
    (EventSender::new(tx), rx)
}

// Define the various events that can occur in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Catalog events
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    ProductDeactivated(Uuid),

    // Serialized item events
    ItemRegistered {
        item_id: Uuid,
        product_id: Uuid,
        serial_number: String,
    },
    ItemStateChanged {
        item_id: Uuid,
        old_state: ItemState,
        new_state: ItemState,
    },
    ItemDecommissioned {
        item_id: Uuid,
        reason: String,
    },

    // Assignment events
    AssignmentCreated {
        assignment_id: Uuid,
        item_id: Option<Uuid>,
        product_id: Option<Uuid>,
    },
    AssignmentReturned {
        assignment_id: Uuid,
    },
    AssignmentCancelled {
        assignment_id: Uuid,
    },

    // Stock ledger events
    StockEntryRecorded {
        movement_id: Uuid,
        product_id: Uuid,
        quantity: i32,
        new_balance: i32,
    },
    StockExitRecorded {
        movement_id: Uuid,
        product_id: Uuid,
        quantity: i32,
        new_balance: i32,
        low_stock_triggered: bool,
    },
    LowStockDetected {
        product_id: Uuid,
        balance: i32,
        minimum_stock: i32,
    },

    // Repair events
    RepairOpened {
        repair_id: Uuid,
        item_id: Uuid,
    },
    RepairClosed {
        repair_id: Uuid,
        item_id: Uuid,
        written_off: bool,
    },

    // Generic event for custom messages
    Generic {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    /// Create a generic event with string data
    pub fn with_data(data: String) -> Self {
        Event::Generic {
            message: data,
            timestamp: Utc::now(),
        }
    }
}

/// Consumes the event channel and logs each domain event. Projections that
/// need more than logging subscribe by wrapping this loop.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::LowStockDetected {
                product_id,
                balance,
                minimum_stock,
            } => {
                warn!(
                    product_id = %product_id,
                    balance = %balance,
                    minimum_stock = %minimum_stock,
                    "Low stock detected"
                );
            }
            Event::ItemDecommissioned { item_id, reason } => {
                info!(item_id = %item_id, reason = %reason, "Item decommissioned");
            }
            other => {
                info!(event = ?other, "Domain event");
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_event_to_receiver() {
        let (sender, mut rx) = channel();
        sender
            .send(Event::ProductCreated(Uuid::new_v4()))
            .await
            .expect("send should succeed");

        let received = rx.recv().await.expect("event expected");
        assert!(matches!(received, Event::ProductCreated(_)));
    }

    #[tokio::test]
    async fn send_fails_after_receiver_drop() {
        let (sender, rx) = channel();
        drop(rx);
        let result = sender.send(Event::with_data("orphan".into())).await;
        assert!(result.is_err());
    }
}
