use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Domain events emitted by the inventory engine after a mutation commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    StockAdjusted {
        product_sku: String,
        warehouse_id: i64,
        previous_quantity: i32,
        new_quantity: i32,
        movement_type: String,
        reference_number: Option<String>,
    },
    StockTransferred {
        product_sku: String,
        from_warehouse_id: i64,
        to_warehouse_id: i64,
        quantity: i32,
        reference: String,
    },
    LowStockDetected {
        product_sku: String,
        quantity: i32,
        min_stock: i32,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Consumes events off the channel. Downstream integrations (alerting,
/// analytics feeds) hang off this loop; today it records structured logs.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::StockAdjusted {
                ref product_sku,
                warehouse_id,
                previous_quantity,
                new_quantity,
                ref movement_type,
                ..
            } => {
                info!(
                    sku = %product_sku,
                    warehouse_id,
                    previous_quantity,
                    new_quantity,
                    movement_type = %movement_type,
                    "stock adjusted"
                );
            }
            Event::StockTransferred {
                ref product_sku,
                from_warehouse_id,
                to_warehouse_id,
                quantity,
                ref reference,
            } => {
                info!(
                    sku = %product_sku,
                    from_warehouse_id,
                    to_warehouse_id,
                    quantity,
                    reference = %reference,
                    "stock transferred"
                );
            }
            Event::LowStockDetected {
                ref product_sku,
                quantity,
                min_stock,
            } => {
                warn!(
                    sku = %product_sku,
                    quantity,
                    min_stock,
                    "product below minimum stock"
                );
            }
        }
    }

    info!("Event processing loop stopped");
}
