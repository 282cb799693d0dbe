//! Service layer: each subsystem of the inventory core as an injectable
//! service over the shared connection pool and event channel.

pub mod alerts;
pub mod assignments;
pub mod inventory_items;
pub mod products;
pub mod repairs;
pub mod stock;

use std::sync::Arc;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::idempotency::IdempotencyStore;

pub use alerts::AlertService;
pub use assignments::AssignmentService;
pub use inventory_items::InventoryItemService;
pub use products::ProductService;
pub use repairs::RepairService;
pub use stock::StockService;

/// Bundle of all services wired over one pool, one event channel and one
/// idempotency store. This is what an embedding API layer holds.
#[derive(Clone)]
pub struct AppServices {
    pub products: Arc<ProductService>,
    pub items: Arc<InventoryItemService>,
    pub assignments: Arc<AssignmentService>,
    pub stock: Arc<StockService>,
    pub repairs: Arc<RepairService>,
    pub alerts: Arc<AlertService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: EventSender,
        idempotency: Arc<dyn IdempotencyStore>,
    ) -> Self {
        let event_sender = Arc::new(event_sender);

        Self {
            products: Arc::new(ProductService::new(db_pool.clone(), event_sender.clone())),
            items: Arc::new(InventoryItemService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            assignments: Arc::new(AssignmentService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            stock: Arc::new(StockService::new(
                db_pool.clone(),
                event_sender.clone(),
                idempotency,
            )),
            repairs: Arc::new(RepairService::new(db_pool.clone(), event_sender)),
            alerts: Arc::new(AlertService::new(db_pool)),
        }
    }
}
