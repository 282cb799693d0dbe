use crate::{
    db::DbPool,
    entities::{
        inventory_item::{
            self, normalize_serial, Entity as InventoryItem, ItemEvent, ItemState, TransitionError,
        },
        product::Entity as Product,
    },
    errors::{unwrap_txn_error, ServiceError},
    events::{Event, EventSender},
    services::assignments::close_active_assignment_for_item,
    services::repairs::close_open_repair_for_item,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterItemCommand {
    pub product_id: Uuid,
    #[validate(length(min = 1, max = 100))]
    pub serial_number: String,
    pub created_by: Uuid,
}

/// Serialized-unit registry: creation and the terminal decommission
/// transition. Assignment and repair transitions live with their own
/// lifecycles.
#[derive(Clone)]
pub struct InventoryItemService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl InventoryItemService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Registers a physical unit under a serial-tracked product. The serial
    /// is stored in canonical form and must be unique.
    #[instrument(skip(self))]
    pub async fn register_item(&self, command: RegisterItemCommand) -> Result<Uuid, ServiceError> {
        command.validate()?;

        let serial = normalize_serial(&command.serial_number);
        if serial.is_empty() {
            return Err(ServiceError::ValidationError(
                "serial number must not be blank".into(),
            ));
        }

        let db = self.db_pool.as_ref();
        let product_id = command.product_id;
        let serial_for_txn = serial.clone();

        let item_id = db
            .transaction::<_, Uuid, ServiceError>(move |txn| {
                Box::pin(async move {
                    let product = Product::find_by_id(product_id)
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Product {} not found", product_id))
                        })?;

                    if !product.serial_tracked {
                        return Err(ServiceError::ValidationError(format!(
                            "Product {} is bulk-tracked; register quantities through stock entries",
                            product.id
                        )));
                    }

                    let duplicate = InventoryItem::find()
                        .filter(inventory_item::Column::SerialNumber.eq(serial_for_txn.clone()))
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                    if let Some(existing) = duplicate {
                        return Err(ServiceError::Conflict(format!(
                            "Serial number {} is already registered to item {}",
                            serial_for_txn, existing.id
                        )));
                    }

                    let item = inventory_item::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        product_id: Set(product.id),
                        serial_number: Set(serial_for_txn),
                        state: Set(ItemState::Available),
                        decommission_reason: Set(None),
                        decommissioned_at: Set(None),
                        created_at: Set(Utc::now()),
                        updated_at: Set(None),
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                    Ok(item.id)
                })
            })
            .await
            .map_err(unwrap_txn_error)?;

        info!(item_id = %item_id, serial = %serial, "Inventory item registered");

        self.event_sender
            .send(Event::ItemRegistered {
                item_id,
                product_id: command.product_id,
                serial_number: serial,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(item_id)
    }

    /// Terminal write-off. Requires a non-empty justification; closes any
    /// active assignment and any open repair so no dangling open record
    /// survives the terminal state.
    #[instrument(skip(self))]
    pub async fn decommission_item(
        &self,
        item_id: Uuid,
        justification: String,
        decommissioned_by: Uuid,
    ) -> Result<(), ServiceError> {
        let justification = justification.trim().to_string();
        if justification.is_empty() {
            return Err(ServiceError::InvalidJustification(
                "decommission requires a justification".into(),
            ));
        }

        let db = self.db_pool.as_ref();
        let reason = justification.clone();

        let old_state = db
            .transaction::<_, ItemState, ServiceError>(move |txn| {
                Box::pin(async move {
                    let item = InventoryItem::find_by_id(item_id)
                        .lock_exclusive()
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Inventory item {} not found", item_id))
                        })?;

                    let old_state = item.state;

                    close_active_assignment_for_item(txn, item_id, "closed by decommission")
                        .await?;
                    close_open_repair_for_item(txn, item_id, "closed by decommission").await?;

                    let new_state = item
                        .state
                        .transition(ItemEvent::Decommission)
                        .map_err(|e| {
                            map_transition_error(item.id, item.state, ItemEvent::Decommission, e)
                        })?;

                    let mut active: inventory_item::ActiveModel = item.into();
                    active.state = Set(new_state);
                    active.decommission_reason = Set(Some(reason));
                    active.decommissioned_at = Set(Some(Utc::now()));
                    active.updated_at = Set(Some(Utc::now()));
                    active.update(txn).await.map_err(ServiceError::db_error)?;

                    Ok(old_state)
                })
            })
            .await
            .map_err(unwrap_txn_error)?;

        info!(item_id = %item_id, "Inventory item decommissioned");

        self.event_sender
            .send(Event::ItemDecommissioned {
                item_id,
                reason: justification,
            })
            .await
            .map_err(ServiceError::EventError)?;
        self.event_sender
            .send(Event::ItemStateChanged {
                item_id,
                old_state,
                new_state: ItemState::Decommissioned,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(())
    }

    /// Gets an item by ID
    #[instrument(skip(self))]
    pub async fn get_item(
        &self,
        item_id: Uuid,
    ) -> Result<Option<inventory_item::Model>, ServiceError> {
        let db = self.db_pool.as_ref();
        InventoryItem::find_by_id(item_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Looks an item up by serial number, in any input casing.
    #[instrument(skip(self))]
    pub async fn get_item_by_serial(
        &self,
        serial_number: &str,
    ) -> Result<Option<inventory_item::Model>, ServiceError> {
        let db = self.db_pool.as_ref();
        InventoryItem::find()
            .filter(inventory_item::Column::SerialNumber.eq(normalize_serial(serial_number)))
            .one(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Lists items with pagination, optionally scoped to one product.
    #[instrument(skip(self))]
    pub async fn list_items(
        &self,
        product_id: Option<Uuid>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<inventory_item::Model>, u64), ServiceError> {
        let db = self.db_pool.as_ref();

        let mut query = InventoryItem::find().order_by_desc(inventory_item::Column::CreatedAt);
        if let Some(product_id) = product_id {
            query = query.filter(inventory_item::Column::ProductId.eq(product_id));
        }

        let paginator = query.paginate(db, limit);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let items = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((items, total))
    }
}

/// Applies one state-machine event to an item row inside the caller's
/// transaction. The transition table decides; this only persists the result
/// and attaches entity context to refusals.
pub(crate) async fn transition_item(
    txn: &DatabaseTransaction,
    item: inventory_item::Model,
    event: ItemEvent,
) -> Result<inventory_item::Model, ServiceError> {
    let new_state = item
        .state
        .transition(event)
        .map_err(|e| map_transition_error(item.id, item.state, event, e))?;

    let mut active: inventory_item::ActiveModel = item.into();
    active.state = Set(new_state);
    active.updated_at = Set(Some(Utc::now()));
    active.update(txn).await.map_err(ServiceError::db_error)
}

pub(crate) fn map_transition_error(
    item_id: Uuid,
    state: ItemState,
    event: ItemEvent,
    error: TransitionError,
) -> ServiceError {
    match error {
        TransitionError::Unavailable => ServiceError::ItemUnavailable { item_id, state },
        TransitionError::InvalidStateForRepair => {
            ServiceError::InvalidStateForRepair { item_id, state }
        }
        TransitionError::Decommissioned => ServiceError::ItemDecommissioned { item_id },
        TransitionError::Invalid => ServiceError::InvalidTransition {
            item_id,
            state,
            event: event.name(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn transition_refusals_keep_entity_context() {
        let item_id = Uuid::new_v4();

        assert_matches!(
            map_transition_error(
                item_id,
                ItemState::Assigned,
                ItemEvent::Assign,
                TransitionError::Unavailable
            ),
            ServiceError::ItemUnavailable { item_id: got, state: ItemState::Assigned } if got == item_id
        );

        assert_matches!(
            map_transition_error(
                item_id,
                ItemState::Decommissioned,
                ItemEvent::Return,
                TransitionError::Decommissioned
            ),
            ServiceError::ItemDecommissioned { item_id: got } if got == item_id
        );

        assert_matches!(
            map_transition_error(
                item_id,
                ItemState::Available,
                ItemEvent::Return,
                TransitionError::Invalid
            ),
            ServiceError::InvalidTransition { event: "return", .. }
        );
    }
}
