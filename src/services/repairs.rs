use crate::{
    db::DbPool,
    entities::{
        inventory_item::{self, Entity as InventoryItem, ItemEvent, ItemState},
        repair::{self, Entity as Repair, RepairOutcome, RepairStatus},
    },
    errors::{unwrap_txn_error, ServiceError},
    events::{Event, EventSender},
    services::assignments::close_active_assignment_for_item,
    services::inventory_items::{map_transition_error, transition_item},
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
pub struct OpenRepairCommand {
    pub item_id: Uuid,
    #[validate(length(min = 1, max = 100))]
    pub provider: String,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
    pub created_by: Uuid,
}

/// Repair Lifecycle: a secondary state machine on a serialized unit,
/// mutually exclusive with an active assignment. Sending an assigned unit to
/// repair closes its assignment in the same transaction.
#[derive(Clone)]
pub struct RepairService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl RepairService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Opens a repair for an item that is `Available` or `Assigned`.
    #[instrument(skip(self))]
    pub async fn open_repair(&self, command: OpenRepairCommand) -> Result<Uuid, ServiceError> {
        command.validate()?;

        let db = self.db_pool.as_ref();
        let cmd = command.clone();

        let (repair_id, old_state, closed_assignment) = db
            .transaction::<_, (Uuid, ItemState, Option<Uuid>), ServiceError>(move |txn| {
                Box::pin(async move {
                    let item = InventoryItem::find_by_id(cmd.item_id)
                        .lock_exclusive()
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "Inventory item {} not found",
                                cmd.item_id
                            ))
                        })?;

                    let old_state = item.state;
                    let item = transition_item(txn, item, ItemEvent::SendToRepair).await?;

                    // An assigned unit leaves its holder when it ships out.
                    let closed_assignment = if old_state == ItemState::Assigned {
                        close_active_assignment_for_item(txn, item.id, "sent to repair").await?
                    } else {
                        None
                    };

                    let repair = repair::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        item_id: Set(item.id),
                        provider: Set(cmd.provider.clone()),
                        status: Set(RepairStatus::Open),
                        outcome: Set(None),
                        notes: Set(cmd.notes.clone()),
                        opened_at: Set(Utc::now()),
                        closed_at: Set(None),
                        created_by: Set(cmd.created_by),
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::db_error)?;

                    Ok((repair.id, old_state, closed_assignment))
                })
            })
            .await
            .map_err(unwrap_txn_error)?;

        info!(repair_id = %repair_id, item_id = %command.item_id, "Repair opened");

        self.event_sender
            .send(Event::RepairOpened {
                repair_id,
                item_id: command.item_id,
            })
            .await
            .map_err(ServiceError::EventError)?;
        self.event_sender
            .send(Event::ItemStateChanged {
                item_id: command.item_id,
                old_state,
                new_state: ItemState::InRepair,
            })
            .await
            .map_err(ServiceError::EventError)?;
        if let Some(assignment_id) = closed_assignment {
            self.event_sender
                .send(Event::AssignmentReturned { assignment_id })
                .await
                .map_err(ServiceError::EventError)?;
        }

        Ok(repair_id)
    }

    /// Closes a repair with an outcome. `Repaired` and `Unrepaired` both
    /// return the unit to `Available`; `WrittenOff` retires it.
    #[instrument(skip(self))]
    pub async fn close_repair(
        &self,
        repair_id: Uuid,
        outcome: RepairOutcome,
        notes: Option<String>,
    ) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();
        let written_off = outcome.is_written_off();

        let (item_id, new_state) = db
            .transaction::<_, (Uuid, ItemState), ServiceError>(move |txn| {
                Box::pin(async move {
                    let repair = Repair::find_by_id(repair_id)
                        .lock_exclusive()
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!("Repair {} not found", repair_id))
                        })?;

                    if !repair.is_open() {
                        return Err(ServiceError::AlreadyClosed(repair_id));
                    }

                    let item = InventoryItem::find_by_id(repair.item_id)
                        .lock_exclusive()
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "Inventory item {} not found",
                                repair.item_id
                            ))
                        })?;

                    let event = ItemEvent::RepairClosed { written_off };
                    let new_state = item
                        .state
                        .transition(event)
                        .map_err(|e| map_transition_error(item.id, item.state, event, e))?;

                    let item_id = item.id;
                    let mut active_item: inventory_item::ActiveModel = item.into();
                    active_item.state = Set(new_state);
                    active_item.updated_at = Set(Some(Utc::now()));
                    if written_off {
                        active_item.decommission_reason =
                            Set(Some(format!("Written off after repair {}", repair_id)));
                        active_item.decommissioned_at = Set(Some(Utc::now()));
                    }
                    active_item
                        .update(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                    let mut active_repair: repair::ActiveModel = repair.into();
                    active_repair.status = Set(RepairStatus::Closed);
                    active_repair.outcome = Set(Some(outcome));
                    active_repair.closed_at = Set(Some(Utc::now()));
                    if let Some(notes) = notes {
                        active_repair.notes = Set(Some(notes));
                    }
                    active_repair
                        .update(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                    Ok((item_id, new_state))
                })
            })
            .await
            .map_err(unwrap_txn_error)?;

        info!(
            repair_id = %repair_id,
            item_id = %item_id,
            outcome = %outcome,
            "Repair closed"
        );

        self.event_sender
            .send(Event::RepairClosed {
                repair_id,
                item_id,
                written_off,
            })
            .await
            .map_err(ServiceError::EventError)?;
        self.event_sender
            .send(Event::ItemStateChanged {
                item_id,
                old_state: ItemState::InRepair,
                new_state,
            })
            .await
            .map_err(ServiceError::EventError)?;
        if written_off {
            self.event_sender
                .send(Event::ItemDecommissioned {
                    item_id,
                    reason: format!("Written off after repair {}", repair_id),
                })
                .await
                .map_err(ServiceError::EventError)?;
        }

        Ok(())
    }

    /// Gets a repair by ID
    #[instrument(skip(self))]
    pub async fn get_repair(&self, repair_id: Uuid) -> Result<Option<repair::Model>, ServiceError> {
        let db = self.db_pool.as_ref();
        Repair::find_by_id(repair_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Repair history for an item, newest first.
    #[instrument(skip(self))]
    pub async fn list_repairs_for_item(
        &self,
        item_id: Uuid,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<repair::Model>, u64), ServiceError> {
        let db = self.db_pool.as_ref();

        let paginator = Repair::find()
            .filter(repair::Column::ItemId.eq(item_id))
            .order_by_desc(repair::Column::OpenedAt)
            .paginate(db, limit);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let repairs = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((repairs, total))
    }
}

/// Closes the open repair for an item, if any, inside the caller's
/// transaction. A repair interrupted by a decommission is recorded as
/// written off.
pub(crate) async fn close_open_repair_for_item(
    txn: &DatabaseTransaction,
    item_id: Uuid,
    note: &str,
) -> Result<Option<Uuid>, ServiceError> {
    let open = Repair::find()
        .filter(repair::Column::ItemId.eq(item_id))
        .filter(repair::Column::Status.eq(RepairStatus::Open))
        .lock_exclusive()
        .one(txn)
        .await
        .map_err(ServiceError::db_error)?;

    let Some(repair) = open else {
        return Ok(None);
    };

    let id = repair.id;
    let mut model: repair::ActiveModel = repair.into();
    model.status = Set(RepairStatus::Closed);
    model.outcome = Set(Some(RepairOutcome::WrittenOff));
    model.closed_at = Set(Some(Utc::now()));
    model.notes = Set(Some(note.to_string()));
    model.update(txn).await.map_err(ServiceError::db_error)?;

    Ok(Some(id))
}
