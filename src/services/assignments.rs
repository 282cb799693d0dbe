use crate::{
    db::DbPool,
    entities::{
        assignment::{self, AssignmentStatus, ClosedReason, Destination, Entity as Assignment, Origin},
        branch::Entity as Branch,
        category::Entity as Category,
        employee::Entity as Employee,
        inventory_item::{Entity as InventoryItem, ItemEvent, ItemState},
        product::{self, Entity as Product},
        sector::Entity as Sector,
        stock_movement::MovementDirection,
    },
    errors::{unwrap_txn_error, ServiceError},
    events::{Event, EventSender},
    services::inventory_items::transition_item,
    services::stock::{apply_movement, load_bulk_product},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Reason used on the exit movement written for bulk assignments.
const ASSIGNMENT_EXIT_REASON: &str = "assignment";

#[derive(Debug, Clone, Validate)]
pub struct CreateAssignmentCommand {
    pub origin: Origin,
    pub destination: Destination,
    /// Required when the product category demands disk encryption custody.
    pub encryption_password: Option<String>,
    /// Required when the product category demands a managed service account.
    pub service_account: Option<String>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
    pub created_by: Uuid,
}

/// Assignment Lifecycle: binds one origin (serialized unit or bulk quantity)
/// to exactly one destination, atomically against item state or stock
/// balance.
#[derive(Clone)]
pub struct AssignmentService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl AssignmentService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates an assignment. For a serialized origin the item must be
    /// `Available` and is atomically transitioned to `Assigned`; for a bulk
    /// origin the stock balance is checked and decremented with an `Exit`
    /// movement in the same transaction. Nothing is written on failure.
    #[instrument(skip(self))]
    pub async fn create_assignment(
        &self,
        command: CreateAssignmentCommand,
    ) -> Result<Uuid, ServiceError> {
        command.validate()?;

        let db = self.db_pool.as_ref();
        let cmd = command.clone();

        let (assignment_id, item_change) = db
            .transaction::<_, (Uuid, Option<(Uuid, ItemState, ItemState)>), ServiceError>(
                move |txn| {
                    Box::pin(async move {
                        ensure_destination_exists(txn, &cmd.destination).await?;

                        let mut item_change = None;

                        let product = match cmd.origin {
                            Origin::Serialized { item_id } => {
                                let item = InventoryItem::find_by_id(item_id)
                                    .lock_exclusive()
                                    .one(txn)
                                    .await
                                    .map_err(ServiceError::db_error)?
                                    .ok_or_else(|| {
                                        ServiceError::NotFound(format!(
                                            "Inventory item {} not found",
                                            item_id
                                        ))
                                    })?;

                                let product = Product::find_by_id(item.product_id)
                                    .one(txn)
                                    .await
                                    .map_err(ServiceError::db_error)?
                                    .ok_or_else(|| {
                                        ServiceError::NotFound(format!(
                                            "Product {} not found",
                                            item.product_id
                                        ))
                                    })?;

                                require_category_fields(txn, &product, &cmd).await?;

                                let old_state = item.state;
                                let updated = transition_item(txn, item, ItemEvent::Assign).await?;
                                item_change = Some((updated.id, old_state, updated.state));

                                product
                            }
                            Origin::Bulk {
                                product_id,
                                quantity,
                            } => {
                                let product = load_bulk_product(txn, product_id).await?;

                                require_category_fields(txn, &product, &cmd).await?;

                                apply_movement(
                                    txn,
                                    &product,
                                    MovementDirection::Exit,
                                    quantity,
                                    ASSIGNMENT_EXIT_REASON,
                                    cmd.notes.clone(),
                                    Some(cmd.destination),
                                    cmd.created_by,
                                )
                                .await?;

                                product
                            }
                        };

                        let assignment = assignment::ActiveModel {
                            id: Set(Uuid::new_v4()),
                            item_id: Set(cmd.origin.item_id()),
                            product_id: Set(match cmd.origin {
                                Origin::Bulk { product_id, .. } => Some(product_id),
                                Origin::Serialized { .. } => None,
                            }),
                            quantity: Set(match cmd.origin {
                                Origin::Bulk { quantity, .. } => Some(quantity),
                                Origin::Serialized { .. } => None,
                            }),
                            employee_id: Set(cmd.destination.employee_id()),
                            sector_id: Set(cmd.destination.sector_id()),
                            branch_id: Set(cmd.destination.branch_id()),
                            status: Set(AssignmentStatus::Active),
                            closed_reason: Set(None),
                            encryption_password: Set(cmd.encryption_password.clone()),
                            service_account: Set(cmd.service_account.clone()),
                            notes: Set(cmd.notes.clone()),
                            assigned_at: Set(Utc::now()),
                            returned_at: Set(None),
                            created_by: Set(cmd.created_by),
                        }
                        .insert(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                        info!(
                            assignment_id = %assignment.id,
                            destination = %cmd.destination.kind(),
                            product_id = %product.id,
                            "Assignment created"
                        );

                        Ok((assignment.id, item_change))
                    })
                },
            )
            .await
            .map_err(unwrap_txn_error)?;

        self.event_sender
            .send(Event::AssignmentCreated {
                assignment_id,
                item_id: command.origin.item_id(),
                product_id: match command.origin {
                    Origin::Bulk { product_id, .. } => Some(product_id),
                    Origin::Serialized { .. } => None,
                },
            })
            .await
            .map_err(ServiceError::EventError)?;

        if let Some((item_id, old_state, new_state)) = item_change {
            self.event_sender
                .send(Event::ItemStateChanged {
                    item_id,
                    old_state,
                    new_state,
                })
                .await
                .map_err(ServiceError::EventError)?;
        }

        Ok(assignment_id)
    }

    /// Closes an active assignment as returned. A serialized item goes back
    /// to `Available`; bulk quantities stay consumed — restocking happens
    /// only through an explicit new stock entry.
    #[instrument(skip(self))]
    pub async fn return_assignment(
        &self,
        assignment_id: Uuid,
        notes: Option<String>,
    ) -> Result<(), ServiceError> {
        self.close_assignment(assignment_id, ClosedReason::Returned, notes)
            .await
    }

    /// Closes an active assignment as cancelled. Meant for assignments
    /// created in error, hence the mandatory justification.
    #[instrument(skip(self))]
    pub async fn cancel_assignment(
        &self,
        assignment_id: Uuid,
        justification: String,
    ) -> Result<(), ServiceError> {
        if justification.trim().chars().count() < 5 {
            return Err(ServiceError::InvalidJustification(
                "justification must be at least 5 characters".into(),
            ));
        }

        self.close_assignment(assignment_id, ClosedReason::Cancelled, Some(justification))
            .await
    }

    async fn close_assignment(
        &self,
        assignment_id: Uuid,
        reason: ClosedReason,
        notes: Option<String>,
    ) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();

        let item_change = db
            .transaction::<_, Option<(Uuid, ItemState, ItemState)>, ServiceError>(move |txn| {
                Box::pin(async move {
                    let assignment = Assignment::find_by_id(assignment_id)
                        .lock_exclusive()
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?
                        .ok_or_else(|| {
                            ServiceError::NotFound(format!(
                                "Assignment {} not found",
                                assignment_id
                            ))
                        })?;

                    if !assignment.is_active() {
                        return Err(ServiceError::AlreadyClosed(assignment_id));
                    }

                    let origin = assignment.origin()?;
                    let mut item_change = None;

                    // Serialized origin returns the unit to service. Bulk
                    // origin deliberately does not restock.
                    if let Origin::Serialized { item_id } = origin {
                        let item = InventoryItem::find_by_id(item_id)
                            .lock_exclusive()
                            .one(txn)
                            .await
                            .map_err(ServiceError::db_error)?
                            .ok_or_else(|| {
                                ServiceError::NotFound(format!(
                                    "Inventory item {} not found",
                                    item_id
                                ))
                            })?;

                        let old_state = item.state;
                        let updated = transition_item(txn, item, ItemEvent::Return).await?;
                        item_change = Some((updated.id, old_state, updated.state));
                    }

                    let mut active: assignment::ActiveModel = assignment.into();
                    active.status = Set(AssignmentStatus::Closed);
                    active.closed_reason = Set(Some(reason));
                    active.returned_at = Set(Some(Utc::now()));
                    if let Some(notes) = notes {
                        active.notes = Set(Some(notes));
                    }
                    active.update(txn).await.map_err(ServiceError::db_error)?;

                    Ok(item_change)
                })
            })
            .await
            .map_err(unwrap_txn_error)?;

        info!(assignment_id = %assignment_id, reason = %reason, "Assignment closed");

        let event = match reason {
            ClosedReason::Returned => Event::AssignmentReturned { assignment_id },
            ClosedReason::Cancelled => Event::AssignmentCancelled { assignment_id },
        };
        self.event_sender
            .send(event)
            .await
            .map_err(ServiceError::EventError)?;

        if let Some((item_id, old_state, new_state)) = item_change {
            self.event_sender
                .send(Event::ItemStateChanged {
                    item_id,
                    old_state,
                    new_state,
                })
                .await
                .map_err(ServiceError::EventError)?;
        }

        Ok(())
    }

    /// Gets an assignment by ID
    #[instrument(skip(self))]
    pub async fn get_assignment(
        &self,
        assignment_id: Uuid,
    ) -> Result<Option<assignment::Model>, ServiceError> {
        let db = self.db_pool.as_ref();
        Assignment::find_by_id(assignment_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Lists assignments with pagination, newest first.
    #[instrument(skip(self))]
    pub async fn list_assignments(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<assignment::Model>, u64), ServiceError> {
        let db = self.db_pool.as_ref();

        let paginator = Assignment::find()
            .order_by_desc(assignment::Column::AssignedAt)
            .paginate(db, limit);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let assignments = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((assignments, total))
    }
}

/// The destination must reference an existing row of its kind.
async fn ensure_destination_exists(
    txn: &DatabaseTransaction,
    destination: &Destination,
) -> Result<(), ServiceError> {
    let found = match destination {
        Destination::Employee(id) => Employee::find_by_id(*id)
            .one(txn)
            .await
            .map_err(ServiceError::db_error)?
            .is_some(),
        Destination::Sector(id) => Sector::find_by_id(*id)
            .one(txn)
            .await
            .map_err(ServiceError::db_error)?
            .is_some(),
        Destination::Branch(id) => Branch::find_by_id(*id)
            .one(txn)
            .await
            .map_err(ServiceError::db_error)?
            .is_some(),
    };

    if !found {
        return Err(ServiceError::NotFound(format!(
            "{} destination does not exist",
            destination.kind()
        )));
    }

    Ok(())
}

/// Category-conditional sensitive fields must be present before anything
/// commits.
async fn require_category_fields(
    txn: &DatabaseTransaction,
    product: &product::Model,
    cmd: &CreateAssignmentCommand,
) -> Result<(), ServiceError> {
    let category = Category::find_by_id(product.category_id)
        .one(txn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Category {} not found", product.category_id))
        })?;

    if category.requires_encryption_password && is_blank(&cmd.encryption_password) {
        return Err(ServiceError::MissingRequiredField {
            field: "encryption_password",
            category: category.name,
        });
    }

    if category.requires_service_account && is_blank(&cmd.service_account) {
        return Err(ServiceError::MissingRequiredField {
            field: "service_account",
            category: category.name,
        });
    }

    Ok(())
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).unwrap_or("").is_empty()
}

/// Closes the active assignment for an item, if any, inside the caller's
/// transaction. Used when a repair or decommission pulls an assigned unit
/// out of circulation.
pub(crate) async fn close_active_assignment_for_item(
    txn: &DatabaseTransaction,
    item_id: Uuid,
    note: &str,
) -> Result<Option<Uuid>, ServiceError> {
    let active = Assignment::find()
        .filter(assignment::Column::ItemId.eq(item_id))
        .filter(assignment::Column::Status.eq(AssignmentStatus::Active))
        .lock_exclusive()
        .one(txn)
        .await
        .map_err(ServiceError::db_error)?;

    let Some(assignment) = active else {
        return Ok(None);
    };

    let id = assignment.id;
    let mut model: assignment::ActiveModel = assignment.into();
    model.status = Set(AssignmentStatus::Closed);
    model.closed_reason = Set(Some(ClosedReason::Returned));
    model.returned_at = Set(Some(Utc::now()));
    model.notes = Set(Some(note.to_string()));
    model.update(txn).await.map_err(ServiceError::db_error)?;

    Ok(Some(id))
}
