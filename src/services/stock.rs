use crate::{
    db::DbPool,
    entities::{
        assignment::Destination,
        product::{self, Entity as Product},
        stock_balance::{self, Entity as StockBalance},
        stock_movement::{self, Entity as StockMovement, MovementDirection},
    },
    errors::{unwrap_txn_error, ServiceError},
    events::{Event, EventSender},
    idempotency::{IdempotencyStore, StoredOperation},
};
use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

lazy_static! {
    static ref STOCK_ENTRIES: IntCounter = IntCounter::new(
        "stock_entries_total",
        "Total number of recorded stock entries"
    )
    .expect("metric can be created");
    static ref STOCK_EXITS: IntCounter =
        IntCounter::new("stock_exits_total", "Total number of recorded stock exits")
            .expect("metric can be created");
    static ref STOCK_EXIT_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "stock_exit_failures_total",
            "Total number of failed stock exits"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
    static ref IDEMPOTENT_REPLAYS: IntCounter = IntCounter::new(
        "stock_exit_idempotent_replays_total",
        "Stock exits answered from the idempotency cache"
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EntryCommand {
    pub product_id: Uuid,
    pub quantity: i32,
    #[validate(length(min = 1, max = 50))]
    pub reason: String,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExitCommand {
    pub product_id: Uuid,
    pub quantity: i32,
    #[validate(length(min = 1, max = 50))]
    pub reason: String,
    /// Optional: where the stock went (at most one of employee/sector/branch).
    pub destination: Option<Destination>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
    pub created_by: Uuid,
    /// Caller-generated id consumed by the idempotency guard.
    #[validate(length(min = 1, max = 128))]
    pub operation_id: String,
}

/// Outcome of a committed stock exit. Cached by the idempotency guard and
/// replayed verbatim for duplicate submissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitReceipt {
    pub movement_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub new_balance: i32,
    pub low_stock_triggered: bool,
}

/// Result of replaying a product's movement log against its stored balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub product_id: Uuid,
    pub stored_quantity: i32,
    pub replayed_quantity: i32,
    pub movement_count: usize,
    /// False when the stored balance diverges from the replay or the
    /// before/after chain is broken.
    pub consistent: bool,
}

/// Stock Ledger & Movement Engine: owns bulk-stock balances and the
/// append-only movement log behind them.
#[derive(Clone)]
pub struct StockService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    idempotency: Arc<dyn IdempotencyStore>,
}

impl StockService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        idempotency: Arc<dyn IdempotencyStore>,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            idempotency,
        }
    }

    /// Records an `Entry` movement and increments the balance, creating the
    /// balance row on first use. Returns the new balance.
    #[instrument(skip(self))]
    pub async fn record_entry(&self, command: EntryCommand) -> Result<i32, ServiceError> {
        if command.quantity <= 0 {
            return Err(ServiceError::InvalidQuantity(command.quantity));
        }
        command.validate()?;

        let db = self.db_pool.as_ref();
        let cmd = command.clone();

        let (movement_id, new_balance) = db
            .transaction::<_, (Uuid, i32), ServiceError>(move |txn| {
                Box::pin(async move {
                    let product = load_bulk_product(txn, cmd.product_id).await?;
                    let (movement, new_balance) = apply_movement(
                        txn,
                        &product,
                        MovementDirection::Entry,
                        cmd.quantity,
                        &cmd.reason,
                        cmd.notes.clone(),
                        None,
                        cmd.created_by,
                    )
                    .await?;
                    Ok((movement.id, new_balance))
                })
            })
            .await
            .map_err(unwrap_txn_error)?;

        STOCK_ENTRIES.inc();
        info!(
            product_id = %command.product_id,
            quantity = %command.quantity,
            new_balance = %new_balance,
            "Stock entry recorded"
        );

        self.event_sender
            .send(Event::StockEntryRecorded {
                movement_id,
                product_id: command.product_id,
                quantity: command.quantity,
                new_balance,
            })
            .await
            .map_err(ServiceError::EventError)?;

        Ok(new_balance)
    }

    /// The critical path: checks the balance, appends the `Exit` movement and
    /// decrements the balance in one transaction with the balance row locked.
    /// A replayed `operation_id` inside the guard window returns the cached
    /// receipt without touching the ledger.
    #[instrument(skip(self), fields(operation_id = %command.operation_id))]
    pub async fn record_exit(&self, command: ExitCommand) -> Result<ExitReceipt, ServiceError> {
        if command.quantity <= 0 {
            STOCK_EXIT_FAILURES
                .with_label_values(&["invalid_quantity"])
                .inc();
            return Err(ServiceError::InvalidQuantity(command.quantity));
        }
        command.validate()?;

        self.idempotency.purge_expired().await;
        if let Some(cached) = self.idempotency.get(&command.operation_id).await? {
            IDEMPOTENT_REPLAYS.inc();
            info!(operation_id = %command.operation_id, "Replaying completed stock exit");
            return Ok(cached.receipt);
        }

        let db = self.db_pool.as_ref();
        let cmd = command.clone();

        let (receipt, minimum_stock) = db
            .transaction::<_, (ExitReceipt, i32), ServiceError>(move |txn| {
                Box::pin(async move {
                    let product = load_bulk_product(txn, cmd.product_id).await?;
                    let (movement, new_balance) = apply_movement(
                        txn,
                        &product,
                        MovementDirection::Exit,
                        cmd.quantity,
                        &cmd.reason,
                        cmd.notes.clone(),
                        cmd.destination,
                        cmd.created_by,
                    )
                    .await?;

                    let receipt = ExitReceipt {
                        movement_id: movement.id,
                        product_id: product.id,
                        quantity: cmd.quantity,
                        new_balance,
                        low_stock_triggered: new_balance <= product.minimum_stock,
                    };
                    Ok((receipt, product.minimum_stock))
                })
            })
            .await
            .map_err(unwrap_txn_error)
            .map_err(|e| {
                let label = match &e {
                    ServiceError::InsufficientStock { .. } => "insufficient_stock",
                    ServiceError::NotFound(_) => "not_found",
                    _ => "transaction_error",
                };
                STOCK_EXIT_FAILURES.with_label_values(&[label]).inc();
                error!(product_id = %command.product_id, error = %e, "Stock exit rejected");
                e
            })?;

        self.idempotency
            .put(&command.operation_id, StoredOperation::new(receipt.clone()))
            .await?;

        STOCK_EXITS.inc();
        info!(
            product_id = %receipt.product_id,
            quantity = %receipt.quantity,
            new_balance = %receipt.new_balance,
            low_stock = %receipt.low_stock_triggered,
            "Stock exit recorded"
        );

        self.event_sender
            .send(Event::StockExitRecorded {
                movement_id: receipt.movement_id,
                product_id: receipt.product_id,
                quantity: receipt.quantity,
                new_balance: receipt.new_balance,
                low_stock_triggered: receipt.low_stock_triggered,
            })
            .await
            .map_err(ServiceError::EventError)?;

        if receipt.low_stock_triggered {
            self.event_sender
                .send(Event::LowStockDetected {
                    product_id: receipt.product_id,
                    balance: receipt.new_balance,
                    minimum_stock,
                })
                .await
                .map_err(ServiceError::EventError)?;
        }

        Ok(receipt)
    }

    /// Current balance for a product; 0 when no movement has happened yet.
    #[instrument(skip(self))]
    pub async fn get_balance(&self, product_id: Uuid) -> Result<i32, ServiceError> {
        let db = self.db_pool.as_ref();

        Product::find_by_id(product_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let balance = StockBalance::find_by_id(product_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(balance.map(|b| b.quantity).unwrap_or(0))
    }

    /// Movement log for a product, newest first.
    #[instrument(skip(self))]
    pub async fn list_movements(
        &self,
        product_id: Uuid,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<stock_movement::Model>, u64), ServiceError> {
        let db = self.db_pool.as_ref();

        let paginator = StockMovement::find()
            .filter(stock_movement::Column::ProductId.eq(product_id))
            .order_by_desc(stock_movement::Column::Sequence)
            .paginate(db, limit);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let movements = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((movements, total))
    }

    /// Replays the movement log in commit order and compares it against the
    /// stored balance. The stored quantity is only a materialized cache of
    /// this replay, so any divergence is data corruption worth surfacing.
    #[instrument(skip(self))]
    pub async fn reconcile_balance(&self, product_id: Uuid) -> Result<Reconciliation, ServiceError> {
        let db = self.db_pool.as_ref();

        Product::find_by_id(product_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let movements = StockMovement::find()
            .filter(stock_movement::Column::ProductId.eq(product_id))
            .order_by_asc(stock_movement::Column::Sequence)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let stored_quantity = StockBalance::find_by_id(product_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .map(|b| b.quantity)
            .unwrap_or(0);

        let replayed_quantity = replay_balance(&movements);
        let chain_ok = movement_chain_is_consistent(&movements);

        Ok(Reconciliation {
            product_id,
            stored_quantity,
            replayed_quantity,
            movement_count: movements.len(),
            consistent: chain_ok && stored_quantity == replayed_quantity,
        })
    }
}

/// Running sum of all movement deltas, in replay order.
pub fn replay_balance(movements: &[stock_movement::Model]) -> i32 {
    movements
        .iter()
        .map(|m| m.direction.signed(m.quantity))
        .sum::<i64>() as i32
}

/// Verifies every movement's before/after pair links to its predecessor.
fn movement_chain_is_consistent(movements: &[stock_movement::Model]) -> bool {
    let mut running: i64 = 0;
    for m in movements {
        if i64::from(m.balance_before) != running {
            return false;
        }
        running += m.direction.signed(m.quantity);
        if i64::from(m.balance_after) != running {
            return false;
        }
        if running < 0 {
            return false;
        }
    }
    true
}

pub(crate) async fn load_bulk_product(
    txn: &DatabaseTransaction,
    product_id: Uuid,
) -> Result<product::Model, ServiceError> {
    let product = Product::find_by_id(product_id)
        .one(txn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

    if product.serial_tracked {
        return Err(ServiceError::ValidationError(format!(
            "Product {} is serial-tracked; quantities move through inventory items, not the stock ledger",
            product.id
        )));
    }

    Ok(product)
}

/// Appends a movement and updates the balance row inside the caller's
/// transaction. The balance row is read with an exclusive lock so concurrent
/// writers to the same product serialize at the data store; the incremented
/// `version` becomes the movement's replay sequence.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn apply_movement(
    txn: &DatabaseTransaction,
    product: &product::Model,
    direction: MovementDirection,
    quantity: i32,
    reason: &str,
    notes: Option<String>,
    destination: Option<Destination>,
    created_by: Uuid,
) -> Result<(stock_movement::Model, i32), ServiceError> {
    let existing = StockBalance::find_by_id(product.id)
        .lock_exclusive()
        .one(txn)
        .await
        .map_err(ServiceError::db_error)?;

    let balance_before = existing.as_ref().map(|b| b.quantity).unwrap_or(0);
    let version_before = existing.as_ref().map(|b| b.version).unwrap_or(0);

    if direction == MovementDirection::Exit && quantity > balance_before {
        return Err(ServiceError::InsufficientStock {
            product_id: product.id,
            requested: quantity,
            available: balance_before,
        });
    }

    let balance_after = i64::from(balance_before) + direction.signed(quantity);
    if balance_after > i64::from(i32::MAX) {
        return Err(ServiceError::ValidationError(format!(
            "Balance for product {} would overflow",
            product.id
        )));
    }
    let balance_after = balance_after as i32;
    let sequence = version_before + 1;
    let now = Utc::now();

    let movement = stock_movement::ActiveModel {
        id: Set(Uuid::new_v4()),
        product_id: Set(product.id),
        direction: Set(direction),
        quantity: Set(quantity),
        balance_before: Set(balance_before),
        balance_after: Set(balance_after),
        sequence: Set(sequence),
        reason: Set(reason.to_string()),
        notes: Set(notes),
        employee_id: Set(destination.and_then(|d| d.employee_id())),
        sector_id: Set(destination.and_then(|d| d.sector_id())),
        branch_id: Set(destination.and_then(|d| d.branch_id())),
        created_by: Set(created_by),
        occurred_at: Set(now),
    }
    .insert(txn)
    .await
    .map_err(ServiceError::db_error)?;

    match existing {
        Some(balance) => {
            let mut active: stock_balance::ActiveModel = balance.into();
            active.quantity = Set(balance_after);
            active.version = Set(sequence);
            active.updated_at = Set(now);
            active.update(txn).await.map_err(ServiceError::db_error)?;
        }
        None => {
            stock_balance::ActiveModel {
                product_id: Set(product.id),
                quantity: Set(balance_after),
                version: Set(sequence),
                updated_at: Set(now),
            }
            .insert(txn)
            .await
            .map_err(ServiceError::db_error)?;
        }
    }

    Ok((movement, balance_after))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movement(
        direction: MovementDirection,
        quantity: i32,
        before: i32,
        after: i32,
        sequence: i64,
    ) -> stock_movement::Model {
        stock_movement::Model {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            direction,
            quantity,
            balance_before: before,
            balance_after: after,
            sequence,
            reason: "test".into(),
            notes: None,
            employee_id: None,
            sector_id: None,
            branch_id: None,
            created_by: Uuid::new_v4(),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn replay_sums_signed_deltas() {
        let log = vec![
            movement(MovementDirection::Entry, 10, 0, 10, 1),
            movement(MovementDirection::Exit, 6, 10, 4, 2),
            movement(MovementDirection::Entry, 1, 4, 5, 3),
        ];
        assert_eq!(replay_balance(&log), 5);
    }

    #[test]
    fn chain_check_accepts_linked_log() {
        let log = vec![
            movement(MovementDirection::Entry, 10, 0, 10, 1),
            movement(MovementDirection::Exit, 10, 10, 0, 2),
        ];
        assert!(movement_chain_is_consistent(&log));
    }

    #[test]
    fn chain_check_rejects_broken_links_and_negative_dips() {
        let broken = vec![
            movement(MovementDirection::Entry, 10, 0, 10, 1),
            movement(MovementDirection::Exit, 2, 9, 7, 2),
        ];
        assert!(!movement_chain_is_consistent(&broken));

        let negative = vec![movement(MovementDirection::Exit, 1, 0, -1, 1)];
        assert!(!movement_chain_is_consistent(&negative));
    }

    #[test]
    fn empty_log_replays_to_zero() {
        assert_eq!(replay_balance(&[]), 0);
        assert!(movement_chain_is_consistent(&[]));
    }
}
