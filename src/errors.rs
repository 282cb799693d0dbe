use sea_orm::error::DbErr;
use uuid::Uuid;

use crate::entities::inventory_item::ItemState;

/// Unified error type for the inventory core.
///
/// Three families matter to callers: validation errors (bad input, rejected
/// before any transaction starts), state-conflict errors (detected inside the
/// atomic check-and-mutate, always aborting with zero side effects) and
/// not-found errors. Everything else is infrastructure.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i32),

    #[error("Invalid destination: exactly one of employee, sector or branch must be set")]
    InvalidDestination,

    #[error("Invalid origin: exactly one of inventory item or (product, quantity) must be set")]
    InvalidOrigin,

    #[error("Missing required field `{field}` for category {category}")]
    MissingRequiredField { field: &'static str, category: String },

    #[error("Invalid justification: {0}")]
    InvalidJustification(String),

    #[error("Item {item_id} is not available for assignment (current state: {state})")]
    ItemUnavailable { item_id: Uuid, state: ItemState },

    #[error("Item {item_id} cannot enter repair (current state: {state})")]
    InvalidStateForRepair { item_id: Uuid, state: ItemState },

    #[error("Item {item_id} is decommissioned and accepts no further transitions")]
    ItemDecommissioned { item_id: Uuid },

    #[error("Invalid transition for item {item_id}: {event} from state {state}")]
    InvalidTransition {
        item_id: Uuid,
        state: ItemState,
        event: &'static str,
    },

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        requested: i32,
        available: i32,
    },

    #[error("Record {0} is already closed")]
    AlreadyClosed(Uuid),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl IntoDbErr for &str {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self.to_string())
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        ServiceError::DatabaseError(error.into_db_err())
    }

    /// Whether the caller can recover by correcting input and retrying.
    /// Infrastructure failures are the only non-recoverable family.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::DatabaseError(_)
                | Self::EventError(_)
                | Self::CacheError(_)
                | Self::InternalError(_)
                | Self::Other(_)
        )
    }
}

/// Unwraps sea-orm's transaction error wrapper back into a `ServiceError`.
pub fn unwrap_txn_error(err: sea_orm::TransactionError<ServiceError>) -> ServiceError {
    match err {
        sea_orm::TransactionError::Connection(db_err) => ServiceError::DatabaseError(db_err),
        sea_orm::TransactionError::Transaction(service_err) => service_err,
    }
}

// Result extensions for easier error handling
pub trait ResultExt<T> {
    fn map_err_to_service(self) -> Result<T, ServiceError>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<ServiceError>,
{
    fn map_err_to_service(self) -> Result<T, ServiceError> {
        self.map_err(|e| e.into())
    }
}
