use crate::{
    db::DbPool,
    entities::{
        category::Entity as Category,
        inventory_item::{self, Entity as InventoryItem},
        product::{self, Entity as Product},
        stock_movement::{self, Entity as StockMovement},
    },
    errors::{unwrap_txn_error, ServiceError},
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateProductCommand {
    #[validate(length(min = 1, max = 100))]
    pub brand: String,
    #[validate(length(min = 1, max = 100))]
    pub model: String,
    pub category_id: Uuid,
    #[validate(range(min = 0))]
    pub minimum_stock: i32,
    pub serial_tracked: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateProductCommand {
    #[validate(length(min = 1, max = 100))]
    pub brand: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub model: Option<String>,
    #[validate(range(min = 0))]
    pub minimum_stock: Option<i32>,
    /// Only honored while the product has no inventory footprint.
    pub serial_tracked: Option<bool>,
}

/// Product catalog service. Products are never deleted; a product that
/// leaves circulation is deactivated and keeps its history.
#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ProductService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self))]
    pub async fn create_product(&self, command: CreateProductCommand) -> Result<Uuid, ServiceError> {
        command.validate()?;

        let db = self.db_pool.as_ref();

        Category::find_by_id(command.category_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Category {} not found", command.category_id))
            })?;

        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            brand: Set(command.brand.clone()),
            model: Set(command.model.clone()),
            category_id: Set(command.category_id),
            minimum_stock: Set(command.minimum_stock),
            serial_tracked: Set(command.serial_tracked),
            active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(db)
        .await
        .map_err(ServiceError::db_error)?;

        info!(product_id = %product.id, "Product created");

        self.event_sender
            .send(Event::ProductCreated(product.id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(product.id)
    }

    /// Updates catalog attributes. The tracking mode is immutable once any
    /// inventory item or stock movement references the product: flipping it
    /// would orphan either the serials or the ledger.
    #[instrument(skip(self))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        command: UpdateProductCommand,
    ) -> Result<(), ServiceError> {
        command.validate()?;

        let db = self.db_pool.as_ref();
        let cmd = command.clone();

        db.transaction::<_, (), ServiceError>(move |txn| {
            Box::pin(async move {
                let product = Product::find_by_id(product_id)
                    .lock_exclusive()
                    .one(txn)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Product {} not found", product_id))
                    })?;

                if let Some(serial_tracked) = cmd.serial_tracked {
                    if serial_tracked != product.serial_tracked {
                        let has_items = InventoryItem::find()
                            .filter(inventory_item::Column::ProductId.eq(product_id))
                            .count(txn)
                            .await
                            .map_err(ServiceError::db_error)?
                            > 0;
                        let has_movements = StockMovement::find()
                            .filter(stock_movement::Column::ProductId.eq(product_id))
                            .count(txn)
                            .await
                            .map_err(ServiceError::db_error)?
                            > 0;

                        if has_items || has_movements {
                            return Err(ServiceError::ValidationError(format!(
                                "Tracking mode of product {} is immutable: inventory already exists",
                                product_id
                            )));
                        }
                    }
                }

                let mut active: product::ActiveModel = product.into();
                if let Some(brand) = cmd.brand {
                    active.brand = Set(brand);
                }
                if let Some(model) = cmd.model {
                    active.model = Set(model);
                }
                if let Some(minimum_stock) = cmd.minimum_stock {
                    active.minimum_stock = Set(minimum_stock);
                }
                if let Some(serial_tracked) = cmd.serial_tracked {
                    active.serial_tracked = Set(serial_tracked);
                }
                active.updated_at = Set(Some(Utc::now()));
                active.update(txn).await.map_err(ServiceError::db_error)?;

                Ok(())
            })
        })
        .await
        .map_err(unwrap_txn_error)?;

        self.event_sender
            .send(Event::ProductUpdated(product_id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn deactivate_product(&self, product_id: Uuid) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();

        let product = Product::find_by_id(product_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let mut active: product::ActiveModel = product.into();
        active.active = Set(false);
        active.updated_at = Set(Some(Utc::now()));
        active.update(db).await.map_err(ServiceError::db_error)?;

        info!(product_id = %product_id, "Product deactivated");

        self.event_sender
            .send(Event::ProductDeactivated(product_id))
            .await
            .map_err(ServiceError::EventError)?;

        Ok(())
    }

    /// Gets a product by ID
    #[instrument(skip(self))]
    pub async fn get_product(
        &self,
        product_id: Uuid,
    ) -> Result<Option<product::Model>, ServiceError> {
        let db = self.db_pool.as_ref();
        Product::find_by_id(product_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Lists products with pagination.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<product::Model>, u64), ServiceError> {
        let db = self.db_pool.as_ref();

        let paginator = Product::find()
            .order_by_asc(product::Column::Brand)
            .order_by_asc(product::Column::Model)
            .paginate(db, limit);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let products = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db_error)?;

        Ok((products, total))
    }
}
