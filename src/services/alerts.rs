use crate::{
    db::DbPool,
    entities::{
        product::{self, Entity as Product},
        stock_balance::Entity as StockBalance,
    },
    errors::ServiceError,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Classification of a balance against its configured minimum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, strum::Display)]
pub enum AlertLevel {
    Critical,
    Low,
    Normal,
}

/// Pure classification rule: out of stock is `Critical`, at or below the
/// minimum is `Low`.
pub fn alert_level(balance: i32, minimum_stock: i32) -> AlertLevel {
    if balance <= 0 {
        AlertLevel::Critical
    } else if balance <= minimum_stock {
        AlertLevel::Low
    } else {
        AlertLevel::Normal
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct StockAlert {
    pub product_id: Uuid,
    pub product_name: String,
    pub category_id: Uuid,
    pub balance: i32,
    pub minimum_stock: i32,
    pub level: AlertLevel,
}

/// Low-stock projection. Stateless: recomputed from current balance rows on
/// every request, never stored.
#[derive(Clone)]
pub struct AlertService {
    db_pool: Arc<DbPool>,
}

impl AlertService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Alerts for every active bulk product at or below its minimum,
    /// optionally filtered by category. A product with no movement history
    /// yet counts as balance 0.
    #[instrument(skip(self))]
    pub async fn list_low_stock_alerts(
        &self,
        category_id: Option<Uuid>,
    ) -> Result<Vec<StockAlert>, ServiceError> {
        let db = self.db_pool.as_ref();

        let mut query = Product::find()
            .filter(product::Column::Active.eq(true))
            .filter(product::Column::SerialTracked.eq(false));
        if let Some(category_id) = category_id {
            query = query.filter(product::Column::CategoryId.eq(category_id));
        }

        let rows = query
            .find_also_related(StockBalance)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut alerts: Vec<StockAlert> = rows
            .into_iter()
            .filter_map(|(product, balance)| {
                let balance = balance.map(|b| b.quantity).unwrap_or(0);
                match alert_level(balance, product.minimum_stock) {
                    AlertLevel::Normal => None,
                    level => Some(StockAlert {
                        product_id: product.id,
                        product_name: product.display_name(),
                        category_id: product.category_id,
                        balance,
                        minimum_stock: product.minimum_stock,
                        level,
                    }),
                }
            })
            .collect();

        // Most urgent first, then stable by name for operators scanning the list.
        alerts.sort_by(|a, b| {
            a.level
                .cmp(&b.level)
                .then_with(|| a.product_name.cmp(&b.product_name))
        });

        Ok(alerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, 5 => AlertLevel::Critical ; "empty balance is critical")]
    #[test_case(1, 5 => AlertLevel::Low ; "below minimum is low")]
    #[test_case(5, 5 => AlertLevel::Low ; "at minimum is low")]
    #[test_case(6, 5 => AlertLevel::Normal ; "above minimum is normal")]
    #[test_case(4, 5 => AlertLevel::Low ; "post exit scenario balance")]
    #[test_case(0, 0 => AlertLevel::Critical ; "zero minimum still flags empty")]
    #[test_case(1, 0 => AlertLevel::Normal ; "zero minimum with stock is normal")]
    fn classification(balance: i32, minimum: i32) -> AlertLevel {
        alert_level(balance, minimum)
    }

    #[test]
    fn critical_sorts_before_low() {
        assert!(AlertLevel::Critical < AlertLevel::Low);
        assert!(AlertLevel::Low < AlertLevel::Normal);
    }
}
