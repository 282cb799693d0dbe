use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction of a stock movement.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
pub enum MovementDirection {
    #[sea_orm(string_value = "Entry")]
    Entry,
    #[sea_orm(string_value = "Exit")]
    Exit,
}

impl MovementDirection {
    /// Signed contribution of a movement with this direction to the balance.
    pub fn signed(self, quantity: i32) -> i64 {
        match self {
            MovementDirection::Entry => i64::from(quantity),
            MovementDirection::Exit => -i64::from(quantity),
        }
    }
}

/// The `stock_movements` table: the append-only audit trail for bulk stock.
/// Rows are never updated or deleted; the stored balance is reconstructible
/// by replaying them in `sequence` order.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    pub direction: MovementDirection,
    pub quantity: i32,
    pub balance_before: i32,
    pub balance_after: i32,
    /// Per-product commit-order sequence (the balance version written with
    /// this movement). Replay order must match write order, and wall clocks
    /// alone cannot guarantee that.
    pub sequence: i64,
    pub reason: String,
    pub notes: Option<String>,
    pub employee_id: Option<Uuid>,
    pub sector_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub created_by: Uuid,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        if let ActiveValue::NotSet = active_model.occurred_at {
            active_model.occurred_at = Set(Utc::now());
        }
        Ok(active_model)
    }
}
