use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;

/// Assignment lifecycle: `Active` until returned or cancelled, then `Closed`.
/// Return and cancel differ only in recorded metadata, not in transitions.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum AssignmentStatus {
    #[sea_orm(string_value = "Active")]
    Active,
    #[sea_orm(string_value = "Closed")]
    Closed,
}

/// How an assignment reached `Closed`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum ClosedReason {
    #[sea_orm(string_value = "Returned")]
    Returned,
    #[sea_orm(string_value = "Cancelled")]
    Cancelled,
}

/// Exactly one destination per assignment (and optionally per stock exit).
/// The tagged union makes the exclusivity invariant structural; the nullable
/// foreign-key triple exists only at the persistence edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Destination {
    Employee(Uuid),
    Sector(Uuid),
    Branch(Uuid),
}

impl Destination {
    /// Builds a destination from the raw nullable ids an API layer submits.
    /// Zero or more than one set id is `InvalidDestination`.
    pub fn from_parts(
        employee_id: Option<Uuid>,
        sector_id: Option<Uuid>,
        branch_id: Option<Uuid>,
    ) -> Result<Self, ServiceError> {
        match (employee_id, sector_id, branch_id) {
            (Some(id), None, None) => Ok(Destination::Employee(id)),
            (None, Some(id), None) => Ok(Destination::Sector(id)),
            (None, None, Some(id)) => Ok(Destination::Branch(id)),
            _ => Err(ServiceError::InvalidDestination),
        }
    }

    /// Same as `from_parts` but tolerates the all-`None` case; used by stock
    /// exits, where a destination is optional.
    pub fn from_parts_optional(
        employee_id: Option<Uuid>,
        sector_id: Option<Uuid>,
        branch_id: Option<Uuid>,
    ) -> Result<Option<Self>, ServiceError> {
        if employee_id.is_none() && sector_id.is_none() && branch_id.is_none() {
            return Ok(None);
        }
        Self::from_parts(employee_id, sector_id, branch_id).map(Some)
    }

    pub fn employee_id(&self) -> Option<Uuid> {
        match self {
            Destination::Employee(id) => Some(*id),
            _ => None,
        }
    }

    pub fn sector_id(&self) -> Option<Uuid> {
        match self {
            Destination::Sector(id) => Some(*id),
            _ => None,
        }
    }

    pub fn branch_id(&self) -> Option<Uuid> {
        match self {
            Destination::Branch(id) => Some(*id),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Destination::Employee(_) => "employee",
            Destination::Sector(_) => "sector",
            Destination::Branch(_) => "branch",
        }
    }
}

/// Exactly one origin per assignment: a serialized unit or a quantity of
/// bulk stock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    Serialized { item_id: Uuid },
    Bulk { product_id: Uuid, quantity: i32 },
}

impl Origin {
    /// Builds an origin from raw nullable parts. Both set or neither set is
    /// `InvalidOrigin`; a bulk origin additionally needs a positive quantity.
    pub fn from_parts(
        item_id: Option<Uuid>,
        product_id: Option<Uuid>,
        quantity: Option<i32>,
    ) -> Result<Self, ServiceError> {
        match (item_id, product_id) {
            (Some(item_id), None) => Ok(Origin::Serialized { item_id }),
            (None, Some(product_id)) => {
                let quantity = quantity.ok_or(ServiceError::InvalidOrigin)?;
                if quantity <= 0 {
                    return Err(ServiceError::InvalidQuantity(quantity));
                }
                Ok(Origin::Bulk {
                    product_id,
                    quantity,
                })
            }
            _ => Err(ServiceError::InvalidOrigin),
        }
    }

    pub fn item_id(&self) -> Option<Uuid> {
        match self {
            Origin::Serialized { item_id } => Some(*item_id),
            Origin::Bulk { .. } => None,
        }
    }

    pub fn is_bulk(&self) -> bool {
        matches!(self, Origin::Bulk { .. })
    }
}

/// The `assignments` table. Historical record: rows are closed, never
/// deleted.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "assignments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Serialized origin; mutually exclusive with `product_id`/`quantity`.
    pub item_id: Option<Uuid>,
    /// Bulk origin; mutually exclusive with `item_id`.
    pub product_id: Option<Uuid>,
    pub quantity: Option<i32>,
    pub employee_id: Option<Uuid>,
    pub sector_id: Option<Uuid>,
    pub branch_id: Option<Uuid>,
    pub status: AssignmentStatus,
    pub closed_reason: Option<ClosedReason>,
    pub encryption_password: Option<String>,
    pub service_account: Option<String>,
    pub notes: Option<String>,
    pub assigned_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::inventory_item::Entity",
        from = "Column::ItemId",
        to = "super::inventory_item::Column::Id"
    )]
    InventoryItem,
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::inventory_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryItem.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Reconstructs the typed origin from the persisted nullable columns.
    pub fn origin(&self) -> Result<Origin, ServiceError> {
        Origin::from_parts(self.item_id, self.product_id, self.quantity)
    }

    pub fn is_active(&self) -> bool {
        self.status == AssignmentStatus::Active
    }
}
