use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a serialized unit.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum ItemState {
    #[sea_orm(string_value = "Available")]
    Available,
    #[sea_orm(string_value = "Assigned")]
    Assigned,
    #[sea_orm(string_value = "InRepair")]
    InRepair,
    #[sea_orm(string_value = "Decommissioned")]
    Decommissioned,
}

/// Events that drive the item state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemEvent {
    /// Assignment creation.
    Assign,
    /// Assignment return or cancel.
    Return,
    /// Repair opened.
    SendToRepair,
    /// Repair closed. A written-off unit leaves service permanently;
    /// repaired and unrepaired units both go back to `Available`.
    RepairClosed { written_off: bool },
    /// Terminal write-off with justification.
    Decommission,
}

impl ItemEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ItemEvent::Assign => "assign",
            ItemEvent::Return => "return",
            ItemEvent::SendToRepair => "send_to_repair",
            ItemEvent::RepairClosed { .. } => "repair_closed",
            ItemEvent::Decommission => "decommission",
        }
    }
}

/// Why a transition was refused. The service layer attaches the item id and
/// maps these onto `ServiceError` variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionError {
    /// Assignment requested while not `Available`.
    Unavailable,
    /// Repair requested while already `InRepair` or `Decommissioned`.
    InvalidStateForRepair,
    /// Any event against the terminal state.
    Decommissioned,
    /// Event not defined for the current state.
    Invalid,
}

impl ItemState {
    /// The state × event transition table. This is the single definition of
    /// the serialized-item lifecycle; services never branch on states
    /// themselves.
    pub fn transition(self, event: ItemEvent) -> Result<ItemState, TransitionError> {
        use ItemEvent::*;
        use ItemState::*;

        match (self, event) {
            (Decommissioned, _) => Err(TransitionError::Decommissioned),
            (_, Decommission) => Ok(Decommissioned),

            (Available, Assign) => Ok(Assigned),
            (state, Assign) if state != Available => Err(TransitionError::Unavailable),

            (Assigned, Return) => Ok(Available),

            (Available | Assigned, SendToRepair) => Ok(InRepair),
            (InRepair, SendToRepair) => Err(TransitionError::InvalidStateForRepair),

            (InRepair, RepairClosed { written_off: true }) => Ok(Decommissioned),
            (InRepair, RepairClosed { written_off: false }) => Ok(Available),

            _ => Err(TransitionError::Invalid),
        }
    }

    pub fn is_terminal(self) -> bool {
        self == ItemState::Decommissioned
    }
}

/// The `inventory_items` table. One row per physical serialized unit; rows
/// are never deleted, the lifecycle ends at `Decommissioned`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub product_id: Uuid,
    /// Canonical form: trimmed and upper-cased at registration. Immutable.
    #[sea_orm(unique)]
    pub serial_number: String,
    pub state: ItemState,
    pub decommission_reason: Option<String>,
    pub decommissioned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
    #[sea_orm(has_many = "super::assignment::Entity")]
    Assignments,
    #[sea_orm(has_many = "super::repair::Entity")]
    Repairs,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::assignment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assignments.def()
    }
}

impl Related<super::repair::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Repairs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Canonical serial form used for storage and uniqueness checks.
pub fn normalize_serial(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use test_case::test_case;

    #[test_case(ItemState::Available, ItemEvent::Assign => ItemState::Assigned)]
    #[test_case(ItemState::Assigned, ItemEvent::Return => ItemState::Available)]
    #[test_case(ItemState::Available, ItemEvent::SendToRepair => ItemState::InRepair)]
    #[test_case(ItemState::Assigned, ItemEvent::SendToRepair => ItemState::InRepair)]
    #[test_case(ItemState::InRepair, ItemEvent::RepairClosed { written_off: false } => ItemState::Available)]
    #[test_case(ItemState::InRepair, ItemEvent::RepairClosed { written_off: true } => ItemState::Decommissioned)]
    #[test_case(ItemState::Available, ItemEvent::Decommission => ItemState::Decommissioned)]
    #[test_case(ItemState::Assigned, ItemEvent::Decommission => ItemState::Decommissioned)]
    #[test_case(ItemState::InRepair, ItemEvent::Decommission => ItemState::Decommissioned)]
    fn allowed_transitions(state: ItemState, event: ItemEvent) -> ItemState {
        state.transition(event).unwrap()
    }

    #[test]
    fn assign_requires_available() {
        assert_matches!(
            ItemState::Assigned.transition(ItemEvent::Assign),
            Err(TransitionError::Unavailable)
        );
        assert_matches!(
            ItemState::InRepair.transition(ItemEvent::Assign),
            Err(TransitionError::Unavailable)
        );
    }

    #[test]
    fn repair_rejected_when_already_in_repair() {
        assert_matches!(
            ItemState::InRepair.transition(ItemEvent::SendToRepair),
            Err(TransitionError::InvalidStateForRepair)
        );
    }

    #[test]
    fn decommissioned_is_terminal_for_every_event() {
        let events = [
            ItemEvent::Assign,
            ItemEvent::Return,
            ItemEvent::SendToRepair,
            ItemEvent::RepairClosed { written_off: false },
            ItemEvent::RepairClosed { written_off: true },
            ItemEvent::Decommission,
        ];
        for event in events {
            assert_matches!(
                ItemState::Decommissioned.transition(event),
                Err(TransitionError::Decommissioned),
                "event {:?} must be refused from the terminal state",
                event
            );
        }
        assert!(ItemState::Decommissioned.is_terminal());
    }

    #[test]
    fn undefined_transitions_are_invalid() {
        assert_matches!(
            ItemState::Available.transition(ItemEvent::Return),
            Err(TransitionError::Invalid)
        );
        assert_matches!(
            ItemState::Available.transition(ItemEvent::RepairClosed { written_off: false }),
            Err(TransitionError::Invalid)
        );
        assert_matches!(
            ItemState::Assigned.transition(ItemEvent::RepairClosed { written_off: true }),
            Err(TransitionError::Invalid)
        );
    }

    #[test]
    fn serial_numbers_are_case_normalized() {
        assert_eq!(normalize_serial("  abC-1234 "), "ABC-1234");
        assert_eq!(normalize_serial("XY99"), "XY99");
    }
}
