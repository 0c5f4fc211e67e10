use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Closed set of movement kinds. Stored as a string column; anything that does
/// not parse is rejected at the boundary rather than silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    In,
    Out,
    Adjust,
    TransferIn,
    TransferOut,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "IN",
            MovementType::Out => "OUT",
            MovementType::Adjust => "ADJUST",
            MovementType::TransferIn => "TRANSFER_IN",
            MovementType::TransferOut => "TRANSFER_OUT",
        }
    }

    /// Parses a caller-supplied movement type. `ADJUSTMENT` is accepted as a
    /// legacy alias of `ADJUST`. Matching is case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "IN" => Some(MovementType::In),
            "OUT" => Some(MovementType::Out),
            "ADJUST" | "ADJUSTMENT" => Some(MovementType::Adjust),
            "TRANSFER_IN" => Some(MovementType::TransferIn),
            "TRANSFER_OUT" => Some(MovementType::TransferOut),
            _ => None,
        }
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only audit record of one stock-quantity change. Transfer legs come
/// in pairs sharing a reference number, one row per warehouse side.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_movements")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub product_sku: String,
    pub warehouse_id: i64,
    pub previous_quantity: i32,
    pub new_quantity: i32,
    pub difference: i32,
    pub movement_type: String,
    pub reason: String,
    pub reference_number: Option<String>,
    pub performed_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductSku",
        to = "super::product::Column::Sku"
    )]
    Product,
    #[sea_orm(
        belongs_to = "super::warehouse::Entity",
        from = "Column::WarehouseId",
        to = "super::warehouse::Column::Id"
    )]
    Warehouse,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::warehouse::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Warehouse.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
