use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Inventory record. The stock counters are informational counts, not
/// reservations; `total` must equal `available + in_use + damaged`, which
/// is enforced by service-level validation rather than the database.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate, ToSchema)]
#[sea_orm(table_name = "items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[validate(length(min = 1, max = 120, message = "Name must be between 1 and 120 characters"))]
    pub name: String,

    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,

    /// Minimum role required to request this item, stored lowercase;
    /// parsed through `Role::item_level_or_closed`.
    pub level: String,

    #[validate(range(min = 0, message = "Available count cannot be negative"))]
    pub available: i32,
    #[validate(range(min = 0, message = "In-use count cannot be negative"))]
    pub in_use: i32,
    #[validate(range(min = 0, message = "Damaged count cannot be negative"))]
    pub damaged: i32,
    pub total: i32,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::request_item::Entity")]
    RequestItems,
}

impl Related<super::request_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RequestItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
