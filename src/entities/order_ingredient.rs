//! Order ingredient entity - Total quantity of one ingredient for one order.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order ingredient database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_ingredients")]
pub struct Model {
    /// Unique identifier for the line
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning manufacturing order
    pub order_id: i64,
    /// The consumed material
    pub ingredient_id: i64,
    /// Formula quantity multiplied by the order's units
    pub quantity: f64,
}

/// Defines relationships between `OrderIngredient` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each line belongs to one order
    #[sea_orm(
        belongs_to = "super::manufacturing_order::Entity",
        from = "Column::OrderId",
        to = "super::manufacturing_order::Column::Id"
    )]
    Order,
    /// The ingredient material
    #[sea_orm(
        belongs_to = "super::material::Entity",
        from = "Column::IngredientId",
        to = "super::material::Column::Id"
    )]
    Ingredient,
}

impl Related<super::manufacturing_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
