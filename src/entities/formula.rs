//! Formula entity - One weighted edge of a product's bill of materials.
//!
//! `quantity` is the number of ingredient units consumed per product unit.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Formula row database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "formulas")]
pub struct Model {
    /// Unique identifier for the row
    #[sea_orm(primary_key)]
    pub id: i64,
    /// The manufactured material this row belongs to
    pub product_id: i64,
    /// The material consumed
    pub ingredient_id: i64,
    /// Ingredient units per product unit
    pub quantity: f64,
}

/// Defines relationships between Formula and Material
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// The product owning this row
    #[sea_orm(
        belongs_to = "super::material::Entity",
        from = "Column::ProductId",
        to = "super::material::Column::Id"
    )]
    Product,
    /// The ingredient referenced by this row
    #[sea_orm(
        belongs_to = "super::material::Entity",
        from = "Column::IngredientId",
        to = "super::material::Column::Id"
    )]
    Ingredient,
}

impl Related<super::material::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
