//! Manufacturing order entity - A request to produce some units of a product.
//!
//! The ingredient quantities are snapshotted into `order_ingredients` at creation,
//! so later formula edits never change an existing order.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Manufacturing order database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "manufacturing_orders")]
pub struct Model {
    /// Order number
    #[sea_orm(primary_key)]
    pub id: i64,
    /// The material being manufactured
    pub product_id: i64,
    /// Units to manufacture
    pub units: f64,
    /// When the order was created
    pub created_at: DateTimeUtc,
    /// Free-text notes
    pub notes: Option<String>,
    /// Client the order is produced for
    pub client_name: Option<String>,
    /// Proforma invoice number
    pub proforma_number: Option<String>,
}

/// Defines relationships between `ManufacturingOrder` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// The ordered product
    #[sea_orm(
        belongs_to = "super::material::Entity",
        from = "Column::ProductId",
        to = "super::material::Column::Id"
    )]
    Product,
    /// Snapshotted ingredient lines
    #[sea_orm(has_many = "super::order_ingredient::Entity")]
    Ingredients,
}

impl Related<super::material::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::order_ingredient::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ingredients.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
