//! Material entity - Raw inputs and manufactured products share one table.
//!
//! A material with rows in `formulas` (as `product_id`) is a manufactured product
//! and its price is derived from those rows. A material without formula rows is
//! a raw input whose price is set directly.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Material database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "materials")]
pub struct Model {
    /// Unique identifier for the material
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Unique display name (e.g., "Flour", "Cake")
    #[sea_orm(unique)]
    pub name: String,
    /// Optional unique external code, e.g. a supplier reference
    #[sea_orm(unique)]
    pub identifier: Option<String>,
    /// Free-text description
    pub description: String,
    /// Current unit price; `None` is read as 0 by the pricing engine
    pub price: Option<f64>,
    /// When the material was created
    pub created_at: DateTime,
    /// When the material was last modified
    pub updated_at: DateTime,
}

/// Defines relationships between Material and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Formula rows in which this material is the product
    #[sea_orm(has_many = "super::formula::Entity")]
    Formulas,
    /// Manufacturing orders for this material
    #[sea_orm(has_many = "super::manufacturing_order::Entity")]
    ManufacturingOrders,
}

impl Related<super::manufacturing_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ManufacturingOrders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
