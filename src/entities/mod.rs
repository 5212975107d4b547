//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod formula;
pub mod manufacturing_order;
pub mod material;
pub mod order_ingredient;

// Re-export specific types to avoid conflicts
pub use formula::{Column as FormulaColumn, Entity as Formula, Model as FormulaModel};
pub use manufacturing_order::{
    Column as ManufacturingOrderColumn, Entity as ManufacturingOrder,
    Model as ManufacturingOrderModel,
};
pub use material::{Column as MaterialColumn, Entity as Material, Model as MaterialModel};
pub use order_ingredient::{
    Column as OrderIngredientColumn, Entity as OrderIngredient, Model as OrderIngredientModel,
};
