//! Read-side views over formulas for display and order collaborators.
//!
//! Formula writes go through [`crate::core::pricing::PricingEngine::replace_formula`]
//! so prices stay consistent; this module only reads.

use crate::{
    entities::{Formula, Material, formula, material},
    errors::Result,
};
use sea_orm::{QueryOrder, QuerySelect, prelude::*};
use std::collections::HashMap;

/// One ingredient of a product's formula, joined with the ingredient row.
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaLine {
    /// The consumed material
    pub ingredient_id: i64,
    /// Ingredient display name
    pub ingredient_name: String,
    /// Ingredient units per product unit
    pub quantity: f64,
    /// Current ingredient price, if any
    pub price: Option<f64>,
}

impl FormulaLine {
    /// Contribution of this line to the product price.
    #[must_use]
    pub fn cost(&self) -> f64 {
        self.price.unwrap_or(0.0) * self.quantity
    }
}

/// The formula of `product_id`, ordered by ingredient name.
pub async fn get_formula_lines<C>(db: &C, product_id: i64) -> Result<Vec<FormulaLine>>
where
    C: ConnectionTrait,
{
    let rows = Formula::find()
        .filter(formula::Column::ProductId.eq(product_id))
        .all(db)
        .await?;
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ingredient_ids: Vec<i64> = rows.iter().map(|row| row.ingredient_id).collect();
    let ingredients: HashMap<i64, material::Model> = Material::find()
        .filter(material::Column::Id.is_in(ingredient_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|m| (m.id, m))
        .collect();

    let mut lines: Vec<FormulaLine> = rows
        .into_iter()
        .filter_map(|row| {
            ingredients.get(&row.ingredient_id).map(|ingredient| FormulaLine {
                ingredient_id: row.ingredient_id,
                ingredient_name: ingredient.name.clone(),
                quantity: row.quantity,
                price: ingredient.price,
            })
        })
        .collect();
    lines.sort_by(|a, b| a.ingredient_name.cmp(&b.ingredient_name));
    Ok(lines)
}

/// Whether `product_id` has at least one formula row.
pub async fn has_formula(db: &DatabaseConnection, product_id: i64) -> Result<bool> {
    Ok(Formula::find()
        .filter(formula::Column::ProductId.eq(product_id))
        .one(db)
        .await?
        .is_some())
}

/// Materials that have a formula, ordered by name.
pub async fn list_products(db: &DatabaseConnection) -> Result<Vec<material::Model>> {
    let product_ids: Vec<i64> = Formula::find()
        .select_only()
        .column(formula::Column::ProductId)
        .distinct()
        .into_tuple::<i64>()
        .all(db)
        .await?;

    Material::find()
        .filter(material::Column::Id.is_in(product_ids))
        .order_by_asc(material::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}
