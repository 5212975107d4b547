//! Catalog seeding - Fills the database from a [`CatalogConfig`].
//!
//! Seeding is additive: materials are matched by name and only missing ones are
//! created, and a configured formula is only installed on a product that has no
//! formula yet. Running it on every start is therefore safe.

use crate::{
    config::catalog::CatalogConfig,
    core::{
        formula::has_formula,
        material::{NewMaterial, create_material, get_material_by_name},
        pricing::SqlPricingEngine,
        store::FormulaEdge,
    },
    errors::{Error, Result},
};
use tracing::{debug, info};

/// What [`seed_catalog`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    /// Materials that did not exist yet
    pub materials_created: usize,
    /// Formulas installed on products that had none
    pub formulas_installed: usize,
}

/// Creates missing materials and installs missing formulas.
///
/// # Errors
/// Returns a `Config` error when a formula names a material that exists
/// neither in the database nor in the catalog, or any error from material
/// creation and formula replacement.
pub async fn seed_catalog(
    engine: &SqlPricingEngine,
    config: &CatalogConfig,
) -> Result<SeedSummary> {
    let db = engine.store().connection();
    let mut summary = SeedSummary::default();

    for entry in &config.materials {
        if get_material_by_name(db, entry.name.trim()).await?.is_some() {
            debug!(name = %entry.name, "Material already present");
            continue;
        }
        create_material(
            db,
            NewMaterial {
                name: entry.name.clone(),
                description: entry.description.clone(),
                identifier: entry.identifier.clone(),
                price: entry.price,
            },
        )
        .await?;
        summary.materials_created += 1;
    }

    for entry in &config.formulas {
        let product = lookup(db, &entry.product).await?;
        if has_formula(db, product).await? {
            debug!(product = %entry.product, "Formula already present");
            continue;
        }

        let mut edges = Vec::with_capacity(entry.ingredients.len());
        for ingredient in &entry.ingredients {
            edges.push(FormulaEdge::new(
                lookup(db, &ingredient.name).await?,
                ingredient.quantity,
            ));
        }
        engine.replace_formula(product, edges).await?;
        summary.formulas_installed += 1;
    }

    info!(
        materials = summary.materials_created,
        formulas = summary.formulas_installed,
        "Catalog seeded"
    );
    Ok(summary)
}

async fn lookup(db: &sea_orm::DatabaseConnection, name: &str) -> Result<i64> {
    get_material_by_name(db, name.trim())
        .await?
        .map(|m| m.id)
        .ok_or_else(|| Error::Config {
            message: format!("Catalog references unknown material '{name}'"),
        })
}
