//! Catalog configuration loading from catalog.toml
//!
//! The catalog file lists materials and product formulas used to seed an empty
//! (or partially filled) database. Ingredients are referenced by material name.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Catalog file used when `CATALOG_PATH` is not set.
pub const DEFAULT_CATALOG_PATH: &str = "catalog.toml";

/// Configuration structure representing the entire catalog.toml file
#[derive(Debug, Default, Deserialize)]
pub struct CatalogConfig {
    /// Materials to create when missing
    #[serde(default)]
    pub materials: Vec<MaterialConfig>,
    /// Formulas to install on products that have none yet
    #[serde(default)]
    pub formulas: Vec<FormulaConfig>,
}

/// Configuration for a single material
#[derive(Debug, Deserialize, Clone)]
pub struct MaterialConfig {
    /// Unique display name
    pub name: String,
    /// Optional external identifier
    #[serde(default)]
    pub identifier: Option<String>,
    /// Free-text description
    #[serde(default)]
    pub description: String,
    /// Unit price; products get theirs from their formula
    #[serde(default)]
    pub price: f64,
}

/// A product's formula
#[derive(Debug, Deserialize, Clone)]
pub struct FormulaConfig {
    /// Name of the product material
    pub product: String,
    /// Ingredient lines, per product unit
    pub ingredients: Vec<IngredientConfig>,
}

/// One ingredient line of a [`FormulaConfig`]
#[derive(Debug, Deserialize, Clone)]
pub struct IngredientConfig {
    /// Name of the ingredient material
    pub name: String,
    /// Units per product unit
    pub quantity: f64,
}

/// Gets the catalog path from `CATALOG_PATH` or returns [`DEFAULT_CATALOG_PATH`].
#[must_use]
pub fn get_catalog_path() -> String {
    std::env::var("CATALOG_PATH").unwrap_or_else(|_| DEFAULT_CATALOG_PATH.to_string())
}

/// Loads catalog configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Required fields are missing
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CatalogConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read catalog file: {e}"),
    })?;

    parse_config(&contents)
}

/// Parses catalog configuration from TOML text.
pub fn parse_config(contents: &str) -> Result<CatalogConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse catalog.toml: {e}"),
    })
}
