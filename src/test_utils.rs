//! Shared test utilities for formula-buddy.
//!
//! This module provides helpers for setting up in-memory test databases, an
//! engine wired to them, and [`MemoryStore`], a store double with failure
//! injection for exercising the engine's error paths.
#![allow(clippy::unwrap_used)]

use crate::{
    core::{
        material::{NewMaterial, create_material},
        pricing::{PricingEngine, SqlPricingEngine},
        store::{FormulaEdge, FormulaStore, MaterialStore, SeaOrmStore},
    },
    entities,
    errors::{Error, Result},
};
use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DbErr};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a test database and a pricing engine over it.
pub async fn setup_engine() -> Result<(DatabaseConnection, SqlPricingEngine)> {
    let db = setup_test_db().await?;
    let engine = PricingEngine::new(SeaOrmStore::new(db.clone()));
    Ok((db, engine))
}

/// Creates a test material with the given price and no identifier request.
pub async fn create_test_material(
    db: &DatabaseConnection,
    name: &str,
    price: f64,
) -> Result<entities::material::Model> {
    create_material(db, NewMaterial::named(name, price)).await
}

/// Sets up Flour (2.0), Sugar (3.0) and Cake = 2×Flour + 1×Sugar.
/// Returns (db, engine, cake).
pub async fn setup_with_cake() -> Result<(
    DatabaseConnection,
    SqlPricingEngine,
    entities::material::Model,
)> {
    let (db, engine) = setup_engine().await?;
    let flour = create_test_material(&db, "Flour", 2.0).await?;
    let sugar = create_test_material(&db, "Sugar", 3.0).await?;
    let cake = create_test_material(&db, "Cake", 0.0).await?;
    engine
        .replace_formula(
            cake.id,
            vec![FormulaEdge::new(flour.id, 2.0), FormulaEdge::new(sugar.id, 1.0)],
        )
        .await?;
    Ok((db, engine, cake))
}

#[derive(Debug, Default)]
struct MemoryState {
    prices: BTreeMap<i64, Option<f64>>,
    edges: HashMap<i64, Vec<FormulaEdge>>,
    set_price_calls: Vec<i64>,
    fail_set_price_on: Option<i64>,
    fail_replace_edges: bool,
}

/// In-memory [`MaterialStore`] + [`FormulaStore`].
///
/// Setup helpers write state directly and are not recorded in
/// [`MemoryStore::set_price_calls`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_material(&self, id: i64, price: Option<f64>) {
        self.state.lock().unwrap().prices.insert(id, price);
    }

    /// Installs `(ingredient_id, quantity)` edges without repricing anything.
    pub fn set_formula(&self, product_id: i64, edges: &[(i64, f64)]) {
        let edges = edges
            .iter()
            .map(|(ingredient_id, quantity)| FormulaEdge::new(*ingredient_id, *quantity))
            .collect();
        self.state.lock().unwrap().edges.insert(product_id, edges);
    }

    pub fn set_price_directly(&self, id: i64, price: f64) {
        self.state.lock().unwrap().prices.insert(id, Some(price));
    }

    pub fn price(&self, id: i64) -> Option<f64> {
        self.state.lock().unwrap().prices.get(&id).copied().flatten()
    }

    pub fn prices(&self) -> BTreeMap<i64, Option<f64>> {
        self.state.lock().unwrap().prices.clone()
    }

    pub fn edges(&self, product_id: i64) -> Vec<FormulaEdge> {
        self.state
            .lock()
            .unwrap()
            .edges
            .get(&product_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Ids passed to `set_price`, in call order.
    pub fn set_price_calls(&self) -> Vec<i64> {
        self.state.lock().unwrap().set_price_calls.clone()
    }

    /// Makes every `set_price` on `id` fail.
    pub fn fail_set_price_on(&self, id: i64) {
        self.state.lock().unwrap().fail_set_price_on = Some(id);
    }

    /// Makes every `replace_edges` fail.
    pub fn fail_replace_edges(&self) {
        self.state.lock().unwrap().fail_replace_edges = true;
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.fail_set_price_on = None;
        state.fail_replace_edges = false;
    }
}

fn injected_failure(what: &str) -> Error {
    Error::from(DbErr::Custom(format!("injected failure: {what}")))
}

#[async_trait]
impl MaterialStore for MemoryStore {
    async fn get_price(&self, material_id: i64) -> Result<Option<f64>> {
        Ok(self.price(material_id))
    }

    async fn set_price(&self, material_id: i64, price: f64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_set_price_on == Some(material_id) {
            return Err(injected_failure("set_price"));
        }
        let Some(slot) = state.prices.get_mut(&material_id) else {
            return Err(Error::MaterialNotFound { id: material_id });
        };
        *slot = Some(price);
        state.set_price_calls.push(material_id);
        Ok(())
    }

    async fn exists(&self, material_id: i64) -> Result<bool> {
        Ok(self.state.lock().unwrap().prices.contains_key(&material_id))
    }

    async fn material_ids(&self) -> Result<Vec<i64>> {
        Ok(self.state.lock().unwrap().prices.keys().copied().collect())
    }
}

#[async_trait]
impl FormulaStore for MemoryStore {
    async fn get_edges(&self, product_id: i64) -> Result<Vec<FormulaEdge>> {
        Ok(self.edges(product_id))
    }

    async fn replace_edges(&self, product_id: i64, edges: &[FormulaEdge]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_replace_edges {
            return Err(injected_failure("replace_edges"));
        }
        state.edges.insert(product_id, edges.to_vec());
        Ok(())
    }

    async fn get_products_using(&self, ingredient_id: i64) -> Result<Vec<i64>> {
        let state = self.state.lock().unwrap();
        let mut products: Vec<i64> = state
            .edges
            .iter()
            .filter(|(_, edges)| edges.iter().any(|e| e.ingredient_id == ingredient_id))
            .map(|(product_id, _)| *product_id)
            .collect();
        products.sort_unstable();
        Ok(products)
    }
}
