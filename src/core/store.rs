//! Store seam for the pricing engine.
//!
//! The engine never talks to the database directly. It reads and writes prices
//! through [`MaterialStore`] and formula edges through [`FormulaStore`], which
//! lets tests swap in an in-memory double and lets the SQL backend own its
//! transaction handling. [`SeaOrmStore`] is the production implementation.

use crate::{
    entities::{Formula, Material, formula, material},
    errors::{Error, Result},
};
use async_trait::async_trait;
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*, sea_query::Expr};

/// One weighted edge of a product's formula, seen from the product.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormulaEdge {
    /// The consumed material
    pub ingredient_id: i64,
    /// Ingredient units per product unit
    pub quantity: f64,
}

impl FormulaEdge {
    /// Creates an edge.
    #[must_use]
    pub const fn new(ingredient_id: i64, quantity: f64) -> Self {
        Self {
            ingredient_id,
            quantity,
        }
    }
}

/// Access to stored unit prices.
#[async_trait]
pub trait MaterialStore: Send + Sync {
    /// Current price, `None` when the material is missing or has no price.
    async fn get_price(&self, material_id: i64) -> Result<Option<f64>>;

    /// Overwrites the stored price. Fails with `MaterialNotFound` for unknown ids.
    async fn set_price(&self, material_id: i64, price: f64) -> Result<()>;

    /// Whether a material with this id is stored.
    async fn exists(&self, material_id: i64) -> Result<bool>;

    /// Ids of every stored material, ascending.
    async fn material_ids(&self) -> Result<Vec<i64>>;
}

/// Access to formula edges in both directions.
#[async_trait]
pub trait FormulaStore: Send + Sync {
    /// All edges of a product, in no particular order.
    async fn get_edges(&self, product_id: i64) -> Result<Vec<FormulaEdge>>;

    /// Replaces every edge of a product. Either all of `edges` is stored or
    /// nothing changes.
    async fn replace_edges(&self, product_id: i64, edges: &[FormulaEdge]) -> Result<()>;

    /// Distinct ids of the products that list `ingredient_id` in their formula.
    async fn get_products_using(&self, ingredient_id: i64) -> Result<Vec<i64>>;
}

/// [`MaterialStore`] and [`FormulaStore`] over a `SeaORM` connection.
#[derive(Debug, Clone)]
pub struct SeaOrmStore {
    db: DatabaseConnection,
}

impl SeaOrmStore {
    /// Wraps an open connection.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// The underlying connection, for catalog and order operations.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

#[async_trait]
impl MaterialStore for SeaOrmStore {
    async fn get_price(&self, material_id: i64) -> Result<Option<f64>> {
        let material = Material::find_by_id(material_id).one(&self.db).await?;
        Ok(material.and_then(|m| m.price))
    }

    async fn set_price(&self, material_id: i64, price: f64) -> Result<()> {
        // Single UPDATE statement so the write is atomic per node
        let result = Material::update_many()
            .col_expr(material::Column::Price, Expr::value(price))
            .col_expr(
                material::Column::UpdatedAt,
                Expr::value(chrono::Utc::now().naive_utc()),
            )
            .filter(material::Column::Id.eq(material_id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(Error::MaterialNotFound { id: material_id });
        }
        Ok(())
    }

    async fn exists(&self, material_id: i64) -> Result<bool> {
        Ok(Material::find_by_id(material_id)
            .one(&self.db)
            .await?
            .is_some())
    }

    async fn material_ids(&self) -> Result<Vec<i64>> {
        Material::find()
            .select_only()
            .column(material::Column::Id)
            .order_by_asc(material::Column::Id)
            .into_tuple::<i64>()
            .all(&self.db)
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl FormulaStore for SeaOrmStore {
    async fn get_edges(&self, product_id: i64) -> Result<Vec<FormulaEdge>> {
        let rows = Formula::find()
            .filter(formula::Column::ProductId.eq(product_id))
            .order_by_asc(formula::Column::Id)
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| FormulaEdge::new(row.ingredient_id, row.quantity))
            .collect())
    }

    async fn replace_edges(&self, product_id: i64, edges: &[FormulaEdge]) -> Result<()> {
        // Dropping `txn` on an early return rolls everything back
        let txn = self.db.begin().await?;

        Formula::delete_many()
            .filter(formula::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;

        if !edges.is_empty() {
            let rows = edges.iter().map(|edge| formula::ActiveModel {
                product_id: Set(product_id),
                ingredient_id: Set(edge.ingredient_id),
                quantity: Set(edge.quantity),
                ..Default::default()
            });
            Formula::insert_many(rows).exec(&txn).await?;
        }

        txn.commit().await?;
        Ok(())
    }

    async fn get_products_using(&self, ingredient_id: i64) -> Result<Vec<i64>> {
        Formula::find()
            .select_only()
            .column(formula::Column::ProductId)
            .distinct()
            .filter(formula::Column::IngredientId.eq(ingredient_id))
            .order_by_asc(formula::Column::ProductId)
            .into_tuple::<i64>()
            .all(&self.db)
            .await
            .map_err(Into::into)
    }
}
