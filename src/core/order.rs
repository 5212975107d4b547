//! Manufacturing order business logic.
//!
//! Creating an order snapshots the product's current formula multiplied by the
//! ordered units into `order_ingredients`. Orders never trigger price
//! propagation, and later formula edits leave existing orders untouched.

use crate::{
    entities::{
        Formula, ManufacturingOrder, Material, OrderIngredient, formula, manufacturing_order,
        material, order_ingredient,
    },
    errors::{Error, Result},
};
use sea_orm::{Condition, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use std::collections::HashMap;
use tracing::debug;

const UNKNOWN_PRODUCT: &str = "Unknown";

/// Input for [`create_order`].
#[derive(Debug, Clone, Default)]
pub struct NewOrder {
    /// Material to manufacture
    pub product_id: i64,
    /// Units to manufacture, must be positive
    pub units: f64,
    /// Free-text notes
    pub notes: Option<String>,
    /// Client the order is produced for
    pub client_name: Option<String>,
    /// Proforma invoice number
    pub proforma_number: Option<String>,
}

/// One row of an order listing.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSummary {
    /// Order number
    pub order_id: i64,
    /// Product name, or `"Unknown"` if the product row is gone
    pub product_display_name: String,
    /// Units to manufacture
    pub units: f64,
    /// When the order was created
    pub created_at: DateTimeUtc,
    /// Client the order is produced for
    pub client_name: Option<String>,
    /// Proforma invoice number
    pub proforma_number: Option<String>,
}

/// Snapshotted quantity of one ingredient in an order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderIngredientLine {
    /// The consumed material
    pub ingredient_id: i64,
    /// Ingredient name, or `"Unknown"` if the row is gone
    pub name: String,
    /// Total quantity for the whole order
    pub quantity: f64,
}

/// An order with everything needed to print it.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDetails {
    /// The stored order row
    pub order: manufacturing_order::Model,
    /// Product name, or `"Unknown"` if the product row is gone
    pub product_name: String,
    /// Ordered by ingredient name
    pub ingredients: Vec<OrderIngredientLine>,
}

/// Creates a manufacturing order and snapshots its ingredient quantities.
///
/// # Errors
/// Returns an error if:
/// - `units` is not a positive finite number
/// - The product does not exist
/// - The database operation fails
pub async fn create_order(db: &DatabaseConnection, new: NewOrder) -> Result<OrderDetails> {
    if !new.units.is_finite() || new.units <= 0.0 {
        return Err(Error::InvalidUnits { units: new.units });
    }

    let txn = db.begin().await?;

    Material::find_by_id(new.product_id)
        .one(&txn)
        .await?
        .ok_or(Error::MaterialNotFound { id: new.product_id })?;

    let order = manufacturing_order::ActiveModel {
        product_id: Set(new.product_id),
        units: Set(new.units),
        created_at: Set(chrono::Utc::now()),
        notes: Set(new.notes),
        client_name: Set(new.client_name),
        proforma_number: Set(new.proforma_number),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let formula = Formula::find()
        .filter(formula::Column::ProductId.eq(new.product_id))
        .all(&txn)
        .await?;
    if !formula.is_empty() {
        let lines = formula.iter().map(|row| order_ingredient::ActiveModel {
            order_id: Set(order.id),
            ingredient_id: Set(row.ingredient_id),
            quantity: Set(row.quantity * new.units),
            ..Default::default()
        });
        OrderIngredient::insert_many(lines).exec(&txn).await?;
    }

    txn.commit().await?;
    debug!(order_id = order.id, product_id = order.product_id, "Order created");

    get_order_details(db, order.id)
        .await?
        .ok_or(Error::OrderNotFound { id: order.id })
}

/// All orders, newest first.
pub async fn list_orders(db: &DatabaseConnection) -> Result<Vec<OrderSummary>> {
    let orders = ManufacturingOrder::find()
        .order_by_desc(manufacturing_order::Column::CreatedAt)
        .order_by_desc(manufacturing_order::Column::Id)
        .all(db)
        .await?;
    summarize(db, orders).await
}

/// Orders whose client name or proforma number contains `query`, newest first.
pub async fn search_orders(db: &DatabaseConnection, query: &str) -> Result<Vec<OrderSummary>> {
    let orders = ManufacturingOrder::find()
        .filter(
            Condition::any()
                .add(manufacturing_order::Column::ClientName.contains(query))
                .add(manufacturing_order::Column::ProformaNumber.contains(query)),
        )
        .order_by_desc(manufacturing_order::Column::CreatedAt)
        .order_by_desc(manufacturing_order::Column::Id)
        .all(db)
        .await?;
    summarize(db, orders).await
}

/// Orders with ids in `from_id..=to_id`, ascending, with their details.
///
/// # Errors
/// Returns a validation error when `from_id > to_id`.
pub async fn get_orders_in_range(
    db: &DatabaseConnection,
    from_id: i64,
    to_id: i64,
) -> Result<Vec<OrderDetails>> {
    if from_id > to_id {
        return Err(Error::Validation {
            message: format!("Order range {from_id}..={to_id} is empty"),
        });
    }

    let ids: Vec<i64> = ManufacturingOrder::find()
        .select_only()
        .column(manufacturing_order::Column::Id)
        .filter(manufacturing_order::Column::Id.between(from_id, to_id))
        .order_by_asc(manufacturing_order::Column::Id)
        .into_tuple::<i64>()
        .all(db)
        .await?;

    let mut details = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(order) = get_order_details(db, id).await? {
            details.push(order);
        }
    }
    Ok(details)
}

/// An order with its product name and ingredient lines, or `None` if absent.
pub async fn get_order_details(
    db: &DatabaseConnection,
    order_id: i64,
) -> Result<Option<OrderDetails>> {
    let Some(order) = ManufacturingOrder::find_by_id(order_id).one(db).await? else {
        return Ok(None);
    };

    let product_name = Material::find_by_id(order.product_id)
        .one(db)
        .await?
        .map_or_else(|| UNKNOWN_PRODUCT.to_string(), |m| m.name);

    let rows = OrderIngredient::find()
        .filter(order_ingredient::Column::OrderId.eq(order_id))
        .all(db)
        .await?;
    let names = material_names(db, rows.iter().map(|row| row.ingredient_id).collect()).await?;

    let mut ingredients: Vec<OrderIngredientLine> = rows
        .into_iter()
        .map(|row| OrderIngredientLine {
            ingredient_id: row.ingredient_id,
            name: names
                .get(&row.ingredient_id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_PRODUCT.to_string()),
            quantity: row.quantity,
        })
        .collect();
    ingredients.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(Some(OrderDetails {
        order,
        product_name,
        ingredients,
    }))
}

/// The id the next created order is expected to get: `max(id) + 1`, or 1.
pub async fn next_order_id(db: &DatabaseConnection) -> Result<i64> {
    let max_id: Option<Option<i64>> = ManufacturingOrder::find()
        .select_only()
        .column_as(manufacturing_order::Column::Id.max(), "max_id")
        .into_tuple::<Option<i64>>()
        .one(db)
        .await?;
    Ok(max_id.flatten().map_or(1, |id| id + 1))
}

async fn summarize(
    db: &DatabaseConnection,
    orders: Vec<manufacturing_order::Model>,
) -> Result<Vec<OrderSummary>> {
    let names = material_names(db, orders.iter().map(|o| o.product_id).collect()).await?;

    Ok(orders
        .into_iter()
        .map(|order| OrderSummary {
            order_id: order.id,
            product_display_name: names
                .get(&order.product_id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_PRODUCT.to_string()),
            units: order.units,
            created_at: order.created_at,
            client_name: order.client_name,
            proforma_number: order.proforma_number,
        })
        .collect())
}

async fn material_names(db: &DatabaseConnection, ids: Vec<i64>) -> Result<HashMap<i64, String>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    Ok(Material::find()
        .filter(material::Column::Id.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|m| (m.id, m.name))
        .collect())
}
