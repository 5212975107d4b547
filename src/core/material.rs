//! Material business logic - Creating, finding and editing materials.
//!
//! Price edits are delegated to the [`PricingEngine`] so that every product using
//! the material is repriced. Name and identifier clashes surface as
//! `UniquenessConflict` errors from the store.

use crate::{
    core::{
        pricing::{PricingEngine, validate_price},
        store::{FormulaStore, MaterialStore},
    },
    entities::{Material, material},
    errors::{Error, Result},
};
use sea_orm::{Condition, QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::debug;

/// Input for [`create_material`].
#[derive(Debug, Clone, Default)]
pub struct NewMaterial {
    /// Unique display name, trimmed before insert
    pub name: String,
    /// Free-text description
    pub description: String,
    /// Requested external identifier; made unique with a `-N` suffix if taken
    pub identifier: Option<String>,
    /// Initial unit price
    pub price: f64,
}

impl NewMaterial {
    /// A material with just a name and price.
    #[must_use]
    pub fn named(name: impl Into<String>, price: f64) -> Self {
        Self {
            name: name.into(),
            price,
            ..Default::default()
        }
    }
}

/// Fields to change in [`update_material`]; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct MaterialChanges {
    /// New display name
    pub name: Option<String>,
    /// New identifier, stored as given
    pub identifier: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New unit price, propagated to dependent products
    pub price: Option<f64>,
}

/// Creates a material, assigning it a unique identifier.
///
/// When no identifier is requested, the new row's id is used. Either way the
/// identifier is suffixed with `-1`, `-2`, ... until it is free.
///
/// # Errors
/// Returns an error if:
/// - The name is empty or whitespace-only
/// - The price is negative or not finite
/// - Another material already has this name (`UniquenessConflict`)
/// - The database operation fails
pub async fn create_material(db: &DatabaseConnection, new: NewMaterial) -> Result<material::Model> {
    let name = new.name.trim().to_string();
    if name.is_empty() {
        return Err(Error::Validation {
            message: "Material name cannot be empty".to_string(),
        });
    }
    validate_price(new.price)?;

    let txn = db.begin().await?;

    let requested = new
        .identifier
        .map(|identifier| identifier.trim().to_string())
        .filter(|identifier| !identifier.is_empty());
    let identifier = match requested {
        Some(base) => Some(unique_identifier(&txn, &base).await?),
        None => None,
    };

    let now = chrono::Utc::now().naive_utc();
    let created = material::ActiveModel {
        name: Set(name),
        identifier: Set(identifier),
        description: Set(new.description),
        price: Set(Some(new.price)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let created = if created.identifier.is_some() {
        created
    } else {
        let identifier = unique_identifier(&txn, &created.id.to_string()).await?;
        let mut active: material::ActiveModel = created.into();
        active.identifier = Set(Some(identifier));
        active.update(&txn).await?
    };

    txn.commit().await?;
    debug!(id = created.id, name = %created.name, "Material created");
    Ok(created)
}

/// Returns `base`, or `base-1`, `base-2`, ... whichever is not used yet.
pub async fn unique_identifier<C>(db: &C, base: &str) -> Result<String>
where
    C: ConnectionTrait,
{
    let mut candidate = base.to_string();
    let mut suffix = 1;
    while Material::find()
        .filter(material::Column::Identifier.eq(candidate.as_str()))
        .one(db)
        .await?
        .is_some()
    {
        candidate = format!("{base}-{suffix}");
        suffix += 1;
    }
    Ok(candidate)
}

/// Retrieves a material by its id.
pub async fn get_material_by_id(
    db: &DatabaseConnection,
    material_id: i64,
) -> Result<Option<material::Model>> {
    Material::find_by_id(material_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a material by its exact name.
pub async fn get_material_by_name(
    db: &DatabaseConnection,
    name: &str,
) -> Result<Option<material::Model>> {
    Material::find()
        .filter(material::Column::Name.eq(name))
        .one(db)
        .await
        .map_err(Into::into)
}

/// All materials, ordered alphabetically by name.
pub async fn list_materials(db: &DatabaseConnection) -> Result<Vec<material::Model>> {
    Material::find()
        .order_by_asc(material::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Materials whose name or identifier contains `query`, ignoring ASCII case.
pub async fn search_materials(
    db: &DatabaseConnection,
    query: &str,
) -> Result<Vec<material::Model>> {
    Material::find()
        .filter(
            Condition::any()
                .add(material::Column::Name.contains(query))
                .add(material::Column::Identifier.contains(query)),
        )
        .order_by_asc(material::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Applies `changes` to a material. A new price goes through the engine, so
/// dependent products are repriced.
///
/// # Errors
/// Returns an error if:
/// - The material does not exist
/// - The new name is empty, or the new price is negative or not finite
/// - The new name or identifier is already taken (`UniquenessConflict`)
/// - The database operation or price propagation fails
pub async fn update_material<S>(
    db: &DatabaseConnection,
    engine: &PricingEngine<S>,
    material_id: i64,
    changes: MaterialChanges,
) -> Result<material::Model>
where
    S: MaterialStore + FormulaStore,
{
    if let Some(price) = changes.price {
        validate_price(price)?;
    }

    let mut active: material::ActiveModel = Material::find_by_id(material_id)
        .one(db)
        .await?
        .ok_or(Error::MaterialNotFound { id: material_id })?
        .into();

    let mut touched = false;
    if let Some(name) = changes.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(Error::Validation {
                message: "Material name cannot be empty".to_string(),
            });
        }
        active.name = Set(name);
        touched = true;
    }
    if let Some(identifier) = changes.identifier {
        active.identifier = Set(Some(identifier));
        touched = true;
    }
    if let Some(description) = changes.description {
        active.description = Set(description);
        touched = true;
    }
    if touched {
        active.updated_at = Set(chrono::Utc::now().naive_utc());
        active.update(db).await?;
    }

    if let Some(price) = changes.price {
        engine.update_material_price(material_id, price).await?;
    }

    get_material_by_id(db, material_id)
        .await?
        .ok_or(Error::MaterialNotFound { id: material_id })
}
