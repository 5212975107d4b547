use dotenvy::dotenv;
use formula_buddy::{
    config::{catalog, database},
    core::{
        PricingEngine, SeaOrmStore,
        formula::get_formula_lines,
        material::list_materials,
        seed::seed_catalog,
    },
    errors::Result,
};
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Open the database and make sure every table exists
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    let engine = PricingEngine::new(SeaOrmStore::new(db.clone()));

    // 4. Seed the catalog if a catalog file is present
    let catalog_path = catalog::get_catalog_path();
    if Path::new(&catalog_path).exists() {
        let config = catalog::load_config(&catalog_path)
            .inspect_err(|e| error!("Failed to load {}: {}", catalog_path, e))?;
        seed_catalog(&engine, &config)
            .await
            .inspect_err(|e| error!("Failed to seed catalog: {}", e))?;
    } else {
        warn!("No catalog at {}, skipping seeding", catalog_path);
    }

    // 5. Bring every stored price back in line with the formulas
    let report = engine.reconcile_all().await?;
    if report.has_cycle() {
        warn!(cyclic = ?report.cyclic, "Formulas contain a dependency cycle");
    }

    // 6. Price summary
    for material in list_materials(&db).await? {
        let lines = get_formula_lines(&db, material.id).await?;
        info!(
            name = %material.name,
            identifier = material.identifier.as_deref().unwrap_or("-"),
            price = material.price.unwrap_or(0.0),
            ingredients = lines.len(),
            "Material"
        );
    }

    Ok(())
}
