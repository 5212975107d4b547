/// Material creation, lookup and editing
pub mod material;
/// Read-side formula views
pub mod formula;
/// Manufacturing orders with snapshotted ingredient quantities
pub mod order;
/// Price computation and propagation through formulas
pub mod pricing;
/// Catalog seeding from configuration
pub mod seed;
/// Store traits consumed by the pricing engine, and their `SeaORM` implementation
pub mod store;

pub use pricing::{PricingEngine, PropagationReport, SqlPricingEngine};
pub use store::{FormulaEdge, FormulaStore, MaterialStore, SeaOrmStore};
