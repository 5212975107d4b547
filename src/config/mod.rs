/// Database configuration and connection management
pub mod database;

/// Catalog seed configuration from catalog.toml
pub mod catalog;
