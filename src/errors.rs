//! Unified error type for formula-buddy.
//!
//! Every fallible operation returns [`Result`]. Callers that need to react
//! differently to bad input, identity clashes and store trouble can branch on
//! [`Error::kind`] instead of matching every variant.

use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input to a public operation. Never retried, no partial effect.
    Validation,
    /// A unique column (material name or identifier) already holds the value.
    UniquenessConflict,
    /// The underlying store could not complete a read or write.
    StoreFailure,
    /// Startup configuration could not be loaded.
    Config,
}

/// All errors produced by the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file or environment problem
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description
        message: String,
    },

    /// Generic input validation failure
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable description
        message: String,
    },

    /// Price is negative, NaN or infinite
    #[error("Invalid price: {price}")]
    InvalidPrice {
        /// The rejected price
        price: f64,
    },

    /// Formula quantity is NaN or infinite
    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity {
        /// The rejected quantity
        quantity: f64,
    },

    /// Order units are not a positive finite number
    #[error("Invalid units: {units}")]
    InvalidUnits {
        /// The rejected unit count
        units: f64,
    },

    /// No material with this id
    #[error("Material not found: {id}")]
    MaterialNotFound {
        /// The unknown material id
        id: i64,
    },

    /// No manufacturing order with this id
    #[error("Manufacturing order not found: {id}")]
    OrderNotFound {
        /// The unknown order id
        id: i64,
    },

    /// Unique constraint violated in the store
    #[error("Uniqueness conflict: {detail}")]
    UniquenessConflict {
        /// Constraint detail reported by the database
        detail: String,
    },

    /// Any other database failure
    #[error("Database error: {0}")]
    Database(DbErr),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or malformed environment variable
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

impl Error {
    /// Classifies the error for callers that only care about the broad category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. }
            | Self::InvalidPrice { .. }
            | Self::InvalidQuantity { .. }
            | Self::InvalidUnits { .. }
            | Self::MaterialNotFound { .. }
            | Self::OrderNotFound { .. } => ErrorKind::Validation,
            Self::UniquenessConflict { .. } => ErrorKind::UniquenessConflict,
            Self::Database(_) | Self::Io(_) => ErrorKind::StoreFailure,
            Self::Config { .. } | Self::EnvVar(_) => ErrorKind::Config,
        }
    }
}

impl From<DbErr> for Error {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => Self::UniquenessConflict { detail },
            _ => Self::Database(err),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
