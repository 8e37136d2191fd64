pub mod connection;
pub mod engine;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
pub use engine::SqlBookingEngine;
pub use fixtures::{CatalogSeed, SeedResult, VerificationResult};
pub use repositories::{RepositoryError, SqlCatalog};
