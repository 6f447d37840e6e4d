//! Storage layer - SQLite
//!
//! Provides database management and migrations for the credential store.
//!
//! # Usage
//!
//! ```ignore
//! use credvault_core::storage::{Database, DatabaseConfig};
//!
//! // Create an in-memory database for testing
//! let db = Database::in_memory().await?;
//!
//! // Or open the configured file
//! let db = Database::new(DatabaseConfig::with_path(config.database_path)).await?;
//! ```

pub mod database;
pub mod migrations;

// Re-export commonly used types
pub use database::{Database, DatabaseConfig};
pub use migrations::{CURRENT_VERSION, MigrationStatus, migration_status, run_migrations};
