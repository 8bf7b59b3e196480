/// Database abstraction layer
///
/// This module provides the storage collaborator used by the engine:
/// monitors, check history, incidents, and the latest-check cache.

pub mod migrations;
pub mod models;
pub mod repository;

#[cfg(test)]
pub mod memory;

pub use repository::{Database, DatabaseImpl};

use anyhow::Result;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<()> {
    migrations::run_migrations(conn).await
}
