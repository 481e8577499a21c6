pub mod schema;
pub mod models;
pub mod inventory;
pub mod ledger;
pub mod store;
pub mod service;
#[cfg(test)]
mod memory;
pub mod auth;
pub mod users;
pub mod catalog;
pub mod api;

use diesel::{Connection, PgConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Applies every pending embedded migration over a blocking connection.
pub fn run_migrations(database_url: &str) -> anyhow::Result<()> {
    let mut conn = PgConnection::establish(database_url)?;
    conn.run_pending_migrations(MIGRATIONS).map_err(|e| anyhow::anyhow!("Migration error: {}", e))?;
    Ok(())
}
