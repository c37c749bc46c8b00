use anyhow::{anyhow, Result};
use diesel::pg::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;

pub mod schema;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Applies any migrations the database has not seen yet.
pub fn run_migrations(conn: &mut PgConnection) -> Result<()> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow!("Failed to run database migrations: {}", e))?;
    for version in &applied {
        info!(%version, "Applied migration");
    }
    Ok(())
}
