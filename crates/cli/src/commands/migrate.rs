//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! bazaar-cli migrate
//! ```
//!
//! Applies the SQL migrations in `crates/storefront/migrations/` and creates
//! the session store table. Already-applied migrations are skipped.

use bazaar_storefront::db;

use super::{CommandError, connect};

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    db::migrate(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
