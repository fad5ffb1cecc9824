//! Session maintenance commands.
//!
//! # Usage
//!
//! ```bash
//! bazaar-cli sessions prune
//! ```

use tower_sessions::ExpiredDeletion;
use tower_sessions_sqlx_store::SqliteStore;

use super::{CommandError, connect};

/// Delete expired session records.
///
/// # Errors
///
/// Returns an error if the database is unreachable or the delete fails.
pub async fn prune() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Deleting expired sessions...");
    SqliteStore::new(pool).delete_expired().await?;

    tracing::info!("Expired sessions deleted");
    Ok(())
}
