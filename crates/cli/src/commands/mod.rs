//! Command implementations.
//!
//! Every command connects to the database named by `BAZAAR_DATABASE_URL`
//! (falling back to `DATABASE_URL`), loading a `.env` file first if present.

pub mod migrate;
pub mod sessions;
pub mod users;

use bazaar_storefront::db::{self, MigrationError};
use bazaar_storefront::services::auth::AuthError;
use secrecy::SecretString;
use sqlx::SqlitePool;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema or session table migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),

    /// Registration was rejected.
    #[error("Could not create user: {0}")]
    Auth(#[from] AuthError),

    /// Reading from stdin failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Session store operation failed.
    #[error("Session store error: {0}")]
    SessionStore(#[from] tower_sessions::session_store::Error),
}

/// Open a pool against the configured database.
async fn connect() -> Result<SqlitePool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("BAZAAR_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| CommandError::MissingEnvVar("BAZAAR_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&SecretString::from(database_url)).await?)
}
