//! User domain types.

use chrono::{DateTime, Utc};

use bazaar_core::{Email, UserId};

/// A marketplace user.
///
/// The password hash is deliberately absent; only the credential store reads it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}
