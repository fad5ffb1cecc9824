//! User repository for database operations.
//!
//! Emails are stored `COLLATE NOCASE`, so every lookup and the unique
//! constraint compare them case-insensitively.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::instrument;

use bazaar_core::{Email, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::User;

const USER_COLUMNS: &str = "id, email, created_at, updated_at";

/// A user row together with its password hash.
#[derive(sqlx::FromRow)]
struct UserWithHash {
    #[sqlx(flatten)]
    user: User,
    password_hash: String,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    /// Get a user by their email address (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    /// Create a new user with email and password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self, password_hash), fields(email = %email))]
    pub async fn create(&self, email: &Email, password_hash: &str) -> Result<User, RepositoryError> {
        let now = Utc::now();

        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, password_hash, created_at, updated_at)
             VALUES (?, ?, ?, ?)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(password_hash)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "email"))
    }

    /// Get a user and their password hash by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, UserWithHash>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|r| (r.user, r.password_hash)))
    }

    /// Get the password hash of a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get_password_hash_by_id(
        &self,
        id: UserId,
    ) -> Result<Option<String>, RepositoryError> {
        let hash = sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(hash)
    }

    /// Replace a user's email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if another user holds the email.
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn update_email(&self, id: UserId, email: &Email) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET email = ?, updated_at = ?
             WHERE id = ?
             RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "email"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Replace a user's password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self, password_hash))]
    pub async fn update_password_hash(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Count registered users with the given email (0 or 1).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn count_by_email(&self, email: &Email) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::test_support::TestDb;

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_fetch_user() {
        let db = TestDb::new().await;
        let users = UserRepository::new(&db.pool);

        let user = users.create(&email("a@x.com"), "hash").await.unwrap();
        let fetched = users.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(fetched.email.as_str(), "a@x.com");

        let (by_email, hash) = users
            .get_password_hash(&email("a@x.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, user.id);
        assert_eq!(hash, "hash");
    }

    #[tokio::test]
    async fn test_email_lookup_ignores_case() {
        let db = TestDb::new().await;
        let users = UserRepository::new(&db.pool);

        users.create(&email("Owner@Example.com"), "hash").await.unwrap();
        let found = users.get_by_email(&email("owner@example.com")).await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let db = TestDb::new().await;
        let users = UserRepository::new(&db.pool);

        users.create(&email("a@x.com"), "hash").await.unwrap();
        let err = users.create(&email("A@X.com"), "hash").await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(users.count_by_email(&email("a@x.com")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_email_conflict_and_missing_user() {
        let db = TestDb::new().await;
        let users = UserRepository::new(&db.pool);

        let a = users.create(&email("a@x.com"), "hash").await.unwrap();
        users.create(&email("b@x.com"), "hash").await.unwrap();

        let err = users.update_email(a.id, &email("b@x.com")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let err = users
            .update_email(UserId::new(999), &email("c@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_update_password_hash() {
        let db = TestDb::new().await;
        let users = UserRepository::new(&db.pool);

        let user = users.create(&email("a@x.com"), "old").await.unwrap();
        users.update_password_hash(user.id, "new").await.unwrap();
        let hash = users.get_password_hash_by_id(user.id).await.unwrap();
        assert_eq!(hash.as_deref(), Some("new"));
    }
}
