//! Authentication service.
//!
//! The credential store: registration, password verification and the
//! account changes a user can make to their own credentials. Passwords are
//! hashed with Argon2id and never leave this module in plaintext.

mod error;

pub use error::AuthError;

use std::sync::LazyLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::SqlitePool;

use bazaar_core::{Email, UserId};

use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::User;
use crate::services::validation::{FieldErrors, capitalize};

/// Minimum password length in characters.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Register a new user with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` if any field is invalid.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        confirmation: &str,
    ) -> Result<User, AuthError> {
        let mut errors = FieldErrors::new();

        let email = match Email::parse(email) {
            Ok(email) => Some(email),
            Err(e) => {
                errors.add("email", capitalize(&e.to_string()));
                None
            }
        };
        check_new_password(&mut errors, "password", "confirm_password", password, confirmation);

        let Some(email) = email.filter(|_| errors.is_empty()) else {
            return Err(AuthError::Validation(errors));
        };

        if self.users.get_by_email(&email).await?.is_some() {
            return Err(AuthError::UserAlreadyExists);
        }

        let password_hash = hash_password(password)?;

        // The unique constraint settles a race with a concurrent registration
        let user = self
            .users
            .create(&email, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Verify an email and password.
    ///
    /// A malformed email, an unknown email and a wrong password all yield the
    /// same `AuthError::InvalidCredentials`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn verify(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let found = match Email::parse(email) {
            Ok(email) => self.users.get_password_hash(&email).await?,
            Err(_) => None,
        };

        let Some((user, password_hash)) = found else {
            // Same Argon2 cost as a wrong password
            burn_verification(password);
            return Err(AuthError::InvalidCredentials);
        };

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    /// Replace a user's password after checking the current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` if the new password is invalid.
    /// Returns `AuthError::InvalidCredentials` if `old` does not match.
    /// Returns `AuthError::UserNotFound` if the user no longer exists.
    pub async fn change_password(
        &self,
        user_id: UserId,
        old: &str,
        new: &str,
        confirmation: &str,
    ) -> Result<(), AuthError> {
        let mut errors = FieldErrors::new();
        check_new_password(&mut errors, "new_password", "confirm_password", new, confirmation);
        errors.into_result().map_err(AuthError::Validation)?;

        let current_hash = self
            .users
            .get_password_hash_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        verify_password(old, &current_hash)?;

        let password_hash = hash_password(new)?;
        self.users
            .update_password_hash(user_id, &password_hash)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// Change a user's email.
    ///
    /// Submitting the current email unchanged is a successful no-op.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` if the email is invalid.
    /// Returns `AuthError::UserAlreadyExists` if another user holds the email.
    /// Returns `AuthError::UserNotFound` if the user no longer exists.
    pub async fn change_email(&self, user_id: UserId, new_email: &str) -> Result<User, AuthError> {
        let email = Email::parse(new_email).map_err(|e| {
            AuthError::Validation(FieldErrors::single("email", capitalize(&e.to_string())))
        })?;

        let user = self.get_user(user_id).await?;
        if user.email == email {
            return Ok(user);
        }

        if let Some(holder) = self.users.get_by_email(&email).await?
            && holder.id != user_id
        {
            return Err(AuthError::UserAlreadyExists);
        }

        let user = self
            .users
            .update_email(user_id, &email)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                RepositoryError::NotFound => AuthError::UserNotFound,
                other => AuthError::Repository(other),
            })?;

        tracing::info!(user_id = %user_id, "Email changed");
        Ok(user)
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the user doesn't exist.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.users
            .get_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}

/// Validate password meets requirements.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` if the password is too short.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Record password rule and confirmation failures.
fn check_new_password(
    errors: &mut FieldErrors,
    password_field: &'static str,
    confirmation_field: &'static str,
    password: &str,
    confirmation: &str,
) {
    if let Err(AuthError::WeakPassword(message)) = validate_password(password) {
        errors.add(password_field, message);
    }
    if password != confirmation {
        errors.add(
            confirmation_field,
            capitalize(&AuthError::PasswordMismatch.to_string()),
        );
    }
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Hash verified on lookup misses; matches no real password.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("bazaar-unknown-account").ok());

/// Run a full verification against [`DUMMY_HASH`] and discard the result.
fn burn_verification(password: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref() {
        let _ = verify_password(password, hash);
    }
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::test_support::TestDb;

    #[test]
    fn test_hash_is_salted_and_verifiable() {
        let a = hash_password("password1").unwrap();
        let b = hash_password("password1").unwrap();
        assert_ne!(a, b);
        assert!(!a.contains("password1"));
        assert!(a.starts_with("$argon2id$"));
        assert!(verify_password("password1", &a).is_ok());
        assert!(matches!(
            verify_password("password2", &a),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_dummy_hash_costs_a_real_verification() {
        let hash = DUMMY_HASH.as_deref().unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(matches!(
            verify_password("password1", hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_validate_password_length() {
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("12345678").is_ok());
    }

    #[tokio::test]
    async fn test_register_then_verify() {
        let db = TestDb::new().await;
        let auth = AuthService::new(&db.pool);

        let user = auth.register("a@x.com", "password1", "password1").await.unwrap();
        let verified = auth.verify("a@x.com", "password1").await.unwrap();
        assert_eq!(user.id, verified.id);

        // Email comparison is case-insensitive
        assert!(auth.verify("A@X.COM", "password1").await.is_ok());
    }

    #[tokio::test]
    async fn test_verify_failures_are_indistinguishable() {
        let db = TestDb::new().await;
        let auth = AuthService::new(&db.pool);
        auth.register("a@x.com", "password1", "password1").await.unwrap();

        let wrong_password = auth.verify("a@x.com", "password2").await.unwrap_err();
        let unknown_user = auth.verify("nobody@x.com", "password1").await.unwrap_err();
        let malformed = auth.verify("not-an-email", "password1").await.unwrap_err();

        for err in [wrong_password, unknown_user, malformed] {
            assert!(matches!(err, AuthError::InvalidCredentials));
        }
    }

    #[tokio::test]
    async fn test_duplicate_registration_creates_no_row() {
        let db = TestDb::new().await;
        let auth = AuthService::new(&db.pool);
        auth.register("a@x.com", "password1", "password1").await.unwrap();

        let err = auth
            .register("A@x.com", "password2", "password2")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserAlreadyExists));

        let count = UserRepository::new(&db.pool)
            .count_by_email(&Email::parse("a@x.com").unwrap())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_concurrent_registrations_yield_one_user() {
        let db = TestDb::new().await;
        let auth = AuthService::new(&db.pool);

        let (first, second) = tokio::join!(
            auth.register("race@x.com", "password1", "password1"),
            auth.register("RACE@x.com", "password2", "password2"),
        );

        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            outcomes
                .iter()
                .any(|r| matches!(r, Err(AuthError::UserAlreadyExists)))
        );
        let count = UserRepository::new(&db.pool)
            .count_by_email(&Email::parse("race@x.com").unwrap())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_insert_conflict_after_precheck_is_duplicate() {
        let db = TestDb::new().await;
        // Another writer claims the email between the lookup and the insert
        sqlx::query(
            "CREATE TRIGGER claim_email BEFORE INSERT ON users
             WHEN NEW.password_hash <> 'winner'
             BEGIN
                 INSERT INTO users (email, password_hash, created_at, updated_at)
                 VALUES (NEW.email, 'winner', NEW.created_at, NEW.updated_at);
             END",
        )
        .execute(&db.pool)
        .await
        .unwrap();

        let err = AuthService::new(&db.pool)
            .register("late@x.com", "password1", "password1")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserAlreadyExists), "{err:?}");
    }

    #[tokio::test]
    async fn test_register_reports_every_invalid_field() {
        let db = TestDb::new().await;
        let auth = AuthService::new(&db.pool);

        let err = auth.register("bad", "short", "other").await.unwrap_err();
        let AuthError::Validation(errors) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert!(errors.get("email").is_some());
        assert!(errors.get("password").is_some());
        assert_eq!(errors.get("confirm_password"), Some("Passwords do not match"));
    }

    #[tokio::test]
    async fn test_change_password_requires_old_password() {
        let db = TestDb::new().await;
        let auth = AuthService::new(&db.pool);
        let user = auth.register("a@x.com", "password1", "password1").await.unwrap();

        let err = auth
            .change_password(user.id, "wrong-old", "password2", "password2")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert!(auth.verify("a@x.com", "password1").await.is_ok());

        auth.change_password(user.id, "password1", "password2", "password2")
            .await
            .unwrap();
        assert!(auth.verify("a@x.com", "password1").await.is_err());
        assert!(auth.verify("a@x.com", "password2").await.is_ok());
    }

    #[tokio::test]
    async fn test_change_email() {
        let db = TestDb::new().await;
        let auth = AuthService::new(&db.pool);
        let a = auth.register("a@x.com", "password1", "password1").await.unwrap();
        auth.register("b@x.com", "password1", "password1").await.unwrap();

        // Unchanged email is a no-op
        let same = auth.change_email(a.id, "a@x.com").await.unwrap();
        assert_eq!(same.email.as_str(), "a@x.com");

        let err = auth.change_email(a.id, "B@x.com").await.unwrap_err();
        assert!(matches!(err, AuthError::UserAlreadyExists));

        let err = auth.change_email(a.id, "nope").await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));

        let changed = auth.change_email(a.id, "new@x.com").await.unwrap();
        assert_eq!(changed.email.as_str(), "new@x.com");
        assert!(auth.verify("new@x.com", "password1").await.is_ok());
    }
}
