//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::validation::FieldErrors;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Password and confirmation differ.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// One or more form fields failed validation.
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    /// Invalid credentials (wrong password, malformed email or user not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// User already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// User not found.
    #[error("user not found")]
    UserNotFound,

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}
