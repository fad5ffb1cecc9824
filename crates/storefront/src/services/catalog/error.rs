//! Catalog error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::authz::AuthzError;
use crate::services::uploads::UploadError;
use crate::services::validation::FieldErrors;

/// Errors from shop, product and comment operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// One or more form fields failed validation.
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    /// A shop with this name already exists.
    #[error("shop name already taken")]
    DuplicateName,

    /// The operation requires a logged-in user.
    #[error("login required")]
    Unauthenticated,

    /// The actor does not own the target resource.
    #[error("forbidden")]
    Forbidden,

    /// The shop, product or comment does not exist.
    #[error("not found")]
    NotFound,

    /// Storing the product image failed.
    #[error("upload error: {0}")]
    Upload(UploadError),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for CatalogError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound,
            other => Self::Repository(other),
        }
    }
}

impl From<AuthzError> for CatalogError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Unauthenticated => Self::Unauthenticated,
            AuthzError::Forbidden => Self::Forbidden,
        }
    }
}

impl From<UploadError> for CatalogError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Io(_) => Self::Upload(err),
            rejected => Self::Validation(FieldErrors::single(
                "image",
                crate::services::validation::capitalize(&rejected.to_string()),
            )),
        }
    }
}
