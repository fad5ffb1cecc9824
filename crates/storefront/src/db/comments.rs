//! Comment repository for database operations.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::instrument;

use bazaar_core::{CommentId, ProductId, UserId};

use super::{RepositoryError, not_found_on_foreign_key};
use crate::models::{Comment, CommentWithAuthor};

/// Validated input for a new comment.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub product_id: ProductId,
    pub author_id: UserId,
    pub text: String,
}

/// Repository for comment database operations.
pub struct CommentRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CommentRepository<'a> {
    /// Create a new comment repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a comment by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: CommentId) -> Result<Option<Comment>, RepositoryError> {
        let comment = sqlx::query_as::<_, Comment>(
            "SELECT id, product_id, author_id, text, created_at FROM comments WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(comment)
    }

    /// List a product's comments, oldest first, with author emails.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<CommentWithAuthor>, RepositoryError> {
        let comments = sqlx::query_as::<_, CommentWithAuthor>(
            "SELECT c.id, c.product_id, c.author_id, c.text, c.created_at,
                    u.email AS author_email
             FROM comments c
             JOIN users u ON u.id = c.author_id
             WHERE c.product_id = ?
             ORDER BY c.id",
        )
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        Ok(comments)
    }

    /// Insert a comment stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product was deleted
    /// concurrently (foreign key violation).
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self, comment), fields(product_id = %comment.product_id, author_id = %comment.author_id))]
    pub async fn create(&self, comment: &NewComment) -> Result<Comment, RepositoryError> {
        sqlx::query_as::<_, Comment>(
            "INSERT INTO comments (product_id, author_id, text, created_at)
             VALUES (?, ?, ?, ?)
             RETURNING id, product_id, author_id, text, created_at",
        )
        .bind(comment.product_id)
        .bind(comment.author_id)
        .bind(&comment.text)
        .bind(Utc::now())
        .fetch_one(self.pool)
        .await
        .map_err(not_found_on_foreign_key)
    }
}
