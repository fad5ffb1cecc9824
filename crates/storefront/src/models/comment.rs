//! Comment domain types.

use chrono::{DateTime, Utc};

use bazaar_core::{CommentId, Email, ProductId, UserId};

/// A comment left on a product.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Comment {
    pub id: CommentId,
    pub product_id: ProductId,
    pub author_id: UserId,
    pub text: String,
    /// Assigned at insert.
    pub created_at: DateTime<Utc>,
}

/// A comment joined with its author's email, for the product page.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentWithAuthor {
    #[sqlx(flatten)]
    pub comment: Comment,
    pub author_email: Email,
}
