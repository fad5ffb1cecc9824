//! Product domain types.

use chrono::{DateTime, Utc};

use bazaar_core::{Price, ProductId, ShopId};

/// A product listed under a shop.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub shop_id: ShopId,
    pub title: String,
    pub description: String,
    pub price: Price,
    /// Stored filename of the product image, relative to the upload directory.
    pub image: Option<String>,
    pub created_at: DateTime<Utc>,
}
