//! Shop repository for database operations.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::instrument;

use bazaar_core::{ShopId, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::Shop;

const SHOP_COLUMNS: &str = "id, name, description, owner_id, created_at";

/// Validated input for a new shop.
#[derive(Debug, Clone)]
pub struct NewShop {
    pub name: String,
    pub description: Option<String>,
    pub owner_id: UserId,
}

/// Repository for shop database operations.
pub struct ShopRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ShopRepository<'a> {
    /// Create a new shop repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a shop by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: ShopId) -> Result<Option<Shop>, RepositoryError> {
        let shop = sqlx::query_as::<_, Shop>(&format!(
            "SELECT {SHOP_COLUMNS} FROM shops WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(shop)
    }

    /// Whether a shop with this exact name exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn name_exists(&self, name: &str) -> Result<bool, RepositoryError> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM shops WHERE name = ?)")
                .bind(name)
                .fetch_one(self.pool)
                .await?;

        Ok(exists)
    }

    /// Insert a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the name is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self, shop), fields(name = %shop.name, owner_id = %shop.owner_id))]
    pub async fn create(&self, shop: &NewShop) -> Result<Shop, RepositoryError> {
        sqlx::query_as::<_, Shop>(&format!(
            "INSERT INTO shops (name, description, owner_id, created_at)
             VALUES (?, ?, ?, ?)
             RETURNING {SHOP_COLUMNS}"
        ))
        .bind(&shop.name)
        .bind(shop.description.as_deref())
        .bind(shop.owner_id)
        .bind(Utc::now())
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "shop name"))
    }

    /// List the shops owned by a user, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_by_owner(&self, owner_id: UserId) -> Result<Vec<Shop>, RepositoryError> {
        let shops = sqlx::query_as::<_, Shop>(&format!(
            "SELECT {SHOP_COLUMNS} FROM shops WHERE owner_id = ? ORDER BY id"
        ))
        .bind(owner_id)
        .fetch_all(self.pool)
        .await?;

        Ok(shops)
    }
}
