//! Product repository for database operations.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::instrument;

use bazaar_core::{Price, ProductId, ShopId};

use super::RepositoryError;
use crate::models::Product;

const PRODUCT_COLUMNS: &str = "id, shop_id, title, description, price, image, created_at";

/// Validated input for a new product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub shop_id: ShopId,
    pub title: String,
    pub description: String,
    pub price: Price,
    pub image: Option<String>,
}

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a product by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(product)
    }

    /// List a shop's products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_by_shop(&self, shop_id: ShopId) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE shop_id = ? ORDER BY id DESC"
        ))
        .bind(shop_id)
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    /// List the most recently created products.
    ///
    /// Ordered by descending id; ids are `AUTOINCREMENT` so this tracks
    /// insertion order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<Product>, RepositoryError> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id DESC LIMIT ?"
        ))
        .bind(i64::from(limit))
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    /// Case-insensitive substring search over title and description.
    ///
    /// Matches against the lowercased copies written by [`Self::create`],
    /// so non-ASCII letters fold too. The caller guarantees a non-empty,
    /// trimmed query.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Result<Vec<Product>, RepositoryError> {
        let pattern = like_pattern(&query.to_lowercase());

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products
             WHERE title_folded LIKE ? ESCAPE '\\'
                OR description_folded LIKE ? ESCAPE '\\'
             ORDER BY id DESC"
        ))
        .bind(&pattern)
        .bind(&pattern)
        .fetch_all(self.pool)
        .await?;

        Ok(products)
    }

    /// Insert a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the shop no longer exists.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self, product), fields(shop_id = %product.shop_id, title = %product.title))]
    pub async fn create(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        sqlx::query_as::<_, Product>(&format!(
            "INSERT INTO products
                 (shop_id, title, description, title_folded, description_folded,
                  price, image, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(product.shop_id)
        .bind(&product.title)
        .bind(&product.description)
        .bind(product.title.to_lowercase())
        .bind(product.description.to_lowercase())
        .bind(product.price)
        .bind(product.image.as_deref())
        .bind(Utc::now())
        .fetch_one(self.pool)
        .await
        .map_err(super::not_found_on_foreign_key)
    }

    /// Delete a product together with all of its comments.
    ///
    /// Both deletes run in one transaction; if either fails nothing is
    /// removed. Returns the deleted product so the caller can clean up its
    /// image.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    /// Returns `RepositoryError::Database` for other database errors.
    #[instrument(skip(self))]
    pub async fn delete_with_comments(&self, id: ProductId) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let comments = sqlx::query("DELETE FROM comments WHERE product_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let product = sqlx::query_as::<_, Product>(&format!(
            "DELETE FROM products WHERE id = ? RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        tx.commit().await?;

        tracing::debug!(
            product_id = %id,
            comments_deleted = comments.rows_affected(),
            "Deleted product"
        );

        Ok(product)
    }
}

/// Build a `LIKE` pattern matching `query` as a literal substring.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::{Email, UserId};

    use super::*;
    use crate::db::comments::{CommentRepository, NewComment};
    use crate::db::shops::{NewShop, ShopRepository};
    use crate::db::test_support::TestDb;
    use crate::db::users::UserRepository;

    struct Fixture {
        db: TestDb,
        user: UserId,
        shop: ShopId,
    }

    async fn fixture() -> Fixture {
        let db = TestDb::new().await;
        let user = UserRepository::new(&db.pool)
            .create(&Email::parse("a@x.com").unwrap(), "hash")
            .await
            .unwrap()
            .id;
        let shop = ShopRepository::new(&db.pool)
            .create(&NewShop {
                name: "Store1".to_owned(),
                description: None,
                owner_id: user,
            })
            .await
            .unwrap()
            .id;
        Fixture { db, user, shop }
    }

    fn new_product(shop_id: ShopId, title: &str, description: &str) -> NewProduct {
        NewProduct {
            shop_id,
            title: title.to_owned(),
            description: description.to_owned(),
            price: Price::parse("9.99").unwrap(),
            image: None,
        }
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("wid"), "%wid%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[tokio::test]
    async fn test_create_keeps_exact_price() {
        let f = fixture().await;
        let products = ProductRepository::new(&f.db.pool);

        let created = products
            .create(&new_product(f.shop, "Widget", "A fine widget"))
            .await
            .unwrap();
        let fetched = products.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.price.to_string(), "9.99");
        assert_eq!(fetched.shop_id, f.shop);
    }

    #[tokio::test]
    async fn test_list_recent_is_newest_first_and_limited() {
        let f = fixture().await;
        let products = ProductRepository::new(&f.db.pool);

        for title in ["First", "Second", "Third"] {
            products
                .create(&new_product(f.shop, title, "Some description"))
                .await
                .unwrap();
        }

        let recent = products.list_recent(2).await.unwrap();
        let titles: Vec<_> = recent.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["Third", "Second"]);
    }

    #[tokio::test]
    async fn test_search_matches_title_or_description_ignoring_case() {
        let f = fixture().await;
        let products = ProductRepository::new(&f.db.pool);

        products
            .create(&new_product(f.shop, "Widget", "A fine gadget"))
            .await
            .unwrap();
        products
            .create(&new_product(f.shop, "Lamp", "Lights up a WIDGET shelf"))
            .await
            .unwrap();
        products
            .create(&new_product(f.shop, "Chair", "Comfortable seat"))
            .await
            .unwrap();

        let found = products.search("widget").await.unwrap();
        assert_eq!(found.len(), 2);

        assert!(products.search("%").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_folds_non_ascii_case() {
        let f = fixture().await;
        let products = ProductRepository::new(&f.db.pool);

        products
            .create(&new_product(f.shop, "Виджет", "Отличная вещь для дома"))
            .await
            .unwrap();

        for query in ["Виджет", "виджет", "ВИДЖЕТ", "ВЕЩЬ"] {
            assert_eq!(products.search(query).await.unwrap().len(), 1, "{query}");
        }
    }

    #[tokio::test]
    async fn test_delete_with_comments_removes_children() {
        let f = fixture().await;
        let products = ProductRepository::new(&f.db.pool);
        let comments = CommentRepository::new(&f.db.pool);

        let product = products
            .create(&new_product(f.shop, "Widget", "A fine widget"))
            .await
            .unwrap();
        let comment = comments
            .create(&NewComment {
                product_id: product.id,
                author_id: f.user,
                text: "Great product, would buy".to_owned(),
            })
            .await
            .unwrap();

        products.delete_with_comments(product.id).await.unwrap();

        assert!(products.get_by_id(product.id).await.unwrap().is_none());
        assert!(comments.get_by_id(comment.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_product_is_not_found() {
        let f = fixture().await;
        let products = ProductRepository::new(&f.db.pool);

        let err = products
            .delete_with_comments(ProductId::new(404))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }
}
