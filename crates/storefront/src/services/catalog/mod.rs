//! Catalog service: shops, products, comments and search.
//!
//! Every mutating operation takes the acting [`Actor`] explicitly, checks
//! ownership through [`authz`](crate::services::authz) before touching
//! storage, and validates input before any write.

mod error;

pub use error::CatalogError;

use sqlx::SqlitePool;

use bazaar_core::{Price, ProductId, ShopId};

use crate::db::RepositoryError;
use crate::db::comments::{CommentRepository, NewComment};
use crate::db::products::{NewProduct, ProductRepository};
use crate::db::shops::{NewShop, ShopRepository};
use crate::models::{Actor, Comment, CommentWithAuthor, Product, Shop};
use crate::services::authz::{Resource, authorize};
use crate::services::uploads::ImageStore;
use crate::services::validation::{FieldErrors, bounded_text, capitalize, optional_text};

/// Submitted shop form.
#[derive(Debug, Clone, Default)]
pub struct ShopInput {
    pub name: String,
    pub description: Option<String>,
}

/// Submitted product form. `price` is the raw text as entered.
#[derive(Debug, Clone, Default)]
pub struct ProductInput {
    pub title: String,
    pub description: String,
    pub price: String,
}

/// An uploaded image file.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// Filename as sent by the client.
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Everything the product page shows.
#[derive(Debug, Clone)]
pub struct ProductPage {
    pub product: Product,
    pub shop: Shop,
    /// Oldest first.
    pub comments: Vec<CommentWithAuthor>,
}

/// A shop with its products.
#[derive(Debug, Clone)]
pub struct ShopPage {
    pub shop: Shop,
    /// Newest first.
    pub products: Vec<Product>,
}

/// Catalog service.
pub struct CatalogService<'a> {
    shops: ShopRepository<'a>,
    products: ProductRepository<'a>,
    comments: CommentRepository<'a>,
    images: &'a ImageStore,
}

impl<'a> CatalogService<'a> {
    /// Create a new catalog service.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool, images: &'a ImageStore) -> Self {
        Self {
            shops: ShopRepository::new(pool),
            products: ProductRepository::new(pool),
            comments: CommentRepository::new(pool),
            images,
        }
    }

    // =========================================================================
    // Shops
    // =========================================================================

    /// Create a shop owned by the actor.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Unauthenticated` for anonymous actors,
    /// `CatalogError::Validation` for invalid input and
    /// `CatalogError::DuplicateName` if the name is taken.
    pub async fn create_shop(&self, actor: &Actor, input: &ShopInput) -> Result<Shop, CatalogError> {
        let owner_id = actor.user_id().ok_or(CatalogError::Unauthenticated)?;

        let mut errors = FieldErrors::new();
        let name = bounded_text(&mut errors, "name", &input.name, 3, 100);
        let description = optional_text(&mut errors, "description", input.description.as_deref(), 500);
        errors.into_result().map_err(CatalogError::Validation)?;

        if self.shops.name_exists(&name).await? {
            return Err(CatalogError::DuplicateName);
        }

        let shop = self
            .shops
            .create(&NewShop {
                name,
                description,
                owner_id,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => CatalogError::DuplicateName,
                other => other.into(),
            })?;

        tracing::info!(shop_id = %shop.id, owner_id = %owner_id, "Shop created");
        Ok(shop)
    }

    /// Load a shop.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the shop doesn't exist.
    pub async fn shop(&self, shop_id: ShopId) -> Result<Shop, CatalogError> {
        self.shops
            .get_by_id(shop_id)
            .await?
            .ok_or(CatalogError::NotFound)
    }

    /// Public view of a shop and its products.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the shop doesn't exist.
    pub async fn shop_page(&self, shop_id: ShopId) -> Result<ShopPage, CatalogError> {
        let shop = self.shop(shop_id).await?;
        let products = self.products.list_by_shop(shop.id).await?;
        Ok(ShopPage { shop, products })
    }

    /// Load a shop the actor owns.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound`, `CatalogError::Unauthenticated` or
    /// `CatalogError::Forbidden`.
    pub async fn owned_shop(&self, actor: &Actor, shop_id: ShopId) -> Result<Shop, CatalogError> {
        let shop = self.shop(shop_id).await?;
        authorize(actor, Resource::Shop(&shop))?;
        Ok(shop)
    }

    /// Owner-only management view of a shop.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound`, `CatalogError::Unauthenticated` or
    /// `CatalogError::Forbidden`.
    pub async fn manage_shop(&self, actor: &Actor, shop_id: ShopId) -> Result<ShopPage, CatalogError> {
        let shop = self.owned_shop(actor, shop_id).await?;
        let products = self.products.list_by_shop(shop.id).await?;
        Ok(ShopPage { shop, products })
    }

    /// Shops owned by the actor.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Unauthenticated` for anonymous actors.
    pub async fn shops_of(&self, actor: &Actor) -> Result<Vec<Shop>, CatalogError> {
        let owner_id = actor.user_id().ok_or(CatalogError::Unauthenticated)?;
        Ok(self.shops.list_by_owner(owner_id).await?)
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Add a product to a shop the actor owns.
    ///
    /// The image (if any) is written before the row is inserted and removed
    /// again if the insert fails.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound`, `CatalogError::Unauthenticated`,
    /// `CatalogError::Forbidden`, `CatalogError::Validation` (including a
    /// rejected image) or a storage error.
    pub async fn add_product(
        &self,
        actor: &Actor,
        shop_id: ShopId,
        input: &ProductInput,
        image: Option<&ImageUpload>,
    ) -> Result<Product, CatalogError> {
        let shop = self.owned_shop(actor, shop_id).await?;

        let mut errors = FieldErrors::new();
        let title = bounded_text(&mut errors, "title", &input.title, 3, 100);
        let description = bounded_text(&mut errors, "description", &input.description, 10, 2000);
        let price = match Price::parse(&input.price) {
            Ok(price) => Some(price),
            Err(e) => {
                errors.add("price", capitalize(&e.to_string()));
                None
            }
        };
        if let Some(image) = image
            && let Err(e) = self.images.check(&image.filename, image.bytes.len())
        {
            errors.add("image", capitalize(&e.to_string()));
        }

        let Some(price) = price.filter(|_| errors.is_empty()) else {
            return Err(CatalogError::Validation(errors));
        };

        let stored_image = match image {
            Some(image) => Some(self.images.save(&image.filename, &image.bytes).await?),
            None => None,
        };

        let created = self
            .products
            .create(&NewProduct {
                shop_id: shop.id,
                title,
                description,
                price,
                image: stored_image.clone(),
            })
            .await;

        match created {
            Ok(product) => {
                tracing::info!(product_id = %product.id, shop_id = %shop.id, "Product added");
                Ok(product)
            }
            Err(e) => {
                if let Some(stored) = &stored_image {
                    self.images.remove(stored).await;
                }
                Err(e.into())
            }
        }
    }

    /// Product detail with its shop and comments.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the product doesn't exist.
    pub async fn product_page(&self, product_id: ProductId) -> Result<ProductPage, CatalogError> {
        let product = self
            .products
            .get_by_id(product_id)
            .await?
            .ok_or(CatalogError::NotFound)?;
        let shop = self.shop(product.shop_id).await?;
        let comments = self.comments.list_for_product(product.id).await?;

        Ok(ProductPage {
            product,
            shop,
            comments,
        })
    }

    /// Delete a product, its comments and its image.
    ///
    /// Comments and the product row go in one transaction. The image is
    /// removed after commit; a failure there is only logged.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound`, `CatalogError::Unauthenticated`,
    /// `CatalogError::Forbidden` or a storage error.
    pub async fn delete_product(
        &self,
        actor: &Actor,
        product_id: ProductId,
    ) -> Result<Product, CatalogError> {
        let product = self
            .products
            .get_by_id(product_id)
            .await?
            .ok_or(CatalogError::NotFound)?;
        let shop = self.shop(product.shop_id).await?;
        authorize(
            actor,
            Resource::Product {
                product: &product,
                shop: &shop,
            },
        )?;

        let deleted = self.products.delete_with_comments(product.id).await?;

        if let Some(image) = &deleted.image {
            self.images.remove(image).await;
        }

        tracing::info!(product_id = %deleted.id, shop_id = %shop.id, "Product deleted");
        Ok(deleted)
    }

    /// The most recently created products.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub async fn recent_products(&self, limit: u32) -> Result<Vec<Product>, CatalogError> {
        Ok(self.products.list_recent(limit).await?)
    }

    /// Case-insensitive substring search over product titles and descriptions.
    ///
    /// A blank query returns no products.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the query fails.
    pub async fn search(&self, query: &str) -> Result<Vec<Product>, CatalogError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        Ok(self.products.search(query).await?)
    }

    // =========================================================================
    // Comments
    // =========================================================================

    /// Comment on a product as the actor.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Unauthenticated` for anonymous actors,
    /// `CatalogError::Validation` for invalid text and
    /// `CatalogError::NotFound` if the product is gone.
    pub async fn add_comment(
        &self,
        actor: &Actor,
        product_id: ProductId,
        text: &str,
    ) -> Result<Comment, CatalogError> {
        let author_id = authorize(actor, Resource::ProductComments)?;

        let mut errors = FieldErrors::new();
        let text = bounded_text(&mut errors, "text", text, 10, 500);
        errors.into_result().map_err(CatalogError::Validation)?;

        // A product deleted in the meantime fails the foreign key check
        let comment = self
            .comments
            .create(&NewComment {
                product_id,
                author_id,
                text,
            })
            .await?;

        tracing::info!(comment_id = %comment.id, product_id = %product_id, "Comment added");
        Ok(comment)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::Email;

    use super::*;
    use crate::config::UploadConfig;
    use crate::db::test_support::TestDb;
    use crate::db::users::UserRepository;
    use crate::models::CurrentUser;

    struct Harness {
        db: TestDb,
        images: ImageStore,
    }

    impl Harness {
        async fn new() -> Self {
            let db = TestDb::new().await;
            let images = ImageStore::new(&UploadConfig::in_dir(db.dir.path().join("uploads")));
            Self { db, images }
        }

        fn catalog(&self) -> CatalogService<'_> {
            CatalogService::new(&self.db.pool, &self.images)
        }

        async fn user(&self, email: &str) -> Actor {
            let email = Email::parse(email).unwrap();
            let user = UserRepository::new(&self.db.pool)
                .create(&email, "hash")
                .await
                .unwrap();
            Actor::User(CurrentUser::from(user))
        }
    }

    fn shop_input(name: &str) -> ShopInput {
        ShopInput {
            name: name.to_owned(),
            description: None,
        }
    }

    fn product_input(title: &str, price: &str) -> ProductInput {
        ProductInput {
            title: title.to_owned(),
            description: "A perfectly fine product".to_owned(),
            price: price.to_owned(),
        }
    }

    #[tokio::test]
    async fn test_create_shop_requires_login_and_unique_name() {
        let h = Harness::new().await;
        let catalog = h.catalog();
        let owner = h.user("a@x.com").await;

        let err = catalog
            .create_shop(&Actor::Anonymous, &shop_input("Store1"))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Unauthenticated));

        let shop = catalog.create_shop(&owner, &shop_input("  Store1 ")).await.unwrap();
        assert_eq!(shop.name, "Store1");
        assert_eq!(Some(shop.owner_id), owner.user_id());

        let other = h.user("b@x.com").await;
        let err = catalog.create_shop(&other, &shop_input("Store1")).await.unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateName));
    }

    #[tokio::test]
    async fn test_concurrent_shop_creation_yields_one_shop() {
        let h = Harness::new().await;
        let catalog = h.catalog();
        let a = h.user("a@x.com").await;
        let b = h.user("b@x.com").await;

        let input_a = shop_input("Corner");
        let input_b = shop_input("Corner");
        let (first, second) = tokio::join!(
            catalog.create_shop(&a, &input_a),
            catalog.create_shop(&b, &input_b),
        );

        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            outcomes
                .iter()
                .any(|r| matches!(r, Err(CatalogError::DuplicateName)))
        );
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shops WHERE name = 'Corner'")
            .fetch_one(&h.db.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_insert_conflict_after_precheck_is_duplicate_name() {
        let h = Harness::new().await;
        let owner = h.user("a@x.com").await;
        // Another writer claims the name between the lookup and the insert
        sqlx::query(
            "CREATE TRIGGER claim_shop_name BEFORE INSERT ON shops
             WHEN NEW.description IS NOT 'winner'
             BEGIN
                 INSERT INTO shops (name, description, owner_id, created_at)
                 VALUES (NEW.name, 'winner', NEW.owner_id, NEW.created_at);
             END",
        )
        .execute(&h.db.pool)
        .await
        .unwrap();

        let err = h
            .catalog()
            .create_shop(&owner, &shop_input("Late"))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateName), "{err:?}");
    }

    #[tokio::test]
    async fn test_create_shop_validates_lengths() {
        let h = Harness::new().await;
        let owner = h.user("a@x.com").await;

        let err = h
            .catalog()
            .create_shop(
                &owner,
                &ShopInput {
                    name: "ab".to_owned(),
                    description: Some("d".repeat(501)),
                },
            )
            .await
            .unwrap_err();
        let CatalogError::Validation(errors) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert!(errors.get("name").is_some());
        assert!(errors.get("description").is_some());
    }

    #[tokio::test]
    async fn test_price_must_be_positive() {
        let h = Harness::new().await;
        let catalog = h.catalog();
        let owner = h.user("a@x.com").await;
        let shop = catalog.create_shop(&owner, &shop_input("Store1")).await.unwrap();

        for price in ["0", "-5", "abc"] {
            let err = catalog
                .add_product(&owner, shop.id, &product_input("Widget", price), None)
                .await
                .unwrap_err();
            assert!(matches!(err, CatalogError::Validation(ref e) if e.get("price").is_some()));
        }
        assert!(catalog.shop_page(shop.id).await.unwrap().products.is_empty());

        let product = catalog
            .add_product(&owner, shop.id, &product_input("Widget", "0.01"), None)
            .await
            .unwrap();
        assert_eq!(product.price.to_string(), "0.01");
    }

    #[tokio::test]
    async fn test_only_owner_adds_and_deletes_products() {
        let h = Harness::new().await;
        let catalog = h.catalog();
        let owner = h.user("a@x.com").await;
        let other = h.user("b@x.com").await;
        let shop = catalog.create_shop(&owner, &shop_input("Store1")).await.unwrap();

        let err = catalog
            .add_product(&other, shop.id, &product_input("Widget", "9.99"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Forbidden));

        let product = catalog
            .add_product(&owner, shop.id, &product_input("Widget", "9.99"), None)
            .await
            .unwrap();

        let err = catalog.delete_product(&other, product.id).await.unwrap_err();
        assert!(matches!(err, CatalogError::Forbidden));
        let err = catalog
            .delete_product(&Actor::Anonymous, product.id)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Unauthenticated));
        assert!(catalog.product_page(product.id).await.is_ok());

        catalog.delete_product(&owner, product.id).await.unwrap();
        assert!(matches!(
            catalog.product_page(product.id).await,
            Err(CatalogError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete_cascades_comments_and_image() {
        let h = Harness::new().await;
        let catalog = h.catalog();
        let owner = h.user("a@x.com").await;
        let reader = h.user("b@x.com").await;
        let shop = catalog.create_shop(&owner, &shop_input("Store1")).await.unwrap();

        let image = ImageUpload {
            filename: "widget.png".to_owned(),
            bytes: b"png-bytes".to_vec(),
        };
        let product = catalog
            .add_product(&owner, shop.id, &product_input("Widget", "9.99"), Some(&image))
            .await
            .unwrap();
        let stored = product.image.clone().unwrap();
        assert!(h.images.dir().join(&stored).exists());

        let comment = catalog
            .add_comment(&reader, product.id, "Lovely widget, five stars")
            .await
            .unwrap();

        catalog.delete_product(&owner, product.id).await.unwrap();

        let found = CommentRepository::new(&h.db.pool)
            .get_by_id(comment.id)
            .await
            .unwrap();
        assert!(found.is_none());
        assert!(!h.images.dir().join(&stored).exists());

        // Commenting on the deleted product reports it missing
        let err = catalog
            .add_comment(&reader, product.id, "Is this still available?")
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound));
    }

    #[tokio::test]
    async fn test_rejected_image_is_a_field_error() {
        let h = Harness::new().await;
        let catalog = h.catalog();
        let owner = h.user("a@x.com").await;
        let shop = catalog.create_shop(&owner, &shop_input("Store1")).await.unwrap();

        let image = ImageUpload {
            filename: "payload.exe".to_owned(),
            bytes: vec![0; 4],
        };
        let err = catalog
            .add_product(&owner, shop.id, &product_input("Widget", "9.99"), Some(&image))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(ref e) if e.get("image").is_some()));
    }

    #[tokio::test]
    async fn test_oversized_image_is_reported_with_other_field_errors() {
        let db = TestDb::new().await;
        let mut config = UploadConfig::in_dir(db.dir.path().join("uploads"));
        config.max_bytes = 4;
        let images = ImageStore::new(&config);
        let catalog = CatalogService::new(&db.pool, &images);

        let email = Email::parse("a@x.com").unwrap();
        let user = UserRepository::new(&db.pool).create(&email, "hash").await.unwrap();
        let owner = Actor::User(CurrentUser::from(user));
        let shop = catalog.create_shop(&owner, &shop_input("Store1")).await.unwrap();

        let image = ImageUpload {
            filename: "big.png".to_owned(),
            bytes: vec![0; 5],
        };
        let err = catalog
            .add_product(&owner, shop.id, &product_input("ab", "9.99"), Some(&image))
            .await
            .unwrap_err();
        let CatalogError::Validation(errors) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert!(errors.get("title").is_some());
        assert!(errors.get("image").is_some_and(|m| m.contains("larger than 4 bytes")));
        assert!(!db.dir.path().join("uploads").exists());
    }

    #[tokio::test]
    async fn test_comment_rules() {
        let h = Harness::new().await;
        let catalog = h.catalog();
        let owner = h.user("a@x.com").await;
        let shop = catalog.create_shop(&owner, &shop_input("Store1")).await.unwrap();
        let product = catalog
            .add_product(&owner, shop.id, &product_input("Widget", "9.99"), None)
            .await
            .unwrap();

        let err = catalog
            .add_comment(&Actor::Anonymous, product.id, "Anonymous opinion here")
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Unauthenticated));

        let err = catalog.add_comment(&owner, product.id, "short").await.unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));

        catalog
            .add_comment(&owner, product.id, "  Thanks for visiting!  ")
            .await
            .unwrap();
        let page = catalog.product_page(product.id).await.unwrap();
        assert_eq!(page.comments.len(), 1);
        assert_eq!(page.comments[0].comment.text, "Thanks for visiting!");
        assert_eq!(page.comments[0].author_email.as_str(), "a@x.com");
    }

    #[tokio::test]
    async fn test_search_blank_query_is_empty() {
        let h = Harness::new().await;
        let catalog = h.catalog();
        let owner = h.user("a@x.com").await;
        let shop = catalog.create_shop(&owner, &shop_input("Store1")).await.unwrap();
        catalog
            .add_product(&owner, shop.id, &product_input("Widget", "9.99"), None)
            .await
            .unwrap();

        assert!(catalog.search("   ").await.unwrap().is_empty());
        assert_eq!(catalog.search(" idg ").await.unwrap().len(), 1);
        assert_eq!(catalog.recent_products(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_account_lists_only_own_shops() {
        let h = Harness::new().await;
        let catalog = h.catalog();
        let a = h.user("a@x.com").await;
        let b = h.user("b@x.com").await;
        catalog.create_shop(&a, &shop_input("Store1")).await.unwrap();
        catalog.create_shop(&b, &shop_input("Store2")).await.unwrap();

        let shops = catalog.shops_of(&a).await.unwrap();
        assert_eq!(shops.len(), 1);
        assert_eq!(Some(shops[0].owner_id), a.user_id());
        assert!(matches!(
            catalog.shops_of(&Actor::Anonymous).await,
            Err(CatalogError::Unauthenticated)
        ));
    }
}
