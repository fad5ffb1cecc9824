//! Integration tests for Bazaar.
//!
//! Each test spawns the full storefront router on an ephemeral local port,
//! backed by a fresh migrated `SQLite` database in a temporary directory, and
//! drives it over HTTP with a cookie-carrying client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p bazaar-integration-tests
//! ```

#![allow(clippy::expect_used, clippy::missing_panics_doc)]

use std::path::PathBuf;

use reqwest::{Client, Response, StatusCode, header::LOCATION, multipart, redirect::Policy};
use secrecy::SecretString;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tokio::net::TcpListener;

use bazaar_core::{ProductId, ShopId};
use bazaar_storefront::{app, config::StorefrontConfig, db, state::AppState};

/// Default password used by test accounts.
pub const PASSWORD: &str = "password1";

/// A running storefront with its own database and upload directory.
pub struct TestApp {
    pub base_url: String,
    pub pool: SqlitePool,
    pub upload_dir: PathBuf,
    _dir: TempDir,
}

impl TestApp {
    /// Start a storefront on `127.0.0.1` with a random port.
    pub async fn spawn() -> Self {
        let dir = TempDir::new().expect("failed to create temp directory");
        let database_url = format!("sqlite://{}", dir.path().join("bazaar.db").display());
        let upload_dir = dir.path().join("uploads");

        let config = StorefrontConfig::local(SecretString::from(database_url), upload_dir.clone());
        let pool = db::create_pool(&config.database_url)
            .await
            .expect("failed to open database");
        db::migrate(&pool).await.expect("failed to migrate database");

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind test listener");
        let addr = listener.local_addr().expect("listener has no address");

        let router = app(AppState::new(config, pool.clone()));
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("server error");
        });

        Self {
            base_url: format!("http://{addr}"),
            pool,
            upload_dir,
            _dir: dir,
        }
    }

    /// A fresh browser with an empty cookie jar.
    pub fn browser(&self) -> Browser {
        let client = Client::builder()
            .cookie_store(true)
            .redirect(Policy::none())
            .build()
            .expect("failed to create HTTP client");

        Browser {
            client,
            base_url: self.base_url.clone(),
        }
    }

    /// A browser logged in as a newly registered `email`.
    pub async fn logged_in(&self, email: &str) -> Browser {
        let browser = self.browser();
        let response = browser.register(email, PASSWORD).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "register {email}");
        let response = browser.login(email, PASSWORD).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "login {email}");
        browser
    }

    /// Id of the product with `title`.
    pub async fn product_id(&self, title: &str) -> ProductId {
        sqlx::query_scalar("SELECT id FROM products WHERE title = ?")
            .bind(title)
            .fetch_one(&self.pool)
            .await
            .expect("product not found")
    }

    /// Number of rows in `table`.
    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await
            .expect("count failed")
    }
}

/// An HTTP client that keeps its session cookie and does not follow
/// redirects, so tests can assert on them.
pub struct Browser {
    client: Client,
    base_url: String,
}

impl Browser {
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .expect("GET failed")
    }

    pub async fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> Response {
        self.client
            .post(format!("{}{path}", self.base_url))
            .form(fields)
            .send()
            .await
            .expect("POST failed")
    }

    pub async fn post_multipart(&self, path: &str, form: multipart::Form) -> Response {
        self.client
            .post(format!("{}{path}", self.base_url))
            .multipart(form)
            .send()
            .await
            .expect("multipart POST failed")
    }

    pub async fn register(&self, email: &str, password: &str) -> Response {
        self.post_form(
            "/register",
            &[
                ("email", email),
                ("password", password),
                ("confirm_password", password),
            ],
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> Response {
        self.post_form("/login", &[("email", email), ("password", password)])
            .await
    }

    /// Create a shop and return its id, read from the redirect to its
    /// management page.
    pub async fn create_shop(&self, name: &str) -> ShopId {
        let response = self
            .post_form("/shop/create", &[("name", name), ("description", "")])
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "create shop {name}");

        let id = location(&response)
            .strip_prefix("/shop/manage/")
            .and_then(|id| id.parse::<i64>().ok())
            .expect("unexpected shop redirect");
        ShopId::new(id)
    }

    pub async fn add_product(&self, shop_id: ShopId, title: &str, price: &str) -> Response {
        self.post_multipart(&format!("/shop/{shop_id}/add"), product_form(title, price))
            .await
    }
}

/// Product form fields with a valid description and no image.
pub fn product_form(title: &str, price: &str) -> multipart::Form {
    multipart::Form::new()
        .text("title", title.to_owned())
        .text("description", format!("{title} is a very fine product"))
        .text("price", price.to_owned())
}

/// The `Location` header of a redirect.
pub fn location(response: &Response) -> &str {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .expect("response has no Location header")
}
