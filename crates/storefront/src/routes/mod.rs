//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                               - Most recent products
//!
//! # Auth
//! GET  /login                          - Login page
//! POST /login                          - Login action
//! GET  /register                       - Register page
//! POST /register                       - Register action
//! GET  /logout                         - Logout action
//!
//! # Shops
//! GET  /shop/create                    - New shop form (auth)
//! POST /shop/create                    - Create shop (auth)
//! GET  /shop/manage/{shop_id}          - Management view (owner)
//! GET  /shop/{shop_id}                 - Public shop page
//! GET  /shop/{shop_id}/add             - New product form (owner)
//! POST /shop/{shop_id}/add             - Add product, multipart (owner)
//!
//! # Products
//! GET  /product/{product_id}           - Product detail with comments
//! POST /product/{product_id}           - Add comment (auth)
//! POST /product/{product_id}/delete    - Delete product and comments (owner)
//!
//! # Search
//! GET  /search?q=                      - Substring search
//!
//! # Account (requires auth)
//! GET  /account                        - Account overview with shops
//! GET  /account/edit                   - Change email form
//! POST /account/edit                   - Change email
//! GET  /account/change_password        - Change password form
//! POST /account/change_password        - Change password
//! ```

pub mod account;
pub mod auth;
pub mod home;
pub mod products;
pub mod search;
pub mod shops;

use axum::{
    Router,
    routing::{get, post},
};
use tower_sessions::Session;

use crate::middleware::take_flashes;
use crate::models::{CurrentUser, FlashMessage};
use crate::state::AppState;

/// Data every page layout needs: who is logged in and pending flashes.
pub struct PageContext {
    pub user_email: Option<String>,
    pub flashes: Vec<FlashMessage>,
}

impl PageContext {
    /// Build the layout context, consuming the session's flash queue.
    pub async fn new(session: &Session, user: Option<&CurrentUser>) -> Self {
        Self {
            user_email: user.map(|user| user.email.to_string()),
            flashes: take_flashes(session).await,
        }
    }
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", get(auth::logout))
}

/// Create the shop routes router.
pub fn shop_routes() -> Router<AppState> {
    Router::new()
        .route("/create", get(shops::create_page).post(shops::create))
        .route("/manage/{shop_id}", get(shops::manage))
        .route("/{shop_id}", get(shops::show))
        .route(
            "/{shop_id}/add",
            get(shops::add_product_page).post(shops::add_product),
        )
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/{product_id}", get(products::show).post(products::comment))
        .route("/{product_id}/delete", post(products::delete))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::index))
        .route("/edit", get(account::edit_page).post(account::edit))
        .route(
            "/change_password",
            get(account::change_password_page).post(account::change_password),
        )
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Home page
        .route("/", get(home::home))
        // Auth routes
        .merge(auth_routes())
        // Shop routes
        .nest("/shop", shop_routes())
        // Product routes
        .nest("/product", product_routes())
        // Search
        .route("/search", get(search::search))
        // Account routes
        .nest("/account", account_routes())
}
