//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tower_sessions::Session;
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::models::Product;
use crate::routes::PageContext;
use crate::state::AppState;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct HomeTemplate {
    pub ctx: PageContext,
    /// Newest first.
    pub products: Vec<Product>,
}

/// Display the home page.
///
/// Lists the most recently created products. Recency is approximated by
/// descending product id.
#[instrument(skip_all)]
pub async fn home(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<impl IntoResponse> {
    let products = state
        .catalog()
        .recent_products(state.config().recent_products)
        .await?;

    Ok(HomeTemplate {
        ctx: PageContext::new(&session, user.as_ref()).await,
        products,
    })
}
