//! Product search route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::Result;
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::models::Product;
use crate::routes::PageContext;
use crate::state::AppState;

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// Search results page template.
#[derive(Template, WebTemplate)]
#[template(path = "search.html")]
pub struct SearchTemplate {
    pub ctx: PageContext,
    pub query: String,
    pub products: Vec<Product>,
}

/// Search products by title and description.
///
/// A blank query renders the page with no results.
#[instrument(skip_all, fields(query = %query.q))]
pub async fn search(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse> {
    let products = state.catalog().search(&query.q).await?;
    tracing::debug!(results = products.len(), "Search complete");

    Ok(SearchTemplate {
        ctx: PageContext::new(&session, user.as_ref()).await,
        query: query.q.trim().to_owned(),
        products,
    })
}
