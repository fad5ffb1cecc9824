//! Product route handlers: detail page, comments and deletion.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use bazaar_core::ProductId;

use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::auth::login_url;
use crate::middleware::{OptionalAuth, RequireAuth, push_flash};
use crate::models::{CommentWithAuthor, CurrentUser, FlashMessage, Product, Shop};
use crate::routes::PageContext;
use crate::services::catalog::{CatalogError, ProductPage};
use crate::services::validation::FieldErrors;
use crate::state::AppState;

/// Comment form data.
#[derive(Debug, Deserialize)]
pub struct CommentForm {
    pub text: String,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "product/show.html")]
pub struct ProductTemplate {
    pub ctx: PageContext,
    pub product: Product,
    pub shop: Shop,
    pub comments: Vec<CommentWithAuthor>,
    pub can_comment: bool,
    pub is_owner: bool,
    pub comment_text: String,
    pub errors: FieldErrors,
}

impl ProductTemplate {
    async fn new(session: &Session, user: Option<&CurrentUser>, page: ProductPage) -> Self {
        let is_owner = user.is_some_and(|u| page.shop.is_owned_by(u.id));

        Self {
            ctx: PageContext::new(session, user).await,
            product: page.product,
            shop: page.shop,
            comments: page.comments,
            can_comment: user.is_some(),
            is_owner,
            comment_text: String::new(),
            errors: FieldErrors::new(),
        }
    }
}

/// Display a product with its shop and comments.
#[instrument(skip_all, fields(product_id = %product_id))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Path(product_id): Path<ProductId>,
) -> Result<impl IntoResponse> {
    let page = state.catalog().product_page(product_id).await?;
    Ok(ProductTemplate::new(&session, user.as_ref(), page).await)
}

/// Handle the comment form.
///
/// Anonymous visitors are sent to the login page and brought back to the
/// product afterwards.
#[instrument(skip_all, fields(product_id = %product_id))]
pub async fn comment(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
    Path(product_id): Path<ProductId>,
    Form(form): Form<CommentForm>,
) -> Result<Response> {
    let product_path = format!("/product/{product_id}");

    let Some(user) = auth.0.as_ref() else {
        push_flash(&session, FlashMessage::info("Please log in to comment")).await;
        return Ok(Redirect::to(&login_url(Some(&product_path))).into_response());
    };

    let catalog = state.catalog();
    match catalog.add_comment(&auth.actor(), product_id, &form.text).await {
        Ok(comment) => {
            add_breadcrumb(
                "comment",
                "Comment added",
                &[("comment_id", comment.id.to_string())],
            );
            push_flash(&session, FlashMessage::success("Comment added")).await;
            Ok(Redirect::to(&product_path).into_response())
        }
        Err(CatalogError::Validation(errors)) => {
            let page = catalog.product_page(product_id).await?;
            let mut template = ProductTemplate::new(&session, Some(user), page).await;
            template.comment_text = form.text;
            template.errors = errors;
            Ok((StatusCode::UNPROCESSABLE_ENTITY, template).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// Delete a product with its comments and image.
#[instrument(skip_all, fields(product_id = %product_id, user_id = %user.0.id))]
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    user: RequireAuth,
    Path(product_id): Path<ProductId>,
) -> Result<Redirect> {
    let product = state
        .catalog()
        .delete_product(&user.actor(), product_id)
        .await?;

    add_breadcrumb(
        "product",
        "Product deleted",
        &[("product_id", product.id.to_string())],
    );
    push_flash(&session, FlashMessage::success("Product deleted")).await;
    Ok(Redirect::to(&format!("/shop/manage/{}", product.shop_id)))
}
