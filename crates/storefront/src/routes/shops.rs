//! Shop route handlers.
//!
//! Creating a shop needs a login; managing it and adding products needs
//! ownership. The public shop page is open to everyone.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Multipart, Path, State, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use bazaar_core::ShopId;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{OptionalAuth, RequireAuth, push_flash};
use crate::models::{FlashMessage, Product, Shop};
use crate::routes::PageContext;
use crate::services::catalog::{CatalogError, ImageUpload, ProductInput, ShopInput};
use crate::services::validation::FieldErrors;
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// New shop form data.
#[derive(Debug, Deserialize)]
pub struct ShopForm {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

// =============================================================================
// Templates
// =============================================================================

/// New shop page template.
#[derive(Template, WebTemplate)]
#[template(path = "shop/create.html")]
pub struct CreateShopTemplate {
    pub ctx: PageContext,
    pub name: String,
    pub description: String,
    pub errors: FieldErrors,
    pub error: Option<String>,
}

/// Owner management page template.
#[derive(Template, WebTemplate)]
#[template(path = "shop/manage.html")]
pub struct ManageShopTemplate {
    pub ctx: PageContext,
    pub shop: Shop,
    pub products: Vec<Product>,
}

/// Public shop page template.
#[derive(Template, WebTemplate)]
#[template(path = "shop/show.html")]
pub struct ShopTemplate {
    pub ctx: PageContext,
    pub shop: Shop,
    pub products: Vec<Product>,
    pub is_owner: bool,
}

/// New product page template.
#[derive(Template, WebTemplate)]
#[template(path = "shop/add_product.html")]
pub struct AddProductTemplate {
    pub ctx: PageContext,
    pub shop: Shop,
    pub input: ProductInput,
    pub errors: FieldErrors,
    pub allowed_extensions: String,
}

// =============================================================================
// Shop Creation
// =============================================================================

/// Display the new shop form.
pub async fn create_page(session: Session, user: RequireAuth) -> impl IntoResponse {
    CreateShopTemplate {
        ctx: PageContext::new(&session, Some(&user.0)).await,
        name: String::new(),
        description: String::new(),
        errors: FieldErrors::new(),
        error: None,
    }
}

/// Handle new shop form submission.
#[instrument(skip_all, fields(user_id = %user.0.id))]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    user: RequireAuth,
    Form(form): Form<ShopForm>,
) -> Result<Response> {
    let input = ShopInput {
        name: form.name,
        description: Some(form.description).filter(|d| !d.trim().is_empty()),
    };

    let (status, errors, error) = match state.catalog().create_shop(&user.actor(), &input).await {
        Ok(shop) => {
            add_breadcrumb("shop", "Shop created", &[("shop_id", shop.id.to_string())]);
            push_flash(&session, FlashMessage::success("Shop created")).await;
            return Ok(Redirect::to(&format!("/shop/manage/{}", shop.id)).into_response());
        }
        Err(CatalogError::Validation(errors)) => (StatusCode::UNPROCESSABLE_ENTITY, errors, None),
        Err(CatalogError::DuplicateName) => (
            StatusCode::CONFLICT,
            FieldErrors::new(),
            Some("A shop with this name already exists".to_string()),
        ),
        Err(e) => return Err(e.into()),
    };

    let page = CreateShopTemplate {
        ctx: PageContext::new(&session, Some(&user.0)).await,
        name: input.name,
        description: input.description.unwrap_or_default(),
        errors,
        error,
    };
    Ok((status, page).into_response())
}

// =============================================================================
// Shop Pages
// =============================================================================

/// Owner-only management view.
#[instrument(skip_all, fields(shop_id = %shop_id))]
pub async fn manage(
    State(state): State<AppState>,
    session: Session,
    user: RequireAuth,
    Path(shop_id): Path<ShopId>,
) -> Result<impl IntoResponse> {
    let page = state.catalog().manage_shop(&user.actor(), shop_id).await?;

    Ok(ManageShopTemplate {
        ctx: PageContext::new(&session, Some(&user.0)).await,
        shop: page.shop,
        products: page.products,
    })
}

/// Public shop page.
#[instrument(skip_all, fields(shop_id = %shop_id))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Path(shop_id): Path<ShopId>,
) -> Result<impl IntoResponse> {
    let page = state.catalog().shop_page(shop_id).await?;
    let is_owner = user.as_ref().is_some_and(|u| page.shop.is_owned_by(u.id));

    Ok(ShopTemplate {
        ctx: PageContext::new(&session, user.as_ref()).await,
        shop: page.shop,
        products: page.products,
        is_owner,
    })
}

// =============================================================================
// Adding Products
// =============================================================================

/// Display the new product form.
#[instrument(skip_all, fields(shop_id = %shop_id))]
pub async fn add_product_page(
    State(state): State<AppState>,
    session: Session,
    user: RequireAuth,
    Path(shop_id): Path<ShopId>,
) -> Result<impl IntoResponse> {
    let shop = state.catalog().owned_shop(&user.actor(), shop_id).await?;

    Ok(AddProductTemplate {
        ctx: PageContext::new(&session, Some(&user.0)).await,
        shop,
        input: ProductInput::default(),
        errors: FieldErrors::new(),
        allowed_extensions: allowed_extensions(&state),
    })
}

/// Handle the multipart new product form.
#[instrument(skip_all, fields(shop_id = %shop_id))]
pub async fn add_product(
    State(state): State<AppState>,
    session: Session,
    user: RequireAuth,
    Path(shop_id): Path<ShopId>,
    multipart: Multipart,
) -> Result<Response> {
    let (input, image) = read_product_form(multipart).await?;
    let catalog = state.catalog();
    let actor = user.actor();

    match catalog
        .add_product(&actor, shop_id, &input, image.as_ref())
        .await
    {
        Ok(product) => {
            add_breadcrumb(
                "product",
                "Product added",
                &[("product_id", product.id.to_string())],
            );
            push_flash(&session, FlashMessage::success("Product added")).await;
            Ok(Redirect::to(&format!("/shop/manage/{shop_id}")).into_response())
        }
        Err(CatalogError::Validation(errors)) => {
            let shop = catalog.owned_shop(&actor, shop_id).await?;
            let page = AddProductTemplate {
                ctx: PageContext::new(&session, Some(&user.0)).await,
                shop,
                input,
                errors,
                allowed_extensions: allowed_extensions(&state),
            };
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// Collect the product fields and optional image from a multipart body.
///
/// A file input left empty arrives as a part with an empty filename and is
/// treated as no image.
async fn read_product_form(
    mut multipart: Multipart,
) -> Result<(ProductInput, Option<ImageUpload>)> {
    let mut input = ProductInput::default();
    let mut image = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        match name.as_str() {
            "title" => input.title = field.text().await.map_err(multipart_error)?,
            "description" => input.description = field.text().await.map_err(multipart_error)?,
            "price" => input.price = field.text().await.map_err(multipart_error)?,
            "image" => {
                let filename = field.file_name().unwrap_or_default().to_owned();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                if !filename.is_empty() {
                    image = Some(ImageUpload {
                        filename,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }

    Ok((input, image))
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        AppError::BadRequest(err.body_text())
    }
}

fn allowed_extensions(state: &AppState) -> String {
    state.config().uploads.allowed_extensions.join(", ")
}
