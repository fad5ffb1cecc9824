//! Ownership-based authorization rules.
//!
//! Pure decisions over an [`Actor`] and the resource it wants to mutate. No
//! I/O happens here; callers load the resource (and its parent shop) first.

use thiserror::Error;

use bazaar_core::UserId;

use crate::models::{Actor, Product, Shop};

/// Something an actor may try to change.
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    /// A shop: adding products, viewing the management page.
    Shop(&'a Shop),
    /// A product, checked through the shop it belongs to.
    Product {
        product: &'a Product,
        shop: &'a Shop,
    },
    /// The comment thread of a product: open to every logged-in user.
    ProductComments,
}

/// Why an operation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthzError {
    /// Nobody is logged in.
    #[error("login required")]
    Unauthenticated,
    /// Logged in, but not allowed to touch this resource.
    #[error("forbidden")]
    Forbidden,
}

/// Whether `actor` may mutate `resource`.
#[must_use]
pub fn can_mutate(actor: &Actor, resource: Resource<'_>) -> bool {
    let Some(user_id) = actor.user_id() else {
        return false;
    };

    match resource {
        Resource::Shop(shop) => shop.is_owned_by(user_id),
        Resource::Product { product, shop } => {
            shop.id == product.shop_id && shop.is_owned_by(user_id)
        }
        Resource::ProductComments => true,
    }
}

/// Like [`can_mutate`], but says why not and yields the acting user's id.
///
/// # Errors
///
/// Returns `AuthzError::Unauthenticated` for anonymous actors and
/// `AuthzError::Forbidden` for authenticated actors lacking ownership.
pub fn authorize(actor: &Actor, resource: Resource<'_>) -> Result<UserId, AuthzError> {
    let user_id = actor.user_id().ok_or(AuthzError::Unauthenticated)?;

    if can_mutate(actor, resource) {
        Ok(user_id)
    } else {
        Err(AuthzError::Forbidden)
    }
}
