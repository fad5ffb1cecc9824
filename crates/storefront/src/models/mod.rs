//! Domain models for the marketplace.
//!
//! These are the validated shapes handed between repositories, services and
//! routes. Rows decode straight into them via `sqlx::FromRow`.

pub mod comment;
pub mod product;
pub mod session;
pub mod shop;
pub mod user;

pub use comment::{Comment, CommentWithAuthor};
pub use product::Product;
pub use session::{Actor, CurrentUser, FlashLevel, FlashMessage};
pub use shop::Shop;
pub use user::User;
