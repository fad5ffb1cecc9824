//! Business logic services for the marketplace.
//!
//! # Services
//!
//! - `auth` - Credential store: registration, login, password and email changes
//! - `authz` - Ownership rules deciding who may mutate what
//! - `catalog` - Shops, products, comments and search
//! - `uploads` - Product image storage
//! - `validation` - Field-level form validation helpers

pub mod auth;
pub mod authz;
pub mod catalog;
pub mod uploads;
pub mod validation;
