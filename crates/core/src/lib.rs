//! Bazaar Core - Shared domain types.
//!
//! This crate provides the types shared by every Bazaar component:
//! - `storefront` - The marketplace web application
//! - `cli` - Command-line tools for migrations and user management
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no database
//! access, no HTTP. The optional `sqlite` feature adds `sqlx` encode/decode
//! support so the types can be bound and fetched directly.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices and emails

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
