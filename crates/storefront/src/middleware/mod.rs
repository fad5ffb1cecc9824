//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers (CSP, frame and referrer policies)
//! 5. Session layer (tower-sessions with `SQLite` store)
//!
//! Identity is resolved per handler by the [`RequireAuth`] and
//! [`OptionalAuth`] extractors rather than by a layer.

pub mod auth;
pub mod flash;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{AuthRejection, OptionalAuth, RequireAuth, log_in, log_out, post_login_redirect};
pub use flash::{push_flash, take_flashes};
pub use request_id::{RequestId, request_id_middleware};
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
