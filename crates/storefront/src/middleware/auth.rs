//! Authentication extractors and session login helpers.
//!
//! The session only carries the user's id. Every request re-reads the user
//! row; a session pointing at a user that no longer exists is flushed and the
//! request continues anonymously.

use axum::{
    extract::FromRequestParts,
    http::{Method, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::{Expiry, Session};

use bazaar_core::UserId;

use crate::db::users::UserRepository;
use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::models::session::keys;
use crate::models::{Actor, CurrentUser, User};
use crate::state::AppState;

/// Extractor that requires a logged-in user.
///
/// Anonymous requests are redirected to `/login?next=<path>`.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

impl RequireAuth {
    /// The user as a service-level actor.
    #[must_use]
    pub fn actor(&self) -> Actor {
        Actor::User(self.0.clone())
    }
}

/// Error returned when authentication is required but the user is not logged in.
pub enum AuthRejection {
    /// Redirect to the login page, returning to `next` afterwards.
    RedirectToLogin { next: Option<String> },
    /// Resolving the session failed.
    Error(AppError),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin { next } => Redirect::to(&login_url(next.as_deref())).into_response(),
            Self::Error(err) => err.into_response(),
        }
    }
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match resolve(parts, state).await.map_err(AuthRejection::Error)? {
            Some(user) => Ok(Self(user)),
            None => {
                // Only GET targets can be replayed after login
                let next = (parts.method == Method::GET).then(|| {
                    parts
                        .uri
                        .path_and_query()
                        .map_or_else(|| parts.uri.path().to_owned(), ToString::to_string)
                });
                Err(AuthRejection::RedirectToLogin { next })
            }
        }
    }
}

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireAuth`, this does not reject anonymous requests.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl OptionalAuth {
    /// The user (or anonymous) as a service-level actor.
    #[must_use]
    pub fn actor(&self) -> Actor {
        Actor::from(self.0.clone())
    }
}

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(resolve(parts, state).await?))
    }
}

/// Resolved identity cached in the request extensions.
#[derive(Clone)]
struct Resolved(Option<CurrentUser>);

/// Resolve the session's user id against the database, once per request.
async fn resolve(parts: &mut Parts, state: &AppState) -> Result<Option<CurrentUser>, AppError> {
    if let Some(Resolved(user)) = parts.extensions.get::<Resolved>() {
        return Ok(user.clone());
    }

    let Some(session) = parts.extensions.get::<Session>().cloned() else {
        return Err(AppError::Internal("session layer missing".to_string()));
    };

    let user = match session.get::<UserId>(keys::USER_ID).await? {
        None => None,
        Some(user_id) => match UserRepository::new(state.pool()).get_by_id(user_id).await? {
            Some(user) => {
                set_sentry_user(&user.id);
                Some(CurrentUser::from(user))
            }
            None => {
                tracing::info!(user_id = %user_id, "Session user no longer exists, flushing");
                session.flush().await?;
                None
            }
        },
    };

    parts.extensions.insert(Resolved(user.clone()));
    Ok(user)
}

/// Log a user in on this session.
///
/// Rotates the session id, stores the user id and picks the expiry: the
/// 7 day inactivity window when `remember` is set, otherwise the session
/// ends with the browser session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn log_in(
    session: &Session,
    user: &User,
    remember: bool,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(keys::USER_ID, user.id).await?;
    session.set_expiry(if remember {
        None
    } else {
        Some(Expiry::OnSessionEnd)
    });

    set_sentry_user(&user.id);
    Ok(())
}

/// Log out: drop everything in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn log_out(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await?;
    clear_sentry_user();
    Ok(())
}

/// Login URL carrying an optional return path.
#[must_use]
pub fn login_url(next: Option<&str>) -> String {
    match next.filter(|next| is_local_path(next)) {
        Some(next) => format!("/login?next={}", urlencoding::encode(next)),
        None => "/login".to_string(),
    }
}

/// Where to send a user after logging in.
///
/// Only local paths (a single leading `/`) are honoured; anything else,
/// including protocol-relative `//host` URLs, falls back to `/`.
#[must_use]
pub fn post_login_redirect(next: Option<&str>) -> &str {
    next.filter(|next| is_local_path(next)).unwrap_or("/")
}

fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.starts_with("/\\")
}
