//! Authentication route handlers.
//!
//! Handles login, registration and logout against the local credential
//! store. Failed submissions re-render the form; successful ones redirect
//! with a flash message.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{OptionalAuth, log_in, log_out, post_login_redirect, push_flash};
use crate::models::FlashMessage;
use crate::routes::PageContext;
use crate::services::auth::AuthError;
use crate::services::validation::FieldErrors;
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    /// Checkbox; present when ticked.
    pub remember: Option<String>,
    pub next: Option<String>,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Query parameters for the login page.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub ctx: PageContext,
    pub email: String,
    pub next: Option<String>,
    pub error: Option<String>,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub ctx: PageContext,
    pub email: String,
    pub errors: FieldErrors,
    pub error: Option<String>,
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<LoginQuery>,
) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }

    LoginTemplate {
        ctx: PageContext::new(&session, None).await,
        email: String::new(),
        next: query.next,
        error: None,
    }
    .into_response()
}

/// Handle login form submission.
///
/// Every credential failure renders the same message.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    match state.auth().verify(&form.email, &form.password).await {
        Ok(user) => {
            log_in(&session, &user, form.remember.is_some()).await?;
            add_breadcrumb("auth", "User logged in", &[("user_id", user.id.to_string())]);
            tracing::info!(user_id = %user.id, "User logged in");

            push_flash(&session, FlashMessage::success("Logged in successfully")).await;
            Ok(Redirect::to(post_login_redirect(form.next.as_deref())).into_response())
        }
        Err(AuthError::InvalidCredentials) => {
            tracing::info!("Login failed");
            let page = LoginTemplate {
                ctx: PageContext::new(&session, None).await,
                email: form.email,
                next: form.next,
                error: Some("Invalid email or password".to_string()),
            };
            Ok((StatusCode::UNAUTHORIZED, page).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(session: Session, OptionalAuth(user): OptionalAuth) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }

    RegisterTemplate {
        ctx: PageContext::new(&session, None).await,
        email: String::new(),
        errors: FieldErrors::new(),
        error: None,
    }
    .into_response()
}

/// Handle registration form submission.
///
/// A new account is not logged in automatically; the user is sent to the
/// login page.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    let (status, errors, error) = match state
        .auth()
        .register(&form.email, &form.password, &form.confirm_password)
        .await
    {
        Ok(user) => {
            add_breadcrumb("auth", "User registered", &[("user_id", user.id.to_string())]);
            push_flash(
                &session,
                FlashMessage::success("Registration successful. Please log in."),
            )
            .await;
            return Ok(Redirect::to("/login").into_response());
        }
        Err(AuthError::Validation(errors)) => (StatusCode::UNPROCESSABLE_ENTITY, errors, None),
        Err(AuthError::UserAlreadyExists) => (
            StatusCode::CONFLICT,
            FieldErrors::new(),
            Some("An account with this email already exists".to_string()),
        ),
        Err(e) => return Err(e.into()),
    };

    let page = RegisterTemplate {
        ctx: PageContext::new(&session, None).await,
        email: form.email,
        errors,
        error,
    };
    Ok((status, page).into_response())
}

// =============================================================================
// Logout
// =============================================================================

/// Log out and return to the home page.
pub async fn logout(session: Session) -> Result<Redirect> {
    log_out(&session).await?;
    push_flash(&session, FlashMessage::info("You have been logged out")).await;
    Ok(Redirect::to("/"))
}
