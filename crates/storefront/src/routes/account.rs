//! Account route handlers.
//!
//! All routes require authentication. A user can only change their own
//! email and password.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{RequireAuth, push_flash};
use crate::models::{FlashMessage, Shop};
use crate::routes::PageContext;
use crate::services::auth::AuthError;
use crate::services::validation::FieldErrors;
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Change email form data.
#[derive(Debug, Deserialize)]
pub struct EditAccountForm {
    pub email: String,
}

/// Change password form data.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordForm {
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Account overview template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountTemplate {
    pub ctx: PageContext,
    pub email: String,
    pub shops: Vec<Shop>,
}

/// Change email template.
#[derive(Template, WebTemplate)]
#[template(path = "account/edit.html")]
pub struct EditAccountTemplate {
    pub ctx: PageContext,
    pub email: String,
    pub errors: FieldErrors,
    pub error: Option<String>,
}

/// Change password template.
#[derive(Template, WebTemplate)]
#[template(path = "account/change_password.html")]
pub struct ChangePasswordTemplate {
    pub ctx: PageContext,
    pub errors: FieldErrors,
    pub error: Option<String>,
}

// =============================================================================
// Overview
// =============================================================================

/// Account overview: email and owned shops.
#[instrument(skip_all, fields(user_id = %user.0.id))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    user: RequireAuth,
) -> Result<impl IntoResponse> {
    let shops = state.catalog().shops_of(&user.actor()).await?;

    Ok(AccountTemplate {
        ctx: PageContext::new(&session, Some(&user.0)).await,
        email: user.0.email.to_string(),
        shops,
    })
}

// =============================================================================
// Email
// =============================================================================

/// Display the change email form, prefilled with the current email.
pub async fn edit_page(session: Session, user: RequireAuth) -> impl IntoResponse {
    EditAccountTemplate {
        ctx: PageContext::new(&session, Some(&user.0)).await,
        email: user.0.email.to_string(),
        errors: FieldErrors::new(),
        error: None,
    }
}

/// Handle the change email form.
#[instrument(skip_all, fields(user_id = %user.0.id))]
pub async fn edit(
    State(state): State<AppState>,
    session: Session,
    user: RequireAuth,
    Form(form): Form<EditAccountForm>,
) -> Result<Response> {
    let (status, errors, error) = match state.auth().change_email(user.0.id, &form.email).await {
        Ok(_) => {
            add_breadcrumb("account", "Email changed", &[]);
            push_flash(&session, FlashMessage::success("Your email has been updated")).await;
            return Ok(Redirect::to("/account").into_response());
        }
        Err(AuthError::Validation(errors)) => (StatusCode::UNPROCESSABLE_ENTITY, errors, None),
        Err(AuthError::UserAlreadyExists) => (
            StatusCode::CONFLICT,
            FieldErrors::new(),
            Some("An account with this email already exists".to_string()),
        ),
        Err(e) => return Err(e.into()),
    };

    let page = EditAccountTemplate {
        ctx: PageContext::new(&session, Some(&user.0)).await,
        email: form.email,
        errors,
        error,
    };
    Ok((status, page).into_response())
}

// =============================================================================
// Password
// =============================================================================

/// Display the change password form.
pub async fn change_password_page(session: Session, user: RequireAuth) -> impl IntoResponse {
    ChangePasswordTemplate {
        ctx: PageContext::new(&session, Some(&user.0)).await,
        errors: FieldErrors::new(),
        error: None,
    }
}

/// Handle the change password form.
///
/// A wrong current password renders the generic credentials message.
#[instrument(skip_all, fields(user_id = %user.0.id))]
pub async fn change_password(
    State(state): State<AppState>,
    session: Session,
    user: RequireAuth,
    Form(form): Form<ChangePasswordForm>,
) -> Result<Response> {
    let result = state
        .auth()
        .change_password(
            user.0.id,
            &form.old_password,
            &form.new_password,
            &form.confirm_password,
        )
        .await;

    let (status, errors, error) = match result {
        Ok(()) => {
            add_breadcrumb("account", "Password changed", &[]);
            push_flash(&session, FlashMessage::success("Your password has been changed")).await;
            return Ok(Redirect::to("/account").into_response());
        }
        Err(AuthError::Validation(errors)) => (StatusCode::UNPROCESSABLE_ENTITY, errors, None),
        Err(AuthError::InvalidCredentials) => (
            StatusCode::UNAUTHORIZED,
            FieldErrors::new(),
            Some("Invalid email or password".to_string()),
        ),
        Err(e) => return Err(e.into()),
    };

    let page = ChangePasswordTemplate {
        ctx: PageContext::new(&session, Some(&user.0)).await,
        errors,
        error,
    };
    Ok((status, page).into_response())
}
