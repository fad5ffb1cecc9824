//! Session-related types.
//!
//! Types stored in the session for authentication state, plus the resolved
//! request actor.

use serde::{Deserialize, Serialize};

use bazaar_core::{Email, UserId};

use super::User;

/// An authenticated user, resolved against the database for this request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
}

impl From<User> for CurrentUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
        }
    }
}

/// Who is performing an operation.
///
/// Every catalog and account operation receives the actor explicitly.
#[derive(Debug, Clone)]
pub enum Actor {
    /// No session, or a session whose user no longer exists.
    Anonymous,
    /// A logged-in user.
    User(CurrentUser),
}

impl Actor {
    /// The acting user's id, if authenticated.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Anonymous => None,
            Self::User(user) => Some(user.id),
        }
    }

    /// Whether the actor is logged in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::User(_))
    }
}

impl From<Option<CurrentUser>> for Actor {
    fn from(user: Option<CurrentUser>) -> Self {
        user.map_or(Self::Anonymous, Self::User)
    }
}

/// Severity of a flash message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Info,
    Error,
}

impl FlashLevel {
    /// CSS class suffix used by the base template.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Error => "error",
        }
    }
}

/// A one-shot message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: FlashLevel,
    pub message: String,
}

impl FlashMessage {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Success,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Info,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Error,
            message: message.into(),
        }
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for the logged-in user's id. Only the id is stored; the user row
    /// is re-read on every request.
    pub const USER_ID: &str = "user_id";

    /// Key for pending flash messages.
    pub const FLASH: &str = "flash";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_actor_has_no_id() {
        let actor = Actor::from(None);
        assert!(!actor.is_authenticated());
        assert_eq!(actor.user_id(), None);
    }

    #[test]
    fn test_user_actor_exposes_id() {
        let email = Email::parse("a@x.com").unwrap_or_else(|_| unreachable!());
        let actor = Actor::from(Some(CurrentUser {
            id: UserId::new(5),
            email,
        }));
        assert!(actor.is_authenticated());
        assert_eq!(actor.user_id(), Some(UserId::new(5)));
    }

    #[test]
    fn test_flash_serializes_lowercase_level() {
        let json = serde_json::to_string(&FlashMessage::success("Saved")).unwrap_or_default();
        assert_eq!(json, r#"{"level":"success","message":"Saved"}"#);
    }
}
