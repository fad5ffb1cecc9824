//! Shop domain types.

use chrono::{DateTime, Utc};

use bazaar_core::{ShopId, UserId};

/// A shop owned by a single user.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Shop {
    pub id: ShopId,
    /// Globally unique display name.
    pub name: String,
    pub description: Option<String>,
    /// Owner; fixed at creation.
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl Shop {
    /// Whether `user` owns this shop.
    #[must_use]
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.owner_id == user
    }
}
