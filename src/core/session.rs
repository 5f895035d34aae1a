use super::timestamp;
use super::user::User;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The logged-in user, passed explicitly to command handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: u64,
    pub username: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub logged_in_at: DateTime<Utc>,
}

impl Session {
    pub fn for_user(user: &User) -> Self {
        Self {
            user_id: user.user_id(),
            username: user.username().to_string(),
            logged_in_at: Utc::now(),
        }
    }
}
