use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::user::AuthUser;

/// Sessions this close to expiry are refreshed before use.
const REFRESH_MARGIN_SECS: i64 = 60;

/// A live session issued by the hosted auth service.
///
/// The browser only ever holds an opaque `session_id` cookie; the tokens stay
/// server-side (Redis, keyed by that id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSession {
    /// The user this session belongs to.
    pub user: AuthUser,
    /// Bearer token for row-level-secured table calls.
    pub access_token: String,
    /// Token used to obtain a new access token.
    pub refresh_token: String,
    /// The timestamp when the access token expires.
    pub expires_at: DateTime<Utc>,
}

impl BackendSession {
    /// Whether the access token is expired or about to be.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn session(expires_in: i64) -> BackendSession {
        BackendSession {
            user: AuthUser { id: Uuid::new_v4(), email: None },
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_at: Utc::now() + Duration::seconds(expires_in),
        }
    }

    #[test]
    fn fresh_session_is_not_refreshed() {
        assert!(!session(3600).needs_refresh(Utc::now()));
    }

    #[test]
    fn session_inside_margin_is_refreshed() {
        assert!(session(30).needs_refresh(Utc::now()));
        assert!(session(-10).needs_refresh(Utc::now()));
    }
}
