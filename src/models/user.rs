use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a signed-in user as reported by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// The unique identifier for the user.
    pub id: Uuid,
    /// The user's email address.
    #[serde(default)]
    pub email: Option<String>,
}

/// A row of the `profiles` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Same identifier as the auth user.
    pub id: Uuid,
    /// The user's email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Raw role value; parsed into `Role` by the resolver.
    pub role: String,
}
