use crate::{
    models::{role::Role, user::AuthUser},
    services::resolver::AuthSnapshot,
};

/// Outcome of checking a snapshot against a page's requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// The resolver has not settled; render nothing and do not redirect.
    Pending,
    /// Send the visitor to the login page.
    Denied,
    /// The page may render and fetch its own data.
    Granted { user: AuthUser, role: Role },
}

/// Decides access for a page that needs `required` (or any role, if `None`).
///
/// A signed-in user whose role could not be resolved is denied exactly like
/// an anonymous visitor.
pub fn evaluate(snapshot: &AuthSnapshot, required: Option<Role>) -> Access {
    if snapshot.loading {
        return Access::Pending;
    }

    match (&snapshot.user, snapshot.role) {
        (Some(user), Some(role)) if required.is_none_or(|r| r == role) => Access::Granted {
            user: user.clone(),
            role,
        },
        _ => Access::Denied,
    }
}
