use chrono::Utc;
use std::time::Duration;
use uuid::Uuid;
use zeroize::Zeroize;

use crate::{
    backend::client::Backend,
    error::{AppError, Result},
    models::{
        profile::{StudentProfile, TeacherProfile},
        role::Role,
        session::BackendSession,
        user::AuthUser,
    },
    repositories::profile as profile_repo,
    services::sessions::{PortalSession, SessionRegistry},
    validation::auth::{LoginForm, RegisterForm},
};

/// A password sign-in the backend accepted.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub session: BackendSession,
    /// Role picked on the form.
    pub selected: Role,
    /// Sequence number of the `SignedIn` event.
    pub seq: u64,
}

/// Checks the form, signs in with the backend and emits `SignedIn`.
///
/// # Arguments
///
/// * `backend` - The auth backend.
/// * `portal` - The browser session that receives the `SignedIn` event.
/// * `form` - The submitted login form. Its password is zeroized.
///
/// # Returns
///
/// The accepted session with the role picked on the form, or an `AppError`
/// if the form is invalid or the credentials are rejected.
pub async fn sign_in(
    backend: &dyn Backend,
    portal: &PortalSession,
    mut form: LoginForm,
) -> Result<SignedIn> {
    let email = form.email.trim().to_lowercase();
    let selected = match form.check() {
        Ok(role) => role,
        Err(e) => {
            form.password.zeroize();
            return Err(e);
        }
    };
    tracing::debug!("🔐 Login attempt for {}", email);

    let attempt = backend.sign_in_with_password(&email, &form.password).await;
    form.password.zeroize();
    let session = attempt.map_err(|e| {
        tracing::warn!("❌ Sign-in rejected for {}: {}", email, e);
        AppError::from(e)
    })?;

    let seq = portal.sign_in(session.clone());
    tracing::info!("✅ Signed in: {} (event {})", session.user.id, seq);
    Ok(SignedIn {
        session,
        selected,
        seq,
    })
}

/// Waits for the resolver and compares the stored role with the one picked.
///
/// The backend session is left in place on every error.
pub async fn confirm_role(
    portal: &PortalSession,
    signed_in: &SignedIn,
    settle_timeout: Duration,
) -> Result<Role> {
    let snapshot = portal.settled_at(signed_in.seq, settle_timeout).await;
    if snapshot.loading || snapshot.epoch < signed_in.seq {
        tracing::warn!("❌ Role for {} did not resolve in time", signed_in.session.user.id);
        return Err(AppError::Authentication(
            "Could not verify your account role. Please try again.".to_string(),
        ));
    }

    match snapshot.role {
        None => Err(AppError::Authentication(
            "No role is assigned to this account".to_string(),
        )),
        Some(role) if role != signed_in.selected => {
            tracing::warn!(
                "❌ {} picked {} but holds {}",
                signed_in.session.user.id,
                signed_in.selected,
                role
            );
            Err(AppError::RoleMismatch)
        }
        Some(role) => Ok(role),
    }
}

/// Creates a student or faculty account with its profile rows.
///
/// # Arguments
///
/// * `backend` - The auth and data backend.
/// * `form` - The submitted registration form.
/// * `allowed_domain` - The email domain accounts must use, if restricted.
///
/// # Returns
///
/// The new backend user, or an `AppError` if validation or sign-up fails.
pub async fn register(
    backend: &dyn Backend,
    mut form: RegisterForm,
    allowed_domain: Option<&str>,
) -> Result<AuthUser> {
    let email = form.email.trim().to_lowercase();
    let role = match form.check(allowed_domain) {
        Ok(role) => role,
        Err(e) => {
            form.password.zeroize();
            form.confirm_password.zeroize();
            return Err(e);
        }
    };

    let metadata = sonic_rs::json!({ "user_role": role.as_str() });
    let attempt = backend.sign_up(&email, &form.password, metadata).await;
    form.password.zeroize();
    form.confirm_password.zeroize();
    let user = attempt.map_err(|e| {
        tracing::warn!("❌ Sign-up rejected for {}: {}", email, e);
        AppError::from(e)
    })?;

    profile_repo::create_profile(backend, None, user.id, &email, role).await?;

    match role {
        Role::Student => {
            let student = StudentProfile {
                user_id: user.id,
                name: form.name.trim().to_string(),
                registration_number: form.registration_number.trim().to_string(),
                phone: form.phone(),
                department_id: form.department_id(),
                class_id: form.class_id(),
                session: form.academic_session(),
            };
            profile_repo::create_student(backend, None, &student).await?;
        }
        _ => {
            let teacher = TeacherProfile {
                user_id: user.id,
                name: form.name.trim().to_string(),
                faculty_id: form.faculty_id.trim().to_string(),
                phone: form.phone(),
                department_id: form.department_id(),
            };
            profile_repo::create_teacher(backend, None, &teacher).await?;
        }
    }

    tracing::info!("✅ Registered {} as {}", user.id, role);
    Ok(user)
}

/// Refreshes the access token of `portal` if it is about to expire.
///
/// # Arguments
///
/// * `backend` - The auth backend that issues the new tokens.
/// * `portal` - The browser session whose token is checked.
///
/// # Returns
///
/// The new session when one was issued, `None` when the token is still
/// fresh. A rejected refresh signs the browser session out locally.
///
/// Refreshes of one browser session run one at a time. A request that waited
/// on another one's refresh picks up its result instead of reusing the
/// rotated refresh token.
pub async fn refresh_if_needed(
    backend: &dyn Backend,
    portal: &PortalSession,
) -> Result<Option<BackendSession>> {
    if !portal
        .current_session()
        .is_some_and(|s| s.needs_refresh(Utc::now()))
    {
        return Ok(None);
    }

    let _refreshing = portal.refreshing().await;
    let Some(current) = portal.current_session() else {
        return Ok(None);
    };
    if !current.needs_refresh(Utc::now()) {
        return Ok(None);
    }

    match backend.refresh_session(&current.refresh_token).await {
        Ok(fresh) => {
            portal.refresh(fresh.clone());
            tracing::debug!("🔄 Token refreshed for {}", fresh.user.id);
            Ok(Some(fresh))
        }
        Err(e) => {
            tracing::warn!("❌ Token refresh failed for {}: {}", current.user.id, e);
            portal.expire();
            Err(AppError::Authentication("Your session has expired".to_string()))
        }
    }
}

/// Drops browser session `id` once its visitor signed in again as `user`.
///
/// A different account is signed out with the backend. For the same account
/// the session is only forgotten locally, because a backend sign-out would
/// revoke the refresh token of the new session too.
pub async fn retire(backend: &dyn Backend, registry: &SessionRegistry, id: Uuid, user: Uuid) {
    if let Some(portal) = registry.get(id).await {
        match portal.current_session() {
            Some(previous) if previous.user.id != user => {
                portal.sign_out(backend).await;
            }
            _ => {
                portal.expire();
            }
        }
    }
    registry.close(id).await;
}

/// Signs browser session `id` out and forgets it.
pub async fn logout(backend: &dyn Backend, registry: &SessionRegistry, id: Uuid) {
    if let Some(portal) = registry.get(id).await {
        let user = portal.current_session().map(|s| s.user.id);
        portal.sign_out(backend).await;
        if let Some(user) = user {
            tracing::info!("👋 Signed out: {}", user);
        }
    }
    registry.close(id).await;
}
