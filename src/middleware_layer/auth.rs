use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tower_cookies::cookie::time::Duration;
use tower_cookies::{Cookie, Cookies};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    middleware_layer::csrf::ensure_csrf_token,
    models::{role::Role, user::AuthUser},
    repositories::session_store,
    services::{
        auth as auth_service,
        guard::{self, Access},
        sessions::PortalSession,
    },
    state::AppState,
    views::layout,
};

pub const SESSION_COOKIE: &str = "session_id";

/// The signed-in visitor a guarded handler is serving.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub session_id: Uuid,
    pub user: AuthUser,
    pub role: Role,
    pub access_token: String,
    pub csrf_token: String,
}

/// State of one guarded route group.
#[derive(Clone)]
pub struct GuardState {
    pub app: AppState,
    /// `None` admits any resolved role.
    pub required: Option<Role>,
    /// JSON errors instead of redirects and the loading page.
    pub api: bool,
}

impl GuardState {
    pub fn page(app: AppState, required: Option<Role>) -> Self {
        Self { app, required, api: false }
    }

    pub fn api(app: AppState, required: Option<Role>) -> Self {
        Self { app, required, api: true }
    }
}

/// Creates a cookie with the portal's attributes.
pub fn secure_cookie(name: &str, value: String, max_age_days: i64, production: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(name.to_string(), value);

    if name == SESSION_COOKIE {
        cookie.set_http_only(true);
    }
    if production {
        cookie.set_secure(true);
    }

    cookie.set_same_site(tower_cookies::cookie::SameSite::Lax);
    cookie.set_max_age(Duration::seconds(max_age_days * 86400));
    cookie.set_path("/");
    cookie
}

/// Extracts the browser session id from the request cookies.
pub fn session_id(cookies: &Cookies) -> Option<Uuid> {
    cookies
        .get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
}

/// Finds the auth state of browser session `id`.
///
/// Falls back to the copy persisted in Redis after a restart, and refreshes
/// a token that is about to expire.
pub async fn load_portal(state: &AppState, id: Uuid) -> Result<Option<Arc<PortalSession>>> {
    let mut redis = state.redis.clone();

    let portal = match state.sessions.get(id).await {
        Some(portal) => portal,
        None => match session_store::load_session(&mut redis, id).await? {
            Some(stored) => state.sessions.restore(id, stored).await,
            None => return Ok(None),
        },
    };

    match auth_service::refresh_if_needed(state.backend.as_ref(), &portal).await {
        Ok(Some(fresh)) => {
            session_store::save_session(&mut redis, id, &fresh, state.config.session_duration_days)
                .await?;
        }
        Ok(None) => {}
        Err(_) => {
            session_store::delete_session(&mut redis, id).await?;
            state.sessions.close(id).await;
            return Ok(None);
        }
    }

    Ok(Some(portal))
}

fn denied(api: bool) -> Response {
    if api {
        AppError::Unauthorized.into_response()
    } else {
        Redirect::to("/login").into_response()
    }
}

/// Admits the request only when the session's resolved role satisfies the route.
///
/// # Arguments
///
/// * `guard` - The application state and the role the route group requires.
/// * `cookies` - The request cookies.
/// * `request` - The incoming request. A `Viewer` is inserted on success.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// The inner response when access is granted. Otherwise the loading page or a
/// redirect to `/login`, or `503`/`403` JSON for API routes.
pub async fn require_role(
    State(guard): State<GuardState>,
    cookies: Cookies,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    tracing::debug!("🔐 Checking access to {}", request.uri().path());
    let state = &guard.app;

    let Some(id) = session_id(&cookies) else {
        tracing::debug!("❌ No session_id cookie found");
        return denied(guard.api);
    };

    let portal = match load_portal(state, id).await {
        Ok(Some(portal)) => portal,
        Ok(None) => {
            tracing::debug!("❌ No live session for {}", id);
            return denied(guard.api);
        }
        Err(e) => return e.into_response(),
    };

    let snapshot = portal.settled(state.config.guard_settle_timeout).await;
    match guard::evaluate(&snapshot, guard.required) {
        Access::Pending if guard.api => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::RETRY_AFTER, "1")],
        )
            .into_response(),
        Access::Pending => layout::loading_page().into_response(),
        Access::Denied => {
            tracing::warn!(
                "❌ Access to {} denied for session {}",
                request.uri().path(),
                id
            );
            denied(guard.api)
        }
        Access::Granted { user, role } => {
            let Some(session) = portal.current_session() else {
                return denied(guard.api);
            };
            let csrf_token = match ensure_csrf_token(state, &cookies).await {
                Ok(token) => token,
                Err(e) => return e.into_response(),
            };

            tracing::debug!("✅ {} admitted as {}", user.id, role);
            request.extensions_mut().insert(Viewer {
                session_id: id,
                user,
                role,
                access_token: session.access_token,
                csrf_token,
            });
            next.run(request).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_session_cookie_is_http_only() {
        let session = secure_cookie(SESSION_COOKIE, "id".into(), 7, false);
        assert_eq!(session.http_only(), Some(true));
        assert_eq!(session.secure(), None);
        assert_eq!(session.max_age(), Some(Duration::days(7)));

        let csrf = secure_cookie("csrf_token", "tok".into(), 1, true);
        assert_ne!(csrf.http_only(), Some(true));
        assert_eq!(csrf.secure(), Some(true));
        assert_eq!(csrf.path(), Some("/"));
    }
}
