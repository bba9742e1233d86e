use axum::{
    extract::State,
    response::{Html, IntoResponse, Response},
};
use tower_cookies::Cookies;

use crate::{
    middleware_layer::{
        auth::{load_portal, session_id},
        csrf::ensure_csrf_token,
    },
    state::AppState,
    views::{
        catalog,
        layout::{self, Nav},
    },
};

/// How the navbar should present the current visitor, plus the CSRF token
/// for its sign-out form.
///
/// Public pages never wait on the resolver; a role still loading shows the
/// anonymous bar.
pub async fn visitor(state: &AppState, cookies: &Cookies) -> (Nav, Option<String>) {
    let Some(id) = session_id(cookies) else {
        return (Nav::Anonymous, None);
    };

    let portal = match load_portal(state, id).await {
        Ok(Some(portal)) => portal,
        Ok(None) => return (Nav::Anonymous, None),
        Err(e) => {
            tracing::warn!("❌ Could not load session {}: {}", id, e);
            return (Nav::Anonymous, None);
        }
    };

    let snapshot = portal.snapshot();
    match (snapshot.user, snapshot.role) {
        (Some(_), Some(role)) if !snapshot.loading => match ensure_csrf_token(state, cookies).await {
            Ok(token) => (Nav::SignedIn(role), Some(token)),
            Err(e) => {
                tracing::warn!("❌ Could not issue CSRF token: {}", e);
                (Nav::Anonymous, None)
            }
        },
        _ => (Nav::Anonymous, None),
    }
}

async fn render(state: &AppState, cookies: &Cookies, title: &str, body: String) -> Html<String> {
    let (nav, csrf) = visitor(state, cookies).await;
    layout::page(title, nav, csrf.as_deref(), &body)
}

pub async fn home(State(state): State<AppState>, cookies: Cookies) -> Response {
    render(&state, &cookies, "Home", catalog::home()).await.into_response()
}

pub async fn courses(State(state): State<AppState>, cookies: Cookies) -> Response {
    render(&state, &cookies, "Courses", catalog::courses()).await.into_response()
}

pub async fn practice(State(state): State<AppState>, cookies: Cookies) -> Response {
    render(&state, &cookies, "Practice", catalog::practice()).await.into_response()
}

pub async fn community(State(state): State<AppState>, cookies: Cookies) -> Response {
    render(&state, &cookies, "Community", catalog::community()).await.into_response()
}
