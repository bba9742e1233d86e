use axum::{extract::State, Json};
use tower_cookies::Cookies;

use crate::{
    error::Result,
    middleware_layer::auth::{load_portal, session_id},
    services::resolver::AuthSnapshot,
    state::AppState,
};

fn anonymous() -> AuthSnapshot {
    AuthSnapshot {
        loading: false,
        ..AuthSnapshot::initial()
    }
}

/// Reports who the current visitor is, once their role has settled.
pub async fn current_session(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<Json<AuthSnapshot>> {
    let Some(id) = session_id(&cookies) else {
        return Ok(Json(anonymous()));
    };

    match load_portal(&state, id).await? {
        Some(portal) => Ok(Json(portal.settled(state.config.guard_settle_timeout).await)),
        None => Ok(Json(anonymous())),
    }
}
