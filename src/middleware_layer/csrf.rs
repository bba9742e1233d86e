use axum::{
    body::Body,
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_cookies::Cookies;

use crate::{
    crypto::csrf::{generate_csrf_token, tokens_match},
    error::{AppError, Result},
    middleware_layer::auth::secure_cookie,
    repositories::session_store,
    state::AppState,
};

pub const CSRF_COOKIE: &str = "csrf_token";
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Issues a new token, registers it in Redis and sets the cookie.
pub async fn issue_csrf_token(state: &AppState, cookies: &Cookies) -> Result<String> {
    let token = generate_csrf_token();
    session_store::store_csrf(&mut state.redis.clone(), &token).await?;
    cookies.add(secure_cookie(
        CSRF_COOKIE,
        token.clone(),
        1,
        state.config.production,
    ));
    tracing::debug!("🔑 Issued CSRF token");
    Ok(token)
}

/// Returns the visitor's registered token, issuing a new one when it is missing or expired.
pub async fn ensure_csrf_token(state: &AppState, cookies: &Cookies) -> Result<String> {
    if let Some(cookie) = cookies.get(CSRF_COOKIE) {
        let token = cookie.value().to_string();
        if session_store::csrf_known(&mut state.redis.clone(), &token).await? {
            return Ok(token);
        }
    }
    issue_csrf_token(state, cookies).await
}

/// Checks a submitted token against the cookie and Redis.
pub async fn check_csrf(state: &AppState, cookies: &Cookies, submitted: &str) -> Result<()> {
    let Some(cookie) = cookies.get(CSRF_COOKIE) else {
        tracing::warn!("❌ CSRF: csrf_token cookie not found");
        return Err(AppError::Authentication("Missing CSRF token cookie".to_string()));
    };

    if !tokens_match(cookie.value(), submitted) {
        tracing::warn!("❌ CSRF: tokens do not match");
        return Err(AppError::Authentication("CSRF token mismatch".to_string()));
    }

    if !session_store::csrf_known(&mut state.redis.clone(), cookie.value()).await? {
        tracing::warn!("❌ CSRF: token expired or unknown");
        return Err(AppError::Authentication(
            "CSRF token expired or invalid".to_string(),
        ));
    }
    Ok(())
}

/// Rejects mutating requests whose `x-csrf-token` header does not match the cookie.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `cookies` - The request cookies.
/// * `req` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// The inner response, or a `401` when the token is missing or stale.
pub async fn verify_csrf(
    State(state): State<AppState>,
    cookies: Cookies,
    req: Request<Body>,
    next: Next,
) -> Response {
    if matches!(*req.method(), Method::GET | Method::HEAD | Method::OPTIONS) {
        return next.run(req).await;
    }

    let header = match req.headers().get(CSRF_HEADER).map(|v| v.to_str()) {
        Some(Ok(value)) => value.to_string(),
        Some(Err(_)) => {
            return AppError::Authentication("Invalid CSRF token format".to_string())
                .into_response()
        }
        None => {
            tracing::warn!("❌ CSRF: x-csrf-token header not found");
            return AppError::Authentication("Missing CSRF token header".to_string())
                .into_response();
        }
    };

    match check_csrf(&state, &cookies, &header).await {
        Ok(()) => next.run(req).await,
        Err(e) => e.into_response(),
    }
}
