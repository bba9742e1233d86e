use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use redis::aio::ConnectionManager;
use std::net::SocketAddr;

use crate::{
    error::AppError,
    state::AppState,
    views::layout::{self, Nav},
};

const LOGIN_ATTEMPTS: i32 = 5;
const LOGIN_WINDOW_SECS: i64 = 900;
const REGISTRATIONS: i32 = 3;
const REGISTER_WINDOW_SECS: i64 = 43200;

/// Extracts the peer IP address from the request extensions.
///
/// # Returns
///
/// The IP address as a string, or "unknown" if not found.
fn extract_real_ip(req: &Request<Body>) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Seconds left on `key` once it has reached `limit`, otherwise `None`.
async fn exhausted(redis: &mut ConnectionManager, key: &str, limit: i32) -> Option<i64> {
    let count: Option<i32> = redis::cmd("GET")
        .arg(key)
        .query_async(redis)
        .await
        .unwrap_or(None);

    match count {
        Some(n) if n >= limit => {
            let ttl: Option<i64> = redis::cmd("TTL")
                .arg(key)
                .query_async(redis)
                .await
                .unwrap_or(None);
            Some(ttl.unwrap_or(0).max(0))
        }
        _ => None,
    }
}

async fn bump(redis: &mut ConnectionManager, key: &str, window_secs: i64) {
    let _: () = redis::cmd("INCR")
        .arg(key)
        .query_async(redis)
        .await
        .unwrap_or(());

    let _: () = redis::cmd("EXPIRE")
        .arg(key)
        .arg(window_secs)
        .query_async(redis)
        .await
        .unwrap_or(());
}

/// Renders `error` on the form page named `title`.
fn limited(title: &str, error: AppError) -> Response {
    tracing::warn!("{}", error);
    let body = format!(
        r#"<section class="auth-card"><h1>{}</h1>{}</section>"#,
        layout::escape(title),
        layout::alert(Some(&error.user_message()))
    );
    (
        error.status(),
        layout::page(title, Nav::Anonymous, None, &body),
    )
        .into_response()
}

/// Limits failed logins per client address.
///
/// # Arguments
///
/// * `state` - The application state.
/// * `req` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// The login response, or a `429` page once the limit is reached. Rejected
/// attempts count towards the limit; a successful login clears it.
pub async fn rate_limit_login(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let key = format!("rate_limit:login:{}", extract_real_ip(&req));
    let mut redis = state.redis.clone();

    if let Some(ttl) = exhausted(&mut redis, &key, LOGIN_ATTEMPTS).await {
        return limited(
            "Sign in",
            AppError::RateLimitExceeded(format!(
                "Too many failed login attempts. Try again in {} minutes",
                (ttl + 59) / 60
            )),
        );
    }

    let response = next.run(req).await;

    if response.status().is_client_error() {
        bump(&mut redis, &key, LOGIN_WINDOW_SECS).await;
    } else if response.status().is_redirection() {
        let _: () = redis::cmd("DEL")
            .arg(&key)
            .query_async(&mut redis)
            .await
            .unwrap_or(());
    }

    response
}

/// Limits account creation per client address.
pub async fn rate_limit_register(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let key = format!("rate_limit:register:{}", extract_real_ip(&req));
    let mut redis = state.redis.clone();

    if let Some(ttl) = exhausted(&mut redis, &key, REGISTRATIONS).await {
        return limited(
            "Register",
            AppError::RateLimitExceeded(format!(
                "Registration limit exceeded. Try again in {} minutes",
                (ttl + 59) / 60
            )),
        );
    }

    let response = next.run(req).await;

    // Only accounts that were actually created count.
    if response.status().is_redirection() {
        bump(&mut redis, &key, REGISTER_WINDOW_SECS).await;
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn limited_page_is_a_429_with_the_message() {
        let response = limited(
            "Sign in",
            AppError::RateLimitExceeded("Try again in 15 minutes".to_string()),
        );
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("Try again in 15 minutes"));
        assert!(html.contains("<h1>Sign in</h1>"));
    }
}
