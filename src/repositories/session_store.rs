use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use uuid::Uuid;

use crate::{
    crypto::csrf::{redis_key as csrf_key, CSRF_TOKEN_TTL_SECS},
    error::{AppError, Result},
    models::session::BackendSession,
};

fn session_key(id: Uuid) -> String {
    format!("session:{}", id)
}

/// Persists the backend session of browser session `id`.
///
/// # Arguments
///
/// * `redis` - The Redis connection.
/// * `id` - The browser session id from the `session_id` cookie.
/// * `session` - The backend session to store.
/// * `ttl_days` - How long the entry lives.
pub async fn save_session(
    redis: &mut ConnectionManager,
    id: Uuid,
    session: &BackendSession,
    ttl_days: i64,
) -> Result<()> {
    let json = sonic_rs::to_string(session)
        .map_err(|e| AppError::Internal(format!("Session serialization failed: {}", e)))?;
    let ttl_secs = (ttl_days.max(1) * 86400) as u64;

    let _: () = redis
        .set_ex(session_key(id), &json, ttl_secs)
        .await
        .map_err(|e| {
            tracing::error!("❌ Redis set_ex failed: {}", e);
            AppError::Redis(e)
        })?;
    tracing::debug!("✅ Session saved to Redis: session:{}", id);
    Ok(())
}

/// Loads the backend session of browser session `id`, if any.
///
/// Unreadable entries are dropped.
pub async fn load_session(redis: &mut ConnectionManager, id: Uuid) -> Result<Option<BackendSession>> {
    let json: Option<String> = redis.get(session_key(id)).await?;
    let Some(json) = json else {
        return Ok(None);
    };

    match sonic_rs::from_str(&json) {
        Ok(session) => Ok(Some(session)),
        Err(e) => {
            tracing::warn!("❌ Invalid session JSON for {}: {}", id, e);
            delete_session(redis, id).await?;
            Ok(None)
        }
    }
}

pub async fn delete_session(redis: &mut ConnectionManager, id: Uuid) -> Result<()> {
    let _: () = redis.del(session_key(id)).await?;
    Ok(())
}

/// Registers a freshly issued CSRF token.
pub async fn store_csrf(redis: &mut ConnectionManager, token: &str) -> Result<()> {
    let _: () = redis
        .set_ex(csrf_key(token), "valid", CSRF_TOKEN_TTL_SECS)
        .await
        .map_err(|e| {
            tracing::error!("❌ Redis set_ex failed for CSRF: {}", e);
            AppError::Redis(e)
        })?;
    Ok(())
}

/// Whether `token` is still registered.
pub async fn csrf_known(redis: &mut ConnectionManager, token: &str) -> Result<bool> {
    let value: Option<String> = redis.get(csrf_key(token)).await?;
    Ok(value.is_some())
}

pub async fn delete_csrf(redis: &mut ConnectionManager, token: &str) -> Result<()> {
    let _: () = redis.del(csrf_key(token)).await?;
    Ok(())
}
