use base64::{engine::general_purpose, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;

/// The size of the CSRF token in bytes.
const CSRF_TOKEN_SIZE: usize = 32;

/// Seconds a CSRF token stays valid in Redis.
pub const CSRF_TOKEN_TTL_SECS: u64 = 3600;

/// Generates a new random CSRF token, URL-safe base64 encoded.
pub fn generate_csrf_token() -> String {
    let mut token = [0u8; CSRF_TOKEN_SIZE];
    OsRng.fill_bytes(&mut token);
    general_purpose::URL_SAFE_NO_PAD.encode(token)
}

/// Compares the cookie and header copies of a token in constant time.
pub fn tokens_match(cookie: &str, header: &str) -> bool {
    if cookie.is_empty() {
        return false;
    }
    cookie.as_bytes().ct_eq(header.as_bytes()).into()
}

/// Redis key under which a token is registered.
pub fn redis_key(token: &str) -> String {
    format!("csrf:{}", token)
}
