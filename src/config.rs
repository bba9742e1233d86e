use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use anyhow::{Context, Result};
use zeroize::Zeroizing;

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// Base URL of the hosted auth + data service.
    pub supabase_url: String,
    /// Public (anon) key sent with every backend request.
    pub supabase_anon_key: Zeroizing<String>,
    /// The URL of the Redis server.
    pub redis_url: String,
    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// The duration of a session in days.
    pub session_duration_days: i64,
    /// Per-request timeout for backend calls.
    pub request_timeout: Duration,
    /// Upper bound on a single role lookup.
    pub role_lookup_timeout: Duration,
    /// How long a guarded page waits for the resolver before showing the loading page.
    pub guard_settle_timeout: Duration,
    /// Institutional email domain required at registration, if any.
    pub allowed_email_domain: Option<String>,
    /// Origins allowed by CORS.
    pub cors_origins: Vec<String>,
    /// Whether cookies are marked `Secure`.
    pub production: bool,
}

fn parse_var<T: std::str::FromStr>(name: &str, default: &str) -> Result<T> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid {}", name))
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        let supabase_url = env::var("SUPABASE_URL")
            .context("SUPABASE_URL must be set")?
            .trim_end_matches('/')
            .to_string();

        if !supabase_url.starts_with("http://") && !supabase_url.starts_with("https://") {
            anyhow::bail!("SUPABASE_URL must be an http(s) URL");
        }

        let supabase_anon_key = Zeroizing::new(
            env::var("SUPABASE_ANON_KEY").context("SUPABASE_ANON_KEY must be set")?,
        );

        let allowed_email_domain = env::var("ALLOWED_EMAIL_DOMAIN")
            .ok()
            .map(|d| d.trim().trim_start_matches('@').to_ascii_lowercase())
            .filter(|d| !d.is_empty());

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        Ok(Self {
            supabase_url,
            supabase_anon_key,
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            bind_addr: parse_var("BIND_ADDR", "127.0.0.1:3000")?,
            session_duration_days: parse_var("SESSION_DURATION_DAYS", "7")?,
            request_timeout: Duration::from_secs(parse_var("REQUEST_TIMEOUT_SECS", "15")?),
            role_lookup_timeout: Duration::from_millis(parse_var("ROLE_LOOKUP_TIMEOUT_MS", "5000")?),
            guard_settle_timeout: Duration::from_millis(parse_var("GUARD_SETTLE_TIMEOUT_MS", "3000")?),
            allowed_email_domain,
            cors_origins,
            production: env::var("APP_ENV").map(|v| v == "production").unwrap_or(false),
        })
    }
}
