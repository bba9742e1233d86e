use redis::aio::ConnectionManager;
use std::sync::Arc;

use crate::backend::client::{Backend, SupabaseClient};
use crate::config::Config;
use crate::error::Result;
use crate::services::sessions::{ProfileRoleLookup, SessionRegistry};

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// Client for the hosted auth + data service.
    pub backend: Arc<dyn Backend>,
    /// The Redis connection manager.
    pub redis: ConnectionManager,
    /// The application's configuration.
    pub config: Config,
    /// Auth state of every browser session seen by this process.
    pub sessions: SessionRegistry,
}

impl AppState {
    /// Creates a new `AppState`.
    pub async fn new(config: &Config) -> Result<Self> {
        let backend: Arc<dyn Backend> = Arc::new(SupabaseClient::new(
            &config.supabase_url,
            config.supabase_anon_key.clone(),
            config.request_timeout,
        )?);
        tracing::info!("✅ Backend client ready for {}", config.supabase_url);

        let redis_client = redis::Client::open(config.redis_url.as_str())?;
        let redis = ConnectionManager::new(redis_client).await?;
        tracing::info!("✅ Redis Connection Manager initialized (pooled)");

        let sessions = SessionRegistry::new(
            Arc::new(ProfileRoleLookup::new(backend.clone())),
            config.role_lookup_timeout,
        );
        tracing::info!("✅ Session registry initialized");

        Ok(AppState {
            backend,
            redis,
            config: config.clone(),
            sessions,
        })
    }
}
