use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use uuid::Uuid;

use crate::{
    backend::{
        client::Backend,
        events::{AuthChannel, AuthEvent},
    },
    error::Result,
    models::{role::Role, session::BackendSession},
    repositories::profile as profile_repo,
    services::resolver::{AuthSnapshot, RoleLookup, SessionResolver},
};

/// Resolves roles from the `profiles` table with the user's own token.
pub struct ProfileRoleLookup {
    backend: Arc<dyn Backend>,
}

impl ProfileRoleLookup {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl RoleLookup for ProfileRoleLookup {
    async fn lookup_role(&self, session: &BackendSession) -> Result<Option<Role>> {
        profile_repo::find_role(
            self.backend.as_ref(),
            Some(&session.access_token),
            session.user.id,
        )
        .await
    }
}

/// Auth state of one browser session.
pub struct PortalSession {
    channel: AuthChannel,
    resolver: SessionResolver,
    refresh: Mutex<()>,
}

impl PortalSession {
    /// Emits `SignedIn`; returns the event's sequence number.
    pub fn sign_in(&self, session: BackendSession) -> u64 {
        self.channel.emit(AuthEvent::SignedIn(session))
    }

    /// Held while a token refresh is in flight.
    pub async fn refreshing(&self) -> MutexGuard<'_, ()> {
        self.refresh.lock().await
    }

    /// Emits `TokenRefreshed`; returns the event's sequence number.
    pub fn refresh(&self, session: BackendSession) -> u64 {
        self.channel.emit(AuthEvent::TokenRefreshed(session))
    }

    /// Signs out with the backend (best effort) and emits `SignedOut`.
    pub async fn sign_out(&self, backend: &dyn Backend) -> u64 {
        if let Some(session) = self.channel.current_session() {
            if let Err(e) = backend.sign_out(&session.access_token).await {
                tracing::warn!("❌ Backend sign-out failed for {}: {}", session.user.id, e);
            }
        }
        self.channel.emit(AuthEvent::SignedOut)
    }

    /// Drops a session the backend no longer accepts, without calling it.
    pub fn expire(&self) -> u64 {
        self.channel.emit(AuthEvent::SignedOut)
    }

    /// The backend session as of the latest event.
    pub fn current_session(&self) -> Option<BackendSession> {
        self.channel.current_session()
    }

    /// Sequence number of the latest event.
    pub fn last_event(&self) -> u64 {
        self.channel.last_seq()
    }

    /// The resolver's latest snapshot.
    pub fn snapshot(&self) -> AuthSnapshot {
        self.resolver.snapshot()
    }

    /// Waits for the resolver to settle on the latest event.
    pub async fn settled(&self, timeout: Duration) -> AuthSnapshot {
        self.resolver.wait_settled(self.last_event(), timeout).await
    }

    /// Waits for the resolver to settle on event `seq` or a later one.
    pub async fn settled_at(&self, seq: u64, timeout: Duration) -> AuthSnapshot {
        self.resolver.wait_settled(seq, timeout).await
    }
}

/// Browser sessions known to this process.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Arc<PortalSession>>>>,
    lookup: Arc<dyn RoleLookup>,
    lookup_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(lookup: Arc<dyn RoleLookup>, lookup_timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            lookup,
            lookup_timeout,
        }
    }

    fn start(&self, initial: Option<BackendSession>) -> Arc<PortalSession> {
        let channel = AuthChannel::new();
        if let Some(session) = initial {
            channel.emit(AuthEvent::SignedIn(session));
        }
        let resolver = SessionResolver::spawn(channel.subscribe(), self.lookup.clone(), self.lookup_timeout);
        Arc::new(PortalSession {
            channel,
            resolver,
            refresh: Mutex::new(()),
        })
    }

    /// Returns the session `id`, creating an empty one if needed.
    pub async fn open(&self, id: Uuid) -> Arc<PortalSession> {
        if let Some(existing) = self.get(id).await {
            return existing;
        }
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(id)
            .or_insert_with(|| {
                tracing::debug!("🆕 Opened browser session {}", id);
                self.start(None)
            })
            .clone()
    }

    /// Rebuilds session `id` from a persisted backend session.
    pub async fn restore(&self, id: Uuid, stored: BackendSession) -> Arc<PortalSession> {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(id)
            .or_insert_with(|| {
                tracing::info!("♻️ Restored browser session {} for {}", id, stored.user.id);
                self.start(Some(stored))
            })
            .clone()
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<PortalSession>> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Forgets session `id`; its resolver stops once the last handle is dropped.
    pub async fn close(&self, id: Uuid) {
        if self.sessions.write().await.remove(&id).is_some() {
            tracing::debug!("🗑️ Closed browser session {}", id);
        }
    }

    /// Drops sessions that are signed out or whose access token has lapsed.
    ///
    /// A lapsed session that is still in Redis is restored on its next request.
    pub async fn prune_expired(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, portal| {
            portal
                .current_session()
                .is_some_and(|session| session.expires_at > now)
        });
        before - sessions.len()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::MemoryBackend;
    use crate::repositories::profile::PROFILES;
    use sonic_rs::json;

    const WAIT: Duration = Duration::from_secs(5);

    fn registry(backend: Arc<MemoryBackend>) -> SessionRegistry {
        SessionRegistry::new(Arc::new(ProfileRoleLookup::new(backend)), WAIT)
    }

    #[tokio::test]
    async fn sign_in_resolves_role_from_profiles() {
        let backend = Arc::new(MemoryBackend::new());
        let user = backend.add_account("hod@uni.edu", "pw-12345678");
        backend.seed(PROFILES, vec![json!({"id": user.id.to_string(), "email": "hod@uni.edu", "role": "superadmin"})]);

        let registry = registry(backend.clone());
        let portal = registry.open(Uuid::new_v4()).await;
        let session = backend.sign_in_with_password("hod@uni.edu", "pw-12345678").await.unwrap();
        let seq = portal.sign_in(session);

        let snap = portal.settled_at(seq, WAIT).await;
        assert_eq!(snap.role, Some(Role::Superadmin));
        assert_eq!(snap.user.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn user_without_profile_row_resolves_to_no_role() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_account("ghost@uni.edu", "pw-12345678");

        let registry = registry(backend.clone());
        let portal = registry.open(Uuid::new_v4()).await;
        let session = backend.sign_in_with_password("ghost@uni.edu", "pw-12345678").await.unwrap();
        let seq = portal.sign_in(session);

        let snap = portal.settled_at(seq, WAIT).await;
        assert!(snap.user.is_some());
        assert_eq!(snap.role, None);
    }

    #[tokio::test]
    async fn sign_out_clears_user_and_role() {
        let backend = Arc::new(MemoryBackend::new());
        let user = backend.add_account("s@uni.edu", "pw-12345678");
        backend.seed(PROFILES, vec![json!({"id": user.id.to_string(), "email": "s@uni.edu", "role": "student"})]);

        let registry = registry(backend.clone());
        let portal = registry.open(Uuid::new_v4()).await;
        let session = backend.sign_in_with_password("s@uni.edu", "pw-12345678").await.unwrap();
        let token = session.access_token.clone();
        portal.sign_in(session);
        portal.settled(WAIT).await;

        let seq = portal.sign_out(backend.as_ref()).await;
        let snap = portal.settled_at(seq, WAIT).await;
        assert_eq!(snap.user, None);
        assert_eq!(snap.role, None);
        assert!(portal.current_session().is_none());
        assert!(backend.get_user(&token).await.is_err());
    }

    #[tokio::test]
    async fn restore_replays_stored_session() {
        let backend = Arc::new(MemoryBackend::new());
        let user = backend.add_account("f@uni.edu", "pw-12345678");
        backend.seed(PROFILES, vec![json!({"id": user.id.to_string(), "email": "f@uni.edu", "role": "teacher"})]);
        let stored = backend.sign_in_with_password("f@uni.edu", "pw-12345678").await.unwrap();

        let registry = registry(backend.clone());
        let id = Uuid::new_v4();
        let portal = registry.restore(id, stored).await;
        let snap = portal.settled(WAIT).await;
        assert_eq!(snap.role, Some(Role::Faculty));

        // Opening the same id again returns the same session.
        let again = registry.open(id).await;
        assert!(Arc::ptr_eq(&portal, &again));
        assert_eq!(registry.len().await, 1);

        registry.close(id).await;
        assert!(registry.get(id).await.is_none());
    }

    #[tokio::test]
    async fn prune_drops_lapsed_and_signed_out_sessions() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_account("a@uni.edu", "pw-12345678");
        let live = backend.sign_in_with_password("a@uni.edu", "pw-12345678").await.unwrap();

        let registry = registry(backend.clone());
        let kept = Uuid::new_v4();
        registry.restore(kept, live.clone()).await;
        registry.open(Uuid::new_v4()).await;

        let now = Utc::now();
        assert_eq!(registry.prune_expired(now).await, 1);
        assert!(registry.get(kept).await.is_some());

        assert_eq!(registry.prune_expired(live.expires_at).await, 1);
        assert_eq!(registry.len().await, 0);
    }
}
