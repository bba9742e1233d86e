//! Session/role resolution.
//!
//! Turns the ordered auth-event stream of one browser session into a single
//! `(user, role, loading)` snapshot. Role lookups for successive events may
//! overlap; only the lookup belonging to the latest event is ever applied.

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    backend::events::{AuthEvent, Subscription},
    error::{AppError, Result},
    models::{role::Role, session::BackendSession, user::AuthUser},
};

/// What the rest of the portal knows about the current visitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthSnapshot {
    pub user: Option<AuthUser>,
    pub role: Option<Role>,
    /// True between an event that carries a session and the end of its role lookup.
    pub loading: bool,
    /// Sequence number of the event this snapshot reflects.
    pub epoch: u64,
}

impl AuthSnapshot {
    /// State before the first event has been processed.
    pub fn initial() -> Self {
        Self {
            user: None,
            role: None,
            loading: true,
            epoch: 0,
        }
    }
}

/// Looks up the role stored for a user.
#[async_trait]
pub trait RoleLookup: Send + Sync {
    /// `Ok(None)` when the user has no profile row or an unknown role value.
    async fn lookup_role(&self, session: &BackendSession) -> Result<Option<Role>>;
}

/// A role lookup that was started for the event `seq`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTicket {
    pub seq: u64,
    pub session: BackendSession,
}

/// The synchronous core of the resolver.
#[derive(Debug)]
pub struct ResolverCore {
    latest: Option<u64>,
    snapshot: AuthSnapshot,
}

impl Default for ResolverCore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolverCore {
    pub fn new() -> Self {
        Self {
            latest: None,
            snapshot: AuthSnapshot::initial(),
        }
    }

    pub fn snapshot(&self) -> &AuthSnapshot {
        &self.snapshot
    }

    /// Applies an event; returns the lookup to run, if any.
    ///
    /// Events older than one already seen are ignored.
    pub fn on_event(&mut self, seq: u64, event: AuthEvent) -> Option<LookupTicket> {
        if self.latest.is_some_and(|latest| seq < latest) {
            tracing::debug!("Ignoring out-of-order auth event {}", seq);
            return None;
        }
        self.latest = Some(seq);

        match event {
            AuthEvent::SignedOut | AuthEvent::InitialSession(None) => {
                self.snapshot = AuthSnapshot {
                    user: None,
                    role: None,
                    loading: false,
                    epoch: seq,
                };
                None
            }
            AuthEvent::InitialSession(Some(session))
            | AuthEvent::SignedIn(session)
            | AuthEvent::TokenRefreshed(session) => {
                // The previous pair stays as it was; it is replaced as a whole once
                // the lookup for this event lands.
                self.snapshot.loading = true;
                Some(LookupTicket { seq, session })
            }
        }
    }

    /// Applies a finished lookup. Returns `false` if it was superseded.
    pub fn on_lookup(&mut self, ticket: LookupTicket, outcome: Result<Option<Role>>) -> bool {
        if self.latest != Some(ticket.seq) {
            tracing::debug!(
                "Discarding stale role lookup for {} (event {})",
                ticket.session.user.id,
                ticket.seq
            );
            return false;
        }

        let role = match outcome {
            Ok(role) => role,
            Err(e) => {
                tracing::warn!("❌ Role lookup failed for {}: {}", ticket.session.user.id, e);
                None
            }
        };

        self.snapshot = AuthSnapshot {
            user: Some(ticket.session.user),
            role,
            loading: false,
            epoch: ticket.seq,
        };
        true
    }
}

/// Owns the resolver task for one browser session.
pub struct SessionResolver {
    state: watch::Receiver<AuthSnapshot>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SessionResolver {
    /// Starts consuming `subscription`, looking roles up through `lookup`.
    pub fn spawn(
        mut subscription: Subscription,
        lookup: Arc<dyn RoleLookup>,
        lookup_timeout: Duration,
    ) -> Self {
        let (tx, rx) = watch::channel(AuthSnapshot::initial());
        let cancel = subscription.cancel_handle();

        let task = tokio::spawn(async move {
            let mut core = ResolverCore::new();
            let mut in_flight = FuturesUnordered::new();

            loop {
                tokio::select! {
                    event = subscription.next() => {
                        let Some((seq, event)) = event else { break };
                        if let Some(ticket) = core.on_event(seq, event) {
                            let lookup = lookup.clone();
                            in_flight.push(async move {
                                let outcome = match tokio::time::timeout(
                                    lookup_timeout,
                                    lookup.lookup_role(&ticket.session),
                                )
                                .await
                                {
                                    Ok(outcome) => outcome,
                                    Err(_) => Err(AppError::Internal("role lookup timed out".to_string())),
                                };
                                (ticket, outcome)
                            });
                        }
                        tx.send_replace(core.snapshot().clone());
                    }
                    Some((ticket, outcome)) = in_flight.next(), if !in_flight.is_empty() => {
                        if core.on_lookup(ticket, outcome) {
                            tx.send_replace(core.snapshot().clone());
                        }
                    }
                }
            }

            tracing::debug!("Resolver stopped");
        });

        Self {
            state: rx,
            cancel,
            task,
        }
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> AuthSnapshot {
        self.state.borrow().clone()
    }

    /// Waits until the snapshot reflects event `min_epoch` or later and is
    /// no longer loading. Returns the last snapshot seen if `timeout` elapses.
    pub async fn wait_settled(&self, min_epoch: u64, timeout: Duration) -> AuthSnapshot {
        let mut rx = self.state.clone();
        let settled = tokio::time::timeout(
            timeout,
            rx.wait_for(|s| !s.loading && s.epoch >= min_epoch),
        )
        .await;

        match settled {
            Ok(Ok(snapshot)) => snapshot.clone(),
            _ => self.snapshot(),
        }
    }

}

impl Drop for SessionResolver {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::events::AuthChannel;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::sync::oneshot;
    use uuid::Uuid;

    fn session_for(email: &str) -> BackendSession {
        BackendSession {
            user: AuthUser {
                id: Uuid::new_v4(),
                email: Some(email.to_string()),
            },
            access_token: format!("token-{}", email),
            refresh_token: "refresh".into(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        }
    }

    fn ok(role: Role) -> Result<Option<Role>> {
        Ok(Some(role))
    }

    // ---- core -----------------------------------------------------------

    #[test]
    fn starts_loading_with_no_user() {
        let core = ResolverCore::new();
        assert_eq!(core.snapshot(), &AuthSnapshot::initial());
    }

    #[test]
    fn empty_initial_session_settles_unauthenticated() {
        let mut core = ResolverCore::new();
        assert!(core.on_event(0, AuthEvent::InitialSession(None)).is_none());
        let s = core.snapshot();
        assert!(!s.loading);
        assert!(s.user.is_none() && s.role.is_none());
    }

    #[test]
    fn sign_in_publishes_user_and_role_together() {
        let mut core = ResolverCore::new();
        let alice = session_for("alice@uni.edu");
        let ticket = core.on_event(1, AuthEvent::SignedIn(alice.clone())).unwrap();

        // Still loading: no user adopted before the role is known.
        assert!(core.snapshot().loading);
        assert!(core.snapshot().user.is_none());

        assert!(core.on_lookup(ticket, ok(Role::Student)));
        let s = core.snapshot();
        assert_eq!(s.user.as_ref(), Some(&alice.user));
        assert_eq!(s.role, Some(Role::Student));
        assert!(!s.loading);
        assert_eq!(s.epoch, 1);
    }

    #[test]
    fn failed_lookup_settles_with_no_role() {
        let mut core = ResolverCore::new();
        let ticket = core.on_event(1, AuthEvent::SignedIn(session_for("a@uni.edu"))).unwrap();
        core.on_lookup(ticket, Err(AppError::Internal("network".into())));
        let s = core.snapshot();
        assert!(s.user.is_some());
        assert_eq!(s.role, None);
        assert!(!s.loading);
    }

    #[test]
    fn stale_sign_in_lookup_does_not_resurrect_role_after_sign_out() {
        let mut core = ResolverCore::new();
        let ticket = core.on_event(1, AuthEvent::SignedIn(session_for("a@uni.edu"))).unwrap();
        core.on_event(2, AuthEvent::SignedOut);

        assert!(!core.on_lookup(ticket, ok(Role::Superadmin)));
        let s = core.snapshot();
        assert_eq!(s.user, None);
        assert_eq!(s.role, None);
        assert!(!s.loading);
        assert_eq!(s.epoch, 2);
    }

    #[test]
    fn sign_in_after_sign_out_wins() {
        let mut core = ResolverCore::new();
        core.on_event(1, AuthEvent::SignedOut);
        let bob = session_for("bob@uni.edu");
        let ticket = core.on_event(2, AuthEvent::SignedIn(bob.clone())).unwrap();
        assert!(core.on_lookup(ticket, ok(Role::Faculty)));
        assert_eq!(core.snapshot().user.as_ref(), Some(&bob.user));
        assert_eq!(core.snapshot().role, Some(Role::Faculty));
    }

    #[test]
    fn older_user_lookup_never_pairs_with_newer_user() {
        let mut core = ResolverCore::new();
        let alice = session_for("alice@uni.edu");
        let bob = session_for("bob@uni.edu");
        let t_alice = core.on_event(1, AuthEvent::SignedIn(alice)).unwrap();
        let t_bob = core.on_event(2, AuthEvent::SignedIn(bob.clone())).unwrap();

        // Bob's lookup lands first, Alice's arrives late.
        assert!(core.on_lookup(t_bob, ok(Role::Student)));
        assert!(!core.on_lookup(t_alice, ok(Role::Superadmin)));

        let s = core.snapshot();
        assert_eq!(s.user.as_ref(), Some(&bob.user));
        assert_eq!(s.role, Some(Role::Student));
    }

    #[test]
    fn out_of_order_events_are_ignored() {
        let mut core = ResolverCore::new();
        core.on_event(5, AuthEvent::SignedOut);
        assert!(core.on_event(3, AuthEvent::SignedIn(session_for("x@uni.edu"))).is_none());
        assert!(!core.snapshot().loading);
        assert_eq!(core.snapshot().epoch, 5);
    }

    #[test]
    fn every_published_pair_comes_from_one_event() {
        // Interleave events and late lookups; after each step the published
        // user must be the one whose lookup produced the published role.
        let mut core = ResolverCore::new();
        let users: Vec<_> = (0..6).map(|i| session_for(&format!("u{}@uni.edu", i))).collect();
        let roles = [Role::Student, Role::Faculty, Role::Admin, Role::Superadmin, Role::Student, Role::Admin];
        let mut expected: HashMap<Uuid, Role> = HashMap::new();
        let mut pending = Vec::new();

        for (i, session) in users.iter().enumerate() {
            let seq = (i as u64) * 2 + 1;
            expected.insert(session.user.id, roles[i]);
            pending.push(core.on_event(seq, AuthEvent::SignedIn(session.clone())).unwrap());
            if i % 2 == 1 && i + 1 < users.len() {
                core.on_event(seq + 1, AuthEvent::SignedOut);
            }
        }

        // Resolve in reverse order to maximise staleness.
        while let Some(ticket) = pending.pop() {
            let role = expected[&ticket.session.user.id];
            core.on_lookup(ticket, ok(role));
            let s = core.snapshot();
            match (&s.user, s.role) {
                (Some(user), Some(role)) => assert_eq!(expected[&user.id], role),
                (None, None) => {}
                other => panic!("mixed snapshot: {:?}", other),
            }
        }
    }

    // ---- async driver ---------------------------------------------------

    /// Lookup whose answers are released by the test, per user.
    struct GatedLookup {
        gates: Mutex<HashMap<Uuid, oneshot::Receiver<Option<Role>>>>,
    }

    impl GatedLookup {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                gates: Mutex::new(HashMap::new()),
            })
        }

        fn gate(&self, user: Uuid) -> oneshot::Sender<Option<Role>> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().insert(user, rx);
            tx
        }
    }

    #[async_trait]
    impl RoleLookup for GatedLookup {
        async fn lookup_role(&self, session: &BackendSession) -> Result<Option<Role>> {
            let rx = self.gates.lock().unwrap().remove(&session.user.id);
            match rx {
                Some(rx) => Ok(rx.await.unwrap_or(None)),
                None => Ok(None),
            }
        }
    }

    #[tokio::test]
    async fn resolver_settles_after_lookup() {
        let channel = AuthChannel::new();
        let lookup = GatedLookup::new();
        let resolver = SessionResolver::spawn(channel.subscribe(), lookup.clone(), Duration::from_secs(5));

        let alice = session_for("alice@uni.edu");
        let gate = lookup.gate(alice.user.id);
        let seq = channel.emit(AuthEvent::SignedIn(alice.clone()));
        gate.send(Some(Role::Student)).unwrap();

        let s = resolver.wait_settled(seq, Duration::from_secs(5)).await;
        assert_eq!(s.user.as_ref(), Some(&alice.user));
        assert_eq!(s.role, Some(Role::Student));
    }

    #[tokio::test]
    async fn slow_sign_in_lookup_after_sign_out_is_discarded() {
        let channel = AuthChannel::new();
        let lookup = GatedLookup::new();
        let resolver = SessionResolver::spawn(channel.subscribe(), lookup.clone(), Duration::from_secs(5));

        let alice = session_for("alice@uni.edu");
        let gate = lookup.gate(alice.user.id);
        channel.emit(AuthEvent::SignedIn(alice));
        let out = channel.emit(AuthEvent::SignedOut);

        let s = resolver.wait_settled(out, Duration::from_secs(5)).await;
        assert_eq!(s.user, None);

        // The first lookup finishes late; it must not bring the role back.
        gate.send(Some(Role::Superadmin)).unwrap();
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let s = resolver.snapshot();
        assert_eq!(s.user, None);
        assert_eq!(s.role, None);
        assert_eq!(s.epoch, out);
    }

    #[tokio::test]
    async fn lookup_timeout_settles_without_role() {
        let channel = AuthChannel::new();
        let lookup = GatedLookup::new();
        let resolver = SessionResolver::spawn(channel.subscribe(), lookup.clone(), Duration::from_millis(20));

        let alice = session_for("alice@uni.edu");
        let _gate = lookup.gate(alice.user.id);
        let seq = channel.emit(AuthEvent::SignedIn(alice.clone()));

        let s = resolver.wait_settled(seq, Duration::from_secs(5)).await;
        assert_eq!(s.user.as_ref(), Some(&alice.user));
        assert_eq!(s.role, None);
    }

    #[tokio::test]
    async fn wait_settled_gives_up_after_timeout() {
        let channel = AuthChannel::new();
        let lookup = GatedLookup::new();
        let resolver = SessionResolver::spawn(channel.subscribe(), lookup.clone(), Duration::from_secs(5));

        let alice = session_for("alice@uni.edu");
        let _gate = lookup.gate(alice.user.id);
        let seq = channel.emit(AuthEvent::SignedIn(alice));

        let s = resolver.wait_settled(seq, Duration::from_millis(30)).await;
        assert!(s.loading);
    }
}
