//! Auth-state change notifications for one browser session.
//!
//! Every event carries a sequence number assigned at emission. Subscribers see
//! events in that order, and the resolver uses the number to tell a stale
//! lookup from a current one.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::models::session::BackendSession;

/// A change of authentication state pushed by the backend client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// Replayed to each new subscriber: the session as it stands right now.
    InitialSession(Option<BackendSession>),
    SignedIn(BackendSession),
    TokenRefreshed(BackendSession),
    SignedOut,
}

impl AuthEvent {
    /// The session carried by the event, if it establishes one.
    pub fn session(&self) -> Option<&BackendSession> {
        match self {
            AuthEvent::InitialSession(session) => session.as_ref(),
            AuthEvent::SignedIn(session) | AuthEvent::TokenRefreshed(session) => Some(session),
            AuthEvent::SignedOut => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            AuthEvent::InitialSession(_) => "INITIAL_SESSION",
            AuthEvent::SignedIn(_) => "SIGNED_IN",
            AuthEvent::TokenRefreshed(_) => "TOKEN_REFRESHED",
            AuthEvent::SignedOut => "SIGNED_OUT",
        }
    }
}

/// An event tagged with its emission sequence number.
pub type SequencedEvent = (u64, AuthEvent);

struct ChannelInner {
    seq: u64,
    current: Option<BackendSession>,
    subscribers: Vec<mpsc::UnboundedSender<SequencedEvent>>,
}

/// Publishes auth events for one browser session.
#[derive(Clone)]
pub struct AuthChannel {
    inner: Arc<Mutex<ChannelInner>>,
}

impl Default for AuthChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthChannel {
    /// Creates a channel with no session.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ChannelInner {
                seq: 0,
                current: None,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Delivers `event` to every live subscriber and returns its sequence number.
    pub fn emit(&self, event: AuthEvent) -> u64 {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.seq += 1;
        let seq = inner.seq;

        match &event {
            AuthEvent::SignedOut => inner.current = None,
            other => inner.current = other.session().cloned(),
        }

        tracing::debug!("🔔 Auth event {} (seq {})", event.name(), seq);
        inner
            .subscribers
            .retain(|tx| tx.send((seq, event.clone())).is_ok());
        seq
    }

    /// The session as of the latest event.
    pub fn current_session(&self) -> Option<BackendSession> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .clone()
    }

    /// Sequence number of the latest event (0 before any).
    pub fn last_seq(&self) -> u64 {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).seq
    }

    /// Subscribes to future events, starting with a replay of the current session.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        // Cannot fail: the receiver is still in scope.
        let _ = tx.send((inner.seq, AuthEvent::InitialSession(inner.current.clone())));
        inner.subscribers.push(tx);

        Subscription {
            rx,
            cancel: CancellationToken::new(),
        }
    }
}

/// A cancellable stream of auth events.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<SequencedEvent>,
    cancel: CancellationToken,
}

impl Subscription {
    /// Next event, or `None` once unsubscribed or the channel is gone.
    pub async fn next(&mut self) -> Option<SequencedEvent> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            event = self.rx.recv() => event,
        }
    }

    /// A handle that ends this subscription from elsewhere.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Ends the subscription.
    pub fn unsubscribe(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::AuthUser;
    use chrono::Utc;
    use uuid::Uuid;

    fn session() -> BackendSession {
        BackendSession {
            user: AuthUser { id: Uuid::new_v4(), email: Some("s@uni.edu".into()) },
            access_token: "at".into(),
            refresh_token: "rt".into(),
            expires_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscriber_gets_initial_then_live_events_in_order() {
        let channel = AuthChannel::new();
        let s = session();
        channel.emit(AuthEvent::SignedIn(s.clone()));

        let mut sub = channel.subscribe();
        assert_eq!(sub.next().await, Some((1, AuthEvent::InitialSession(Some(s.clone())))));

        let a = channel.emit(AuthEvent::SignedOut);
        let b = channel.emit(AuthEvent::SignedIn(s.clone()));
        assert!(a < b);
        assert_eq!(sub.next().await, Some((a, AuthEvent::SignedOut)));
        assert_eq!(sub.next().await, Some((b, AuthEvent::SignedIn(s))));
    }

    #[tokio::test]
    async fn sign_out_clears_current_session() {
        let channel = AuthChannel::new();
        channel.emit(AuthEvent::SignedIn(session()));
        assert!(channel.current_session().is_some());
        channel.emit(AuthEvent::SignedOut);
        assert!(channel.current_session().is_none());
        assert_eq!(channel.last_seq(), 2);
    }

    #[tokio::test]
    async fn unsubscribe_ends_the_stream() {
        let channel = AuthChannel::new();
        let mut sub = channel.subscribe();
        sub.unsubscribe();
        channel.emit(AuthEvent::SignedOut);
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn dropping_the_channel_ends_the_stream() {
        let channel = AuthChannel::new();
        let mut sub = channel.subscribe();
        assert!(matches!(sub.next().await, Some((0, AuthEvent::InitialSession(None)))));
        drop(channel);
        assert_eq!(sub.next().await, None);
    }
}
