use std::sync::Arc;

use log::debug;
use tokio::{
    sync::{broadcast::error::RecvError, watch},
    task::JoinHandle,
};

use super::identity::{IdentityProvider, Session};

const PREVIEW_LEN: usize = 12;

/// First characters of the access token, enough to tell sessions apart.
pub fn token_preview(token: Option<&str>) -> String {
    match token {
        Some(t) if !t.is_empty() => {
            let head: String = t.chars().take(PREVIEW_LEN).collect();
            format!("{head}...")
        }
        _ => String::new(),
    }
}

/// Local view of the identity provider's session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    pub user_id: String,
    pub access_token_preview: String,
}

impl SessionState {
    pub fn from_session(session: Option<&Session>) -> Self {
        Self {
            user_id: session.map(|s| s.user.id.clone()).unwrap_or_default(),
            access_token_preview: token_preview(session.map(|s| s.access_token.as_str())),
        }
    }

    pub fn is_signed_in(&self) -> bool {
        !self.user_id.is_empty()
    }
}

/// Keeps a [`SessionState`] in sync with the identity provider.
#[derive(Clone, Debug)]
pub struct SessionMirror {
    state: Arc<watch::Sender<SessionState>>,
}

impl Default for SessionMirror {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMirror {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn apply(&self, session: Option<&Session>) {
        self.state.send_replace(SessionState::from_session(session));
    }

    /// Loads the current session then follows the provider's notifications
    /// until the returned subscription is stopped or dropped.
    pub async fn start(&self, provider: Arc<dyn IdentityProvider>) -> MirrorSubscription {
        // subscribe first, changes racing the initial load are replayed after it
        let mut changes = provider.subscribe();

        let session = match provider.get_session().await {
            Ok(s) => s,
            Err(e) => {
                debug!("initial session fetch failed: {e}");
                None
            }
        };
        self.apply(session.as_ref());

        let mirror = self.clone();
        let task = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        debug!("auth state changed: {:?}", change.event);
                        mirror.apply(change.session.as_ref());
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("skipped {skipped} auth notifications");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        MirrorSubscription { task: Some(task) }
    }
}

/// Live subscription of a [`SessionMirror`], released when dropped.
#[derive(Debug)]
pub struct MirrorSubscription {
    task: Option<JoinHandle<()>>,
}

impl MirrorSubscription {
    pub async fn stop(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for MirrorSubscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::broadcast;

    use super::{token_preview, SessionMirror, SessionState};
    use crate::core::identity::{
        AuthChange, AuthChangeEvent, IdentityError, MockIdentityProvider, Session, User,
    };

    fn session(id: &str, token: &str) -> Session {
        Session {
            access_token: token.to_string(),
            refresh_token: None,
            token_type: None,
            expires_in: None,
            expires_at: None,
            user: User {
                id: id.to_string(),
                email: None,
            },
        }
    }

    fn provider(
        initial: Result<Option<Session>, IdentityError>,
        events: &broadcast::Sender<AuthChange>,
    ) -> Arc<MockIdentityProvider> {
        let mut provider = MockIdentityProvider::new();
        let mut initial = Some(initial);
        provider
            .expect_get_session()
            .times(1)
            .returning(move || initial.take().unwrap_or(Ok(None)));
        let events = events.clone();
        provider
            .expect_subscribe()
            .times(1)
            .returning(move || events.subscribe());
        Arc::new(provider)
    }

    #[test]
    fn token_preview_tests() {
        assert_eq!("abcdef123456...", token_preview(Some("abcdef1234567890")));
        assert_eq!("abcdef123456...", token_preview(Some("abcdef123456")));
        assert_eq!("short...", token_preview(Some("short")));
        assert_eq!("", token_preview(Some("")));
        assert_eq!("", token_preview(None));
    }

    #[test]
    fn state_without_session_is_empty() {
        assert_eq!(SessionState::default(), SessionState::from_session(None));
        assert!(!SessionState::from_session(None).is_signed_in());
    }

    #[tokio::test]
    async fn start_loads_initial_session() {
        let (events, _) = broadcast::channel(4);
        let mirror = SessionMirror::new();

        let _sub = mirror
            .start(provider(Ok(Some(session("u1", "abcdef1234567890"))), &events))
            .await;

        assert_eq!(
            SessionState {
                user_id: "u1".to_string(),
                access_token_preview: "abcdef123456...".to_string(),
            },
            mirror.state()
        );
    }

    #[tokio::test]
    async fn failed_initial_fetch_is_no_session() {
        let (events, _) = broadcast::channel(4);
        let mirror = SessionMirror::new();
        mirror.apply(Some(&session("stale", "stale-token-value")));

        let _sub = mirror
            .start(provider(
                Err(IdentityError::Provider("boom".to_string())),
                &events,
            ))
            .await;

        assert_eq!(SessionState::default(), mirror.state());
    }

    #[tokio::test]
    async fn follows_notifications_until_stopped() {
        let (events, _) = broadcast::channel(4);
        let mirror = SessionMirror::new();
        let mut watch = mirror.watch();

        let sub = mirror.start(provider(Ok(None), &events)).await;
        let _ = watch.borrow_and_update();

        events
            .send(AuthChange::new(
                AuthChangeEvent::SignedIn,
                Some(session("u2", "0123456789abcdef")),
            ))
            .unwrap();
        watch.changed().await.unwrap();
        assert_eq!("u2", watch.borrow_and_update().user_id);
        assert_eq!("0123456789ab...", mirror.state().access_token_preview);

        events
            .send(AuthChange::new(AuthChangeEvent::SignedOut, None))
            .unwrap();
        watch.changed().await.unwrap();
        assert_eq!(SessionState::default(), *watch.borrow_and_update());

        sub.stop().await;

        // the subscription is released, nobody listens anymore
        assert_eq!(0, events.receiver_count());
        assert!(events
            .send(AuthChange::new(
                AuthChangeEvent::SignedIn,
                Some(session("u3", "ignored-token")),
            ))
            .is_err());
        assert_eq!(SessionState::default(), mirror.state());
    }

    #[tokio::test]
    async fn dropping_the_subscription_releases_it() {
        let (events, _) = broadcast::channel(4);
        let mirror = SessionMirror::new();

        {
            let _sub = mirror.start(provider(Ok(None), &events)).await;
            assert_eq!(1, events.receiver_count());
        }

        // abort is asynchronous, give the runtime a chance to reap the task
        for _ in 0..100 {
            if events.receiver_count() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(0, events.receiver_count());
    }
}
