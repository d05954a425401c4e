//! The authoritative in-memory session, synchronized with persistent storage.
//!
//! All authentication network calls go through the manager, which collapses
//! endpoint rejections and transport failures to a boolean at its public
//! boundary. Callers present a uniform "login failed" state regardless of
//! cause; the distinction is only recorded in the logs.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, error, warn};

use crate::api::{AuthClient, RegisterOptions};
use crate::models::AuthUser;
use crate::session::storage::{StorageBackend, CREDITS_KEY, TOKEN_KEY, USER_KEY};

#[derive(Debug, Clone, Default)]
struct SessionState {
    authenticated: bool,
    username: Option<String>,
    token: Option<String>,
    credits: u64,
}

type ObserverFn = dyn Fn(Option<&AuthUser>) + Send + Sync;

struct Observer {
    id: u64,
    callback: Arc<ObserverFn>,
}

struct Inner {
    client: AuthClient,
    storage: Arc<dyn StorageBackend>,
    state: Mutex<SessionState>,
    observers: Mutex<Vec<Observer>>,
    next_observer_id: AtomicU64,
}

/// Handle to the one logical session of the process.
///
/// Clone is cheap and every clone observes and mutates the same underlying
/// state, so components that need to know "am I logged in, as whom" share a
/// handle instead of reaching for a hidden global.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(storage: Arc<dyn StorageBackend>, client: AuthClient) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                storage,
                state: Mutex::new(SessionState::default()),
                observers: Mutex::new(Vec::new()),
                next_observer_id: AtomicU64::new(0),
            }),
        }
    }

    /// Exchange credentials for a session. One network round trip.
    ///
    /// On success the new identity, token, and credit balance are stored,
    /// persisted, and announced to observers. On any failure the prior state
    /// is left untouched and observers are not notified.
    pub async fn login(&self, username: &str, password: &str) -> bool {
        match self.inner.client.login(username, password).await {
            Ok(session) => {
                {
                    let mut state = self.lock_state();
                    state.authenticated = true;
                    state.username = Some(username.to_string());
                    state.token = Some(session.token.clone());
                    state.credits = session.credits;
                }
                self.persist(username, &session.token, session.credits);
                debug!(username, "login succeeded");
                self.notify();
                true
            }
            Err(err) => {
                warn!(username, error = %err, "login failed");
                false
            }
        }
    }

    /// Create an account, then establish a session with the same credentials.
    ///
    /// Returns `false` if creation fails (no login is attempted) or if the
    /// follow-up login fails even though the account now exists server-side.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        options: RegisterOptions,
    ) -> bool {
        match self.inner.client.register(username, password, &options).await {
            Ok(()) => self.login(username, password).await,
            Err(err) => {
                warn!(username, error = %err, "registration failed");
                false
            }
        }
    }

    /// Ask the account service to email a verification code.
    pub async fn send_verification_code(&self, email: &str) -> bool {
        match self.inner.client.send_code(email).await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "failed to send verification code");
                false
            }
        }
    }

    /// Clear the session and the persisted slots. No network call.
    pub fn logout(&self) {
        {
            let mut state = self.lock_state();
            *state = SessionState::default();
        }
        for key in [USER_KEY, TOKEN_KEY, CREDITS_KEY] {
            if let Err(err) = self.inner.storage.remove(key) {
                warn!(key, error = %err, "failed to clear persisted session value");
            }
        }
        debug!("logged out");
        self.notify();
    }

    /// Reconcile in-memory state from persisted storage.
    ///
    /// Used at startup. Marks the session authenticated only when both the
    /// username and token slots are present; never contacts the network, so
    /// a server-side-revoked token is not detected here.
    pub fn check_auth(&self) -> bool {
        let username = self.inner.storage.get(USER_KEY);
        let token = self.inner.storage.get(TOKEN_KEY);

        let authenticated = match (username, token) {
            (Some(username), Some(token)) => {
                let credits = self
                    .inner
                    .storage
                    .get(CREDITS_KEY)
                    .and_then(|raw| raw.parse().ok())
                    .unwrap_or(0);
                let mut state = self.lock_state();
                *state = SessionState {
                    authenticated: true,
                    username: Some(username),
                    token: Some(token),
                    credits,
                };
                true
            }
            _ => {
                let mut state = self.lock_state();
                *state = SessionState::default();
                false
            }
        };

        debug!(authenticated, "reconciled session from storage");
        self.notify();
        authenticated
    }

    /// Register an observer for session transitions.
    ///
    /// The callback is invoked immediately with the current state, so late
    /// subscribers are not missed, and again on every subsequent transition
    /// until unsubscribed. Observers receive the identity only, never the
    /// token.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<&AuthUser>) + Send + Sync + 'static,
    {
        let id = self.inner.next_observer_id.fetch_add(1, Ordering::Relaxed);
        let callback: Arc<ObserverFn> = Arc::new(callback);
        self.lock_observers().push(Observer {
            id,
            callback: Arc::clone(&callback),
        });

        let snapshot = self.snapshot();
        Self::deliver(&*callback, snapshot.as_ref());

        Subscription {
            inner: Arc::downgrade(&self.inner),
            id,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock_state().authenticated
    }

    pub fn current_user(&self) -> Option<String> {
        self.lock_state().username.clone()
    }

    pub fn user_credits(&self) -> u64 {
        self.lock_state().credits
    }

    pub fn token(&self) -> Option<String> {
        self.lock_state().token.clone()
    }

    fn snapshot(&self) -> Option<AuthUser> {
        let state = self.lock_state();
        if !state.authenticated {
            return None;
        }
        state.username.as_ref().map(|username| AuthUser {
            username: username.clone(),
        })
    }

    fn persist(&self, username: &str, token: &str, credits: u64) {
        // A failed write is logged, not fatal: the in-memory session stays
        // authoritative for the rest of the process lifetime.
        let credits = credits.to_string();
        for (key, value) in [
            (USER_KEY, username),
            (TOKEN_KEY, token),
            (CREDITS_KEY, credits.as_str()),
        ] {
            if let Err(err) = self.inner.storage.set(key, value) {
                warn!(key, error = %err, "failed to persist session value");
            }
        }
    }

    fn notify(&self) {
        let snapshot = self.snapshot();
        // Snapshot the observer list so callbacks run without any lock held.
        let callbacks: Vec<Arc<ObserverFn>> = self
            .lock_observers()
            .iter()
            .map(|observer| Arc::clone(&observer.callback))
            .collect();
        for callback in callbacks {
            Self::deliver(&*callback, snapshot.as_ref());
        }
    }

    fn deliver(callback: &ObserverFn, snapshot: Option<&AuthUser>) {
        // One observer must not take down delivery to the rest.
        if panic::catch_unwind(AssertUnwindSafe(|| callback(snapshot))).is_err() {
            error!("session observer panicked during notification");
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_observers(&self) -> MutexGuard<'_, Vec<Observer>> {
        self.inner
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Receipt for a registered observer.
///
/// `unsubscribe` may be called any number of times and never affects other
/// observers. Dropping the subscription without calling it leaves the
/// observer registered for the life of the manager.
pub struct Subscription {
    inner: Weak<Inner>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if let Some(inner) = self.inner.upgrade() {
            inner
                .observers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|observer| observer.id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::session::storage::MemoryStore;

    fn offline_manager() -> (SessionManager, Arc<MemoryStore>) {
        // No request is made in these tests; the endpoint just has to exist
        // as a value.
        let storage = Arc::new(MemoryStore::new());
        let client = AuthClient::new("http://127.0.0.1:9").expect("client");
        let manager = SessionManager::new(storage.clone(), client);
        (manager, storage)
    }

    #[test]
    fn subscriber_receives_current_state_immediately() {
        let (manager, _storage) = offline_manager();
        let events: Arc<Mutex<Vec<Option<String>>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&events);
        let _sub = manager.subscribe(move |user| {
            sink.lock().unwrap().push(user.map(|u| u.username.clone()));
        });

        assert_eq!(*events.lock().unwrap(), vec![None]);
    }

    #[test]
    fn check_auth_requires_both_user_and_token() {
        let (manager, storage) = offline_manager();

        storage.set(USER_KEY, "bob").unwrap();
        assert!(!manager.check_auth());
        assert!(!manager.is_authenticated());

        storage.set(TOKEN_KEY, "t2").unwrap();
        assert!(manager.check_auth());
        assert_eq!(manager.current_user().as_deref(), Some("bob"));
        assert_eq!(manager.token().as_deref(), Some("t2"));
        assert_eq!(manager.user_credits(), 0);
    }

    #[test]
    fn check_auth_defaults_unparseable_credits_to_zero() {
        let (manager, storage) = offline_manager();
        storage.set(USER_KEY, "bob").unwrap();
        storage.set(TOKEN_KEY, "t2").unwrap();
        storage.set(CREDITS_KEY, "not-a-number").unwrap();

        assert!(manager.check_auth());
        assert_eq!(manager.user_credits(), 0);
    }

    #[test]
    fn unsubscribe_is_idempotent_and_leaves_others_registered() {
        let (manager, _storage) = offline_manager();

        let first_count = Arc::new(AtomicUsize::new(0));
        let second_count = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&first_count);
        let first = manager.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = Arc::clone(&second_count);
        let _second = manager.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        first.unsubscribe();
        first.unsubscribe();

        manager.logout();
        // First observer only saw its initial delivery; the second saw the
        // initial delivery plus the logout transition.
        assert_eq!(first_count.load(Ordering::SeqCst), 1);
        assert_eq!(second_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panicking_observer_does_not_block_later_observers() {
        let (manager, _storage) = offline_manager();

        let _bad = manager.subscribe(|user| {
            if user.is_none() {
                panic!("observer failure");
            }
        });

        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&delivered);
        let _good = manager.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        manager.logout();
        assert_eq!(delivered.load(Ordering::SeqCst), 2);
    }
}
